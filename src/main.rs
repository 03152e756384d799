use anyhow::{bail, Context, Result};
use prfbulk::output::{new_job_id, utc_yyyymmdd};
use prfbulk::{ingest, output::package, run_job, CountryMap, JobResult};
use std::{env, fs, path::PathBuf};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 2 || args.len() > 3 {
        bail!("usage: prfbulk <input.csv> <start_seq> [out_dir]");
    }
    let input = PathBuf::from(&args[0]);
    let start_seq = &args[1];
    let out_dir = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let byte_len = fs::metadata(&input)
        .with_context(|| format!("reading metadata for {}", input.display()))?
        .len();
    let date_utc = utc_yyyymmdd();

    if let Err(diag) = ingest::accept_upload(&[file_name], byte_len) {
        error!(code = diag.code, "{}", diag.message);
        write_errors_file(&out_dir, &date_utc, std::slice::from_ref(&diag))?;
        std::process::exit(1);
    }

    let text =
        fs::read_to_string(&input).with_context(|| format!("reading {}", input.display()))?;

    let job_id = new_job_id(&date_utc);
    info!(%job_id, %start_seq, "processing {}", input.display());

    match run_job(&text, start_seq, &date_utc, &job_id, &CountryMap::default())? {
        JobResult::Complete(out) => {
            let archive_path = out_dir.join(&out.archive_name);
            fs::write(&archive_path, &out.archive)
                .with_context(|| format!("writing {}", archive_path.display()))?;
            info!(
                total = out.counts.total,
                valid = out.counts.valid,
                new = out.counts.new,
                old = out.counts.old,
                warnings = out.counts.warnings,
                errors = out.counts.errors,
                "wrote {}",
                archive_path.display()
            );
            Ok(())
        }
        JobResult::Failed(failure) => {
            for diag in &failure.errors {
                error!(line = diag.line, code = diag.code, "{}", diag.message);
            }
            let path = write_errors_file(&out_dir, &date_utc, &failure.errors)?;
            error!(
                total = failure.counts.total,
                errors = failure.counts.errors,
                "job failed, errors written to {}",
                path.display()
            );
            std::process::exit(1);
        }
    }
}

/// Failed jobs still hand the operator a downloadable errors file.
fn write_errors_file(
    out_dir: &std::path::Path,
    date_utc: &str,
    errors: &[prfbulk::Diagnostic],
) -> Result<PathBuf> {
    let path = out_dir.join(format!("errors_{}.csv", date_utc));
    let content = package::diagnostics_csv(errors)?;
    fs::write(&path, &content).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
