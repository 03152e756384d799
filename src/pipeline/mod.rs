pub mod diag;

use crate::ingest::{self, header::HeaderMap};
use crate::output::{self, package};
use crate::validate;
use anyhow::Result;
use self::diag::{codes, Diagnostic, JobCounts};
use std::collections::HashSet;
use tracing::{debug, info};

/// Separator for the exact-duplicate composite key. Non-printable so field
/// values cannot collide with the joined form.
const DUP_KEY_SEP: char = '\u{1f}';

/// Canonical column indices after header reordering.
const COL_NAME: usize = 0;
const COL_EMAIL: usize = 1;
const COL_COUNTRY: usize = 2;
const COL_CARD_ID: usize = 3;
const COL_TOTAL_AMOUNT: usize = 4;
const COL_CURRENCY: usize = 5;
const COL_MONTH: usize = 6;
const COL_SUPPORT_REGION: usize = 7;
const COL_HQID: usize = 8;
const COL_TRANSACTION_DATE: usize = 9;
const COL_PAYMENT_CHECK_DATE: usize = 10;

/// Row destined for the primary (new-member) import output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMemberRow {
    pub name: String,
    pub email: String,
    pub country: String,
    pub total_amount: String,
    pub currency: String,
    pub month: String,
    pub support_region: String,
    pub note: String,
}

impl NewMemberRow {
    pub fn record(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.email.clone(),
            self.country.clone(),
            self.total_amount.clone(),
            self.currency.clone(),
            self.month.clone(),
            self.support_region.clone(),
            self.note.clone(),
        ]
    }
}

/// Row destined for the extension (existing-member) output, keyed by the
/// constructed card number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingMemberRow {
    pub card_no: String,
    pub total_amount: String,
    pub currency: String,
    pub month: String,
    pub support_region: String,
    pub note: String,
}

impl ExistingMemberRow {
    pub fn record(&self) -> Vec<String> {
        vec![
            self.card_no.clone(),
            self.total_amount.clone(),
            self.currency.clone(),
            self.month.clone(),
            self.support_region.clone(),
            self.note.clone(),
        ]
    }
}

/// The member-category split, decided once per row right after CardID
/// validation. A valid row lands in exactly one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRow {
    New(NewMemberRow),
    Existing(ExistingMemberRow),
}

/// Outcome of running one data row through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// Row passed every check; carries any non-blocking warnings.
    Assigned {
        row: MemberRow,
        warnings: Vec<Diagnostic>,
    },
    /// Exact duplicate of an earlier row; excluded from output, counted in
    /// totals, reported as a warning rather than an error.
    Dropped(Diagnostic),
    /// First failing check; the row gets at most one error.
    Rejected(Diagnostic),
}

/// Run one raw row through the ordered checks. `seen` is the job-scoped
/// dedup state, threaded through by the caller.
pub fn process_row(
    raw: &[String],
    map: &HeaderMap,
    line: usize,
    seen: &mut HashSet<String>,
    countries: &validate::CountryMap,
) -> RowOutcome {
    if raw.len() != map.incoming_cols() {
        return RowOutcome::Rejected(Diagnostic::new(
            line,
            codes::ROW_COLS,
            format!("Expected {} columns, got {}", map.incoming_cols(), raw.len()),
        ));
    }

    let fields = map.reorder(raw);

    let key: String = fields.join(&DUP_KEY_SEP.to_string());
    if !seen.insert(key) {
        return RowOutcome::Dropped(Diagnostic::new(
            line,
            codes::DUP_EXACT,
            "Exact duplicate dropped",
        ));
    }

    // Name length failures reuse the structural row code; downstream
    // consumers key on the existing taxonomy.
    if !validate::is_valid_name(&fields[COL_NAME]) {
        return RowOutcome::Rejected(Diagnostic::new(line, codes::ROW_COLS, "Invalid Name length"));
    }
    if !validate::is_valid_email(&fields[COL_EMAIL]) {
        return RowOutcome::Rejected(Diagnostic::new(
            line,
            codes::EMAIL,
            format!("Invalid email: {}", fields[COL_EMAIL]),
        ));
    }
    if !validate::is_valid_amount(&fields[COL_TOTAL_AMOUNT]) {
        return RowOutcome::Rejected(Diagnostic::new(
            line,
            codes::AMOUNT_NUM,
            format!("Invalid amount: {}", fields[COL_TOTAL_AMOUNT]),
        ));
    }
    if !validate::is_positive_amount(&fields[COL_TOTAL_AMOUNT]) {
        return RowOutcome::Rejected(Diagnostic::new(
            line,
            codes::AMOUNT_POS,
            "Amount must be > 0",
        ));
    }

    let currency = validate::normalize_currency(&fields[COL_CURRENCY]);
    if !validate::is_valid_currency(&currency) {
        return RowOutcome::Rejected(Diagnostic::new(
            line,
            codes::CURR_CODE,
            format!("Invalid currency: {}", fields[COL_CURRENCY]),
        ));
    }

    let month = fields[COL_MONTH].clone();
    if !validate::is_valid_month(&month) {
        return RowOutcome::Rejected(Diagnostic::new(
            line,
            codes::ROW_COLS,
            format!("Invalid Month: {}", month),
        ));
    }

    if !validate::parses_as_date(&fields[COL_TRANSACTION_DATE])
        || !validate::parses_as_date(&fields[COL_PAYMENT_CHECK_DATE])
    {
        return RowOutcome::Rejected(Diagnostic::new(line, codes::ROW_COLS, "Invalid dates"));
    }

    let card_id = fields[COL_CARD_ID].as_str();
    let is_new = card_id.is_empty();
    if !is_new {
        if !validate::is_all_digits(card_id) {
            return RowOutcome::Rejected(Diagnostic::new(
                line,
                codes::CARDID_NONNUM,
                "CardID must be digits",
            ));
        }
        if card_id == "0" {
            return RowOutcome::Rejected(Diagnostic::new(
                line,
                codes::CARDID_ZERO,
                "CardID cannot be zero",
            ));
        }
    }

    let mut warnings = Vec::new();

    let note = validate::build_hq_note(&fields[COL_HQID]);
    if validate::hqid_has_non_digits(&fields[COL_HQID]) {
        warnings.push(Diagnostic::new(
            line,
            codes::HQID_NONNUM,
            "HQID contains non-digits",
        ));
    }

    // The mapped country only reaches the new-member output, but the lookup
    // and its warning apply to every surviving row.
    let (country, mapped) = countries.lookup(&fields[COL_COUNTRY]);
    if !mapped {
        warnings.push(Diagnostic::new(
            line,
            codes::COUNTRY_UNMAPPED,
            format!("Country '{}' unmapped; set 'ZZ'", fields[COL_COUNTRY]),
        ));
    }

    let row = if is_new {
        MemberRow::New(NewMemberRow {
            name: fields[COL_NAME].clone(),
            email: fields[COL_EMAIL].clone(),
            country,
            total_amount: fields[COL_TOTAL_AMOUNT].clone(),
            currency,
            month,
            support_region: fields[COL_SUPPORT_REGION].clone(),
            note,
        })
    } else {
        let (card_no, long) = validate::build_card_no(card_id);
        if long {
            warnings.push(Diagnostic::new(
                line,
                codes::CARDID_LONG,
                "CardID length > 7",
            ));
        }
        MemberRow::Existing(ExistingMemberRow {
            card_no,
            total_amount: fields[COL_TOTAL_AMOUNT].clone(),
            currency,
            month,
            support_region: fields[COL_SUPPORT_REGION].clone(),
            note,
        })
    };

    RowOutcome::Assigned { row, warnings }
}

/// Everything a completed job hands back: counts, diagnostics, the named
/// archive entries, the manifest, and the packed archive itself.
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub counts: JobCounts,
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
    pub files: Vec<package::NamedBlob>,
    pub manifest: package::Manifest,
    pub archive: Vec<u8>,
    pub archive_name: String,
}

/// A job that terminated without producing an output archive: header
/// failure, input-limit violation, or zero valid rows.
#[derive(Debug, Clone)]
pub struct JobFailure {
    pub counts: JobCounts,
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub enum JobResult {
    Complete(JobOutput),
    Failed(JobFailure),
}

fn failed(errors: Vec<Diagnostic>, warnings: Vec<Diagnostic>, counts: JobCounts) -> JobResult {
    let mut counts = counts;
    counts.errors = errors.len();
    counts.warnings = warnings.len();
    JobResult::Failed(JobFailure {
        counts,
        warnings,
        errors,
    })
}

/// Run one whole job: parse, reconcile headers, validate and classify every
/// row, chunk, name, and package. `date_utc` and `job_id` are injected so
/// identical inputs produce byte-identical archive contents.
pub fn run_job(
    text: &str,
    start_seq: &str,
    date_utc: &str,
    job_id: &str,
    countries: &validate::CountryMap,
) -> Result<JobResult> {
    // Probe the sequence up front so a bad value fails before any parsing.
    let first_seq = {
        let mut seq = output::Sequencer::new(start_seq)?;
        seq.next()
    };

    let rows = match ingest::parse_rows(text) {
        Ok(rows) => rows,
        Err(diag) => return Ok(failed(vec![diag], Vec::new(), JobCounts::default())),
    };
    if rows.is_empty() {
        let diag = Diagnostic::new(1, codes::HEADERS_MISSING, "Empty file or missing header");
        return Ok(failed(vec![diag], Vec::new(), JobCounts::default()));
    }

    let header_row = &rows[0];
    let body = &rows[1..];
    if body.len() > ingest::MAX_ROWS {
        let diag = Diagnostic::new(1, codes::FILE_LIMIT, "File exceeds limits (25MB/50k rows)");
        return Ok(failed(vec![diag], Vec::new(), JobCounts::default()));
    }

    let (map, reorder_warning) = match ingest::header::reconcile(header_row) {
        Ok(ok) => ok,
        Err(errs) => return Ok(failed(errs, Vec::new(), JobCounts::default())),
    };

    let mut warnings: Vec<Diagnostic> = reorder_warning.into_iter().collect();
    let mut errors: Vec<Diagnostic> = Vec::new();
    let mut out_new: Vec<NewMemberRow> = Vec::new();
    let mut out_old: Vec<ExistingMemberRow> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (idx, raw) in body.iter().enumerate() {
        let line = idx + 2;
        match process_row(raw, &map, line, &mut seen, countries) {
            RowOutcome::Assigned { row, warnings: w } => {
                warnings.extend(w);
                match row {
                    MemberRow::New(r) => out_new.push(r),
                    MemberRow::Existing(r) => out_old.push(r),
                }
            }
            RowOutcome::Dropped(w) => warnings.push(w),
            RowOutcome::Rejected(e) => errors.push(e),
        }
    }

    let counts = JobCounts {
        total: body.len(),
        valid: out_new.len() + out_old.len(),
        new: out_new.len(),
        old: out_old.len(),
        warnings: warnings.len(),
        errors: errors.len(),
    };
    debug!(
        total = counts.total,
        valid = counts.valid,
        new = counts.new,
        old = counts.old,
        "row processing complete"
    );

    if counts.valid == 0 {
        return Ok(failed(errors, warnings, counts));
    }

    let new_records: Vec<Vec<String>> = out_new.iter().map(|r| r.record()).collect();
    let old_records: Vec<Vec<String>> = out_old.iter().map(|r| r.record()).collect();
    let new_chunks = output::chunk_rows(&new_records, output::CHUNK_ROWS);
    let old_chunks = output::chunk_rows(&old_records, output::CHUNK_ROWS);

    let (new_names, old_names) =
        output::build_file_names(new_chunks.len(), old_chunks.len(), start_seq, date_utc)?;

    let mut files: Vec<package::NamedBlob> = Vec::new();
    for (name, chunk) in new_names.iter().zip(&new_chunks) {
        files.push(package::NamedBlob {
            name: name.clone(),
            content: package::csv_text(&package::NEW_MEMBER_HEADERS, chunk)?,
        });
    }
    for (name, chunk) in old_names.iter().zip(&old_chunks) {
        files.push(package::NamedBlob {
            name: name.clone(),
            content: package::csv_text(&package::EXISTING_MEMBER_HEADERS, chunk)?,
        });
    }
    if !warnings.is_empty() {
        files.push(package::NamedBlob {
            name: "warnings.csv".to_string(),
            content: package::diagnostics_csv(&warnings)?,
        });
    }
    if !errors.is_empty() {
        files.push(package::NamedBlob {
            name: "errors.csv".to_string(),
            content: package::diagnostics_csv(&errors)?,
        });
    }

    let manifest = package::Manifest {
        job_id: job_id.to_string(),
        date_utc: date_utc.to_string(),
        start_seq: start_seq.to_string(),
        first_seq,
        new_files: new_names,
        old_files: old_names,
        counts,
    };
    files.push(package::NamedBlob {
        name: "manifest.json".to_string(),
        content: package::manifest_json(&manifest)?,
    });

    let archive = package::build_archive(&files)?;
    let archive_name = package::archive_name(date_utc, job_id);
    info!(
        job_id,
        files = files.len(),
        bytes = archive.len(),
        "packaged {}",
        archive_name
    );

    Ok(JobResult::Complete(JobOutput {
        counts,
        warnings,
        errors,
        files,
        manifest,
        archive,
        archive_name,
    }))
}
