use crate::pipeline::diag::{Diagnostic, JobCounts};
use anyhow::{Context, Result};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Serialize;
use std::io::{Cursor, Write};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

/// Output column names for the new-member stream. Note the relabeling of
/// the internal `TotalAmount` to `Total Amount` in this stream only.
pub const NEW_MEMBER_HEADERS: [&str; 8] = [
    "Name",
    "Email",
    "Country",
    "Total Amount",
    "Currency",
    "Month",
    "SupportRegion",
    "Note",
];

/// Output column names for the existing-member stream.
pub const EXISTING_MEMBER_HEADERS: [&str; 6] = [
    "PRF Card No",
    "TotalAmount",
    "Currency",
    "Month",
    "SupportRegion",
    "Note",
];

pub const DIAGNOSTIC_HEADERS: [&str; 3] = ["line", "code", "message"];

/// One named text entry destined for the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBlob {
    pub name: String,
    pub content: String,
}

/// Serialize one batch to the delimited output convention: every field
/// quoted, CRLF-terminated records, header row first.
pub fn csv_text(header: &[&str], rows: &[Vec<String>]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(header).context("writing CSV header")?;
    for row in rows {
        writer.write_record(row).context("writing CSV row")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("flushing CSV writer")?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

/// `warnings.csv` / `errors.csv` content: line, code, message.
pub fn diagnostics_csv(msgs: &[Diagnostic]) -> Result<String> {
    let rows: Vec<Vec<String>> = msgs
        .iter()
        .map(|m| vec![m.line.to_string(), m.code.to_string(), m.message.clone()])
        .collect();
    csv_text(&DIAGNOSTIC_HEADERS, &rows)
}

/// Job manifest, written as `manifest.json` in every successful archive.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    #[serde(rename = "jobId")]
    pub job_id: String,
    #[serde(rename = "dateUTC")]
    pub date_utc: String,
    #[serde(rename = "startSeq")]
    pub start_seq: String,
    #[serde(rename = "firstSeq")]
    pub first_seq: String,
    #[serde(rename = "newFiles")]
    pub new_files: Vec<String>,
    #[serde(rename = "oldFiles")]
    pub old_files: Vec<String>,
    pub counts: JobCounts,
}

pub fn manifest_json(manifest: &Manifest) -> Result<String> {
    serde_json::to_string_pretty(manifest).context("serializing manifest")
}

/// Archive container name: `prf_bulk_{UTCDATE}_{jobId}.zip`.
pub fn archive_name(date_utc: &str, job_id: &str) -> String {
    format!("prf_bulk_{}_{}.zip", date_utc, job_id)
}

/// Bundle the named text blobs into a single in-memory ZIP container,
/// preserving blob order.
pub fn build_archive(blobs: &[NamedBlob]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buf));
        // Fixed entry timestamp: identical inputs must produce
        // byte-identical archives.
        let options: FileOptions<'_, ()> = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());
        for blob in blobs {
            zip.start_file(blob.name.as_str(), options.clone())
                .with_context(|| format!("starting archive entry {}", blob.name))?;
            zip.write_all(blob.content.as_bytes())
                .with_context(|| format!("writing archive entry {}", blob.name))?;
        }
        zip.finish().context("finalizing archive")?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::diag::codes;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn csv_output_quotes_everything_with_crlf() {
        let rows = vec![vec!["a \"quoted\" value".to_string(), "1,000".to_string()]];
        let text = csv_text(&["h1", "h2"], &rows).unwrap();
        assert_eq!(
            text,
            "\"h1\",\"h2\"\r\n\"a \"\"quoted\"\" value\",\"1,000\"\r\n"
        );
    }

    #[test]
    fn diagnostics_csv_columns() {
        let msgs = vec![Diagnostic::new(4, codes::EMAIL, "Invalid email: x")];
        let text = diagnostics_csv(&msgs).unwrap();
        assert_eq!(
            text,
            "\"line\",\"code\",\"message\"\r\n\"4\",\"E-EMAIL-FORMAT\",\"Invalid email: x\"\r\n"
        );
    }

    #[test]
    fn manifest_serializes_with_contract_field_names() {
        let manifest = Manifest {
            job_id: "J-20250830-ABC123".to_string(),
            date_utc: "20250830".to_string(),
            start_seq: "098".to_string(),
            first_seq: "098".to_string(),
            new_files: vec!["098_prf_bulk_import_20250830.csv".to_string()],
            old_files: vec![],
            counts: JobCounts {
                total: 2,
                valid: 1,
                new: 1,
                old: 0,
                warnings: 0,
                errors: 1,
            },
        };
        let json = manifest_json(&manifest).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["jobId"], "J-20250830-ABC123");
        assert_eq!(value["dateUTC"], "20250830");
        assert_eq!(value["startSeq"], "098");
        assert_eq!(value["firstSeq"], "098");
        assert_eq!(value["newFiles"][0], "098_prf_bulk_import_20250830.csv");
        assert_eq!(value["counts"]["new"], 1);
        assert_eq!(value["counts"]["old"], 0);
    }

    #[test]
    fn archive_round_trips_entries_in_order() {
        let blobs = vec![
            NamedBlob {
                name: "one.csv".to_string(),
                content: "\"a\"\r\n".to_string(),
            },
            NamedBlob {
                name: "manifest.json".to_string(),
                content: "{}".to_string(),
            },
        ];
        let bytes = build_archive(&blobs).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut first = String::new();
        archive
            .by_index(0)
            .unwrap()
            .read_to_string(&mut first)
            .unwrap();
        assert_eq!(first, "\"a\"\r\n");
        assert_eq!(archive.by_index(1).unwrap().name(), "manifest.json");
    }
}
