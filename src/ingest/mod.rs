pub mod header;

use crate::pipeline::diag::{codes, Diagnostic};
use csv::ReaderBuilder;
use std::io::Cursor;
use tracing::debug;

/// Hard input bounds. Both are checked before any row processing.
pub const MAX_BYTES: u64 = 25 * 1024 * 1024;
pub const MAX_ROWS: usize = 50_000;

/// Strip a leading UTF-8 byte-order-mark if present.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

fn is_csv_name(name: &str) -> bool {
    name.trim().to_lowercase().ends_with(".csv")
}

/// Gate the upload before any parsing: exactly one file, `.csv` extension,
/// within the byte limit. Violations are fatal job-level diagnostics.
pub fn accept_upload(file_names: &[String], byte_len: u64) -> Result<(), Diagnostic> {
    if file_names.len() != 1 {
        return Err(Diagnostic::new(
            1,
            codes::MULTI_FILE,
            "Upload one CSV at a time",
        ));
    }
    if !is_csv_name(&file_names[0]) {
        return Err(Diagnostic::new(
            1,
            codes::FILE_TYPE,
            "Only .csv files are supported.",
        ));
    }
    if byte_len > MAX_BYTES {
        return Err(Diagnostic::new(
            1,
            codes::FILE_LIMIT,
            "File exceeds limits (25MB/50k rows)",
        ));
    }
    Ok(())
}

/// Parse the whole input into raw records, empty lines skipped, ragged rows
/// kept as-is so the per-row column-count check can report them. A
/// structural parse failure is fatal and attributed to line 1.
pub fn parse_rows(text: &str) -> Result<Vec<Vec<String>>, Diagnostic> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(strip_bom(text)));

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| {
            Diagnostic::new(1, codes::ROW_COLS, format!("CSV parse error: {}", e))
        })?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }
    debug!("parsed {} raw records", rows.len());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bom_is_stripped() {
        assert_eq!(strip_bom("\u{feff}Name,Email"), "Name,Email");
        assert_eq!(strip_bom("Name,Email"), "Name,Email");
    }

    #[test]
    fn upload_gating() {
        let one = vec!["data.csv".to_string()];
        assert!(accept_upload(&one, 100).is_ok());

        let two = vec!["a.csv".to_string(), "b.csv".to_string()];
        assert_eq!(accept_upload(&two, 100).unwrap_err().code, codes::MULTI_FILE);

        let xlsx = vec!["data.xlsx".to_string()];
        assert_eq!(accept_upload(&xlsx, 100).unwrap_err().code, codes::FILE_TYPE);

        assert_eq!(
            accept_upload(&one, MAX_BYTES + 1).unwrap_err().code,
            codes::FILE_LIMIT
        );
    }

    #[test]
    fn parse_keeps_ragged_rows_and_skips_blank_lines() {
        let text = "a,b,c\n\n1,2\n\"x,y\",2,3\n";
        let rows = parse_rows(text).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["1", "2"]);
        assert_eq!(rows[2][0], "x,y");
    }

    #[test]
    fn quoted_fields_round_trip() {
        let text = "h1,h2\n\"line\nbreak\",\"say \"\"hi\"\"\"\n";
        let rows = parse_rows(text).unwrap();
        assert_eq!(rows[1][0], "line\nbreak");
        assert_eq!(rows[1][1], "say \"hi\"");
    }
}
