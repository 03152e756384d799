use serde::Serialize;

/// Fixed diagnostic taxonomy. Downstream consumers branch on these codes,
/// so the exact strings are part of the output contract.
pub mod codes {
    pub const HEADERS_MISSING: &str = "E-HEADERS-MISSING";
    pub const HEADERS_EXTRA: &str = "E-HEADERS-EXTRA";
    pub const ROW_COLS: &str = "E-ROW-COLS";
    pub const EMAIL: &str = "E-EMAIL-FORMAT";
    pub const AMOUNT_NUM: &str = "E-AMOUNT-NUM";
    pub const AMOUNT_POS: &str = "E-AMOUNT-POS";
    pub const CURR_CODE: &str = "E-CURR-CODE";
    pub const CARDID_NONNUM: &str = "E-CARDID-NONNUM";
    pub const CARDID_ZERO: &str = "E-CARDID-ZERO";
    pub const FILE_LIMIT: &str = "E-FILE-LIMIT";
    pub const FILE_TYPE: &str = "E-FILE-TYPE";
    pub const MULTI_FILE: &str = "E-MULTI-FILE";

    pub const HEADERS_REORDERED: &str = "W-HEADERS-REORDERED";
    pub const CARDID_LONG: &str = "W-CARDID-LONG";
    pub const HQID_NONNUM: &str = "W-HQID-NONNUM";
    pub const COUNTRY_UNMAPPED: &str = "W-COUNTRY-UNMAPPED";
    pub const DUP_EXACT: &str = "W-DUP-EXACT";
}

/// One row-level or job-level message. `line` is the 1-based physical line
/// in the input file: the header is line 1, the first data row is line 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub code: &'static str,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: usize, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            line,
            code,
            message: message.into(),
        }
    }
}

/// Derived totals for one job. Always recomputable from the row lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub total: usize,
    pub valid: usize,
    pub new: usize,
    pub old: usize,
    pub warnings: usize,
    pub errors: usize,
}
