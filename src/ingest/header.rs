use crate::pipeline::diag::{codes, Diagnostic};

/// The 13 required input columns, in canonical order.
pub const CANONICAL_HEADERS: [&str; 13] = [
    "Name",
    "Email",
    "Country",
    "CardID",
    "TotalAmount",
    "Currency",
    "Month",
    "SupportRegion",
    "HQID",
    "TransactionDate",
    "PaymentCheckDate",
    "FormFillingPerson",
    "Note",
];

/// Resolved mapping from canonical column order to incoming column indices.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    /// For each canonical column, the index of the matching incoming column.
    positions: Vec<usize>,
    /// Number of columns the incoming header actually has. Every data row
    /// must match this width, not the canonical width.
    incoming_cols: usize,
    /// Incoming columns were present but not in canonical order.
    reordered: bool,
}

impl HeaderMap {
    pub fn incoming_cols(&self) -> usize {
        self.incoming_cols
    }

    pub fn reordered(&self) -> bool {
        self.reordered
    }

    /// Project a raw data row into canonical column order, trimming each
    /// field. Missing cells become empty strings.
    pub fn reorder(&self, row: &[String]) -> Vec<String> {
        self.positions
            .iter()
            .map(|&idx| row.get(idx).map(|s| s.trim()).unwrap_or("").to_string())
            .collect()
    }
}

/// Case, whitespace and underscores are not significant when matching
/// headers, so "Total Amount", "total_amount" and "TotalAmount" all line up.
fn norm_header(h: &str) -> String {
    h.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .collect()
}

/// Match an incoming header row against the canonical schema.
///
/// Missing canonical columns and unrecognized extra columns are both fatal,
/// and both are reported together in one failed job. A matching set in a
/// different order only produces a `W-HEADERS-REORDERED` warning, returned
/// alongside the position map.
pub fn reconcile(incoming: &[String]) -> Result<(HeaderMap, Option<Diagnostic>), Vec<Diagnostic>> {
    let norm_incoming: Vec<String> = incoming.iter().map(|h| norm_header(h)).collect();

    let mut positions = Vec::with_capacity(CANONICAL_HEADERS.len());
    let mut missing: Vec<&str> = Vec::new();
    for canonical in CANONICAL_HEADERS {
        let want = norm_header(canonical);
        match norm_incoming.iter().position(|h| *h == want) {
            Some(idx) => positions.push(idx),
            None => missing.push(canonical),
        }
    }

    let mut extra: Vec<String> = Vec::new();
    for (i, norm) in norm_incoming.iter().enumerate() {
        if !CANONICAL_HEADERS.iter().any(|c| norm_header(c) == *norm) {
            extra.push(if incoming[i].is_empty() {
                format!("#{}", i + 1)
            } else {
                incoming[i].clone()
            });
        }
    }

    if !missing.is_empty() || !extra.is_empty() {
        let mut errs = Vec::new();
        if !missing.is_empty() {
            errs.push(Diagnostic::new(
                1,
                codes::HEADERS_MISSING,
                format!("Missing headers: {}", missing.join(", ")),
            ));
        }
        if !extra.is_empty() {
            errs.push(Diagnostic::new(
                1,
                codes::HEADERS_EXTRA,
                format!("Extra headers: {}", extra.join(", ")),
            ));
        }
        return Err(errs);
    }

    let reordered = positions.iter().enumerate().any(|(i, &idx)| i != idx);
    let warning = reordered.then(|| {
        Diagnostic::new(
            1,
            codes::HEADERS_REORDERED,
            "Headers auto-reordered to canonical order",
        )
    });

    Ok((
        HeaderMap {
            positions,
            incoming_cols: incoming.len(),
            reordered,
        },
        warning,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn canonical_order_maps_identity_without_warning() {
        let (map, warning) = reconcile(&headers(&CANONICAL_HEADERS)).unwrap();
        assert!(!map.reordered());
        assert!(warning.is_none());
        assert_eq!(map.incoming_cols(), 13);

        let row: Vec<String> = (0..13).map(|i| format!(" v{} ", i)).collect();
        let reordered = map.reorder(&row);
        assert_eq!(reordered[0], "v0");
        assert_eq!(reordered[12], "v12");
    }

    #[test]
    fn spacing_case_and_underscores_are_ignored() {
        let mut names = headers(&CANONICAL_HEADERS);
        names[4] = "Total Amount".to_string();
        names[7] = "support_region".to_string();
        names[9] = "TRANSACTIONDATE".to_string();
        let (map, warning) = reconcile(&names).unwrap();
        assert!(!map.reordered());
        assert!(warning.is_none());
        assert_eq!(map.incoming_cols(), 13);
    }

    #[test]
    fn reordered_headers_warn_but_map_correctly() {
        let mut names = headers(&CANONICAL_HEADERS);
        names.swap(0, 1); // Email first
        let (map, warning) = reconcile(&names).unwrap();
        assert!(map.reordered());
        let warning = warning.unwrap();
        assert_eq!(warning.code, codes::HEADERS_REORDERED);
        assert_eq!(warning.line, 1);

        let mut row: Vec<String> = (0..13).map(|i| format!("v{}", i)).collect();
        row[0] = "someone@example.com".to_string();
        row[1] = "A Name".to_string();
        let reordered = map.reorder(&row);
        assert_eq!(reordered[0], "A Name");
        assert_eq!(reordered[1], "someone@example.com");
    }

    #[test]
    fn missing_and_extra_are_both_fatal_in_one_job() {
        let mut names = headers(&CANONICAL_HEADERS);
        names[3] = "Membership".to_string(); // CardID gone, unknown column added
        let errs = reconcile(&names).unwrap_err();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].code, codes::HEADERS_MISSING);
        assert!(errs[0].message.contains("CardID"));
        assert_eq!(errs[1].code, codes::HEADERS_EXTRA);
        assert!(errs[1].message.contains("Membership"));
    }

    #[test]
    fn missing_only_reports_every_absent_column() {
        let names = headers(&CANONICAL_HEADERS[..11]);
        let errs = reconcile(&names).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("FormFillingPerson"));
        assert!(errs[0].message.contains("Note"));
    }
}
