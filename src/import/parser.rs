use crate::error::PortalError;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
    /// Data records skipped because their field count did not match the header.
    pub rows_dropped: usize,
}

/// `" Member  Name "` -> `"member_name"`.
pub fn normalize_header(h: &str) -> String {
    h.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

pub fn parse_csv(text: &str) -> Result<ParsedCsv, PortalError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut parsed = ParsedCsv::default();
    let mut have_header = false;
    for record in reader.records() {
        let record = record.map_err(|e| PortalError::validation(format!("invalid CSV: {e}")))?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        if !have_header {
            parsed.headers = record.iter().map(normalize_header).collect();
            have_header = true;
            continue;
        }
        if record.len() != parsed.headers.len() {
            parsed.rows_dropped += 1;
            continue;
        }
        let row = parsed
            .headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect::<HashMap<_, _>>();
        parsed.rows.push(row);
    }
    Ok(parsed)
}
