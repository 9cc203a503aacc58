//! Reading raw records out of JSON documents.
//!
//! Two layouts are accepted: a single JSON array of records, or JSON lines
//! (one record per line, blank lines ignored). A record that is not a JSON
//! object of the expected shape is counted as unparseable rather than
//! failing the whole input.

use tally_types::RawRecord;
use tracing::debug;

/// Errors that make an input document unusable as a whole.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// The document looked like a JSON array but was not valid JSON.
    #[error("invalid JSON array document: {source}")]
    Document {
        /// The underlying parse error.
        #[from]
        source: serde_json::Error,
    },
}

/// Records read from a document plus the count of entries that failed to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedInput {
    /// Records in arrival order.
    pub records: Vec<RawRecord>,
    /// Entries that were not valid records.
    pub unparseable: u64,
}

/// Parse a JSON array or JSON-lines document into raw records.
///
/// # Errors
///
/// Returns [`InputError::Document`] if the text starts with `[` but is not
/// a valid JSON array. Individual malformed entries never fail the call.
pub fn parse_records(text: &str) -> Result<ParsedInput, InputError> {
    let trimmed = text.trim_start();
    let mut parsed = ParsedInput::default();

    if trimmed.starts_with('[') {
        let values: Vec<serde_json::Value> = serde_json::from_str(trimmed)?;
        for value in values {
            match serde_json::from_value::<RawRecord>(value) {
                Ok(record) => parsed.records.push(record),
                Err(_) => parsed.unparseable = parsed.unparseable.saturating_add(1),
            }
        }
    } else {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawRecord>(line) {
                Ok(record) => parsed.records.push(record),
                Err(_) => parsed.unparseable = parsed.unparseable.saturating_add(1),
            }
        }
    }

    debug!(
        records = parsed.records.len(),
        unparseable = parsed.unparseable,
        "Parsed raw input"
    );
    Ok(parsed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_array() {
        let text = r#"[
            {"timestamp": 1, "type": "cast", "source_id": 1, "ability_id": 2},
            "not a record",
            {"timestamp": 2, "type": "death", "target_id": 1}
        ]"#;
        let parsed = parse_records(text).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.unparseable, 1);
    }

    #[test]
    fn parses_json_lines_and_counts_garbage() {
        let text = "{\"timestamp\": 1, \"type\": \"cast\"}\n\n{oops\n{\"timestamp\": 3}\n";
        let parsed = parse_records(text).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.unparseable, 1);
    }

    #[test]
    fn broken_array_is_a_document_error() {
        assert!(matches!(
            parse_records("[{\"timestamp\": 1}"),
            Err(InputError::Document { .. })
        ));
    }
}
