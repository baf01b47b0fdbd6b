pub mod grammar;
pub mod record;

pub use grammar::{Grammar, GrammarMismatch};
pub use record::{RawLogEntry, SlowQueryRecord, COLUMNS, LABEL_COLUMNS};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("log object is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("log object is not a JSON entry sequence: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Per-run accounting of decoded entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseSummary {
    /// Entries decoded from the object, in any state.
    pub entries_seen: usize,
    /// Entries with an absent or empty payload, filtered before
    /// grammar matching.
    pub no_payload: usize,
    /// Entries whose payload failed the grammar, plus undecodable
    /// NDJSON lines. Expected operational noise, never an error.
    pub dropped: usize,
}

/// Parses a raw log object into slow-query records.
///
/// Accepts the export's two shapes: newline-delimited JSON (each line
/// decoded independently; a bad line is a counted drop) or one
/// top-level JSON array. An object that is neither is a fatal decode
/// error so operators can tell "format changed" from per-record noise.
pub struct RecordParser {
    grammar: Grammar,
}

impl RecordParser {
    pub fn new() -> Self {
        Self {
            grammar: Grammar::slow_query(),
        }
    }

    /// Extract every payload that matches the grammar, preserving
    /// entry order.
    pub fn parse(&self, bytes: &[u8]) -> Result<(Vec<SlowQueryRecord>, ParseSummary), ParseError> {
        let text = std::str::from_utf8(bytes)?;
        let mut records = Vec::new();
        let mut summary = ParseSummary::default();

        if text.trim_start().starts_with('[') {
            let entries: Vec<RawLogEntry> = serde_json::from_str(text.trim_start())?;
            for entry in entries {
                self.consume(entry, &mut records, &mut summary);
            }
        } else {
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<RawLogEntry>(line) {
                    Ok(entry) => self.consume(entry, &mut records, &mut summary),
                    Err(err) => {
                        summary.entries_seen += 1;
                        summary.dropped += 1;
                        debug!(error = %err, "undecodable log entry dropped");
                    }
                }
            }
        }

        Ok((records, summary))
    }

    fn consume(
        &self,
        entry: RawLogEntry,
        records: &mut Vec<SlowQueryRecord>,
        summary: &mut ParseSummary,
    ) {
        summary.entries_seen += 1;

        let payload = match entry.text_payload {
            Some(payload) if !payload.is_empty() => payload,
            _ => {
                summary.no_payload += 1;
                return;
            }
        };

        match self.grammar.extract(&payload) {
            Ok(captures) => match SlowQueryRecord::from_captures(&captures) {
                Some(record) => records.push(record),
                None => {
                    summary.dropped += 1;
                    debug!("captures did not assemble into a record");
                }
            },
            Err(mismatch) => {
                summary.dropped += 1;
                debug!(mismatch = %mismatch, "payload failed extraction grammar");
            }
        }
    }
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATCHING_PAYLOAD: &str = "Query_time:0.500000 Lock_time:0.000000 Rows_sent:1 \
        Rows_examined:10 Timestamp:1700000000 User_host:app[app] @ [10.0.0.1] Query:SELECT 1;";

    fn entry_line(payload: &str) -> String {
        serde_json::to_string(&serde_json::json!({ "textPayload": payload })).unwrap()
    }

    #[test]
    fn test_matching_payload_parses_to_typed_record() {
        let parser = RecordParser::new();
        let object = entry_line(MATCHING_PAYLOAD);
        let (records, summary) = parser.parse(object.as_bytes()).unwrap();

        assert_eq!(summary.entries_seen, 1);
        assert_eq!(summary.dropped, 0);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.query_time, 0.5);
        assert_eq!(record.lock_time, 0.0);
        assert_eq!(record.rows_sent, 1);
        assert_eq!(record.rows_examined, 10);
        assert_eq!(record.timestamp, 1700000000);
        assert_eq!(record.user_host, "app[app] @ [10.0.0.1]");
        assert_eq!(record.query, "SELECT 1;");
    }

    #[test]
    fn test_three_entries_two_match_one_malformed() {
        let parser = RecordParser::new();
        let object = format!(
            "{}\n{}\n{}\n",
            entry_line(MATCHING_PAYLOAD),
            entry_line("Lock_time:0.1 something entirely different"),
            entry_line(MATCHING_PAYLOAD),
        );
        let (records, summary) = parser.parse(object.as_bytes()).unwrap();

        assert_eq!(summary.entries_seen, 3);
        assert_eq!(summary.dropped, 1);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_missing_payload_filtered_not_dropped() {
        let parser = RecordParser::new();
        let object = format!(
            "{}\n{}\n{}\n",
            r#"{"insertId":"a"}"#,
            r#"{"textPayload":""}"#,
            entry_line(MATCHING_PAYLOAD),
        );
        let (records, summary) = parser.parse(object.as_bytes()).unwrap();

        assert_eq!(summary.entries_seen, 3);
        assert_eq!(summary.no_payload, 2);
        assert_eq!(summary.dropped, 0);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_undecodable_line_is_counted_drop() {
        let parser = RecordParser::new();
        let object = format!("not json at all\n{}\n", entry_line(MATCHING_PAYLOAD));
        let (records, summary) = parser.parse(object.as_bytes()).unwrap();

        assert_eq!(summary.entries_seen, 2);
        assert_eq!(summary.dropped, 1);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_array_form_is_accepted() {
        let parser = RecordParser::new();
        let object = format!(
            r#"[{{"textPayload":{}}}, {{"insertId":"b"}}]"#,
            serde_json::to_string(MATCHING_PAYLOAD).unwrap()
        );
        let (records, summary) = parser.parse(object.as_bytes()).unwrap();

        assert_eq!(summary.entries_seen, 2);
        assert_eq!(summary.no_payload, 1);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_undecodable_array_is_fatal() {
        let parser = RecordParser::new();
        let result = parser.parse(b"[{\"textPayload\": ");
        assert!(matches!(result, Err(ParseError::Decode(_))));
    }

    #[test]
    fn test_non_utf8_object_is_fatal() {
        let parser = RecordParser::new();
        let result = parser.parse(&[0xff, 0xfe, 0x00]);
        assert!(matches!(result, Err(ParseError::Utf8(_))));
    }

    #[test]
    fn test_order_is_preserved() {
        let parser = RecordParser::new();
        let first = MATCHING_PAYLOAD.to_string();
        let second = MATCHING_PAYLOAD.replace("Rows_sent:1", "Rows_sent:2");
        let third = MATCHING_PAYLOAD.replace("Rows_sent:1", "Rows_sent:3");
        let object = format!(
            "{}\n{}\n{}\n",
            entry_line(&first),
            entry_line(&second),
            entry_line(&third)
        );
        let (records, _) = parser.parse(object.as_bytes()).unwrap();
        let sent: Vec<i64> = records.iter().map(|r| r.rows_sent).collect();
        assert_eq!(sent, vec![1, 2, 3]);
    }
}
