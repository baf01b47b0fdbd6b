use super::grammar::CaptureValue;
use serde::{Deserialize, Serialize};

/// Static mapping from the raw slow-log labels to the normalized
/// column names the warehouse table uses. The label set is fixed; a
/// source format change means extending this table, not patching
/// call sites.
pub const LABEL_COLUMNS: [(&str, &str); 7] = [
    ("Query_time", "query_time"),
    ("Lock_time", "lock_time"),
    ("Rows_sent", "rows_sent"),
    ("Rows_examined", "rows_examined"),
    ("Timestamp", "timestamp"),
    ("User_host", "user_host"),
    ("Query", "query"),
];

/// Normalized column names, in load order.
pub const COLUMNS: [&str; 7] = [
    "query_time",
    "lock_time",
    "rows_sent",
    "rows_examined",
    "timestamp",
    "user_host",
    "query",
];

/// One decoded element of the exported log object. Only the free-text
/// payload matters; the export's other metadata fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLogEntry {
    #[serde(rename = "textPayload")]
    pub text_payload: Option<String>,
}

/// The normalized unit of output. Field names are exactly the column
/// vocabulary the warehouse schema declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowQueryRecord {
    /// Wall time of the query, seconds.
    pub query_time: f64,
    /// Time spent waiting on locks, seconds.
    pub lock_time: f64,
    /// Rows returned to the client.
    pub rows_sent: i64,
    /// Rows scanned by the engine.
    pub rows_examined: i64,
    /// Query completion time, epoch seconds.
    pub timestamp: i64,
    /// Client identity string, free-form.
    pub user_host: String,
    /// Raw SQL text; may contain newlines and delimiters.
    pub query: String,
}

impl SlowQueryRecord {
    /// Assemble a record from grammar captures. Returns `None` if the
    /// captures do not cover every column with the expected type; the
    /// caller treats that as a dropped entry.
    pub(crate) fn from_captures(captures: &[(&'static str, CaptureValue)]) -> Option<Self> {
        fn float(captures: &[(&'static str, CaptureValue)], column: &str) -> Option<f64> {
            captures.iter().find(|(c, _)| *c == column).and_then(|(_, v)| match v {
                CaptureValue::Float(f) => Some(*f),
                _ => None,
            })
        }
        fn integer(captures: &[(&'static str, CaptureValue)], column: &str) -> Option<i64> {
            captures.iter().find(|(c, _)| *c == column).and_then(|(_, v)| match v {
                CaptureValue::Integer(i) => Some(*i),
                _ => None,
            })
        }
        fn text(captures: &[(&'static str, CaptureValue)], column: &str) -> Option<String> {
            captures.iter().find(|(c, _)| *c == column).and_then(|(_, v)| match v {
                CaptureValue::Text(t) => Some(t.clone()),
                _ => None,
            })
        }

        Some(Self {
            query_time: float(captures, "query_time")?,
            lock_time: float(captures, "lock_time")?,
            rows_sent: integer(captures, "rows_sent")?,
            rows_examined: integer(captures, "rows_examined")?,
            timestamp: integer(captures, "timestamp")?,
            user_host: text(captures, "user_host")?,
            query: text(captures, "query")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_columns_cover_all_columns() {
        for ((_, renamed), column) in LABEL_COLUMNS.iter().zip(COLUMNS.iter()) {
            assert_eq!(renamed, column);
        }
    }

    #[test]
    fn test_raw_entry_ignores_unrelated_metadata() {
        let entry: RawLogEntry = serde_json::from_str(
            r#"{"insertId":"abc","logName":"x","textPayload":"hello","severity":"INFO"}"#,
        )
        .unwrap();
        assert_eq!(entry.text_payload.as_deref(), Some("hello"));
    }

    #[test]
    fn test_raw_entry_without_payload() {
        let entry: RawLogEntry = serde_json::from_str(r#"{"insertId":"abc"}"#).unwrap();
        assert!(entry.text_payload.is_none());
    }
}
