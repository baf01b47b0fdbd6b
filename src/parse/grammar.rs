use super::record::LABEL_COLUMNS;
use regex::Regex;
use thiserror::Error;

/// Value shape a field matcher captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `\d+\.\d+`
    Float,
    /// `\d+`
    Integer,
    /// Free text up to the next field's label, non-greedy. Must be
    /// followed by at least one whitespace character before the label.
    Text,
    /// Free text to end of payload, newlines included. Only valid as
    /// the final field.
    Tail,
}

/// One ordered matcher in the extraction grammar.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Literal label as it appears in the log line, without the colon.
    pub label: &'static str,
    /// Normalized column the capture lands in.
    pub column: &'static str,
    pub kind: FieldKind,
}

/// Why a payload failed the grammar. Names the failing field so format
/// drift shows up in debug logs instead of as an opaque drop count.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarMismatch {
    #[error("label '{0}:' not found in field order")]
    MissingLabel(&'static str),

    #[error("value for '{column}' is not a valid {expected}")]
    ValueShape {
        column: &'static str,
        expected: &'static str,
    },

    #[error("numeric value for '{column}' out of range")]
    OutOfRange { column: &'static str },
}

/// A typed capture produced by one field matcher.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureValue {
    Float(f64),
    Integer(i64),
    Text(String),
}

/// The extraction grammar: a fixed sequence of literal labels and
/// typed captures, matched in order over a payload. Kept as ordered
/// field matchers rather than one monolithic regex so a mismatch can
/// say which field failed.
#[derive(Debug)]
pub struct Grammar {
    fields: Vec<FieldSpec>,
    /// `label` plus trailing colon, one per field.
    tokens: Vec<String>,
    float_re: Regex,
    int_re: Regex,
}

impl Grammar {
    /// The slow-query grammar:
    /// `Query_time:<float> Lock_time:<float> Rows_sent:<int>
    /// Rows_examined:<int> Timestamp:<int> User_host:<text>
    /// Query:<tail>`.
    pub fn slow_query() -> Self {
        let kinds = [
            FieldKind::Float,
            FieldKind::Float,
            FieldKind::Integer,
            FieldKind::Integer,
            FieldKind::Integer,
            FieldKind::Text,
            FieldKind::Tail,
        ];
        let fields = LABEL_COLUMNS
            .iter()
            .copied()
            .zip(kinds)
            .map(|((label, column), kind)| FieldSpec { label, column, kind })
            .collect();
        Self::new(fields)
    }

    fn new(fields: Vec<FieldSpec>) -> Self {
        let tokens = fields.iter().map(|f| format!("{}:", f.label)).collect();
        Self {
            fields,
            tokens,
            float_re: Regex::new(r"^\d+\.\d+").expect("static pattern compiles"),
            int_re: Regex::new(r"^\d+").expect("static pattern compiles"),
        }
    }

    /// Match a payload against the full grammar. Any partial match is
    /// a mismatch; there is no recovery within a payload.
    pub fn extract(
        &self,
        payload: &str,
    ) -> Result<Vec<(&'static str, CaptureValue)>, GrammarMismatch> {
        let mut captures = Vec::with_capacity(self.fields.len());
        let mut rest = payload;
        // Set when the previous Text matcher already consumed up to
        // the next label, leaving `rest` positioned exactly on it.
        let mut at_label = false;

        for (i, field) in self.fields.iter().enumerate() {
            let token = self.tokens[i].as_str();

            if i == 0 {
                // The first label may appear anywhere: payloads carry
                // an uninteresting prefix before the counters.
                let found = rest
                    .find(token)
                    .ok_or(GrammarMismatch::MissingLabel(field.label))?;
                rest = &rest[found + token.len()..];
            } else if at_label {
                rest = rest
                    .strip_prefix(token)
                    .ok_or(GrammarMismatch::MissingLabel(field.label))?;
                at_label = false;
            } else {
                // Later labels must follow the previous capture across
                // whitespace only; anything else is out of order.
                let trimmed = rest.trim_start();
                if trimmed.len() == rest.len() {
                    return Err(GrammarMismatch::MissingLabel(field.label));
                }
                rest = trimmed
                    .strip_prefix(token)
                    .ok_or(GrammarMismatch::MissingLabel(field.label))?;
            }

            match field.kind {
                FieldKind::Float => {
                    let m = self.float_re.find(rest).ok_or(GrammarMismatch::ValueShape {
                        column: field.column,
                        expected: "float",
                    })?;
                    let value: f64 =
                        m.as_str()
                            .parse()
                            .map_err(|_| GrammarMismatch::OutOfRange {
                                column: field.column,
                            })?;
                    captures.push((field.column, CaptureValue::Float(value)));
                    rest = &rest[m.end()..];
                }
                FieldKind::Integer => {
                    let m = self.int_re.find(rest).ok_or(GrammarMismatch::ValueShape {
                        column: field.column,
                        expected: "integer",
                    })?;
                    let value: i64 =
                        m.as_str()
                            .parse()
                            .map_err(|_| GrammarMismatch::OutOfRange {
                                column: field.column,
                            })?;
                    captures.push((field.column, CaptureValue::Integer(value)));
                    rest = &rest[m.end()..];
                }
                FieldKind::Text => {
                    let next = self
                        .tokens
                        .get(i + 1)
                        .expect("Text field is never last in the grammar");
                    let found = rest.find(next.as_str()).ok_or(GrammarMismatch::MissingLabel(
                        self.fields[i + 1].label,
                    ))?;
                    let before = &rest[..found];
                    let value = before.trim_end();
                    // The grammar requires whitespace between this
                    // capture and the next label.
                    if value.len() == before.len() {
                        return Err(GrammarMismatch::MissingLabel(self.fields[i + 1].label));
                    }
                    captures.push((field.column, CaptureValue::Text(value.to_string())));
                    rest = &rest[found..];
                    at_label = true;
                }
                FieldKind::Tail => {
                    captures.push((field.column, CaptureValue::Text(rest.to_string())));
                    rest = "";
                }
            }
        }

        Ok(captures)
    }
}
