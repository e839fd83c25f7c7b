//! OData-like filter fragments.
//!
//! The search collaborator accepts filters like
//! `timestamp_seconds ge 120 and timestamp_seconds le 180 and video_id eq 'abc'`.
//! String literals are single-quoted with embedded quotes doubled. This
//! module builds such fragments and evaluates them for the in-memory index.

use crate::error::{GlimtError, Result};
use serde_json::Value;

/// Builder for `and`-joined filter clauses.
#[derive(Debug, Default, Clone)]
pub struct FilterBuilder {
    clauses: Vec<String>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `field eq 'value'` with single-quote doubling.
    pub fn eq_str(mut self, field: &str, value: &str) -> Self {
        self.clauses
            .push(format!("{} eq '{}'", field, value.replace('\'', "''")));
        self
    }

    /// `field ge value`.
    pub fn ge(mut self, field: &str, value: f64) -> Self {
        self.clauses.push(format!("{} ge {}", field, value));
        self
    }

    /// `field le value`.
    pub fn le(mut self, field: &str, value: f64) -> Self {
        self.clauses.push(format!("{} le {}", field, value));
        self
    }

    /// Join the clauses with `and`; `None` when no clause was added.
    pub fn build(self) -> Option<String> {
        if self.clauses.is_empty() {
            None
        } else {
            Some(self.clauses.join(" and "))
        }
    }
}

/// Evaluate a filter fragment against a document's fields.
///
/// Supports exactly the grammar [`FilterBuilder`] emits: `eq` with a quoted
/// string, `ge`/`le` with a number, joined by `and`.
pub fn matches(filter: &str, fields: &serde_json::Map<String, Value>) -> Result<bool> {
    for clause in filter.split(" and ") {
        if !clause_matches(clause.trim(), fields)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clause_matches(clause: &str, fields: &serde_json::Map<String, Value>) -> Result<bool> {
    let malformed = || GlimtError::Search(format!("Unsupported filter clause: '{}'", clause));

    let (field, rest) = clause.split_once(' ').ok_or_else(malformed)?;
    let (op, raw_value) = rest.split_once(' ').ok_or_else(malformed)?;
    let value = fields.get(field);

    match op {
        "eq" => {
            let literal = raw_value
                .strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .ok_or_else(malformed)?
                .replace("''", "'");
            Ok(value.and_then(Value::as_str) == Some(literal.as_str()))
        }
        "ge" | "le" => {
            let bound: f64 = raw_value.parse().map_err(|_| malformed())?;
            let actual = match value.and_then(Value::as_f64) {
                Some(actual) => actual,
                None => return Ok(false),
            };
            Ok(if op == "ge" {
                actual >= bound
            } else {
                actual <= bound
            })
        }
        _ => Err(malformed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_builder_output() {
        let filter = FilterBuilder::new()
            .ge("timestamp_seconds", 120.0)
            .le("timestamp_seconds", 180.0)
            .eq_str("video_id", "abc")
            .build()
            .unwrap();
        assert_eq!(
            filter,
            "timestamp_seconds ge 120 and timestamp_seconds le 180 and video_id eq 'abc'"
        );
    }

    #[test]
    fn test_builder_escapes_quotes() {
        let filter = FilterBuilder::new()
            .eq_str("title", "it's a test")
            .build()
            .unwrap();
        assert_eq!(filter, "title eq 'it''s a test'");
    }

    #[test]
    fn test_empty_builder() {
        assert_eq!(FilterBuilder::new().build(), None);
    }

    #[test]
    fn test_matches_round_trip() {
        let fields = doc(json!({"video_id": "it's", "timestamp_seconds": 150.0}));
        let filter = FilterBuilder::new()
            .eq_str("video_id", "it's")
            .ge("timestamp_seconds", 120.0)
            .le("timestamp_seconds", 180.0)
            .build()
            .unwrap();

        assert!(matches(&filter, &fields).unwrap());
        assert!(!matches("video_id eq 'other'", &fields).unwrap());
        assert!(!matches("timestamp_seconds ge 151", &fields).unwrap());
        assert!(!matches("missing eq 'x'", &fields).unwrap());
    }

    #[test]
    fn test_matches_rejects_unknown_operator() {
        let fields = doc(json!({"a": 1}));
        assert!(matches("a gt 0", &fields).is_err());
        assert!(matches("nonsense", &fields).is_err());
    }
}
