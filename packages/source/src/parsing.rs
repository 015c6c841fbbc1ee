//! Shared value parsing for Socrata payloads.

use chrono::NaiveDateTime;

/// Socrata `floating_timestamp` output format.
pub const SOCRATA_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Parses a Socrata datetime string (ISO 8601 with optional fractional
/// seconds, or a bare date).
#[must_use]
pub fn parse_socrata_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive);
    }
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
}

/// Converts a JSON value into the text stored in a snapshot cell.
///
/// Strings are kept verbatim (numeric-looking strings stay strings),
/// numbers and booleans use their JSON text, nested values are serialized
/// compactly, and `null` becomes `None`.
#[must_use]
pub fn cell_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
            Some(other.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_socrata_date_with_fractional() {
        let dt = parse_socrata_date("2024-01-15T14:30:00.000").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:30:00");
    }

    #[test]
    fn parses_bare_date() {
        let dt = parse_socrata_date("2024-01-15").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 00:00:00");
    }

    #[test]
    fn rejects_invalid_date() {
        assert!(parse_socrata_date("not-a-date").is_none());
    }

    #[test]
    fn keeps_numeric_strings_as_text() {
        assert_eq!(
            cell_text(&serde_json::json!("40.7128")).as_deref(),
            Some("40.7128")
        );
        assert_eq!(cell_text(&serde_json::json!(42)).as_deref(), Some("42"));
        assert_eq!(cell_text(&serde_json::json!(null)), None);
        assert_eq!(
            cell_text(&serde_json::json!({"a": 1})).as_deref(),
            Some(r#"{"a":1}"#)
        );
    }
}
