//! Raw spreadsheet cells.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A single cell as it arrives from an uploaded table.
///
/// Uploaded spreadsheets mix text, numbers and native durations in the same
/// column, so every cell is carried as one of these variants until the
/// ingest step decides what it means.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum RawCell {
    #[default]
    Missing,
    Number(f64),
    Duration(Duration),
    Text(String),
}

impl RawCell {
    /// Build a cell from text, treating blank strings as missing.
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.trim().is_empty() {
            RawCell::Missing
        } else {
            RawCell::Text(s)
        }
    }

    /// Build a cell from text the way a spreadsheet would type it:
    /// numeric-looking text becomes a number.
    pub fn infer(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return RawCell::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => RawCell::Number(n),
            _ => RawCell::Text(s.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawCell::Missing)
    }

    /// Render the cell as a categorical label (period, vendor, transaction type).
    ///
    /// Integral numbers drop their fractional part so a year typed as `2024`
    /// does not become `"2024.0"`.
    pub fn label(&self) -> Option<String> {
        match self {
            RawCell::Missing => None,
            RawCell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            RawCell::Number(n) if !n.is_finite() => None,
            RawCell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Some(format!("{}", *n as i64))
            }
            RawCell::Number(n) => Some(n.to_string()),
            RawCell::Duration(d) => Some(format!("{}s", d.as_secs())),
        }
    }
}

impl From<&str> for RawCell {
    fn from(s: &str) -> Self {
        RawCell::text(s)
    }
}

impl From<String> for RawCell {
    fn from(s: String) -> Self {
        RawCell::text(s)
    }
}

impl From<f64> for RawCell {
    fn from(n: f64) -> Self {
        RawCell::Number(n)
    }
}

impl From<Duration> for RawCell {
    fn from(d: Duration) -> Self {
        RawCell::Duration(d)
    }
}

impl<T: Into<RawCell>> From<Option<T>> for RawCell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawCell::Missing)
    }
}

impl From<&serde_json::Value> for RawCell {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RawCell::Missing,
            serde_json::Value::Number(n) => n.as_f64().map(RawCell::Number).unwrap_or_default(),
            serde_json::Value::String(s) => RawCell::text(s.as_str()),
            serde_json::Value::Bool(b) => RawCell::Text(b.to_string()),
            other => RawCell::Text(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_is_missing() {
        assert_eq!(RawCell::text("   "), RawCell::Missing);
        assert_eq!(RawCell::text(""), RawCell::Missing);
        assert_eq!(RawCell::text("14:02"), RawCell::Text("14:02".to_string()));
    }

    #[test]
    fn test_infer_numbers() {
        assert_eq!(RawCell::infer("1.5"), RawCell::Number(1.5));
        assert_eq!(RawCell::infer(" 2 "), RawCell::Number(2.0));
        assert_eq!(
            RawCell::infer("2 days 03:45:30"),
            RawCell::Text("2 days 03:45:30".to_string())
        );
        assert_eq!(RawCell::infer(""), RawCell::Missing);
    }

    #[test]
    fn test_label() {
        assert_eq!(RawCell::Number(2024.0).label().as_deref(), Some("2024"));
        assert_eq!(RawCell::Number(1.5).label().as_deref(), Some("1.5"));
        assert_eq!(
            RawCell::Text("  PT Maju  ".to_string()).label().as_deref(),
            Some("PT Maju")
        );
        assert_eq!(RawCell::Missing.label(), None);
        assert_eq!(RawCell::Number(f64::NAN).label(), None);
    }

    #[test]
    fn test_from_json_value() {
        assert_eq!(RawCell::from(&serde_json::json!(null)), RawCell::Missing);
        assert_eq!(RawCell::from(&serde_json::json!(0.5)), RawCell::Number(0.5));
        assert_eq!(
            RawCell::from(&serde_json::json!("SLA 14:02")),
            RawCell::Text("SLA 14:02".to_string())
        );
        assert_eq!(RawCell::from(&serde_json::json!("")), RawCell::Missing);
    }

    #[test]
    fn test_from_option() {
        assert_eq!(RawCell::from(None::<f64>), RawCell::Missing);
        assert_eq!(RawCell::from(Some(3.0)), RawCell::Number(3.0));
    }
}
