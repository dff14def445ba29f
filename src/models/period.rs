//! Period tokens and their ordering.
//!
//! Period labels such as `"Januari 2024"` or `"2024-02"` must never be sorted
//! lexicographically. A [`PeriodOrdering`] is built once per table, either
//! from the order tokens first appear in or from a best-effort chronological
//! reading of the labels, and every grouping by period follows it.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How a [`PeriodOrdering`] was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingSource {
    /// Every token was read as a calendar position.
    Chronological,
    /// Tokens kept the order they first appeared in.
    FirstAppearance,
    /// The caller supplied the order.
    Explicit,
}

/// An explicit ordered sequence of distinct period tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodOrdering {
    periods: Vec<String>,
    source: OrderingSource,
}

impl PeriodOrdering {
    /// Use the given order as-is. Duplicate tokens keep their first position.
    pub fn explicit<I, S>(periods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            periods: dedup(periods.into_iter().map(Into::into)),
            source: OrderingSource::Explicit,
        }
    }

    /// Order tokens chronologically when every distinct token can be read as
    /// a calendar position, otherwise fall back to first appearance.
    pub fn infer<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let distinct = dedup(tokens.into_iter().map(Into::into));

        let keys: Option<Vec<PeriodKey>> = distinct.iter().map(|t| parse_period(t)).collect();
        match keys {
            Some(keys) => {
                let mut indexed: Vec<(PeriodKey, usize)> =
                    keys.into_iter().enumerate().map(|(i, k)| (k, i)).collect();
                // Ties (e.g. "Jan 2024" and "2024-01") keep first-appearance order.
                indexed.sort();
                let periods = indexed
                    .into_iter()
                    .map(|(_, i)| distinct[i].clone())
                    .collect();
                Self {
                    periods,
                    source: OrderingSource::Chronological,
                }
            }
            None => {
                if !distinct.is_empty() {
                    warn!(
                        "Period labels are not all calendar-like; ordering {} periods by first appearance",
                        distinct.len()
                    );
                }
                Self {
                    periods: distinct,
                    source: OrderingSource::FirstAppearance,
                }
            }
        }
    }

    pub fn periods(&self) -> &[String] {
        &self.periods
    }

    pub fn source(&self) -> OrderingSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Ordinal position of a token.
    pub fn position(&self, period: &str) -> Option<usize> {
        self.periods.iter().position(|p| p == period)
    }

    pub fn first(&self) -> Option<&str> {
        self.periods.first().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.periods.last().map(String::as_str)
    }

    /// Lookup table from token to ordinal position.
    pub fn index(&self) -> HashMap<&str, usize> {
        self.periods
            .iter()
            .enumerate()
            .map(|(i, p)| (p.as_str(), i))
            .collect()
    }

    /// The inclusive sub-ordering between two known tokens.
    pub fn slice(&self, from: usize, to: usize) -> Self {
        let end = to.min(self.periods.len().saturating_sub(1));
        let periods = if from > end || self.periods.is_empty() {
            Vec::new()
        } else {
            self.periods[from..=end].to_vec()
        };
        Self {
            periods,
            source: self.source,
        }
    }
}

fn dedup(tokens: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in tokens {
        if !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

/// Calendar position of a period label: (year, month, day).
type PeriodKey = (i32, u32, u32);

const MONTHS: &[(&str, u32)] = &[
    ("januari", 1),
    ("january", 1),
    ("jan", 1),
    ("februari", 2),
    ("february", 2),
    ("feb", 2),
    ("pebruari", 2),
    ("maret", 3),
    ("march", 3),
    ("mar", 3),
    ("april", 4),
    ("apr", 4),
    ("mei", 5),
    ("may", 5),
    ("juni", 6),
    ("june", 6),
    ("jun", 6),
    ("juli", 7),
    ("july", 7),
    ("jul", 7),
    ("agustus", 8),
    ("august", 8),
    ("agu", 8),
    ("agt", 8),
    ("aug", 8),
    ("september", 9),
    ("sept", 9),
    ("sep", 9),
    ("oktober", 10),
    ("october", 10),
    ("okt", 10),
    ("oct", 10),
    ("november", 11),
    ("nov", 11),
    ("nopember", 11),
    ("desember", 12),
    ("december", 12),
    ("des", 12),
    ("dec", 12),
];

fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.trim_end_matches('.').to_lowercase();
    MONTHS
        .iter()
        .find(|(n, _)| *n == lower)
        .map(|(_, m)| *m)
}

/// Best-effort reading of a period label as a calendar position.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM`, `YYYY/MM`, `MM/YYYY`, `MM-YYYY`,
/// month names (Indonesian or English, full or abbreviated) with a year in
/// either order, and bare years.
fn parse_period(token: &str) -> Option<PeriodKey> {
    let t = token.trim();
    if t.is_empty() {
        return None;
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(t, fmt) {
            use chrono::Datelike;
            return Some((date.year(), date.month(), date.day()));
        }
    }

    let parts: Vec<&str> = t
        .split(|c: char| c == '-' || c == '/' || c == ' ' || c == '.')
        .filter(|p| !p.is_empty())
        .collect();

    match parts.as_slice() {
        [year] => {
            let year = parse_year(year)?;
            Some((year, 0, 0))
        }
        [a, b] => {
            if let (Some(year), Some(month)) = (parse_year(a), parse_month(b)) {
                return Some((year, month, 0));
            }
            if let (Some(month), Some(year)) = (parse_month(a), parse_year(b)) {
                return Some((year, month, 0));
            }
            None
        }
        _ => None,
    }
}

fn parse_year(s: &str) -> Option<i32> {
    if s.len() != 4 || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_month(s: &str) -> Option<u32> {
    if s.chars().all(|c| c.is_ascii_digit()) {
        return match s.parse::<u32>() {
            Ok(m) if (1..=12).contains(&m) && s.len() <= 2 => Some(m),
            _ => None,
        };
    }
    month_from_name(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_indonesian_months() {
        let ordering = PeriodOrdering::infer(["Maret 2024", "Januari 2024", "Februari 2024"]);
        assert_eq!(
            ordering.periods(),
            &["Januari 2024", "Februari 2024", "Maret 2024"]
        );
        assert_eq!(ordering.source(), OrderingSource::Chronological);
    }

    #[test]
    fn test_infer_across_years() {
        let ordering = PeriodOrdering::infer(["Jan 2025", "Dec 2024", "2024-11"]);
        assert_eq!(ordering.periods(), &["2024-11", "Dec 2024", "Jan 2025"]);
    }

    #[test]
    fn test_infer_is_not_lexicographic() {
        // Lexicographic order would put Februari before Januari.
        let ordering = PeriodOrdering::infer(["Februari 2024", "Januari 2024"]);
        assert_eq!(ordering.periods(), &["Januari 2024", "Februari 2024"]);
    }

    #[test]
    fn test_infer_falls_back_to_first_appearance() {
        let ordering = PeriodOrdering::infer(["Q2", "Q1", "Q2", "Q3"]);
        assert_eq!(ordering.periods(), &["Q2", "Q1", "Q3"]);
        assert_eq!(ordering.source(), OrderingSource::FirstAppearance);
    }

    #[test]
    fn test_explicit_keeps_order() {
        let ordering = PeriodOrdering::explicit(["Maret", "Januari", "Februari", "Maret"]);
        assert_eq!(ordering.periods(), &["Maret", "Januari", "Februari"]);
        assert_eq!(ordering.position("Februari"), Some(2));
        assert_eq!(ordering.position("April"), None);
    }

    #[test]
    fn test_parse_period_formats() {
        assert_eq!(parse_period("2024-01"), Some((2024, 1, 0)));
        assert_eq!(parse_period("01/2024"), Some((2024, 1, 0)));
        assert_eq!(parse_period("2024-01-15"), Some((2024, 1, 15)));
        assert_eq!(parse_period("Agustus 2023"), Some((2023, 8, 0)));
        assert_eq!(parse_period("2023 Sept"), Some((2023, 9, 0)));
        assert_eq!(parse_period("2023"), Some((2023, 0, 0)));
        assert_eq!(parse_period("minggu ke-3"), None);
        assert_eq!(parse_period("2024-13"), None);
    }

    #[test]
    fn test_slice() {
        let ordering = PeriodOrdering::explicit(["a", "b", "c", "d"]);
        assert_eq!(ordering.slice(1, 2).periods(), &["b", "c"]);
        assert!(ordering.slice(3, 1).is_empty());
        assert_eq!(ordering.slice(2, 10).periods(), &["c", "d"]);
    }
}
