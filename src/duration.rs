//! SLA duration parsing and formatting.
//!
//! Uploaded sheets record stage durations in whatever shape the exporting
//! tool produced: `"2 days 03:45:30"`, `"SLA 14:02"`, a fractional day count,
//! or a native timedelta. [`parse_duration`] turns any of them into whole
//! elapsed seconds and [`format_duration`] renders seconds back as an
//! Indonesian phrase (`"2 hari 3 jam 45 menit 30 detik"`).
//!
//! Neither function fails. Anything that cannot be read becomes `None`,
//! and `None` renders as `"-"`.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{DurationValue, RawCell};

pub const SECONDS_PER_DAY: u64 = 86_400;
pub const SECONDS_PER_HOUR: u64 = 3_600;
pub const SECONDS_PER_MINUTE: u64 = 60;

/// Placeholder shown for missing durations.
pub const PLACEHOLDER: &str = "-";

static SLA_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bSLA\b").expect("valid SLA marker pattern"));

// The leading guard keeps "1.5 days" from reading as 5 days.
static DAY_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^\d.])(\d+)\s*(?:DAYS?|HARI)\b").expect("valid day token pattern")
});

// Guarded on both sides so "100:30:00" is not read as a 30-hour tail.
static CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d:])(\d{1,2}):(\d{2})(?::(\d{2}))?\b").expect("valid clock pattern")
});

// Short "<days>h <hours>j" notation written by older versions of the report.
// Only accepted as the whole cell.
static COMPACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?P<days>\d+)\s*H(?:\s*(?P<hours>\d+)\s*J)?|(?P<only_hours>\d+)\s*J)$")
        .expect("valid compact pattern")
});

/// Convert one raw cell into elapsed seconds.
///
/// * `Missing` is `None`, never zero.
/// * A native duration is rounded to the nearest second.
/// * A number is a count of days.
/// * Text is searched for a `<N> day(s)` token and an `H:MM[:SS]` clock;
///   if neither is present the cell is unreadable and yields `None`.
pub fn parse_duration(raw: &RawCell) -> DurationValue {
    match raw {
        RawCell::Missing => None,
        RawCell::Duration(d) => Some(d.as_secs_f64().round() as u64),
        RawCell::Number(days) => days_to_seconds(*days),
        RawCell::Text(s) => parse_text(s),
    }
}

/// Shorthand for parsing a string cell.
pub fn parse_duration_str(s: &str) -> DurationValue {
    parse_duration(&RawCell::text(s))
}

fn days_to_seconds(days: f64) -> DurationValue {
    if !days.is_finite() || days < 0.0 {
        return None;
    }
    let seconds = (days * SECONDS_PER_DAY as f64).round();
    if seconds > u64::MAX as f64 {
        return None;
    }
    Some(seconds as u64)
}

fn parse_text(s: &str) -> DurationValue {
    let upper = s.to_uppercase();
    let normalized = SLA_MARKER.replace_all(&upper, " ");
    let normalized = normalized.trim();
    if normalized.is_empty() {
        return None;
    }

    let day_match = DAY_TOKEN.captures(normalized);
    let days = match &day_match {
        Some(caps) => Some(caps[1].parse::<u64>().ok()?),
        None => None,
    };

    // The clock may sit anywhere, but never inside the day token itself.
    let rest = match &day_match {
        Some(caps) => {
            let m = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
            format!("{} {}", &normalized[..m.start], &normalized[m.end..])
        }
        None => normalized.to_string(),
    };
    let clock = CLOCK.captures(&rest).and_then(|caps| {
        let hours = caps[1].parse::<u64>().ok()?;
        let minutes = caps[2].parse::<u64>().ok()?;
        let seconds = match caps.get(3) {
            Some(s) => s.as_str().parse::<u64>().ok()?,
            None => 0,
        };
        Some(hours * SECONDS_PER_HOUR + minutes * SECONDS_PER_MINUTE + seconds)
    });

    match (days, clock) {
        (None, None) => parse_compact(normalized),
        (days, clock) => days
            .unwrap_or(0)
            .checked_mul(SECONDS_PER_DAY)?
            .checked_add(clock.unwrap_or(0)),
    }
}

fn parse_compact(s: &str) -> DurationValue {
    let caps = COMPACT.captures(s)?;
    let number = |name: &str| -> Option<u64> {
        match caps.name(name) {
            Some(m) => m.as_str().parse::<u64>().ok(),
            None => Some(0),
        }
    };
    let days = number("days")?;
    let hours = number("hours")?.checked_add(number("only_hours")?)?;
    days.checked_mul(SECONDS_PER_DAY)?
        .checked_add(hours.checked_mul(SECONDS_PER_HOUR)?)
}

/// Whole-second breakdown of a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Parts {
    days: u64,
    hours: u64,
    minutes: u64,
    seconds: u64,
}

impl Parts {
    fn of(total: u64) -> Self {
        Self {
            days: total / SECONDS_PER_DAY,
            hours: (total % SECONDS_PER_DAY) / SECONDS_PER_HOUR,
            minutes: (total % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE,
            seconds: total % SECONDS_PER_MINUTE,
        }
    }
}

fn whole_seconds(seconds: Option<f64>) -> Option<u64> {
    let s = seconds?;
    if s.is_nan() {
        return None;
    }
    Some(s.max(0.0).floor() as u64)
}

/// Render elapsed seconds as `"<d> hari <h> jam <m> menit <s> detik"`.
///
/// Leading zero units are dropped, but once a unit is shown every smaller
/// unit down to seconds is shown too. `None` and NaN render as `"-"`.
pub fn format_duration(seconds: Option<f64>) -> String {
    let Some(total) = whole_seconds(seconds) else {
        return PLACEHOLDER.to_string();
    };
    let p = Parts::of(total);

    let show_days = p.days > 0;
    let show_hours = p.hours > 0 || show_days;
    let show_minutes = p.minutes > 0 || show_hours;

    let mut words = Vec::with_capacity(4);
    if show_days {
        words.push(format!("{} hari", p.days));
    }
    if show_hours {
        words.push(format!("{} jam", p.hours));
    }
    if show_minutes {
        words.push(format!("{} menit", p.minutes));
    }
    words.push(format!("{} detik", p.seconds));
    words.join(" ")
}

/// [`format_duration`] for a parsed cell.
pub fn format_duration_value(value: DurationValue) -> String {
    format_duration(value.map(|s| s as f64))
}

/// Short `"<d>h <h>j"` form used in compact tables; drops minutes and seconds.
pub fn format_compact(seconds: Option<f64>) -> String {
    let Some(total) = whole_seconds(seconds) else {
        return PLACEHOLDER.to_string();
    };
    let p = Parts::of(total);
    if p.days > 0 {
        format!("{}h {}j", p.days, p.hours)
    } else {
        format!("{}j", p.hours)
    }
}

/// Canonical clock string (`"H:MM:SS"`, with a `"<d> days "` prefix when at
/// least a day has elapsed). [`parse_duration`] reads it back exactly.
pub fn format_clock(seconds: u64) -> String {
    let p = Parts::of(seconds);
    if p.days > 0 {
        format!(
            "{} days {:02}:{:02}:{:02}",
            p.days, p.hours, p.minutes, p.seconds
        )
    } else {
        format!("{}:{:02}:{:02}", p.hours, p.minutes, p.seconds)
    }
}

/// Convert a mean in seconds to days for charts and KPI cards.
pub fn seconds_to_days(seconds: Option<f64>) -> Option<f64> {
    seconds
        .filter(|s| !s.is_nan())
        .map(|s| s / SECONDS_PER_DAY as f64)
}
