use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Timelike, Utc};
use rust_decimal::Decimal;

use sscanf::sscanf;

use crate::errors::UsageFormatError;
use crate::numeric::parse_decimal;

pub const DATE_TIME: &str = "dateTime";
pub const KWH: &str = "kWh";

// Tried in order after RFC 3339 and any configured format. `%.f` also matches no fraction.
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M%:z",
];

const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M",
];

/// A usage record as read from file, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawUsageRow {
    pub date_time: Option<String>,
    pub kwh: Option<String>,
}

#[cfg(test)]
impl RawUsageRow {
    pub fn new(date_time: &str, kwh: &str) -> Self {
        Self {
            date_time: Some(date_time.to_string()),
            kwh: Some(kwh.to_string()),
        }
    }
}

/// How timestamps are read: an optional explicit format, then the built-in ones.
/// Timestamps without an offset are placed in `default_offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampPolicy {
    pub default_offset: FixedOffset,
    pub format: Option<String>,
}

impl Default for TimestampPolicy {
    fn default() -> Self {
        Self {
            default_offset: Utc.fix(),
            format: None,
        }
    }
}

/// Parse a UTC offset such as "+01:00", "-05:30" or "Z".
pub fn parse_utc_offset(s: &str) -> Result<FixedOffset, String> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") {
        return Ok(Utc.fix());
    }
    let (sign, hh, mm) = sscanf!(s, "{char}{u32}:{u32}")
        .map_err(|_| format!("'{}' is not an offset of the form +HH:MM", s))?;
    let seconds = match (hh, mm) {
        (0..=23, 0..=59) => (mm * 60 + hh * 3600) as i32,
        _ => return Err(format!("offset '{}' is out of range", s)),
    };
    match sign {
        '+' => FixedOffset::east_opt(seconds),
        '-' => FixedOffset::west_opt(seconds),
        _ => None,
    }
    .ok_or_else(|| format!("'{}' is not an offset of the form +HH:MM", s))
}

impl TimestampPolicy {
    pub fn parse(&self, text: &str) -> Option<DateTime<FixedOffset>> {
        let text = text.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
            return Some(ts);
        }
        // a trailing "Z" is read as "+00:00"
        let zoned = match text.strip_suffix('Z').or_else(|| text.strip_suffix('z')) {
            Some(rest) => format!("{}+00:00", rest),
            None => text.to_string(),
        };
        if let Some(ts) = self
            .format
            .as_deref()
            .into_iter()
            .chain(OFFSET_FORMATS)
            .find_map(|fmt| DateTime::parse_from_str(&zoned, fmt).ok())
        {
            return Some(ts);
        }
        self.format
            .as_deref()
            .into_iter()
            .chain(NAIVE_FORMATS)
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .and_then(|naive| self.default_offset.from_local_datetime(&naive).single())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSample {
    pub row: usize, // 1-based position in the raw input
    pub timestamp: DateTime<FixedOffset>,
    pub consumption: Decimal, // kWh, never negative
}

impl UsageSample {
    /// Wall-clock minute of the day in the sample's own offset.
    pub fn minute_of_day(&self) -> u32 {
        self.timestamp.minute() + 60 * self.timestamp.hour()
    }
}

/// Usage samples in strictly increasing timestamp order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageSeries {
    samples: Vec<UsageSample>,
}

impl UsageSeries {
    pub fn iter(&self) -> impl Iterator<Item = &UsageSample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of distinct calendar days, in each sample's own offset.
    pub fn days(&self) -> usize {
        self.samples
            .iter()
            .map(|s| s.timestamp.date_naive())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

fn present(field: Option<&str>) -> Option<&str> {
    field.map(str::trim).filter(|s| !s.is_empty())
}

fn normalize_row(
    row: usize,
    raw: &RawUsageRow,
    policy: &TimestampPolicy,
) -> Result<UsageSample, UsageFormatError> {
    let invalid = |field: &'static str, reason: String| UsageFormatError { row, field, reason };

    let date_time = present(raw.date_time.as_deref())
        .ok_or_else(|| invalid(DATE_TIME, "missing".to_string()))?;
    let timestamp = policy
        .parse(date_time)
        .ok_or_else(|| invalid(DATE_TIME, format!("'{}' is not a recognised timestamp", date_time)))?;

    let kwh = present(raw.kwh.as_deref()).ok_or_else(|| invalid(KWH, "missing".to_string()))?;
    let consumption =
        parse_decimal(kwh).ok_or_else(|| invalid(KWH, format!("'{}' is not a number", kwh)))?;
    if consumption < Decimal::ZERO {
        return Err(invalid(KWH, format!("consumption {} is negative", consumption)));
    }

    Ok(UsageSample {
        row,
        timestamp,
        consumption,
    })
}

/// Validate raw usage rows into a time-ordered series.
///
/// Rows may arrive in any order. Two rows for the same instant are rejected, the error
/// pointing at the later row.
pub fn normalize_usage(
    rows: &[RawUsageRow],
    policy: &TimestampPolicy,
) -> Result<UsageSeries, UsageFormatError> {
    let mut samples = rows
        .iter()
        .enumerate()
        .map(|(i, raw)| normalize_row(i + 1, raw, policy))
        .collect::<Result<Vec<_>, _>>()?;
    samples.sort_by_key(|s| (s.timestamp, s.row));

    if let Some(pair) = samples.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
        return Err(UsageFormatError {
            row: pair[1].row,
            field: DATE_TIME,
            reason: format!("duplicates the timestamp of row {}", pair[0].row),
        });
    }
    Ok(UsageSeries { samples })
}
