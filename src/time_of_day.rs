use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use sscanf::sscanf;

use crate::errors::PeriodError;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Width of a time-of-day slot in minutes. Always divides the day evenly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Granularity(u32);

impl Granularity {
    pub const HALF_HOUR: Self = Self(30);

    pub fn new(minutes: u32) -> Option<Self> {
        (minutes > 0 && MINUTES_PER_DAY % minutes == 0).then_some(Self(minutes))
    }

    pub fn minutes(self) -> u32 {
        self.0
    }

    pub fn slots_per_day(self) -> usize {
        (MINUTES_PER_DAY / self.0) as usize
    }

    /// Slot holding the given minute, wrapped onto a single day.
    pub fn slot_of(self, min_since_midnight: u32) -> usize {
        ((min_since_midnight % MINUTES_PER_DAY) / self.0) as usize
    }

    /// Canonical "HH:MM" key of a slot's start.
    pub fn slot_key(self, slot: usize) -> String {
        let min_since_midnight = slot as u32 * self.0;
        format!("{:02}:{:02}", min_since_midnight / 60, min_since_midnight % 60)
    }

    fn is_boundary(self, min_since_midnight: u32) -> bool {
        min_since_midnight % self.0 == 0
    }
}

impl Default for Granularity {
    fn default() -> Self {
        Self::HALF_HOUR
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let minutes = s
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("granularity '{}': {}", s, e))?;
        Self::new(minutes).ok_or_else(|| {
            format!("granularity {} minutes does not divide a day evenly", minutes)
        })
    }
}

// "24:00" is only meaningful as the end of a period
fn minutes_since_midnight(hh: u32, mm: u32) -> Option<u32> {
    match (hh, mm) {
        (0..=23, 0..=59) => Some(mm + 60 * hh),
        (24, 0) => Some(MINUTES_PER_DAY),
        _ => None,
    }
}

fn hhmm(min_since_midnight: u32) -> String {
    format!("{:02}:{:02}", min_since_midnight / 60, min_since_midnight % 60)
}

/// A daily period such as "23:00-01:00". An end at or before the start wraps past midnight,
/// except that equal bounds always mean an empty period; a whole day is written "00:00-24:00".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePeriod {
    /// Inclusive, minutes since midnight.
    pub start: u32,
    /// Exclusive, minutes since midnight (1440 for "24:00").
    pub end: u32,
}

impl TimePeriod {
    pub fn duration(self) -> u32 {
        match self.end.cmp(&self.start) {
            Ordering::Greater => self.end - self.start,
            Ordering::Less => self.end + MINUTES_PER_DAY - self.start,
            Ordering::Equal => 0,
        }
    }

    pub fn check_aligned(self, granularity: Granularity) -> Result<(), PeriodError> {
        [self.start, self.end]
            .into_iter()
            .find(|bound| !granularity.is_boundary(*bound))
            .map_or(Ok(()), |bound| {
                Err(PeriodError::Misaligned {
                    bound: hhmm(bound),
                    granularity: granularity.minutes(),
                })
            })
    }

    /// Slots covered by the period, in walking order from the start.
    pub fn slots(self, granularity: Granularity) -> impl Iterator<Item = usize> {
        (self.start..self.start + self.duration())
            .step_by(granularity.minutes() as usize)
            .map(move |m| granularity.slot_of(m))
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", hhmm(self.start), hhmm(self.end))
    }
}

impl FromStr for TimePeriod {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let (sh, sm, eh, em) = sscanf!(compact.as_str(), "{u32}:{u32}-{u32}:{u32}")
            .map_err(|_| PeriodError::Malformed(s.to_string()))?;
        let start = minutes_since_midnight(sh, sm)
            .filter(|m| *m < MINUTES_PER_DAY)
            .ok_or_else(|| PeriodError::OutOfRange(format!("{}:{:02}", sh, sm)))?;
        let end = minutes_since_midnight(eh, em)
            .ok_or_else(|| PeriodError::OutOfRange(format!("{}:{:02}", eh, em)))?;
        Ok(Self { start, end })
    }
}
