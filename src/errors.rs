use thiserror::Error;

/// Error depicting a time period string that cannot be used as a tariff period
///
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodError {
    #[error("'{0}' is not of the form HH:MM-HH:MM")]
    Malformed(String),
    #[error("time of day {0} is out of range")]
    OutOfRange(String),
    #[error("{bound} is not on a {granularity}-minute slot boundary")]
    Misaligned { bound: String, granularity: u32 },
}

/// Error depicting a tariff definition with a missing or malformed field
///
/// `field` is a dotted path into the tariff, e.g. `rates.peak.time_periods[1]`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tariff field '{field}': {reason}")]
pub struct TariffFormatError {
    pub field: String,
    pub reason: String,
}

/// Error depicting two rate bands claiming the same time-of-day slot
///
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rate bands '{first}' and '{second}' both claim slot {slot}")]
pub struct TariffConflictError {
    pub slot: String,
    pub first: String,
    pub second: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TariffError {
    #[error(transparent)]
    Format(#[from] TariffFormatError),
    #[error(transparent)]
    Conflict(#[from] TariffConflictError),
}

/// Error depicting a usage row that cannot become a usage sample
///
/// `row` is the 1-based position of the record in the usage input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("usage row {row}, field '{field}': {reason}")]
pub struct UsageFormatError {
    pub row: usize,
    pub field: &'static str,
    pub reason: String,
}

/// Error depicting a usage sample whose time-of-day slot has no rate in the tariff
///
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("usage row {row} at {timestamp}: no tariff rate covers slot {slot}")]
pub struct RateLookupError {
    pub row: usize,
    pub timestamp: String,
    pub slot: String,
}

/// Error depicting a cost estimate that cannot be completed
///
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimateError {
    #[error(transparent)]
    RateLookup(#[from] RateLookupError),
    #[error("usage row {row}: cost exceeds the decimal range")]
    Overflow { row: usize },
    #[error("standing charge over {days} days exceeds the decimal range")]
    StandingChargeOverflow { days: usize },
}
