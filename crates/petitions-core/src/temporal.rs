//! # Temporal Types — UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only instant truncated to millisecond
//! precision.
//!
//! ## Invariant
//!
//! Every timestamp stored on a petition is UTC. Local offsets would make
//! the "end of day" of a deadline depend on the host that computed it, so
//! non-UTC inputs are rejected by [`Timestamp::parse()`]. Millisecond
//! precision is kept because deadlines end at `23:59:59.999`; anything
//! finer is discarded so that values survive a round trip through
//! PostgreSQL and JSON unchanged.

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;

/// A UTC-only timestamp, truncated to milliseconds.
///
/// # Construction
///
/// - [`Timestamp::now()`] — current UTC time, truncated.
/// - [`Timestamp::from_utc()`] — from a `DateTime<Utc>`, truncating.
/// - [`Timestamp::parse()`] — from an RFC 3339 string, rejecting non-UTC offsets.
///
/// Deserializing accepts any RFC 3339 offset and normalizes to UTC
/// milliseconds, so stored snapshots load with the same precision as
/// freshly computed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time.
    pub fn now() -> Self {
        Self(truncate_to_millis(Utc::now()))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-milliseconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_millis(dt))
    }

    /// Parse a timestamp from an RFC 3339 string.
    ///
    /// Only the `Z` suffix is accepted; explicit offsets, including
    /// `+00:00`, are rejected.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if !s.ends_with('Z') {
            return Err(CoreError::Validation(format!(
                "Timestamp must use Z suffix (UTC only), got: {s:?}"
            )));
        }
        Self::parse_lenient(s)
    }

    /// Parse a timestamp from an RFC 3339 string, accepting any offset and
    /// converting to UTC.
    pub fn parse_lenient(s: &str) -> Result<Self, CoreError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            CoreError::Validation(format!("Invalid RFC 3339 timestamp {s:?}: {e}"))
        })?;
        Ok(Self(truncate_to_millis(dt.with_timezone(&Utc))))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// The calendar date of this instant in UTC.
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// The last representable millisecond of this instant's UTC day.
    pub fn end_of_day(&self) -> Self {
        let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        Self(self.date().and_time(last).and_utc())
    }

    /// Add calendar months, clamping to the last day of shorter months.
    ///
    /// Returns `None` on overflow of the representable range.
    pub fn add_months(&self, months: u32) -> Option<Self> {
        self.0.checked_add_months(Months::new(months)).map(Self)
    }

    /// Subtract calendar months.
    pub fn sub_months(&self, months: u32) -> Option<Self> {
        self.0.checked_sub_months(Months::new(months)).map(Self)
    }

    /// Add a signed duration, truncating the result to milliseconds.
    pub fn checked_add(&self, duration: Duration) -> Option<Self> {
        self.0
            .checked_add_signed(duration)
            .map(|dt| Self(truncate_to_millis(dt)))
    }

    /// Add whole days.
    pub fn add_days(&self, days: i64) -> Option<Self> {
        self.checked_add(Duration::days(days))
    }

    /// Elapsed time from `earlier` to `self`; negative if `earlier` is later.
    pub fn since(&self, earlier: &Timestamp) -> Duration {
        self.0.signed_duration_since(earlier.0)
    }

    /// Render as ISO8601 with milliseconds and Z suffix
    /// (e.g., `2017-10-01T23:59:59.999Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_utc(dt)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        DateTime::<Utc>::deserialize(deserializer).map(Self::from_utc)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn truncate_to_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    let millis = dt.nanosecond() / 1_000_000;
    dt.with_nanosecond(millis * 1_000_000).unwrap_or(dt)
}
