//! Chain timestamps.
//!
//! The node prints all of these as UTC without an offset, e.g. `2018-06-01T12:00:00.000`.
//! A trailing `Z` is accepted on input.

use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

use crate::error::ParseTimeError;

/// Block timestamps count half-second slots from 2000-01-01T00:00:00Z.
const BLOCK_TIMESTAMP_EPOCH_MS: i64 = 946_684_800_000;
const BLOCK_INTERVAL_MS: i64 = 500;

fn parse_utc(s: &str) -> Result<OffsetDateTime, ParseTimeError> {
    let trimmed = s.strip_suffix('Z').unwrap_or(s);
    PrimitiveDateTime::parse(
        trimmed,
        format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
        ),
    )
    .map(PrimitiveDateTime::assume_utc)
    .map_err(|_| ParseTimeError::InvalidFormat(s.to_string()))
}

fn from_unix_millis(ms: i64) -> Result<OffsetDateTime, fmt::Error> {
    OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000).map_err(|_| fmt::Error)
}

fn write_seconds(f: &mut fmt::Formatter<'_>, dt: OffsetDateTime) -> fmt::Result {
    let s = dt
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]"
        ))
        .map_err(|_| fmt::Error)?;
    f.write_str(&s)
}

fn write_millis(f: &mut fmt::Formatter<'_>, dt: OffsetDateTime) -> fmt::Result {
    let s = dt
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]"
        ))
        .map_err(|_| fmt::Error)?;
    f.write_str(&s)
}

macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let s: String = Deserialize::deserialize(d)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

// ============================================================================
// TimePointSec
// ============================================================================

/// Seconds since the Unix epoch (`time_point_sec`). Used for transaction expiration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TimePointSec(u32);

impl TimePointSec {
    /// Create from seconds since the Unix epoch.
    pub const fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    /// Seconds since the Unix epoch.
    pub const fn as_secs(&self) -> u32 {
        self.0
    }

    /// The current time, truncated to whole seconds.
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc().unix_timestamp().clamp(0, u32::MAX as i64) as u32)
    }

    /// Add seconds, saturating at the maximum representable time.
    pub fn saturating_add(&self, secs: u32) -> Self {
        Self(self.0.saturating_add(secs))
    }
}

impl From<TimePoint> for TimePointSec {
    fn from(tp: TimePoint) -> Self {
        Self(tp.as_micros().div_euclid(1_000_000).clamp(0, u32::MAX as i64) as u32)
    }
}

impl FromStr for TimePointSec {
    type Err = ParseTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let secs = parse_utc(s)?.unix_timestamp();
        u32::try_from(secs)
            .map(Self)
            .map_err(|_| ParseTimeError::OutOfRange(s.to_string()))
    }
}

impl Display for TimePointSec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_seconds(f, from_unix_millis(self.0 as i64 * 1000)?)
    }
}

impl Debug for TimePointSec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimePointSec({})", self)
    }
}

string_serde!(TimePointSec);

// ============================================================================
// TimePoint
// ============================================================================

/// Microseconds since the Unix epoch (`time_point`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TimePoint(i64);

impl TimePoint {
    /// Create from microseconds since the Unix epoch.
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Microseconds since the Unix epoch.
    pub const fn as_micros(&self) -> i64 {
        self.0
    }
}

impl FromStr for TimePoint {
    type Err = ParseTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let nanos = parse_utc(s)?.unix_timestamp_nanos();
        i64::try_from(nanos / 1000)
            .map(Self)
            .map_err(|_| ParseTimeError::OutOfRange(s.to_string()))
    }
}

impl Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dt = OffsetDateTime::UNIX_EPOCH
            .checked_add(Duration::microseconds(self.0))
            .ok_or(fmt::Error)?;
        write_millis(f, dt)
    }
}

impl Debug for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimePoint({})", self)
    }
}

string_serde!(TimePoint);

// ============================================================================
// BlockTimestamp
// ============================================================================

/// Half-second block slot since 2000-01-01 (`block_timestamp_type`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockTimestamp(u32);

impl BlockTimestamp {
    /// Create from a raw slot number.
    pub const fn from_slot(slot: u32) -> Self {
        Self(slot)
    }

    /// The raw slot number.
    pub const fn slot(&self) -> u32 {
        self.0
    }

    fn unix_millis(&self) -> i64 {
        BLOCK_TIMESTAMP_EPOCH_MS + self.0 as i64 * BLOCK_INTERVAL_MS
    }
}

impl FromStr for BlockTimestamp {
    type Err = ParseTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ms = (parse_utc(s)?.unix_timestamp_nanos() / 1_000_000) as i64;
        let slot = (ms - BLOCK_TIMESTAMP_EPOCH_MS).div_euclid(BLOCK_INTERVAL_MS);
        u32::try_from(slot)
            .map(Self)
            .map_err(|_| ParseTimeError::OutOfRange(s.to_string()))
    }
}

impl Display for BlockTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_millis(f, from_unix_millis(self.unix_millis())?)
    }
}

impl Debug for BlockTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockTimestamp({})", self)
    }
}

string_serde!(BlockTimestamp);
