//! Resolution of naive export timestamps into zone-aware instants.
//!
//! Meter exports carry wall-clock times (`YYYY-MM-DD HH:MM:SS`) without an
//! offset. They are interpreted in a configured IANA zone. Around DST changes a
//! wall time can occur twice (fall back) or not at all (spring forward); the
//! [`DstPolicy`] decides what happens then.

use chrono::{offset::LocalResult, DateTime, NaiveDate, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use serde::Deserialize;
use time::{macros::format_description, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Upper bound on how far a nonexistent wall time is searched around.
const MAX_SHIFT_MINUTES: u32 = 120;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Error on ambiguous and nonexistent wall times.
    Strict,
    /// Ambiguous wall times take the earlier instant; gaps are errors.
    PreferEarliest,
    /// Ambiguous wall times take the later instant; gaps are errors.
    PreferLatest,
    /// Gaps move forward minute by minute to the first valid instant;
    /// ambiguous wall times are errors.
    ShiftForward,
    /// Earliest instant for ambiguous wall times. Gap wall times keep the
    /// offset in force before the transition, so 02:30 in a one hour gap
    /// lands on 03:30 of the new offset.
    #[default]
    Lenient,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ZoneError {
    #[error("unknown time zone '{0}'")]
    UnknownZone(String),
    #[error("invalid timestamp '{0}', expected YYYY-MM-DD HH:MM:SS")]
    Format(String),
    #[error("ambiguous local time {0}")]
    Ambiguous(String),
    #[error("nonexistent local time {0}")]
    Nonexistent(String),
    #[error("timestamp out of range: {0}")]
    OutOfRange(String),
}

/// An IANA zone plus the policy used for DST edge cases.
#[derive(Debug, Clone, Copy)]
pub struct LocalZone {
    tz: Tz,
    policy: DstPolicy,
}

impl LocalZone {
    pub fn new(name: &str, policy: DstPolicy) -> Result<Self, ZoneError> {
        let tz = name
            .parse::<Tz>()
            .map_err(|_| ZoneError::UnknownZone(name.to_string()))?;
        Ok(Self { tz, policy })
    }

    pub fn utc() -> Self {
        Self {
            tz: Tz::UTC,
            policy: DstPolicy::Strict,
        }
    }

    /// Parse an export timestamp and attach this zone's offset.
    pub fn parse_local(&self, s: &str) -> Result<OffsetDateTime, ZoneError> {
        let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        let trimmed = s.trim();
        let naive = PrimitiveDateTime::parse(trimmed, format)
            .map_err(|_| ZoneError::Format(trimmed.to_string()))?;
        self.resolve(naive)
    }

    pub fn resolve(&self, naive: PrimitiveDateTime) -> Result<OffsetDateTime, ZoneError> {
        let local = to_chrono(naive)?;
        let resolved = match self.tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(earliest, latest) => match self.policy {
                DstPolicy::PreferEarliest | DstPolicy::Lenient => earliest,
                DstPolicy::PreferLatest => latest,
                DstPolicy::Strict | DstPolicy::ShiftForward => {
                    return Err(ZoneError::Ambiguous(local.to_string()))
                }
            },
            LocalResult::None => match self.policy {
                DstPolicy::ShiftForward => shift_forward(self.tz, local),
                DstPolicy::Lenient => keep_prior_offset(self.tz, local),
                _ => None,
            }
            .ok_or_else(|| ZoneError::Nonexistent(local.to_string()))?,
        };
        to_offset_datetime(&resolved)
    }
}

fn shift_forward(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    let mut t = naive;
    for _ in 0..MAX_SHIFT_MINUTES {
        t += chrono::Duration::minutes(1);
        if let LocalResult::Single(dt) = tz.from_local_datetime(&t) {
            return Some(dt);
        }
    }
    None
}

/// Read `naive` with the offset valid just before the gap it falls in.
fn keep_prior_offset(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    let mut t = naive;
    for _ in 0..MAX_SHIFT_MINUTES {
        t -= chrono::Duration::minutes(1);
        if let Some(before) = tz.from_local_datetime(&t).earliest() {
            let offset = i64::from(before.offset().fix().local_minus_utc());
            return Some(tz.from_utc_datetime(&(naive - chrono::Duration::seconds(offset))));
        }
    }
    None
}

fn to_chrono(naive: PrimitiveDateTime) -> Result<NaiveDateTime, ZoneError> {
    NaiveDate::from_ymd_opt(naive.year(), u8::from(naive.month()).into(), naive.day().into())
        .and_then(|d| d.and_hms_opt(naive.hour().into(), naive.minute().into(), naive.second().into()))
        .ok_or_else(|| ZoneError::OutOfRange(naive.to_string()))
}

fn to_offset_datetime(dt: &DateTime<Tz>) -> Result<OffsetDateTime, ZoneError> {
    let offset = UtcOffset::from_whole_seconds(dt.offset().fix().local_minus_utc())
        .map_err(|e| ZoneError::OutOfRange(e.to_string()))?;
    let instant = OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map_err(|e| ZoneError::OutOfRange(e.to_string()))?;
    Ok(instant.to_offset(offset))
}
