//! Delivery watermark.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};

use crate::models::Post;

/// Key of the single line in the persisted state file.
pub const WATERMARK_KEY: &str = "last_sent_at";

/// Everything at or before this instant has been delivered.
///
/// Held at microsecond precision so a watermark written to disk and read
/// back compares equal to the post it was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    /// The cold-start watermark: nothing delivered yet.
    pub fn epoch() -> Self {
        Self(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at.trunc_subsecs(6))
    }

    /// Watermark covering `post`.
    pub fn of(post: &Post) -> Self {
        Self::new(post.indexed_at)
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn is_epoch(&self) -> bool {
        self.0 == DateTime::<Utc>::UNIX_EPOCH
    }

    /// Whether `post` was already delivered (`indexed_at <= watermark`).
    pub fn covers(&self, post: &Post) -> bool {
        post.indexed_at <= self.0
    }

    /// Seconds since the epoch as a float.
    pub fn as_secs_f64(&self) -> f64 {
        self.0.timestamp_micros() as f64 / 1_000_000.0
    }

    /// Build from float seconds, rounding to the nearest microsecond.
    ///
    /// Negative or non-finite values are rejected.
    pub fn from_secs_f64(secs: f64) -> Option<Self> {
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        let micros = (secs * 1_000_000.0).round();
        if micros > i64::MAX as f64 {
            return None;
        }
        DateTime::from_timestamp_micros(micros as i64).map(Self)
    }

    /// Encode as the persisted state line: `last_sent_at=<secs>.<micros>`.
    pub fn to_line(&self) -> String {
        let micros = self.0.timestamp_micros();
        format!(
            "{}={}.{:06}",
            WATERMARK_KEY,
            micros.div_euclid(1_000_000),
            micros.rem_euclid(1_000_000)
        )
    }

    /// Decode a persisted state line. Returns `None` for anything malformed.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (key, value) = line.trim().split_once('=')?;
        if key.trim() != WATERMARK_KEY {
            return None;
        }
        let secs: f64 = value.trim().parse().ok()?;
        Self::from_secs_f64(secs)
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::epoch()
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Watermark {
    fn from(at: DateTime<Utc>) -> Self {
        Self::new(at)
    }
}
