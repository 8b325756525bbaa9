// Record identifiers and ISO-8601 timestamps

use crate::config::IdStrategy;
use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Generates fresh record ids according to the configured strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdGenerator {
    strategy: IdStrategy,
}

impl IdGenerator {
    pub fn new(strategy: IdStrategy) -> Self {
        IdGenerator { strategy }
    }

    pub fn next_id(&self) -> String {
        match self.strategy {
            IdStrategy::Ulid => ulid::Ulid::new().to_string().to_lowercase(),
            IdStrategy::Uuid => uuid::Uuid::new_v4().to_string(),
            IdStrategy::Nanoid => nanoid::nanoid!(),
        }
    }
}

/// Current time as ISO-8601 UTC with millisecond precision, e.g. `2026-10-19T08:15:30.123Z`.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// A timestamp strictly later than `previous`.
///
/// Uses the current time when the clock has moved past `previous` at
/// millisecond precision, otherwise `previous + 1ms`. Unparseable input
/// yields the current time.
pub fn timestamp_after(previous: &str) -> String {
    let now = Utc::now();
    match parse_timestamp(previous) {
        Some(prev) if now.timestamp_millis() <= prev.timestamp_millis() => {
            format_timestamp(prev + Duration::milliseconds(1))
        }
        _ => format_timestamp(now),
    }
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
