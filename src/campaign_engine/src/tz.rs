//! Time zone parsing and conversion helpers.
//!
//! What this module provides:
//! - [`parse_ts_to_utc`]: Parse the RFC-3339 strings the database stores
//!   back into `DateTime<Utc>`.
//! - [`to_rfc3339_millis`]: The single serialization format for timestamps.
//!   Fixed-width UTC output means lexicographic order equals chronological
//!   order, which the claim query's string comparisons rely on.
//! - [`parse_tz`]: IANA zone-name parsing (e.g., "America/New_York").
//! - [`resolve_local`]: Convert a naive wall-clock time in a zone to UTC.
//!
//! DST notes:
//! - Ambiguous wall-clock times ("fall back" repeats an hour) resolve to the
//!   earliest of the two instants.
//! - Nonexistent wall-clock times ("spring forward" skips an hour) resolve
//!   to `None`; the schedule evaluator skips that day's window.

use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// RFC-3339 string (any offset) -> UTC.
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

/// Format a UTC datetime as an RFC-3339 string with millisecond precision.
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Parse an IANA time zone name.
pub fn parse_tz(tz_name: &str) -> anyhow::Result<Tz> {
    tz_name
        .parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("bad tz {tz_name:?}: {e}"))
}

/// Convert a naive wall-clock timestamp in `tz` to UTC.
///
/// Returns `None` for nonexistent local times (the spring-forward gap);
/// ambiguous local times resolve to the earliest instant.
pub fn resolve_local(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
