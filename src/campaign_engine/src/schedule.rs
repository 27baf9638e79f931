//! Calling-window rules: parsing, validation, and next-valid-slot search.
//!
//! ## What this does
//! - Parses the `schedule_rules` JSON column into a typed [`ScheduleRules`]
//!   value and **validates** it at the boundary (weekday names, HH:MM times,
//!   window orientation). Downstream code only ever sees a
//!   [`ValidatedSchedule`]; no dynamic key bags travel past this module.
//! - Computes [`next_valid`]: the earliest UTC instant at or after a given
//!   origin that falls inside one of the rule's daily windows on a permitted
//!   weekday, searching up to 14 calendar days of wall-clock dates in the
//!   schedule's zone.
//!
//! ## Window semantics
//! - Windows are inclusive on both ends; `start_time == end_time` is a
//!   single-instant window that only an exact wall-clock match satisfies.
//! - Windows never cross midnight; `end_time < start_time` is rejected as
//!   malformed (callers split such rules into two).
//! - Wall-clock times that don't exist in the zone (DST spring-forward gap)
//!   cause that day's window to be skipped; ambiguous times resolve to the
//!   earliest instant (see [`crate::tz::resolve_local`]).
//!
//! The search is pure and deterministic: it is run on task creation and on
//! every reschedule, and tests pin its output to the minute.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Days, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tz;

/// How many wall-clock dates the slot search examines before giving up.
const SEARCH_WINDOW_DAYS: u64 = 14;

/// The `schedule_rules` JSON document, as stored on a schedule row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRules {
    /// Weekday names, case-insensitive English ("monday" .. "sunday").
    pub days: Vec<String>,
    /// Daily window start, "HH:MM" 24-hour wall-clock.
    pub start_time: String,
    /// Daily window end, "HH:MM" 24-hour wall-clock (inclusive).
    pub end_time: String,
    /// Recognized but not resolved by the engine; holiday calendars are an
    /// API-layer concern.
    #[serde(default)]
    pub exclude_holidays: bool,
}

/// Why a rules document was rejected.
#[derive(Debug, Error)]
pub enum ScheduleRuleError {
    /// The JSON document itself did not parse.
    #[error("rules are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// `days` was empty.
    #[error("days must be non-empty")]
    EmptyDays,
    /// A day name did not resolve to an English weekday.
    #[error("unknown weekday: {0:?}")]
    UnknownDay(String),
    /// Two day names resolved to the same weekday.
    #[error("duplicate weekday: {0:?}")]
    DuplicateDay(String),
    /// A time was not a valid "HH:MM" 24-hour value.
    #[error("bad time: {0:?} (expected HH:MM)")]
    BadTime(String),
    /// `end_time` precedes `start_time`; midnight-crossing windows are not
    /// supported.
    #[error("end_time precedes start_time")]
    BackwardsWindow,
}

/// Rules after boundary validation: resolved weekdays and parsed times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSchedule {
    days: HashSet<Weekday>,
    start: NaiveTime,
    end: NaiveTime,
}

impl ScheduleRules {
    /// Parse a raw JSON column value without validating its contents.
    pub fn from_json(raw: &str) -> Result<Self, ScheduleRuleError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Validate the document, resolving day names and times.
    pub fn validate(&self) -> Result<ValidatedSchedule, ScheduleRuleError> {
        if self.days.is_empty() {
            return Err(ScheduleRuleError::EmptyDays);
        }

        let mut days = HashSet::with_capacity(self.days.len());
        for name in &self.days {
            let day = parse_weekday(name).ok_or_else(|| {
                ScheduleRuleError::UnknownDay(name.clone())
            })?;
            if !days.insert(day) {
                return Err(ScheduleRuleError::DuplicateDay(name.clone()));
            }
        }

        let start = parse_hhmm(&self.start_time)
            .ok_or_else(|| ScheduleRuleError::BadTime(self.start_time.clone()))?;
        let end = parse_hhmm(&self.end_time)
            .ok_or_else(|| ScheduleRuleError::BadTime(self.end_time.clone()))?;
        if end < start {
            return Err(ScheduleRuleError::BackwardsWindow);
        }

        Ok(ValidatedSchedule { days, start, end })
    }
}

/// Resolve a case-insensitive English weekday name.
fn parse_weekday(name: &str) -> Option<Weekday> {
    match name.to_ascii_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Parse a strict "HH:MM" 24-hour time: exactly two digits, a colon, two
/// digits, in range.
fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    let bytes = s.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return None;
    }
    if !bytes[0].is_ascii_digit()
        || !bytes[1].is_ascii_digit()
        || !bytes[3].is_ascii_digit()
        || !bytes[4].is_ascii_digit()
    {
        return None;
    }
    let hour: u32 = s[0..2].parse().ok()?;
    let minute: u32 = s[3..5].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Earliest instant >= `from` that lies inside the rules' window on a
/// permitted weekday, converted back to UTC.
///
/// Returns `None` when the rules are malformed, the zone is unknown, or no
/// slot exists within the next 14 calendar days.
pub fn next_valid(
    rules: &ScheduleRules,
    tz_name: &str,
    from: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let schedule = rules.validate().ok()?;
    let zone = tz::parse_tz(tz_name).ok()?;
    next_valid_in(&schedule, zone, from)
}

/// Slot search over already-validated rules.
pub fn next_valid_in(
    schedule: &ValidatedSchedule,
    zone: chrono_tz::Tz,
    from: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let local_from = from.with_timezone(&zone);
    let from_date = local_from.date_naive();
    // Truncate to the minute the same way window times are expressed, so an
    // origin like 09:00:00.250 still counts as inside a 09:00 window start.
    let from_time = local_from.time();
    let from_minute =
        NaiveTime::from_hms_opt(from_time.hour(), from_time.minute(), 0)?;

    for offset in 0..SEARCH_WINDOW_DAYS {
        let date = from_date.checked_add_days(Days::new(offset))?;
        if !schedule.days.contains(&date.weekday()) {
            continue;
        }

        if offset == 0 {
            if from_minute < schedule.start {
                // Before today's window opens: the opening is the slot.
            } else if from_minute <= schedule.end {
                // Already inside the window; the origin itself is the slot.
                return Some(from);
            } else {
                // Past today's window; advance to the next permitted day.
                continue;
            }
        }

        match tz::resolve_local(date.and_time(schedule.start), zone) {
            Some(slot) => return Some(slot),
            // Window start fell into a DST gap; skip this day.
            None => continue,
        }
    }

    None
}
