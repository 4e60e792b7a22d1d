use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{ReviewOutcome, SrsRecord};

/// Bumped whenever an interval below changes, so consumers holding a copy of
/// the table can tell theirs is stale.
pub const INTERVAL_TABLE_VERSION: u32 = 1;

pub const MIN_LEVEL: i64 = 1;
pub const MAX_LEVEL: i64 = 9;

const MINUTE: i64 = 1;
const DAY: i64 = 24 * 60 * MINUTE;

// Indexed by level - 1
const INTERVAL_MINUTES: [i64; 9] = [
    10 * MINUTE,
    DAY,
    3 * DAY,
    7 * DAY,
    14 * DAY,
    30 * DAY,
    60 * DAY,
    120 * DAY,
    180 * DAY,
];

/// Fixed review interval for a proficiency level.
///
/// Levels outside `MIN_LEVEL..=MAX_LEVEL` have no interval, which keeps the
/// item out of every due computation.
pub fn interval(level: i64) -> Option<Duration> {
    if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
        return None;
    }
    Some(Duration::minutes(INTERVAL_MINUTES[(level - 1) as usize]))
}

pub fn interval_ms(level: i64) -> Option<i64> {
    interval(level).map(|d| d.num_milliseconds())
}

pub fn due_at(level: i64, last_event_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    interval(level).and_then(|d| last_event_at.checked_add_signed(d))
}

pub fn is_due(level: i64, last_event_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    due_at(level, last_event_at).is_some_and(|due| now >= due)
}

/// Earliest due time across records, or `None` when nothing is scheduled.
pub fn next_due<'a, I>(records: I) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = &'a SrsRecord>,
{
    records.into_iter().filter_map(SrsRecord::due_at).min()
}

pub fn due_count<'a, I>(records: I, now: DateTime<Utc>) -> usize
where
    I: IntoIterator<Item = &'a SrsRecord>,
{
    records.into_iter().filter(|r| r.is_due(now)).count()
}

/// Level after a review. Stored levels outside the table are pulled back in
/// range first.
pub fn next_level(level: i64, outcome: ReviewOutcome) -> i64 {
    let level = level.clamp(MIN_LEVEL, MAX_LEVEL);
    match outcome {
        ReviewOutcome::Correct => (level + 1).min(MAX_LEVEL),
        ReviewOutcome::Partial => level,
        ReviewOutcome::Incorrect => (level - 1).max(MIN_LEVEL),
    }
}

// Overdue and low-level items are more likely to be picked next
pub fn selection_weight(record: &SrsRecord, now: DateTime<Utc>) -> f64 {
    let overdue_hours = record
        .due_at()
        .map(|due| now.signed_duration_since(due).num_hours().max(0) as f64)
        .unwrap_or(0.0);
    let level_weight = (MAX_LEVEL + 1 - record.level.clamp(MIN_LEVEL, MAX_LEVEL)) as f64;
    (overdue_hours / 24.0 + 1.0) * level_weight
}

/// Human countdown until `due`, e.g. "2d 4h", "3h 15m", "Due now".
pub fn countdown(due: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if due <= now {
        return String::from("Due now");
    }

    let remaining = due - now;
    let days = remaining.num_days();
    let hours = remaining.num_hours() % 24;
    let minutes = remaining.num_minutes() % 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        String::from("<1m")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntervalEntry {
    pub level: i64,
    pub interval_ms: i64,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntervalTable {
    pub version: u32,
    pub entries: Vec<IntervalEntry>,
}

impl IntervalTable {
    pub fn current() -> Self {
        let entries = (MIN_LEVEL..=MAX_LEVEL)
            .filter_map(|level| {
                let interval_ms = interval_ms(level)?;
                Some(IntervalEntry {
                    level,
                    interval_ms,
                    label: interval_label(Duration::milliseconds(interval_ms)),
                })
            })
            .collect();

        Self {
            version: INTERVAL_TABLE_VERSION,
            entries,
        }
    }
}

fn interval_label(d: Duration) -> String {
    if d.num_days() > 0 {
        format!("{} days", d.num_days())
    } else {
        format!("{} minutes", d.num_minutes())
    }
}
