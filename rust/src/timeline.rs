//! Derived views over a packed schedule: end date, long poles, deadlines.

use chrono::{Duration, NaiveDate};

use crate::models::ScheduleEntry;

/// Latest end date across all entries.
pub fn schedule_end(entries: &[ScheduleEntry]) -> Option<NaiveDate> {
    entries.iter().map(|e| e.end_date).max()
}

/// Earliest start date across all entries.
pub fn schedule_start(entries: &[ScheduleEntry]) -> Option<NaiveDate> {
    entries.iter().map(|e| e.start_date).min()
}

/// Entries ending within the trailing `fraction` of the timeline.
///
/// The timeline runs from the earliest start to `timeline_end`. Entries that
/// end after `timeline_end` also count: they drive the finish date too.
pub fn long_poles(
    entries: &[ScheduleEntry],
    timeline_end: NaiveDate,
    fraction: f64,
) -> Vec<&ScheduleEntry> {
    let Some(start) = schedule_start(entries) else {
        return Vec::new();
    };
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let span_days = (timeline_end - start).num_days().max(0);
    let trailing_days = (span_days as f64 * fraction).round() as i64;
    let cutoff = timeline_end - Duration::days(trailing_days);
    entries.iter().filter(|e| e.end_date >= cutoff).collect()
}

/// Whether an entry finishes after `deadline`. Pool children never count;
/// their container does.
pub fn is_past_deadline(entry: &ScheduleEntry, deadline: NaiveDate) -> bool {
    !entry.is_pool_child && entry.end_date > deadline
}

pub fn past_deadline(entries: &[ScheduleEntry], deadline: NaiveDate) -> Vec<&ScheduleEntry> {
    entries
        .iter()
        .filter(|e| is_past_deadline(e, deadline))
        .collect()
}

/// Back-fill `past_deadline` flags once the caller's deadline is known.
/// Returns how many entries are late.
pub fn mark_past_deadline(entries: &mut [ScheduleEntry], deadline: NaiveDate) -> usize {
    let mut late = 0;
    for entry in entries.iter_mut() {
        entry.past_deadline = is_past_deadline(entry, deadline);
        if entry.past_deadline {
            late += 1;
        }
    }
    late
}
