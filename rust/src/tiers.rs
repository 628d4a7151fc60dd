//! Presentation tiers for a packed schedule.
//!
//! Reorders entries into in-progress, ready-to-start and waiting sections.
//! Dates are never touched. A pool container and the children that follow it
//! move as one block.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::models::{BlockCounts, RowNumber, ScheduleEntry, TierBreak};

pub const TIER_LABELS: [&str; 3] = ["In progress", "Ready to start", "Waiting on dependencies"];

/// Entries in display order plus section dividers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TieredSchedule {
    pub entries: Vec<ScheduleEntry>,
    pub breaks: Vec<TierBreak>,
}

struct Block<'a> {
    main: &'a ScheduleEntry,
    members: Vec<&'a ScheduleEntry>,
    blocked: u32,
}

/// Split entries into blocks: each non-child entry plus the pool children
/// directly after it.
fn blocks<'a>(
    entries: &'a [ScheduleEntry],
    dependents: &HashMap<RowNumber, BlockCounts>,
) -> Vec<Block<'a>> {
    let mut result: Vec<Block<'a>> = Vec::new();
    for entry in entries {
        if entry.is_pool_child {
            if let Some(block) = result.last_mut() {
                block.members.push(entry);
                continue;
            }
        }
        result.push(Block {
            main: entry,
            members: vec![entry],
            blocked: dependents
                .get(&entry.row_number)
                .map(|c| c.total())
                .unwrap_or(0),
        });
    }
    result
}

fn tier_of(
    main: &ScheduleEntry,
    end_by_row: &HashMap<RowNumber, NaiveDate>,
    earliest_start: NaiveDate,
) -> usize {
    if main.in_progress {
        return 0;
    }
    let ready = main.dependency_rows.iter().all(|row| {
        end_by_row
            .get(row)
            .map_or(true, |end| *end <= earliest_start)
    });
    if ready {
        1
    } else {
        2
    }
}

/// Reorder a packed schedule into display tiers.
///
/// Tier 0 sorts by end date; tier 1 by projects blocked then duration (both
/// descending); tier 2 by start date then projects blocked. Ties keep rank order.
pub fn tier_entries(
    entries: &[ScheduleEntry],
    dependents: &HashMap<RowNumber, BlockCounts>,
) -> TieredSchedule {
    let Some(earliest_start) = entries.iter().map(|e| e.start_date).min() else {
        return TieredSchedule::default();
    };
    let end_by_row: HashMap<RowNumber, NaiveDate> =
        entries.iter().map(|e| (e.row_number, e.end_date)).collect();

    let mut tiers: [Vec<Block>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for block in blocks(entries, dependents) {
        let tier = tier_of(block.main, &end_by_row, earliest_start);
        tiers[tier].push(block);
    }

    tiers[0].sort_by_key(|b| b.main.end_date);
    tiers[1].sort_by(|a, b| {
        b.blocked
            .cmp(&a.blocked)
            .then(b.main.duration_months.cmp(&a.main.duration_months))
    });
    tiers[2].sort_by(|a, b| {
        a.main
            .start_date
            .cmp(&b.main.start_date)
            .then(b.blocked.cmp(&a.blocked))
    });

    let mut result = TieredSchedule::default();
    for (tier, blocks) in tiers.iter().enumerate() {
        if blocks.is_empty() {
            continue;
        }
        result.breaks.push(TierBreak {
            label: TIER_LABELS[tier].to_string(),
            index: result.entries.len(),
        });
        for block in blocks {
            result
                .entries
                .extend(block.members.iter().map(|&e| e.clone()));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn make_entry(row: RowNumber, start_month: u32, months: u32, deps: Vec<RowNumber>) -> ScheduleEntry {
        let origin = d(2025, 1, 1);
        ScheduleEntry {
            row_number: row,
            name: format!("p{}", row),
            start_date: origin + chrono::Months::new(start_month),
            end_date: origin + chrono::Months::new(start_month + months),
            start_month,
            duration_months: months,
            reserved_headcount: 1,
            in_progress: false,
            is_pool_parent: false,
            is_pool_child: false,
            parent_row: None,
            dependency_rows: deps,
            missing_duration_data: false,
            past_deadline: false,
            pool_overrun: false,
            infeasible: false,
            dependency_order_relaxed: false,
        }
    }

    fn counts(pairs: &[(RowNumber, u32)]) -> HashMap<RowNumber, BlockCounts> {
        pairs
            .iter()
            .map(|&(row, plain)| {
                (
                    row,
                    BlockCounts {
                        plain,
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    fn rows(entries: &[ScheduleEntry]) -> Vec<RowNumber> {
        entries.iter().map(|e| e.row_number).collect()
    }

    #[test]
    fn test_three_tiers() {
        let mut entries = vec![
            make_entry(1, 0, 4, vec![]),
            make_entry(2, 0, 2, vec![]),
            make_entry(3, 4, 1, vec![1]),
            make_entry(4, 0, 6, vec![]),
            make_entry(5, 2, 2, vec![2]),
        ];
        entries[3].in_progress = true;
        entries[1].in_progress = true;
        let tiered = tier_entries(&entries, &counts(&[(1, 1), (2, 1)]));

        assert_eq!(rows(&tiered.entries), vec![2, 4, 1, 5, 3]);
        assert_eq!(
            tiered.breaks,
            vec![
                TierBreak {
                    label: "In progress".to_string(),
                    index: 0
                },
                TierBreak {
                    label: "Ready to start".to_string(),
                    index: 2
                },
                TierBreak {
                    label: "Waiting on dependencies".to_string(),
                    index: 3
                },
            ]
        );
    }

    #[test]
    fn test_ready_tier_ordering() {
        let entries = vec![
            make_entry(1, 0, 2, vec![]),
            make_entry(2, 0, 5, vec![]),
            make_entry(3, 1, 1, vec![]),
        ];
        let tiered = tier_entries(&entries, &counts(&[(3, 2)]));
        assert_eq!(rows(&tiered.entries), vec![3, 2, 1]);
        assert_eq!(tiered.breaks.len(), 1);
    }

    #[test]
    fn test_pool_block_moves_together() {
        let mut entries = vec![
            make_entry(9, 0, 1, vec![]),
            make_entry(10, 3, 1, vec![9]),
            make_entry(1, 0, 3, vec![]),
            make_entry(2, 0, 3, vec![]),
            make_entry(3, 0, 2, vec![]),
        ];
        entries[2].is_pool_parent = true;
        entries[3].is_pool_child = true;
        entries[4].is_pool_child = true;
        let tiered = tier_entries(&entries, &counts(&[]));
        assert_eq!(rows(&tiered.entries), vec![1, 2, 3, 9, 10]);
    }

    #[test]
    fn test_dates_unchanged() {
        let entries = vec![make_entry(1, 0, 2, vec![]), make_entry(2, 2, 2, vec![1])];
        let tiered = tier_entries(&entries, &counts(&[]));
        for entry in &tiered.entries {
            let original = entries
                .iter()
                .find(|e| e.row_number == entry.row_number)
                .unwrap();
            assert_eq!(original, entry);
        }
    }

    #[test]
    fn test_empty() {
        let tiered = tier_entries(&[], &HashMap::new());
        assert!(tiered.entries.is_empty());
        assert!(tiered.breaks.is_empty());
    }
}
