//! Internal bin-pack of a shared resource pool.
//!
//! Members of a pool (the parent plus its children) draw from the pool's own
//! headcount, not from organisational capacity. Each member occupies one slot
//! for its duration; the pool can run `floor(headcount)` members at once.

use rustc_hash::FxHashMap;

use crate::graph::{PortfolioGraph, ProjectId};
use crate::groups::Pool;
use crate::log_checks;
use crate::models::{PoolPlacement, PoolSchedule};
use crate::ranking::{pool_member_months, PoolOrder};

use super::capacity::MonthlyLedger;

/// Result of packing one pool, in offsets relative to the pool's start.
#[derive(Clone, Debug)]
pub struct PoolPack {
    pub schedule: PoolSchedule,
    /// Member -> (offset, duration) in months.
    pub offsets: FxHashMap<ProjectId, (u32, u32)>,
    /// Members placed despite an internal dependency cycle.
    pub flushed: Vec<ProjectId>,
}

impl PoolPack {
    pub fn span_months(&self) -> u32 {
        self.schedule.span_months
    }
}

/// Pack the members of `parent`'s pool in the given member order.
///
/// Each member is placed at the earliest month where its internal
/// dependencies have finished and a slot is free for its whole duration.
/// Member durations are capped at `max_search_months`. The container spans
/// `max(budget, chain, 1)` months.
pub fn pack_pool(
    graph: &PortfolioGraph,
    parent: ProjectId,
    pool: &Pool,
    order: &PoolOrder,
    capacity_pct: f64,
    max_search_months: u32,
    verbosity: u8,
) -> PoolPack {
    let internal = &order.internal;
    let longest = max_search_months.max(1);
    let slots = pool.slots();
    let mut ledger = MonthlyLedger::new(f64::from(slots), format!("pool {}", graph.row(parent)));

    let mut offsets: FxHashMap<ProjectId, (u32, u32)> = FxHashMap::default();
    let mut placements = Vec::with_capacity(order.order.len());

    for &member in &order.order {
        let months = pool_member_months(graph, member).min(longest);
        let earliest = internal
            .get(&member)
            .into_iter()
            .flatten()
            .filter_map(|dep| offsets.get(dep).map(|(start, len)| start.saturating_add(*len)))
            .max()
            .unwrap_or(0);

        let start = if months == 0 {
            earliest
        } else {
            // One slot per member always fits eventually; the ceiling only
            // guards against pathological inputs.
            let start = ledger
                .earliest_fit(earliest, months, 1, max_search_months)
                .unwrap_or(earliest);
            ledger.reserve(start, months, 1);
            start
        };

        log_checks!(
            verbosity,
            "    Pool {} member {} at +{} for {} months",
            graph.row(parent),
            graph.row(member),
            start,
            months
        );

        offsets.insert(member, (start, months));
        placements.push(PoolPlacement {
            row_number: graph.row(member),
            offset_months: start,
            duration_months: months,
            missing_duration_data: graph.node(member).estimate.missing_data,
        });
    }

    let chain_months = offsets
        .values()
        .map(|(start, len)| start.saturating_add(*len))
        .max()
        .unwrap_or(0);
    let budget_months = pool.budget_months(capacity_pct);
    let span_months = budget_months.max(chain_months).max(1);
    let overrun = budget_months > 0 && chain_months > budget_months;

    PoolPack {
        schedule: PoolSchedule {
            parent_row: graph.row(parent),
            slots,
            budget_months,
            chain_months,
            span_months,
            overrun,
            placements,
        },
        offsets,
        flushed: order.flushed.clone(),
    }
}
