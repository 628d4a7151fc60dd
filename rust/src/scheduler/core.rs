//! Capacity-constrained portfolio packer.

use chrono::{Datelike, Months, NaiveDate};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::HashMap;
use thiserror::Error;

use crate::config::SchedulingConfig;
use crate::graph::{PortfolioGraph, ProjectId};
use crate::groups::{classify, reclassify, ClassifiedProject, Pool, ResourceRole};
use crate::models::{
    BlockCounts, PoolSchedule, Project, RowNumber, ScheduleEntry, ScheduleResult,
};
use crate::ranking::{
    compute_dependent_counts, dependents_by_row, find_unorderable, order_by_rank,
    pool_member_order, PoolOrder,
};
use crate::tiers::tier_entries;
use crate::timeline::{long_poles, schedule_end};
use crate::{log_changes, log_checks, log_debug, log_warning};

use super::capacity::MonthlyLedger;
use super::pool::pack_pool;

/// Errors that can occur during scheduling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Circular dependency among rows {0:?}")]
    CircularDependency(Vec<RowNumber>),
    #[error("Month offset {0} is outside the supported calendar")]
    DateOutOfRange(u32),
}

/// First day of the month containing `date`.
pub fn month_origin(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Date of month boundary `offset` counted from `origin`.
pub fn month_boundary(origin: NaiveDate, offset: u32) -> Result<NaiveDate, SchedulerError> {
    origin
        .checked_add_months(Months::new(offset))
        .ok_or(SchedulerError::DateOutOfRange(offset))
}

/// Packed entries plus the pool sub-schedules they were built from.
#[derive(Clone, Debug, Default)]
pub struct PackOutcome {
    pub entries: Vec<ScheduleEntry>,
    pub pool_schedules: Vec<PoolSchedule>,
    pub flushed: Vec<RowNumber>,
}

/// Rank-then-place scheduler over a classified portfolio.
pub struct PortfolioScheduler {
    classified: Vec<ClassifiedProject>,
    origin: NaiveDate,
    end_date: NaiveDate,
    capacity_headcount: f64,
    config: SchedulingConfig,
}

impl PortfolioScheduler {
    /// Classify `projects` and prepare a scheduler.
    ///
    /// `start_date` fixes month 0; `end_date` is only a horizon for derived
    /// queries, packing may run past it. Negative capacity is clamped to zero.
    pub fn new(
        projects: Vec<Project>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        capacity_headcount: f64,
        config: SchedulingConfig,
    ) -> Result<Self, SchedulerError> {
        Self::with_classification(
            classify(&projects),
            start_date,
            end_date,
            capacity_headcount,
            config,
        )
    }

    /// Start from a previously classified list (e.g. loaded from storage).
    /// Tags are re-derived from restored originals before packing.
    pub fn from_classified(
        classified: &[ClassifiedProject],
        start_date: NaiveDate,
        end_date: NaiveDate,
        capacity_headcount: f64,
        config: SchedulingConfig,
    ) -> Result<Self, SchedulerError> {
        Self::with_classification(
            reclassify(classified),
            start_date,
            end_date,
            capacity_headcount,
            config,
        )
    }

    fn with_classification(
        classified: Vec<ClassifiedProject>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        capacity_headcount: f64,
        config: SchedulingConfig,
    ) -> Result<Self, SchedulerError> {
        if let Some(problem) = config.validate() {
            return Err(SchedulerError::InvalidConfig(problem));
        }
        if !capacity_headcount.is_finite() {
            return Err(SchedulerError::InvalidConfig(format!(
                "capacity_headcount must be finite, got {}",
                capacity_headcount
            )));
        }
        if start_date > end_date {
            return Err(SchedulerError::InvalidConfig(format!(
                "start date {} is after end date {}",
                start_date, end_date
            )));
        }
        Ok(Self {
            classified,
            origin: month_origin(start_date),
            end_date,
            capacity_headcount: capacity_headcount.max(0.0),
            config,
        })
    }

    pub fn classified(&self) -> &[ClassifiedProject] {
        &self.classified
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    fn build_graph(&self) -> PortfolioGraph {
        PortfolioGraph::build(&self.classified, self.config.effective_capacity_pct())
    }

    /// Run the full pipeline: rank, pack, derive and tier.
    pub fn schedule(&self) -> Result<ScheduleResult, SchedulerError> {
        let graph = self.build_graph();
        let verbosity = self.config.verbosity;

        for (source, missing) in &graph.dangling {
            log_warning!(
                verbosity,
                "row {} depends on unknown row {}; ignoring",
                source,
                missing
            );
        }

        if self.config.strict_cycles {
            let stuck = find_unorderable(&graph);
            if !stuck.is_empty() {
                return Err(SchedulerError::CircularDependency(
                    stuck.into_iter().map(|id| graph.row(id)).collect(),
                ));
            }
        }

        let counts = compute_dependent_counts(&graph);
        let outcome = self.pack_graph(&graph, &counts)?;
        let dependents = dependents_by_row(&graph, &counts);
        let tiered = tier_entries(&outcome.entries, &dependents);

        let infeasible = outcome.entries.iter().filter(|e| e.infeasible).count();
        let mut metadata = HashMap::new();
        metadata.insert("algorithm".to_string(), "rank_then_pack".to_string());
        metadata.insert("projects".to_string(), graph.len().to_string());
        metadata.insert(
            "pools".to_string(),
            outcome.pool_schedules.len().to_string(),
        );
        metadata.insert("flushed".to_string(), outcome.flushed.len().to_string());
        metadata.insert("infeasible".to_string(), infeasible.to_string());
        metadata.insert(
            "capacity_headcount".to_string(),
            self.capacity_headcount.to_string(),
        );
        metadata.insert(
            "capacity_pct".to_string(),
            self.config.effective_capacity_pct().to_string(),
        );

        let long_pole_rows: Vec<RowNumber> =
            long_poles(&outcome.entries, self.end_date, self.config.long_pole_fraction)
                .into_iter()
                .map(|e| e.row_number)
                .collect();

        Ok(ScheduleResult {
            schedule_end: schedule_end(&outcome.entries),
            long_poles: long_pole_rows,
            tiered_entries: tiered.entries,
            tier_breaks: tiered.breaks,
            dependents,
            pool_schedules: outcome
                .pool_schedules
                .into_iter()
                .map(|p| (p.parent_row, p))
                .collect(),
            flushed_rows: outcome.flushed,
            dangling_references: graph.dangling.clone(),
            entries: outcome.entries,
            metadata,
        })
    }

    /// Pack only: entries in rank order, pool children after their parent.
    pub fn pack(&self) -> Result<PackOutcome, SchedulerError> {
        let graph = self.build_graph();
        let counts = compute_dependent_counts(&graph);
        self.pack_graph(&graph, &counts)
    }

    fn pack_graph(
        &self,
        graph: &PortfolioGraph,
        counts: &[BlockCounts],
    ) -> Result<PackOutcome, SchedulerError> {
        let verbosity = self.config.verbosity;
        let capacity_pct = self.config.effective_capacity_pct();
        let rank = order_by_rank(graph, counts, capacity_pct, verbosity);
        let flushed: FxHashSet<ProjectId> = rank.flushed.iter().copied().collect();

        let mut ledger = MonthlyLedger::new(self.capacity_headcount, "portfolio");
        let mut end_months: Vec<Option<u32>> = vec![None; graph.len()];
        let mut entries: Vec<ScheduleEntry> = Vec::with_capacity(graph.len());
        let mut pool_schedules: Vec<PoolSchedule> = Vec::new();

        for &id in &rank.order {
            if graph.is_attached_child(id) {
                continue;
            }
            let node = graph.node(id);
            let earliest = if node.in_progress {
                0
            } else {
                graph.outer_deps[id as usize]
                    .iter()
                    .filter_map(|&dep| end_months[dep as usize])
                    .max()
                    .unwrap_or(0)
            };

            if let ResourceRole::PoolParent { pool, .. } = &node.role {
                let computed;
                let pool_order = match rank.pools.get(&id) {
                    Some(pool_order) => pool_order,
                    None => {
                        computed = pool_member_order(graph, id);
                        &computed
                    }
                };
                let schedule = self.place_pool(
                    graph,
                    id,
                    pool,
                    pool_order,
                    earliest,
                    &mut ledger,
                    &mut end_months,
                    &mut entries,
                    &flushed,
                )?;
                pool_schedules.push(schedule);
                continue;
            }

            let (months, too_long) =
                self.capped_months(graph, id, node.estimate.placement_months());
            let reserved = node.project.clamped_resources().ceil() as u32;
            let (start, infeasible) = if too_long {
                (earliest, true)
            } else {
                self.find_window(graph, id, &ledger, earliest, months, reserved)
            };
            if !infeasible {
                ledger.reserve(start, months, reserved);
            }
            end_months[id as usize] = Some(start.saturating_add(months));

            log_changes!(
                verbosity,
                "  Placed row {} at month {} for {} months ({} heads)",
                graph.row(id),
                start,
                months,
                reserved
            );

            let mut entry = self.make_entry(graph, id, start, months, reserved)?;
            entry.missing_duration_data = node.estimate.missing_data;
            entry.infeasible = infeasible;
            entry.dependency_order_relaxed = flushed.contains(&id);
            entries.push(entry);
        }

        log_debug!(
            verbosity,
            "  Ledger {} horizon: {} months",
            ledger.name,
            ledger.horizon()
        );

        Ok(PackOutcome {
            entries,
            pool_schedules,
            flushed: rank.flushed.iter().map(|&id| graph.row(id)).collect(),
        })
    }

    /// Durations past the search ceiling are cut to it; the flag marks the
    /// entry infeasible.
    fn capped_months(&self, graph: &PortfolioGraph, id: ProjectId, months: u32) -> (u32, bool) {
        let longest = self.config.max_search_months.max(1);
        if months <= longest {
            return (months, false);
        }
        log_warning!(
            self.config.verbosity,
            "row {} needs {} months, more than the {} month ceiling",
            graph.row(id),
            months,
            longest
        );
        (longest, true)
    }

    /// Earliest window for `reserved` heads; falls back to `earliest` without
    /// reserving anything when no window exists.
    fn find_window(
        &self,
        graph: &PortfolioGraph,
        id: ProjectId,
        ledger: &MonthlyLedger,
        earliest: u32,
        months: u32,
        reserved: u32,
    ) -> (u32, bool) {
        let verbosity = self.config.verbosity;
        match ledger.earliest_fit(earliest, months, reserved, self.config.max_search_months) {
            Some(start) => {
                if start > earliest {
                    log_checks!(
                        verbosity,
                        "    Row {} delayed from month {} to {} by capacity",
                        graph.row(id),
                        earliest,
                        start
                    );
                }
                (start, false)
            }
            None => {
                log_warning!(
                    verbosity,
                    "row {} needs {} heads but no window fits within capacity {}",
                    graph.row(id),
                    reserved,
                    ledger.limit()
                );
                (earliest, true)
            }
        }
    }

    /// Pack a pool internally, place its container against organisational
    /// capacity, and emit the container followed by its children.
    #[allow(clippy::too_many_arguments)]
    fn place_pool(
        &self,
        graph: &PortfolioGraph,
        parent: ProjectId,
        pool: &Pool,
        pool_order: &PoolOrder,
        earliest: u32,
        ledger: &mut MonthlyLedger,
        end_months: &mut [Option<u32>],
        entries: &mut Vec<ScheduleEntry>,
        flushed: &FxHashSet<ProjectId>,
    ) -> Result<PoolSchedule, SchedulerError> {
        let verbosity = self.config.verbosity;
        let pack = pack_pool(
            graph,
            parent,
            pool,
            pool_order,
            self.config.effective_capacity_pct(),
            self.config.max_search_months,
            verbosity,
        );
        let (span, too_long) = self.capped_months(graph, parent, pack.span_months());
        let reserved = pool.reserved_headcount();
        let (start, infeasible) = if too_long {
            (earliest, true)
        } else {
            self.find_window(graph, parent, ledger, earliest, span, reserved)
        };
        if !infeasible {
            ledger.reserve(start, span, reserved);
        }
        end_months[parent as usize] = Some(start.saturating_add(span));

        log_changes!(
            verbosity,
            "  Placed pool row {} at month {} for {} months ({} heads, budget {}, chain {})",
            graph.row(parent),
            start,
            span,
            reserved,
            pack.schedule.budget_months,
            pack.schedule.chain_months
        );
        if pack.schedule.overrun {
            log_checks!(
                verbosity,
                "    Pool row {} overruns its budget",
                graph.row(parent)
            );
        }

        let pool_flushed: FxHashSet<ProjectId> = pack.flushed.iter().copied().collect();
        let mut container = self.make_entry(graph, parent, start, span, reserved)?;
        container.is_pool_parent = true;
        container.pool_overrun = pack.schedule.overrun;
        container.infeasible = infeasible;
        container.dependency_order_relaxed = flushed.contains(&parent);
        entries.push(container);

        let offsets: &FxHashMap<ProjectId, (u32, u32)> = &pack.offsets;
        for &child in graph.children_of(parent) {
            let (offset, months) = offsets.get(&child).copied().unwrap_or((0, 1));
            let child_start = start.saturating_add(offset);
            end_months[child as usize] = Some(child_start.saturating_add(months));

            let mut entry = self.make_entry(graph, child, child_start, months, 0)?;
            entry.is_pool_child = true;
            entry.parent_row = Some(graph.row(parent));
            entry.missing_duration_data = graph.node(child).estimate.missing_data;
            entry.dependency_order_relaxed =
                flushed.contains(&child) || pool_flushed.contains(&child);
            entries.push(entry);
        }

        Ok(pack.schedule)
    }

    fn make_entry(
        &self,
        graph: &PortfolioGraph,
        id: ProjectId,
        start_month: u32,
        duration_months: u32,
        reserved_headcount: u32,
    ) -> Result<ScheduleEntry, SchedulerError> {
        let node = graph.node(id);
        let dependency_rows = if graph.is_attached_child(id) {
            // Targets in the same pool stay as members; others become their owner.
            let mut seen = FxHashSet::default();
            graph.deps[id as usize]
                .iter()
                .map(|&(target, _)| {
                    let owner = graph.node(target).owner;
                    if owner == node.owner {
                        target
                    } else {
                        owner
                    }
                })
                .filter(|&target| seen.insert(target))
                .map(|target| graph.row(target))
                .collect()
        } else {
            graph.outer_deps[id as usize]
                .iter()
                .map(|&target| graph.row(target))
                .collect()
        };
        Ok(ScheduleEntry {
            row_number: graph.row(id),
            name: node.project.name.clone(),
            start_date: month_boundary(self.origin, start_month)?,
            end_date: month_boundary(
                self.origin,
                start_month.saturating_add(duration_months),
            )?,
            start_month,
            duration_months,
            reserved_headcount,
            in_progress: node.in_progress,
            is_pool_parent: false,
            is_pool_child: false,
            parent_row: None,
            dependency_rows,
            missing_duration_data: false,
            past_deadline: false,
            pool_overrun: false,
            infeasible: false,
            dependency_order_relaxed: false,
        })
    }
}

/// Pack a raw project list with default tunables apart from `capacity_pct`.
pub fn pack(
    projects: Vec<Project>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    capacity_headcount: f64,
    capacity_pct: f64,
) -> Result<Vec<ScheduleEntry>, SchedulerError> {
    let config = SchedulingConfig {
        capacity_pct,
        ..Default::default()
    };
    let scheduler =
        PortfolioScheduler::new(projects, start_date, end_date, capacity_headcount, config)?;
    Ok(scheduler.pack()?.entries)
}
