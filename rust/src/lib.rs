//! Rust implementation of the portfolio planner's scheduling engine.
//!
//! Takes a list of portfolio projects and packs them onto a monthly timeline
//! against organisational headcount, honouring dependencies and shared
//! resource pools. Derived views (long poles, deadline checks, display tiers)
//! are computed from the packed schedule.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use chrono::NaiveDate;
use pyo3::prelude::*;

pub mod config;
pub mod graph;
pub mod groups;
pub mod logging;
pub mod models;
pub mod ranking;
pub mod scheduler;
pub mod sizing;
pub mod tiers;
pub mod timeline;

pub use config::{SchedulingConfig, DEFAULT_MAX_SEARCH_MONTHS};
pub use groups::{classify, reclassify, restore_originals, ClassifiedProject, Pool, ResourceRole};
pub use models::{
    BlockCounts, EdgeKind, PoolPlacement, PoolSchedule, Project, RowNumber, ScheduleEntry,
    ScheduleResult, TierBreak,
};
pub use scheduler::{pack, PackOutcome, PortfolioScheduler, SchedulerError};
pub use sizing::{remaining_duration, DurationEstimate, SizingLabel};
pub use tiers::{tier_entries, TieredSchedule};

fn to_py_err(e: SchedulerError) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(e.to_string())
}

/// Schedule a portfolio.
///
/// # Arguments
/// * `projects` - Portfolio rows; row numbers identify dependency targets
/// * `start_date` - Any date in the first schedulable month
/// * `end_date` - Planning horizon; packing may run past it
/// * `capacity_headcount` - Organisational headcount available each month
/// * `config` - Optional tuning (capacity percentage, verbosity, strictness)
///
/// # Returns
/// * ScheduleResult with packed entries, display tiers and diagnostics
///
/// # Raises
/// * ValueError on invalid configuration, or on cycles when `strict_cycles` is set
#[pyfunction]
#[pyo3(signature = (projects, start_date, end_date, capacity_headcount, config=None))]
fn schedule_portfolio(
    projects: Vec<Project>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    capacity_headcount: f64,
    config: Option<SchedulingConfig>,
) -> PyResult<ScheduleResult> {
    let scheduler = PortfolioScheduler::new(
        projects,
        start_date,
        end_date,
        capacity_headcount,
        config.unwrap_or_default(),
    )
    .map_err(to_py_err)?;
    scheduler.schedule().map_err(to_py_err)
}

/// Remaining duration of a single project in whole months.
///
/// Returns `(months, missing_duration_data)`.
#[pyfunction]
#[pyo3(signature = (project, capacity_pct=100.0))]
fn remaining_duration_months(project: Project, capacity_pct: f64) -> (u32, bool) {
    let estimate = remaining_duration(&project, capacity_pct);
    (estimate.months, estimate.missing_data)
}

/// Time budget of a resource pool in whole months.
#[pyfunction]
#[pyo3(name = "pool_budget_months", signature = (person_months, resources, capacity_pct=100.0))]
fn py_pool_budget_months(person_months: f64, resources: f64, capacity_pct: f64) -> u32 {
    sizing::pool_budget_months(person_months, resources, capacity_pct)
}

/// Row numbers of entries ending in the trailing `fraction` of the timeline.
#[pyfunction]
#[pyo3(name = "long_poles", signature = (entries, timeline_end, fraction=0.25))]
fn py_long_poles(
    entries: Vec<ScheduleEntry>,
    timeline_end: NaiveDate,
    fraction: f64,
) -> Vec<RowNumber> {
    timeline::long_poles(&entries, timeline_end, fraction)
        .into_iter()
        .map(|e| e.row_number)
        .collect()
}

/// Row numbers of entries finishing after `deadline`. Pool children are skipped.
#[pyfunction]
#[pyo3(name = "past_deadline")]
fn py_past_deadline(entries: Vec<ScheduleEntry>, deadline: NaiveDate) -> Vec<RowNumber> {
    timeline::past_deadline(&entries, deadline)
        .into_iter()
        .map(|e| e.row_number)
        .collect()
}

/// The planner.rust Python module.
#[pymodule]
fn rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Core data types
    m.add_class::<Project>()?;
    m.add_class::<ScheduleEntry>()?;
    m.add_class::<BlockCounts>()?;
    m.add_class::<TierBreak>()?;
    m.add_class::<PoolPlacement>()?;
    m.add_class::<PoolSchedule>()?;
    m.add_class::<ScheduleResult>()?;

    // Config types
    m.add_class::<SchedulingConfig>()?;

    // Algorithms
    m.add_function(wrap_pyfunction!(schedule_portfolio, m)?)?;
    m.add_function(wrap_pyfunction!(remaining_duration_months, m)?)?;
    m.add_function(wrap_pyfunction!(py_pool_budget_months, m)?)?;
    m.add_function(wrap_pyfunction!(py_long_poles, m)?)?;
    m.add_function(wrap_pyfunction!(py_past_deadline, m)?)?;

    Ok(())
}
