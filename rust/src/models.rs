//! Core data types for the portfolio scheduler.

use chrono::NaiveDate;
use pyo3::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// Note: We use std HashMap on result types for PyO3 interface compatibility

/// Row number of a project; the only identity used to resolve dependencies.
pub type RowNumber = i64;

/// How a dependency edge blocks its dependent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    DevBlocker,
    RelBlocker,
    Plain,
}

/// A portfolio line item as supplied by ingestion.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[pyo3(get, set)]
    pub row_number: RowNumber,
    #[pyo3(get, set)]
    pub name: String,
    /// Total effort in person-months, if known.
    #[pyo3(get, set)]
    pub total_person_months: Option<f64>,
    /// Assigned headcount ("people").
    #[pyo3(get, set)]
    pub dev_resources: f64,
    /// Percentage already done, 0-100.
    #[pyo3(get, set)]
    pub completed_pct: f64,
    #[pyo3(get, set)]
    pub sizing_label: Option<String>,
    /// Explicit duration override in months.
    #[pyo3(get, set)]
    pub duration_months: Option<f64>,
    #[pyo3(get, set)]
    pub priority: String,
    #[pyo3(get, set)]
    pub commitment: String,
    #[pyo3(get, set)]
    pub status: String,
    #[pyo3(get, set)]
    pub dependency_rows: Vec<RowNumber>,
    #[pyo3(get, set)]
    pub dev_blocker_rows: Vec<RowNumber>,
    #[pyo3(get, set)]
    pub rel_blocker_rows: Vec<RowNumber>,
    /// Resource bucket tag. Blank rows directly after a tagged row inherit it.
    #[pyo3(get, set)]
    pub bucket: Option<String>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            row_number: 0,
            name: String::new(),
            total_person_months: None,
            dev_resources: 0.0,
            completed_pct: 0.0,
            sizing_label: None,
            duration_months: None,
            priority: "P0".to_string(),
            commitment: String::new(),
            status: String::new(),
            dependency_rows: Vec::new(),
            dev_blocker_rows: Vec::new(),
            rel_blocker_rows: Vec::new(),
            bucket: None,
        }
    }
}

impl Project {
    pub fn new(row_number: RowNumber, name: impl Into<String>) -> Self {
        Self {
            row_number,
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status.to_ascii_lowercase().contains("in progress")
    }

    /// Only the literal value "committed" counts; "uncommitted" must not.
    pub fn is_committed(&self) -> bool {
        self.commitment.trim().eq_ignore_ascii_case("committed")
    }

    /// 1 for P0 (the default when blank) or committed work, 2 otherwise.
    pub fn priority_tier(&self) -> u8 {
        let priority = self.priority.trim();
        if priority.is_empty() || priority.eq_ignore_ascii_case("p0") || self.is_committed() {
            1
        } else {
            2
        }
    }

    pub fn clamped_completed_pct(&self) -> f64 {
        if self.completed_pct.is_finite() {
            self.completed_pct.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    /// Headcount with negative and non-finite values clamped to zero.
    pub fn clamped_resources(&self) -> f64 {
        if self.dev_resources.is_finite() && self.dev_resources > 0.0 {
            self.dev_resources
        } else {
            0.0
        }
    }

    pub fn has_resources(&self) -> bool {
        self.clamped_resources() > 0.0
    }

    /// Distinct dependency targets with their edge kind, self-references dropped.
    ///
    /// Blocker lists are folded in even when ingestion forgot to repeat them in
    /// `dependency_rows`. Dev-blocker wins over rel-blocker for the same row.
    pub fn dependencies(&self) -> Vec<(RowNumber, EdgeKind)> {
        let mut seen: FxHashSet<RowNumber> = FxHashSet::default();
        let mut result = Vec::new();
        let all_rows = self
            .dependency_rows
            .iter()
            .chain(&self.dev_blocker_rows)
            .chain(&self.rel_blocker_rows);
        for &row in all_rows {
            if row == self.row_number || !seen.insert(row) {
                continue;
            }
            let kind = if self.dev_blocker_rows.contains(&row) {
                EdgeKind::DevBlocker
            } else if self.rel_blocker_rows.contains(&row) {
                EdgeKind::RelBlocker
            } else {
                EdgeKind::Plain
            };
            result.push((row, kind));
        }
        result
    }
}

#[pymethods]
impl Project {
    #[new]
    #[pyo3(signature = (
        row_number,
        name,
        total_person_months=None,
        dev_resources=0.0,
        completed_pct=0.0,
        sizing_label=None,
        duration_months=None,
        priority="P0".to_string(),
        commitment=String::new(),
        status=String::new(),
        dependency_rows=Vec::new(),
        dev_blocker_rows=Vec::new(),
        rel_blocker_rows=Vec::new(),
        bucket=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn py_new(
        row_number: RowNumber,
        name: String,
        total_person_months: Option<f64>,
        dev_resources: f64,
        completed_pct: f64,
        sizing_label: Option<String>,
        duration_months: Option<f64>,
        priority: String,
        commitment: String,
        status: String,
        dependency_rows: Vec<RowNumber>,
        dev_blocker_rows: Vec<RowNumber>,
        rel_blocker_rows: Vec<RowNumber>,
        bucket: Option<String>,
    ) -> Self {
        Self {
            row_number,
            name,
            total_person_months,
            dev_resources,
            completed_pct,
            sizing_label,
            duration_months,
            priority,
            commitment,
            status,
            dependency_rows,
            dev_blocker_rows,
            rel_blocker_rows,
            bucket,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Project(row_number={}, name={:?}, dev_resources={}, deps={})",
            self.row_number,
            self.name,
            self.dev_resources,
            self.dependency_rows.len()
        )
    }
}

/// How many projects a given project blocks, split by edge kind.
#[pyclass]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCounts {
    #[pyo3(get)]
    pub dev_blocker: u32,
    #[pyo3(get)]
    pub rel_blocker: u32,
    #[pyo3(get)]
    pub plain: u32,
}

impl BlockCounts {
    pub fn add(&mut self, kind: EdgeKind) {
        match kind {
            EdgeKind::DevBlocker => self.dev_blocker += 1,
            EdgeKind::RelBlocker => self.rel_blocker += 1,
            EdgeKind::Plain => self.plain += 1,
        }
    }
}

#[pymethods]
impl BlockCounts {
    /// Sum of all three kinds.
    pub fn total(&self) -> u32 {
        self.dev_blocker + self.rel_blocker + self.plain
    }

    fn __repr__(&self) -> String {
        format!(
            "BlockCounts(dev_blocker={}, rel_blocker={}, plain={})",
            self.dev_blocker, self.rel_blocker, self.plain
        )
    }
}

/// One row of the computed schedule.
///
/// Dates are month boundaries: `start_date` is the first day of the start month,
/// `end_date` the first day of the month after the last worked month.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    #[pyo3(get)]
    pub row_number: RowNumber,
    #[pyo3(get)]
    pub name: String,
    #[pyo3(get)]
    pub start_date: NaiveDate,
    #[pyo3(get)]
    pub end_date: NaiveDate,
    /// Month index relative to the schedule origin.
    #[pyo3(get)]
    pub start_month: u32,
    #[pyo3(get)]
    pub duration_months: u32,
    #[pyo3(get)]
    pub reserved_headcount: u32,
    #[pyo3(get)]
    pub in_progress: bool,
    #[pyo3(get)]
    pub is_pool_parent: bool,
    #[pyo3(get)]
    pub is_pool_child: bool,
    #[pyo3(get)]
    pub parent_row: Option<RowNumber>,
    /// Dependency targets after redirection, as used for gating.
    #[pyo3(get)]
    pub dependency_rows: Vec<RowNumber>,
    #[pyo3(get)]
    pub missing_duration_data: bool,
    #[pyo3(get, set)]
    pub past_deadline: bool,
    /// Pool chain ran longer than the pool's time budget.
    #[pyo3(get)]
    pub pool_overrun: bool,
    /// No window within the search ceiling could hold this entry's headcount.
    #[pyo3(get)]
    pub infeasible: bool,
    /// Placed by the cycle escape hatch; dependency order is not guaranteed.
    #[pyo3(get)]
    pub dependency_order_relaxed: bool,
}

#[pymethods]
impl ScheduleEntry {
    /// End month index (exclusive).
    pub fn end_month(&self) -> u32 {
        self.start_month.saturating_add(self.duration_months)
    }

    fn __repr__(&self) -> String {
        format!(
            "ScheduleEntry(row_number={}, start={}, end={}, headcount={})",
            self.row_number, self.start_date, self.end_date, self.reserved_headcount
        )
    }
}

/// Section divider emitted by the display tiering pass.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBreak {
    #[pyo3(get)]
    pub label: String,
    /// Position of the first entry of the section in the tiered list.
    #[pyo3(get)]
    pub index: usize,
}

/// Placement of one member inside a pool, relative to the pool's start.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolPlacement {
    #[pyo3(get)]
    pub row_number: RowNumber,
    #[pyo3(get)]
    pub offset_months: u32,
    #[pyo3(get)]
    pub duration_months: u32,
    #[pyo3(get)]
    pub missing_duration_data: bool,
}

/// Internal bin-pack of a pool, retained for emission.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolSchedule {
    #[pyo3(get)]
    pub parent_row: RowNumber,
    /// Concurrent member slots (floor of the pool's headcount).
    #[pyo3(get)]
    pub slots: u32,
    #[pyo3(get)]
    pub budget_months: u32,
    /// Length of the internal placement from first start to last end.
    #[pyo3(get)]
    pub chain_months: u32,
    /// Displayed container length: max(budget, chain, 1).
    #[pyo3(get)]
    pub span_months: u32,
    #[pyo3(get)]
    pub overrun: bool,
    #[pyo3(get)]
    pub placements: Vec<PoolPlacement>,
}

/// Everything a scheduling pass produces.
#[pyclass]
#[derive(Clone, Debug, Default)]
pub struct ScheduleResult {
    /// Packed entries in rank order; pool children directly follow their parent.
    #[pyo3(get)]
    pub entries: Vec<ScheduleEntry>,
    /// Same entries reordered for presentation.
    #[pyo3(get)]
    pub tiered_entries: Vec<ScheduleEntry>,
    #[pyo3(get)]
    pub tier_breaks: Vec<TierBreak>,
    #[pyo3(get)]
    pub dependents: HashMap<RowNumber, BlockCounts>,
    #[pyo3(get)]
    pub pool_schedules: HashMap<RowNumber, PoolSchedule>,
    /// Rows placed by the cycle escape hatch.
    #[pyo3(get)]
    pub flushed_rows: Vec<RowNumber>,
    /// (source_row, missing_row) pairs that were ignored.
    #[pyo3(get)]
    pub dangling_references: Vec<(RowNumber, RowNumber)>,
    #[pyo3(get)]
    pub schedule_end: Option<NaiveDate>,
    /// Rows ending in the trailing `long_pole_fraction` of the planning horizon.
    #[pyo3(get)]
    pub long_poles: Vec<RowNumber>,
    #[pyo3(get)]
    pub metadata: HashMap<String, String>,
}

#[pymethods]
impl ScheduleResult {
    fn __repr__(&self) -> String {
        format!(
            "ScheduleResult(entries={}, flushed={}, dangling={})",
            self.entries.len(),
            self.flushed_rows.len(),
            self.dangling_references.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_progress_from_status() {
        let mut project = Project::new(1, "a");
        assert!(!project.is_in_progress());
        project.status = "In Progress - phase 2".to_string();
        assert!(project.is_in_progress());
    }

    #[test]
    fn test_priority_tier() {
        let mut project = Project::new(1, "a");
        assert_eq!(project.priority_tier(), 1); // blank defaults to P0

        project.priority = "P2".to_string();
        assert_eq!(project.priority_tier(), 2);

        project.commitment = " Committed ".to_string();
        assert_eq!(project.priority_tier(), 1);

        project.commitment = "uncommitted".to_string();
        assert_eq!(project.priority_tier(), 2);
    }

    #[test]
    fn test_dependencies_drop_self_and_classify() {
        let project = Project {
            dependency_rows: vec![1, 2, 3, 2],
            dev_blocker_rows: vec![2],
            rel_blocker_rows: vec![4],
            ..Project::new(1, "a")
        };
        assert_eq!(
            project.dependencies(),
            vec![
                (2, EdgeKind::DevBlocker),
                (3, EdgeKind::Plain),
                (4, EdgeKind::RelBlocker),
            ]
        );
    }

    #[test]
    fn test_clamping() {
        let project = Project {
            completed_pct: 140.0,
            dev_resources: -2.0,
            ..Project::new(1, "a")
        };
        assert!((project.clamped_completed_pct() - 100.0).abs() < 1e-9);
        assert_eq!(project.clamped_resources(), 0.0);
        assert!(!project.has_resources());
    }

    #[test]
    fn test_block_counts_total() {
        let mut counts = BlockCounts::default();
        counts.add(EdgeKind::DevBlocker);
        counts.add(EdgeKind::Plain);
        counts.add(EdgeKind::Plain);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.plain, 2);
    }
}
