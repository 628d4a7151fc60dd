//! Configuration types for the portfolio scheduler.

use pyo3::prelude::*;

/// Twelve months times two hundred years.
pub const DEFAULT_MAX_SEARCH_MONTHS: u32 = 2400;

/// Tunables for a scheduling pass.
///
/// Calendar inputs (start date, horizon, headcount) are passed to the scheduler
/// directly; this struct only holds knobs that rarely change between calls.
#[pyclass]
#[derive(Clone, Debug, PartialEq)]
pub struct SchedulingConfig {
    /// Productivity of one head as a percentage of full time (1-100).
    #[pyo3(get, set)]
    pub capacity_pct: f64,
    /// Trailing fraction of the timeline that counts as a long pole.
    #[pyo3(get, set)]
    pub long_pole_fraction: f64,
    /// Upper bound on the earliest-fit scan before a placement is declared infeasible.
    #[pyo3(get, set)]
    pub max_search_months: u32,
    /// Fail on dependency cycles instead of flushing them in rank order.
    #[pyo3(get, set)]
    pub strict_cycles: bool,
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    #[pyo3(get, set)]
    pub verbosity: u8,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            capacity_pct: 100.0,
            long_pole_fraction: 0.25,
            max_search_months: DEFAULT_MAX_SEARCH_MONTHS,
            strict_cycles: false,
            verbosity: 0,
        }
    }
}

impl SchedulingConfig {
    /// Capacity percentage clamped into the range the duration math accepts.
    pub fn effective_capacity_pct(&self) -> f64 {
        if self.capacity_pct.is_finite() {
            self.capacity_pct.clamp(1.0, 100.0)
        } else {
            100.0
        }
    }

    /// Returns a description of the first invalid field, if any.
    pub fn validate(&self) -> Option<String> {
        if !self.capacity_pct.is_finite() {
            return Some(format!(
                "capacity_pct must be finite, got {}",
                self.capacity_pct
            ));
        }
        if !(0.0..=1.0).contains(&self.long_pole_fraction) {
            return Some(format!(
                "long_pole_fraction must be within [0, 1], got {}",
                self.long_pole_fraction
            ));
        }
        None
    }
}

#[pymethods]
impl SchedulingConfig {
    #[new]
    #[pyo3(signature = (
        capacity_pct=100.0,
        long_pole_fraction=0.25,
        max_search_months=DEFAULT_MAX_SEARCH_MONTHS,
        strict_cycles=false,
        verbosity=0
    ))]
    fn new(
        capacity_pct: f64,
        long_pole_fraction: f64,
        max_search_months: u32,
        strict_cycles: bool,
        verbosity: u8,
    ) -> Self {
        Self {
            capacity_pct,
            long_pole_fraction,
            max_search_months,
            strict_cycles,
            verbosity,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "SchedulingConfig(capacity_pct={}, long_pole_fraction={}, strict_cycles={})",
            self.capacity_pct, self.long_pole_fraction, self.strict_cycles
        )
    }
}
