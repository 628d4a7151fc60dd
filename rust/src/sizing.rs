//! Effort sizing and duration arithmetic.
//!
//! All durations are whole calendar months. A project's duration comes from,
//! in order of preference: person-months over headcount, an explicit duration
//! override, or its sizing label. Every path is scaled by the fraction of work
//! still remaining.

use std::str::FromStr;

use crate::models::Project;

/// T-shirt size of a project, mapped to a fixed number of months.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizingLabel {
    ExtraSmall,
    Small,
    Medium,
    Large,
    ExtraLarge,
    DoubleExtraLarge,
}

impl SizingLabel {
    pub fn months(self) -> f64 {
        match self {
            Self::ExtraSmall => 1.0,
            Self::Small => 3.0,
            Self::Medium => 5.0,
            Self::Large => 8.0,
            Self::ExtraLarge => 12.0,
            Self::DoubleExtraLarge => 18.0,
        }
    }
}

impl FromStr for SizingLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "xs" | "extra small" => Ok(Self::ExtraSmall),
            "s" | "small" => Ok(Self::Small),
            "m" | "medium" => Ok(Self::Medium),
            "l" | "large" => Ok(Self::Large),
            "xl" | "extra large" => Ok(Self::ExtraLarge),
            "xxl" | "2xl" => Ok(Self::DoubleExtraLarge),
            _ => Err(format!("Unknown sizing label: {}", s)),
        }
    }
}

/// Outcome of a duration calculation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DurationEstimate {
    pub months: u32,
    /// No person-months, override, or label was usable.
    pub missing_data: bool,
}

impl DurationEstimate {
    /// Duration used for placement: missing data still occupies one month.
    pub fn placement_months(&self) -> u32 {
        self.months.max(1)
    }
}

fn remaining_fraction(project: &Project) -> f64 {
    (100.0 - project.clamped_completed_pct()) / 100.0
}

/// Ceiling of a positive month count, floored at one month.
fn whole_months(months: f64) -> u32 {
    (months.ceil() as u32).max(1)
}

/// Duration implied by the override or the sizing label, ignoring headcount.
///
/// This is also what a demoted pool parent contributes to its pool.
pub fn individual_duration(project: &Project) -> Option<u32> {
    let fraction = remaining_fraction(project);
    if let Some(explicit) = project.duration_months {
        if explicit.is_finite() && explicit > 0.0 {
            return Some(whole_months(explicit * fraction));
        }
    }
    let label = project
        .sizing_label
        .as_deref()
        .and_then(|label| label.parse::<SizingLabel>().ok())?;
    Some(whole_months(label.months() * fraction))
}

/// Months of work remaining for a project at the given per-head productivity.
///
/// `ceil(person_months * remaining / (headcount * capacity_pct / 100))`, at
/// least one month, when both effort and headcount are positive. Otherwise
/// falls back to [`individual_duration`]; with nothing usable the result is
/// zero months and flagged as missing.
pub fn remaining_duration(project: &Project, capacity_pct: f64) -> DurationEstimate {
    let resources = project.clamped_resources();
    let capacity = capacity_pct.clamp(1.0, 100.0) / 100.0;
    if let Some(person_months) = project.total_person_months {
        if person_months.is_finite() && person_months > 0.0 && resources > 0.0 {
            let remaining = person_months * remaining_fraction(project);
            return DurationEstimate {
                months: whole_months(remaining / (resources * capacity)),
                missing_data: false,
            };
        }
    }
    match individual_duration(project) {
        Some(months) => DurationEstimate {
            months,
            missing_data: false,
        },
        None => DurationEstimate {
            months: 0,
            missing_data: true,
        },
    }
}

/// Time budget of a pool: `ceil(person_months / (headcount * capacity_pct / 100))`.
///
/// At least one month for valid inputs; zero when either input is missing.
pub fn pool_budget_months(person_months: f64, resources: f64, capacity_pct: f64) -> u32 {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(person_months) || !valid(resources) {
        return 0;
    }
    let capacity = capacity_pct.clamp(1.0, 100.0) / 100.0;
    whole_months(person_months / (resources * capacity))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(person_months: Option<f64>, resources: f64, completed: f64) -> Project {
        Project {
            total_person_months: person_months,
            dev_resources: resources,
            completed_pct: completed,
            ..Project::new(1, "p")
        }
    }

    #[test]
    fn test_person_months_over_headcount() {
        let project = sized(Some(10.0), 2.0, 0.0);
        assert_eq!(remaining_duration(&project, 100.0).months, 5);
        // 10 / (2 * 0.8) = 6.25 -> 7
        assert_eq!(remaining_duration(&project, 80.0).months, 7);
    }

    #[test]
    fn test_completion_scales_remaining_work() {
        let project = sized(Some(12.0), 2.0, 50.0);
        assert_eq!(remaining_duration(&project, 100.0).months, 3);
    }

    #[test]
    fn test_finished_work_floors_at_one_month() {
        let project = sized(Some(12.0), 2.0, 100.0);
        let estimate = remaining_duration(&project, 100.0);
        assert_eq!(estimate.months, 1);
        assert!(!estimate.missing_data);
    }

    #[test]
    fn test_explicit_override_fallback() {
        let project = Project {
            duration_months: Some(4.0),
            completed_pct: 50.0,
            ..Project::new(1, "p")
        };
        assert_eq!(remaining_duration(&project, 100.0).months, 2);
    }

    #[test]
    fn test_label_fallback() {
        let project = Project {
            sizing_label: Some("Large".to_string()),
            completed_pct: 25.0,
            ..Project::new(1, "p")
        };
        // 8 * 0.75 = 6
        assert_eq!(remaining_duration(&project, 100.0).months, 6);
    }

    #[test]
    fn test_headcount_without_effort_uses_label() {
        let project = Project {
            dev_resources: 3.0,
            sizing_label: Some("s".to_string()),
            ..Project::new(1, "p")
        };
        assert_eq!(remaining_duration(&project, 100.0).months, 3);
    }

    #[test]
    fn test_missing_data_flagged() {
        let project = sized(None, 0.0, 0.0);
        let estimate = remaining_duration(&project, 100.0);
        assert_eq!(estimate.months, 0);
        assert!(estimate.missing_data);
        assert_eq!(estimate.placement_months(), 1);
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!("small".parse::<SizingLabel>(), Ok(SizingLabel::Small));
        assert_eq!(" XL ".parse::<SizingLabel>(), Ok(SizingLabel::ExtraLarge));
        assert_eq!(
            "extra-small".parse::<SizingLabel>(),
            Ok(SizingLabel::ExtraSmall)
        );
        assert!("huge".parse::<SizingLabel>().is_err());
    }

    #[test]
    fn test_pool_budget() {
        assert_eq!(pool_budget_months(9.0, 3.0, 100.0), 3);
        assert_eq!(pool_budget_months(10.0, 3.0, 100.0), 4);
        assert_eq!(pool_budget_months(9.0, 3.0, 50.0), 6);
        assert_eq!(pool_budget_months(0.0, 3.0, 100.0), 0);
        assert_eq!(pool_budget_months(9.0, 0.0, 100.0), 0);
    }
}
