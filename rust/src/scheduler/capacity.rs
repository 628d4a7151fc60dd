//! Month-indexed headcount ledger.

/// Running headcount per month against a fixed limit.
///
/// Used twice: once for organisational capacity (limit = configured headcount)
/// and once per pool (limit = concurrent member slots).
#[derive(Clone, Debug)]
pub struct MonthlyLedger {
    /// Ledger name (for logging)
    pub name: String,
    limit: f64,
    /// Reserved headcount indexed by month offset from the origin.
    usage: Vec<u32>,
}

impl MonthlyLedger {
    /// Negative or non-finite limits become zero: nothing with headcount fits.
    pub fn new(limit: f64, name: impl Into<String>) -> Self {
        let limit = if limit.is_finite() { limit.max(0.0) } else { 0.0 };
        Self {
            name: name.into(),
            limit,
            usage: Vec::new(),
        }
    }

    pub fn limit(&self) -> f64 {
        self.limit
    }

    #[inline]
    pub fn usage_at(&self, month: u32) -> u32 {
        self.usage.get(month as usize).copied().unwrap_or(0)
    }

    /// Months up to the last one with any reservation.
    pub fn horizon(&self) -> u32 {
        self.usage.len() as u32
    }

    /// First month in `[start, start + months)` where adding `reserved` would
    /// exceed the limit.
    fn first_conflict(&self, start: u32, months: u32, reserved: u32) -> Option<u32> {
        (start..start.saturating_add(months))
            .find(|&m| f64::from(self.usage_at(m) + reserved) > self.limit)
    }

    /// Whether `reserved` heads fit in every month of the window.
    /// Zero headcount always fits.
    pub fn can_fit(&self, start: u32, months: u32, reserved: u32) -> bool {
        reserved == 0 || self.first_conflict(start, months, reserved).is_none()
    }

    /// Earliest start at or after `from` where the whole window fits.
    ///
    /// Jumps past each conflicting month instead of stepping one at a time.
    /// Returns `None` when the headcount exceeds the limit outright or no
    /// window starts within `ceiling` months of `from`.
    pub fn earliest_fit(&self, from: u32, months: u32, reserved: u32, ceiling: u32) -> Option<u32> {
        if reserved == 0 {
            return Some(from);
        }
        if f64::from(reserved) > self.limit {
            return None;
        }
        let last_start = from.saturating_add(ceiling);
        let mut candidate = from;
        while candidate <= last_start {
            match self.first_conflict(candidate, months, reserved) {
                None => return Some(candidate),
                Some(conflict) => candidate = conflict + 1,
            }
        }
        None
    }

    /// Record `reserved` heads for every month of the window.
    pub fn reserve(&mut self, start: u32, months: u32, reserved: u32) {
        if reserved == 0 || months == 0 {
            return;
        }
        let end = start.saturating_add(months) as usize;
        if self.usage.len() < end {
            self.usage.resize(end, 0);
        }
        for slot in &mut self.usage[start as usize..end] {
            *slot += reserved;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ledger_fits_immediately() {
        let ledger = MonthlyLedger::new(2.0, "test");
        assert_eq!(ledger.earliest_fit(3, 4, 2, 100), Some(3));
        assert_eq!(ledger.horizon(), 0);
    }

    #[test]
    fn test_reserve_accumulates() {
        let mut ledger = MonthlyLedger::new(5.0, "test");
        ledger.reserve(1, 2, 2);
        ledger.reserve(2, 2, 1);
        assert_eq!(ledger.usage_at(0), 0);
        assert_eq!(ledger.usage_at(1), 2);
        assert_eq!(ledger.usage_at(2), 3);
        assert_eq!(ledger.usage_at(3), 1);
        assert_eq!(ledger.horizon(), 4);
    }

    #[test]
    fn test_earliest_fit_skips_past_conflicts() {
        let mut ledger = MonthlyLedger::new(2.0, "test");
        ledger.reserve(0, 2, 2);
        ledger.reserve(3, 1, 2);
        // Needs 2 months at 1 head: months 0-1 full, month 2 free, month 3 full.
        assert_eq!(ledger.earliest_fit(0, 2, 1, 100), Some(4));
        assert_eq!(ledger.earliest_fit(0, 1, 1, 100), Some(2));
    }

    #[test]
    fn test_zero_headcount_always_fits() {
        let mut ledger = MonthlyLedger::new(1.0, "test");
        ledger.reserve(0, 10, 1);
        assert!(ledger.can_fit(0, 10, 0));
        assert_eq!(ledger.earliest_fit(0, 10, 0, 0), Some(0));
    }

    #[test]
    fn test_oversized_request_is_infeasible() {
        let ledger = MonthlyLedger::new(2.0, "test");
        assert_eq!(ledger.earliest_fit(0, 1, 3, 100), None);
    }

    #[test]
    fn test_ceiling_bounds_search() {
        let mut ledger = MonthlyLedger::new(1.0, "test");
        ledger.reserve(0, 50, 1);
        assert_eq!(ledger.earliest_fit(0, 1, 1, 10), None);
        assert_eq!(ledger.earliest_fit(0, 1, 1, 50), Some(50));
    }

    #[test]
    fn test_fractional_limit() {
        let mut ledger = MonthlyLedger::new(2.5, "test");
        ledger.reserve(0, 1, 2);
        assert!(!ledger.can_fit(0, 1, 1));
        assert!(ledger.can_fit(1, 1, 2));
    }

    #[test]
    fn test_negative_limit_clamped() {
        let ledger = MonthlyLedger::new(-3.0, "test");
        assert_eq!(ledger.limit(), 0.0);
        assert!(!ledger.can_fit(0, 1, 1));
    }
}
