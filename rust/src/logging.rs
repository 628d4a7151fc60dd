//! Verbosity-gated logging for the scheduling engine.
//!
//! Everything goes to stderr and compiles down to a single integer compare when
//! the level is off. Levels:
//! - 0: SILENT (nothing; degraded output is reported on the result instead)
//! - 1: CHANGES (placements, pool containers, warnings)
//! - 2: CHECKS (fit probes, readiness decisions)
//! - 3: DEBUG (ledger internals, rank keys)

pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Log a warning at CHANGES level (verbosity >= 1). Used for output the
/// caller should know is approximate: flushed cycles, dangling references,
/// infeasible placements.
#[macro_export]
macro_rules! log_warning {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            eprintln!("warning: {}", format_args!($($arg)*));
        }
    };
}

/// Log at CHANGES level (verbosity >= 1).
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            eprintln!($($arg)*);
        }
    };
}

/// Log at CHECKS level (verbosity >= 2).
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHECKS {
            eprintln!($($arg)*);
        }
    };
}

/// Log at DEBUG level (verbosity >= 3).
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            eprintln!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered() {
        assert!(VERBOSITY_SILENT < VERBOSITY_CHANGES);
        assert!(VERBOSITY_CHANGES < VERBOSITY_CHECKS);
        assert!(VERBOSITY_CHECKS < VERBOSITY_DEBUG);
    }

    #[test]
    fn test_log_macros_compile() {
        let verbosity = VERBOSITY_SILENT;
        log_changes!(verbosity, "placed {}", 1);
        log_checks!(verbosity, "probe {}", 2);
        log_debug!(verbosity, "ledger {}", 3);
        log_warning!(verbosity, "flushed {}", 4);
    }

    #[test]
    fn test_warning_silent_at_level_zero() {
        let mut formatted = 0;
        log_warning!(VERBOSITY_SILENT, "row {}", {
            formatted += 1;
            formatted
        });
        assert_eq!(formatted, 0);

        log_warning!(VERBOSITY_CHANGES, "row {}", {
            formatted += 1;
            formatted
        });
        assert_eq!(formatted, 1);
    }
}
