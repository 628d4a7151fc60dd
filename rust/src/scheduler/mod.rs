//! Capacity-constrained packing.
//!
//! The outer packer walks the ranked portfolio and gives each project the
//! earliest window where its dependencies have finished and organisational
//! headcount allows it. Pool parents are first packed internally against their
//! own slot count, then placed as a single container.

mod capacity;
mod core;
mod pool;

pub use capacity::MonthlyLedger;
pub use core::{month_boundary, month_origin, pack, PackOutcome, PortfolioScheduler, SchedulerError};
pub use pool::{pack_pool, PoolPack};
