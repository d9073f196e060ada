//! Execution-order analysis: peak memory search, liveness and rewriting.

pub mod liveness;
pub mod peak;
pub mod rewrite;

pub use liveness::{lifetimes, live_sets_for, peak_bytes, Lifetime, ScheduleStep};
pub use peak::{schedule, Schedule, SchedulerConfig, SourceAccounting};
pub use rewrite::{apply, validate_order, RewriteOutcome};
