//! Peak working-memory analysis and operator reordering for TFLite models.

pub mod error;
pub mod ir;
pub mod model;
pub mod parse;
pub mod quantize;
pub mod report;
pub mod schedule;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
pub use model::TfliteModel;
pub use report::Report;
pub use schedule::{RewriteOutcome, Schedule, SchedulerConfig, SourceAccounting};
