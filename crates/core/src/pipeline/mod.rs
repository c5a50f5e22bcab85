//! Ordered chains of external tool stages.
//!
//! Both reconstruction services describe their work as a list of [`Stage`]s
//! (tool invocation, required input paths, produced output paths) and hand
//! it to [`run_stages`], which stops at the first failure.

mod error;
mod stage;

pub use error::PipelineError;
pub use stage::{dir_has_entries, run_stages, Stage, StageReport};
