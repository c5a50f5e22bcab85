//! End-to-end reconstruction run.
//!
//! The orchestrator sequences one run:
//! - **Transfer**: download the input folder, upload the result if requested
//! - **Stage A**: sparse reconstruction with openMVG into a fresh build directory
//! - **Stage B**: dense reconstruction with openMVS into the output directory
//!
//! Intermediate files are registered on a cleanup stack as soon as they exist
//! and removed on every exit path.

mod runner;
mod types;

pub use runner::Orchestrator;
pub use types::RunReport;
