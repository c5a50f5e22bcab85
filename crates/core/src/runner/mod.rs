//! Command runner module for invoking the external photogrammetry tools.
//!
//! This module provides the `CommandRunner` trait and a `ProcessRunner`
//! implementation backed by `tokio::process`. Every pipeline stage goes
//! through a runner, so the stage chains can be exercised with
//! [`crate::testing::MockRunner`] instead of the native toolchains.
//!
//! # Example
//!
//! ```ignore
//! use openmvgo_core::runner::{CommandRunner, ProcessRunner, ToolInvocation};
//!
//! let runner = ProcessRunner::with_defaults();
//! let invocation = ToolInvocation::new("openMVG_main_SfMInit_ImageListing")
//!     .arg("-i")
//!     .arg_path(&input_dir)
//!     .arg("-o")
//!     .arg_path(&matches_dir);
//!
//! let output = runner.run(&invocation).await?;
//! println!("Finished in {} ms", output.duration_ms);
//! ```

mod error;
mod process;
mod traits;
mod types;

pub use error::RunnerError;
pub use process::{locate_program, ProcessRunner};
pub use traits::CommandRunner;
pub use types::{ToolInvocation, ToolOutput};
