//! Filesystem staging for a reconstruction run.
//!
//! - [`FsStaging`]: directory creation, file copies, single-file downloads and
//!   the per-run temporary build directory
//! - [`CleanupStack`]: removal actions registered as intermediate files appear,
//!   unwound in reverse order on every exit path
//! - [`check`]: fail-fast assertion for environment misconfiguration

mod cleanup;
mod error;
mod fs;

pub use cleanup::{CleanupAction, CleanupReport, CleanupStack};
pub use error::StagingError;
pub use fs::{check, DownloadedFile, FsStaging};
