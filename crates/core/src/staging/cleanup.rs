//! Deferred removal of intermediate files and directories.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A single removal registered on a [`CleanupStack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupAction {
    /// Remove one file.
    RemoveFile(PathBuf),
    /// Remove a directory and everything below it.
    RemoveDir(PathBuf),
}

impl CleanupAction {
    /// Path targeted by this action.
    pub fn path(&self) -> &Path {
        match self {
            Self::RemoveFile(path) | Self::RemoveDir(path) => path,
        }
    }
}

/// Result of unwinding a cleanup stack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Files that were removed.
    pub files_removed: usize,
    /// Directories that were removed.
    pub directories_removed: usize,
    /// Entries whose path was already gone.
    pub already_absent: usize,
    /// Failures, one line each. Cleanup never aborts on these.
    pub errors: Vec<String>,
}

impl CleanupReport {
    /// Whether every entry was removed or already absent.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Stack of removal actions, unwound last-registered-first.
///
/// Register an action as soon as the resource is known to exist. If the
/// stack is dropped without [`CleanupStack::unwind`] having been called
/// (early return through `?`, panic), it unwinds itself.
///
/// Removal is synchronous because it may run from `Drop`.
#[derive(Debug, Default)]
pub struct CleanupStack {
    actions: Vec<CleanupAction>,
}

impl CleanupStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers removal of a file.
    pub fn remove_file(&mut self, path: impl Into<PathBuf>) {
        self.push(CleanupAction::RemoveFile(path.into()));
    }

    /// Registers recursive removal of a directory.
    pub fn remove_dir(&mut self, path: impl Into<PathBuf>) {
        self.push(CleanupAction::RemoveDir(path.into()));
    }

    /// Registers an action.
    pub fn push(&mut self, action: CleanupAction) {
        debug!(path = %action.path().display(), "Registered cleanup");
        self.actions.push(action);
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Pending actions in registration order.
    pub fn pending(&self) -> &[CleanupAction] {
        &self.actions
    }

    /// Runs every pending action in reverse registration order.
    ///
    /// Paths that no longer exist count as already absent, so unwinding a
    /// stack twice (or registering the same path twice) never errors.
    pub fn unwind(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        while let Some(action) = self.actions.pop() {
            let result = match &action {
                CleanupAction::RemoveFile(path) => std::fs::remove_file(path),
                CleanupAction::RemoveDir(path) => std::fs::remove_dir_all(path),
            };

            match result {
                Ok(()) => match action {
                    CleanupAction::RemoveFile(_) => report.files_removed += 1,
                    CleanupAction::RemoveDir(_) => report.directories_removed += 1,
                },
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    report.already_absent += 1;
                }
                Err(e) => {
                    warn!(path = %action.path().display(), error = %e, "Cleanup failed");
                    report
                        .errors
                        .push(format!("Failed to remove {}: {}", action.path().display(), e));
                }
            }
        }

        report
    }
}

impl Drop for CleanupStack {
    fn drop(&mut self) {
        if !self.actions.is_empty() {
            debug!(pending = self.actions.len(), "Unwinding cleanup stack on drop");
            self.unwind();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_stack_is_empty() {
        let stack = CleanupStack::new();
        assert!(stack.is_empty());
        assert_eq!(stack.len(), 0);
    }

    #[test]
    fn test_unwind_removes_files_and_dirs() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("sensor_width_camera_database.txt");
        let dir = temp.path().join("matches");
        std::fs::write(&file, b"db").unwrap();
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested/sfm_data.json"), b"{}").unwrap();

        let mut stack = CleanupStack::new();
        stack.remove_file(&file);
        stack.remove_dir(&dir);

        let report = stack.unwind();
        assert_eq!(report.files_removed, 1);
        assert_eq!(report.directories_removed, 1);
        assert!(report.is_clean());
        assert!(!file.exists());
        assert!(!dir.exists());
        assert!(stack.is_empty());
    }

    #[test]
    fn test_unwind_twice_is_noop() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("reconstruction");
        std::fs::create_dir(&dir).unwrap();

        let mut stack = CleanupStack::new();
        stack.remove_dir(&dir);
        stack.unwind();

        let second = stack.unwind();
        assert!(second.is_clean());
        assert_eq!(second.directories_removed, 0);
    }

    #[test]
    fn test_already_removed_path_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("matches");
        std::fs::create_dir(&dir).unwrap();

        let mut stack = CleanupStack::new();
        stack.remove_dir(&dir);
        stack.remove_dir(&dir);
        stack.remove_file(temp.path().join("never-created"));

        let report = stack.unwind();
        assert!(report.is_clean());
        assert_eq!(report.directories_removed, 1);
        assert_eq!(report.already_absent, 2);
    }

    #[test]
    fn test_unwind_order_is_reverse_of_registration() {
        let temp = TempDir::new().unwrap();
        let outer = temp.path().join("build");
        let inner = outer.join("matches");
        std::fs::create_dir_all(&inner).unwrap();

        let mut stack = CleanupStack::new();
        stack.remove_dir(&outer);
        stack.remove_dir(&inner);

        assert_eq!(stack.pending()[0], CleanupAction::RemoveDir(outer.clone()));

        // inner goes first, then outer; nothing is reported missing
        let report = stack.unwind();
        assert_eq!(report.directories_removed, 2);
        assert_eq!(report.already_absent, 0);
    }

    #[test]
    fn test_drop_unwinds_pending_actions() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("scene.mvs");
        std::fs::write(&file, b"mvs").unwrap();

        {
            let mut stack = CleanupStack::new();
            stack.remove_file(&file);
        }

        assert!(!file.exists());
    }

    #[test]
    fn test_drop_unwinds_during_error_propagation() {
        fn failing_step(stack: &mut CleanupStack, path: &Path) -> Result<(), String> {
            stack.remove_file(path);
            Err("matching failed".to_string())
        }

        fn run(path: &Path) -> Result<(), String> {
            let mut stack = CleanupStack::new();
            failing_step(&mut stack, path)?;
            stack.unwind();
            Ok(())
        }

        let temp = TempDir::new().unwrap();
        let file = temp.path().join("matches.putative.bin");
        std::fs::write(&file, b"bin").unwrap();

        assert!(run(&file).is_err());
        assert!(!file.exists());
    }
}
