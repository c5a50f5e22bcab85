//! Testing utilities and mock implementations.
//!
//! [`MockRunner`] stands in for the native openMVG/openMVS toolchains so
//! full reconstruction runs can be exercised without them.
//!
//! # Example
//!
//! ```rust,ignore
//! use openmvgo_core::testing::{fixtures, MockRunner};
//!
//! let runner = MockRunner::new();
//! runner.fail_program("openMVG_main_ComputeMatches", 1).await;
//!
//! let input = fixtures::image_folder(5);
//! // Build services with Arc::new(runner.clone())...
//!
//! assert!(!runner.ran("DensifyPointCloud").await);
//! ```

mod mock_runner;

pub use mock_runner::{MockRunner, RecordedInvocation};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;
    use tempfile::TempDir;

    /// Bytes of a tiny JPEG header; the mock tools only look at file names.
    const FAKE_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    /// Create a folder holding `count` fake images named `IMG_0001.JPG`...
    pub fn image_folder(count: usize) -> TempDir {
        let dir = TempDir::new().expect("Failed to create image folder");
        write_images(dir.path(), count);
        dir
    }

    /// Write `count` fake images into `dir`.
    pub fn write_images(dir: &Path, count: usize) {
        for i in 1..=count {
            std::fs::write(dir.join(format!("IMG_{:04}.JPG", i)), FAKE_JPEG)
                .expect("Failed to write fake image");
        }
    }

    /// Write a minimal camera sensor database and return its path.
    pub fn camera_db(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("sensor_width_camera_database.txt");
        std::fs::write(
            &path,
            "Canon;Canon EOS 5D Mark III;36\nNIKON CORPORATION;NIKON D800;35.9\n",
        )
        .expect("Failed to write camera database");
        path
    }
}
