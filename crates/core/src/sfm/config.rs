//! Paths used by the sparse reconstruction.

use std::path::{Path, PathBuf};

/// Subdirectory of the build dir holding features and matches.
pub const MATCHES_DIR: &str = "matches";

/// Subdirectory of the build dir holding the sparse model.
pub const RECONSTRUCTION_DIR: &str = "reconstruction";

/// openMVS scene exported from the sparse model, in the build dir root.
pub const SCENE_FILE: &str = "scene.mvs";

/// Name of the staged camera sensor database.
pub const CAMERA_DB_FILE_NAME: &str = "sensor_width_camera_database.txt";

/// Directory layout of one sparse reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfmConfig {
    /// Folder holding the input images.
    pub input_dir: PathBuf,
    /// Run's build directory.
    pub build_dir: PathBuf,
    /// Staged camera database; filled in by `populate`.
    pub camera_db_file: Option<PathBuf>,
    /// `<build>/matches`
    pub matches_dir: PathBuf,
    /// `<build>/reconstruction`
    pub reconstruction_dir: PathBuf,
}

impl SfmConfig {
    /// Creates the layout for `input_dir` under `build_dir`.
    pub fn new(
        input_dir: impl Into<PathBuf>,
        build_dir: impl Into<PathBuf>,
        camera_db_file: Option<PathBuf>,
    ) -> Self {
        let build_dir = build_dir.into();
        Self {
            input_dir: input_dir.into(),
            matches_dir: build_dir.join(MATCHES_DIR),
            reconstruction_dir: build_dir.join(RECONSTRUCTION_DIR),
            camera_db_file,
            build_dir,
        }
    }

    /// `<matches>/sfm_data.json`, the scene description written by image listing.
    pub fn sfm_data_json(&self) -> PathBuf {
        self.matches_dir.join("sfm_data.json")
    }

    /// `<reconstruction>/sfm_data.bin`, the sparse model.
    pub fn sparse_model(&self) -> PathBuf {
        self.reconstruction_dir.join("sfm_data.bin")
    }

    /// `<reconstruction>/sfm_data_extrinsics.json`, views and poses of the sparse model.
    pub fn sparse_summary(&self) -> PathBuf {
        self.reconstruction_dir.join("sfm_data_extrinsics.json")
    }

    /// `<build>/scene.mvs`, the input of the dense reconstruction.
    pub fn scene_file(&self) -> PathBuf {
        self.build_dir.join(SCENE_FILE)
    }

    /// `<build>/undistorted_images`
    pub fn undistorted_dir(&self) -> PathBuf {
        self.build_dir.join("undistorted_images")
    }

    /// Where `populate` stages the camera database.
    pub fn staged_camera_db(&self, source_name: Option<&Path>) -> PathBuf {
        let name = source_name
            .and_then(Path::file_name)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CAMERA_DB_FILE_NAME));
        self.build_dir.join(name)
    }
}
