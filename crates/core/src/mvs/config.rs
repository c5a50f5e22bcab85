//! Paths and preset of one dense reconstruction.

use std::path::PathBuf;

use crate::config::ConfigError;
use crate::sfm::{MATCHES_DIR, RECONSTRUCTION_DIR, SCENE_FILE};

use super::mode::MvsMode;

/// Densified point cloud scene, in the build dir.
pub const DENSE_SCENE_FILE: &str = "scene_dense.mvs";
/// Scene with the reconstructed mesh, in the build dir.
pub const MESH_SCENE_FILE: &str = "scene_dense_mesh.mvs";
/// Scene with the refined mesh, in the build dir.
pub const REFINED_SCENE_FILE: &str = "scene_dense_mesh_refine.mvs";
/// Textured scene, in the output dir. The mesh is written next to it.
pub const TEXTURED_SCENE_FILE: &str = "scene_dense_mesh_refine_texture.mvs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MvsConfig {
    /// Where the textured model is written.
    pub output_dir: PathBuf,
    /// Build directory shared with the sparse reconstruction.
    pub build_dir: PathBuf,
    pub mode: MvsMode,
}

impl MvsConfig {
    /// Creates the layout, rejecting an out-of-range `mode`.
    pub fn new(
        output_dir: impl Into<PathBuf>,
        build_dir: impl Into<PathBuf>,
        mode: i32,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            output_dir: output_dir.into(),
            build_dir: build_dir.into(),
            mode: MvsMode::new(mode)?,
        })
    }

    fn in_build(&self, name: &str) -> PathBuf {
        self.build_dir.join(name)
    }

    pub fn matches_dir(&self) -> PathBuf {
        self.in_build(MATCHES_DIR)
    }

    pub fn reconstruction_dir(&self) -> PathBuf {
        self.in_build(RECONSTRUCTION_DIR)
    }

    pub fn scene_file(&self) -> PathBuf {
        self.in_build(SCENE_FILE)
    }

    pub fn dense_scene(&self) -> PathBuf {
        self.in_build(DENSE_SCENE_FILE)
    }

    pub fn mesh_scene(&self) -> PathBuf {
        self.in_build(MESH_SCENE_FILE)
    }

    pub fn refined_scene(&self) -> PathBuf {
        self.in_build(REFINED_SCENE_FILE)
    }

    pub fn textured_scene(&self) -> PathBuf {
        self.output_dir.join(TEXTURED_SCENE_FILE)
    }

    /// Mesh file TextureMesh writes for `extension`.
    pub fn textured_mesh(&self, extension: &str) -> PathBuf {
        self.textured_scene().with_extension(extension)
    }
}
