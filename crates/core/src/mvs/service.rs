//! openMVS dense pipeline service.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::MvsSettings;
use crate::pipeline::{dir_has_entries, run_stages, PipelineError, Stage, StageReport};
use crate::runner::{CommandRunner, ToolInvocation};
use crate::staging::{FsStaging, StagingError};

use super::config::MvsConfig;

/// openMVS tools invoked by the dense pipeline, in order.
pub const MVS_TOOLS: &[&str] = &[
    "DensifyPointCloud",
    "ReconstructMesh",
    "RefineMesh",
    "TextureMesh",
];

/// Outcome of a dense reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MvsReport {
    /// Completed stages, in order.
    pub stages: Vec<StageReport>,
    /// Textured mesh in the output directory.
    pub mesh_file: PathBuf,
}

/// Drives openMVS from the exported scene to the textured mesh.
pub struct MvsService<R: CommandRunner> {
    config: MvsConfig,
    settings: MvsSettings,
    runner: Arc<R>,
    staging: FsStaging,
}

impl<R: CommandRunner> MvsService<R> {
    /// Creates a new service.
    pub fn new(config: MvsConfig, settings: MvsSettings, runner: Arc<R>, staging: FsStaging) -> Self {
        Self {
            config,
            settings,
            runner,
            staging,
        }
    }

    pub fn config(&self) -> &MvsConfig {
        &self.config
    }

    fn tool(&self, program: &str) -> ToolInvocation {
        ToolInvocation::in_bin_dir(self.settings.bin_dir.as_deref(), program)
    }

    /// Fails unless the sparse reconstruction left matches, a sparse model and
    /// the exported scene in the build directory.
    pub async fn check_preconditions(&self) -> Result<(), PipelineError> {
        for dir in [self.config.matches_dir(), self.config.reconstruction_dir()] {
            if !dir_has_entries(&dir).await {
                return Err(PipelineError::stage_b_precondition(format!(
                    "{} is missing or empty",
                    dir.display()
                )));
            }
        }

        let scene = self.config.scene_file();
        if !tokio::fs::try_exists(&scene).await.unwrap_or(false) {
            return Err(PipelineError::stage_b_precondition(format!(
                "{} does not exist",
                scene.display()
            )));
        }

        Ok(())
    }

    /// Densify, mesh, refine and texture stages.
    pub fn plan(&self) -> Vec<Stage> {
        let config = &self.config;
        let build = &config.build_dir;
        let level = config.mode.resolution_level().to_string();
        let export_type = self.settings.export_type.extension();

        vec![
            Stage::new(
                "densify",
                self.tool("DensifyPointCloud")
                    .arg("-i")
                    .arg_path(config.scene_file())
                    .arg("-o")
                    .arg_path(config.dense_scene())
                    .arg("-w")
                    .arg_path(build)
                    .arg("--resolution-level")
                    .arg(level.as_str()),
            )
            .requires(config.scene_file())
            .produces(config.dense_scene()),
            Stage::new(
                "mesh",
                self.tool("ReconstructMesh")
                    .arg("-i")
                    .arg_path(config.dense_scene())
                    .arg("-o")
                    .arg_path(config.mesh_scene())
                    .arg("-w")
                    .arg_path(build),
            )
            .requires(config.dense_scene())
            .produces(config.mesh_scene()),
            Stage::new(
                "refine",
                self.tool("RefineMesh")
                    .arg("-i")
                    .arg_path(config.mesh_scene())
                    .arg("-o")
                    .arg_path(config.refined_scene())
                    .arg("-w")
                    .arg_path(build)
                    .arg("--resolution-level")
                    .arg(level.as_str()),
            )
            .requires(config.mesh_scene())
            .produces(config.refined_scene()),
            Stage::new(
                "texture",
                self.tool("TextureMesh")
                    .arg("-i")
                    .arg_path(config.refined_scene())
                    .arg("-o")
                    .arg_path(config.textured_scene())
                    .arg("-w")
                    .arg_path(build)
                    .arg("--export-type")
                    .arg(export_type),
            )
            .requires(config.refined_scene())
            .produces(config.textured_mesh(export_type)),
        ]
    }

    /// Runs the dense pipeline into the output directory.
    ///
    /// Preconditions are checked before anything is spawned. On success the
    /// report names the textured mesh of the configured export type.
    pub async fn run_pipeline(&self) -> Result<MvsReport, PipelineError> {
        self.check_preconditions().await?;
        self.staging.ensure_dir(&self.config.output_dir).await?;

        info!(
            mode = %self.config.mode,
            export_type = self.settings.export_type.extension(),
            output = %self.config.output_dir.display(),
            "Starting dense reconstruction"
        );

        let stages = run_stages(self.runner.as_ref(), &self.plan()).await?;
        let mesh_file = self.find_mesh().await?;

        info!(mesh = %mesh_file.display(), "Dense reconstruction complete");
        Ok(MvsReport { stages, mesh_file })
    }

    /// The mesh TextureMesh was told to write. Other meshes already in the
    /// output directory are left alone.
    async fn find_mesh(&self) -> Result<PathBuf, PipelineError> {
        let extension = self.settings.export_type.extension();
        let mesh = self.config.textured_mesh(extension);
        if !tokio::fs::try_exists(&mesh).await.unwrap_or(false) {
            return Err(PipelineError::MissingOutput {
                stage: "texture".to_string(),
                path: mesh,
            });
        }

        let others = meshes_in(&self.config.output_dir, extension)
            .await
            .map_err(StagingError::Io)?
            .into_iter()
            .filter(|path| *path != mesh)
            .count();
        if others > 0 {
            warn!(
                others,
                extension,
                dir = %self.config.output_dir.display(),
                "Output directory holds other meshes"
            );
        }
        debug!(mesh = %mesh.display(), "Located textured mesh");
        Ok(mesh)
    }
}

/// Files directly inside `dir` with the given extension.
async fn meshes_in(dir: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut meshes = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches && entry.file_type().await?.is_file() {
            meshes.push(path);
        }
    }
    meshes.sort();
    Ok(meshes)
}
