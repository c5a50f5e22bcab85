//! openMVG sequential pipeline service.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::SfmSettings;
use crate::pipeline::{dir_has_entries, run_stages, PipelineError, Stage, StageReport};
use crate::runner::{CommandRunner, ToolInvocation};
use crate::staging::FsStaging;

use super::config::SfmConfig;
use super::model::read_sparse_summary;

/// openMVG tools invoked by the sequential pipeline, in order.
pub const SFM_TOOLS: &[&str] = &[
    "openMVG_main_SfMInit_ImageListing",
    "openMVG_main_ComputeFeatures",
    "openMVG_main_PairGenerator",
    "openMVG_main_ComputeMatches",
    "openMVG_main_GeometricFilter",
    "openMVG_main_SfM",
    "openMVG_main_ConvertSfM_DataFormat",
    "openMVG_main_openMVG2openMVS",
];

/// Outcome of a sparse reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SfmReport {
    /// Completed stages, in order.
    pub stages: Vec<StageReport>,
    /// Views listed from the input images.
    pub views: usize,
    /// Views with a recovered camera pose.
    pub registered_cameras: usize,
    /// openMVS scene handed to the dense reconstruction.
    pub scene_file: PathBuf,
}

/// Drives openMVG from image listing to the openMVS scene export.
pub struct SfmService<R: CommandRunner> {
    config: SfmConfig,
    settings: SfmSettings,
    runner: Arc<R>,
    staging: FsStaging,
}

impl<R: CommandRunner> SfmService<R> {
    /// Creates a new service.
    pub fn new(config: SfmConfig, settings: SfmSettings, runner: Arc<R>, staging: FsStaging) -> Self {
        Self {
            config,
            settings,
            runner,
            staging,
        }
    }

    /// Returns the directory layout, including the staged camera database once populated.
    pub fn config(&self) -> &SfmConfig {
        &self.config
    }

    fn tool(&self, program: &str) -> ToolInvocation {
        ToolInvocation::in_bin_dir(self.settings.bin_dir.as_deref(), program)
    }

    /// Prepares the build directory.
    ///
    /// Creates the build, matches and reconstruction directories and stages
    /// the camera sensor database (copied from `camera_db_file`, or
    /// downloaded from `camera_db_url`).
    pub async fn populate(&mut self) -> Result<(), PipelineError> {
        if !dir_has_entries(&self.config.input_dir).await {
            return Err(PipelineError::EmptyInput {
                path: self.config.input_dir.clone(),
            });
        }

        self.staging.ensure_dir(&self.config.build_dir).await?;

        let target = self
            .config
            .staged_camera_db(self.settings.camera_db_file.as_deref());
        match &self.settings.camera_db_file {
            Some(source) => {
                self.staging.copy_file(source, &target).await?;
            }
            None => {
                let downloaded = self
                    .staging
                    .download_file(&self.settings.camera_db_url)
                    .await?;
                self.staging.copy_file(downloaded.path(), &target).await?;
            }
        }
        info!(path = %target.display(), "Camera database staged");
        self.config.camera_db_file = Some(target);

        self.staging.ensure_dir(&self.config.matches_dir).await?;
        self.staging.ensure_dir(&self.config.reconstruction_dir).await?;

        Ok(())
    }

    fn camera_db(&self) -> Result<PathBuf, PipelineError> {
        self.config
            .camera_db_file
            .clone()
            .ok_or_else(|| PipelineError::MissingInput {
                stage: "listing".to_string(),
                path: self.config.staged_camera_db(None),
            })
    }

    /// Stages from image listing through the sparse model summary export.
    pub fn sparse_stages(&self) -> Result<Vec<Stage>, PipelineError> {
        let camera_db = self.camera_db()?;
        let config = &self.config;
        let sfm_data = config.sfm_data_json();
        let pairs = config.matches_dir.join("pairs.bin");
        let putative = config.matches_dir.join("matches.putative.bin");
        let model = &self.settings.geometric_model;
        let filtered_name = format!("matches.{}.bin", model);
        let filtered = config.matches_dir.join(&filtered_name);
        let sparse_model = config.sparse_model();

        Ok(vec![
            Stage::new(
                "listing",
                self.tool("openMVG_main_SfMInit_ImageListing")
                    .arg("-i")
                    .arg_path(&config.input_dir)
                    .arg("-o")
                    .arg_path(&config.matches_dir)
                    .arg("-d")
                    .arg_path(&camera_db),
            )
            .requires(&config.input_dir)
            .requires(&camera_db)
            .produces(&sfm_data),
            Stage::new(
                "features",
                self.tool("openMVG_main_ComputeFeatures")
                    .arg("-i")
                    .arg_path(&sfm_data)
                    .arg("-o")
                    .arg_path(&config.matches_dir)
                    .arg("-m")
                    .arg(&self.settings.describer_method)
                    .arg("-p")
                    .arg(&self.settings.describer_preset),
            )
            .requires(&sfm_data)
            .produces(config.matches_dir.join("image_describer.json")),
            Stage::new(
                "pairs",
                self.tool("openMVG_main_PairGenerator")
                    .arg("-i")
                    .arg_path(&sfm_data)
                    .arg("-o")
                    .arg_path(&pairs),
            )
            .requires(&sfm_data)
            .produces(&pairs),
            Stage::new(
                "matching",
                self.tool("openMVG_main_ComputeMatches")
                    .arg("-i")
                    .arg_path(&sfm_data)
                    .arg("-p")
                    .arg_path(&pairs)
                    .arg("-o")
                    .arg_path(&putative),
            )
            .requires(&pairs)
            .produces(&putative),
            Stage::new(
                "filtering",
                self.tool("openMVG_main_GeometricFilter")
                    .arg("-i")
                    .arg_path(&sfm_data)
                    .arg("-m")
                    .arg_path(&putative)
                    .arg("-g")
                    .arg(model)
                    .arg("-o")
                    .arg_path(&filtered),
            )
            .requires(&putative)
            .produces(&filtered),
            Stage::new(
                "reconstruction",
                self.tool("openMVG_main_SfM")
                    .arg("--sfm_engine")
                    .arg("INCREMENTAL")
                    .arg("--input_file")
                    .arg_path(&sfm_data)
                    .arg("--match_dir")
                    .arg_path(&config.matches_dir)
                    .arg("--match_file")
                    .arg(filtered_name.as_str())
                    .arg("--output_dir")
                    .arg_path(&config.reconstruction_dir),
            )
            .requires(&filtered)
            .produces(&sparse_model),
            Stage::new(
                "inspect",
                self.tool("openMVG_main_ConvertSfM_DataFormat")
                    .arg("-i")
                    .arg_path(&sparse_model)
                    .arg("-o")
                    .arg_path(config.sparse_summary())
                    .arg("-V")
                    .arg("-I")
                    .arg("-E"),
            )
            .requires(&sparse_model)
            .produces(config.sparse_summary()),
        ])
    }

    /// Stage converting the sparse model into the openMVS scene.
    pub fn export_stage(&self) -> Stage {
        let config = &self.config;
        Stage::new(
            "export",
            self.tool("openMVG_main_openMVG2openMVS")
                .arg("-i")
                .arg_path(config.sparse_model())
                .arg("-o")
                .arg_path(config.scene_file())
                .arg("-d")
                .arg_path(config.undistorted_dir()),
        )
        .requires(config.sparse_model())
        .produces(config.scene_file())
    }

    /// Runs listing, features, pairs, matching, filtering, incremental SfM
    /// and export, in that order.
    ///
    /// Between the SfM and the export the registered camera count is checked
    /// against `min_registered_cameras`. Any failure stops the chain.
    pub async fn run_sequential_pipeline(&self) -> Result<SfmReport, PipelineError> {
        let sparse = self.sparse_stages()?;
        info!(input = %self.config.input_dir.display(), "Starting sparse reconstruction");

        let mut stages = run_stages(self.runner.as_ref(), &sparse).await?;

        let summary = read_sparse_summary(&self.config.sparse_summary()).await?;
        if summary.registered_cameras < self.settings.min_registered_cameras {
            return Err(PipelineError::TooFewCameras {
                registered: summary.registered_cameras,
                required: self.settings.min_registered_cameras,
            });
        }
        if summary.registered_cameras < summary.views {
            warn!(
                registered = summary.registered_cameras,
                views = summary.views,
                "Not every view was registered"
            );
        }
        info!(
            registered = summary.registered_cameras,
            views = summary.views,
            "Sparse reconstruction complete"
        );

        stages.extend(run_stages(self.runner.as_ref(), &[self.export_stage()]).await?);

        Ok(SfmReport {
            stages,
            views: summary.views,
            registered_cameras: summary.registered_cameras,
            scene_file: self.config.scene_file(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockRunner};
    use tempfile::TempDir;

    struct Harness {
        runner: MockRunner,
        service: SfmService<MockRunner>,
        _input: TempDir,
        _build: TempDir,
        _assets: TempDir,
    }

    fn harness(images: usize) -> Harness {
        let input = fixtures::image_folder(images);
        let build = TempDir::new().unwrap();
        let assets = TempDir::new().unwrap();
        let settings = SfmSettings {
            camera_db_file: Some(fixtures::camera_db(assets.path())),
            ..Default::default()
        };
        let runner = MockRunner::new();
        let staging = FsStaging::new(5).unwrap().with_temp_root(assets.path());
        let service = SfmService::new(
            SfmConfig::new(input.path(), build.path(), None),
            settings,
            Arc::new(runner.clone()),
            staging,
        );
        Harness {
            runner,
            service,
            _input: input,
            _build: build,
            _assets: assets,
        }
    }

    #[tokio::test]
    async fn test_populate_stages_build_tree() {
        let mut h = harness(2);
        h.service.populate().await.unwrap();

        let config = h.service.config();
        assert!(config.matches_dir.is_dir());
        assert!(config.reconstruction_dir.is_dir());
        let db = config.camera_db_file.as_ref().unwrap();
        assert!(db.starts_with(&config.build_dir));
        assert!(std::fs::read_to_string(db).unwrap().contains("Canon EOS 5D"));
        assert_eq!(h.runner.invocation_count().await, 0);
    }

    #[tokio::test]
    async fn test_populate_rejects_empty_input() {
        let empty = TempDir::new().unwrap();
        let build = TempDir::new().unwrap();
        let mut service = SfmService::new(
            SfmConfig::new(empty.path(), build.path(), None),
            SfmSettings::default(),
            Arc::new(MockRunner::new()),
            FsStaging::new(5).unwrap(),
        );
        let err = service.populate().await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput { .. }));
    }

    #[tokio::test]
    async fn test_stages_require_populate() {
        let h = harness(2);
        assert!(matches!(
            h.service.sparse_stages(),
            Err(PipelineError::MissingInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_stage_arguments() {
        let mut h = harness(2);
        h.service.populate().await.unwrap();
        let stages = h.service.sparse_stages().unwrap();
        let names: Vec<_> = stages.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec!["listing", "features", "pairs", "matching", "filtering", "reconstruction", "inspect"]
        );

        let features = &stages[1].invocation;
        assert_eq!(features.flag_value("-m"), Some("SIFT"));
        assert_eq!(features.flag_value("-p"), Some("NORMAL"));

        let sfm = &stages[5].invocation;
        assert_eq!(sfm.flag_value("--sfm_engine"), Some("INCREMENTAL"));
        assert_eq!(sfm.flag_value("--match_file"), Some("matches.f.bin"));

        let export = h.service.export_stage();
        assert_eq!(export.invocation.program_name(), "openMVG_main_openMVG2openMVS");
    }

    #[tokio::test]
    async fn test_bin_dir_prefixes_programs() {
        let mut h = harness(2);
        h.service.settings.bin_dir = Some(PathBuf::from("/opt/openmvg/bin"));
        h.service.populate().await.unwrap();
        let stages = h.service.sparse_stages().unwrap();
        assert_eq!(
            stages[0].invocation.program,
            PathBuf::from("/opt/openmvg/bin/openMVG_main_SfMInit_ImageListing")
        );
    }

    #[tokio::test]
    async fn test_run_sequential_pipeline() {
        let mut h = harness(5);
        h.service.populate().await.unwrap();
        let report = h.service.run_sequential_pipeline().await.unwrap();

        assert_eq!(report.views, 5);
        assert_eq!(report.registered_cameras, 5);
        assert_eq!(report.stages.len(), 8);
        assert!(report.scene_file.exists());
        assert!(dir_has_entries(&h.service.config().matches_dir).await);
        assert!(dir_has_entries(&h.service.config().reconstruction_dir).await);
        assert_eq!(h.runner.recorded_programs().await, SFM_TOOLS.to_vec());
    }

    #[tokio::test]
    async fn test_matching_failure_stops_chain() {
        let mut h = harness(5);
        h.runner.fail_program("openMVG_main_ComputeMatches", 1).await;
        h.service.populate().await.unwrap();

        let err = h.service.run_sequential_pipeline().await.unwrap_err();
        assert_eq!(err.stage(), Some("matching"));
        assert!(!dir_has_entries(&h.service.config().reconstruction_dir).await);
        assert!(!h.runner.ran("openMVG_main_SfM").await);
    }

    #[tokio::test]
    async fn test_too_few_cameras() {
        let mut h = harness(5);
        h.runner.set_registered_cameras(1).await;
        h.service.populate().await.unwrap();

        let err = h.service.run_sequential_pipeline().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::TooFewCameras {
                registered: 1,
                required: 2
            }
        ));
        assert!(!h.runner.ran("openMVG_main_openMVG2openMVS").await);
    }

    #[tokio::test]
    async fn test_partial_registration_is_accepted() {
        let mut h = harness(5);
        h.runner.set_registered_cameras(3).await;
        h.service.populate().await.unwrap();

        let report = h.service.run_sequential_pipeline().await.unwrap();
        assert_eq!(report.registered_cameras, 3);
        assert_eq!(report.views, 5);
    }
}
