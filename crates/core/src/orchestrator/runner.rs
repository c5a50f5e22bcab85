//! Run orchestrator implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::mvs::{MvsConfig, MvsMode, MvsService, MVS_TOOLS};
use crate::pipeline::PipelineError;
use crate::runner::{CommandRunner, ToolInvocation};
use crate::sfm::{SfmConfig, SfmService, SFM_TOOLS};
use crate::staging::{check, CleanupStack, FsStaging};
use crate::storage::StorageService;

use super::types::RunReport;

/// Runs one reconstruction from input download to cleanup.
pub struct Orchestrator<R: CommandRunner> {
    config: Config,
    runner: Arc<R>,
    storage: Box<dyn StorageService>,
    staging: FsStaging,
}

impl<R: CommandRunner> Orchestrator<R> {
    /// Create a new orchestrator.
    pub fn new(
        config: Config,
        runner: Arc<R>,
        storage: Box<dyn StorageService>,
    ) -> Result<Self, PipelineError> {
        let staging = FsStaging::new(config.storage.timeout_secs)?;
        Ok(Self {
            config,
            runner,
            storage,
            staging,
        })
    }

    /// Replaces the staging helper (e.g. to keep temp dirs under a test root).
    pub fn with_staging(mut self, staging: FsStaging) -> Self {
        self.staging = staging;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Every external tool a run invokes, resolved against the configured bin dirs.
    pub fn required_tools(&self) -> Vec<PathBuf> {
        let sfm_bin = self.config.sfm.bin_dir.as_deref();
        let mvs_bin = self.config.mvs.bin_dir.as_deref();
        SFM_TOOLS
            .iter()
            .map(|tool| ToolInvocation::in_bin_dir(sfm_bin, tool).program)
            .chain(
                MVS_TOOLS
                    .iter()
                    .map(|tool| ToolInvocation::in_bin_dir(mvs_bin, tool).program),
            )
            .collect()
    }

    /// Verifies every required tool can be found.
    pub async fn check_tools(&self) -> Result<(), PipelineError> {
        let mut missing = Vec::new();
        for tool in self.required_tools() {
            if let Err(e) = self.runner.validate(&tool).await {
                warn!(tool = %tool.display(), error = %e, "Tool unavailable");
                missing.push(tool.display().to_string());
            }
        }

        if missing.is_empty() {
            info!(runner = self.runner.name(), "All tools available");
            Ok(())
        } else {
            Err(PipelineError::ToolsUnavailable { missing })
        }
    }

    /// Runs the reconstruction.
    ///
    /// Every log line emitted during the run carries a fresh `run_id`.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id);
        self.execute(run_id).instrument(span).await
    }

    async fn execute(&self, run_id: String) -> Result<RunReport, PipelineError> {
        let started_at = Utc::now();

        // Rejected before any transfer or subprocess.
        let mode = MvsMode::new(self.config.mvs.mode)?;

        // `check` exits the process, so it runs while nothing else is staged.
        let build = check(self.staging.create_build_dir());

        let input = self
            .storage
            .download_folder(&self.config.bucket_path)
            .await?;
        let input_files = count_files(input.path());
        info!("Input Directory: {}", input.path().display());
        info!("Output Directory: {}", self.config.output_path.display());

        // Declared after `build` so it unwinds before the build dir is removed.
        let mut cleanup = CleanupStack::new();

        let mut sfm = SfmService::new(
            SfmConfig::new(input.path(), build.path(), None),
            self.config.sfm.clone(),
            Arc::clone(&self.runner),
            self.staging.clone(),
        );
        let mvs = MvsService::new(
            MvsConfig {
                output_dir: self.config.output_path.clone(),
                build_dir: build.path().to_path_buf(),
                mode,
            },
            self.config.mvs.clone(),
            Arc::clone(&self.runner),
            self.staging.clone(),
        );

        sfm.populate().await?;
        if let Some(camera_db) = &sfm.config().camera_db_file {
            cleanup.remove_file(camera_db);
        }
        cleanup.remove_dir(&sfm.config().matches_dir);
        cleanup.remove_dir(&sfm.config().reconstruction_dir);

        let sfm_report = sfm.run_sequential_pipeline().await?;
        let mvs_report = mvs.run_pipeline().await?;

        let uploaded = match &self.config.upload_path {
            Some(remote) => Some(
                self.storage
                    .upload_folder(&self.config.output_path, remote)
                    .await?,
            ),
            None => None,
        };

        let cleanup_report = cleanup.unwind();
        if !cleanup_report.is_clean() {
            warn!(errors = ?cleanup_report.errors, "Cleanup left files behind");
        }

        Ok(RunReport {
            run_id,
            input_files,
            sfm: sfm_report,
            mvs: mvs_report,
            uploaded,
            cleanup: cleanup_report,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

fn count_files(root: &Path) -> usize {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .count()
}
