//! Orchestrator lifecycle integration tests.
//!
//! These tests run whole reconstructions through the orchestrator with a
//! local storage backend and the mock runner:
//! - Input download, both reconstruction stages and optional upload
//! - Cleanup of intermediate files on success and on failure
//! - Configuration rejected before any tool runs

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use openmvgo_core::{
    load_config_from_str,
    pipeline::PipelineError,
    staging::{CleanupStack, FsStaging},
    storage::LocalStorage,
    testing::{fixtures, MockRunner},
    validate_config, Config, Orchestrator,
};

/// Test helper owning every directory a run touches.
struct TestHarness {
    runner: MockRunner,
    remote: TempDir,
    scratch: TempDir,
    output: TempDir,
    assets: TempDir,
}

impl TestHarness {
    fn new(images: usize) -> Self {
        Self {
            runner: MockRunner::new(),
            remote: fixtures::image_folder(images),
            scratch: TempDir::new().expect("Failed to create scratch dir"),
            output: TempDir::new().expect("Failed to create output dir"),
            assets: TempDir::new().expect("Failed to create assets dir"),
        }
    }

    fn output_dir(&self) -> std::path::PathBuf {
        self.output.path().join("model")
    }

    fn config(&self, extra: &str) -> Config {
        let camera_db = fixtures::camera_db(self.assets.path());
        load_config_from_str(&format!(
            r#"
bucket_path = "file://{}"
output_path = "{}"
{}

[sfm]
camera_db_file = "{}"
"#,
            self.remote.path().display(),
            self.output_dir().display(),
            extra,
            camera_db.display(),
        ))
        .expect("Failed to parse config")
    }

    fn orchestrator(&self, config: Config) -> Orchestrator<MockRunner> {
        let storage = LocalStorage::new().with_temp_root(self.scratch.path());
        Orchestrator::new(config, Arc::new(self.runner.clone()), Box::new(storage))
            .expect("Failed to create orchestrator")
            .with_staging(
                FsStaging::new(5)
                    .expect("Failed to create staging")
                    .with_temp_root(self.scratch.path()),
            )
    }

    fn scratch_is_empty(&self) -> bool {
        is_empty_dir(self.scratch.path())
    }
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

#[tokio::test]
async fn test_full_run() {
    let h = TestHarness::new(5);
    let config = h.config("");
    validate_config(&config).unwrap();

    let report = h.orchestrator(config).run().await.unwrap();

    assert_eq!(report.input_files, 5);
    assert_eq!(report.sfm.registered_cameras, 5);
    assert_eq!(report.sfm.stages.len(), 8);
    assert_eq!(report.mvs.stages.len(), 4);
    assert!(report.cleanup.is_clean());
    assert!(report.finished_at >= report.started_at);

    let meshes: Vec<_> = std::fs::read_dir(h.output_dir())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "obj"))
        .collect();
    assert_eq!(meshes.len(), 1);

    // Downloaded input and build dir are removed with the run.
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn test_run_uploads_output() {
    let h = TestHarness::new(3);
    let destination = h.output.path().join("published/scan-01");
    let config = h.config(&format!(
        "upload_path = \"{}\"\n\n[mvs]\nexport_type = \"ply\"",
        destination.display()
    ));

    let report = h.orchestrator(config).run().await.unwrap();

    let uploaded = report.uploaded.expect("Output should be uploaded");
    assert!(uploaded.files_uploaded >= 2);
    assert!(destination.join("scene_dense_mesh_refine_texture.ply").exists());
}

#[tokio::test]
async fn test_failed_run_cleans_up() {
    let h = TestHarness::new(5);
    h.runner.fail_program("openMVG_main_ComputeMatches", 1).await;

    let err = h.orchestrator(h.config("")).run().await.unwrap_err();

    assert_eq!(err.stage(), Some("matching"));
    assert!(!h.runner.ran("openMVG_main_SfM").await);
    assert!(!h.runner.ran("DensifyPointCloud").await);
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn test_too_few_cameras_stops_before_dense_stage() {
    let h = TestHarness::new(5);
    h.runner.set_registered_cameras(1).await;

    let err = h.orchestrator(h.config("")).run().await.unwrap_err();

    assert!(matches!(err, PipelineError::TooFewCameras { registered: 1, .. }));
    assert!(!h.runner.ran("openMVG_main_openMVG2openMVS").await);
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn test_out_of_range_mode_spawns_nothing() {
    let h = TestHarness::new(5);
    let config = h.config("\n[mvs]\nmode = 9");
    assert!(validate_config(&config).is_err());

    let err = h.orchestrator(config).run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Config(_)));
    assert_eq!(h.runner.invocation_count().await, 0);
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn test_missing_input_folder() {
    let h = TestHarness::new(1);
    let mut config = h.config("");
    config.bucket_path = h.remote.path().join("missing").display().to_string();

    let err = h.orchestrator(config).run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Storage(_)));
    assert_eq!(h.runner.invocation_count().await, 0);
}

#[tokio::test]
async fn test_each_run_gets_its_own_id_and_build_dir() {
    let h = TestHarness::new(2);
    let orchestrator = h.orchestrator(h.config(""));

    let first = orchestrator.run().await.unwrap();
    let second = orchestrator.run().await.unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_ne!(first.sfm.scene_file, second.sfm.scene_file);
    assert!(h.scratch_is_empty());

    let staging = FsStaging::new(5).unwrap().with_temp_root(h.scratch.path());
    let a = staging.create_build_dir().unwrap();
    let b = staging.create_build_dir().unwrap();
    assert_ne!(a.path(), b.path());
}

#[test]
fn test_cleanup_twice_never_errors() {
    let build = TempDir::new().unwrap();
    let matches = build.path().join("matches");
    std::fs::create_dir(&matches).unwrap();
    std::fs::write(matches.join("pairs.bin"), b"x").unwrap();

    let mut cleanup = CleanupStack::new();
    cleanup.remove_dir(&matches);
    let first = cleanup.unwind();
    assert!(first.is_clean());
    assert_eq!(first.directories_removed, 1);

    cleanup.remove_dir(&matches);
    let second = cleanup.unwind();
    assert!(second.is_clean());
    assert_eq!(second.already_absent, 1);
}
