//! Mock command runner for testing.

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::runner::{CommandRunner, RunnerError, ToolInvocation, ToolOutput};

/// A recorded invocation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    /// The invocation that was submitted.
    pub invocation: ToolInvocation,
    /// Whether the mock reported success.
    pub success: bool,
}

/// Mock implementation of the CommandRunner trait.
///
/// Provides controllable behavior for testing:
/// - Track invocations for assertions
/// - Fail chosen programs with an exit code, or report them as not installed
/// - Write the files each openMVG/openMVS tool would produce, so stage
///   input/output checks behave as they do against the real tools
/// - Control how many cameras the simulated SfM registers
///
/// Programs the mock does not know are recorded and succeed without side effects.
#[derive(Debug, Clone)]
pub struct MockRunner {
    /// Recorded invocations.
    invocations: Arc<RwLock<Vec<RecordedInvocation>>>,
    /// Exit codes for programs that should fail.
    failures: Arc<RwLock<HashMap<String, i32>>>,
    /// Programs reported as not installed.
    missing: Arc<RwLock<HashSet<String>>>,
    /// Registered camera count override for the simulated SfM.
    registered_cameras: Arc<RwLock<Option<usize>>>,
    /// Whether simulated tools write their output files.
    simulate_outputs: Arc<RwLock<bool>>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRunner {
    /// Create a new mock runner.
    pub fn new() -> Self {
        Self {
            invocations: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            missing: Arc::new(RwLock::new(HashSet::new())),
            registered_cameras: Arc::new(RwLock::new(None)),
            simulate_outputs: Arc::new(RwLock::new(true)),
        }
    }

    /// Get all recorded invocations.
    pub async fn recorded_invocations(&self) -> Vec<RecordedInvocation> {
        self.invocations.read().await.clone()
    }

    /// Program names of all recorded invocations, in order.
    pub async fn recorded_programs(&self) -> Vec<String> {
        self.invocations
            .read()
            .await
            .iter()
            .map(|r| r.invocation.program_name().to_string())
            .collect()
    }

    /// Get the number of invocations performed.
    pub async fn invocation_count(&self) -> usize {
        self.invocations.read().await.len()
    }

    /// Whether `program` was invoked.
    pub async fn ran(&self, program: &str) -> bool {
        self.invocations
            .read()
            .await
            .iter()
            .any(|r| r.invocation.program_name() == program)
    }

    /// Clear recorded invocations.
    pub async fn clear_recorded(&self) {
        self.invocations.write().await.clear();
    }

    /// Make `program` exit with `code`.
    pub async fn fail_program(&self, program: &str, code: i32) {
        self.failures.write().await.insert(program.to_string(), code);
    }

    /// Report `program` as not installed.
    pub async fn set_missing(&self, program: &str) {
        self.missing.write().await.insert(program.to_string());
    }

    /// Override how many cameras the simulated SfM registers.
    pub async fn set_registered_cameras(&self, count: usize) {
        *self.registered_cameras.write().await = Some(count);
    }

    /// Enable or disable writing simulated tool outputs.
    pub async fn set_simulate_outputs(&self, simulate: bool) {
        *self.simulate_outputs.write().await = simulate;
    }

    async fn simulate(&self, invocation: &ToolInvocation) -> std::io::Result<()> {
        match invocation.program_name() {
            "openMVG_main_SfMInit_ImageListing" => {
                let input = flag_path(invocation, "-i");
                let matches = flag_path(invocation, "-o");
                let (Some(input), Some(matches)) = (input, matches) else {
                    return Ok(());
                };
                let images = list_images(&input)?;
                let views: Vec<_> = images
                    .iter()
                    .enumerate()
                    .map(|(key, name)| {
                        json!({
                            "key": key,
                            "value": { "ptr_wrapper": { "data": { "filename": name } } }
                        })
                    })
                    .collect();
                let sfm_data = json!({
                    "sfm_data_version": "0.3",
                    "root_path": input.to_string_lossy(),
                    "views": views,
                    "intrinsics": [],
                    "extrinsics": [],
                    "structure": [],
                    "control_points": []
                });
                write_file(&matches.join("sfm_data.json"), sfm_data.to_string()).await
            }
            "openMVG_main_ComputeFeatures" => {
                let Some(matches) = flag_path(invocation, "-o") else {
                    return Ok(());
                };
                let method = invocation.flag_value("-m").unwrap_or("SIFT");
                write_file(
                    &matches.join("image_describer.json"),
                    json!({ "image_describer": { "method": method } }).to_string(),
                )
                .await
            }
            "openMVG_main_PairGenerator"
            | "openMVG_main_ComputeMatches"
            | "openMVG_main_GeometricFilter"
            | "DensifyPointCloud"
            | "ReconstructMesh"
            | "RefineMesh" => match flag_path(invocation, "-o") {
                Some(output) => write_file(&output, invocation.program_name()).await,
                None => Ok(()),
            },
            "openMVG_main_SfM" => {
                let input = flag_path(invocation, "--input_file");
                let output = flag_path(invocation, "--output_dir");
                let (Some(input), Some(output)) = (input, output) else {
                    return Ok(());
                };
                let views = count_views(&input).await?;
                let registered = self
                    .registered_cameras
                    .read()
                    .await
                    .map_or(views, |n| n.min(views));
                write_file(
                    &output.join("sfm_data.bin"),
                    format!("views={}\nregistered={}\n", views, registered),
                )
                .await?;
                write_file(&output.join("cloud_and_poses.ply"), "ply").await
            }
            "openMVG_main_ConvertSfM_DataFormat" => {
                let input = flag_path(invocation, "-i");
                let output = flag_path(invocation, "-o");
                let (Some(input), Some(output)) = (input, output) else {
                    return Ok(());
                };
                let contents = tokio::fs::read_to_string(&input).await?;
                let count = |key: &str| -> usize {
                    contents
                        .lines()
                        .find_map(|line| line.strip_prefix(key))
                        .and_then(|n| n.parse().ok())
                        .unwrap_or(0)
                };
                let view_count = count("views=");
                let registered = count("registered=");
                let extrinsics: Vec<_> = (0..registered)
                    .map(|key| {
                        json!({
                            "key": key,
                            "value": {
                                "rotation": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
                                "center": [0.0, 0.0, key as f64]
                            }
                        })
                    })
                    .collect();
                let views: Vec<_> = (0..view_count).map(|key| json!({ "key": key })).collect();
                write_file(
                    &output,
                    json!({ "sfm_data_version": "0.3", "views": views, "extrinsics": extrinsics })
                        .to_string(),
                )
                .await
            }
            "openMVG_main_openMVG2openMVS" => {
                if let Some(dir) = flag_path(invocation, "-d") {
                    tokio::fs::create_dir_all(dir).await?;
                }
                match flag_path(invocation, "-o") {
                    Some(output) => write_file(&output, "MVS").await,
                    None => Ok(()),
                }
            }
            "TextureMesh" => {
                let Some(output) = flag_path(invocation, "-o") else {
                    return Ok(());
                };
                let extension = invocation.flag_value("--export-type").unwrap_or("ply");
                write_file(&output, "MVS").await?;
                write_file(&output.with_extension(extension), "mesh").await?;
                let stem = output
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                write_file(&output.with_file_name(format!("{}0.png", stem)), "png").await
            }
            _ => Ok(()),
        }
    }
}

fn flag_path(invocation: &ToolInvocation, flag: &str) -> Option<PathBuf> {
    invocation.flag_value(flag).map(PathBuf::from)
}

async fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await
}

/// Image file names directly inside `dir`, sorted.
fn list_images(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut images: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| {
            let lower = name.to_ascii_lowercase();
            [".jpg", ".jpeg", ".png", ".tif", ".tiff"]
                .iter()
                .any(|ext| lower.ends_with(ext))
        })
        .collect();
    images.sort();
    Ok(images)
}

async fn count_views(sfm_data: &Path) -> std::io::Result<usize> {
    let contents = tokio::fs::read_to_string(sfm_data).await?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(value["views"].as_array().map_or(0, Vec::len))
}

#[async_trait]
impl CommandRunner for MockRunner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, RunnerError> {
        let program = invocation.program_name().to_string();

        if self.missing.read().await.contains(&program) {
            self.invocations.write().await.push(RecordedInvocation {
                invocation: invocation.clone(),
                success: false,
            });
            return Err(RunnerError::NotFound {
                program: invocation.program.clone(),
            });
        }

        let failure = self.failures.read().await.get(&program).copied();
        self.invocations.write().await.push(RecordedInvocation {
            invocation: invocation.clone(),
            success: failure.is_none(),
        });

        if let Some(code) = failure {
            return Err(RunnerError::non_zero_exit(
                invocation.program.clone(),
                code,
                format!("{} failed (simulated)", program),
            ));
        }

        if *self.simulate_outputs.read().await {
            self.simulate(invocation).await?;
        }

        Ok(ToolOutput {
            exit_code: 0,
            duration_ms: 0,
        })
    }

    async fn validate(&self, program: &Path) -> Result<(), RunnerError> {
        let name = program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.missing.read().await.contains(&name) {
            return Err(RunnerError::NotFound {
                program: program.to_path_buf(),
            });
        }
        Ok(())
    }
}
