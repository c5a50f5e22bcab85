use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upstream location of the openMVG sensor width database.
pub const DEFAULT_CAMERA_DB_URL: &str = "https://raw.githubusercontent.com/openMVG/openMVG/master/src/openMVG/exif/sensor_width_database/sensor_width_camera_database.txt";

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Folder holding the input images (object-store path or local path).
    pub bucket_path: String,
    /// Local directory receiving the textured model.
    pub output_path: PathBuf,
    /// Remote folder the output directory is pushed to after a successful run.
    #[serde(default)]
    pub upload_path: Option<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub sfm: SfmSettings,
    #[serde(default)]
    pub mvs: MvsSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage transfer configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// S3-compatible endpoint (e.g., "https://objects.example.com").
    /// When unset, bucket paths are treated as local filesystem paths.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// HTTP timeout in seconds (default: 300)
    #[serde(default = "default_storage_timeout")]
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_storage_timeout(),
        }
    }
}

fn default_storage_timeout() -> u64 {
    300
}

/// External tool runner configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Timeout for a single tool invocation in seconds.
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
    /// How many trailing stderr lines are kept for error reports.
    #[serde(default = "default_stderr_tail")]
    pub stderr_tail_lines: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout(),
            stderr_tail_lines: default_stderr_tail(),
        }
    }
}

fn default_tool_timeout() -> u64 {
    21600 // 6 hours
}

fn default_stderr_tail() -> usize {
    40
}

/// openMVG (sparse reconstruction) settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SfmSettings {
    /// Directory holding the openMVG binaries. Binaries are looked up on PATH when unset.
    #[serde(default)]
    pub bin_dir: Option<PathBuf>,
    /// Local camera sensor database. Downloaded from `camera_db_url` when unset.
    #[serde(default)]
    pub camera_db_file: Option<PathBuf>,
    #[serde(default = "default_camera_db_url")]
    pub camera_db_url: String,
    /// Feature describer passed to ComputeFeatures (SIFT, AKAZE_FLOAT, ...).
    #[serde(default = "default_describer_method")]
    pub describer_method: String,
    /// Describer preset (NORMAL, HIGH, ULTRA).
    #[serde(default = "default_describer_preset")]
    pub describer_preset: String,
    /// Geometric model used to filter putative matches (f, e, h).
    #[serde(default = "default_geometric_model")]
    pub geometric_model: String,
    /// Fewest registered cameras accepted from the incremental SfM.
    #[serde(default = "default_min_cameras")]
    pub min_registered_cameras: usize,
}

impl Default for SfmSettings {
    fn default() -> Self {
        Self {
            bin_dir: None,
            camera_db_file: None,
            camera_db_url: default_camera_db_url(),
            describer_method: default_describer_method(),
            describer_preset: default_describer_preset(),
            geometric_model: default_geometric_model(),
            min_registered_cameras: default_min_cameras(),
        }
    }
}

fn default_camera_db_url() -> String {
    DEFAULT_CAMERA_DB_URL.to_string()
}

fn default_describer_method() -> String {
    "SIFT".to_string()
}

fn default_describer_preset() -> String {
    "NORMAL".to_string()
}

fn default_geometric_model() -> String {
    "f".to_string()
}

fn default_min_cameras() -> usize {
    2
}

/// openMVS (dense reconstruction) settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MvsSettings {
    /// Directory holding the openMVS binaries. Binaries are looked up on PATH when unset.
    #[serde(default)]
    pub bin_dir: Option<PathBuf>,
    /// Quality preset flag, see [`crate::mvs::MvsMode`].
    #[serde(default)]
    pub mode: i32,
    /// Mesh format written by TextureMesh.
    #[serde(default)]
    pub export_type: MeshExportType,
}

impl Default for MvsSettings {
    fn default() -> Self {
        Self {
            bin_dir: None,
            mode: 0,
            export_type: MeshExportType::default(),
        }
    }
}

/// Mesh formats TextureMesh can export.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MeshExportType {
    #[default]
    Obj,
    Ply,
    Glb,
}

impl MeshExportType {
    /// Value passed to `--export-type` and used as the file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Obj => "obj",
            Self::Ply => "ply",
            Self::Glb => "glb",
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

/// Sanitized config for startup logging (endpoints and paths reduced to flags)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub bucket_path: String,
    pub output_path: PathBuf,
    pub upload_configured: bool,
    pub object_store_configured: bool,
    pub tool_timeout_secs: u64,
    pub describer_method: String,
    pub camera_db_source: String,
    pub mvs_mode: i32,
    pub export_type: MeshExportType,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            bucket_path: config.bucket_path.clone(),
            output_path: config.output_path.clone(),
            upload_configured: config.upload_path.is_some(),
            object_store_configured: config.storage.endpoint.is_some(),
            tool_timeout_secs: config.runner.timeout_secs,
            describer_method: config.sfm.describer_method.clone(),
            camera_db_source: match &config.sfm.camera_db_file {
                Some(_) => "file".to_string(),
                None => "download".to_string(),
            },
            mvs_mode: config.mvs.mode,
            export_type: config.mvs.export_type,
        }
    }
}
