pub mod config;
pub mod mvs;
pub mod orchestrator;
pub mod pipeline;
pub mod runner;
pub mod sfm;
pub mod staging;
pub mod storage;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, MeshExportType,
    SanitizedConfig,
};
pub use mvs::{MvsConfig, MvsMode, MvsReport, MvsService};
pub use orchestrator::{Orchestrator, RunReport};
pub use pipeline::{PipelineError, Stage, StageReport};
pub use runner::{CommandRunner, ProcessRunner, RunnerError, ToolInvocation, ToolOutput};
pub use sfm::{SfmConfig, SfmReport, SfmService};
pub use staging::{check, CleanupStack, FsStaging, StagingError};
pub use storage::{create_storage, LocalStorage, ObjectStorage, StorageError, StorageService};
