use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "OPENMVGO_CONFIG";

/// Config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "openmvgo.toml";

/// Load configuration from an optional TOML file with environment variable overrides.
///
/// An explicit `path` must exist. Without one, `openmvgo.toml` is merged only when
/// it exists, so a run can be configured from the environment alone.
/// Precedence (lowest to highest): file, `OPENMVGO_*` variables, `BUCKET_PATH`/`OUTPUT_PATH`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::new();

    match path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.display().to_string()));
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                figment = figment.merge(Toml::file(default_path));
            }
        }
    }

    let config: Config = figment
        .merge(Env::prefixed("OPENMVGO_").ignore(&["CONFIG"]).split("__"))
        .merge(Env::raw().only(&["BUCKET_PATH", "OUTPUT_PATH"]))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
