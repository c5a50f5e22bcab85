use super::{types::Config, ConfigError};
use crate::mvs::MvsMode;

/// Validate configuration
/// Currently validates:
/// - bucket_path and output_path are not empty
/// - mvs.mode is within the accepted preset range
/// - runner timeout is not 0
/// - at least 2 registered cameras are required (a pose pair)
/// - storage.endpoint is an http(s) URL when set
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.bucket_path.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "bucket_path cannot be empty".to_string(),
        ));
    }

    if config.output_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "output_path cannot be empty".to_string(),
        ));
    }

    if let Some(upload) = &config.upload_path {
        if upload.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "upload_path cannot be empty when set".to_string(),
            ));
        }
    }

    MvsMode::new(config.mvs.mode)?;

    if config.runner.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "runner.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.storage.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "storage.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.sfm.min_registered_cameras < 2 {
        return Err(ConfigError::ValidationError(format!(
            "sfm.min_registered_cameras must be at least 2, got {}",
            config.sfm.min_registered_cameras
        )));
    }

    if let Some(endpoint) = &config.storage.endpoint {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "storage.endpoint must be an http(s) URL, got {:?}",
                endpoint
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn base_config() -> Config {
        load_config_from_str(
            r#"
bucket_path = "scans/chair"
output_path = "/tmp/out"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_empty_bucket_fails() {
        let mut config = base_config();
        config.bucket_path = "  ".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_mode_out_of_range_fails() {
        let mut config = base_config();
        config.mvs.mode = 7;
        assert!(validate_config(&config).is_err());

        config.mvs.mode = -1;
        assert!(validate_config(&config).is_err());

        config.mvs.mode = 3;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let mut config = base_config();
        config.runner.timeout_secs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("runner.timeout_secs"));
    }

    #[test]
    fn test_validate_min_cameras() {
        let mut config = base_config();
        config.sfm.min_registered_cameras = 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_endpoint_scheme() {
        let mut config = base_config();
        config.storage.endpoint = Some("objects.example.com".to_string());
        assert!(validate_config(&config).is_err());

        config.storage.endpoint = Some("https://objects.example.com".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
