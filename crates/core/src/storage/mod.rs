//! Storage transfer for run inputs and outputs.
//!
//! A run's images live under a folder in an object store (or, for local
//! runs, on disk). [`StorageService::download_folder`] pulls the whole folder
//! into a temporary directory before any processing starts, and
//! [`StorageService::upload_folder`] pushes the finished model back.
//!
//! Transfers are all-or-nothing: any failed object fails the whole call.

mod error;
mod local;
mod object;
mod traits;

pub use error::StorageError;
pub use local::LocalStorage;
pub use object::ObjectStorage;
pub use traits::{StorageService, UploadSummary};

use crate::config::Config;

/// Creates the storage backend selected by the configuration.
///
/// An object store is used when `storage.endpoint` is set; otherwise bucket
/// paths are local directories.
pub fn create_storage(config: &Config) -> Result<Box<dyn StorageService>, StorageError> {
    match &config.storage.endpoint {
        Some(endpoint) => Ok(Box::new(ObjectStorage::new(
            endpoint.clone(),
            config.storage.timeout_secs,
        )?)),
        None => Ok(Box::new(LocalStorage::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_create_storage_local_by_default() {
        let config = load_config_from_str(
            r#"
bucket_path = "/data/scans/chair"
output_path = "/tmp/out"
"#,
        )
        .unwrap();
        let storage = create_storage(&config).unwrap();
        assert_eq!(storage.name(), "local");
    }

    #[test]
    fn test_create_storage_object_store() {
        let config = load_config_from_str(
            r#"
bucket_path = "scans/chair"
output_path = "/tmp/out"

[storage]
endpoint = "https://objects.example.com"
"#,
        )
        .unwrap();
        let storage = create_storage(&config).unwrap();
        assert_eq!(storage.name(), "object-store");
    }
}
