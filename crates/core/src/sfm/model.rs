//! Reading the exported sparse model summary.

use serde::Deserialize;
use std::path::Path;

use crate::pipeline::PipelineError;

/// Counts taken from an openMVG `sfm_data` JSON export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparseModelSummary {
    /// Views known to the scene.
    pub views: usize,
    /// Views with a recovered pose.
    pub registered_cameras: usize,
}

#[derive(Deserialize)]
struct SfmDataExport {
    #[serde(default)]
    views: Vec<serde_json::Value>,
    #[serde(default)]
    extrinsics: Vec<serde_json::Value>,
}

/// Reads view and pose counts from an `sfm_data` JSON file.
pub async fn read_sparse_summary(path: &Path) -> Result<SparseModelSummary, PipelineError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PipelineError::InvalidSparseModel {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let export: SfmDataExport =
        serde_json::from_str(&contents).map_err(|e| PipelineError::InvalidSparseModel {
            path: path.to_path_buf(),
            reason: format!("Failed to parse sfm_data export: {}", e),
        })?;

    Ok(SparseModelSummary {
        views: export.views.len(),
        registered_cameras: export.extrinsics.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_sparse_summary() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sfm_data_extrinsics.json");
        std::fs::write(
            &path,
            r#"{
                "sfm_data_version": "0.3",
                "root_path": "/in",
                "views": [{"key": 0}, {"key": 1}, {"key": 2}],
                "intrinsics": [],
                "extrinsics": [
                    {"key": 0, "value": {"rotation": [[1,0,0],[0,1,0],[0,0,1]], "center": [0,0,0]}},
                    {"key": 2, "value": {"rotation": [[1,0,0],[0,1,0],[0,0,1]], "center": [1,0,0]}}
                ]
            }"#,
        )
        .unwrap();

        let summary = read_sparse_summary(&path).await.unwrap();
        assert_eq!(summary.views, 3);
        assert_eq!(summary.registered_cameras, 2);
    }

    #[tokio::test]
    async fn test_read_sparse_summary_invalid_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.json");
        std::fs::write(&path, "not json").unwrap();

        let err = read_sparse_summary(&path).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidSparseModel { .. }));
    }

    #[tokio::test]
    async fn test_read_sparse_summary_missing_file() {
        let err = read_sparse_summary(Path::new("/nonexistent/sfm_data.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidSparseModel { .. }));
    }
}
