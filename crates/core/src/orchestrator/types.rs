//! Types for the run orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mvs::MvsReport;
use crate::sfm::SfmReport;
use crate::staging::CleanupReport;
use crate::storage::UploadSummary;

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Identifier attached to every log line of the run.
    pub run_id: String,
    /// Files found in the downloaded input folder.
    pub input_files: usize,
    pub sfm: SfmReport,
    pub mvs: MvsReport,
    /// Set when the output was pushed to `upload_path`.
    pub uploaded: Option<UploadSummary>,
    /// Removal of intermediate files.
    pub cleanup: CleanupReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Total time spent in external tools.
    pub fn tool_duration_ms(&self) -> u64 {
        self.sfm
            .stages
            .iter()
            .chain(&self.mvs.stages)
            .map(|s| s.duration_ms)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::StageReport;
    use std::path::PathBuf;

    fn stage(name: &str, duration_ms: u64) -> StageReport {
        StageReport {
            name: name.to_string(),
            program: name.to_string(),
            duration_ms,
        }
    }

    #[test]
    fn test_report_serialization() {
        let now = Utc::now();
        let report = RunReport {
            run_id: "run-1".to_string(),
            input_files: 5,
            sfm: SfmReport {
                stages: vec![stage("listing", 10), stage("features", 20)],
                views: 5,
                registered_cameras: 5,
                scene_file: PathBuf::from("/tmp/build/scene.mvs"),
            },
            mvs: MvsReport {
                stages: vec![stage("densify", 100)],
                mesh_file: PathBuf::from("/out/scene_dense_mesh_refine_texture.obj"),
            },
            uploaded: None,
            cleanup: CleanupReport::default(),
            started_at: now,
            finished_at: now,
        };

        assert_eq!(report.tool_duration_ms(), 130);

        let json = serde_json::to_string(&report).unwrap();
        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, "run-1");
        assert_eq!(parsed.sfm.registered_cameras, 5);
        assert!(parsed.uploaded.is_none());
    }
}
