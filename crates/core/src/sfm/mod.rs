//! Sparse reconstruction (structure from motion) with openMVG.
//!
//! [`SfmService::populate`] stages the build directory and the camera
//! sensor database; [`SfmService::run_sequential_pipeline`] then drives the
//! openMVG tools from image listing to the openMVS scene export:
//!
//! | stage | tool | output |
//! |---|---|---|
//! | listing | `openMVG_main_SfMInit_ImageListing` | `matches/sfm_data.json` |
//! | features | `openMVG_main_ComputeFeatures` | `matches/image_describer.json` |
//! | pairs | `openMVG_main_PairGenerator` | `matches/pairs.bin` |
//! | matching | `openMVG_main_ComputeMatches` | `matches/matches.putative.bin` |
//! | filtering | `openMVG_main_GeometricFilter` | `matches/matches.<model>.bin` |
//! | reconstruction | `openMVG_main_SfM` | `reconstruction/sfm_data.bin` |
//! | inspect | `openMVG_main_ConvertSfM_DataFormat` | `reconstruction/sfm_data_extrinsics.json` |
//! | export | `openMVG_main_openMVG2openMVS` | `scene.mvs` |

mod config;
mod model;
mod service;

pub use config::{SfmConfig, CAMERA_DB_FILE_NAME, MATCHES_DIR, RECONSTRUCTION_DIR, SCENE_FILE};
pub use model::{read_sparse_summary, SparseModelSummary};
pub use service::{SfmReport, SfmService, SFM_TOOLS};
