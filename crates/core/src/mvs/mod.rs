//! Dense reconstruction with openMVS.
//!
//! Takes the `scene.mvs` exported by the sparse reconstruction through
//! densification, meshing, refinement and texturing. The textured model
//! lands in the run's output directory.

mod config;
mod mode;
mod service;

pub use config::{
    MvsConfig, DENSE_SCENE_FILE, MESH_SCENE_FILE, REFINED_SCENE_FILE, TEXTURED_SCENE_FILE,
};
pub use mode::MvsMode;
pub use service::{MvsReport, MvsService, MVS_TOOLS};
