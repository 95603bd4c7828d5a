// src/lib.rs
//! Arttracer scene core
//!
//! Loads declarative scene descriptions and manages their GPU-resident
//! representation across upload, per-frame rendering, and release, built
//! on wgpu.

pub mod device;
pub mod frame;
pub mod scene;

// Re-export main types for convenience
pub use device::{DeviceBackend, DeviceError, WgpuBackend};
pub use scene::data::Camera;
pub use scene::{Scene, SceneError, SceneState};

/// Creates the default wgpu-backed device used for scene uploads.
pub fn default_device() -> Result<WgpuBackend, DeviceError> {
    WgpuBackend::new()
}
