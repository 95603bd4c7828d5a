//! Device memory layer
//!
//! Everything the scene core puts on the GPU goes through this module:
//! a backend trait hiding the concrete GPU runtime, and a per-load arena
//! that makes the release order of nested allocations mechanically
//! derivable from the allocation order.

pub mod arena;
pub mod testing;
pub mod wgpu_backend;

pub use arena::{CubemapDesc, DeviceArena, DeviceBuffer, RawBuffer};
pub use wgpu_backend::WgpuBackend;

use thiserror::Error;

/// Number of layers in a cubemap texture.
pub const CUBE_FACES: u32 = 6;

/// Channels per cubemap texel (RGBA, 32-bit float each).
pub const CUBE_CHANNELS: u32 = 4;

/// Errors surfaced by the device layer.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device allocation failed for '{label}' ({bytes} bytes)")]
    Allocation { label: String, bytes: u64 },

    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("device request failed: {0}")]
    DeviceRequest(String),
}

/// Abstraction over the GPU runtime used for scene storage.
///
/// The production implementation is [`WgpuBackend`]; tests substitute
/// [`testing::CountingBackend`] so the whole upload/release lifecycle can be
/// exercised without a GPU.
///
/// Every allocation made through this trait is owned by exactly one
/// [`DeviceArena`] and destroyed exactly once by that arena's release.
pub trait DeviceBackend {
    type Buffer;
    type Cubemap;

    /// Allocates a device buffer and copies `contents` into it.
    fn create_buffer(&self, label: &str, contents: &[u8]) -> Result<Self::Buffer, DeviceError>;

    /// Allocates a six-layer cubemap texture of `edge`x`edge` RGBA f32
    /// texels and copies `texels` (face-major +x,-x,+y,-y,+z,-z) into it.
    fn create_cubemap(
        &self,
        label: &str,
        edge: u32,
        texels: &[f32],
    ) -> Result<Self::Cubemap, DeviceError>;

    /// Destroys a buffer previously returned by [`Self::create_buffer`].
    fn destroy_buffer(&self, buffer: Self::Buffer);

    /// Destroys a cubemap previously returned by [`Self::create_cubemap`].
    fn destroy_cubemap(&self, cubemap: Self::Cubemap);
}
