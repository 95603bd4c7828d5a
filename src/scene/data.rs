//! GPU-visible scene records
//!
//! Every struct here is `#[repr(C)]` + `Pod` and mirrors what the tracing
//! kernel reads. Nested collections are referenced through [`RawBuffer`]
//! handles into the per-load arena; the host never stores raw device
//! pointers.

use cgmath::Vector3;

use crate::device::{CubemapDesc, RawBuffer};

/// Material index meaning "no texture assigned".
pub const NO_TEXTURE: i32 = -1;

/// Self-contained triangle record, flattened for cache-friendly
/// intersection testing (no index chasing on the device).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Face {
    pub vertices: [[f32; 3]; 3],
    pub normals: [[f32; 3]; 3],
    pub texcoords: [[f32; 2]; 3],
    /// Per-face tangent from edge/UV deltas. Not normalized; a degenerate
    /// UV parameterization yields a non-finite tangent.
    pub tangent: [f32; 3],
    /// Index into the material buffer, or [`NO_TEXTURE`].
    pub material_id: i32,
}

/// One mesh per source sub-object; owns its face buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshRecord {
    pub faces: RawBuffer,
}

/// Indices into the texture buffer, [`NO_TEXTURE`] when unmapped.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialRecord {
    pub diffuse_map: i32,
    pub normal_map: i32,
}

impl Default for MaterialRecord {
    fn default() -> Self {
        Self {
            diffuse_map: NO_TEXTURE,
            normal_map: NO_TEXTURE,
        }
    }
}

/// Decoded image resident on the device as `width * height * channels`
/// floats.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TextureRecord {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub pixels: RawBuffer,
}

/// Point light.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightProp {
    pub position: [f32; 3],
    pub emission: f32,
    pub color: [f32; 3],
    pub radius: f32,
}

/// Root aggregate handed to the kernel. Uploaded to the device as a single
/// record once every nested buffer exists, so the kernel dereferences the
/// whole scene without host involvement.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneDataRaw {
    pub meshes: RawBuffer,
    pub materials: RawBuffer,
    pub lights: RawBuffer,
    pub textures: RawBuffer,
    pub cubemap: CubemapDesc,
}

impl SceneDataRaw {
    pub fn empty() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

/// Host-side camera state, copied out to the caller after a scene upload.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Vector3<f32>,
    pub dir: Vector3<f32>,
    pub u: Vector3<f32>,
    pub v: Vector3<f32>,
    /// Horizontal field of view in radians.
    pub fov_x: f32,
    pub focus_dist: f32,
    pub aperture: f32,
    /// Movement speed for interactive controllers.
    pub speed: f32,
}

impl Camera {
    pub const DEFAULT_FOCUS_DIST: f32 = 2.0;
    pub const DEFAULT_APERTURE: f32 = 0.125;
    pub const DEFAULT_SPEED: f32 = 1.4;
}

impl Default for Camera {
    /// Camera used when the scene file carries no `camera` directive:
    /// origin position, axis-aligned basis, 90 degree horizontal fov.
    fn default() -> Self {
        let u = Vector3::new(1.0, 0.0, 0.0);
        let v = Vector3::new(0.0, -1.0, 0.0);
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            dir: u.cross(v),
            u,
            v,
            fov_x: 90.0_f32.to_radians(),
            focus_dist: Self::DEFAULT_FOCUS_DIST,
            aperture: Self::DEFAULT_APERTURE,
            speed: Self::DEFAULT_SPEED,
        }
    }
}
