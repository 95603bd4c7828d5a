//! Cubemap environment builder
//!
//! Turns a cube-cross image (or a constant color) into the face-major
//! six-layer texture layout the tracing kernel samples. Invalid sources
//! never fail the scene load; they fall back to a uniform color.
//!
//! Cross layout, in face-edge units (4 wide, 3 tall):
//!
//! ```text
//!      +y
//!  -x  +z  +x  -z
//!      -y
//! ```

use std::path::Path;

use log::warn;

use crate::device::{CubemapDesc, DeviceArena, DeviceBackend, DeviceError, CUBE_CHANNELS, CUBE_FACES};

use super::parser::CubemapSource;

/// Color used when the scene provides no cubemap, or as the fallback when
/// a provided one is unusable.
pub const DEFAULT_COLOR: u32 = 0x05070A;

/// `(column, row)` of each face inside the cross, face-major device order
/// +x, -x, +y, -y, +z, -z.
const CROSS_POSITIONS: [(u32, u32); CUBE_FACES as usize] =
    [(2, 1), (0, 1), (1, 0), (1, 2), (1, 1), (3, 1)];

/// Builds and uploads the environment cubemap for one scene load.
///
/// Resolution order: no source or hex color -> uniform synthesis; a path
/// -> decode and repack the cross, falling back to the default uniform
/// color on any validation failure. The host staging buffer is dropped on
/// return in every path.
pub fn upload_cubemap<B: DeviceBackend>(
    backend: &B,
    arena: &mut DeviceArena<B>,
    source: &CubemapSource,
    base_dir: &Path,
) -> Result<CubemapDesc, DeviceError> {
    let (edge, texels) = match source {
        CubemapSource::Default => (1, uniform_faces(DEFAULT_COLOR)),
        CubemapSource::Color(color) => (1, uniform_faces(*color)),
        CubemapSource::Path(name) => match load_cross(&base_dir.join(name)) {
            Ok(repacked) => repacked,
            Err(reason) => {
                warn!("cubemap: '{}': {}; using default color", name, reason);
                (1, uniform_faces(DEFAULT_COLOR))
            }
        },
    };

    arena.upload_cubemap(backend, "scene.cubemap", edge, &texels)
}

/// Decodes a cube-cross image and repacks it into face-major layers.
///
/// The image must be 4 faces wide and 3 faces tall with square faces whose
/// edge is a power of two.
fn load_cross(path: &Path) -> Result<(u32, Vec<f32>), String> {
    let decoded = image::open(path)
        .map_err(|e| e.to_string())?
        .to_rgba32f();
    let (width, height) = decoded.dimensions();

    let edge = cross_edge(width, height)?;
    Ok((edge, extract_faces(decoded.as_raw(), width, edge)))
}

/// Validates cube-cross dimensions and returns the per-face edge length.
fn cross_edge(width: u32, height: u32) -> Result<u32, String> {
    let edge = width / 4;
    if edge == 0 || edge != height / 3 {
        return Err(format!(
            "{}x{} is not a cube cross (width/4 != height/3)",
            width, height
        ));
    }
    if !edge.is_power_of_two() {
        return Err(format!("face edge {} is not a power of two", edge));
    }
    Ok(edge)
}

/// Copies the six faces out of their fixed cross positions into one
/// contiguous face-major buffer.
fn extract_faces(pixels: &[f32], width: u32, edge: u32) -> Vec<f32> {
    let face_floats = (edge * edge * CUBE_CHANNELS) as usize;
    let mut out = Vec::with_capacity(face_floats * CUBE_FACES as usize);

    for &(col, row) in &CROSS_POSITIONS {
        let x0 = col * edge;
        let y0 = row * edge;
        for y in 0..edge {
            let start = (((y0 + y) * width + x0) * CUBE_CHANNELS) as usize;
            let end = start + (edge * CUBE_CHANNELS) as usize;
            out.extend_from_slice(&pixels[start..end]);
        }
    }

    out
}

/// Synthesizes a 1x1 uniform-color texel replicated across all six faces.
fn uniform_faces(color: u32) -> Vec<f32> {
    let r = ((color >> 16) & 0xFF) as f32 / 255.0;
    let g = ((color >> 8) & 0xFF) as f32 / 255.0;
    let b = (color & 0xFF) as f32 / 255.0;

    let mut out = Vec::with_capacity((CUBE_CHANNELS * CUBE_FACES) as usize);
    for _ in 0..CUBE_FACES {
        out.extend_from_slice(&[r, g, b, 0.0]);
    }
    out
}
