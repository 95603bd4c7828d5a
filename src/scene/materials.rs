//! Material and texture loader
//!
//! Deduplicates images referenced by several materials so each distinct
//! path is decoded and uploaded exactly once. The registry is scoped to a
//! single scene load; nothing is cached across loads.

use std::collections::HashMap;
use std::path::Path;

use log::{debug, warn};

use crate::device::{DeviceArena, DeviceBackend, DeviceBuffer, DeviceError};

use super::data::{MaterialRecord, TextureRecord, NO_TEXTURE};

/// Pixel color substituted when an individual image fails to decode.
const FALLBACK_COLOR: [f32; 4] = [1.0, 0.0, 1.0, 1.0];

/// Decoded host-side image, RGBA f32.
struct StagedTexture {
    width: u32,
    height: u32,
    pixels: Vec<f32>,
}

const STAGED_CHANNELS: u32 = 4;

/// Per-load material/texture context. Replaces any notion of a global
/// loader: two scene loads never share state.
#[derive(Default)]
pub struct MaterialRegistry {
    by_path: HashMap<String, i32>,
    staged: Vec<StagedTexture>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the material table for the decoded OBJ materials, staging
    /// each referenced image exactly once. `base_dir` is the directory the
    /// MTL's texture names resolve against.
    pub fn stage(&mut self, materials: &[tobj::Material], base_dir: &Path) -> Vec<MaterialRecord> {
        materials
            .iter()
            .map(|mtl| MaterialRecord {
                diffuse_map: self.texture_index(base_dir, mtl.diffuse_texture.as_deref()),
                normal_map: self.texture_index(base_dir, mtl.normal_texture.as_deref()),
            })
            .collect()
    }

    fn texture_index(&mut self, base_dir: &Path, name: Option<&str>) -> i32 {
        let Some(name) = name.filter(|n| !n.is_empty()) else {
            return NO_TEXTURE;
        };

        if let Some(&index) = self.by_path.get(name) {
            return index;
        }

        let staged = decode_image(&base_dir.join(name)).unwrap_or_else(|e| {
            warn!("materials: '{}': {}; using fallback texture", name, e);
            fallback_texture()
        });

        let index = self.staged.len() as i32;
        self.by_path.insert(name.to_string(), index);
        self.staged.push(staged);
        index
    }

    /// Uploads every staged pixel buffer, then the texture table built over
    /// them. Children go first so the reverse-order release frees pixel
    /// buffers before the table that references them.
    pub fn upload_textures<B: DeviceBackend>(
        &self,
        backend: &B,
        arena: &mut DeviceArena<B>,
    ) -> Result<DeviceBuffer<TextureRecord>, DeviceError> {
        let mut records = Vec::with_capacity(self.staged.len());

        for (i, staged) in self.staged.iter().enumerate() {
            let label = format!("scene.texture[{}].pixels", i);
            let pixels = arena.upload(backend, &label, &staged.pixels)?;
            records.push(TextureRecord {
                width: staged.width,
                height: staged.height,
                channels: STAGED_CHANNELS,
                pixels: pixels.raw(),
            });
        }

        arena.upload(backend, "scene.textures", &records)
    }

    pub fn texture_count(&self) -> usize {
        self.staged.len()
    }
}

/// Stages materials and uploads material + texture buffers for one load.
pub fn upload_materials<B: DeviceBackend>(
    backend: &B,
    arena: &mut DeviceArena<B>,
    materials: &[tobj::Material],
    base_dir: &Path,
) -> Result<(DeviceBuffer<MaterialRecord>, DeviceBuffer<TextureRecord>), DeviceError> {
    let mut registry = MaterialRegistry::new();
    let records = registry.stage(materials, base_dir);

    debug!(
        "materials: {} materials, {} distinct textures",
        records.len(),
        registry.texture_count()
    );

    let textures = registry.upload_textures(backend, arena)?;
    let materials = arena.upload(backend, "scene.materials", &records)?;

    Ok((materials, textures))
}

fn decode_image(path: &Path) -> Result<StagedTexture, image::ImageError> {
    let decoded = image::open(path)?.to_rgba32f();
    let (width, height) = decoded.dimensions();

    Ok(StagedTexture {
        width,
        height,
        pixels: decoded.into_raw(),
    })
}

fn fallback_texture() -> StagedTexture {
    StagedTexture {
        width: 1,
        height: 1,
        pixels: FALLBACK_COLOR.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::CountingBackend;

    fn textured_material(name: &str, texture: &str) -> tobj::Material {
        tobj::Material {
            name: name.to_string(),
            diffuse_texture: Some(texture.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn shared_image_path_is_staged_once() {
        let mut registry = MaterialRegistry::new();
        // Nonexistent paths decode to the fallback, which still exercises
        // the dedup path: one staged texture, two materials pointing at it.
        let materials = [
            textured_material("a", "wood.png"),
            textured_material("b", "wood.png"),
        ];

        let records = registry.stage(&materials, Path::new("/nonexistent"));

        assert_eq!(records.len(), 2);
        assert_eq!(registry.texture_count(), 1);
        assert_eq!(records[0].diffuse_map, 0);
        assert_eq!(records[1].diffuse_map, 0);
        assert_eq!(records[0].normal_map, NO_TEXTURE);
    }

    #[test]
    fn missing_image_substitutes_fallback_not_failure() {
        let backend = CountingBackend::new();
        let mut arena = DeviceArena::new();

        let materials = [textured_material("a", "missing.png")];
        let (mats, texs) =
            upload_materials(&backend, &mut arena, &materials, Path::new("/nonexistent")).unwrap();

        assert_eq!(mats.len(), 1);
        assert_eq!(texs.len(), 1);

        // 1x1 RGBA f32 fallback pixels.
        let uploads = backend.uploads();
        assert_eq!(uploads[0].0, "scene.texture[0].pixels");
        assert_eq!(uploads[0].1, 16);
    }

    #[test]
    fn zero_materials_yield_zero_size_buffers() {
        let backend = CountingBackend::new();
        let mut arena = DeviceArena::new();

        let (mats, texs) =
            upload_materials(&backend, &mut arena, &[], Path::new(".")).unwrap();

        assert!(mats.is_empty());
        assert!(texs.is_empty());
        assert_eq!(backend.live(), 0);
    }

    #[test]
    fn untextured_material_uses_sentinel() {
        let mut registry = MaterialRegistry::new();
        let materials = [tobj::Material {
            name: "plain".to_string(),
            ..Default::default()
        }];

        let records = registry.stage(&materials, Path::new("."));
        assert_eq!(records[0].diffuse_map, NO_TEXTURE);
        assert_eq!(records[0].normal_map, NO_TEXTURE);
        assert_eq!(registry.texture_count(), 0);
    }
}
