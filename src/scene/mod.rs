//! Scene loading and GPU lifecycle
//!
//! A [`Scene`] is constructed from a file path, uploaded as one atomic
//! session (parse, decode, delegate uploads, final aggregate copy), and
//! released in strict reverse dependency order through its arena.

pub mod cubemap;
pub mod data;
pub mod geometry;
pub mod materials;
pub mod parser;

use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;

use crate::device::{DeviceArena, DeviceBackend, RawBuffer};

use data::{Camera, SceneDataRaw};
use parser::ParsedScene;

/// Where a scene sits in its load lifecycle.
///
/// The device-side scene root is valid if and only if the state is
/// [`SceneState::Uploaded`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SceneState {
    /// Constructed; no device allocations exist.
    Unloaded,
    /// Geometry decode failed; error text retained, no device allocations.
    Invalid,
    /// All device allocations exist and the aggregate is on the device.
    Uploaded,
    /// Released; equivalent to unloaded.
    Released,
}

/// Load failures that abort an upload. Recoverable problems (bad scene
/// lines, broken textures, invalid cubemaps) never surface here; they are
/// substituted locally and logged.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to read scene file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("scene file '{path}' has no scene directive")]
    MissingGeometry { path: String },

    #[error("geometry decode failed for '{path}': {reason}")]
    Geometry { path: String, reason: String },

    #[error(transparent)]
    Device(#[from] crate::device::DeviceError),
}

/// A scene description plus the device-resident representation built from
/// it. Owns its entire device allocation graph exclusively; not safe to
/// upload or release from more than one thread.
pub struct Scene<B: DeviceBackend> {
    path: PathBuf,
    state: SceneState,
    camera: Camera,
    load_error: Option<String>,
    /// Host mirror of the aggregate; meaningful only while uploaded.
    data: SceneDataRaw,
    /// Device copy of the aggregate, handed to the kernel.
    root: RawBuffer,
    arena: DeviceArena<B>,
}

impl<B: DeviceBackend> Scene<B> {
    /// Records the scene file path. Allocates nothing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: SceneState::Unloaded,
            camera: Camera::default(),
            load_error: None,
            data: SceneDataRaw::empty(),
            root: RawBuffer::EMPTY,
            arena: DeviceArena::new(),
        }
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    /// True once the scene's geometry decoded successfully and the device
    /// representation exists.
    pub fn ready(&self) -> bool {
        self.state == SceneState::Uploaded
    }

    pub fn name(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("scene")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Error text retained from a failed geometry decode.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Host mirror of the uploaded aggregate. `None` unless uploaded.
    pub fn data(&self) -> Option<&SceneDataRaw> {
        self.ready().then_some(&self.data)
    }

    /// Device handle of the aggregate record. `None` unless uploaded; the
    /// kernel must never be invoked without it.
    pub fn device_root(&self) -> Option<RawBuffer> {
        self.ready().then_some(self.root)
    }

    /// Parses the scene file, decodes its geometry, and builds the full
    /// device representation. Returns the scene's camera on success.
    ///
    /// On geometry decode failure the scene transitions to
    /// [`SceneState::Invalid`] with zero device allocations and the decode
    /// error retained. On device allocation failure everything uploaded so
    /// far is rolled back before the error propagates.
    ///
    /// Calling this on an already-uploaded scene is a no-op returning the
    /// existing camera.
    pub fn upload(&mut self, backend: &B) -> Result<Camera, SceneError> {
        if self.state == SceneState::Uploaded {
            return Ok(self.camera);
        }

        let parsed = parser::parse_scene_file(&self.path).map_err(|source| {
            let e = SceneError::Io {
                path: self.path.display().to_string(),
                source,
            };
            self.fail(e.to_string());
            e
        })?;
        self.camera = parsed.camera_or_default();

        let geometry = parsed.geometry.clone().ok_or_else(|| {
            let e = SceneError::MissingGeometry {
                path: self.path.display().to_string(),
            };
            self.fail(e.to_string());
            e
        })?;

        // Geometry path resolves against the scene file's directory; MTL
        // and texture references resolve against the geometry file's.
        let base_dir = self.path.parent().unwrap_or_else(|| Path::new(""));
        let obj_path = base_dir.join(&geometry);
        let asset_dir = obj_path.parent().unwrap_or(base_dir).to_path_buf();

        let (models, materials) = match tobj::load_obj(
            &obj_path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        ) {
            Ok(loaded) => loaded,
            Err(e) => {
                // Fatal-to-load: no device allocations were made.
                let e = SceneError::Geometry {
                    path: obj_path.display().to_string(),
                    reason: e.to_string(),
                };
                self.fail(e.to_string());
                return Err(e);
            }
        };

        let materials = materials.unwrap_or_else(|e| {
            warn!("scene '{}': no usable MTL ({}), using defaults", self.name(), e);
            Vec::new()
        });

        let base_dir = base_dir.to_path_buf();
        match self.upload_device(backend, &parsed, &models, &materials, &base_dir, &asset_dir) {
            Ok(()) => {
                self.state = SceneState::Uploaded;
                self.load_error = None;
                info!(
                    "scene '{}': uploaded ({} meshes, {} materials, {} lights, {} allocations)",
                    self.name(),
                    self.data.meshes.len,
                    self.data.materials.len,
                    self.data.lights.len,
                    self.arena.len()
                );
                Ok(self.camera)
            }
            Err(e) => {
                // Roll back whatever the arena holds so a failed upload
                // leaves zero live device allocations.
                self.arena.release(backend);
                self.data = SceneDataRaw::empty();
                self.root = RawBuffer::EMPTY;
                self.fail(e.to_string());
                Err(e.into())
            }
        }
    }

    fn upload_device(
        &mut self,
        backend: &B,
        parsed: &ParsedScene,
        models: &[tobj::Model],
        materials: &[tobj::Material],
        base_dir: &Path,
        asset_dir: &Path,
    ) -> Result<(), crate::device::DeviceError> {
        let lights = self
            .arena
            .upload(backend, "scene.lights", &parsed.lights)?;

        let (material_buf, texture_buf) =
            materials::upload_materials(backend, &mut self.arena, materials, asset_dir)?;

        let meshes = geometry::upload_meshes(backend, &mut self.arena, models)?;

        // Cubemap paths resolve against the scene file's directory, unlike
        // material textures.
        let cubemap =
            cubemap::upload_cubemap(backend, &mut self.arena, &parsed.cubemap, base_dir)?;

        self.data = SceneDataRaw {
            meshes: meshes.raw(),
            materials: material_buf.raw(),
            lights: lights.raw(),
            textures: texture_buf.raw(),
            cubemap,
        };

        // Every nested buffer exists; mirror the aggregate itself to the
        // device as the final (outermost) allocation.
        let root = self
            .arena
            .upload(backend, "scene.data", std::slice::from_ref(&self.data))?;
        self.root = root.raw();

        Ok(())
    }

    /// Frees every device allocation in reverse dependency order: face
    /// buffers before the mesh table, pixel buffers before the texture
    /// table, then materials, lights, cubemap, and finally the aggregate.
    ///
    /// No-op from any state but [`SceneState::Uploaded`]; calling twice is
    /// safe.
    pub fn release(&mut self, backend: &B) {
        if self.state != SceneState::Uploaded {
            return;
        }

        self.arena.release(backend);
        self.data = SceneDataRaw::empty();
        self.root = RawBuffer::EMPTY;
        self.state = SceneState::Released;
        info!("scene '{}': released", self.name());
    }

    fn fail(&mut self, error: String) {
        warn!("scene '{}': {}", self.name(), error);
        self.load_error = Some(error);
        self.state = SceneState::Invalid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::CountingBackend;
    use std::fs;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("arttracer-{}-{}", tag, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_file_is_io_error_with_no_allocations() {
        let backend = CountingBackend::new();
        let mut scene: Scene<CountingBackend> = Scene::new("/nonexistent/void.scene");

        let err = scene.upload(&backend).unwrap_err();
        assert!(matches!(err, SceneError::Io { .. }));
        assert_eq!(scene.state(), SceneState::Invalid);
        assert!(scene.load_error().is_some());
        assert_eq!(backend.live(), 0);
        assert!(scene.device_root().is_none());
    }

    #[test]
    fn broken_geometry_reference_is_invalid_with_no_allocations() {
        let dir = temp_dir("badobj");
        let scene_path = dir.join("broken.scene");
        fs::write(&scene_path, "scene missing.obj\n").unwrap();

        let backend = CountingBackend::new();
        let mut scene = Scene::new(&scene_path);

        let err = scene.upload(&backend).unwrap_err();
        assert!(matches!(err, SceneError::Geometry { .. }));
        assert_eq!(scene.state(), SceneState::Invalid);
        assert!(scene.load_error().is_some());
        assert_eq!(backend.live(), 0);
    }

    #[test]
    fn release_outside_uploaded_is_a_no_op() {
        let backend = CountingBackend::new();
        let mut scene: Scene<CountingBackend> = Scene::new("whatever.scene");

        scene.release(&backend);
        assert_eq!(scene.state(), SceneState::Unloaded);
        assert_eq!(backend.live(), 0);
    }

    #[test]
    fn allocation_failure_rolls_back_partial_upload() {
        let dir = temp_dir("rollback");
        fs::write(
            dir.join("tri.obj"),
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n",
        )
        .unwrap();
        fs::write(
            dir.join("roll.scene"),
            "p_light 0 5 0 1 1 1 10 0.5\nscene tri.obj\n",
        )
        .unwrap();

        let backend = CountingBackend::new();
        // Lights upload succeeds, the next allocation fails.
        backend.fail_allocation_after(1);

        let mut scene = Scene::new(dir.join("roll.scene"));
        let err = scene.upload(&backend).unwrap_err();

        assert!(matches!(err, SceneError::Device(_)));
        assert_eq!(backend.live(), 0);
        assert_eq!(scene.state(), SceneState::Invalid);
        assert!(scene.device_root().is_none());
    }
}
