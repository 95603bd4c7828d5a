//! Frame orchestration boundary
//!
//! The kernel that actually traces rays lives outside this crate; this
//! module pins down its invocation contract and the one obligation the
//! core has toward the accumulation framebuffer: signaling when it must be
//! reset because the camera or viewport changed.

use log::warn;

use crate::device::{DeviceBackend, RawBuffer};
use crate::scene::data::Camera;
use crate::scene::Scene;

/// Render target dimensions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Contract for the external tracing kernel.
///
/// `scene_root` is the device handle of the uploaded scene aggregate; it is
/// only ever passed while the owning scene is in the uploaded state. When
/// `reset_accumulation` is set, the kernel must zero its accumulation
/// framebuffer before integrating the frame.
pub trait TraceKernel<B: DeviceBackend> {
    fn trace(
        &mut self,
        backend: &B,
        scene_root: RawBuffer,
        camera: &Camera,
        viewport: Viewport,
        reset_accumulation: bool,
    );
}

/// Detects camera and viewport changes across frames.
///
/// Progressive accumulation is only valid while the view is static; any
/// change, or an explicit force, makes the next frame start over.
#[derive(Default)]
pub struct FrameTracker {
    last_camera: Option<Camera>,
    last_viewport: Option<Viewport>,
    forced: bool,
}

impl FrameTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces an accumulation reset on the next frame, e.g. after a scene
    /// switch.
    pub fn force_reset(&mut self) {
        self.forced = true;
    }

    /// Whether the upcoming frame must reset accumulation. Updates the
    /// tracked state.
    pub fn needs_reset(&mut self, camera: &Camera, viewport: Viewport) -> bool {
        let moved = self.last_camera != Some(*camera) || self.last_viewport != Some(viewport);
        let reset = moved || self.forced;

        self.last_camera = Some(*camera);
        self.last_viewport = Some(viewport);
        self.forced = false;

        reset
    }
}

/// Drives one kernel invocation per frame against an uploaded scene.
pub struct FrameOrchestrator<K> {
    kernel: K,
    tracker: FrameTracker,
}

impl<K> FrameOrchestrator<K> {
    pub fn new(kernel: K) -> Self {
        Self {
            kernel,
            tracker: FrameTracker::new(),
        }
    }

    pub fn tracker_mut(&mut self) -> &mut FrameTracker {
        &mut self.tracker
    }

    /// Renders one frame. Returns `false` without invoking the kernel when
    /// the scene is not uploaded.
    pub fn render<B: DeviceBackend>(
        &mut self,
        backend: &B,
        scene: &Scene<B>,
        camera: &Camera,
        viewport: Viewport,
    ) -> bool
    where
        K: TraceKernel<B>,
    {
        let Some(root) = scene.device_root() else {
            warn!("frame: scene '{}' is not uploaded, skipping", scene.name());
            return false;
        };

        let reset = self.tracker.needs_reset(camera, viewport);
        self.kernel.trace(backend, root, camera, viewport, reset);
        true
    }
}
