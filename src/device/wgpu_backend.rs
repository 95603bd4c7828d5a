//! wgpu implementation of the device backend.
//!
//! Scene collections become storage buffers, the environment map becomes a
//! six-layer `Rgba32Float` texture. All uploads are synchronous copies
//! through the queue; destruction is explicit so the arena fully controls
//! allocation lifetime instead of leaning on drop order.

use log::info;
use wgpu::util::DeviceExt;

use super::{DeviceBackend, DeviceError, CUBE_CHANNELS, CUBE_FACES};

/// Headless wgpu device + queue used for scene storage.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl WgpuBackend {
    /// Acquires a device on the first available adapter. No surface is
    /// required; scene uploads are compute-side only.
    pub fn new() -> Result<Self, DeviceError> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });

            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .map_err(|_| DeviceError::NoAdapter)?;

            info!("scene device: {}", adapter.get_info().name);

            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("Scene Device"),
                    required_features: wgpu::Features::default(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    memory_hints: wgpu::MemoryHints::default(),
                    trace: wgpu::Trace::Off,
                })
                .await
                .map_err(|e| DeviceError::DeviceRequest(e.to_string()))?;

            Ok(Self { device, queue })
        })
    }

    /// Wraps an existing device/queue pair, e.g. one shared with a display
    /// surface owned by the embedding application.
    pub fn from_raw(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

impl DeviceBackend for WgpuBackend {
    type Buffer = wgpu::Buffer;
    type Cubemap = wgpu::Texture;

    fn create_buffer(&self, label: &str, contents: &[u8]) -> Result<wgpu::Buffer, DeviceError> {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            });
        Ok(buffer)
    }

    fn create_cubemap(
        &self,
        label: &str,
        edge: u32,
        texels: &[f32],
    ) -> Result<wgpu::Texture, DeviceError> {
        let size = wgpu::Extent3d {
            width: edge,
            height: edge,
            depth_or_array_layers: CUBE_FACES,
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(edge * CUBE_CHANNELS * 4),
                rows_per_image: Some(edge),
            },
            size,
        );

        Ok(texture)
    }

    fn destroy_buffer(&self, buffer: wgpu::Buffer) {
        buffer.destroy();
    }

    fn destroy_cubemap(&self, cubemap: wgpu::Texture) {
        cubemap.destroy();
    }
}
