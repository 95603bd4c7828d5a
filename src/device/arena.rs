//! Per-load device allocation arena
//!
//! One scene load session owns one arena. Allocations are pushed in
//! dependency order (children before the records that reference them) and
//! released by popping in strict reverse order, so the nested ownership
//! graph never needs hand-maintained free calls.

use std::marker::PhantomData;

use bytemuck::Pod;
use log::debug;

use super::{DeviceBackend, DeviceError, CUBE_CHANNELS, CUBE_FACES};

/// Sentinel handle for an empty buffer. Arena handles are 1-based so a
/// zeroed [`RawBuffer`] is a valid empty buffer.
pub const NULL_HANDLE: u32 = 0;

/// Untyped device buffer reference, embeddable in GPU-visible records.
///
/// `handle` is a 1-based index into the owning arena's allocation list,
/// which is how the kernel addresses nested collections (bindless style).
/// Invariant: `len == 0` iff `handle == NULL_HANDLE`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RawBuffer {
    pub len: u32,
    pub handle: u32,
}

impl RawBuffer {
    pub const EMPTY: RawBuffer = RawBuffer {
        len: 0,
        handle: NULL_HANDLE,
    };

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Typed owning view of a contiguous device array of `T`.
///
/// Deliberately neither `Clone` nor `Copy`: ownership is exclusive to
/// whichever aggregate holds it, and the backing allocation is destroyed
/// exactly once when the owning arena is released.
#[derive(Debug)]
pub struct DeviceBuffer<T> {
    raw: RawBuffer,
    _marker: PhantomData<fn() -> T>,
}

impl<T> DeviceBuffer<T> {
    pub fn empty() -> Self {
        Self {
            raw: RawBuffer::EMPTY,
            _marker: PhantomData,
        }
    }

    pub(crate) fn from_raw(raw: RawBuffer) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Element count.
    pub fn len(&self) -> u32 {
        self.raw.len
    }

    pub fn is_empty(&self) -> bool {
        self.raw.len == 0
    }

    /// The untyped form stored inside GPU-visible aggregates.
    pub fn raw(&self) -> RawBuffer {
        self.raw
    }
}

impl<T> Default for DeviceBuffer<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Device cubemap reference plus its format descriptor.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CubemapDesc {
    pub handle: u32,
    /// Per-face edge length in texels.
    pub edge: u32,
    pub channels: u32,
    pub layers: u32,
}

enum Slot<B: DeviceBackend> {
    Buffer(B::Buffer),
    Cubemap(B::Cubemap),
}

/// Allocation arena for one scene-load session.
///
/// Release order is the exact reverse of allocation order (stack
/// discipline); [`DeviceArena::release`] pops and destroys every slot, so
/// partial uploads roll back completely by releasing whatever was pushed.
pub struct DeviceArena<B: DeviceBackend> {
    slots: Vec<Slot<B>>,
}

impl<B: DeviceBackend> DeviceArena<B> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Number of live device allocations held by this arena.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Copies `items` into a fresh device buffer owned by this arena.
    ///
    /// An empty slice performs no allocation and yields an empty buffer.
    pub fn upload<T: Pod>(
        &mut self,
        backend: &B,
        label: &str,
        items: &[T],
    ) -> Result<DeviceBuffer<T>, DeviceError> {
        if items.is_empty() {
            return Ok(DeviceBuffer::empty());
        }

        let bytes: &[u8] = bytemuck::cast_slice(items);
        let buffer = backend.create_buffer(label, bytes)?;
        self.slots.push(Slot::Buffer(buffer));

        debug!(
            "arena: [{}] '{}': {} elements, {} bytes",
            self.slots.len(),
            label,
            items.len(),
            bytes.len()
        );

        Ok(DeviceBuffer::from_raw(RawBuffer {
            len: items.len() as u32,
            handle: self.slots.len() as u32,
        }))
    }

    /// Copies face-major cubemap texels into a fresh six-layer device
    /// texture owned by this arena.
    pub fn upload_cubemap(
        &mut self,
        backend: &B,
        label: &str,
        edge: u32,
        texels: &[f32],
    ) -> Result<CubemapDesc, DeviceError> {
        debug_assert_eq!(
            texels.len() as u32,
            edge * edge * CUBE_CHANNELS * CUBE_FACES
        );

        let cubemap = backend.create_cubemap(label, edge, texels)?;
        self.slots.push(Slot::Cubemap(cubemap));

        debug!("arena: [{}] '{}': cubemap edge {}", self.slots.len(), label, edge);

        Ok(CubemapDesc {
            handle: self.slots.len() as u32,
            edge,
            channels: CUBE_CHANNELS,
            layers: CUBE_FACES,
        })
    }

    /// Destroys every allocation in reverse allocation order and empties
    /// the arena. Safe to call on an already-empty arena.
    pub fn release(&mut self, backend: &B) {
        let count = self.slots.len();
        while let Some(slot) = self.slots.pop() {
            match slot {
                Slot::Buffer(buffer) => backend.destroy_buffer(buffer),
                Slot::Cubemap(cubemap) => backend.destroy_cubemap(cubemap),
            }
        }
        if count > 0 {
            debug!("arena: released {} allocations", count);
        }
    }
}

impl<B: DeviceBackend> Default for DeviceArena<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::CountingBackend;

    #[test]
    fn empty_slice_allocates_nothing() {
        let backend = CountingBackend::new();
        let mut arena = DeviceArena::new();

        let buffer = arena.upload::<f32>(&backend, "empty", &[]).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.raw(), RawBuffer::EMPTY);
        assert_eq!(backend.live(), 0);
        assert_eq!(arena.len(), 0);
    }

    #[test]
    fn handles_are_one_based_allocation_order() {
        let backend = CountingBackend::new();
        let mut arena = DeviceArena::new();

        let a = arena.upload(&backend, "a", &[1.0f32, 2.0]).unwrap();
        let b = arena.upload(&backend, "b", &[3.0f32]).unwrap();

        assert_eq!(a.raw().handle, 1);
        assert_eq!(a.len(), 2);
        assert_eq!(b.raw().handle, 2);
        assert_eq!(backend.live(), 2);
    }

    #[test]
    fn release_destroys_everything_in_reverse_order() {
        let backend = CountingBackend::new();
        let mut arena = DeviceArena::new();

        arena.upload(&backend, "faces", &[0u32; 4]).unwrap();
        arena.upload(&backend, "meshes", &[0u32; 2]).unwrap();
        arena
            .upload_cubemap(&backend, "cubemap", 1, &[0.0; 24])
            .unwrap();

        assert_eq!(backend.live(), 3);
        arena.release(&backend);
        assert_eq!(backend.live(), 0);
        assert_eq!(
            backend.destroyed_labels(),
            vec!["cubemap", "meshes", "faces"]
        );

        // Releasing again is a no-op.
        arena.release(&backend);
        assert_eq!(backend.live(), 0);
    }
}
