//! Allocation-counting test double for the device layer.
//!
//! Lets the whole upload/release lifecycle run without a GPU: every
//! allocation and destruction is recorded, and an optional failure point
//! simulates device-memory exhaustion mid-upload.

use std::cell::RefCell;

use super::{DeviceBackend, DeviceError};

/// A recorded device allocation.
pub struct MockBuffer {
    pub label: String,
    pub bytes: Vec<u8>,
}

/// A recorded cubemap allocation.
pub struct MockCubemap {
    pub label: String,
    pub edge: u32,
    pub texels: Vec<f32>,
}

#[derive(Default)]
struct State {
    created: u64,
    destroyed: u64,
    /// (label, byte size) of every buffer ever created, in order.
    uploads: Vec<(String, usize)>,
    destroyed_labels: Vec<String>,
    /// Fail the nth allocation from now (0 = the next one).
    fail_after: Option<u64>,
}

/// Backend double counting allocations and retaining upload metadata.
#[derive(Default)]
pub struct CountingBackend {
    state: RefCell<State>,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocations created and not yet destroyed.
    pub fn live(&self) -> u64 {
        let state = self.state.borrow();
        state.created - state.destroyed
    }

    pub fn created(&self) -> u64 {
        self.state.borrow().created
    }

    /// `(label, byte size)` of every buffer upload so far, in order.
    pub fn uploads(&self) -> Vec<(String, usize)> {
        self.state.borrow().uploads.clone()
    }

    /// Labels of destroyed allocations, in destruction order.
    pub fn destroyed_labels(&self) -> Vec<String> {
        self.state.borrow().destroyed_labels.clone()
    }

    /// Makes the allocation `n` calls from now fail with
    /// [`DeviceError::Allocation`].
    pub fn fail_allocation_after(&self, n: u64) {
        self.state.borrow_mut().fail_after = Some(n);
    }

    fn check_failure(&self, label: &str, bytes: u64) -> Result<(), DeviceError> {
        let mut state = self.state.borrow_mut();
        match state.fail_after {
            Some(0) => {
                state.fail_after = None;
                Err(DeviceError::Allocation {
                    label: label.to_string(),
                    bytes,
                })
            }
            Some(n) => {
                state.fail_after = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl DeviceBackend for CountingBackend {
    type Buffer = MockBuffer;
    type Cubemap = MockCubemap;

    fn create_buffer(&self, label: &str, contents: &[u8]) -> Result<MockBuffer, DeviceError> {
        self.check_failure(label, contents.len() as u64)?;

        let mut state = self.state.borrow_mut();
        state.created += 1;
        state.uploads.push((label.to_string(), contents.len()));

        Ok(MockBuffer {
            label: label.to_string(),
            bytes: contents.to_vec(),
        })
    }

    fn create_cubemap(
        &self,
        label: &str,
        edge: u32,
        texels: &[f32],
    ) -> Result<MockCubemap, DeviceError> {
        self.check_failure(label, (texels.len() * 4) as u64)?;

        let mut state = self.state.borrow_mut();
        state.created += 1;

        Ok(MockCubemap {
            label: label.to_string(),
            edge,
            texels: texels.to_vec(),
        })
    }

    fn destroy_buffer(&self, buffer: MockBuffer) {
        let mut state = self.state.borrow_mut();
        state.destroyed += 1;
        state.destroyed_labels.push(buffer.label);
    }

    fn destroy_cubemap(&self, cubemap: MockCubemap) {
        let mut state = self.state.borrow_mut();
        state.destroyed += 1;
        state.destroyed_labels.push(cubemap.label);
    }
}
