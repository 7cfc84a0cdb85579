#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use nalgebra::Matrix4;

use vulkan_progressive_raytracer::camera::{Camera, ViewMatrices};
use vulkan_progressive_raytracer::render_system::backend::{
    KernelBindings, KernelParams, TraceBackend,
};
use vulkan_progressive_raytracer::render_system::error::RenderError;

#[derive(Default)]
pub struct StubStats {
    pub buffer_allocs: usize,
    pub buffer_releases: usize,
    pub uploads: usize,
    pub target_allocs: usize,
    pub target_releases: usize,
    pub dispatches: usize,
    pub blends: usize,
    pub presents: usize,
}

pub struct StubBuffer {
    id: u64,
}

pub type StubTarget = Rc<RefCell<Vec<f32>>>;

/// Deterministic CPU stand-in for the kernel-dispatch interface: dispatch
/// number k fills the raw target with the constant sample value `k`, and
/// blending is the exact running-mean update.
pub struct StubBackend {
    pub stats: StubStats,
    pub fail_allocation: bool,
    pub last_averaged: Option<StubTarget>,
    store: HashMap<u64, Vec<u8>>,
    next_id: u64,
}

impl StubBackend {
    pub fn new() -> StubBackend {
        StubBackend {
            stats: StubStats::default(),
            fail_allocation: false,
            last_averaged: None,
            store: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn buffer_bytes(&self, buffer: &StubBuffer) -> &[u8] {
        self.store
            .get(&buffer.id)
            .map(Vec::as_slice)
            .expect("buffer was released")
    }
}

impl TraceBackend for StubBackend {
    type Buffer = StubBuffer;
    type Target = StubTarget;

    fn allocate_buffer(&mut self, count: usize, stride: usize) -> Result<StubBuffer, RenderError> {
        if self.fail_allocation {
            return Err(RenderError::BufferAllocation {
                count,
                stride,
                detail: "stubbed allocation failure".to_string(),
            });
        }
        self.stats.buffer_allocs += 1;
        let id = self.next_id;
        self.next_id += 1;
        self.store.insert(id, vec![0; count * stride]);
        Ok(StubBuffer { id })
    }

    fn upload_buffer(&mut self, buffer: &StubBuffer, bytes: &[u8]) -> Result<(), RenderError> {
        self.stats.uploads += 1;
        let contents = self
            .store
            .get_mut(&buffer.id)
            .ok_or_else(|| RenderError::BufferUpload("buffer was released".to_string()))?;
        assert_eq!(contents.len(), bytes.len(), "upload must be a full replace");
        contents.copy_from_slice(bytes);
        Ok(())
    }

    fn release_buffer(&mut self, buffer: StubBuffer) {
        self.stats.buffer_releases += 1;
        self.store.remove(&buffer.id);
    }

    fn create_target(&mut self, extent: [u32; 2]) -> Result<StubTarget, RenderError> {
        self.stats.target_allocs += 1;
        Ok(Rc::new(RefCell::new(vec![
            0.0;
            (extent[0] * extent[1] * 4) as usize
        ])))
    }

    fn release_target(&mut self, _target: StubTarget) {
        self.stats.target_releases += 1;
    }

    fn workgroup_size(&self) -> [u32; 2] {
        [8, 8]
    }

    fn dispatch(
        &mut self,
        _bindings: &KernelBindings<'_, Self>,
        _params: &KernelParams,
        output: &StubTarget,
        _groups: [u32; 3],
    ) -> Result<(), RenderError> {
        let value = self.stats.dispatches as f32;
        self.stats.dispatches += 1;
        output.borrow_mut().fill(value);
        Ok(())
    }

    fn blend(
        &mut self,
        raw: &StubTarget,
        averaged: &StubTarget,
        weight: f32,
    ) -> Result<(), RenderError> {
        self.stats.blends += 1;
        {
            let raw = raw.borrow();
            let mut averaged = averaged.borrow_mut();
            for (avg, sample) in averaged.iter_mut().zip(raw.iter()) {
                *avg = *avg * (1.0 - weight) + *sample * weight;
            }
        }
        self.last_averaged = Some(averaged.clone());
        Ok(())
    }

    fn present(&mut self, _averaged: &StubTarget) -> Result<(), RenderError> {
        self.stats.presents += 1;
        Ok(())
    }
}

pub struct StubCamera {
    changed: bool,
}

impl StubCamera {
    pub fn new() -> StubCamera {
        StubCamera { changed: false }
    }

    pub fn move_camera(&mut self) {
        self.changed = true;
    }
}

impl Camera for StubCamera {
    fn view_matrices(&self, _extent: [u32; 2]) -> ViewMatrices {
        ViewMatrices {
            camera_to_world: Matrix4::identity(),
            inverse_projection: Matrix4::identity(),
        }
    }

    fn take_changed(&mut self) -> bool {
        std::mem::replace(&mut self.changed, false)
    }
}
