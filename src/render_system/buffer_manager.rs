use bytemuck::Pod;

use crate::render_system::backend::{KernelBindings, TraceBackend};
use crate::render_system::error::RenderError;

/// One GPU-resident buffer plus the (count, stride) key its allocation was
/// sized for. The allocation is valid only while `count > 0`; a slot holding
/// no `GpuBuffer` means "no data of this kind".
pub struct GpuBuffer<B: TraceBackend> {
    pub count: usize,
    pub stride: usize,
    pub alloc: B::Buffer,
}

/// Brings a buffer slot in line with `data`.
///
/// The allocation is reused and overwritten in place whenever the element
/// count and stride still match, so content-only updates never pay a
/// release/allocate cycle. On mismatch the replacement is allocated before
/// the old buffer is released: a failed allocation leaves the previous
/// frame's buffer intact and bindable.
pub fn sync_buffer<B: TraceBackend, T: Pod>(
    backend: &mut B,
    slot: &mut Option<GpuBuffer<B>>,
    data: &[T],
) -> Result<(), RenderError> {
    let count = data.len();
    let stride = std::mem::size_of::<T>();

    if let Some(existing) = slot.as_ref() {
        if existing.count == count && existing.stride == stride {
            // full replace of the contents, no resize
            return backend.upload_buffer(&existing.alloc, bytemuck::cast_slice(data));
        }
    }

    if count == 0 {
        if let Some(old) = slot.take() {
            log::debug!("releasing emptied gpu buffer ({} x {stride})", old.count);
            backend.release_buffer(old.alloc);
        }
        return Ok(());
    }

    let alloc = backend.allocate_buffer(count, stride)?;
    if let Err(err) = backend.upload_buffer(&alloc, bytemuck::cast_slice(data)) {
        backend.release_buffer(alloc);
        return Err(err);
    }
    if let Some(old) = slot.take() {
        backend.release_buffer(old.alloc);
    }
    *slot = Some(GpuBuffer {
        count,
        stride,
        alloc,
    });
    Ok(())
}

/// The four scene buffers consumed by the trace kernel.
pub struct SceneBuffers<B: TraceBackend> {
    pub spheres: Option<GpuBuffer<B>>,
    pub mesh_instances: Option<GpuBuffer<B>>,
    pub vertices: Option<GpuBuffer<B>>,
    pub indices: Option<GpuBuffer<B>>,
}

impl<B: TraceBackend> SceneBuffers<B> {
    pub fn new() -> SceneBuffers<B> {
        SceneBuffers {
            spheres: None,
            mesh_instances: None,
            vertices: None,
            indices: None,
        }
    }

    pub fn bindings(&self) -> KernelBindings<'_, B> {
        KernelBindings {
            spheres: self.spheres.as_ref(),
            mesh_instances: self.mesh_instances.as_ref(),
            vertices: self.vertices.as_ref(),
            indices: self.indices.as_ref(),
        }
    }

    pub fn release_all(&mut self, backend: &mut B) {
        for slot in [
            &mut self.spheres,
            &mut self.mesh_instances,
            &mut self.vertices,
            &mut self.indices,
        ] {
            if let Some(buffer) = slot.take() {
                backend.release_buffer(buffer.alloc);
            }
        }
    }
}

impl<B: TraceBackend> Default for SceneBuffers<B> {
    fn default() -> SceneBuffers<B> {
        SceneBuffers::new()
    }
}
