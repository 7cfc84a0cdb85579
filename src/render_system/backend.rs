use nalgebra::Matrix4;

use crate::render_system::buffer_manager::GpuBuffer;
use crate::render_system::error::RenderError;

/// Scalar and matrix inputs of one kernel dispatch.
pub struct KernelParams {
    pub camera_to_world: Matrix4<f32>,
    pub inverse_projection: Matrix4<f32>,
    pub extent: [u32; 2],
    /// Sub-pixel jitter offset in [0, 1)^2, fresh per dispatch.
    pub jitter: [f32; 2],
    pub bounce_limit: u32,
    pub seed: u32,
}

/// Named buffer bindings of the trace kernel. An absent buffer means "no
/// data of this kind this frame" and must be tolerated, not treated as an
/// error.
pub struct KernelBindings<'a, B: TraceBackend> {
    pub spheres: Option<&'a GpuBuffer<B>>,
    pub mesh_instances: Option<&'a GpuBuffer<B>>,
    pub vertices: Option<&'a GpuBuffer<B>>,
    pub indices: Option<&'a GpuBuffer<B>>,
}

/// Seam to the GPU. The production implementation wraps the Vulkan device,
/// compute pipelines and swapchain; tests drive the pipeline against a
/// deterministic CPU stub.
pub trait TraceBackend: Sized {
    /// Opaque GPU allocation, valid until passed to `release_buffer`.
    type Buffer;
    /// Viewport-sized render target.
    type Target;

    fn allocate_buffer(&mut self, count: usize, stride: usize) -> Result<Self::Buffer, RenderError>;
    fn upload_buffer(&mut self, buffer: &Self::Buffer, bytes: &[u8]) -> Result<(), RenderError>;
    fn release_buffer(&mut self, buffer: Self::Buffer);

    fn create_target(&mut self, extent: [u32; 2]) -> Result<Self::Target, RenderError>;
    fn release_target(&mut self, target: Self::Target);

    /// Thread-group dimensions of the trace kernel; the dispatch grid is
    /// `ceil(extent / workgroup_size)`.
    fn workgroup_size(&self) -> [u32; 2];

    /// Enqueues one trace pass writing into `output`.
    fn dispatch(
        &mut self,
        bindings: &KernelBindings<'_, Self>,
        params: &KernelParams,
        output: &Self::Target,
        groups: [u32; 3],
    ) -> Result<(), RenderError>;

    /// Blends `raw` into `averaged` with the given weight:
    /// `averaged = averaged * (1 - weight) + raw * weight`.
    fn blend(
        &mut self,
        raw: &Self::Target,
        averaged: &Self::Target,
        weight: f32,
    ) -> Result<(), RenderError>;

    /// Converts and presents the averaged target.
    fn present(&mut self, averaged: &Self::Target) -> Result<(), RenderError>;
}
