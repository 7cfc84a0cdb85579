use std::sync::Arc;

use vulkano::{
    buffer::{Buffer, BufferCreateInfo, BufferUsage, Subbuffer},
    command_buffer::{
        allocator::StandardCommandBufferAllocator, AutoCommandBufferBuilder, CommandBufferUsage,
        CopyBufferToImageInfo, PrimaryAutoCommandBuffer,
    },
    descriptor_set::{layout::DescriptorSetLayoutCreateFlags, WriteDescriptorSet},
    device::{
        physical::PhysicalDeviceType, Device, DeviceCreateInfo, DeviceExtensions, Features, Queue,
        QueueCreateInfo, QueueFlags,
    },
    format::Format,
    image::{Image, ImageUsage},
    instance::Instance,
    memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
    pipeline::{
        compute::ComputePipelineCreateInfo, layout::PipelineDescriptorSetLayoutCreateInfo,
        ComputePipeline, Pipeline, PipelineBindPoint, PipelineLayout,
        PipelineShaderStageCreateInfo,
    },
    shader::ShaderModule,
    swapchain::{self, Surface, Swapchain, SwapchainCreateInfo, SwapchainPresentInfo},
    sync::{self, GpuFuture},
    DeviceSize, Validated, VulkanError,
};
use winit::window::Window;

use crate::render_system::backend::{KernelBindings, KernelParams, TraceBackend};
use crate::render_system::buffer_manager::GpuBuffer;
use crate::render_system::error::RenderError;
use crate::render_system::{blend_shader, present_shader, trace_shader};

// must match local_size_x/y of the trace kernel
const TRACE_WORKGROUP: [u32; 2] = [8, 8];
const BLEND_WORKGROUP: u32 = 256;

pub fn get_device_for_rendering_on(
    instance: Arc<Instance>,
    surface: Arc<Surface>,
) -> Result<(Arc<Device>, Arc<Queue>), RenderError> {
    let device_extensions = DeviceExtensions {
        khr_swapchain: true,
        khr_push_descriptor: true,
        ..DeviceExtensions::empty()
    };
    let features = Features {
        scalar_block_layout: true,
        shader_int8: true,
        storage_buffer8_bit_access: true,
        uniform_and_storage_buffer8_bit_access: true,
        ..Features::empty()
    };
    let (physical_device, queue_family_index) = instance
        .enumerate_physical_devices()
        .map_err(|e| RenderError::PipelineCreation {
            what: "physical device enumeration",
            detail: e.to_string(),
        })?
        .filter(|p| p.supported_extensions().contains(&device_extensions))
        .filter(|p| p.supported_features().contains(&features))
        .filter_map(|p| {
            // find a general purpose queue that can present to the surface
            let queue_family_index = p
                .queue_family_properties()
                .iter()
                .enumerate()
                .position(|(i, q)| {
                    q.queue_flags
                        .intersects(QueueFlags::GRAPHICS | QueueFlags::COMPUTE)
                        && p.surface_support(i as u32, &surface).unwrap_or(false)
                });
            queue_family_index.map(|i| (p, i as u32))
        })
        .min_by_key(|(p, _)| match p.properties().device_type {
            PhysicalDeviceType::DiscreteGpu => 0,
            PhysicalDeviceType::IntegratedGpu => 1,
            PhysicalDeviceType::VirtualGpu => 2,
            PhysicalDeviceType::Cpu => 3,
            PhysicalDeviceType::Other => 4,
            _ => 5,
        })
        .ok_or(RenderError::NoSuitableDevice)?;

    let (device, mut queues) = Device::new(
        physical_device,
        DeviceCreateInfo {
            enabled_extensions: device_extensions,
            enabled_features: features,
            queue_create_infos: vec![QueueCreateInfo {
                queue_family_index,
                ..Default::default()
            }],
            ..Default::default()
        },
    )
    .map_err(|e| RenderError::PipelineCreation {
        what: "logical device",
        detail: e.to_string(),
    })?;

    let queue = queues.next().ok_or(RenderError::NoSuitableDevice)?;
    Ok((device, queue))
}

pub fn get_surface_extent(surface: &Surface) -> [u32; 2] {
    let window = surface.object().unwrap().downcast_ref::<Window>().unwrap();
    window.inner_size().into()
}

fn create_swapchain(
    device: Arc<Device>,
    surface: Arc<Surface>,
) -> Result<(Arc<Swapchain>, Vec<Arc<Image>>), RenderError> {
    let surface_capabilities = device
        .physical_device()
        .surface_capabilities(&surface, Default::default())
        .map_err(|e| RenderError::PipelineCreation {
            what: "surface capabilities",
            detail: e.to_string(),
        })?;

    let window = surface.object().unwrap().downcast_ref::<Window>().unwrap();

    Swapchain::new(
        device.clone(),
        surface.clone(),
        SwapchainCreateInfo {
            min_image_count: 3,
            image_format: Format::B8G8R8A8_SRGB,
            image_extent: window.inner_size().into(),
            image_usage: ImageUsage::TRANSFER_DST,
            composite_alpha: surface_capabilities
                .supported_composite_alpha
                .into_iter()
                .next()
                .ok_or(RenderError::PipelineCreation {
                    what: "swapchain",
                    detail: "no supported composite alpha".to_string(),
                })?,
            ..Default::default()
        },
    )
    .map_err(|e| RenderError::PipelineCreation {
        what: "swapchain",
        detail: e.to_string(),
    })
}

fn create_display_buffers(
    memory_allocator: &Arc<StandardMemoryAllocator>,
    images: &[Arc<Image>],
) -> Result<Vec<Subbuffer<[u8]>>, RenderError> {
    images
        .iter()
        .map(|image| {
            let extent = image.extent();
            Buffer::new_slice::<u8>(
                memory_allocator.clone(),
                BufferCreateInfo {
                    usage: BufferUsage::STORAGE_BUFFER | BufferUsage::TRANSFER_SRC,
                    ..Default::default()
                },
                AllocationCreateInfo {
                    memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
                    ..Default::default()
                },
                (extent[0] * extent[1] * 4) as DeviceSize,
            )
            .map_err(|e| RenderError::TargetAllocation {
                width: extent[0],
                height: extent[1],
                detail: e.to_string(),
            })
        })
        .collect()
}

fn create_compute_pipeline(
    device: Arc<Device>,
    module: Arc<ShaderModule>,
    name: &'static str,
) -> Result<Arc<ComputePipeline>, RenderError> {
    let cs = module
        .entry_point("main")
        .ok_or(RenderError::MissingEntryPoint(name))?;
    let stage = PipelineShaderStageCreateInfo::new(cs);

    let mut layout_create_info = PipelineDescriptorSetLayoutCreateInfo::from_stages(&[stage.clone()]);
    // enable push descriptor for set 0
    layout_create_info.set_layouts[0].flags |= DescriptorSetLayoutCreateFlags::PUSH_DESCRIPTOR;

    let layout = PipelineLayout::new(
        device.clone(),
        layout_create_info
            .into_pipeline_layout_create_info(device.clone())
            .map_err(|e| RenderError::PipelineCreation {
                what: name,
                detail: e.to_string(),
            })?,
    )
    .map_err(|e| RenderError::PipelineCreation {
        what: name,
        detail: e.to_string(),
    })?;

    ComputePipeline::new(
        device,
        None,
        ComputePipelineCreateInfo::stage_layout(stage, layout),
    )
    .map_err(|e| RenderError::PipelineCreation {
        what: name,
        detail: e.to_string(),
    })
}

/// Production `TraceBackend` over a Vulkan device.
///
/// Dispatch and blend passes are recorded into one command buffer per frame;
/// `present` appends the display conversion and the swapchain copy, then
/// submits everything in a single execution chained onto the previous
/// frame's future, so pass ordering comes from command-buffer order.
pub struct VulkanBackend {
    surface: Arc<Surface>,
    device: Arc<Device>,
    queue: Arc<Queue>,
    memory_allocator: Arc<StandardMemoryAllocator>,
    command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
    swapchain: Arc<Swapchain>,
    swapchain_images: Vec<Arc<Image>>,
    display_buffers: Vec<Subbuffer<[u8]>>,
    trace_pipeline: Arc<ComputePipeline>,
    blend_pipeline: Arc<ComputePipeline>,
    present_pipeline: Arc<ComputePipeline>,
    // bound in place of scene buffers that are absent this frame; the kernel
    // never reads it because the matching count is zero
    absent_binding: Subbuffer<[u8]>,
    frame_commands: Option<AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>>,
    previous_frame_end: Option<Box<dyn GpuFuture>>,
    swapchain_needs_rebuild: bool,
}

impl VulkanBackend {
    pub fn new(
        surface: Arc<Surface>,
        queue: Arc<Queue>,
        memory_allocator: Arc<StandardMemoryAllocator>,
        command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
    ) -> Result<VulkanBackend, RenderError> {
        let device = queue.device().clone();

        let (swapchain, swapchain_images) = create_swapchain(device.clone(), surface.clone())?;
        let display_buffers = create_display_buffers(&memory_allocator, &swapchain_images)?;

        let trace_module =
            trace_shader::load(device.clone()).map_err(|e| RenderError::PipelineCreation {
                what: "trace kernel",
                detail: e.to_string(),
            })?;
        let blend_module =
            blend_shader::load(device.clone()).map_err(|e| RenderError::PipelineCreation {
                what: "blend pass",
                detail: e.to_string(),
            })?;
        let present_module =
            present_shader::load(device.clone()).map_err(|e| RenderError::PipelineCreation {
                what: "present pass",
                detail: e.to_string(),
            })?;

        let trace_pipeline = create_compute_pipeline(device.clone(), trace_module, "trace kernel")?;
        let blend_pipeline = create_compute_pipeline(device.clone(), blend_module, "blend pass")?;
        let present_pipeline =
            create_compute_pipeline(device.clone(), present_module, "present pass")?;

        let absent_binding = Buffer::new_slice::<u8>(
            memory_allocator.clone(),
            BufferCreateInfo {
                usage: BufferUsage::STORAGE_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
                ..Default::default()
            },
            4,
        )
        .map_err(|e| RenderError::BufferAllocation {
            count: 1,
            stride: 4,
            detail: e.to_string(),
        })?;

        Ok(VulkanBackend {
            surface,
            previous_frame_end: Some(sync::now(device.clone()).boxed()),
            device,
            queue,
            memory_allocator,
            command_buffer_allocator,
            swapchain,
            swapchain_images,
            display_buffers,
            trace_pipeline,
            blend_pipeline,
            present_pipeline,
            absent_binding,
            frame_commands: None,
            swapchain_needs_rebuild: false,
        })
    }

    fn new_frame_commands(
        &self,
    ) -> Result<AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>, RenderError> {
        AutoCommandBufferBuilder::primary(
            self.command_buffer_allocator.as_ref(),
            self.queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .map_err(|e| RenderError::Dispatch(e.to_string()))
    }

    fn take_frame_commands(
        &mut self,
    ) -> Result<AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>, RenderError> {
        match self.frame_commands.take() {
            Some(builder) => Ok(builder),
            None => self.new_frame_commands(),
        }
    }

    fn rebuild_swapchain(&mut self, extent: [u32; 2]) -> Result<(), RenderError> {
        let (new_swapchain, new_images) = self
            .swapchain
            .recreate(SwapchainCreateInfo {
                image_extent: extent,
                ..self.swapchain.create_info()
            })
            .map_err(|e| RenderError::Present(format!("failed to recreate swapchain: {e}")))?;

        self.swapchain = new_swapchain;
        self.swapchain_images = new_images;
        self.display_buffers = create_display_buffers(&self.memory_allocator, &self.swapchain_images)?;
        log::debug!("rebuilt swapchain at {extent:?}");
        Ok(())
    }
}

impl TraceBackend for VulkanBackend {
    type Buffer = Subbuffer<[u8]>;
    type Target = Subbuffer<[f32]>;

    fn allocate_buffer(&mut self, count: usize, stride: usize) -> Result<Self::Buffer, RenderError> {
        Buffer::new_slice::<u8>(
            self.memory_allocator.clone(),
            BufferCreateInfo {
                usage: BufferUsage::STORAGE_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                // host-writable so the fast path can overwrite contents in
                // place without a release/allocate cycle
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
                    | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
                ..Default::default()
            },
            (count * stride) as DeviceSize,
        )
        .map_err(|e| RenderError::BufferAllocation {
            count,
            stride,
            detail: e.to_string(),
        })
    }

    fn upload_buffer(&mut self, buffer: &Self::Buffer, bytes: &[u8]) -> Result<(), RenderError> {
        if let Some(future) = self.previous_frame_end.as_mut() {
            future.cleanup_finished();
        }
        let mut guard = match buffer.write() {
            Ok(guard) => guard,
            Err(_) => {
                // the previous frame may still be reading this buffer
                let _ = self.device.wait_idle();
                self.previous_frame_end = Some(sync::now(self.device.clone()).boxed());
                buffer
                    .write()
                    .map_err(|e| RenderError::BufferUpload(e.to_string()))?
            }
        };
        guard.copy_from_slice(bytes);
        Ok(())
    }

    fn release_buffer(&mut self, buffer: Self::Buffer) {
        // the allocation is freed once in-flight frames drop their reference
        drop(buffer);
    }

    fn create_target(&mut self, extent: [u32; 2]) -> Result<Self::Target, RenderError> {
        Buffer::new_slice::<f32>(
            self.memory_allocator.clone(),
            BufferCreateInfo {
                usage: BufferUsage::STORAGE_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
                ..Default::default()
            },
            extent[0] as DeviceSize * extent[1] as DeviceSize * 4,
        )
        .map_err(|e| RenderError::TargetAllocation {
            width: extent[0],
            height: extent[1],
            detail: e.to_string(),
        })
    }

    fn release_target(&mut self, target: Self::Target) {
        drop(target);
    }

    fn workgroup_size(&self) -> [u32; 2] {
        TRACE_WORKGROUP
    }

    fn dispatch(
        &mut self,
        bindings: &KernelBindings<'_, Self>,
        params: &KernelParams,
        output: &Self::Target,
        groups: [u32; 3],
    ) -> Result<(), RenderError> {
        let trace_params = trace_shader::TraceParams {
            camera_to_world: params.camera_to_world,
            inverse_projection: params.inverse_projection,
            extent: params.extent.into(),
            jitter: params.jitter.into(),
            bounce_limit: params.bounce_limit,
            seed: params.seed,
            sphere_count: bindings.spheres.map_or(0, |b| b.count as u32),
            instance_count: bindings.mesh_instances.map_or(0, |b| b.count as u32),
        };
        let params_buffer = Buffer::from_data(
            self.memory_allocator.clone(),
            BufferCreateInfo {
                usage: BufferUsage::UNIFORM_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
                    | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
                ..Default::default()
            },
            trace_params,
        )
        .map_err(|e| RenderError::Dispatch(e.to_string()))?;

        let scene_binding = |buffer: Option<&GpuBuffer<Self>>| match buffer {
            Some(buffer) => buffer.alloc.clone(),
            None => self.absent_binding.clone(),
        };
        let descriptor_writes = vec![
            WriteDescriptorSet::buffer(0, scene_binding(bindings.spheres)),
            WriteDescriptorSet::buffer(1, scene_binding(bindings.mesh_instances)),
            WriteDescriptorSet::buffer(2, scene_binding(bindings.vertices)),
            WriteDescriptorSet::buffer(3, scene_binding(bindings.indices)),
            WriteDescriptorSet::buffer(4, output.clone()),
            WriteDescriptorSet::buffer(5, params_buffer),
        ];

        let mut builder = self.take_frame_commands()?;
        let result = builder
            .bind_pipeline_compute(self.trace_pipeline.clone())
            .and_then(|b| {
                b.push_descriptor_set(
                    PipelineBindPoint::Compute,
                    self.trace_pipeline.layout().clone(),
                    0,
                    descriptor_writes.into(),
                )
            })
            .and_then(|b| b.dispatch(groups));
        if let Err(err) = result {
            return Err(RenderError::Dispatch(err.to_string()));
        }
        self.frame_commands = Some(builder);
        Ok(())
    }

    fn blend(
        &mut self,
        raw: &Self::Target,
        averaged: &Self::Target,
        weight: f32,
    ) -> Result<(), RenderError> {
        let value_count = raw.len() as u32;

        let mut builder = self.take_frame_commands()?;
        let result = builder
            .bind_pipeline_compute(self.blend_pipeline.clone())
            .and_then(|b| {
                b.push_descriptor_set(
                    PipelineBindPoint::Compute,
                    self.blend_pipeline.layout().clone(),
                    0,
                    vec![
                        WriteDescriptorSet::buffer(0, raw.clone()),
                        WriteDescriptorSet::buffer(1, averaged.clone()),
                    ]
                    .into(),
                )
            })
            .and_then(|b| {
                b.push_constants(
                    self.blend_pipeline.layout().clone(),
                    0,
                    blend_shader::PushConstants {
                        weight,
                        value_count,
                    },
                )
            })
            .and_then(|b| b.dispatch([value_count.div_ceil(BLEND_WORKGROUP), 1, 1]));
        if let Err(err) = result {
            return Err(RenderError::Dispatch(err.to_string()));
        }
        self.frame_commands = Some(builder);
        Ok(())
    }

    fn present(&mut self, averaged: &Self::Target) -> Result<(), RenderError> {
        // Do not present when screen dimensions are zero. On Windows, this
        // can occur from minimizing the application.
        let window_extent = get_surface_extent(&self.surface);
        if window_extent[0] == 0 || window_extent[1] == 0 {
            self.frame_commands = None;
            return Ok(());
        }

        if self.swapchain_needs_rebuild || self.swapchain.image_extent() != window_extent {
            self.rebuild_swapchain(window_extent)?;
            self.swapchain_needs_rebuild = false;
        }

        // the accumulator resizes its targets next frame; skip until then
        if averaged.len() != window_extent[0] as u64 * window_extent[1] as u64 * 4 {
            self.frame_commands = None;
            return Ok(());
        }

        let (image_index, suboptimal, acquire_future) =
            match swapchain::acquire_next_image(self.swapchain.clone(), None)
                .map_err(Validated::unwrap)
            {
                Ok(r) => r,
                Err(VulkanError::OutOfDate) => {
                    log::debug!("swapchain out of date (at acquire)");
                    self.swapchain_needs_rebuild = true;
                    self.frame_commands = None;
                    return Ok(());
                }
                Err(e) => {
                    return Err(RenderError::Present(format!(
                        "failed to acquire next image: {e}"
                    )))
                }
            };
        if suboptimal {
            self.swapchain_needs_rebuild = true;
        }

        let display_buffer = self.display_buffers[image_index as usize].clone();

        let mut builder = self.take_frame_commands()?;
        let result = builder
            .bind_pipeline_compute(self.present_pipeline.clone())
            .and_then(|b| {
                b.push_descriptor_set(
                    PipelineBindPoint::Compute,
                    self.present_pipeline.layout().clone(),
                    0,
                    vec![
                        WriteDescriptorSet::buffer(0, averaged.clone()),
                        WriteDescriptorSet::buffer(1, display_buffer.clone()),
                    ]
                    .into(),
                )
            })
            .and_then(|b| {
                b.push_constants(
                    self.present_pipeline.layout().clone(),
                    0,
                    present_shader::PushConstants {
                        xsize: window_extent[0],
                        ysize: window_extent[1],
                    },
                )
            })
            .and_then(|b| {
                b.dispatch([
                    window_extent[0].div_ceil(TRACE_WORKGROUP[0]),
                    window_extent[1].div_ceil(TRACE_WORKGROUP[1]),
                    1,
                ])
            });
        if let Err(err) = result {
            return Err(RenderError::Present(err.to_string()));
        }

        builder
            .copy_buffer_to_image(CopyBufferToImageInfo::buffer_image(
                display_buffer,
                self.swapchain_images[image_index as usize].clone(),
            ))
            .map_err(|e| RenderError::Present(e.to_string()))?;

        let command_buffer = builder
            .build()
            .map_err(|e| RenderError::Present(e.to_string()))?;

        let previous = self
            .previous_frame_end
            .take()
            .unwrap_or_else(|| sync::now(self.device.clone()).boxed());

        let future = previous
            .join(acquire_future)
            .then_execute(self.queue.clone(), command_buffer)
            .map_err(|e| RenderError::Present(e.to_string()))?
            .then_swapchain_present(
                self.queue.clone(),
                SwapchainPresentInfo::swapchain_image_index(self.swapchain.clone(), image_index),
            )
            .then_signal_fence_and_flush();

        match future.map_err(Validated::unwrap) {
            Ok(future) => {
                self.previous_frame_end = Some(future.boxed());
            }
            Err(VulkanError::OutOfDate) => {
                log::debug!("swapchain out of date (at flush)");
                self.swapchain_needs_rebuild = true;
                self.previous_frame_end = Some(sync::now(self.device.clone()).boxed());
            }
            Err(e) => {
                log::error!("failed to flush frame: {e}");
                self.previous_frame_end = Some(sync::now(self.device.clone()).boxed());
            }
        }

        Ok(())
    }
}
