use std::sync::Arc;

use nalgebra::{Point3, UnitQuaternion, Vector3};

use vulkano::command_buffer::allocator::StandardCommandBufferAllocator;
use vulkano::instance::{Instance, InstanceCreateFlags, InstanceCreateInfo};
use vulkano::memory::allocator::StandardMemoryAllocator;
use vulkano::swapchain::Surface;
use vulkano::VulkanLibrary;
use winit::event::{ElementState, Event, VirtualKeyCode, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use vulkan_progressive_raytracer::camera::{InteractiveCamera, OrbitCamera};
use vulkan_progressive_raytracer::config::RendererConfig;
use vulkan_progressive_raytracer::render_system::pipeline::TracePipeline;
use vulkan_progressive_raytracer::render_system::vulkan::{self, VulkanBackend};
use vulkan_progressive_raytracer::scene_system::material::Material;
use vulkan_progressive_raytracer::scene_system::transform::{SharedTransform, Transform};
use vulkan_progressive_raytracer::utils;

fn build_demo_scene(pipeline: &mut TracePipeline<VulkanBackend>) -> SharedTransform {
    // ground
    pipeline.register_mesh_instance(
        Transform::new().into_shared(),
        utils::plane(40.0),
        Material::diffuse([0.55, 0.55, 0.6]),
    );

    // ring of spheres sweeping from rough to mirror-like
    for i in 0..8 {
        let angle = i as f32 / 8.0 * std::f32::consts::TAU;
        let position = Point3::new(5.0 * angle.cos(), 1.0, 5.0 * angle.sin());
        let smoothness = i as f32 / 7.0;
        pipeline.register_sphere(
            Transform::from_position(position).into_shared(),
            1.0,
            Material::glossy([0.85, 0.35, 0.3], [0.8, 0.8, 0.8], smoothness),
        );
    }

    // key light
    pipeline.register_sphere(
        Transform::from_position(Point3::new(0.0, 9.0, 0.0)).into_shared(),
        2.5,
        Material::emissive([7.0, 6.6, 6.0]),
    );

    // two boxes sharing one mesh asset
    let cube = utils::unit_cube();
    pipeline.register_mesh_instance(
        Transform::from_position(Point3::new(-3.0, 1.0, -3.0))
            .with_scale(2.0)
            .into_shared(),
        cube.clone(),
        Material::diffuse([0.3, 0.5, 0.85]),
    );
    pipeline.register_mesh_instance(
        Transform::from_position(Point3::new(3.0, 0.75, 3.0))
            .with_scale(1.5)
            .with_rotation(UnitQuaternion::from_axis_angle(
                &Vector3::y_axis(),
                std::f32::consts::FRAC_PI_4,
            ))
            .into_shared(),
        cube,
        Material::glossy([0.9, 0.8, 0.4], [0.9, 0.8, 0.4], 0.8),
    );

    // nudged with the space bar to exercise the in-place update path
    let movable = Transform::from_position(Point3::new(0.0, 2.0, 0.0)).into_shared();
    pipeline.register_sphere(
        movable.clone(),
        1.25,
        Material::glossy([0.9, 0.9, 0.9], [0.95, 0.95, 0.95], 0.95),
    );
    movable
}

fn main() {
    env_logger::init();

    let config = RendererConfig::load("settings.json");

    let library = VulkanLibrary::new().expect("vulkan library unavailable");
    let event_loop = EventLoop::new();
    let required_extensions = Surface::required_extensions(&event_loop);

    let instance = Instance::new(
        library,
        InstanceCreateInfo {
            flags: InstanceCreateFlags::ENUMERATE_PORTABILITY,
            enabled_extensions: required_extensions,
            ..Default::default()
        },
    )
    .expect("failed to create vulkan instance");

    let window = Arc::new(
        WindowBuilder::new()
            .with_title("vulkan progressive raytracer")
            .build(&event_loop)
            .expect("failed to create window"),
    );
    let surface = Surface::from_window(instance.clone(), window).expect("failed to create surface");

    let (device, queue) = vulkan::get_device_for_rendering_on(instance.clone(), surface.clone())
        .expect("failed to pick a rendering device");

    log::info!(
        "using device: {} (type: {:?})",
        device.physical_device().properties().device_name,
        device.physical_device().properties().device_type
    );

    let memory_allocator = Arc::new(StandardMemoryAllocator::new_default(device.clone()));
    let command_buffer_allocator = Arc::new(StandardCommandBufferAllocator::new(
        device.clone(),
        Default::default(),
    ));

    let backend = VulkanBackend::new(
        surface.clone(),
        queue,
        memory_allocator,
        command_buffer_allocator,
    )
    .expect("failed to initialize the renderer");

    let mut pipeline = TracePipeline::new(backend, &config);
    let movable = build_demo_scene(&mut pipeline);
    let mut camera = OrbitCamera::new();

    let mut start_time = std::time::Instant::now();
    let mut frame_count = 0u32;

    event_loop.run(move |event, _, control_flow| match event {
        Event::WindowEvent {
            event: WindowEvent::CloseRequested,
            ..
        } => {
            *control_flow = ControlFlow::Exit;
        }
        Event::WindowEvent { event, .. } => {
            if let WindowEvent::KeyboardInput { input, .. } = &event {
                if input.state == ElementState::Pressed
                    && input.virtual_keycode == Some(VirtualKeyCode::Space)
                {
                    movable
                        .borrow_mut()
                        .translate(Vector3::new(0.25, 0.0, 0.0));
                }
            }
            let extent = vulkan::get_surface_extent(&surface);
            camera.handle_event(extent, &event);
        }
        Event::RedrawEventsCleared => {
            frame_count += 1;
            let elapsed = start_time.elapsed();
            if elapsed.as_secs() >= 1 {
                log::info!(
                    "fps: {frame_count}, accumulated samples: {}",
                    pipeline.sample_index()
                );
                frame_count = 0;
                start_time = std::time::Instant::now();
            }

            let extent = vulkan::get_surface_extent(&surface);
            if let Err(err) = pipeline.render_frame(&mut camera, extent) {
                log::error!("frame failed: {err}");
            }
        }
        _ => (),
    });
}
