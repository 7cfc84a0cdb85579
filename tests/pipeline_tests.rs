//! Whole-pipeline tests against the stub backend: buffer lifecycle and
//! reuse, progressive accumulation and its reset conditions, and the
//! per-frame orchestration order they imply.

mod common;

use std::rc::Rc;

use nalgebra::Point3;

use common::{StubBackend, StubCamera};
use vulkan_progressive_raytracer::config::RendererConfig;
use vulkan_progressive_raytracer::render_system::pipeline::{SceneCommand, TracePipeline};
use vulkan_progressive_raytracer::scene_system::material::Material;
use vulkan_progressive_raytracer::scene_system::mesh::MeshAsset;
use vulkan_progressive_raytracer::scene_system::packing::SphereRecord;
use vulkan_progressive_raytracer::scene_system::transform::{SharedTransform, Transform};

const VIEWPORT: [u32; 2] = [64, 48];

fn new_pipeline() -> TracePipeline<StubBackend> {
    TracePipeline::new(StubBackend::new(), &RendererConfig::default())
}

fn sphere_records(pipeline: &TracePipeline<StubBackend>) -> Vec<SphereRecord> {
    let buffer = pipeline
        .scene_buffers()
        .spheres
        .as_ref()
        .expect("sphere buffer absent");
    bytemuck::pod_collect_to_vec(pipeline.backend().buffer_bytes(&buffer.alloc))
}

fn register_two_spheres(pipeline: &mut TracePipeline<StubBackend>) -> SharedTransform {
    let first = Transform::new().into_shared();
    pipeline.register_sphere(first.clone(), 1.0, Material::default());
    pipeline.register_sphere(
        Transform::from_position(Point3::new(5.0, 0.0, 0.0)).into_shared(),
        2.0,
        Material::default(),
    );
    first
}

#[test]
fn first_frame_uploads_and_presents() {
    let mut pipeline = new_pipeline();
    let mut camera = StubCamera::new();
    register_two_spheres(&mut pipeline);

    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();

    let records = sphere_records(&pipeline);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].position, [0.0, 0.0, 0.0]);
    assert_eq!(records[0].radius, 1.0);
    assert_eq!(records[1].position, [5.0, 0.0, 0.0]);
    assert_eq!(records[1].radius, 2.0);

    let stats = &pipeline.backend().stats;
    assert_eq!(stats.buffer_allocs, 1);
    assert_eq!(stats.uploads, 1);
    assert_eq!(stats.dispatches, 1);
    assert_eq!(stats.blends, 1);
    assert_eq!(stats.presents, 1);
    assert_eq!(stats.target_allocs, 2);
    assert_eq!(pipeline.sample_index(), 1);
}

#[test]
fn static_frames_accumulate_without_reupload() {
    let mut pipeline = new_pipeline();
    let mut camera = StubCamera::new();
    register_two_spheres(&mut pipeline);

    for _ in 0..5 {
        pipeline.render_frame(&mut camera, VIEWPORT).unwrap();
    }

    assert_eq!(pipeline.sample_index(), 5);
    let stats = &pipeline.backend().stats;
    // re-uploading unchanged data would be wasted work, and must never
    // happen while the scene is static
    assert_eq!(stats.uploads, 1);
    assert_eq!(stats.buffer_allocs, 1);
    assert_eq!(stats.buffer_releases, 0);
    assert_eq!(stats.dispatches, 5);
}

#[test]
fn averaged_target_converges_to_the_arithmetic_mean() {
    let mut pipeline = new_pipeline();
    let mut camera = StubCamera::new();
    register_two_spheres(&mut pipeline);

    let frames = 5;
    for _ in 0..frames {
        pipeline.render_frame(&mut camera, VIEWPORT).unwrap();
    }

    // the stub's dispatch k produces the constant sample k
    let expected = (0..frames).sum::<u32>() as f32 / frames as f32;
    let averaged = pipeline
        .backend()
        .last_averaged
        .as_ref()
        .expect("no blend ran")
        .borrow()[0];
    assert!((averaged - expected).abs() < 1e-4);
}

#[test]
fn multi_sample_frames_accumulate_once_per_dispatch() {
    let config = RendererConfig {
        samples_per_frame: 4,
        ..RendererConfig::default()
    };
    let mut pipeline = TracePipeline::new(StubBackend::new(), &config);
    let mut camera = StubCamera::new();
    register_two_spheres(&mut pipeline);

    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();

    assert_eq!(pipeline.sample_index(), 4);
    let stats = &pipeline.backend().stats;
    assert_eq!(stats.dispatches, 4);
    assert_eq!(stats.blends, 4);
    assert_eq!(stats.presents, 1);

    // mean of samples 0..4
    let averaged = pipeline
        .backend()
        .last_averaged
        .as_ref()
        .unwrap()
        .borrow()[0];
    assert!((averaged - 1.5).abs() < 1e-4);
}

#[test]
fn moving_a_transform_resets_accumulation_and_reuses_buffers() {
    let mut pipeline = new_pipeline();
    let mut camera = StubCamera::new();
    let transform = register_two_spheres(&mut pipeline);

    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();
    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();
    assert_eq!(pipeline.sample_index(), 2);

    transform
        .borrow_mut()
        .set_position(Point3::new(0.0, 3.0, 0.0));
    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();

    // accumulation restarted
    assert_eq!(pipeline.sample_index(), 1);

    // the fast path re-uploaded in place: contents changed, allocation reused
    let records = sphere_records(&pipeline);
    assert_eq!(records[0].position, [0.0, 3.0, 0.0]);
    let stats = &pipeline.backend().stats;
    assert_eq!(stats.uploads, 2);
    assert_eq!(stats.buffer_allocs, 1);
    assert_eq!(stats.buffer_releases, 0);

    // the averaged target discarded the pre-reset history: it now equals the
    // third sample exactly, not the running mean of all three
    let averaged = pipeline
        .backend()
        .last_averaged
        .as_ref()
        .unwrap()
        .borrow()[0];
    assert!((averaged - 2.0).abs() < 1e-4);
}

#[test]
fn camera_movement_resets_without_reupload() {
    let mut pipeline = new_pipeline();
    let mut camera = StubCamera::new();
    register_two_spheres(&mut pipeline);

    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();
    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();
    assert_eq!(pipeline.sample_index(), 2);

    camera.move_camera();
    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();

    assert_eq!(pipeline.sample_index(), 1);
    assert_eq!(pipeline.backend().stats.uploads, 1);
}

#[test]
fn unregistering_reallocates_and_resets() {
    let mut pipeline = new_pipeline();
    let mut camera = StubCamera::new();

    let first_transform = Transform::new().into_shared();
    let first = pipeline.register_sphere(first_transform, 1.0, Material::default());
    pipeline.register_sphere(
        Transform::from_position(Point3::new(5.0, 0.0, 0.0)).into_shared(),
        2.0,
        Material::default(),
    );

    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();
    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();
    assert_eq!(pipeline.sample_index(), 2);

    pipeline.unregister_sphere(first);
    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();

    let records = sphere_records(&pipeline);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].position, [5.0, 0.0, 0.0]);
    assert_eq!(records[0].radius, 2.0);

    // the count changed, so this is the one case that pays release+allocate
    let stats = &pipeline.backend().stats;
    assert_eq!(stats.buffer_allocs, 2);
    assert_eq!(stats.buffer_releases, 1);
    assert_eq!(pipeline.sample_index(), 1);
}

#[test]
fn removing_every_sphere_releases_the_buffer() {
    let mut pipeline = new_pipeline();
    let mut camera = StubCamera::new();

    let transform = Transform::new().into_shared();
    let handle = pipeline.register_sphere(transform, 1.0, Material::default());
    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();
    assert!(pipeline.scene_buffers().spheres.is_some());

    pipeline.unregister_sphere(handle);
    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();

    // absent buffer means "no data of this kind", and the frame still runs
    assert!(pipeline.scene_buffers().spheres.is_none());
    let stats = &pipeline.backend().stats;
    assert_eq!(stats.buffer_releases, 1);
    assert_eq!(stats.presents, 2);
}

#[test]
fn mesh_dedup_reaches_the_gpu_buffers() {
    let mut pipeline = new_pipeline();
    let mut camera = StubCamera::new();

    let a: Rc<MeshAsset> = MeshAsset::new(
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ],
        vec![0, 1, 2, 0, 2, 3],
    );
    let b: Rc<MeshAsset> = MeshAsset::new(
        vec![[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0]],
        vec![0, 1, 2],
    );

    pipeline.register_mesh_instance(Transform::new().into_shared(), a.clone(), Material::default());
    pipeline.register_mesh_instance(Transform::new().into_shared(), a, Material::default());
    pipeline.register_mesh_instance(Transform::new().into_shared(), b, Material::default());

    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();

    let buffers = pipeline.scene_buffers();
    assert_eq!(buffers.vertices.as_ref().unwrap().count, 7);
    assert_eq!(buffers.indices.as_ref().unwrap().count, 9);
    assert_eq!(buffers.mesh_instances.as_ref().unwrap().count, 3);
    assert!(buffers.spheres.is_none());
}

#[test]
fn resizing_the_viewport_resets_and_reallocates_targets() {
    let mut pipeline = new_pipeline();
    let mut camera = StubCamera::new();
    register_two_spheres(&mut pipeline);

    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();
    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();
    assert_eq!(pipeline.backend().stats.target_allocs, 2);
    assert_eq!(pipeline.sample_index(), 2);

    pipeline.render_frame(&mut camera, [128, 96]).unwrap();

    let stats = &pipeline.backend().stats;
    assert_eq!(stats.target_allocs, 4);
    assert_eq!(stats.target_releases, 2);
    assert_eq!(pipeline.sample_index(), 1);
}

#[test]
fn zero_sized_viewports_are_skipped() {
    let mut pipeline = new_pipeline();
    let mut camera = StubCamera::new();
    register_two_spheres(&mut pipeline);

    pipeline.render_frame(&mut camera, [0, 0]).unwrap();

    let stats = &pipeline.backend().stats;
    assert_eq!(stats.dispatches, 0);
    assert_eq!(stats.presents, 0);
    assert_eq!(pipeline.sample_index(), 0);
}

#[test]
fn failed_allocation_keeps_previous_buffers_and_retries() {
    let mut pipeline = new_pipeline();
    let mut camera = StubCamera::new();
    register_two_spheres(&mut pipeline);
    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();

    pipeline.register_sphere(
        Transform::from_position(Point3::new(0.0, 0.0, 5.0)).into_shared(),
        3.0,
        Material::default(),
    );
    pipeline.backend_mut().fail_allocation = true;
    assert!(pipeline.render_frame(&mut camera, VIEWPORT).is_err());

    // the frame aborted before dispatch, with the previous buffer intact
    assert_eq!(sphere_records(&pipeline).len(), 2);
    assert!(pipeline.registry().sphere_topology_dirty());

    // the next frame retries the rebuild
    pipeline.backend_mut().fail_allocation = false;
    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();
    assert_eq!(sphere_records(&pipeline).len(), 3);
    assert_eq!(pipeline.sample_index(), 1);
}

#[test]
fn deferred_commands_apply_at_the_start_of_the_next_frame() {
    let mut pipeline = new_pipeline();
    let mut camera = StubCamera::new();
    register_two_spheres(&mut pipeline);
    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();

    let handle = pipeline.reserve_handle();
    pipeline.defer(SceneCommand::RegisterSphere {
        handle,
        transform: Transform::from_position(Point3::new(9.0, 0.0, 0.0)).into_shared(),
        radius: 4.0,
        material: Material::default(),
    });

    // nothing is applied until the frame begins
    assert_eq!(pipeline.registry().sphere_count(), 2);

    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();
    assert_eq!(pipeline.registry().sphere_count(), 3);
    let records = sphere_records(&pipeline);
    assert_eq!(records.len(), 3);
    assert_eq!(records[2].position, [9.0, 0.0, 0.0]);
    assert_eq!(records[2].radius, 4.0);

    pipeline.defer(SceneCommand::UnregisterSphere { handle });
    pipeline.render_frame(&mut camera, VIEWPORT).unwrap();
    assert_eq!(sphere_records(&pipeline).len(), 2);
}
