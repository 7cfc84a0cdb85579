use std::rc::Rc;

use crate::camera::Camera;
use crate::config::RendererConfig;
use crate::render_system::accumulator::FrameAccumulator;
use crate::render_system::backend::TraceBackend;
use crate::render_system::buffer_manager::{sync_buffer, SceneBuffers};
use crate::render_system::error::RenderError;
use crate::scene_system::change::detect_changes;
use crate::scene_system::material::Material;
use crate::scene_system::mesh::MeshAsset;
use crate::scene_system::packing::{MeshPacker, SpherePacker};
use crate::scene_system::registry::{PrimitiveHandle, PrimitiveRegistry};
use crate::scene_system::transform::SharedTransform;

/// Registry mutation deferred to the start of the next frame. Nothing may
/// touch the registry or the packed arrays mid-frame; callers outside the
/// frame callback queue one of these instead.
pub enum SceneCommand {
    RegisterSphere {
        handle: PrimitiveHandle,
        transform: SharedTransform,
        radius: f32,
        material: Material,
    },
    UnregisterSphere {
        handle: PrimitiveHandle,
    },
    RegisterMeshInstance {
        handle: PrimitiveHandle,
        transform: SharedTransform,
        mesh: Rc<MeshAsset>,
        material: Material,
    },
    UnregisterMeshInstance {
        handle: PrimitiveHandle,
    },
}

/// Drives the per-frame sequence: apply deferred commands, detect changes,
/// repack and re-upload what the topology flags demand, refresh transforms
/// in place on the fast path, then accumulate and present.
///
/// Owns the registry, the packers, every GPU buffer and the accumulation
/// state; collaborators get it by reference, never through ambient lookup.
pub struct TracePipeline<B: TraceBackend> {
    backend: B,
    registry: PrimitiveRegistry,
    mesh_packer: MeshPacker,
    sphere_packer: SpherePacker,
    buffers: SceneBuffers<B>,
    accumulator: FrameAccumulator<B>,
    pending: Vec<SceneCommand>,
}

impl<B: TraceBackend> TracePipeline<B> {
    pub fn new(backend: B, config: &RendererConfig) -> TracePipeline<B> {
        TracePipeline {
            backend,
            registry: PrimitiveRegistry::new(),
            mesh_packer: MeshPacker::new(),
            sphere_packer: SpherePacker::new(),
            buffers: SceneBuffers::new(),
            accumulator: FrameAccumulator::new(config),
            pending: vec![],
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn registry(&self) -> &PrimitiveRegistry {
        &self.registry
    }

    pub fn scene_buffers(&self) -> &SceneBuffers<B> {
        &self.buffers
    }

    pub fn sample_index(&self) -> u32 {
        self.accumulator.sample_index()
    }

    pub fn register_sphere(
        &mut self,
        transform: SharedTransform,
        radius: f32,
        material: Material,
    ) -> PrimitiveHandle {
        self.registry.register_sphere(transform, radius, material)
    }

    pub fn unregister_sphere(&mut self, handle: PrimitiveHandle) {
        self.registry.unregister_sphere(handle);
    }

    pub fn register_mesh_instance(
        &mut self,
        transform: SharedTransform,
        mesh: Rc<MeshAsset>,
        material: Material,
    ) -> PrimitiveHandle {
        self.registry.register_mesh_instance(transform, mesh, material)
    }

    pub fn unregister_mesh_instance(&mut self, handle: PrimitiveHandle) {
        self.registry.unregister_mesh_instance(handle);
    }

    /// Issues a handle usable in a deferred `SceneCommand`.
    pub fn reserve_handle(&mut self) -> PrimitiveHandle {
        self.registry.reserve_handle()
    }

    /// Queues a registry mutation for the start of the next frame.
    pub fn defer(&mut self, command: SceneCommand) {
        self.pending.push(command);
    }

    pub fn render_frame(
        &mut self,
        camera: &mut dyn Camera,
        viewport: [u32; 2],
    ) -> Result<(), RenderError> {
        self.apply_pending();

        if viewport[0] == 0 || viewport[1] == 0 {
            return Ok(());
        }

        let changes = detect_changes(&self.registry, camera);
        let mesh_dirty = self.registry.mesh_topology_dirty();
        let sphere_dirty = self.registry.sphere_topology_dirty();

        // never average frames from different scene states
        if changes.any() || mesh_dirty || sphere_dirty {
            self.accumulator.reset_samples();
        }

        if mesh_dirty {
            self.rebuild_meshes()?;
        } else if changes.scene_changed {
            self.refresh_mesh_transforms()?;
        }

        if sphere_dirty {
            self.rebuild_spheres()?;
        } else if changes.scene_changed {
            self.refresh_sphere_positions()?;
        }

        let view = camera.view_matrices(viewport);
        self.accumulator
            .render(&mut self.backend, &self.buffers.bindings(), &view, viewport)
    }

    fn apply_pending(&mut self) {
        for command in std::mem::take(&mut self.pending) {
            match command {
                SceneCommand::RegisterSphere {
                    handle,
                    transform,
                    radius,
                    material,
                } => self
                    .registry
                    .register_sphere_as(handle, transform, radius, material),
                SceneCommand::UnregisterSphere { handle } => {
                    self.registry.unregister_sphere(handle)
                }
                SceneCommand::RegisterMeshInstance {
                    handle,
                    transform,
                    mesh,
                    material,
                } => self
                    .registry
                    .register_mesh_instance_as(handle, transform, mesh, material),
                SceneCommand::UnregisterMeshInstance { handle } => {
                    self.registry.unregister_mesh_instance(handle)
                }
            }
        }
    }

    /// Full mesh repack plus upload of all three buffers. The topology flag
    /// is cleared only once every sync succeeded, so a failed frame leaves
    /// the previous buffers bound and retries the rebuild next frame.
    fn rebuild_meshes(&mut self) -> Result<(), RenderError> {
        self.mesh_packer.rebuild(&self.registry);
        sync_buffer(
            &mut self.backend,
            &mut self.buffers.vertices,
            &self.mesh_packer.vertices,
        )?;
        sync_buffer(
            &mut self.backend,
            &mut self.buffers.indices,
            &self.mesh_packer.indices,
        )?;
        sync_buffer(
            &mut self.backend,
            &mut self.buffers.mesh_instances,
            &self.mesh_packer.instances,
        )?;
        self.registry.clear_mesh_topology_dirty();
        Ok(())
    }

    fn rebuild_spheres(&mut self) -> Result<(), RenderError> {
        self.sphere_packer.rebuild(&self.registry);
        sync_buffer(
            &mut self.backend,
            &mut self.buffers.spheres,
            &self.sphere_packer.records,
        )?;
        self.registry.clear_sphere_topology_dirty();
        Ok(())
    }

    fn refresh_mesh_transforms(&mut self) -> Result<(), RenderError> {
        match self.mesh_packer.refresh_transforms(&self.registry) {
            Ok(()) => sync_buffer(
                &mut self.backend,
                &mut self.buffers.mesh_instances,
                &self.mesh_packer.instances,
            ),
            Err(err) => {
                log::warn!("{err}; falling back to a full rebuild");
                self.rebuild_meshes()
            }
        }
    }

    fn refresh_sphere_positions(&mut self) -> Result<(), RenderError> {
        match self.sphere_packer.refresh_positions(&self.registry) {
            Ok(()) => sync_buffer(
                &mut self.backend,
                &mut self.buffers.spheres,
                &self.sphere_packer.records,
            ),
            Err(err) => {
                log::warn!("{err}; falling back to a full rebuild");
                self.rebuild_spheres()
            }
        }
    }
}

impl<B: TraceBackend> Drop for TracePipeline<B> {
    fn drop(&mut self) {
        let backend = &mut self.backend;
        self.buffers.release_all(backend);
        self.accumulator.release_targets(backend);
    }
}
