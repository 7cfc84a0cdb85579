use std::rc::Rc;

use crate::scene_system::material::Material;
use crate::scene_system::mesh::MeshAsset;
use crate::scene_system::transform::SharedTransform;

/// Opaque identity of a registered primitive. Issued on registration,
/// invalidated on unregistration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PrimitiveHandle(u64);

pub enum PrimitiveShape {
    Sphere { radius: f32 },
    MeshInstance { mesh: Rc<MeshAsset> },
}

pub struct PrimitiveEntry {
    pub handle: PrimitiveHandle,
    pub transform: SharedTransform,
    pub material: Material,
    pub shape: PrimitiveShape,
}

/// Ordered bookkeeping of the active scene primitives.
///
/// Registration order is significant: it defines the emission order of the
/// packed buffers, which the per-frame in-place transform updates rely on
/// through index-aligned correspondence.
pub struct PrimitiveRegistry {
    entries: Vec<PrimitiveEntry>,
    next_id: u64,
    mesh_topology_dirty: bool,
    sphere_topology_dirty: bool,
}

impl PrimitiveRegistry {
    pub fn new() -> PrimitiveRegistry {
        PrimitiveRegistry {
            entries: vec![],
            next_id: 0,
            mesh_topology_dirty: false,
            sphere_topology_dirty: false,
        }
    }

    /// Issues a handle ahead of registration, so deferred registration
    /// commands can hand one back to the caller immediately.
    pub fn reserve_handle(&mut self) -> PrimitiveHandle {
        let handle = PrimitiveHandle(self.next_id);
        self.next_id += 1;
        handle
    }

    pub fn register_sphere(
        &mut self,
        transform: SharedTransform,
        radius: f32,
        material: Material,
    ) -> PrimitiveHandle {
        let handle = self.reserve_handle();
        self.register_sphere_as(handle, transform, radius, material);
        handle
    }

    pub fn register_sphere_as(
        &mut self,
        handle: PrimitiveHandle,
        transform: SharedTransform,
        radius: f32,
        material: Material,
    ) {
        self.entries.push(PrimitiveEntry {
            handle,
            transform,
            material,
            shape: PrimitiveShape::Sphere { radius },
        });
        self.sphere_topology_dirty = true;
    }

    pub fn register_mesh_instance(
        &mut self,
        transform: SharedTransform,
        mesh: Rc<MeshAsset>,
        material: Material,
    ) -> PrimitiveHandle {
        let handle = self.reserve_handle();
        self.register_mesh_instance_as(handle, transform, mesh, material);
        handle
    }

    pub fn register_mesh_instance_as(
        &mut self,
        handle: PrimitiveHandle,
        transform: SharedTransform,
        mesh: Rc<MeshAsset>,
        material: Material,
    ) {
        self.entries.push(PrimitiveEntry {
            handle,
            transform,
            material,
            shape: PrimitiveShape::MeshInstance { mesh },
        });
        self.mesh_topology_dirty = true;
    }

    pub fn unregister_sphere(&mut self, handle: PrimitiveHandle) {
        let position = self.entries.iter().position(|e| {
            e.handle == handle && matches!(e.shape, PrimitiveShape::Sphere { .. })
        });
        match position {
            Some(index) => {
                self.entries.remove(index);
                self.sphere_topology_dirty = true;
            }
            None => log::warn!("unregister_sphere: unknown handle {handle:?}"),
        }
    }

    pub fn unregister_mesh_instance(&mut self, handle: PrimitiveHandle) {
        let position = self.entries.iter().position(|e| {
            e.handle == handle && matches!(e.shape, PrimitiveShape::MeshInstance { .. })
        });
        match position {
            Some(index) => {
                self.entries.remove(index);
                self.mesh_topology_dirty = true;
            }
            None => log::warn!("unregister_mesh_instance: unknown handle {handle:?}"),
        }
    }

    /// All entries in registration order. This doubles as the watched
    /// transform set: every registered primitive's transform is watched.
    pub fn entries(&self) -> impl Iterator<Item = &PrimitiveEntry> {
        self.entries.iter()
    }

    pub fn spheres(&self) -> impl Iterator<Item = (&PrimitiveEntry, f32)> {
        self.entries.iter().filter_map(|e| match e.shape {
            PrimitiveShape::Sphere { radius } => Some((e, radius)),
            PrimitiveShape::MeshInstance { .. } => None,
        })
    }

    pub fn mesh_instances(&self) -> impl Iterator<Item = (&PrimitiveEntry, &Rc<MeshAsset>)> {
        self.entries.iter().filter_map(|e| match &e.shape {
            PrimitiveShape::MeshInstance { mesh } => Some((e, mesh)),
            PrimitiveShape::Sphere { .. } => None,
        })
    }

    pub fn sphere_count(&self) -> usize {
        self.spheres().count()
    }

    pub fn mesh_instance_count(&self) -> usize {
        self.mesh_instances().count()
    }

    pub fn mesh_topology_dirty(&self) -> bool {
        self.mesh_topology_dirty
    }

    pub fn sphere_topology_dirty(&self) -> bool {
        self.sphere_topology_dirty
    }

    // cleared by the orchestrator once the corresponding rebuild succeeded
    pub fn clear_mesh_topology_dirty(&mut self) {
        self.mesh_topology_dirty = false;
    }

    pub fn clear_sphere_topology_dirty(&mut self) {
        self.sphere_topology_dirty = false;
    }
}

impl Default for PrimitiveRegistry {
    fn default() -> PrimitiveRegistry {
        PrimitiveRegistry::new()
    }
}
