use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::scene_system::material::Material;
use crate::scene_system::mesh::MeshAssetId;
use crate::scene_system::registry::PrimitiveRegistry;

// The record layouts below mirror the scalar-layout structs in the trace
// kernel byte for byte; any field added here must be added there too.

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct GpuMaterial {
    pub albedo: [f32; 3],
    pub specular: [f32; 3],
    pub emission: [f32; 3],
    pub smoothness: f32,
}

impl From<Material> for GpuMaterial {
    fn from(material: Material) -> GpuMaterial {
        GpuMaterial {
            albedo: material.albedo,
            specular: material.specular,
            emission: material.emission,
            smoothness: material.smoothness,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct SphereRecord {
    pub position: [f32; 3],
    pub radius: f32,
    pub material: GpuMaterial,
}

/// Span of a deduplicated asset inside the global index array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct MeshRange {
    pub offset: u32,
    pub count: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct MeshInstanceRecord {
    pub local_to_world: [[f32; 4]; 4],
    pub range: MeshRange,
    pub material: GpuMaterial,
}

/// Raised when a fast-path refresh finds the packed arrays out of step with
/// the registry; the caller falls back to a full rebuild instead of writing
/// index-misaligned records.
#[derive(Debug, Error)]
#[error("packed {kind} records out of sync with registry ({packed} packed, {registered} registered)")]
pub struct PackMismatch {
    pub kind: &'static str,
    pub packed: usize,
    pub registered: usize,
}

/// Flattens registered mesh primitives into one deduplicated vertex/index
/// pair plus one instance record per primitive, in registration order.
pub struct MeshPacker {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub instances: Vec<MeshInstanceRecord>,
}

impl MeshPacker {
    pub fn new() -> MeshPacker {
        MeshPacker {
            vertices: vec![],
            indices: vec![],
            instances: vec![],
        }
    }

    pub fn rebuild(&mut self, registry: &PrimitiveRegistry) {
        self.vertices.clear();
        self.indices.clear();
        self.instances.clear();

        // asset identity -> range, scoped to this single rebuild pass
        let mut ranges: HashMap<MeshAssetId, MeshRange> = HashMap::new();

        for (entry, mesh) in registry.mesh_instances() {
            let range = match ranges.get(&mesh.id()) {
                Some(range) => *range,
                None => {
                    // first sighting of this asset: append its geometry,
                    // rebasing indices onto the concatenated vertex array
                    let base_vertex = self.vertices.len() as u32;
                    let offset = self.indices.len() as u32;
                    self.vertices.extend_from_slice(mesh.vertices());
                    self.indices
                        .extend(mesh.indices().iter().map(|i| i + base_vertex));
                    let range = MeshRange {
                        offset,
                        count: mesh.indices().len() as u32,
                    };
                    ranges.insert(mesh.id(), range);
                    range
                }
            };

            self.instances.push(MeshInstanceRecord {
                local_to_world: entry.transform.borrow().local_to_world().into(),
                range,
                material: entry.material.into(),
            });
        }
    }

    /// Fast path: overwrite the matrices of the existing records in place.
    /// Never changes the array length.
    pub fn refresh_transforms(&mut self, registry: &PrimitiveRegistry) -> Result<(), PackMismatch> {
        let registered = registry.mesh_instance_count();
        if self.instances.len() != registered {
            return Err(PackMismatch {
                kind: "mesh instance",
                packed: self.instances.len(),
                registered,
            });
        }
        for (record, (entry, _)) in self.instances.iter_mut().zip(registry.mesh_instances()) {
            record.local_to_world = entry.transform.borrow().local_to_world().into();
        }
        Ok(())
    }
}

impl Default for MeshPacker {
    fn default() -> MeshPacker {
        MeshPacker::new()
    }
}

/// Flattens registered sphere primitives in registration order.
pub struct SpherePacker {
    pub records: Vec<SphereRecord>,
}

impl SpherePacker {
    pub fn new() -> SpherePacker {
        SpherePacker { records: vec![] }
    }

    pub fn rebuild(&mut self, registry: &PrimitiveRegistry) {
        self.records.clear();
        for (entry, radius) in registry.spheres() {
            let transform = entry.transform.borrow();
            self.records.push(SphereRecord {
                position: transform.position().into(),
                radius: radius * transform.scale(),
                material: entry.material.into(),
            });
        }
    }

    /// Fast path: overwrite positions in place, leaving radius and material
    /// untouched. Never changes the array length.
    pub fn refresh_positions(&mut self, registry: &PrimitiveRegistry) -> Result<(), PackMismatch> {
        let registered = registry.sphere_count();
        if self.records.len() != registered {
            return Err(PackMismatch {
                kind: "sphere",
                packed: self.records.len(),
                registered,
            });
        }
        for (record, (entry, _)) in self.records.iter_mut().zip(registry.spheres()) {
            record.position = entry.transform.borrow().position().into();
        }
        Ok(())
    }
}

impl Default for SpherePacker {
    fn default() -> SpherePacker {
        SpherePacker::new()
    }
}
