use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ASSET_ID: AtomicU64 = AtomicU64::new(0);

/// Stable identity key issued when the asset is built. Packing deduplicates
/// by this key, never by geometry content: two assets with identical geometry
/// are packed twice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshAssetId(u64);

/// Immutable shared triangle geometry.
pub struct MeshAsset {
    id: MeshAssetId,
    vertices: Vec<[f32; 3]>,
    indices: Vec<u32>,
}

impl MeshAsset {
    pub fn new(vertices: Vec<[f32; 3]>, indices: Vec<u32>) -> Rc<MeshAsset> {
        assert!(indices.len() % 3 == 0, "indices must form whole triangles");
        assert!(
            indices.iter().all(|&i| (i as usize) < vertices.len()),
            "index out of range for vertex list"
        );
        Rc::new(MeshAsset {
            id: MeshAssetId(NEXT_ASSET_ID.fetch_add(1, Ordering::Relaxed)),
            vertices,
            indices,
        })
    }

    pub fn id(&self) -> MeshAssetId {
        self.id
    }

    pub fn vertices(&self) -> &[[f32; 3]] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}
