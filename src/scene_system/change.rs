use crate::camera::Camera;
use crate::scene_system::registry::PrimitiveRegistry;

/// What moved since the last frame. Either flag forces the accumulator's
/// sample index back to zero; `scene_changed` additionally drives the
/// in-place transform refresh of the packed buffers.
#[derive(Clone, Copy, Debug, Default)]
pub struct SceneChanges {
    pub scene_changed: bool,
    pub camera_moved: bool,
}

impl SceneChanges {
    pub fn any(&self) -> bool {
        self.scene_changed || self.camera_moved
    }
}

/// Sweeps the changed bits of every watched transform and of the camera.
/// The bits are compare-and-clear: each mutation is observed exactly once,
/// by whichever sweep runs first in the frame.
pub fn detect_changes(registry: &PrimitiveRegistry, camera: &mut dyn Camera) -> SceneChanges {
    let mut scene_changed = false;
    for entry in registry.entries() {
        if entry.transform.borrow_mut().take_changed() {
            scene_changed = true;
        }
    }
    let camera_moved = camera.take_changed();
    SceneChanges {
        scene_changed,
        camera_moved,
    }
}
