use std::cell::RefCell;
use std::rc::Rc;

use nalgebra::{Isometry3, Matrix4, Point3, UnitQuaternion, Vector3};

/// Transform shared between the application and the registry's watch set.
pub type SharedTransform = Rc<RefCell<Transform>>;

// position/rotation as an isometry plus a uniform scale factor
pub struct Transform {
    isometry: Isometry3<f32>,
    scale: f32,
    changed: bool,
}

impl Transform {
    pub fn new() -> Transform {
        Transform {
            isometry: Isometry3::identity(),
            scale: 1.0,
            changed: true,
        }
    }

    pub fn from_position(position: Point3<f32>) -> Transform {
        let mut transform = Transform::new();
        transform.isometry.translation.vector = position.coords;
        transform
    }

    pub fn with_scale(mut self, scale: f32) -> Transform {
        self.scale = scale;
        self
    }

    pub fn with_rotation(mut self, rotation: UnitQuaternion<f32>) -> Transform {
        self.isometry.rotation = rotation;
        self
    }

    pub fn into_shared(self) -> SharedTransform {
        Rc::new(RefCell::new(self))
    }

    pub fn position(&self) -> Point3<f32> {
        self.isometry.translation.vector.into()
    }

    pub fn set_position(&mut self, position: Point3<f32>) {
        self.isometry.translation.vector = position.coords;
        self.changed = true;
    }

    pub fn rotation(&self) -> UnitQuaternion<f32> {
        self.isometry.rotation
    }

    pub fn set_rotation(&mut self, rotation: UnitQuaternion<f32>) {
        self.isometry.rotation = rotation;
        self.changed = true;
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
        self.changed = true;
    }

    pub fn translate(&mut self, offset: Vector3<f32>) {
        self.isometry.translation.vector += offset;
        self.changed = true;
    }

    pub fn local_to_world(&self) -> Matrix4<f32> {
        self.isometry.to_homogeneous() * Matrix4::new_scaling(self.scale)
    }

    /// Reads and clears the changed bit. A mutation is observed at most once,
    /// by whichever caller runs first.
    pub fn take_changed(&mut self) -> bool {
        std::mem::replace(&mut self.changed, false)
    }
}

impl Default for Transform {
    fn default() -> Transform {
        Transform::new()
    }
}
