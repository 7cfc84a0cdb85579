use nalgebra::{Isometry3, Matrix4, Perspective3, Point2, Point3, Vector3};
use winit::event::{ElementState, MouseButton, WindowEvent};

use crate::utils;

#[inline]
fn deg2rad(deg: f32) -> f32 {
    deg * std::f32::consts::PI / 180.0
}

// vectors giving the current perception of the camera
#[derive(Clone, Debug)]
struct DirVecs {
    front: Vector3<f32>,
    up: Vector3<f32>,
}

impl DirVecs {
    fn new(worldup: Vector3<f32>, pitch: f32, yaw: f32) -> DirVecs {
        let front = Vector3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize();
        let right = front.cross(&worldup).normalize();
        let up = right.cross(&front).normalize();
        DirVecs { front, up }
    }
}

/// The matrices the trace kernel consumes.
pub struct ViewMatrices {
    pub camera_to_world: Matrix4<f32>,
    pub inverse_projection: Matrix4<f32>,
}

/// What the pipeline reads from a camera: its matrices and a
/// compare-and-clear moved bit.
pub trait Camera {
    fn view_matrices(&self, extent: [u32; 2]) -> ViewMatrices;
    fn take_changed(&mut self) -> bool;
}

pub trait InteractiveCamera: Camera {
    fn handle_event(&mut self, extent: [u32; 2], event: &WindowEvent);
}

// lets you orbit around the central point by clicking and dragging
pub struct OrbitCamera {
    target: Point3<f32>,
    worldup: Vector3<f32>,
    // offset from the target position
    offset: f32,
    pitch: f32,
    yaw: f32,
    fovy: f32,
    changed: bool,

    // contains mouse data (if being dragged)
    mouse_down: bool,
    mouse_prev: Point2<f32>,
    mouse_curr: Point2<f32>,
}

impl OrbitCamera {
    pub fn new() -> OrbitCamera {
        OrbitCamera {
            target: Point3::origin(),
            worldup: Vector3::new(0.0, 1.0, 0.0),
            offset: 12.0,
            pitch: deg2rad(20.0),
            yaw: deg2rad(-90.0),
            fovy: deg2rad(50.0),
            changed: true,
            mouse_down: false,
            mouse_prev: Default::default(),
            mouse_curr: Default::default(),
        }
    }

    pub fn set_target(&mut self, target: Point3<f32>) {
        self.target = target;
        self.changed = true;
    }
}

impl Camera for OrbitCamera {
    fn view_matrices(&self, extent: [u32; 2]) -> ViewMatrices {
        let vecs = DirVecs::new(self.worldup, self.pitch, self.yaw);
        let eye = self.target - self.offset * vecs.front;
        let view = Isometry3::look_at_rh(&eye, &self.target, &vecs.up);

        let aspect = extent[0] as f32 / extent[1].max(1) as f32;
        let projection = Perspective3::new(aspect, self.fovy, 0.1, 1000.0);

        ViewMatrices {
            camera_to_world: view.inverse().to_homogeneous(),
            inverse_projection: projection.inverse(),
        }
    }

    fn take_changed(&mut self) -> bool {
        std::mem::replace(&mut self.changed, false)
    }
}

impl InteractiveCamera for OrbitCamera {
    fn handle_event(&mut self, extent: [u32; 2], event: &WindowEvent) {
        match event {
            // mouse down
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                self.mouse_down = true;
            }
            // cursor move
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_prev = self.mouse_curr;
                self.mouse_curr = utils::get_normalized_mouse_coords(
                    Point2::new(position.x as f32, position.y as f32),
                    extent,
                );
                if self.mouse_down {
                    self.yaw -= (self.mouse_curr.x - self.mouse_prev.x) * 2.0;
                    self.pitch -= (self.mouse_curr.y - self.mouse_prev.y) * 2.0;
                    self.pitch = self.pitch.clamp(-deg2rad(89.0), deg2rad(89.0));
                    self.changed = true;
                }
            }
            // mouse up
            WindowEvent::MouseInput {
                state: ElementState::Released,
                button: MouseButton::Left,
                ..
            } => {
                self.mouse_down = false;
            }
            // scroll
            WindowEvent::MouseWheel { delta, .. } => {
                if let winit::event::MouseScrollDelta::LineDelta(_, y) = delta {
                    self.offset = (self.offset - y).max(0.5);
                    self.changed = true;
                }
            }
            _ => {}
        }
    }
}

impl Default for OrbitCamera {
    fn default() -> OrbitCamera {
        OrbitCamera::new()
    }
}
