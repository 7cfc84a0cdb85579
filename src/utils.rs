use std::rc::Rc;

use nalgebra::{Point2, Vector2, Vector3};

use crate::scene_system::mesh::MeshAsset;

/// Axis-aligned box centered on the origin, 8 shared vertices and 12
/// triangles.
pub fn cuboid(dims: Vector3<f32>) -> Rc<MeshAsset> {
    let hx = 0.5 * dims[0];
    let hy = 0.5 * dims[1];
    let hz = 0.5 * dims[2];

    let vertices = vec![
        [-hx, -hy, -hz],
        [hx, -hy, -hz],
        [hx, hy, -hz],
        [-hx, hy, -hz],
        [-hx, -hy, hz],
        [hx, -hy, hz],
        [hx, hy, hz],
        [-hx, hy, hz],
    ];

    #[rustfmt::skip]
    let indices = vec![
        // back face
        0, 2, 1, 0, 3, 2,
        // front face
        4, 5, 6, 4, 6, 7,
        // left face
        0, 4, 7, 0, 7, 3,
        // right face
        1, 2, 6, 1, 6, 5,
        // lower face
        0, 1, 5, 0, 5, 4,
        // upper face
        3, 7, 6, 3, 6, 2,
    ];

    MeshAsset::new(vertices, indices)
}

pub fn unit_cube() -> Rc<MeshAsset> {
    cuboid(Vector3::new(1.0, 1.0, 1.0))
}

/// Square ground plane in the xz plane, `extent` units on a side.
pub fn plane(extent: f32) -> Rc<MeshAsset> {
    let h = 0.5 * extent;
    let vertices = vec![[-h, 0.0, -h], [h, 0.0, -h], [h, 0.0, h], [-h, 0.0, h]];
    let indices = vec![0, 2, 1, 0, 3, 2];
    MeshAsset::new(vertices, indices)
}

pub fn get_normalized_mouse_coords(e: Point2<f32>, extent: [u32; 2]) -> Point2<f32> {
    let trackball_radius = extent[0].min(extent[1]) as f32;
    let center = Vector2::new(extent[0] as f32 / 2.0, extent[1] as f32 / 2.0);
    (e - center) / trackball_radius
}
