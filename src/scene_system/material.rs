/// Surface description copied verbatim into the packed primitive records.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub albedo: [f32; 3],
    pub specular: [f32; 3],
    pub emission: [f32; 3],
    pub smoothness: f32,
}

impl Material {
    pub fn diffuse(albedo: [f32; 3]) -> Material {
        Material {
            albedo,
            ..Material::default()
        }
    }

    pub fn glossy(albedo: [f32; 3], specular: [f32; 3], smoothness: f32) -> Material {
        Material {
            albedo,
            specular,
            smoothness,
            ..Material::default()
        }
    }

    pub fn emissive(emission: [f32; 3]) -> Material {
        Material {
            albedo: [0.0; 3],
            emission,
            ..Material::default()
        }
    }
}

impl Default for Material {
    fn default() -> Material {
        Material {
            albedo: [0.8, 0.8, 0.8],
            specular: [0.04, 0.04, 0.04],
            emission: [0.0, 0.0, 0.0],
            smoothness: 0.0,
        }
    }
}
