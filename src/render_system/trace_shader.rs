vulkano_shaders::shader! {
    ty: "compute",
    linalg_type: "nalgebra",
    vulkan_version: "1.2",
    spirv_version: "1.3",
    src: r"
#version 460
#extension GL_EXT_scalar_block_layout: require

layout(local_size_x = 8, local_size_y = 8, local_size_z = 1) in;

const float FAR = 1e20;
const float PI = 3.14159265358979;

struct Material {
    vec3 albedo;
    vec3 specular;
    vec3 emission;
    float smoothness;
};

struct Sphere {
    vec3 position;
    float radius;
    Material material;
};

struct MeshInstance {
    mat4 local_to_world;
    uint index_offset;
    uint index_count;
    Material material;
};

layout(set = 0, binding = 0, scalar) readonly buffer Spheres {
    Sphere spheres[];
};

layout(set = 0, binding = 1, scalar) readonly buffer MeshInstances {
    MeshInstance mesh_instances[];
};

layout(set = 0, binding = 2, scalar) readonly buffer Vertices {
    vec3 vertices[];
};

layout(set = 0, binding = 3, scalar) readonly buffer Indices {
    uint indices[];
};

layout(set = 0, binding = 4, scalar) writeonly buffer OutputImage {
    vec4 output_image[];
};

layout(set = 0, binding = 5, scalar) uniform TraceParams {
    mat4 camera_to_world;
    mat4 inverse_projection;
    uvec2 extent;
    vec2 jitter;
    uint bounce_limit;
    uint seed;
    uint sphere_count;
    uint instance_count;
} params;

// source: https://stackoverflow.com/questions/4200224/random-noise-functions-for-glsl
// Construct a float with half-open range [0:1] using low 23 bits.
// All zeroes yields 0.0, all ones yields the next smallest representable value below 1.0.
float floatConstruct( uint m ) {
    const uint ieeeMantissa = 0x007FFFFFu; // binary32 mantissa bitmask
    const uint ieeeOne      = 0x3F800000u; // 1.0 in IEEE binary32

    m &= ieeeMantissa;                     // Keep only mantissa bits (fractional part)
    m |= ieeeOne;                          // Add fractional part to 1.0

    float  f = uintBitsToFloat( m );       // Range [1:2]
    return f - 1.0;                        // Range [0:1]
}

// accepts a seed, h, and a 32 bit integer, k, and returns a 32 bit integer
// corresponds to the loop in the murmur3 hash algorithm
// the output should be passed to murmur3_finalize before being used
uint murmur3_combine(uint h, uint k) {
    k *= 0x1b873593;

    h ^= k;
    h = (h << 13) | (h >> 19);
    h = h * 5 + 0xe6546b64;
    return h;
}

// accepts a seed, h and returns a random 32 bit integer
// corresponds to the last part of the murmur3 hash algorithm
uint murmur3_finalize(uint h) {
    h ^= h >> 16;
    h *= 0x85ebca6b;
    h ^= h >> 13;
    h *= 0xc2b2ae35;
    h ^= h >> 16;
    return h;
}

float next_random(inout uint seed) {
    seed = murmur3_combine(seed, 0x9e3779b9);
    return floatConstruct(murmur3_finalize(seed));
}

struct RayHit {
    float dist;
    vec3 position;
    vec3 normal;
    Material material;
};

void intersect_sphere(vec3 origin, vec3 direction, Sphere sphere, inout RayHit best) {
    vec3 d = origin - sphere.position;
    float p1 = -dot(direction, d);
    float p2sqr = p1 * p1 - dot(d, d) + sphere.radius * sphere.radius;
    if (p2sqr < 0.0) {
        return;
    }
    float p2 = sqrt(p2sqr);
    float t = p1 - p2 > 0.001 ? p1 - p2 : p1 + p2;
    if (t > 0.001 && t < best.dist) {
        best.dist = t;
        best.position = origin + t * direction;
        best.normal = normalize(best.position - sphere.position);
        best.material = sphere.material;
    }
}

// Moeller-Trumbore, double sided
bool intersect_triangle(vec3 origin, vec3 direction, vec3 v0, vec3 v1, vec3 v2, out float t) {
    t = 0.0;
    vec3 e1 = v1 - v0;
    vec3 e2 = v2 - v0;
    vec3 pvec = cross(direction, e2);
    float det = dot(e1, pvec);
    if (abs(det) < 1e-8) {
        return false;
    }
    float inv_det = 1.0 / det;
    vec3 tvec = origin - v0;
    float u = dot(tvec, pvec) * inv_det;
    if (u < 0.0 || u > 1.0) {
        return false;
    }
    vec3 qvec = cross(tvec, e1);
    float v = dot(direction, qvec) * inv_det;
    if (v < 0.0 || u + v > 1.0) {
        return false;
    }
    t = dot(e2, qvec) * inv_det;
    return t > 0.001;
}

RayHit trace(vec3 origin, vec3 direction) {
    RayHit best;
    best.dist = FAR;
    best.position = vec3(0.0);
    best.normal = vec3(0.0);
    best.material.albedo = vec3(0.0);
    best.material.specular = vec3(0.0);
    best.material.emission = vec3(0.0);
    best.material.smoothness = 0.0;

    for (uint i = 0; i < params.sphere_count; i++) {
        intersect_sphere(origin, direction, spheres[i], best);
    }

    for (uint m = 0; m < params.instance_count; m++) {
        MeshInstance instance = mesh_instances[m];
        for (uint i = instance.index_offset; i < instance.index_offset + instance.index_count; i += 3) {
            vec3 v0 = (instance.local_to_world * vec4(vertices[indices[i + 0]], 1.0)).xyz;
            vec3 v1 = (instance.local_to_world * vec4(vertices[indices[i + 1]], 1.0)).xyz;
            vec3 v2 = (instance.local_to_world * vec4(vertices[indices[i + 2]], 1.0)).xyz;
            float t;
            if (intersect_triangle(origin, direction, v0, v1, v2, t) && t < best.dist) {
                best.dist = t;
                best.position = origin + t * direction;
                vec3 n = normalize(cross(v1 - v0, v2 - v0));
                best.normal = dot(n, direction) < 0.0 ? n : -n;
                best.material = instance.material;
            }
        }
    }

    return best;
}

vec3 sample_hemisphere(vec3 normal, inout uint seed) {
    float cos_theta = next_random(seed);
    float sin_theta = sqrt(max(0.0, 1.0 - cos_theta * cos_theta));
    float phi = 2.0 * PI * next_random(seed);
    vec3 tangent_sample = vec3(cos(phi) * sin_theta, sin(phi) * sin_theta, cos_theta);

    vec3 helper = abs(normal.x) > 0.99 ? vec3(0.0, 0.0, 1.0) : vec3(1.0, 0.0, 0.0);
    vec3 tangent = normalize(cross(normal, helper));
    vec3 binormal = normalize(cross(normal, tangent));
    return tangent * tangent_sample.x + binormal * tangent_sample.y + normal * tangent_sample.z;
}

vec3 sky_color(vec3 direction) {
    float t = 0.5 * (direction.y + 1.0);
    return mix(vec3(1.0, 1.0, 1.0), vec3(0.35, 0.55, 0.95), t);
}

void main() {
    if (gl_GlobalInvocationID.x >= params.extent.x || gl_GlobalInvocationID.y >= params.extent.y) {
        return;
    }

    const uint bid = gl_GlobalInvocationID.y * params.extent.x + gl_GlobalInvocationID.x;
    uint seed = murmur3_combine(params.seed, bid);

    vec2 pixel = vec2(gl_GlobalInvocationID.xy) + params.jitter;
    vec2 uv = 2.0 * pixel / vec2(params.extent) - 1.0;

    vec3 origin = (params.camera_to_world * vec4(0.0, 0.0, 0.0, 1.0)).xyz;
    vec3 direction = (params.inverse_projection * vec4(uv, 0.0, 1.0)).xyz;
    direction = normalize((params.camera_to_world * vec4(direction, 0.0)).xyz);

    vec3 radiance = vec3(0.0);
    vec3 energy = vec3(1.0);

    for (uint bounce = 0; bounce < params.bounce_limit; bounce++) {
        RayHit hit = trace(origin, direction);
        if (hit.dist >= FAR) {
            radiance += energy * sky_color(direction);
            break;
        }

        radiance += energy * hit.material.emission;

        origin = hit.position + hit.normal * 0.001;
        vec3 scattered = sample_hemisphere(hit.normal, seed);
        vec3 reflected = reflect(direction, hit.normal);
        direction = normalize(mix(scattered, reflected, hit.material.smoothness));
        energy *= mix(hit.material.albedo, hit.material.specular, hit.material.smoothness);

        if (max(energy.r, max(energy.g, energy.b)) < 0.001) {
            break;
        }
    }

    output_image[bid] = vec4(radiance, 1.0);
}
",
}
