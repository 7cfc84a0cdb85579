vulkano_shaders::shader! {
    ty: "compute",
    linalg_type: "nalgebra",
    src: r"
#version 460
#extension GL_EXT_shader_explicit_arithmetic_types_int8: require

layout(local_size_x = 8, local_size_y = 8, local_size_z = 1) in;

layout(set = 0, binding = 0) readonly buffer Averaged {
    float averaged[];
};

layout(set = 0, binding = 1) writeonly buffer DisplayImage {
    u8vec4 display_image[];
};

layout(push_constant) uniform PushConstants {
    uint xsize;
    uint ysize;
};

void main() {
    if (gl_GlobalInvocationID.x >= xsize || gl_GlobalInvocationID.y >= ysize) {
        return;
    }
    const uint i = gl_GlobalInvocationID.y * xsize + gl_GlobalInvocationID.x;

    vec3 color = vec3(averaged[4 * i + 0], averaged[4 * i + 1], averaged[4 * i + 2]);
    color = pow(clamp(color, 0.0, 1.0), vec3(1.0 / 2.2));

    // swapchain format is B8G8R8A8
    display_image[i] = u8vec4(color.zyx * 255.0, 255);
}
",
}
