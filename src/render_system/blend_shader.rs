vulkano_shaders::shader! {
    ty: "compute",
    linalg_type: "nalgebra",
    src: r"
#version 460

layout(local_size_x = 256, local_size_y = 1, local_size_z = 1) in;

layout(set = 0, binding = 0) readonly buffer RawSample {
    float raw_sample[];
};

layout(set = 0, binding = 1) buffer Averaged {
    float averaged[];
};

layout(push_constant) uniform PushConstants {
    float weight;
    uint value_count;
};

// incremental running mean: sample k arrives with weight 1/(k+1)
void main() {
    const uint i = gl_GlobalInvocationID.x;
    if (i >= value_count) {
        return;
    }
    averaged[i] = mix(averaged[i], raw_sample[i], weight);
}
",
}
