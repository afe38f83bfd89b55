//! WGSL shader sources for the equalization kernels.
//! These are used by the wgpu backend when the `wgpu` feature is enabled.
//!
//! Image samples are bound as `array<u32>`: four 8-bit samples per word,
//! little-endian, the last word zero-padded.

#![cfg_attr(not(feature = "wgpu"), allow(dead_code))]

/// Per-sample atomic histogram: one invocation per sample.
pub const BUILD_HISTOGRAM: &str = r#"
@group(0) @binding(0) var<storage, read> src: array<u32>;
@group(0) @binding(1) var<storage, read_write> hist: array<atomic<u32>>;
@group(0) @binding(2) var<uniform> dims: vec4<u32>;  // samples, pixels, channels, 0

@compute @workgroup_size(256)
fn main(
    @builtin(global_invocation_id) id: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let i = id.x + id.y * groups.x * 256u;
    if i >= dims.x { return; }

    let word = src[i >> 2u];
    let v = (word >> ((i & 3u) * 8u)) & 0xffu;
    let ch = i % dims.z;
    atomicAdd(&hist[ch * 256u + v], 1u);
}
"#;

/// Inclusive scan, one invocation per bin summing all lower bins of its channel.
pub const CUMULATE_DIRECT: &str = r#"
@group(0) @binding(0) var<storage, read> hist: array<u32>;
@group(0) @binding(1) var<storage, read_write> cdf: array<u32>;
@group(0) @binding(2) var<uniform> dims: vec4<u32>;  // 0, 0, channels, 0

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let j = id.x;
    if j >= dims.z * 256u { return; }

    let base = (j / 256u) * 256u;
    var acc = 0u;
    for (var k = base; k <= j; k = k + 1u) {
        acc = acc + hist[k];
    }
    cdf[j] = acc;
}
"#;

/// Blelloch work-efficient scan: one workgroup per channel, two bins per
/// invocation in workgroup memory.
pub const CUMULATE_BLELLOCH: &str = r#"
@group(0) @binding(0) var<storage, read> hist: array<u32>;
@group(0) @binding(1) var<storage, read_write> cdf: array<u32>;
@group(0) @binding(2) var<uniform> dims: vec4<u32>;  // 0, 0, channels, 0

var<workgroup> temp: array<u32, 256>;

@compute @workgroup_size(128)
fn main(
    @builtin(local_invocation_id) lid: vec3<u32>,
    @builtin(workgroup_id) wid: vec3<u32>,
) {
    let t = lid.x;
    let base = wid.x * 256u;
    let in_range = wid.x < dims.z;

    if in_range {
        temp[2u * t] = hist[base + 2u * t];
        temp[2u * t + 1u] = hist[base + 2u * t + 1u];
    }

    // Up-sweep
    var offset = 1u;
    for (var d = 128u; d > 0u; d = d >> 1u) {
        workgroupBarrier();
        if t < d {
            let ai = offset * (2u * t + 1u) - 1u;
            let bi = offset * (2u * t + 2u) - 1u;
            temp[bi] = temp[bi] + temp[ai];
        }
        offset = offset * 2u;
    }

    if t == 0u { temp[255] = 0u; }

    // Down-sweep
    for (var d = 1u; d < 256u; d = d * 2u) {
        offset = offset >> 1u;
        workgroupBarrier();
        if t < d {
            let ai = offset * (2u * t + 1u) - 1u;
            let bi = offset * (2u * t + 2u) - 1u;
            let x = temp[ai];
            temp[ai] = temp[bi];
            temp[bi] = temp[bi] + x;
        }
    }
    workgroupBarrier();

    if in_range {
        cdf[base + 2u * t] = temp[2u * t] + hist[base + 2u * t];
        cdf[base + 2u * t + 1u] = temp[2u * t + 1u] + hist[base + 2u * t + 1u];
    }
}
"#;

/// Remap through the cumulative histogram: one invocation per packed word.
pub const REMAP: &str = r#"
struct RemapParams {
    dims: vec4<u32>,     // samples, pixels, channels, mode
    cdf_min: vec4<u32>,
}

@group(0) @binding(0) var<storage, read> src: array<u32>;
@group(0) @binding(1) var<storage, read> cdf: array<u32>;
@group(0) @binding(2) var<storage, read_write> dst: array<u32>;
@group(0) @binding(3) var<uniform> params: RemapParams;

fn round_to_u8(v: f32) -> u32 {
    return u32(clamp(floor(v + 0.5), 0.0, 255.0));
}

fn remap_value(cdf_v: u32, cdf_min: u32, total: u32, mode: u32) -> u32 {
    if mode == 1u {
        if total == 0u { return 0u; }
        return round_to_u8(f32(cdf_v) / f32(total) * 255.0);
    }
    let denom = select(0u, total - cdf_min, total > cdf_min);
    if denom == 0u { return 255u; }
    let num = select(0u, cdf_v - cdf_min, cdf_v > cdf_min);
    return round_to_u8(f32(num) / f32(denom) * 255.0);
}

@compute @workgroup_size(256)
fn main(
    @builtin(global_invocation_id) id: vec3<u32>,
    @builtin(num_workgroups) groups: vec3<u32>,
) {
    let w = id.x + id.y * groups.x * 256u;
    let samples = params.dims.x;
    let words = samples / 4u + select(0u, 1u, (samples & 3u) != 0u);
    if w >= words { return; }

    let word = src[w];
    var out = 0u;
    for (var k = 0u; k < 4u; k = k + 1u) {
        let i = w * 4u + k;
        if i >= samples { break; }
        let v = (word >> (k * 8u)) & 0xffu;
        let ch = i % params.dims.z;
        let mapped = remap_value(cdf[ch * 256u + v], params.cdf_min[ch], params.dims.y, params.dims.w);
        out = out | (mapped << (k * 8u));
    }
    dst[w] = out;
}
"#;
