/// Packed-frame compositing program (WGSL).
///
/// The vertex stage draws the 4-vertex quad strip scaled by `u.scale`.
/// The fragment stage samples the color half at the interpolated coordinate and
/// the mask half at the same coordinate shifted by `u.stencil_offset`, and takes
/// the mask's red channel as alpha. Color is premultiplied unless
/// `u.premultiply` is 0. Both samples must come from a linear (non-sRGB)
/// texture so the mask byte maps straight to alpha.
pub const ALPHA_QUAD_SHADER: &str = r#"
struct QuadUniforms {
    scale: vec4f,
    stencil_offset: vec2f,
    translate: vec2f,
    premultiply: f32,
}

@group(0) @binding(0) var<uniform> u: QuadUniforms;
@group(0) @binding(1) var frame_tex: texture_2d<f32>;
@group(0) @binding(2) var frame_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4f,
    @location(0) uv: vec2f,
}

@vertex
fn vs_main(@location(0) position: vec2f, @location(1) tex_coord: vec2f) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4f(position, 0.0, 1.0) * u.scale + vec4f(u.translate, 0.0, 0.0);
    out.uv = tex_coord;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4f {
    let color = textureSample(frame_tex, frame_sampler, in.uv);
    let mask = textureSample(frame_tex, frame_sampler, in.uv + u.stencil_offset);
    let alpha = mask.r;
    let rgb = select(color.rgb, color.rgb * alpha, u.premultiply > 0.5);
    return vec4f(rgb, alpha);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declares_both_entry_points() {
        assert!(ALPHA_QUAD_SHADER.contains("fn vs_main"));
        assert!(ALPHA_QUAD_SHADER.contains("fn fs_main"));
    }

    #[test]
    fn binding_slots_match_bind_group() {
        for slot in ["@binding(0)", "@binding(1)", "@binding(2)"] {
            assert!(ALPHA_QUAD_SHADER.contains(slot), "missing {slot}");
        }
    }
}
