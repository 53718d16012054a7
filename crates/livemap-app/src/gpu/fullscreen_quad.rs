/// Fullscreen triangle vertex shader that also outputs UVs (WGSL).
///
/// Three vertices from `vertex_index` cover the screen without a vertex
/// buffer. UV (0, 0) is the top-left corner, matching row-major images.
pub const FULLSCREEN_TRIANGLE_VS_WITH_UV: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4f,
    @location(0) uv: vec2f,
}

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VertexOutput {
    let x = f32(i32(vi & 1u) * 4) - 1.0;
    let y = f32(i32(vi & 2u) * 2) - 1.0;
    var out: VertexOutput;
    out.position = vec4f(x, y, 0.0, 1.0);
    out.uv = vec2f((x + 1.0) * 0.5, (1.0 - y) * 0.5);
    return out;
}
"#;
