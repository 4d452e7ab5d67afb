//! # Vertex Data Structures
//!
//! GPU-compatible vertex format shared by every effect. The WGSL sources in
//! `assets/shaders` read these attributes at locations 0..=3.

/// A 3D vertex with position, texture coordinate, normal and tangent.
///
/// # Memory Layout
///
/// The `#[repr(C)]` attribute ensures the struct has a C-compatible memory
/// layout, which is required for GPU buffer operations.
///
/// # Examples
///
/// ```no_run
/// use flint::gfx::vertex::Vertex3D;
///
/// let vertex = Vertex3D {
///     position: [0.0, 1.0, 0.0],
///     uv: [0.5, 0.5],
///     normal: [0.0, 1.0, 0.0],
///     tangent: [1.0, 0.0, 0.0],
/// };
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3D {
    /// 3D position coordinates [x, y, z]
    pub position: [f32; 3],
    /// Texture coordinates [u, v]
    pub uv: [f32; 2],
    /// Normal vector [nx, ny, nz]
    pub normal: [f32; 3],
    /// Tangent vector [tx, ty, tz] for normal mapping
    pub tangent: [f32; 3],
}

impl Vertex3D {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x2,
        2 => Float32x3,
        3 => Float32x3,
    ];

    /// Returns the vertex buffer layout for wgpu rendering.
    ///
    /// - Attribute 0: position (Float32x3)
    /// - Attribute 1: uv (Float32x2)
    /// - Attribute 2: normal (Float32x3)
    /// - Attribute 3: tangent (Float32x3)
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex3D>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}
