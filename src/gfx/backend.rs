//! Execution context capability interface
//!
//! Everything above the device (effects, meshes, the renderer) talks to the GPU
//! through [`GraphicsBackend`]. The wgpu implementation is
//! [`GraphicsDevice`](super::device::GraphicsDevice); tests drive the same code
//! through a recording implementation.

use cgmath::Matrix4;

use super::device::FrameError;
use super::effect::{params, EffectCompileError, ParameterKind};
use super::resources::texture_resource::ImageData;
use super::vertex::Vertex3D;

/// Location of a reflected shader parameter (`@group(g) @binding(b)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamSlot {
    pub group: u32,
    pub binding: u32,
}

impl ParamSlot {
    pub const fn new(group: u32, binding: u32) -> Self {
        Self { group, binding }
    }
}

/// A bound resource the program expects, as found by reflection.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramResource {
    pub name: String,
    pub slot: ParamSlot,
    pub kind: ParameterKind,
}

/// Color blending applied by every technique of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Opaque surfaces: replace the target, write depth.
    Replace,
    /// Translucent surfaces: alpha blend, depth test without depth write.
    Alpha,
}

/// How the texels of a map are interpreted when sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// Color data, decoded from sRGB to linear on sampling.
    Srgb,
    /// Non-color data such as normals, gloss or specular, sampled as stored.
    Linear,
}

impl ColorSpace {
    /// Diffuse maps carry color; every other map carries data.
    pub fn for_map(name: &str) -> Self {
        if name == params::DIFFUSE_MAP {
            ColorSpace::Srgb
        } else {
            ColorSpace::Linear
        }
    }
}

/// Everything a backend needs to build a program from a validated effect.
#[derive(Debug, Clone)]
pub struct ProgramLayout<'a> {
    pub label: &'a str,
    pub source: &'a str,
    pub vertex_entry: &'a str,
    /// Fragment entry points, one pipeline each, in technique order.
    pub techniques: &'a [String],
    pub resources: &'a [ProgramResource],
    pub blend: BlendMode,
    pub debug_labels: bool,
}

/// Clear values applied when a frame begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValues {
    pub color: [f64; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl ClearValues {
    /// Clears color to `rgb` (opaque), depth to the far plane and stencil to zero.
    pub fn far_plane(rgb: [f32; 3]) -> Self {
        Self {
            color: [rgb[0] as f64, rgb[1] as f64, rgb[2] as f64, 1.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

/// Resource factory and immediate execution context.
///
/// Calls are made from a single thread in strict frame order:
/// `begin_frame`, then any number of parameter binds, technique selections and
/// draws, then `present`.
pub trait GraphicsBackend: 'static {
    type Buffer: 'static;
    type Texture: 'static;
    type Program: 'static;

    /// Pixel size of the render target and depth-stencil target.
    fn surface_size(&self) -> (u32, u32);

    fn create_vertex_buffer(&mut self, label: &str, vertices: &[Vertex3D]) -> Self::Buffer;

    fn create_index_buffer(&mut self, label: &str, indices: &[u32]) -> Self::Buffer;

    fn create_texture(
        &mut self,
        label: &str,
        image: &ImageData,
        color_space: ColorSpace,
    ) -> Self::Texture;

    /// Builds one pipeline per technique.
    fn create_program(
        &mut self,
        layout: &ProgramLayout<'_>,
    ) -> Result<Self::Program, EffectCompileError>;

    /// Acquires the back buffer, binds it together with the depth-stencil view,
    /// clears both and sets a full-surface viewport.
    fn begin_frame(&mut self, clear: &ClearValues) -> Result<(), FrameError>;

    fn set_matrix(&mut self, program: &mut Self::Program, slot: ParamSlot, value: &Matrix4<f32>);

    fn set_map(&mut self, program: &mut Self::Program, slot: ParamSlot, texture: &Self::Texture);

    /// Makes `technique` of `program` (and the program's bound parameters) current.
    fn apply_technique(&mut self, program: &mut Self::Program, technique: usize);

    fn draw_indexed(&mut self, vertices: &Self::Buffer, indices: &Self::Buffer, index_count: u32);

    /// Submits the frame and presents it without waiting for vertical sync.
    fn present(&mut self) -> Result<(), FrameError>;
}
