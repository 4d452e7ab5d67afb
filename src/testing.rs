//! Recording graphics backend for unit tests
//!
//! Implements [`GraphicsBackend`] without a GPU. Resources are plain handles
//! and every call is appended to a log the tests assert on.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cgmath::Matrix4;

use crate::gfx::backend::{
    BlendMode, ClearValues, ColorSpace, GraphicsBackend, ParamSlot, ProgramLayout,
};
use crate::gfx::device::FrameError;
use crate::gfx::effect::EffectCompileError;
use crate::gfx::resources::texture_resource::ImageData;
use crate::gfx::vertex::Vertex3D;

/// Smallest effect the loader accepts: one required matrix, one map, one
/// sampler and three techniques.
pub const MINIMAL_EFFECT: &str = r#"
@group(0) @binding(0) var<uniform> world_view_proj: mat4x4<f32>;
@group(0) @binding(1) var diffuse_map: texture_2d<f32>;
@group(0) @binding(2) var map_sampler: sampler;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) uv: vec2<f32>) -> VertexOutput {
    var output: VertexOutput;
    output.clip_position = world_view_proj * vec4<f32>(position, 1.0);
    output.uv = uv;
    return output;
}

@fragment
fn default_technique(input: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(input.uv, 0.0, 1.0);
}

@fragment
fn flat_technique(input: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}

@fragment
fn debug_technique(input: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.0, 1.0, 1.0);
}
"#;

pub fn write_effect(dir: &tempfile::TempDir, name: &str, source: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, source).unwrap();
    path
}

pub fn shipped_shader(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("assets/shaders")
        .join(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u64);

#[derive(Debug)]
pub struct RecordedProgram {
    pub id: u64,
    pub techniques: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateVertexBuffer { buffer: Handle, vertices: usize },
    CreateIndexBuffer { buffer: Handle, indices: usize },
    CreateTexture { texture: Handle, color_space: ColorSpace },
    CreateProgram { program: u64, techniques: usize },
    BeginFrame { clear: ClearValues },
    SetMatrix { program: u64, slot: ParamSlot },
    SetMap { program: u64, slot: ParamSlot, texture: Handle },
    ApplyTechnique { program: u64, technique: usize },
    DrawIndexed { vertices: Handle, index_count: u32 },
    Present,
}

pub struct RecordingBackend {
    size: (u32, u32),
    next_handle: u64,
    calls: Vec<Call>,
    matrices: HashMap<(u64, ParamSlot), Matrix4<f32>>,
    last_blend: Option<BlendMode>,
    frame_failure: Option<FrameError>,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            next_handle: 1,
            calls: Vec::new(),
            matrices: HashMap::new(),
            last_blend: None,
            frame_failure: None,
        }
    }

    /// Makes every following `begin_frame` fail with `error`.
    pub fn fail_frames_with(&mut self, error: FrameError) {
        self.frame_failure = Some(error);
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn programs_created(&self) -> usize {
        self.count(|c| matches!(c, Call::CreateProgram { .. }))
    }

    /// Vertex buffers of the issued draws, in order.
    pub fn draws(&self) -> Vec<Handle> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::DrawIndexed { vertices, .. } => Some(*vertices),
                _ => None,
            })
            .collect()
    }

    pub fn last_program_blend(&self) -> Option<BlendMode> {
        self.last_blend
    }

    pub fn matrix(&self, program: u64, slot: ParamSlot) -> Option<Matrix4<f32>> {
        self.matrices.get(&(program, slot)).copied()
    }

    fn next(&mut self) -> Handle {
        let handle = Handle(self.next_handle);
        self.next_handle += 1;
        handle
    }
}

impl GraphicsBackend for RecordingBackend {
    type Buffer = Handle;
    type Texture = Handle;
    type Program = RecordedProgram;

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn create_vertex_buffer(&mut self, _label: &str, vertices: &[Vertex3D]) -> Handle {
        let buffer = self.next();
        self.calls.push(Call::CreateVertexBuffer {
            buffer,
            vertices: vertices.len(),
        });
        buffer
    }

    fn create_index_buffer(&mut self, _label: &str, indices: &[u32]) -> Handle {
        let buffer = self.next();
        self.calls.push(Call::CreateIndexBuffer {
            buffer,
            indices: indices.len(),
        });
        buffer
    }

    fn create_texture(&mut self, _label: &str, _image: &ImageData, color_space: ColorSpace) -> Handle {
        let texture = self.next();
        self.calls.push(Call::CreateTexture {
            texture,
            color_space,
        });
        texture
    }

    fn create_program(
        &mut self,
        layout: &ProgramLayout<'_>,
    ) -> Result<RecordedProgram, EffectCompileError> {
        let id = self.next().0;
        self.last_blend = Some(layout.blend);
        self.calls.push(Call::CreateProgram {
            program: id,
            techniques: layout.techniques.len(),
        });
        Ok(RecordedProgram {
            id,
            techniques: layout.techniques.len(),
        })
    }

    fn begin_frame(&mut self, clear: &ClearValues) -> Result<(), FrameError> {
        if let Some(err) = &self.frame_failure {
            return Err(err.clone());
        }
        self.calls.push(Call::BeginFrame { clear: *clear });
        Ok(())
    }

    fn set_matrix(&mut self, program: &mut RecordedProgram, slot: ParamSlot, value: &Matrix4<f32>) {
        self.matrices.insert((program.id, slot), *value);
        self.calls.push(Call::SetMatrix {
            program: program.id,
            slot,
        });
    }

    fn set_map(&mut self, program: &mut RecordedProgram, slot: ParamSlot, texture: &Handle) {
        self.calls.push(Call::SetMap {
            program: program.id,
            slot,
            texture: *texture,
        });
    }

    fn apply_technique(&mut self, program: &mut RecordedProgram, technique: usize) {
        assert!(technique < program.techniques, "technique out of range");
        self.calls.push(Call::ApplyTechnique {
            program: program.id,
            technique,
        });
    }

    fn draw_indexed(&mut self, vertices: &Handle, _indices: &Handle, index_count: u32) {
        self.calls.push(Call::DrawIndexed {
            vertices: *vertices,
            index_count,
        });
    }

    fn present(&mut self) -> Result<(), FrameError> {
        self.calls.push(Call::Present);
        Ok(())
    }
}
