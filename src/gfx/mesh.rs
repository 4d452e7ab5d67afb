//! GPU-resident meshes
//!
//! A [`GpuMesh`] owns its vertex and index buffers, a world transform and the
//! effect it is drawn with.

use cgmath::{Matrix4, Rad, SquareMatrix};
use log::debug;

use super::backend::GraphicsBackend;
use super::effect::{params, Effect};
use super::vertex::Vertex3D;

pub struct GpuMesh<B: GraphicsBackend> {
    name: String,
    effect: Box<dyn Effect<B>>,
    vertices: B::Buffer,
    indices: B::Buffer,
    index_count: u32,
    world: Matrix4<f32>,
}

impl<B: GraphicsBackend> GpuMesh<B> {
    /// Uploads `vertices` and `indices` and takes ownership of `effect`.
    ///
    /// # Arguments
    /// * `device` - Backend the buffers are created on
    /// * `name` - Label for the buffers and log output
    /// * `vertices` - Vertex data, uploaded as-is
    /// * `indices` - Triangle list indices into `vertices`
    /// * `effect` - Effect used for every draw of this mesh
    pub fn new(
        device: &mut B,
        name: &str,
        vertices: &[Vertex3D],
        indices: &[u32],
        effect: Box<dyn Effect<B>>,
    ) -> Self {
        let vertex_buffer = device.create_vertex_buffer(&format!("{} Vertices", name), vertices);
        let index_buffer = device.create_index_buffer(&format!("{} Indices", name), indices);
        debug!(
            "mesh {}: {} vertices, {} indices",
            name,
            vertices.len(),
            indices.len()
        );

        Self {
            name: name.to_string(),
            effect,
            vertices: vertex_buffer,
            indices: index_buffer,
            index_count: indices.len() as u32,
            world: Matrix4::identity(),
        }
    }

    pub fn with_world(mut self, world: Matrix4<f32>) -> Self {
        self.world = world;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn world(&self) -> Matrix4<f32> {
        self.world
    }

    pub fn set_world(&mut self, world: Matrix4<f32>) {
        self.world = world;
    }

    pub fn effect(&self) -> &dyn Effect<B> {
        self.effect.as_ref()
    }

    pub fn effect_mut(&mut self) -> &mut dyn Effect<B> {
        self.effect.as_mut()
    }

    pub fn vertex_buffer(&self) -> &B::Buffer {
        &self.vertices
    }

    /// Composes a rotation about the local up axis into the world transform.
    pub fn rotate(&mut self, angle: Rad<f32>) {
        self.world = self.world * Matrix4::from_angle_y(angle);
    }

    /// Binds the transforms and maps, selects the current technique and draws
    /// every index.
    pub fn render(
        &mut self,
        device: &mut B,
        world_view_proj: &Matrix4<f32>,
        view_inverse: &Matrix4<f32>,
    ) {
        self.effect
            .bind_matrix(device, params::WORLD_VIEW_PROJ, world_view_proj);
        self.effect.bind_matrix(device, params::WORLD, &self.world);
        self.effect
            .bind_matrix(device, params::VIEW_INVERSE, view_inverse);
        self.effect.rebind_maps(device);

        if !self.effect.apply(device) {
            return;
        }
        device.draw_indexed(&self.vertices, &self.indices, self.index_count);
    }
}
