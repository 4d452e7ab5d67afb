//! wgpu program objects
//!
//! A [`GpuProgram`] is the device-side half of an effect: one render pipeline
//! per technique sharing a single `@group(0)` bind group layout, a 64-byte
//! uniform buffer per matrix parameter, and the texture views currently bound
//! to each map parameter.

use wgpu::util::DeviceExt;
use wgpu::*;

use super::backend::{BlendMode, ParamSlot, ProgramLayout};
use super::effect::{EffectCompileError, ParameterKind};
use super::resources::texture_resource::TextureResource;
use super::vertex::Vertex3D;

const MATRIX_SIZE: u64 = std::mem::size_of::<[[f32; 4]; 4]>() as u64;

enum BoundResource {
    Matrix { binding: u32, buffer: Buffer },
    Map { binding: u32, view: TextureView, texture_id: u64 },
    Sampler { binding: u32, sampler: Sampler },
}

impl BoundResource {
    fn binding(&self) -> u32 {
        match self {
            BoundResource::Matrix { binding, .. }
            | BoundResource::Map { binding, .. }
            | BoundResource::Sampler { binding, .. } => *binding,
        }
    }
}

/// Compiled pipelines and bound parameters of one effect.
pub struct GpuProgram {
    label: String,
    // Declared before the layout so pipelines and bind group drop first.
    pipelines: Vec<RenderPipeline>,
    bind_group: Option<BindGroup>,
    resources: Vec<BoundResource>,
    bind_group_layout: BindGroupLayout,
}

/// Device state a program is created against.
pub struct ProgramTargets<'a> {
    pub color_format: TextureFormat,
    pub depth_format: TextureFormat,
    /// Bound to every map parameter until a real map is set.
    pub fallback: &'a TextureResource,
    pub sampler: &'a Sampler,
}

impl GpuProgram {
    /// Builds the shader module, bind group layout and one pipeline per technique.
    ///
    /// Creation runs inside a validation error scope so that anything wgpu
    /// rejects surfaces as [`EffectCompileError::Backend`] instead of a panic
    /// in the uncaptured error handler.
    pub fn create(
        device: &Device,
        layout: &ProgramLayout<'_>,
        targets: &ProgramTargets<'_>,
    ) -> Result<Self, EffectCompileError> {
        device.push_error_scope(ErrorFilter::Validation);

        let label = |suffix: &str| -> Option<String> {
            layout
                .debug_labels
                .then(|| format!("{} {}", layout.label, suffix))
        };

        let shader_label = label("Shader");
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: shader_label.as_deref(),
            source: ShaderSource::Wgsl(layout.source.into()),
        });

        let layout_entries: Vec<BindGroupLayoutEntry> = layout
            .resources
            .iter()
            .map(|resource| BindGroupLayoutEntry {
                binding: resource.slot.binding,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: match resource.kind {
                    ParameterKind::Matrix => BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: BufferSize::new(MATRIX_SIZE),
                    },
                    ParameterKind::Map => BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    ParameterKind::Sampler => BindingType::Sampler(SamplerBindingType::Filtering),
                },
                count: None,
            })
            .collect();

        let bind_group_layout_label = label("Bind Group Layout");
        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: bind_group_layout_label.as_deref(),
            entries: &layout_entries,
        });

        let pipeline_layout_label = label("Pipeline Layout");
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: pipeline_layout_label.as_deref(),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let (blend, depth_write_enabled) = match layout.blend {
            BlendMode::Replace => (BlendState::REPLACE, true),
            BlendMode::Alpha => (BlendState::ALPHA_BLENDING, false),
        };
        let color_targets = [Some(ColorTargetState {
            format: targets.color_format,
            blend: Some(blend),
            write_mask: ColorWrites::ALL,
        })];

        let pipelines = layout
            .techniques
            .iter()
            .map(|technique| {
                let pipeline_label = label(technique.as_str());
                device.create_render_pipeline(&RenderPipelineDescriptor {
                    label: pipeline_label.as_deref(),
                    layout: Some(&pipeline_layout),
                    vertex: VertexState {
                        module: &shader,
                        entry_point: Some(layout.vertex_entry),
                        buffers: &[Vertex3D::desc()],
                        compilation_options: PipelineCompilationOptions::default(),
                    },
                    fragment: Some(FragmentState {
                        module: &shader,
                        entry_point: Some(technique.as_str()),
                        targets: &color_targets,
                        compilation_options: PipelineCompilationOptions::default(),
                    }),
                    primitive: PrimitiveState {
                        topology: PrimitiveTopology::TriangleList,
                        strip_index_format: None,
                        front_face: FrontFace::Ccw,
                        cull_mode: None,
                        polygon_mode: PolygonMode::Fill,
                        unclipped_depth: false,
                        conservative: false,
                    },
                    depth_stencil: Some(DepthStencilState {
                        format: targets.depth_format,
                        depth_write_enabled,
                        depth_compare: CompareFunction::Less,
                        stencil: StencilState::default(),
                        bias: DepthBiasState::default(),
                    }),
                    multisample: MultisampleState::default(),
                    multiview: None,
                    cache: None,
                })
            })
            .collect();

        let resources = layout
            .resources
            .iter()
            .map(|resource| {
                let binding = resource.slot.binding;
                match resource.kind {
                    ParameterKind::Matrix => {
                        let identity: [[f32; 4]; 4] = cgmath::Matrix4::<f32>::from_scale(1.0).into();
                        let buffer_label = label(resource.name.as_str());
                        let buffer = device.create_buffer_init(&util::BufferInitDescriptor {
                            label: buffer_label.as_deref(),
                            contents: bytemuck::cast_slice(&identity),
                            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
                        });
                        BoundResource::Matrix { binding, buffer }
                    }
                    ParameterKind::Map => BoundResource::Map {
                        binding,
                        view: targets.fallback.view.clone(),
                        texture_id: targets.fallback.id,
                    },
                    ParameterKind::Sampler => BoundResource::Sampler {
                        binding,
                        sampler: targets.sampler.clone(),
                    },
                }
            })
            .collect();

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(EffectCompileError::Backend {
                label: layout.label.to_string(),
                message: error.to_string(),
            });
        }

        Ok(Self {
            label: layout.label.to_string(),
            pipelines,
            bind_group: None,
            resources,
            bind_group_layout,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn technique_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Uploads `value` to the uniform buffer behind `slot`.
    ///
    /// Queue writes are applied at the next submit, so each program must be
    /// drawn at most once per frame.
    pub fn write_matrix(&self, queue: &Queue, slot: ParamSlot, value: &cgmath::Matrix4<f32>) {
        let raw: [[f32; 4]; 4] = (*value).into();
        for resource in &self.resources {
            if let BoundResource::Matrix { binding, buffer } = resource {
                if *binding == slot.binding {
                    queue.write_buffer(buffer, 0, bytemuck::cast_slice(&raw));
                    return;
                }
            }
        }
        log::warn!("program {} has no matrix at {:?}", self.label, slot);
    }

    /// Points the map parameter at `slot` to `texture`. The bind group is only
    /// rebuilt when the texture actually changed.
    pub fn set_map(&mut self, slot: ParamSlot, texture: &TextureResource) {
        for resource in &mut self.resources {
            if let BoundResource::Map {
                binding,
                view,
                texture_id,
            } = resource
            {
                if *binding == slot.binding {
                    if *texture_id != texture.id {
                        *view = texture.view.clone();
                        *texture_id = texture.id;
                        self.bind_group = None;
                    }
                    return;
                }
            }
        }
        log::warn!("program {} has no map at {:?}", self.label, slot);
    }

    /// Builds the bind group if a map change invalidated it.
    pub fn prepare(&mut self, device: &Device) {
        if self.bind_group.is_some() {
            return;
        }
        let entries: Vec<BindGroupEntry> = self
            .resources
            .iter()
            .map(|resource| BindGroupEntry {
                binding: resource.binding(),
                resource: match resource {
                    BoundResource::Matrix { buffer, .. } => buffer.as_entire_binding(),
                    BoundResource::Map { view, .. } => BindingResource::TextureView(view),
                    BoundResource::Sampler { sampler, .. } => BindingResource::Sampler(sampler),
                },
            })
            .collect();
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: None,
            layout: &self.bind_group_layout,
            entries: &entries,
        });
        self.bind_group = Some(bind_group);
    }

    /// Sets the pipeline of `technique` and the program's bind group on `pass`.
    ///
    /// Returns `false` when the technique does not exist or [`prepare`](Self::prepare)
    /// has not run since the last map change.
    pub fn bind(&self, pass: &mut RenderPass<'_>, technique: usize) -> bool {
        let (Some(pipeline), Some(bind_group)) =
            (self.pipelines.get(technique), self.bind_group.as_ref())
        else {
            return false;
        };
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        true
    }
}

impl std::fmt::Debug for GpuProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuProgram")
            .field("label", &self.label)
            .field("techniques", &self.pipelines.len())
            .field("resources", &self.resources.len())
            .finish()
    }
}
