//! wgpu graphics device
//!
//! [`GraphicsDevice`] owns the wgpu instance, adapter, logical device, queue,
//! the presentation surface and the depth-stencil target, and implements
//! [`GraphicsBackend`] on top of them. Each frame records into a single render
//! pass that stays open between [`begin_frame`](GraphicsBackend::begin_frame)
//! and [`present`](GraphicsBackend::present).

use cgmath::Matrix4;
use log::{debug, info, warn};
use wgpu::util::DeviceExt;

use super::backend::{ClearValues, ColorSpace, GraphicsBackend, ParamSlot, ProgramLayout};
use super::effect::EffectCompileError;
use super::program::{GpuProgram, ProgramTargets};
use super::resources::texture_resource::{ImageData, TextureResource};
use super::vertex::Vertex3D;
use crate::config::DeviceConfig;

/// A stage of device creation failed. Nothing created before the failing stage
/// outlives the error.
#[derive(Debug, thiserror::Error)]
pub enum DeviceInitError {
    #[error("invalid surface dimensions {width}x{height} (max {max})")]
    InvalidDimensions { width: u32, height: u32, max: u32 },

    #[error("failed to create presentation surface")]
    CreateSurface(#[source] wgpu::CreateSurfaceError),

    #[error("no compatible graphics adapter")]
    RequestAdapter(#[source] wgpu::RequestAdapterError),

    #[error("failed to create logical device")]
    RequestDevice(#[source] wgpu::RequestDeviceError),

    #[error("surface reports no usable format for this adapter")]
    UnsupportedSurface,

    #[error("failed to create depth-stencil target: {0}")]
    DepthStencil(String),

    #[error("failed to configure render target: {0}")]
    RenderTarget(String),
}

/// A frame could not be started or presented.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("surface is outdated; reconfigured, frame skipped")]
    Outdated,
    #[error("surface was lost; reconfigured, frame skipped")]
    Lost,
    #[error("timed out acquiring the back buffer")]
    Timeout,
    #[error("out of memory acquiring the back buffer")]
    OutOfMemory,
    #[error("render target {target:?} and depth-stencil target {depth:?} differ in size")]
    TargetMismatch { target: (u32, u32), depth: (u32, u32) },
    #[error("{0}")]
    Other(String),
}

impl FrameError {
    /// Whether rendering can resume on a later frame.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FrameError::OutOfMemory | FrameError::TargetMismatch { .. })
    }
}

impl From<wgpu::SurfaceError> for FrameError {
    fn from(err: wgpu::SurfaceError) -> Self {
        match err {
            wgpu::SurfaceError::Outdated => FrameError::Outdated,
            wgpu::SurfaceError::Lost => FrameError::Lost,
            wgpu::SurfaceError::Timeout => FrameError::Timeout,
            wgpu::SurfaceError::OutOfMemory => FrameError::OutOfMemory,
            wgpu::SurfaceError::Other => FrameError::Other("surface error".to_string()),
        }
    }
}

/// Rejects zero or over-limit surface sizes before any GPU object is created.
pub fn validate_dimensions(width: u32, height: u32, max: u32) -> Result<(), DeviceInitError> {
    if width == 0 || height == 0 || width > max || height > max {
        return Err(DeviceInitError::InvalidDimensions { width, height, max });
    }
    Ok(())
}

/// Picks `requested` if supported, otherwise the closest tear-tolerant mode.
pub fn choose_present_mode(
    supported: &[wgpu::PresentMode],
    requested: wgpu::PresentMode,
) -> wgpu::PresentMode {
    [requested, wgpu::PresentMode::Mailbox]
        .into_iter()
        .find(|mode| supported.contains(mode))
        .unwrap_or(wgpu::PresentMode::Fifo)
}

/// Texture format a map of `color_space` is uploaded as.
pub fn texture_format(color_space: ColorSpace) -> wgpu::TextureFormat {
    match color_space {
        ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
    }
}

/// First sRGB format when preferred and available, else the surface's first.
pub fn choose_surface_format(
    formats: &[wgpu::TextureFormat],
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    let srgb = formats.iter().copied().find(|f| f.is_srgb());
    match (prefer_srgb, srgb) {
        (true, Some(format)) => Some(format),
        _ => formats.first().copied(),
    }
}

struct FrameInFlight {
    // Must drop before the encoder it was recorded from.
    pass: wgpu::RenderPass<'static>,
    encoder: wgpu::CommandEncoder,
    _target: wgpu::TextureView,
    surface_texture: wgpu::SurfaceTexture,
}

/// Logical device, presentation chain and render targets.
///
/// Fields drop in declaration order: in-flight frame, depth target, fallback
/// map and sampler, surface, queue, device, adapter, instance.
pub struct GraphicsDevice {
    frame: Option<FrameInFlight>,
    depth: TextureResource,
    fallback: TextureResource,
    map_sampler: wgpu::Sampler,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    queue: wgpu::Queue,
    device: wgpu::Device,
    adapter: wgpu::Adapter,
    #[allow(dead_code)]
    instance: wgpu::Instance,
}

impl GraphicsDevice {
    /// Creates the device and its presentation chain for `target`
    ///
    /// # Arguments
    /// * `target` - Window (or other surface target) to present into
    /// * `width` - Surface width in pixels
    /// * `height` - Surface height in pixels
    /// * `config` - Present mode, power preference and limits
    ///
    /// Runs to completion on the calling thread.
    pub fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        config: &DeviceConfig,
    ) -> Result<Self, DeviceInitError> {
        validate_dimensions(width, height, u32::MAX)?;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(target)
            .map_err(DeviceInitError::CreateSurface)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: config.power_preference,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(DeviceInitError::RequestAdapter)?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Flint Device"),
            required_features: wgpu::Features::empty(),
            required_limits: config.required_limits.clone().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(DeviceInitError::RequestDevice)?;

        validate_dimensions(width, height, device.limits().max_texture_dimension_2d)?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = choose_surface_format(&capabilities.formats, config.prefer_srgb)
            .ok_or(DeviceInitError::UnsupportedSurface)?;
        let present_mode = choose_present_mode(&capabilities.present_modes, config.present_mode);
        if present_mode != config.present_mode {
            warn!(
                "present mode {:?} unsupported, using {:?}",
                config.present_mode, present_mode
            );
        }

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode,
            alpha_mode: capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: config.desired_maximum_frame_latency,
        };

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        surface.configure(&device, &surface_config);
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(DeviceInitError::RenderTarget(err.to_string()));
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let depth = TextureResource::create_depth_stencil(&device, &surface_config, "Depth Stencil");
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(DeviceInitError::DepthStencil(err.to_string()));
        }

        let fallback = TextureResource::create_from_image(
            &device,
            &queue,
            &ImageData::white(),
            wgpu::TextureFormat::Rgba8Unorm,
            "Fallback Map",
        );
        let map_sampler = TextureResource::create_map_sampler(&device, "Map Sampler");

        let adapter_info = adapter.get_info();
        info!(
            "graphics device ready: {} ({:?}), {}x{}, {:?}, {:?}",
            adapter_info.name, adapter_info.backend, width, height, format, present_mode
        );

        Ok(Self {
            frame: None,
            depth,
            fallback,
            map_sampler,
            surface,
            config: surface_config,
            queue,
            device,
            adapter,
            instance,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn present_mode(&self) -> wgpu::PresentMode {
        self.config.present_mode
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }

    /// Pixel size of the depth-stencil target.
    pub fn depth_size(&self) -> (u32, u32) {
        self.depth.size()
    }

    fn frame_pass(&mut self, operation: &str) -> Option<&mut wgpu::RenderPass<'static>> {
        match self.frame.as_mut() {
            Some(frame) => Some(&mut frame.pass),
            None => {
                warn!("{} outside of a frame ignored", operation);
                None
            }
        }
    }
}

impl GraphicsBackend for GraphicsDevice {
    type Buffer = wgpu::Buffer;
    type Texture = TextureResource;
    type Program = GpuProgram;

    fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn create_vertex_buffer(&mut self, label: &str, vertices: &[Vertex3D]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
    }

    fn create_index_buffer(&mut self, label: &str, indices: &[u32]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            })
    }

    fn create_texture(
        &mut self,
        label: &str,
        image: &ImageData,
        color_space: ColorSpace,
    ) -> TextureResource {
        let format = texture_format(color_space);
        TextureResource::create_from_image(&self.device, &self.queue, image, format, label)
    }

    fn create_program(&mut self, layout: &ProgramLayout<'_>) -> Result<GpuProgram, EffectCompileError> {
        GpuProgram::create(
            &self.device,
            layout,
            &ProgramTargets {
                color_format: self.config.format,
                depth_format: TextureResource::DEPTH_FORMAT,
                fallback: &self.fallback,
                sampler: &self.map_sampler,
            },
        )
    }

    fn begin_frame(&mut self, clear: &ClearValues) -> Result<(), FrameError> {
        if self.frame.take().is_some() {
            warn!("previous frame was never presented; abandoned");
        }

        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(err) => {
                if matches!(err, wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) {
                    self.surface.configure(&self.device, &self.config);
                }
                return Err(err.into());
            }
        };

        let size = surface_texture.texture.size();
        let target_size = (size.width, size.height);
        let depth_size = self.depth.size();
        if target_size != depth_size {
            return Err(FrameError::TargetMismatch {
                target: target_size,
                depth: depth_size,
            });
        }
        if surface_texture.suboptimal {
            debug!("surface texture is suboptimal");
        }

        let target = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let [r, g, b, a] = clear.color;
        let mut pass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Frame Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear.depth),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear.stencil),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            })
            .forget_lifetime();

        pass.set_viewport(
            0.0,
            0.0,
            target_size.0 as f32,
            target_size.1 as f32,
            0.0,
            1.0,
        );

        self.frame = Some(FrameInFlight {
            pass,
            encoder,
            _target: target,
            surface_texture,
        });
        Ok(())
    }

    fn set_matrix(&mut self, program: &mut GpuProgram, slot: ParamSlot, value: &Matrix4<f32>) {
        program.write_matrix(&self.queue, slot, value);
    }

    fn set_map(&mut self, program: &mut GpuProgram, slot: ParamSlot, texture: &TextureResource) {
        program.set_map(slot, texture);
    }

    fn apply_technique(&mut self, program: &mut GpuProgram, technique: usize) {
        program.prepare(&self.device);
        let Some(pass) = self.frame_pass("apply_technique") else {
            return;
        };
        if !program.bind(pass, technique) {
            warn!(
                "program {} has no technique {} ({} available)",
                program.label(),
                technique,
                program.technique_count()
            );
        }
    }

    fn draw_indexed(&mut self, vertices: &wgpu::Buffer, indices: &wgpu::Buffer, index_count: u32) {
        let Some(pass) = self.frame_pass("draw_indexed") else {
            return;
        };
        pass.set_vertex_buffer(0, vertices.slice(..));
        pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..index_count, 0, 0..1);
    }

    fn present(&mut self) -> Result<(), FrameError> {
        let FrameInFlight {
            pass,
            encoder,
            _target,
            surface_texture,
        } = self
            .frame
            .take()
            .ok_or_else(|| FrameError::Other("present without a frame in flight".to_string()))?;

        drop(pass);
        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(())
    }
}

impl Drop for GraphicsDevice {
    fn drop(&mut self) {
        self.frame = None;
        if let Err(err) = self.device.poll(wgpu::PollType::Wait) {
            warn!("failed to wait for the GPU during teardown: {}", err);
        }
        debug!("graphics device released");
    }
}
