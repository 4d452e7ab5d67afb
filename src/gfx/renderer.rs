//! Frame orchestration
//!
//! The [`Renderer`] owns the device, the camera and every mesh, and runs the
//! per-frame sequence: `update(dt)` then `render()`.
//!
//! Meshes are kept in pass order. All [`PassCategory::Opaque`] meshes precede
//! all [`PassCategory::Translucent`] ones, and registration order is kept
//! within a category, so blended geometry always composites over finished
//! opaque geometry.

use cgmath::{Deg, Rad};
use log::{debug, error, info, warn};

use super::backend::{ClearValues, GraphicsBackend};
use super::camera::{Camera, PerspectiveCamera};
use super::device::{validate_dimensions, DeviceInitError, FrameError};
use super::mesh::GpuMesh;
use super::scene::{SceneDescription, SceneError};
use crate::config::{DeviceConfig, RendererConfig};

/// Which pass a mesh is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PassCategory {
    Opaque,
    Translucent,
}

/// Lifecycle of a [`Renderer`]. `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

/// Frame orchestrator.
///
/// Fields drop in declaration order: meshes (with their effects, buffers and
/// maps), then the camera, then the device.
pub struct Renderer<B: GraphicsBackend> {
    meshes: Vec<(PassCategory, GpuMesh<B>)>,
    camera: Box<dyn Camera>,
    device: Option<B>,
    state: RendererState,
    init_error: Option<DeviceInitError>,
    config: RendererConfig,
}

impl<B: GraphicsBackend> Renderer<B> {
    pub fn new(config: RendererConfig) -> Self {
        let camera = PerspectiveCamera::new(
            config.camera_origin,
            Deg(config.field_of_view_degrees),
            1.0,
        );
        Self {
            meshes: Vec::new(),
            camera: Box::new(camera),
            device: None,
            state: RendererState::Uninitialized,
            init_error: None,
            config,
        }
    }

    /// Replaces the default perspective camera.
    pub fn with_camera(mut self, camera: Box<dyn Camera>) -> Self {
        self.camera = camera;
        self
    }

    /// Creates the device through `create_device` and moves to `Ready`, or
    /// records the error and moves to `Failed`.
    ///
    /// # Arguments
    /// * `width` - Surface width in pixels
    /// * `height` - Surface height in pixels
    /// * `create_device` - Device constructor, called with the size and device config
    pub fn initialize<F>(&mut self, width: u32, height: u32, create_device: F) -> RendererState
    where
        F: FnOnce(u32, u32, &DeviceConfig) -> Result<B, DeviceInitError>,
    {
        if self.state != RendererState::Uninitialized {
            warn!("renderer already initialized ({:?})", self.state);
            return self.state;
        }
        self.state = RendererState::Initializing;

        let device = validate_dimensions(width, height, u32::MAX)
            .and_then(|()| create_device(width, height, &self.config.device));

        match device {
            Ok(device) => {
                let (w, h) = device.surface_size();
                self.camera.set_aspect(w as f32 / h as f32);
                self.device = Some(device);
                self.state = RendererState::Ready;
                info!("renderer ready at {}x{}", w, h);
            }
            Err(err) => {
                error!("renderer initialization failed: {}", err);
                self.init_error = Some(err);
                self.state = RendererState::Failed;
            }
        }
        self.state
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn init_error(&self) -> Option<&DeviceInitError> {
        self.init_error.as_ref()
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn device(&self) -> Option<&B> {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> Option<&mut B> {
        self.device.as_mut()
    }

    pub fn camera(&self) -> &dyn Camera {
        self.camera.as_ref()
    }

    pub fn camera_mut(&mut self) -> &mut dyn Camera {
        self.camera.as_mut()
    }

    /// Meshes in draw order.
    pub fn meshes(&self) -> impl Iterator<Item = (PassCategory, &GpuMesh<B>)> {
        self.meshes.iter().map(|(pass, mesh)| (*pass, mesh))
    }

    /// Registers `mesh` after every mesh of its own category and before every
    /// mesh of a later one.
    pub fn add_mesh(&mut self, pass: PassCategory, mesh: GpuMesh<B>) {
        let index = self
            .meshes
            .iter()
            .position(|(existing, _)| *existing > pass)
            .unwrap_or(self.meshes.len());
        debug!("mesh {} registered as {:?} at {}", mesh.name(), pass, index);
        self.meshes.insert(index, (pass, mesh));
    }

    /// Builds every mesh of `scene` and registers them. Nothing is registered
    /// if any mesh fails.
    pub fn load_scene(&mut self, scene: &SceneDescription) -> Result<(), SceneError> {
        if self.state != RendererState::Ready {
            return Err(SceneError::NotReady);
        }
        let device = self.device.as_mut().ok_or(SceneError::NotReady)?;

        let built = scene
            .meshes
            .iter()
            .map(|entry| {
                entry
                    .build(device, &self.config.effects)
                    .map(|mesh| (entry.pass, mesh))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (pass, mesh) in built {
            self.add_mesh(pass, mesh);
        }
        Ok(())
    }

    /// Advances the camera, then spins every mesh about its up axis.
    pub fn update(&mut self, dt: f32) {
        self.camera.update(dt);

        let angle = Rad::from(Deg(self.config.rotation_speed_degrees * dt));
        for (_, mesh) in &mut self.meshes {
            mesh.rotate(angle);
        }
    }

    /// Draws one frame: clear, every mesh in pass order, present.
    ///
    /// Does nothing unless the renderer is `Ready`.
    pub fn render(&mut self) -> Result<(), FrameError> {
        if self.state != RendererState::Ready {
            return Ok(());
        }
        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };

        self.camera.recompute_view();
        let view_projection = self.camera.projection() * self.camera.view();
        let view_inverse = self.camera.view_inverse();

        if let Err(err) = device.begin_frame(&ClearValues::far_plane(self.config.clear_color)) {
            warn!("frame skipped: {}", err);
            return Err(err);
        }

        for (_, mesh) in &mut self.meshes {
            let world_view_proj = view_projection * mesh.world();
            mesh.render(device, &world_view_proj, &view_inverse);
        }

        device.present()
    }

    /// Cycles the technique of every mesh's effect.
    pub fn switch_technique(&mut self) {
        for (_, mesh) in &mut self.meshes {
            mesh.effect_mut().switch_technique();
        }
        if let Some((_, mesh)) = self.meshes.first() {
            info!(
                "switched technique: {} now uses {:?}",
                mesh.name(),
                mesh.effect().technique()
            );
        }
    }
}
