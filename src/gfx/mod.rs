//! # Graphics Module
//!
//! Device, effects, meshes and the frame loop.
//!
//! ## Architecture Overview
//!
//! - **Backend** ([`backend`]) - The execution-context seam every layer above the device draws through
//! - **Device** ([`device`]) - wgpu device, presentation chain and depth-stencil target
//! - **Effects** ([`effect`]) - Compiled shader programs with switchable techniques
//! - **Meshes** ([`mesh`]) - GPU buffers plus the effect and transform they draw with
//! - **Renderer** ([`renderer`]) - Update/Render sequencing, opaque before translucent
//!
//! ## Usage
//!
//! ```no_run
//! use flint::config::RendererConfig;
//! use flint::gfx::{GraphicsDevice, Renderer};
//!
//! // The renderer is typically created by FlintApp once a window exists
//! // let mut renderer: Renderer<GraphicsDevice> = Renderer::new(RendererConfig::default());
//! // renderer.initialize(width, height, |w, h, config| GraphicsDevice::new(window, w, h, config));
//! ```

pub mod backend;
pub mod camera;
pub mod device;
pub mod effect;
pub mod geometry;
pub mod mesh;
pub mod program;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod vertex;

// Re-export commonly used types
pub use camera::{Camera, PerspectiveCamera};
pub use device::GraphicsDevice;
pub use mesh::GpuMesh;
pub use renderer::{PassCategory, Renderer, RendererState};
pub use scene::SceneDescription;
