// src/lib.rs
//! Flint
//!
//! A minimal forward renderer built on wgpu and winit: one device, shader
//! effects with switchable techniques, and a frame loop that draws opaque
//! meshes before translucent ones.

pub mod app;
pub mod assets;
pub mod config;
pub mod gfx;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use app::FlintApp;
