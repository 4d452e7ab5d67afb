// src/gfx/resources/mod.rs
//! GPU resource management
//!
//! Depth-stencil target, decoded maps and the fallback map.

pub mod texture_resource;

// Re-export main types
pub use texture_resource::{ImageData, TextureResource};
