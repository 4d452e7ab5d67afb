//! Translucent effect
//!
//! Diffuse map only. Every technique alpha-blends over what is already in the
//! color target and tests depth without writing it.

use std::path::Path;

use super::{
    params, Effect, EffectError, ParameterBindError, ParameterDecl, ParameterKind, ShaderEffect,
};
use crate::config::EffectCompileConfig;
use crate::gfx::backend::{BlendMode, GraphicsBackend};

const PARAMETERS: &[ParameterDecl] = &[
    ParameterDecl::required(params::WORLD_VIEW_PROJ, ParameterKind::Matrix),
    ParameterDecl::optional(params::DIFFUSE_MAP, ParameterKind::Map),
];

pub struct TranslucentEffect<B: GraphicsBackend> {
    shader: ShaderEffect<B>,
    diffuse: Option<B::Texture>,
    /// Set when the diffuse map changed since it was last pushed.
    dirty: bool,
}

impl<B: GraphicsBackend> TranslucentEffect<B> {
    pub fn load(
        device: &mut B,
        path: &Path,
        config: &EffectCompileConfig,
    ) -> Result<Self, EffectError> {
        let shader = ShaderEffect::load(device, path, PARAMETERS, BlendMode::Alpha, config)?;
        Ok(Self {
            shader,
            diffuse: None,
            dirty: false,
        })
    }

    pub fn set_diffuse_map(&mut self, texture: B::Texture) {
        self.diffuse = Some(texture);
        self.dirty = true;
    }

    pub fn has_diffuse_map(&self) -> bool {
        self.diffuse.is_some()
    }
}

impl<B: GraphicsBackend> Effect<B> for TranslucentEffect<B> {
    fn shader(&self) -> &ShaderEffect<B> {
        &self.shader
    }

    fn shader_mut(&mut self) -> &mut ShaderEffect<B> {
        &mut self.shader
    }

    fn bind_map(&mut self, name: &str, texture: B::Texture) -> Result<(), ParameterBindError> {
        if name != params::DIFFUSE_MAP {
            return Err(ParameterBindError::Missing {
                effect: self.shader.label().to_string(),
                name: name.to_string(),
            });
        }
        self.set_diffuse_map(texture);
        Ok(())
    }

    // Each mesh owns its own effect and program, and nothing else binds to
    // that program, so the map bound on the last push is still current.
    fn rebind_maps(&mut self, device: &mut B) {
        if !self.dirty {
            return;
        }
        if let Some(texture) = &self.diffuse {
            self.shader.bind_texture(device, params::DIFFUSE_MAP, texture);
        }
        self.dirty = false;
    }
}
