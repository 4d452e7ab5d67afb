//! Opaque surface effect
//!
//! Diffuse, normal, gloss and specular maps; replaces the color target and
//! writes depth.

use std::path::Path;

use log::debug;

use super::{
    params, Effect, EffectError, ParameterBindError, ParameterDecl, ParameterKind, ShaderEffect,
};
use crate::config::EffectCompileConfig;
use crate::gfx::backend::{BlendMode, GraphicsBackend};

const MAPS: [&str; 4] = [
    params::DIFFUSE_MAP,
    params::NORMAL_MAP,
    params::GLOSS_MAP,
    params::SPECULAR_MAP,
];

const PARAMETERS: &[ParameterDecl] = &[
    ParameterDecl::required(params::WORLD_VIEW_PROJ, ParameterKind::Matrix),
    ParameterDecl::optional(params::WORLD, ParameterKind::Matrix),
    ParameterDecl::optional(params::VIEW_INVERSE, ParameterKind::Matrix),
    ParameterDecl::optional(params::DIFFUSE_MAP, ParameterKind::Map),
    ParameterDecl::optional(params::NORMAL_MAP, ParameterKind::Map),
    ParameterDecl::optional(params::GLOSS_MAP, ParameterKind::Map),
    ParameterDecl::optional(params::SPECULAR_MAP, ParameterKind::Map),
];

/// Effect for solid surfaces.
///
/// Loaded maps are re-bound before every draw; maps never loaded are left to
/// the device's fallback texture.
pub struct OpaqueEffect<B: GraphicsBackend> {
    shader: ShaderEffect<B>,
    maps: [Option<B::Texture>; 4],
}

impl<B: GraphicsBackend> OpaqueEffect<B> {
    pub fn load(
        device: &mut B,
        path: &Path,
        config: &EffectCompileConfig,
    ) -> Result<Self, EffectError> {
        let shader = ShaderEffect::load(device, path, PARAMETERS, BlendMode::Replace, config)?;
        Ok(Self {
            shader,
            maps: [None, None, None, None],
        })
    }

    pub fn set_diffuse_map(&mut self, texture: B::Texture) {
        self.maps[0] = Some(texture);
    }

    pub fn set_normal_map(&mut self, texture: B::Texture) {
        self.maps[1] = Some(texture);
    }

    pub fn set_glossiness_map(&mut self, texture: B::Texture) {
        self.maps[2] = Some(texture);
    }

    pub fn set_specular_map(&mut self, texture: B::Texture) {
        self.maps[3] = Some(texture);
    }

    /// Number of maps currently loaded.
    pub fn loaded_maps(&self) -> usize {
        self.maps.iter().filter(|m| m.is_some()).count()
    }
}

impl<B: GraphicsBackend> Effect<B> for OpaqueEffect<B> {
    fn shader(&self) -> &ShaderEffect<B> {
        &self.shader
    }

    fn shader_mut(&mut self) -> &mut ShaderEffect<B> {
        &mut self.shader
    }

    fn bind_map(&mut self, name: &str, texture: B::Texture) -> Result<(), ParameterBindError> {
        let index = MAPS.iter().position(|m| *m == name).ok_or_else(|| {
            ParameterBindError::Missing {
                effect: self.shader.label().to_string(),
                name: name.to_string(),
            }
        })?;
        if !self.shader.has_parameter(name) {
            debug!(
                "effect {} does not sample `{}`; map kept but unused",
                self.shader.label(),
                name
            );
        }
        self.maps[index] = Some(texture);
        Ok(())
    }

    fn rebind_maps(&mut self, device: &mut B) {
        for (name, map) in MAPS.iter().zip(self.maps.iter()) {
            if let Some(texture) = map {
                self.shader.bind_texture(device, name, texture);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::backend::{ColorSpace, ParamSlot};
    use crate::gfx::resources::texture_resource::ImageData;
    use crate::testing::{shipped_shader, Call, RecordingBackend};

    fn load(device: &mut RecordingBackend) -> OpaqueEffect<RecordingBackend> {
        OpaqueEffect::load(
            device,
            &shipped_shader("mesh.wgsl"),
            &EffectCompileConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_shipped_effect_resolves_every_map() {
        let mut device = RecordingBackend::new(800, 600);
        let effect = load(&mut device);

        for name in MAPS {
            assert!(effect.shader().has_parameter(name), "{name} unresolved");
        }
        assert_eq!(effect.shader().blend(), BlendMode::Replace);
        assert_eq!(
            effect.shader().techniques(),
            &[
                "default_technique",
                "diffuse_technique",
                "normal_technique",
                "flat_technique"
            ]
        );
    }

    #[test]
    fn test_unloaded_maps_are_skipped() {
        let mut device = RecordingBackend::new(800, 600);
        let mut effect = load(&mut device);
        let normal = device.create_texture("normal", &ImageData::white(), ColorSpace::Linear);
        effect.set_normal_map(normal);
        device.clear_calls();

        effect.rebind_maps(&mut device);

        assert_eq!(effect.loaded_maps(), 1);
        assert_eq!(
            device.calls(),
            &[Call::SetMap {
                program: effect.shader().program().id,
                slot: ParamSlot::new(0, 4),
                texture: normal,
            }]
        );
    }

    #[test]
    fn test_loaded_maps_rebind_on_every_call() {
        let mut device = RecordingBackend::new(800, 600);
        let mut effect = load(&mut device);
        let diffuse = device.create_texture("diffuse", &ImageData::white(), ColorSpace::Srgb);
        let specular = device.create_texture("specular", &ImageData::white(), ColorSpace::Linear);
        effect.set_diffuse_map(diffuse);
        effect.set_specular_map(specular);
        device.clear_calls();

        effect.rebind_maps(&mut device);
        effect.rebind_maps(&mut device);

        assert_eq!(device.count(|c| matches!(c, Call::SetMap { .. })), 4);
    }

    #[test]
    fn test_unknown_map_name_is_rejected() {
        let mut device = RecordingBackend::new(800, 600);
        let mut effect = load(&mut device);
        let texture = device.create_texture("emissive", &ImageData::white(), ColorSpace::Linear);

        let err = effect.bind_map("emissive_map", texture).unwrap_err();

        assert!(matches!(err, ParameterBindError::Missing { .. }));
        assert_eq!(effect.loaded_maps(), 0);
    }
}
