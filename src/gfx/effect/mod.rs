//! Shader effects
//!
//! An effect is a WGSL program loaded from disk at runtime. Its `@fragment`
//! entry points are the selectable techniques; its `@group(0)` resources are
//! the named parameters (matrices, texture maps) bound before each draw.
//!
//! - [`ShaderEffect`] - compiled program, technique list and resolved parameters
//! - [`Effect`] - capability interface shared by every effect variant
//! - [`OpaqueEffect`] - diffuse/normal/gloss/specular surfaces
//! - [`TranslucentEffect`] - alpha-blended, diffuse only

pub mod opaque;
pub mod reflect;
pub mod translucent;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use cgmath::Matrix4;
use log::{debug, error, info, warn};

use crate::config::EffectCompileConfig;
use crate::gfx::backend::{BlendMode, GraphicsBackend, ParamSlot, ProgramLayout};

pub use opaque::OpaqueEffect;
pub use translucent::TranslucentEffect;

/// Name of the technique an effect starts on.
pub const DEFAULT_TECHNIQUE: &str = "default_technique";

/// Parameter names shared between the WGSL sources and the effect variants.
pub mod params {
    pub const WORLD_VIEW_PROJ: &str = "world_view_proj";
    pub const WORLD: &str = "world";
    pub const VIEW_INVERSE: &str = "view_inverse";
    pub const DIFFUSE_MAP: &str = "diffuse_map";
    pub const NORMAL_MAP: &str = "normal_map";
    pub const GLOSS_MAP: &str = "gloss_map";
    pub const SPECULAR_MAP: &str = "specular_map";
}

/// What kind of resource a shader parameter is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// `var<uniform> name: mat4x4<f32>`
    Matrix,
    /// `var name: texture_2d<f32>`
    Map,
    /// `var name: sampler`
    Sampler,
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterKind::Matrix => f.write_str("mat4x4<f32> uniform"),
            ParameterKind::Map => f.write_str("texture_2d<f32>"),
            ParameterKind::Sampler => f.write_str("sampler"),
        }
    }
}

/// A parameter an effect variant expects its program to expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterDecl {
    pub name: &'static str,
    pub kind: ParameterKind,
    pub required: bool,
}

impl ParameterDecl {
    pub const fn required(name: &'static str, kind: ParameterKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ParameterKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// The shader source failed to load or compile.
#[derive(Debug, thiserror::Error)]
pub enum EffectCompileError {
    #[error("effect source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("effect source {} could not be read", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to compile effect {}:\n{diagnostics}", path.display())]
    Compile { path: PathBuf, diagnostics: String },

    #[error("effect {} failed validation:\n{diagnostics}", path.display())]
    Validation { path: PathBuf, diagnostics: String },

    #[error("unknown compile failure for effect {}", path.display())]
    UnknownCompileFailure { path: PathBuf },

    #[error("effect {} has no @vertex entry point", path.display())]
    MissingVertexStage { path: PathBuf },

    #[error("device rejected effect `{label}`: {message}")]
    Backend { label: String, message: String },
}

/// A declared shader parameter could not be resolved in the compiled program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterBindError {
    #[error("required parameter `{name}` is missing from effect {effect}")]
    Missing { effect: String, name: String },

    #[error("parameter `{name}` of effect {effect} is a {found}, expected a {expected}")]
    WrongType {
        effect: String,
        name: String,
        expected: ParameterKind,
        found: ParameterKind,
    },

    #[error("parameter `{name}` of effect {effect} has an unsupported type")]
    UnsupportedType { effect: String, name: String },

    #[error("parameter `{name}` of effect {effect} is in bind group {group}; only group 0 is supported")]
    UnsupportedGroup {
        effect: String,
        name: String,
        group: u32,
    },
}

/// Any failure while loading an effect.
#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    #[error(transparent)]
    Compile(#[from] EffectCompileError),
    #[error(transparent)]
    Parameter(#[from] ParameterBindError),
}

/// Capability interface of an effect variant.
///
/// Meshes and the renderer only ever see `dyn Effect<B>`, so new variants plug
/// in without touching either.
pub trait Effect<B: GraphicsBackend> {
    fn shader(&self) -> &ShaderEffect<B>;

    fn shader_mut(&mut self) -> &mut ShaderEffect<B>;

    /// Takes ownership of `texture` as the map parameter `name`.
    fn bind_map(&mut self, name: &str, texture: B::Texture) -> Result<(), ParameterBindError>;

    /// Pushes every loaded map to the device. Called before each draw.
    fn rebind_maps(&mut self, device: &mut B);

    fn technique(&self) -> Option<&str> {
        self.shader().technique()
    }

    fn switch_technique(&mut self) {
        self.shader_mut().switch_technique();
    }

    /// Binds `value` to the matrix parameter `name`; unresolved optional
    /// parameters are skipped.
    fn bind_matrix(&mut self, device: &mut B, name: &str, value: &Matrix4<f32>) {
        self.shader_mut().bind_matrix(device, name, value);
    }

    /// Selects the current technique on the device. Returns `false` when the
    /// program has no technique to draw with.
    fn apply(&mut self, device: &mut B) -> bool {
        self.shader_mut().apply(device)
    }
}

/// A compiled effect program with its technique list and resolved parameters.
pub struct ShaderEffect<B: GraphicsBackend> {
    program: B::Program,
    label: String,
    techniques: Vec<String>,
    current: usize,
    params: BTreeMap<&'static str, ParamSlot>,
    blend: BlendMode,
}

impl<B: GraphicsBackend> ShaderEffect<B> {
    /// Compiles the WGSL file at `path` and resolves `declared` parameters.
    ///
    /// Compilation, reflection and parameter resolution all complete before
    /// the device is asked for a program, so a failing load never creates one.
    pub fn load(
        device: &mut B,
        path: &Path,
        declared: &[ParameterDecl],
        blend: BlendMode,
        config: &EffectCompileConfig,
    ) -> Result<Self, EffectError> {
        let compiled = reflect::compile_file(path, config).inspect_err(|err| {
            error!("{}", err);
        })?;
        let label = path.display().to_string();

        let vertex_entry = reflect::vertex_entry(&compiled.module).ok_or_else(|| {
            EffectCompileError::MissingVertexStage {
                path: path.to_path_buf(),
            }
        })?;
        let techniques = reflect::techniques(&compiled.module);
        let resources = reflect::resources(&compiled.module, &label)?;
        let params = resolve_parameters(&label, declared, &resources)?;

        let current = match techniques.iter().position(|t| t == DEFAULT_TECHNIQUE) {
            Some(index) => index,
            None => {
                warn!(
                    "technique `{}` not found in effect {}; falling back to {:?}",
                    DEFAULT_TECHNIQUE,
                    label,
                    techniques.first()
                );
                0
            }
        };

        let program = device.create_program(&ProgramLayout {
            label: &label,
            source: &compiled.source,
            vertex_entry: &vertex_entry,
            techniques: &techniques,
            resources: &resources,
            blend,
            debug_labels: config.debug_labels,
        })?;

        info!(
            "loaded effect {} ({} techniques, {} parameters)",
            label,
            techniques.len(),
            params.len()
        );

        Ok(Self {
            program,
            label,
            techniques,
            current,
            params,
            blend,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn blend(&self) -> BlendMode {
        self.blend
    }

    pub fn program(&self) -> &B::Program {
        &self.program
    }

    /// Techniques in program order.
    pub fn techniques(&self) -> &[String] {
        &self.techniques
    }

    pub fn technique_index(&self) -> Option<usize> {
        (!self.techniques.is_empty()).then_some(self.current)
    }

    pub fn technique(&self) -> Option<&str> {
        self.techniques.get(self.current).map(String::as_str)
    }

    /// Advances to the next technique, wrapping after the last.
    pub fn switch_technique(&mut self) {
        if self.techniques.is_empty() {
            return;
        }
        self.current = (self.current + 1) % self.techniques.len();
        debug!(
            "effect {} switched to technique `{}`",
            self.label, self.techniques[self.current]
        );
    }

    pub fn parameter_slot(&self, name: &str) -> Option<ParamSlot> {
        self.params.get(name).copied()
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn bind_matrix(&mut self, device: &mut B, name: &str, value: &Matrix4<f32>) {
        if let Some(slot) = self.params.get(name) {
            device.set_matrix(&mut self.program, *slot, value);
        }
    }

    pub fn bind_texture(&mut self, device: &mut B, name: &str, texture: &B::Texture) {
        if let Some(slot) = self.params.get(name) {
            device.set_map(&mut self.program, *slot, texture);
        }
    }

    pub fn apply(&mut self, device: &mut B) -> bool {
        if self.techniques.is_empty() {
            return false;
        }
        device.apply_technique(&mut self.program, self.current);
        true
    }
}

fn resolve_parameters(
    effect: &str,
    declared: &[ParameterDecl],
    resources: &[crate::gfx::backend::ProgramResource],
) -> Result<BTreeMap<&'static str, ParamSlot>, ParameterBindError> {
    let mut params = BTreeMap::new();

    for decl in declared {
        match resources.iter().find(|r| r.name == decl.name) {
            Some(resource) if resource.kind == decl.kind => {
                params.insert(decl.name, resource.slot);
            }
            Some(resource) => {
                return Err(ParameterBindError::WrongType {
                    effect: effect.to_string(),
                    name: decl.name.to_string(),
                    expected: decl.kind,
                    found: resource.kind,
                });
            }
            None if decl.required => {
                return Err(ParameterBindError::Missing {
                    effect: effect.to_string(),
                    name: decl.name.to_string(),
                });
            }
            None => debug!("effect {} has no optional parameter `{}`", effect, decl.name),
        }
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_effect, Call, RecordingBackend, MINIMAL_EFFECT};

    const DECLARED: &[ParameterDecl] = &[
        ParameterDecl::required(params::WORLD_VIEW_PROJ, ParameterKind::Matrix),
        ParameterDecl::optional(params::DIFFUSE_MAP, ParameterKind::Map),
    ];

    fn load(device: &mut RecordingBackend, path: &Path) -> Result<ShaderEffect<RecordingBackend>, EffectError> {
        ShaderEffect::load(
            device,
            path,
            DECLARED,
            BlendMode::Replace,
            &EffectCompileConfig::default(),
        )
    }

    #[test]
    fn test_missing_source_is_reported_without_creating_a_program() {
        let dir = tempfile::tempdir().unwrap();
        let mut device = RecordingBackend::new(800, 600);

        let err = load(&mut device, &dir.path().join("absent.wgsl")).err().unwrap();

        assert!(matches!(
            err,
            EffectError::Compile(EffectCompileError::SourceNotFound { .. })
        ));
        assert!(err.to_string().contains("not found"));
        assert_eq!(device.programs_created(), 0);
    }

    #[test]
    fn test_compile_error_carries_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_effect(&dir, "broken.wgsl", "fn vs_main( -> {");
        let mut device = RecordingBackend::new(800, 600);

        match load(&mut device, &path) {
            Err(EffectError::Compile(EffectCompileError::Compile { diagnostics, .. })) => {
                assert!(!diagnostics.is_empty());
            }
            other => panic!("expected compile error, got {:?}", other.err()),
        }
        assert_eq!(device.programs_created(), 0);
    }

    #[test]
    fn test_missing_required_parameter_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let source = MINIMAL_EFFECT.replace("world_view_proj", "model_matrix");
        let path = write_effect(&dir, "no_wvp.wgsl", &source);
        let mut device = RecordingBackend::new(800, 600);

        let err = load(&mut device, &path).err().unwrap();

        assert!(matches!(
            err,
            EffectError::Parameter(ParameterBindError::Missing { ref name, .. }) if name == "world_view_proj"
        ));
        assert_eq!(device.programs_created(), 0);
    }

    #[test]
    fn test_wrongly_typed_parameter_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = MINIMAL_EFFECT.replace(
            "var diffuse_map: texture_2d<f32>;",
            "var<uniform> diffuse_map: mat4x4<f32>;",
        );
        let path = write_effect(&dir, "typed.wgsl", &source);
        let mut device = RecordingBackend::new(800, 600);

        let err = load(&mut device, &path).err().unwrap();

        assert!(matches!(
            err,
            EffectError::Parameter(ParameterBindError::WrongType {
                expected: ParameterKind::Map,
                found: ParameterKind::Matrix,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_default_technique_falls_back_to_first() {
        let dir = tempfile::tempdir().unwrap();
        let source = MINIMAL_EFFECT.replace("fn default_technique", "fn shaded_technique");
        let path = write_effect(&dir, "renamed.wgsl", &source);
        let mut device = RecordingBackend::new(800, 600);

        let effect = load(&mut device, &path).unwrap();

        assert_eq!(effect.technique(), Some("shaded_technique"));
        assert_eq!(effect.technique_index(), Some(0));
    }

    #[test]
    fn test_loading_twice_gives_independent_effects_with_same_techniques() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_effect(&dir, "minimal.wgsl", MINIMAL_EFFECT);
        let mut device = RecordingBackend::new(800, 600);

        let mut first = load(&mut device, &path).unwrap();
        let second = load(&mut device, &path).unwrap();

        assert_eq!(first.techniques(), second.techniques());
        assert_ne!(first.program().id, second.program().id);
        assert_eq!(device.programs_created(), 2);

        first.switch_technique();
        assert_eq!(second.technique_index(), Some(0));
    }

    #[test]
    fn test_switch_technique_lands_on_n_mod_k() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_effect(&dir, "minimal.wgsl", MINIMAL_EFFECT);
        let mut device = RecordingBackend::new(800, 600);
        let mut effect = load(&mut device, &path).unwrap();
        let k = effect.techniques().len();
        assert_eq!(k, 3);

        for n in 0..10 {
            assert_eq!(effect.technique_index(), Some(n % k));
            effect.switch_technique();
        }
    }

    #[test]
    fn test_unresolved_optional_matrix_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_effect(&dir, "minimal.wgsl", MINIMAL_EFFECT);
        let mut device = RecordingBackend::new(800, 600);
        let mut effect = load(&mut device, &path).unwrap();
        device.clear_calls();

        effect.bind_matrix(&mut device, params::VIEW_INVERSE, &Matrix4::from_scale(2.0));
        effect.bind_matrix(&mut device, params::WORLD_VIEW_PROJ, &Matrix4::from_scale(2.0));

        assert_eq!(
            device.calls(),
            &[Call::SetMatrix {
                program: effect.program().id,
                slot: ParamSlot::new(0, 0),
            }]
        );
    }
}
