//! WGSL compilation and reflection
//!
//! Effects are compiled with naga on the CPU before anything reaches the
//! device. The parsed module tells us the vertex entry, the fragment entries
//! (techniques) and the `@group(0)` resources (parameters).

use std::fs;
use std::io;
use std::path::Path;

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, ImageClass, ImageDimension, ShaderStage, TypeInner, VectorSize};

use super::{EffectCompileError, ParameterBindError, ParameterKind};
use crate::config::EffectCompileConfig;
use crate::gfx::backend::{ParamSlot, ProgramResource};

/// Source text together with its parsed module.
#[derive(Debug)]
pub struct CompiledEffect {
    pub source: String,
    pub module: naga::Module,
}

/// Reads and compiles the WGSL file at `path`.
pub fn compile_file(
    path: &Path,
    config: &EffectCompileConfig,
) -> Result<CompiledEffect, EffectCompileError> {
    let source = fs::read_to_string(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => EffectCompileError::SourceNotFound {
            path: path.to_path_buf(),
        },
        _ => EffectCompileError::SourceUnreadable {
            path: path.to_path_buf(),
            source: err,
        },
    })?;

    let module = naga::front::wgsl::parse_str(&source)
        .map_err(|err| failure(path, Stage::Parse, err.emit_to_string(&source)))?;

    if config.strict_validation {
        let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
        validator
            .validate(&module)
            .map_err(|err| failure(path, Stage::Validate, err.emit_to_string(&source)))?;
    }

    Ok(CompiledEffect { source, module })
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Parse,
    Validate,
}

/// Maps compiler output to an error. Empty output means the compiler gave
/// no reason.
fn failure(path: &Path, stage: Stage, diagnostics: String) -> EffectCompileError {
    let path = path.to_path_buf();
    if diagnostics.trim().is_empty() {
        return EffectCompileError::UnknownCompileFailure { path };
    }
    match stage {
        Stage::Parse => EffectCompileError::Compile { path, diagnostics },
        Stage::Validate => EffectCompileError::Validation { path, diagnostics },
    }
}

/// Name of the first `@vertex` entry point.
pub fn vertex_entry(module: &naga::Module) -> Option<String> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == ShaderStage::Vertex)
        .map(|ep| ep.name.clone())
}

/// Names of the `@fragment` entry points, in declaration order.
pub fn techniques(module: &naga::Module) -> Vec<String> {
    module
        .entry_points
        .iter()
        .filter(|ep| ep.stage == ShaderStage::Fragment)
        .map(|ep| ep.name.clone())
        .collect()
}

/// Every named, bound global of the module as a program resource.
pub fn resources(
    module: &naga::Module,
    effect: &str,
) -> Result<Vec<ProgramResource>, ParameterBindError> {
    let mut resources = Vec::new();

    for (_, global) in module.global_variables.iter() {
        let (Some(name), Some(binding)) = (&global.name, &global.binding) else {
            continue;
        };

        if binding.group != 0 {
            return Err(ParameterBindError::UnsupportedGroup {
                effect: effect.to_string(),
                name: name.clone(),
                group: binding.group,
            });
        }

        let kind = classify(global.space, &module.types[global.ty].inner).ok_or_else(|| {
            ParameterBindError::UnsupportedType {
                effect: effect.to_string(),
                name: name.clone(),
            }
        })?;

        resources.push(ProgramResource {
            name: name.clone(),
            slot: ParamSlot::new(binding.group, binding.binding),
            kind,
        });
    }

    resources.sort_by_key(|r| r.slot);
    Ok(resources)
}

fn classify(space: AddressSpace, inner: &TypeInner) -> Option<ParameterKind> {
    match (space, inner) {
        (
            AddressSpace::Uniform,
            TypeInner::Matrix {
                columns: VectorSize::Quad,
                rows: VectorSize::Quad,
                ..
            },
        ) => Some(ParameterKind::Matrix),
        (
            AddressSpace::Handle,
            TypeInner::Image {
                dim: ImageDimension::D2,
                arrayed: false,
                class: ImageClass::Sampled { multi: false, .. },
            },
        ) => Some(ParameterKind::Map),
        (AddressSpace::Handle, TypeInner::Sampler { comparison: false }) => {
            Some(ParameterKind::Sampler)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_effect, MINIMAL_EFFECT};

    fn compile(path: &Path) -> Result<CompiledEffect, EffectCompileError> {
        compile_file(path, &EffectCompileConfig::default())
    }

    fn shipped(name: &str) -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("assets/shaders")
            .join(name)
    }

    #[test]
    fn test_shipped_mesh_effect_reflects_all_parameters() {
        let compiled = compile(&shipped("mesh.wgsl")).unwrap();
        let resources = resources(&compiled.module, "mesh").unwrap();

        let names: Vec<_> = resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "world_view_proj",
                "world",
                "view_inverse",
                "diffuse_map",
                "normal_map",
                "gloss_map",
                "specular_map",
                "map_sampler",
            ]
        );
        assert_eq!(resources[0].kind, ParameterKind::Matrix);
        assert_eq!(resources[3].kind, ParameterKind::Map);
        assert_eq!(resources[7].kind, ParameterKind::Sampler);
        assert_eq!(vertex_entry(&compiled.module).as_deref(), Some("vs_main"));
        assert_eq!(techniques(&compiled.module)[0], "default_technique");
    }

    #[test]
    fn test_shipped_transparency_effect_has_diffuse_only() {
        let compiled = compile(&shipped("transparency.wgsl")).unwrap();
        let resources = resources(&compiled.module, "transparency").unwrap();

        assert!(resources.iter().any(|r| r.name == "diffuse_map"));
        assert!(!resources.iter().any(|r| r.name == "normal_map"));
        assert_eq!(techniques(&compiled.module)[0], "default_technique");
    }

    #[test]
    fn test_techniques_keep_declaration_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_effect(&dir, "minimal.wgsl", MINIMAL_EFFECT);
        let compiled = compile(&path).unwrap();

        assert_eq!(
            techniques(&compiled.module),
            vec!["default_technique", "flat_technique", "debug_technique"]
        );
    }

    #[test]
    fn test_resources_outside_group_zero_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = MINIMAL_EFFECT.replace("@group(0) @binding(1)", "@group(1) @binding(1)");
        let path = write_effect(&dir, "grouped.wgsl", &source);
        let compiled = compile(&path).unwrap();

        let err = resources(&compiled.module, "grouped").unwrap_err();
        assert!(matches!(
            err,
            ParameterBindError::UnsupportedGroup { group: 1, .. }
        ));
    }

    #[test]
    fn test_missing_vertex_stage_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_effect(
            &dir,
            "fragment_only.wgsl",
            "@fragment fn default_technique() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }",
        );
        let compiled = compile(&path).unwrap();

        assert!(vertex_entry(&compiled.module).is_none());
        assert_eq!(techniques(&compiled.module), vec!["default_technique"]);
    }

    // Parses, but `bool` is not host-shareable so the validator rejects the uniform.
    const UNSHAREABLE_UNIFORM: &str = r#"
@group(0) @binding(0) var<uniform> enabled: bool;

@vertex
fn vs_main() -> @builtin(position) vec4<f32> {
    return vec4<f32>(1.0);
}

@fragment
fn default_technique() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;

    #[test]
    fn test_parse_errors_are_reported_as_compile_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_effect(
            &dir,
            "mismatch.wgsl",
            "@fragment fn default_technique() -> @location(0) vec4<f32> { let x: f32 = 1u; return vec4<f32>(x); }",
        );

        match compile(&path) {
            Err(EffectCompileError::Compile { diagnostics, .. }) => assert!(!diagnostics.is_empty()),
            other => panic!("expected a compile error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_validation_errors_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_effect(&dir, "unshareable.wgsl", UNSHAREABLE_UNIFORM);

        match compile(&path) {
            Err(EffectCompileError::Validation { diagnostics, .. }) => {
                assert!(!diagnostics.trim().is_empty());
            }
            other => panic!("expected a validation error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_validation_is_skipped_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_effect(&dir, "unshareable.wgsl", UNSHAREABLE_UNIFORM);
        let config = EffectCompileConfig::default().with_strict_validation(false);

        assert!(compile_file(&path, &config).is_ok());
    }

    #[test]
    fn test_empty_diagnostics_are_an_unknown_failure() {
        let path = Path::new("effect.wgsl");
        for stage in [Stage::Parse, Stage::Validate] {
            assert!(matches!(
                failure(path, stage, String::new()),
                EffectCompileError::UnknownCompileFailure { .. }
            ));
            assert!(matches!(
                failure(path, stage, "  \n".to_string()),
                EffectCompileError::UnknownCompileFailure { .. }
            ));
        }
        assert!(matches!(
            failure(path, Stage::Validate, "error: bad".to_string()),
            EffectCompileError::Validation { .. }
        ));
    }
}
