//! Scene description
//!
//! Declares which meshes a renderer should load, with which effect and maps,
//! and where they sit. [`Renderer::load_scene`](super::renderer::Renderer::load_scene)
//! turns a description into GPU meshes.

use std::path::{Path, PathBuf};

use cgmath::{Matrix4, Vector3};
use log::{info, warn};

use super::backend::{ColorSpace, GraphicsBackend};
use super::effect::{params, Effect, EffectError, OpaqueEffect, TranslucentEffect};
use super::geometry::{generate_cube, generate_quad, MeshData};
use super::mesh::GpuMesh;
use super::renderer::PassCategory;
use crate::assets::{self, AssetError};
use crate::config::EffectCompileConfig;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("renderer is not ready")]
    NotReady,
    #[error("failed to load effect for mesh `{mesh}`")]
    Effect {
        mesh: String,
        #[source]
        source: EffectError,
    },
    #[error("failed to load geometry for mesh `{mesh}`")]
    Asset {
        mesh: String,
        #[source]
        source: AssetError,
    },
}

/// Where a mesh's geometry comes from.
#[derive(Debug, Clone)]
pub enum MeshSource {
    /// OBJ file; `fallback` is used instead when the file cannot be loaded.
    Obj {
        path: PathBuf,
        fallback: Option<MeshData>,
    },
    Data(MeshData),
}

#[derive(Debug, Clone)]
pub struct MeshEntry {
    pub name: String,
    /// Also selects the effect variant: opaque or translucent.
    pub pass: PassCategory,
    pub source: MeshSource,
    pub effect: PathBuf,
    /// Map parameter name and image path. Unloadable images are skipped.
    pub maps: Vec<(&'static str, PathBuf)>,
    pub world: Matrix4<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct SceneDescription {
    pub meshes: Vec<MeshEntry>,
}

impl SceneDescription {
    pub fn with_mesh(mut self, entry: MeshEntry) -> Self {
        self.meshes.push(entry);
        self
    }

    /// The reference scene: a textured vehicle and a translucent fire effect,
    /// both at `placement`.
    ///
    /// Missing models fall back to a cube and a quad.
    pub fn vehicle_and_fire(asset_root: &Path, placement: Vector3<f32>) -> Self {
        let world = Matrix4::from_translation(placement);

        Self::default()
            .with_mesh(MeshEntry {
                name: "vehicle".to_string(),
                pass: PassCategory::Opaque,
                source: MeshSource::Obj {
                    path: asset_root.join("vehicle.obj"),
                    fallback: Some(generate_cube()),
                },
                effect: asset_root.join("shaders/mesh.wgsl"),
                maps: vec![
                    (params::DIFFUSE_MAP, asset_root.join("vehicle_diffuse.png")),
                    (params::NORMAL_MAP, asset_root.join("vehicle_normal.png")),
                    (params::GLOSS_MAP, asset_root.join("vehicle_gloss.png")),
                    (params::SPECULAR_MAP, asset_root.join("vehicle_specular.png")),
                ],
                world,
            })
            .with_mesh(MeshEntry {
                name: "fire".to_string(),
                pass: PassCategory::Translucent,
                source: MeshSource::Obj {
                    path: asset_root.join("fireFX.obj"),
                    fallback: Some(generate_quad(4.0, 4.0)),
                },
                effect: asset_root.join("shaders/transparency.wgsl"),
                maps: vec![(params::DIFFUSE_MAP, asset_root.join("fireFX_diffuse.png"))],
                world,
            })
    }
}

impl MeshEntry {
    /// Decodes the geometry, loads the effect and maps, and uploads the mesh.
    pub fn build<B: GraphicsBackend>(
        &self,
        device: &mut B,
        config: &EffectCompileConfig,
    ) -> Result<GpuMesh<B>, SceneError> {
        let data = self.geometry()?;

        let mut effect: Box<dyn Effect<B>> = match self.pass {
            PassCategory::Opaque => OpaqueEffect::load(device, &self.effect, config)
                .map(|e| Box::new(e) as Box<dyn Effect<B>>),
            PassCategory::Translucent => TranslucentEffect::load(device, &self.effect, config)
                .map(|e| Box::new(e) as Box<dyn Effect<B>>),
        }
        .map_err(|source| SceneError::Effect {
            mesh: self.name.clone(),
            source,
        })?;

        for (name, path) in &self.maps {
            let image = match assets::load_image(path) {
                Ok(image) => image,
                Err(err) => {
                    warn!("mesh {}: {} skipped: {}", self.name, name, err);
                    continue;
                }
            };
            let texture = device.create_texture(
                &format!("{} {}", self.name, name),
                &image,
                ColorSpace::for_map(name),
            );
            effect
                .bind_map(name, texture)
                .map_err(|source| SceneError::Effect {
                    mesh: self.name.clone(),
                    source: source.into(),
                })?;
        }

        let mesh = GpuMesh::new(device, &self.name, &data.vertices, &data.indices, effect)
            .with_world(self.world);
        info!(
            "mesh {} ready ({} triangles, {:?})",
            self.name,
            data.triangle_count(),
            self.pass
        );
        Ok(mesh)
    }

    fn geometry(&self) -> Result<MeshData, SceneError> {
        let asset_error = |source| SceneError::Asset {
            mesh: self.name.clone(),
            source,
        };

        match &self.source {
            MeshSource::Data(data) if data.is_empty() => Err(asset_error(AssetError::EmptyMesh {
                path: PathBuf::from(&self.name),
            })),
            MeshSource::Data(data) => Ok(data.clone()),
            MeshSource::Obj { path, fallback } => match (assets::load_obj(path), fallback) {
                (Ok(data), _) => Ok(data),
                (Err(err), Some(fallback)) => {
                    warn!(
                        "mesh {}: {}; using procedural stand-in",
                        self.name, err
                    );
                    Ok(fallback.clone())
                }
                (Err(err), None) => Err(asset_error(err)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, RecordingBackend};

    fn shipped_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("assets")
    }

    #[test]
    fn test_reference_scene_orders_vehicle_before_fire() {
        let scene = SceneDescription::vehicle_and_fire(&shipped_root(), Vector3::new(0.0, 0.0, 40.0));

        let names: Vec<_> = scene.meshes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["vehicle", "fire"]);
        assert_eq!(scene.meshes[0].pass, PassCategory::Opaque);
        assert_eq!(scene.meshes[1].pass, PassCategory::Translucent);
        assert_eq!(scene.meshes[0].maps.len(), 4);
        assert_eq!(scene.meshes[1].world.w.z, 40.0);
    }

    #[test]
    fn test_missing_assets_fall_back_and_skip_maps() {
        let dir = tempfile::tempdir().unwrap();
        let scene = SceneDescription::vehicle_and_fire(dir.path(), Vector3::new(0.0, 0.0, 40.0));
        let mut vehicle = scene.meshes[0].clone();
        vehicle.effect = shipped_root().join("shaders/mesh.wgsl");
        let mut device = RecordingBackend::new(800, 600);

        let mesh = vehicle.build(&mut device, &EffectCompileConfig::default()).unwrap();

        assert_eq!(mesh.index_count(), 36);
        assert_eq!(device.count(|c| matches!(c, Call::CreateTexture { .. })), 0);
    }

    #[test]
    fn test_only_diffuse_maps_are_uploaded_as_srgb() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["diffuse", "normal", "gloss", "specular"] {
            image::RgbaImage::new(2, 2)
                .save(dir.path().join(format!("vehicle_{}.png", name)))
                .unwrap();
        }
        let scene = SceneDescription::vehicle_and_fire(dir.path(), Vector3::new(0.0, 0.0, 40.0));
        let mut vehicle = scene.meshes[0].clone();
        vehicle.effect = shipped_root().join("shaders/mesh.wgsl");
        let mut device = RecordingBackend::new(800, 600);

        vehicle.build(&mut device, &EffectCompileConfig::default()).unwrap();

        let spaces: Vec<_> = device
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::CreateTexture { color_space, .. } => Some(*color_space),
                _ => None,
            })
            .collect();
        assert_eq!(
            spaces,
            vec![
                ColorSpace::Srgb,
                ColorSpace::Linear,
                ColorSpace::Linear,
                ColorSpace::Linear
            ]
        );
    }

    #[test]
    fn test_color_space_follows_map_name() {
        assert_eq!(ColorSpace::for_map(params::DIFFUSE_MAP), ColorSpace::Srgb);
        for name in [params::NORMAL_MAP, params::GLOSS_MAP, params::SPECULAR_MAP] {
            assert_eq!(ColorSpace::for_map(name), ColorSpace::Linear);
        }
    }

    #[test]
    fn test_missing_model_without_fallback_fails() {
        let dir = tempfile::tempdir().unwrap();
        let entry = MeshEntry {
            name: "vehicle".to_string(),
            pass: PassCategory::Opaque,
            source: MeshSource::Obj {
                path: dir.path().join("vehicle.obj"),
                fallback: None,
            },
            effect: shipped_root().join("shaders/mesh.wgsl"),
            maps: Vec::new(),
            world: Matrix4::from_scale(1.0),
        };
        let mut device = RecordingBackend::new(800, 600);

        let err = entry
            .build(&mut device, &EffectCompileConfig::default())
            .err()
            .unwrap();

        assert!(matches!(err, SceneError::Asset { .. }));
        assert_eq!(device.programs_created(), 0);
    }

    #[test]
    fn test_missing_effect_fails_the_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let entry = MeshEntry {
            name: "fire".to_string(),
            pass: PassCategory::Translucent,
            source: MeshSource::Data(generate_quad(1.0, 1.0)),
            effect: dir.path().join("transparency.wgsl"),
            maps: Vec::new(),
            world: Matrix4::from_scale(1.0),
        };
        let mut device = RecordingBackend::new(800, 600);

        let err = entry
            .build(&mut device, &EffectCompileConfig::default())
            .err()
            .unwrap();

        assert!(matches!(err, SceneError::Effect { .. }));
        assert!(err.to_string().contains("fire"));
    }
}
