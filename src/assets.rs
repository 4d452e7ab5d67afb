//! Asset decoding
//!
//! Turns OBJ models and image files into the in-memory forms the renderer
//! uploads: [`MeshData`] and [`ImageData`].

use std::path::{Path, PathBuf};

use log::debug;

use crate::gfx::geometry::MeshData;
use crate::gfx::resources::texture_resource::ImageData;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to load model {}", path.display())]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("model {} contains no triangles", path.display())]
    EmptyMesh { path: PathBuf },

    #[error("failed to load image {}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Loads every model in an OBJ file into a single triangulated mesh.
///
/// Texture V is flipped to the top-left origin wgpu samples with.
pub fn load_obj(path: &Path) -> Result<MeshData, AssetError> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|source| AssetError::Obj {
        path: path.to_path_buf(),
        source,
    })?;

    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    for model in &models {
        let mesh = &model.mesh;
        let base = positions.len() as u32;
        let count = mesh.positions.len() / 3;

        positions.extend(mesh.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]]));

        if mesh.texcoords.len() / 2 == count {
            uvs.extend(mesh.texcoords.chunks_exact(2).map(|t| [t[0], 1.0 - t[1]]));
        } else {
            uvs.resize(positions.len(), [0.0; 2]);
        }

        if mesh.normals.len() / 3 == count {
            normals.extend(mesh.normals.chunks_exact(3).map(|n| [n[0], n[1], n[2]]));
        } else {
            normals.resize(positions.len(), [0.0; 3]);
        }

        indices.extend(mesh.indices.iter().map(|i| base + i));
        debug!(
            "model {} in {}: {} vertices, {} triangles",
            model.name,
            path.display(),
            count,
            mesh.indices.len() / 3
        );
    }

    if indices.is_empty() {
        return Err(AssetError::EmptyMesh {
            path: path.to_path_buf(),
        });
    }

    Ok(MeshData::from_attributes(&positions, &uvs, &normals, indices))
}

/// Decodes an image file into RGBA8 pixels.
pub fn load_image(path: &Path) -> Result<ImageData, AssetError> {
    let img = image::open(path).map_err(|source| AssetError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    Ok(ImageData {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}
