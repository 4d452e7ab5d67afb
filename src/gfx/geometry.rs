//! # Procedural Geometry
//!
//! Stand-in meshes for scenes whose model assets are missing: a unit cube for
//! opaque geometry and a flat quad for translucent sprites. Tangents are
//! derived from UVs so the opaque effect's normal mapping has a basis.

use cgmath::{InnerSpace, Vector2, Vector3};

use super::vertex::Vertex3D;

/// Decoded or generated geometry ready for upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex3D>,
    /// Triangle list, counter-clockwise winding
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Interleaves separate attribute streams and computes per-vertex tangents.
    ///
    /// Missing UVs or normals are filled with zeros.
    pub fn from_attributes(
        positions: &[[f32; 3]],
        uvs: &[[f32; 2]],
        normals: &[[f32; 3]],
        indices: Vec<u32>,
    ) -> Self {
        let vertices = positions
            .iter()
            .enumerate()
            .map(|(i, position)| Vertex3D {
                position: *position,
                uv: uvs.get(i).copied().unwrap_or([0.0; 2]),
                normal: normals.get(i).copied().unwrap_or([0.0; 3]),
                tangent: [0.0; 3],
            })
            .collect();

        let mut data = Self { vertices, indices };
        data.compute_tangents();
        data
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Accumulates UV-space tangents per triangle, then orthonormalizes them
    /// against the vertex normal. Degenerate vertices get an arbitrary
    /// perpendicular.
    pub fn compute_tangents(&mut self) {
        let mut accumulated = vec![Vector3::new(0.0f32, 0.0, 0.0); self.vertices.len()];

        for triangle in self.indices.chunks_exact(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
            if a >= self.vertices.len() || b >= self.vertices.len() || c >= self.vertices.len() {
                continue;
            }
            let (va, vb, vc) = (&self.vertices[a], &self.vertices[b], &self.vertices[c]);

            let edge1 = Vector3::from(vb.position) - Vector3::from(va.position);
            let edge2 = Vector3::from(vc.position) - Vector3::from(va.position);
            let duv1 = Vector2::from(vb.uv) - Vector2::from(va.uv);
            let duv2 = Vector2::from(vc.uv) - Vector2::from(va.uv);

            let det = duv1.x * duv2.y - duv2.x * duv1.y;
            if det.abs() < f32::EPSILON {
                continue;
            }
            let tangent = (edge1 * duv2.y - edge2 * duv1.y) / det;
            for i in [a, b, c] {
                accumulated[i] += tangent;
            }
        }

        for (vertex, tangent) in self.vertices.iter_mut().zip(accumulated) {
            let normal = Vector3::from(vertex.normal);
            let orthogonal = tangent - normal * normal.dot(tangent);
            let tangent = if orthogonal.magnitude2() > f32::EPSILON {
                orthogonal.normalize()
            } else {
                any_perpendicular(normal)
            };
            vertex.tangent = tangent.into();
        }
    }
}

fn any_perpendicular(normal: Vector3<f32>) -> Vector3<f32> {
    let axis = if normal.x.abs() < 0.9 {
        Vector3::unit_x()
    } else {
        Vector3::unit_y()
    };
    let perpendicular = axis - normal * normal.dot(axis);
    if perpendicular.magnitude2() > f32::EPSILON {
        perpendicular.normalize()
    } else {
        Vector3::unit_x()
    }
}

/// Generate a unit cube centered at the origin
///
/// Each face has its own four vertices with outward normals and UVs from 0 to 1.
pub fn generate_cube() -> MeshData {
    #[rustfmt::skip]
    let positions = [
        // Front face
        [-0.5, -0.5,  0.5], [ 0.5, -0.5,  0.5], [ 0.5,  0.5,  0.5], [-0.5,  0.5,  0.5],
        // Back face
        [-0.5, -0.5, -0.5], [-0.5,  0.5, -0.5], [ 0.5,  0.5, -0.5], [ 0.5, -0.5, -0.5],
        // Left face
        [-0.5, -0.5, -0.5], [-0.5, -0.5,  0.5], [-0.5,  0.5,  0.5], [-0.5,  0.5, -0.5],
        // Right face
        [ 0.5, -0.5,  0.5], [ 0.5, -0.5, -0.5], [ 0.5,  0.5, -0.5], [ 0.5,  0.5,  0.5],
        // Top face
        [-0.5,  0.5,  0.5], [ 0.5,  0.5,  0.5], [ 0.5,  0.5, -0.5], [-0.5,  0.5, -0.5],
        // Bottom face
        [-0.5, -0.5, -0.5], [ 0.5, -0.5, -0.5], [ 0.5, -0.5,  0.5], [-0.5, -0.5,  0.5],
    ];

    #[rustfmt::skip]
    let uvs = [
        [0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0],
        [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0],
        [1.0, 0.0], [0.0, 0.0], [0.0, 1.0], [1.0, 1.0],
        [0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0],
        [0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0],
        [0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0],
    ];

    let face_normals = [
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
        [-1.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
    ];
    let normals: Vec<[f32; 3]> = face_normals
        .iter()
        .flat_map(|normal| std::iter::repeat(*normal).take(4))
        .collect();

    let indices = (0..6u32)
        .flat_map(|face| {
            let base = face * 4;
            [base, base + 1, base + 2, base + 2, base + 3, base]
        })
        .collect();

    MeshData::from_attributes(&positions, &uvs, &normals, indices)
}

/// Generate a quad in the XY plane facing -Z (towards a camera looking down +Z)
///
/// # Arguments
/// * `width` - Extent along X
/// * `height` - Extent along Y
pub fn generate_quad(width: f32, height: f32) -> MeshData {
    let (hw, hh) = (width * 0.5, height * 0.5);
    let positions = [[-hw, -hh, 0.0], [-hw, hh, 0.0], [hw, hh, 0.0], [hw, -hh, 0.0]];
    let uvs = [[0.0, 1.0], [0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
    let normals = [[0.0, 0.0, -1.0]; 4];

    MeshData::from_attributes(&positions, &uvs, &normals, vec![0, 1, 2, 2, 3, 0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_generation() {
        let cube = generate_cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert_eq!(cube.triangle_count(), 12);
        assert!(cube.indices.iter().all(|&i| (i as usize) < cube.vertices.len()));
    }

    #[test]
    fn test_tangents_are_unit_and_perpendicular_to_normals() {
        for mesh in [generate_cube(), generate_quad(2.0, 1.0)] {
            for vertex in &mesh.vertices {
                let tangent = Vector3::from(vertex.tangent);
                let normal = Vector3::from(vertex.normal);
                assert!((tangent.magnitude() - 1.0).abs() < 1e-5);
                assert!(tangent.dot(normal).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_quad_faces_negative_z() {
        let quad = generate_quad(4.0, 2.0);
        assert_eq!(quad.vertices.len(), 4);
        assert_eq!(quad.indices, vec![0, 1, 2, 2, 3, 0]);
        assert_eq!(quad.vertices[2].position, [2.0, 1.0, 0.0]);

        // winding is counter-clockwise seen from -Z
        let [a, b, c] = [0, 1, 2].map(|i| Vector3::from(quad.vertices[i].position));
        let facing = (b - a).cross(c - a);
        assert!(facing.z < 0.0);
    }

    #[test]
    fn test_missing_attributes_default_to_zero() {
        let data = MeshData::from_attributes(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            &[],
            &[],
            vec![0, 1, 2],
        );
        assert_eq!(data.vertices[1].uv, [0.0, 0.0]);
        assert_eq!(data.vertices[1].normal, [0.0, 0.0, 0.0]);
        assert!(!data.is_empty());
    }
}
