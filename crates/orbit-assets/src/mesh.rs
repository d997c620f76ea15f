// SPDX-License-Identifier: CEPL-1.0
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use tracing::debug;

use crate::AssetError;

/// Interleaved vertex: position at offset 0, texture coordinate at offset 12.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub uv: [f32; 2],
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

impl MeshData {
    /// Unit quad in the XY plane facing +Z.
    pub fn quad() -> Self {
        let v = |x: f32, y: f32, u: f32, v: f32| Vertex {
            pos: [x, y, 0.0],
            uv: [u, v],
        };
        Self {
            vertices: vec![
                v(1.0, 1.0, 1.0, 1.0),
                v(-1.0, 1.0, 0.0, 1.0),
                v(-1.0, -1.0, 0.0, 0.0),
                v(1.0, -1.0, 1.0, 0.0),
            ],
            indices: vec![0, 1, 2, 2, 3, 0],
        }
    }

    /// Loads every object in a Wavefront OBJ file into one indexed mesh.
    /// Faces are triangulated; texture `v` is flipped to a top-left origin.
    pub fn load_obj(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let opts = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };
        // Materials are not used; a missing .mtl is not an error here.
        let (models, _materials) =
            tobj::load_obj(path, &opts).map_err(|source| AssetError::Obj {
                path: path.to_path_buf(),
                source,
            })?;

        let mut vertices = Vec::new();
        let mut indices32 = Vec::new();
        for model in &models {
            let mesh = &model.mesh;
            let base = vertices.len() as u32;
            let count = mesh.positions.len() / 3;
            for i in 0..count {
                let uv = if mesh.texcoords.len() >= (i + 1) * 2 {
                    [mesh.texcoords[i * 2], 1.0 - mesh.texcoords[i * 2 + 1]]
                } else {
                    [0.0, 0.0]
                };
                vertices.push(Vertex {
                    pos: [
                        mesh.positions[i * 3],
                        mesh.positions[i * 3 + 1],
                        mesh.positions[i * 3 + 2],
                    ],
                    uv,
                });
            }
            indices32.extend(mesh.indices.iter().map(|&i| base + i));
        }

        if indices32.is_empty() {
            return Err(AssetError::EmptyMesh {
                path: path.to_path_buf(),
            });
        }
        if vertices.len() > usize::from(u16::MAX) + 1 {
            return Err(AssetError::TooManyVertices {
                path: path.to_path_buf(),
                count: vertices.len(),
            });
        }
        let indices = indices32.into_iter().map(|i| i as u16).collect();

        let mesh = Self { vertices, indices };
        debug!(
            "mesh {}: {} objects, {} vertices, {} indices",
            path.display(),
            models.len(),
            mesh.vertices.len(),
            mesh.indices.len()
        );
        Ok(mesh)
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}
