//! CPU meshing crate: turns chunk voxels plus block fragments into one mesh.
#![forbid(unsafe_code)]

pub mod mesher;

pub use mesher::GreedyMesher;

use serde::{Deserialize, Serialize};
use strata_blocks::{FaceSlice, MeshFragment};

/// Flat triangle-list buffers handed to the renderer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub indices: Vec<u32>,
}

impl Mesh {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Appends one cube face, translated to `origin` and scaled by `scale`.
    pub fn push_face(&mut self, face: FaceSlice<'_>, origin: [f32; 3], scale: f32) {
        let base = self.vertex_count() as u32;
        for v in face.vertices.chunks_exact(3) {
            self.vertices.extend_from_slice(&[
                origin[0] + v[0] * scale,
                origin[1] + v[1] * scale,
                origin[2] + v[2] * scale,
            ]);
        }
        self.normals.extend_from_slice(face.normals);
        self.uvs.extend_from_slice(face.uvs);
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base + 1, base + 3, base + 2]);
    }

    /// Appends a whole fragment, remapping its indices past the current vertices.
    pub fn splice(&mut self, fragment: &MeshFragment, origin: [f32; 3], scale: f32) {
        let base = self.vertex_count() as u32;
        for v in fragment.vertices.chunks_exact(3) {
            self.vertices.extend_from_slice(&[
                origin[0] + v[0] * scale,
                origin[1] + v[1] * scale,
                origin[2] + v[2] * scale,
            ]);
        }
        self.normals.extend_from_slice(&fragment.normals);
        self.uvs.extend_from_slice(&fragment.uvs);
        self.indices
            .extend(fragment.indices.iter().map(|i| base + i));
    }
}
