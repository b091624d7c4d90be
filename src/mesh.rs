use std::collections::HashMap;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Interleaved vertex consumed by the mesh pipeline.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.into(),
            normal: normal.into(),
        }
    }
}

/// CPU-side triangle mesh.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Recomputes smooth normals from triangle faces.
    pub fn compute_normals(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.vertices.len()];
        for triangle in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
            let p0 = Vec3::from(self.vertices[i0].position);
            let p1 = Vec3::from(self.vertices[i1].position);
            let p2 = Vec3::from(self.vertices[i2].position);
            let normal = (p1 - p0).cross(p2 - p0);
            if normal.length_squared() > f32::EPSILON {
                let normal = normal.normalize();
                accum[i0] += normal;
                accum[i1] += normal;
                accum[i2] += normal;
            }
        }
        for (vertex, normal) in self.vertices.iter_mut().zip(accum) {
            vertex.normal = normal.normalize_or_zero().into();
        }
    }
}

/// Meshes available for drawing, keyed by primitive descriptor or model path.
///
/// The generation counter changes whenever a mesh is inserted so GPU caches
/// can tell when an entry was replaced.
#[derive(Debug, Clone, Default)]
pub struct MeshLibrary {
    meshes: HashMap<String, (u64, Arc<MeshData>)>,
    generation: u64,
}

impl MeshLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, mesh: MeshData) {
        self.generation += 1;
        self.meshes
            .insert(key.into(), (self.generation, Arc::new(mesh)));
    }

    pub fn get(&self, key: &str) -> Option<&Arc<MeshData>> {
        self.meshes.get(key).map(|(_, mesh)| mesh)
    }

    /// Returns the generation at which `key` was last inserted.
    pub fn generation_of(&self, key: &str) -> Option<u64> {
        self.meshes.get(key).map(|(generation, _)| *generation)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.meshes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}
