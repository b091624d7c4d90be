//! Procedural meshes for the primitive shapes a scene can declare.

use std::f32::consts::PI;

use glam::Vec3;

use crate::mesh::{MeshData, Vertex};

/// Axis-aligned box centred on the origin.
pub fn box_mesh(width: f32, height: f32, depth: f32) -> MeshData {
    let half = Vec3::new(width, height, depth) * 0.5;
    // (normal, tangent u, tangent v) per face, u x v == normal
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut mesh = MeshData::default();
    for (normal, u, v) in faces {
        let base = mesh.vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let corner = (normal + u * su + v * sv) * half;
            mesh.vertices.push(Vertex::new(corner, normal));
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

/// UV sphere with `width_segments` around the equator and `height_segments`
/// from pole to pole.
pub fn sphere_mesh(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let slices = width_segments.max(3);
    let stacks = height_segments.max(2);

    let mut mesh = MeshData::default();
    for stack in 0..=stacks {
        let phi = stack as f32 / stacks as f32 * PI;
        for slice in 0..=slices {
            let theta = slice as f32 / slices as f32 * 2.0 * PI;
            let normal = Vec3::new(-theta.cos() * phi.sin(), phi.cos(), theta.sin() * phi.sin());
            mesh.vertices.push(Vertex::new(normal * radius, normal));
        }
    }

    let ring = slices + 1;
    for stack in 0..stacks {
        for slice in 0..slices {
            let a = stack * ring + slice;
            let b = a + 1;
            let c = a + ring;
            let d = c + 1;
            if stack != 0 {
                mesh.indices.extend_from_slice(&[a, c, b]);
            }
            if stack != stacks - 1 {
                mesh.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    mesh
}

/// Plane in the XY plane facing +Z, centred on the origin.
pub fn plane_mesh(width: f32, height: f32) -> MeshData {
    let hw = width * 0.5;
    let hh = height * 0.5;
    MeshData {
        vertices: vec![
            Vertex::new(Vec3::new(-hw, -hh, 0.0), Vec3::Z),
            Vertex::new(Vec3::new(hw, -hh, 0.0), Vec3::Z),
            Vertex::new(Vec3::new(hw, hh, 0.0), Vec3::Z),
            Vertex::new(Vec3::new(-hw, hh, 0.0), Vec3::Z),
        ],
        indices: vec![0, 1, 2, 0, 2, 3],
    }
}
