use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use glam::Vec3;

use crate::mesh::{MeshData, Vertex};

/// Parses a Wavefront OBJ model from memory.
///
/// Polygons are fan-triangulated. Vertices sharing a position/normal pair are
/// deduplicated; texture coordinates are ignored. Missing normals are
/// generated from the faces.
pub fn parse_obj(data: &str) -> Result<MeshData> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut triangles: Vec<[Corner; 3]> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts).with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "vn" => normals.push(
                parse_vec3(parts).with_context(|| format!("invalid normal on line {}", line_no + 1))?,
            ),
            "f" => {
                let polygon =
                    parse_face(parts).with_context(|| format!("invalid face on line {}", line_no + 1))?;
                for i in 1..polygon.len() - 1 {
                    triangles.push([polygon[0], polygon[i], polygon[i + 1]]);
                }
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("model does not define any vertices"));
    }
    if triangles.is_empty() {
        return Err(anyhow!("model does not define any faces"));
    }

    let mut mesh = MeshData::default();
    let mut lookup: HashMap<(usize, Option<usize>), u32> = HashMap::new();
    let mut missing_normals = false;

    for corner in triangles.iter().flatten() {
        let position = resolve_index(corner.position, positions.len())
            .ok_or_else(|| anyhow!("vertex index {} out of range", corner.position))?;
        let normal = corner
            .normal
            .and_then(|index| resolve_index(index, normals.len()));
        missing_normals |= normal.is_none();

        let index = *lookup.entry((position, normal)).or_insert_with(|| {
            mesh.vertices.push(Vertex::new(
                positions[position],
                normal.map(|i| normals[i]).unwrap_or(Vec3::ZERO),
            ));
            (mesh.vertices.len() - 1) as u32
        });
        mesh.indices.push(index);
    }

    if missing_normals {
        mesh.compute_normals();
    }
    Ok(mesh)
}

#[derive(Debug, Clone, Copy)]
struct Corner {
    position: i64,
    normal: Option<i64>,
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut component = || -> Result<f32> {
        Ok(parts
            .next()
            .ok_or_else(|| anyhow!("missing vector component"))?
            .parse::<f32>()?)
    };
    Ok(Vec3::new(component()?, component()?, component()?))
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<Corner>> {
    let mut corners = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let position = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i64>()?;
        let normal = segments
            .nth(1)
            .filter(|segment| !segment.is_empty())
            .map(str::parse::<i64>)
            .transpose()?;
        corners.push(Corner { position, normal });
    }
    if corners.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(corners)
}

/// Converts a one-based (or negative, relative) OBJ index to a zero-based one.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    match index {
        i if i > 0 => {
            let zero_based = (i - 1) as usize;
            (zero_based < len).then_some(zero_based)
        }
        i if i < 0 => {
            let back = i.unsigned_abs() as usize;
            (back <= len).then(|| len - back)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_is_fan_triangulated() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let mesh = parse_obj(obj).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn explicit_normals_are_kept() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 -1\nf 1//1 2//1 3//1\n";
        let mesh = parse_obj(obj).unwrap();
        assert!(mesh.vertices.iter().all(|v| v.normal == [0.0, 0.0, -1.0]));
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = parse_obj(obj).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        let normal = Vec3::from(mesh.vertices[0].normal);
        assert!((normal.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        assert!(parse_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n").is_err());
    }

    #[test]
    fn empty_model_is_an_error() {
        assert!(parse_obj("# nothing here\n").is_err());
    }
}
