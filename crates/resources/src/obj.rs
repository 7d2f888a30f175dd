//! Wavefront OBJ loading.
//!
//! Faces are triangulated by `tobj`. Vertices are deduplicated on the pair
//! (position index, texcoord index), so two corners sharing both become a
//! single vertex. Texture V is flipped to match Vulkan's top-left origin and
//! every vertex is white.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use glam::{Vec2, Vec3};
use inflight_rhi::vertex::Vertex;
use tracing::{debug, info};

use crate::error::{ResourceError, ResourceResult};
use crate::mesh::MeshData;

fn load_options() -> tobj::LoadOptions {
    tobj::LoadOptions {
        triangulate: true,
        single_index: false,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    }
}

/// Loads an OBJ file into a single mesh. Materials are ignored.
///
/// # Errors
///
/// Returns an error if the file is missing, fails to parse, or yields no
/// triangles.
pub fn load_obj(path: &Path) -> ResourceResult<MeshData> {
    if !path.exists() {
        return Err(ResourceError::FileNotFound(path.to_path_buf()));
    }

    let mut reader = BufReader::new(File::open(path)?);
    let mesh = load_obj_from_reader(&mut reader).map_err(|e| match e {
        ResourceError::ObjLoad { source, .. } => ResourceError::ObjLoad {
            path: path.to_path_buf(),
            source,
        },
        ResourceError::EmptyMesh(_) => ResourceError::EmptyMesh(path.display().to_string()),
        other => other,
    })?;

    info!(
        "Loaded {}: {} vertices, {} triangles",
        path.display(),
        mesh.vertices.len(),
        mesh.triangle_count()
    );

    Ok(mesh)
}

/// Parses OBJ text from `reader`.
///
/// # Errors
///
/// Returns an error if parsing fails or the result is not drawable.
pub fn load_obj_from_reader<R: BufRead>(reader: &mut R) -> ResourceResult<MeshData> {
    let (models, _materials) = tobj::load_obj_buf(reader, &load_options(), |_| {
        Ok(Default::default())
    })
    .map_err(|source| ResourceError::ObjLoad {
        path: Default::default(),
        source,
    })?;

    let mesh = mesh_from_models(&models);
    mesh.validate("obj")?;
    Ok(mesh)
}

/// Flattens every model into one deduplicated mesh.
pub fn mesh_from_models(models: &[tobj::Model]) -> MeshData {
    let mut mesh = MeshData::default();

    for model in models {
        let source = &model.mesh;
        let has_texcoords = source.texcoord_indices.len() == source.indices.len();

        // Keys are per model: indices restart in every object group
        let mut unique: HashMap<(u32, Option<u32>), u32> = HashMap::new();

        for (corner, &position_index) in source.indices.iter().enumerate() {
            let texcoord_index = has_texcoords.then(|| source.texcoord_indices[corner]);

            let index = *unique
                .entry((position_index, texcoord_index))
                .or_insert_with(|| {
                    let p = 3 * position_index as usize;
                    let position = Vec3::new(
                        source.positions[p],
                        source.positions[p + 1],
                        source.positions[p + 2],
                    );

                    let tex_coord = texcoord_index
                        .map(|t| {
                            let t = 2 * t as usize;
                            Vec2::new(source.texcoords[t], 1.0 - source.texcoords[t + 1])
                        })
                        .unwrap_or(Vec2::ZERO);

                    mesh.vertices.push(Vertex::new(position, Vec3::ONE, tex_coord));
                    (mesh.vertices.len() - 1) as u32
                });

            mesh.indices.push(index);
        }

        debug!("OBJ object '{}': {} corners", model.name, source.indices.len());
    }

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SQUARE: &str = "\
o square
v -1.0 -1.0 0.0
v  1.0 -1.0 0.0
v  1.0  1.0 0.0
v -1.0  1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
f 1/1 2/2 3/3 4/4
";

    #[test]
    fn test_quad_face_is_triangulated_and_deduplicated() {
        let mesh = load_obj_from_reader(&mut Cursor::new(SQUARE)).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_texcoord_v_is_flipped() {
        let mesh = load_obj_from_reader(&mut Cursor::new(SQUARE)).unwrap();
        let first = mesh.vertices[mesh.indices[0] as usize];
        assert_eq!(first.position, Vec3::new(-1.0, -1.0, 0.0));
        assert_eq!(first.tex_coord, Vec2::new(0.0, 1.0));
        assert_eq!(first.color, Vec3::ONE);
    }

    #[test]
    fn test_same_position_different_uv_splits() {
        let obj = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 0.0 1.0
vt 0.5 0.5
f 1/1 2/2 3/3
f 1/4 3/3 2/2
";
        let mesh = load_obj_from_reader(&mut Cursor::new(obj)).unwrap();
        // Position 1 appears with two texcoords, the others are shared
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
    }

    #[test]
    fn test_missing_texcoords_default_to_zero() {
        let obj = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
f 1 2 3
";
        let mesh = load_obj_from_reader(&mut Cursor::new(obj)).unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert!(mesh.vertices.iter().all(|v| v.tex_coord == Vec2::ZERO));
    }

    #[test]
    fn test_file_without_faces_is_empty() {
        let result = load_obj_from_reader(&mut Cursor::new("v 0.0 0.0 0.0\n"));
        assert!(matches!(result, Err(ResourceError::EmptyMesh(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = load_obj(Path::new("no/such/model.obj"));
        assert!(matches!(result, Err(ResourceError::FileNotFound(_))));
    }
}
