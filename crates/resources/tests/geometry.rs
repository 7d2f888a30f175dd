use std::path::PathBuf;

use inflight_resources::{GeometrySource, MeshData, TextureData};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn test_cube_model_loads() {
    let mesh = GeometrySource::Model(fixture("cube.obj")).load().unwrap();

    // 6 quads become 12 triangles
    assert_eq!(mesh.triangle_count(), 12);
    assert_eq!(mesh.indices.len(), 36);

    // 24 face corners, 20 distinct (position, texcoord) pairs
    assert_eq!(mesh.vertices.len(), 20);
    assert!(mesh.validate("cube").is_ok());
}

#[test]
fn test_cube_texcoords_are_flipped_into_unit_range() {
    let mesh = GeometrySource::Model(fixture("cube.obj")).load().unwrap();
    for vertex in &mesh.vertices {
        assert!((0.0..=1.0).contains(&vertex.tex_coord.x));
        assert!((0.0..=1.0).contains(&vertex.tex_coord.y));
    }
}

#[test]
fn test_both_sources_produce_uploadable_bytes() {
    let quad = GeometrySource::StaticQuad.load().unwrap();
    let cube = GeometrySource::Model(fixture("cube.obj")).load().unwrap();

    for mesh in [&quad, &cube] {
        assert_eq!(mesh.vertex_bytes().len(), mesh.vertices.len() * 32);
        assert_eq!(mesh.index_bytes().len(), mesh.indices.len() * 4);
    }
    assert_ne!(quad, MeshData::default());
}

#[test]
fn test_texture_fallback_matches_rgba8_layout() {
    let texture = TextureData::load_or_checkerboard(None).unwrap();
    assert_eq!(
        texture.pixels.len(),
        (texture.width * texture.height * 4) as usize
    );
}
