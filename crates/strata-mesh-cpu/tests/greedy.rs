use std::sync::Arc;

use strata_blocks::{AssetPaths, BlockModelCompiler, Face};
use strata_chunk::{CHUNK_SIZE, Chunk, ChunkId};
use strata_mesh_cpu::{GreedyMesher, Mesh};

fn load_mesher() -> GreedyMesher {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let assets = AssetPaths::new(root.join("../../assets"));
    GreedyMesher::new(Arc::new(BlockModelCompiler::load(&assets).unwrap()))
}

fn id(mesher: &GreedyMesher, name: &str) -> u8 {
    mesher.compiler().registry().require_id(name).unwrap() as u8
}

fn faces(mesh: &Mesh) -> usize {
    mesh.indices.len() / 6
}

fn vertex(mesh: &Mesh, i: u32) -> [f32; 3] {
    let i = i as usize * 3;
    [mesh.vertices[i], mesh.vertices[i + 1], mesh.vertices[i + 2]]
}

fn ccw_everywhere(mesh: &Mesh) -> bool {
    mesh.indices.chunks(3).all(|t| {
        let [a, b, c] = [vertex(mesh, t[0]), vertex(mesh, t[1]), vertex(mesh, t[2])];
        let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        let cross = [
            ab[1] * ac[2] - ab[2] * ac[1],
            ab[2] * ac[0] - ab[0] * ac[2],
            ab[0] * ac[1] - ab[1] * ac[0],
        ];
        let n = t[0] as usize * 3;
        let normal = &mesh.normals[n..n + 3];
        cross[0] * normal[0] + cross[1] * normal[1] + cross[2] * normal[2] > 0.0
    })
}

#[test]
fn empty_chunk_has_no_geometry() {
    let mesher = load_mesher();
    let mesh = mesher.generate(&Chunk::new(ChunkId::ORIGIN), 1).unwrap();
    assert!(mesh.is_empty());
    assert_eq!(mesh.vertex_count(), 0);
}

#[test]
fn isolated_voxel_emits_six_faces() {
    let mesher = load_mesher();
    let chunk = Chunk::new(ChunkId::ORIGIN);
    chunk.set_block(id(&mesher, "stone"), 5, 6, 7);
    let mesh = mesher.generate(&chunk, 1).unwrap();
    assert_eq!(faces(&mesh), 6);
    assert_eq!(mesh.vertex_count(), 24);
    assert_eq!(mesh.triangle_count(), 12);
    assert_eq!(mesh.normals.len(), 72);
    assert_eq!(mesh.uvs.len(), 48);
    assert!(ccw_everywhere(&mesh));
    for v in mesh.vertices.chunks(3) {
        assert!((5.0..=6.0).contains(&v[0]));
        assert!((6.0..=7.0).contains(&v[1]));
        assert!((7.0..=8.0).contains(&v[2]));
    }
}

#[test]
fn full_chunk_only_emits_its_shell() {
    let mesher = load_mesher();
    let stone = id(&mesher, "stone");
    let chunk = Chunk::new(ChunkId::ORIGIN);
    for y in 0..CHUNK_SIZE {
        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                chunk.set_block(stone, x, y, z);
            }
        }
    }
    let mesh = mesher.generate(&chunk, 1).unwrap();
    let n = CHUNK_SIZE as usize;
    assert_eq!(faces(&mesh), 6 * n * n);
    let edge = CHUNK_SIZE as f32;
    for t in mesh.indices.chunks(6) {
        // every face of the shell lies on a chunk boundary plane
        let on_boundary = (0..3).any(|axis| {
            t.iter()
                .map(|&i| vertex(&mesh, i)[axis])
                .all(|c| c == 0.0 || c == edge)
                && {
                    let first = vertex(&mesh, t[0])[axis];
                    t.iter().all(|&i| vertex(&mesh, i)[axis] == first)
                }
        });
        assert!(on_boundary);
    }
    assert!(ccw_everywhere(&mesh));
}

#[test]
fn adjacent_voxels_hide_shared_faces() {
    let mesher = load_mesher();
    let stone = id(&mesher, "stone");
    let chunk = Chunk::new(ChunkId::ORIGIN);
    chunk.set_block(stone, 3, 3, 3);
    chunk.set_block(stone, 4, 3, 3);
    let mesh = mesher.generate(&chunk, 1).unwrap();
    assert_eq!(faces(&mesh), 10);
}

#[test]
fn culling_follows_the_neighbours_cull_set() {
    let mesher = load_mesher();
    let chunk = Chunk::new(ChunkId::ORIGIN);
    chunk.set_block(id(&mesher, "stone"), 3, 3, 3);
    chunk.set_block(id(&mesher, "leaves"), 4, 3, 3);
    // leaves cull nothing, stone culls everything
    let mesh = mesher.generate(&chunk, 1).unwrap();
    assert_eq!(faces(&mesh), 6 + 5);
}

#[test]
fn slab_only_hides_the_face_resting_on_it() {
    let mesher = load_mesher();
    let stone = id(&mesher, "stone");
    let slab = id(&mesher, "stone_slab");
    let slab_faces = mesher.compiler().fragment(slab as u16).unwrap().indices.len() / 6;

    let below = Chunk::new(ChunkId::ORIGIN);
    below.set_block(slab, 2, 2, 2);
    below.set_block(stone, 2, 3, 2);
    assert_eq!(faces(&mesher.generate(&below, 1).unwrap()), slab_faces + 6);

    let above = Chunk::new(ChunkId::ORIGIN);
    above.set_block(stone, 2, 2, 2);
    above.set_block(slab, 2, 3, 2);
    assert_eq!(faces(&mesher.generate(&above, 1).unwrap()), slab_faces + 5);
}

#[test]
fn non_cube_fragments_are_spliced_with_remapped_indices() {
    let mesher = load_mesher();
    let grass = id(&mesher, "tall_grass");
    let fragment = mesher.compiler().fragment(grass as u16).unwrap();
    let chunk = Chunk::new(ChunkId::ORIGIN);
    chunk.set_block(id(&mesher, "stone"), 0, 0, 0);
    chunk.set_block(grass, 1, 0, 0);
    let mesh = mesher.generate(&chunk, 1).unwrap();
    assert_eq!(mesh.vertex_count(), 24 + fragment.vertex_count());
    let tail = &mesh.indices[36..];
    assert_eq!(tail.len(), fragment.indices.len());
    for (out, src) in tail.iter().zip(&fragment.indices) {
        assert_eq!(*out, src + 24);
    }
    for (out, src) in mesh.vertices[72..].chunks(3).zip(fragment.vertices.chunks(3)) {
        assert_eq!(out[0], src[0] + 1.0);
        assert_eq!(out[1], src[1]);
        assert_eq!(out[2], src[2]);
    }
}

#[test]
fn face_uvs_come_from_the_fragment_table() {
    let mesher = load_mesher();
    let grass = id(&mesher, "grass_block");
    let fragment = mesher.compiler().fragment(grass as u16).unwrap();
    let chunk = Chunk::new(ChunkId::ORIGIN);
    chunk.set_block(grass, 8, 8, 8);
    let mesh = mesher.generate(&chunk, 1).unwrap();
    for (i, face) in Face::ALL.into_iter().enumerate() {
        assert_eq!(&mesh.uvs[i * 8..i * 8 + 8], fragment.face(face).unwrap().uvs);
        assert_eq!(&mesh.normals[i * 12..i * 12 + 3], &face.normal().to_array());
    }
}

#[test]
fn coarse_resolution_scales_samples() {
    let mesher = load_mesher();
    let stone = id(&mesher, "stone");
    let chunk = Chunk::new(ChunkId::ORIGIN);
    for y in 0..CHUNK_SIZE {
        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                chunk.set_block(stone, x, y, z);
            }
        }
    }
    let mesh = mesher.generate(&chunk, 2).unwrap();
    let n = (CHUNK_SIZE / 2) as usize;
    assert_eq!(faces(&mesh), 6 * n * n);
    assert!(mesh.vertices.iter().all(|c| (0.0..=CHUNK_SIZE as f32).contains(c)));
    assert_eq!(mesher.generate(&chunk, 0).unwrap(), mesher.generate(&chunk, 1).unwrap());
}

proptest::proptest! {
    #![proptest_config(proptest::prelude::ProptestConfig::with_cases(32))]

    #[test]
    fn lone_stone_is_a_closed_box_anywhere(x in 0..CHUNK_SIZE, y in 0..CHUNK_SIZE, z in 0..CHUNK_SIZE) {
        let mesher = load_mesher();
        let chunk = Chunk::new(ChunkId::new(1, -1, 0));
        chunk.set_block(id(&mesher, "stone"), x, y, z);
        let mesh = mesher.generate(&chunk, 1).unwrap();
        proptest::prop_assert_eq!(faces(&mesh), 6);
        proptest::prop_assert!(ccw_everywhere(&mesh));
    }
}
