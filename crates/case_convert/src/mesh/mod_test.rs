use glam::{DMat4, DVec3};

use super::*;

fn quad() -> TriMesh {
  TriMesh {
    positions: vec![
      DVec3::new(0.0, 0.0, 0.0),
      DVec3::new(1.0, 0.0, 0.0),
      DVec3::new(1.0, 1.0, 0.0),
      DVec3::new(0.0, 1.0, 0.0),
    ],
    indices: vec![[0, 1, 2], [0, 2, 3]],
  }
}

#[test]
fn test_stl_binary_roundtrip() {
  let mesh = quad();
  let bytes = stl::write(&mesh);
  let back = stl::read(&bytes).unwrap();

  // STL is a soup: 2 triangles, 6 raw vertices; welding restores 4
  assert_eq!(back.triangle_count(), 2);
  assert_eq!(back.vertex_count(), 6);
  assert_eq!(back.weld().vertex_count(), 4);
}

#[test]
fn test_stl_ascii_read() {
  let text = "\
solid quad
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 1 1 0
    endloop
  endfacet
endsolid quad
";
  let mesh = stl::read(text.as_bytes()).unwrap();
  assert_eq!(mesh.triangle_count(), 1);
  assert_eq!(mesh.positions[2], DVec3::new(1.0, 1.0, 0.0));
}

#[test]
fn test_ply_binary_roundtrip() {
  let mesh = quad();
  let bytes = ply::write(&mesh);
  let back = ply::read(&bytes).unwrap();

  assert_eq!(back.vertex_count(), 4);
  assert_eq!(back.triangle_count(), 2);
  assert_eq!(back.positions[3], DVec3::new(0.0, 1.0, 0.0));
}

#[test]
fn test_ply_ascii_with_extra_properties() {
  let text = "\
ply
format ascii 1.0
comment exported scan
element vertex 3
property float x
property float y
property float z
property uchar red
property uchar green
property uchar blue
element face 1
property list uchar int vertex_indices
end_header
0 0 0 255 0 0
1 0 0 0 255 0
0 1 0 0 0 255
3 0 1 2
";
  let mesh = ply::read(text.as_bytes()).unwrap();
  assert_eq!(mesh.vertex_count(), 3);
  assert_eq!(mesh.triangle_count(), 1);
  assert_eq!(mesh.positions[1], DVec3::new(1.0, 0.0, 0.0));
}

#[test]
fn test_ply_quad_faces_are_fanned() {
  let text = "\
ply
format ascii 1.0
element vertex 4
property float x
property float y
property float z
element face 1
property list uchar int vertex_indices
end_header
0 0 0
1 0 0
1 1 0
0 1 0
4 0 1 2 3
";
  let mesh = ply::read(text.as_bytes()).unwrap();
  assert_eq!(mesh.triangle_count(), 2);
}

#[test]
fn test_weld_merges_coincident_vertices() {
  let mut soup = TriMesh::new();
  soup.positions = vec![
    DVec3::new(0.0, 0.0, 0.0),
    DVec3::new(1.0, 0.0, 0.0),
    DVec3::new(0.0, 1.0, 0.0),
    DVec3::new(1.0, 0.0, 0.0), // duplicate of 1
    DVec3::new(0.0, 1.0, 0.0), // duplicate of 2
    DVec3::new(1.0, 1.0, 0.0),
  ];
  soup.indices = vec![[0, 1, 2], [3, 5, 4]];

  let welded = soup.weld();
  assert_eq!(welded.vertex_count(), 4);
  assert_eq!(welded.triangle_count(), 2);
}

#[test]
fn test_weld_drops_degenerate_triangles() {
  let mut soup = TriMesh::new();
  soup.positions = vec![
    DVec3::new(0.0, 0.0, 0.0),
    DVec3::new(0.0, 0.0, 0.0),
    DVec3::new(1.0, 0.0, 0.0),
  ];
  soup.indices = vec![[0, 1, 2]];
  assert!(soup.weld().is_empty());
}

#[test]
fn test_transform_applies_affine() {
  let mut mesh = quad();
  let m = DMat4::from_translation(DVec3::new(10.0, 0.0, 0.0));
  mesh.transform(&m);
  assert_eq!(mesh.positions[0], DVec3::new(10.0, 0.0, 0.0));
}

#[test]
fn test_reduce_preserves_name_and_format() {
  let dir = tempfile::tempdir().unwrap();
  let src = dir.path().join("scan_mesh.stl");

  // A grid fine enough to leave room for reduction
  let mut mesh = TriMesh::new();
  let n = 12usize;
  for y in 0..=n {
    for x in 0..=n {
      mesh
        .positions
        .push(DVec3::new(x as f64, y as f64, ((x + y) % 3) as f64 * 0.01));
    }
  }
  let idx = |x: usize, y: usize| (y * (n + 1) + x) as u32;
  for y in 0..n {
    for x in 0..n {
      mesh.indices.push([idx(x, y), idx(x + 1, y), idx(x + 1, y + 1)]);
      mesh.indices.push([idx(x, y), idx(x + 1, y + 1), idx(x, y + 1)]);
    }
  }
  write_mesh(&src, &mesh).unwrap();

  let out_dir = dir.path().join("reduced");
  std::fs::create_dir_all(&out_dir).unwrap();
  let out = reduce(&src, &out_dir, 0.875).unwrap();

  assert_eq!(out.file_name().unwrap(), "scan_mesh.stl");
  let reduced = read_mesh(&out).unwrap();
  assert!(reduced.triangle_count() < mesh.triangle_count());
}

#[test]
fn test_merge_files_skips_unreadable() {
  let dir = tempfile::tempdir().unwrap();
  let good = dir.path().join("good.stl");
  let bad = dir.path().join("bad.stl");
  write_mesh(&good, &quad()).unwrap();
  std::fs::write(&bad, b"not a mesh").unwrap();

  let merged = merge_files(&[good, bad]).unwrap();
  assert_eq!(merged.triangle_count(), 2);

  assert!(merge_files(&[]).is_none());
}

#[test]
fn test_encode_compact_is_glb() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("mesh.ply");
  write_mesh(&path, &quad()).unwrap();

  let glb = encode_compact(&path).unwrap();
  assert_eq!(&glb[0..4], b"glTF");
}
