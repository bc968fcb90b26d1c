use glam::DVec3;

use super::*;
use crate::mesh::stl;

/// Axis-aligned closed box centered at `center`.
fn cube(center: DVec3, half: f64) -> TriMesh {
  let mut mesh = TriMesh::new();
  for dz in [-1.0, 1.0] {
    for dy in [-1.0, 1.0] {
      for dx in [-1.0, 1.0] {
        mesh
          .positions
          .push(center + DVec3::new(dx, dy, dz) * half);
      }
    }
  }
  // 12 triangles, outward winding
  const FACES: [[u32; 3]; 12] = [
    [0, 2, 1], [1, 2, 3], // -z
    [4, 5, 6], [5, 7, 6], // +z
    [0, 1, 4], [1, 5, 4], // -y
    [2, 6, 3], [3, 6, 7], // +y
    [0, 4, 2], [2, 4, 6], // -x
    [1, 3, 5], [3, 7, 5], // +x
  ];
  mesh.indices.extend_from_slice(&FACES);
  mesh
}

#[test]
fn test_overlapping_cubes_have_contact() {
  let a = cube(DVec3::ZERO, 1.0);
  let b = cube(DVec3::new(0.5, 0.0, 0.0), 1.0);

  let contact = intersect_meshes(&a, &b, 0.01);
  assert!(!contact.is_empty());
}

#[test]
fn test_disjoint_cubes_have_no_contact() {
  let a = cube(DVec3::ZERO, 1.0);
  let b = cube(DVec3::new(10.0, 0.0, 0.0), 1.0);

  let contact = intersect_meshes(&a, &b, 0.01);
  assert!(contact.is_empty());
}

#[test]
fn test_tolerance_counts_near_surfaces() {
  let a = cube(DVec3::ZERO, 1.0);
  // Face-to-face gap of 0.005, inside the 0.01 tolerance
  let b = cube(DVec3::new(2.005, 0.0, 0.0), 1.0);

  let near = intersect_meshes(&a, &b, 0.01);
  assert!(!near.is_empty());

  let strict = intersect_meshes(&a, &b, 0.001);
  assert!(strict.is_empty());
}

#[test]
fn test_intersect_writes_bite_stl() {
  let dir = tempfile::tempdir().unwrap();
  let a_path = dir.path().join("upper.stl");
  let b_path = dir.path().join("lower.stl");
  std::fs::write(&a_path, stl::write(&cube(DVec3::ZERO, 1.0))).unwrap();
  std::fs::write(
    &b_path,
    stl::write(&cube(DVec3::new(0.0, 0.0, 0.8), 1.0)),
  )
  .unwrap();

  let out = intersect(
    std::slice::from_ref(&a_path),
    std::slice::from_ref(&b_path),
    dir.path(),
    0.01,
  )
  .expect("overlapping cubes must produce a bite");
  assert_eq!(out.file_name().unwrap(), BITE_FILENAME);

  let written = stl::read(&std::fs::read(&out).unwrap()).unwrap();
  assert!(!written.is_empty());
}

#[test]
fn test_intersect_none_for_disjoint_files() {
  let dir = tempfile::tempdir().unwrap();
  let a_path = dir.path().join("upper.stl");
  let b_path = dir.path().join("lower.stl");
  std::fs::write(&a_path, stl::write(&cube(DVec3::ZERO, 1.0))).unwrap();
  std::fs::write(
    &b_path,
    stl::write(&cube(DVec3::new(50.0, 0.0, 0.0), 1.0)),
  )
  .unwrap();

  assert!(intersect(
    std::slice::from_ref(&a_path),
    std::slice::from_ref(&b_path),
    dir.path(),
    0.01,
  )
  .is_none());
}
