use glam::DVec3;

use super::*;
use crate::mesh::TriMesh;

fn cube(center: DVec3, half: f64) -> TriMesh {
  let mut mesh = TriMesh::new();
  for dz in [-1.0, 1.0] {
    for dy in [-1.0, 1.0] {
      for dx in [-1.0, 1.0] {
        mesh.positions.push(center + DVec3::new(dx, dy, dz) * half);
      }
    }
  }
  const FACES: [[u32; 3]; 12] = [
    [0, 2, 1], [1, 2, 3],
    [4, 5, 6], [5, 7, 6],
    [0, 1, 4], [1, 5, 4],
    [2, 6, 3], [3, 6, 7],
    [0, 4, 2], [2, 4, 6],
    [1, 3, 5], [3, 7, 5],
  ];
  mesh.indices.extend_from_slice(&FACES);
  mesh
}

fn no_reduction(request: &mut ConvertRequest) {
  request.target_reduction = 0.0;
}

#[test]
fn test_exo_case_end_to_end_with_bite() {
  let case = tempfile::tempdir().unwrap();
  let upper = case.path().join("2025-07-24-upperjaw.ply");
  let lower = case.path().join("2025-07-24-lowerjaw.ply");
  crate::mesh::write_mesh(&upper, &cube(DVec3::new(0.0, 0.0, 0.5), 1.0)).unwrap();
  crate::mesh::write_mesh(&lower, &cube(DVec3::new(0.0, 0.0, -0.5), 1.0)).unwrap();

  let identity = "1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1";
  std::fs::write(
    case.path().join("case.constructionInfo"),
    format!(
      "<ConstructionInfo><MatrixToScanDataFiles>{identity}</MatrixToScanDataFiles></ConstructionInfo>"
    ),
  )
  .unwrap();

  let out_html = case.path().join("case.html");
  let mut request = ConvertRequest::new(
    vec![upper, lower],
    out_html.clone(),
    case.path().to_path_buf(),
    VendorMode::Exo,
  );
  no_reduction(&mut request);

  let mut percents: Vec<f32> = Vec::new();
  let outcome = convert_case(&request, |p, _| percents.push(p)).unwrap();

  assert!(out_html.is_file());
  assert!(outcome.bite_written);
  assert_eq!(outcome.model_count, 3);

  let html = std::fs::read_to_string(&out_html).unwrap();
  let upper_at = html.find("group:'upper_scan'").expect("upper scan entry");
  let lower_at = html.find("group:'lower_scan'").expect("lower scan entry");
  let bite_at = html.find("group:'bite'").expect("bite entry");
  // Enumeration order preserved, bite appended last
  assert!(upper_at < lower_at && lower_at < bite_at);
  assert!(html.contains("displayName:'BITE'"));

  // Marker exists only because the HTML write succeeded
  assert!(case.path().join(MARKER_FILENAME).is_file());

  // Progress is monotonic non-decreasing
  assert!(percents.windows(2).all(|w| w[0] <= w[1]));
  assert_eq!(percents.last().copied(), Some(100.0));
}

#[test]
fn test_shape_case_single_crown_no_bite() {
  let case = tempfile::tempdir().unwrap();
  std::fs::write(
    case.path().join("order.3ox"),
    r#"<Order xmlns="http://www.3shape.com/order">
      <ThreeShapeOrderNo>ORD1</ThreeShapeOrderNo>
      <ModelElement displayName="크라운 11-13">
        <ModelElementIndex>1</ModelElementIndex>
      </ModelElement>
    </Order>"#,
  )
  .unwrap();
  let mesh_path = case.path().join("ORD1_1.stl");
  crate::mesh::write_mesh(&mesh_path, &cube(DVec3::ZERO, 1.0)).unwrap();

  let out_html = case.path().join("case.html");
  let mut request = ConvertRequest::new(
    vec![mesh_path],
    out_html.clone(),
    case.path().to_path_buf(),
    VendorMode::Shape,
  );
  no_reduction(&mut request);

  let outcome = convert_case(&request, |_, _| {}).unwrap();
  assert!(!outcome.bite_written);
  assert_eq!(outcome.model_count, 1);

  let html = std::fs::read_to_string(&out_html).unwrap();
  assert!(html.contains("group:'upper_crownbridge'"));
  assert!(html.contains("displayName:'크라운 11-13'"));
  assert!(!html.contains("group:'bite'"));
}

#[test]
fn test_group_override_wins_over_vendor_maps() {
  let case = tempfile::tempdir().unwrap();
  let mesh_path = case.path().join("whatever.stl");
  crate::mesh::write_mesh(&mesh_path, &cube(DVec3::ZERO, 1.0)).unwrap();

  let mut override_map = GroupMap::new();
  override_map.insert("whatever.stl", GroupLabel::LowerAbutment);

  let out_html = case.path().join("case.html");
  let mut request = ConvertRequest::new(
    vec![mesh_path],
    out_html.clone(),
    case.path().to_path_buf(),
    VendorMode::None,
  );
  request.group_override = Some(override_map);
  no_reduction(&mut request);

  convert_case(&request, |_, _| {}).unwrap();
  let html = std::fs::read_to_string(&out_html).unwrap();
  assert!(html.contains("group:'lower_abutment'"));
}

#[test]
fn test_failed_mesh_is_skipped_not_fatal() {
  let case = tempfile::tempdir().unwrap();
  let good = case.path().join("upperjaw_scan.stl");
  let bad = case.path().join("lowerjaw_scan.stl");
  crate::mesh::write_mesh(&good, &cube(DVec3::ZERO, 1.0)).unwrap();
  std::fs::write(&bad, b"garbage").unwrap();

  let out_html = case.path().join("case.html");
  let mut request = ConvertRequest::new(
    vec![good, bad],
    out_html.clone(),
    case.path().to_path_buf(),
    VendorMode::None,
  );
  no_reduction(&mut request);

  let outcome = convert_case(&request, |_, _| {}).unwrap();
  assert_eq!(outcome.model_count, 1);
  assert!(out_html.is_file());
}
