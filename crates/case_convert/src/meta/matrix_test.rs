use glam::{DMat4, DVec3};
use roxmltree::Document;

use super::*;

fn doc(xml: &str) -> Document<'_> {
  Document::parse(xml).unwrap()
}

fn underscore_tags_for(m: &DMat4) -> String {
  // Emit column-major `_i_j` tags for a known matrix
  let cols = m.to_cols_array();
  let mut out = String::new();
  for i in 0..4 {
    for j in 0..4 {
      out.push_str(&format!("<_{i}_{j}>{}</_{i}_{j}>", cols[i * 4 + j]));
    }
  }
  out
}

fn translation(x: f64, y: f64, z: f64) -> DMat4 {
  DMat4::from_translation(DVec3::new(x, y, z))
}

fn assert_mat_eq(a: &DMat4, b: &DMat4) {
  let (a, b) = (a.to_cols_array(), b.to_cols_array());
  for i in 0..16 {
    assert!((a[i] - b[i]).abs() < 1e-9, "element {i}: {} vs {}", a[i], b[i]);
  }
}

#[test]
fn test_matrix4_encodings_agree() {
  let expected = translation(1.0, 2.0, 3.0);

  let tagged = format!("<m>{}</m>", underscore_tags_for(&expected));
  let d1 = doc(&tagged);
  let from_tags = parse_matrix4(&d1.root_element()).unwrap();

  // Row-major free text of the same matrix
  let rows = expected.transpose().to_cols_array();
  let text: Vec<String> = rows.iter().map(|v| v.to_string()).collect();
  let free = format!("<m>{}</m>", text.join(" "));
  let d2 = doc(&free);
  let from_text = parse_matrix4(&d2.root_element()).unwrap();

  assert_mat_eq(&from_tags, &expected);
  assert_mat_eq(&from_text, &expected);
}

#[test]
fn test_matrix4_m_prefix_tags() {
  let xml = "<m>\
    <m_0_0>1</m_0_0><m_0_1>0</m_0_1><m_0_2>0</m_0_2><m_0_3>0</m_0_3>\
    <m_1_0>0</m_1_0><m_1_1>1</m_1_1><m_1_2>0</m_1_2><m_1_3>0</m_1_3>\
    <m_2_0>0</m_2_0><m_2_1>0</m_2_1><m_2_2>1</m_2_2><m_2_3>0</m_2_3>\
    <m_3_0>5</m_3_0><m_3_1>6</m_3_1><m_3_2>7</m_3_2><m_3_3>1</m_3_3>\
  </m>";
  let d = doc(xml);
  let m = parse_matrix4(&d.root_element()).unwrap();
  assert_mat_eq(&m, &translation(5.0, 6.0, 7.0));
}

#[test]
fn test_matrix4_rejects_short_input() {
  let d = doc("<m>1 2 3 4 5</m>");
  assert!(parse_matrix4(&d.root_element()).is_none());
}

#[test]
fn test_vec3_encodings() {
  let d = doc("<t><_0>1</_0><_1>2</_1><_2>3</_2></t>");
  assert_eq!(parse_vec3(&d.root_element()), Some(DVec3::new(1.0, 2.0, 3.0)));

  let d = doc("<t><x>4</x><y>5</y><z>6</z></t>");
  assert_eq!(parse_vec3(&d.root_element()), Some(DVec3::new(4.0, 5.0, 6.0)));

  let d = doc("<t>7, 8, 9</t>");
  assert_eq!(parse_vec3(&d.root_element()), Some(DVec3::new(7.0, 8.0, 9.0)));

  let d = doc("<t>7 8</t>");
  assert_eq!(parse_vec3(&d.root_element()), None);
}

#[test]
fn test_compose_rt_round_trips_point() {
  let rotation = glam::DMat3::from_rotation_z(std::f64::consts::FRAC_PI_2);
  let m = compose_rt(rotation, DVec3::new(1.0, 0.0, 0.0));
  let p = m.transform_point3(DVec3::new(1.0, 0.0, 0.0));
  assert!((p - DVec3::new(1.0, 1.0, 0.0)).length() < 1e-9);
}

#[test]
fn test_safe_inverse_singular_is_identity() {
  let singular = DMat4::from_cols_array(&[0.0; 16]);
  assert_mat_eq(&safe_inverse(&singular), &DMat4::IDENTITY);

  let regular = translation(2.0, 0.0, 0.0);
  assert_mat_eq(&safe_inverse(&regular), &translation(-2.0, 0.0, 0.0));
}

#[test]
fn test_arbitrate_truth_table() {
  assert_eq!(arbitrate(true, false, "crown_11.stl"), Owner::Construction);
  assert_eq!(arbitrate(false, true, "crown_11.stl"), Owner::Model);
  assert_eq!(arbitrate(false, false, "crown_11.stl"), Owner::Neither);

  // Both matched: model components go to modelInfo, the rest to
  // constructionInfo
  assert_eq!(arbitrate(true, true, "modelgingiva_upper.stl"), Owner::Model);
  assert_eq!(arbitrate(true, true, "ModelBase_1.stl"), Owner::Model);
  assert_eq!(arbitrate(true, true, "upperjaw.ply"), Owner::Model);
  assert_eq!(arbitrate(true, true, "crown_11.stl"), Owner::Construction);
  assert_eq!(arbitrate(true, true, "scanbody_21.stl"), Owner::Construction);
}

fn construction_doc(filename: &str, matrix: &DMat4) -> String {
  format!(
    "<ConstructionInfo><ConstructionFileList><ConstructionFile>\
     <Filename>{filename}</Filename>\
     <ZRotationMatrix>{}</ZRotationMatrix>\
     </ConstructionFile></ConstructionFileList></ConstructionInfo>",
    underscore_tags_for(matrix)
  )
}

fn model_doc(filename: &str, matrix: &DMat4) -> String {
  format!(
    "<ModelInfo><Model>\
     <Filename>{filename}</Filename>\
     <TransformationMatrix>{}</TransformationMatrix>\
     </Model></ModelInfo>",
    underscore_tags_for(matrix)
  )
}

#[test]
fn test_per_file_lookup_matches_basename_case_insensitive() {
  let xml = construction_doc("Sub\\Dir\\Crown_11.stl", &translation(1.0, 0.0, 0.0));
  let d = doc(&xml);

  let hit = construction_file_match(&d, "crown_11.stl");
  assert!(hit.referenced);
  assert!(hit.matrix.is_some());

  let miss = construction_file_match(&d, "other.stl");
  assert!(!miss.referenced);
  assert!(miss.matrix.is_none());
}

#[test]
fn test_bare_reference_is_still_a_match() {
  // An entry can name the file without carrying any matrix payload
  let xml = "<ConstructionInfo><ConstructionFileList><ConstructionFile>\
     <Filename>crown_11.stl</Filename>\
     </ConstructionFile></ConstructionFileList></ConstructionInfo>";
  let d = doc(xml);

  let hit = construction_file_match(&d, "crown_11.stl");
  assert!(hit.referenced);
  assert!(hit.matrix.is_none());
}

#[test]
fn test_effective_transform_is_inverse() {
  let xml = construction_doc("crown_11.stl", &translation(3.0, 0.0, 0.0));
  let d = doc(&xml);

  let eff = effective_transform(Some(&d), None, "crown_11.stl");
  assert_mat_eq(&eff, &translation(-3.0, 0.0, 0.0));
}

#[test]
fn test_effective_transform_composes_global_and_per_file() {
  let xml = format!(
    "<ConstructionInfo>\
     <MatrixToScanDataFiles>{}</MatrixToScanDataFiles>\
     <ConstructionFileList><ConstructionFile>\
     <Filename>crown_11.stl</Filename>\
     <ZRotationMatrix>{}</ZRotationMatrix>\
     </ConstructionFile></ConstructionFileList></ConstructionInfo>",
    underscore_tags_for(&translation(0.0, 2.0, 0.0)),
    underscore_tags_for(&translation(3.0, 0.0, 0.0)),
  );
  let d = doc(&xml);

  let eff = effective_transform(Some(&d), None, "crown_11.stl");
  // inv(G) * inv(P)
  assert_mat_eq(&eff, &translation(-3.0, -2.0, 0.0));
}

#[test]
fn test_only_one_source_applies_when_both_match() {
  let ci_xml = construction_doc("modelgingiva_upper.stl", &translation(1.0, 0.0, 0.0));
  let mi_xml = model_doc("modelgingiva_upper.stl", &translation(0.0, 5.0, 0.0));
  let ci = doc(&ci_xml);
  let mi = doc(&mi_xml);

  // Model component: modelInfo wins, constructionInfo is ignored
  let eff = effective_transform(Some(&ci), Some(&mi), "modelgingiva_upper.stl");
  assert_mat_eq(&eff, &translation(0.0, -5.0, 0.0));

  // Non-model component: constructionInfo wins
  let ci_xml = construction_doc("abutment_21.stl", &translation(1.0, 0.0, 0.0));
  let mi_xml = model_doc("abutment_21.stl", &translation(0.0, 5.0, 0.0));
  let ci = doc(&ci_xml);
  let mi = doc(&mi_xml);
  let eff = effective_transform(Some(&ci), Some(&mi), "abutment_21.stl");
  assert_mat_eq(&eff, &translation(-1.0, 0.0, 0.0));
}

#[test]
fn test_unreferenced_mesh_gets_identity() {
  let xml = construction_doc("crown_11.stl", &translation(3.0, 0.0, 0.0));
  let d = doc(&xml);
  let eff = effective_transform(Some(&d), None, "unrelated.stl");
  assert_mat_eq(&eff, &DMat4::IDENTITY);
}

#[test]
fn test_bare_reference_keeps_ownership_from_other_source() {
  // constructionInfo references the crown with no matrix payload while
  // modelInfo references it with a real transform. Ownership follows the
  // reference: the crown is not a model component, so constructionInfo
  // owns it and modelInfo's transform must not be applied.
  let ci_xml = "<ConstructionInfo><ConstructionFileList><ConstructionFile>\
     <Filename>crown_11.stl</Filename>\
     </ConstructionFile></ConstructionFileList></ConstructionInfo>";
  let mi_xml = model_doc("crown_11.stl", &translation(0.0, 5.0, 0.0));
  let ci = doc(ci_xml);
  let mi = doc(&mi_xml);

  let eff = effective_transform(Some(&ci), Some(&mi), "crown_11.stl");
  assert_mat_eq(&eff, &DMat4::IDENTITY);
}

#[test]
fn test_rotation_translation_fallback() {
  let xml = "<ConstructionInfo><ConstructionFileList><ConstructionFile>\
     <Filename>scan.stl</Filename>\
     <RotationMatrix>1 0 0 0 1 0 0 0 1</RotationMatrix>\
     <Translation><x>2</x><y>0</y><z>0</z></Translation>\
     </ConstructionFile></ConstructionFileList></ConstructionInfo>";
  let d = doc(xml);
  let m = construction_file_match(&d, "scan.stl").matrix.unwrap();
  assert_mat_eq(&m, &translation(2.0, 0.0, 0.0));
}
