use super::*;

#[test]
fn test_group_colors_are_stable() {
  assert_eq!(GroupLabel::UpperCrownbridge.color(), 0xFFFFF0);
  assert_eq!(GroupLabel::UpperAbutment.color(), 0xC0C0C0);
  assert_eq!(GroupLabel::UpperScan.color(), 0xF5DEB3);
  assert_eq!(GroupLabel::LowerCrownbridge.color(), 0xFFFAF0);
  assert_eq!(GroupLabel::LowerAbutment.color(), 0xA9A9A9);
  assert_eq!(GroupLabel::LowerScan.color(), 0xFFDEAD);
  assert_eq!(GroupLabel::Bite.color(), 0xFF0000);
  assert_eq!(GroupLabel::Etc.color(), 0xCCCCCC);
  assert_eq!(GroupLabel::Annotation.color(), 0xFFFF00);
}

#[test]
fn test_group_tag_roundtrip_is_unique() {
  let mut seen = std::collections::HashSet::new();
  for g in GroupLabel::ALL {
    assert!(seen.insert(g.as_str()), "duplicate tag {}", g.as_str());
  }
  assert_eq!(seen.len(), 9);
}

#[test]
fn test_jaw_category_composition() {
  assert_eq!(
    GroupLabel::from_jaw_category(Jaw::Upper, Category::Crownbridge),
    GroupLabel::UpperCrownbridge
  );
  assert_eq!(
    GroupLabel::from_jaw_category(Jaw::Lower, Category::Scan),
    GroupLabel::LowerScan
  );
  // Mixed jaw or etc category collapses to Etc
  assert_eq!(
    GroupLabel::from_jaw_category(Jaw::Mixed, Category::Crownbridge),
    GroupLabel::Etc
  );
  assert_eq!(
    GroupLabel::from_jaw_category(Jaw::Upper, Category::Etc),
    GroupLabel::Etc
  );
}

#[test]
fn test_reduced_alias() {
  assert_eq!(reduced_alias("crown.stl").as_deref(), Some("crown_reduced.stl"));
  assert_eq!(reduced_alias("scan.1.ply").as_deref(), Some("scan.1_reduced.ply"));
  assert_eq!(reduced_alias("noext"), None);
}

#[test]
fn test_group_map_aliases_and_case() {
  let mut map = GroupMap::new();
  map.insert("Crown_11.STL", GroupLabel::UpperCrownbridge);

  assert_eq!(map.get("crown_11.stl"), GroupLabel::UpperCrownbridge);
  assert_eq!(map.get("CROWN_11_reduced.stl"), GroupLabel::UpperCrownbridge);
  // Alias and base always agree
  assert_eq!(map.get("crown_11.stl"), map.get("crown_11_reduced.stl"));
  // Unknown defaults to Etc
  assert_eq!(map.get("unknown.stl"), GroupLabel::Etc);
  assert_eq!(map.get_opt("unknown.stl"), None);
}

#[test]
fn test_display_map_default_strips_extension() {
  let map = DisplayMap::new();
  assert_eq!(map.get("some_mesh.stl"), "some_mesh");
  assert_eq!(map.get("noext"), "noext");

  let mut map = DisplayMap::new();
  map.insert("ord1_1.stl", "크라운 11-13");
  assert_eq!(map.get("ORD1_1.stl"), "크라운 11-13");
  assert_eq!(map.get("ord1_1_reduced.stl"), "크라운 11-13");
}

#[test]
fn test_mesh_format_from_path() {
  use std::path::Path;
  assert_eq!(MeshFormat::from_path(Path::new("a/b.stl")), Some(MeshFormat::Stl));
  assert_eq!(MeshFormat::from_path(Path::new("a/b.PLY")), Some(MeshFormat::Ply));
  assert_eq!(MeshFormat::from_path(Path::new("a/b.obj")), None);
  assert_eq!(MeshFormat::from_path(Path::new("a/b")), None);
}
