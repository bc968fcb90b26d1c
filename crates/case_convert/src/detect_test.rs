use std::io::Write;

use super::*;

#[test]
fn test_mode_detection_priority() {
  let dir = tempfile::tempdir().unwrap();
  assert_eq!(detect_mode(dir.path()), VendorMode::None);

  std::fs::write(dir.path().join("case.modelInfo"), b"<ModelInfo/>").unwrap();
  assert_eq!(detect_mode(dir.path()), VendorMode::Exo);

  // An order file outranks the exo pair
  std::fs::write(dir.path().join("order.3ox"), b"<Order/>").unwrap();
  assert_eq!(detect_mode(dir.path()), VendorMode::Shape);
}

#[test]
fn test_mode_detection_xml_spellings() {
  let dir = tempfile::tempdir().unwrap();
  std::fs::write(dir.path().join("Job_constructionInfo.xml"), b"<C/>").unwrap();
  assert_eq!(detect_mode(dir.path()), VendorMode::Exo);
}

fn write_zip(path: &std::path::Path, entries: &[(&str, &[u8])]) {
  let file = std::fs::File::create(path).unwrap();
  let mut writer = zip::ZipWriter::new(file);
  let options = zip::write::SimpleFileOptions::default();
  for (name, data) in entries {
    writer.start_file(*name, options).unwrap();
    writer.write_all(data).unwrap();
  }
  writer.finish().unwrap();
}

#[test]
fn test_zip_expansion_mirrors_basename() {
  let case = tempfile::tempdir().unwrap();
  let scratch = tempfile::tempdir().unwrap();
  write_zip(
    &case.path().join("case.zip"),
    &[("inner.constructionInfo", b"<C/>"), ("scan.stl", b"x")],
  );

  let roots = expand_zips(case.path(), scratch.path());
  assert_eq!(roots.len(), 1);
  assert_eq!(roots[0].file_name().unwrap(), "case");
  assert!(roots[0].join("inner.constructionInfo").is_file());
  assert!(roots[0].join("scan.stl").is_file());
}

#[test]
fn test_zip_expansion_skips_bad_archives() {
  let case = tempfile::tempdir().unwrap();
  let scratch = tempfile::tempdir().unwrap();
  std::fs::write(case.path().join("broken.zip"), b"this is not a zip").unwrap();
  write_zip(&case.path().join("good.zip"), &[("a.txt", b"a")]);

  let roots = expand_zips(case.path(), scratch.path());
  assert_eq!(roots.len(), 1);
  assert_eq!(roots[0].file_name().unwrap(), "good");
}

#[test]
fn test_case_candidates_include_original_folder() {
  let case = tempfile::tempdir().unwrap();
  let scratch = tempfile::tempdir().unwrap();
  write_zip(&case.path().join("case.zip"), &[("a.txt", b"a")]);

  let candidates = case_candidates(case.path(), scratch.path());
  assert_eq!(candidates.len(), 2);
  assert_eq!(candidates[0], case.path());
}

#[test]
fn test_duplicate_zip_stems_get_unique_roots() {
  let case = tempfile::tempdir().unwrap();
  let scratch = tempfile::tempdir().unwrap();
  write_zip(&case.path().join("case.zip"), &[("a.txt", b"a")]);

  let first = expand_zips(case.path(), scratch.path());
  let second = expand_zips(case.path(), scratch.path());
  assert_ne!(first[0], second[0]);
  assert_eq!(second[0].file_name().unwrap(), "case_1");
}
