use super::*;

#[test]
fn test_date_strings_never_match() {
  assert!(extract_fdi("2025-07-24").is_empty());
  assert!(extract_fdi("2025-07-24-upperjaw").is_empty());
  // Every chain member is checked, even when the glued pair looks like teeth
  assert!(extract_fdi("2025-11-24").is_empty());
  assert!(extract_fdi("order 20250724").is_empty());
  // Quantities glued to digits
  assert!(extract_fdi("9999").is_empty());
}

#[test]
fn test_single_teeth() {
  assert_eq!(extract_fdi("crown 11"), vec![11]);
  assert_eq!(extract_fdi("11 21 and 36"), vec![11, 21, 36]);
  // 19, 29 etc. are not valid FDI numbers
  assert!(extract_fdi("tooth 19").is_empty());
}

#[test]
fn test_glued_letters_block_the_boundary() {
  assert!(extract_fdi("17x").is_empty());
  assert!(extract_fdi("rev17").is_empty());
  assert!(extract_fdi("tooth11번").is_empty());
  assert!(extract_fdi("case_11").is_empty());
}

#[test]
fn test_hyphen_is_a_valid_boundary() {
  // Hyphen-delimited segments are a common real filename pattern
  assert_eq!(extract_fdi("crown-42-upper"), vec![42]);
  assert_eq!(extract_fdi("scan-16.stl"), vec![16]);
}

#[test]
fn test_range_canonical_order() {
  assert_eq!(extract_fdi("11-17"), vec![11, 12, 13, 14, 15, 16, 17]);
  // Crossing the midline follows the canonical order
  assert_eq!(extract_fdi("13-23"), vec![13, 12, 11, 21, 22, 23]);
}

#[test]
fn test_reversed_range_normalized() {
  assert_eq!(extract_fdi("47-44"), vec![47, 46, 45, 44]);
  assert_eq!(extract_fdi("17-11"), vec![17, 16, 15, 14, 13, 12, 11]);
}

#[test]
fn test_chained_hyphens() {
  // The leading pair forms a range; the trailing chain member is a tooth
  // in its own right
  assert_eq!(extract_fdi("31-41-42-modelbase"), vec![31, 41, 42]);
}

#[test]
fn test_duplicates_keep_first_seen() {
  assert_eq!(extract_fdi("11 12 11-13"), vec![11, 12, 13]);
}

#[test]
fn test_extract_is_idempotent_on_own_output() {
  let teeth = extract_fdi("47-44 plus 12");
  let rendered = teeth
    .iter()
    .map(|t| t.to_string())
    .collect::<Vec<_>>()
    .join(", ");
  assert_eq!(extract_fdi(&rendered), teeth);
}

#[test]
fn test_determine_jaw() {
  assert_eq!(determine_jaw(&[]), Jaw::Mixed);
  assert_eq!(determine_jaw(&[11, 21]), Jaw::Upper);
  assert_eq!(determine_jaw(&[31, 48]), Jaw::Lower);
  assert_eq!(determine_jaw(&[11, 31]), Jaw::Mixed);
}

#[test]
fn test_infer_jaw_korean_markers() {
  assert_eq!(infer_jaw_from_string("상악 스캔"), Some(Jaw::Upper));
  assert_eq!(infer_jaw_from_string("하악 모델"), Some(Jaw::Lower));
}

#[test]
fn test_infer_jaw_english_markers() {
  assert_eq!(infer_jaw_from_string("UpperJaw.stl"), Some(Jaw::Upper));
  assert_eq!(infer_jaw_from_string("mandible-scan"), Some(Jaw::Lower));
  assert_eq!(infer_jaw_from_string("model_u.stl"), Some(Jaw::Upper));
  assert_eq!(infer_jaw_from_string("model_l.stl"), Some(Jaw::Lower));
  // `_u` must sit on a word boundary
  assert_eq!(infer_jaw_from_string("base_unit"), None);
}

#[test]
fn test_infer_jaw_falls_back_to_teeth() {
  assert_eq!(infer_jaw_from_string("crown 14-16"), Some(Jaw::Upper));
  assert_eq!(infer_jaw_from_string("34 35"), Some(Jaw::Lower));
  // Mixed teeth stay undecided
  assert_eq!(infer_jaw_from_string("11 31"), None);
  assert_eq!(infer_jaw_from_string("plain name"), None);
}
