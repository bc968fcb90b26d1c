//! Transform parsing, composition and owner arbitration for exo cases.
//!
//! All vendor matrix encodings normalize into `glam::DMat4`; inversion and
//! multiplication happen only here so the double-transform hazard (both
//! vendor files referencing one mesh) stays unit-testable as a pure
//! function.

use glam::{DMat3, DMat4, DVec3};
use roxmltree::Node;
use tracing::warn;

// =============================================================================
// Low-level encodings
// =============================================================================

fn child_value(node: &Node, name: &str) -> Option<f64> {
  node
    .children()
    .find(|c| c.is_element() && c.tag_name().name().eq_ignore_ascii_case(name))
    .and_then(|c| c.text())
    .and_then(|t| t.trim().parse().ok())
}

/// Every float in the element's own and descendant text, in order.
fn text_floats(node: &Node) -> Vec<f64> {
  let mut floats = Vec::new();
  for desc in node.descendants() {
    if let Some(text) = desc.text() {
      for token in text.split(|c: char| c.is_whitespace() || c == ',' || c == ';') {
        if let Ok(v) = token.trim().parse::<f64>() {
          floats.push(v);
        }
      }
    }
  }
  floats
}

/// Parse a 4x4 matrix from one element.
///
/// Encodings, tried in order: `_i_j` child tags (column-major), `m_i_j`
/// child tags, or any text run of at least 16 floats (row-major).
pub fn parse_matrix4(node: &Node) -> Option<DMat4> {
  for prefix in ["_", "m_"] {
    let mut vals = [0.0f64; 16];
    let mut complete = true;
    'outer: for i in 0..4 {
      for j in 0..4 {
        match child_value(node, &format!("{prefix}{i}_{j}")) {
          Some(v) => vals[i * 4 + j] = v,
          None => {
            complete = false;
            break 'outer;
          }
        }
      }
    }
    if complete {
      // Tag order is column-major: i = column, j = row
      return Some(DMat4::from_cols_array(&vals));
    }
  }

  let floats = text_floats(node);
  if floats.len() >= 16 {
    let mut vals = [0.0f64; 16];
    vals.copy_from_slice(&floats[..16]);
    return Some(DMat4::from_cols_array(&vals).transpose());
  }
  None
}

/// Parse a 3x3 rotation with the same encoding rules (9 floats minimum for
/// the free-text form).
pub fn parse_matrix3(node: &Node) -> Option<DMat3> {
  for prefix in ["_", "m_"] {
    let mut vals = [0.0f64; 9];
    let mut complete = true;
    'outer: for i in 0..3 {
      for j in 0..3 {
        match child_value(node, &format!("{prefix}{i}_{j}")) {
          Some(v) => vals[i * 3 + j] = v,
          None => {
            complete = false;
            break 'outer;
          }
        }
      }
    }
    if complete {
      return Some(DMat3::from_cols_array(&vals));
    }
  }

  let floats = text_floats(node);
  if floats.len() >= 9 {
    let mut vals = [0.0f64; 9];
    vals.copy_from_slice(&floats[..9]);
    return Some(DMat3::from_cols_array(&vals).transpose());
  }
  None
}

/// Parse a 3-vector: `_0`/`_1`/`_2` tags, `x`/`y`/`z` tags, or text with at
/// least 3 floats.
pub fn parse_vec3(node: &Node) -> Option<DVec3> {
  let tags = [["_0", "_1", "_2"], ["x", "y", "z"]];
  for set in tags {
    let parsed: Vec<f64> = set
      .iter()
      .filter_map(|t| child_value(node, t))
      .collect();
    if parsed.len() == 3 {
      return Some(DVec3::new(parsed[0], parsed[1], parsed[2]));
    }
  }

  let floats = text_floats(node);
  if floats.len() >= 3 {
    return Some(DVec3::new(floats[0], floats[1], floats[2]));
  }
  None
}

/// Build a 4x4 from rotation + translation.
pub fn compose_rt(rotation: DMat3, translation: DVec3) -> DMat4 {
  DMat4::from_cols(
    rotation.x_axis.extend(0.0),
    rotation.y_axis.extend(0.0),
    rotation.z_axis.extend(0.0),
    translation.extend(1.0),
  )
}

/// Invert for composition; singular input degrades to identity.
pub fn safe_inverse(matrix: &DMat4) -> DMat4 {
  if matrix.determinant().abs() < 1e-12 {
    warn!("singular vendor matrix, using identity");
    return DMat4::IDENTITY;
  }
  matrix.inverse()
}

// =============================================================================
// Per-mesh resolution from the two vendor documents
// =============================================================================

fn tag_is(node: &Node, name: &str) -> bool {
  node.tag_name().name().eq_ignore_ascii_case(name)
}

fn child_element<'a, 'b>(node: &Node<'a, 'b>, name: &str) -> Option<Node<'a, 'b>> {
  node
    .children()
    .find(|c| c.is_element() && tag_is(c, name))
}

/// Does this element carry a `Filename` child naming `basename`?
/// Vendor files may store relative paths, so only the final component
/// counts; comparison is case-insensitive.
fn element_names_file(node: &Node, basename: &str) -> bool {
  node
    .children()
    .filter(|c| c.is_element() && tag_is(c, "filename"))
    .filter_map(|c| c.text())
    .any(|text| {
      let name = text
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .to_lowercase();
      name == basename.to_lowercase()
    })
}

/// Per-mesh lookup result in one vendor document. A mesh can be
/// referenced without yielding a usable matrix; owner arbitration cares
/// about the reference, composition about the matrix.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileMatch {
  pub referenced: bool,
  pub matrix: Option<DMat4>,
}

/// Per-file lookup in a constructionInfo document:
/// `ConstructionFileList/ConstructionFile` whose `Filename` matches.
/// `ZRotationMatrix` wins; otherwise `RotationMatrix` + `Translation`/
/// `Offset` compose.
pub fn construction_file_match(doc: &roxmltree::Document, basename: &str) -> FileMatch {
  let Some(entry) = doc
    .descendants()
    .filter(|n| n.is_element() && tag_is(n, "constructionfile"))
    .find(|n| element_names_file(n, basename))
  else {
    return FileMatch::default();
  };

  let matrix = child_element(&entry, "zrotationmatrix")
    .and_then(|n| parse_matrix4(&n))
    .or_else(|| {
      let rotation = child_element(&entry, "rotationmatrix").and_then(|n| parse_matrix3(&n))?;
      let translation = ["translation", "offset"]
        .iter()
        .find_map(|t| child_element(&entry, t).and_then(|n| parse_vec3(&n)))
        .unwrap_or(DVec3::ZERO);
      Some(compose_rt(rotation, translation))
    });
  FileMatch {
    referenced: true,
    matrix,
  }
}

const MODEL_MATRIX_TAGS: [&str; 6] = [
  "transformationmatrix",
  "zrotationmatrix",
  "matrix",
  "modelmatrix",
  "meshmatrix",
  "localmatrix",
];

/// Per-file lookup in a modelInfo document: any element whose `Filename`
/// matches, candidate matrix tags in fixed priority order, rotation +
/// translation composition as the fallback.
pub fn model_file_match(doc: &roxmltree::Document, basename: &str) -> FileMatch {
  let Some(entry) = doc
    .descendants()
    .filter(|n| n.is_element())
    .find(|n| element_names_file(n, basename))
  else {
    return FileMatch::default();
  };

  let matrix = MODEL_MATRIX_TAGS
    .iter()
    .find_map(|tag| child_element(&entry, tag).and_then(|n| parse_matrix4(&n)))
    .or_else(|| {
      let rotation = ["rotationmatrix", "rotation"]
        .iter()
        .find_map(|t| child_element(&entry, t).and_then(|n| parse_matrix3(&n)))?;
      let translation = ["translation", "translationvector", "offset", "t"]
        .iter()
        .find_map(|t| child_element(&entry, t).and_then(|n| parse_vec3(&n)))
        .unwrap_or(DVec3::ZERO);
      Some(compose_rt(rotation, translation))
    });
  FileMatch {
    referenced: true,
    matrix,
  }
}

/// Global alignment matrix of a constructionInfo document.
pub fn construction_global_matrix(doc: &roxmltree::Document) -> Option<DMat4> {
  doc
    .descendants()
    .filter(|n| n.is_element() && tag_is(n, "matrixtoscandatafiles"))
    .find_map(|n| parse_matrix4(&n))
}

const MODEL_GLOBAL_TAGS: [&str; 5] = [
  "matrixtoscandatafiles",
  "globalmatrix",
  "mainmatrix",
  "modelmatrix",
  "worldmatrix",
];

/// Global alignment matrix of a modelInfo document, first candidate tag
/// wins.
pub fn model_global_matrix(doc: &roxmltree::Document) -> Option<DMat4> {
  for tag in MODEL_GLOBAL_TAGS {
    let found = doc
      .descendants()
      .filter(|n| n.is_element() && tag_is(n, tag))
      .find_map(|n| parse_matrix4(&n));
    if found.is_some() {
      return found;
    }
  }
  None
}

// =============================================================================
// Owner arbitration
// =============================================================================

/// Which vendor document supplies the transform for one mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Owner {
  Construction,
  Model,
  Neither,
}

const MODEL_COMPONENT_MARKERS: [&str; 8] = [
  "modelgingiva",
  "gingiva",
  "modelbase",
  "base",
  "upperjaw",
  "lowerjaw",
  "_jaw",
  "jaw_",
];

/// True for filenames that belong to the printable model side of a case.
pub fn looks_like_model_component(basename: &str) -> bool {
  let lower = basename.to_lowercase();
  MODEL_COMPONENT_MARKERS.iter().any(|m| lower.contains(m))
}

/// Decide the single transform source for a mesh referenced by zero, one or
/// both vendor documents. Exactly one source ever applies.
pub fn arbitrate(ci_matched: bool, mi_matched: bool, basename: &str) -> Owner {
  match (ci_matched, mi_matched) {
    (true, false) => Owner::Construction,
    (false, true) => Owner::Model,
    (false, false) => Owner::Neither,
    (true, true) => {
      if looks_like_model_component(basename) {
        Owner::Model
      } else {
        Owner::Construction
      }
    }
  }
}

/// Resolve the effective transform for one mesh basename.
///
/// Arbitration runs on the raw reference (a bare entry still claims
/// ownership); the owning document then contributes
/// `inv(Global) · inv(PerFile)`, either factor dropping out when absent.
/// No owner means identity.
pub fn effective_transform(
  ci_doc: Option<&roxmltree::Document>,
  mi_doc: Option<&roxmltree::Document>,
  basename: &str,
) -> DMat4 {
  let ci = ci_doc
    .map(|doc| construction_file_match(doc, basename))
    .unwrap_or_default();
  let mi = mi_doc
    .map(|doc| model_file_match(doc, basename))
    .unwrap_or_default();

  let (global, per_file) = match arbitrate(ci.referenced, mi.referenced, basename) {
    Owner::Construction => (ci_doc.and_then(construction_global_matrix), ci.matrix),
    Owner::Model => (mi_doc.and_then(model_global_matrix), mi.matrix),
    Owner::Neither => return DMat4::IDENTITY,
  };

  let mut effective = DMat4::IDENTITY;
  if let Some(g) = global {
    effective *= safe_inverse(&g);
  }
  if let Some(p) = per_file {
    effective *= safe_inverse(&p);
  }
  effective
}

#[cfg(test)]
#[path = "matrix_test.rs"]
mod matrix_test;
