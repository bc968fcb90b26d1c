//! 3Shape order-file (`*.3ox`) metadata.
//!
//! The order file names each model element with a Korean/English display
//! label; tooth numbers inside the label decide the jaw, keywords decide
//! the category. Scan files hang off elements and are sub-classified by
//! prep/antagonist markers.

use std::path::Path;

use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::fdi::{determine_jaw, extract_fdi, infer_jaw_from_string};
use crate::types::{Category, DisplayMap, GroupLabel, GroupMap, Jaw};

use super::{find_file_by_name, read_xml_text};

/// Group/display maps resolved from one order file.
pub struct ShapeMetadata {
  pub group_map: GroupMap,
  pub display_map: DisplayMap,
  pub order_no: String,
}

struct ModelElement {
  display_name: String,
  stl_name: String,
  jaw: Jaw,
  category: Category,
  scan_files: Vec<String>,
}

/// Category from the element display label, Korean markers first.
fn classify_display(display: &str) -> Category {
  let lower = display.to_lowercase();
  if lower.contains("어버트먼트") || lower.contains("abutment") {
    Category::Abutment
  } else if lower.contains("브릿지")
    || lower.contains("bridge")
    || lower.contains("크라운")
    || lower.contains("crown")
  {
    Category::Crownbridge
  } else {
    Category::Etc
  }
}

fn basename(text: &str) -> String {
  text
    .trim()
    .rsplit(['/', '\\'])
    .next()
    .unwrap_or("")
    .to_string()
}

/// Scan role derived from the filename; drives bite-candidate bucketing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ScanKind {
  Prep,
  Antagonist,
  Other,
}

pub(crate) fn classify_scan(name: &str) -> ScanKind {
  let lower = name.to_lowercase();
  let is_prep = (lower.contains("prep") || lower.contains("preparation"))
    && !lower.contains("prepreparation");
  if is_prep {
    ScanKind::Prep
  } else if lower.contains("antagonist") || lower.starts_with("ant") {
    ScanKind::Antagonist
  } else {
    ScanKind::Other
  }
}

impl ShapeMetadata {
  /// Locate and parse the order file in `folder`.
  pub fn from_folder(folder: &Path) -> Result<ShapeMetadata> {
    let order_path = find_file_by_name(folder, |name| name.ends_with(".3ox"))
      .ok_or_else(|| ConvertError::Xml {
        path: folder.to_path_buf(),
        reason: "no .3ox order file".into(),
      })?;
    let text = read_xml_text(&order_path)?;
    let doc = roxmltree::Document::parse(&text).map_err(|e| ConvertError::Xml {
      path: order_path.clone(),
      reason: e.to_string(),
    })?;
    Ok(Self::from_document(&doc))
  }

  /// Build maps from a parsed order document (namespace ignored, local
  /// names only).
  pub fn from_document(doc: &roxmltree::Document) -> ShapeMetadata {
    let order_no = doc
      .descendants()
      .find(|n| n.is_element() && n.tag_name().name() == "ThreeShapeOrderNo")
      .and_then(|n| n.text())
      .map(|t| t.trim().to_string())
      .unwrap_or_default();

    let mut elements = Vec::new();
    for node in doc
      .descendants()
      .filter(|n| n.is_element() && n.tag_name().name() == "ModelElement")
    {
      let Some(display_name) = node.attribute("displayName") else {
        continue;
      };
      let index = node
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "ModelElementIndex")
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .unwrap_or_default();
      let model_file = node
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "ModelFileName")
        .and_then(|n| n.text())
        .map(basename);
      let scan_files: Vec<String> = node
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "ScanFile")
        .filter_map(|n| n.attribute("path"))
        .map(basename)
        .collect();

      let stl_name = model_file.unwrap_or_else(|| format!("{order_no}_{index}.stl"));
      elements.push(ModelElement {
        jaw: determine_jaw(&extract_fdi(display_name)),
        category: classify_display(display_name),
        display_name: display_name.to_string(),
        stl_name,
        scan_files,
      });
    }

    let mut group_map = GroupMap::new();
    let mut display_map = DisplayMap::new();

    for element in &elements {
      let group = GroupLabel::from_jaw_category(element.jaw, element.category);
      group_map.insert(&element.stl_name, group);
      display_map.insert(&element.stl_name, element.display_name.clone());
      debug!(
        name = %element.stl_name,
        group = group.as_str(),
        "classified model element"
      );
    }

    let has_upper = elements.iter().any(|e| e.jaw == Jaw::Upper);
    let has_lower = elements.iter().any(|e| e.jaw == Jaw::Lower);

    for element in &elements {
      for scan in &element.scan_files {
        let group = if has_upper && has_lower {
          // Two working jaws: scan_1 is the upper model scan by convention
          if scan.to_lowercase().contains("scan_1") {
            GroupLabel::UpperScan
          } else {
            GroupLabel::LowerScan
          }
        } else {
          let working = if has_upper {
            Jaw::Upper
          } else if has_lower {
            Jaw::Lower
          } else {
            Jaw::Mixed
          };
          match (classify_scan(scan), working) {
            (ScanKind::Antagonist, Jaw::Upper) => GroupLabel::LowerScan,
            (ScanKind::Antagonist, Jaw::Lower) => GroupLabel::UpperScan,
            (_, Jaw::Upper) => GroupLabel::UpperScan,
            (_, Jaw::Lower) => GroupLabel::LowerScan,
            // No decided jaw anywhere: fall back to the filename
            _ => match infer_jaw_from_string(scan) {
              Some(Jaw::Upper) => GroupLabel::UpperScan,
              Some(Jaw::Lower) => GroupLabel::LowerScan,
              _ => GroupLabel::Etc,
            },
          }
        };
        group_map.insert(scan, group);
      }
    }

    ShapeMetadata {
      group_map,
      display_map,
      order_no,
    }
  }
}

#[cfg(test)]
#[path = "shape_test.rs"]
mod shape_test;
