//! exocad metadata: constructionInfo / modelInfo pair.
//!
//! Group classification is filename-keyword driven with a strict jaw
//! priority: tooth notation in the filename always wins, then the
//! modelInfo jaw map for model/base/gingiva components, then free-text
//! inference, then upper as the last resort.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::fdi::{determine_jaw, extract_fdi, infer_jaw_from_string};
use crate::types::{Category, DisplayMap, GroupLabel, GroupMap, Jaw};

use super::{find_file_by_name, read_xml_text};

/// Metadata pair resolved from one case folder. Either file may be absent;
/// classification degrades gracefully.
pub struct ExoMetadata {
  /// Decoded constructionInfo XML, kept for transform resolution.
  pub ci_text: Option<String>,
  /// Decoded modelInfo XML, kept for transform resolution.
  pub mi_text: Option<String>,
  jaw_map: HashMap<String, Jaw>,
  display_overrides: Vec<(String, String)>,
}

/// `foo.constructionInfo`, or `foo.xml` with `constructioninfo` in the name.
pub fn is_construction_info_name(name: &str) -> bool {
  name.ends_with(".constructioninfo")
    || (name.ends_with(".xml") && name.contains("constructioninfo"))
}

pub fn is_model_info_name(name: &str) -> bool {
  name.ends_with(".modelinfo") || (name.ends_with(".xml") && name.contains("modelinfo"))
}

/// Keyword category table; first match wins.
fn classify_name(lower: &str) -> Category {
  if lower.contains("occlusion") {
    return Category::Etc;
  }
  const SCAN_KEYWORDS: [&str; 11] = [
    "upperjaw",
    "lowerjaw",
    "modelgingiva",
    "modelbase",
    "gingiva",
    "model",
    "base",
    "marker",
    "prep",
    "antagonist",
    "oppos",
  ];
  if SCAN_KEYWORDS.iter().any(|k| lower.contains(k)) || lower.starts_with("ant") {
    return Category::Scan;
  }
  const ABUTMENT_KEYWORDS: [&str; 4] = ["abut", "scanbody", "tibase", "ti-base"];
  if ABUTMENT_KEYWORDS.iter().any(|k| lower.contains(k)) {
    return Category::Abutment;
  }
  const CROWN_KEYWORDS: [&str; 6] =
    ["crown", "bridge", "pontic", "coping", "framework", "veneer"];
  if CROWN_KEYWORDS.iter().any(|k| lower.contains(k)) {
    return Category::Crownbridge;
  }
  Category::Etc
}

/// Does the filename name a model/base/gingiva component whose jaw the
/// modelInfo map may know better than the name itself?
fn consults_jaw_map(lower: &str, category: Category) -> bool {
  category == Category::Scan
    || ["modelgingiva", "gingiva", "modelbase", "base"]
      .iter()
      .any(|k| lower.contains(k))
}

/// Descriptor tags whose text hints at the jaw of a modelInfo element.
const JAW_HINT_TAGS: [&str; 13] = [
  "Jaw",
  "JawType",
  "UpperLower",
  "JawPosition",
  "Type",
  "Category",
  "ComponentType",
  "Label",
  "Name",
  "DisplayName",
  "ModelType",
  "BaseType",
  "GingivaType",
];

fn file_basename(text: &str) -> String {
  text
    .trim()
    .rsplit(['/', '\\'])
    .next()
    .unwrap_or("")
    .to_string()
}

/// Walk a modelInfo document and map every referenced filename to a jaw.
fn build_jaw_map(doc: &roxmltree::Document) -> HashMap<String, Jaw> {
  let mut map = HashMap::new();

  for node in doc.descendants().filter(|n| n.is_element()) {
    let Some(filename) = node
      .children()
      .find(|c| c.is_element() && c.tag_name().name().eq_ignore_ascii_case("filename"))
      .and_then(|c| c.text())
      .map(file_basename)
    else {
      continue;
    };
    if filename.is_empty() {
      continue;
    }

    let mut hints = String::new();
    for tag in JAW_HINT_TAGS {
      for hint in node
        .descendants()
        .filter(|c| c.is_element() && c.tag_name().name().eq_ignore_ascii_case(tag))
      {
        if let Some(text) = hint.text() {
          hints.push_str(text);
          hints.push(' ');
        }
      }
    }
    // Descendant tag names and remaining text often carry the only hint
    for desc in node.descendants() {
      if desc.is_element() {
        hints.push_str(desc.tag_name().name());
        hints.push(' ');
      }
      if let Some(text) = desc.text() {
        hints.push_str(text);
        hints.push(' ');
      }
    }

    let jaw = infer_jaw_from_string(&hints)
      .or_else(|| infer_jaw_from_string(&filename));
    if let Some(jaw) = jaw {
      let key = filename.to_lowercase();
      if let Some(alias) = crate::types::reduced_alias(&key) {
        map.insert(alias, jaw);
      }
      map.insert(key, jaw);
    }
  }
  map
}

/// Display label overrides from `ConstructionFileList/ConstructionFile`
/// entries carrying a `Label` or `Name`.
fn build_display_overrides(doc: &roxmltree::Document) -> Vec<(String, String)> {
  let mut overrides = Vec::new();
  for node in doc
    .descendants()
    .filter(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case("constructionfile"))
  {
    let Some(filename) = node
      .children()
      .find(|c| c.is_element() && c.tag_name().name().eq_ignore_ascii_case("filename"))
      .and_then(|c| c.text())
      .map(file_basename)
    else {
      continue;
    };
    let label = node
      .children()
      .filter(|c| {
        c.is_element()
          && (c.tag_name().name().eq_ignore_ascii_case("label")
            || c.tag_name().name().eq_ignore_ascii_case("name"))
      })
      .find_map(|c| c.text())
      .map(|t| t.trim().to_string())
      .filter(|t| !t.is_empty());
    if let Some(label) = label {
      overrides.push((filename, label));
    }
  }
  overrides
}

impl ExoMetadata {
  /// Discover and decode the vendor pair in `folder`. Parse failures are
  /// logged and leave the corresponding document absent.
  pub fn from_folder(folder: &Path) -> ExoMetadata {
    let read_checked = |path: std::path::PathBuf| -> Option<String> {
      match read_xml_text(&path) {
        Ok(text) => match roxmltree::Document::parse(&text) {
          Ok(_) => Some(text),
          Err(err) => {
            warn!(path = %path.display(), %err, "unparseable vendor xml");
            None
          }
        },
        Err(err) => {
          warn!(path = %path.display(), %err, "unreadable vendor xml");
          None
        }
      }
    };

    let ci_text = find_file_by_name(folder, is_construction_info_name).and_then(read_checked);
    let mi_text = find_file_by_name(folder, is_model_info_name).and_then(read_checked);

    let jaw_map = mi_text
      .as_deref()
      .and_then(|text| roxmltree::Document::parse(text).ok())
      .map(|doc| build_jaw_map(&doc))
      .unwrap_or_default();
    let display_overrides = ci_text
      .as_deref()
      .and_then(|text| roxmltree::Document::parse(text).ok())
      .map(|doc| build_display_overrides(&doc))
      .unwrap_or_default();

    ExoMetadata {
      ci_text,
      mi_text,
      jaw_map,
      display_overrides,
    }
  }

  /// Classify one mesh basename.
  ///
  /// Jaw priority, strictly: filename tooth notation, then the modelInfo
  /// jaw map for model-component names, then free-text inference, then
  /// upper.
  pub fn classify(&self, basename: &str) -> GroupLabel {
    let lower = basename.to_lowercase();
    let category = classify_name(&lower);

    let jaw = match determine_jaw(&extract_fdi(&lower)) {
      jaw @ (Jaw::Upper | Jaw::Lower) => jaw,
      Jaw::Mixed => {
        let from_map = if consults_jaw_map(&lower, category) {
          self.jaw_map.get(&lower).copied()
        } else {
          None
        };
        from_map
          .or_else(|| infer_jaw_from_string(&lower))
          .unwrap_or(Jaw::Upper)
      }
    };

    let group = GroupLabel::from_jaw_category(jaw, category);
    debug!(name = basename, group = group.as_str(), "classified exo mesh");
    group
  }

  /// Build the group map for the meshes of this case.
  pub fn group_map_for(&self, basenames: &[String]) -> GroupMap {
    let mut map = GroupMap::new();
    for name in basenames {
      map.insert(name, self.classify(name));
    }
    map
  }

  /// Build the display map: basenames by default, constructionInfo labels
  /// where available.
  pub fn display_map_for(&self, basenames: &[String]) -> DisplayMap {
    let mut map = DisplayMap::new();
    let known: Vec<String> = basenames.iter().map(|n| n.to_lowercase()).collect();
    for (filename, label) in &self.display_overrides {
      if known.iter().any(|n| n == &filename.to_lowercase()) {
        map.insert(filename, label.clone());
      }
    }
    map
  }
}

#[cfg(test)]
#[path = "exo_test.rs"]
mod exo_test;
