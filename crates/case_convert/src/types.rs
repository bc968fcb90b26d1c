//! Core data types shared across the conversion pipeline.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Jaw classification derived from tooth notation or vendor metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Jaw {
  Upper,
  Lower,
  /// Spans both arches, or could not be decided.
  Mixed,
}

/// Anatomical group of a mesh surface in the viewer.
///
/// Closed set; every mesh in the emitted HTML carries exactly one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupLabel {
  UpperCrownbridge,
  UpperAbutment,
  UpperScan,
  LowerCrownbridge,
  LowerAbutment,
  LowerScan,
  Bite,
  Etc,
  Annotation,
}

impl GroupLabel {
  pub const ALL: [GroupLabel; 9] = [
    GroupLabel::UpperCrownbridge,
    GroupLabel::UpperAbutment,
    GroupLabel::UpperScan,
    GroupLabel::LowerCrownbridge,
    GroupLabel::LowerAbutment,
    GroupLabel::LowerScan,
    GroupLabel::Bite,
    GroupLabel::Etc,
    GroupLabel::Annotation,
  ];

  /// Stable tag used in the emitted HTML and in the worker wire format.
  pub fn as_str(self) -> &'static str {
    match self {
      GroupLabel::UpperCrownbridge => "upper_crownbridge",
      GroupLabel::UpperAbutment => "upper_abutment",
      GroupLabel::UpperScan => "upper_scan",
      GroupLabel::LowerCrownbridge => "lower_crownbridge",
      GroupLabel::LowerAbutment => "lower_abutment",
      GroupLabel::LowerScan => "lower_scan",
      GroupLabel::Bite => "bite",
      GroupLabel::Etc => "etc",
      GroupLabel::Annotation => "annotation",
    }
  }

  /// Fixed viewer color as a packed RGB integer.
  pub fn color(self) -> u32 {
    match self {
      GroupLabel::UpperCrownbridge => 0xFFFFF0,
      GroupLabel::UpperAbutment => 0xC0C0C0,
      GroupLabel::UpperScan => 0xF5DEB3,
      GroupLabel::LowerCrownbridge => 0xFFFAF0,
      GroupLabel::LowerAbutment => 0xA9A9A9,
      GroupLabel::LowerScan => 0xFFDEAD,
      GroupLabel::Bite => 0xFF0000,
      GroupLabel::Etc => 0xCCCCCC,
      GroupLabel::Annotation => 0xFFFF00,
    }
  }

  /// Compose `{jaw}_{category}` for the three jaw-qualified categories.
  /// Anything else (mixed jaw, `etc` category) collapses to `Etc`.
  pub fn from_jaw_category(jaw: Jaw, category: Category) -> GroupLabel {
    match (jaw, category) {
      (Jaw::Upper, Category::Crownbridge) => GroupLabel::UpperCrownbridge,
      (Jaw::Upper, Category::Abutment) => GroupLabel::UpperAbutment,
      (Jaw::Upper, Category::Scan) => GroupLabel::UpperScan,
      (Jaw::Lower, Category::Crownbridge) => GroupLabel::LowerCrownbridge,
      (Jaw::Lower, Category::Abutment) => GroupLabel::LowerAbutment,
      (Jaw::Lower, Category::Scan) => GroupLabel::LowerScan,
      _ => GroupLabel::Etc,
    }
  }

  pub fn jaw(self) -> Option<Jaw> {
    match self {
      GroupLabel::UpperCrownbridge | GroupLabel::UpperAbutment | GroupLabel::UpperScan => {
        Some(Jaw::Upper)
      }
      GroupLabel::LowerCrownbridge | GroupLabel::LowerAbutment | GroupLabel::LowerScan => {
        Some(Jaw::Lower)
      }
      _ => None,
    }
  }
}

/// Functional category of a mesh before jaw qualification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
  Crownbridge,
  Abutment,
  Scan,
  Etc,
}

/// Mesh file format, decided by extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshFormat {
  Stl,
  Ply,
}

impl MeshFormat {
  pub fn from_path(path: &Path) -> Option<MeshFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
      "stl" => Some(MeshFormat::Stl),
      "ply" => Some(MeshFormat::Ply),
      _ => None,
    }
  }
}

/// Derive the `_reduced` alias of a mesh filename (`crown.stl` →
/// `crown_reduced.stl`). Returns `None` when there is no extension.
pub fn reduced_alias(name: &str) -> Option<String> {
  let dot = name.rfind('.')?;
  let (stem, ext) = name.split_at(dot);
  Some(format!("{stem}_reduced{ext}"))
}

/// Case-insensitive basename → group mapping.
///
/// Inserting `<base>.<ext>` also inserts `<base>_reduced.<ext>` so lookups
/// keyed by simplified filenames resolve to the same group.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GroupMap {
  entries: HashMap<String, GroupLabel>,
}

impl GroupMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, name: &str, group: GroupLabel) {
    let key = name.to_lowercase();
    if let Some(alias) = reduced_alias(&key) {
      self.entries.insert(alias, group);
    }
    self.entries.insert(key, group);
  }

  /// Look up by basename; defaults to `Etc` for unknown meshes.
  pub fn get(&self, name: &str) -> GroupLabel {
    self
      .entries
      .get(&name.to_lowercase())
      .copied()
      .unwrap_or(GroupLabel::Etc)
  }

  pub fn get_opt(&self, name: &str) -> Option<GroupLabel> {
    self.entries.get(&name.to_lowercase()).copied()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &GroupLabel)> {
    self.entries.iter()
  }
}

/// Case-insensitive basename → human-readable label mapping.
#[derive(Clone, Debug, Default)]
pub struct DisplayMap {
  entries: HashMap<String, String>,
}

impl DisplayMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, name: &str, label: impl Into<String>) {
    let key = name.to_lowercase();
    let label = label.into();
    if let Some(alias) = reduced_alias(&key) {
      self.entries.insert(alias, label.clone());
    }
    self.entries.insert(key, label);
  }

  /// Look up by basename; defaults to the basename without extension.
  pub fn get(&self, name: &str) -> String {
    if let Some(label) = self.entries.get(&name.to_lowercase()) {
      return label.clone();
    }
    match name.rfind('.') {
      Some(dot) => name[..dot].to_string(),
      None => name.to_string(),
    }
  }
}

/// One mesh entry destined for the emitted HTML model list.
#[derive(Clone, Debug)]
pub struct ModelEntry {
  /// Simplified mesh basename.
  pub name: String,
  /// Base64-encoded GLB payload.
  pub b64: String,
  pub group: GroupLabel,
  pub display_name: String,
}

/// Progress event crossing the orchestrator/front-end boundary.
///
/// Percent is monotonic non-decreasing within one case.
#[derive(Clone, Debug)]
pub struct Progress {
  pub percent: f32,
  pub message: String,
}

impl Progress {
  pub fn new(percent: f32, message: impl Into<String>) -> Self {
    Self {
      percent,
      message: message.into(),
    }
  }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
