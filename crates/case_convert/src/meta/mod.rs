//! Vendor metadata providers.
//!
//! Both vendors answer the same question for the coordinator: given a case
//! folder, produce the group map (anatomical classification per mesh
//! basename) and the display map (human labels). The exo provider
//! additionally resolves per-mesh alignment transforms from its XML pair.

pub mod exo;
pub mod matrix;
pub mod shape;

use std::path::{Path, PathBuf};

use crate::detect::VendorMode;
use crate::error::{ConvertError, Result};
use crate::types::{DisplayMap, GroupMap};

/// Vendor-specific metadata, resolved once per case folder.
///
/// Closed set: the coordinator never sees vendor XML directly.
pub enum MetadataProvider {
  Shape(shape::ShapeMetadata),
  Exo(exo::ExoMetadata),
  /// Manual mode or undetected vendor: caller-supplied maps only.
  Bare,
}

impl MetadataProvider {
  /// Build the provider for a folder according to the detected mode.
  ///
  /// XML failures degrade to filename heuristics rather than failing the
  /// case.
  pub fn for_folder(folder: &Path, mode: VendorMode) -> MetadataProvider {
    match mode {
      VendorMode::Shape => match shape::ShapeMetadata::from_folder(folder) {
        Ok(meta) => MetadataProvider::Shape(meta),
        Err(err) => {
          tracing::warn!(%err, "order file unusable, falling back to bare maps");
          MetadataProvider::Bare
        }
      },
      VendorMode::Exo => MetadataProvider::Exo(exo::ExoMetadata::from_folder(folder)),
      VendorMode::None => MetadataProvider::Bare,
    }
  }

  /// Group and display maps for the meshes of this case.
  ///
  /// The order file fixes both maps up front; exo classification is
  /// filename-driven and therefore needs the mesh basenames.
  pub fn maps_for(&self, basenames: &[String]) -> (GroupMap, DisplayMap) {
    match self {
      MetadataProvider::Shape(meta) => (meta.group_map.clone(), meta.display_map.clone()),
      MetadataProvider::Exo(meta) => (
        meta.group_map_for(basenames),
        meta.display_map_for(basenames),
      ),
      MetadataProvider::Bare => (GroupMap::new(), DisplayMap::new()),
    }
  }

  /// Decoded exo XML texts for transform resolution; `(None, None)` for
  /// the other providers.
  pub fn exo_documents(&self) -> (Option<&str>, Option<&str>) {
    match self {
      MetadataProvider::Exo(meta) => (meta.ci_text.as_deref(), meta.mi_text.as_deref()),
      _ => (None, None),
    }
  }
}

/// Decode a vendor XML file to a string, sniffing UTF-16/UTF-8 BOMs.
/// Order files are frequently UTF-16; everything else is usually UTF-8.
pub fn read_xml_text(path: &Path) -> Result<String> {
  let bytes = std::fs::read(path).map_err(|e| ConvertError::io(path, e))?;
  let (text, _encoding, had_errors) = match encoding_rs::Encoding::for_bom(&bytes) {
    Some((encoding, bom_len)) => {
      let (cow, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
      (cow.into_owned(), encoding, had_errors)
    }
    None => {
      let (cow, encoding, had_errors) = encoding_rs::UTF_8.decode(&bytes);
      (cow.into_owned(), encoding, had_errors)
    }
  };
  if had_errors {
    return Err(ConvertError::Xml {
      path: path.to_path_buf(),
      reason: "undecodable text".into(),
    });
  }
  Ok(text)
}

/// First file in `folder` whose lowercase name satisfies `pred`.
pub(crate) fn find_file_by_name(
  folder: &Path,
  pred: impl Fn(&str) -> bool,
) -> Option<PathBuf> {
  let entries = std::fs::read_dir(folder).ok()?;
  let mut matches: Vec<PathBuf> = entries
    .flatten()
    .map(|e| e.path())
    .filter(|p| p.is_file())
    .filter(|p| {
      p.file_name()
        .and_then(|n| n.to_str())
        .map(|n| pred(&n.to_lowercase()))
        .unwrap_or(false)
    })
    .collect();
  matches.sort();
  matches.into_iter().next()
}
