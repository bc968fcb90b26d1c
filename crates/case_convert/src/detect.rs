//! Vendor mode detection and case-folder ZIP expansion.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::meta::exo::{is_construction_info_name, is_model_info_name};

/// Which vendor produced a case folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VendorMode {
  Shape,
  Exo,
  None,
}

/// Classify a folder: any `*.3ox` makes it a 3Shape case, any
/// constructionInfo/modelInfo an exocad case.
pub fn detect_mode(folder: &Path) -> VendorMode {
  let Ok(entries) = std::fs::read_dir(folder) else {
    return VendorMode::None;
  };
  let names: Vec<String> = entries
    .flatten()
    .filter(|e| e.path().is_file())
    .filter_map(|e| e.file_name().to_str().map(|n| n.to_lowercase()))
    .collect();

  if names.iter().any(|n| n.ends_with(".3ox")) {
    VendorMode::Shape
  } else if names
    .iter()
    .any(|n| is_construction_info_name(n) || is_model_info_name(n))
  {
    VendorMode::Exo
  } else {
    VendorMode::None
  }
}

/// Extract every `*.zip` directly inside `folder` into uniquely-named
/// subdirectories of `scratch`. Returns the extraction roots; failed
/// archives are logged and skipped.
pub fn expand_zips(folder: &Path, scratch: &Path) -> Vec<PathBuf> {
  let mut roots = Vec::new();
  let Ok(entries) = std::fs::read_dir(folder) else {
    return roots;
  };

  let mut zips: Vec<PathBuf> = entries
    .flatten()
    .map(|e| e.path())
    .filter(|p| {
      p.is_file()
        && p
          .extension()
          .and_then(|e| e.to_str())
          .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
    })
    .collect();
  zips.sort();

  for zip_path in zips {
    match expand_one(&zip_path, scratch) {
      Ok(root) => {
        info!(zip = %zip_path.display(), into = %root.display(), "expanded case archive");
        roots.push(root);
      }
      Err(err) => {
        warn!(zip = %zip_path.display(), %err, "skipping unreadable archive");
      }
    }
  }
  roots
}

/// The extraction root mirrors the archive basename so downstream output
/// names derive from it.
fn expand_one(zip_path: &Path, scratch: &Path) -> std::io::Result<PathBuf> {
  let stem = zip_path
    .file_stem()
    .and_then(|s| s.to_str())
    .unwrap_or("archive");
  let mut root = scratch.join(stem);
  let mut suffix = 1;
  while root.exists() {
    root = scratch.join(format!("{stem}_{suffix}"));
    suffix += 1;
  }
  std::fs::create_dir_all(&root)?;

  let file = File::open(zip_path)?;
  let mut archive = zip::ZipArchive::new(file)
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
  archive
    .extract(&root)
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
  Ok(root)
}

/// All processing candidates for one case folder: the folder itself plus
/// each archive expansion root.
pub fn case_candidates(folder: &Path, scratch: &Path) -> Vec<PathBuf> {
  let mut candidates = vec![folder.to_path_buf()];
  candidates.extend(expand_zips(folder, scratch));
  candidates
}

#[cfg(test)]
#[path = "detect_test.rs"]
mod detect_test;
