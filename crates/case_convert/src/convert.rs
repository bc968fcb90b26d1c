//! Per-case pipeline coordinator.
//!
//! One call drives a whole case: metadata maps, per-mesh alignment,
//! simplification, bite synthesis, HTML emission and the processed
//! marker. Per-mesh failures are logged and skipped; only HTML emission
//! failures propagate.

use std::path::{Path, PathBuf};

use glam::DMat4;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{info, warn};

use crate::detect::VendorMode;
use crate::error::Result;
use crate::html;
use crate::mesh;
use crate::mesh::boolean;
use crate::meta::matrix::effective_transform;
use crate::meta::shape::{classify_scan, ScanKind};
use crate::meta::MetadataProvider;
use crate::types::{GroupLabel, GroupMap, ModelEntry};

/// Marker file dropped into a case folder once its HTML exists.
pub const MARKER_FILENAME: &str = "folder.processed_html_converter";

/// Default decimation ratio: keep one eighth of the input faces.
pub const DEFAULT_REDUCTION: f64 = 0.875;

/// Boolean intersection tolerance in mesh units.
pub const BITE_TOLERANCE: f64 = 0.01;

/// Everything one case conversion needs; serializable so the batch
/// orchestrator can ship it to an isolated worker process.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConvertRequest {
  /// Meshes in enumeration order; the HTML model list preserves it.
  pub mesh_paths: Vec<PathBuf>,
  pub out_html: PathBuf,
  /// Folder the metadata maps are resolved from (and the marker lands in).
  pub folder: PathBuf,
  pub mode: VendorMode,
  #[serde(default = "default_true")]
  pub with_dlas_logo: bool,
  #[serde(default)]
  pub user_logo_b64: Option<String>,
  /// Manual mode: caller-confirmed groups replace vendor classification.
  #[serde(default)]
  pub group_override: Option<GroupMap>,
  #[serde(default = "default_reduction")]
  pub target_reduction: f64,
}

fn default_true() -> bool {
  true
}

fn default_reduction() -> f64 {
  DEFAULT_REDUCTION
}

impl ConvertRequest {
  pub fn new(mesh_paths: Vec<PathBuf>, out_html: PathBuf, folder: PathBuf, mode: VendorMode) -> Self {
    Self {
      mesh_paths,
      out_html,
      folder,
      mode,
      with_dlas_logo: true,
      user_logo_b64: None,
      group_override: None,
      target_reduction: DEFAULT_REDUCTION,
    }
  }
}

#[derive(Debug)]
pub struct ConvertOutcome {
  pub out_html: PathBuf,
  pub model_count: usize,
  pub bite_written: bool,
}

/// Bite-candidate buckets, filled per mesh during the main loop.
#[derive(Default)]
struct BiteBuckets {
  u_crown: SmallVec<[PathBuf; 4]>,
  l_crown: SmallVec<[PathBuf; 4]>,
  u_prep: SmallVec<[PathBuf; 4]>,
  l_prep: SmallVec<[PathBuf; 4]>,
  u_ant: SmallVec<[PathBuf; 4]>,
  l_ant: SmallVec<[PathBuf; 4]>,
  u_scan: SmallVec<[PathBuf; 4]>,
  l_scan: SmallVec<[PathBuf; 4]>,
}

impl BiteBuckets {
  fn add(&mut self, group: GroupLabel, name: &str, path: &Path, exo: bool) {
    let path = path.to_path_buf();
    match group {
      GroupLabel::UpperCrownbridge => self.u_crown.push(path),
      GroupLabel::LowerCrownbridge => self.l_crown.push(path),
      GroupLabel::UpperScan => match classify_scan(name) {
        ScanKind::Prep => self.u_prep.push(path),
        ScanKind::Antagonist => self.u_ant.push(path),
        ScanKind::Other if exo => self.u_scan.push(path),
        ScanKind::Other => {}
      },
      GroupLabel::LowerScan => match classify_scan(name) {
        ScanKind::Prep => self.l_prep.push(path),
        ScanKind::Antagonist => self.l_ant.push(path),
        ScanKind::Other if exo => self.l_scan.push(path),
        ScanKind::Other => {}
      },
      _ => {}
    }
  }

  /// Upper-side and lower-side sets plus their opposing antagonists.
  fn sides(&self) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let upper: Vec<PathBuf> = self
      .u_crown
      .iter()
      .chain(self.u_prep.iter())
      .chain(self.u_scan.iter())
      .cloned()
      .collect();
    let lower: Vec<PathBuf> = self
      .l_crown
      .iter()
      .chain(self.l_prep.iter())
      .chain(self.l_scan.iter())
      .cloned()
      .collect();
    (upper, lower)
  }
}

fn basename_of(path: &Path) -> String {
  path
    .file_name()
    .and_then(|n| n.to_str())
    .unwrap_or_default()
    .to_string()
}

/// Convert one case folder into a self-contained viewer document.
///
/// `progress` receives `(percent, message)` pairs, monotonic within the
/// case. The marker is written only after the HTML write succeeds.
pub fn convert_case(
  request: &ConvertRequest,
  mut progress: impl FnMut(f32, &str),
) -> Result<ConvertOutcome> {
  let reduce_dir = tempfile::tempdir().map_err(|e| crate::error::ConvertError::io("reduce_dir", e))?;
  let xfm_dir = tempfile::tempdir().map_err(|e| crate::error::ConvertError::io("xfm_dir", e))?;

  progress(0.0, "reading case metadata");
  let provider = MetadataProvider::for_folder(&request.folder, request.mode);

  let basenames: Vec<String> = request.mesh_paths.iter().map(|p| basename_of(p)).collect();
  let (mut group_map, display_map) = provider.maps_for(&basenames);
  // A caller-confirmed map replaces classification, never the transforms
  if let Some(override_map) = &request.group_override {
    group_map = override_map.clone();
  }

  // Exo vendor documents are parsed once and shared by every mesh below
  let (ci_text, mi_text) = provider.exo_documents();
  let ci_doc = ci_text.and_then(|t| roxmltree::Document::parse(t).ok());
  let mi_doc = mi_text.and_then(|t| roxmltree::Document::parse(t).ok());
  let exo = request.mode == VendorMode::Exo;
  let has_transforms = exo && (ci_doc.is_some() || mi_doc.is_some());

  let mut models: Vec<ModelEntry> = Vec::new();
  let mut buckets = BiteBuckets::default();
  let total = request.mesh_paths.len().max(1) as f32;

  for (index, path) in request.mesh_paths.iter().enumerate() {
    let name = basename_of(path);
    let result = process_mesh(
      path,
      &name,
      has_transforms.then_some((&ci_doc, &mi_doc)),
      xfm_dir.path(),
      reduce_dir.path(),
      request.target_reduction,
    );

    match result {
      Ok((reduced_path, b64)) => {
        let group = group_map.get(&name);
        buckets.add(group, &name, &reduced_path, exo);
        models.push(ModelEntry {
          name: basename_of(&reduced_path),
          b64,
          group,
          display_name: display_map.get(&name),
        });
      }
      Err(err) => {
        warn!(mesh = %path.display(), %err, "skipping failed mesh");
      }
    }

    let done = (index + 1) as f32;
    progress(done / total * 85.0, &format!("processed {name}"));
  }

  // Bite synthesis: cross-arch contact of whatever both sides offer
  let (upper, lower) = buckets.sides();
  let bite_path = if !upper.is_empty() && !lower.is_empty() {
    boolean::intersect(&upper, &lower, reduce_dir.path(), BITE_TOLERANCE)
  } else if !upper.is_empty() {
    boolean::intersect(&upper, &buckets.l_ant.to_vec(), reduce_dir.path(), BITE_TOLERANCE)
  } else if !lower.is_empty() {
    boolean::intersect(&lower, &buckets.u_ant.to_vec(), reduce_dir.path(), BITE_TOLERANCE)
  } else {
    None
  };

  let bite_written = match bite_path {
    Some(path) => match mesh::encode_compact(&path) {
      Ok(glb) => {
        use base64::Engine;
        models.push(ModelEntry {
          name: basename_of(&path),
          b64: base64::engine::general_purpose::STANDARD.encode(glb),
          group: GroupLabel::Bite,
          display_name: "BITE".to_string(),
        });
        true
      }
      Err(err) => {
        warn!(%err, "bite mesh produced but not encodable");
        false
      }
    },
    None => false,
  };
  progress(92.0, "bite synthesis done");

  html::emit(
    &request.out_html,
    &models,
    request.with_dlas_logo,
    request.user_logo_b64.as_deref(),
  )?;

  // Only now may the folder be considered processed
  let marker = request.folder.join(MARKER_FILENAME);
  if let Err(err) = std::fs::write(&marker, b"processed by dlas-convert\n") {
    warn!(path = %marker.display(), %err, "could not write marker");
  }

  progress(100.0, "case complete");
  info!(
    out = %request.out_html.display(),
    models = models.len(),
    bite = bite_written,
    "case converted"
  );

  Ok(ConvertOutcome {
    out_html: request.out_html.clone(),
    model_count: models.len(),
    bite_written,
  })
}

/// Align (exo), simplify and encode one mesh. Returns the reduced path and
/// the base64 GLB payload.
fn process_mesh(
  path: &Path,
  name: &str,
  docs: Option<(&Option<roxmltree::Document>, &Option<roxmltree::Document>)>,
  xfm_dir: &Path,
  reduce_dir: &Path,
  target_reduction: f64,
) -> Result<(PathBuf, String)> {
  use base64::Engine;

  let mut source = path.to_path_buf();
  if let Some((ci_doc, mi_doc)) = docs {
    let transform = effective_transform(ci_doc.as_ref(), mi_doc.as_ref(), name);
    if transform != DMat4::IDENTITY {
      let mut loaded = mesh::read_mesh(path)?;
      loaded.transform(&transform);
      let aligned = xfm_dir.join(name);
      mesh::write_mesh(&aligned, &loaded)?;
      source = aligned;
    }
  }

  let reduced = mesh::reduce(&source, reduce_dir, target_reduction)?;
  let glb = mesh::encode_compact(&reduced)?;
  let b64 = base64::engine::general_purpose::STANDARD.encode(glb);
  Ok((reduced, b64))
}

#[cfg(test)]
#[path = "convert_test.rs"]
mod convert_test;
