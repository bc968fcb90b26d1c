//! Triangle mesh container, file codecs and simplification entry points.
//!
//! Meshes are triangle soups with shared vertices (`positions` + `indices`).
//! STL input arrives unwelded; `weld` collapses coincident vertices onto a
//! quantization grid so decimation and boolean classification see real
//! connectivity.

pub mod boolean;
pub mod decimate;
pub mod glb;
pub mod ply;
pub mod stl;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::{DMat4, DVec3};
use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::types::MeshFormat;

/// Welding grid resolution in mesh units (millimeters for dental scans).
const WELD_EPS: f64 = 1e-6;

/// Indexed triangle mesh with f64 positions.
#[derive(Clone, Debug, Default)]
pub struct TriMesh {
  pub positions: Vec<DVec3>,
  pub indices: Vec<[u32; 3]>,
}

impl TriMesh {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_empty(&self) -> bool {
    self.positions.is_empty() || self.indices.is_empty()
  }

  pub fn triangle_count(&self) -> usize {
    self.indices.len()
  }

  pub fn vertex_count(&self) -> usize {
    self.positions.len()
  }

  /// Corner positions of one triangle.
  pub fn triangle(&self, face: usize) -> [DVec3; 3] {
    let [a, b, c] = self.indices[face];
    [
      self.positions[a as usize],
      self.positions[b as usize],
      self.positions[c as usize],
    ]
  }

  /// Unnormalized face normal (length = 2 × area).
  pub fn face_normal(&self, face: usize) -> DVec3 {
    let [a, b, c] = self.triangle(face);
    (b - a).cross(c - a)
  }

  /// Apply an affine transform to every vertex in place.
  pub fn transform(&mut self, matrix: &DMat4) {
    for p in &mut self.positions {
      *p = matrix.transform_point3(*p);
    }
  }

  /// Append another mesh (indices rebased).
  pub fn append(&mut self, other: &TriMesh) {
    let base = self.positions.len() as u32;
    self.positions.extend_from_slice(&other.positions);
    self
      .indices
      .extend(other.indices.iter().map(|t| [t[0] + base, t[1] + base, t[2] + base]));
  }

  /// Collapse coincident vertices onto a quantization grid and drop
  /// degenerate triangles. Returns the welded mesh.
  pub fn weld(&self) -> TriMesh {
    let quantize = |p: DVec3| {
      (
        (p.x / WELD_EPS).round() as i64,
        (p.y / WELD_EPS).round() as i64,
        (p.z / WELD_EPS).round() as i64,
      )
    };

    let mut lookup: HashMap<(i64, i64, i64), u32> = HashMap::new();
    let mut remap = vec![0u32; self.positions.len()];
    let mut positions = Vec::new();

    for (i, &p) in self.positions.iter().enumerate() {
      let key = quantize(p);
      let idx = *lookup.entry(key).or_insert_with(|| {
        positions.push(p);
        (positions.len() - 1) as u32
      });
      remap[i] = idx;
    }

    let mut indices = Vec::with_capacity(self.indices.len());
    for t in &self.indices {
      let mapped = [
        remap[t[0] as usize],
        remap[t[1] as usize],
        remap[t[2] as usize],
      ];
      if mapped[0] != mapped[1] && mapped[1] != mapped[2] && mapped[0] != mapped[2] {
        indices.push(mapped);
      }
    }

    TriMesh { positions, indices }
  }
}

/// Read a mesh file, dispatching on extension.
pub fn read_mesh(path: &Path) -> Result<TriMesh> {
  let format = MeshFormat::from_path(path)
    .ok_or_else(|| ConvertError::mesh_read(path, "unsupported extension"))?;
  let bytes = std::fs::read(path).map_err(|e| ConvertError::io(path, e))?;
  let mesh = match format {
    MeshFormat::Stl => stl::read(&bytes).map_err(|e| ConvertError::mesh_read(path, e))?,
    MeshFormat::Ply => ply::read(&bytes).map_err(|e| ConvertError::mesh_read(path, e))?,
  };
  if mesh.is_empty() {
    return Err(ConvertError::mesh_read(path, "no triangles"));
  }
  Ok(mesh)
}

/// Write a mesh file in binary form, dispatching on extension.
pub fn write_mesh(path: &Path, mesh: &TriMesh) -> Result<()> {
  let format = MeshFormat::from_path(path)
    .ok_or_else(|| ConvertError::mesh_read(path, "unsupported extension"))?;
  let bytes = match format {
    MeshFormat::Stl => stl::write(mesh),
    MeshFormat::Ply => ply::write(mesh),
  };
  std::fs::write(path, bytes).map_err(|e| ConvertError::MeshWrite {
    path: path.to_path_buf(),
    source: e,
  })
}

/// Simplify a mesh file into `out_dir`, preserving basename and format.
///
/// The reduction ratio is a hint: collapses stop early when topology refuses
/// to give more without degenerating.
pub fn reduce(path: &Path, out_dir: &Path, target_reduction: f64) -> Result<PathBuf> {
  let mesh = read_mesh(path)?;
  let welded = mesh.weld();
  let target_faces =
    ((welded.triangle_count() as f64) * (1.0 - target_reduction)).max(4.0) as usize;
  let reduced = decimate::decimate(&welded, target_faces);
  debug!(
    input = %path.display(),
    faces_in = welded.triangle_count(),
    faces_out = reduced.triangle_count(),
    "reduced mesh"
  );

  let name = path
    .file_name()
    .ok_or_else(|| ConvertError::mesh_read(path, "no filename"))?;
  let out_path = out_dir.join(name);
  write_mesh(&out_path, &reduced)?;
  Ok(out_path)
}

/// Concatenate several mesh files and weld the result.
///
/// Unreadable members are skipped; `None` when nothing usable remains.
pub fn merge_files(paths: &[PathBuf]) -> Option<TriMesh> {
  let mut combined = TriMesh::new();
  for path in paths {
    match read_mesh(path) {
      Ok(mesh) => combined.append(&mesh),
      Err(err) => {
        tracing::warn!(path = %path.display(), %err, "skipping unreadable mesh in merge");
      }
    }
  }
  if combined.is_empty() {
    return None;
  }
  let welded = combined.weld();
  if welded.is_empty() {
    None
  } else {
    Some(welded)
  }
}

/// Load a mesh file and encode it as a compact binary GLB payload.
pub fn encode_compact(path: &Path) -> Result<Vec<u8>> {
  let mesh = read_mesh(path)?;
  Ok(glb::encode(&mesh))
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
