//! Error type for the conversion pipeline.
//!
//! Most failures are recovered close to where they occur (a bad mesh is
//! skipped, bad XML degrades to filename heuristics); only output emission
//! and worker-protocol failures propagate to the caller.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read mesh {path}: {reason}")]
  MeshRead { path: PathBuf, reason: String },

  #[error("failed to write mesh {path}: {source}")]
  MeshWrite {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("decimation failed for {path}: {reason}")]
  Decimate { path: PathBuf, reason: String },

  #[error("xml parse failure in {path}: {reason}")]
  Xml { path: PathBuf, reason: String },

  #[error("zip expansion failed for {path}: {reason}")]
  Zip { path: PathBuf, reason: String },

  #[error("viewer template placeholder missing: {0}")]
  Template(String),

  #[error("logo unusable at {path}: {reason}")]
  Logo { path: PathBuf, reason: String },

  #[error("worker protocol violation: {0}")]
  WorkerProtocol(String),
}

impl ConvertError {
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io {
      path: path.into(),
      source,
    }
  }

  pub fn mesh_read(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
    Self::MeshRead {
      path: path.into(),
      reason: reason.into(),
    }
  }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
