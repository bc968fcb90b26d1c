//! case_convert - Dental CAD case folders to self-contained HTML viewers
//!
//! This crate ingests case folders produced by the two major dental-CAD
//! ecosystems (3Shape order packages and exocad construction packages) and
//! emits one self-contained HTML document per case: every mesh surface is
//! simplified, coordinate-aligned, classified by anatomical role and embedded
//! as base64 GLB next to an interactive viewer.
//!
//! # Pipeline
//!
//! ```text
//! orchestrate::Orchestrator      enumerate folders, expand ZIPs, spawn workers
//!   └─ convert::convert_case     one folder: classify → align → reduce → emit
//!        ├─ detect               vendor mode detection
//!        ├─ meta::{shape, exo}   group/display maps, per-mesh transforms
//!        ├─ mesh                 STL/PLY codecs, decimation, GLB encoding
//!        ├─ mesh::boolean        cross-arch contact ("bite") synthesis
//!        └─ html                 template substitution
//! ```
//!
//! The coordinator is sequential per case; batch mode isolates each case in a
//! worker process with a wall-clock timeout so native mesh failures cannot
//! take down the batch.

pub mod config;
pub mod convert;
pub mod detect;
pub mod error;
pub mod fdi;
pub mod html;
pub mod mesh;
pub mod meta;
pub mod orchestrate;
pub mod types;

pub use convert::{convert_case, ConvertRequest};
pub use detect::VendorMode;
pub use error::ConvertError;
pub use orchestrate::{BatchOptions, BatchReport, CaseDisposition, Orchestrator};
pub use types::{DisplayMap, GroupLabel, GroupMap, Jaw, MeshFormat, Progress};
