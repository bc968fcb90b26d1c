//! Batch orchestration: candidate enumeration, mesh discovery, isolated
//! per-case workers, markers and progress.
//!
//! The orchestrator is meant to run on a background thread; it reports
//! through a crossbeam channel and honors a level-triggered stop flag
//! between candidates. In automatic mode every case runs in a separately
//! spawned worker process under a wall-clock timeout so native mesh
//! failures never take down the batch.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::convert::{convert_case, ConvertRequest, MARKER_FILENAME};
use crate::detect::{case_candidates, detect_mode};
use crate::error::{ConvertError, Result};
use crate::meta::{exo::is_construction_info_name, find_file_by_name, read_xml_text};
use crate::types::{GroupMap, Progress};

/// Wall-clock budget for one case in automatic mode.
pub const CASE_TIMEOUT: Duration = Duration::from_secs(60);

/// Bounded depth for the global search after missing referenced scans.
const SEARCH_MAX_DEPTH: usize = 4;

/// Directories the global search never descends into.
const SEARCH_EXCLUDES: [&str; 9] = [
  "Windows",
  "Program Files",
  "Program Files (x86)",
  "$Recycle.Bin",
  "System Volume Information",
  "ProgramData",
  "node_modules",
  ".git",
  "__pycache__",
];

/// Opaque licensing pass-through; carried, never interpreted.
#[derive(Clone, Debug, Default)]
pub struct HeartbeatArgs {
  pub token: Option<String>,
  pub sid: Option<String>,
}

/// Batch run configuration.
#[derive(Clone, Debug)]
pub struct BatchOptions {
  pub root: PathBuf,
  /// Case-insensitive substring filter on folder basenames.
  pub keyword: Option<String>,
  /// Only folders modified within this many hours are candidates.
  pub time_limit_hours: Option<f64>,
  /// Aggregate every case HTML here instead of the case folders.
  pub output_dir: Option<PathBuf>,
  pub skip_processed: bool,
  /// Automatic = isolated worker processes; manual = in-process with a
  /// reviewer confirming the group map.
  pub automatic: bool,
  pub worker_timeout: Duration,
  pub with_dlas_logo: bool,
  pub user_logo_b64: Option<String>,
  /// Worker argv override; defaults to `current_exe worker`. The job file
  /// path is appended as the last argument.
  pub worker_argv: Option<Vec<String>>,
}

impl BatchOptions {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      keyword: None,
      time_limit_hours: None,
      output_dir: None,
      skip_processed: true,
      automatic: true,
      worker_timeout: CASE_TIMEOUT,
      with_dlas_logo: true,
      user_logo_b64: None,
      worker_argv: None,
    }
  }
}

/// How one candidate ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaseDisposition {
  Ok,
  Skipped,
  Timeout,
  Crash,
  Error,
}

#[derive(Clone, Debug)]
pub struct CaseRecord {
  pub candidate: PathBuf,
  pub disposition: CaseDisposition,
  pub detail: String,
}

/// Per-candidate dispositions for one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
  pub records: Vec<CaseRecord>,
}

impl BatchReport {
  pub fn count(&self, disposition: CaseDisposition) -> usize {
    self
      .records
      .iter()
      .filter(|r| r.disposition == disposition)
      .count()
  }
}

/// Group-map confirmation hook for manual mode (the GUI dialog
/// collaborator); receives basenames and the vendor default map, returns
/// the confirmed map over the same keys.
pub type GroupReviewer = dyn Fn(&[String], &GroupMap) -> GroupMap + Send + Sync;

/// Single worker result line on stdout; a child that exits without one
/// crashed.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerResult {
  Success { out_name: String },
  Skipped { reason: String },
  Error { msg: String },
}

pub struct Orchestrator {
  options: BatchOptions,
  progress: Sender<Progress>,
  stop: Arc<AtomicBool>,
  heartbeat: HeartbeatArgs,
  reviewer: Option<Box<GroupReviewer>>,
}

impl Orchestrator {
  pub fn new(
    options: BatchOptions,
    progress: Sender<Progress>,
    stop: Arc<AtomicBool>,
    heartbeat: HeartbeatArgs,
  ) -> Self {
    Self {
      options,
      progress,
      stop,
      heartbeat,
      reviewer: None,
    }
  }

  /// Install the manual-mode group reviewer.
  pub fn with_reviewer(mut self, reviewer: Box<GroupReviewer>) -> Self {
    self.reviewer = Some(reviewer);
    self
  }

  fn report(&self, percent: f32, message: impl Into<String>) {
    let _ = self.progress.send(Progress::new(percent, message));
  }

  /// Run the whole batch. Candidates are independent; the stop flag is
  /// honored between candidates only.
  pub fn run(&self) -> BatchReport {
    if let (Some(token), Some(sid)) = (&self.heartbeat.token, &self.heartbeat.sid) {
      debug!(token_len = token.len(), sid_len = sid.len(), "heartbeat args present");
    }

    let mut report = BatchReport::default();
    if let Some(out_dir) = &self.options.output_dir {
      if let Err(err) = std::fs::create_dir_all(out_dir) {
        warn!(dir = %out_dir.display(), %err, "cannot create output directory");
        return report;
      }
    }
    let scratch = match tempfile::tempdir() {
      Ok(dir) => dir,
      Err(err) => {
        warn!(%err, "no scratch directory, aborting batch");
        return report;
      }
    };

    let folders = enumerate_case_folders(
      &self.options.root,
      self.options.keyword.as_deref(),
      self.options.time_limit_hours,
    );
    let mut candidates = Vec::new();
    for folder in &folders {
      candidates.extend(case_candidates(folder, scratch.path()));
    }
    info!(
      folders = folders.len(),
      candidates = candidates.len(),
      "batch enumeration complete"
    );

    let total = candidates.len().max(1) as f32;
    for (index, candidate) in candidates.iter().enumerate() {
      if self.stop.load(Ordering::Relaxed) {
        info!("stop requested, ending batch");
        break;
      }

      let record = self.process_candidate(candidate, scratch.path());
      self.report(
        (index + 1) as f32 / total * 100.0,
        format!(
          "{} [{}]",
          candidate.display(),
          disposition_tag(record.disposition)
        ),
      );
      report.records.push(record);
    }
    report
  }

  fn process_candidate(&self, candidate: &Path, scratch: &Path) -> CaseRecord {
    let record = |disposition, detail: String| CaseRecord {
      candidate: candidate.to_path_buf(),
      disposition,
      detail,
    };

    if self.options.skip_processed && candidate.join(MARKER_FILENAME).is_file() {
      return record(CaseDisposition::Skipped, "already processed".into());
    }

    let mesh_paths = discover_meshes(candidate, &well_known_roots());
    if mesh_paths.is_empty() {
      return record(CaseDisposition::Skipped, "no meshes found".into());
    }

    let mode = detect_mode(candidate);
    let case_name = candidate
      .file_name()
      .and_then(|n| n.to_str())
      .unwrap_or("case");
    let out_dir = self
      .options
      .output_dir
      .as_deref()
      .unwrap_or(candidate);
    let out_html = out_dir.join(format!("{case_name}.html"));

    let mut request = ConvertRequest::new(
      mesh_paths,
      out_html,
      candidate.to_path_buf(),
      mode,
    );
    request.with_dlas_logo = self.options.with_dlas_logo;
    request.user_logo_b64 = self.options.user_logo_b64.clone();

    if self.options.automatic {
      self.run_in_worker(&request, scratch)
    } else {
      self.run_in_process(&mut request)
    }
  }

  /// Manual mode: confirm the group map, then convert on this thread with
  /// live per-mesh progress.
  fn run_in_process(&self, request: &mut ConvertRequest) -> CaseRecord {
    if let Some(reviewer) = &self.reviewer {
      let provider = crate::meta::MetadataProvider::for_folder(&request.folder, request.mode);
      let basenames: Vec<String> = request
        .mesh_paths
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
        .map(str::to_string)
        .collect();
      let (default_map, _) = provider.maps_for(&basenames);
      request.group_override = Some(reviewer(&basenames, &default_map));
    }

    let progress = self.progress.clone();
    let outcome = convert_case(request, |percent, message| {
      let _ = progress.send(Progress::new(percent, message));
    });
    match outcome {
      Ok(done) => CaseRecord {
        candidate: request.folder.clone(),
        disposition: CaseDisposition::Ok,
        detail: format!("{} models", done.model_count),
      },
      Err(err) => CaseRecord {
        candidate: request.folder.clone(),
        disposition: CaseDisposition::Error,
        detail: err.to_string(),
      },
    }
  }

  /// Automatic mode: ship the job to an isolated worker process bounded by
  /// the wall-clock timeout.
  fn run_in_worker(&self, request: &ConvertRequest, scratch: &Path) -> CaseRecord {
    let record = |disposition, detail: String| CaseRecord {
      candidate: request.folder.clone(),
      disposition,
      detail,
    };

    let job_path = scratch.join(format!(
      "job_{}.json",
      request
        .folder
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("case")
    ));
    let job = match serde_json::to_vec(request) {
      Ok(json) => json,
      Err(err) => return record(CaseDisposition::Error, err.to_string()),
    };
    if let Err(err) = std::fs::write(&job_path, job) {
      return record(CaseDisposition::Error, err.to_string());
    }

    let argv = self.options.worker_argv.clone().unwrap_or_else(|| {
      let exe = std::env::current_exe()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "dlas-convert".into());
      vec![exe, "worker".into()]
    });

    let mut command = Command::new(&argv[0]);
    command
      .args(&argv[1..])
      .arg(&job_path)
      .stdout(Stdio::piped())
      .stderr(Stdio::null());

    let mut child = match command.spawn() {
      Ok(child) => child,
      Err(err) => return record(CaseDisposition::Crash, format!("spawn failed: {err}")),
    };

    let deadline = Instant::now() + self.options.worker_timeout;
    let timed_out = loop {
      match child.try_wait() {
        Ok(Some(_)) => break false,
        Ok(None) => {
          if Instant::now() >= deadline {
            break true;
          }
          std::thread::sleep(Duration::from_millis(100));
        }
        Err(err) => {
          warn!(%err, "worker wait failed");
          break false;
        }
      }
    };

    if timed_out {
      // Terminate; if the process lingers the second kill is the hammer
      let _ = child.kill();
      std::thread::sleep(Duration::from_millis(200));
      let _ = child.kill();
      let _ = child.wait();
      return record(CaseDisposition::Timeout, "TIMEOUT".into());
    }

    let mut stdout = String::new();
    if let Some(out) = child.stdout.as_mut() {
      let _ = out.read_to_string(&mut stdout);
    }
    let status = match child.wait() {
      Ok(status) => status,
      Err(err) => return record(CaseDisposition::Crash, err.to_string()),
    };

    let result_line = stdout
      .lines()
      .rev()
      .find(|line| !line.trim().is_empty())
      .and_then(|line| serde_json::from_str::<WorkerResult>(line).ok());

    match (status.success(), result_line) {
      (true, Some(WorkerResult::Success { out_name })) => {
        record(CaseDisposition::Ok, out_name)
      }
      (true, Some(WorkerResult::Skipped { reason })) => {
        record(CaseDisposition::Skipped, reason)
      }
      (_, Some(WorkerResult::Error { msg })) => record(CaseDisposition::Error, msg),
      // No result line: the child died before reporting
      _ => record(CaseDisposition::Crash, "CRASH".into()),
    }
  }
}

fn disposition_tag(disposition: CaseDisposition) -> &'static str {
  match disposition {
    CaseDisposition::Ok => "OK",
    CaseDisposition::Skipped => "SKIPPED",
    CaseDisposition::Timeout => "TIMEOUT",
    CaseDisposition::Crash => "CRASH",
    CaseDisposition::Error => "ERROR",
  }
}

/// Worker entry: read the job file, convert, print the single result
/// line. Returns the process exit code.
pub fn worker_main(job_path: &Path) -> i32 {
  let result = run_worker_job(job_path);
  let (line, code) = match result {
    Ok(out_name) => (WorkerResult::Success { out_name }, 0),
    Err(err) => (WorkerResult::Error { msg: err.to_string() }, 1),
  };
  match serde_json::to_string(&line) {
    Ok(json) => println!("{json}"),
    Err(_) => return 2,
  }
  code
}

fn run_worker_job(job_path: &Path) -> Result<String> {
  let text = std::fs::read_to_string(job_path).map_err(|e| ConvertError::io(job_path, e))?;
  let request: ConvertRequest =
    serde_json::from_str(&text).map_err(|e| ConvertError::WorkerProtocol(e.to_string()))?;
  let outcome = convert_case(&request, |_, _| {})?;
  Ok(
    outcome
      .out_html
      .file_name()
      .and_then(|n| n.to_str())
      .unwrap_or("output.html")
      .to_string(),
  )
}

// =============================================================================
// Candidate enumeration & mesh discovery
// =============================================================================

/// Directories under `root` (including the root) passing the time and
/// keyword filters.
pub fn enumerate_case_folders(
  root: &Path,
  keyword: Option<&str>,
  time_limit_hours: Option<f64>,
) -> Vec<PathBuf> {
  let keyword = keyword.map(str::to_lowercase);
  let now = SystemTime::now();

  WalkDir::new(root)
    .follow_links(false)
    .into_iter()
    .filter_map(|entry| entry.ok())
    .filter(|entry| entry.file_type().is_dir())
    .filter(|entry| {
      if let Some(limit) = time_limit_hours {
        let fresh = entry
          .metadata()
          .ok()
          .and_then(|m| m.modified().ok())
          .and_then(|mtime| now.duration_since(mtime).ok())
          .map(|age| age.as_secs_f64() <= limit * 3600.0)
          .unwrap_or(false);
        if !fresh {
          return false;
        }
      }
      if let Some(keyword) = &keyword {
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if !name.contains(keyword) {
          return false;
        }
      }
      true
    })
    .map(|entry| entry.into_path())
    .collect()
}

/// Well-known roots consulted when metadata references a mesh that is not
/// in the case folder.
fn well_known_roots() -> Vec<PathBuf> {
  let mut roots = Vec::new();
  if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
    let home = PathBuf::from(home);
    roots.push(home.join("Documents"));
    roots.push(home.join("Desktop"));
  }
  // Vendor install trees on dental lab machines
  roots.push(PathBuf::from("C:\\exocad"));
  roots.push(PathBuf::from("C:\\3Shape"));
  roots.retain(|p| p.is_dir());
  roots
}

/// Meshes of one candidate folder: every `*.stl`/`*.ply` below it, plus
/// scan files the constructionInfo references, located by a bounded global
/// search when missing locally. Unfound references are logged and omitted.
pub fn discover_meshes(candidate: &Path, search_roots: &[PathBuf]) -> Vec<PathBuf> {
  let mut meshes: Vec<PathBuf> = WalkDir::new(candidate)
    .follow_links(false)
    .into_iter()
    .filter_map(|entry| entry.ok())
    .filter(|entry| entry.file_type().is_file())
    .map(|entry| entry.into_path())
    .filter(|path| crate::types::MeshFormat::from_path(path).is_some())
    .collect();
  meshes.sort();

  for reference in referenced_scan_files(candidate) {
    let have_already = meshes.iter().any(|p| {
      p.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.eq_ignore_ascii_case(&reference))
    });
    if have_already {
      continue;
    }
    match search_for_file(&reference, search_roots) {
      Some(found) => {
        info!(file = %found.display(), "located referenced scan outside case folder");
        meshes.push(found);
      }
      None => {
        warn!(file = %reference, "referenced scan not found anywhere, omitting");
      }
    }
  }
  meshes
}

/// Scan-file references inside the candidate's constructionInfo, if any.
/// Both `ScanFiles/ScanFile/FileName` and `Tooth/ToothScanFileName` are
/// hints, never hard constraints.
fn referenced_scan_files(candidate: &Path) -> Vec<String> {
  let Some(ci_path) = find_file_by_name(candidate, is_construction_info_name) else {
    return Vec::new();
  };
  let Ok(text) = read_xml_text(&ci_path) else {
    return Vec::new();
  };
  let Ok(doc) = roxmltree::Document::parse(&text) else {
    return Vec::new();
  };

  let mut refs = Vec::new();
  for node in doc.descendants().filter(|n| n.is_element()) {
    let name = node.tag_name().name();
    let is_scan_ref = (name.eq_ignore_ascii_case("filename")
      && node
        .parent_element()
        .is_some_and(|p| p.tag_name().name().eq_ignore_ascii_case("scanfile")))
      || name.eq_ignore_ascii_case("toothscanfilename");
    if !is_scan_ref {
      continue;
    }
    if let Some(text) = node.text() {
      let basename = text
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .to_string();
      if !basename.is_empty() && !refs.contains(&basename) {
        refs.push(basename);
      }
    }
  }
  refs
}

/// Depth-bounded, exclusion-aware search for one basename under the given
/// roots. Matching is case-insensitive (scanner PLY names drift in case).
fn search_for_file(basename: &str, roots: &[PathBuf]) -> Option<PathBuf> {
  for root in roots {
    let hit = WalkDir::new(root)
      .max_depth(SEARCH_MAX_DEPTH)
      .follow_links(false)
      .into_iter()
      .filter_entry(|entry| {
        !(entry.file_type().is_dir()
          && SEARCH_EXCLUDES
            .iter()
            .any(|ex| entry.file_name().to_string_lossy() == *ex))
      })
      .filter_map(|entry| entry.ok())
      .find(|entry| {
        entry.file_type().is_file()
          && entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.eq_ignore_ascii_case(basename))
      });
    if let Some(hit) = hit {
      return Some(hit.into_path());
    }
  }
  None
}

#[cfg(test)]
#[path = "orchestrate_test.rs"]
mod orchestrate_test;
