//! dlas-convert: batch dental case folders into self-contained HTML viewers.
//!
//! Subcommands:
//! - `batch`: walk a root, convert every case in isolated worker processes
//! - `convert`: convert a single case folder in-process
//! - `worker`: internal; runs one job file and reports on stdout

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use case_convert::config::AppConfig;
use case_convert::convert::{convert_case, ConvertRequest};
use case_convert::orchestrate::{
	discover_meshes, worker_main, BatchOptions, BatchReport, CaseDisposition, HeartbeatArgs,
	Orchestrator,
};
use case_convert::types::{GroupLabel, GroupMap};
use case_convert::{detect, html};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dlas-convert")]
#[command(about = "Dental CAD case folders to self-contained HTML viewers")]
struct Args {
	/// Opaque licensing token, passed through to the heartbeat service.
	#[arg(long, global = true)]
	token: Option<String>,

	/// Opaque session id, passed through to the heartbeat service.
	#[arg(long, global = true)]
	sid: Option<String>,

	#[command(subcommand)]
	command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
	/// Convert every case folder under a root.
	Batch {
		root: PathBuf,

		/// Only folders whose name contains this substring (case-insensitive).
		#[arg(long)]
		keyword: Option<String>,

		/// Only folders modified within this many hours.
		#[arg(long)]
		hours: Option<f64>,

		/// Collect every HTML here instead of the case folders.
		#[arg(long)]
		output_dir: Option<PathBuf>,

		/// Re-convert folders that already carry the processed marker.
		#[arg(long)]
		reprocess: bool,

		/// Review and override the group map per case on stdin.
		#[arg(long)]
		manual: bool,

		/// Per-case wall-clock timeout in seconds.
		#[arg(long, default_value_t = 60)]
		timeout_secs: u64,

		/// Embed this logo image (also persisted to the config file).
		#[arg(long)]
		user_logo: Option<PathBuf>,

		/// Leave the DLAS logo out of the emitted viewers.
		#[arg(long)]
		no_logo: bool,
	},

	/// Convert one case folder in-process.
	Convert {
		folder: PathBuf,

		/// Output HTML path; defaults to `<folder>/<folder name>.html`.
		#[arg(long)]
		out: Option<PathBuf>,

		#[arg(long)]
		user_logo: Option<PathBuf>,

		#[arg(long)]
		no_logo: bool,
	},

	/// Internal worker entry point.
	#[command(hide = true)]
	Worker { job: PathBuf },
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(std::io::stderr)
		.init();

	let args = Args::parse();
	let heartbeat = HeartbeatArgs {
		token: args.token,
		sid: args.sid,
	};

	match args.command {
		CliCommand::Worker { job } => {
			std::process::exit(worker_main(&job));
		}
		CliCommand::Convert {
			folder,
			out,
			user_logo,
			no_logo,
		} => run_single(folder, out, user_logo, no_logo),
		CliCommand::Batch {
			root,
			keyword,
			hours,
			output_dir,
			reprocess,
			manual,
			timeout_secs,
			user_logo,
			no_logo,
		} => {
			let mut options = BatchOptions::new(root);
			options.keyword = keyword;
			options.time_limit_hours = hours;
			options.output_dir = output_dir;
			options.skip_processed = !reprocess;
			options.automatic = !manual;
			options.worker_timeout = Duration::from_secs(timeout_secs);
			options.with_dlas_logo = !no_logo;
			options.user_logo_b64 = resolve_user_logo(user_logo)?;
			run_batch(options, heartbeat, manual)
		}
	}
}

/// Resolve the user logo: an explicit path wins and is persisted; otherwise
/// the configured path is used when it still exists.
fn resolve_user_logo(explicit: Option<PathBuf>) -> Result<Option<String>> {
	let mut config = AppConfig::load();
	let path = match explicit {
		Some(path) => {
			config.user_logo_path = path.to_string_lossy().into_owned();
			if let Err(err) = config.save() {
				tracing::warn!(%err, "could not persist logo path");
			}
			Some(path)
		}
		None if !config.user_logo_path.is_empty() => {
			let path = PathBuf::from(&config.user_logo_path);
			path.is_file().then_some(path)
		}
		None => None,
	};
	match path {
		Some(path) => Ok(Some(
			html::load_logo_b64(&path).with_context(|| format!("loading logo {}", path.display()))?,
		)),
		None => Ok(None),
	}
}

fn run_batch(options: BatchOptions, heartbeat: HeartbeatArgs, manual: bool) -> Result<()> {
	let (progress_tx, progress_rx) = crossbeam_channel::unbounded();
	let stop = Arc::new(AtomicBool::new(false));

	let mut orchestrator = Orchestrator::new(options, progress_tx, stop, heartbeat);
	if manual {
		orchestrator = orchestrator.with_reviewer(Box::new(review_groups_on_stdin));
	}

	// The orchestrator runs on a background thread; this thread drains the
	// progress stream so output stays live.
	let handle = std::thread::spawn(move || orchestrator.run());
	for progress in progress_rx {
		println!("[{:5.1}%] {}", progress.percent, progress.message);
	}
	let report = handle
		.join()
		.map_err(|_| anyhow::anyhow!("orchestrator thread panicked"))?;

	print_summary(&report);
	Ok(())
}

fn print_summary(report: &BatchReport) {
	println!("\n{} candidates:", report.records.len());
	for (tag, disposition) in [
		("ok", CaseDisposition::Ok),
		("skipped", CaseDisposition::Skipped),
		("timeout", CaseDisposition::Timeout),
		("crash", CaseDisposition::Crash),
		("error", CaseDisposition::Error),
	] {
		let count = report.count(disposition);
		if count > 0 {
			println!("  {tag}: {count}");
		}
	}
}

fn run_single(
	folder: PathBuf,
	out: Option<PathBuf>,
	user_logo: Option<PathBuf>,
	no_logo: bool,
) -> Result<()> {
	let mode = detect::detect_mode(&folder);
	let meshes = discover_meshes(&folder, &[]);
	anyhow::ensure!(!meshes.is_empty(), "no meshes in {}", folder.display());

	let case_name = folder
		.file_name()
		.and_then(|n| n.to_str())
		.unwrap_or("case");
	let out_html = out.unwrap_or_else(|| folder.join(format!("{case_name}.html")));

	let mut request = ConvertRequest::new(meshes, out_html.clone(), folder, mode);
	request.with_dlas_logo = !no_logo;
	request.user_logo_b64 = resolve_user_logo(user_logo)?;

	let outcome = convert_case(&request, |percent, message| {
		println!("[{percent:5.1}%] {message}");
	})
	.with_context(|| format!("converting {}", out_html.display()))?;

	println!(
		"wrote {} ({} models{})",
		outcome.out_html.display(),
		outcome.model_count,
		if outcome.bite_written { ", bite" } else { "" }
	);
	Ok(())
}

/// Manual-mode dialog on stdin: show the defaults, accept `name=group`
/// override lines, empty line confirms.
fn review_groups_on_stdin(basenames: &[String], defaults: &GroupMap) -> GroupMap {
	let mut confirmed = GroupMap::new();
	println!("review groups (enter `name=group` to override, empty line to accept):");
	for name in basenames {
		let group = defaults.get(name);
		println!("  {name} = {}", group.as_str());
		confirmed.insert(name, group);
	}
	print!("> ");
	let _ = std::io::stdout().flush();

	let mut line = String::new();
	loop {
		line.clear();
		if std::io::stdin().read_line(&mut line).is_err() || line.trim().is_empty() {
			break;
		}
		match parse_override(line.trim()) {
			Some((name, group)) => {
				confirmed.insert(&name, group);
				println!("  {name} -> {}", group.as_str());
			}
			None => println!("  unrecognized, expected name=group"),
		}
		print!("> ");
		let _ = std::io::stdout().flush();
	}
	confirmed
}

fn parse_override(line: &str) -> Option<(String, GroupLabel)> {
	let (name, group) = line.split_once('=')?;
	let group = GroupLabel::ALL
		.into_iter()
		.find(|g| g.as_str() == group.trim())?;
	Some((name.trim().to_string(), group))
}
