//! Run orchestration
//!
//! Continuous fuzzing executes every test run in a child process (a
//! re-exec of this binary with an explicit seed), so back-end crashes and
//! timeouts are captured without poisoning the generator. The parent reaps
//! exit status and output, classifies failures into the error map and
//! optionally hands the trace to the delta debugger.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, info, warn};

use crate::dd::{self, DdOptions};
use crate::errors::ErrorMap;
use oxifuzz_core::options::Options;
use oxifuzz_core::statistics::Statistics;
use oxifuzz_core::{FuzzerError, Result};

/// Captured outcome of one child run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Exit code; `None` when the child was killed by a signal.
    pub status: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// True if the parent killed the child at the deadline.
    pub timed_out: bool,
}

impl RunOutcome {
    /// True if the child terminated cleanly.
    #[must_use]
    pub fn success(&self) -> bool {
        !self.timed_out && self.status == Some(0)
    }
}

/// Re-exec this binary with the given arguments, capture its output, and
/// kill it if it outlives the deadline.
pub fn run_child(args: &[String], timeout: Option<Duration>) -> Result<RunOutcome> {
    let exe = std::env::current_exe()?;
    debug!(?args, "spawning child");
    let mut child = Command::new(exe)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| FuzzerError::internal("child without stdout"))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| FuzzerError::internal("child without stderr"))?;
    let stdout_thread = std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = stdout_pipe.read_to_string(&mut buf);
        buf
    });
    let stderr_thread = std::thread::spawn(move || {
        let mut buf = String::new();
        let _ = stderr_pipe.read_to_string(&mut buf);
        buf
    });

    let deadline = timeout.map(|t| Instant::now() + t);
    let mut timed_out = false;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            timed_out = true;
            let _ = child.kill();
            break child.wait().ok();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    Ok(RunOutcome {
        status: status.and_then(|s| s.code()),
        stdout: stdout_thread.join().unwrap_or_default(),
        stderr: stderr_thread.join().unwrap_or_default(),
        timed_out,
    })
}

/// The argument vector a child needs to reproduce this configuration:
/// the recorded options line minus its keyword.
#[must_use]
pub fn child_base_args(cmd_line_trace: &str) -> Vec<String> {
    cmd_line_trace
        .split_whitespace()
        .skip(1)
        .map(str::to_string)
        .collect()
}

fn child_timeout(options: &Options) -> Option<Duration> {
    // One second of grace on top of the child's own budget.
    options.time.map(|t| Duration::from_secs_f64(t + 1.0))
}

/// Minimize a trace file by replaying candidates in child processes.
pub fn reduce_trace(
    options: &Options,
    input: &Path,
    output: &Path,
    scratch: &Path,
) -> Result<usize> {
    let dd_options = DdOptions {
        match_out: options.dd_match_out.clone(),
        match_err: options.dd_match_err.clone(),
        ignore_out: options.dd_ignore_out,
        ignore_err: options.dd_ignore_err,
    };
    let timeout = child_timeout(options);
    let replay_trace = scratch.join("dd-replay.trace");
    let mut runner = |path: &Path| -> Result<RunOutcome> {
        let args = vec![
            "--untrace".to_string(),
            path.display().to_string(),
            "--api-trace".to_string(),
            replay_trace.display().to_string(),
        ];
        run_child(&args, timeout)
    };
    dd::minimize(input, output, scratch, &dd_options, &mut runner)
}

fn scratch_dir(tmp_dir: Option<&Path>) -> Result<tempfile::TempDir> {
    let builder = {
        let mut b = tempfile::Builder::new();
        b.prefix("oxifuzz-");
        b
    };
    let dir = match tmp_dir {
        Some(dir) => builder.tempdir_in(dir)?,
        None => builder.tempdir()?,
    };
    Ok(dir)
}

/// Delta debug a single seeded or replayed run: capture its trace, then
/// minimize it. The reduction is attempted no matter whether the run
/// errored; the oracle pins whatever behavior the original shows.
pub fn dd_single(options: &Options, tmp_dir: Option<&Path>, out_dir: Option<&Path>) -> Result<()> {
    let scratch = scratch_dir(tmp_dir)?;
    let input: PathBuf = match &options.untrace_file {
        Some(path) => {
            info!(trace = %path.display(), "minimizing untraced file");
            path.clone()
        }
        None => {
            info!(seed = %format!("{:x}", options.seed), "minimizing seeded run");
            let trace_path = options
                .api_trace_file
                .clone()
                .unwrap_or_else(|| scratch.path().join("tmp.trace"));
            let mut args = child_base_args(&options.cmd_line_trace);
            args.extend([
                "-s".to_string(),
                format!("{:x}", options.seed),
                "-a".to_string(),
                trace_path.display().to_string(),
            ]);
            run_child(&args, child_timeout(options))?;
            trace_path
        }
    };
    let output = options.dd_trace_file.clone().unwrap_or_else(|| {
        let name = match &options.untrace_file {
            Some(path) => format!(
                "min-{}",
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "trace".to_string())
            ),
            None => format!("min-{:x}.trace", options.seed),
        };
        out_dir.map_or_else(|| PathBuf::from(&name), |d| d.join(&name))
    });
    reduce_trace(options, &input, &output, scratch.path())?;
    Ok(())
}

/// Continuous-mode settings beyond the per-run options.
#[derive(Debug)]
pub struct ContinuousConfig<'a> {
    /// Per-run options, re-used for every child.
    pub options: &'a Options,
    /// Print the error summary as CSV.
    pub csv: bool,
    /// Export collected errors to this JSON file.
    pub export_errors: Option<PathBuf>,
    /// Directory receiving error traces (current directory when absent).
    pub out_dir: Option<PathBuf>,
    /// Directory for scratch files.
    pub tmp_dir: Option<PathBuf>,
}

/// The continuous fuzzing loop: draw a seed, run a child, classify.
pub fn continuous(cfg: &ContinuousConfig<'_>) -> Result<()> {
    let scratch = scratch_dir(cfg.tmp_dir.as_deref())?;
    let base_args = child_base_args(&cfg.options.cmd_line_trace);
    let timeout = child_timeout(cfg.options);
    let mut errors = ErrorMap::default();
    let mut stats = Statistics::default();
    let mut rng = rand::rng();
    let mut n_runs: u64 = 0;

    loop {
        if cfg.options.max_runs.is_some_and(|max| n_runs >= max) {
            break;
        }
        n_runs += 1;
        let seed: u64 = rng.random();
        let trace_path = scratch.path().join(format!("oxifuzz-{seed:x}.trace"));
        let stats_path = cfg
            .options
            .print_stats
            .then(|| scratch.path().join(format!("stats-{seed:x}.json")));

        let mut args = base_args.clone();
        args.extend([
            "-s".to_string(),
            format!("{seed:x}"),
            "-a".to_string(),
            trace_path.display().to_string(),
        ]);
        if let Some(path) = &stats_path {
            args.extend(["--stats-file".to_string(), path.display().to_string()]);
        }

        let outcome = run_child(&args, timeout)?;
        if let Some(path) = &stats_path {
            if let Ok(json) = std::fs::read_to_string(path) {
                if let Ok(child_stats) = serde_json::from_str::<Statistics>(&json) {
                    stats.merge(&child_stats);
                }
            }
        }

        if outcome.success() {
            if n_runs.is_multiple_of(100) {
                info!(runs = n_runs, errors = errors.len(), "progress");
            }
            continue;
        }

        let msg = if outcome.timed_out {
            "timeout".to_string()
        } else if !outcome.stderr.trim().is_empty() {
            outcome.stderr.trim().to_string()
        } else if !outcome.stdout.trim().is_empty() {
            outcome.stdout.trim().to_string()
        } else {
            format!("child terminated with status {:?}", outcome.status)
        };
        let is_new = errors.add(seed, &msg);
        let kept = cfg
            .out_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(format!("oxifuzz-{seed:x}.trace"));
        if let Err(e) = std::fs::copy(&trace_path, &kept) {
            warn!(seed = %format!("{seed:x}"), "cannot keep error trace: {e}");
        } else {
            info!(seed = %format!("{seed:x}"), trace = %kept.display(), is_new, "error");
        }

        // Only reduce error-inducing traces, and only the first of a kind.
        if cfg.options.dd && is_new && !outcome.timed_out {
            let min_path = cfg
                .out_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(format!("min-{seed:x}.trace"));
            if let Err(e) = reduce_trace(cfg.options, &kept, &min_path, scratch.path()) {
                warn!(seed = %format!("{seed:x}"), "delta debugging failed: {e}");
            }
        }
    }

    let mut stdout = std::io::stdout();
    errors.print_summary(cfg.csv, &mut stdout)?;
    if let Some(path) = &cfg.export_errors {
        errors.export_json(path)?;
    }
    if cfg.options.print_stats {
        stats.print(&mut stdout)?;
    }
    Ok(())
}
