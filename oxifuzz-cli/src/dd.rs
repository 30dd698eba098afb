//! Delta debugging
//!
//! Property-preserving trace minimization: ddmin over the action lines of a
//! trace, with an oracle over the replaying child's exit status and output.
//! The prelude options line is pinned; `set-seed` lines travel with the
//! action they precede. Every candidate is a line subset of the input, hence
//! syntactically valid; candidates whose replay does not reproduce the
//! golden behavior are rolled back.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::runner::RunOutcome;
use crate::errors::normalize;
use oxifuzz_core::{FuzzerError, Result};

/// Oracle configuration, from the dd command-line options.
#[derive(Debug, Clone, Default)]
pub struct DdOptions {
    /// Needle matched against stdout instead of full comparison.
    pub match_out: Option<String>,
    /// Needle matched against stderr instead of full comparison.
    pub match_err: Option<String>,
    /// Ignore stdout entirely.
    pub ignore_out: bool,
    /// Ignore stderr entirely.
    pub ignore_err: bool,
}

/// The pass/fail oracle: does a candidate outcome reproduce the golden one?
#[derive(Debug)]
pub struct Oracle {
    golden: RunOutcome,
    options: DdOptions,
}

impl Oracle {
    /// Build an oracle around the original run's outcome.
    #[must_use]
    pub fn new(golden: RunOutcome, options: DdOptions) -> Self {
        Self { golden, options }
    }

    /// True if the candidate outcome preserves the property of interest.
    #[must_use]
    pub fn matches(&self, candidate: &RunOutcome) -> bool {
        if candidate.timed_out != self.golden.timed_out {
            return false;
        }
        if candidate.status != self.golden.status {
            return false;
        }
        let out_ok = if let Some(needle) = &self.options.match_out {
            candidate.stdout.contains(needle)
        } else {
            self.options.ignore_out
                || normalize(&candidate.stdout) == normalize(&self.golden.stdout)
        };
        let err_ok = if let Some(needle) = &self.options.match_err {
            candidate.stderr.contains(needle)
        } else {
            self.options.ignore_err
                || normalize(&candidate.stderr) == normalize(&self.golden.stderr)
        };
        out_ok && err_ok
    }
}

/// A reducible unit: one action line plus the `set-seed` lines bound to it.
#[derive(Debug, Clone)]
struct Chunk {
    lines: Vec<String>,
}

fn chunk_lines(body: &[&str]) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    for line in body {
        if line.starts_with("set-seed ") {
            pending.push((*line).to_string());
            continue;
        }
        pending.push((*line).to_string());
        chunks.push(Chunk {
            lines: std::mem::take(&mut pending),
        });
    }
    if !pending.is_empty() {
        chunks.push(Chunk { lines: pending });
    }
    chunks
}

fn write_candidate(path: &Path, prelude: &str, chunks: &[Chunk]) -> Result<()> {
    let mut content = String::with_capacity(1024);
    content.push_str(prelude);
    content.push('\n');
    for chunk in chunks {
        for line in &chunk.lines {
            content.push_str(line);
            content.push('\n');
        }
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Minimize `input` into `output` with the classic ddmin loop. `runner`
/// replays a candidate trace file and reports the child's outcome. Returns
/// the number of action lines in the minimized trace.
pub fn minimize(
    input: &Path,
    output: &Path,
    scratch_dir: &Path,
    options: &DdOptions,
    runner: &mut dyn FnMut(&Path) -> Result<RunOutcome>,
) -> Result<usize> {
    let content = std::fs::read_to_string(input)?;
    let mut lines = content.lines();
    let prelude = lines
        .next()
        .ok_or_else(|| FuzzerError::config("cannot delta debug an empty trace"))?
        .to_string();
    let body: Vec<&str> = lines.filter(|l| !l.trim().is_empty()).collect();

    let golden = runner(input)?;
    debug!(status = ?golden.status, "golden outcome");
    let oracle = Oracle::new(golden, options.clone());

    let mut chunks = chunk_lines(&body);
    let n_start = chunks.len();
    let candidate_path: PathBuf = scratch_dir.join("dd-candidate.trace");
    let mut granularity = 2usize;
    let mut tests = 0usize;

    while chunks.len() >= 2 && granularity <= chunks.len() {
        let part_size = chunks.len().div_ceil(granularity);
        let mut reduced = false;
        let mut start = 0;
        while start < chunks.len() {
            let end = (start + part_size).min(chunks.len());
            let candidate: Vec<Chunk> = chunks[..start]
                .iter()
                .chain(chunks[end..].iter())
                .cloned()
                .collect();
            if candidate.is_empty() {
                start = end;
                continue;
            }
            write_candidate(&candidate_path, &prelude, &candidate)?;
            let outcome = runner(&candidate_path)?;
            tests += 1;
            if oracle.matches(&outcome) {
                chunks = candidate;
                granularity = granularity.saturating_sub(1).max(2);
                reduced = true;
                break;
            }
            start = end;
        }
        if !reduced {
            if granularity >= chunks.len() {
                break;
            }
            granularity = (granularity * 2).min(chunks.len());
        }
    }

    write_candidate(output, &prelude, &chunks)?;
    info!(
        from = n_start,
        to = chunks.len(),
        tests,
        output = %output.display(),
        "delta debugging done"
    );
    Ok(chunks.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn outcome(status: i32, stderr: &str) -> RunOutcome {
        RunOutcome {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.to_string(),
            timed_out: false,
        }
    }

    /// A scripted runner: the run "fails" with the golden error whenever the
    /// candidate still contains every line of the culprit set.
    fn scripted_runner(
        culprits: Vec<&'static str>,
    ) -> impl FnMut(&Path) -> Result<RunOutcome> {
        move |path: &Path| {
            let content = std::fs::read_to_string(path)?;
            let reproduces = culprits.iter().all(|c| content.contains(c));
            if reproduces {
                Ok(outcome(1, "ERROR: assertion failed"))
            } else {
                Ok(outcome(0, ""))
            }
        }
    }

    #[test]
    fn test_minimize_keeps_culprit_lines() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.trace");
        let output = dir.path().join("min.trace");
        let mut content = String::from("set-oxifuzz-options --bv\nnew-solver\n");
        for i in 0..50 {
            content.push_str(&format!("mk-sort BV {} return s{}\n", i + 1, i + 1));
        }
        content.push_str("mk-sort BV 64 return s51\ncheck-sat\ndelete-solver\n");
        std::fs::write(&input, content).unwrap();

        let mut runner = scripted_runner(vec!["mk-sort BV 64", "check-sat"]);
        let n = minimize(
            &input,
            &output,
            dir.path(),
            &DdOptions {
                match_err: Some("assertion failed".to_string()),
                ..DdOptions::default()
            },
            &mut runner,
        )
        .unwrap();

        let reduced = std::fs::read_to_string(&output).unwrap();
        assert!(reduced.starts_with("set-oxifuzz-options --bv\n"));
        assert!(reduced.contains("mk-sort BV 64"));
        assert!(reduced.contains("check-sat"));
        assert!(n <= 4, "expected near-minimal trace, got {n} lines");
        // The minimized trace must itself reproduce.
        let final_outcome = runner(&output).unwrap();
        assert_eq!(final_outcome.status, Some(1));
    }

    #[test]
    fn test_set_seed_lines_travel_with_their_action() {
        let chunks = chunk_lines(&[
            "set-seed 1:0",
            "new-solver",
            "set-seed 1:8",
            "check-sat",
            "delete-solver",
        ]);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].lines, vec!["set-seed 1:0", "new-solver"]);
        assert_eq!(chunks[1].lines, vec!["set-seed 1:8", "check-sat"]);
    }

    #[test]
    fn test_oracle_match_modes() {
        let oracle = Oracle::new(
            outcome(1, "ERROR: boom at 0xdead"),
            DdOptions {
                match_err: Some("boom".to_string()),
                ..DdOptions::default()
            },
        );
        assert!(oracle.matches(&outcome(1, "other ERROR: boom at 0xbeef")));
        assert!(!oracle.matches(&outcome(0, "clean")));

        let oracle = Oracle::new(outcome(1, "fail at 0xaaaa"), DdOptions::default());
        assert!(oracle.matches(&outcome(1, "fail at 0xbbbb")));
        assert!(!oracle.matches(&outcome(1, "different failure")));
    }
}
