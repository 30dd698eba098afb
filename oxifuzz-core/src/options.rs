//! Run options
//!
//! The resolved configuration of one fuzzing/replay invocation. The CLI
//! populates this from its argument parser; library consumers (tests, the
//! delta debugger) construct it directly.

use rustc_hash::FxHashSet;
use std::path::PathBuf;

use crate::config;
use crate::theory::{DEFAULT_DISABLED_THEORIES, TheoryId};

/// Name of the built-in SMT-LIB2 back-end.
pub const SOLVER_SMT2: &str = "smt2";

/// The keyword of the trace prelude line recording the invocation options.
pub const TRACE_OPTIONS_KEYWORD: &str = "set-oxifuzz-options";

/// Resolved options of one run.
#[derive(Debug, Clone)]
pub struct Options {
    /// RNG seed.
    pub seed: u64,
    /// True if the seed was provided by the user (single-run mode).
    pub is_seeded: bool,
    /// Verbosity level (0 = warnings only).
    pub verbosity: u8,
    /// Wall-clock limit per run, in seconds.
    pub time: Option<f64>,
    /// Maximum number of runs in continuous mode.
    pub max_runs: Option<u64>,
    /// Action budget per run.
    pub max_actions: u64,
    /// Interpose a `set-seed` line before every traced action.
    pub trace_seeds: bool,
    /// Use sequential `_x<n>` symbols instead of random ones.
    pub simple_symbols: bool,
    /// Print statistics at the end.
    pub print_stats: bool,
    /// Print the FSM configuration and exit.
    pub print_fsm: bool,
    /// Restrict arithmetic to the linear fragment.
    pub arith_linear: bool,
    /// Enable back-end option fuzzing.
    pub fuzz_options: bool,
    /// Wildcards restricting which options are fuzzed (`^` anchors at the
    /// start of the option name).
    pub fuzz_options_filter: Vec<String>,
    /// Trace output file; stdout when absent.
    pub api_trace_file: Option<PathBuf>,
    /// Trace file to replay.
    pub untrace_file: Option<PathBuf>,
    /// File receiving the SMT-LIB2 rendering of the run.
    pub smt2_file: Option<PathBuf>,
    /// Enable delta debugging of the produced (or replayed) trace.
    pub dd: bool,
    /// Ignore stdout when comparing delta-debugging candidates.
    pub dd_ignore_out: bool,
    /// Ignore stderr when comparing delta-debugging candidates.
    pub dd_ignore_err: bool,
    /// Match stdout against this needle instead of full comparison.
    pub dd_match_out: Option<String>,
    /// Match stderr against this needle instead of full comparison.
    pub dd_match_err: Option<String>,
    /// Output file for the minimized trace.
    pub dd_trace_file: Option<PathBuf>,
    /// External solver binary the SMT-LIB2 stream is piped to; rendering-only
    /// mode when absent.
    pub solver_binary: Option<String>,
    /// Second solver binary for cross-checking.
    pub cross_check: Option<String>,
    /// Independently verify models, unsat cores and unsat assumptions with
    /// a second solver instance.
    pub check: bool,
    /// Solver binary used for checking; the primary binary when absent.
    pub check_binary: Option<String>,
    /// Back-end options set at startup (`-o name=value`).
    pub solver_options: Vec<(String, String)>,
    /// Explicitly enabled theories; empty means all supported ones.
    pub enabled_theories: Vec<TheoryId>,
    /// Explicitly disabled theories.
    pub disabled_theories: FxHashSet<TheoryId>,
    /// File the child writes its statistics to (set by the parent watcher).
    pub stats_file: Option<PathBuf>,
    /// The canonical prelude line recording this invocation, starting with
    /// [`TRACE_OPTIONS_KEYWORD`]. Excludes seed, trace-file and
    /// delta-debugging flags so a replay can re-derive the configuration.
    pub cmd_line_trace: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            seed: 0,
            is_seeded: false,
            verbosity: 0,
            time: None,
            max_runs: None,
            max_actions: config::DEFAULT_MAX_ACTIONS,
            trace_seeds: false,
            simple_symbols: true,
            print_stats: false,
            print_fsm: false,
            arith_linear: false,
            fuzz_options: false,
            fuzz_options_filter: Vec::new(),
            api_trace_file: None,
            untrace_file: None,
            smt2_file: None,
            dd: false,
            dd_ignore_out: false,
            dd_ignore_err: false,
            dd_match_out: None,
            dd_match_err: None,
            dd_trace_file: None,
            solver_binary: None,
            cross_check: None,
            check: false,
            check_binary: None,
            solver_options: Vec::new(),
            enabled_theories: Vec::new(),
            disabled_theories: DEFAULT_DISABLED_THEORIES.iter().copied().collect(),
            stats_file: None,
            cmd_line_trace: TRACE_OPTIONS_KEYWORD.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert!(!options.is_seeded);
        assert!(options.simple_symbols);
        assert_eq!(options.max_actions, config::DEFAULT_MAX_ACTIONS);
        assert!(options.disabled_theories.contains(&TheoryId::Bag));
        assert_eq!(options.cmd_line_trace, TRACE_OPTIONS_KEYWORD);
    }
}
