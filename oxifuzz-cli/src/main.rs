//! OxiFuzz CLI - Command-line interface for the OxiFuzz SMT solver API fuzzer

mod dd;
mod errors;
mod runner;

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use oxifuzz_core::options::{Options, TRACE_OPTIONS_KEYWORD};
use oxifuzz_core::theory::TheoryId;
use oxifuzz_core::{FuzzerError, Result, run};

/// Model-based API fuzzer for SMT solvers: generates random well-typed API
/// call sequences, records them as replayable traces, and minimizes
/// error-inducing traces by delta debugging.
#[derive(Debug, Parser)]
#[command(name = "oxifuzz", version, args_override_self = true)]
struct Args {
    /// Seed for the random number generator (hex); absent enables
    /// continuous mode.
    #[arg(short = 's', long)]
    seed: Option<String>,

    /// Trace the RNG state before each API action.
    #[arg(short = 'S', long)]
    trace_seeds: bool,

    /// Wall-clock limit per run, in seconds.
    #[arg(short = 't', long)]
    time: Option<f64>,

    /// Increase verbosity (repeatable).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbosity: u8,

    /// Limit the number of test runs in continuous mode.
    #[arg(short = 'm', long)]
    max_runs: Option<u64>,

    /// Action budget per run.
    #[arg(long, default_value_t = oxifuzz_core::config::DEFAULT_MAX_ACTIONS)]
    max_actions: u64,

    /// Enable delta debugging.
    #[arg(short = 'd', long)]
    dd: bool,

    /// Check for occurrence of this string in stdout when delta debugging.
    #[arg(long)]
    dd_match_out: Option<String>,

    /// Check for occurrence of this string in stderr when delta debugging.
    #[arg(long)]
    dd_match_err: Option<String>,

    /// Ignore stdout when delta debugging.
    #[arg(long)]
    dd_ignore_out: bool,

    /// Ignore stderr when delta debugging.
    #[arg(long)]
    dd_ignore_err: bool,

    /// Delta debug the API trace into this file.
    #[arg(short = 'D', long)]
    dd_trace: Option<PathBuf>,

    /// Trace the API call sequence into this file (default: stdout).
    #[arg(short = 'a', long)]
    api_trace: Option<PathBuf>,

    /// Replay the given API trace; its options line re-seeds the
    /// configuration.
    #[arg(short = 'u', long)]
    untrace: Option<PathBuf>,

    /// Write the SMT-LIB2 rendering of the run to this file.
    #[arg(short = 'f', long)]
    smt2_file: Option<PathBuf>,

    /// Pipe the SMT-LIB2 stream to this solver binary (rendering-only
    /// without one).
    #[arg(long, value_name = "BINARY")]
    smt2: Option<Option<String>>,

    /// Cross-check against a second solver binary on the same stream.
    #[arg(short = 'c', long, value_name = "BINARY")]
    cross_check: Option<String>,

    /// Independently verify models, unsat cores and unsat assumptions,
    /// optionally with a different solver binary.
    #[arg(long, value_name = "BINARY")]
    check: Option<Option<String>>,

    /// Use random symbol names instead of sequential ones.
    #[arg(short = 'y', long)]
    random_symbols: bool,

    /// Back-end options set at startup (name=value, comma separated).
    #[arg(short = 'o', long = "solver-opts", value_delimiter = ',')]
    solver_opts: Vec<String>,

    /// Fuzz back-end options, optionally restricted by comma-separated
    /// wildcards matched against option names (^ anchors at the start).
    #[arg(long, value_name = "WILDCARDS")]
    fuzz_opts: Option<Option<String>>,

    /// Restrict arithmetic to the linear fragment.
    #[arg(long)]
    linear: bool,

    /// Print statistics.
    #[arg(long)]
    stats: bool,

    /// Print the FSM configuration and exit.
    #[arg(long)]
    print_fsm: bool,

    /// Print the error summary in CSV format.
    #[arg(long)]
    csv: bool,

    /// Export found errors to a JSON file.
    #[arg(long, value_name = "FILE")]
    export_errors: Option<PathBuf>,

    /// Write scratch files to this directory.
    #[arg(short = 'T', long, value_name = "DIR")]
    tmp_dir: Option<PathBuf>,

    /// Write output files (error traces, minimized traces) to this
    /// directory.
    #[arg(short = 'O', long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Write run statistics to this JSON file (set by the parent watcher).
    #[arg(long, hide = true, value_name = "FILE")]
    stats_file: Option<PathBuf>,

    // Theory selection. Without any enable flag, all theories the back-end
    // supports are fair game (minus the default-disabled ones).
    /// Enable the theory of arrays.
    #[arg(long)]
    arrays: bool,
    /// Enable the theory of bags.
    #[arg(long)]
    bags: bool,
    /// Enable the theory of bit-vectors.
    #[arg(long)]
    bv: bool,
    /// Enable the theory of datatypes.
    #[arg(long)]
    dt: bool,
    /// Enable the theory of floating-points.
    #[arg(long)]
    fp: bool,
    /// Enable the theory of integers.
    #[arg(long)]
    ints: bool,
    /// Enable quantifiers.
    #[arg(long)]
    quant: bool,
    /// Enable the theory of reals.
    #[arg(long)]
    reals: bool,
    /// Enable the theory of sequences.
    #[arg(long)]
    seq: bool,
    /// Enable the theory of sets.
    #[arg(long)]
    sets: bool,
    /// Enable the theory of strings.
    #[arg(long)]
    strings: bool,
    /// Enable transcendentals.
    #[arg(long)]
    trans: bool,
    /// Enable uninterpreted functions.
    #[arg(long)]
    uf: bool,
    /// Enable Boolean-only runs (always on; accepted for symmetry).
    #[arg(long = "bool")]
    bool_theory: bool,

    /// Disable the theory of arrays.
    #[arg(long)]
    no_arrays: bool,
    /// Disable the theory of bags.
    #[arg(long)]
    no_bags: bool,
    /// Disable the theory of bit-vectors.
    #[arg(long)]
    no_bv: bool,
    /// Disable the theory of datatypes.
    #[arg(long)]
    no_dt: bool,
    /// Disable the theory of floating-points.
    #[arg(long)]
    no_fp: bool,
    /// Disable the theory of integers.
    #[arg(long)]
    no_ints: bool,
    /// Disable quantifiers.
    #[arg(long)]
    no_quant: bool,
    /// Disable the theory of reals.
    #[arg(long)]
    no_reals: bool,
    /// Disable the theory of sequences.
    #[arg(long)]
    no_seq: bool,
    /// Disable the theory of sets.
    #[arg(long)]
    no_sets: bool,
    /// Disable the theory of strings.
    #[arg(long)]
    no_strings: bool,
    /// Disable transcendentals.
    #[arg(long)]
    no_trans: bool,
    /// Disable uninterpreted functions.
    #[arg(long)]
    no_uf: bool,
}

impl Args {
    fn enabled_theories(&self) -> Vec<TheoryId> {
        let flags = [
            (self.arrays, TheoryId::Array),
            (self.bags, TheoryId::Bag),
            (self.bv, TheoryId::Bv),
            (self.dt, TheoryId::Dt),
            (self.fp, TheoryId::Fp),
            (self.ints, TheoryId::Int),
            (self.quant, TheoryId::Quant),
            (self.reals, TheoryId::Real),
            (self.seq, TheoryId::Seq),
            (self.sets, TheoryId::Set),
            (self.strings, TheoryId::String),
            (self.trans, TheoryId::Transcendental),
            (self.uf, TheoryId::Uf),
            (self.bool_theory, TheoryId::Bool),
        ];
        flags
            .into_iter()
            .filter_map(|(set, theory)| set.then_some(theory))
            .collect()
    }

    fn disabled_theories(&self) -> Vec<TheoryId> {
        let flags = [
            (self.no_arrays, TheoryId::Array),
            (self.no_bags, TheoryId::Bag),
            (self.no_bv, TheoryId::Bv),
            (self.no_dt, TheoryId::Dt),
            (self.no_fp, TheoryId::Fp),
            (self.no_ints, TheoryId::Int),
            (self.no_quant, TheoryId::Quant),
            (self.no_reals, TheoryId::Real),
            (self.no_seq, TheoryId::Seq),
            (self.no_sets, TheoryId::Set),
            (self.no_strings, TheoryId::String),
            (self.no_trans, TheoryId::Transcendental),
            (self.no_uf, TheoryId::Uf),
        ];
        flags
            .into_iter()
            .filter_map(|(set, theory)| set.then_some(theory))
            .collect()
    }

    fn to_options(&self, argv: &[String]) -> Result<Options> {
        let mut options = Options::default();
        if let Some(seed) = &self.seed {
            options.seed = parse_seed(seed)?;
            options.is_seeded = true;
        }
        options.verbosity = self.verbosity;
        options.time = self.time;
        options.max_runs = self.max_runs;
        options.max_actions = self.max_actions;
        options.trace_seeds = self.trace_seeds;
        options.simple_symbols = !self.random_symbols;
        options.print_stats = self.stats;
        options.print_fsm = self.print_fsm;
        options.arith_linear = self.linear;
        if let Some(filter) = &self.fuzz_opts {
            options.fuzz_options = true;
            if let Some(wildcards) = filter {
                options.fuzz_options_filter = wildcards
                    .split(',')
                    .filter(|w| !w.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }
        options.api_trace_file = self.api_trace.clone();
        options.untrace_file = self.untrace.clone();
        options.smt2_file = self.smt2_file.clone();
        options.dd = self.dd;
        options.dd_ignore_out = self.dd_ignore_out;
        options.dd_ignore_err = self.dd_ignore_err;
        options.dd_match_out = self.dd_match_out.clone();
        options.dd_match_err = self.dd_match_err.clone();
        options.dd_trace_file = self.dd_trace.clone();
        options.solver_binary = self.smt2.clone().flatten();
        options.cross_check = self.cross_check.clone();
        options.stats_file = self.stats_file.clone();
        if let Some(check) = &self.check {
            options.check = true;
            options.check_binary = check.clone();
        }
        if options.check && options.cross_check.is_some() {
            return Err(FuzzerError::config(
                "--check cannot be combined with --cross-check",
            ));
        }

        for opt in &self.solver_opts {
            let (name, value) = opt.split_once('=').ok_or_else(|| {
                FuzzerError::config(format!(
                    "invalid solver option '{opt}', expected 'name=value'"
                ))
            })?;
            options
                .solver_options
                .push((name.to_string(), value.to_string()));
        }

        options.enabled_theories = self.enabled_theories();
        for theory in &options.enabled_theories {
            options.disabled_theories.remove(theory);
        }
        for theory in self.disabled_theories() {
            options.disabled_theories.insert(theory);
        }

        if options.api_trace_file.is_some()
            && options.api_trace_file == options.untrace_file
        {
            return Err(FuzzerError::config(
                "tracing into the file that is untraced is not supported",
            ));
        }

        options.cmd_line_trace = cmd_line_trace(argv);
        Ok(options)
    }
}

/// Parse a seed: hexadecimal when every digit is a hex digit (with or
/// without a 0x prefix), decimal otherwise.
fn parse_seed(s: &str) -> Result<u64> {
    let trimmed = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let result = if trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        u64::from_str_radix(trimmed, 16)
    } else {
        trimmed.parse::<u64>()
    };
    result.map_err(|_| FuzzerError::config(format!("invalid seed '{s}'")))
}

/// Rebuild the canonical options line recorded in traces: the original
/// argument vector minus the per-invocation flags (seed, trace files, delta
/// debugging, replay input).
fn cmd_line_trace(argv: &[String]) -> String {
    const SKIP_WITH_VALUE: &[&str] = &[
        "-s",
        "--seed",
        "-a",
        "--api-trace",
        "-u",
        "--untrace",
        "-D",
        "--dd-trace",
        "--stats-file",
    ];
    const SKIP_FLAG: &[&str] = &["-d", "--dd"];
    const SKIP_PREFIXES: &[&str] = &[
        "--seed=",
        "--api-trace=",
        "--untrace=",
        "--dd-trace=",
        "--stats-file=",
    ];

    let mut line = TRACE_OPTIONS_KEYWORD.to_string();
    let mut iter = argv.iter().skip(1).peekable();
    while let Some(arg) = iter.next() {
        if SKIP_WITH_VALUE.contains(&arg.as_str()) {
            iter.next();
            continue;
        }
        if SKIP_FLAG.contains(&arg.as_str())
            || SKIP_PREFIXES.iter().any(|p| arg.starts_with(p))
        {
            continue;
        }
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Scan raw arguments for a replay file and, if its first line is an
/// options prelude, merge those options in front of the user's arguments.
fn merged_argv(argv: &[String]) -> Vec<String> {
    let mut untrace_file: Option<String> = None;
    let mut iter = argv.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "-u" || arg == "--untrace" {
            untrace_file = iter.next().cloned();
        } else if let Some(path) = arg.strip_prefix("--untrace=") {
            untrace_file = Some(path.to_string());
        }
    }
    let Some(path) = untrace_file else {
        return argv.to_vec();
    };
    let Ok(content) = std::fs::read_to_string(&path) else {
        return argv.to_vec();
    };
    let Some(first) = content.lines().next() else {
        return argv.to_vec();
    };
    let Some(rest) = first.strip_prefix(TRACE_OPTIONS_KEYWORD) else {
        return argv.to_vec();
    };
    let mut merged = vec![argv[0].clone()];
    merged.extend(rest.split_whitespace().map(str::to_string));
    merged.extend(argv.iter().skip(1).cloned());
    merged
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn real_main() -> Result<i32> {
    let argv: Vec<String> = std::env::args().collect();
    // A replay's options prelude is merged in front of the user arguments,
    // so the replayed run reconstructs (and re-records) the original
    // configuration.
    let argv = merged_argv(&argv);
    let args = Args::parse_from(&argv);
    init_logging(args.verbosity);
    let options = args.to_options(&argv)?;

    if args.print_fsm {
        run::print_fsm(&options, &mut std::io::stdout())?;
        return Ok(0);
    }

    let single = options.is_seeded || options.untrace_file.is_some();
    if !single {
        let cfg = runner::ContinuousConfig {
            options: &options,
            csv: args.csv,
            export_errors: args.export_errors.clone(),
            out_dir: args.out_dir.clone(),
            tmp_dir: args.tmp_dir.clone(),
        };
        runner::continuous(&cfg)?;
        return Ok(0);
    }

    if options.dd {
        runner::dd_single(&options, args.tmp_dir.as_deref(), args.out_dir.as_deref())?;
        return Ok(0);
    }

    let stats = run::run_one(&options)?;
    if options.print_stats {
        stats.print(&mut std::io::stdout())?;
    }
    Ok(0)
}

fn main() {
    let code = match real_main() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("oxifuzz: ERROR: {e}");
            match e {
                FuzzerError::Config(_) => 2,
                _ => 1,
            }
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("oxifuzz")
            .chain(args.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_seed_parsing() {
        assert_eq!(parse_seed("deadbeef").unwrap(), 0xDEAD_BEEF);
        assert_eq!(parse_seed("0xDEADBEEF").unwrap(), 0xDEAD_BEEF);
        // All-hex-digit strings parse as hexadecimal.
        assert_eq!(parse_seed("10").unwrap(), 16);
        assert!(parse_seed("xyz").is_err());
    }

    #[test]
    fn test_cmd_line_trace_strips_run_specific_flags() {
        let argv = argv(&[
            "--bv", "--strings", "-s", "deadbeef", "-a", "out.trace", "-d", "-t", "1.0",
        ]);
        assert_eq!(
            cmd_line_trace(&argv),
            "set-oxifuzz-options --bv --strings -t 1.0"
        );
    }

    #[test]
    fn test_theory_flags() {
        let args = Args::parse_from(argv(&["--bv", "--no-strings", "--bags"]));
        let options = args.to_options(&argv(&["--bv"])).unwrap();
        assert!(options.enabled_theories.contains(&TheoryId::Bv));
        assert!(options.enabled_theories.contains(&TheoryId::Bag));
        assert!(options.disabled_theories.contains(&TheoryId::String));
        // Explicitly enabling a default-disabled theory re-enables it.
        assert!(!options.disabled_theories.contains(&TheoryId::Bag));
    }

    #[test]
    fn test_trace_into_untraced_file_is_rejected() {
        let args = Args::parse_from(argv(&["-u", "x.trace", "-a", "x.trace"]));
        let err = args.to_options(&argv(&[])).unwrap_err();
        assert!(matches!(err, FuzzerError::Config(_)));
    }

    #[test]
    fn test_check_flag() {
        let args = Args::parse_from(argv(&["--check=z3", "-s", "1"]));
        let options = args.to_options(&argv(&[])).unwrap();
        assert!(options.check);
        assert_eq!(options.check_binary.as_deref(), Some("z3"));

        let args = Args::parse_from(argv(&["--check", "-s", "1"]));
        let options = args.to_options(&argv(&[])).unwrap();
        assert!(options.check);
        assert_eq!(options.check_binary, None);

        let args = Args::parse_from(argv(&["--check", "-c", "cvc5"]));
        let err = args.to_options(&argv(&[])).unwrap_err();
        assert!(matches!(err, FuzzerError::Config(_)));
    }

    #[test]
    fn test_solver_opts_parsing() {
        let args = Args::parse_from(argv(&["-o", "produce-models=true,incremental=true"]));
        let options = args.to_options(&argv(&[])).unwrap();
        assert_eq!(options.solver_options.len(), 2);
        assert_eq!(
            options.solver_options[0],
            ("produce-models".to_string(), "true".to_string())
        );
    }
}
