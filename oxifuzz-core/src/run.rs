//! Single-run driver
//!
//! Builds the back-end, RNG, trace writer and database from resolved
//! [`Options`] and executes one generation run or one replay. Process
//! isolation, error classification and delta debugging live in the CLI; this
//! module is the piece a child process executes.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::Duration;

use tracing::info;

use crate::error::{FuzzerError, Result};
use crate::fsm::Fsm;
use crate::options::Options;
use crate::rng::RngSource;
use crate::smgr::SolverManager;
use crate::solver::{CheckSolver, CrossSolver, Smt2Solver, Solver};
use crate::statistics::Statistics;
use crate::trace::{self, Tracer};

/// Construct the back-end selected by the options.
#[must_use]
pub fn build_solver(options: &Options) -> Solver {
    if let Some(shadow) = &options.cross_check {
        return Solver::Cross(Box::new(CrossSolver::new(
            Smt2Solver::new(options.solver_binary.clone(), options.smt2_file.clone()),
            Smt2Solver::new(Some(shadow.clone()), None),
        )));
    }
    if options.check {
        let check_binary = options
            .check_binary
            .clone()
            .or_else(|| options.solver_binary.clone());
        return Solver::Check(Box::new(CheckSolver::new(
            Smt2Solver::new(options.solver_binary.clone(), options.smt2_file.clone()),
            Smt2Solver::new(check_binary.clone(), None),
            check_binary,
        )));
    }
    Solver::Smt2(Smt2Solver::new(
        options.solver_binary.clone(),
        options.smt2_file.clone(),
    ))
}

/// Execute one run, tracing into the given sink. Replays the configured
/// trace file if one is set, otherwise generates with the configured seed.
pub fn run_with_writer(
    options: &Options,
    out: Box<dyn Write + Send>,
) -> Result<Statistics> {
    let tracer = Tracer::new(out, options.trace_seeds);
    let solver = build_solver(options);
    let rng = RngSource::new(options.seed);
    let mut smgr = SolverManager::new(solver, rng, tracer, options)?;
    smgr.trace_line(&options.cmd_line_trace)?;

    let outcome = match &options.untrace_file {
        Some(path) => {
            info!(trace = %path.display(), "replaying");
            trace::replay(path, &mut smgr)
        }
        None => {
            info!(seed = %format!("{:x}", options.seed), "generating");
            let fsm = Fsm::canonical(
                options.max_actions,
                options.time.map(Duration::from_secs_f64),
            );
            fsm.check()?;
            fsm.run(&mut smgr)
        }
    };

    let stats = smgr.stats().clone();
    if let Some(path) = &options.stats_file {
        let json = serde_json::to_string(&stats)
            .map_err(|e| FuzzerError::internal(format!("cannot serialize statistics: {e}")))?;
        std::fs::write(path, json)?;
    }
    outcome?;
    Ok(stats)
}

/// Execute one run, tracing to the configured file or stdout.
pub fn run_one(options: &Options) -> Result<Statistics> {
    let out: Box<dyn Write + Send> = match &options.api_trace_file {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout()),
    };
    run_with_writer(options, out)
}

/// Print the canonical FSM configuration (`--print-fsm`).
pub fn print_fsm(options: &Options, out: &mut dyn Write) -> Result<()> {
    Fsm::canonical(
        options.max_actions,
        options.time.map(Duration::from_secs_f64),
    )
    .print(out)
}
