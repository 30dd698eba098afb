//! End-to-end tests of the generator engine: trace shape, determinism,
//! record/replay round-trips, replay validation and database resets.

use std::path::Path;

use oxifuzz_core::actions::ActionKind;
use oxifuzz_core::options::Options;
use oxifuzz_core::rng::RngSource;
use oxifuzz_core::run::{build_solver, run_with_writer};
use oxifuzz_core::smgr::SolverManager;
use oxifuzz_core::sort::SortKind;
use oxifuzz_core::trace::{Tracer, replay};
use oxifuzz_core::FuzzerError;

fn options_with_seed(seed: u64) -> Options {
    Options {
        seed,
        is_seeded: true,
        max_actions: 120,
        ..Options::default()
    }
}

fn run_to_trace(options: &Options) -> String {
    let file = tempfile::NamedTempFile::new().unwrap();
    run_with_writer(options, Box::new(file.reopen().unwrap())).unwrap();
    std::fs::read_to_string(file.path()).unwrap()
}

fn smgr_for_replay() -> SolverManager {
    let options = Options::default();
    SolverManager::new(
        build_solver(&options),
        RngSource::new(1),
        Tracer::disabled(),
        &options,
    )
    .unwrap()
}

fn replay_str(content: &str, smgr: &mut SolverManager) -> oxifuzz_core::Result<()> {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), content).unwrap();
    replay(file.path(), smgr)
}

#[test]
fn test_trace_shape() {
    let trace = run_to_trace(&options_with_seed(0xDEAD_BEEF));
    let mut lines = trace.lines();
    assert_eq!(lines.next(), Some("set-oxifuzz-options"));
    assert_eq!(lines.next(), Some("new-solver"));
    assert_eq!(trace.lines().last(), Some("delete-solver"));
}

#[test]
fn test_same_seed_yields_identical_traces() {
    let a = run_to_trace(&options_with_seed(0xCAFE));
    let b = run_to_trace(&options_with_seed(0xCAFE));
    assert_eq!(a, b);
}

#[test]
fn test_different_seeds_yield_different_traces() {
    let a = run_to_trace(&options_with_seed(1));
    let b = run_to_trace(&options_with_seed(2));
    assert_ne!(a, b);
}

#[test]
fn test_record_replay_round_trip() {
    let record_file = tempfile::NamedTempFile::new().unwrap();
    let options = options_with_seed(0x1234_5678);
    run_with_writer(&options, Box::new(record_file.reopen().unwrap())).unwrap();
    let recorded = std::fs::read_to_string(record_file.path()).unwrap();

    let replay_file = tempfile::NamedTempFile::new().unwrap();
    let replay_options = Options {
        untrace_file: Some(record_file.path().to_path_buf()),
        ..Options::default()
    };
    run_with_writer(&replay_options, Box::new(replay_file.reopen().unwrap())).unwrap();
    let replayed = std::fs::read_to_string(replay_file.path()).unwrap();

    assert_eq!(recorded, replayed);
}

#[test]
fn test_record_replay_round_trip_with_seed_lines() {
    let record_file = tempfile::NamedTempFile::new().unwrap();
    let options = Options {
        trace_seeds: true,
        ..options_with_seed(0xFEED)
    };
    run_with_writer(&options, Box::new(record_file.reopen().unwrap())).unwrap();
    let recorded = std::fs::read_to_string(record_file.path()).unwrap();
    assert!(recorded.contains("set-seed "));

    let replay_file = tempfile::NamedTempFile::new().unwrap();
    let replay_options = Options {
        untrace_file: Some(record_file.path().to_path_buf()),
        trace_seeds: true,
        ..Options::default()
    };
    run_with_writer(&replay_options, Box::new(replay_file.reopen().unwrap())).unwrap();
    let replayed = std::fs::read_to_string(replay_file.path()).unwrap();

    assert_eq!(recorded, replayed);
}

#[test]
fn test_replay_registers_recorded_ids() {
    let mut smgr = smgr_for_replay();
    replay_str(
        "set-oxifuzz-options\n\
         new-solver\n\
         mk-sort BV 8 return s1\n\
         mk-const s1 \"x\" return t1\n\
         mk-term OP_BV_ADD [t1 t1] return t2\n\
         delete-solver\n",
        &mut smgr,
    )
    .unwrap();

    let s1 = smgr.untraced_sort(1).unwrap();
    let t1 = smgr.untraced_term(1).unwrap();
    let t2 = smgr.untraced_term(2).unwrap();
    assert_eq!(smgr.sort_data(s1).kind, SortKind::Bv);
    assert_eq!(smgr.sort_data(s1).bv_size(), 8);
    assert_eq!(smgr.term_data(t1).sort, s1);
    assert_eq!(smgr.term_data(t2).sort, s1);
}

#[test]
fn test_replay_rejects_non_boolean_assert() {
    let mut smgr = smgr_for_replay();
    let err = replay_str(
        "new-solver\n\
         mk-sort BV 8 return s1\n\
         mk-const s1 \"x\" return t1\n\
         assert t1\n",
        &mut smgr,
    )
    .unwrap_err();
    let msg = err.to_string();
    assert!(matches!(err, FuzzerError::Untrace { line: 4, .. }), "{msg}");
    assert!(msg.contains("assert"), "{msg}");
    assert!(msg.contains("BV"), "{msg}");
}

#[test]
fn test_replay_rejects_unknown_action() {
    let mut smgr = smgr_for_replay();
    let err = replay_str("new-solver\nfrobnicate t1\n", &mut smgr).unwrap_err();
    assert!(err.to_string().contains("unknown action"));
}

#[test]
fn test_replay_rejects_unknown_ids() {
    let mut smgr = smgr_for_replay();
    let err = replay_str("new-solver\nassert t99\n", &mut smgr).unwrap_err();
    assert!(err.to_string().contains("unknown term 't99'"));
}

#[test]
fn test_replay_tolerates_removed_lines() {
    // Dropping lines whose ids are never referenced later must not break
    // replay (the delta debugger relies on this).
    let mut smgr = smgr_for_replay();
    replay_str(
        "new-solver\n\
         mk-sort BV 8 return s1\n\
         mk-sort INT return s2\n\
         mk-const s1 \"x\" return t1\n\
         delete-solver\n",
        &mut smgr,
    )
    .unwrap();
    assert_eq!(smgr.untraced_term(1), Some(oxifuzz_core::TermId(1)));
}

#[test]
fn test_quantifier_scope_discipline() {
    let mut smgr = smgr_for_replay();
    replay_str(
        "new-solver\n\
         mk-sort INT return s1\n\
         mk-const s1 \"c\" return t1\n\
         mk-var s1 \"x\" return t2\n\
         mk-term OP_INT_LE [t1 t2] return t3\n\
         mk-term OP_FORALL [t2 t3] return t4\n",
        &mut smgr,
    )
    .unwrap();

    // The scope is closed: the variable and the body are no longer
    // selectable, the quantified term is, at the outermost level.
    assert_eq!(smgr.depth(), 0);
    assert!(!smgr.has_var());
    assert!(smgr.has_term_kind_at(SortKind::Bool, 0));
    let t4 = smgr.untraced_term(4).unwrap();
    assert!(smgr.term_data(t4).levels.is_empty());
    let t3 = smgr.untraced_term(3).unwrap();
    assert_eq!(smgr.term_data(t3).levels.len(), 1);
    smgr.check_invariants().unwrap();
}

#[test]
fn test_reset_purity() {
    let mut smgr = smgr_for_replay();
    ActionKind::NewSolver.generate(&mut smgr).unwrap();
    for _ in 0..30 {
        if ActionKind::MkSort.enabled(&smgr) {
            ActionKind::MkSort.generate(&mut smgr).unwrap();
        }
        if ActionKind::MkConst.enabled(&smgr) {
            ActionKind::MkConst.generate(&mut smgr).unwrap();
        }
        if ActionKind::MkValue.enabled(&smgr) {
            ActionKind::MkValue.generate(&mut smgr).unwrap();
        }
    }
    assert!(smgr.n_sorts() > 0);
    assert!(smgr.n_terms() > 0);

    ActionKind::Reset.generate(&mut smgr).unwrap();
    assert_eq!(smgr.n_sorts(), 0);
    assert_eq!(smgr.n_terms(), 0);
    assert!(!smgr.has_term());
    assert!(smgr.assumptions().is_empty());
    smgr.check_invariants().unwrap();
}

#[test]
fn test_assumption_lifecycle() {
    let mut smgr = smgr_for_replay();
    replay_str(
        "new-solver\n\
         mk-sort BOOL return s1\n\
         mk-value s1 true return t1\n",
        &mut smgr,
    )
    .unwrap();

    assert!(!ActionKind::CheckSatAssuming.enabled(&smgr));
    smgr.solver_mut().set_opt("incremental", "true").unwrap();
    smgr.update_option_latches();
    assert!(ActionKind::CheckSatAssuming.enabled(&smgr));

    ActionKind::CheckSatAssuming.generate(&mut smgr).unwrap();
    assert!(smgr.assumptions().is_empty());
    smgr.check_invariants().unwrap();
}

#[test]
fn test_option_gated_queries_in_traces() {
    // P6: check-sat-assuming/push/pop only under incrementality,
    // get-unsat-core only with unsat cores enabled. Option state is tracked
    // through the recorded set-option lines.
    for seed in 0..30u64 {
        let trace = run_to_trace(&options_with_seed(seed));
        let mut incremental = false;
        let mut unsat_cores = false;
        for line in trace.lines() {
            if let Some(rest) = line.strip_prefix("set-option ") {
                let enabled = rest.ends_with("\"true\"");
                if rest.starts_with("\"incremental\"") {
                    incremental = enabled;
                } else if rest.starts_with("\"produce-unsat-cores\"") {
                    unsat_cores = enabled;
                }
            } else if line == "reset" {
                incremental = false;
                unsat_cores = false;
            } else if line.starts_with("check-sat-assuming")
                || line.starts_with("push")
                || line.starts_with("pop")
            {
                assert!(incremental, "seed {seed}: '{line}' without incremental");
            } else if line == "get-unsat-core" {
                assert!(unsat_cores, "seed {seed}: unsat core query without option");
            }
        }
    }
}

#[test]
fn test_prelude_is_recorded_verbatim() {
    let options = Options {
        cmd_line_trace: "set-oxifuzz-options --bv --strings -t 1.0".to_string(),
        ..options_with_seed(7)
    };
    let trace = run_to_trace(&options);
    assert!(trace.starts_with("set-oxifuzz-options --bv --strings -t 1.0\n"));
}

#[test]
fn test_replay_is_deterministic_for_subsets() {
    // A subset trace replays to the same output twice.
    let content = "set-oxifuzz-options\n\
                   new-solver\n\
                   mk-sort BV 4 return s1\n\
                   mk-const s1 \"a\" return t1\n\
                   mk-term OP_BV_NOT [t1] return t2\n\
                   delete-solver\n";
    let run = |content: &str| -> String {
        let input = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(input.path(), content).unwrap();
        let out = tempfile::NamedTempFile::new().unwrap();
        let options = Options {
            untrace_file: Some(input.path().to_path_buf()),
            ..Options::default()
        };
        run_with_writer(&options, Box::new(out.reopen().unwrap())).unwrap();
        std::fs::read_to_string(out.path()).unwrap()
    };
    assert_eq!(run(content), run(content));
}

#[test]
fn test_check_mode_does_not_perturb_traces() {
    // Verification happens on the side; the recorded trace is identical to
    // a plain run with the same seed.
    let plain = run_to_trace(&options_with_seed(0x51CC));
    let checked = run_to_trace(&Options {
        check: true,
        ..options_with_seed(0x51CC)
    });
    assert_eq!(plain, checked);
}

#[test]
fn test_smt2_dump_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let smt2_path: &Path = &dir.path().join("run.smt2");
    let options = Options {
        smt2_file: Some(smt2_path.to_path_buf()),
        ..options_with_seed(0xABCD)
    };
    let file = tempfile::NamedTempFile::new().unwrap();
    run_with_writer(&options, Box::new(file.reopen().unwrap())).unwrap();
    let smt2 = std::fs::read_to_string(smt2_path).unwrap();
    assert!(smt2.contains("(set-option :global-declarations true)"));
    assert!(smt2.contains("(set-logic ALL)"));
    assert!(smt2.trim_end().ends_with("(exit)"));
}
