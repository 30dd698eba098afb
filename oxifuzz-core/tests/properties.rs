//! Property-based tests over random seeds: database invariants after every
//! action, id monotonicity, and record/replay round-trips.

use proptest::prelude::*;

use oxifuzz_core::actions::ActionKind;
use oxifuzz_core::options::Options;
use oxifuzz_core::rng::RngSource;
use oxifuzz_core::run::{build_solver, run_with_writer};
use oxifuzz_core::smgr::SolverManager;
use oxifuzz_core::trace::Tracer;

/// The actions a generation step may sample from (lifecycle excluded).
const STEP_ACTIONS: &[ActionKind] = &[
    ActionKind::SetOption,
    ActionKind::MkSort,
    ActionKind::MkConst,
    ActionKind::MkVar,
    ActionKind::MkValue,
    ActionKind::MkSpecialValue,
    ActionKind::MkTerm,
    ActionKind::AssertFormula,
    ActionKind::CheckSat,
    ActionKind::CheckSatAssuming,
    ActionKind::Push,
    ActionKind::Pop,
    ActionKind::GetValue,
    ActionKind::GetUnsatCore,
    ActionKind::GetUnsatAssumptions,
    ActionKind::PrintModel,
    ActionKind::ResetAssertions,
];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Invariants I1-I5 hold after every single action, under arbitrary
    /// enabled-action interleavings.
    #[test]
    fn prop_invariants_hold_after_every_action(seed in any::<u64>()) {
        let options = Options::default();
        let mut smgr = SolverManager::new(
            build_solver(&options),
            RngSource::new(seed),
            Tracer::disabled(),
            &options,
        )
        .unwrap();
        let mut driver = RngSource::new(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15));

        ActionKind::NewSolver.generate(&mut smgr).unwrap();
        smgr.check_invariants().unwrap();

        for _ in 0..150 {
            let action = *driver.pick_from_slice(STEP_ACTIONS);
            if action.enabled(&smgr) {
                action.generate(&mut smgr).unwrap();
            }
            smgr.check_invariants().unwrap();
        }

        // Ids stay strictly increasing and dense across the whole run (I1).
        for (i, id) in (1..=smgr.n_sorts()).enumerate() {
            prop_assert_eq!(smgr.sort_data(oxifuzz_core::SortId(id)).id.0, i as u64 + 1);
        }

        ActionKind::DeleteSolver.generate(&mut smgr).unwrap();
    }

    /// Record → replay yields a byte-identical trace (P4).
    #[test]
    fn prop_record_replay_round_trip(seed in any::<u64>(), trace_seeds in any::<bool>()) {
        let record_file = tempfile::NamedTempFile::new().unwrap();
        let options = Options {
            seed,
            is_seeded: true,
            trace_seeds,
            max_actions: 80,
            ..Options::default()
        };
        run_with_writer(&options, Box::new(record_file.reopen().unwrap())).unwrap();
        let recorded = std::fs::read_to_string(record_file.path()).unwrap();

        let replay_file = tempfile::NamedTempFile::new().unwrap();
        let replay_options = Options {
            untrace_file: Some(record_file.path().to_path_buf()),
            trace_seeds,
            ..Options::default()
        };
        run_with_writer(&replay_options, Box::new(replay_file.reopen().unwrap())).unwrap();
        let replayed = std::fs::read_to_string(replay_file.path()).unwrap();

        prop_assert_eq!(recorded, replayed);
    }

    /// Every recorded action line parses back, and all id references point
    /// backwards (a line never uses an id introduced later).
    #[test]
    fn prop_traces_are_well_formed(seed in any::<u64>()) {
        let file = tempfile::NamedTempFile::new().unwrap();
        let options = Options {
            seed,
            is_seeded: true,
            max_actions: 80,
            ..Options::default()
        };
        run_with_writer(&options, Box::new(file.reopen().unwrap())).unwrap();
        let trace = std::fs::read_to_string(file.path()).unwrap();

        let mut seen_sorts = std::collections::HashSet::new();
        let mut seen_terms = std::collections::HashSet::new();
        for (idx, line) in trace.lines().enumerate().skip(1) {
            let parsed = oxifuzz_core::trace::parse_line(line, idx + 1).unwrap();
            let mut check_ref = |token: &str| {
                if let Some(id) = token.strip_prefix('s').and_then(|d| d.parse::<u64>().ok()) {
                    prop_assert!(seen_sorts.contains(&id), "line {}: s{id} unseen", idx + 1);
                } else if let Some(id) =
                    token.strip_prefix('t').and_then(|d| d.parse::<u64>().ok())
                {
                    prop_assert!(seen_terms.contains(&id), "line {}: t{id} unseen", idx + 1);
                }
                Ok(())
            };
            for arg in &parsed.args {
                match arg {
                    oxifuzz_core::trace::Token::Atom(a) => check_ref(a)?,
                    oxifuzz_core::trace::Token::Group(group) => {
                        for token in group {
                            check_ref(token)?;
                        }
                    }
                    oxifuzz_core::trace::Token::Str(_) => {}
                }
            }
            for ret in &parsed.returns {
                if let Some(id) = ret.strip_prefix('s').and_then(|d| d.parse::<u64>().ok()) {
                    seen_sorts.insert(id);
                } else if let Some(id) =
                    ret.strip_prefix('t').and_then(|d| d.parse::<u64>().ok())
                {
                    seen_terms.insert(id);
                }
            }
        }
    }
}
