//! Finite-state machine
//!
//! A labeled weighted digraph driving action selection. Each state carries a
//! weighted list of (action, next-state) edges; an edge whose action's
//! precondition fails contributes zero weight. A run walks the graph until a
//! final state is reached or the action/time budget is exhausted (budget
//! breaches are not errors; the solver is still torn down so the trace ends
//! in a delete).

use std::io::Write;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::actions::ActionKind;
use crate::error::{FuzzerError, Result};
use crate::smgr::SolverManager;
use crate::solver::SatResult;

#[derive(Debug, Clone, Copy)]
struct Edge {
    action: ActionKind,
    weight: u32,
    next: usize,
}

/// A named FSM state.
#[derive(Debug)]
pub struct State {
    kind: &'static str,
    is_final: bool,
    edges: Vec<Edge>,
}

impl State {
    /// The state's stable name.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// True if reaching this state ends the run.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.is_final
    }
}

/// The weighted state machine of one run.
#[derive(Debug)]
pub struct Fsm {
    states: Vec<State>,
    init: usize,
    assert_state: usize,
    sat_state: usize,
    unsat_state: usize,
    max_actions: u64,
    time_limit: Option<Duration>,
}

impl Fsm {
    /// Build the canonical state graph shared by all back-ends.
    #[must_use]
    pub fn canonical(max_actions: u64, time_limit: Option<Duration>) -> Self {
        let mut states = Vec::new();
        let mut state = |kind: &'static str, is_final: bool| -> usize {
            states.push(State {
                kind,
                is_final,
                edges: Vec::new(),
            });
            states.len() - 1
        };
        let new = state("new", false);
        let opt = state("opt", false);
        let create_sorts = state("create-sorts", false);
        let create_inputs = state("create-inputs", false);
        let create_terms = state("create-terms", false);
        let assert = state("assert", false);
        let check_sat = state("check-sat", false);
        let sat = state("sat", false);
        let unsat = state("unsat", false);
        let delete = state("delete", true);

        use ActionKind as A;
        let mut edge = |from: usize, action: A, weight: u32, next: usize| {
            states[from].edges.push(Edge {
                action,
                weight,
                next,
            });
        };

        edge(new, A::NewSolver, 1, opt);

        edge(opt, A::SetOption, 10, opt);
        edge(opt, A::TransitionDefault, 10, create_sorts);
        edge(opt, A::DeleteSolver, 1, delete);

        edge(create_sorts, A::MkSort, 10, create_sorts);
        edge(create_sorts, A::TransitionDefault, 4, create_inputs);

        edge(create_inputs, A::MkConst, 10, create_inputs);
        edge(create_inputs, A::MkValue, 6, create_inputs);
        edge(create_inputs, A::MkSpecialValue, 3, create_inputs);
        edge(create_inputs, A::MkVar, 2, create_inputs);
        edge(create_inputs, A::MkSort, 2, create_inputs);
        edge(create_inputs, A::TransitionDefault, 5, create_terms);

        edge(create_terms, A::MkTerm, 20, create_terms);
        edge(create_terms, A::MkConst, 2, create_terms);
        edge(create_terms, A::MkValue, 2, create_terms);
        edge(create_terms, A::MkVar, 1, create_terms);
        edge(create_terms, A::TransitionDefault, 5, assert);

        edge(assert, A::AssertFormula, 10, assert);
        edge(assert, A::TransitionDefault, 4, check_sat);
        edge(assert, A::Push, 2, assert);
        edge(assert, A::Pop, 2, assert);
        edge(assert, A::GetValue, 1, assert);
        edge(assert, A::PrintModel, 1, assert);
        edge(assert, A::GetUnsatCore, 1, assert);
        edge(assert, A::GetUnsatAssumptions, 1, assert);
        edge(assert, A::ResetAssertions, 1, assert);
        edge(assert, A::Reset, 1, opt);
        edge(assert, A::TransitionDefault, 2, create_terms);
        edge(assert, A::DeleteSolver, 1, delete);

        edge(check_sat, A::CheckSat, 5, sat);
        edge(check_sat, A::CheckSatAssuming, 3, sat);
        edge(check_sat, A::TransitionDefault, 1, assert);

        edge(sat, A::GetValue, 5, sat);
        edge(sat, A::PrintModel, 2, sat);
        edge(sat, A::TransitionDefault, 5, assert);
        edge(sat, A::DeleteSolver, 2, delete);

        edge(unsat, A::GetUnsatCore, 5, unsat);
        edge(unsat, A::GetUnsatAssumptions, 5, unsat);
        edge(unsat, A::TransitionDefault, 5, assert);
        edge(unsat, A::DeleteSolver, 2, delete);

        Self {
            states,
            init: new,
            assert_state: assert,
            sat_state: sat,
            unsat_state: unsat,
            max_actions,
            time_limit,
        }
    }

    /// The states of the graph.
    #[must_use]
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Sanity-check the graph: final states have no outgoing edges,
    /// non-final states have at least one, and everything is reachable from
    /// the initial state.
    pub fn check(&self) -> Result<()> {
        let mut reachable = vec![false; self.states.len()];
        let mut stack = vec![self.init];
        while let Some(idx) = stack.pop() {
            if std::mem::replace(&mut reachable[idx], true) {
                continue;
            }
            for edge in &self.states[idx].edges {
                stack.push(edge.next);
                // Check-sat edges branch on the latched result at runtime.
                if matches!(
                    edge.action,
                    ActionKind::CheckSat | ActionKind::CheckSatAssuming
                ) {
                    stack.push(self.sat_state);
                    stack.push(self.unsat_state);
                    stack.push(self.assert_state);
                }
            }
        }
        for (idx, state) in self.states.iter().enumerate() {
            if !reachable[idx] {
                return Err(FuzzerError::internal(format!(
                    "state '{}' unreachable",
                    state.kind
                )));
            }
            if state.is_final && !state.edges.is_empty() {
                return Err(FuzzerError::internal(format!(
                    "final state '{}' has outgoing edges",
                    state.kind
                )));
            }
            if !state.is_final && state.edges.is_empty() {
                return Err(FuzzerError::internal(format!(
                    "state '{}' has no outgoing edges",
                    state.kind
                )));
            }
        }
        Ok(())
    }

    /// Dump the graph configuration (`--print-fsm`).
    pub fn print(&self, out: &mut dyn Write) -> Result<()> {
        for state in &self.states {
            writeln!(
                out,
                "state {}{}",
                state.kind,
                if state.is_final { " (final)" } else { "" }
            )?;
            for edge in &state.edges {
                writeln!(
                    out,
                    "  [{:>3}] {} -> {}",
                    edge.weight,
                    edge.action.kind_str(),
                    self.states[edge.next].kind
                )?;
            }
        }
        Ok(())
    }

    /// Walk the graph, executing actions, until a final state or budget
    /// exhaustion. The walk is single-threaded and cooperative; actions run
    /// to completion.
    pub fn run(&self, smgr: &mut SolverManager) -> Result<()> {
        let started = Instant::now();
        let mut current = self.init;
        let mut n_actions: u64 = 0;

        loop {
            let state = &self.states[current];
            smgr.stats_mut().add_state(state.kind);
            if state.is_final {
                break;
            }
            let out_of_budget = n_actions >= self.max_actions
                || self
                    .time_limit
                    .is_some_and(|limit| started.elapsed() >= limit);
            if out_of_budget {
                debug!(n_actions, "budget exhausted, winding down");
                if smgr.solver().is_initialized() {
                    ActionKind::DeleteSolver.generate(smgr)?;
                }
                break;
            }

            let weights: Vec<u32> = state
                .edges
                .iter()
                .map(|e| if e.action.enabled(smgr) { e.weight } else { 0 })
                .collect();
            let Some(pick) = smgr.rng_mut().pick_weighted(&weights) else {
                // Every edge is precondition-blocked; tear down and stop.
                warn!(state = state.kind, "no enabled edge");
                if smgr.solver().is_initialized() {
                    ActionKind::DeleteSolver.generate(smgr)?;
                }
                break;
            };
            let edge = state.edges[pick];

            if edge.action != ActionKind::TransitionDefault {
                if smgr.trace_seeds_enabled() {
                    let rng_state = smgr.rng_state();
                    smgr.trace_line(&format!("set-seed {rng_state}"))?;
                }
                n_actions += 1;
            }
            let ok = edge.action.generate(smgr)?;
            if edge.action != ActionKind::TransitionDefault {
                let kind = edge.action.kind_str();
                smgr.stats_mut().add_action(kind, ok);
            }

            current = match edge.action {
                ActionKind::CheckSat | ActionKind::CheckSatAssuming if ok => {
                    match smgr.sat_result() {
                        SatResult::Sat => self.sat_state,
                        SatResult::Unsat => self.unsat_state,
                        SatResult::Unknown => self.assert_state,
                    }
                }
                _ => edge.next,
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_graph_is_well_formed() {
        let fsm = Fsm::canonical(100, None);
        fsm.check().unwrap();
    }

    #[test]
    fn test_print_lists_all_states() {
        let fsm = Fsm::canonical(100, None);
        let mut out = Vec::new();
        fsm.print(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        for kind in [
            "new",
            "opt",
            "create-sorts",
            "create-inputs",
            "create-terms",
            "assert",
            "check-sat",
            "sat",
            "unsat",
            "delete",
        ] {
            assert!(text.contains(&format!("state {kind}")), "missing {kind}");
        }
        assert!(text.contains("delete (final)"));
    }
}
