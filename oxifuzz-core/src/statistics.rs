//! Run statistics
//!
//! Per-kind counters for states, actions and operators plus check-sat result
//! tallies. Continuous mode executes every run in a child process; the child
//! serializes its counters to a JSON file and the parent merges them, so the
//! counters are an explicit value rather than shared state.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::error::Result;
use crate::solver::SatResult;

/// Counters collected during one or more runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    /// Check-sat results keyed by answer string.
    pub results: FxHashMap<String, u64>,
    /// States entered, keyed by state kind.
    pub states: FxHashMap<String, u64>,
    /// Actions issued, keyed by action kind.
    pub actions: FxHashMap<String, u64>,
    /// Actions that executed (precondition held, sampling succeeded).
    pub actions_ok: FxHashMap<String, u64>,
    /// Operators attempted, keyed by operator kind.
    pub ops: FxHashMap<String, u64>,
    /// Operators for which a term was created.
    pub ops_ok: FxHashMap<String, u64>,
    /// Number of inputs (constants) created.
    pub inputs: u64,
    /// Number of bound variables created.
    pub vars: u64,
    /// Number of terms created.
    pub terms: u64,
    /// Number of sorts created.
    pub sorts: u64,
}

impl Statistics {
    /// Count a state entry.
    pub fn add_state(&mut self, kind: &str) {
        *self.states.entry(kind.to_string()).or_default() += 1;
    }

    /// Count an issued action; `ok` marks actions that actually executed.
    pub fn add_action(&mut self, kind: &str, ok: bool) {
        *self.actions.entry(kind.to_string()).or_default() += 1;
        if ok {
            *self.actions_ok.entry(kind.to_string()).or_default() += 1;
        }
    }

    /// Count an attempted operator; `ok` marks successful term creation.
    pub fn add_op(&mut self, kind: &str, ok: bool) {
        *self.ops.entry(kind.to_string()).or_default() += 1;
        if ok {
            *self.ops_ok.entry(kind.to_string()).or_default() += 1;
        }
    }

    /// Count a check-sat result.
    pub fn add_result(&mut self, result: SatResult) {
        *self.results.entry(result.as_str().to_string()).or_default() += 1;
    }

    /// Merge another set of counters into this one.
    pub fn merge(&mut self, other: &Statistics) {
        for (k, v) in &other.results {
            *self.results.entry(k.clone()).or_default() += v;
        }
        for (k, v) in &other.states {
            *self.states.entry(k.clone()).or_default() += v;
        }
        for (k, v) in &other.actions {
            *self.actions.entry(k.clone()).or_default() += v;
        }
        for (k, v) in &other.actions_ok {
            *self.actions_ok.entry(k.clone()).or_default() += v;
        }
        for (k, v) in &other.ops {
            *self.ops.entry(k.clone()).or_default() += v;
        }
        for (k, v) in &other.ops_ok {
            *self.ops_ok.entry(k.clone()).or_default() += v;
        }
        self.inputs += other.inputs;
        self.vars += other.vars;
        self.terms += other.terms;
        self.sorts += other.sorts;
    }

    /// Print a human-readable summary.
    pub fn print(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(
            out,
            "sorts {} inputs {} vars {} terms {}",
            self.sorts, self.inputs, self.vars, self.terms
        )?;
        let mut print_map = |title: &str, map: &FxHashMap<String, u64>| -> Result<()> {
            if map.is_empty() {
                return Ok(());
            }
            writeln!(out, "{title}:")?;
            let mut entries: Vec<(&String, &u64)> = map.iter().collect();
            entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            for (kind, count) in entries {
                writeln!(out, "  {count:>8}  {kind}")?;
            }
            Ok(())
        };
        print_map("results", &self.results)?;
        print_map("states", &self.states)?;
        print_map("actions (issued)", &self.actions)?;
        print_map("actions (executed)", &self.actions_ok)?;
        print_map("ops (attempted)", &self.ops)?;
        print_map("ops (created)", &self.ops_ok)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_accumulates() {
        let mut a = Statistics::default();
        a.add_action("mk-term", true);
        a.add_result(SatResult::Sat);
        a.terms = 3;

        let mut b = Statistics::default();
        b.add_action("mk-term", false);
        b.add_result(SatResult::Sat);
        b.add_result(SatResult::Unsat);
        b.terms = 2;

        a.merge(&b);
        assert_eq!(a.actions["mk-term"], 2);
        assert_eq!(a.actions_ok["mk-term"], 1);
        assert_eq!(a.results["sat"], 2);
        assert_eq!(a.results["unsat"], 1);
        assert_eq!(a.terms, 5);
    }

    #[test]
    fn test_json_round_trip() {
        let mut stats = Statistics::default();
        stats.add_op("OP_BV_ADD", true);
        stats.sorts = 4;
        let json = serde_json::to_string(&stats).unwrap();
        let back: Statistics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ops["OP_BV_ADD"], 1);
        assert_eq!(back.sorts, 4);
    }
}
