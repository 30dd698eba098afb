//! Checking back-end
//!
//! Wraps the solver under test together with a second, independently driven
//! solver and re-verifies the answers to the model/core queries:
//!
//! - `get-value`: the echoed term/value pairs are asserted as equalities in
//!   the checking solver (which carries the same assertion set); an unsat
//!   answer means the reported model does not satisfy the formula.
//! - `get-unsat-assumptions`: the reported failed assumptions are re-checked
//!   with `check-sat-assuming` on the checking solver; a sat answer means
//!   they are not actually inconsistent.
//! - `get-unsat-core`: assertions are sent to the solver under test with
//!   `:named` annotations; the reported core is re-asserted, alone, in a
//!   fresh checking instance whose check-sat must not answer sat.
//!
//! Mismatches are reported as solver diagnostics with a stable `check:`
//! prefix, the same shape the cross-check wrapper uses. Unknown answers from
//! the checking solver are inconclusive and pass, so rendering-only mode
//! degrades gracefully.

use rustc_hash::FxHashSet;

use super::smt2::{Smt2Solver, Smt2Sort, Smt2Term};
use super::{SatResult, SolverOption, Value, smt2::split_sexpr_list};
use crate::error::{FuzzerError, Result};
use crate::sort::SortKind;
use crate::theory::TheoryId;

/// A declaration to replay into a fresh checking instance, in emission
/// order.
#[derive(Debug, Clone)]
enum Decl {
    Sort(String),
    Const(Smt2Sort, String),
}

/// A named assertion and the push level it was made at.
#[derive(Debug, Clone)]
struct NamedAssertion {
    level: u32,
    name: String,
    term: Smt2Term,
}

/// The solver under test paired with a checking solver.
#[derive(Debug)]
pub struct CheckSolver {
    primary: Smt2Solver,
    checker: Smt2Solver,
    check_binary: Option<String>,
    decls: Vec<Decl>,
    named: Vec<NamedAssertion>,
    n_named: u64,
    level: u32,
}

impl CheckSolver {
    /// Create a checking pair. `check_binary` is also used for the fresh
    /// instances spawned by unsat-core verification.
    #[must_use]
    pub fn new(primary: Smt2Solver, checker: Smt2Solver, check_binary: Option<String>) -> Self {
        Self {
            primary,
            checker,
            check_binary,
            decls: Vec::new(),
            named: Vec::new(),
            n_named: 0,
            level: 0,
        }
    }

    fn clear_assertions(&mut self) {
        self.named.clear();
        self.level = 0;
    }

    #[cfg(test)]
    fn n_tracked_assertions(&self) -> usize {
        self.named.len()
    }

    pub(super) fn new_solver(&mut self) -> Result<()> {
        self.primary.new_solver()?;
        self.checker.new_solver()
    }

    pub(super) fn delete_solver(&mut self) -> Result<()> {
        self.primary.delete_solver()?;
        self.checker.delete_solver()
    }

    pub(super) fn is_initialized(&self) -> bool {
        self.primary.is_initialized()
    }

    pub(super) fn supported_theories(&self) -> Vec<TheoryId> {
        self.primary.supported_theories()
    }

    pub(super) fn unsupported_op_kinds(&self) -> FxHashSet<String> {
        self.primary.unsupported_op_kinds()
    }

    pub(super) fn unsupported_var_sort_kinds(&self) -> FxHashSet<SortKind> {
        self.primary.unsupported_var_sort_kinds()
    }

    pub(super) fn unsupported_array_index_sort_kinds(&self) -> FxHashSet<SortKind> {
        self.primary.unsupported_array_index_sort_kinds()
    }

    pub(super) fn unsupported_array_element_sort_kinds(&self) -> FxHashSet<SortKind> {
        self.primary.unsupported_array_element_sort_kinds()
    }

    pub(super) fn unsupported_fun_domain_sort_kinds(&self) -> FxHashSet<SortKind> {
        self.primary.unsupported_fun_domain_sort_kinds()
    }

    pub(super) fn unsupported_fun_codomain_sort_kinds(&self) -> FxHashSet<SortKind> {
        self.primary.unsupported_fun_codomain_sort_kinds()
    }

    pub(super) fn unsupported_get_value_sort_kinds(&self) -> FxHashSet<SortKind> {
        self.primary.unsupported_get_value_sort_kinds()
    }

    pub(super) fn mk_sort(&mut self, kind: SortKind) -> Result<Smt2Sort> {
        self.primary.mk_sort(kind)
    }

    pub(super) fn mk_sort_bv(&mut self, bw: u32) -> Result<Smt2Sort> {
        self.primary.mk_sort_bv(bw)
    }

    pub(super) fn mk_sort_fp(&mut self, exp: u32, sig: u32) -> Result<Smt2Sort> {
        self.primary.mk_sort_fp(exp, sig)
    }

    pub(super) fn mk_sort_with_sorts(
        &mut self,
        kind: SortKind,
        sorts: &[&Smt2Sort],
    ) -> Result<Smt2Sort> {
        self.primary.mk_sort_with_sorts(kind, sorts)
    }

    pub(super) fn mk_sort_uninterpreted(&mut self, name: &str) -> Result<Smt2Sort> {
        let sort = self.primary.mk_sort_uninterpreted(name)?;
        self.checker.mk_sort_uninterpreted(name)?;
        self.decls.push(Decl::Sort(name.to_string()));
        Ok(sort)
    }

    pub(super) fn mk_const(&mut self, sort: &Smt2Sort, name: &str) -> Result<Smt2Term> {
        let term = self.primary.mk_const(sort, name)?;
        self.checker.mk_const(sort, name)?;
        self.decls.push(Decl::Const(sort.clone(), name.to_string()));
        Ok(term)
    }

    pub(super) fn mk_var(&mut self, sort: &Smt2Sort, name: &str) -> Result<Smt2Term> {
        self.primary.mk_var(sort, name)
    }

    pub(super) fn mk_value(&mut self, sort: &Smt2Sort, value: &Value) -> Result<Smt2Term> {
        self.primary.mk_value(sort, value)
    }

    pub(super) fn mk_special_value(&mut self, sort: &Smt2Sort, value: &str) -> Result<Smt2Term> {
        self.primary.mk_special_value(sort, value)
    }

    pub(super) fn mk_term(
        &mut self,
        kind: &str,
        args: &[&Smt2Term],
        idxs: &[u32],
    ) -> Result<Smt2Term> {
        self.primary.mk_term(kind, args, idxs)
    }

    pub(super) fn get_sort(&self, term: &Smt2Term) -> Smt2Sort {
        self.primary.get_sort(term)
    }

    pub(super) fn assert_formula(&mut self, term: &Smt2Term) -> Result<()> {
        // Cores only contain assertions that were named when asserted.
        if self.primary.option_unsat_cores_enabled() {
            let name = format!("_a{}", self.n_named);
            self.n_named += 1;
            self.primary.assert_named(term, &name)?;
            self.named.push(NamedAssertion {
                level: self.level,
                name,
                term: term.clone(),
            });
        } else {
            self.primary.assert_formula(term)?;
        }
        self.checker.assert_formula(term)
    }

    pub(super) fn check_sat(&mut self) -> Result<SatResult> {
        self.primary.check_sat()
    }

    pub(super) fn check_sat_assuming(&mut self, assumptions: &[&Smt2Term]) -> Result<SatResult> {
        self.primary.check_sat_assuming(assumptions)
    }

    pub(super) fn get_unsat_assumptions(&mut self) -> Result<Vec<Smt2Term>> {
        let response = self.primary.get_unsat_assumptions_raw()?;
        let failed = split_sexpr_list(&response);
        if !failed.is_empty() {
            let result = self.checker.check_sat_assuming_text(&failed)?;
            if result == SatResult::Sat {
                return Err(FuzzerError::solver(
                    "check: unsat assumptions are satisfiable",
                ));
            }
        }
        Ok(Vec::new())
    }

    pub(super) fn get_unsat_core(&mut self) -> Result<Vec<Smt2Term>> {
        let response = self.primary.get_unsat_core_raw()?;
        let core: Vec<Smt2Term> = split_sexpr_list(&response)
            .iter()
            .filter_map(|name| {
                self.named
                    .iter()
                    .find(|a| a.name == *name)
                    .map(|a| a.term.clone())
            })
            .collect();
        if !core.is_empty() {
            // The core must be inconsistent on its own, so it is replayed
            // into a fresh instance holding nothing but the declarations.
            let mut aux = Smt2Solver::new(self.check_binary.clone(), None);
            aux.new_solver()?;
            for decl in &self.decls {
                match decl {
                    Decl::Sort(name) => {
                        aux.mk_sort_uninterpreted(name)?;
                    }
                    Decl::Const(sort, name) => {
                        aux.mk_const(sort, name)?;
                    }
                }
            }
            for term in &core {
                aux.assert_formula(term)?;
            }
            let result = aux.check_sat()?;
            aux.delete_solver()?;
            if result == SatResult::Sat {
                return Err(FuzzerError::solver("check: unsat core is satisfiable"));
            }
        }
        Ok(Vec::new())
    }

    pub(super) fn get_value(&mut self, terms: &[&Smt2Term]) -> Result<Vec<Smt2Term>> {
        let response = self.primary.get_value_raw(terms)?;
        let pairs = parse_value_pairs(&response);
        if !pairs.is_empty() {
            self.checker.push(1)?;
            for (term, value) in &pairs {
                self.checker.assert_text(&format!("(= {term} {value})"))?;
            }
            let result = self.checker.check_sat()?;
            self.checker.pop(1)?;
            if result == SatResult::Unsat {
                return Err(FuzzerError::solver("check: model values are inconsistent"));
            }
        }
        Ok(Vec::new())
    }

    pub(super) fn push(&mut self, n: u32) -> Result<()> {
        self.primary.push(n)?;
        self.checker.push(n)?;
        self.level += n;
        Ok(())
    }

    pub(super) fn pop(&mut self, n: u32) -> Result<()> {
        self.primary.pop(n)?;
        self.checker.pop(n)?;
        self.level = self.level.saturating_sub(n);
        let level = self.level;
        self.named.retain(|a| a.level <= level);
        Ok(())
    }

    pub(super) fn print_model(&mut self) -> Result<()> {
        self.primary.print_model()
    }

    pub(super) fn reset(&mut self) -> Result<()> {
        self.primary.reset()?;
        self.checker.reset()?;
        self.decls.clear();
        self.clear_assertions();
        Ok(())
    }

    pub(super) fn reset_assertions(&mut self) -> Result<()> {
        self.primary.reset_assertions()?;
        self.checker.reset_assertions()?;
        self.clear_assertions();
        Ok(())
    }

    pub(super) fn set_opt(&mut self, name: &str, value: &str) -> Result<()> {
        self.primary.set_opt(name, value)?;
        self.checker.set_opt(name, value)
    }

    pub(super) fn option_catalog(&self) -> Vec<SolverOption> {
        self.primary.option_catalog()
    }

    pub(super) fn option_name_incremental(&self) -> &'static str {
        self.primary.option_name_incremental()
    }

    pub(super) fn option_name_model_gen(&self) -> &'static str {
        self.primary.option_name_model_gen()
    }

    pub(super) fn option_name_unsat_assumptions(&self) -> &'static str {
        self.primary.option_name_unsat_assumptions()
    }

    pub(super) fn option_name_unsat_cores(&self) -> &'static str {
        self.primary.option_name_unsat_cores()
    }

    pub(super) fn option_incremental_enabled(&self) -> bool {
        self.primary.option_incremental_enabled()
    }

    pub(super) fn option_model_gen_enabled(&self) -> bool {
        self.primary.option_model_gen_enabled()
    }

    pub(super) fn option_unsat_assumptions_enabled(&self) -> bool {
        self.primary.option_unsat_assumptions_enabled()
    }

    pub(super) fn option_unsat_cores_enabled(&self) -> bool {
        self.primary.option_unsat_cores_enabled()
    }
}

/// Parse a get-value answer `((t1 v1) (t2 v2) …)` into (term, value) text
/// pairs; malformed entries are skipped.
fn parse_value_pairs(response: &str) -> Vec<(String, String)> {
    split_sexpr_list(response)
        .into_iter()
        .filter_map(|entry| {
            let mut parts = split_sexpr_list(&entry).into_iter();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(term), Some(value), None) => Some((term, value)),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_check_solver() -> CheckSolver {
        let mut solver = CheckSolver::new(
            Smt2Solver::new(None, None),
            Smt2Solver::new(None, None),
            None,
        );
        solver.new_solver().unwrap();
        solver
    }

    #[test]
    fn test_parse_value_pairs() {
        let pairs = parse_value_pairs("((x 1) ((select a i) #b0101) (y (- 2)))");
        assert_eq!(
            pairs,
            vec![
                ("x".to_string(), "1".to_string()),
                ("(select a i)".to_string(), "#b0101".to_string()),
                ("y".to_string(), "(- 2)".to_string()),
            ]
        );
        assert!(parse_value_pairs("").is_empty());
        assert!(parse_value_pairs("(malformed)").is_empty());
    }

    #[test]
    fn test_assertions_are_named_only_with_cores_enabled() {
        let mut solver = offline_check_solver();
        let p = solver.mk_const(&Smt2Sort::bool_sort(), "p").unwrap();
        solver.assert_formula(&p).unwrap();
        assert_eq!(solver.n_tracked_assertions(), 0);

        solver.set_opt("produce-unsat-cores", "true").unwrap();
        solver.assert_formula(&p).unwrap();
        assert_eq!(solver.n_tracked_assertions(), 1);
    }

    #[test]
    fn test_pop_drops_named_assertions_of_popped_levels() {
        let mut solver = offline_check_solver();
        solver.set_opt("produce-unsat-cores", "true").unwrap();
        let p = solver.mk_const(&Smt2Sort::bool_sort(), "p").unwrap();
        solver.assert_formula(&p).unwrap();
        solver.push(1).unwrap();
        solver.assert_formula(&p).unwrap();
        assert_eq!(solver.n_tracked_assertions(), 2);
        solver.pop(1).unwrap();
        assert_eq!(solver.n_tracked_assertions(), 1);
    }

    #[test]
    fn test_offline_queries_are_inconclusive() {
        // Rendering-only mode yields empty answers; all checks pass.
        let mut solver = offline_check_solver();
        solver.set_opt("produce-unsat-cores", "true").unwrap();
        let p = solver.mk_const(&Smt2Sort::bool_sort(), "p").unwrap();
        solver.assert_formula(&p).unwrap();
        assert!(solver.get_value(&[&p]).unwrap().is_empty());
        assert!(solver.get_unsat_core().unwrap().is_empty());
        assert!(solver.get_unsat_assumptions().unwrap().is_empty());
    }

    #[test]
    fn test_declarations_are_recorded_for_core_replay() {
        let mut solver = offline_check_solver();
        solver.mk_sort_uninterpreted("u0").unwrap();
        solver.mk_const(&Smt2Sort::bool_sort(), "p").unwrap();
        assert_eq!(solver.decls.len(), 2);
        solver.reset().unwrap();
        assert!(solver.decls.is_empty());
    }
}
