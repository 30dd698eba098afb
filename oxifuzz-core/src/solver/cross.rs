//! Cross-check back-end
//!
//! Wraps two SMT-LIB2 back-ends and feeds both the same command stream.
//! Handles are pure rendered data, so handle construction runs through the
//! primary only; declaration-emitting and stateful calls are duplicated to
//! the shadow. Diverging check-sat answers are reported as a solver
//! diagnostic with a stable `cross-check:` prefix.

use rustc_hash::FxHashSet;

use super::smt2::{Smt2Solver, Smt2Sort, Smt2Term};
use super::{SatResult, SolverOption, Value};
use crate::error::{FuzzerError, Result};
use crate::sort::SortKind;
use crate::theory::TheoryId;

/// A pair of SMT-LIB2 back-ends run in lockstep.
#[derive(Debug)]
pub struct CrossSolver {
    primary: Smt2Solver,
    shadow: Smt2Solver,
}

impl CrossSolver {
    /// Create a cross-check pair.
    #[must_use]
    pub fn new(primary: Smt2Solver, shadow: Smt2Solver) -> Self {
        Self { primary, shadow }
    }

    fn check_agreement(&self, a: SatResult, b: SatResult) -> Result<SatResult> {
        // Unknown answers are not disagreements.
        if a != b && a != SatResult::Unknown && b != SatResult::Unknown {
            return Err(FuzzerError::solver(format!("cross-check: {a} vs {b}")));
        }
        Ok(a)
    }

    pub(super) fn new_solver(&mut self) -> Result<()> {
        self.primary.new_solver()?;
        self.shadow.new_solver()
    }

    pub(super) fn delete_solver(&mut self) -> Result<()> {
        self.primary.delete_solver()?;
        self.shadow.delete_solver()
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
        // Emits a declaration; both streams need it.
        let sort = self.primary.mk_sort_uninterpreted(name)?;
        self.shadow.mk_sort_uninterpreted(name)?;
        Ok(sort)
    }

    pub(super) fn mk_const(&mut self, sort: &Smt2Sort, name: &str) -> Result<Smt2Term> {
        let term = self.primary.mk_const(sort, name)?;
        self.shadow.mk_const(sort, name)?;
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
        self.primary.assert_formula(term)?;
        self.shadow.assert_formula(term)
    }

    pub(super) fn check_sat(&mut self) -> Result<SatResult> {
        let a = self.primary.check_sat()?;
        let b = self.shadow.check_sat()?;
        self.check_agreement(a, b)
    }

    pub(super) fn check_sat_assuming(&mut self, assumptions: &[&Smt2Term]) -> Result<SatResult> {
        let a = self.primary.check_sat_assuming(assumptions)?;
        let b = self.shadow.check_sat_assuming(assumptions)?;
        self.check_agreement(a, b)
    }

    pub(super) fn get_unsat_assumptions(&mut self) -> Result<Vec<Smt2Term>> {
        let res = self.primary.get_unsat_assumptions()?;
        self.shadow.get_unsat_assumptions()?;
        Ok(res)
    }

    pub(super) fn get_unsat_core(&mut self) -> Result<Vec<Smt2Term>> {
        let res = self.primary.get_unsat_core()?;
        self.shadow.get_unsat_core()?;
        Ok(res)
    }

    pub(super) fn get_value(&mut self, terms: &[&Smt2Term]) -> Result<Vec<Smt2Term>> {
        let res = self.primary.get_value(terms)?;
        self.shadow.get_value(terms)?;
        Ok(res)
    }

    pub(super) fn push(&mut self, n: u32) -> Result<()> {
        self.primary.push(n)?;
        self.shadow.push(n)
    }

    pub(super) fn pop(&mut self, n: u32) -> Result<()> {
        self.primary.pop(n)?;
        self.shadow.pop(n)
    }

    pub(super) fn print_model(&mut self) -> Result<()> {
        self.primary.print_model()?;
        self.shadow.print_model()
    }

    pub(super) fn reset(&mut self) -> Result<()> {
        self.primary.reset()?;
        self.shadow.reset()
    }

    pub(super) fn reset_assertions(&mut self) -> Result<()> {
        self.primary.reset_assertions()?;
        self.shadow.reset_assertions()
    }

    pub(super) fn set_opt(&mut self, name: &str, value: &str) -> Result<()> {
        self.primary.set_opt(name, value)?;
        self.shadow.set_opt(name, value)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agreement_logic() {
        let solver = CrossSolver::new(Smt2Solver::new(None, None), Smt2Solver::new(None, None));
        assert!(solver.check_agreement(SatResult::Sat, SatResult::Sat).is_ok());
        assert!(
            solver
                .check_agreement(SatResult::Sat, SatResult::Unknown)
                .is_ok()
        );
        let err = solver
            .check_agreement(SatResult::Sat, SatResult::Unsat)
            .unwrap_err();
        assert!(err.to_string().contains("cross-check: sat vs unsat"));
    }
}
