//! Solver adapter surface
//!
//! The generic capability surface the generator consumes from a back-end.
//! Back-ends are tagged variants of [`Solver`] rather than trait objects, and
//! sort/term handles are tagged variants of [`SortRepr`]/[`TermRepr`]; the
//! handles are owned by the symbolic object database, the back-end owns only
//! its process/stream state.

mod check;
mod cross;
mod smt2;

pub use check::CheckSolver;
pub use cross::CrossSolver;
pub use smt2::{Smt2Solver, Smt2Sort, Smt2Term};

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sort::SortKind;
use crate::theory::TheoryId;

/// Result of a satisfiability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SatResult {
    /// Satisfiable.
    Sat,
    /// Unsatisfiable.
    Unsat,
    /// Unknown.
    Unknown,
}

impl SatResult {
    /// The SMT-LIB answer string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sat => "sat",
            Self::Unsat => "unsat",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for SatResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifier of a special value.
pub type SpecialValueKind = &'static str;

/// The all-zero bit-vector.
pub const SPECIAL_VALUE_BV_ZERO: SpecialValueKind = "bv-zero";
/// The bit-vector one.
pub const SPECIAL_VALUE_BV_ONE: SpecialValueKind = "bv-one";
/// The all-one bit-vector.
pub const SPECIAL_VALUE_BV_ONES: SpecialValueKind = "bv-ones";
/// The minimum signed bit-vector.
pub const SPECIAL_VALUE_BV_MIN_SIGNED: SpecialValueKind = "bv-min-signed";
/// The maximum signed bit-vector.
pub const SPECIAL_VALUE_BV_MAX_SIGNED: SpecialValueKind = "bv-max-signed";
/// Floating-point NaN.
pub const SPECIAL_VALUE_FP_NAN: SpecialValueKind = "fp-nan";
/// Floating-point positive infinity.
pub const SPECIAL_VALUE_FP_POS_INF: SpecialValueKind = "fp-pos-inf";
/// Floating-point negative infinity.
pub const SPECIAL_VALUE_FP_NEG_INF: SpecialValueKind = "fp-neg-inf";
/// Floating-point positive zero.
pub const SPECIAL_VALUE_FP_POS_ZERO: SpecialValueKind = "fp-pos-zero";
/// Floating-point negative zero.
pub const SPECIAL_VALUE_FP_NEG_ZERO: SpecialValueKind = "fp-neg-zero";
/// Round nearest, ties to even.
pub const SPECIAL_VALUE_RM_RNE: SpecialValueKind = "rm-rne";
/// Round nearest, ties away from zero.
pub const SPECIAL_VALUE_RM_RNA: SpecialValueKind = "rm-rna";
/// Round toward negative.
pub const SPECIAL_VALUE_RM_RTN: SpecialValueKind = "rm-rtn";
/// Round toward positive.
pub const SPECIAL_VALUE_RM_RTP: SpecialValueKind = "rm-rtp";
/// Round toward zero.
pub const SPECIAL_VALUE_RM_RTZ: SpecialValueKind = "rm-rtz";
/// The empty regular language.
pub const SPECIAL_VALUE_RE_NONE: SpecialValueKind = "re-none";
/// The universal regular language.
pub const SPECIAL_VALUE_RE_ALL: SpecialValueKind = "re-all";
/// The regular language of all single-character strings.
pub const SPECIAL_VALUE_RE_ALLCHAR: SpecialValueKind = "re-allchar";

/// Special values defined for a sort kind; empty for kinds without any.
#[must_use]
pub fn special_values_of(kind: SortKind) -> &'static [SpecialValueKind] {
    match kind {
        SortKind::Bv => &[
            SPECIAL_VALUE_BV_ZERO,
            SPECIAL_VALUE_BV_ONE,
            SPECIAL_VALUE_BV_ONES,
            SPECIAL_VALUE_BV_MIN_SIGNED,
            SPECIAL_VALUE_BV_MAX_SIGNED,
        ],
        SortKind::Fp => &[
            SPECIAL_VALUE_FP_NAN,
            SPECIAL_VALUE_FP_POS_INF,
            SPECIAL_VALUE_FP_NEG_INF,
            SPECIAL_VALUE_FP_POS_ZERO,
            SPECIAL_VALUE_FP_NEG_ZERO,
        ],
        SortKind::Rm => &[
            SPECIAL_VALUE_RM_RNE,
            SPECIAL_VALUE_RM_RNA,
            SPECIAL_VALUE_RM_RTN,
            SPECIAL_VALUE_RM_RTP,
            SPECIAL_VALUE_RM_RTZ,
        ],
        SortKind::Reglan => &[
            SPECIAL_VALUE_RE_NONE,
            SPECIAL_VALUE_RE_ALL,
            SPECIAL_VALUE_RE_ALLCHAR,
        ],
        _ => &[],
    }
}

/// A literal passed to the value constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Boolean literal.
    Bool(bool),
    /// Integer literal as a decimal string, possibly negative.
    Int(String),
    /// Real literal as a decimal string with a fractional part.
    Real(String),
    /// Rational literal as numerator/denominator decimal strings.
    Rational {
        /// Numerator, possibly negative.
        num: String,
        /// Denominator, positive.
        den: String,
    },
    /// Bit-vector literal as a digit string in the given base (2, 10 or 16).
    Bv {
        /// Digits in the given base.
        value: String,
        /// Numeric base: 2, 10 or 16.
        base: u32,
    },
    /// String literal (printable, unescaped).
    Str(String),
}

/// A configurable back-end option and the values it accepts.
#[derive(Debug, Clone)]
pub struct SolverOption {
    /// Option name, without the SMT-LIB keyword colon.
    pub name: String,
    /// The values the option accepts.
    pub values: Vec<String>,
}

/// Back-end sort handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SortRepr {
    /// Handle of the SMT-LIB2 back-end (shared by the cross-check wrapper).
    Smt2(Smt2Sort),
}

impl SortRepr {
    /// The sort kind recorded in the handle.
    #[must_use]
    pub fn kind(&self) -> SortKind {
        match self {
            Self::Smt2(s) => s.kind(),
        }
    }

    /// Bit-vector width; 0 for non-bit-vector sorts.
    #[must_use]
    pub fn bv_size(&self) -> u32 {
        match self {
            Self::Smt2(s) => s.bv_size(),
        }
    }

    /// Floating-point exponent width; 0 for non-FP sorts.
    #[must_use]
    pub fn fp_exp_size(&self) -> u32 {
        match self {
            Self::Smt2(s) => s.fp_exp_size(),
        }
    }

    /// Floating-point significand width; 0 for non-FP sorts.
    #[must_use]
    pub fn fp_sig_size(&self) -> u32 {
        match self {
            Self::Smt2(s) => s.fp_sig_size(),
        }
    }

    /// Child sort handles (array index/element, function domain + codomain).
    #[must_use]
    pub fn children(&self) -> Vec<SortRepr> {
        match self {
            Self::Smt2(s) => s.children().iter().cloned().map(SortRepr::Smt2).collect(),
        }
    }

    fn as_smt2(&self) -> &Smt2Sort {
        match self {
            Self::Smt2(s) => s,
        }
    }
}

/// Back-end term handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermRepr {
    /// Handle of the SMT-LIB2 back-end (shared by the cross-check wrapper).
    Smt2(Smt2Term),
}

impl TermRepr {
    fn as_smt2(&self) -> &Smt2Term {
        match self {
            Self::Smt2(t) => t,
        }
    }
}

/// A solver back-end. New back-ends add a variant here and forward the same
/// capability surface.
#[derive(Debug)]
pub enum Solver {
    /// The built-in SMT-LIB2 process back-end.
    Smt2(Smt2Solver),
    /// Cross-check wrapper around two SMT-LIB2 back-ends.
    Cross(Box<CrossSolver>),
    /// Wrapper verifying models, unsat cores and unsat assumptions against
    /// a second SMT-LIB2 back-end.
    Check(Box<CheckSolver>),
}

macro_rules! dispatch {
    ($self:ident, $s:ident => $e:expr) => {
        match $self {
            Solver::Smt2($s) => $e,
            Solver::Cross($s) => $e,
            Solver::Check($s) => $e,
        }
    };
}

impl Solver {
    /// Back-end name as used on the command line.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Smt2(_) => "smt2",
            Self::Cross(_) => "cross",
            Self::Check(_) => "check",
        }
    }

    /// Create and initialize the wrapped solver.
    pub fn new_solver(&mut self) -> Result<()> {
        dispatch!(self, s => s.new_solver())
    }

    /// Tear down the wrapped solver. The database must not touch any handle
    /// created by this back-end afterwards.
    pub fn delete_solver(&mut self) -> Result<()> {
        dispatch!(self, s => s.delete_solver())
    }

    /// True if the wrapped solver is initialized.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        dispatch!(self, s => s.is_initialized())
    }

    /// Theories supported by this back-end.
    #[must_use]
    pub fn supported_theories(&self) -> Vec<TheoryId> {
        dispatch!(self, s => s.supported_theories())
    }

    /// Operator kinds this back-end does not support.
    #[must_use]
    pub fn unsupported_op_kinds(&self) -> FxHashSet<String> {
        dispatch!(self, s => s.unsupported_op_kinds())
    }

    /// Sort kinds unsupported for quantified variables.
    #[must_use]
    pub fn unsupported_var_sort_kinds(&self) -> FxHashSet<SortKind> {
        dispatch!(self, s => s.unsupported_var_sort_kinds())
    }

    /// Sort kinds unsupported as array index sorts.
    #[must_use]
    pub fn unsupported_array_index_sort_kinds(&self) -> FxHashSet<SortKind> {
        dispatch!(self, s => s.unsupported_array_index_sort_kinds())
    }

    /// Sort kinds unsupported as array element sorts.
    #[must_use]
    pub fn unsupported_array_element_sort_kinds(&self) -> FxHashSet<SortKind> {
        dispatch!(self, s => s.unsupported_array_element_sort_kinds())
    }

    /// Sort kinds unsupported as function domain sorts.
    #[must_use]
    pub fn unsupported_fun_domain_sort_kinds(&self) -> FxHashSet<SortKind> {
        dispatch!(self, s => s.unsupported_fun_domain_sort_kinds())
    }

    /// Sort kinds unsupported as function codomain sorts.
    #[must_use]
    pub fn unsupported_fun_codomain_sort_kinds(&self) -> FxHashSet<SortKind> {
        dispatch!(self, s => s.unsupported_fun_codomain_sort_kinds())
    }

    /// Sort kinds unsupported in get-value queries.
    #[must_use]
    pub fn unsupported_get_value_sort_kinds(&self) -> FxHashSet<SortKind> {
        dispatch!(self, s => s.unsupported_get_value_sort_kinds())
    }

    /// Create a parameter-free sort (Bool, Int, Real, String, RegLan, RM).
    pub fn mk_sort(&mut self, kind: SortKind) -> Result<SortRepr> {
        dispatch!(self, s => s.mk_sort(kind)).map(SortRepr::Smt2)
    }

    /// Create a bit-vector sort.
    pub fn mk_sort_bv(&mut self, bw: u32) -> Result<SortRepr> {
        dispatch!(self, s => s.mk_sort_bv(bw)).map(SortRepr::Smt2)
    }

    /// Create a floating-point sort.
    pub fn mk_sort_fp(&mut self, exp: u32, sig: u32) -> Result<SortRepr> {
        dispatch!(self, s => s.mk_sort_fp(exp, sig)).map(SortRepr::Smt2)
    }

    /// Create a sort with child sorts: `[index, element]` for arrays, domain
    /// sorts followed by the codomain for function sorts.
    pub fn mk_sort_with_sorts(
        &mut self,
        kind: SortKind,
        sorts: &[&SortRepr],
    ) -> Result<SortRepr> {
        let inner: Vec<&Smt2Sort> = sorts.iter().map(|s| s.as_smt2()).collect();
        dispatch!(self, s => s.mk_sort_with_sorts(kind, &inner)).map(SortRepr::Smt2)
    }

    /// Create (and declare) an uninterpreted sort.
    pub fn mk_sort_uninterpreted(&mut self, name: &str) -> Result<SortRepr> {
        dispatch!(self, s => s.mk_sort_uninterpreted(name)).map(SortRepr::Smt2)
    }

    /// Declare a constant (or a function, for function sorts).
    pub fn mk_const(&mut self, sort: &SortRepr, name: &str) -> Result<TermRepr> {
        dispatch!(self, s => s.mk_const(sort.as_smt2(), name)).map(TermRepr::Smt2)
    }

    /// Create a bound variable for use under a quantifier.
    pub fn mk_var(&mut self, sort: &SortRepr, name: &str) -> Result<TermRepr> {
        dispatch!(self, s => s.mk_var(sort.as_smt2(), name)).map(TermRepr::Smt2)
    }

    /// Create a value term from a literal.
    pub fn mk_value(&mut self, sort: &SortRepr, value: &Value) -> Result<TermRepr> {
        dispatch!(self, s => s.mk_value(sort.as_smt2(), value)).map(TermRepr::Smt2)
    }

    /// Create a special value term.
    pub fn mk_special_value(&mut self, sort: &SortRepr, value: &str) -> Result<TermRepr> {
        dispatch!(self, s => s.mk_special_value(sort.as_smt2(), value)).map(TermRepr::Smt2)
    }

    /// Create a compound term.
    pub fn mk_term(
        &mut self,
        kind: &str,
        args: &[&TermRepr],
        idxs: &[u32],
    ) -> Result<TermRepr> {
        let inner: Vec<&Smt2Term> = args.iter().map(|t| t.as_smt2()).collect();
        dispatch!(self, s => s.mk_term(kind, &inner, idxs)).map(TermRepr::Smt2)
    }

    /// The sort of a term, as a fresh handle to be canonicalized by the
    /// database.
    #[must_use]
    pub fn get_sort(&self, term: &TermRepr) -> SortRepr {
        SortRepr::Smt2(dispatch!(self, s => s.get_sort(term.as_smt2())))
    }

    /// Assert a Boolean term.
    pub fn assert_formula(&mut self, term: &TermRepr) -> Result<()> {
        dispatch!(self, s => s.assert_formula(term.as_smt2()))
    }

    /// Check satisfiability of the current assertion set.
    pub fn check_sat(&mut self) -> Result<SatResult> {
        dispatch!(self, s => s.check_sat())
    }

    /// Check satisfiability under the given assumptions.
    pub fn check_sat_assuming(&mut self, assumptions: &[&TermRepr]) -> Result<SatResult> {
        let inner: Vec<&Smt2Term> = assumptions.iter().map(|t| t.as_smt2()).collect();
        dispatch!(self, s => s.check_sat_assuming(&inner))
    }

    /// Retrieve the failed assumptions after an unsat check.
    pub fn get_unsat_assumptions(&mut self) -> Result<Vec<TermRepr>> {
        dispatch!(self, s => s.get_unsat_assumptions())
            .map(|v| v.into_iter().map(TermRepr::Smt2).collect())
    }

    /// Retrieve the unsat core after an unsat check.
    pub fn get_unsat_core(&mut self) -> Result<Vec<TermRepr>> {
        dispatch!(self, s => s.get_unsat_core())
            .map(|v| v.into_iter().map(TermRepr::Smt2).collect())
    }

    /// Retrieve model values for the given terms after a sat check.
    pub fn get_value(&mut self, terms: &[&TermRepr]) -> Result<Vec<TermRepr>> {
        let inner: Vec<&Smt2Term> = terms.iter().map(|t| t.as_smt2()).collect();
        dispatch!(self, s => s.get_value(&inner))
            .map(|v| v.into_iter().map(TermRepr::Smt2).collect())
    }

    /// Push `n` assertion levels.
    pub fn push(&mut self, n: u32) -> Result<()> {
        dispatch!(self, s => s.push(n))
    }

    /// Pop `n` assertion levels.
    pub fn pop(&mut self, n: u32) -> Result<()> {
        dispatch!(self, s => s.pop(n))
    }

    /// Print the current model.
    pub fn print_model(&mut self) -> Result<()> {
        dispatch!(self, s => s.print_model())
    }

    /// Reset the solver to its initial state.
    pub fn reset(&mut self) -> Result<()> {
        dispatch!(self, s => s.reset())
    }

    /// Remove all assertions, keeping declarations.
    pub fn reset_assertions(&mut self) -> Result<()> {
        dispatch!(self, s => s.reset_assertions())
    }

    /// Set a back-end option.
    pub fn set_opt(&mut self, name: &str, value: &str) -> Result<()> {
        dispatch!(self, s => s.set_opt(name, value))
    }

    /// The options this back-end accepts, for option fuzzing.
    #[must_use]
    pub fn option_catalog(&self) -> Vec<SolverOption> {
        dispatch!(self, s => s.option_catalog())
    }

    /// Name of the incrementality option.
    #[must_use]
    pub fn option_name_incremental(&self) -> &'static str {
        dispatch!(self, s => s.option_name_incremental())
    }

    /// Name of the model-production option.
    #[must_use]
    pub fn option_name_model_gen(&self) -> &'static str {
        dispatch!(self, s => s.option_name_model_gen())
    }

    /// Name of the unsat-assumptions option.
    #[must_use]
    pub fn option_name_unsat_assumptions(&self) -> &'static str {
        dispatch!(self, s => s.option_name_unsat_assumptions())
    }

    /// Name of the unsat-cores option.
    #[must_use]
    pub fn option_name_unsat_cores(&self) -> &'static str {
        dispatch!(self, s => s.option_name_unsat_cores())
    }

    /// True if incrementality is currently enabled.
    #[must_use]
    pub fn option_incremental_enabled(&self) -> bool {
        dispatch!(self, s => s.option_incremental_enabled())
    }

    /// True if model production is currently enabled.
    #[must_use]
    pub fn option_model_gen_enabled(&self) -> bool {
        dispatch!(self, s => s.option_model_gen_enabled())
    }

    /// True if unsat-assumption production is currently enabled.
    #[must_use]
    pub fn option_unsat_assumptions_enabled(&self) -> bool {
        dispatch!(self, s => s.option_unsat_assumptions_enabled())
    }

    /// True if unsat-core production is currently enabled.
    #[must_use]
    pub fn option_unsat_cores_enabled(&self) -> bool {
        dispatch!(self, s => s.option_unsat_cores_enabled())
    }
}
