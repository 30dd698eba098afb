//! Operator model
//!
//! Operators are keyed by stable string kinds so trace files stay portable
//! across back-ends; solver-specific kinds carry a back-end prefix. Each
//! operator declares its theory, arity (a negative value `-n` means "at
//! least n arguments"), number of compile-time indices, result sort kind and
//! argument sort kinds. [`SortKind::Any`] in an argument position means the
//! concrete sort is inferred at argument-selection time (all `Any` slots of
//! one application share a sort).

use indexmap::IndexSet;
use rustc_hash::{FxBuildHasher, FxHashSet};

use crate::FxIndexMap;
use crate::config::N_ARGS_BIN;
use crate::sort::SortKind;
use crate::theory::TheoryId;

/// Stable string identifier of an operator kind.
pub type OpKind = &'static str;

/// Sentinel returned when no operator is currently applicable.
pub const OP_UNDEFINED: OpKind = "OP_UNDEFINED";

// Boolean operators.
/// Conjunction.
pub const OP_AND: OpKind = "OP_AND";
/// Disjunction.
pub const OP_OR: OpKind = "OP_OR";
/// Exclusive or.
pub const OP_XOR: OpKind = "OP_XOR";
/// Negation.
pub const OP_NOT: OpKind = "OP_NOT";
/// Implication.
pub const OP_IMPLIES: OpKind = "OP_IMPLIES";
/// If-then-else over an inferred branch sort.
pub const OP_ITE: OpKind = "OP_ITE";
/// Equality over an inferred shared sort.
pub const OP_EQUAL: OpKind = "OP_EQUAL";
/// Pairwise disequality over an inferred shared sort.
pub const OP_DISTINCT: OpKind = "OP_DISTINCT";

// Array operators.
/// Array read.
pub const OP_ARRAY_SELECT: OpKind = "OP_ARRAY_SELECT";
/// Array write.
pub const OP_ARRAY_STORE: OpKind = "OP_ARRAY_STORE";

// Bit-vector operators.
/// Concatenation.
pub const OP_BV_CONCAT: OpKind = "OP_BV_CONCAT";
/// Bit extraction, indexed by upper and lower bound.
pub const OP_BV_EXTRACT: OpKind = "OP_BV_EXTRACT";
/// Repetition, indexed by the repetition count.
pub const OP_BV_REPEAT: OpKind = "OP_BV_REPEAT";
/// Left rotation, indexed by the rotation distance.
pub const OP_BV_ROTATE_LEFT: OpKind = "OP_BV_ROTATE_LEFT";
/// Right rotation, indexed by the rotation distance.
pub const OP_BV_ROTATE_RIGHT: OpKind = "OP_BV_ROTATE_RIGHT";
/// Sign extension, indexed by the number of added bits.
pub const OP_BV_SIGN_EXTEND: OpKind = "OP_BV_SIGN_EXTEND";
/// Zero extension, indexed by the number of added bits.
pub const OP_BV_ZERO_EXTEND: OpKind = "OP_BV_ZERO_EXTEND";
/// Bit-wise negation.
pub const OP_BV_NOT: OpKind = "OP_BV_NOT";
/// Two's complement negation.
pub const OP_BV_NEG: OpKind = "OP_BV_NEG";
/// Bit-wise and.
pub const OP_BV_AND: OpKind = "OP_BV_AND";
/// Bit-wise nand.
pub const OP_BV_NAND: OpKind = "OP_BV_NAND";
/// Bit-wise nor.
pub const OP_BV_NOR: OpKind = "OP_BV_NOR";
/// Bit-wise or.
pub const OP_BV_OR: OpKind = "OP_BV_OR";
/// Bit-wise xor.
pub const OP_BV_XOR: OpKind = "OP_BV_XOR";
/// Bit-wise xnor.
pub const OP_BV_XNOR: OpKind = "OP_BV_XNOR";
/// Addition.
pub const OP_BV_ADD: OpKind = "OP_BV_ADD";
/// Subtraction.
pub const OP_BV_SUB: OpKind = "OP_BV_SUB";
/// Multiplication.
pub const OP_BV_MUL: OpKind = "OP_BV_MUL";
/// Unsigned division.
pub const OP_BV_UDIV: OpKind = "OP_BV_UDIV";
/// Unsigned remainder.
pub const OP_BV_UREM: OpKind = "OP_BV_UREM";
/// Signed division.
pub const OP_BV_SDIV: OpKind = "OP_BV_SDIV";
/// Signed remainder.
pub const OP_BV_SREM: OpKind = "OP_BV_SREM";
/// Signed modulo.
pub const OP_BV_SMOD: OpKind = "OP_BV_SMOD";
/// Shift left.
pub const OP_BV_SHL: OpKind = "OP_BV_SHL";
/// Logical shift right.
pub const OP_BV_LSHR: OpKind = "OP_BV_LSHR";
/// Arithmetic shift right.
pub const OP_BV_ASHR: OpKind = "OP_BV_ASHR";
/// Equality comparison producing a width-1 bit-vector.
pub const OP_BV_COMP: OpKind = "OP_BV_COMP";
/// Unsigned less-than.
pub const OP_BV_ULT: OpKind = "OP_BV_ULT";
/// Unsigned less-or-equal.
pub const OP_BV_ULE: OpKind = "OP_BV_ULE";
/// Unsigned greater-than.
pub const OP_BV_UGT: OpKind = "OP_BV_UGT";
/// Unsigned greater-or-equal.
pub const OP_BV_UGE: OpKind = "OP_BV_UGE";
/// Signed less-than.
pub const OP_BV_SLT: OpKind = "OP_BV_SLT";
/// Signed less-or-equal.
pub const OP_BV_SLE: OpKind = "OP_BV_SLE";
/// Signed greater-than.
pub const OP_BV_SGT: OpKind = "OP_BV_SGT";
/// Signed greater-or-equal.
pub const OP_BV_SGE: OpKind = "OP_BV_SGE";

// Integer operators.
/// Negation.
pub const OP_INT_NEG: OpKind = "OP_INT_NEG";
/// Subtraction.
pub const OP_INT_SUB: OpKind = "OP_INT_SUB";
/// Addition.
pub const OP_INT_ADD: OpKind = "OP_INT_ADD";
/// Multiplication.
pub const OP_INT_MUL: OpKind = "OP_INT_MUL";
/// Euclidean division.
pub const OP_INT_DIV: OpKind = "OP_INT_DIV";
/// Modulo.
pub const OP_INT_MOD: OpKind = "OP_INT_MOD";
/// Absolute value.
pub const OP_INT_ABS: OpKind = "OP_INT_ABS";
/// Less-than.
pub const OP_INT_LT: OpKind = "OP_INT_LT";
/// Less-or-equal.
pub const OP_INT_LE: OpKind = "OP_INT_LE";
/// Greater-than.
pub const OP_INT_GT: OpKind = "OP_INT_GT";
/// Greater-or-equal.
pub const OP_INT_GE: OpKind = "OP_INT_GE";
/// Divisibility test, indexed by the divisor.
pub const OP_INT_DIVISIBLE: OpKind = "OP_INT_DIVISIBLE";
/// Conversion to Real.
pub const OP_INT_TO_REAL: OpKind = "OP_INT_TO_REAL";

// Real operators.
/// Negation.
pub const OP_REAL_NEG: OpKind = "OP_REAL_NEG";
/// Subtraction.
pub const OP_REAL_SUB: OpKind = "OP_REAL_SUB";
/// Addition.
pub const OP_REAL_ADD: OpKind = "OP_REAL_ADD";
/// Multiplication.
pub const OP_REAL_MUL: OpKind = "OP_REAL_MUL";
/// Division.
pub const OP_REAL_DIV: OpKind = "OP_REAL_DIV";
/// Less-than.
pub const OP_REAL_LT: OpKind = "OP_REAL_LT";
/// Less-or-equal.
pub const OP_REAL_LE: OpKind = "OP_REAL_LE";
/// Greater-than.
pub const OP_REAL_GT: OpKind = "OP_REAL_GT";
/// Greater-or-equal.
pub const OP_REAL_GE: OpKind = "OP_REAL_GE";
/// Integrality test.
pub const OP_REAL_IS_INT: OpKind = "OP_REAL_IS_INT";
/// Conversion to Int (floor).
pub const OP_REAL_TO_INT: OpKind = "OP_REAL_TO_INT";

// Floating-point operators.
/// Absolute value.
pub const OP_FP_ABS: OpKind = "OP_FP_ABS";
/// Negation.
pub const OP_FP_NEG: OpKind = "OP_FP_NEG";
/// Addition.
pub const OP_FP_ADD: OpKind = "OP_FP_ADD";
/// Subtraction.
pub const OP_FP_SUB: OpKind = "OP_FP_SUB";
/// Multiplication.
pub const OP_FP_MUL: OpKind = "OP_FP_MUL";
/// Division.
pub const OP_FP_DIV: OpKind = "OP_FP_DIV";
/// Fused multiply-add.
pub const OP_FP_FMA: OpKind = "OP_FP_FMA";
/// Square root.
pub const OP_FP_SQRT: OpKind = "OP_FP_SQRT";
/// Remainder.
pub const OP_FP_REM: OpKind = "OP_FP_REM";
/// Round to integral.
pub const OP_FP_RTI: OpKind = "OP_FP_RTI";
/// Minimum.
pub const OP_FP_MIN: OpKind = "OP_FP_MIN";
/// Maximum.
pub const OP_FP_MAX: OpKind = "OP_FP_MAX";
/// IEEE less-or-equal.
pub const OP_FP_LEQ: OpKind = "OP_FP_LEQ";
/// IEEE less-than.
pub const OP_FP_LT: OpKind = "OP_FP_LT";
/// IEEE greater-or-equal.
pub const OP_FP_GEQ: OpKind = "OP_FP_GEQ";
/// IEEE greater-than.
pub const OP_FP_GT: OpKind = "OP_FP_GT";
/// IEEE equality.
pub const OP_FP_EQ: OpKind = "OP_FP_EQ";
/// Normality test.
pub const OP_FP_IS_NORMAL: OpKind = "OP_FP_IS_NORMAL";
/// Subnormality test.
pub const OP_FP_IS_SUBNORMAL: OpKind = "OP_FP_IS_SUBNORMAL";
/// Zero test.
pub const OP_FP_IS_ZERO: OpKind = "OP_FP_IS_ZERO";
/// Infinity test.
pub const OP_FP_IS_INF: OpKind = "OP_FP_IS_INF";
/// NaN test.
pub const OP_FP_IS_NAN: OpKind = "OP_FP_IS_NAN";
/// Sign test (negative).
pub const OP_FP_IS_NEG: OpKind = "OP_FP_IS_NEG";
/// Sign test (positive).
pub const OP_FP_IS_POS: OpKind = "OP_FP_IS_POS";
/// Conversion from a signed bit-vector, indexed by the target format.
pub const OP_FP_TO_FP_FROM_SBV: OpKind = "OP_FP_TO_FP_FROM_SBV";
/// Conversion from an unsigned bit-vector, indexed by the target format.
pub const OP_FP_TO_FP_FROM_UBV: OpKind = "OP_FP_TO_FP_FROM_UBV";
/// Conversion from another FP format, indexed by the target format.
pub const OP_FP_TO_FP_FROM_FP: OpKind = "OP_FP_TO_FP_FROM_FP";
/// Conversion from a real, indexed by the target format.
pub const OP_FP_TO_FP_FROM_REAL: OpKind = "OP_FP_TO_FP_FROM_REAL";
/// Conversion to an unsigned bit-vector, indexed by the target width.
pub const OP_FP_TO_UBV: OpKind = "OP_FP_TO_UBV";
/// Conversion to a signed bit-vector, indexed by the target width.
pub const OP_FP_TO_SBV: OpKind = "OP_FP_TO_SBV";
/// Conversion to a real.
pub const OP_FP_TO_REAL: OpKind = "OP_FP_TO_REAL";

// String operators.
/// Concatenation.
pub const OP_STR_CONCAT: OpKind = "OP_STR_CONCAT";
/// Length.
pub const OP_STR_LEN: OpKind = "OP_STR_LEN";
/// Lexicographic less-than.
pub const OP_STR_LT: OpKind = "OP_STR_LT";
/// Lexicographic less-or-equal.
pub const OP_STR_LE: OpKind = "OP_STR_LE";
/// Character at index.
pub const OP_STR_AT: OpKind = "OP_STR_AT";
/// Substring.
pub const OP_STR_SUBSTR: OpKind = "OP_STR_SUBSTR";
/// Prefix test.
pub const OP_STR_PREFIXOF: OpKind = "OP_STR_PREFIXOF";
/// Suffix test.
pub const OP_STR_SUFFIXOF: OpKind = "OP_STR_SUFFIXOF";
/// Containment test.
pub const OP_STR_CONTAINS: OpKind = "OP_STR_CONTAINS";
/// First index of occurrence.
pub const OP_STR_INDEXOF: OpKind = "OP_STR_INDEXOF";
/// Replace first occurrence.
pub const OP_STR_REPLACE: OpKind = "OP_STR_REPLACE";
/// Replace all occurrences.
pub const OP_STR_REPLACE_ALL: OpKind = "OP_STR_REPLACE_ALL";
/// Digit test.
pub const OP_STR_IS_DIGIT: OpKind = "OP_STR_IS_DIGIT";
/// Code point of a singleton string.
pub const OP_STR_TO_CODE: OpKind = "OP_STR_TO_CODE";
/// Singleton string from a code point.
pub const OP_STR_FROM_CODE: OpKind = "OP_STR_FROM_CODE";
/// String to integer.
pub const OP_STR_TO_INT: OpKind = "OP_STR_TO_INT";
/// Integer to string.
pub const OP_STR_FROM_INT: OpKind = "OP_STR_FROM_INT";
/// String to regular language.
pub const OP_STR_TO_RE: OpKind = "OP_STR_TO_RE";
/// Membership test.
pub const OP_STR_IN_RE: OpKind = "OP_STR_IN_RE";

// Regular-language operators.
/// Concatenation.
pub const OP_RE_CONCAT: OpKind = "OP_RE_CONCAT";
/// Union.
pub const OP_RE_UNION: OpKind = "OP_RE_UNION";
/// Intersection.
pub const OP_RE_INTER: OpKind = "OP_RE_INTER";
/// Difference.
pub const OP_RE_DIFF: OpKind = "OP_RE_DIFF";
/// Kleene star.
pub const OP_RE_STAR: OpKind = "OP_RE_STAR";
/// Kleene plus.
pub const OP_RE_PLUS: OpKind = "OP_RE_PLUS";
/// Option.
pub const OP_RE_OPT: OpKind = "OP_RE_OPT";
/// Complement.
pub const OP_RE_COMP: OpKind = "OP_RE_COMP";
/// Character range; arguments must be singleton strings.
pub const OP_RE_RANGE: OpKind = "OP_RE_RANGE";
/// Power, indexed by the exponent.
pub const OP_RE_POW: OpKind = "OP_RE_POW";
/// Bounded loop, indexed by lower and upper bound.
pub const OP_RE_LOOP: OpKind = "OP_RE_LOOP";

// Uninterpreted functions.
/// Function application; first argument is the function term.
pub const OP_UF_APPLY: OpKind = "OP_UF_APPLY";

// Quantifiers.
/// Universal quantification over one bound variable.
pub const OP_FORALL: OpKind = "OP_FORALL";
/// Existential quantification over one bound variable.
pub const OP_EXISTS: OpKind = "OP_EXISTS";

/// An operator of the catalog.
#[derive(Debug, Clone)]
pub struct Op {
    /// Stable string kind; solver-specific kinds carry a back-end prefix.
    pub kind: String,
    /// The theory this operator belongs to.
    pub theory: TheoryId,
    /// Fixed arity if non-negative; `-n` means at least `n` arguments.
    pub arity: i8,
    /// Number of compile-time integer indices.
    pub nidxs: u32,
    /// Result sort kind; [`SortKind::Any`] means inferred from arguments.
    pub sort_kind: SortKind,
    /// Argument sort kinds. A single [`SortKind::Any`] entry on an n-ary
    /// operator means all arguments share one inferred sort.
    pub arg_sort_kinds: Vec<SortKind>,
}

impl Op {
    /// Declared sort kind of argument `i`; n-ary operators repeat their last
    /// declared kind.
    #[must_use]
    pub fn arg_sort_kind(&self, i: usize) -> SortKind {
        let idx = i.min(self.arg_sort_kinds.len() - 1);
        self.arg_sort_kinds[idx]
    }

    /// Minimum number of arguments.
    #[must_use]
    pub fn min_arity(&self) -> usize {
        self.arity.unsigned_abs() as usize
    }

    /// True if this operator accepts a variable number of arguments.
    #[must_use]
    pub fn is_nary(&self) -> bool {
        self.arity < 0
    }

    /// True if this operator carries compile-time indices.
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.nidxs > 0
    }
}

/// The operator catalog for one run: the static defaults restricted to the
/// enabled theories minus the back-end's unsupported kinds, plus any
/// solver-specific kinds the back-end registered.
#[derive(Debug)]
pub struct OpKindManager {
    ops: FxIndexMap<String, Op>,
}

impl OpKindManager {
    /// Build the catalog for the given theory/operator restrictions.
    #[must_use]
    pub fn new(
        enabled_theories: &IndexSet<TheoryId, FxBuildHasher>,
        unsupported: &FxHashSet<String>,
        arith_linear: bool,
    ) -> Self {
        let mut mgr = Self {
            ops: FxIndexMap::default(),
        };
        for op in default_ops() {
            if !enabled_theories.contains(&op.theory) {
                continue;
            }
            if unsupported.contains(&op.kind) {
                continue;
            }
            if arith_linear
                && matches!(
                    op.kind.as_str(),
                    OP_INT_MUL | OP_INT_DIV | OP_INT_MOD | OP_REAL_MUL | OP_REAL_DIV
                )
            {
                continue;
            }
            // Quantified formulas need both the quantifier theory and a
            // body-producing theory; the FORALL/EXISTS entries alone carry
            // theory QUANT.
            mgr.add_op(op);
        }
        mgr
    }

    fn add_op(&mut self, op: Op) {
        debug_assert!(!self.ops.contains_key(&op.kind));
        self.ops.insert(op.kind.clone(), op);
    }

    /// Register a solver-specific operator. The kind must carry a back-end
    /// prefix so traces remain unambiguous.
    pub fn add_solver_op(&mut self, op: Op) {
        self.add_op(op);
    }

    /// Look up an operator by kind.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&Op> {
        self.ops.get(kind)
    }

    /// The full catalog, in insertion order.
    #[must_use]
    pub fn ops(&self) -> &FxIndexMap<String, Op> {
        &self.ops
    }
}

fn op(
    kind: OpKind,
    theory: TheoryId,
    arity: i8,
    nidxs: u32,
    sort_kind: SortKind,
    arg_sort_kinds: &[SortKind],
) -> Op {
    Op {
        kind: kind.to_string(),
        theory,
        arity,
        nidxs,
        sort_kind,
        arg_sort_kinds: arg_sort_kinds.to_vec(),
    }
}

/// The static operator catalog.
fn default_ops() -> Vec<Op> {
    use SortKind::{Any, Array, Bool, Bv, Fp, Fun, Int, Real, Reglan, Rm, String as Str};
    use TheoryId as T;

    vec![
        // Boolean.
        op(OP_AND, T::Bool, N_ARGS_BIN, 0, Bool, &[Bool]),
        op(OP_OR, T::Bool, N_ARGS_BIN, 0, Bool, &[Bool]),
        op(OP_XOR, T::Bool, 2, 0, Bool, &[Bool]),
        op(OP_NOT, T::Bool, 1, 0, Bool, &[Bool]),
        op(OP_IMPLIES, T::Bool, N_ARGS_BIN, 0, Bool, &[Bool]),
        op(OP_ITE, T::Bool, 3, 0, Any, &[Bool, Any, Any]),
        op(OP_EQUAL, T::Bool, N_ARGS_BIN, 0, Bool, &[Any]),
        op(OP_DISTINCT, T::Bool, N_ARGS_BIN, 0, Bool, &[Any]),
        // Arrays.
        op(OP_ARRAY_SELECT, T::Array, 2, 0, Any, &[Array, Any]),
        op(OP_ARRAY_STORE, T::Array, 3, 0, Array, &[Array, Any, Any]),
        // Bit-vectors.
        op(OP_BV_CONCAT, T::Bv, N_ARGS_BIN, 0, Bv, &[Bv]),
        op(OP_BV_EXTRACT, T::Bv, 1, 2, Bv, &[Bv]),
        op(OP_BV_REPEAT, T::Bv, 1, 1, Bv, &[Bv]),
        op(OP_BV_ROTATE_LEFT, T::Bv, 1, 1, Bv, &[Bv]),
        op(OP_BV_ROTATE_RIGHT, T::Bv, 1, 1, Bv, &[Bv]),
        op(OP_BV_SIGN_EXTEND, T::Bv, 1, 1, Bv, &[Bv]),
        op(OP_BV_ZERO_EXTEND, T::Bv, 1, 1, Bv, &[Bv]),
        op(OP_BV_NOT, T::Bv, 1, 0, Bv, &[Bv]),
        op(OP_BV_NEG, T::Bv, 1, 0, Bv, &[Bv]),
        op(OP_BV_AND, T::Bv, N_ARGS_BIN, 0, Bv, &[Bv]),
        op(OP_BV_NAND, T::Bv, 2, 0, Bv, &[Bv]),
        op(OP_BV_NOR, T::Bv, 2, 0, Bv, &[Bv]),
        op(OP_BV_OR, T::Bv, N_ARGS_BIN, 0, Bv, &[Bv]),
        op(OP_BV_XOR, T::Bv, N_ARGS_BIN, 0, Bv, &[Bv]),
        op(OP_BV_XNOR, T::Bv, 2, 0, Bv, &[Bv]),
        op(OP_BV_ADD, T::Bv, N_ARGS_BIN, 0, Bv, &[Bv]),
        op(OP_BV_SUB, T::Bv, 2, 0, Bv, &[Bv]),
        op(OP_BV_MUL, T::Bv, N_ARGS_BIN, 0, Bv, &[Bv]),
        op(OP_BV_UDIV, T::Bv, 2, 0, Bv, &[Bv]),
        op(OP_BV_UREM, T::Bv, 2, 0, Bv, &[Bv]),
        op(OP_BV_SDIV, T::Bv, 2, 0, Bv, &[Bv]),
        op(OP_BV_SREM, T::Bv, 2, 0, Bv, &[Bv]),
        op(OP_BV_SMOD, T::Bv, 2, 0, Bv, &[Bv]),
        op(OP_BV_SHL, T::Bv, 2, 0, Bv, &[Bv]),
        op(OP_BV_LSHR, T::Bv, 2, 0, Bv, &[Bv]),
        op(OP_BV_ASHR, T::Bv, 2, 0, Bv, &[Bv]),
        op(OP_BV_COMP, T::Bv, 2, 0, Bv, &[Bv]),
        op(OP_BV_ULT, T::Bv, 2, 0, Bool, &[Bv]),
        op(OP_BV_ULE, T::Bv, 2, 0, Bool, &[Bv]),
        op(OP_BV_UGT, T::Bv, 2, 0, Bool, &[Bv]),
        op(OP_BV_UGE, T::Bv, 2, 0, Bool, &[Bv]),
        op(OP_BV_SLT, T::Bv, 2, 0, Bool, &[Bv]),
        op(OP_BV_SLE, T::Bv, 2, 0, Bool, &[Bv]),
        op(OP_BV_SGT, T::Bv, 2, 0, Bool, &[Bv]),
        op(OP_BV_SGE, T::Bv, 2, 0, Bool, &[Bv]),
        // Integers.
        op(OP_INT_NEG, T::Int, 1, 0, Int, &[Int]),
        op(OP_INT_SUB, T::Int, N_ARGS_BIN, 0, Int, &[Int]),
        op(OP_INT_ADD, T::Int, N_ARGS_BIN, 0, Int, &[Int]),
        op(OP_INT_MUL, T::Int, N_ARGS_BIN, 0, Int, &[Int]),
        op(OP_INT_DIV, T::Int, N_ARGS_BIN, 0, Int, &[Int]),
        op(OP_INT_MOD, T::Int, 2, 0, Int, &[Int]),
        op(OP_INT_ABS, T::Int, 1, 0, Int, &[Int]),
        op(OP_INT_LT, T::Int, N_ARGS_BIN, 0, Bool, &[Int]),
        op(OP_INT_LE, T::Int, N_ARGS_BIN, 0, Bool, &[Int]),
        op(OP_INT_GT, T::Int, N_ARGS_BIN, 0, Bool, &[Int]),
        op(OP_INT_GE, T::Int, N_ARGS_BIN, 0, Bool, &[Int]),
        op(OP_INT_DIVISIBLE, T::Int, 1, 1, Bool, &[Int]),
        op(OP_INT_TO_REAL, T::Int, 1, 0, Real, &[Int]),
        // Reals. Argument selection may substitute Int terms (Int ≤ Real).
        op(OP_REAL_NEG, T::Real, 1, 0, Real, &[Real]),
        op(OP_REAL_SUB, T::Real, N_ARGS_BIN, 0, Real, &[Real]),
        op(OP_REAL_ADD, T::Real, N_ARGS_BIN, 0, Real, &[Real]),
        op(OP_REAL_MUL, T::Real, N_ARGS_BIN, 0, Real, &[Real]),
        op(OP_REAL_DIV, T::Real, N_ARGS_BIN, 0, Real, &[Real]),
        op(OP_REAL_LT, T::Real, N_ARGS_BIN, 0, Bool, &[Real]),
        op(OP_REAL_LE, T::Real, N_ARGS_BIN, 0, Bool, &[Real]),
        op(OP_REAL_GT, T::Real, N_ARGS_BIN, 0, Bool, &[Real]),
        op(OP_REAL_GE, T::Real, N_ARGS_BIN, 0, Bool, &[Real]),
        op(OP_REAL_IS_INT, T::Real, 1, 0, Bool, &[Real]),
        op(OP_REAL_TO_INT, T::Real, 1, 0, Int, &[Real]),
        // Floating-points.
        op(OP_FP_ABS, T::Fp, 1, 0, Fp, &[Fp]),
        op(OP_FP_NEG, T::Fp, 1, 0, Fp, &[Fp]),
        op(OP_FP_ADD, T::Fp, 3, 0, Fp, &[Rm, Fp, Fp]),
        op(OP_FP_SUB, T::Fp, 3, 0, Fp, &[Rm, Fp, Fp]),
        op(OP_FP_MUL, T::Fp, 3, 0, Fp, &[Rm, Fp, Fp]),
        op(OP_FP_DIV, T::Fp, 3, 0, Fp, &[Rm, Fp, Fp]),
        op(OP_FP_FMA, T::Fp, 4, 0, Fp, &[Rm, Fp, Fp, Fp]),
        op(OP_FP_SQRT, T::Fp, 2, 0, Fp, &[Rm, Fp]),
        op(OP_FP_REM, T::Fp, 2, 0, Fp, &[Fp, Fp]),
        op(OP_FP_RTI, T::Fp, 2, 0, Fp, &[Rm, Fp]),
        op(OP_FP_MIN, T::Fp, 2, 0, Fp, &[Fp, Fp]),
        op(OP_FP_MAX, T::Fp, 2, 0, Fp, &[Fp, Fp]),
        op(OP_FP_LEQ, T::Fp, 2, 0, Bool, &[Fp]),
        op(OP_FP_LT, T::Fp, 2, 0, Bool, &[Fp]),
        op(OP_FP_GEQ, T::Fp, 2, 0, Bool, &[Fp]),
        op(OP_FP_GT, T::Fp, 2, 0, Bool, &[Fp]),
        op(OP_FP_EQ, T::Fp, 2, 0, Bool, &[Fp]),
        op(OP_FP_IS_NORMAL, T::Fp, 1, 0, Bool, &[Fp]),
        op(OP_FP_IS_SUBNORMAL, T::Fp, 1, 0, Bool, &[Fp]),
        op(OP_FP_IS_ZERO, T::Fp, 1, 0, Bool, &[Fp]),
        op(OP_FP_IS_INF, T::Fp, 1, 0, Bool, &[Fp]),
        op(OP_FP_IS_NAN, T::Fp, 1, 0, Bool, &[Fp]),
        op(OP_FP_IS_NEG, T::Fp, 1, 0, Bool, &[Fp]),
        op(OP_FP_IS_POS, T::Fp, 1, 0, Bool, &[Fp]),
        op(OP_FP_TO_FP_FROM_SBV, T::Fp, 2, 2, Fp, &[Rm, Bv]),
        op(OP_FP_TO_FP_FROM_UBV, T::Fp, 2, 2, Fp, &[Rm, Bv]),
        op(OP_FP_TO_FP_FROM_FP, T::Fp, 2, 2, Fp, &[Rm, Fp]),
        op(OP_FP_TO_FP_FROM_REAL, T::Fp, 2, 2, Fp, &[Rm, Real]),
        op(OP_FP_TO_UBV, T::Fp, 2, 1, Bv, &[Rm, Fp]),
        op(OP_FP_TO_SBV, T::Fp, 2, 1, Bv, &[Rm, Fp]),
        op(OP_FP_TO_REAL, T::Fp, 1, 0, Real, &[Fp]),
        // Strings.
        op(OP_STR_CONCAT, T::String, N_ARGS_BIN, 0, Str, &[Str]),
        op(OP_STR_LEN, T::String, 1, 0, Int, &[Str]),
        op(OP_STR_LT, T::String, 2, 0, Bool, &[Str]),
        op(OP_STR_LE, T::String, 2, 0, Bool, &[Str]),
        op(OP_STR_AT, T::String, 2, 0, Str, &[Str, Int]),
        op(OP_STR_SUBSTR, T::String, 3, 0, Str, &[Str, Int, Int]),
        op(OP_STR_PREFIXOF, T::String, 2, 0, Bool, &[Str]),
        op(OP_STR_SUFFIXOF, T::String, 2, 0, Bool, &[Str]),
        op(OP_STR_CONTAINS, T::String, 2, 0, Bool, &[Str]),
        op(OP_STR_INDEXOF, T::String, 3, 0, Int, &[Str, Str, Int]),
        op(OP_STR_REPLACE, T::String, 3, 0, Str, &[Str]),
        op(OP_STR_REPLACE_ALL, T::String, 3, 0, Str, &[Str]),
        op(OP_STR_IS_DIGIT, T::String, 1, 0, Bool, &[Str]),
        op(OP_STR_TO_CODE, T::String, 1, 0, Int, &[Str]),
        op(OP_STR_FROM_CODE, T::String, 1, 0, Str, &[Int]),
        op(OP_STR_TO_INT, T::String, 1, 0, Int, &[Str]),
        op(OP_STR_FROM_INT, T::String, 1, 0, Str, &[Int]),
        op(OP_STR_TO_RE, T::String, 1, 0, Reglan, &[Str]),
        op(OP_STR_IN_RE, T::String, 2, 0, Bool, &[Str, Reglan]),
        // Regular languages.
        op(OP_RE_CONCAT, T::String, N_ARGS_BIN, 0, Reglan, &[Reglan]),
        op(OP_RE_UNION, T::String, N_ARGS_BIN, 0, Reglan, &[Reglan]),
        op(OP_RE_INTER, T::String, N_ARGS_BIN, 0, Reglan, &[Reglan]),
        op(OP_RE_DIFF, T::String, 2, 0, Reglan, &[Reglan]),
        op(OP_RE_STAR, T::String, 1, 0, Reglan, &[Reglan]),
        op(OP_RE_PLUS, T::String, 1, 0, Reglan, &[Reglan]),
        op(OP_RE_OPT, T::String, 1, 0, Reglan, &[Reglan]),
        op(OP_RE_COMP, T::String, 1, 0, Reglan, &[Reglan]),
        op(OP_RE_RANGE, T::String, 2, 0, Reglan, &[Str]),
        op(OP_RE_POW, T::String, 1, 1, Reglan, &[Reglan]),
        op(OP_RE_LOOP, T::String, 1, 2, Reglan, &[Reglan]),
        // Uninterpreted functions.
        op(OP_UF_APPLY, T::Uf, N_ARGS_BIN, 0, Any, &[Fun, Any]),
        // Quantifiers.
        op(OP_FORALL, T::Quant, 2, 0, Bool, &[Any, Bool]),
        op(OP_EXISTS, T::Quant, 2, 0, Bool, &[Any, Bool]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_theories_enabled() -> IndexSet<TheoryId, FxBuildHasher> {
        crate::theory::ALL_THEORIES.iter().copied().collect()
    }

    #[test]
    fn test_catalog_has_no_duplicate_kinds() {
        let ops = default_ops();
        let mut seen = FxHashSet::default();
        for op in &ops {
            assert!(seen.insert(op.kind.clone()), "duplicate op {}", op.kind);
        }
    }

    #[test]
    fn test_catalog_is_filtered_by_theory() {
        let mut enabled: IndexSet<TheoryId, FxBuildHasher> = IndexSet::default();
        enabled.insert(TheoryId::Bool);
        enabled.insert(TheoryId::Bv);
        let mgr = OpKindManager::new(&enabled, &FxHashSet::default(), false);
        assert!(mgr.get(OP_BV_ADD).is_some());
        assert!(mgr.get(OP_AND).is_some());
        assert!(mgr.get(OP_INT_ADD).is_none());
        assert!(mgr.get(OP_FORALL).is_none());
    }

    #[test]
    fn test_unsupported_ops_are_dropped() {
        let mut unsupported = FxHashSet::default();
        unsupported.insert(OP_BV_SMOD.to_string());
        let mgr = OpKindManager::new(&all_theories_enabled(), &unsupported, false);
        assert!(mgr.get(OP_BV_SMOD).is_none());
        assert!(mgr.get(OP_BV_ADD).is_some());
    }

    #[test]
    fn test_linear_arithmetic_restriction() {
        let mgr = OpKindManager::new(&all_theories_enabled(), &FxHashSet::default(), true);
        assert!(mgr.get(OP_INT_MUL).is_none());
        assert!(mgr.get(OP_REAL_DIV).is_none());
        assert!(mgr.get(OP_INT_ADD).is_some());
    }

    #[test]
    fn test_arity_sentinels() {
        let mgr = OpKindManager::new(&all_theories_enabled(), &FxHashSet::default(), false);
        let and = mgr.get(OP_AND).unwrap();
        assert!(and.is_nary());
        assert_eq!(and.min_arity(), 2);
        let not = mgr.get(OP_NOT).unwrap();
        assert!(!not.is_nary());
        assert_eq!(not.min_arity(), 1);
        let extract = mgr.get(OP_BV_EXTRACT).unwrap();
        assert_eq!(extract.nidxs, 2);
        assert!(extract.is_indexed());
    }

    #[test]
    fn test_solver_specific_op_registration() {
        let mut mgr = OpKindManager::new(&all_theories_enabled(), &FxHashSet::default(), false);
        mgr.add_solver_op(Op {
            kind: "smt2-OP_CUSTOM".to_string(),
            theory: TheoryId::Bv,
            arity: 1,
            nidxs: 0,
            sort_kind: SortKind::Bv,
            arg_sort_kinds: vec![SortKind::Bv],
        });
        assert!(mgr.get("smt2-OP_CUSTOM").is_some());
    }
}
