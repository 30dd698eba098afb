//! Sort model
//!
//! Sorts are owned by the solver manager and referenced by [`SortId`]
//! everywhere else. Each sort carries the back-end handle it was created
//! with plus the structural attributes the generator needs for sampling
//! (bit-width, floating-point format, child sorts).

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::solver::SortRepr;
use crate::theory::TheoryId;

/// Identifier of a sort in the symbolic object database. Ids are unique
/// within a run, start at 1 and increase monotonically.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SortId(pub u64);

impl std::fmt::Display for SortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// The kind of a sort.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum SortKind {
    /// Array sorts.
    Array,
    /// Bag sorts.
    Bag,
    /// The Boolean sort.
    Bool,
    /// Bit-vector sorts.
    Bv,
    /// Datatype sorts.
    Dt,
    /// Floating-point sorts.
    Fp,
    /// Function sorts.
    Fun,
    /// The integer sort.
    Int,
    /// The real sort.
    Real,
    /// The regular-language sort.
    Reglan,
    /// The rounding-mode sort.
    Rm,
    /// Sequence sorts.
    Seq,
    /// Set sorts.
    Set,
    /// The string sort.
    String,
    /// Uninterpreted sorts.
    Uninterpreted,
    /// Wildcard used by the operator catalog; never stored in the database.
    Any,
}

/// Every concrete sort kind, in catalog order (excludes [`SortKind::Any`]).
pub const ALL_SORT_KINDS: &[SortKind] = &[
    SortKind::Array,
    SortKind::Bag,
    SortKind::Bool,
    SortKind::Bv,
    SortKind::Dt,
    SortKind::Fp,
    SortKind::Fun,
    SortKind::Int,
    SortKind::Real,
    SortKind::Reglan,
    SortKind::Rm,
    SortKind::Seq,
    SortKind::Set,
    SortKind::String,
    SortKind::Uninterpreted,
];

impl SortKind {
    /// Stable name used in trace files (`mk-sort BV 8`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Array => "ARRAY",
            Self::Bag => "BAG",
            Self::Bool => "BOOL",
            Self::Bv => "BV",
            Self::Dt => "DT",
            Self::Fp => "FP",
            Self::Fun => "FUN",
            Self::Int => "INT",
            Self::Real => "REAL",
            Self::Reglan => "REGLAN",
            Self::Rm => "RM",
            Self::Seq => "SEQ",
            Self::Set => "SET",
            Self::String => "STRING",
            Self::Uninterpreted => "UNINTERPRETED",
            Self::Any => "ANY",
        }
    }

    /// Parse a sort kind from its trace name.
    #[must_use]
    pub fn from_str_kind(s: &str) -> Option<Self> {
        ALL_SORT_KINDS.iter().copied().find(|k| k.as_str() == s)
    }

    /// The theory this sort kind belongs to.
    #[must_use]
    pub fn theory(&self) -> TheoryId {
        match self {
            Self::Array => TheoryId::Array,
            Self::Bag => TheoryId::Bag,
            Self::Bool => TheoryId::Bool,
            Self::Bv => TheoryId::Bv,
            Self::Dt => TheoryId::Dt,
            Self::Fp | Self::Rm => TheoryId::Fp,
            Self::Fun | Self::Uninterpreted => TheoryId::Uf,
            Self::Int => TheoryId::Int,
            Self::Real => TheoryId::Real,
            Self::Reglan | Self::String => TheoryId::String,
            Self::Seq => TheoryId::Seq,
            Self::Set => TheoryId::Set,
            Self::Any => TheoryId::All,
        }
    }

    /// The sort kinds contributed by a theory. The FP theory contributes the
    /// rounding-mode sort, the string theory the regular-language sort.
    #[must_use]
    pub fn kinds_of_theory(theory: TheoryId) -> &'static [SortKind] {
        match theory {
            TheoryId::Array => &[SortKind::Array],
            TheoryId::Bag => &[SortKind::Bag],
            TheoryId::Bool => &[SortKind::Bool],
            TheoryId::Bv => &[SortKind::Bv],
            TheoryId::Dt => &[SortKind::Dt],
            TheoryId::Fp => &[SortKind::Fp, SortKind::Rm],
            TheoryId::Int => &[SortKind::Int],
            TheoryId::Real => &[SortKind::Real],
            TheoryId::Seq => &[SortKind::Seq],
            TheoryId::Set => &[SortKind::Set],
            TheoryId::String => &[SortKind::String, SortKind::Reglan],
            TheoryId::Uf => &[SortKind::Fun, SortKind::Uninterpreted],
            TheoryId::Quant | TheoryId::Transcendental | TheoryId::All => &[],
        }
    }
}

impl std::fmt::Display for SortKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sort owned by the solver manager.
#[derive(Debug, Clone)]
pub struct SortData {
    /// Unique id, assigned by the solver manager.
    pub id: SortId,
    /// The kind of this sort.
    pub kind: SortKind,
    /// Back-end handle.
    pub repr: SortRepr,
    /// Child sorts: `[index, element]` for arrays, domain sorts followed by
    /// the codomain for function sorts. Empty otherwise.
    pub sorts: SmallVec<[SortId; 2]>,
}

impl SortData {
    /// True if this is a bit-vector sort.
    #[must_use]
    pub fn is_bv(&self) -> bool {
        self.kind == SortKind::Bv
    }

    /// True if this is the integer sort.
    #[must_use]
    pub fn is_int(&self) -> bool {
        self.kind == SortKind::Int
    }

    /// True if this sort is acceptable where a real sort is required. Int is
    /// a subtype of Real, so this holds for both kinds.
    #[must_use]
    pub fn is_real(&self) -> bool {
        matches!(self.kind, SortKind::Real | SortKind::Int)
    }

    /// Bit-vector width; 0 for non-bit-vector sorts.
    #[must_use]
    pub fn bv_size(&self) -> u32 {
        self.repr.bv_size()
    }

    /// Floating-point exponent width; 0 for non-FP sorts.
    #[must_use]
    pub fn fp_exp_size(&self) -> u32 {
        self.repr.fp_exp_size()
    }

    /// Floating-point significand width; 0 for non-FP sorts.
    #[must_use]
    pub fn fp_sig_size(&self) -> u32 {
        self.repr.fp_sig_size()
    }

    /// Index sort of an array sort.
    #[must_use]
    pub fn array_index_sort(&self) -> Option<SortId> {
        (self.kind == SortKind::Array).then(|| self.sorts[0])
    }

    /// Element sort of an array sort.
    #[must_use]
    pub fn array_element_sort(&self) -> Option<SortId> {
        (self.kind == SortKind::Array).then(|| self.sorts[1])
    }

    /// Arity of a function sort (codomain excluded).
    #[must_use]
    pub fn fun_arity(&self) -> usize {
        debug_assert_eq!(self.kind, SortKind::Fun);
        self.sorts.len().saturating_sub(1)
    }

    /// Domain sorts of a function sort.
    #[must_use]
    pub fn fun_domain_sorts(&self) -> &[SortId] {
        debug_assert_eq!(self.kind, SortKind::Fun);
        &self.sorts[..self.sorts.len() - 1]
    }

    /// Codomain sort of a function sort.
    #[must_use]
    pub fn fun_codomain_sort(&self) -> SortId {
        debug_assert_eq!(self.kind, SortKind::Fun);
        *self.sorts.last().expect("function sort without codomain")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_kind_round_trip() {
        for kind in ALL_SORT_KINDS {
            assert_eq!(SortKind::from_str_kind(kind.as_str()), Some(*kind));
        }
        assert_eq!(SortKind::from_str_kind("BOGUS"), None);
    }

    #[test]
    fn test_theory_sort_kinds() {
        assert_eq!(
            SortKind::kinds_of_theory(TheoryId::Fp),
            &[SortKind::Fp, SortKind::Rm]
        );
        assert_eq!(
            SortKind::kinds_of_theory(TheoryId::String),
            &[SortKind::String, SortKind::Reglan]
        );
        assert!(SortKind::kinds_of_theory(TheoryId::Quant).is_empty());
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(SortId(3).to_string(), "s3");
        assert_eq!(SortKind::Bv.to_string(), "BV");
    }
}
