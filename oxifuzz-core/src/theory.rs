//! Theory catalog
//!
//! The closed set of SMT-LIB theories the generator knows about. The set of
//! theories enabled for a run is the intersection of the user's selection and
//! the back-end's supported theories; Booleans are always on.

use serde::{Deserialize, Serialize};

/// A supported SMT-LIB theory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum TheoryId {
    /// Theory of arrays.
    Array,
    /// Theory of bags (multisets).
    Bag,
    /// Boolean theory; always enabled.
    Bool,
    /// Theory of fixed-size bit-vectors.
    Bv,
    /// Theory of algebraic datatypes.
    Dt,
    /// Theory of floating-point arithmetic.
    Fp,
    /// Theory of integers.
    Int,
    /// Quantified formulas.
    Quant,
    /// Theory of reals.
    Real,
    /// Theory of sequences.
    Seq,
    /// Theory of finite sets.
    Set,
    /// Theory of strings and regular languages.
    String,
    /// Transcendental extensions of real arithmetic.
    Transcendental,
    /// Uninterpreted functions and sorts.
    Uf,
    /// Synthetic marker covering all theories.
    All,
}

/// Every concrete theory, in catalog order (excludes [`TheoryId::All`]).
pub const ALL_THEORIES: &[TheoryId] = &[
    TheoryId::Array,
    TheoryId::Bag,
    TheoryId::Bool,
    TheoryId::Bv,
    TheoryId::Dt,
    TheoryId::Fp,
    TheoryId::Int,
    TheoryId::Quant,
    TheoryId::Real,
    TheoryId::Seq,
    TheoryId::Set,
    TheoryId::String,
    TheoryId::Transcendental,
    TheoryId::Uf,
];

/// Theories disabled unless explicitly requested (non-standardized ones).
pub const DEFAULT_DISABLED_THEORIES: &[TheoryId] =
    &[TheoryId::Bag, TheoryId::Seq, TheoryId::Set];

impl TheoryId {
    /// The name used on the command line (`--bv`, `--no-strings`, ...) and in
    /// statistics output.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Array => "arrays",
            Self::Bag => "bags",
            Self::Bool => "bool",
            Self::Bv => "bv",
            Self::Dt => "dt",
            Self::Fp => "fp",
            Self::Int => "ints",
            Self::Quant => "quant",
            Self::Real => "reals",
            Self::Seq => "seq",
            Self::Set => "sets",
            Self::String => "strings",
            Self::Transcendental => "trans",
            Self::Uf => "uf",
            Self::All => "all",
        }
    }

    /// Parse a theory from its command-line name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_THEORIES.iter().copied().find(|t| t.as_str() == name)
    }
}

impl std::fmt::Display for TheoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theory_name_round_trip() {
        for theory in ALL_THEORIES {
            assert_eq!(TheoryId::from_name(theory.as_str()), Some(*theory));
        }
        assert_eq!(TheoryId::from_name("nonsense"), None);
    }

    #[test]
    fn test_default_disabled() {
        assert!(DEFAULT_DISABLED_THEORIES.contains(&TheoryId::Bag));
        assert!(DEFAULT_DISABLED_THEORIES.contains(&TheoryId::Seq));
        assert!(DEFAULT_DISABLED_THEORIES.contains(&TheoryId::Set));
        assert!(!DEFAULT_DISABLED_THEORIES.contains(&TheoryId::Bool));
    }
}
