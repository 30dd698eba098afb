//! Term model
//!
//! Terms are owned by the solver manager and referenced by [`TermId`].
//! Values, constants, bound variables and compound expressions are all
//! terms; flags and the quantifier-scope chain distinguish them.

use serde::{Deserialize, Serialize};

use crate::solver::TermRepr;
use crate::sort::SortId;

/// Identifier of a term in the symbolic object database. Ids are unique
/// within a run, start at 1 and increase monotonically.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TermId(pub u64);

impl std::fmt::Display for TermId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A term owned by the solver manager.
#[derive(Debug, Clone)]
pub struct TermData {
    /// Unique id, assigned by the solver manager.
    pub id: TermId,
    /// The sort of this term.
    pub sort: SortId,
    /// True if this term was created through a value-producing API.
    pub is_value: bool,
    /// True if this term is a bound variable.
    pub is_var: bool,
    /// Scope ids of the quantifier scopes enclosing this term, outermost
    /// first. Empty for closed terms. A term is only selectable while its
    /// chain is a prefix of the active scope stack.
    pub levels: Vec<u64>,
    /// Back-end handle.
    pub repr: TermRepr,
}

impl TermData {
    /// Quantifier nesting depth of this term (0 = closed).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }
}
