//! Term database
//!
//! The level-partitioned sampling index over all terms the generator has
//! created. Level 0 holds closed terms; each open quantifier scope adds a
//! level owning its bound variable. Scope ids are monotonically increasing
//! and never reused, so a term's scope chain can only ever match the live
//! stack. When a scope closes its level is dropped wholesale from the index,
//! which keeps every indexed term selectable by construction.

use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;

use crate::rng::RngSource;
use crate::sort::{SortId, SortKind};
use crate::term::TermId;
use crate::{FxIndexMap, FxIndexSet};

#[derive(Debug, Default)]
struct ScopeLevel {
    scope_id: u64,
    var: Option<TermId>,
    terms: FxIndexMap<SortKind, FxIndexMap<SortId, FxIndexSet<TermId>>>,
}

impl ScopeLevel {
    fn count(&self, kind: SortKind) -> usize {
        self.terms
            .get(&kind)
            .map_or(0, |by_sort| by_sort.values().map(IndexSet::len).sum())
    }

    fn count_sort(&self, sort: SortId) -> usize {
        self.terms
            .values()
            .filter_map(|by_sort| by_sort.get(&sort))
            .map(IndexSet::len)
            .sum()
    }
}

/// Level-partitioned term index.
#[derive(Debug)]
pub struct TermDb {
    levels: Vec<ScopeLevel>,
    next_scope_id: u64,
}

impl Default for TermDb {
    fn default() -> Self {
        Self::new()
    }
}

impl TermDb {
    /// Create an empty database with only the global level.
    #[must_use]
    pub fn new() -> Self {
        Self {
            levels: vec![ScopeLevel::default()],
            next_scope_id: 1,
        }
    }

    /// Drop everything, back to the global level.
    pub fn clear(&mut self) {
        self.levels = vec![ScopeLevel::default()];
        self.next_scope_id = 1;
    }

    /// Current quantifier nesting depth (0 = no open scope).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Scope ids of the open scopes, outermost first.
    #[must_use]
    pub fn scope_chain(&self) -> Vec<u64> {
        self.levels[1..].iter().map(|l| l.scope_id).collect()
    }

    /// Open a scope owning the given bound variable; returns the scope id.
    pub fn push_scope(&mut self, var: TermId) -> u64 {
        let scope_id = self.next_scope_id;
        self.next_scope_id += 1;
        self.levels.push(ScopeLevel {
            scope_id,
            var: Some(var),
            terms: FxIndexMap::default(),
        });
        scope_id
    }

    /// Close the innermost scope, dropping its variable and every term that
    /// was registered at that depth.
    pub fn pop_scope(&mut self) -> Option<TermId> {
        debug_assert!(self.depth() > 0);
        self.levels.pop().and_then(|l| l.var)
    }

    /// Register a term at the given depth.
    pub fn add(&mut self, term: TermId, kind: SortKind, sort: SortId, depth: usize) {
        debug_assert!(depth <= self.depth());
        self.levels[depth]
            .terms
            .entry(kind)
            .or_default()
            .entry(sort)
            .or_default()
            .insert(term);
    }

    /// True if any term exists.
    #[must_use]
    pub fn has_term(&self) -> bool {
        self.levels
            .iter()
            .any(|l| l.terms.values().any(|by_sort| !by_sort.is_empty()))
    }

    /// True if a term of the given sort kind exists at any reachable level.
    #[must_use]
    pub fn has_term_kind(&self, kind: SortKind) -> bool {
        if kind == SortKind::Any {
            return self.has_term();
        }
        self.levels.iter().any(|l| l.count(kind) > 0)
    }

    /// True if a term of the given sort kind exists at exactly this depth.
    #[must_use]
    pub fn has_term_kind_at(&self, kind: SortKind, depth: usize) -> bool {
        self.levels.get(depth).is_some_and(|l| l.count(kind) > 0)
    }

    /// True if a term of the given sort exists.
    #[must_use]
    pub fn has_term_sort(&self, sort: SortId) -> bool {
        self.levels.iter().any(|l| l.count_sort(sort) > 0)
    }

    /// Number of registered terms (selectable ones only).
    #[must_use]
    pub fn n_terms(&self) -> usize {
        self.levels
            .iter()
            .map(|l| {
                l.terms
                    .values()
                    .flat_map(|by_sort| by_sort.values())
                    .map(IndexSet::len)
                    .sum::<usize>()
            })
            .sum()
    }

    /// Sort kinds that currently have at least one term.
    #[must_use]
    pub fn sort_kinds_with_terms(&self) -> FxIndexSet<SortKind> {
        let mut kinds: FxIndexSet<SortKind> = IndexSet::default();
        for level in &self.levels {
            for (kind, by_sort) in &level.terms {
                if by_sort.values().any(|s| !s.is_empty()) {
                    kinds.insert(*kind);
                }
            }
        }
        kinds
    }

    /// Sorts that currently have at least one term.
    #[must_use]
    pub fn sorts_with_terms(&self) -> FxIndexSet<SortId> {
        let mut sorts: FxIndexSet<SortId> = IndexSet::default();
        for level in &self.levels {
            for by_sort in level.terms.values() {
                for (sort, terms) in by_sort {
                    if !terms.is_empty() {
                        sorts.insert(*sort);
                    }
                }
            }
        }
        sorts
    }

    /// Sorts of the given kind that currently have at least one term.
    #[must_use]
    pub fn sorts_with_terms_of_kind(&self, kind: SortKind) -> FxIndexSet<SortId> {
        let mut sorts: FxIndexSet<SortId> = IndexSet::default();
        for level in &self.levels {
            if let Some(by_sort) = level.terms.get(&kind) {
                for (sort, terms) in by_sort {
                    if !terms.is_empty() {
                        sorts.insert(*sort);
                    }
                }
            }
        }
        sorts
    }

    /// Uniform pick of a sort kind among those with terms.
    pub fn pick_sort_kind(&self, rng: &mut RngSource) -> SortKind {
        let kinds = self.sort_kinds_with_terms();
        debug_assert!(!kinds.is_empty());
        *rng.pick_from_set(&kinds)
    }

    /// Uniform pick of a sort with terms of the given kind.
    pub fn pick_sort(&self, rng: &mut RngSource, kind: SortKind) -> SortId {
        let sorts = self.sorts_with_terms_of_kind(kind);
        debug_assert!(!sorts.is_empty());
        *rng.pick_from_set(&sorts)
    }

    /// Uniform pick among all terms of the given sort, across all reachable
    /// levels.
    pub fn pick_term_of_sort(&self, rng: &mut RngSource, sort: SortId) -> TermId {
        let total: usize = self.levels.iter().map(|l| l.count_sort(sort)).sum();
        debug_assert!(total > 0);
        let mut idx = rng.pick_index(total);
        for level in &self.levels {
            for by_sort in level.terms.values() {
                if let Some(terms) = by_sort.get(&sort) {
                    if idx < terms.len() {
                        return *terms.get_index(idx).expect("index in range");
                    }
                    idx -= terms.len();
                }
            }
        }
        unreachable!("term pick out of range")
    }

    /// Uniform pick among terms of the given kind at exactly this depth.
    pub fn pick_term_at(&self, rng: &mut RngSource, kind: SortKind, depth: usize) -> TermId {
        let level = &self.levels[depth];
        let total = level.count(kind);
        debug_assert!(total > 0);
        let mut idx = rng.pick_index(total);
        for terms in &level.terms[&kind] {
            let terms = terms.1;
            if idx < terms.len() {
                return *terms.get_index(idx).expect("index in range");
            }
            idx -= terms.len();
        }
        unreachable!("term pick out of range")
    }

    /// Uniform pick among terms of the given kind across all levels.
    pub fn pick_term_of_kind(&self, rng: &mut RngSource, kind: SortKind) -> TermId {
        let total: usize = self.levels.iter().map(|l| l.count(kind)).sum();
        debug_assert!(total > 0);
        let mut idx = rng.pick_index(total);
        for level in &self.levels {
            if let Some(by_sort) = level.terms.get(&kind) {
                for terms in by_sort.values() {
                    if idx < terms.len() {
                        return *terms.get_index(idx).expect("index in range");
                    }
                    idx -= terms.len();
                }
            }
        }
        unreachable!("term pick out of range")
    }

    /// Uniform pick among all terms.
    pub fn pick_term(&self, rng: &mut RngSource) -> TermId {
        let kinds = self.sort_kinds_with_terms();
        let kind = *rng.pick_from_set(&kinds);
        self.pick_term_of_kind(rng, kind)
    }

    /// True if this exact term is registered at the given depth.
    #[must_use]
    pub fn contains(&self, term: TermId, kind: SortKind, sort: SortId, depth: usize) -> bool {
        self.levels.get(depth).is_some_and(|l| {
            l.terms
                .get(&kind)
                .and_then(|by_sort| by_sort.get(&sort))
                .is_some_and(|terms| terms.contains(&term))
        })
    }

    /// True if a bound variable is in scope.
    #[must_use]
    pub fn has_var(&self) -> bool {
        self.depth() > 0
    }

    /// The innermost bound variable.
    #[must_use]
    pub fn pick_var(&self) -> TermId {
        debug_assert!(self.has_var());
        self.levels
            .last()
            .and_then(|l| l.var)
            .expect("no variable in scope")
    }

    /// True if a Boolean term exists at the innermost scope (a candidate
    /// quantifier body).
    #[must_use]
    pub fn has_quant_body(&self) -> bool {
        self.has_var() && self.has_term_kind_at(SortKind::Bool, self.depth())
    }

    /// Uniform pick of a quantifier body candidate.
    pub fn pick_quant_body(&self, rng: &mut RngSource) -> TermId {
        debug_assert!(self.has_quant_body());
        self.pick_term_at(rng, SortKind::Bool, self.depth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(n: u64) -> TermId {
        TermId(n)
    }

    fn s(n: u64) -> SortId {
        SortId(n)
    }

    #[test]
    fn test_add_and_query() {
        let mut db = TermDb::new();
        assert!(!db.has_term());
        db.add(t(1), SortKind::Bool, s(1), 0);
        db.add(t(2), SortKind::Bv, s(2), 0);
        assert!(db.has_term());
        assert!(db.has_term_kind(SortKind::Bool));
        assert!(db.has_term_kind(SortKind::Bv));
        assert!(!db.has_term_kind(SortKind::Int));
        assert!(db.has_term_sort(s(2)));
        assert_eq!(db.n_terms(), 2);
    }

    #[test]
    fn test_scope_purge_on_pop() {
        let mut db = TermDb::new();
        db.add(t(1), SortKind::Bool, s(1), 0);
        db.push_scope(t(2));
        db.add(t(2), SortKind::Int, s(2), 1);
        db.add(t(3), SortKind::Bool, s(1), 1);
        assert!(db.has_term_kind(SortKind::Int));
        assert!(db.has_quant_body());
        assert_eq!(db.pop_scope(), Some(t(2)));
        assert!(!db.has_term_kind(SortKind::Int));
        assert!(db.has_term_kind(SortKind::Bool));
        assert_eq!(db.n_terms(), 1);
    }

    #[test]
    fn test_scope_ids_are_monotonic() {
        let mut db = TermDb::new();
        db.push_scope(t(1));
        let chain1 = db.scope_chain();
        db.pop_scope();
        db.push_scope(t(2));
        let chain2 = db.scope_chain();
        assert_ne!(chain1, chain2);
    }

    #[test]
    fn test_picks_are_deterministic() {
        let mut db = TermDb::new();
        for i in 0..20 {
            db.add(t(i + 1), SortKind::Bv, s(1 + i % 3), 0);
        }
        let mut a = RngSource::new(5);
        let mut b = RngSource::new(5);
        for _ in 0..50 {
            assert_eq!(
                db.pick_term_of_kind(&mut a, SortKind::Bv),
                db.pick_term_of_kind(&mut b, SortKind::Bv)
            );
        }
    }
}
