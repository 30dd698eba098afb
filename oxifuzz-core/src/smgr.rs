//! Solver manager
//!
//! The stateful heart of the generator: owns the back-end, the RNG, the
//! trace writer and every sort and term created during a run, maintains the
//! sampling indices, assigns fresh ids, deduplicates structurally equal
//! sorts and terms, and provides the selection primitives every action is
//! built from.

use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::debug;

use crate::error::{FuzzerError, Result};
use crate::op::{self, Op, OpKindManager};
use crate::options::Options;
use crate::rng::RngSource;
use crate::solver::{SatResult, Solver, SortRepr, TermRepr};
use crate::sort::{SortData, SortId, SortKind};
use crate::statistics::Statistics;
use crate::term::{TermData, TermId};
use crate::term_db::TermDb;
use crate::theory::{ALL_THEORIES, TheoryId};
use crate::trace::Tracer;
use crate::{FxIndexMap, FxIndexSet};

/// Catalog entry for a sort kind enabled in this run.
#[derive(Debug, Clone, Copy)]
pub struct SortKindData {
    /// The sort kind.
    pub kind: SortKind,
    /// Number of child-sort parameters; negative means n-ary (functions).
    pub arity: i8,
    /// The theory contributing this kind.
    pub theory: TheoryId,
}

/// How a term enters the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermFlavor {
    Input,
    Value,
    Var,
    Term,
}

/// The symbolic object database and run state.
#[derive(Debug)]
pub struct SolverManager {
    solver: Solver,
    rng: RngSource,
    tracer: Tracer,
    stats: Statistics,

    arith_subtyping: bool,
    simple_symbols: bool,
    fuzz_options_filter: Vec<String>,
    startup_options: Vec<(String, String)>,

    enabled_theories: FxIndexSet<TheoryId>,
    sort_kinds: FxIndexMap<SortKind, SortKindData>,
    opmgr: OpKindManager,
    unsupported_var_sorts: FxHashSet<SortKind>,
    unsupported_array_index_sorts: FxHashSet<SortKind>,
    unsupported_array_element_sorts: FxHashSet<SortKind>,
    unsupported_fun_domain_sorts: FxHashSet<SortKind>,
    unsupported_fun_codomain_sorts: FxHashSet<SortKind>,
    unsupported_get_value_sorts: FxHashSet<SortKind>,

    sorts: Vec<SortData>,
    sort_dedup: FxHashMap<SortRepr, SortId>,
    sorts_by_kind: FxIndexMap<SortKind, FxIndexSet<SortId>>,
    terms: Vec<TermData>,
    term_dedup: FxHashMap<TermRepr, TermId>,
    term_db: TermDb,
    values_by_sort: FxIndexMap<SortId, FxIndexSet<TermId>>,
    string_chars: FxIndexSet<TermId>,
    assumptions: FxIndexSet<TermId>,
    untraced_sorts: FxHashMap<u64, SortId>,
    untraced_terms: FxHashMap<u64, TermId>,
    pending_get_sorts: Vec<TermId>,
    n_symbols: u64,

    incremental: bool,
    model_gen: bool,
    unsat_cores: bool,
    unsat_assumptions: bool,
    n_push_levels: u32,
    sat_called: bool,
    sat_result: SatResult,
    sat_assuming: bool,
    n_sat_calls: u64,
}

impl SolverManager {
    /// Build the database for a run. Computes the enabled theory set as the
    /// intersection of the user's selection and the back-end's supported
    /// theories (Booleans always included), and derives the sort-kind and
    /// operator catalogs from it.
    pub fn new(solver: Solver, rng: RngSource, tracer: Tracer, options: &Options) -> Result<Self> {
        let supported: FxHashSet<TheoryId> = solver.supported_theories().into_iter().collect();
        let requested: Vec<TheoryId> = if options.enabled_theories.is_empty() {
            ALL_THEORIES.to_vec()
        } else {
            let mut requested = options.enabled_theories.clone();
            requested.push(TheoryId::Bool);
            requested
        };
        let mut enabled_theories: FxIndexSet<TheoryId> = IndexSet::default();
        for theory in requested {
            if supported.contains(&theory) && !options.disabled_theories.contains(&theory) {
                enabled_theories.insert(theory);
            }
        }
        enabled_theories.insert(TheoryId::Bool);
        if enabled_theories.len() == 1 && !supported.contains(&TheoryId::Bool) {
            return Err(FuzzerError::config("no usable theory for this back-end"));
        }

        let mut sort_kinds: FxIndexMap<SortKind, SortKindData> = FxIndexMap::default();
        for theory in &enabled_theories {
            for kind in SortKind::kinds_of_theory(*theory) {
                let arity = match kind {
                    SortKind::Array => 2,
                    SortKind::Fun => -1,
                    _ => 0,
                };
                sort_kinds.insert(
                    *kind,
                    SortKindData {
                        kind: *kind,
                        arity,
                        theory: *theory,
                    },
                );
            }
        }

        let opmgr = OpKindManager::new(
            &enabled_theories,
            &solver.unsupported_op_kinds(),
            options.arith_linear,
        );
        debug!(
            theories = enabled_theories.len(),
            ops = opmgr.ops().len(),
            "solver manager configured"
        );

        Ok(Self {
            unsupported_var_sorts: solver.unsupported_var_sort_kinds(),
            unsupported_array_index_sorts: solver.unsupported_array_index_sort_kinds(),
            unsupported_array_element_sorts: solver.unsupported_array_element_sort_kinds(),
            unsupported_fun_domain_sorts: solver.unsupported_fun_domain_sort_kinds(),
            unsupported_fun_codomain_sorts: solver.unsupported_fun_codomain_sort_kinds(),
            unsupported_get_value_sorts: solver.unsupported_get_value_sort_kinds(),
            solver,
            rng,
            tracer,
            stats: Statistics::default(),
            arith_subtyping: true,
            simple_symbols: options.simple_symbols,
            fuzz_options_filter: options.fuzz_options_filter.clone(),
            startup_options: options.solver_options.clone(),
            enabled_theories,
            sort_kinds,
            opmgr,
            sorts: Vec::new(),
            sort_dedup: FxHashMap::default(),
            sorts_by_kind: FxIndexMap::default(),
            terms: Vec::new(),
            term_dedup: FxHashMap::default(),
            term_db: TermDb::new(),
            values_by_sort: FxIndexMap::default(),
            string_chars: IndexSet::default(),
            assumptions: IndexSet::default(),
            untraced_sorts: FxHashMap::default(),
            untraced_terms: FxHashMap::default(),
            pending_get_sorts: Vec::new(),
            n_symbols: 0,
            incremental: false,
            model_gen: false,
            unsat_cores: false,
            unsat_assumptions: false,
            n_push_levels: 0,
            sat_called: false,
            sat_result: SatResult::Unknown,
            sat_assuming: false,
            n_sat_calls: 0,
        })
    }

    /// The back-end.
    #[must_use]
    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    /// The back-end, mutably.
    pub fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }

    /// The random source.
    pub fn rng_mut(&mut self) -> &mut RngSource {
        &mut self.rng
    }

    /// Current RNG engine state (for `set-seed` lines).
    #[must_use]
    pub fn rng_state(&self) -> String {
        self.rng.state()
    }

    /// Run statistics.
    #[must_use]
    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Run statistics, mutably.
    pub fn stats_mut(&mut self) -> &mut Statistics {
        &mut self.stats
    }

    /// The enabled theories.
    #[must_use]
    pub fn enabled_theories(&self) -> &FxIndexSet<TheoryId> {
        &self.enabled_theories
    }

    /// The enabled sort-kind catalog.
    #[must_use]
    pub fn sort_kinds(&self) -> &FxIndexMap<SortKind, SortKindData> {
        &self.sort_kinds
    }

    /// Look up an operator in the catalog.
    #[must_use]
    pub fn get_op(&self, kind: &str) -> Option<&Op> {
        self.opmgr.get(kind)
    }

    /// The operator catalog manager.
    #[must_use]
    pub fn opmgr(&self) -> &OpKindManager {
        &self.opmgr
    }

    // -- tracing ----------------------------------------------------------

    /// Write a complete trace line.
    pub fn trace_line(&mut self, line: &str) -> Result<()> {
        self.tracer.line(line)
    }

    /// Begin an action trace line (kind + arguments).
    pub fn trace_begin(&mut self, partial: &str) -> Result<()> {
        self.tracer.begin_line(partial)
    }

    /// Finish an action trace line (return ids).
    pub fn trace_end(&mut self, rest: &str) -> Result<()> {
        self.tracer.end_line(rest)
    }

    /// True if `set-seed` lines are requested.
    #[must_use]
    pub fn trace_seeds_enabled(&self) -> bool {
        self.tracer.trace_seeds()
    }

    // -- object accessors -------------------------------------------------

    /// Sort data by id.
    #[must_use]
    pub fn sort_data(&self, id: SortId) -> &SortData {
        &self.sorts[(id.0 - 1) as usize]
    }

    /// Term data by id.
    #[must_use]
    pub fn term_data(&self, id: TermId) -> &TermData {
        &self.terms[(id.0 - 1) as usize]
    }

    /// Back-end handle of a sort.
    #[must_use]
    pub fn sort_repr(&self, id: SortId) -> &SortRepr {
        &self.sort_data(id).repr
    }

    /// Back-end handle of a term.
    #[must_use]
    pub fn term_repr(&self, id: TermId) -> &TermRepr {
        &self.term_data(id).repr
    }

    /// Number of sorts ever created.
    #[must_use]
    pub fn n_sorts(&self) -> u64 {
        self.sorts.len() as u64
    }

    /// Number of terms ever created.
    #[must_use]
    pub fn n_terms(&self) -> u64 {
        self.terms.len() as u64
    }

    /// Current quantifier nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.term_db.depth()
    }

    /// Scope ids of the open quantifier scopes, outermost first.
    #[must_use]
    pub fn scope_chain(&self) -> Vec<u64> {
        self.term_db.scope_chain()
    }

    /// True if a sort exists whose kind is not in the exclusion set.
    #[must_use]
    pub fn has_sort_excluding(&self, exclude: &FxHashSet<SortKind>) -> bool {
        self.sorts_by_kind
            .iter()
            .any(|(kind, sorts)| !exclude.contains(kind) && !sorts.is_empty())
    }

    // -- add objects ------------------------------------------------------

    /// Canonicalize a back-end sort handle: find the structurally equal sort
    /// or insert a fresh one. Returns the canonical id and whether the sort
    /// was previously unseen.
    pub fn intern_sort(&mut self, repr: &SortRepr) -> (SortId, bool) {
        if let Some(&id) = self.sort_dedup.get(repr) {
            return (id, false);
        }
        let mut child_ids: SmallVec<[SortId; 2]> = SmallVec::new();
        for child in repr.children() {
            child_ids.push(self.intern_sort(&child).0);
        }
        let id = SortId(self.sorts.len() as u64 + 1);
        let kind = repr.kind();
        self.sorts.push(SortData {
            id,
            kind,
            repr: repr.clone(),
            sorts: child_ids,
        });
        self.sort_dedup.insert(repr.clone(), id);
        // Insert iff absent; the set dedups re-registrations.
        self.sorts_by_kind.entry(kind).or_default().insert(id);
        self.stats.sorts += 1;
        (id, true)
    }

    /// Add a sort created by a mk-sort action. The requested kind must match
    /// the handle, modulo arithmetic subtyping (an Int handle is acceptable
    /// where Real was requested).
    pub fn add_sort(&mut self, repr: SortRepr, kind: SortKind) -> Result<SortId> {
        debug_assert!(kind != SortKind::Any);
        let actual = repr.kind();
        let compatible = actual == kind
            || (self.arith_subtyping && kind == SortKind::Real && actual == SortKind::Int);
        if !compatible {
            return Err(FuzzerError::internal(format!(
                "sort kind mismatch: requested {kind}, got {actual}"
            )));
        }
        Ok(self.intern_sort(&repr).0)
    }

    fn register_term(
        &mut self,
        repr: TermRepr,
        levels: Vec<u64>,
        flavor: TermFlavor,
    ) -> Result<TermId> {
        let sort_repr = self.solver.get_sort(&repr);
        let (sort_id, sort_unseen) = self.intern_sort(&sort_repr);
        let kind = self.sort_data(sort_id).kind;

        let id = if let Some(&id) = self.term_dedup.get(&repr) {
            // Structurally equal term exists; reuse its id. Value flavor may
            // upgrade the bucket (the same literal can be re-created).
            if flavor == TermFlavor::Value {
                self.terms[(id.0 - 1) as usize].is_value = true;
                self.values_by_sort.entry(sort_id).or_default().insert(id);
            }
            id
        } else {
            let id = TermId(self.terms.len() as u64 + 1);
            let (levels, depth) = if flavor == TermFlavor::Var {
                self.term_db.push_scope(id);
                (self.term_db.scope_chain(), self.term_db.depth())
            } else {
                let depth = levels.len();
                (levels, depth)
            };
            self.terms.push(TermData {
                id,
                sort: sort_id,
                is_value: flavor == TermFlavor::Value,
                is_var: flavor == TermFlavor::Var,
                levels,
                repr: repr.clone(),
            });
            self.term_dedup.insert(repr, id);
            self.term_db.add(id, kind, sort_id, depth);
            match flavor {
                TermFlavor::Input => self.stats.inputs += 1,
                TermFlavor::Value => {
                    self.stats.inputs += 1;
                    self.values_by_sort.entry(sort_id).or_default().insert(id);
                }
                TermFlavor::Var => self.stats.vars += 1,
                TermFlavor::Term => self.stats.terms += 1,
            }
            id
        };
        if sort_unseen {
            self.pending_get_sorts.push(id);
        }
        Ok(id)
    }

    /// Add a declared constant (level 0).
    pub fn add_input(&mut self, repr: TermRepr) -> Result<TermId> {
        self.register_term(repr, Vec::new(), TermFlavor::Input)
    }

    /// Add a value term (level 0).
    pub fn add_value(&mut self, repr: TermRepr) -> Result<TermId> {
        self.register_term(repr, Vec::new(), TermFlavor::Value)
    }

    /// Add a bound variable, opening a fresh quantifier scope owned by it.
    pub fn add_var(&mut self, repr: TermRepr) -> Result<TermId> {
        self.register_term(repr, Vec::new(), TermFlavor::Var)
    }

    /// Add a compound term with the given scope chain.
    pub fn add_term(&mut self, repr: TermRepr, levels: Vec<u64>) -> Result<TermId> {
        self.register_term(repr, levels, TermFlavor::Term)
    }

    /// Record a single-character string value for `re.range` sampling.
    pub fn add_string_char_value(&mut self, id: TermId) {
        self.string_chars.insert(id);
    }

    /// Close the innermost quantifier scope, dropping its variable and the
    /// terms registered at that depth from the sampling indices. The ids
    /// stay assigned so traces remain resolvable.
    pub fn close_scope(&mut self) -> Option<TermId> {
        self.term_db.pop_scope()
    }

    /// The scope chain enclosing a set of argument terms: the longest of
    /// their chains (each is a prefix of the active stack).
    #[must_use]
    pub fn merged_levels(&self, args: &[TermId]) -> Vec<u64> {
        args.iter()
            .map(|t| self.term_data(*t).levels.clone())
            .max_by_key(Vec::len)
            .unwrap_or_default()
    }

    // -- untrace tables ---------------------------------------------------

    /// Map a recorded sort id to a live one.
    pub fn register_untraced_sort(&mut self, untraced: u64, live: SortId) {
        self.untraced_sorts.entry(untraced).or_insert(live);
    }

    /// Map a recorded term id to a live one.
    pub fn register_untraced_term(&mut self, untraced: u64, live: TermId) {
        self.untraced_terms.entry(untraced).or_insert(live);
    }

    /// Look up a recorded sort id.
    #[must_use]
    pub fn untraced_sort(&self, untraced: u64) -> Option<SortId> {
        self.untraced_sorts.get(&untraced).copied()
    }

    /// Look up a recorded term id.
    #[must_use]
    pub fn untraced_term(&self, untraced: u64) -> Option<TermId> {
        self.untraced_terms.get(&untraced).copied()
    }

    /// Terms whose (previously unseen) sorts still need a `term-get-sort`
    /// trace line.
    pub fn take_pending_get_sorts(&mut self) -> Vec<TermId> {
        std::mem::take(&mut self.pending_get_sorts)
    }

    // -- symbols ----------------------------------------------------------

    /// Fresh symbol name for inputs and variables.
    pub fn pick_symbol(&mut self) -> String {
        if self.simple_symbols {
            let n = self.n_symbols;
            self.n_symbols += 1;
            return format!("_x{n}");
        }
        let len = self
            .rng
            .pick_range(1, crate::config::SYMBOL_LEN_MAX as u64) as usize;
        if self.rng.flip_coin() {
            self.rng.pick_piped_symbol(len)
        } else {
            self.rng.pick_simple_symbol(len)
        }
    }

    // -- sort selection ---------------------------------------------------

    /// True if any sort exists.
    #[must_use]
    pub fn has_sort(&self) -> bool {
        !self.sorts.is_empty()
    }

    /// True if a sort of this kind exists.
    #[must_use]
    pub fn has_sort_kind(&self, kind: SortKind) -> bool {
        if kind == SortKind::Any {
            return self.has_sort();
        }
        self.sorts_by_kind
            .get(&kind)
            .is_some_and(|s| !s.is_empty())
    }

    /// Pick a sort kind: any kind with a sort, or with a term when
    /// `with_terms` is set.
    pub fn pick_sort_kind(&mut self, with_terms: bool) -> SortKind {
        if with_terms {
            return self.term_db.pick_sort_kind(&mut self.rng);
        }
        let kinds: FxIndexSet<SortKind> = self
            .sorts_by_kind
            .iter()
            .filter(|(_, sorts)| !sorts.is_empty())
            .map(|(kind, _)| *kind)
            .collect();
        *self.rng.pick_from_set(&kinds)
    }

    /// Pick a sort of the given kind ([`SortKind::Any`] picks a kind first).
    pub fn pick_sort(&mut self, kind: SortKind, with_terms: bool) -> SortId {
        let kind = if kind == SortKind::Any {
            self.pick_sort_kind(with_terms)
        } else {
            kind
        };
        if with_terms {
            self.term_db.pick_sort(&mut self.rng, kind)
        } else {
            let sorts = &self.sorts_by_kind[&kind];
            *self.rng.pick_from_set(sorts)
        }
    }

    /// Pick a sort whose kind is not in the exclusion set.
    pub fn pick_sort_excluding(
        &mut self,
        exclude: &FxHashSet<SortKind>,
        with_terms: bool,
    ) -> Option<SortId> {
        let candidates: FxIndexSet<SortId> = if with_terms {
            self.term_db
                .sorts_with_terms()
                .into_iter()
                .filter(|s| !exclude.contains(&self.sort_data(*s).kind))
                .collect()
        } else {
            self.sorts
                .iter()
                .filter(|s| !exclude.contains(&s.kind))
                .map(|s| s.id)
                .collect()
        };
        if candidates.is_empty() {
            return None;
        }
        Some(*self.rng.pick_from_set(&candidates))
    }

    /// True if a bit-vector sort of exactly this width exists.
    #[must_use]
    pub fn has_sort_bv(&self, bw: u32, with_terms: bool) -> bool {
        self.bv_sorts(with_terms)
            .iter()
            .any(|s| self.sort_data(*s).bv_size() == bw)
    }

    /// True if a bit-vector sort of width at most `bw_max` exists.
    #[must_use]
    pub fn has_sort_bv_max(&self, bw_max: u32, with_terms: bool) -> bool {
        self.bv_sorts(with_terms)
            .iter()
            .any(|s| self.sort_data(*s).bv_size() <= bw_max)
    }

    fn bv_sorts(&self, with_terms: bool) -> FxIndexSet<SortId> {
        if with_terms {
            self.term_db.sorts_with_terms_of_kind(SortKind::Bv)
        } else {
            self.sorts_by_kind
                .get(&SortKind::Bv)
                .cloned()
                .unwrap_or_default()
        }
    }

    /// Pick a bit-vector sort of exactly this width.
    pub fn pick_sort_bv(&mut self, bw: u32, with_terms: bool) -> SortId {
        let candidates: FxIndexSet<SortId> = self
            .bv_sorts(with_terms)
            .into_iter()
            .filter(|s| self.sort_data(*s).bv_size() == bw)
            .collect();
        debug_assert!(!candidates.is_empty());
        *self.rng.pick_from_set(&candidates)
    }

    /// Pick a bit-vector sort of width at most `bw_max`.
    pub fn pick_sort_bv_max(&mut self, bw_max: u32, with_terms: bool) -> SortId {
        let candidates: FxIndexSet<SortId> = self
            .bv_sorts(with_terms)
            .into_iter()
            .filter(|s| self.sort_data(*s).bv_size() <= bw_max)
            .collect();
        debug_assert!(!candidates.is_empty());
        *self.rng.pick_from_set(&candidates)
    }

    // -- term selection ---------------------------------------------------

    /// True if any term exists.
    #[must_use]
    pub fn has_term(&self) -> bool {
        self.term_db.has_term()
    }

    /// True if a term of this kind exists at a reachable level.
    #[must_use]
    pub fn has_term_kind(&self, kind: SortKind) -> bool {
        self.term_db.has_term_kind(kind)
    }

    /// True if a term of this kind exists at exactly this depth.
    #[must_use]
    pub fn has_term_kind_at(&self, kind: SortKind, depth: usize) -> bool {
        self.term_db.has_term_kind_at(kind, depth)
    }

    /// True if a term of this sort exists.
    #[must_use]
    pub fn has_term_sort(&self, sort: SortId) -> bool {
        self.term_db.has_term_sort(sort)
    }

    /// Pick a term of the given sort, at any reachable level.
    pub fn pick_term(&mut self, sort: SortId) -> TermId {
        self.term_db.pick_term_of_sort(&mut self.rng, sort)
    }

    /// Pick a term of the given kind at exactly this depth.
    pub fn pick_term_at(&mut self, kind: SortKind, depth: usize) -> TermId {
        self.term_db.pick_term_at(&mut self.rng, kind, depth)
    }

    /// Pick a term of the given kind at the outermost level.
    pub fn pick_term_outer(&mut self, kind: SortKind) -> TermId {
        self.term_db.pick_term_at(&mut self.rng, kind, 0)
    }

    /// Pick a term of the given kind at any reachable level.
    pub fn pick_term_reachable(&mut self, kind: SortKind) -> TermId {
        self.term_db.pick_term_of_kind(&mut self.rng, kind)
    }

    /// Pick any term.
    pub fn pick_term_any(&mut self) -> TermId {
        self.term_db.pick_term(&mut self.rng)
    }

    /// True if a value of this sort exists.
    #[must_use]
    pub fn has_value(&self, sort: SortId) -> bool {
        self.values_by_sort.get(&sort).is_some_and(|v| !v.is_empty())
    }

    /// Pick a value of this sort.
    pub fn pick_value(&mut self, sort: SortId) -> TermId {
        let values = &self.values_by_sort[&sort];
        *self.rng.pick_from_set(values)
    }

    /// True if a single-character string value exists.
    #[must_use]
    pub fn has_string_char_value(&self) -> bool {
        !self.string_chars.is_empty()
    }

    /// Pick a single-character string value.
    pub fn pick_string_char_value(&mut self) -> TermId {
        *self.rng.pick_from_set(&self.string_chars)
    }

    /// True if a bound variable is in scope.
    #[must_use]
    pub fn has_var(&self) -> bool {
        self.term_db.has_var()
    }

    /// The innermost bound variable.
    #[must_use]
    pub fn pick_var(&self) -> TermId {
        self.term_db.pick_var()
    }

    /// True if a quantifier body candidate exists.
    #[must_use]
    pub fn has_quant_body(&self) -> bool {
        self.term_db.has_quant_body()
    }

    /// Pick a quantifier body candidate.
    pub fn pick_quant_body(&mut self) -> TermId {
        self.term_db.pick_quant_body(&mut self.rng)
    }

    /// Pick a Boolean level-0 term and stage it as an assumption.
    pub fn pick_assumption(&mut self) -> TermId {
        let term = self.pick_term_outer(SortKind::Bool);
        self.assumptions.insert(term);
        term
    }

    /// The staged assumption set.
    #[must_use]
    pub fn assumptions(&self) -> &FxIndexSet<TermId> {
        &self.assumptions
    }

    /// Drop all staged assumptions.
    pub fn clear_assumptions(&mut self) {
        self.assumptions.clear();
    }

    // -- operator selection -----------------------------------------------

    fn has_term_for_arg_kind(&self, kind: SortKind) -> bool {
        match kind {
            SortKind::Any => self.has_term(),
            SortKind::Real => {
                self.has_term_kind(SortKind::Real)
                    || (self.arith_subtyping && self.has_term_kind(SortKind::Int))
            }
            kind => self.has_term_kind(kind),
        }
    }

    /// Array sorts with terms for which select (and, for stores, store)
    /// arguments are currently available.
    #[must_use]
    pub fn applicable_array_sorts(&self, store: bool) -> FxIndexSet<SortId> {
        self.term_db
            .sorts_with_terms_of_kind(SortKind::Array)
            .into_iter()
            .filter(|s| {
                let data = self.sort_data(*s);
                let index = data.sorts[0];
                let element = data.sorts[1];
                self.has_term_sort(index) && (!store || self.has_term_sort(element))
            })
            .collect()
    }

    /// Function sorts with terms whose full domain is currently inhabited.
    #[must_use]
    pub fn applicable_fun_sorts(&self) -> FxIndexSet<SortId> {
        self.term_db
            .sorts_with_terms_of_kind(SortKind::Fun)
            .into_iter()
            .filter(|s| {
                self.sort_data(*s)
                    .fun_domain_sorts()
                    .iter()
                    .all(|d| self.has_term_sort(*d))
            })
            .collect()
    }

    fn op_applicable(&self, op: &Op) -> bool {
        match op.kind.as_str() {
            op::OP_FORALL | op::OP_EXISTS => self.has_var() && self.has_quant_body(),
            op::OP_ARRAY_SELECT => !self.applicable_array_sorts(false).is_empty(),
            op::OP_ARRAY_STORE => !self.applicable_array_sorts(true).is_empty(),
            op::OP_UF_APPLY => !self.applicable_fun_sorts().is_empty(),
            op::OP_RE_RANGE => self.has_string_char_value(),
            _ => op
                .arg_sort_kinds
                .iter()
                .all(|kind| self.has_term_for_arg_kind(*kind)),
        }
    }

    /// Pick an operator kind. With `with_terms`, only operators whose
    /// argument requirements are currently satisfiable are considered: first
    /// a theory is picked uniformly among those with applicable operators,
    /// then an operator within it (this avoids biasing against small
    /// theories). Returns [`op::OP_UNDEFINED`] if nothing is applicable; the
    /// caller's action must then be a no-op.
    pub fn pick_op_kind(&mut self, with_terms: bool) -> String {
        if !with_terms {
            let ops = self.opmgr.ops();
            let idx = self.rng.pick_index(ops.len());
            return ops.get_index(idx).map(|(k, _)| k.clone()).expect("op");
        }
        let mut by_theory: FxIndexMap<TheoryId, Vec<String>> = FxIndexMap::default();
        for (kind, op) in self.opmgr.ops() {
            if self.op_applicable(op) {
                by_theory.entry(op.theory).or_default().push(kind.clone());
            }
        }
        if by_theory.is_empty() {
            return op::OP_UNDEFINED.to_string();
        }
        let theory_idx = self.rng.pick_index(by_theory.len());
        let ops = &by_theory[theory_idx];
        ops[self.rng.pick_index(ops.len())].clone()
    }

    // -- options ----------------------------------------------------------

    /// Pick a back-end option and value, honoring the fuzz-opts wildcards.
    pub fn pick_option(&mut self) -> Option<(String, String)> {
        let catalog = self.solver.option_catalog();
        let filtered: Vec<_> = if self.fuzz_options_filter.is_empty() {
            catalog
        } else {
            catalog
                .into_iter()
                .filter(|opt| {
                    self.fuzz_options_filter.iter().any(|pattern| {
                        match pattern.strip_prefix('^') {
                            Some(prefix) => opt.name.starts_with(prefix),
                            None => opt.name.contains(pattern.as_str()),
                        }
                    })
                })
                .collect()
        };
        if filtered.is_empty() {
            return None;
        }
        let opt = &filtered[self.rng.pick_index(filtered.len())];
        let value = opt.values[self.rng.pick_index(opt.values.len())].clone();
        Some((opt.name.clone(), value))
    }

    /// Back-end options requested on the command line, applied right after
    /// solver creation.
    #[must_use]
    pub fn startup_options(&self) -> &[(String, String)] {
        &self.startup_options
    }

    /// Refresh the option latches from the back-end after a set-option call.
    pub fn update_option_latches(&mut self) {
        self.incremental = self.solver.option_incremental_enabled();
        self.model_gen = self.solver.option_model_gen_enabled();
        self.unsat_cores = self.solver.option_unsat_cores_enabled();
        self.unsat_assumptions = self.solver.option_unsat_assumptions_enabled();
    }

    /// True if incrementality is on.
    #[must_use]
    pub fn incremental(&self) -> bool {
        self.incremental
    }

    /// True if model production is on.
    #[must_use]
    pub fn model_gen(&self) -> bool {
        self.model_gen
    }

    /// True if unsat-core production is on.
    #[must_use]
    pub fn unsat_cores(&self) -> bool {
        self.unsat_cores
    }

    /// True if unsat-assumption production is on.
    #[must_use]
    pub fn unsat_assumptions(&self) -> bool {
        self.unsat_assumptions
    }

    /// Capability sets: sort kinds unusable for quantified variables.
    #[must_use]
    pub fn unsupported_var_sorts(&self) -> &FxHashSet<SortKind> {
        &self.unsupported_var_sorts
    }

    /// Sort kinds unusable as array index sorts.
    #[must_use]
    pub fn unsupported_array_index_sorts(&self) -> &FxHashSet<SortKind> {
        &self.unsupported_array_index_sorts
    }

    /// Sort kinds unusable as array element sorts.
    #[must_use]
    pub fn unsupported_array_element_sorts(&self) -> &FxHashSet<SortKind> {
        &self.unsupported_array_element_sorts
    }

    /// Sort kinds unusable as function domain sorts.
    #[must_use]
    pub fn unsupported_fun_domain_sorts(&self) -> &FxHashSet<SortKind> {
        &self.unsupported_fun_domain_sorts
    }

    /// Sort kinds unusable as function codomain sorts.
    #[must_use]
    pub fn unsupported_fun_codomain_sorts(&self) -> &FxHashSet<SortKind> {
        &self.unsupported_fun_codomain_sorts
    }

    /// Sort kinds unusable in get-value queries.
    #[must_use]
    pub fn unsupported_get_value_sorts(&self) -> &FxHashSet<SortKind> {
        &self.unsupported_get_value_sorts
    }

    /// True if arithmetic subtyping (Int ≤ Real) is active.
    #[must_use]
    pub fn arith_subtyping(&self) -> bool {
        self.arith_subtyping
    }

    // -- sat state --------------------------------------------------------

    /// Latch a check-sat result.
    pub fn set_sat_result(&mut self, result: SatResult, assuming: bool) {
        self.sat_result = result;
        self.sat_called = true;
        self.sat_assuming = assuming;
        self.n_sat_calls += 1;
        self.stats.add_result(result);
    }

    /// The latched check-sat result.
    #[must_use]
    pub fn sat_result(&self) -> SatResult {
        self.sat_result
    }

    /// True if check-sat was called since the last state change.
    #[must_use]
    pub fn sat_called(&self) -> bool {
        self.sat_called
    }

    /// True if the latched check used assumptions.
    #[must_use]
    pub fn sat_assuming(&self) -> bool {
        self.sat_assuming
    }

    /// Open push levels.
    #[must_use]
    pub fn n_push_levels(&self) -> u32 {
        self.n_push_levels
    }

    /// Record pushed levels.
    pub fn add_push_levels(&mut self, n: u32) {
        self.n_push_levels += n;
    }

    /// Record popped levels.
    pub fn remove_push_levels(&mut self, n: u32) {
        debug_assert!(n <= self.n_push_levels);
        self.n_push_levels -= n;
    }

    // -- resets -----------------------------------------------------------

    /// Leave sat mode: drop staged assumptions and the check-sat latch.
    pub fn reset_sat(&mut self) {
        if self.sat_called {
            self.clear_assumptions();
        }
        self.sat_called = false;
        self.sat_assuming = false;
    }

    /// Reset after a reset-assertions call: sat mode plus the push counter.
    pub fn reset_assertions(&mut self) {
        self.reset_sat();
        self.n_push_levels = 0;
    }

    /// Full reset: every index except the static catalogs.
    pub fn reset(&mut self) {
        self.sorts.clear();
        self.sort_dedup.clear();
        self.sorts_by_kind.clear();
        self.terms.clear();
        self.term_dedup.clear();
        self.term_db.clear();
        self.values_by_sort.clear();
        self.string_chars.clear();
        self.assumptions.clear();
        self.untraced_sorts.clear();
        self.untraced_terms.clear();
        self.pending_get_sorts.clear();
        self.n_symbols = 0;
        self.incremental = false;
        self.model_gen = false;
        self.unsat_cores = false;
        self.unsat_assumptions = false;
        self.n_push_levels = 0;
        self.sat_called = false;
        self.sat_result = SatResult::Unknown;
        self.sat_assuming = false;
        self.n_sat_calls = 0;
    }

    // -- invariants -------------------------------------------------------

    /// Walk the database invariants; used by the property tests after every
    /// action.
    pub fn check_invariants(&self) -> Result<()> {
        let fail = |msg: String| Err(FuzzerError::internal(msg));

        for (i, sort) in self.sorts.iter().enumerate() {
            if sort.id.0 != i as u64 + 1 {
                return fail(format!("sort id {} out of sequence", sort.id));
            }
        }
        for (i, term) in self.terms.iter().enumerate() {
            if term.id.0 != i as u64 + 1 {
                return fail(format!("term id {} out of sequence", term.id));
            }
        }
        for term in &self.terms {
            let sort = self.sort_data(term.sort);
            let indexed = self
                .sorts_by_kind
                .get(&sort.kind)
                .is_some_and(|s| s.contains(&term.sort));
            if !indexed {
                return fail(format!(
                    "sort {} of term {} missing from kind index",
                    term.sort, term.id
                ));
            }
        }
        for (sort, values) in &self.values_by_sort {
            for value in values {
                let term = self.term_data(*value);
                if !term.is_value {
                    return fail(format!("term {} in value bucket but not a value", value));
                }
                if term.sort != *sort {
                    return fail(format!("value {} bucketed under wrong sort", value));
                }
            }
        }
        // Every indexed (selectable) term must have a scope chain that is a
        // prefix of the active stack; terms of popped scopes keep their
        // stale chain but must be gone from the index.
        let chain = self.term_db.scope_chain();
        for term in &self.terms {
            let depth = term.levels.len();
            let kind = self.sort_data(term.sort).kind;
            let indexed = self.term_db.contains(term.id, kind, term.sort, depth);
            let reachable =
                depth <= chain.len() && term.levels[..] == chain[..depth];
            if indexed && !reachable {
                return fail(format!("term {} has a stale scope chain", term.id));
            }
        }
        for assumption in &self.assumptions {
            let term = self.term_data(*assumption);
            if !term.levels.is_empty() {
                return fail(format!("assumption {} not at level 0", assumption));
            }
            if self.sort_data(term.sort).kind != SortKind::Bool {
                return fail(format!("assumption {} not Boolean", assumption));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::Smt2Solver;

    fn smgr() -> SolverManager {
        let options = Options::default();
        let solver = Solver::Smt2(Smt2Solver::new(None, None));
        SolverManager::new(solver, RngSource::new(7), Tracer::disabled(), &options).unwrap()
    }

    fn mk_bv_sort(smgr: &mut SolverManager, bw: u32) -> SortId {
        let repr = smgr.solver_mut().mk_sort_bv(bw).unwrap();
        smgr.add_sort(repr, SortKind::Bv).unwrap()
    }

    #[test]
    fn test_sort_interning_deduplicates() {
        let mut smgr = smgr();
        let a = mk_bv_sort(&mut smgr, 8);
        let b = mk_bv_sort(&mut smgr, 8);
        let c = mk_bv_sort(&mut smgr, 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(smgr.n_sorts(), 2);
        assert_eq!(a, SortId(1));
        assert_eq!(c, SortId(2));
    }

    #[test]
    fn test_bv_sort_selection_by_width() {
        let mut smgr = smgr();
        let s8 = mk_bv_sort(&mut smgr, 8);
        let s32 = mk_bv_sort(&mut smgr, 32);
        assert!(smgr.has_sort_bv(8, false));
        assert!(!smgr.has_sort_bv(9, false));
        assert!(smgr.has_sort_bv_max(16, false));
        assert_eq!(smgr.pick_sort_bv(8, false), s8);
        assert_eq!(smgr.pick_sort_bv(32, false), s32);
        for _ in 0..20 {
            assert_eq!(smgr.pick_sort_bv_max(16, false), s8);
        }
        // No terms exist yet, so the with-terms view is empty.
        assert!(!smgr.has_sort_bv(8, true));
    }

    #[test]
    fn test_term_registration_and_value_bucket() {
        let mut smgr = smgr();
        let sort = mk_bv_sort(&mut smgr, 4);
        let sort_repr = smgr.sort_repr(sort).clone();
        let value = smgr
            .solver_mut()
            .mk_value(
                &sort_repr,
                &crate::solver::Value::Bv {
                    value: "0101".to_string(),
                    base: 2,
                },
            )
            .unwrap();
        let t = smgr.add_value(value).unwrap();
        assert_eq!(t, TermId(1));
        assert!(smgr.term_data(t).is_value);
        assert!(smgr.has_value(sort));
        assert_eq!(smgr.pick_value(sort), t);
        assert!(smgr.has_term_kind(SortKind::Bv));
        assert!(smgr.has_sort_bv(4, true));
        smgr.check_invariants().unwrap();
    }

    #[test]
    fn test_pick_op_kind_respects_available_terms() {
        let mut smgr = smgr();
        // Nothing exists: no operator is applicable.
        assert_eq!(smgr.pick_op_kind(true), op::OP_UNDEFINED);

        let sort = mk_bv_sort(&mut smgr, 8);
        let sort_repr = smgr.sort_repr(sort).clone();
        let term = smgr.solver_mut().mk_const(&sort_repr, "x").unwrap();
        smgr.add_input(term).unwrap();

        // Only bit-vector (and polymorphic Boolean) operators apply now.
        for _ in 0..50 {
            let kind = smgr.pick_op_kind(true);
            let op = smgr.get_op(&kind).unwrap();
            assert!(
                matches!(op.theory, TheoryId::Bv | TheoryId::Bool),
                "unexpected op {kind}"
            );
        }
    }

    #[test]
    fn test_assumption_staging() {
        let mut smgr = smgr();
        let repr = smgr.solver_mut().mk_sort(SortKind::Bool).unwrap();
        let sort = smgr.add_sort(repr, SortKind::Bool).unwrap();
        let sort_repr = smgr.sort_repr(sort).clone();
        let term = smgr.solver_mut().mk_const(&sort_repr, "p").unwrap();
        smgr.add_input(term).unwrap();

        let picked = smgr.pick_assumption();
        assert!(smgr.assumptions().contains(&picked));
        smgr.check_invariants().unwrap();
        smgr.clear_assumptions();
        assert!(smgr.assumptions().is_empty());
    }

    #[test]
    fn test_symbols_are_sequential_by_default() {
        let mut smgr = smgr();
        assert_eq!(smgr.pick_symbol(), "_x0");
        assert_eq!(smgr.pick_symbol(), "_x1");
    }
}
