//! Action set
//!
//! An action is the atomic, replayable unit of generator work. Each action
//! has a stable kind string (its trace keyword), a precondition evaluated by
//! the FSM before edge sampling, a generate path that samples arguments from
//! the database, and an untrace path that consumes pre-resolved arguments
//! from a trace line. Both paths share one execute function, so replayed
//! runs produce the same back-end calls and the same trace lines.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::config;
use crate::error::{FuzzerError, Result};
use crate::op::{self, Op};
use crate::smgr::SolverManager;
use crate::solver::{SortRepr, TermRepr, Value, special_values_of};
use crate::sort::{SortId, SortKind};
use crate::term::TermId;
use crate::trace::{
    ParsedLine, Token, index_group, parse_sort_ref, parse_term_ref, quote, resolve_sort,
    resolve_term, term_group,
};

/// Sort kinds that have a direct value constructor.
const VALUE_SORT_KINDS: &[SortKind] = &[
    SortKind::Bool,
    SortKind::Bv,
    SortKind::Int,
    SortKind::Real,
    SortKind::String,
];

/// Sort kinds with special values.
const SPECIAL_VALUE_SORT_KINDS: &[SortKind] = &[
    SortKind::Bv,
    SortKind::Fp,
    SortKind::Rm,
    SortKind::Reglan,
];

/// The closed set of actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Create and initialize the back-end.
    NewSolver,
    /// Tear the back-end down.
    DeleteSolver,
    /// Set a back-end option.
    SetOption,
    /// Create a sort.
    MkSort,
    /// Declare a constant.
    MkConst,
    /// Create a bound variable (opens a quantifier scope).
    MkVar,
    /// Create a value term.
    MkValue,
    /// Create a special value term.
    MkSpecialValue,
    /// Create a compound term.
    MkTerm,
    /// Replay-only: registers the sort of a previously created term.
    TermGetSort,
    /// Assert a Boolean term.
    AssertFormula,
    /// Check satisfiability.
    CheckSat,
    /// Check satisfiability under assumptions.
    CheckSatAssuming,
    /// Push assertion levels.
    Push,
    /// Pop assertion levels.
    Pop,
    /// Query model values.
    GetValue,
    /// Query the unsat core.
    GetUnsatCore,
    /// Query the failed assumptions.
    GetUnsatAssumptions,
    /// Print the model.
    PrintModel,
    /// Full solver reset.
    Reset,
    /// Remove all assertions.
    ResetAssertions,
    /// Pure state transition; never traced.
    TransitionDefault,
}

/// Every traceable action, used by the replayer's keyword lookup.
const ALL_ACTIONS: &[ActionKind] = &[
    ActionKind::NewSolver,
    ActionKind::DeleteSolver,
    ActionKind::SetOption,
    ActionKind::MkSort,
    ActionKind::MkConst,
    ActionKind::MkVar,
    ActionKind::MkValue,
    ActionKind::MkSpecialValue,
    ActionKind::MkTerm,
    ActionKind::TermGetSort,
    ActionKind::AssertFormula,
    ActionKind::CheckSat,
    ActionKind::CheckSatAssuming,
    ActionKind::Push,
    ActionKind::Pop,
    ActionKind::GetValue,
    ActionKind::GetUnsatCore,
    ActionKind::GetUnsatAssumptions,
    ActionKind::PrintModel,
    ActionKind::Reset,
    ActionKind::ResetAssertions,
];

impl ActionKind {
    /// The stable kind string (trace keyword).
    #[must_use]
    pub fn kind_str(self) -> &'static str {
        match self {
            Self::NewSolver => "new-solver",
            Self::DeleteSolver => "delete-solver",
            Self::SetOption => "set-option",
            Self::MkSort => "mk-sort",
            Self::MkConst => "mk-const",
            Self::MkVar => "mk-var",
            Self::MkValue => "mk-value",
            Self::MkSpecialValue => "mk-special-value",
            Self::MkTerm => "mk-term",
            Self::TermGetSort => "term-get-sort",
            Self::AssertFormula => "assert",
            Self::CheckSat => "check-sat",
            Self::CheckSatAssuming => "check-sat-assuming",
            Self::Push => "push",
            Self::Pop => "pop",
            Self::GetValue => "get-value",
            Self::GetUnsatCore => "get-unsat-core",
            Self::GetUnsatAssumptions => "get-unsat-assumptions",
            Self::PrintModel => "print-model",
            Self::Reset => "reset",
            Self::ResetAssertions => "reset-assertions",
            Self::TransitionDefault => "t_default",
        }
    }

    /// Look an action up by its trace keyword.
    #[must_use]
    pub fn from_kind_str(kind: &str) -> Option<Self> {
        ALL_ACTIONS.iter().copied().find(|a| a.kind_str() == kind)
    }

    /// Precondition: contributes zero weight to FSM edge sampling when
    /// false. Option-gated queries (P6) are rejected here.
    #[must_use]
    pub fn enabled(self, smgr: &SolverManager) -> bool {
        let initialized = smgr.solver().is_initialized();
        match self {
            Self::NewSolver => !initialized,
            Self::TransitionDefault => true,
            Self::TermGetSort => false,
            _ if !initialized => false,
            Self::DeleteSolver | Self::Reset | Self::ResetAssertions | Self::SetOption => true,
            Self::MkSort => true,
            Self::MkConst => smgr.has_sort(),
            Self::MkVar => {
                smgr.enabled_theories().contains(&crate::theory::TheoryId::Quant)
                    && smgr.has_sort_excluding(smgr.unsupported_var_sorts())
            }
            Self::MkValue => VALUE_SORT_KINDS.iter().any(|k| smgr.has_sort_kind(*k)),
            Self::MkSpecialValue => SPECIAL_VALUE_SORT_KINDS
                .iter()
                .any(|k| smgr.has_sort_kind(*k)),
            Self::MkTerm => smgr.has_term(),
            Self::AssertFormula => smgr.has_term_kind_at(SortKind::Bool, 0),
            Self::CheckSat => !smgr.sat_called() || smgr.incremental(),
            Self::CheckSatAssuming => {
                smgr.incremental() && smgr.has_term_kind_at(SortKind::Bool, 0)
            }
            Self::Push => smgr.incremental() && smgr.n_push_levels() < config::MAX_N_PUSH_LEVELS,
            Self::Pop => smgr.incremental() && smgr.n_push_levels() > 0,
            Self::GetValue => {
                smgr.model_gen()
                    && smgr.sat_called()
                    && smgr.sat_result() == crate::solver::SatResult::Sat
                    && !get_value_candidate_kinds(smgr).is_empty()
            }
            Self::GetUnsatCore => {
                smgr.unsat_cores()
                    && smgr.sat_called()
                    && smgr.sat_result() == crate::solver::SatResult::Unsat
            }
            Self::GetUnsatAssumptions => {
                smgr.unsat_assumptions()
                    && smgr.sat_called()
                    && smgr.sat_assuming()
                    && smgr.sat_result() == crate::solver::SatResult::Unsat
            }
            Self::PrintModel => {
                smgr.model_gen()
                    && smgr.sat_called()
                    && smgr.sat_result() == crate::solver::SatResult::Sat
            }
        }
    }

    /// Generate-and-execute. Returns false when sampling found no applicable
    /// arguments; the database is untouched in that case.
    pub fn generate(self, smgr: &mut SolverManager) -> Result<bool> {
        debug!(action = self.kind_str(), "generate");
        match self {
            Self::NewSolver => exec_new_solver(smgr).map(|()| true),
            Self::DeleteSolver => exec_delete_solver(smgr).map(|()| true),
            Self::SetOption => generate_set_option(smgr),
            Self::MkSort => generate_mk_sort(smgr),
            Self::MkConst => generate_mk_const(smgr),
            Self::MkVar => generate_mk_var(smgr),
            Self::MkValue => generate_mk_value(smgr),
            Self::MkSpecialValue => generate_mk_special_value(smgr),
            Self::MkTerm => generate_mk_term(smgr),
            Self::TermGetSort => Ok(false),
            Self::AssertFormula => {
                let term = smgr.pick_term_outer(SortKind::Bool);
                exec_assert(smgr, term).map(|()| true)
            }
            Self::CheckSat => exec_check_sat(smgr).map(|()| true),
            Self::CheckSatAssuming => {
                let n = smgr
                    .rng_mut()
                    .pick_range(1, config::MAX_N_ASSUMPTIONS_CHECK_SAT as u64)
                    as usize;
                let assumptions: Vec<TermId> =
                    (0..n).map(|_| smgr.pick_assumption()).collect();
                exec_check_sat_assuming(smgr, &assumptions).map(|()| true)
            }
            Self::Push => {
                let max = config::MAX_N_PUSH_LEVELS - smgr.n_push_levels();
                let n = smgr.rng_mut().pick_range(1, u64::from(max)) as u32;
                exec_push(smgr, n).map(|()| true)
            }
            Self::Pop => {
                let max = u64::from(smgr.n_push_levels());
                let n = smgr.rng_mut().pick_range(1, max) as u32;
                exec_pop(smgr, n).map(|()| true)
            }
            Self::GetValue => generate_get_value(smgr),
            Self::GetUnsatCore => exec_get_unsat_core(smgr).map(|()| true),
            Self::GetUnsatAssumptions => exec_get_unsat_assumptions(smgr).map(|()| true),
            Self::PrintModel => exec_print_model(smgr).map(|()| true),
            Self::Reset => exec_reset(smgr).map(|()| true),
            Self::ResetAssertions => exec_reset_assertions(smgr).map(|()| true),
            Self::TransitionDefault => Ok(true),
        }
    }

    /// Replay this action from a parsed trace line. Identifiers have been
    /// tokenized; they are resolved through the untrace tables here, and ids
    /// created by the execution are registered against the recorded returns.
    pub fn untrace(self, smgr: &mut SolverManager, line: &ParsedLine, lineno: usize) -> Result<()> {
        match self {
            Self::NewSolver => exec_new_solver(smgr),
            Self::DeleteSolver => exec_delete_solver(smgr),
            Self::SetOption => {
                let name = expect_str(line, 0, lineno)?;
                let value = expect_str(line, 1, lineno)?;
                exec_set_option(smgr, name, value)
            }
            Self::MkSort => untrace_mk_sort(smgr, line, lineno),
            Self::MkConst => {
                let sort = resolve_sort(smgr, expect_atom(line, 0, lineno)?, lineno)?;
                let name = expect_str(line, 1, lineno)?.to_string();
                let term = exec_mk_const(smgr, sort, &name)?;
                register_term_returns(smgr, line, lineno, term)
            }
            Self::MkVar => {
                let sort = resolve_sort(smgr, expect_atom(line, 0, lineno)?, lineno)?;
                let name = expect_str(line, 1, lineno)?.to_string();
                let term = exec_mk_var(smgr, sort, &name)?;
                register_term_returns(smgr, line, lineno, term)
            }
            Self::MkValue => untrace_mk_value(smgr, line, lineno),
            Self::MkSpecialValue => {
                let sort = resolve_sort(smgr, expect_atom(line, 0, lineno)?, lineno)?;
                let value = expect_str(line, 1, lineno)?.to_string();
                let kind = smgr.sort_data(sort).kind;
                if !special_values_of(kind).iter().any(|v| *v == value) {
                    return Err(FuzzerError::untrace(
                        lineno,
                        format!("mk-special-value: no special value '{value}' for {kind}"),
                    ));
                }
                let term = exec_mk_special_value(smgr, sort, &value)?;
                register_term_returns(smgr, line, lineno, term)
            }
            Self::MkTerm => untrace_mk_term(smgr, line, lineno),
            Self::TermGetSort => {
                let term = resolve_term(smgr, expect_atom(line, 0, lineno)?, lineno)?;
                let sort = smgr.term_data(term).sort;
                if let Some(ret) = line.returns.first() {
                    let untraced = parse_sort_ref(ret, lineno)?;
                    smgr.register_untraced_sort(untraced, sort);
                }
                Ok(())
            }
            Self::AssertFormula => {
                let term = resolve_term(smgr, expect_atom(line, 0, lineno)?, lineno)?;
                let kind = smgr.sort_data(smgr.term_data(term).sort).kind;
                if kind != SortKind::Bool {
                    return Err(FuzzerError::untrace(
                        lineno,
                        format!("assert expects a Boolean term, got sort kind {kind}"),
                    ));
                }
                exec_assert(smgr, term)
            }
            Self::CheckSat => exec_check_sat(smgr),
            Self::CheckSatAssuming => {
                let group = expect_group(line, 0, lineno)?;
                let mut terms = Vec::with_capacity(group.len());
                for token in group {
                    terms.push(resolve_term(smgr, token, lineno)?);
                }
                exec_check_sat_assuming(smgr, &terms)
            }
            Self::Push => exec_push(smgr, expect_u32(line, 0, lineno)?),
            Self::Pop => exec_pop(smgr, expect_u32(line, 0, lineno)?),
            Self::GetValue => {
                let group = expect_group(line, 0, lineno)?;
                let mut terms = Vec::with_capacity(group.len());
                for token in group {
                    terms.push(resolve_term(smgr, token, lineno)?);
                }
                exec_get_value(smgr, &terms)
            }
            Self::GetUnsatCore => exec_get_unsat_core(smgr),
            Self::GetUnsatAssumptions => exec_get_unsat_assumptions(smgr),
            Self::PrintModel => exec_print_model(smgr),
            Self::Reset => exec_reset(smgr),
            Self::ResetAssertions => exec_reset_assertions(smgr),
            Self::TransitionDefault => Ok(()),
        }
    }
}

// -- token helpers ---------------------------------------------------------

fn expect_token<'a>(line: &'a ParsedLine, idx: usize, lineno: usize) -> Result<&'a Token> {
    line.args.get(idx).ok_or_else(|| {
        FuzzerError::untrace(lineno, format!("{}: missing argument {idx}", line.kind))
    })
}

fn expect_atom<'a>(line: &'a ParsedLine, idx: usize, lineno: usize) -> Result<&'a str> {
    expect_token(line, idx, lineno)?.as_atom().ok_or_else(|| {
        FuzzerError::untrace(lineno, format!("{}: expected atom argument {idx}", line.kind))
    })
}

fn expect_str<'a>(line: &'a ParsedLine, idx: usize, lineno: usize) -> Result<&'a str> {
    expect_token(line, idx, lineno)?.as_str_lit().ok_or_else(|| {
        FuzzerError::untrace(
            lineno,
            format!("{}: expected string argument {idx}", line.kind),
        )
    })
}

fn expect_group<'a>(line: &'a ParsedLine, idx: usize, lineno: usize) -> Result<&'a [String]> {
    expect_token(line, idx, lineno)?.as_group().ok_or_else(|| {
        FuzzerError::untrace(
            lineno,
            format!("{}: expected group argument {idx}", line.kind),
        )
    })
}

fn expect_u32(line: &ParsedLine, idx: usize, lineno: usize) -> Result<u32> {
    let atom = expect_atom(line, idx, lineno)?;
    atom.parse::<u32>().map_err(|_| {
        FuzzerError::untrace(lineno, format!("{}: invalid integer '{atom}'", line.kind))
    })
}

fn register_sort_returns(
    smgr: &mut SolverManager,
    line: &ParsedLine,
    lineno: usize,
    live: SortId,
) -> Result<()> {
    if let Some(ret) = line.returns.first() {
        let untraced = parse_sort_ref(ret, lineno)?;
        smgr.register_untraced_sort(untraced, live);
    }
    Ok(())
}

fn register_term_returns(
    smgr: &mut SolverManager,
    line: &ParsedLine,
    lineno: usize,
    live: TermId,
) -> Result<()> {
    if let Some(ret) = line.returns.first() {
        let untraced = parse_term_ref(ret, lineno)?;
        smgr.register_untraced_term(untraced, live);
    }
    Ok(())
}

// -- execute paths -----------------------------------------------------------

fn exec_new_solver(smgr: &mut SolverManager) -> Result<()> {
    smgr.trace_line("new-solver")?;
    smgr.solver_mut().new_solver()?;
    // Options requested on the command line are applied silently; the
    // recorded options line re-applies them on replay.
    let startup = smgr.startup_options().to_vec();
    for (name, value) in startup {
        smgr.solver_mut().set_opt(&name, &value)?;
    }
    smgr.update_option_latches();
    Ok(())
}

fn exec_delete_solver(smgr: &mut SolverManager) -> Result<()> {
    smgr.trace_line("delete-solver")?;
    smgr.solver_mut().delete_solver()
}

fn exec_set_option(smgr: &mut SolverManager, name: &str, value: &str) -> Result<()> {
    smgr.trace_line(&format!("set-option {} {}", quote(name), quote(value)))?;
    smgr.solver_mut().set_opt(name, value)?;
    smgr.update_option_latches();
    Ok(())
}

/// Parameters of a mk-sort call.
enum MkSortParams {
    None,
    Bv(u32),
    Fp(u32, u32),
    Sorts(Vec<SortId>),
    Symbol(String),
}

fn exec_mk_sort(
    smgr: &mut SolverManager,
    kind: SortKind,
    params: &MkSortParams,
) -> Result<SortId> {
    let rendered = match params {
        MkSortParams::None => String::new(),
        MkSortParams::Bv(bw) => format!(" {bw}"),
        MkSortParams::Fp(e, s) => format!(" {e} {s}"),
        MkSortParams::Sorts(ids) if kind == SortKind::Array => {
            format!(" {} {}", ids[0], ids[1])
        }
        MkSortParams::Sorts(ids) => {
            let parts: Vec<String> = ids.iter().map(SortId::to_string).collect();
            format!(" [{}]", parts.join(" "))
        }
        MkSortParams::Symbol(name) => format!(" {}", quote(name)),
    };
    smgr.trace_begin(&format!("mk-sort {}{rendered}", kind.as_str()))?;
    let repr = match params {
        MkSortParams::None => smgr.solver_mut().mk_sort(kind)?,
        MkSortParams::Bv(bw) => smgr.solver_mut().mk_sort_bv(*bw)?,
        MkSortParams::Fp(e, s) => smgr.solver_mut().mk_sort_fp(*e, *s)?,
        MkSortParams::Sorts(ids) => {
            let reprs: Vec<SortRepr> =
                ids.iter().map(|id| smgr.sort_repr(*id).clone()).collect();
            let refs: Vec<&SortRepr> = reprs.iter().collect();
            smgr.solver_mut().mk_sort_with_sorts(kind, &refs)?
        }
        MkSortParams::Symbol(name) => smgr.solver_mut().mk_sort_uninterpreted(name)?,
    };
    let id = smgr.add_sort(repr, kind)?;
    smgr.trace_end(&format!(" return {id}"))?;
    Ok(id)
}

fn generate_mk_sort(smgr: &mut SolverManager) -> Result<bool> {
    let kinds: Vec<SortKind> = smgr.sort_kinds().keys().copied().collect();
    let kind = *smgr.rng_mut().pick_from_slice(&kinds);
    let params = match kind {
        SortKind::Bool
        | SortKind::Int
        | SortKind::Real
        | SortKind::String
        | SortKind::Reglan
        | SortKind::Rm => MkSortParams::None,
        SortKind::Bv => MkSortParams::Bv(
            smgr.rng_mut()
                .pick_range(u64::from(config::BW_MIN), u64::from(config::BW_MAX))
                as u32,
        ),
        SortKind::Fp => {
            let (e, s) = *smgr.rng_mut().pick_from_slice(config::FP_FORMATS);
            MkSortParams::Fp(e, s)
        }
        SortKind::Array => {
            let exclude_index = smgr.unsupported_array_index_sorts().clone();
            let exclude_element = smgr.unsupported_array_element_sorts().clone();
            let Some(index) = smgr.pick_sort_excluding(&exclude_index, false) else {
                return Ok(false);
            };
            let Some(element) = smgr.pick_sort_excluding(&exclude_element, false) else {
                return Ok(false);
            };
            MkSortParams::Sorts(vec![index, element])
        }
        SortKind::Fun => {
            let exclude_domain = smgr.unsupported_fun_domain_sorts().clone();
            let exclude_codomain = smgr.unsupported_fun_codomain_sorts().clone();
            let arity = smgr
                .rng_mut()
                .pick_range(1, config::FUN_ARITY_MAX as u64) as usize;
            let mut sorts = Vec::with_capacity(arity + 1);
            for _ in 0..arity {
                let Some(sort) = smgr.pick_sort_excluding(&exclude_domain, false) else {
                    return Ok(false);
                };
                sorts.push(sort);
            }
            let Some(codomain) = smgr.pick_sort_excluding(&exclude_codomain, false) else {
                return Ok(false);
            };
            sorts.push(codomain);
            MkSortParams::Sorts(sorts)
        }
        SortKind::Uninterpreted => {
            let name = smgr.pick_symbol();
            MkSortParams::Symbol(name)
        }
        _ => return Ok(false),
    };
    exec_mk_sort(smgr, kind, &params)?;
    Ok(true)
}

fn untrace_mk_sort(smgr: &mut SolverManager, line: &ParsedLine, lineno: usize) -> Result<()> {
    let kind_str = expect_atom(line, 0, lineno)?;
    let kind = SortKind::from_str_kind(kind_str)
        .ok_or_else(|| FuzzerError::untrace(lineno, format!("unknown sort kind '{kind_str}'")))?;
    let params = match kind {
        SortKind::Bool
        | SortKind::Int
        | SortKind::Real
        | SortKind::String
        | SortKind::Reglan
        | SortKind::Rm => MkSortParams::None,
        SortKind::Bv => MkSortParams::Bv(expect_u32(line, 1, lineno)?),
        SortKind::Fp => {
            MkSortParams::Fp(expect_u32(line, 1, lineno)?, expect_u32(line, 2, lineno)?)
        }
        SortKind::Array => {
            let index = resolve_sort(smgr, expect_atom(line, 1, lineno)?, lineno)?;
            let element = resolve_sort(smgr, expect_atom(line, 2, lineno)?, lineno)?;
            MkSortParams::Sorts(vec![index, element])
        }
        SortKind::Fun => {
            let group = expect_group(line, 1, lineno)?;
            if group.len() < 2 {
                return Err(FuzzerError::untrace(lineno, "mk-sort FUN needs >= 2 sorts"));
            }
            let mut sorts = Vec::with_capacity(group.len());
            for token in group {
                sorts.push(resolve_sort(smgr, token, lineno)?);
            }
            MkSortParams::Sorts(sorts)
        }
        SortKind::Uninterpreted => {
            MkSortParams::Symbol(expect_str(line, 1, lineno)?.to_string())
        }
        _ => {
            return Err(FuzzerError::untrace(
                lineno,
                format!("mk-sort does not support kind {kind}"),
            ));
        }
    };
    let id = exec_mk_sort(smgr, kind, &params)?;
    register_sort_returns(smgr, line, lineno, id)
}

fn exec_mk_const(smgr: &mut SolverManager, sort: SortId, name: &str) -> Result<TermId> {
    smgr.trace_begin(&format!("mk-const {sort} {}", quote(name)))?;
    let sort_repr = smgr.sort_repr(sort).clone();
    let repr = smgr.solver_mut().mk_const(&sort_repr, name)?;
    let id = smgr.add_input(repr)?;
    smgr.trace_end(&format!(" return {id}"))?;
    Ok(id)
}

fn generate_mk_const(smgr: &mut SolverManager) -> Result<bool> {
    let sort = smgr.pick_sort(SortKind::Any, false);
    let name = smgr.pick_symbol();
    exec_mk_const(smgr, sort, &name)?;
    Ok(true)
}

fn exec_mk_var(smgr: &mut SolverManager, sort: SortId, name: &str) -> Result<TermId> {
    smgr.trace_begin(&format!("mk-var {sort} {}", quote(name)))?;
    let sort_repr = smgr.sort_repr(sort).clone();
    let repr = smgr.solver_mut().mk_var(&sort_repr, name)?;
    let id = smgr.add_var(repr)?;
    smgr.trace_end(&format!(" return {id}"))?;
    Ok(id)
}

fn generate_mk_var(smgr: &mut SolverManager) -> Result<bool> {
    let exclude = smgr.unsupported_var_sorts().clone();
    let Some(sort) = smgr.pick_sort_excluding(&exclude, false) else {
        return Ok(false);
    };
    let name = smgr.pick_symbol();
    exec_mk_var(smgr, sort, &name)?;
    Ok(true)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Bool(b) => format!(" {b}"),
        Value::Int(v) | Value::Real(v) => format!(" {v}"),
        Value::Rational { num, den } => format!(" {num}/{den}"),
        Value::Bv { value, base } => format!(" {} {base}", quote(value)),
        Value::Str(s) => format!(" {}", quote(s)),
    }
}

fn exec_mk_value(smgr: &mut SolverManager, sort: SortId, value: &Value) -> Result<TermId> {
    smgr.trace_begin(&format!("mk-value {sort}{}", render_value(value)))?;
    let sort_repr = smgr.sort_repr(sort).clone();
    let repr = smgr.solver_mut().mk_value(&sort_repr, value)?;
    let id = smgr.add_value(repr)?;
    if let Value::Str(s) = value {
        if s.chars().count() == 1 {
            smgr.add_string_char_value(id);
        }
    }
    smgr.trace_end(&format!(" return {id}"))?;
    Ok(id)
}

fn generate_mk_value(smgr: &mut SolverManager) -> Result<bool> {
    let kinds: Vec<SortKind> = VALUE_SORT_KINDS
        .iter()
        .copied()
        .filter(|k| smgr.has_sort_kind(*k))
        .collect();
    if kinds.is_empty() {
        return Ok(false);
    }
    let kind = *smgr.rng_mut().pick_from_slice(&kinds);
    let sort = smgr.pick_sort(kind, false);
    let value = match kind {
        SortKind::Bool => Value::Bool(smgr.rng_mut().flip_coin()),
        SortKind::Int => {
            let mut digits = smgr.rng_mut().pick_dec_string(config::INT_LEN_MAX);
            if smgr.rng_mut().flip_coin() && digits != "0" {
                digits.insert(0, '-');
            }
            Value::Int(digits)
        }
        SortKind::Real => {
            if smgr.rng_mut().flip_coin() {
                let int_part = smgr.rng_mut().pick_dec_string(config::REAL_LEN_MAX / 2);
                let frac_part = smgr.rng_mut().pick_dec_string(config::REAL_LEN_MAX / 2);
                let sign = if smgr.rng_mut().flip_coin() && int_part != "0" {
                    "-"
                } else {
                    ""
                };
                Value::Real(format!("{sign}{int_part}.{frac_part}"))
            } else {
                let num = smgr.rng_mut().pick_dec_string(config::RATIONAL_LEN_MAX);
                let mut den = smgr.rng_mut().pick_dec_string(config::RATIONAL_LEN_MAX);
                while den == "0" {
                    den = smgr.rng_mut().pick_dec_string(config::RATIONAL_LEN_MAX);
                }
                Value::Rational { num, den }
            }
        }
        SortKind::Bv => {
            let bw = smgr.sort_data(sort).bv_size();
            let bits = smgr.rng_mut().pick_bin_string(bw as usize);
            let mut base = *smgr.rng_mut().pick_from_slice(&[2u32, 10, 16]);
            // Hexadecimal literals fix the width at four bits per digit.
            if base == 16 && !bw.is_multiple_of(4) {
                base = 2;
            }
            let digits = match base {
                2 => bits,
                _ => {
                    let n = num_bigint::BigUint::parse_bytes(bits.as_bytes(), 2)
                        .unwrap_or_default();
                    if base == 10 {
                        n.to_str_radix(10)
                    } else {
                        let width = (bw / 4) as usize;
                        format!("{:0>width$}", n.to_str_radix(16))
                    }
                }
            };
            Value::Bv {
                value: digits,
                base,
            }
        }
        SortKind::String => Value::Str(smgr.rng_mut().pick_string_literal(config::STR_LEN_MAX)),
        _ => return Ok(false),
    };
    exec_mk_value(smgr, sort, &value)?;
    Ok(true)
}

fn untrace_mk_value(smgr: &mut SolverManager, line: &ParsedLine, lineno: usize) -> Result<()> {
    let sort = resolve_sort(smgr, expect_atom(line, 0, lineno)?, lineno)?;
    let kind = smgr.sort_data(sort).kind;
    let value = match kind {
        SortKind::Bool => match expect_atom(line, 1, lineno)? {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => {
                return Err(FuzzerError::untrace(
                    lineno,
                    format!("invalid Boolean literal '{other}'"),
                ));
            }
        },
        SortKind::Int => Value::Int(expect_atom(line, 1, lineno)?.to_string()),
        SortKind::Real => {
            let atom = expect_atom(line, 1, lineno)?;
            match atom.split_once('/') {
                Some((num, den)) => Value::Rational {
                    num: num.to_string(),
                    den: den.to_string(),
                },
                None => Value::Real(atom.to_string()),
            }
        }
        SortKind::Bv => Value::Bv {
            value: expect_str(line, 1, lineno)?.to_string(),
            base: expect_u32(line, 2, lineno)?,
        },
        SortKind::String => Value::Str(expect_str(line, 1, lineno)?.to_string()),
        _ => {
            return Err(FuzzerError::untrace(
                lineno,
                format!("mk-value does not support sort kind {kind}"),
            ));
        }
    };
    let term = exec_mk_value(smgr, sort, &value)?;
    register_term_returns(smgr, line, lineno, term)
}

fn exec_mk_special_value(
    smgr: &mut SolverManager,
    sort: SortId,
    value: &str,
) -> Result<TermId> {
    smgr.trace_begin(&format!("mk-special-value {sort} {}", quote(value)))?;
    let sort_repr = smgr.sort_repr(sort).clone();
    let repr = smgr.solver_mut().mk_special_value(&sort_repr, value)?;
    let id = smgr.add_value(repr)?;
    smgr.trace_end(&format!(" return {id}"))?;
    Ok(id)
}

fn generate_mk_special_value(smgr: &mut SolverManager) -> Result<bool> {
    let kinds: Vec<SortKind> = SPECIAL_VALUE_SORT_KINDS
        .iter()
        .copied()
        .filter(|k| smgr.has_sort_kind(*k) && !special_values_of(*k).is_empty())
        .collect();
    if kinds.is_empty() {
        return Ok(false);
    }
    let kind = *smgr.rng_mut().pick_from_slice(&kinds);
    let sort = smgr.pick_sort(kind, false);
    let value = *smgr.rng_mut().pick_from_slice(special_values_of(kind));
    exec_mk_special_value(smgr, sort, value)?;
    Ok(true)
}

fn exec_mk_term(
    smgr: &mut SolverManager,
    op_kind: &str,
    args: &[TermId],
    idxs: &[u32],
) -> Result<TermId> {
    let mut partial = format!("mk-term {op_kind} {}", term_group(args));
    if !idxs.is_empty() {
        partial.push(' ');
        partial.push_str(&index_group(idxs));
    }
    smgr.trace_begin(&partial)?;

    let arg_reprs: Vec<TermRepr> = args.iter().map(|t| smgr.term_repr(*t).clone()).collect();
    let refs: Vec<&TermRepr> = arg_reprs.iter().collect();
    let repr = smgr.solver_mut().mk_term(op_kind, &refs, idxs)?;

    let levels = if op_kind == op::OP_FORALL || op_kind == op::OP_EXISTS {
        // The variable's scope closes with the binder; the quantified term
        // belongs to the enclosing scope.
        let mut levels = smgr.merged_levels(args);
        let closed = smgr.term_data(args[0]).levels.last().copied();
        let var = smgr.close_scope();
        debug_assert_eq!(var, Some(args[0]));
        if levels.last().copied() == closed {
            levels.pop();
        }
        levels
    } else {
        smgr.merged_levels(args)
    };

    let id = smgr.add_term(repr, levels)?;
    smgr.trace_end(&format!(" return {id}"))?;
    for term in smgr.take_pending_get_sorts() {
        let sort = smgr.term_data(term).sort;
        smgr.trace_line(&format!("term-get-sort {term} return {sort}"))?;
    }
    Ok(id)
}

fn generate_mk_term(smgr: &mut SolverManager) -> Result<bool> {
    let kind = smgr.pick_op_kind(true);
    if kind == op::OP_UNDEFINED {
        return Ok(false);
    }
    let Some(op) = smgr.get_op(&kind).cloned() else {
        return Err(FuzzerError::internal(format!("operator {kind} vanished")));
    };
    match sample_op_args(smgr, &op) {
        Some((args, idxs)) => {
            exec_mk_term(smgr, &op.kind, &args, &idxs)?;
            smgr.stats_mut().add_op(&op.kind, true);
            Ok(true)
        }
        None => {
            smgr.stats_mut().add_op(&op.kind, false);
            Ok(false)
        }
    }
}

/// Number of arguments for an application of `op`.
fn pick_n_args(smgr: &mut SolverManager, op: &Op) -> usize {
    if op.is_nary() {
        smgr.rng_mut()
            .pick_range(op.min_arity() as u64, config::MK_TERM_N_ARGS_MAX as u64)
            as usize
    } else {
        op.min_arity()
    }
}

/// Sample arguments and indices for an operator whose applicability has been
/// established (I7). Returns `None` when a corner case still cannot be
/// satisfied; the caller treats that as a no-op.
fn sample_op_args(smgr: &mut SolverManager, op: &Op) -> Option<(Vec<TermId>, Vec<u32>)> {
    match op.kind.as_str() {
        op::OP_FORALL | op::OP_EXISTS => {
            let var = smgr.pick_var();
            let body = smgr.pick_quant_body();
            Some((vec![var, body], Vec::new()))
        }
        op::OP_ARRAY_SELECT => {
            let arrays = smgr.applicable_array_sorts(false);
            if arrays.is_empty() {
                return None;
            }
            let sort = *smgr.rng_mut().pick_from_set(&arrays);
            let index_sort = smgr.sort_data(sort).array_index_sort()?;
            let array = smgr.pick_term(sort);
            let index = smgr.pick_term(index_sort);
            Some((vec![array, index], Vec::new()))
        }
        op::OP_ARRAY_STORE => {
            let arrays = smgr.applicable_array_sorts(true);
            if arrays.is_empty() {
                return None;
            }
            let sort = *smgr.rng_mut().pick_from_set(&arrays);
            let index_sort = smgr.sort_data(sort).array_index_sort()?;
            let element_sort = smgr.sort_data(sort).array_element_sort()?;
            let array = smgr.pick_term(sort);
            let index = smgr.pick_term(index_sort);
            let element = smgr.pick_term(element_sort);
            Some((vec![array, index, element], Vec::new()))
        }
        op::OP_UF_APPLY => {
            let funs = smgr.applicable_fun_sorts();
            if funs.is_empty() {
                return None;
            }
            let sort = *smgr.rng_mut().pick_from_set(&funs);
            let domain: SmallVec<[SortId; 4]> =
                smgr.sort_data(sort).fun_domain_sorts().iter().copied().collect();
            let mut args = vec![smgr.pick_term(sort)];
            for d in domain {
                args.push(smgr.pick_term(d));
            }
            Some((args, Vec::new()))
        }
        op::OP_RE_RANGE => {
            let lo = smgr.pick_string_char_value();
            let hi = smgr.pick_string_char_value();
            Some((vec![lo, hi], Vec::new()))
        }
        op::OP_ITE => {
            let cond = smgr.pick_term_reachable(SortKind::Bool);
            let sort = smgr.pick_sort(SortKind::Any, true);
            let then_branch = smgr.pick_term(sort);
            let else_branch = smgr.pick_term(sort);
            Some((vec![cond, then_branch, else_branch], Vec::new()))
        }
        op::OP_EQUAL | op::OP_DISTINCT => {
            let n = pick_n_args(smgr, op);
            let sort = smgr.pick_sort(SortKind::Any, true);
            let args = (0..n).map(|_| smgr.pick_term(sort)).collect();
            Some((args, Vec::new()))
        }
        _ => {
            let n = pick_n_args(smgr, op);
            let mut sort_for_kind: FxHashMap<SortKind, SortId> = FxHashMap::default();
            let mut args = Vec::with_capacity(n);
            for i in 0..n {
                let declared = op.arg_sort_kind(i);
                // Arithmetic subtyping: an Int term is acceptable where a
                // Real term is required.
                let kind = if declared == SortKind::Real && smgr.arith_subtyping() {
                    let has_real = smgr.has_term_kind(SortKind::Real);
                    let has_int = smgr.has_term_kind(SortKind::Int);
                    if !has_real && has_int {
                        SortKind::Int
                    } else if has_real && has_int && smgr.rng_mut().flip_coin() {
                        SortKind::Int
                    } else {
                        SortKind::Real
                    }
                } else {
                    declared
                };
                if !smgr.has_term_kind(kind) {
                    return None;
                }
                let sort = match sort_for_kind.get(&kind) {
                    Some(sort) => *sort,
                    None => {
                        let sort = smgr.pick_sort(kind, true);
                        sort_for_kind.insert(kind, sort);
                        sort
                    }
                };
                args.push(smgr.pick_term(sort));
            }
            let idxs = sample_indices(smgr, op, &args)?;
            Some((args, idxs))
        }
    }
}

/// Draw compile-time indices from their semantic ranges.
fn sample_indices(smgr: &mut SolverManager, op: &Op, args: &[TermId]) -> Option<Vec<u32>> {
    if !op.is_indexed() {
        return Some(Vec::new());
    }
    let rng_range =
        |smgr: &mut SolverManager, lo: u32, hi: u32| -> u32 {
            smgr.rng_mut().pick_range(u64::from(lo), u64::from(hi)) as u32
        };
    let idxs = match op.kind.as_str() {
        op::OP_BV_EXTRACT => {
            let bw = smgr.sort_data(smgr.term_data(args[0]).sort).bv_size();
            let hi = rng_range(smgr, 0, bw - 1);
            let lo = rng_range(smgr, 0, hi);
            vec![hi, lo]
        }
        op::OP_BV_REPEAT => {
            let bw = smgr.sort_data(smgr.term_data(args[0]).sort).bv_size();
            vec![rng_range(smgr, 1, (config::BW_MAX / bw).max(1))]
        }
        op::OP_BV_ROTATE_LEFT | op::OP_BV_ROTATE_RIGHT => {
            let bw = smgr.sort_data(smgr.term_data(args[0]).sort).bv_size();
            vec![rng_range(smgr, 0, bw - 1)]
        }
        op::OP_BV_SIGN_EXTEND | op::OP_BV_ZERO_EXTEND => {
            let bw = smgr.sort_data(smgr.term_data(args[0]).sort).bv_size();
            vec![rng_range(smgr, 0, config::BW_MAX.saturating_sub(bw))]
        }
        op::OP_INT_DIVISIBLE => vec![rng_range(smgr, 1, 1 << 20)],
        op::OP_RE_POW => vec![rng_range(smgr, 0, 5)],
        op::OP_RE_LOOP => {
            let lo = rng_range(smgr, 0, 5);
            let hi = rng_range(smgr, lo, lo + 5);
            vec![lo, hi]
        }
        op::OP_FP_TO_FP_FROM_SBV
        | op::OP_FP_TO_FP_FROM_UBV
        | op::OP_FP_TO_FP_FROM_FP
        | op::OP_FP_TO_FP_FROM_REAL => {
            let (e, s) = *smgr.rng_mut().pick_from_slice(config::FP_FORMATS);
            vec![e, s]
        }
        op::OP_FP_TO_UBV | op::OP_FP_TO_SBV => {
            vec![rng_range(smgr, config::BW_MIN, config::BW_MAX)]
        }
        _ => return None,
    };
    Some(idxs)
}

fn untrace_mk_term(smgr: &mut SolverManager, line: &ParsedLine, lineno: usize) -> Result<()> {
    let kind = expect_atom(line, 0, lineno)?.to_string();
    let Some(op) = smgr.get_op(&kind).cloned() else {
        return Err(FuzzerError::untrace(
            lineno,
            format!("unknown operator kind '{kind}'"),
        ));
    };
    let group = expect_group(line, 1, lineno)?;
    let mut args = Vec::with_capacity(group.len());
    for token in group {
        args.push(resolve_term(smgr, token, lineno)?);
    }
    if args.len() < op.min_arity() || (!op.is_nary() && args.len() != op.min_arity()) {
        return Err(FuzzerError::untrace(
            lineno,
            format!(
                "{kind} expects {}{} arguments, got {}",
                if op.is_nary() { ">= " } else { "" },
                op.min_arity(),
                args.len()
            ),
        ));
    }
    let idxs = if op.is_indexed() {
        let group = expect_group(line, 2, lineno)?;
        if group.len() != op.nidxs as usize {
            return Err(FuzzerError::untrace(
                lineno,
                format!("{kind} expects {} indices, got {}", op.nidxs, group.len()),
            ));
        }
        let mut idxs = Vec::with_capacity(group.len());
        for token in group {
            idxs.push(token.parse::<u32>().map_err(|_| {
                FuzzerError::untrace(lineno, format!("invalid index '{token}'"))
            })?);
        }
        idxs
    } else {
        Vec::new()
    };
    let term = exec_mk_term(smgr, &kind, &args, &idxs)?;
    register_term_returns(smgr, line, lineno, term)
}

fn exec_assert(smgr: &mut SolverManager, term: TermId) -> Result<()> {
    smgr.trace_line(&format!("assert {term}"))?;
    smgr.reset_sat();
    let repr = smgr.term_repr(term).clone();
    smgr.solver_mut().assert_formula(&repr)
}

fn exec_check_sat(smgr: &mut SolverManager) -> Result<()> {
    smgr.trace_line("check-sat")?;
    let result = smgr.solver_mut().check_sat()?;
    smgr.set_sat_result(result, false);
    smgr.clear_assumptions();
    Ok(())
}

fn exec_check_sat_assuming(smgr: &mut SolverManager, assumptions: &[TermId]) -> Result<()> {
    smgr.trace_line(&format!("check-sat-assuming {}", term_group(assumptions)))?;
    let reprs: Vec<TermRepr> = assumptions
        .iter()
        .map(|t| smgr.term_repr(*t).clone())
        .collect();
    let refs: Vec<&TermRepr> = reprs.iter().collect();
    let result = smgr.solver_mut().check_sat_assuming(&refs)?;
    smgr.set_sat_result(result, true);
    smgr.clear_assumptions();
    Ok(())
}

fn exec_push(smgr: &mut SolverManager, n: u32) -> Result<()> {
    smgr.trace_line(&format!("push {n}"))?;
    smgr.reset_sat();
    smgr.solver_mut().push(n)?;
    smgr.add_push_levels(n);
    Ok(())
}

fn exec_pop(smgr: &mut SolverManager, n: u32) -> Result<()> {
    smgr.trace_line(&format!("pop {n}"))?;
    smgr.reset_sat();
    smgr.solver_mut().pop(n)?;
    smgr.remove_push_levels(n.min(smgr.n_push_levels()));
    Ok(())
}

fn get_value_candidate_kinds(smgr: &SolverManager) -> Vec<SortKind> {
    smgr.sort_kinds()
        .keys()
        .copied()
        .filter(|k| {
            !smgr.unsupported_get_value_sorts().contains(k) && smgr.has_term_kind_at(*k, 0)
        })
        .collect()
}

fn exec_get_value(smgr: &mut SolverManager, terms: &[TermId]) -> Result<()> {
    smgr.trace_line(&format!("get-value {}", term_group(terms)))?;
    let reprs: Vec<TermRepr> = terms.iter().map(|t| smgr.term_repr(*t).clone()).collect();
    let refs: Vec<&TermRepr> = reprs.iter().collect();
    // The returned model values are consumed but not registered: the
    // SMT-LIB2 back-end cannot reconstruct handles from textual models.
    smgr.solver_mut().get_value(&refs)?;
    Ok(())
}

fn generate_get_value(smgr: &mut SolverManager) -> Result<bool> {
    let kinds = get_value_candidate_kinds(smgr);
    if kinds.is_empty() {
        return Ok(false);
    }
    let n = smgr
        .rng_mut()
        .pick_range(1, config::MAX_N_TERMS_GET_VALUE as u64) as usize;
    let mut terms = Vec::with_capacity(n);
    for _ in 0..n {
        let kind = *smgr.rng_mut().pick_from_slice(&kinds);
        terms.push(smgr.pick_term_outer(kind));
    }
    exec_get_value(smgr, &terms)?;
    Ok(true)
}

fn exec_get_unsat_core(smgr: &mut SolverManager) -> Result<()> {
    smgr.trace_line("get-unsat-core")?;
    smgr.solver_mut().get_unsat_core()?;
    Ok(())
}

fn exec_get_unsat_assumptions(smgr: &mut SolverManager) -> Result<()> {
    smgr.trace_line("get-unsat-assumptions")?;
    smgr.solver_mut().get_unsat_assumptions()?;
    Ok(())
}

fn exec_print_model(smgr: &mut SolverManager) -> Result<()> {
    smgr.trace_line("print-model")?;
    smgr.solver_mut().print_model()
}

fn exec_reset(smgr: &mut SolverManager) -> Result<()> {
    smgr.trace_line("reset")?;
    smgr.solver_mut().reset()?;
    smgr.reset();
    smgr.update_option_latches();
    Ok(())
}

fn exec_reset_assertions(smgr: &mut SolverManager) -> Result<()> {
    smgr.trace_line("reset-assertions")?;
    smgr.solver_mut().reset_assertions()?;
    smgr.reset_assertions();
    Ok(())
}

fn generate_set_option(smgr: &mut SolverManager) -> Result<bool> {
    let Some((name, value)) = smgr.pick_option() else {
        return Ok(false);
    };
    exec_set_option(smgr, &name, &value)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_str_round_trip() {
        for action in ALL_ACTIONS {
            assert_eq!(ActionKind::from_kind_str(action.kind_str()), Some(*action));
        }
        // Pure transitions are not replayable.
        assert_eq!(ActionKind::from_kind_str("t_default"), None);
        assert_eq!(ActionKind::from_kind_str("bogus"), None);
    }
}
