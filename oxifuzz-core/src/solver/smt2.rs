//! SMT-LIB2 process back-end
//!
//! Renders every API call as SMT-LIB2 text. Offline (no binary) the text is
//! only dumped and `check-sat` answers unknown; online the text is piped to
//! an external solver binary whose answers are parsed back. Handles are pure
//! data: a sort is its rendered SMT-LIB2 form plus parameters, a term is its
//! rendered form plus its sort, which is also what makes adapter-side sort
//! inference possible.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use rustc_hash::FxHashSet;
use tracing::debug;

use super::{SatResult, SolverOption, Value};
use crate::error::{FuzzerError, Result};
use crate::op;
use crate::sort::SortKind;
use crate::theory::TheoryId;

/// Sort handle of the SMT-LIB2 back-end.
#[derive(Debug, Clone)]
pub struct Smt2Sort {
    kind: SortKind,
    repr: String,
    bv_size: u32,
    fp_exp: u32,
    fp_sig: u32,
    sorts: Vec<Smt2Sort>,
}

impl PartialEq for Smt2Sort {
    fn eq(&self, other: &Self) -> bool {
        self.repr == other.repr
    }
}

impl Eq for Smt2Sort {}

impl std::hash::Hash for Smt2Sort {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.repr.hash(state);
    }
}

impl Smt2Sort {
    fn simple(kind: SortKind, repr: &str) -> Self {
        Self {
            kind,
            repr: repr.to_string(),
            bv_size: 0,
            fp_exp: 0,
            fp_sig: 0,
            sorts: Vec::new(),
        }
    }

    /// The Boolean sort.
    #[must_use]
    pub fn bool_sort() -> Self {
        Self::simple(SortKind::Bool, "Bool")
    }

    /// The integer sort.
    #[must_use]
    pub fn int_sort() -> Self {
        Self::simple(SortKind::Int, "Int")
    }

    /// The real sort.
    #[must_use]
    pub fn real_sort() -> Self {
        Self::simple(SortKind::Real, "Real")
    }

    /// The string sort.
    #[must_use]
    pub fn string_sort() -> Self {
        Self::simple(SortKind::String, "String")
    }

    /// The regular-language sort.
    #[must_use]
    pub fn reglan_sort() -> Self {
        Self::simple(SortKind::Reglan, "RegLan")
    }

    /// The rounding-mode sort.
    #[must_use]
    pub fn rm_sort() -> Self {
        Self::simple(SortKind::Rm, "RoundingMode")
    }

    /// A bit-vector sort of the given width.
    #[must_use]
    pub fn bv_sort(bw: u32) -> Self {
        Self {
            kind: SortKind::Bv,
            repr: format!("(_ BitVec {bw})"),
            bv_size: bw,
            fp_exp: 0,
            fp_sig: 0,
            sorts: Vec::new(),
        }
    }

    /// A floating-point sort of the given format.
    #[must_use]
    pub fn fp_sort(exp: u32, sig: u32) -> Self {
        Self {
            kind: SortKind::Fp,
            repr: format!("(_ FloatingPoint {exp} {sig})"),
            bv_size: 0,
            fp_exp: exp,
            fp_sig: sig,
            sorts: Vec::new(),
        }
    }

    /// An array sort over the given index and element sorts.
    #[must_use]
    pub fn array_sort(index: Smt2Sort, element: Smt2Sort) -> Self {
        let repr = format!("(Array {} {})", index.repr, element.repr);
        Self {
            kind: SortKind::Array,
            repr,
            bv_size: 0,
            fp_exp: 0,
            fp_sig: 0,
            sorts: vec![index, element],
        }
    }

    /// A function sort; domain sorts followed by the codomain. The rendered
    /// form is synthetic (SMT-LIB2 has no first-class function sorts); it is
    /// expanded into a declare-fun by the constant constructor.
    #[must_use]
    pub fn fun_sort(sorts: Vec<Smt2Sort>) -> Self {
        debug_assert!(sorts.len() >= 2);
        let parts: Vec<&str> = sorts.iter().map(|s| s.repr.as_str()).collect();
        let repr = format!("(-> {})", parts.join(" "));
        Self {
            kind: SortKind::Fun,
            repr,
            bv_size: 0,
            fp_exp: 0,
            fp_sig: 0,
            sorts,
        }
    }

    /// An uninterpreted sort with the given declared name.
    #[must_use]
    pub fn uninterpreted_sort(name: &str) -> Self {
        Self::simple(SortKind::Uninterpreted, name)
    }

    /// The sort kind.
    #[must_use]
    pub fn kind(&self) -> SortKind {
        self.kind
    }

    /// Rendered SMT-LIB2 form.
    #[must_use]
    pub fn smt2(&self) -> &str {
        &self.repr
    }

    /// Bit-vector width; 0 for non-bit-vector sorts.
    #[must_use]
    pub fn bv_size(&self) -> u32 {
        self.bv_size
    }

    /// Floating-point exponent width; 0 for non-FP sorts.
    #[must_use]
    pub fn fp_exp_size(&self) -> u32 {
        self.fp_exp
    }

    /// Floating-point significand width; 0 for non-FP sorts.
    #[must_use]
    pub fn fp_sig_size(&self) -> u32 {
        self.fp_sig
    }

    /// Child sorts.
    #[must_use]
    pub fn children(&self) -> &[Smt2Sort] {
        &self.sorts
    }
}

/// Term handle of the SMT-LIB2 back-end: the rendered expression plus its
/// sort.
#[derive(Debug, Clone)]
pub struct Smt2Term {
    repr: String,
    sort: Smt2Sort,
}

impl PartialEq for Smt2Term {
    fn eq(&self, other: &Self) -> bool {
        self.repr == other.repr && self.sort == other.sort
    }
}

impl Eq for Smt2Term {}

impl std::hash::Hash for Smt2Term {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.repr.hash(state);
        self.sort.repr.hash(state);
    }
}

impl Smt2Term {
    fn new(repr: String, sort: Smt2Sort) -> Self {
        Self { repr, sort }
    }

    /// Rendered SMT-LIB2 form.
    #[must_use]
    pub fn smt2(&self) -> &str {
        &self.repr
    }

    /// The sort of this term.
    #[must_use]
    pub fn sort(&self) -> &Smt2Sort {
        &self.sort
    }
}

#[derive(Debug)]
struct OnlineChild {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

#[derive(Debug, Default)]
struct OptionState {
    incremental: bool,
    model_gen: bool,
    unsat_cores: bool,
    unsat_assumptions: bool,
}

/// The SMT-LIB2 process back-end.
#[derive(Debug)]
pub struct Smt2Solver {
    binary: Option<String>,
    dump_path: Option<PathBuf>,
    online: Option<OnlineChild>,
    dump: Option<BufWriter<File>>,
    initialized: bool,
    logic_emitted: bool,
    opts: OptionState,
}

impl Smt2Solver {
    /// Create a back-end. With a binary the SMT-LIB2 stream is piped to that
    /// process; without one the back-end only renders ("SMT2 echo" mode).
    /// A dump path tees the stream into a file in both modes.
    #[must_use]
    pub fn new(binary: Option<String>, dump_path: Option<PathBuf>) -> Self {
        Self {
            binary,
            dump_path,
            online: None,
            dump: None,
            initialized: false,
            logic_emitted: false,
            opts: OptionState::default(),
        }
    }

    fn emit(&mut self, cmd: &str) -> Result<()> {
        debug!(target: "smt2", "{cmd}");
        if let Some(dump) = &mut self.dump {
            writeln!(dump, "{cmd}")?;
        }
        if let Some(online) = &mut self.online {
            let stdin = online
                .stdin
                .as_mut()
                .ok_or_else(|| FuzzerError::solver("solver stdin already closed"))?;
            writeln!(stdin, "{cmd}")
                .and_then(|()| stdin.flush())
                .map_err(|e| FuzzerError::solver(format!("solver pipe broken: {e}")))?;
        }
        Ok(())
    }

    /// Emit a command that requires the logic to be fixed first.
    fn emit_cmd(&mut self, cmd: &str) -> Result<()> {
        if !self.logic_emitted {
            self.logic_emitted = true;
            self.emit("(set-logic ALL)")?;
        }
        self.emit(cmd)
    }

    fn read_answer_line(&mut self) -> Result<Option<String>> {
        let Some(online) = &mut self.online else {
            return Ok(None);
        };
        loop {
            let mut line = String::new();
            let n = online
                .stdout
                .read_line(&mut line)
                .map_err(|e| FuzzerError::solver(format!("solver pipe broken: {e}")))?;
            if n == 0 {
                return Err(FuzzerError::solver("solver terminated unexpectedly"));
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with("(error") {
                return Err(FuzzerError::solver(line.to_string()));
            }
            return Ok(Some(line.to_string()));
        }
    }

    /// Read one (possibly multi-line) s-expression answer. Returns the raw
    /// text (empty in rendering-only mode).
    fn read_answer_sexpr(&mut self) -> Result<String> {
        let Some(first) = self.read_answer_line()? else {
            return Ok(String::new());
        };
        let mut balance = paren_balance(&first);
        let mut text = first;
        while balance > 0 {
            let Some(line) = self.read_answer_line()? else {
                break;
            };
            balance += paren_balance(&line);
            text.push(' ');
            text.push_str(&line);
        }
        Ok(text)
    }

    pub(super) fn new_solver(&mut self) -> Result<()> {
        debug_assert!(!self.initialized);
        if let Some(path) = &self.dump_path {
            self.dump = Some(BufWriter::new(File::create(path)?));
        }
        if let Some(binary) = &self.binary {
            let mut parts = binary.split_whitespace();
            let program = parts
                .next()
                .ok_or_else(|| FuzzerError::config("empty solver binary"))?;
            let mut child = Command::new(program)
                .args(parts)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(|e| FuzzerError::config(format!("cannot spawn '{binary}': {e}")))?;
            let stdin = child.stdin.take();
            let stdout = child
                .stdout
                .take()
                .map(BufReader::new)
                .ok_or_else(|| FuzzerError::internal("child without stdout"))?;
            self.online = Some(OnlineChild {
                child,
                stdin,
                stdout,
            });
        }
        self.initialized = true;
        self.logic_emitted = false;
        self.opts = OptionState::default();
        // Keep declarations across push/pop; declarations are global in the
        // database.
        self.emit("(set-option :global-declarations true)")
    }

    pub(super) fn delete_solver(&mut self) -> Result<()> {
        if self.initialized {
            let _ = self.emit("(exit)");
        }
        if let Some(mut online) = self.online.take() {
            drop(online.stdin.take());
            let _ = online.child.wait();
        }
        if let Some(mut dump) = self.dump.take() {
            dump.flush()?;
        }
        self.initialized = false;
        Ok(())
    }

    pub(super) fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(super) fn supported_theories(&self) -> Vec<TheoryId> {
        crate::theory::ALL_THEORIES
            .iter()
            .copied()
            .filter(|t| {
                !matches!(
                    t,
                    TheoryId::Bag
                        | TheoryId::Dt
                        | TheoryId::Seq
                        | TheoryId::Set
                        | TheoryId::Transcendental
                )
            })
            .collect()
    }

    pub(super) fn unsupported_op_kinds(&self) -> FxHashSet<String> {
        FxHashSet::default()
    }

    fn higher_order_sort_kinds() -> FxHashSet<SortKind> {
        let mut set = FxHashSet::default();
        set.insert(SortKind::Fun);
        set.insert(SortKind::Reglan);
        set
    }

    pub(super) fn unsupported_var_sort_kinds(&self) -> FxHashSet<SortKind> {
        Self::higher_order_sort_kinds()
    }

    pub(super) fn unsupported_array_index_sort_kinds(&self) -> FxHashSet<SortKind> {
        Self::higher_order_sort_kinds()
    }

    pub(super) fn unsupported_array_element_sort_kinds(&self) -> FxHashSet<SortKind> {
        Self::higher_order_sort_kinds()
    }

    pub(super) fn unsupported_fun_domain_sort_kinds(&self) -> FxHashSet<SortKind> {
        Self::higher_order_sort_kinds()
    }

    pub(super) fn unsupported_fun_codomain_sort_kinds(&self) -> FxHashSet<SortKind> {
        Self::higher_order_sort_kinds()
    }

    pub(super) fn unsupported_get_value_sort_kinds(&self) -> FxHashSet<SortKind> {
        Self::higher_order_sort_kinds()
    }

    pub(super) fn mk_sort(&mut self, kind: SortKind) -> Result<Smt2Sort> {
        match kind {
            SortKind::Bool => Ok(Smt2Sort::bool_sort()),
            SortKind::Int => Ok(Smt2Sort::int_sort()),
            SortKind::Real => Ok(Smt2Sort::real_sort()),
            SortKind::String => Ok(Smt2Sort::string_sort()),
            SortKind::Reglan => Ok(Smt2Sort::reglan_sort()),
            SortKind::Rm => Ok(Smt2Sort::rm_sort()),
            _ => Err(FuzzerError::internal(format!(
                "sort kind {kind} requires parameters"
            ))),
        }
    }

    pub(super) fn mk_sort_bv(&mut self, bw: u32) -> Result<Smt2Sort> {
        Ok(Smt2Sort::bv_sort(bw))
    }

    pub(super) fn mk_sort_fp(&mut self, exp: u32, sig: u32) -> Result<Smt2Sort> {
        Ok(Smt2Sort::fp_sort(exp, sig))
    }

    pub(super) fn mk_sort_with_sorts(
        &mut self,
        kind: SortKind,
        sorts: &[&Smt2Sort],
    ) -> Result<Smt2Sort> {
        match kind {
            SortKind::Array => {
                debug_assert_eq!(sorts.len(), 2);
                Ok(Smt2Sort::array_sort(sorts[0].clone(), sorts[1].clone()))
            }
            SortKind::Fun => Ok(Smt2Sort::fun_sort(
                sorts.iter().map(|s| (*s).clone()).collect(),
            )),
            _ => Err(FuzzerError::internal(format!(
                "sort kind {kind} takes no sort parameters"
            ))),
        }
    }

    pub(super) fn mk_sort_uninterpreted(&mut self, name: &str) -> Result<Smt2Sort> {
        self.emit_cmd(&format!("(declare-sort {name} 0)"))?;
        Ok(Smt2Sort::uninterpreted_sort(name))
    }

    pub(super) fn mk_const(&mut self, sort: &Smt2Sort, name: &str) -> Result<Smt2Term> {
        if sort.kind() == SortKind::Fun {
            let n = sort.sorts.len();
            let domain: Vec<&str> = sort.sorts[..n - 1].iter().map(|s| s.smt2()).collect();
            let codomain = sort.sorts[n - 1].smt2();
            self.emit_cmd(&format!(
                "(declare-fun {name} ({}) {codomain})",
                domain.join(" ")
            ))?;
        } else {
            self.emit_cmd(&format!("(declare-const {name} {})", sort.smt2()))?;
        }
        Ok(Smt2Term::new(name.to_string(), sort.clone()))
    }

    pub(super) fn mk_var(&mut self, sort: &Smt2Sort, name: &str) -> Result<Smt2Term> {
        // Bound variables are rendered inside the binder; no declaration.
        Ok(Smt2Term::new(name.to_string(), sort.clone()))
    }

    pub(super) fn mk_value(&mut self, sort: &Smt2Sort, value: &Value) -> Result<Smt2Term> {
        let repr = match value {
            Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            Value::Int(v) => render_signed(v),
            Value::Real(v) => render_signed(v),
            Value::Rational { num, den } => {
                format!("(/ {} {den})", render_signed(num))
            }
            Value::Bv { value, base } => match base {
                2 => format!("#b{value}"),
                16 => format!("#x{value}"),
                10 => format!("(_ bv{value} {})", sort.bv_size()),
                _ => {
                    return Err(FuzzerError::internal(format!(
                        "unsupported bit-vector base {base}"
                    )));
                }
            },
            Value::Str(s) => format!("\"{s}\""),
        };
        Ok(Smt2Term::new(repr, sort.clone()))
    }

    pub(super) fn mk_special_value(&mut self, sort: &Smt2Sort, value: &str) -> Result<Smt2Term> {
        let bw = sort.bv_size() as usize;
        let (e, s) = (sort.fp_exp_size(), sort.fp_sig_size());
        let repr = match value {
            super::SPECIAL_VALUE_BV_ZERO => format!("#b{}", "0".repeat(bw)),
            super::SPECIAL_VALUE_BV_ONE => format!("#b{}1", "0".repeat(bw - 1)),
            super::SPECIAL_VALUE_BV_ONES => format!("#b{}", "1".repeat(bw)),
            super::SPECIAL_VALUE_BV_MIN_SIGNED => format!("#b1{}", "0".repeat(bw - 1)),
            super::SPECIAL_VALUE_BV_MAX_SIGNED => format!("#b0{}", "1".repeat(bw - 1)),
            super::SPECIAL_VALUE_FP_NAN => format!("(_ NaN {e} {s})"),
            super::SPECIAL_VALUE_FP_POS_INF => format!("(_ +oo {e} {s})"),
            super::SPECIAL_VALUE_FP_NEG_INF => format!("(_ -oo {e} {s})"),
            super::SPECIAL_VALUE_FP_POS_ZERO => format!("(_ +zero {e} {s})"),
            super::SPECIAL_VALUE_FP_NEG_ZERO => format!("(_ -zero {e} {s})"),
            super::SPECIAL_VALUE_RM_RNE => "RNE".to_string(),
            super::SPECIAL_VALUE_RM_RNA => "RNA".to_string(),
            super::SPECIAL_VALUE_RM_RTN => "RTN".to_string(),
            super::SPECIAL_VALUE_RM_RTP => "RTP".to_string(),
            super::SPECIAL_VALUE_RM_RTZ => "RTZ".to_string(),
            super::SPECIAL_VALUE_RE_NONE => "re.none".to_string(),
            super::SPECIAL_VALUE_RE_ALL => "re.all".to_string(),
            super::SPECIAL_VALUE_RE_ALLCHAR => "re.allchar".to_string(),
            _ => {
                return Err(FuzzerError::internal(format!(
                    "unknown special value '{value}'"
                )));
            }
        };
        Ok(Smt2Term::new(repr, sort.clone()))
    }

    pub(super) fn mk_term(
        &mut self,
        kind: &str,
        args: &[&Smt2Term],
        idxs: &[u32],
    ) -> Result<Smt2Term> {
        let sort = self.infer_sort(kind, args, idxs)?;
        let rendered: Vec<&str> = args.iter().map(|t| t.smt2()).collect();
        let repr = match kind {
            op::OP_FORALL | op::OP_EXISTS => {
                let binder = if kind == op::OP_FORALL {
                    "forall"
                } else {
                    "exists"
                };
                format!(
                    "({binder} (({} {})) {})",
                    args[0].smt2(),
                    args[0].sort().smt2(),
                    args[1].smt2()
                )
            }
            op::OP_UF_APPLY => format!("({})", rendered.join(" ")),
            _ if idxs.is_empty() => {
                let symbol = smt2_symbol(kind).ok_or_else(|| {
                    FuzzerError::internal(format!("no SMT-LIB2 rendering for {kind}"))
                })?;
                format!("({symbol} {})", rendered.join(" "))
            }
            _ => {
                let symbol = smt2_indexed_symbol(kind).ok_or_else(|| {
                    FuzzerError::internal(format!("no SMT-LIB2 rendering for {kind}"))
                })?;
                let idx_str: Vec<String> = idxs.iter().map(u32::to_string).collect();
                format!(
                    "((_ {symbol} {}) {})",
                    idx_str.join(" "),
                    rendered.join(" ")
                )
            }
        };
        Ok(Smt2Term::new(repr, sort))
    }

    /// Compute the sort of an application. The generator guarantees the
    /// arguments are well-typed; this only reconstructs the result sort.
    fn infer_sort(&self, kind: &str, args: &[&Smt2Term], idxs: &[u32]) -> Result<Smt2Sort> {
        use crate::op::*;
        let sort = match kind {
            OP_AND | OP_OR | OP_XOR | OP_NOT | OP_IMPLIES | OP_EQUAL | OP_DISTINCT
            | OP_FORALL | OP_EXISTS | OP_BV_ULT | OP_BV_ULE | OP_BV_UGT | OP_BV_UGE
            | OP_BV_SLT | OP_BV_SLE | OP_BV_SGT | OP_BV_SGE | OP_INT_LT | OP_INT_LE
            | OP_INT_GT | OP_INT_GE | OP_INT_DIVISIBLE | OP_REAL_LT | OP_REAL_LE
            | OP_REAL_GT | OP_REAL_GE | OP_REAL_IS_INT | OP_FP_LEQ | OP_FP_LT | OP_FP_GEQ
            | OP_FP_GT | OP_FP_EQ | OP_FP_IS_NORMAL | OP_FP_IS_SUBNORMAL | OP_FP_IS_ZERO
            | OP_FP_IS_INF | OP_FP_IS_NAN | OP_FP_IS_NEG | OP_FP_IS_POS | OP_STR_LT
            | OP_STR_LE | OP_STR_PREFIXOF | OP_STR_SUFFIXOF | OP_STR_CONTAINS
            | OP_STR_IS_DIGIT | OP_STR_IN_RE => Smt2Sort::bool_sort(),
            OP_ITE => {
                if args[1].sort() == args[2].sort() {
                    args[1].sort().clone()
                } else {
                    // Mixed Int/Real branches widen to Real.
                    Smt2Sort::real_sort()
                }
            }
            OP_BV_NOT | OP_BV_NEG | OP_BV_AND | OP_BV_NAND | OP_BV_NOR | OP_BV_OR
            | OP_BV_XOR | OP_BV_XNOR | OP_BV_ADD | OP_BV_SUB | OP_BV_MUL | OP_BV_UDIV
            | OP_BV_UREM | OP_BV_SDIV | OP_BV_SREM | OP_BV_SMOD | OP_BV_SHL | OP_BV_LSHR
            | OP_BV_ASHR | OP_BV_ROTATE_LEFT | OP_BV_ROTATE_RIGHT => args[0].sort().clone(),
            OP_BV_CONCAT => {
                Smt2Sort::bv_sort(args.iter().map(|a| a.sort().bv_size()).sum::<u32>())
            }
            OP_BV_EXTRACT => {
                let (hi, lo) = (idxs[0], idxs[1]);
                if lo > hi || hi >= args[0].sort().bv_size() {
                    return Err(FuzzerError::solver(format!(
                        "invalid extract indices {hi} {lo} on width {}",
                        args[0].sort().bv_size()
                    )));
                }
                Smt2Sort::bv_sort(hi - lo + 1)
            }
            OP_BV_REPEAT => Smt2Sort::bv_sort(args[0].sort().bv_size() * idxs[0]),
            OP_BV_SIGN_EXTEND | OP_BV_ZERO_EXTEND => {
                Smt2Sort::bv_sort(args[0].sort().bv_size() + idxs[0])
            }
            OP_BV_COMP => Smt2Sort::bv_sort(1),
            OP_INT_NEG | OP_INT_SUB | OP_INT_ADD | OP_INT_MUL | OP_INT_DIV | OP_INT_MOD
            | OP_INT_ABS | OP_REAL_TO_INT | OP_STR_LEN | OP_STR_INDEXOF | OP_STR_TO_CODE
            | OP_STR_TO_INT => Smt2Sort::int_sort(),
            OP_INT_TO_REAL | OP_REAL_NEG | OP_REAL_SUB | OP_REAL_ADD | OP_REAL_MUL
            | OP_REAL_DIV | OP_FP_TO_REAL => Smt2Sort::real_sort(),
            OP_ARRAY_SELECT => args[0].sort().children()[1].clone(),
            OP_ARRAY_STORE => args[0].sort().clone(),
            OP_UF_APPLY => args[0]
                .sort()
                .children()
                .last()
                .cloned()
                .ok_or_else(|| FuzzerError::internal("function sort without codomain"))?,
            OP_FP_ABS | OP_FP_NEG | OP_FP_REM | OP_FP_MIN | OP_FP_MAX => {
                args[0].sort().clone()
            }
            OP_FP_ADD | OP_FP_SUB | OP_FP_MUL | OP_FP_DIV | OP_FP_FMA | OP_FP_SQRT
            | OP_FP_RTI => args[1].sort().clone(),
            OP_FP_TO_FP_FROM_SBV | OP_FP_TO_FP_FROM_UBV | OP_FP_TO_FP_FROM_FP
            | OP_FP_TO_FP_FROM_REAL => Smt2Sort::fp_sort(idxs[0], idxs[1]),
            OP_FP_TO_UBV | OP_FP_TO_SBV => Smt2Sort::bv_sort(idxs[0]),
            OP_STR_CONCAT | OP_STR_AT | OP_STR_SUBSTR | OP_STR_REPLACE
            | OP_STR_REPLACE_ALL | OP_STR_FROM_CODE | OP_STR_FROM_INT => {
                Smt2Sort::string_sort()
            }
            OP_STR_TO_RE | OP_RE_CONCAT | OP_RE_UNION | OP_RE_INTER | OP_RE_DIFF
            | OP_RE_STAR | OP_RE_PLUS | OP_RE_OPT | OP_RE_COMP | OP_RE_RANGE | OP_RE_POW
            | OP_RE_LOOP => Smt2Sort::reglan_sort(),
            _ => {
                return Err(FuzzerError::internal(format!(
                    "cannot infer sort of operator {kind}"
                )));
            }
        };
        Ok(sort)
    }

    pub(super) fn get_sort(&self, term: &Smt2Term) -> Smt2Sort {
        term.sort().clone()
    }

    pub(super) fn assert_formula(&mut self, term: &Smt2Term) -> Result<()> {
        self.emit_cmd(&format!("(assert {})", term.smt2()))
    }

    /// Assert with a `:named` annotation, so the assertion can show up in an
    /// unsat core.
    pub(super) fn assert_named(&mut self, term: &Smt2Term, name: &str) -> Result<()> {
        self.emit_cmd(&format!("(assert (! {} :named {name}))", term.smt2()))
    }

    /// Assert an already rendered formula (used by the checking back-end for
    /// model-value equalities echoed by the solver under test).
    pub(super) fn assert_text(&mut self, formula: &str) -> Result<()> {
        self.emit_cmd(&format!("(assert {formula})"))
    }

    fn parse_check_sat_answer(&mut self) -> Result<SatResult> {
        match self.read_answer_line()? {
            None => Ok(SatResult::Unknown),
            Some(line) => match line.as_str() {
                "sat" => Ok(SatResult::Sat),
                "unsat" => Ok(SatResult::Unsat),
                "unknown" => Ok(SatResult::Unknown),
                other => Err(FuzzerError::solver(format!(
                    "unexpected check-sat answer '{other}'"
                ))),
            },
        }
    }

    pub(super) fn check_sat(&mut self) -> Result<SatResult> {
        self.emit_cmd("(check-sat)")?;
        self.parse_check_sat_answer()
    }

    pub(super) fn check_sat_assuming(&mut self, assumptions: &[&Smt2Term]) -> Result<SatResult> {
        let rendered: Vec<&str> = assumptions.iter().map(|t| t.smt2()).collect();
        self.emit_cmd(&format!("(check-sat-assuming ({}))", rendered.join(" ")))?;
        self.parse_check_sat_answer()
    }

    /// check-sat-assuming over literals rendered by another solver instance.
    pub(super) fn check_sat_assuming_text(&mut self, literals: &[String]) -> Result<SatResult> {
        self.emit_cmd(&format!("(check-sat-assuming ({}))", literals.join(" ")))?;
        self.parse_check_sat_answer()
    }

    pub(super) fn get_unsat_assumptions_raw(&mut self) -> Result<String> {
        self.emit_cmd("(get-unsat-assumptions)")?;
        self.read_answer_sexpr()
    }

    pub(super) fn get_unsat_assumptions(&mut self) -> Result<Vec<Smt2Term>> {
        self.get_unsat_assumptions_raw()?;
        Ok(Vec::new())
    }

    pub(super) fn get_unsat_core_raw(&mut self) -> Result<String> {
        self.emit_cmd("(get-unsat-core)")?;
        self.read_answer_sexpr()
    }

    pub(super) fn get_unsat_core(&mut self) -> Result<Vec<Smt2Term>> {
        self.get_unsat_core_raw()?;
        Ok(Vec::new())
    }

    pub(super) fn get_value_raw(&mut self, terms: &[&Smt2Term]) -> Result<String> {
        let rendered: Vec<&str> = terms.iter().map(|t| t.smt2()).collect();
        self.emit_cmd(&format!("(get-value ({}))", rendered.join(" ")))?;
        self.read_answer_sexpr()
    }

    pub(super) fn get_value(&mut self, terms: &[&Smt2Term]) -> Result<Vec<Smt2Term>> {
        // The textual model is consumed but not reconstructed into handles.
        self.get_value_raw(terms)?;
        Ok(Vec::new())
    }

    pub(super) fn push(&mut self, n: u32) -> Result<()> {
        self.emit_cmd(&format!("(push {n})"))
    }

    pub(super) fn pop(&mut self, n: u32) -> Result<()> {
        self.emit_cmd(&format!("(pop {n})"))
    }

    pub(super) fn print_model(&mut self) -> Result<()> {
        self.emit_cmd("(get-model)")?;
        self.read_answer_sexpr().map(|_| ())
    }

    pub(super) fn reset(&mut self) -> Result<()> {
        self.emit("(reset)")?;
        self.logic_emitted = false;
        self.opts = OptionState::default();
        self.emit("(set-option :global-declarations true)")
    }

    pub(super) fn reset_assertions(&mut self) -> Result<()> {
        self.emit_cmd("(reset-assertions)")
    }

    pub(super) fn set_opt(&mut self, name: &str, value: &str) -> Result<()> {
        self.emit(&format!("(set-option :{name} {value})"))?;
        let enabled = value == "true";
        match name {
            "incremental" => self.opts.incremental = enabled,
            "produce-models" => self.opts.model_gen = enabled,
            "produce-unsat-cores" => self.opts.unsat_cores = enabled,
            "produce-unsat-assumptions" => self.opts.unsat_assumptions = enabled,
            _ => {}
        }
        Ok(())
    }

    pub(super) fn option_catalog(&self) -> Vec<SolverOption> {
        let bool_values = || vec!["true".to_string(), "false".to_string()];
        vec![
            SolverOption {
                name: "incremental".to_string(),
                values: bool_values(),
            },
            SolverOption {
                name: "produce-models".to_string(),
                values: bool_values(),
            },
            SolverOption {
                name: "produce-unsat-cores".to_string(),
                values: bool_values(),
            },
            SolverOption {
                name: "produce-unsat-assumptions".to_string(),
                values: bool_values(),
            },
        ]
    }

    pub(super) fn option_name_incremental(&self) -> &'static str {
        "incremental"
    }

    pub(super) fn option_name_model_gen(&self) -> &'static str {
        "produce-models"
    }

    pub(super) fn option_name_unsat_assumptions(&self) -> &'static str {
        "produce-unsat-assumptions"
    }

    pub(super) fn option_name_unsat_cores(&self) -> &'static str {
        "produce-unsat-cores"
    }

    pub(super) fn option_incremental_enabled(&self) -> bool {
        self.opts.incremental
    }

    pub(super) fn option_model_gen_enabled(&self) -> bool {
        self.opts.model_gen
    }

    pub(super) fn option_unsat_assumptions_enabled(&self) -> bool {
        self.opts.unsat_assumptions
    }

    pub(super) fn option_unsat_cores_enabled(&self) -> bool {
        self.opts.unsat_cores
    }
}

/// Render a possibly negative decimal as SMT-LIB2 (`(- 5)` instead of `-5`).
fn render_signed(v: &str) -> String {
    match v.strip_prefix('-') {
        Some(abs) => format!("(- {abs})"),
        None => v.to_string(),
    }
}

/// Split a solver answer of the form `(e1 e2 …)` into its top-level
/// elements, respecting nested parentheses and string literals.
pub(super) fn split_sexpr_list(response: &str) -> Vec<String> {
    let trimmed = response.trim();
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);
    let mut elements = Vec::new();
    let mut current = String::new();
    let mut depth = 0i64;
    let mut in_string = false;
    for c in inner.chars() {
        match c {
            '"' => {
                in_string = !in_string;
                current.push(c);
            }
            '(' if !in_string => {
                depth += 1;
                current.push(c);
            }
            ')' if !in_string => {
                depth -= 1;
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 && !in_string => {
                if !current.is_empty() {
                    elements.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        elements.push(current);
    }
    elements
}

fn paren_balance(line: &str) -> i64 {
    let mut balance = 0;
    let mut in_string = false;
    for c in line.chars() {
        match c {
            '"' => in_string = !in_string,
            '(' if !in_string => balance += 1,
            ')' if !in_string => balance -= 1,
            _ => {}
        }
    }
    balance
}

/// SMT-LIB2 symbol of a non-indexed operator kind.
fn smt2_symbol(kind: &str) -> Option<&'static str> {
    use crate::op::*;
    let symbol = match kind {
        OP_AND => "and",
        OP_OR => "or",
        OP_XOR => "xor",
        OP_NOT => "not",
        OP_IMPLIES => "=>",
        OP_ITE => "ite",
        OP_EQUAL => "=",
        OP_DISTINCT => "distinct",
        OP_ARRAY_SELECT => "select",
        OP_ARRAY_STORE => "store",
        OP_BV_CONCAT => "concat",
        OP_BV_NOT => "bvnot",
        OP_BV_NEG => "bvneg",
        OP_BV_AND => "bvand",
        OP_BV_NAND => "bvnand",
        OP_BV_NOR => "bvnor",
        OP_BV_OR => "bvor",
        OP_BV_XOR => "bvxor",
        OP_BV_XNOR => "bvxnor",
        OP_BV_ADD => "bvadd",
        OP_BV_SUB => "bvsub",
        OP_BV_MUL => "bvmul",
        OP_BV_UDIV => "bvudiv",
        OP_BV_UREM => "bvurem",
        OP_BV_SDIV => "bvsdiv",
        OP_BV_SREM => "bvsrem",
        OP_BV_SMOD => "bvsmod",
        OP_BV_SHL => "bvshl",
        OP_BV_LSHR => "bvlshr",
        OP_BV_ASHR => "bvashr",
        OP_BV_COMP => "bvcomp",
        OP_BV_ULT => "bvult",
        OP_BV_ULE => "bvule",
        OP_BV_UGT => "bvugt",
        OP_BV_UGE => "bvuge",
        OP_BV_SLT => "bvslt",
        OP_BV_SLE => "bvsle",
        OP_BV_SGT => "bvsgt",
        OP_BV_SGE => "bvsge",
        OP_INT_NEG | OP_INT_SUB | OP_REAL_NEG | OP_REAL_SUB => "-",
        OP_INT_ADD | OP_REAL_ADD => "+",
        OP_INT_MUL | OP_REAL_MUL => "*",
        OP_INT_DIV => "div",
        OP_INT_MOD => "mod",
        OP_INT_ABS => "abs",
        OP_INT_LT | OP_REAL_LT => "<",
        OP_INT_LE | OP_REAL_LE => "<=",
        OP_INT_GT | OP_REAL_GT => ">",
        OP_INT_GE | OP_REAL_GE => ">=",
        OP_INT_TO_REAL => "to_real",
        OP_REAL_DIV => "/",
        OP_REAL_IS_INT => "is_int",
        OP_REAL_TO_INT => "to_int",
        OP_FP_ABS => "fp.abs",
        OP_FP_NEG => "fp.neg",
        OP_FP_ADD => "fp.add",
        OP_FP_SUB => "fp.sub",
        OP_FP_MUL => "fp.mul",
        OP_FP_DIV => "fp.div",
        OP_FP_FMA => "fp.fma",
        OP_FP_SQRT => "fp.sqrt",
        OP_FP_REM => "fp.rem",
        OP_FP_RTI => "fp.roundToIntegral",
        OP_FP_MIN => "fp.min",
        OP_FP_MAX => "fp.max",
        OP_FP_LEQ => "fp.leq",
        OP_FP_LT => "fp.lt",
        OP_FP_GEQ => "fp.geq",
        OP_FP_GT => "fp.gt",
        OP_FP_EQ => "fp.eq",
        OP_FP_IS_NORMAL => "fp.isNormal",
        OP_FP_IS_SUBNORMAL => "fp.isSubnormal",
        OP_FP_IS_ZERO => "fp.isZero",
        OP_FP_IS_INF => "fp.isInfinite",
        OP_FP_IS_NAN => "fp.isNaN",
        OP_FP_IS_NEG => "fp.isNegative",
        OP_FP_IS_POS => "fp.isPositive",
        OP_FP_TO_REAL => "fp.to_real",
        OP_STR_CONCAT => "str.++",
        OP_STR_LEN => "str.len",
        OP_STR_LT => "str.<",
        OP_STR_LE => "str.<=",
        OP_STR_AT => "str.at",
        OP_STR_SUBSTR => "str.substr",
        OP_STR_PREFIXOF => "str.prefixof",
        OP_STR_SUFFIXOF => "str.suffixof",
        OP_STR_CONTAINS => "str.contains",
        OP_STR_INDEXOF => "str.indexof",
        OP_STR_REPLACE => "str.replace",
        OP_STR_REPLACE_ALL => "str.replace_all",
        OP_STR_IS_DIGIT => "str.is_digit",
        OP_STR_TO_CODE => "str.to_code",
        OP_STR_FROM_CODE => "str.from_code",
        OP_STR_TO_INT => "str.to_int",
        OP_STR_FROM_INT => "str.from_int",
        OP_STR_TO_RE => "str.to_re",
        OP_STR_IN_RE => "str.in_re",
        OP_RE_CONCAT => "re.++",
        OP_RE_UNION => "re.union",
        OP_RE_INTER => "re.inter",
        OP_RE_DIFF => "re.diff",
        OP_RE_STAR => "re.*",
        OP_RE_PLUS => "re.+",
        OP_RE_OPT => "re.opt",
        OP_RE_COMP => "re.comp",
        OP_RE_RANGE => "re.range",
        _ => return None,
    };
    Some(symbol)
}

/// SMT-LIB2 symbol of an indexed operator kind.
fn smt2_indexed_symbol(kind: &str) -> Option<&'static str> {
    use crate::op::*;
    let symbol = match kind {
        OP_BV_EXTRACT => "extract",
        OP_BV_REPEAT => "repeat",
        OP_BV_ROTATE_LEFT => "rotate_left",
        OP_BV_ROTATE_RIGHT => "rotate_right",
        OP_BV_SIGN_EXTEND => "sign_extend",
        OP_BV_ZERO_EXTEND => "zero_extend",
        OP_INT_DIVISIBLE => "divisible",
        OP_RE_POW => "re.^",
        OP_RE_LOOP => "re.loop",
        OP_FP_TO_FP_FROM_SBV | OP_FP_TO_FP_FROM_FP | OP_FP_TO_FP_FROM_REAL => "to_fp",
        OP_FP_TO_FP_FROM_UBV => "to_fp_unsigned",
        OP_FP_TO_UBV => "fp.to_ubv",
        OP_FP_TO_SBV => "fp.to_sbv",
        _ => return None,
    };
    Some(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline() -> Smt2Solver {
        let mut solver = Smt2Solver::new(None, None);
        solver.new_solver().unwrap();
        solver
    }

    #[test]
    fn test_value_rendering() {
        let mut solver = offline();
        let int_sort = Smt2Sort::int_sort();
        let t = solver
            .mk_value(&int_sort, &Value::Int("-42".to_string()))
            .unwrap();
        assert_eq!(t.smt2(), "(- 42)");
        let bv8 = Smt2Sort::bv_sort(8);
        let t = solver
            .mk_value(
                &bv8,
                &Value::Bv {
                    value: "170".to_string(),
                    base: 10,
                },
            )
            .unwrap();
        assert_eq!(t.smt2(), "(_ bv170 8)");
        let t = solver
            .mk_value(
                &bv8,
                &Value::Bv {
                    value: "10101010".to_string(),
                    base: 2,
                },
            )
            .unwrap();
        assert_eq!(t.smt2(), "#b10101010");
    }

    #[test]
    fn test_special_value_rendering() {
        let mut solver = offline();
        let bv4 = Smt2Sort::bv_sort(4);
        let t = solver
            .mk_special_value(&bv4, crate::solver::SPECIAL_VALUE_BV_MIN_SIGNED)
            .unwrap();
        assert_eq!(t.smt2(), "#b1000");
        let fp = Smt2Sort::fp_sort(5, 11);
        let t = solver
            .mk_special_value(&fp, crate::solver::SPECIAL_VALUE_FP_NAN)
            .unwrap();
        assert_eq!(t.smt2(), "(_ NaN 5 11)");
    }

    #[test]
    fn test_term_rendering_and_sort_inference() {
        let mut solver = offline();
        let bv8 = Smt2Sort::bv_sort(8);
        let x = solver.mk_const(&bv8, "x").unwrap();
        let y = solver.mk_const(&bv8, "y").unwrap();
        let add = solver.mk_term(op::OP_BV_ADD, &[&x, &y], &[]).unwrap();
        assert_eq!(add.smt2(), "(bvadd x y)");
        assert_eq!(add.sort().bv_size(), 8);

        let ext = solver.mk_term(op::OP_BV_EXTRACT, &[&add], &[5, 2]).unwrap();
        assert_eq!(ext.smt2(), "((_ extract 5 2) (bvadd x y))");
        assert_eq!(ext.sort().bv_size(), 4);

        let cat = solver.mk_term(op::OP_BV_CONCAT, &[&x, &ext], &[]).unwrap();
        assert_eq!(cat.sort().bv_size(), 12);

        let lt = solver.mk_term(op::OP_BV_ULT, &[&x, &y], &[]).unwrap();
        assert_eq!(lt.sort().kind(), SortKind::Bool);
    }

    #[test]
    fn test_quantifier_rendering() {
        let mut solver = offline();
        let int_sort = Smt2Sort::int_sort();
        let v = solver.mk_var(&int_sort, "_x0").unwrap();
        let zero = solver
            .mk_value(&int_sort, &Value::Int("0".to_string()))
            .unwrap();
        let body = solver.mk_term(op::OP_INT_LE, &[&zero, &v], &[]).unwrap();
        let q = solver.mk_term(op::OP_FORALL, &[&v, &body], &[]).unwrap();
        assert_eq!(q.smt2(), "(forall ((_x0 Int)) (<= 0 _x0))");
        assert_eq!(q.sort().kind(), SortKind::Bool);
    }

    #[test]
    fn test_array_and_fun_sorts() {
        let mut solver = offline();
        let arr = Smt2Sort::array_sort(Smt2Sort::int_sort(), Smt2Sort::bool_sort());
        assert_eq!(arr.smt2(), "(Array Int Bool)");
        let a = solver.mk_const(&arr, "a").unwrap();
        let i = solver.mk_const(&Smt2Sort::int_sort(), "i").unwrap();
        let sel = solver.mk_term(op::OP_ARRAY_SELECT, &[&a, &i], &[]).unwrap();
        assert_eq!(sel.sort().kind(), SortKind::Bool);

        let fun = Smt2Sort::fun_sort(vec![
            Smt2Sort::int_sort(),
            Smt2Sort::int_sort(),
            Smt2Sort::bool_sort(),
        ]);
        let f = solver.mk_const(&fun, "f").unwrap();
        let app = solver
            .mk_term(op::OP_UF_APPLY, &[&f, &i, &i], &[])
            .unwrap();
        assert_eq!(app.smt2(), "(f i i)");
        assert_eq!(app.sort().kind(), SortKind::Bool);
    }

    #[test]
    fn test_offline_check_sat_is_unknown() {
        let mut solver = offline();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Unknown);
    }

    #[test]
    fn test_option_state_tracking() {
        let mut solver = offline();
        assert!(!solver.option_incremental_enabled());
        solver.set_opt("incremental", "true").unwrap();
        assert!(solver.option_incremental_enabled());
        solver.set_opt("produce-models", "true").unwrap();
        solver.set_opt("produce-models", "false").unwrap();
        assert!(!solver.option_model_gen_enabled());
        solver.reset().unwrap();
        assert!(!solver.option_incremental_enabled());
    }

    #[test]
    fn test_split_sexpr_list() {
        assert_eq!(split_sexpr_list("(a b c)"), vec!["a", "b", "c"]);
        assert_eq!(
            split_sexpr_list("((select a i) #b0101)"),
            vec!["(select a i)", "#b0101"]
        );
        assert_eq!(
            split_sexpr_list("((x 1) (y (- 2)))"),
            vec!["(x 1)", "(y (- 2))"]
        );
        assert_eq!(
            split_sexpr_list("((s \"a b\"))"),
            vec!["(s \"a b\")"]
        );
        assert!(split_sexpr_list("()").is_empty());
        assert!(split_sexpr_list("").is_empty());
    }

    #[test]
    fn test_named_assertion_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("out.smt2");
        let mut solver = Smt2Solver::new(None, Some(dump.clone()));
        solver.new_solver().unwrap();
        let p = solver.mk_const(&Smt2Sort::bool_sort(), "p").unwrap();
        solver.assert_named(&p, "_a0").unwrap();
        solver.delete_solver().unwrap();
        let text = std::fs::read_to_string(&dump).unwrap();
        assert!(text.contains("(assert (! p :named _a0))"), "{text}");
    }

    #[test]
    fn test_sort_dedup_key_is_structural() {
        assert_eq!(Smt2Sort::bv_sort(8), Smt2Sort::bv_sort(8));
        assert_ne!(Smt2Sort::bv_sort(8), Smt2Sort::bv_sort(9));
        assert_eq!(
            Smt2Sort::array_sort(Smt2Sort::int_sort(), Smt2Sort::int_sort()),
            Smt2Sort::array_sort(Smt2Sort::int_sort(), Smt2Sort::int_sort())
        );
    }
}
