//! Trace recorder and replayer
//!
//! A trace is a line-oriented transcript of one run: a prelude line
//! recording the invocation options, optional `set-seed` lines pinning the
//! RNG state, and one line per executed action. Arguments are rendered as
//! stable symbolic identifiers (`s<id>`, `t<id>`), decimal literals, quoted
//! strings (`"` doubled, newline as `\n`) and bracketed groups. Return
//! values follow a `return` keyword on the same line; they are written after
//! the back-end call so a crashing call leaves its action line in the file.
//!
//! Replay executes the same actions with pre-resolved ids: identifiers read
//! from the file are mapped to live ids through the untrace tables, and ids
//! created during replay are registered against the recorded ones.

use std::io::Write;
use std::path::Path;

use crate::actions::ActionKind;
use crate::error::{FuzzerError, Result};
use crate::options::TRACE_OPTIONS_KEYWORD;
use crate::smgr::SolverManager;
use crate::sort::SortId;
use crate::term::TermId;

/// Append-only trace writer.
pub struct Tracer {
    out: Box<dyn Write + Send>,
    trace_seeds: bool,
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer")
            .field("trace_seeds", &self.trace_seeds)
            .finish()
    }
}

impl Tracer {
    /// Create a tracer writing to the given sink.
    #[must_use]
    pub fn new(out: Box<dyn Write + Send>, trace_seeds: bool) -> Self {
        Self { out, trace_seeds }
    }

    /// A tracer that discards everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Box::new(std::io::sink()), false)
    }

    /// True if `set-seed` lines are interposed before actions.
    #[must_use]
    pub fn trace_seeds(&self) -> bool {
        self.trace_seeds
    }

    /// Write a complete line.
    pub fn line(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        Ok(())
    }

    /// Write the action kind and arguments of a line, without terminating
    /// it. Flushed immediately so a crashing back-end call still leaves the
    /// action visible in the trace.
    pub fn begin_line(&mut self, partial: &str) -> Result<()> {
        write!(self.out, "{partial}")?;
        self.out.flush()?;
        Ok(())
    }

    /// Terminate a line begun with [`Tracer::begin_line`], appending the
    /// return ids.
    pub fn end_line(&mut self, returns: &str) -> Result<()> {
        writeln!(self.out, "{returns}")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Quote a string for a trace line: `"` is doubled, newlines become `\n`.
/// Backslashes never occur in generated payloads.
#[must_use]
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\"\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render a bracketed group of term ids.
#[must_use]
pub fn term_group(ids: &[TermId]) -> String {
    let parts: Vec<String> = ids.iter().map(TermId::to_string).collect();
    format!("[{}]", parts.join(" "))
}

/// Render a bracketed group of integers.
#[must_use]
pub fn index_group(idxs: &[u32]) -> String {
    let parts: Vec<String> = idxs.iter().map(u32::to_string).collect();
    format!("[{}]", parts.join(" "))
}

/// One argument token of a parsed trace line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Unquoted atom (identifier, keyword or literal).
    Atom(String),
    /// Quoted string, unescaped.
    Str(String),
    /// Bracketed group of atoms.
    Group(Vec<String>),
}

impl Token {
    /// The atom payload, if this token is an atom.
    #[must_use]
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Self::Atom(s) => Some(s),
            _ => None,
        }
    }

    /// The string payload, if this token is a quoted string.
    #[must_use]
    pub fn as_str_lit(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The group payload, if this token is a group.
    #[must_use]
    pub fn as_group(&self) -> Option<&[String]> {
        match self {
            Self::Group(g) => Some(g),
            _ => None,
        }
    }
}

/// A tokenized trace line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    /// The action kind keyword.
    pub kind: String,
    /// Argument tokens.
    pub args: Vec<Token>,
    /// Ids following the `return` keyword.
    pub returns: Vec<String>,
}

/// Tokenize one trace line.
pub fn parse_line(line: &str, lineno: usize) -> Result<ParsedLine> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut returns: Vec<String> = Vec::new();
    let mut in_returns = false;
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        None => {
                            return Err(FuzzerError::untrace(lineno, "unterminated string"));
                        }
                        Some('"') => {
                            if chars.peek() == Some(&'"') {
                                chars.next();
                                s.push('"');
                            } else {
                                break;
                            }
                        }
                        Some('\\') if chars.peek() == Some(&'n') => {
                            chars.next();
                            s.push('\n');
                        }
                        Some(c) => s.push(c),
                    }
                }
                if in_returns {
                    return Err(FuzzerError::untrace(lineno, "string in return position"));
                }
                tokens.push(Token::Str(s));
            }
            '[' => {
                chars.next();
                let mut group = Vec::new();
                let mut atom = String::new();
                loop {
                    match chars.next() {
                        None => {
                            return Err(FuzzerError::untrace(lineno, "unterminated group"));
                        }
                        Some(']') => {
                            if !atom.is_empty() {
                                group.push(std::mem::take(&mut atom));
                            }
                            break;
                        }
                        Some(c) if c.is_whitespace() => {
                            if !atom.is_empty() {
                                group.push(std::mem::take(&mut atom));
                            }
                        }
                        Some(c) => atom.push(c),
                    }
                }
                if in_returns {
                    return Err(FuzzerError::untrace(lineno, "group in return position"));
                }
                tokens.push(Token::Group(group));
            }
            _ => {
                let mut atom = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    atom.push(c);
                    chars.next();
                }
                if atom == "return" && !tokens.is_empty() {
                    in_returns = true;
                } else if in_returns {
                    returns.push(atom);
                } else {
                    tokens.push(Token::Atom(atom));
                }
            }
        }
    }

    let mut tokens = tokens.into_iter();
    let kind = match tokens.next() {
        Some(Token::Atom(kind)) => kind,
        _ => return Err(FuzzerError::untrace(lineno, "missing action kind")),
    };
    Ok(ParsedLine {
        kind,
        args: tokens.collect(),
        returns,
    })
}

/// Parse an `s<id>` reference.
pub fn parse_sort_ref(token: &str, lineno: usize) -> Result<u64> {
    token
        .strip_prefix('s')
        .and_then(|digits| digits.parse::<u64>().ok())
        .ok_or_else(|| FuzzerError::untrace(lineno, format!("invalid sort id '{token}'")))
}

/// Parse a `t<id>` reference.
pub fn parse_term_ref(token: &str, lineno: usize) -> Result<u64> {
    token
        .strip_prefix('t')
        .and_then(|digits| digits.parse::<u64>().ok())
        .ok_or_else(|| FuzzerError::untrace(lineno, format!("invalid term id '{token}'")))
}

/// Resolve an `s<id>` reference through the untrace table.
pub fn resolve_sort(smgr: &SolverManager, token: &str, lineno: usize) -> Result<SortId> {
    let id = parse_sort_ref(token, lineno)?;
    smgr.untraced_sort(id)
        .ok_or_else(|| FuzzerError::untrace(lineno, format!("unknown sort '{token}'")))
}

/// Resolve a `t<id>` reference through the untrace table.
pub fn resolve_term(smgr: &SolverManager, token: &str, lineno: usize) -> Result<TermId> {
    let id = parse_term_ref(token, lineno)?;
    smgr.untraced_term(id)
        .ok_or_else(|| FuzzerError::untrace(lineno, format!("unknown term '{token}'")))
}

/// Replay a trace file. The options prelude is assumed to have been applied
/// by the caller; `set-seed` lines restore the RNG state in place.
pub fn replay(path: &Path, smgr: &mut SolverManager) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    for (idx, raw) in content.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with(TRACE_OPTIONS_KEYWORD) {
            continue;
        }
        if let Some(state) = line.strip_prefix("set-seed ") {
            let state = state.trim();
            smgr.rng_mut()
                .set_state(state)
                .map_err(|e| FuzzerError::untrace(lineno, e.to_string()))?;
            smgr.trace_line(&format!("set-seed {state}"))?;
            continue;
        }
        let parsed = parse_line(line, lineno)?;
        let action = ActionKind::from_kind_str(&parsed.kind).ok_or_else(|| {
            FuzzerError::untrace(lineno, format!("unknown action '{}'", parsed.kind))
        })?;
        action.untrace(smgr, &parsed, lineno)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_round_trip() {
        let cases = ["plain", "with \"quotes\"", "line\nbreak", "|piped sym|", ""];
        for case in cases {
            let quoted = quote(case);
            let parsed = parse_line(&format!("mk-const s1 {quoted}"), 1).unwrap();
            assert_eq!(parsed.args[1], Token::Str(case.to_string()));
        }
    }

    #[test]
    fn test_parse_action_line() {
        let parsed = parse_line("mk-term OP_BV_ADD [t1 t1] return t2", 1).unwrap();
        assert_eq!(parsed.kind, "mk-term");
        assert_eq!(parsed.args[0], Token::Atom("OP_BV_ADD".to_string()));
        assert_eq!(
            parsed.args[1],
            Token::Group(vec!["t1".to_string(), "t1".to_string()])
        );
        assert_eq!(parsed.returns, vec!["t2".to_string()]);
    }

    #[test]
    fn test_parse_indexed_line() {
        let parsed = parse_line("mk-term OP_BV_EXTRACT [t3] [7 0] return t9", 1).unwrap();
        assert_eq!(
            parsed.args[2],
            Token::Group(vec!["7".to_string(), "0".to_string()])
        );
    }

    #[test]
    fn test_parse_line_without_returns() {
        let parsed = parse_line("assert t4", 1).unwrap();
        assert_eq!(parsed.kind, "assert");
        assert_eq!(parsed.args, vec![Token::Atom("t4".to_string())]);
        assert!(parsed.returns.is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(parse_line("mk-const s1 \"open", 1).is_err());
        assert!(parse_line("mk-term OP_AND [t1 t2", 1).is_err());
        assert!(parse_line("", 1).is_err());
    }

    #[test]
    fn test_id_ref_parsing() {
        assert_eq!(parse_sort_ref("s12", 1).unwrap(), 12);
        assert_eq!(parse_term_ref("t7", 1).unwrap(), 7);
        assert!(parse_sort_ref("t12", 1).is_err());
        assert!(parse_term_ref("tx", 1).is_err());
    }

    #[test]
    fn test_group_rendering() {
        assert_eq!(term_group(&[TermId(1), TermId(2)]), "[t1 t2]");
        assert_eq!(index_group(&[7, 0]), "[7 0]");
        assert_eq!(term_group(&[]), "[]");
    }
}
