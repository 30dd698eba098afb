//! Error types
//!
//! The error taxonomy distinguishes configuration errors (abort before any
//! run), internal invariant violations (a bug in the fuzzer itself), back-end
//! diagnostics (recoverable, classified by the error oracle) and untrace
//! errors (fatal for a single replay).

use thiserror::Error;

/// Errors produced by the generator core.
#[derive(Error, Debug)]
pub enum FuzzerError {
    /// Invalid CLI/options combination; reported before any run starts.
    #[error("configuration error: {0}")]
    Config(String),
    /// Invariant violation inside the generator; a bug in the fuzzer.
    #[error("internal error: {0}")]
    Internal(String),
    /// A diagnostic reported by (or on behalf of) the solver back-end.
    #[error("solver error: {0}")]
    Solver(String),
    /// A trace line could not be replayed.
    #[error("untrace error at line {line}: {msg}")]
    Untrace {
        /// 1-based line number in the trace file.
        line: usize,
        /// Description naming the offending action or token.
        msg: String,
    },
    /// I/O failure (trace files, solver pipes).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, FuzzerError>;

impl FuzzerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a solver diagnostic.
    pub fn solver(msg: impl Into<String>) -> Self {
        Self::Solver(msg.into())
    }

    /// Create an untrace error for the given trace line.
    pub fn untrace(line: usize, msg: impl Into<String>) -> Self {
        Self::Untrace {
            line,
            msg: msg.into(),
        }
    }
}
