//! OxiFuzz Core - Generator Engine for SMT Solver API Fuzzing
//!
//! This crate provides the components of the OxiFuzz model-based API fuzzer:
//! - A weighted finite-state machine driving test generation ([`fsm`])
//! - The symbolic object database owning every sort and term ([`smgr`])
//! - The operator model declaring what terms may be built from which
//!   sub-terms ([`op`])
//! - A deterministic trace recorder/replayer ([`trace`])
//! - The solver adapter surface with the built-in SMT-LIB2 process back-end
//!   ([`solver`])
//!
//! # Examples
//!
//! ## Running one deterministic test
//!
//! ```
//! use oxifuzz_core::options::Options;
//! use oxifuzz_core::run::run_with_writer;
//!
//! let options = Options {
//!     seed: 0xDEADBEEF,
//!     is_seeded: true,
//!     max_actions: 50,
//!     ..Options::default()
//! };
//! let stats = run_with_writer(&options, Box::new(std::io::sink())).unwrap();
//! assert!(stats.actions.contains_key("new-solver"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod actions;
pub mod config;
pub mod error;
pub mod fsm;
pub mod op;
pub mod options;
pub mod rng;
pub mod run;
pub mod smgr;
pub mod solver;
pub mod sort;
pub mod statistics;
pub mod term;
pub mod term_db;
pub mod theory;
pub mod trace;

pub use actions::ActionKind;
pub use error::{FuzzerError, Result};
pub use fsm::Fsm;
pub use options::Options;
pub use rng::RngSource;
pub use smgr::SolverManager;
pub use solver::{SatResult, Solver};
pub use sort::{SortData, SortId, SortKind};
pub use statistics::Statistics;
pub use term::{TermData, TermId};
pub use theory::TheoryId;
pub use trace::Tracer;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxBuildHasher;

/// Insertion-ordered map with the Fx hasher; iteration order is
/// deterministic, which keeps sampling reproducible under a seed.
pub type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Insertion-ordered set with the Fx hasher.
pub type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;
