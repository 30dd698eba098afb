//! Generation limits
//!
//! Numeric bounds for randomly generated sorts, values and API call
//! sequences. These are deliberately small: the point of the generator is to
//! exercise solver APIs, not to build large formulas.

/// Minimum bit-vector width.
pub const BW_MIN: u32 = 1;
/// Maximum bit-vector width.
pub const BW_MAX: u32 = 128;

/// Maximum number of decimal digits of a generated integer value.
pub const INT_LEN_MAX: usize = 50;
/// Maximum number of decimal digits of a generated real value.
pub const REAL_LEN_MAX: usize = 50;
/// Maximum number of decimal digits of numerator/denominator of a generated
/// rational value.
pub const RATIONAL_LEN_MAX: usize = 10;
/// Maximum length of a generated string value.
pub const STR_LEN_MAX: usize = 100;
/// Maximum length of a generated symbol name.
pub const SYMBOL_LEN_MAX: usize = 128;

/// Maximum number of assumptions passed to a single check-sat-assuming call.
pub const MAX_N_ASSUMPTIONS_CHECK_SAT: usize = 5;
/// Maximum number of open push levels.
pub const MAX_N_PUSH_LEVELS: u32 = 5;
/// Maximum number of terms queried by a single get-value call.
pub const MAX_N_TERMS_GET_VALUE: usize = 5;

/// Maximum number of arguments for n-ary operators.
pub const MK_TERM_N_ARGS_MAX: usize = 11;
/// Maximum arity of a generated function sort (codomain excluded).
pub const FUN_ARITY_MAX: usize = 3;

/// Exponent/significand widths used when a floating-point format is sampled.
pub const FP_FORMATS: &[(u32, u32)] = &[(3, 5), (5, 11), (8, 24), (11, 53), (15, 113)];

/// Default per-run action budget. Budget breaches are not errors; the run is
/// wound down through solver teardown.
pub const DEFAULT_MAX_ACTIONS: u64 = 250;

/// Operator arity sentinel: at least one argument.
pub const N_ARGS: i8 = -1;
/// Operator arity sentinel: at least two arguments.
pub const N_ARGS_BIN: i8 = -2;
