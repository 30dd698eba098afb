//! Seedable random source
//!
//! Every random decision of the generator flows through [`RngSource`]; no
//! component may touch the platform RNG. The engine state is serializable as
//! an opaque string so that a trace can pin the generator state before any
//! action (`set-seed <state>` lines) and replay is deterministic from that
//! point on.

use indexmap::IndexSet;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::hash::{BuildHasher, Hash};

use crate::error::{FuzzerError, Result};

/// Characters allowed in SMT-LIB simple symbols (besides letters and digits).
const SIMPLE_SYMBOL_CHARS: &[u8] = b"~!@$%^&*_-+=<>.?/";

/// Printable characters used for generated string literals. Quote and
/// backslash are excluded so literals never need SMT-LIB escape sequences.
const STRING_LITERAL_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 _.,;:!?+-*/<>=()#%&";

/// The per-run random source.
///
/// Wraps a ChaCha stream cipher RNG: the pair (seed, word position) fully
/// describes the engine state, which is what makes `set-seed` trace lines
/// possible.
#[derive(Debug, Clone)]
pub struct RngSource {
    seed: u64,
    rng: ChaCha8Rng,
}

impl RngSource {
    /// Create a source from a 64-bit seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// The seed this source was created from.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Serialize the full engine state as `<seed-hex>:<wordpos-hex>`.
    #[must_use]
    pub fn state(&self) -> String {
        format!("{:x}:{:x}", self.seed, self.rng.get_word_pos())
    }

    /// Restore an engine state produced by [`RngSource::state`].
    pub fn set_state(&mut self, state: &str) -> Result<()> {
        let (seed, pos) = state
            .split_once(':')
            .ok_or_else(|| FuzzerError::config(format!("invalid rng state '{state}'")))?;
        let seed = u64::from_str_radix(seed, 16)
            .map_err(|_| FuzzerError::config(format!("invalid rng seed '{seed}'")))?;
        let pos = u128::from_str_radix(pos, 16)
            .map_err(|_| FuzzerError::config(format!("invalid rng position '{pos}'")))?;
        self.seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.rng.set_word_pos(pos);
        Ok(())
    }

    /// Uniform integer in `[lo, hi]` (inclusive).
    pub fn pick_range(&mut self, lo: u64, hi: u64) -> u64 {
        debug_assert!(lo <= hi);
        self.rng.random_range(lo..=hi)
    }

    /// Uniform index into a collection of `len` elements.
    pub fn pick_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        self.rng.random_range(0..len)
    }

    /// Fair coin flip.
    pub fn flip_coin(&mut self) -> bool {
        self.rng.random_bool(0.5)
    }

    /// True with probability `percent / 100`.
    pub fn with_probability(&mut self, percent: u32) -> bool {
        debug_assert!(percent <= 100);
        self.rng.random_range(0..100) < percent
    }

    /// Weighted choice over parallel item/weight slices; returns the picked
    /// index, or `None` if all weights are zero. Items need not be hashable.
    pub fn pick_weighted(&mut self, weights: &[u32]) -> Option<usize> {
        let total: u64 = weights.iter().map(|w| u64::from(*w)).sum();
        if total == 0 {
            return None;
        }
        let mut pick = self.pick_range(0, total - 1);
        for (idx, weight) in weights.iter().enumerate() {
            let weight = u64::from(*weight);
            if pick < weight {
                return Some(idx);
            }
            pick -= weight;
        }
        unreachable!("weighted pick out of range")
    }

    /// Uniform pick from a slice.
    pub fn pick_from_slice<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.pick_index(items.len())]
    }

    /// Uniform pick from an insertion-ordered set.
    pub fn pick_from_set<'a, T, S>(&mut self, set: &'a IndexSet<T, S>) -> &'a T
    where
        T: Hash + Eq,
        S: BuildHasher,
    {
        set.get_index(self.pick_index(set.len()))
            .expect("pick from empty set")
    }

    /// Random decimal digit string of length in `[1, max_len]`, without a
    /// leading zero (unless the value is exactly zero).
    pub fn pick_dec_string(&mut self, max_len: usize) -> String {
        let len = self.pick_range(1, max_len as u64) as usize;
        let mut s = String::with_capacity(len);
        s.push((b'1' + self.pick_range(0, 8) as u8) as char);
        for _ in 1..len {
            s.push((b'0' + self.pick_range(0, 9) as u8) as char);
        }
        if len == 1 && self.with_probability(10) {
            s = "0".to_string();
        }
        s
    }

    /// Random binary digit string of exactly `len` characters.
    pub fn pick_bin_string(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| if self.flip_coin() { '1' } else { '0' })
            .collect()
    }

    /// Random SMT-LIB simple symbol of length `len`.
    pub fn pick_simple_symbol(&mut self, len: usize) -> String {
        let mut s = String::with_capacity(len);
        for _ in 0..len {
            let c = match self.pick_range(0, 2) {
                0 => (b'a' + self.pick_range(0, 25) as u8) as char,
                1 => (b'A' + self.pick_range(0, 25) as u8) as char,
                _ => SIMPLE_SYMBOL_CHARS[self.pick_index(SIMPLE_SYMBOL_CHARS.len())] as char,
            };
            s.push(c);
        }
        s
    }

    /// Random piped symbol `|...|` of inner length `len`. The payload may
    /// contain any printable character except `|` and `\`.
    pub fn pick_piped_symbol(&mut self, len: usize) -> String {
        let mut s = String::with_capacity(len + 2);
        s.push('|');
        for _ in 0..len {
            loop {
                let c = STRING_LITERAL_CHARS[self.pick_index(STRING_LITERAL_CHARS.len())] as char;
                if c != '|' && c != '\\' {
                    s.push(c);
                    break;
                }
            }
        }
        s.push('|');
        s
    }

    /// Random printable string literal of length in `[0, max_len]`.
    pub fn pick_string_literal(&mut self, max_len: usize) -> String {
        let len = self.pick_range(0, max_len as u64) as usize;
        (0..len)
            .map(|_| STRING_LITERAL_CHARS[self.pick_index(STRING_LITERAL_CHARS.len())] as char)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexSet;
    use rustc_hash::FxBuildHasher;

    #[test]
    fn test_deterministic_under_seed() {
        let mut a = RngSource::new(0xDEAD_BEEF);
        let mut b = RngSource::new(0xDEAD_BEEF);
        for _ in 0..1000 {
            assert_eq!(a.pick_range(0, 1 << 20), b.pick_range(0, 1 << 20));
        }
    }

    #[test]
    fn test_state_round_trip() {
        let mut a = RngSource::new(42);
        for _ in 0..17 {
            a.pick_range(0, 100);
        }
        let state = a.state();
        let mut b = RngSource::new(7);
        b.set_state(&state).unwrap();
        for _ in 0..100 {
            assert_eq!(a.pick_range(0, 1 << 30), b.pick_range(0, 1 << 30));
        }
    }

    #[test]
    fn test_state_rejects_garbage() {
        let mut rng = RngSource::new(0);
        assert!(rng.set_state("not-a-state").is_err());
        assert!(rng.set_state("zz:1").is_err());
    }

    #[test]
    fn test_weighted_pick_respects_zero_weights() {
        let mut rng = RngSource::new(1);
        for _ in 0..100 {
            let idx = rng.pick_weighted(&[0, 3, 0, 5]).unwrap();
            assert!(idx == 1 || idx == 3);
        }
        assert_eq!(rng.pick_weighted(&[0, 0]), None);
        assert_eq!(rng.pick_weighted(&[]), None);
    }

    #[test]
    fn test_pick_from_set_is_insertion_order_stable() {
        let mut set: IndexSet<u32, FxBuildHasher> = IndexSet::default();
        for i in 0..10 {
            set.insert(i * 7);
        }
        let mut a = RngSource::new(99);
        let mut b = RngSource::new(99);
        for _ in 0..100 {
            assert_eq!(a.pick_from_set(&set), b.pick_from_set(&set));
        }
    }

    #[test]
    fn test_symbols_have_requested_shape() {
        let mut rng = RngSource::new(3);
        let simple = rng.pick_simple_symbol(12);
        assert_eq!(simple.len(), 12);
        let piped = rng.pick_piped_symbol(8);
        assert!(piped.starts_with('|') && piped.ends_with('|'));
        assert_eq!(piped.len(), 10);
        let dec = rng.pick_dec_string(50);
        assert!(!dec.is_empty() && dec.len() <= 50);
        assert!(dec == "0" || !dec.starts_with('0'));
    }
}
