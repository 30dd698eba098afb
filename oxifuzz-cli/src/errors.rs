//! Error aggregation
//!
//! Continuous mode collapses repeated errors into one entry per normalized
//! fingerprint: the error message with addresses, pids and line/column
//! numbers stripped, so the same bug found under different seeds grows one
//! seed list instead of flooding the summary.

use indexmap::IndexMap;
use regex::Regex;
use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;

use oxifuzz_core::Result;

fn fingerprint_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"0x[0-9a-fA-F]+").expect("valid regex"),
            Regex::new(r"(?i)\bpid[ :=]*\d+").expect("valid regex"),
            Regex::new(r"\b\d+\b").expect("valid regex"),
        ]
    })
}

/// Normalize an error message into a fingerprint: addresses, pids and
/// numbers are replaced by placeholders.
#[must_use]
pub fn normalize(msg: &str) -> String {
    let patterns = fingerprint_patterns();
    let msg = patterns[0].replace_all(msg, "<addr>");
    let msg = patterns[1].replace_all(&msg, "<pid>");
    let msg = patterns[2].replace_all(&msg, "<n>");
    msg.trim().to_string()
}

/// One unique error with the seeds that triggered it.
#[derive(Debug, Clone)]
pub struct ErrorEntry {
    /// The first observed (un-normalized) message.
    pub msg: String,
    /// Seeds that produced this error.
    pub seeds: Vec<u64>,
}

/// Errors keyed by normalized fingerprint.
#[derive(Debug, Default)]
pub struct ErrorMap {
    entries: IndexMap<String, ErrorEntry>,
}

impl ErrorMap {
    /// Record an error observed under the given seed. Returns true if this
    /// fingerprint is new.
    pub fn add(&mut self, seed: u64, msg: &str) -> bool {
        let fingerprint = normalize(msg);
        match self.entries.get_mut(&fingerprint) {
            Some(entry) => {
                entry.seeds.push(seed);
                false
            }
            None => {
                self.entries.insert(
                    fingerprint,
                    ErrorEntry {
                        msg: msg.to_string(),
                        seeds: vec![seed],
                    },
                );
                true
            }
        }
    }

    /// Number of unique errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no error was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn escape_csv(s: &str) -> String {
        s.replace('"', "\"\"").replace('\n', "\\n")
    }

    /// Print the terminal summary: count, sample seeds and message per
    /// unique error, or the machine-readable CSV variant.
    pub fn print_summary(&self, csv: bool, out: &mut dyn Write) -> Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }
        writeln!(out, "\nError statistics ({} in total):\n", self.entries.len())?;
        for entry in self.entries.values() {
            if csv {
                let seeds: Vec<String> =
                    entry.seeds.iter().map(|s| format!("{s:x}")).collect();
                writeln!(
                    out,
                    "oxifuzz:csv:{},\"{}\",{}",
                    entry.seeds.len(),
                    Self::escape_csv(&entry.msg),
                    seeds.join(" ")
                )?;
            } else {
                let sample: Vec<String> = entry
                    .seeds
                    .iter()
                    .take(10)
                    .map(|s| format!("{s:x}"))
                    .collect();
                writeln!(
                    out,
                    "{} errors: {}\n{}\n",
                    entry.seeds.len(),
                    sample.join(" "),
                    entry.msg
                )?;
            }
        }
        Ok(())
    }

    /// Export the collected messages as a JSON exclusion list.
    pub fn export_json(&self, path: &Path) -> Result<()> {
        let msgs: Vec<&str> = self.entries.values().map(|e| e.msg.as_str()).collect();
        let doc = serde_json::json!({ "errors": { "exclude": msgs } });
        std::fs::write(path, format!("{doc:#}\n"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_volatile_parts() {
        let a = normalize("ERROR: assertion failed at solver.cpp:123 (0x7f3a9c)");
        let b = normalize("ERROR: assertion failed at solver.cpp:456 (0x55aa00)");
        assert_eq!(a, b);
        assert!(a.contains("<addr>"));
        assert!(a.contains("<n>"));
    }

    #[test]
    fn test_same_fingerprint_collapses() {
        let mut map = ErrorMap::default();
        assert!(map.add(1, "segfault at 0xdeadbeef"));
        assert!(!map.add(2, "segfault at 0xcafebabe"));
        assert!(map.add(3, "cross-check: sat vs unsat"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_summary_lists_seeds_hex() {
        let mut map = ErrorMap::default();
        map.add(0xDEAD, "boom");
        let mut out = Vec::new();
        map.print_summary(false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("dead"));
        assert!(text.contains("boom"));
    }

    #[test]
    fn test_csv_escaping() {
        let mut map = ErrorMap::default();
        map.add(1, "say \"hi\"\nagain");
        let mut out = Vec::new();
        map.print_summary(true, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("say \"\"hi\"\"\\nagain"));
    }
}
