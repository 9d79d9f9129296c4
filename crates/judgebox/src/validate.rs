//! Pre-execution source checks
//!
//! Rejects empty or oversized submissions and anything matching a denylist
//! of process and OS escape primitives.
//!
//! # Limitations
//!
//! The denylist is a heuristic layer on top of the executors, not a
//! replacement for them. It matches raw text, so string concatenation,
//! encoding tricks or reflection bypass it trivially, and it also rejects
//! harmless code that merely mentions a pattern inside a string literal or
//! comment, or that defines its own function named `exec`, `system` or
//! `fork`. Method calls such as JavaScript's `RegExp.prototype.exec` are not
//! matched. Isolation is enforced by the container backend; the native
//! fallback offers none.

use std::sync::LazyLock;

use regex::RegexSet;
use thiserror::Error;
use tracing::debug;

use crate::config::LanguageId;

/// Deny rules as (description, pattern) pairs, checked against every language
const DENY_RULES: &[(&str, &str)] = &[
    ("os module import", r"\bimport\s+os\b"),
    ("os module import", r"\bfrom\s+os\b(\.\w+)?\s+import\b"),
    ("subprocess module", r"\bsubprocess\b"),
    ("dynamic import", r"__import__\s*\("),
    // Free-standing exec or the exec(3) family; method calls like `re.exec(` pass
    ("exec call", r"(?:^|[^.\w])exec(?:l|lp|le|v|vp|ve|vpe)?\s*\("),
    ("eval call", r"\beval\s*\("),
    ("system call", r"\bsystem\s*\("),
    ("popen call", r"\bpopen\s*\("),
    ("fork call", r"\b(v)?fork\s*\("),
    ("child_process module", r"child_process"),
    ("process binding", r"process\s*\.\s*binding\b"),
    ("java runtime exec", r"Runtime\s*\.\s*getRuntime\s*\("),
    ("java process builder", r"\bProcessBuilder\b"),
    ("unistd header", r"#\s*include\s*<\s*unistd\.h\s*>"),
    ("syscall wrapper", r"\bsyscall\s*\("),
];

static DENYLIST: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(DENY_RULES.iter().map(|(_, pattern)| pattern))
        .expect("deny patterns should compile")
});

/// Why a submission was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSubmission {
    #[error("code must be a non-empty string")]
    Empty,

    #[error("code too long ({length} characters, maximum is {max})")]
    TooLong { length: usize, max: usize },

    #[error("code contains a potentially dangerous operation: {rule}")]
    DangerousOperation { rule: &'static str },
}

/// Source validator with a fixed maximum length
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    max_chars: usize,
}

impl Validator {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Check a submission before any workspace is created
    pub fn validate(&self, source: &str, language: LanguageId) -> Result<(), InvalidSubmission> {
        if source.trim().is_empty() {
            return Err(InvalidSubmission::Empty);
        }

        let length = source.chars().count();
        if length > self.max_chars {
            return Err(InvalidSubmission::TooLong {
                length,
                max: self.max_chars,
            });
        }

        if let Some(index) = DENYLIST.matches(source).into_iter().next() {
            let rule = DENY_RULES[index].0;
            debug!(%language, rule, "submission matched deny rule");
            return Err(InvalidSubmission::DangerousOperation { rule });
        }

        Ok(())
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(10_000)
    }
}
