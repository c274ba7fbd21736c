//! A pedantic ELF validator.
//!
//! [`validate`] applies the generic-ABI rules to a parsed [`Elf`]: header
//! sanity, program and section header consistency, symbol and relocation
//! integrity, dynamic-section dependencies, hash table coverage, section
//! groups, versioning, and notes. Every violation is recorded in a
//! [`Report`] and checking continues; a bad symbol never hides the next
//! one.
//!
//! Policy that used to live in command-line flags is carried by
//! [`Context`]; there is no global state.

#![warn(missing_docs)]

use std::fmt;

use relic_elf::Elf;

mod checks;

/// Policy flags for a validation run.
#[derive(Clone, Copy, Debug, Default)]
pub struct Context {
    /// Apply the stricter reading of the gABI where both readings are
    /// defensible (level-2 dynamic tags, merge/strings flags).
    pub strict: bool,
    /// Accept the deviations the GNU linker is known to produce.
    pub gnu_ld: bool,
    /// The file is a separate debug-info file: NOBITS sections may appear
    /// where contents are normally mandated, and note offsets are
    /// meaningless.
    pub is_debuginfo: bool,
}

/// One rule violation.
#[derive(Clone, Debug)]
pub struct Issue {
    /// The offending section, when the rule concerns one.
    pub section: Option<usize>,
    /// The offending entry within the section (symbol, relocation, tag).
    pub entry: Option<u64>,
    /// Human-readable description of the violation.
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.section, self.entry) {
            (Some(section), Some(entry)) => {
                write!(f, "section [{section}]: entry {entry}: {}", self.message)
            }
            (Some(section), None) => write!(f, "section [{section}]: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// The accumulated result of a validation run.
#[derive(Debug, Default)]
pub struct Report {
    issues: Vec<Issue>,
}

impl Report {
    /// All recorded issues, in check order.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Number of violations; doubles as the exit code for embedding tools.
    pub fn error_count(&self) -> usize {
        self.issues.len()
    }

    /// Whether no rule was violated.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub(crate) fn add(&mut self, section: Option<usize>, entry: Option<u64>, message: String) {
        self.issues.push(Issue {
            section,
            entry,
            message,
        });
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for issue in &self.issues {
            writeln!(f, "{issue}")?;
        }
        if self.issues.is_empty() {
            writeln!(f, "No errors")
        } else {
            writeln!(f, "{} errors", self.issues.len())
        }
    }
}

/// Validates `elf` against the generic ABI, returning every violation.
pub fn validate(elf: &Elf<'_>, context: &Context) -> Report {
    let mut checker = checks::Checker::new(elf, context);
    checker.run();
    checker.into_report()
}
