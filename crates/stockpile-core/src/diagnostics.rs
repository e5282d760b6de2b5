//! Non-fatal problems accumulated while building the catalog.

use std::fmt;

/// Which stage reported the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Ambiguous or dangling migration configuration.
    Migration,
    /// The finalizer fell back to a safe default.
    Finalize,
    /// A dangling or malformed cross-reference found by the checker.
    Consistency,
    /// A spawn table could not be fully expanded.
    Spawn,
    /// An id was resolved to a synthesized stub.
    MissingDefinition,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::Migration => "migration",
            DiagnosticKind::Finalize => "finalize",
            DiagnosticKind::Consistency => "consistency",
            DiagnosticKind::Spawn => "spawn",
            DiagnosticKind::MissingDefinition => "missing definition",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// The id of the entry the problem belongs to.
    pub subject: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.subject, self.message)
    }
}

/// An ordered list of diagnostics. Every push is also logged.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: DiagnosticKind, subject: impl Into<String>, message: impl Into<String>) {
        let diag = Diagnostic {
            kind,
            subject: subject.into(),
            message: message.into(),
        };
        self.record(diag);
    }

    /// Append an already-built diagnostic.
    pub fn record(&mut self, diag: Diagnostic) {
        log::warn!("{diag}");
        self.entries.push(diag);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    /// Diagnostics about a given subject.
    pub fn about<'a>(&'a self, subject: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.entries.iter().filter(move |d| d.subject == subject)
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_filter() {
        let mut d = Diagnostics::new();
        d.push(DiagnosticKind::Consistency, "rifle", "unknown skill 'rifel'");
        d.push(DiagnosticKind::Migration, "old_knife", "migrated twice");
        assert_eq!(d.len(), 2);
        assert_eq!(d.of_kind(DiagnosticKind::Migration).count(), 1);
        assert_eq!(d.about("rifle").count(), 1);
    }

    #[test]
    fn display_includes_kind_and_subject() {
        let diag = Diagnostic {
            kind: DiagnosticKind::Finalize,
            subject: "bucket".to_string(),
            message: "zero volume".to_string(),
        };
        assert_eq!(format!("{diag}"), "[finalize] bucket: zero volume");
    }
}
