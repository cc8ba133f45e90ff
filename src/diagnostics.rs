// 📋 Diagnostics - everything non-fatal that happened during a run
//
// Row errors, duplicate identities, unmatched rows and field conflicts
// never abort the pipeline. They accumulate here and are presented to the
// operator at the end of the run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Malformed source row, skipped by the loader
    RowSkipped,
    /// Identity row describing a site already in the identity table
    DuplicateIdentity,
    /// Auxiliary row that could not be reconciled to a canonical id
    Unmatched,
    /// Field assigned more than once for one canonical id (last write wins)
    Conflict,
    /// Selector asked for a designation outside the fixed set
    UnknownDesignation,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::RowSkipped => "row_skipped",
            DiagnosticKind::DuplicateIdentity => "duplicate_identity",
            DiagnosticKind::Unmatched => "unmatched",
            DiagnosticKind::Conflict => "conflict",
            DiagnosticKind::UnknownDesignation => "unknown_designation",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Source name ("identity", "acreage", ...) or "selector"
    pub source: String,
    /// 1-based line in the source file, header = 1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Raw park name, canonical id or designation the message is about
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, source: &str, line: Option<usize>, subject: &str, message: String) -> Self {
        Diagnostic {
            kind,
            source: source.to_string(),
            line,
            subject: subject.to_string(),
            message,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "[{}] {}:{} '{}': {}",
                self.kind, self.source, line, self.subject, self.message
            ),
            None => write!(f, "[{}] {} '{}': {}", self.kind, self.source, self.subject, self.message),
        }
    }
}

/// End-of-run report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, diagnostics: I) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.kind == kind).collect()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    pub fn counts(&self) -> BTreeMap<DiagnosticKind, usize> {
        let mut counts = BTreeMap::new();
        for d in &self.diagnostics {
            *counts.entry(d.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn summary(&self) -> String {
        if self.diagnostics.is_empty() {
            return "No diagnostics".to_string();
        }
        let parts: Vec<String> = self
            .counts()
            .iter()
            .map(|(kind, n)| format!("{}: {}", kind, n))
            .collect();
        format!("{} diagnostics ({})", self.diagnostics.len(), parts.join(", "))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// TESTS
// ============================================================================
