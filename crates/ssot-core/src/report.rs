//! Validation report
//!
//! Sorted, de-duplicated diagnostics plus a SHA-256 digest of the rendered
//! lines. Two runs over an unchanged tree give the same digest.

use serde::Serialize;
use sha2::{Digest, Sha256};
use ssot_model::{normalize, Diagnostic, ErrorKind};
use std::collections::BTreeMap;

/// Counts of what was checked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub requirements: usize,
    pub documents: usize,
    pub deltas: usize,
    pub nodes: usize,
    pub edges: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    diagnostics: Vec<Diagnostic>,
    summary: ReportSummary,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    ok: bool,
    digest: String,
    summary: ReportSummary,
    counts: BTreeMap<ErrorKind, usize>,
    diagnostics: &'a [Diagnostic],
}

impl ValidationReport {
    #[must_use]
    pub fn new(mut diagnostics: Vec<Diagnostic>, summary: ReportSummary) -> Self {
        normalize(&mut diagnostics);
        Self { diagnostics, summary }
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        self.summary
    }

    /// No violation of any kind
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// `0` on success, `1` on any violation
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_ok())
    }

    /// Violations per kind; kinds without violations are omitted
    #[must_use]
    pub fn counts(&self) -> BTreeMap<ErrorKind, usize> {
        let mut counts = BTreeMap::new();
        for d in &self.diagnostics {
            *counts.entry(d.kind).or_insert(0) += 1;
        }
        counts
    }

    /// One line per diagnostic, in report order
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.diagnostics.iter().map(ToString::to_string).collect()
    }

    /// Hex SHA-256 over the rendered lines
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for line in self.lines() {
            hasher.update(line.as_bytes());
            hasher.update([b'\n']);
        }
        hex::encode(hasher.finalize())
    }

    /// Human-readable report
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for line in self.lines() {
            out.push_str(&line);
            out.push('\n');
        }
        let s = &self.summary;
        if self.is_ok() {
            out.push_str(&format!(
                "ok: {} requirements, {} documents, {} deltas, {} nodes, {} edges\n",
                s.requirements, s.documents, s.deltas, s.nodes, s.edges
            ));
        } else {
            let by_kind: Vec<String> = self
                .counts()
                .into_iter()
                .map(|(kind, n)| format!("{kind}: {n}"))
                .collect();
            out.push_str(&format!(
                "failed: {} violation(s) ({})\n",
                self.diagnostics.len(),
                by_kind.join(", ")
            ));
        }
        out
    }

    /// Machine-readable report
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn render_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&JsonReport {
            ok: self.is_ok(),
            digest: self.digest(),
            summary: self.summary,
            counts: self.counts(),
            diagnostics: &self.diagnostics,
        })
    }
}
