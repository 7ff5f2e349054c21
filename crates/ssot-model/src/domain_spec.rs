//! Command and event definitions extracted from domain markdown

use crate::id::{AnchorRef, ArtifactKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A domain id anywhere in a `**Domain**` bullet
static DOMAIN_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bDOM-\d{4}\b").expect("valid domain token regex"));

/// One payload field: `` - `email` (string) — login address ``
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Anchored CMD/EVT section with the detail used as impact context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSpec {
    pub reference: AnchorRef,
    pub name: String,
    /// `**Intent**` for commands, `**Fact**` for events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emits: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggered_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invariants: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<PayloadField>,
}

impl DomainSpec {
    #[must_use]
    pub fn new(reference: AnchorRef, name: impl Into<String>) -> Self {
        Self {
            reference,
            name: name.into(),
            summary: None,
            domain: None,
            aggregate: None,
            emits: Vec::new(),
            triggered_by: Vec::new(),
            consumers: Vec::new(),
            invariants: Vec::new(),
            error_codes: Vec::new(),
            payload: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.reference.kind()
    }

    /// Domain id named by the `**Domain**` bullet, ignoring decoration such
    /// as `DOM-0001 (Identity)`
    #[must_use]
    pub fn domain_id(&self) -> Option<&str> {
        let text = self.domain.as_deref()?;
        DOMAIN_TOKEN.find(text).map(|m| m.as_str())
    }

    /// Render as an anchored markdown section
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.reference.token());
        out.push('\n');
        out.push_str(&format!("### {}: {}\n\n", self.reference.anchor(), self.name));
        let summary_label = if self.kind() == ArtifactKind::Event {
            "Fact"
        } else {
            "Intent"
        };
        if let Some(summary) = &self.summary {
            out.push_str(&format!("- **{summary_label}**: {summary}\n"));
        }
        if let Some(domain) = &self.domain {
            out.push_str(&format!("- **Domain**: {domain}\n"));
        }
        if let Some(aggregate) = &self.aggregate {
            out.push_str(&format!("- **Aggregate**: {aggregate}\n"));
        }
        for (label, values) in [
            ("Emits", &self.emits),
            ("Triggered by", &self.triggered_by),
            ("Consumers", &self.consumers),
        ] {
            if !values.is_empty() {
                out.push_str(&format!("- **{label}**: {}\n", values.join(", ")));
            }
        }
        if !self.payload.is_empty() {
            out.push_str("- **Payload**:\n");
            for field in &self.payload {
                out.push_str(&format!("  - `{}` ({})", field.name, field.field_type));
                if !field.description.is_empty() {
                    out.push_str(&format!(" — {}", field.description));
                }
                out.push('\n');
            }
        }
        if !self.invariants.is_empty() {
            out.push_str("- **Invariants**:\n");
            for invariant in &self.invariants {
                out.push_str(&format!("  - {invariant}\n"));
            }
        }
        if !self.error_codes.is_empty() {
            let codes: Vec<_> = self.error_codes.iter().map(|c| format!("`{c}`")).collect();
            out.push_str(&format!("- **Error codes**: {}\n", codes.join(", ")));
        }
        out.push('\n');
        out
    }
}
