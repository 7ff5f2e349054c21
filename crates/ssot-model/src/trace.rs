//! Trace links and graph edge kinds

use crate::id::ArtifactKind;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Typed edge of the traceability graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// CAP → BV
    Realizes,
    /// BR → CAP
    Satisfies,
    /// NFR → CAP
    Constrains,
    /// CAP → CMD
    TracesCommand,
    /// CAP → EVT
    TracesEvent,
    /// Delta → BV/CAP/BR/NFR
    Targets,
    /// Task → Task
    DependsOn,
}

impl EdgeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Realizes => "realizes",
            Self::Satisfies => "satisfies",
            Self::Constrains => "constrains",
            Self::TracesCommand => "traces-command",
            Self::TracesEvent => "traces-event",
            Self::Targets => "targets",
            Self::DependsOn => "depends-on",
        }
    }
}

impl Display for EdgeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Link types allowed in `trace-links.yaml`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Realizes,
    Satisfies,
    Constrains,
}

impl LinkType {
    pub const ALL: [LinkType; 3] = [LinkType::Realizes, LinkType::Satisfies, LinkType::Constrains];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Realizes => "realizes",
            Self::Satisfies => "satisfies",
            Self::Constrains => "constrains",
        }
    }

    #[must_use]
    pub fn edge_kind(self) -> EdgeKind {
        match self {
            Self::Realizes => EdgeKind::Realizes,
            Self::Satisfies => EdgeKind::Satisfies,
            Self::Constrains => EdgeKind::Constrains,
        }
    }

    /// Canonical (source, target) kinds of the edge
    #[must_use]
    pub fn endpoints(self) -> (ArtifactKind, ArtifactKind) {
        match self {
            Self::Realizes => (ArtifactKind::Capability, ArtifactKind::BusinessValue),
            Self::Satisfies => (ArtifactKind::BusinessRule, ArtifactKind::Capability),
            Self::Constrains => (ArtifactKind::Nfr, ArtifactKind::Capability),
        }
    }
}

/// One entry of `trace-links.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceLink {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl TraceLink {
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>, link_type: LinkType) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            link_type,
            rationale: None,
        }
    }

    /// Orient the link in the canonical direction of its type
    ///
    /// Links are accepted in either direction (`BV → CAP` and `CAP → BV` both
    /// mean "CAP realizes BV"). Returns `None` when the endpoint kinds fit the
    /// link type in neither orientation.
    #[must_use]
    pub fn canonical(&self) -> Option<(&str, &str)> {
        let (source, target) = self.link_type.endpoints();
        let from = ArtifactKind::of(&self.from);
        let to = ArtifactKind::of(&self.to);
        if from == Some(source) && to == Some(target) {
            Some((&self.from, &self.to))
        } else if from == Some(target) && to == Some(source) {
            Some((&self.to, &self.from))
        } else {
            None
        }
    }
}

/// The aggregate `trace-links.yaml` document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceLinks {
    #[serde(default)]
    pub links: Vec<TraceLink>,
}
