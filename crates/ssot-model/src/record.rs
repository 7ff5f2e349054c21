//! Typed requirement records
//!
//! BV/CAP/BR/NFR files are loosely shaped YAML on disk. Once a document has
//! passed schema validation it is converted into one of these records and all
//! further processing works on the typed form. Unknown fields survive in
//! `extra` so that content diffs see everything the author wrote.

use crate::id::ArtifactKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Lifecycle status shared by requirement records
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Proposed,
    Approved,
    Implemented,
    Deprecated,
    Superseded,
}

impl Status {
    /// All status values in declaration order
    pub const ALL: [Status; 5] = [
        Status::Proposed,
        Status::Approved,
        Status::Implemented,
        Status::Deprecated,
        Status::Superseded,
    ];

    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Approved => "approved",
            Self::Implemented => "implemented",
            Self::Deprecated => "deprecated",
            Self::Superseded => "superseded",
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business rule severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Business value (BV-####)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessValue {
    pub id: String,
    pub title: String,
    pub owner: String,
    pub success_metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Domain-level trace lists embedded in a capability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainTrace {
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
}

/// `trace` block of a capability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityTrace {
    #[serde(default)]
    pub domain: DomainTrace,
}

/// Capability (CAP-####)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub id: String,
    pub title: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub trace: CapabilityTrace,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Capability {
    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[String] {
        &self.trace.domain.commands
    }

    #[inline]
    #[must_use]
    pub fn events(&self) -> &[String] {
        &self.trace.domain.events
    }

    #[inline]
    #[must_use]
    pub fn is_implemented(&self) -> bool {
        self.status == Status::Implemented
    }
}

/// Business rule (BR-####)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessRule {
    pub id: String,
    pub title: String,
    pub rule: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Non-functional requirement (NFR-####)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nfr {
    pub id: String,
    pub title: String,
    pub quality_attribute: String,
    pub statement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One governed requirement record, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Requirement {
    BusinessValue(BusinessValue),
    Capability(Capability),
    BusinessRule(BusinessRule),
    Nfr(Nfr),
}

impl Requirement {
    /// Convert a schema-checked document into the record for `kind`
    ///
    /// # Errors
    /// Returns error if the document does not fit the record shape or `kind`
    /// is not a requirement kind
    pub fn from_value(kind: ArtifactKind, value: Value) -> Result<Self, serde_json::Error> {
        use serde::de::Error as _;
        Ok(match kind {
            ArtifactKind::BusinessValue => Self::BusinessValue(serde_json::from_value(value)?),
            ArtifactKind::Capability => Self::Capability(serde_json::from_value(value)?),
            ArtifactKind::BusinessRule => Self::BusinessRule(serde_json::from_value(value)?),
            ArtifactKind::Nfr => Self::Nfr(serde_json::from_value(value)?),
            other => {
                return Err(serde_json::Error::custom(format!(
                    "{other} is not a requirement kind"
                )))
            }
        })
    }

    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::BusinessValue(_) => ArtifactKind::BusinessValue,
            Self::Capability(_) => ArtifactKind::Capability,
            Self::BusinessRule(_) => ArtifactKind::BusinessRule,
            Self::Nfr(_) => ArtifactKind::Nfr,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::BusinessValue(r) => &r.id,
            Self::Capability(r) => &r.id,
            Self::BusinessRule(r) => &r.id,
            Self::Nfr(r) => &r.id,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::BusinessValue(r) => &r.title,
            Self::Capability(r) => &r.title,
            Self::BusinessRule(r) => &r.title,
            Self::Nfr(r) => &r.title,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::BusinessValue(r) => r.status,
            Self::Capability(r) => Some(r.status),
            Self::BusinessRule(r) => r.status,
            Self::Nfr(r) => r.status,
        }
    }

    #[must_use]
    pub fn as_capability(&self) -> Option<&Capability> {
        match self {
            Self::Capability(cap) => Some(cap),
            _ => None,
        }
    }

    /// Serialized content with the `status` field removed
    ///
    /// # Errors
    /// Returns error if the record cannot be serialized
    pub fn non_status_fields(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let mut map = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        map.remove("status");
        Ok(map)
    }

    /// True when some field other than `status` differs from `prior`
    ///
    /// # Errors
    /// Returns error if either record cannot be serialized
    pub fn differs_beyond_status(&self, prior: &Requirement) -> Result<bool, serde_json::Error> {
        Ok(self.non_status_fields()? != prior.non_status_fields()?)
    }
}
