//! Delta records
//!
//! A [`Delta`] is the versioned change record through which governed
//! artifacts are amended. Its lifecycle is `draft → proposed → applied`;
//! transitions are checked for direction only, so `draft → applied` is
//! accepted while any backward move is rejected.

use crate::id::{ArtifactKind, DeltaId, IdError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Delta lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaStatus {
    Draft,
    Proposed,
    Applied,
}

impl DeltaStatus {
    #[inline]
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Proposed => 1,
            Self::Applied => 2,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Proposed => "proposed",
            Self::Applied => "applied",
        }
    }
}

impl Display for DeltaStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: DeltaStatus) -> Vec<DeltaStatus> {
    use DeltaStatus::{Applied, Draft, Proposed};
    match from {
        Draft => vec![Proposed, Applied],
        Proposed => vec![Applied],
        Applied => vec![],
    }
}

/// Validate a status transition
///
/// Staying in the same state is not a transition and is accepted.
///
/// # Errors
/// Returns error if `to` lies behind `from`
pub fn validate_transition(from: DeltaStatus, to: DeltaStatus) -> Result<(), DeltaError> {
    if from == to || allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(DeltaError::BackwardTransition { from, to })
    }
}

/// Kind of change a delta entry declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Add,
    Modify,
    Status,
    Deprecate,
    Docs,
}

/// One entry of `changes[]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaChange {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DeltaChange {
    #[must_use]
    pub fn new(change_type: ChangeType, target: impl Into<String>) -> Self {
        Self {
            change_type,
            target: target.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Kind of the target, when the target is a known identifier
    #[must_use]
    pub fn target_kind(&self) -> Option<ArtifactKind> {
        ArtifactKind::of(&self.target)
    }

    /// Targets a BV/CAP/BR/NFR
    #[must_use]
    pub fn is_governed(&self) -> bool {
        self.target_kind().is_some_and(ArtifactKind::is_governed)
    }

    /// Declared as a pure status move, by type or by its description
    ///
    /// Used only when no prior version of the target is available.
    #[must_use]
    pub fn declares_status_only(&self) -> bool {
        if self.change_type == ChangeType::Status {
            return true;
        }
        self.description.as_deref().is_some_and(|text| {
            let lower = text.to_lowercase();
            lower.contains("status") && (text.contains('→') || text.contains("->"))
        })
    }
}

/// Compatibility claim attached to a delta
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compatibility {
    pub claim: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// A change record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    pub id: String,
    pub title: String,
    pub status: DeltaStatus,
    #[serde(default)]
    pub changes: Vec<DeltaChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<Compatibility>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Delta {
    /// Parsed identifier
    ///
    /// # Errors
    /// Returns error if the id is malformed
    pub fn parsed_id(&self) -> Result<DeltaId, IdError> {
        self.id.parse()
    }

    /// Changes whose target is a governed artifact
    pub fn governed_changes(&self) -> impl Iterator<Item = &DeltaChange> {
        self.changes.iter().filter(|c| c.is_governed())
    }

    /// True when any change targets `id`
    #[must_use]
    pub fn targets(&self, id: &str) -> bool {
        self.changes.iter().any(|c| c.target == id)
    }

    /// Content that must stay frozen once the delta is applied
    ///
    /// Everything except the `supersededBy` annotation.
    ///
    /// # Errors
    /// Returns error if the delta cannot be serialized
    pub fn frozen_content(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let mut map = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        map.remove("supersededBy");
        Ok(map)
    }
}

/// Errors specific to delta records
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeltaError {
    /// Status moved backwards
    #[error("invalid transition {from} → {to}: deltas never move backwards")]
    BackwardTransition { from: DeltaStatus, to: DeltaStatus },

    /// Builder was missing a field
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Identifier is malformed
    #[error(transparent)]
    InvalidId(#[from] IdError),
}

/// Builder for constructing deltas
#[derive(Debug, Default)]
pub struct DeltaBuilder {
    id: Option<DeltaId>,
    title: Option<String>,
    status: Option<DeltaStatus>,
    changes: Vec<DeltaChange>,
    compatibility: Option<Compatibility>,
}

impl DeltaBuilder {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn id(mut self, id: DeltaId) -> Self {
        self.id = Some(id);
        self
    }

    #[inline]
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn status(mut self, status: DeltaStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[inline]
    #[must_use]
    pub fn change(mut self, change: DeltaChange) -> Self {
        self.changes.push(change);
        self
    }

    #[inline]
    #[must_use]
    pub fn compatibility(mut self, claim: impl Into<String>, rationale: Option<String>) -> Self {
        self.compatibility = Some(Compatibility {
            claim: claim.into(),
            rationale,
        });
        self
    }

    /// Build delta; status defaults to `draft`
    ///
    /// # Errors
    /// Returns error if the id or title is missing
    pub fn build(self) -> Result<Delta, DeltaError> {
        let id = self.id.ok_or(DeltaError::MissingField("id"))?;
        let title = self.title.ok_or(DeltaError::MissingField("title"))?;
        Ok(Delta {
            id: id.to_string(),
            title,
            status: self.status.unwrap_or(DeltaStatus::Draft),
            changes: self.changes,
            superseded_by: None,
            compatibility: self.compatibility,
            extra: BTreeMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn delta_id() -> DeltaId {
        DeltaId::new(NaiveDate::from_ymd_opt(2026, 2, 11).unwrap(), 1)
    }

    #[test]
    fn backward_transition_is_rejected() {
        let err = validate_transition(DeltaStatus::Applied, DeltaStatus::Draft).unwrap_err();
        assert!(matches!(err, DeltaError::BackwardTransition { .. }));
        assert!(validate_transition(DeltaStatus::Proposed, DeltaStatus::Draft).is_err());
    }

    #[test]
    fn skipping_proposed_is_accepted() {
        assert!(validate_transition(DeltaStatus::Draft, DeltaStatus::Applied).is_ok());
        assert!(validate_transition(DeltaStatus::Draft, DeltaStatus::Proposed).is_ok());
        assert!(validate_transition(DeltaStatus::Applied, DeltaStatus::Applied).is_ok());
    }

    #[test]
    fn status_only_detection() {
        let by_type = DeltaChange::new(ChangeType::Status, "BV-0001");
        assert!(by_type.declares_status_only());

        let by_text = DeltaChange::new(ChangeType::Modify, "BV-0001")
            .with_description("Status proposed → approved");
        assert!(by_text.declares_status_only());

        let content = DeltaChange::new(ChangeType::Modify, "CAP-0001")
            .with_description("Add refresh token flow");
        assert!(!content.declares_status_only());
    }

    #[test]
    fn governed_targets_only() {
        let delta = DeltaBuilder::new()
            .id(delta_id())
            .title("Auth")
            .change(DeltaChange::new(ChangeType::Add, "CAP-0001"))
            .change(DeltaChange::new(ChangeType::Docs, "docs/auth.md"))
            .build()
            .unwrap();
        let governed: Vec<_> = delta.governed_changes().map(|c| c.target.as_str()).collect();
        assert_eq!(governed, vec!["CAP-0001"]);
        assert_eq!(delta.status, DeltaStatus::Draft);
        assert_eq!(delta.id, "DELTA-2026-02-11-001");
    }

    #[test]
    fn builder_requires_title() {
        let result = DeltaBuilder::new().id(delta_id()).build();
        assert_eq!(result.unwrap_err(), DeltaError::MissingField("title"));
    }

    #[test]
    fn frozen_content_ignores_supersession() {
        let mut delta = DeltaBuilder::new()
            .id(delta_id())
            .title("Auth")
            .status(DeltaStatus::Applied)
            .build()
            .unwrap();
        let before = delta.frozen_content().unwrap();
        delta.superseded_by = Some("DELTA-2026-03-01-001".to_string());
        assert_eq!(delta.frozen_content().unwrap(), before);
    }
}
