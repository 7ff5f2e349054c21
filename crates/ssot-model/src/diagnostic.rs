//! Invariant violations
//!
//! Every check in the workspace reports through [`Diagnostic`]. The four
//! [`ErrorKind`]s are never collapsed: CI and the retry loop branch on them.
//! Structural and referential problems are usually drafting mistakes and are
//! retried; lifecycle and planning problems are fatal.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Structural,
    Referential,
    Lifecycle,
    Planning,
}

impl ErrorKind {
    /// Whether the validation gate feeds this kind back for repair
    #[inline]
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Structural | Self::Referential)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Referential => "referential",
            Self::Lifecycle => "lifecycle",
            Self::Planning => "planning",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable reason code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    // Structural
    MalformedDocument,
    MissingField,
    WrongType,
    PatternMismatch,
    UnknownEnumValue,
    SchemaViolation,
    IdMismatch,
    DuplicateId,
    ExecutableCommand,
    CollaboratorFailure,
    // Referential
    DanglingEdge,
    EdgeKindMismatch,
    MissingRealizes,
    MissingSatisfies,
    EmptyTraceList,
    UnresolvedAnchor,
    OrphanRegistryEntry,
    MissingRegistryRecord,
    UnknownRepository,
    MalformedEntrypoint,
    MissingMiddlewareSpec,
    MetadataMismatch,
    DuplicatePosition,
    NonIncreasingPosition,
    UnknownQualityGate,
    // Lifecycle
    InvalidTransition,
    DanglingTarget,
    AppliedDeltaMutated,
    RemovedArtifact,
    UncoveredChange,
    ImmutablePosition,
    TransitionGuard,
    DeltaNotApplied,
    // Planning
    DependencyCycle,
    UnknownDependency,
    DuplicateTaskKey,
}

impl ErrorCode {
    /// Taxonomy bucket of this code
    #[must_use]
    pub fn kind(self) -> ErrorKind {
        use ErrorCode::{
            AppliedDeltaMutated, CollaboratorFailure, DanglingEdge, DanglingTarget,
            DeltaNotApplied, DependencyCycle, DuplicateId, DuplicatePosition, DuplicateTaskKey,
            EdgeKindMismatch, EmptyTraceList, ExecutableCommand, IdMismatch, ImmutablePosition,
            InvalidTransition, MalformedDocument, MalformedEntrypoint, MetadataMismatch,
            MissingField, MissingMiddlewareSpec, MissingRealizes, MissingRegistryRecord,
            MissingSatisfies, NonIncreasingPosition, OrphanRegistryEntry, PatternMismatch,
            RemovedArtifact, SchemaViolation, TransitionGuard, UncoveredChange,
            UnknownDependency, UnknownEnumValue, UnknownQualityGate, UnknownRepository,
            UnresolvedAnchor, WrongType,
        };
        match self {
            MalformedDocument | MissingField | WrongType | PatternMismatch | UnknownEnumValue
            | SchemaViolation | IdMismatch | DuplicateId | ExecutableCommand
            | CollaboratorFailure => ErrorKind::Structural,
            DanglingEdge | EdgeKindMismatch | MissingRealizes | MissingSatisfies
            | EmptyTraceList | UnresolvedAnchor | OrphanRegistryEntry | MissingRegistryRecord
            | UnknownRepository | MalformedEntrypoint | MissingMiddlewareSpec
            | MetadataMismatch | DuplicatePosition | NonIncreasingPosition
            | UnknownQualityGate => ErrorKind::Referential,
            InvalidTransition | DanglingTarget | AppliedDeltaMutated | RemovedArtifact
            | UncoveredChange | ImmutablePosition | TransitionGuard | DeltaNotApplied => {
                ErrorKind::Lifecycle
            }
            DependencyCycle | UnknownDependency | DuplicateTaskKey => ErrorKind::Planning,
        }
    }

    /// Kebab-case wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedDocument => "malformed-document",
            Self::MissingField => "missing-field",
            Self::WrongType => "wrong-type",
            Self::PatternMismatch => "pattern-mismatch",
            Self::UnknownEnumValue => "unknown-enum-value",
            Self::SchemaViolation => "schema-violation",
            Self::IdMismatch => "id-mismatch",
            Self::DuplicateId => "duplicate-id",
            Self::ExecutableCommand => "executable-command",
            Self::CollaboratorFailure => "collaborator-failure",
            Self::DanglingEdge => "dangling-edge",
            Self::EdgeKindMismatch => "edge-kind-mismatch",
            Self::MissingRealizes => "missing-realizes",
            Self::MissingSatisfies => "missing-satisfies",
            Self::EmptyTraceList => "empty-trace-list",
            Self::UnresolvedAnchor => "unresolved-anchor",
            Self::OrphanRegistryEntry => "orphan-registry-entry",
            Self::MissingRegistryRecord => "missing-registry-record",
            Self::UnknownRepository => "unknown-repository",
            Self::MalformedEntrypoint => "malformed-entrypoint",
            Self::MissingMiddlewareSpec => "missing-middleware-spec",
            Self::MetadataMismatch => "metadata-mismatch",
            Self::DuplicatePosition => "duplicate-position",
            Self::NonIncreasingPosition => "non-increasing-position",
            Self::UnknownQualityGate => "unknown-quality-gate",
            Self::InvalidTransition => "invalid-transition",
            Self::DanglingTarget => "dangling-target",
            Self::AppliedDeltaMutated => "applied-delta-mutated",
            Self::RemovedArtifact => "removed-artifact",
            Self::UncoveredChange => "uncovered-change",
            Self::ImmutablePosition => "immutable-position",
            Self::TransitionGuard => "transition-guard",
            Self::DeltaNotApplied => "delta-not-applied",
            Self::DependencyCycle => "dependency-cycle",
            Self::UnknownDependency => "unknown-dependency",
            Self::DuplicateTaskKey => "duplicate-task-key",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported violation
///
/// Field order is the report order: diagnostics sort by subject, then code,
/// then pointer, then message.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Artifact id, or the relative path when no id is known
    pub subject: String,
    pub code: ErrorCode,
    /// JSON pointer into the record, when the problem has a location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    pub message: String,
    pub kind: ErrorKind,
}

impl Diagnostic {
    #[must_use]
    pub fn new(code: ErrorCode, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            code,
            pointer: None,
            message: message.into(),
            kind: code.kind(),
        }
    }

    /// Attach a JSON pointer; empty pointers are dropped
    #[must_use]
    pub fn at(mut self, pointer: impl Into<String>) -> Self {
        let pointer = pointer.into();
        self.pointer = (!pointer.is_empty()).then_some(pointer);
        self
    }

    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.subject)?;
        if let Some(pointer) = &self.pointer {
            write!(f, " {pointer}")?;
        }
        write!(f, ": {} ({})", self.message, self.code)
    }
}

/// Sort lexicographically and drop exact duplicates
pub fn normalize(diagnostics: &mut Vec<Diagnostic>) {
    diagnostics.sort();
    diagnostics.dedup();
}

/// True when any diagnostic is fatal for the retry loop
#[must_use]
pub fn has_fatal(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| !d.is_retryable())
}
