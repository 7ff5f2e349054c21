//! Error types for SSOT Core
//!
//! Operational failures only. Invariant violations travel as
//! [`Diagnostic`] values; the variants below wrap them where a pipeline has
//! to stop (a rejected transition, a refused plan, an exhausted gate).

use crate::gate::Attempt;
use ssot_model::{DeltaError, DeltaStatus, Diagnostic};
use ssot_store::{SchemaError, StoreError, WriteError};
use std::path::PathBuf;

/// Errors loading `ssot.toml`
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`crate::SsotConfig`]
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Delta Ledger errors
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// No delta with this id in the store
    #[error("unknown delta: {0}")]
    UnknownDelta(String),

    /// Status moved backwards
    #[error(transparent)]
    Transition(#[from] DeltaError),

    /// A guard condition of the transition does not hold
    #[error("transition of {id} to {to} blocked by {} violation(s)", diagnostics.len())]
    Guard {
        id: String,
        to: DeltaStatus,
        diagnostics: Vec<Diagnostic>,
    },
}

impl LedgerError {
    /// Diagnostics describing the failure
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        use ssot_model::ErrorCode;
        match self {
            Self::UnknownDelta(id) => vec![Diagnostic::new(
                ErrorCode::DanglingTarget,
                id.as_str(),
                format!("{id} does not exist"),
            )],
            Self::Transition(e) => vec![Diagnostic::new(ErrorCode::InvalidTransition, "delta", e.to_string())],
            Self::Guard { diagnostics, .. } => diagnostics.clone(),
        }
    }
}

/// The planner refused to emit an ordering
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("task plan rejected with {} planning error(s)", diagnostics.len())]
pub struct PlanError {
    pub diagnostics: Vec<Diagnostic>,
}

/// The decomposition collaborator failed to produce drafts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("decomposition failed: {message}")]
pub struct DecomposeError {
    pub message: String,
}

impl DecomposeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Validation Gate outcomes other than success
#[derive(Debug, Clone, thiserror::Error)]
pub enum GateError {
    /// A lifecycle or planning violation; not retried
    #[error("attempt {attempt} failed with {} fatal violation(s)", diagnostics.len())]
    Fatal {
        attempt: u32,
        diagnostics: Vec<Diagnostic>,
    },

    /// Every attempt produced violations
    #[error("validation gate exhausted after {attempts} attempt(s)")]
    Exhausted { attempts: u32, history: Vec<Attempt> },
}

impl GateError {
    /// Violations of the final attempt
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Fatal { diagnostics, .. } => diagnostics,
            Self::Exhausted { history, .. } => history.last().map_or(&[], |a| a.diagnostics.as_slice()),
        }
    }
}

/// Main error type for the core pipelines
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("gate error: {0}")]
    Gate(#[from] GateError),

    #[error("write error: {0}")]
    Write(#[from] WriteError),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// No delta with this id in the store
    #[error("unknown delta: {0}")]
    UnknownDelta(String),

    /// Impact resolution needs an applied delta
    #[error("delta {id} is {status}; impact is resolved for applied deltas only")]
    DeltaNotApplied { id: String, status: DeltaStatus },

    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error reports invariant violations rather than an
    /// operational failure
    #[inline]
    #[must_use]
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            Self::Ledger(_) | Self::Plan(_) | Self::Gate(_) | Self::DeltaNotApplied { .. } | Self::UnknownDelta(_)
        )
    }

    /// Diagnostics carried by a violation error
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        use ssot_model::ErrorCode;
        match self {
            Self::Ledger(e) => e.diagnostics(),
            Self::Plan(e) => e.diagnostics.clone(),
            Self::Gate(e) => e.diagnostics().to_vec(),
            Self::DeltaNotApplied { id, .. } => {
                vec![Diagnostic::new(ErrorCode::DeltaNotApplied, id.as_str(), self.to_string())]
            }
            Self::UnknownDelta(id) => {
                vec![Diagnostic::new(ErrorCode::DanglingTarget, id.as_str(), self.to_string())]
            }
            _ => Vec::new(),
        }
    }
}
