//! Configuration
//!
//! Read from an optional `ssot.toml` at the repository root. Every section
//! has a default, so an empty or absent file yields [`SsotConfig::default`].
//!
//! ```toml
//! [layout]
//! deltas = "specs/deltas"
//!
//! [gate]
//! max_attempts = 2
//!
//! [planner]
//! default_priority = "high"
//!
//! [quality_gates]
//! catalog = ["qg.perf.bench"]
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use ssot_model::{Priority, GATE_CATALOG};
use ssot_store::Layout;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// File name looked up at the repository root
pub const CONFIG_FILE: &str = "ssot.toml";

/// Hard upper bound on Validation Gate attempts
pub const MAX_ATTEMPTS: u32 = 3;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsotConfig {
    pub layout: Layout,
    pub gate: GateConfig,
    pub planner: PlannerConfig,
    pub quality_gates: QualityGateConfig,
}

impl SsotConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// With maximum gate attempts (clamped when read)
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.gate.max_attempts = attempts;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_default_priority(mut self, priority: Priority) -> Self {
        self.planner.default_priority = priority;
        self
    }

    /// With an additional quality gate id
    #[must_use]
    pub fn with_quality_gate(mut self, id: impl Into<String>) -> Self {
        self.quality_gates.catalog.push(id.into());
        self
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not valid TOML or has unexpected types
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from `path`
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded configuration");
        Self::from_toml_str(&text)
    }

    /// `root/ssot.toml` when present, defaults otherwise
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed
    pub fn discover(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Gate attempts, clamped to `1..=3`
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.gate.max_attempts.clamp(1, MAX_ATTEMPTS)
    }

    /// Fixed catalog plus configured extensions
    #[must_use]
    pub fn gate_catalog(&self) -> BTreeSet<String> {
        GATE_CATALOG
            .iter()
            .map(ToString::to_string)
            .chain(self.quality_gates.catalog.iter().cloned())
            .collect()
    }
}

/// `[gate]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub max_attempts: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

/// `[planner]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub default_priority: Priority,
}

/// `[quality_gates]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityGateConfig {
    /// Gate ids accepted in addition to the fixed catalog
    pub catalog: Vec<String>,
}
