//! Error types for the artifact store
//!
//! These are operational failures (unreadable root, broken schema override,
//! failed write). Problems with the content of the spec tree are reported as
//! [`ssot_model::Diagnostic`]s instead and never abort a load.

use crate::schema::SchemaKind;
use std::path::PathBuf;

/// Errors while turning file content into documents
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Syntax error in source file
    #[error("syntax error in {path}: {message}")]
    SyntaxError { path: String, message: String },

    /// File holds no document
    #[error("empty document: {0}")]
    Empty(String),

    /// More than one YAML document where one was expected
    #[error("{0} contains more than one YAML document")]
    MultipleDocuments(String),
}

impl ParseError {
    /// Create syntax error for path
    pub fn syntax_error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SyntaxError {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Errors building the schema catalog
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Schema document is not a valid JSON schema
    #[error("schema for {kind} does not compile: {message}")]
    Compile { kind: SchemaKind, message: String },

    /// Override file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Override file is not JSON
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors loading the spec tree
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Repository root does not exist
    #[error("repository root not found: {0}")]
    MissingRoot(PathBuf),

    /// IO error during directory walk or file read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Schema catalog failure
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl StoreError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors committing artifacts to disk
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// Staging or renaming failed; nothing from this set was kept
    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Target path escapes the repository root
    #[error("refusing to write outside the repository: {0}")]
    OutsideRoot(String),
}

impl WriteError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display() {
        let err = ParseError::syntax_error("specs/deltas/x.yaml", "bad indent");
        assert_eq!(err.to_string(), "syntax error in specs/deltas/x.yaml: bad indent");
    }

    #[test]
    fn store_error_from_schema() {
        let err: StoreError = SchemaError::Compile {
            kind: SchemaKind::Capability,
            message: "bad".to_string(),
        }
        .into();
        assert!(matches!(err, StoreError::Schema(_)));
        assert!(err.to_string().contains("cap"));
    }
}
