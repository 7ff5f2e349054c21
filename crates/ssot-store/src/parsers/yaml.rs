//! YAML record parser
//!
//! Every governed record is a single YAML document. Documents are converted
//! into `serde_json::Value` right away because schema validation and the
//! typed records both work on JSON values.

use crate::error::ParseError;
use crate::parsers::SourceParser;
use serde::Deserialize;
use serde_json::Value;

/// YAML parser
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlParser;

impl YamlParser {
    /// Create new YAML parser
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SourceParser for YamlParser {
    type Output = Value;

    fn parse(&self, path: &str, content: &str) -> Result<Value, ParseError> {
        let mut documents = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(content) {
            let value = serde_yaml::Value::deserialize(doc)
                .map_err(|e| ParseError::syntax_error(path, e.to_string()))?;
            if !matches!(value, serde_yaml::Value::Null) {
                documents.push(value);
            }
        }

        if documents.len() > 1 {
            return Err(ParseError::MultipleDocuments(path.to_string()));
        }
        let document = documents
            .pop()
            .ok_or_else(|| ParseError::Empty(path.to_string()))?;

        // Non-string mapping keys have no JSON counterpart
        serde_json::to_value(&document).map_err(|e| ParseError::syntax_error(path, e.to_string()))
    }

    fn extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }
}
