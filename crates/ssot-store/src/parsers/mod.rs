//! Parsers for the two on-disk formats
//!
//! - YAML records via serde_yaml, converted to JSON values for schema checks
//! - Markdown command/event specs and middleware specs via pulldown-cmark

use crate::error::ParseError;
use std::path::Path;

mod markdown;
mod yaml;

pub use markdown::{parse_middleware_metadata, AnchorSite, MarkdownDocument, MarkdownParser};
pub use yaml::YamlParser;

/// Parser trait for converting file content into documents
pub trait SourceParser {
    /// The document type this parser produces
    type Output;

    /// Parse content read from `path` (used only for error reporting)
    ///
    /// # Errors
    /// Returns error if the content is not a valid document
    fn parse(&self, path: &str, content: &str) -> Result<Self::Output, ParseError>;

    /// Supported file extensions (without dot)
    fn extensions(&self) -> &[&str];

    /// Check if this parser can handle the given path
    fn can_parse(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions().contains(&ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_parse_by_extension() {
        assert!(YamlParser.can_parse(Path::new("specs/deltas/a.yaml")));
        assert!(YamlParser.can_parse(Path::new("specs/deltas/a.yml")));
        assert!(!YamlParser.can_parse(Path::new("specs/deltas/README.md")));
        assert!(MarkdownParser.can_parse(Path::new("specs/domain/commands.md")));
        assert!(!MarkdownParser.can_parse(Path::new("specs/domain")));
    }
}
