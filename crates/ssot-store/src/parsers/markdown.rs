//! Markdown parser for domain and middleware specs
//!
//! Uses pulldown-cmark to locate anchor tokens. Only real HTML events count,
//! so an anchor quoted inside a code block never defines a command or event.
//! Section fields are read line by line from the text between two anchors.

use crate::error::ParseError;
use crate::parsers::SourceParser;
use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Parser as MdParser};
use regex::Regex;
use serde::{Deserialize, Serialize};
use ssot_model::{
    AnchorRef, DomainSpec, ImplementationRef, MiddlewareCategory, MiddlewareMetadata,
    PayloadField,
};

static ANCHOR_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<a\s+id="((?:CMD|EVT)-\d{4})"\s*>"#).expect("valid anchor regex")
});
static HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#{1,6}\s+(?:CMD|EVT)-\d{4}\s*:\s*(.+?)\s*$").expect("valid heading regex")
});
static FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-*]\s+\*\*([A-Za-z ]+?)\*\*\s*:?\s*(.*?)\s*$").expect("valid field regex")
});
static NESTED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s{2,}[-*]\s+(.+?)\s*$").expect("valid nested item regex"));
static PAYLOAD_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^`([^`]+)`\s*\(([^)]+)\)\s*(?:(?:—|–|-{1,2})\s*(.*))?$")
        .expect("valid payload regex")
});
static MW_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*Middleware ID:\*\*\s*`(mw\.[A-Za-z0-9_]+)`").expect("valid middleware id regex")
});
static MW_CATEGORY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\*\*Category:\*\*\s*`?(mandatory|optional)`?").expect("valid category regex")
});
static MW_POSITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*Pipeline Position:\*\*\s*`?(\d+)`?").expect("valid position regex")
});
static MW_IMPL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*Implementation Ref:\*\*\s*`([^`:]+?)\s*::\s*([^`]+?)`")
        .expect("valid implementation regex")
});

/// Position of one anchor token in the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorSite {
    pub id: String,
    /// Byte offset of the `<a` token
    pub offset: usize,
}

/// Parsed markdown file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownDocument {
    /// Path relative to the repository root
    pub path: String,
    pub source: String,
    /// Anchors in source order
    pub anchors: Vec<AnchorSite>,
}

impl MarkdownDocument {
    /// Whether the file declares `<a id="{anchor}"></a>`
    #[must_use]
    pub fn has_anchor(&self, anchor: &str) -> bool {
        self.anchors.iter().any(|a| a.id == anchor)
    }

    /// Text between `anchor` and the next anchor (or end of file)
    #[must_use]
    pub fn section(&self, anchor: &str) -> Option<&str> {
        let index = self.anchors.iter().position(|a| a.id == anchor)?;
        let start = self.anchors[index].offset;
        let end = self
            .anchors
            .get(index + 1)
            .map_or(self.source.len(), |next| next.offset);
        self.source.get(start..end)
    }

    /// Detail records for every anchored section
    #[must_use]
    pub fn domain_specs(&self) -> Vec<DomainSpec> {
        self.anchors
            .iter()
            .filter_map(|site| {
                let reference = AnchorRef::new(&self.path, &site.id).ok()?;
                let text = self.section(&site.id)?;
                Some(parse_section(reference, text))
            })
            .collect()
    }

    /// Append a rendered section and re-index anchors
    pub fn append_section(&mut self, spec: &DomainSpec) {
        if !self.source.is_empty() && !self.source.ends_with("\n\n") {
            if !self.source.ends_with('\n') {
                self.source.push('\n');
            }
            self.source.push('\n');
        }
        self.source.push_str(&spec.to_markdown());
        self.anchors = scan_anchors(&self.source);
    }
}

/// Markdown parser
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownParser;

impl MarkdownParser {
    /// Create new markdown parser
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SourceParser for MarkdownParser {
    type Output = MarkdownDocument;

    fn parse(&self, path: &str, content: &str) -> Result<MarkdownDocument, ParseError> {
        Ok(MarkdownDocument {
            path: path.to_string(),
            source: content.to_string(),
            anchors: scan_anchors(content),
        })
    }

    fn extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }
}

/// Locate exact `<a id="CMD-####"></a>` tokens outside code
fn scan_anchors(source: &str) -> Vec<AnchorSite> {
    let mut anchors = Vec::new();
    for (event, range) in MdParser::new(source).into_offset_iter() {
        let html = match event {
            Event::Html(html) | Event::InlineHtml(html) => html,
            _ => continue,
        };
        let Some(slice) = source.get(range.clone()) else {
            continue;
        };
        if !html.contains("<a") {
            continue;
        }
        for caps in ANCHOR_OPEN.captures_iter(slice) {
            let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let offset = range.start + whole.start();
            let token = format!("<a id=\"{}\"></a>", id.as_str());
            let exact = source.get(offset..).is_some_and(|rest| rest.starts_with(&token));
            if exact && !anchors.iter().any(|a: &AnchorSite| a.offset == offset) {
                anchors.push(AnchorSite {
                    id: id.as_str().to_string(),
                    offset,
                });
            }
        }
    }
    anchors.sort_by_key(|a| a.offset);
    anchors
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NestedList {
    Payload,
    Invariants,
}

fn parse_section(reference: AnchorRef, text: &str) -> DomainSpec {
    let name = text
        .lines()
        .find_map(|line| HEADING.captures(line.trim_end()).map(|c| c[1].to_string()))
        .unwrap_or_else(|| reference.anchor().to_string());
    let mut spec = DomainSpec::new(reference, name);
    let mut nested: Option<NestedList> = None;

    for line in text.lines() {
        if let Some(list) = nested {
            if let Some(item) = NESTED_ITEM.captures(line) {
                let item = item[1].to_string();
                match list {
                    NestedList::Invariants => spec.invariants.push(item),
                    NestedList::Payload => {
                        if let Some(field) = parse_payload_item(&item) {
                            spec.payload.push(field);
                        }
                    }
                }
                continue;
            }
            nested = None;
        }

        let Some(caps) = FIELD.captures(line) else {
            continue;
        };
        let label = caps[1].trim().to_lowercase();
        let value = caps[2].trim();
        match label.as_str() {
            "intent" | "fact" => spec.summary = non_empty(value),
            "domain" => spec.domain = non_empty(strip_ticks(value)),
            "aggregate" => spec.aggregate = non_empty(strip_ticks(value)),
            "emits" => spec.emits = split_list(value),
            "triggered by" => spec.triggered_by = split_list(value),
            "consumers" => spec.consumers = split_list(value),
            "error codes" => spec.error_codes = split_list(value),
            "invariants" => {
                spec.invariants.extend(split_list(value));
                nested = Some(NestedList::Invariants);
            }
            "payload" => nested = Some(NestedList::Payload),
            _ => {}
        }
    }
    spec
}

fn parse_payload_item(item: &str) -> Option<PayloadField> {
    let caps = PAYLOAD_ITEM.captures(item)?;
    Some(PayloadField {
        name: caps[1].to_string(),
        field_type: caps[2].trim().to_string(),
        description: caps.get(3).map_or(String::new(), |m| m.as_str().trim().to_string()),
    })
}

fn strip_ticks(value: &str) -> &str {
    value.trim().trim_matches('`')
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| strip_ticks(item).to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Read `**Middleware ID:**`-style metadata lines from a middleware spec
#[must_use]
pub fn parse_middleware_metadata(source: &str) -> MiddlewareMetadata {
    MiddlewareMetadata {
        id: MW_ID.captures(source).map(|c| c[1].to_string()),
        category: MW_CATEGORY.captures(source).and_then(|c| {
            match c[1].to_lowercase().as_str() {
                "mandatory" => Some(MiddlewareCategory::Mandatory),
                "optional" => Some(MiddlewareCategory::Optional),
                _ => None,
            }
        }),
        position: MW_POSITION.captures(source).and_then(|c| c[1].parse().ok()),
        implementation: MW_IMPL.captures(source).map(|c| ImplementationRef {
            repo_id: c[1].trim().to_string(),
            entry: c[2].trim().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const COMMANDS: &str = r#"# Commands

<a id="CMD-0001"></a>
### CMD-0001: RegisterUser

- **Intent**: Create an account for a new user
- **Domain**: DOM-0001
- **Aggregate**: `User`
- **Payload**:
  - `email` (string) — login address
  - `password` (string)
- **Invariants**:
  - email is unique
- **Emits**: EVT-0001
- **Error codes**: `USER_EXISTS`, `WEAK_PASSWORD`

<a id="CMD-0002"></a>
### CMD-0002: Login

- **Intent**: Authenticate
- **Domain**: DOM-0001

```html
<a id="CMD-0009"></a>
```
"#;

    fn parse(source: &str) -> MarkdownDocument {
        MarkdownParser.parse("specs/domain/commands.md", source).unwrap()
    }

    #[test]
    fn finds_anchors_outside_code() {
        let doc = parse(COMMANDS);
        let ids: Vec<_> = doc.anchors.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["CMD-0001", "CMD-0002"]);
        assert!(doc.has_anchor("CMD-0002"));
        assert!(!doc.has_anchor("CMD-0009"));
    }

    #[test]
    fn anchor_offsets_point_at_token() {
        let doc = parse(COMMANDS);
        for site in &doc.anchors {
            let token = format!("<a id=\"{}\"></a>", site.id);
            assert!(doc.source[site.offset..].starts_with(&token));
        }
    }

    #[test]
    fn loose_anchor_syntax_is_not_an_anchor() {
        let doc = parse("<a id=\"CMD-0003\">\n### CMD-0003: Broken\n");
        assert!(doc.anchors.is_empty());
    }

    #[test]
    fn extracts_section_detail() {
        let doc = parse(COMMANDS);
        let specs = doc.domain_specs();
        assert_eq!(specs.len(), 2);

        let register = &specs[0];
        assert_eq!(register.name, "RegisterUser");
        assert_eq!(register.summary.as_deref(), Some("Create an account for a new user"));
        assert_eq!(register.domain.as_deref(), Some("DOM-0001"));
        assert_eq!(register.aggregate.as_deref(), Some("User"));
        assert_eq!(register.emits, vec!["EVT-0001"]);
        assert_eq!(register.error_codes, vec!["USER_EXISTS", "WEAK_PASSWORD"]);
        assert_eq!(register.invariants, vec!["email is unique"]);
        assert_eq!(register.payload.len(), 2);
        assert_eq!(register.payload[0].name, "email");
        assert_eq!(register.payload[0].field_type, "string");
        assert_eq!(register.payload[0].description, "login address");
        assert_eq!(register.payload[1].description, "");

        assert_eq!(specs[1].name, "Login");
        assert!(specs[1].payload.is_empty());
    }

    #[test]
    fn appended_section_is_indexed() {
        let mut doc = parse(COMMANDS);
        let reference = AnchorRef::new("specs/domain/commands.md", "CMD-0003").unwrap();
        let mut spec = DomainSpec::new(reference, "Logout");
        spec.summary = Some("End a session".to_string());
        doc.append_section(&spec);

        assert!(doc.has_anchor("CMD-0003"));
        let specs = doc.domain_specs();
        let logout = specs.iter().find(|s| s.name == "Logout").unwrap();
        assert_eq!(logout.summary.as_deref(), Some("End a session"));
    }

    #[test]
    fn middleware_metadata() {
        let source = "# Trace\n\n**Middleware ID:** `mw.trace`\n**Category:** mandatory\n**Pipeline Position:** 20\n**Implementation Ref:** `platform :: entry.middleware.trace`\n";
        let meta = parse_middleware_metadata(source);
        assert_eq!(meta.id.as_deref(), Some("mw.trace"));
        assert_eq!(meta.category, Some(MiddlewareCategory::Mandatory));
        assert_eq!(meta.position, Some(20));
        let implementation = meta.implementation.unwrap();
        assert_eq!(implementation.repo_id, "platform");
        assert_eq!(implementation.entry, "entry.middleware.trace");

        assert_eq!(parse_middleware_metadata("# Empty"), MiddlewareMetadata::default());
    }
}
