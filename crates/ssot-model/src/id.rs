//! Identifiers for governed artifacts
//!
//! Every node kind carries a fixed identifier pattern. [`ArtifactKind::of`] is
//! the single place where a raw string is classified as a graph node, so the
//! store, the graph and the ledger all agree on what an id means.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

static BV_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^BV-\d{4}$").expect("valid BV regex"));
static CAP_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^CAP-\d{4}$").expect("valid CAP regex"));
static BR_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^BR-\d{4}$").expect("valid BR regex"));
static NFR_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^NFR-\d{4}$").expect("valid NFR regex"));
static DOM_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^DOM-\d{4}$").expect("valid DOM regex"));
static MW_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^mw\.[A-Za-z0-9_]+$").expect("valid middleware regex"));
static TASK_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^TASK-\d{3,}$").expect("valid task regex"));
static DELTA_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^DELTA-(\d{4}-\d{2}-\d{2})-(\d{3})$").expect("valid delta regex")
});
static ANCHOR_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^#\s]+\.md)#((CMD|EVT)-\d{4})$").expect("valid anchor reference regex")
});
static ANCHOR_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(CMD|EVT)-\d{4}$").expect("valid anchor id regex"));

/// Node kinds of the traceability graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    BusinessValue,
    Capability,
    BusinessRule,
    Nfr,
    Command,
    Event,
    Domain,
    Middleware,
    Delta,
    Task,
}

impl ArtifactKind {
    /// Kinds that are governed: every change to them must be carried by a delta.
    pub const GOVERNED: [ArtifactKind; 4] = [
        ArtifactKind::BusinessValue,
        ArtifactKind::Capability,
        ArtifactKind::BusinessRule,
        ArtifactKind::Nfr,
    ];

    /// Short prefix used in identifiers and reports
    #[inline]
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::BusinessValue => "BV",
            Self::Capability => "CAP",
            Self::BusinessRule => "BR",
            Self::Nfr => "NFR",
            Self::Command => "CMD",
            Self::Event => "EVT",
            Self::Domain => "DOM",
            Self::Middleware => "mw",
            Self::Delta => "DELTA",
            Self::Task => "TASK",
        }
    }

    /// Regex source for the identifier pattern, as used in JSON schemas
    #[must_use]
    pub fn pattern(self) -> &'static str {
        match self {
            Self::BusinessValue => BV_ID.as_str(),
            Self::Capability => CAP_ID.as_str(),
            Self::BusinessRule => BR_ID.as_str(),
            Self::Nfr => NFR_ID.as_str(),
            Self::Command | Self::Event => ANCHOR_REF.as_str(),
            Self::Domain => DOM_ID.as_str(),
            Self::Middleware => MW_ID.as_str(),
            Self::Delta => DELTA_ID.as_str(),
            Self::Task => TASK_ID.as_str(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_governed(self) -> bool {
        Self::GOVERNED.contains(&self)
    }

    /// Check whether `id` is well-formed for this kind
    #[must_use]
    pub fn matches(self, id: &str) -> bool {
        match self {
            Self::Command | Self::Event => AnchorRef::from_str(id)
                .map(|r| r.kind() == self)
                .unwrap_or(false),
            Self::Delta => DeltaId::from_str(id).is_ok(),
            _ => self.is_simple_match(id),
        }
    }

    fn is_simple_match(self, id: &str) -> bool {
        match self {
            Self::BusinessValue => BV_ID.is_match(id),
            Self::Capability => CAP_ID.is_match(id),
            Self::BusinessRule => BR_ID.is_match(id),
            Self::Nfr => NFR_ID.is_match(id),
            Self::Domain => DOM_ID.is_match(id),
            Self::Middleware => MW_ID.is_match(id),
            Self::Task => TASK_ID.is_match(id),
            Self::Command | Self::Event | Self::Delta => false,
        }
    }

    /// Classify an identifier by its pattern
    #[must_use]
    pub fn of(id: &str) -> Option<Self> {
        if BV_ID.is_match(id) {
            Some(Self::BusinessValue)
        } else if CAP_ID.is_match(id) {
            Some(Self::Capability)
        } else if BR_ID.is_match(id) {
            Some(Self::BusinessRule)
        } else if NFR_ID.is_match(id) {
            Some(Self::Nfr)
        } else if DOM_ID.is_match(id) {
            Some(Self::Domain)
        } else if MW_ID.is_match(id) {
            Some(Self::Middleware)
        } else if TASK_ID.is_match(id) {
            Some(Self::Task)
        } else if DeltaId::from_str(id).is_ok() {
            Some(Self::Delta)
        } else {
            AnchorRef::from_str(id).ok().map(|r| r.kind())
        }
    }
}

impl Display for ArtifactKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Reference to an anchored command or event section: `specs/domain/commands.md#CMD-0001`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AnchorRef {
    file: String,
    anchor: String,
}

impl AnchorRef {
    /// Build a reference from its parts
    ///
    /// # Errors
    /// Returns error if the anchor is not a `CMD-####` or `EVT-####` id
    pub fn new(file: impl Into<String>, anchor: impl Into<String>) -> Result<Self, IdError> {
        let file = file.into();
        let anchor = anchor.into();
        if !ANCHOR_ID.is_match(&anchor) || !file.ends_with(".md") {
            return Err(IdError::Malformed {
                kind: ArtifactKind::Command,
                value: format!("{file}#{anchor}"),
            });
        }
        Ok(Self { file, anchor })
    }

    /// Markdown file holding the anchor
    #[inline]
    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Anchor id (`CMD-0001`)
    #[inline]
    #[must_use]
    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    /// Command or event, decided by the anchor prefix
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        if self.anchor.starts_with("EVT-") {
            ArtifactKind::Event
        } else {
            ArtifactKind::Command
        }
    }

    /// Exact token that must appear in the target file
    #[must_use]
    pub fn token(&self) -> String {
        format!("<a id=\"{}\"></a>", self.anchor)
    }
}

impl Display for AnchorRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file, self.anchor)
    }
}

impl FromStr for AnchorRef {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = ANCHOR_REF.captures(s).ok_or_else(|| IdError::Malformed {
            kind: ArtifactKind::Command,
            value: s.to_string(),
        })?;
        Ok(Self {
            file: caps[1].to_string(),
            anchor: caps[2].to_string(),
        })
    }
}

impl TryFrom<String> for AnchorRef {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AnchorRef> for String {
    fn from(value: AnchorRef) -> Self {
        value.to_string()
    }
}

/// Highest sequence a delta id can render in three digits
const MAX_DELTA_SEQ: u32 = 999;

/// Highest sequence a requirement id can render in four digits
const MAX_REQUIREMENT_SEQ: u32 = 9999;

/// Delta identifier: `DELTA-YYYY-MM-DD-NNN`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeltaId {
    date: NaiveDate,
    seq: u32,
}

impl DeltaId {
    #[inline]
    #[must_use]
    pub fn new(date: NaiveDate, seq: u32) -> Self {
        Self { date, seq }
    }

    #[inline]
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[inline]
    #[must_use]
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// Next free id for `date`, one past the highest sequence already used that day
    ///
    /// # Errors
    /// Returns error if sequence 999 is already taken for `date`
    pub fn next_for<'a>(date: NaiveDate, existing: impl IntoIterator<Item = &'a str>) -> Result<Self, IdError> {
        let max = existing
            .into_iter()
            .filter_map(|raw| raw.parse::<DeltaId>().ok())
            .filter(|id| id.date == date)
            .map(|id| id.seq)
            .max()
            .unwrap_or(0);
        if max >= MAX_DELTA_SEQ {
            return Err(IdError::SequenceExhausted {
                kind: ArtifactKind::Delta,
                scope: format!("DELTA-{}", date.format("%Y-%m-%d")),
            });
        }
        Ok(Self::new(date, max + 1))
    }
}

impl Display for DeltaId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "DELTA-{}-{:03}", self.date.format("%Y-%m-%d"), self.seq)
    }
}

impl FromStr for DeltaId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = DELTA_ID.captures(s).ok_or_else(|| IdError::Malformed {
            kind: ArtifactKind::Delta,
            value: s.to_string(),
        })?;
        let date = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d")
            .map_err(|_| IdError::InvalidDate(s.to_string()))?;
        let seq = caps[2]
            .parse()
            .map_err(|_| IdError::Malformed {
                kind: ArtifactKind::Delta,
                value: s.to_string(),
            })?;
        Ok(Self { date, seq })
    }
}

/// Sequential task number rendered as `TASK-001`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u32);

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "TASK-{:03}", self.0)
    }
}

/// Next requirement id of `kind` given the ids already taken: max + 1, zero padded
///
/// # Errors
/// Returns error if `{prefix}-9999` is already taken
pub fn next_requirement_id<'a>(kind: ArtifactKind, taken: impl IntoIterator<Item = &'a str>) -> Result<String, IdError> {
    let prefix = kind.prefix();
    let max = taken
        .into_iter()
        .filter(|id| ArtifactKind::of(id) == Some(kind))
        .filter_map(|id| id.rsplit('-').next()?.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    if max >= MAX_REQUIREMENT_SEQ {
        return Err(IdError::SequenceExhausted {
            kind,
            scope: prefix.to_string(),
        });
    }
    Ok(format!("{prefix}-{:04}", max + 1))
}

/// Identifier errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// Value does not match the kind's pattern
    #[error("malformed {kind} id: '{value}'")]
    Malformed { kind: ArtifactKind, value: String },

    /// Delta id with an impossible calendar date
    #[error("delta id has an invalid date: '{0}'")]
    InvalidDate(String),

    /// Every sequence number the id pattern can render is taken
    #[error("no free {kind} id left under '{scope}'")]
    SequenceExhausted { kind: ArtifactKind, scope: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_requirement_ids() {
        assert_eq!(ArtifactKind::of("BV-0001"), Some(ArtifactKind::BusinessValue));
        assert_eq!(ArtifactKind::of("CAP-0042"), Some(ArtifactKind::Capability));
        assert_eq!(ArtifactKind::of("BR-0010"), Some(ArtifactKind::BusinessRule));
        assert_eq!(ArtifactKind::of("NFR-0003"), Some(ArtifactKind::Nfr));
        assert_eq!(ArtifactKind::of("DOM-0001"), Some(ArtifactKind::Domain));
        assert_eq!(ArtifactKind::of("mw.auth"), Some(ArtifactKind::Middleware));
        assert_eq!(ArtifactKind::of("CAP-42"), None);
        assert_eq!(ArtifactKind::of("docs/readme.md"), None);
    }

    #[test]
    fn classifies_anchor_refs() {
        assert_eq!(
            ArtifactKind::of("specs/domain/commands.md#CMD-0001"),
            Some(ArtifactKind::Command)
        );
        assert_eq!(
            ArtifactKind::of("specs/domain/events.md#EVT-0002"),
            Some(ArtifactKind::Event)
        );
        assert_eq!(ArtifactKind::of("specs/domain/events.yaml#EVT-0002"), None);
    }

    #[test]
    fn anchor_ref_round_trip() {
        let r: AnchorRef = "specs/domain/commands.md#CMD-0007".parse().unwrap();
        assert_eq!(r.file(), "specs/domain/commands.md");
        assert_eq!(r.anchor(), "CMD-0007");
        assert_eq!(r.token(), "<a id=\"CMD-0007\"></a>");
        assert_eq!(r.to_string(), "specs/domain/commands.md#CMD-0007");
    }

    #[test]
    fn delta_id_rejects_impossible_dates() {
        assert!("DELTA-2026-02-11-001".parse::<DeltaId>().is_ok());
        assert!(matches!(
            "DELTA-2026-02-31-001".parse::<DeltaId>(),
            Err(IdError::InvalidDate(_))
        ));
        assert!("DELTA-2026-2-11-1".parse::<DeltaId>().is_err());
    }

    #[test]
    fn delta_id_next_for_date() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 11).unwrap();
        let existing = ["DELTA-2026-02-11-001", "DELTA-2026-02-11-004", "DELTA-2026-02-10-009"];
        let next = DeltaId::next_for(date, existing).unwrap();
        assert_eq!(next.to_string(), "DELTA-2026-02-11-005");

        let fresh = DeltaId::next_for(date, std::iter::empty()).unwrap();
        assert_eq!(fresh.to_string(), "DELTA-2026-02-11-001");
    }

    #[test]
    fn delta_id_next_for_full_day_is_an_error() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 11).unwrap();
        let last = DeltaId::next_for(date, ["DELTA-2026-02-11-998"]).unwrap();
        assert_eq!(last.to_string(), "DELTA-2026-02-11-999");

        let err = DeltaId::next_for(date, ["DELTA-2026-02-11-999"]).unwrap_err();
        assert_eq!(
            err,
            IdError::SequenceExhausted {
                kind: ArtifactKind::Delta,
                scope: "DELTA-2026-02-11".to_string(),
            }
        );
        // other days are unaffected
        let next_day = NaiveDate::from_ymd_opt(2026, 2, 12).unwrap();
        assert!(DeltaId::next_for(next_day, ["DELTA-2026-02-11-999"]).is_ok());
    }

    #[test]
    fn next_requirement_id_pads() {
        let taken = ["CAP-0001", "CAP-0009", "BR-0100"];
        assert_eq!(next_requirement_id(ArtifactKind::Capability, taken).unwrap(), "CAP-0010");
        assert_eq!(next_requirement_id(ArtifactKind::Nfr, taken).unwrap(), "NFR-0001");
    }

    #[test]
    fn next_requirement_id_stops_at_four_digits() {
        assert_eq!(
            next_requirement_id(ArtifactKind::Capability, ["CAP-9998"]).unwrap(),
            "CAP-9999"
        );
        let err = next_requirement_id(ArtifactKind::Capability, ["CAP-9999", "BR-0001"]).unwrap_err();
        assert!(matches!(err, IdError::SequenceExhausted { kind: ArtifactKind::Capability, .. }));
        assert!(next_requirement_id(ArtifactKind::BusinessRule, ["CAP-9999"]).is_ok());
    }

    #[test]
    fn task_id_display() {
        assert_eq!(TaskId(1).to_string(), "TASK-001");
        assert_eq!(TaskId(120).to_string(), "TASK-120");
    }
}
