//! Canonical data model for the proposal pipeline.
//!
//! Rather than inspecting values with ad-hoc type checks and key-name
//! guessing, every shape decision is an explicit tagged union, so each
//! handling branch is enumerable and testable:
//!
//! - [`ParsedValue`]: what the recovery parser produced (structured JSON or
//!   the untouched original string).
//! - [`CanonicalField`]: the small fixed set of shapes all AI output is
//!   reduced to before rendering (keyed text map, ordered text list, raw
//!   text with degradation flags).
//! - [`CanonicalProposal`]: the aggregate handed to the renderer, one per
//!   AI response.
//!
//! All canonical types derive `Serialize`/`Deserialize` with camelCase
//! field names so they can cross a JSON boundary to a web renderer as-is.

use crate::error::{Error, Result};
use crate::{CategoryLabel, Notice};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// FIELD KIND
// =============================================================================

/// The logical AI response fields this pipeline knows how to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Executive summary of the findings and their business impact.
    Summary,
    /// Ordered implementation guide.
    ImplementationSteps,
    /// Testing recommendations for the proposed changes.
    TestingRecommendations,
    /// Terraform code implementing the fixes.
    TerraformCode,
}

impl FieldKind {
    /// The canonical payload key for this field.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::ImplementationSteps => "implementation_steps",
            Self::TestingRecommendations => "testing_recommendations",
            Self::TerraformCode => "terraform_code",
        }
    }

    /// Alternate payload keys the upstream backend emits for this field.
    ///
    /// The backend's report generator writes the model's `summary` out under
    /// `ai_proposal`, so both spellings must resolve to the same field.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Summary => &["ai_proposal"],
            Self::ImplementationSteps => &[],
            Self::TestingRecommendations => &[],
            Self::TerraformCode => &["terraform_code_blocks"],
        }
    }

    /// Whether this field is naturally an ordered list of items.
    pub fn is_list_like(&self) -> bool {
        matches!(self, Self::ImplementationSteps | Self::TestingRecommendations)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl std::str::FromStr for FieldKind {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" | "ai_proposal" => Ok(Self::Summary),
            "implementation_steps" | "steps" => Ok(Self::ImplementationSteps),
            "testing_recommendations" | "testing" => Ok(Self::TestingRecommendations),
            "terraform_code" | "terraform" | "terraform_code_blocks" => Ok(Self::TerraformCode),
            _ => Err(Error::UnknownFieldKind(s.to_string())),
        }
    }
}

// =============================================================================
// PARSED VALUE
// =============================================================================

/// Result of the recovery parser for one field.
///
/// Either a structured JSON value (mapping or sequence, arbitrarily nested)
/// or the sentinel `Unparsed` carrying the original string untouched. There
/// is no partially-mangled middle ground: recovery either succeeds or the
/// caller gets back exactly what came in.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    /// Successfully decoded structured value.
    Structured(Value),
    /// Irrecoverable input, original string preserved byte-for-byte.
    Unparsed(String),
}

impl ParsedValue {
    /// Whether recovery produced a structured value.
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }

    /// Borrow the structured value, if any.
    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Self::Structured(v) => Some(v),
            Self::Unparsed(_) => None,
        }
    }
}

// =============================================================================
// CANONICAL FIELD
// =============================================================================

/// A value in a [`CanonicalField::TextMap`]: one string or an ordered run
/// of strings under a single category key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextEntry {
    /// A single text value.
    Single(String),
    /// An ordered sequence of text values.
    Many(Vec<String>),
}

impl TextEntry {
    /// Flatten the entry into one newline-joined string.
    pub fn joined(&self) -> String {
        match self {
            Self::Single(s) => s.clone(),
            Self::Many(items) => items.join("\n"),
        }
    }

    /// Number of text values carried by this entry.
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Many(items) => items.len(),
        }
    }

    /// Whether the entry carries no text values.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(s) => s.is_empty(),
            Self::Many(items) => items.is_empty(),
        }
    }
}

/// The normalized output for one field: every AI response shape is reduced
/// to one of these three variants before rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CanonicalField {
    /// Mapping from category name (e.g. a severity tier) to text.
    #[serde(rename_all = "camelCase")]
    TextMap {
        entries: BTreeMap<CategoryLabel, TextEntry>,
    },

    /// Ordered sequence of plain strings.
    #[serde(rename_all = "camelCase")]
    TextList { items: Vec<String> },

    /// A single string, with degradation metadata for the renderer.
    #[serde(rename_all = "camelCase")]
    RawText {
        text: String,
        is_fallback: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_degraded: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notice: Option<Notice>,
    },
}

impl CanonicalField {
    /// Create a `RawText` field with no degradation flags set.
    pub fn raw_text(text: impl Into<String>) -> Self {
        Self::RawText {
            text: text.into(),
            is_fallback: false,
            is_degraded: None,
            notice: None,
        }
    }

    /// Create a `TextList` field.
    pub fn text_list(items: Vec<String>) -> Self {
        Self::TextList { items }
    }

    /// Create a `TextMap` field.
    pub fn text_map(entries: BTreeMap<CategoryLabel, TextEntry>) -> Self {
        Self::TextMap { entries }
    }

    /// Whether this field has been flagged as a fallback substitution.
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            Self::RawText {
                is_fallback: true,
                ..
            }
        )
    }

    /// Flag a `RawText` field as fallback content, attaching a notice.
    /// Map and list variants are left unchanged; category structure is
    /// never genuine placeholder output.
    pub fn mark_fallback(&mut self, notice_text: impl Into<String>) {
        if let Self::RawText {
            is_fallback,
            is_degraded,
            notice,
            ..
        } = self
        {
            *is_fallback = true;
            *is_degraded = Some(true);
            *notice = Some(notice_text.into());
        }
    }

    /// Flatten the field to one display string (newline-joined), regardless
    /// of variant. Useful for plain-text rendering and assertions.
    pub fn flattened_text(&self) -> String {
        match self {
            Self::TextMap { entries } => entries
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v.joined()))
                .collect::<Vec<_>>()
                .join("\n"),
            Self::TextList { items } => items.join("\n"),
            Self::RawText { text, .. } => text.clone(),
        }
    }

    /// The lone string of the field, when it holds exactly one.
    ///
    /// Used by the fallback classifier: placeholder substitutions are always
    /// a single sentence or single-item list.
    pub fn single_text(&self) -> Option<&str> {
        match self {
            Self::RawText { text, .. } => Some(text.as_str()),
            Self::TextList { items } if items.len() == 1 => Some(items[0].as_str()),
            _ => None,
        }
    }
}

// =============================================================================
// FALLBACK SIGNAL
// =============================================================================

/// Classification of whether a response is a degraded fallback substitution
/// rather than genuine model content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackSignal {
    /// True when the response matched a known placeholder family.
    pub is_fallback: bool,
    /// Human-readable reason naming the matched family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Renderer-facing notice to surface instead of presenting placeholder
    /// text as real analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

impl FallbackSignal {
    /// Signal for genuine (non-placeholder) content.
    pub fn genuine() -> Self {
        Self {
            is_fallback: false,
            reason: None,
            notice: None,
        }
    }

    /// Signal for a detected placeholder substitution.
    pub fn fallback(reason: impl Into<String>, notice: impl Into<String>) -> Self {
        Self {
            is_fallback: true,
            reason: Some(reason.into()),
            notice: Some(notice.into()),
        }
    }
}

// =============================================================================
// CODE BLOCKS & PROPOSAL AGGREGATE
// =============================================================================

/// One named, formatted Terraform snippet inside a proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    /// Formatted, renderable code text.
    pub code: String,
    /// Optional free-text description of what the block changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional severity tag (CRITICAL/HIGH/MEDIUM/LOW in the scanner's
    /// vocabulary).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

impl CodeBlock {
    /// Create a code block with no metadata.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: None,
            severity: None,
        }
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a severity tag.
    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }
}

/// The canonical, render-ready aggregate produced once per AI response.
///
/// Invariant: every raw value, regardless of shape or validity, produces
/// exactly one of these. Failure never escapes as an error; it is encoded
/// as `RawText` fields plus the `is_fallback`/`notice` pair.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalProposal {
    /// Executive summary field, if present in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<CanonicalField>,

    /// Implementation steps field, if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_steps: Option<CanonicalField>,

    /// Testing recommendations field, if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testing_recommendations: Option<CanonicalField>,

    /// A single formatted Terraform snippet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terraform_code: Option<String>,

    /// Named formatted Terraform snippets, when the model grouped its fixes.
    /// Mutually exclusive with `terraform_code` in practice, though nothing
    /// breaks if a renderer receives both.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terraform_code_blocks: Option<BTreeMap<String, CodeBlock>>,

    /// Whether the response was classified as an upstream placeholder.
    pub is_fallback: bool,

    /// Renderer-facing degradation notice, present when `is_fallback`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

impl CanonicalProposal {
    /// Whether the proposal carries any content at all.
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.implementation_steps.is_none()
            && self.testing_recommendations.is_none()
            && self.terraform_code.is_none()
            && self.terraform_code_blocks.is_none()
    }

    /// Re-encode the proposal for a JSON renderer boundary.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_field_kind_keys() {
        assert_eq!(FieldKind::Summary.key(), "summary");
        assert_eq!(FieldKind::ImplementationSteps.key(), "implementation_steps");
        assert_eq!(
            FieldKind::TestingRecommendations.key(),
            "testing_recommendations"
        );
        assert_eq!(FieldKind::TerraformCode.key(), "terraform_code");
    }

    #[test]
    fn test_field_kind_from_str_aliases() {
        assert_eq!(
            FieldKind::from_str("ai_proposal").unwrap(),
            FieldKind::Summary
        );
        assert_eq!(
            FieldKind::from_str("steps").unwrap(),
            FieldKind::ImplementationSteps
        );
        assert_eq!(
            FieldKind::from_str("terraform").unwrap(),
            FieldKind::TerraformCode
        );
    }

    #[test]
    fn test_field_kind_from_str_invalid() {
        let err = FieldKind::from_str("banana").unwrap_err();
        assert_eq!(err.code(), "E002");
    }

    #[test]
    fn test_list_like_kinds() {
        assert!(FieldKind::ImplementationSteps.is_list_like());
        assert!(FieldKind::TestingRecommendations.is_list_like());
        assert!(!FieldKind::Summary.is_list_like());
        assert!(!FieldKind::TerraformCode.is_list_like());
    }

    #[test]
    fn test_parsed_value_accessors() {
        let structured = ParsedValue::Structured(serde_json::json!({"a": 1}));
        assert!(structured.is_structured());
        assert!(structured.as_structured().is_some());

        let unparsed = ParsedValue::Unparsed("{not json".to_string());
        assert!(!unparsed.is_structured());
        assert!(unparsed.as_structured().is_none());
    }

    #[test]
    fn test_text_entry_joined() {
        assert_eq!(TextEntry::Single("a".into()).joined(), "a");
        assert_eq!(
            TextEntry::Many(vec!["a".into(), "b".into()]).joined(),
            "a\nb"
        );
    }

    #[test]
    fn test_mark_fallback_only_affects_raw_text() {
        let mut raw = CanonicalField::raw_text("placeholder");
        raw.mark_fallback("degraded");
        assert!(raw.is_fallback());

        let mut list = CanonicalField::text_list(vec!["step".into()]);
        list.mark_fallback("degraded");
        assert!(!list.is_fallback());
    }

    #[test]
    fn test_single_text() {
        let raw = CanonicalField::raw_text("only");
        assert_eq!(raw.single_text(), Some("only"));

        let one = CanonicalField::text_list(vec!["one".into()]);
        assert_eq!(one.single_text(), Some("one"));

        let two = CanonicalField::text_list(vec!["one".into(), "two".into()]);
        assert_eq!(two.single_text(), None);
    }

    #[test]
    fn test_flattened_text_map() {
        let mut entries = BTreeMap::new();
        entries.insert("HIGH".to_string(), TextEntry::Single("fix iam".into()));
        entries.insert(
            "LOW".to_string(),
            TextEntry::Many(vec!["a".into(), "b".into()]),
        );
        let field = CanonicalField::text_map(entries);
        let flat = field.flattened_text();
        assert!(flat.contains("HIGH: fix iam"));
        assert!(flat.contains("LOW: a\nb"));
    }

    #[test]
    fn test_raw_text_serialization_shape() {
        let field = CanonicalField::RawText {
            text: "hello".into(),
            is_fallback: true,
            is_degraded: Some(true),
            notice: Some("degraded".into()),
        };
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["kind"], "rawText");
        assert_eq!(json["isFallback"], true);
        assert_eq!(json["isDegraded"], true);
        assert_eq!(json["notice"], "degraded");
    }

    #[test]
    fn test_text_entry_untagged_serialization() {
        let single: TextEntry = serde_json::from_str("\"one\"").unwrap();
        assert_eq!(single, TextEntry::Single("one".into()));

        let many: TextEntry = serde_json::from_str("[\"a\",\"b\"]").unwrap();
        assert_eq!(many, TextEntry::Many(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_proposal_roundtrip() {
        let proposal = CanonicalProposal {
            summary: Some(CanonicalField::raw_text("ok")),
            implementation_steps: Some(CanonicalField::text_list(vec!["s1".into()])),
            terraform_code: Some("resource \"x\" \"y\" {\n}".into()),
            ..Default::default()
        };
        let json = proposal.to_json().unwrap();
        let back: CanonicalProposal = serde_json::from_str(&json).unwrap();
        assert_eq!(proposal, back);
    }

    #[test]
    fn test_proposal_is_empty() {
        assert!(CanonicalProposal::default().is_empty());
        let with_code = CanonicalProposal {
            terraform_code: Some("# noop".into()),
            ..Default::default()
        };
        assert!(!with_code.is_empty());
    }
}
