//! Fallback classifier: tells genuine model content apart from the
//! upstream backend's placeholder substitutions.
//!
//! When the AI-calling backend cannot parse the model's output (or cannot
//! reach the model at all), it does not fail; it substitutes fixed
//! placeholder text into the response fields. Shown verbatim, those
//! placeholders masquerade as real analysis. The classifier matches
//! against the known placeholder vocabulary and flags the response so the
//! renderer can show a degraded-response banner instead.
//!
//! # Precision rule
//!
//! A response is flagged only when the code, steps, and testing fields
//! *all* match one placeholder family. Matching on a single field is not
//! sufficient: a legitimate short answer can coincidentally resemble one
//! placeholder sentence, and false positives would hide real content.
//! The one exception is the hard-failure summary prefix, which is itself
//! synthetic and marks the family on its own.

use crate::constants::{
    CODE_DEFAULT, CODE_MANUAL_REVIEW, CODE_SEE_SUMMARY, CODE_UNAVAILABLE, STEPS_MANUAL_REVIEW,
    STEPS_REVIEW_FINDINGS, STEPS_REVIEW_SUMMARY, SUMMARY_AI_DISABLED, SUMMARY_UNAVAILABLE_PREFIX,
    TESTING_DEV_FIRST, TESTING_MANUAL, TESTING_MANUAL_ALL, TESTING_THOROUGH,
};
use crate::error::{Error, Result};
use crate::model::{CanonicalField, FallbackSignal};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// =============================================================================
// FALLBACK VOCABULARY
// =============================================================================

/// One family of placeholder substitutions, corresponding to one backend
/// failure path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderFamily {
    /// Name used in classification reasons (e.g. "json-decode failure").
    pub name: String,
    /// Exact code field placeholder.
    pub code: String,
    /// Exact single-sentence steps placeholder.
    pub steps: String,
    /// Exact single-sentence testing placeholder.
    pub testing: String,
}

impl PlaceholderFamily {
    fn new(name: &str, code: &str, steps: &str, testing: &str) -> Self {
        Self {
            name: name.to_string(),
            code: code.to_string(),
            steps: steps.to_string(),
            testing: testing.to_string(),
        }
    }
}

/// The static, immutable lookup table of known placeholder text.
///
/// Externalized so the fallback vocabulary can be updated without touching
/// parsing logic. The default table carries every family the upstream
/// backend is known to emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackVocabulary {
    /// Placeholder families, matched as a unit.
    pub families: Vec<PlaceholderFamily>,
    /// Exact summary placeholders (AI-disabled path).
    pub summary_placeholders: Vec<String>,
    /// Summary prefixes that mark the whole response degraded on their own.
    pub degraded_summary_prefixes: Vec<String>,
}

impl Default for FallbackVocabulary {
    fn default() -> Self {
        Self {
            families: vec![
                PlaceholderFamily::new(
                    "json-decode failure",
                    CODE_SEE_SUMMARY,
                    STEPS_REVIEW_SUMMARY,
                    TESTING_DEV_FIRST,
                ),
                PlaceholderFamily::new(
                    "AI features disabled",
                    CODE_UNAVAILABLE,
                    STEPS_MANUAL_REVIEW,
                    TESTING_MANUAL_ALL,
                ),
                PlaceholderFamily::new(
                    "upstream generation failure",
                    CODE_MANUAL_REVIEW,
                    STEPS_REVIEW_FINDINGS,
                    TESTING_MANUAL,
                ),
                // Per-field defaults filled in when the backend parsed the
                // output but found none of the expected keys.
                PlaceholderFamily::new(
                    "missing response keys",
                    CODE_DEFAULT,
                    STEPS_MANUAL_REVIEW,
                    TESTING_THOROUGH,
                ),
            ],
            summary_placeholders: vec![SUMMARY_AI_DISABLED.to_string()],
            degraded_summary_prefixes: vec![SUMMARY_UNAVAILABLE_PREFIX.to_string()],
        }
    }
}

impl FallbackVocabulary {
    /// Add a custom placeholder family.
    pub fn with_family(mut self, family: PlaceholderFamily) -> Self {
        self.families.push(family);
        self
    }

    /// Check the vocabulary is usable: at least one family, no empty
    /// entries (an empty placeholder would match real content).
    pub fn validate(&self) -> Result<()> {
        if self.families.is_empty() {
            return Err(Error::vocabulary_invalid("no placeholder families"));
        }
        for family in &self.families {
            if family.name.trim().is_empty()
                || family.code.trim().is_empty()
                || family.steps.trim().is_empty()
                || family.testing.trim().is_empty()
            {
                return Err(Error::vocabulary_invalid(format!(
                    "family '{}' has an empty entry",
                    family.name
                )));
            }
        }
        Ok(())
    }

    /// Whether `text` is a known summary placeholder or degraded prefix.
    pub fn summary_is_placeholder(&self, text: &str) -> bool {
        let trimmed = text.trim();
        self.summary_placeholders.iter().any(|p| p == trimmed)
            || self
                .degraded_summary_prefixes
                .iter()
                .any(|p| trimmed.starts_with(p.as_str()))
    }
}

// =============================================================================
// PROPOSAL FIELDS VIEW
// =============================================================================

/// Borrowed view over the fields the classifier evaluates jointly.
///
/// The fallback rule spans three fields, so classification runs once per
/// response rather than once per field.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalFields<'a> {
    /// Normalized summary field.
    pub summary: Option<&'a CanonicalField>,
    /// Normalized implementation steps field.
    pub implementation_steps: Option<&'a CanonicalField>,
    /// Normalized testing recommendations field.
    pub testing_recommendations: Option<&'a CanonicalField>,
    /// The raw (unformatted) Terraform code string.
    pub terraform_code: Option<&'a str>,
}

// =============================================================================
// FALLBACK CLASSIFIER
// =============================================================================

/// Classifies a normalized response against the placeholder vocabulary.
///
/// # Example
///
/// ```rust,ignore
/// use proposal_pipeline::{FallbackClassifier, ProposalFields};
///
/// let classifier = FallbackClassifier::new();
/// let signal = classifier.classify(&ProposalFields::default());
/// assert!(!signal.is_fallback);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FallbackClassifier {
    vocabulary: FallbackVocabulary,
}

impl FallbackClassifier {
    /// Create a classifier with the default vocabulary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a classifier with a custom vocabulary.
    pub fn from_vocabulary(vocabulary: FallbackVocabulary) -> Self {
        Self { vocabulary }
    }

    /// Create a classifier after validating a custom vocabulary.
    pub fn try_from_vocabulary(vocabulary: FallbackVocabulary) -> Result<Self> {
        vocabulary.validate()?;
        Ok(Self { vocabulary })
    }

    /// Access the active vocabulary.
    pub fn vocabulary(&self) -> &FallbackVocabulary {
        &self.vocabulary
    }

    /// Classify one normalized response.
    ///
    /// Flags `is_fallback` only when the code, steps, and testing fields
    /// all match one placeholder family, or when the summary carries a
    /// degraded prefix (that family's summary is itself synthetic). When
    /// flagged, the notice tells the renderer whether any usable content
    /// survives in the summary field.
    pub fn classify(&self, fields: &ProposalFields<'_>) -> FallbackSignal {
        // Hard-failure summaries are synthetic on their own.
        if let Some(summary) = fields.summary {
            if let Some(text) = summary.single_text() {
                if self
                    .vocabulary
                    .degraded_summary_prefixes
                    .iter()
                    .any(|p| text.trim().starts_with(p.as_str()))
                {
                    warn!("summary carries an upstream failure prefix");
                    return FallbackSignal::fallback(
                        "upstream generation failure",
                        "The AI backend reported a failure while generating this \
                         proposal; the explanation shown is incomplete.",
                    );
                }
            }
        }

        let family = self.vocabulary.families.iter().find(|family| {
            self.code_matches(fields.terraform_code, &family.code)
                && self.single_sentence_matches(fields.implementation_steps, &family.steps)
                && self.single_sentence_matches(fields.testing_recommendations, &family.testing)
        });

        match family {
            Some(family) => {
                warn!(family = %family.name, "response matched a placeholder family");
                let notice = if self.summary_has_usable_content(fields.summary) {
                    "The AI backend could not structure this response; the summary \
                     holds the model's unprocessed answer, and the steps, testing, \
                     and code fields are placeholders."
                        .to_string()
                } else {
                    "The AI backend substituted placeholder content for this \
                     proposal; no model-generated analysis is available."
                        .to_string()
                };
                FallbackSignal::fallback(family.name.clone(), notice)
            }
            None => {
                debug!("no placeholder family matched");
                FallbackSignal::genuine()
            }
        }
    }

    fn code_matches(&self, code: Option<&str>, placeholder: &str) -> bool {
        code.map(|c| c.trim() == placeholder).unwrap_or(false)
    }

    fn single_sentence_matches(&self, field: Option<&CanonicalField>, placeholder: &str) -> bool {
        field
            .and_then(|f| f.single_text())
            .map(|t| t.trim() == placeholder)
            .unwrap_or(false)
    }

    /// Whether the summary field holds something beyond placeholder text.
    /// The backend stuffs the model's raw answer into the summary on the
    /// json-decode path, so that content is worth recovering.
    fn summary_has_usable_content(&self, summary: Option<&CanonicalField>) -> bool {
        match summary {
            Some(field) => {
                let text = field.flattened_text();
                let trimmed = text.trim();
                !trimmed.is_empty() && !self.vocabulary.summary_is_placeholder(trimmed)
            }
            None => false,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CODE_SEE_SUMMARY, STEPS_REVIEW_SUMMARY, TESTING_DEV_FIRST};
    use crate::model::CanonicalField;

    fn steps(text: &str) -> CanonicalField {
        CanonicalField::text_list(vec![text.to_string()])
    }

    #[test]
    fn test_all_three_placeholders_flagged() {
        let steps_field = steps(STEPS_REVIEW_SUMMARY);
        let testing_field = steps(TESTING_DEV_FIRST);
        let summary_field = CanonicalField::raw_text("The model's raw unparsed answer...");
        let fields = ProposalFields {
            summary: Some(&summary_field),
            implementation_steps: Some(&steps_field),
            testing_recommendations: Some(&testing_field),
            terraform_code: Some(CODE_SEE_SUMMARY),
        };

        let signal = FallbackClassifier::new().classify(&fields);
        assert!(signal.is_fallback);
        assert_eq!(signal.reason.as_deref(), Some("json-decode failure"));
        // Summary still holds model output worth surfacing.
        assert!(signal.notice.unwrap().contains("unprocessed answer"));
    }

    #[test]
    fn test_single_placeholder_not_flagged() {
        // Fallback precision: exactly one matching field must not flag.
        let steps_field = steps(STEPS_REVIEW_SUMMARY);
        let testing_field = steps("Run terraform plan in a sandbox project");
        let fields = ProposalFields {
            summary: None,
            implementation_steps: Some(&steps_field),
            testing_recommendations: Some(&testing_field),
            terraform_code: Some("resource \"x\" \"y\" {}"),
        };

        let signal = FallbackClassifier::new().classify(&fields);
        assert!(!signal.is_fallback);
        assert!(signal.notice.is_none());
    }

    #[test]
    fn test_two_of_three_not_flagged() {
        let steps_field = steps(STEPS_REVIEW_SUMMARY);
        let testing_field = steps(TESTING_DEV_FIRST);
        let fields = ProposalFields {
            summary: None,
            implementation_steps: Some(&steps_field),
            testing_recommendations: Some(&testing_field),
            terraform_code: Some("resource \"real\" \"code\" {}"),
        };

        let signal = FallbackClassifier::new().classify(&fields);
        assert!(!signal.is_fallback);
    }

    #[test]
    fn test_mixed_families_not_flagged() {
        // Fields from different families do not constitute one substitution.
        let steps_field = steps(STEPS_MANUAL_REVIEW);
        let testing_field = steps(TESTING_DEV_FIRST);
        let fields = ProposalFields {
            summary: None,
            implementation_steps: Some(&steps_field),
            testing_recommendations: Some(&testing_field),
            terraform_code: Some(CODE_SEE_SUMMARY),
        };

        let signal = FallbackClassifier::new().classify(&fields);
        assert!(!signal.is_fallback);
    }

    #[test]
    fn test_ai_disabled_family_flagged() {
        let steps_field = steps(STEPS_MANUAL_REVIEW);
        let testing_field = steps(TESTING_MANUAL_ALL);
        let summary_field = CanonicalField::raw_text(SUMMARY_AI_DISABLED);
        let fields = ProposalFields {
            summary: Some(&summary_field),
            implementation_steps: Some(&steps_field),
            testing_recommendations: Some(&testing_field),
            terraform_code: Some(CODE_UNAVAILABLE),
        };

        let signal = FallbackClassifier::new().classify(&fields);
        assert!(signal.is_fallback);
        assert_eq!(signal.reason.as_deref(), Some("AI features disabled"));
        // The summary is itself a placeholder here, so nothing is usable.
        assert!(signal.notice.unwrap().contains("no model-generated"));
    }

    #[test]
    fn test_degraded_summary_prefix_flags_alone() {
        let summary_field =
            CanonicalField::raw_text("AI analysis temporarily unavailable: quota exceeded");
        let fields = ProposalFields {
            summary: Some(&summary_field),
            ..Default::default()
        };

        let signal = FallbackClassifier::new().classify(&fields);
        assert!(signal.is_fallback);
        assert_eq!(
            signal.reason.as_deref(),
            Some("upstream generation failure")
        );
    }

    #[test]
    fn test_steps_as_raw_text_placeholder_matches() {
        // Placeholders can survive normalization as RawText rather than a
        // single-item list; both shapes must match.
        let steps_field = CanonicalField::raw_text(STEPS_REVIEW_SUMMARY);
        let testing_field = CanonicalField::raw_text(TESTING_DEV_FIRST);
        let fields = ProposalFields {
            summary: None,
            implementation_steps: Some(&steps_field),
            testing_recommendations: Some(&testing_field),
            terraform_code: Some(CODE_SEE_SUMMARY),
        };

        let signal = FallbackClassifier::new().classify(&fields);
        assert!(signal.is_fallback);
    }

    #[test]
    fn test_multi_item_steps_never_match() {
        let steps_field = CanonicalField::text_list(vec![
            STEPS_REVIEW_SUMMARY.to_string(),
            "And one real step".to_string(),
        ]);
        let testing_field = steps(TESTING_DEV_FIRST);
        let fields = ProposalFields {
            summary: None,
            implementation_steps: Some(&steps_field),
            testing_recommendations: Some(&testing_field),
            terraform_code: Some(CODE_SEE_SUMMARY),
        };

        let signal = FallbackClassifier::new().classify(&fields);
        assert!(!signal.is_fallback);
    }

    #[test]
    fn test_empty_fields_genuine() {
        let signal = FallbackClassifier::new().classify(&ProposalFields::default());
        assert!(!signal.is_fallback);
        assert!(signal.reason.is_none());
    }

    #[test]
    fn test_missing_keys_defaults_flagged() {
        // The backend's per-field defaults, emitted when parsed output
        // lacks the expected keys, are a family of their own.
        let steps_field = steps(STEPS_MANUAL_REVIEW);
        let testing_field = steps(TESTING_THOROUGH);
        let summary_field = CanonicalField::raw_text("Findings summarized without structure.");
        let fields = ProposalFields {
            summary: Some(&summary_field),
            implementation_steps: Some(&steps_field),
            testing_recommendations: Some(&testing_field),
            terraform_code: Some(CODE_DEFAULT),
        };

        let signal = FallbackClassifier::new().classify(&fields);
        assert!(signal.is_fallback);
        assert_eq!(signal.reason.as_deref(), Some("missing response keys"));
    }

    #[test]
    fn test_default_code_alone_not_flagged() {
        let steps_field = steps("Remove the public IAM binding");
        let testing_field = steps("Run terraform plan in staging");
        let fields = ProposalFields {
            summary: None,
            implementation_steps: Some(&steps_field),
            testing_recommendations: Some(&testing_field),
            terraform_code: Some(CODE_DEFAULT),
        };

        let signal = FallbackClassifier::new().classify(&fields);
        assert!(!signal.is_fallback);
    }

    #[test]
    fn test_vocabulary_validation() {
        assert!(FallbackVocabulary::default().validate().is_ok());

        let empty = FallbackVocabulary {
            families: vec![],
            ..FallbackVocabulary::default()
        };
        let err = FallbackClassifier::try_from_vocabulary(empty).unwrap_err();
        assert_eq!(err.code(), "E010");

        let blank_entry = FallbackVocabulary::default()
            .with_family(PlaceholderFamily::new("blank", "", "step", "test"));
        assert!(blank_entry.validate().is_err());
    }

    #[test]
    fn test_custom_family() {
        let vocabulary = FallbackVocabulary::default().with_family(PlaceholderFamily::new(
            "test family",
            "# none",
            "step none",
            "test none",
        ));
        let classifier = FallbackClassifier::from_vocabulary(vocabulary);

        let steps_field = steps("step none");
        let testing_field = steps("test none");
        let fields = ProposalFields {
            summary: None,
            implementation_steps: Some(&steps_field),
            testing_recommendations: Some(&testing_field),
            terraform_code: Some("# none"),
        };

        let signal = classifier.classify(&fields);
        assert!(signal.is_fallback);
        assert_eq!(signal.reason.as_deref(), Some("test family"));
    }

    #[test]
    fn test_placeholder_matching_trims_whitespace() {
        let steps_field = steps(&format!("  {}  ", STEPS_REVIEW_SUMMARY));
        let testing_field = steps(TESTING_DEV_FIRST);
        let padded_code = format!("\n{}\n", CODE_SEE_SUMMARY);
        let fields = ProposalFields {
            summary: None,
            implementation_steps: Some(&steps_field),
            testing_recommendations: Some(&testing_field),
            terraform_code: Some(padded_code.as_str()),
        };

        let signal = FallbackClassifier::new().classify(&fields);
        assert!(signal.is_fallback);
    }
}
