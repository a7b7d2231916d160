//! Pipeline orchestration: one raw AI payload in, one render-ready
//! [`CanonicalProposal`] out.
//!
//! Runs the four stages in order for each known field:
//!
//! 1. Recovery parse ([`RecoveryParser`]) for the payload and each field.
//! 2. Structure normalization ([`StructureNormalizer`]) into canonical
//!    shapes.
//! 3. Fallback classification ([`FallbackClassifier`]) across the whole
//!    response.
//! 4. Terraform formatting ([`TerraformFormatter`]) for code content.
//!
//! The pipeline is total: any `serde_json::Value`, including `null`, a
//! bare string, or deeply nested garbage, produces exactly one proposal.
//! It holds no mutable state and performs no I/O, so one instance can be
//! shared freely across threads.
//!
//! # Example
//!
//! ```rust,ignore
//! use proposal_pipeline::ProposalPipeline;
//!
//! let pipeline = ProposalPipeline::new();
//! let payload = serde_json::json!({
//!     "summary": "Two public buckets found",
//!     "implementation_steps": ["Restrict bucket IAM"],
//! });
//! let proposal = pipeline.process(&payload);
//! assert!(!proposal.is_fallback);
//! ```

use crate::classifier::{FallbackClassifier, FallbackVocabulary, ProposalFields};
use crate::formatter::{FormatterConfig, TerraformFormatter};
use crate::model::{CanonicalField, CanonicalProposal, CodeBlock, FieldKind, ParsedValue};
use crate::normalizer::{NormalizerConfig, StructureNormalizer};
use crate::parser::{ParserConfig, RecoveryParser};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Keys probed for the code text of a named block object.
const BLOCK_CODE_KEYS: &[&str] = &["code", "terraform", "snippet"];

// =============================================================================
// PIPELINE BUILDER
// =============================================================================

/// Builder for a [`ProposalPipeline`] with non-default stage configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    parser_config: ParserConfig,
    normalizer_config: NormalizerConfig,
    formatter_config: FormatterConfig,
    vocabulary: FallbackVocabulary,
}

impl PipelineBuilder {
    /// Start from all-default stage configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the recovery parser configuration.
    pub fn with_parser_config(mut self, config: ParserConfig) -> Self {
        self.parser_config = config;
        self
    }

    /// Replace the normalizer configuration.
    pub fn with_normalizer_config(mut self, config: NormalizerConfig) -> Self {
        self.normalizer_config = config;
        self
    }

    /// Replace the formatter configuration.
    pub fn with_formatter_config(mut self, config: FormatterConfig) -> Self {
        self.formatter_config = config;
        self
    }

    /// Replace the fallback vocabulary.
    pub fn with_vocabulary(mut self, vocabulary: FallbackVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// Assemble the pipeline.
    pub fn build(self) -> ProposalPipeline {
        ProposalPipeline {
            parser: RecoveryParser::from_config(self.parser_config),
            normalizer: StructureNormalizer::from_config(self.normalizer_config),
            classifier: FallbackClassifier::from_vocabulary(self.vocabulary),
            formatter: TerraformFormatter::from_config(self.formatter_config),
        }
    }
}

// =============================================================================
// PROPOSAL PIPELINE
// =============================================================================

/// The full recovery and normalization pipeline.
#[derive(Debug, Clone, Default)]
pub struct ProposalPipeline {
    parser: RecoveryParser,
    normalizer: StructureNormalizer,
    classifier: FallbackClassifier,
    formatter: TerraformFormatter,
}

impl ProposalPipeline {
    /// Create a pipeline with default configuration throughout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a builder for custom stage configuration.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Process one raw response payload into a canonical proposal.
    ///
    /// Total over all inputs. A string payload gets a whole-payload
    /// recovery pass first; when even that fails, the original text comes
    /// back as a raw-text summary rather than being discarded.
    pub fn process(&self, payload: &Value) -> CanonicalProposal {
        let root: Value = match payload {
            Value::String(s) => match self.parser.parse_root(s) {
                ParsedValue::Structured(v) => v,
                ParsedValue::Unparsed(text) => {
                    warn!("payload irrecoverable, preserving as raw text summary");
                    return CanonicalProposal {
                        summary: Some(CanonicalField::raw_text(text)),
                        ..Default::default()
                    };
                }
            },
            other => other.clone(),
        };

        let mut proposal = CanonicalProposal {
            summary: self.text_field(&root, FieldKind::Summary),
            implementation_steps: self.text_field(&root, FieldKind::ImplementationSteps),
            testing_recommendations: self.text_field(&root, FieldKind::TestingRecommendations),
            ..Default::default()
        };

        // Code is classified on the raw string, then formatted for display.
        let raw_code = self.process_code(&root, &mut proposal);

        let signal = self.classifier.classify(&ProposalFields {
            summary: proposal.summary.as_ref(),
            implementation_steps: proposal.implementation_steps.as_ref(),
            testing_recommendations: proposal.testing_recommendations.as_ref(),
            terraform_code: raw_code.as_deref(),
        });

        if signal.is_fallback {
            proposal.is_fallback = true;
            proposal.notice = signal.notice.clone();
            if let (Some(summary), Some(notice)) = (proposal.summary.as_mut(), &signal.notice) {
                let placeholder = summary
                    .single_text()
                    .map(|t| self.classifier.vocabulary().summary_is_placeholder(t))
                    .unwrap_or(false);
                if placeholder {
                    summary.mark_fallback(notice.clone());
                }
            }
        }

        proposal
    }

    /// Run recovery and normalization for one field value in isolation.
    pub fn process_field(&self, raw: &Value, kind: FieldKind) -> CanonicalField {
        self.normalizer.normalize(self.parser.parse(raw, kind), kind)
    }

    fn text_field(&self, root: &Value, kind: FieldKind) -> Option<CanonicalField> {
        let raw = self.field_value(root, kind)?;
        debug!(field = %kind, "recovering field");
        Some(self.process_field(raw, kind))
    }

    /// Resolve a field in the payload by its key, then by its aliases,
    /// skipping explicit nulls.
    fn field_value<'a>(&self, root: &'a Value, kind: FieldKind) -> Option<&'a Value> {
        let map = root.as_object()?;
        let mut keys = vec![kind.key()];
        keys.extend_from_slice(kind.aliases());
        keys.into_iter()
            .find_map(|k| map.get(k))
            .filter(|v| !v.is_null())
    }

    /// Recover and format the Terraform code field, filling either
    /// `terraform_code` or `terraform_code_blocks`. Returns the raw code
    /// string (pre-formatting) for classification, when there is one.
    fn process_code(&self, root: &Value, proposal: &mut CanonicalProposal) -> Option<String> {
        let raw = self.field_value(root, FieldKind::TerraformCode)?;

        match self.parser.parse(raw, FieldKind::TerraformCode) {
            // Plain code text: not JSON, and that is the normal case.
            ParsedValue::Unparsed(code) => {
                proposal.terraform_code = Some(self.formatter.format(&code));
                Some(code)
            }
            ParsedValue::Structured(Value::Object(map)) => {
                // An object carrying a code key directly is one block; any
                // other mapping is a set of named blocks.
                if let Some(code) = Self::block_code(&map) {
                    let mut block = CodeBlock::new(self.formatter.format(code));
                    block = Self::block_metadata(&map, block);
                    let raw_code = code.to_string();
                    proposal.terraform_code = Some(block.code.clone());
                    proposal.terraform_code_blocks =
                        Some(BTreeMap::from([("main".to_string(), block)]));
                    Some(raw_code)
                } else {
                    debug!(blocks = map.len(), "recovered named code blocks");
                    proposal.terraform_code_blocks = Some(self.named_blocks(&map));
                    None
                }
            }
            ParsedValue::Structured(Value::Array(items)) => {
                let raw_code = items
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join("\n\n");
                proposal.terraform_code = Some(self.formatter.format(&raw_code));
                Some(raw_code)
            }
            ParsedValue::Structured(other) => {
                let raw_code = match other {
                    Value::String(s) => s,
                    v => v.to_string(),
                };
                proposal.terraform_code = Some(self.formatter.format(&raw_code));
                Some(raw_code)
            }
        }
    }

    fn named_blocks(&self, map: &Map<String, Value>) -> BTreeMap<String, CodeBlock> {
        map.iter()
            .map(|(name, value)| {
                let block = match value {
                    Value::String(code) => CodeBlock::new(self.formatter.format(code)),
                    Value::Object(obj) => match Self::block_code(obj) {
                        Some(code) => {
                            let block = CodeBlock::new(self.formatter.format(code));
                            Self::block_metadata(obj, block)
                        }
                        // No code key: keep the block's content as its
                        // serialization rather than dropping it.
                        None => CodeBlock::new(Value::Object(obj.clone()).to_string()),
                    },
                    other => CodeBlock::new(other.to_string()),
                };
                (name.clone(), block)
            })
            .collect()
    }

    fn block_code(map: &Map<String, Value>) -> Option<&str> {
        BLOCK_CODE_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
    }

    fn block_metadata(map: &Map<String, Value>, mut block: CodeBlock) -> CodeBlock {
        if let Some(description) = map.get("description").and_then(Value::as_str) {
            block = block.with_description(description);
        }
        if let Some(severity) = map.get("severity").and_then(Value::as_str) {
            block = block.with_severity(severity);
        }
        block
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CODE_SEE_SUMMARY, STEPS_REVIEW_SUMMARY, TESTING_DEV_FIRST};
    use serde_json::json;

    fn pipeline() -> ProposalPipeline {
        ProposalPipeline::new()
    }

    #[test]
    fn test_string_payload_with_noise_prefix() {
        let proposal = pipeline().process(&json!("json\n{\"summary\": \"ok\"}"));
        assert_eq!(
            proposal.summary.unwrap().flattened_text(),
            "ok"
        );
        assert!(!proposal.is_fallback);
    }

    #[test]
    fn test_fenced_payload_with_step_list() {
        let proposal = pipeline().process(&json!(
            "```json\n{\"implementation_steps\": [\"Step 1\", \"Step 2\"]}\n```"
        ));
        assert_eq!(
            proposal.implementation_steps.unwrap(),
            CanonicalField::text_list(vec!["Step 1".into(), "Step 2".into()])
        );
    }

    #[test]
    fn test_placeholder_response_flagged_with_notice() {
        let proposal = pipeline().process(&json!({
            "summary": "The raw model answer the backend could not parse.",
            "terraform_code": CODE_SEE_SUMMARY,
            "implementation_steps": [STEPS_REVIEW_SUMMARY],
            "testing_recommendations": [TESTING_DEV_FIRST],
        }));
        assert!(proposal.is_fallback);
        assert!(proposal.notice.is_some());
        // The summary keeps the recoverable model text, unflagged.
        assert!(!proposal.summary.unwrap().is_fallback());
    }

    #[test]
    fn test_irrecoverable_string_payload_preserved() {
        let proposal = pipeline().process(&json!("{not json"));
        assert_eq!(
            proposal.summary,
            Some(CanonicalField::raw_text("{not json"))
        );
        assert!(!proposal.is_fallback);
    }

    #[test]
    fn test_ai_proposal_alias_resolves_to_summary() {
        let proposal = pipeline().process(&json!({"ai_proposal": "Findings overview"}));
        assert_eq!(
            proposal.summary.unwrap().flattened_text(),
            "Findings overview"
        );
    }

    #[test]
    fn test_terraform_string_is_formatted() {
        let proposal = pipeline().process(&json!({
            "terraform_code":
                "resource \"google_cloud_run_service_iam_policy\" \"x\" { policy_data = data.google_iam_policy.y.policy_data }",
        }));
        let code = proposal.terraform_code.unwrap();
        assert!(code.starts_with("resource"));
        assert!(code.contains("\n  policy_data"));
        assert!(code.ends_with("\n}"));
    }

    #[test]
    fn test_named_code_blocks() {
        let proposal = pipeline().process(&json!({
            "terraform_code_blocks": {
                "bucket_iam": {
                    "code": "resource \"google_storage_bucket_iam_member\" \"m\" {\nrole = \"roles/storage.objectViewer\"\n}",
                    "description": "Tighten bucket access",
                    "severity": "HIGH",
                },
                "raw_block": "locals {\na = 1\n}",
            }
        }));
        let blocks = proposal.terraform_code_blocks.unwrap();
        let bucket = &blocks["bucket_iam"];
        assert!(bucket.code.contains("\n  role ="));
        assert_eq!(bucket.description.as_deref(), Some("Tighten bucket access"));
        assert_eq!(bucket.severity.as_deref(), Some("HIGH"));
        assert_eq!(blocks["raw_block"].code, "locals {\n  a = 1\n}");
    }

    #[test]
    fn test_single_block_object_fills_both_views() {
        let proposal = pipeline().process(&json!({
            "terraform_code": {"code": "locals {\nx = 1\n}", "severity": "LOW"}
        }));
        assert_eq!(proposal.terraform_code.as_deref(), Some("locals {\n  x = 1\n}"));
        let blocks = proposal.terraform_code_blocks.unwrap();
        assert_eq!(blocks["main"].severity.as_deref(), Some("LOW"));
    }

    #[test]
    fn test_terraform_array_joined() {
        let proposal = pipeline().process(&json!({
            "terraform_code": ["locals {\na = 1\n}", "locals {\nb = 2\n}"]
        }));
        let code = proposal.terraform_code.unwrap();
        assert!(code.contains("a = 1"));
        assert!(code.contains("b = 2"));
    }

    #[test]
    fn test_null_and_missing_fields_ignored() {
        let proposal = pipeline().process(&json!({
            "summary": null,
            "testing_recommendations": ["Run terraform plan"],
        }));
        assert!(proposal.summary.is_none());
        assert!(proposal.implementation_steps.is_none());
        assert!(proposal.testing_recommendations.is_some());
    }

    #[test]
    fn test_null_payload_yields_empty_proposal() {
        let proposal = pipeline().process(&Value::Null);
        assert!(proposal.is_empty());
        assert!(!proposal.is_fallback);
    }

    #[test]
    fn test_process_field_isolation() {
        let field = pipeline().process_field(
            &json!("```json\n[\"a\", \"b\"]\n```"),
            FieldKind::TestingRecommendations,
        );
        assert_eq!(
            field,
            CanonicalField::text_list(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_builder_custom_formatter() {
        let pipeline = ProposalPipeline::builder()
            .with_formatter_config(FormatterConfig::default().with_indent_unit("    "))
            .build();
        let proposal = pipeline.process(&json!({"terraform_code": "locals {\na = 1\n}"}));
        assert_eq!(
            proposal.terraform_code.as_deref(),
            Some("locals {\n    a = 1\n}")
        );
    }

    #[test]
    fn test_double_encoded_steps_recovered() {
        let proposal = pipeline().process(&json!({
            "implementation_steps": "{\"implementation_steps\": [\"Step 1\"]}"
        }));
        assert_eq!(
            proposal.implementation_steps.unwrap(),
            CanonicalField::text_list(vec!["Step 1".into()])
        );
    }
}
