//! Structure normalizer: coerces parsed values into canonical shapes.
//!
//! The model shapes its answers inconsistently from call to call: a flat
//! list of steps one time, the same steps grouped under severity categories
//! the next, a summary as one string or as a keyed object. The normalizer
//! walks whatever the recovery parser produced and reduces it to one of the
//! three canonical shapes in [`CanonicalField`], stringifying every leaf.
//!
//! Information is never silently dropped: a structured list element with no
//! recognizable text key falls back to its compact JSON serialization, and
//! category structure in a mapping survives as a `TextMap` rather than being
//! forced into a flat list.
//!
//! Every recursive descent terminates in one pass: mappings and sequences
//! become maps and lists of strings, which is a fixed point.

use crate::constants::TEXT_KEY_PRIORITY;
use crate::model::{CanonicalField, FieldKind, ParsedValue, TextEntry};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

// =============================================================================
// NORMALIZER CONFIGURATION
// =============================================================================

/// Configuration for the structure normalizer.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Key names tried, in priority order, when reducing a structured list
    /// element to one descriptive string.
    pub text_key_priority: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            text_key_priority: TEXT_KEY_PRIORITY.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl NormalizerConfig {
    /// Replace the text key priority list.
    pub fn with_text_key_priority(mut self, keys: Vec<String>) -> Self {
        self.text_key_priority = keys;
        self
    }
}

// =============================================================================
// STRUCTURE NORMALIZER
// =============================================================================

/// Normalizes a [`ParsedValue`] into a [`CanonicalField`] for one field kind.
///
/// # Example
///
/// ```rust,ignore
/// use proposal_pipeline::{CanonicalField, FieldKind, ParsedValue, StructureNormalizer};
///
/// let normalizer = StructureNormalizer::new();
/// let value = ParsedValue::Structured(serde_json::json!(["Step 1", "Step 2"]));
/// let field = normalizer.normalize(value, FieldKind::ImplementationSteps);
/// assert!(matches!(field, CanonicalField::TextList { .. }));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StructureNormalizer {
    config: NormalizerConfig,
}

impl StructureNormalizer {
    /// Create a normalizer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a normalizer from a custom configuration.
    pub fn from_config(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Normalize one parsed value for the given field kind.
    ///
    /// `Unparsed` input becomes `RawText` with no fallback flag set;
    /// classification is the fallback classifier's job, not this one's.
    pub fn normalize(&self, value: ParsedValue, kind: FieldKind) -> CanonicalField {
        match value {
            ParsedValue::Unparsed(text) => CanonicalField::raw_text(text),
            ParsedValue::Structured(v) => self.normalize_value(&v, kind),
        }
    }

    fn normalize_value(&self, value: &Value, kind: FieldKind) -> CanonicalField {
        match value {
            Value::Array(items) => {
                CanonicalField::text_list(items.iter().map(|e| self.element_text(e)).collect())
            }
            Value::Object(map) => {
                // Same-role nesting the parser did not see (e.g. a structured
                // value handed in pre-wrapped): unwrap one level.
                let mut keys = vec![kind.key()];
                keys.extend_from_slice(kind.aliases());
                for key in keys {
                    if let Some(inner @ (Value::Object(_) | Value::Array(_))) = map.get(key) {
                        debug!(field = %kind, "unwrapped same-role nesting during normalization");
                        return self.normalize_value(inner, kind);
                    }
                }

                // The AI grouped content under category keys. Category
                // structure is meaningful and must survive, for list-like
                // and summary kinds alike.
                let entries: BTreeMap<String, TextEntry> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), self.entry_for(v)))
                    .collect();
                CanonicalField::text_map(entries)
            }
            Value::Null => CanonicalField::raw_text(String::new()),
            scalar => CanonicalField::raw_text(scalar_text(scalar)),
        }
    }

    /// Reduce one mapping value to a text entry, keeping order for
    /// sequences.
    fn entry_for(&self, value: &Value) -> TextEntry {
        match value {
            Value::Array(items) => {
                TextEntry::Many(items.iter().map(|e| self.element_text(e)).collect())
            }
            other => TextEntry::Single(self.element_text(other)),
        }
    }

    /// Reduce one list element to a single descriptive string.
    ///
    /// Structured elements are probed with the configured key priority
    /// list; when none of the keys holds a string, the whole element is
    /// serialized so no information is lost.
    fn element_text(&self, value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Object(map) => {
                for key in &self.config.text_key_priority {
                    if let Some(Value::String(s)) = map.get(key.as_str()) {
                        return s.clone();
                    }
                }
                debug!("no descriptive key in list element, serializing whole element");
                value.to_string()
            }
            other => scalar_text(other),
        }
    }
}

/// Stringify a scalar leaf without JSON quoting around strings.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
