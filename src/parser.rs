//! Recovery parser for malformed AI response values.
//!
//! Turns an opaque raw value into a best-effort parsed value. Model output
//! that should be JSON often arrives wrapped in markdown fences, prefixed
//! with a stray `json` word, embedded in prose, or escaped one level too
//! deep. The parser applies an ordered sequence of recovery strategies and
//! never fails: worst case it returns [`ParsedValue::Unparsed`] carrying the
//! original string byte-for-byte, not a partially-mangled derivative.
//!
//! # Recovery order
//!
//! 1. Structured values pass through unchanged.
//! 2. Strip noise: fences (with or without a language tag), a leading bare
//!    `json` word, surrounding whitespace.
//! 3. Balanced-brace extraction of the first `{...}` group in the text.
//! 4. Decode; on failure, reverse one level of JSON escaping and retry once.
//! 5. Unwrap a double-wrapped field (a `summary` key holding another object
//!    when the caller asked for the summary field).
//!
//! # Known limitation
//!
//! The balanced-brace scanner counts every `{` and `}` it sees and does not
//! track string-literal quoting. A brace inside a quoted string value can
//! therefore terminate extraction early, and such input degrades to
//! `Unparsed`. This is deliberate, documented behavior: the scanner is
//! strictly more robust than a non-greedy regex for nested objects, and
//! guessing at quote repair could change behavior on currently-working
//! inputs.

use crate::constants::{DEFAULT_MAX_UNWRAP_DEPTH, FENCE, NOISE_PREFIXES};
use crate::model::{FieldKind, ParsedValue};
use serde_json::Value;
use tracing::debug;

// =============================================================================
// BALANCED-BRACE EXTRACTION
// =============================================================================

/// Extract the first balanced `{...}` group from `text`, if any.
///
/// Scans character-by-character with an open-brace counter: the first `{`
/// marks the candidate start, and when the counter returns to zero the
/// substring up to and including that `}` is the extraction candidate,
/// returned unaltered byte-for-byte. Braces inside quoted string values are
/// not special-cased (see the module docs).
///
/// This is the only non-constant-cost path in the pipeline; it is a single
/// linear scan bounded by input length.
pub fn extract_balanced(text: &str) -> Option<&str> {
    let mut depth: usize = 0;
    let mut start: Option<usize> = None;

    for (i, ch) in text.char_indices() {
        match ch {
            '{' => {
                if start.is_none() {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        return start.map(|s| &text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }

    None
}

// =============================================================================
// PARSER CONFIGURATION
// =============================================================================

/// Configuration for the recovery parser.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Bare words stripped from the front of a response body.
    pub noise_prefixes: Vec<String>,

    /// How many levels of same-name double-wrapping to unwrap.
    pub max_unwrap_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            noise_prefixes: NOISE_PREFIXES.iter().map(|s| s.to_string()).collect(),
            max_unwrap_depth: DEFAULT_MAX_UNWRAP_DEPTH,
        }
    }
}

impl ParserConfig {
    /// Replace the noise prefix list.
    pub fn with_noise_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.noise_prefixes = prefixes;
        self
    }

    /// Set the unwrap depth for double-wrapped fields.
    pub fn with_max_unwrap_depth(mut self, depth: usize) -> Self {
        self.max_unwrap_depth = depth;
        self
    }
}

// =============================================================================
// RECOVERY PARSER
// =============================================================================

/// Best-effort parser for one raw AI response value.
///
/// # Example
///
/// ```rust,ignore
/// use proposal_pipeline::{FieldKind, ParsedValue, RecoveryParser};
///
/// let parser = RecoveryParser::new();
/// let raw = serde_json::json!("```json\n{\"summary\": \"ok\"}\n```");
/// match parser.parse(&raw, FieldKind::Summary) {
///     ParsedValue::Structured(v) => assert_eq!(v["summary"], "ok"),
///     ParsedValue::Unparsed(_) => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecoveryParser {
    config: ParserConfig,
}

impl RecoveryParser {
    /// Create a parser with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser from a custom configuration.
    pub fn from_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse one raw value for the given field.
    ///
    /// Structured values pass through unchanged (after double-wrap
    /// unwrapping); strings go through the full recovery sequence. Never
    /// fails: irrecoverable strings come back as `Unparsed` with the
    /// original text intact.
    pub fn parse(&self, raw: &Value, kind: FieldKind) -> ParsedValue {
        match raw {
            Value::String(s) => self.parse_str(s, kind),
            other => ParsedValue::Structured(self.unwrap_nested(other.clone(), kind)),
        }
    }

    /// Parse a raw string for the given field.
    pub fn parse_str(&self, original: &str, kind: FieldKind) -> ParsedValue {
        match self.parse_root(original) {
            ParsedValue::Structured(v) => {
                ParsedValue::Structured(self.unwrap_nested(v, kind))
            }
            unparsed => unparsed,
        }
    }

    /// Parse a raw string holding a whole response payload.
    ///
    /// Same recovery sequence as [`Self::parse_str`] without the same-name
    /// unwrap, which only applies when recovering a single named field.
    pub fn parse_root(&self, original: &str) -> ParsedValue {
        let stripped = self.strip_noise(original);
        if stripped.is_empty() {
            return ParsedValue::Unparsed(original.to_string());
        }

        // Prefer the balanced-brace candidate; fall back to the stripped
        // text for bare arrays or scalar JSON.
        let candidate = extract_balanced(&stripped).unwrap_or(stripped.as_str());

        if let Some(value) = self.try_decode(candidate) {
            return ParsedValue::Structured(value);
        }

        // One de-escape retry for content that arrived escaped one level
        // too deep (literal \" \n \t sequences).
        let unescaped = unescape(candidate);
        if unescaped != candidate {
            if let Some(value) = self.try_decode(&unescaped) {
                debug!("recovered value after de-escape retry");
                return ParsedValue::Structured(value);
            }
        }

        ParsedValue::Unparsed(original.to_string())
    }

    /// Attempt a structured decode, keeping only object/array results.
    ///
    /// A bare JSON scalar ("42", "true") is not useful structure for this
    /// pipeline; treating it as unparsed preserves the original text for
    /// the raw-text path.
    fn try_decode(&self, candidate: &str) -> Option<Value> {
        match serde_json::from_str::<Value>(candidate) {
            Ok(v @ (Value::Object(_) | Value::Array(_))) => Some(v),
            Ok(_) | Err(_) => None,
        }
    }

    /// Strip known noise from around a response body: markdown fences with
    /// an optional language tag, a leading bare `json` word, whitespace.
    fn strip_noise(&self, text: &str) -> String {
        let mut t = text.trim();

        if let Some(rest) = t.strip_prefix(FENCE) {
            // Drop the fence line including any language tag.
            t = match rest.find('\n') {
                Some(i) => &rest[i + 1..],
                None => rest,
            };
            debug!("stripped leading code fence");
        }
        if let Some(rest) = t.trim_end().strip_suffix(FENCE) {
            t = rest;
        }
        t = t.trim();

        for prefix in &self.config.noise_prefixes {
            if let Some(rest) = t.strip_prefix(prefix.as_str()) {
                let boundary = rest
                    .chars()
                    .next()
                    .map(|c| c.is_whitespace() || c == '{' || c == '[')
                    .unwrap_or(false);
                if boundary {
                    debug!(prefix = %prefix, "stripped noise prefix");
                    t = rest.trim_start();
                    break;
                }
            }
        }

        t.trim().to_string()
    }

    /// Unwrap double-wrapped content: the AI response format inconsistently
    /// nests the requested field under its own name (`{"summary": {...}}`
    /// when the caller asked for `summary`). Unwraps up to the configured
    /// depth, and only when the inner value is itself structured.
    fn unwrap_nested(&self, mut value: Value, kind: FieldKind) -> Value {
        for _ in 0..self.config.max_unwrap_depth {
            let inner = match &value {
                Value::Object(map) => {
                    let mut keys = vec![kind.key()];
                    keys.extend_from_slice(kind.aliases());
                    keys.into_iter().find_map(|k| {
                        map.get(k)
                            .filter(|v| v.is_object() || v.is_array())
                            .cloned()
                    })
                }
                _ => None,
            };

            match inner {
                Some(v) => {
                    debug!(field = %kind, "unwrapped double-wrapped field");
                    value = v;
                }
                None => break,
            }
        }
        value
    }
}

/// Reverse one level of JSON escaping.
fn unescape(text: &str) -> String {
    text.replace("\\\"", "\"")
        .replace("\\n", "\n")
        .replace("\\t", "\t")
}

// =============================================================================
// TESTS
// =============================================================================
