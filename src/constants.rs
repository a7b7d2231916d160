//! Centralized constants for the proposal pipeline.
//!
//! This module provides a single source of truth for all magic values,
//! default thresholds, and the upstream placeholder vocabulary used
//! throughout the crate.

// ============================================================================
// Recovery Parser Constants
// ============================================================================

/// Bare noise words the AI sometimes prefixes to a JSON body
/// (e.g. `"json\n{...}"` left over from a stripped markdown fence).
pub const NOISE_PREFIXES: &[&str] = &["json", "JSON"];

/// Markdown code fence delimiter stripped from response bodies.
pub const FENCE: &str = "```";

/// Maximum number of same-name unwrap passes for double-wrapped fields.
pub const DEFAULT_MAX_UNWRAP_DEPTH: usize = 1;

// ============================================================================
// Structure Normalizer Constants
// ============================================================================

/// Key names tried, in priority order, when reducing a structured list
/// element to a single descriptive string.
pub const TEXT_KEY_PRIORITY: &[&str] =
    &["text", "description", "step", "title", "recommendation", "name"];

// ============================================================================
// Code Formatter Constants
// ============================================================================

/// Default indentation unit for reformatted Terraform code.
pub const DEFAULT_INDENT_UNIT: &str = "  ";

/// Minimum length a newline-free code string must reach before the
/// single-line reflow heuristic is attempted.
pub const DEFAULT_MIN_REFLOW_LEN: usize = 40;

/// Maximum number of consecutive blank lines kept in formatted output.
pub const DEFAULT_MAX_BLANK_LINES: usize = 2;

/// Keywords that introduce a top-level Terraform block.
pub const BLOCK_KEYWORDS: &[&str] = &[
    "resource", "data", "variable", "output", "module", "locals", "provider", "terraform",
];

/// Block-scoped attribute names worth a line of their own when reflowing.
pub const BLOCK_ATTRIBUTES: &[&str] = &[
    "depends_on",
    "lifecycle",
    "provisioner",
    "template",
    "container",
    "metadata",
    "spec",
    "traffic",
];

// ============================================================================
// Upstream Placeholder Vocabulary
// ============================================================================
// Sentinel strings the AI-calling backend substitutes when it cannot parse
// or obtain real model output. The classifier matches against these; they
// are grouped by the backend code path that emits them.

/// Code placeholder: backend got model text but could not decode it as JSON.
pub const CODE_SEE_SUMMARY: &str = "# Generated fixes - see summary above";

/// Steps placeholder for the JSON-decode failure path.
pub const STEPS_REVIEW_SUMMARY: &str = "Review the detailed summary";

/// Testing placeholder for the JSON-decode failure path.
pub const TESTING_DEV_FIRST: &str = "Test all changes in development first";

/// Code placeholder: AI features disabled (no API key configured).
pub const CODE_UNAVAILABLE: &str = "# AI-generated fixes unavailable";

/// Summary placeholder for the AI-disabled path.
pub const SUMMARY_AI_DISABLED: &str = "AI features disabled - API key not configured";

/// Steps placeholder for the AI-disabled path.
pub const STEPS_MANUAL_REVIEW: &str = "Manual review required";

/// Testing placeholder for the AI-disabled path.
pub const TESTING_MANUAL_ALL: &str = "Test all changes manually";

/// Code placeholder: proposal generation raised an exception upstream.
pub const CODE_MANUAL_REVIEW: &str = "# Manual review required";

/// Steps placeholder for the hard-failure path.
pub const STEPS_REVIEW_FINDINGS: &str = "Review findings manually";

/// Testing placeholder for the hard-failure path.
pub const TESTING_MANUAL: &str = "Test manually";

/// Prefix of the synthetic summary emitted on the hard-failure path; the
/// remainder of the string is the upstream exception message.
pub const SUMMARY_UNAVAILABLE_PREFIX: &str = "AI analysis temporarily unavailable";

/// Code placeholder used as a per-field default when the key was absent.
pub const CODE_DEFAULT: &str = "# AI-generated fixes";

/// Testing placeholder used as a per-field default when the key was absent.
pub const TESTING_THOROUGH: &str = "Test thoroughly";
