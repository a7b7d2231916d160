//! # proposal-pipeline
//!
//! Recovery and normalization pipeline for AI-generated security remediation
//! proposals.
//!
//! ## Overview
//!
//! The surrounding system asks a generative model for remediation proposals
//! (summary, implementation steps, testing recommendations, Terraform fixes)
//! and receives nominally-JSON text that is frequently malformed: wrapped in
//! prose or markdown fences, partially escaped, double-wrapped, or replaced
//! wholesale by the upstream backend's own placeholder text. This crate turns
//! that opaque value into a canonical, renderable structure without ever
//! failing and without losing information, while telling genuine content
//! apart from a degraded fallback answer.
//!
//! ## Architecture
//!
//! ```text
//! Raw AI response value (string | object | null)
//!        |
//!        v
//! +------------------+
//! |  RecoveryParser  |  <-- strip noise, extract braces, de-escape, unwrap
//! +------------------+
//!        |
//!        v
//! +---------------------+
//! | StructureNormalizer |  <-- coerce into TextMap / TextList / RawText
//! +---------------------+
//!        |
//!        v
//! +--------------------+
//! | FallbackClassifier |  <-- detect upstream placeholder substitutions
//! +--------------------+
//!        |
//!        v
//! +---------------------+
//! | TerraformFormatter  |  <-- pretty-print embedded IaC snippets
//! +---------------------+
//!        |
//!        v
//!   CanonicalProposal (safe to render directly)
//! ```
//!
//! Every component is a pure, synchronous function over its inputs: no I/O,
//! no shared mutable state, no hidden caches. The pipeline never signals
//! failure to its caller; irrecoverable input degrades to
//! [`model::CanonicalField::RawText`] with the original text preserved.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use proposal_pipeline::ProposalPipeline;
//!
//! let pipeline = ProposalPipeline::new();
//! let payload = serde_json::json!({
//!     "summary": "Service allows unauthenticated invocation.",
//!     "implementation_steps": ["Remove allUsers binding", "Redeploy"],
//!     "terraform_code": "resource \"google_cloud_run_service_iam_policy\" \"p\" { }",
//! });
//!
//! let proposal = pipeline.process(&payload);
//! assert!(!proposal.is_fallback);
//! ```

// Module declarations
pub mod classifier;
pub mod constants;
pub mod error;
pub mod formatter;
pub mod model;
pub mod normalizer;
pub mod parser;
pub mod pipeline;
pub mod tracing_setup;

// ============================================================================
// Type Aliases
// ============================================================================
// Common type aliases to reduce duplication and improve readability.

/// Type alias for a category label in a [`model::CanonicalField::TextMap`]
/// (typically a severity tier or grouping key chosen by the model).
pub type CategoryLabel = String;

/// Type alias for renderer-facing notice strings.
pub type Notice = String;

// Re-exports for convenient access
pub use classifier::{FallbackClassifier, FallbackVocabulary, PlaceholderFamily, ProposalFields};
pub use constants::*;
pub use error::{Error, Result};
pub use formatter::{FormatterConfig, TerraformFormatter};
pub use model::{
    CanonicalField, CanonicalProposal, CodeBlock, FallbackSignal, FieldKind, ParsedValue,
    TextEntry,
};
pub use normalizer::{NormalizerConfig, StructureNormalizer};
pub use parser::{extract_balanced, ParserConfig, RecoveryParser};
pub use pipeline::{PipelineBuilder, ProposalPipeline};
pub use tracing_setup::{setup_logging, should_use_json};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
