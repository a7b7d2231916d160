//! Error types for the proposal pipeline.
//!
//! The pipeline itself is total: any raw AI value produces exactly one
//! canonical proposal, so the transform functions never return errors.
//! `Error` exists for the configuration surface around the transform:
//! parsing a [`crate::model::FieldKind`] from a string, validating a custom
//! fallback vocabulary, and re-encoding canonical output for a renderer.
//!
//! # Error Code Ranges
//!
//! | Range | Category |
//! |-------|----------|
//! | E001-E009 | Configuration errors |
//! | E010-E019 | Vocabulary errors |
//! | E080-E089 | Serialization errors |

use thiserror::Error;

// =============================================================================
// ERROR TYPE
// =============================================================================

/// The main error type for the proposal pipeline.
///
/// Each variant includes an error code prefix for easy identification
/// and programmatic handling. Use the `suggestion()` method to get
/// actionable guidance for resolving the error.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // CONFIGURATION ERRORS (E001-E009)
    // =========================================================================
    /// Unknown field kind identifier.
    #[error("[E002] Unknown field kind: '{0}'. Valid kinds: summary, implementation_steps, testing_recommendations, terraform_code")]
    UnknownFieldKind(String),

    // =========================================================================
    // VOCABULARY ERRORS (E010-E019)
    // =========================================================================
    /// A fallback vocabulary is unusable as a lookup table.
    #[error("[E010] Invalid fallback vocabulary: {0}")]
    VocabularyInvalid(String),

    // =========================================================================
    // SERIALIZATION ERRORS (E080-E089)
    // =========================================================================
    /// JSON serialization/deserialization error.
    #[error("[E080] JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// CONSTRUCTOR METHODS
// =============================================================================

impl Error {
    /// Create an invalid vocabulary error.
    pub fn vocabulary_invalid(details: impl Into<String>) -> Self {
        Self::VocabularyInvalid(details.into())
    }
}

// =============================================================================
// ERROR METADATA
// =============================================================================

impl Error {
    /// Get the error code (e.g., "E010").
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownFieldKind(_) => "E002",
            Self::VocabularyInvalid(_) => "E010",
            Self::Json(_) => "E080",
        }
    }

    /// Get a suggestion for how to resolve the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::UnknownFieldKind(_) => Some(
                "Use one of: summary, implementation_steps, testing_recommendations, \
                 terraform_code (ai_proposal is accepted as an alias for summary)",
            ),
            Self::VocabularyInvalid(_) => Some(
                "Every vocabulary family needs a non-empty name, code, steps, and \
                 testing placeholder. Start from FallbackVocabulary::default() and \
                 extend it",
            ),
            Self::Json(_) => Some("Check the JSON syntax for errors"),
        }
    }
}

// =============================================================================
// RESULT TYPE ALIAS
// =============================================================================

/// A Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// TESTS
// =============================================================================
