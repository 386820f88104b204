//! Error types for the proofreading engine.

use thiserror::Error;

/// Errors raised inside the engine.
///
/// None of these is fatal to a whole run: the driver turns paragraph-level
/// failures into [`crate::engine::Diagnostic`]s and leaves the paragraph as it was.
#[derive(Error, Debug)]
pub enum ProofError {
    /// The part is not well-formed XML.
    #[error("XML parsing error at byte {position}: {message}")]
    Xml { position: usize, message: String },

    /// A rule definition could not be built.
    #[error("invalid rule '{name}': {message}")]
    InvalidRule { name: String, message: String },

    /// A rule's replacement could not be produced for a match.
    #[error("rule '{rule}' failed to rewrite '{matched}': {message}")]
    Rewrite {
        rule: String,
        matched: String,
        message: String,
    },

    /// A resolved span does not map back onto the paragraph's segments.
    #[error("reconciliation failed: {0}")]
    Reconcile(String),

    /// Rule file or CSV audit log error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error from a rule file or audit sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, ProofError>;
