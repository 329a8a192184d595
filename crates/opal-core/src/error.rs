//! Error types and result aliases for the Opal compiler.
//!
//! Every variant here is a *compilation abandonment*: the caller discards the
//! compilation unit and may retry at a different tier. Programming errors
//! (malformed strategy tables, unregistered optimizations, scheduling a pass
//! after its last permitted run) are defects, not runtime conditions, and
//! panic instead.

use crate::options::Hotness;
use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the Opal compiler.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The method exceeded the block or loop complexity limits.
    #[error("method is too complex ({blocks} blocks, {loops} loops)")]
    #[diagnostic(code(opal::excessive_complexity))]
    ExcessiveComplexity { blocks: usize, loops: usize },

    /// An external controller requested that this compilation be abandoned.
    /// Polled cooperatively between optimizations, never preemptively.
    #[error("compilation interrupted: {0}")]
    #[diagnostic(code(opal::interrupted))]
    Interrupted(String),

    /// The compilation must be redone at a more aggressive tier.
    #[error("method needs to be compiled at {required:?}")]
    #[diagnostic(code(opal::insufficiently_aggressive))]
    InsufficientlyAggressive { required: Hotness },
}

/// Result type alias using the Opal Error type.
pub type Result<T> = std::result::Result<T, Error>;
