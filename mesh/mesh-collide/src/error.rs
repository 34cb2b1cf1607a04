//! Error types for hierarchy construction.

use thiserror::Error;

/// Errors that can occur while building a collision hierarchy.
#[derive(Debug, Error)]
pub enum CollideError {
    /// The input triangle list was empty.
    ///
    /// Every node bounds at least one triangle, so an empty tree has
    /// no meaningful root. Construction rejects this up front instead
    /// of reading a first element that does not exist.
    #[error("cannot build a hierarchy from an empty triangle list")]
    EmptyTriangleList,

    /// A construction parameter was outside its valid range.
    #[error("invalid configuration: {details}")]
    InvalidConfig {
        /// Description of the offending setting.
        details: String,
    },
}

/// Result type for hierarchy operations.
pub type CollideResult<T> = Result<T, CollideError>;
