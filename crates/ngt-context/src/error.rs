//! Context error types

use std::fmt;

/// Result type for context operations
pub type Result<T> = std::result::Result<T, ContextError>;

/// Context error type
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// No context is registered under the given id
    #[error("Context not found: {0}")]
    ContextNotFound(String),

    /// An ambient-context accessor was used outside any ambient scope
    #[error("No ambient context entered on this thread")]
    NoAmbientContext,

    /// A required interface has no registrant
    #[error("No registrant for interface {0}")]
    InterfaceUnavailable(String),
}

impl ContextError {
    /// Create a new context not found error
    pub fn not_found(id: impl fmt::Display) -> Self {
        Self::ContextNotFound(id.to_string())
    }

    /// Create a new unavailable interface error
    pub fn unavailable(name: impl fmt::Display) -> Self {
        Self::InterfaceUnavailable(name.to_string())
    }
}
