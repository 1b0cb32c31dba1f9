//! Error types shared across the NGT crates

use std::fmt;

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error type for foundation operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Environment resolution error
    #[error("Environment error: {0}")]
    Env(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new environment error
    pub fn env(msg: impl fmt::Display) -> Self {
        Self::Env(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::env("HOME not set");
        assert_eq!(err.to_string(), "Environment error: HOME not set");
    }
}
