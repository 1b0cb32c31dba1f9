//! Plugin ABI error types

/// Result type for plugin ABI operations
pub type Result<T> = std::result::Result<T, PluginError>;

/// Plugin ABI error type
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// The entry point was invoked with a state value outside the enum
    #[error("Unknown load state {0}")]
    UnknownState(u32),

    /// A handshake environment variable was not set
    #[error("Handshake variable {0} is not set")]
    MissingHandshake(String),

    /// A handshake environment variable did not parse as a pointer
    #[error("Handshake variable {var} holds an invalid pointer: {raw:?}")]
    BadPointer {
        /// Variable name
        var: String,
        /// The raw value found
        raw: String,
    },
}

impl PluginError {
    /// Create a new missing handshake error
    pub fn missing_handshake(var: impl Into<String>) -> Self {
        Self::MissingHandshake(var.into())
    }

    /// Create a new bad pointer error
    pub fn bad_pointer(var: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::BadPointer {
            var: var.into(),
            raw: raw.into(),
        }
    }
}
