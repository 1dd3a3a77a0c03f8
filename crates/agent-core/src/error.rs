//! Error types for agent-core

use thiserror::Error;

/// Result type alias for agent-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for tool execution and chat processing
#[derive(Error, Debug)]
pub enum Error {
    /// Generic error message
    #[error("{0}")]
    Generic(String),

    /// Component initialization failed (missing provider, bad config, ...)
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Processing failed
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    /// A tool call named a tool that is not registered
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The argument payload of a tool call could not be decoded
    #[error("Malformed arguments for tool '{tool}': {reason}")]
    MalformedToolArguments {
        /// Name of the tool the arguments were meant for
        tool: String,
        /// Decoder message
        reason: String,
    },
}

impl Error {
    /// Whether the error should be reported back to the model as a tool
    /// result instead of aborting the conversation
    pub fn is_tool_error(&self) -> bool {
        matches!(
            self,
            Self::ToolNotFound(_) | Self::MalformedToolArguments { .. } | Self::ProcessingFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_arguments_display() {
        let err = Error::MalformedToolArguments {
            tool: "get_stock_info".to_string(),
            reason: "EOF while parsing an object".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed arguments for tool 'get_stock_info': EOF while parsing an object"
        );
        assert!(err.is_tool_error());
    }

    #[test]
    fn test_initialization_is_not_tool_error() {
        let err = Error::InitializationFailed("Provider not set".to_string());
        assert!(!err.is_tool_error());
        assert_eq!(err.to_string(), "Initialization failed: Provider not set");
    }
}
