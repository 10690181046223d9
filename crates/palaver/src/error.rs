/// Client-specific result type
pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors surfaced by the chat client
///
/// Every outcome, including a malformed payload, is expressed as one of
/// these variants; the classifier and the streaming bridge never panic past
/// their boundary.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The remote service reported a logical failure in its response body
    #[error("api error ({kind}): {message}")]
    Api {
        /// Human-readable error message
        message: String,
        /// Error type identifier, e.g. `invalid_request_error`
        kind: String,
        /// Request parameter the error refers to
        param: Option<String>,
        /// Machine-readable error code
        code: Option<String>,
    },

    /// Network or connection-level failure, forwarded from the transport
    /// without reinterpretation
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Payload received but matched no expected shape
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Invalid client configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}
