//! Error taxonomy shared by the core components

/// Errors produced by credential, API and stream operations.
///
/// Every failure is local to the operation that produced it. Callers log and
/// move on; nothing here is fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No token is cached and none could be resolved from settings
    #[error("No API token configured")]
    NoCredential,

    /// Network failure, non-JSON response or unreadable body
    #[error("Transport error calling {method}: {message}")]
    Transport { method: String, message: String },

    /// The service answered with `ok: false`
    #[error("Slack API error calling {method}: {code}")]
    Api { method: String, code: String },

    /// The realtime connection closed or failed
    #[error("Realtime stream disconnected: {reason}")]
    StreamDisconnect { reason: String },
}

impl Error {
    pub(crate) fn transport(method: &str, message: impl std::fmt::Display) -> Self {
        Error::Transport {
            method: method.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn stream(reason: impl std::fmt::Display) -> Self {
        Error::StreamDisconnect {
            reason: reason.to_string(),
        }
    }
}

/// Result alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
