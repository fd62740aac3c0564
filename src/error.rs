//! Top-level error types for Guildbot.

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
///
/// Completion failures are deliberately absent: the orchestrator absorbs
/// [`CompletionError`] into a user-visible fallback reply instead of
/// propagating it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required credential: {0}")]
    MissingCredential(&'static str),

    #[error("failed to load alias table from {path}: {detail}")]
    AliasTable { path: String, detail: String },
}

/// Completion-endpoint errors.
///
/// `NotConfigured` is the per-request degraded path: the process starts
/// without an API key and every model turn short-circuits to a static
/// reply instead.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion endpoint not configured")]
    NotConfigured,

    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("completion endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("completion response contained no text")]
    EmptyResponse,
}

/// Messaging-gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("discord API error: {0}")]
    Discord(#[from] serenity::Error),
}

impl GatewayError {
    /// True when the triggering interaction no longer exists on Discord's
    /// side (expired token, deleted original message, or an unknown
    /// interaction id). A second reply attempt would fail the same way, so
    /// callers drop the reply instead of retrying.
    pub fn is_interaction_gone(&self) -> bool {
        let GatewayError::Discord(serenity::Error::Http(
            serenity::http::HttpError::UnsuccessfulRequest(response),
        )) = self
        else {
            return false;
        };

        // 10008 unknown message, 10015 unknown webhook, 10062 unknown interaction
        matches!(response.error.code, 10008 | 10015 | 10062)
    }
}
