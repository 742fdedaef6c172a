//! Error types for the newsletter pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, NewsletterError>;

#[derive(Error, Debug)]
pub enum NewsletterError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Plan parse error: {0}")]
    PlanParse(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Fetch error: {message}")]
    Fetch { message: String, transient: bool },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Render error: {0}")]
    Render(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NewsletterError {
    /// Transient fetch fault: connection errors, timeouts, non-success status.
    pub fn transient_fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
            transient: true,
        }
    }

    /// Non-transient fetch fault: malformed or unexpected payloads.
    pub fn fatal_fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
            transient: false,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch { transient: true, .. })
    }
}
