use thiserror::Error;

/// Main error type for the swap pipeline
#[derive(Error, Debug)]
pub enum SwaplineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Submission errors (rejected before enqueue, never retried)
    #[error("Validation failed: {0}")]
    Validation(String),

    // Routing errors
    #[error("No quotes returned from DEX router")]
    NoQuotesAvailable,

    // Swap execution errors (pipeline failure, retryable by the queue)
    #[error("Swap execution failed: {0}")]
    Execution(String),

    #[error("Provider call timed out after {elapsed_ms}ms")]
    StageTimeout { elapsed_ms: u64 },

    // Queue intake errors (fatal to submission, surfaced immediately)
    #[error("Queue intake failed: {0}")]
    QueueIntake(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SwaplineError {
    /// Whether the queue should re-attempt the pipeline after this failure.
    /// Validation never reaches the queue; everything else that escapes a
    /// pipeline run is considered transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SwaplineError::Validation(_))
    }
}

/// Result type alias for SwaplineError
pub type Result<T> = std::result::Result<T, SwaplineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_quotes_message_matches_router_contract() {
        let err = SwaplineError::NoQuotesAvailable;
        assert_eq!(err.to_string(), "No quotes returned from DEX router");
        assert!(err.is_retryable());
    }

    #[test]
    fn validation_errors_are_not_retryable() {
        assert!(!SwaplineError::Validation("amount".into()).is_retryable());
        assert!(SwaplineError::Execution("venue down".into()).is_retryable());
    }
}
