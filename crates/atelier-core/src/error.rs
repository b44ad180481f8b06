use thiserror::Error;

pub type Result<T> = std::result::Result<T, AtelierError>;

#[derive(Debug, Error)]
pub enum AtelierError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider timeout: {0}")]
    ProviderTimeout(String),

    #[error("No renderable code in response: {0}")]
    MissingCode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AtelierError {
    /// Classify a reqwest failure as a timeout or a plain provider error,
    /// attaching `context` so callers can tell which provider call failed.
    pub fn from_request(err: reqwest::Error, context: &str) -> Self {
        if err.is_timeout() {
            Self::ProviderTimeout(format!("{context}: {err}"))
        } else {
            Self::Provider(format!("{context}: {err}"))
        }
    }

    /// Returns `true` when the error came from the completion provider
    /// (as opposed to local state or storage).
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::Provider(_) | Self::ProviderTimeout(_) | Self::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = AtelierError::Provider("OpenAI returned 500".into());
        assert!(err.to_string().contains("OpenAI returned 500"));
    }

    #[test]
    fn provider_failure_classification() {
        assert!(AtelierError::Provider("x".into()).is_provider_failure());
        assert!(AtelierError::ProviderTimeout("x".into()).is_provider_failure());
        assert!(!AtelierError::NotFound("x".into()).is_provider_failure());
        assert!(!AtelierError::MissingCode("x".into()).is_provider_failure());
    }
}
