use thiserror::Error;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Login was not confirmed by the operator")]
    LoginDenied,

    #[error("Browser error: {0}")]
    BrowserError(String),

    #[error("Navigation error: {0}")]
    NavigationError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Storage error: {0}")]
    StorageError(String),
}

/// How a caller is expected to react to an error class.
#[derive(Debug, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Abort the run after releasing resources.
    Fatal,
    /// Report and let the caller decide; nothing was persisted.
    Recoverable,
    /// Skip the offending entry and keep going.
    SkipAndContinue,
}

impl ScrapeError {
    pub fn policy(&self) -> ErrorPolicy {
        match self {
            ScrapeError::ConfigError(_) => ErrorPolicy::Fatal,
            ScrapeError::LoginDenied => ErrorPolicy::Recoverable,
            ScrapeError::BrowserError(_) => ErrorPolicy::Fatal,
            ScrapeError::NavigationError(_) => ErrorPolicy::Fatal,
            ScrapeError::ParseError(_) => ErrorPolicy::SkipAndContinue,
            ScrapeError::StorageError(_) => ErrorPolicy::Fatal,
        }
    }
}

// Conversion implementations for common error types
impl From<std::io::Error> for ScrapeError {
    fn from(err: std::io::Error) -> Self {
        ScrapeError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(err: serde_json::Error) -> Self {
        ScrapeError::ParseError(err.to_string())
    }
}

impl From<toml::de::Error> for ScrapeError {
    fn from(err: toml::de::Error) -> Self {
        ScrapeError::ConfigError(err.to_string())
    }
}

impl From<chromiumoxide::error::CdpError> for ScrapeError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        ScrapeError::BrowserError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_policies() {
        assert_eq!(
            ScrapeError::ConfigError("bad limit".into()).policy(),
            ErrorPolicy::Fatal
        );
        assert_eq!(ScrapeError::LoginDenied.policy(), ErrorPolicy::Recoverable);
        assert_eq!(
            ScrapeError::ParseError("missing field".into()).policy(),
            ErrorPolicy::SkipAndContinue
        );
    }
}
