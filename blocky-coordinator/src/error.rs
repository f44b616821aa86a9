//! Error taxonomy for refreshes, setup validation and configuration.

use std::time::Duration;

/// Why a refresh of the status endpoint failed.
///
/// Recorded on the coordinator as the last failure, so it carries owned
/// messages instead of the underlying transport error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RefreshError {
    #[error("timeout communicating with API after {0:?}")]
    Timeout(Duration),
    #[error("error communicating with API: {0}")]
    Transport(String),
    #[error("API returned {0}")]
    BadStatus(u16),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl RefreshError {
    /// Classify a reqwest failure. Elapsed deadlines are handled by the caller.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            RefreshError::Timeout(timeout)
        } else if err.is_connect()
            || err.is_request()
            || err.is_body()
            || (err.is_decode() && !is_payload_error(&err))
        {
            RefreshError::Transport(err.to_string())
        } else if let Some(status) = err.status() {
            RefreshError::BadStatus(status.as_u16())
        } else {
            RefreshError::Unexpected(err.to_string())
        }
    }

    /// Short machine-friendly kind, used in logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            RefreshError::Timeout(_) => "timeout",
            RefreshError::Transport(_) => "transport",
            RefreshError::BadStatus(_) => "bad_status",
            RefreshError::Unexpected(_) => "unexpected",
        }
    }
}

/// True when the failure comes from parsing the body as JSON, not from reading it.
fn is_payload_error(err: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if inner.is::<serde_json::Error>() {
            return true;
        }
        source = inner.source();
    }
    false
}

/// Setup-time validation failures, kept apart so the user sees which one happened.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SetupError {
    #[error("cannot connect: {0}")]
    CannotConnect(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("host must not be empty")]
    EmptyHost,
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(RefreshError::Timeout(Duration::from_secs(1)).kind(), "timeout");
        assert_eq!(RefreshError::BadStatus(503).kind(), "bad_status");
        assert_eq!(RefreshError::BadStatus(503).to_string(), "API returned 503");
    }
}
