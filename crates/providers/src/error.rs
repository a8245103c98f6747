//! Provider failure type shared by all outbound clients.

use thiserror::Error;

/// A failed call to an external provider.
///
/// `status` is populated for HTTP-level failures so the engine's retry
/// utility can classify them against its retryable status list; transport
/// and provider-application failures carry only a message and are classified
/// by substring instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    /// HTTP status code, when the provider answered at all.
    pub status: Option<u16>,
    /// Failure description; provider error bodies are preserved verbatim.
    pub message: String,
}

impl ProviderError {
    /// Failure derived from a non-success HTTP response.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Failure with no usable HTTP status (transport errors, provider-side
    /// `ok: false` responses, configuration problems).
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        Self {
            status: error.status().map(|code| code.as_u16()),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ProviderError;

    #[test]
    fn display_preserves_message_verbatim() {
        let error = ProviderError::http(503, r#"{"error":"upstream unavailable"}"#);
        assert_eq!(error.to_string(), r#"{"error":"upstream unavailable"}"#);
        assert_eq!(error.status, Some(503));
    }
}
