//! Retry policy configuration shared by all step handlers.

use serde::{Deserialize, Serialize};

/// System-wide default retry budget.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default first-attempt backoff in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;
/// Default backoff ceiling in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
/// Default exponential backoff multiplier.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Full retry policy for an external call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts after the first; total attempts are `1 + max_retries`.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any single computed delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Factor applied to the delay after each attempt.
    pub backoff_multiplier: f64,
    /// When true, each delay is scaled by a uniform factor in `[0.5, 1.0]`.
    pub jitter: bool,
    /// HTTP status codes considered transient.
    pub retryable_statuses: Vec<u16>,
    /// Case-insensitive substrings identifying transient error messages.
    pub retryable_error_patterns: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: true,
            retryable_statuses: vec![408, 429, 500, 502, 503, 504],
            retryable_error_patterns: vec![
                "network".to_string(),
                "timeout".to_string(),
                "timed out".to_string(),
                "connection reset".to_string(),
                "connection refused".to_string(),
                "socket hang up".to_string(),
                "rate limit".to_string(),
            ],
        }
    }
}

impl RetryConfig {
    /// Policy with a custom retry count and default classification rules.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }
}

/// Per-step retry directive as authored in step configuration.
///
/// Absent or `false` means no retry; `true` selects the default policy; a
/// number overrides only the retry count; an object supplies a full policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RetryDirective {
    Enabled(bool),
    Count(u32),
    Policy(RetryConfig),
}

impl Default for RetryDirective {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

impl RetryDirective {
    /// Materializes the directive into a policy, or `None` when retries are
    /// disabled for the step.
    pub fn to_config(&self) -> Option<RetryConfig> {
        match self {
            Self::Enabled(false) => None,
            Self::Enabled(true) => Some(RetryConfig::default()),
            Self::Count(count) => Some(RetryConfig::with_max_retries(*count)),
            Self::Policy(config) => Some(config.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_deserializes_all_shapes() {
        let flag: RetryDirective = serde_json::from_str("true").expect("bool");
        assert_eq!(flag.to_config().expect("enabled").max_retries, DEFAULT_MAX_RETRIES);

        let count: RetryDirective = serde_json::from_str("5").expect("count");
        assert_eq!(count.to_config().expect("count").max_retries, 5);

        let policy: RetryDirective =
            serde_json::from_str(r#"{"max_retries": 1, "base_delay_ms": 10, "jitter": false}"#).expect("policy");
        let config = policy.to_config().expect("policy config");
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.base_delay_ms, 10);
        assert!(!config.jitter);
        // Unspecified fields fall back to the system defaults.
        assert_eq!(config.max_delay_ms, DEFAULT_MAX_DELAY_MS);
    }

    #[test]
    fn directive_defaults_to_disabled() {
        assert_eq!(RetryDirective::default().to_config(), None);
        let off: RetryDirective = serde_json::from_str("false").expect("bool");
        assert_eq!(off.to_config(), None);
    }
}
