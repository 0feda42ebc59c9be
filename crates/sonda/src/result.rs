//! Result and error types for Sonda.

use thiserror::Error;

/// Result type for Sonda operations
pub type SondaResult<T> = Result<T, SondaError>;

/// Broad classification of a [`SondaError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The app answered outside the outcome vocabulary, or the hook is unreachable
    Protocol,
    /// A condition was never met within its deadline
    Timeout,
    /// The app answered, but the observed value contradicts the assertion
    Expectation,
    /// Malformed caller input (locators, scenarios, config)
    Input,
    /// Browser, filesystem or transport trouble outside the app
    Environment,
}

/// Errors that can occur in Sonda
#[derive(Debug, Error)]
pub enum SondaError {
    /// The app's global test-hook object is missing (usually mid-reload)
    #[error("Test hook `window.{hook}` is not available (has the app reloaded?)")]
    HookUnavailable {
        /// Name of the hook object
        hook: String,
    },

    /// Script execution failed inside the page or on the way there
    #[error("Script execution failed: {message}")]
    Script {
        /// Error message
        message: String,
    },

    /// The app answered with something outside the outcome vocabulary
    #[error("Protocol violation in {action}: unexpected outcome {raw:?}")]
    Protocol {
        /// Action being performed
        action: String,
        /// Raw value received from the app
        raw: String,
    },

    /// Operation timed out
    #[error("{action} timed out after {ms}ms{}", last.as_ref().map(|l| format!(" (last: {l})")).unwrap_or_default())]
    Timeout {
        /// Action and locator that never became ready
        action: String,
        /// Timeout in milliseconds
        ms: u64,
        /// Last diagnostic reported before giving up
        last: Option<String>,
    },

    /// Observed state contradicts what the step asserted
    #[error("Expectation failed: {message}")]
    Expectation {
        /// Error message
        message: String,
    },

    /// Locator string could not be parsed
    #[error("Invalid locator {input:?}: {reason}")]
    InvalidLocator {
        /// The locator as written
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// Scenario file could not be understood
    #[error("Invalid scenario: {message}")]
    InvalidScenario {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl SondaError {
    /// Create a script execution error
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }

    /// Create a protocol violation error
    #[must_use]
    pub fn protocol(action: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Protocol {
            action: action.into(),
            raw: raw.into(),
        }
    }

    /// Create an expectation failure
    #[must_use]
    pub fn expectation(message: impl Into<String>) -> Self {
        Self::Expectation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a scenario error
    #[must_use]
    pub fn invalid_scenario(message: impl Into<String>) -> Self {
        Self::InvalidScenario {
            message: message.into(),
        }
    }

    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::HookUnavailable { .. } | Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Expectation { .. } => ErrorKind::Expectation,
            Self::InvalidLocator { .. }
            | Self::InvalidScenario { .. }
            | Self::Config { .. }
            | Self::Json(_)
            | Self::Yaml(_) => ErrorKind::Input,
            Self::Script { .. }
            | Self::BrowserLaunch { .. }
            | Self::Navigation { .. }
            | Self::Io(_) => ErrorKind::Environment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_action_and_last_detail() {
        let err = SondaError::Timeout {
            action: "press \"Submit\"".to_string(),
            ms: 6000,
            last: Some("Element not found".to_string()),
        };
        let text = err.to_string();
        assert!(text.contains("press \"Submit\""));
        assert!(text.contains("6000ms"));
        assert!(text.contains("Element not found"));
    }

    #[test]
    fn test_timeout_message_without_last_detail() {
        let err = SondaError::Timeout {
            action: "settle".to_string(),
            ms: 10,
            last: None,
        };
        assert_eq!(err.to_string(), "settle timed out after 10ms");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            SondaError::protocol("find", "garbage").kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            SondaError::HookUnavailable {
                hook: "behat".to_string()
            }
            .kind(),
            ErrorKind::Protocol
        );
        assert_eq!(SondaError::expectation("x").kind(), ErrorKind::Expectation);
        assert_eq!(SondaError::script("x").kind(), ErrorKind::Environment);
        assert_eq!(SondaError::config("x").kind(), ErrorKind::Input);
    }
}
