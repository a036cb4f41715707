//! Pipeline error types shared by extraction and sync
//!
//! Field-level failures degrade to empty defaults inside the extractors; the
//! variants here surface item-level and phase-level failures with enough
//! context to decide whether to retry, skip or abort.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Navigation failed for {target}: {reason}")]
    NavigationFailure { target: String, reason: String },

    #[error("No selector matched for '{field}' (tried: {})", tried_selectors.join(", "))]
    SelectorMiss {
        field: String,
        tried_selectors: Vec<String>,
    },

    #[error("Element reference went stale: {context}")]
    StaleReference { context: String },

    #[error("Throttled by remote after retry: wait {retry_after:?}")]
    Throttled { retry_after: Duration, path: String },

    #[error("Remote rejected {method} {path}: {status} - {message}")]
    RemoteRejected {
        method: String,
        path: String,
        status: u16,
        message: String,
    },

    #[error("Setup failed: {message}")]
    SetupFailure { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Browser driver error: {message}")]
    Driver { message: String },

    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String, field: String },
}

impl PipelineError {
    pub fn navigation_failure(target: &str, reason: impl Into<String>) -> Self {
        Self::NavigationFailure {
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    pub fn selector_miss(field: &str, tried_selectors: &[String]) -> Self {
        Self::SelectorMiss {
            field: field.to_string(),
            tried_selectors: tried_selectors.to_vec(),
        }
    }

    pub fn stale(context: impl Into<String>) -> Self {
        Self::StaleReference {
            context: context.into(),
        }
    }

    pub fn setup(message: impl Into<String>) -> Self {
        Self::SetupFailure {
            message: message.into(),
        }
    }

    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn invalid_selector(selector: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }

    pub fn configuration(field: &str, message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.to_string(),
        }
    }

    /// Stale references and selector misses are expected on a live catalog
    /// and only cost the current item or field.
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::NavigationFailure { .. }
            | Self::SelectorMiss { .. }
            | Self::StaleReference { .. }
            | Self::Throttled { .. }
            | Self::Transport { .. }
            | Self::Driver { .. } => true,
            Self::RemoteRejected { status, .. } => *status >= 500,
            Self::SetupFailure { .. }
            | Self::InvalidSelector { .. }
            | Self::Serialization { .. }
            | Self::Io { .. }
            | Self::Configuration { .. } => false,
        }
    }

    /// Delay the remote asked for before the request may be repeated.
    pub const fn retry_delay(&self) -> Option<Duration> {
        match self {
            Self::Throttled { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttled_reports_retry_delay() {
        let err = PipelineError::Throttled {
            retry_after: Duration::from_secs(2),
            path: "products.json".to_string(),
        };
        assert!(err.is_recoverable());
        assert_eq!(err.retry_delay(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn setup_failure_is_terminal() {
        let err = PipelineError::setup("missing access token");
        assert!(!err.is_recoverable());
        assert_eq!(err.retry_delay(), None);
        assert_eq!(err.to_string(), "Setup failed: missing access token");
    }

    #[test]
    fn remote_rejection_recoverable_only_for_server_errors() {
        let rejected = |status| PipelineError::RemoteRejected {
            method: "POST".to_string(),
            path: "products.json".to_string(),
            status,
            message: String::new(),
        };
        assert!(!rejected(422).is_recoverable());
        assert!(rejected(503).is_recoverable());
    }

    #[test]
    fn selector_miss_lists_tried_selectors() {
        let err = PipelineError::selector_miss("title", &["h1.m-0".to_string(), "h1".to_string()]);
        assert_eq!(err.to_string(), "No selector matched for 'title' (tried: h1.m-0, h1)");
    }
}
