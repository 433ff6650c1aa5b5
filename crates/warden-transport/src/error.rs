//! Error types for heartbeat delivery.

use thiserror::Error;

/// Result type alias for transport setup.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors building a collector client.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Base URL could not be parsed.
    #[error("invalid collector url '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Bearer token missing.
    #[error("collector bearer token is empty")]
    MissingToken,

    /// HTTP client could not be constructed.
    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Outcome of a single failed delivery attempt.
///
/// Everything except [`DeliveryError::SessionInvalidated`] is transient
/// and retried with backoff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Request did not complete within the timeout.
    #[error("collector request timed out")]
    Timeout,

    /// Connection or protocol failure.
    #[error("network error: {0}")]
    Network(String),

    /// Collector answered with a non-success status.
    #[error("collector rejected heartbeat with status {status}{}", detail_suffix(.message))]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// `error` or `message` field of the body, if any.
        message: Option<String>,
    },

    /// Collector reports there is no active shift for this session.
    #[error("session invalidated by collector: {0}")]
    SessionInvalidated(String),
}

fn detail_suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}

impl DeliveryError {
    /// Returns true if the session must stop instead of retrying.
    #[inline]
    #[must_use]
    pub const fn is_session_invalidated(&self) -> bool {
        matches!(self, Self::SessionInvalidated(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_display() {
        let err = DeliveryError::Rejected {
            status: 503,
            message: Some("maintenance".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "collector rejected heartbeat with status 503: maintenance"
        );

        let bare = DeliveryError::Rejected {
            status: 500,
            message: None,
        };
        assert_eq!(bare.to_string(), "collector rejected heartbeat with status 500");
    }

    #[test]
    fn test_only_invalidation_is_terminal() {
        assert!(DeliveryError::SessionInvalidated("No active shift".into()).is_session_invalidated());
        assert!(!DeliveryError::Timeout.is_session_invalidated());
        assert!(!DeliveryError::Network("reset".into()).is_session_invalidated());
    }
}
