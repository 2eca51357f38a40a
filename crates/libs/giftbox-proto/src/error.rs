use crate::outcome::GiftRefusal;
use std::time::Duration;
use thiserror::Error;

/// Failure taxonomy for mailbox operations.
///
/// `Validation` surfaces before any network traffic. Every other variant is
/// scoped to the single operation that produced it; nothing here is fatal to
/// the process.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum GiftError {
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("remote refused the request: {0}")]
    Refused(GiftRefusal),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("operation cancelled by shutdown")]
    Cancelled,

    #[error("network session is not connected")]
    NotConnected,

    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl GiftError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { field, message: message.into() }
    }

    /// Whether retrying the same operation can reasonably succeed without
    /// caller-side changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::NotConnected)
    }

    pub fn refusal(&self) -> Option<GiftRefusal> {
        match self {
            Self::Refused(reason) => Some(*reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_covers_transient_failures_only() {
        assert!(GiftError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(GiftError::NotConnected.is_retryable());
        assert!(!GiftError::Refused(GiftRefusal::MailboxClosed).is_retryable());
        assert!(!GiftError::invalid("amount", "must be positive").is_retryable());
        assert!(!GiftError::Cancelled.is_retryable());
    }

    #[test]
    fn refusal_is_exposed_for_branching() {
        let err = GiftError::Refused(GiftRefusal::TraitMismatch);
        assert_eq!(err.refusal(), Some(GiftRefusal::TraitMismatch));
        assert_eq!(GiftError::Cancelled.refusal(), None);
    }
}
