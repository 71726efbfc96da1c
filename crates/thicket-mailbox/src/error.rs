//! Mailbox error types.

use std::io;

use thiserror::Error;

/// Result alias for mailbox calls.
pub type Result<T> = std::result::Result<T, MailboxError>;

/// Errors from talking to a relay mailbox.
///
/// A contact that is already registered is not an error; see
/// [`crate::AddContactOutcome::AlreadyExists`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailboxError {
    /// The relay rejected our token. The mailbox must be provisioned again;
    /// retrying with the same properties cannot succeed.
    #[error("mailbox rejected the auth token")]
    Unauthorized,

    /// `setup` was called with a contact's properties. Only the owner can
    /// provision a mailbox; this is a caller bug and nothing was sent.
    #[error("setup requires the owner's properties")]
    NotOwner,

    /// The relay answered, but not in a way the protocol allows
    #[error("mailbox API error: {reason}")]
    Api {
        /// What was wrong with the response
        reason: String,
    },

    /// The relay could not be reached, or the connection failed mid-request
    #[error("mailbox I/O error: {0}")]
    Io(String),
}

impl MailboxError {
    pub(crate) fn api(reason: impl Into<String>) -> Self {
        Self::Api { reason: reason.into() }
    }

    /// Whether the same call may succeed later. Only transport failures are.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// True if the error comes from misuse by the caller rather than from
    /// the relay.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::NotOwner)
    }
}

impl From<io::Error> for MailboxError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_io_is_retryable() {
        assert!(MailboxError::from(io::Error::from(io::ErrorKind::TimedOut)).is_retryable());
        assert!(!MailboxError::Unauthorized.is_retryable());
        assert!(!MailboxError::api("bad body").is_retryable());
        assert!(!MailboxError::NotOwner.is_retryable());
    }

    #[test]
    fn not_owner_is_contract_violation() {
        assert!(MailboxError::NotOwner.is_contract_violation());
        assert!(!MailboxError::Unauthorized.is_contract_violation());
        assert!(!MailboxError::api("bad body").is_contract_violation());
    }
}
