//! Error types for key management and transactions.

use thicket_crypto::TransportId;
use thiserror::Error;

use crate::contact::ContactId;

/// Errors from the transaction wrapper. All are caller bugs.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionError {
    /// `set_complete` called on a transaction that is already complete
    #[error("transaction already marked complete")]
    AlreadyComplete,

    /// `commit` called before `set_complete`
    #[error("transaction not marked complete")]
    NotComplete,
}

/// Errors from the transport key manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyManagerError {
    /// A write was attempted through a read-only transaction
    #[error("read-only transaction used for a key update")]
    ReadOnlyTransaction,

    /// Keys for this contact are already held
    #[error("contact {contact} already has keys for transport {transport_id}")]
    DuplicateContact {
        /// Contact that was added twice
        contact: ContactId,
        /// Transport the manager serves
        transport_id: TransportId,
    },

    /// No keys are held for this contact
    #[error("no keys for contact {contact}")]
    UnknownContact {
        /// Contact that was looked up
        contact: ContactId,
    },
}

impl KeyManagerError {
    /// True if the error comes from misuse by the caller rather than from
    /// bad input data.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ReadOnlyTransaction | Self::DuplicateContact { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_contact() {
        let err = KeyManagerError::UnknownContact { contact: ContactId::new(7) };
        assert_eq!(err.to_string(), "no keys for contact 7");
        assert!(!err.is_contract_violation());
    }

    #[test]
    fn read_only_is_contract_violation() {
        assert!(KeyManagerError::ReadOnlyTransaction.is_contract_violation());
    }
}
