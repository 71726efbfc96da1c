//! Thicket Relay Mailbox Client
//!
//! A mailbox is a relay that stores streams for a device while it is
//! offline. The owner claims it once with a setup token, then registers
//! each contact so the contact can drop streams into its own folder.
//!
//! # Architecture
//!
//! ```text
//! ContactRegistrar ──(retry Io only)──► MailboxApi
//!                                           │
//!                                  RelayMailboxApi<T>
//!                                           │  RelayRequest / RelayResponse
//!                                  RelayTransport (MemoryRelay in tests)
//! ```
//!
//! # Outcomes
//!
//! | Relay says        | Result                                |
//! |-------------------|---------------------------------------|
//! | success           | `Ok`                                  |
//! | contact exists    | `Ok(AddContactOutcome::AlreadyExists)` |
//! | token rejected    | `MailboxError::Unauthorized`          |
//! | anything else     | `MailboxError::Api`                   |
//! | unreachable       | `MailboxError::Io` (retryable)        |
//!
//! `setup` with a contact's properties fails with `MailboxError::NotOwner`
//! before anything is sent.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod api;
pub mod error;
pub mod id;
pub mod memory;
pub mod registrar;
pub mod relay;

pub use api::{AddContactOutcome, MailboxApi, MailboxContact, MailboxProperties};
pub use error::{MailboxError, Result};
pub use id::{InvalidMailboxId, MailboxAuthToken, MailboxFolderId, MailboxId};
pub use memory::MemoryRelay;
pub use registrar::{ContactRegistrar, RetryPolicy};
pub use relay::{Method, RelayMailboxApi, RelayRequest, RelayResponse, RelayTransport};
