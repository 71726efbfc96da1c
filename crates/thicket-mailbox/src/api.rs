//! The mailbox contract shared by every relay client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thicket_core::ContactId;

use crate::{
    error::Result,
    id::{MailboxAuthToken, MailboxFolderId},
};

/// How to reach and authenticate to one relay mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxProperties {
    /// Address of the relay (an onion URL in production)
    pub base_url: String,
    /// Setup token before [`MailboxApi::setup`], owner or contact token after
    pub auth_token: MailboxAuthToken,
    /// Whether these are the owner's properties
    pub owner: bool,
}

/// A contact's registration on the owner's mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailboxContact {
    /// Local id of the contact
    pub contact_id: ContactId,
    /// Token the contact will authenticate with
    #[serde(rename = "contactToken")]
    pub token: MailboxAuthToken,
    /// Folder the contact uploads to
    pub inbox_id: MailboxFolderId,
    /// Folder the contact downloads from
    pub outbox_id: MailboxFolderId,
}

/// Result of registering a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddContactOutcome {
    /// The contact was registered by this call
    Added,
    /// The relay already knew the contact. The goal is met; do not retry.
    AlreadyExists,
}

/// Operations on a relay mailbox.
#[async_trait]
pub trait MailboxApi: Send + Sync {
    /// Claim a freshly provisioned mailbox with its setup token and return
    /// the owner token that replaces it.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the setup token was rejected or already used
    /// - `Api` if `properties` are not the owner's or the reply is malformed
    /// - `Io` if the relay cannot be reached
    async fn setup(&self, properties: &MailboxProperties) -> Result<MailboxAuthToken>;

    /// Whether the mailbox reports itself healthy.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the token was rejected
    /// - `Io` if the relay cannot be reached
    async fn check_status(&self, properties: &MailboxProperties) -> Result<bool>;

    /// Register `contact` on the owner's mailbox.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the owner token was rejected
    /// - `Api` on any other refusal
    /// - `Io` if the relay cannot be reached
    async fn add_contact(
        &self,
        properties: &MailboxProperties,
        contact: &MailboxContact,
    ) -> Result<AddContactOutcome>;
}
