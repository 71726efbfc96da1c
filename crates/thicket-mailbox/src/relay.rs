//! Mailbox client over an abstract request/response relay.
//!
//! ```text
//! setup        PUT  /setup     bearer setup token   ──► 200 {"token": owner}
//! check_status GET  /status    bearer any token     ──► 2xx ok, else not ok
//! add_contact  POST /contacts  bearer owner token   ──► 2xx added, 409 exists
//!
//! 401 on any call ──► Unauthorized
//! ```
//!
//! How requests reach the relay (HTTP over Tor in production) is the
//! [`RelayTransport`]'s business; this module only maps the replies.

use std::{fmt, io};

use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    api::{AddContactOutcome, MailboxApi, MailboxContact, MailboxProperties},
    error::{MailboxError, Result},
    id::MailboxAuthToken,
};

/// Relay status codes the client distinguishes
pub mod status {
    /// Request succeeded
    pub const OK: u16 = 200;
    /// Resource created
    pub const CREATED: u16 = 201;
    /// Malformed request
    pub const BAD_REQUEST: u16 = 400;
    /// Token missing or rejected
    pub const UNAUTHORIZED: u16 = 401;
    /// Unknown path
    pub const NOT_FOUND: u16 = 404;
    /// Resource already exists
    pub const CONFLICT: u16 = 409;
    /// Relay failure
    pub const INTERNAL_ERROR: u16 = 500;

    /// Whether `code` is in the success class.
    pub fn is_success(code: u16) -> bool {
        (200..300).contains(&code)
    }
}

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read
    Get,
    /// Idempotent write
    Put,
    /// Create
    Post,
}

/// One request to the relay.
#[derive(Clone)]
pub struct RelayRequest {
    /// Method
    pub method: Method,
    /// Path below the mailbox's base URL
    pub path: &'static str,
    /// Bearer token
    pub auth_token: MailboxAuthToken,
    /// JSON body, if any
    pub body: Option<Vec<u8>>,
}

// Bodies can carry contact tokens
impl fmt::Debug for RelayRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("auth_token", &self.auth_token)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .finish()
    }
}

/// The relay's reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    /// Status code
    pub status: u16,
    /// Body bytes
    pub body: Vec<u8>,
}

impl RelayResponse {
    /// Reply with an empty body.
    pub fn empty(status: u16) -> Self {
        Self { status, body: Vec::new() }
    }
}

/// Carries requests to a relay and brings back its replies.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Send `request` to the mailbox at `base_url`.
    ///
    /// # Errors
    ///
    /// Any failure to deliver the request or read the reply.
    async fn send(&self, base_url: &str, request: RelayRequest) -> io::Result<RelayResponse>;
}

#[derive(Deserialize)]
struct SetupReply {
    token: MailboxAuthToken,
}

/// [`MailboxApi`] over a [`RelayTransport`].
#[derive(Debug, Clone)]
pub struct RelayMailboxApi<T> {
    transport: T,
}

impl<T: RelayTransport> RelayMailboxApi<T> {
    /// Client sending through `transport`.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// The transport in use.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn send(
        &self,
        properties: &MailboxProperties,
        method: Method,
        path: &'static str,
        body: Option<Vec<u8>>,
    ) -> Result<RelayResponse> {
        let request = RelayRequest { method, path, auth_token: properties.auth_token, body };
        let response = self.transport.send(&properties.base_url, request).await?;
        if response.status == status::UNAUTHORIZED {
            tracing::debug!(path, "mailbox rejected token");
            return Err(MailboxError::Unauthorized);
        }
        Ok(response)
    }
}

fn unexpected(path: &str, code: u16) -> MailboxError {
    MailboxError::api(format!("unexpected status {code} from {path}"))
}

#[async_trait]
impl<T: RelayTransport> MailboxApi for RelayMailboxApi<T> {
    async fn setup(&self, properties: &MailboxProperties) -> Result<MailboxAuthToken> {
        if !properties.owner {
            return Err(MailboxError::NotOwner);
        }

        let response = self.send(properties, Method::Put, "/setup", None).await?;
        if response.status != status::OK {
            return Err(unexpected("/setup", response.status));
        }
        let reply: SetupReply = serde_json::from_slice(&response.body)
            .map_err(|err| MailboxError::api(format!("malformed setup reply: {err}")))?;
        Ok(reply.token)
    }

    async fn check_status(&self, properties: &MailboxProperties) -> Result<bool> {
        let response = self.send(properties, Method::Get, "/status", None).await?;
        Ok(status::is_success(response.status))
    }

    async fn add_contact(
        &self,
        properties: &MailboxProperties,
        contact: &MailboxContact,
    ) -> Result<AddContactOutcome> {
        let body = serde_json::to_vec(contact)
            .map_err(|err| MailboxError::api(format!("cannot encode contact: {err}")))?;

        let response = self.send(properties, Method::Post, "/contacts", Some(body)).await?;
        match response.status {
            code if status::is_success(code) => Ok(AddContactOutcome::Added),
            status::CONFLICT => {
                tracing::debug!(contact = %contact.contact_id, "contact already on mailbox");
                Ok(AddContactOutcome::AlreadyExists)
            },
            code => Err(unexpected("/contacts", code)),
        }
    }
}
