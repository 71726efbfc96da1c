//! In-process relay mailbox.
//!
//! Implements the relay side of the protocol in [`crate::relay`] so the
//! client, the registrar, and the applications built on them can be
//! exercised without a network. Outages can be injected to drive retry
//! paths.

use std::{
    collections::BTreeMap,
    io,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use thicket_core::{ContactId, Environment};

use crate::{
    api::MailboxContact,
    id::MailboxAuthToken,
    relay::{Method, RelayRequest, RelayResponse, RelayTransport, status},
};

struct RelayState {
    setup_token: Option<MailboxAuthToken>,
    owner_token: Option<MailboxAuthToken>,
    contacts: BTreeMap<ContactId, MailboxContact>,
    outages: u32,
}

/// A relay mailbox held in memory.
pub struct MemoryRelay<E> {
    env: E,
    state: Mutex<RelayState>,
}

impl<E: Environment> MemoryRelay<E> {
    /// Fresh mailbox that can be claimed once with `setup_token`.
    pub fn new(setup_token: MailboxAuthToken, env: E) -> Self {
        Self {
            env,
            state: Mutex::new(RelayState {
                setup_token: Some(setup_token),
                owner_token: None,
                contacts: BTreeMap::new(),
                outages: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RelayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next `requests` requests as if the relay were unreachable.
    pub fn fail_next(&self, requests: u32) {
        self.lock().outages = requests;
    }

    /// Owner token, once the mailbox has been set up.
    pub fn owner_token(&self) -> Option<MailboxAuthToken> {
        self.lock().owner_token
    }

    /// Registered contacts, in id order.
    pub fn contacts(&self) -> Vec<ContactId> {
        self.lock().contacts.keys().copied().collect()
    }

    fn handle(&self, request: &RelayRequest) -> RelayResponse {
        let mut state = self.lock();
        let token = request.auth_token;

        match (request.method, request.path) {
            (Method::Put, "/setup") => {
                if state.setup_token != Some(token) {
                    return RelayResponse::empty(status::UNAUTHORIZED);
                }
                let owner = MailboxAuthToken::random(&self.env);
                state.setup_token = None;
                state.owner_token = Some(owner);
                let body = serde_json::json!({ "token": owner.to_hex() }).to_string();
                RelayResponse { status: status::OK, body: body.into_bytes() }
            },
            (Method::Get, "/status") => {
                let known = state.owner_token == Some(token)
                    || state.contacts.values().any(|c| c.token == token);
                RelayResponse::empty(if known { status::OK } else { status::UNAUTHORIZED })
            },
            (Method::Post, "/contacts") => {
                if state.owner_token != Some(token) {
                    return RelayResponse::empty(status::UNAUTHORIZED);
                }
                let Some(Ok(contact)) = request
                    .body
                    .as_deref()
                    .map(serde_json::from_slice::<MailboxContact>)
                else {
                    return RelayResponse::empty(status::BAD_REQUEST);
                };
                if state.contacts.contains_key(&contact.contact_id) {
                    return RelayResponse::empty(status::CONFLICT);
                }
                state.contacts.insert(contact.contact_id, contact);
                RelayResponse::empty(status::CREATED)
            },
            _ => RelayResponse::empty(status::NOT_FOUND),
        }
    }
}

#[async_trait]
impl<E: Environment> RelayTransport for MemoryRelay<E> {
    async fn send(&self, _base_url: &str, request: RelayRequest) -> io::Result<RelayResponse> {
        {
            let mut state = self.lock();
            if state.outages > 0 {
                state.outages -= 1;
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "relay unreachable"));
            }
        }
        Ok(self.handle(&request))
    }
}
