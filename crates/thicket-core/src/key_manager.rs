//! Per-transport key manager.
//!
//! Holds the current [`TransportKeys`] of every contact for one transport,
//! hands out outgoing stream numbers, and recognises incoming stream tags.
//!
//! ```text
//!            add_contact ──► derive_transport_keys
//!                                   │
//!   rotate_to(period) ──► rotate ───┤  (bundle replaced, never mutated)
//!                                   ▼
//!                         Arc<TransportKeys> ───► connection tasks
//!                          │                │
//!       next_outgoing_stream             recognise(tag)
//!       (stream counter)                 (3 windows × ReorderingWindow)
//! ```
//!
//! # Invariants
//!
//! - Outgoing stream numbers are strictly increasing per outgoing window and
//!   restart at zero only when the outgoing window changes
//! - An incoming stream number is accepted at most once per window
//! - Reordering state survives rotation for windows that are kept

use std::{collections::HashMap, sync::Arc};

use thicket_crypto::{
    DirectionalKeys, Role, RotationPeriod, SecretKey, Tag, TagCandidate, TransportId,
    TransportKeys, derive_transport_keys, rotate, try_decode,
};

use crate::{
    contact::ContactId, error::KeyManagerError, transaction::Transaction,
    window::ReorderingWindow,
};

/// Events attached to the transaction by key updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEvent {
    /// Keys were derived for a new contact
    ContactKeysAdded {
        /// Transport the keys belong to
        transport_id: TransportId,
        /// The new contact
        contact: ContactId,
        /// Period the keys were derived for
        period: RotationPeriod,
    },
    /// A contact's keys were discarded
    ContactKeysRemoved {
        /// Transport the keys belonged to
        transport_id: TransportId,
        /// The removed contact
        contact: ContactId,
    },
    /// Keys of at least one contact moved to a new period
    KeysRotated {
        /// Transport whose keys rotated
        transport_id: TransportId,
        /// The new period
        period: RotationPeriod,
    },
}

/// Keys and stream number for one outgoing stream.
#[derive(Debug, Clone)]
pub struct StreamContext {
    contact: ContactId,
    stream_number: u64,
    keys: Arc<TransportKeys>,
}

impl StreamContext {
    /// Contact the stream goes to.
    pub fn contact(&self) -> ContactId {
        self.contact
    }

    /// Stream number to encode in the tag.
    pub fn stream_number(&self) -> u64 {
        self.stream_number
    }

    /// Transport the keys belong to.
    pub fn transport_id(&self) -> &TransportId {
        self.keys.transport_id()
    }

    /// Outgoing tag and frame keys.
    pub fn outgoing(&self) -> &DirectionalKeys {
        self.keys.current_outgoing()
    }
}

/// A recognised incoming stream.
#[derive(Debug, Clone)]
pub struct IncomingStream {
    contact: ContactId,
    stream_number: u64,
    window: usize,
    keys: Arc<TransportKeys>,
}

impl IncomingStream {
    /// Contact the stream came from.
    pub fn contact(&self) -> ContactId {
        self.contact
    }

    /// Stream number the tag encoded.
    pub fn stream_number(&self) -> u64 {
        self.stream_number
    }

    /// Incoming window whose tag key matched.
    pub fn incoming(&self) -> &DirectionalKeys {
        self.keys.incoming_windows()[self.window]
    }

    /// Frame key to open the stream with.
    pub fn frame_key(&self) -> &SecretKey {
        self.incoming().frame_key()
    }
}

#[derive(Debug)]
struct ContactKeys {
    keys: Arc<TransportKeys>,
    next_stream: u64,
    /// Aligned with `keys.incoming_windows()`
    windows: [ReorderingWindow; 3],
}

impl ContactKeys {
    fn new(keys: TransportKeys) -> Self {
        Self { keys: Arc::new(keys), next_stream: 0, windows: [ReorderingWindow::default(); 3] }
    }

    /// Move to `rotated`, keeping reordering state for surviving windows.
    fn replace(&mut self, rotated: TransportKeys) {
        let old_periods = self.keys.incoming_windows().map(DirectionalKeys::period);
        let windows = rotated.incoming_windows().map(|window| {
            old_periods
                .iter()
                .position(|&p| p == window.period())
                .map_or_else(ReorderingWindow::default, |i| self.windows[i])
        });

        if rotated.current_outgoing().period() != self.keys.current_outgoing().period() {
            self.next_stream = 0;
        }
        self.windows = windows;
        self.keys = Arc::new(rotated);
    }
}

/// Key state of every contact for one transport.
#[derive(Debug)]
pub struct TransportKeyManager {
    transport_id: TransportId,
    contacts: HashMap<ContactId, ContactKeys>,
}

impl TransportKeyManager {
    /// Empty manager for `transport_id`.
    pub fn new(transport_id: TransportId) -> Self {
        Self { transport_id, contacts: HashMap::new() }
    }

    /// Transport this manager serves.
    pub fn transport_id(&self) -> &TransportId {
        &self.transport_id
    }

    /// Contacts with keys, in ascending order.
    pub fn contacts(&self) -> Vec<ContactId> {
        let mut contacts: Vec<_> = self.contacts.keys().copied().collect();
        contacts.sort_unstable();
        contacts
    }

    /// Snapshot of a contact's current bundle.
    pub fn keys(&self, contact: ContactId) -> Option<Arc<TransportKeys>> {
        self.contacts.get(&contact).map(|state| Arc::clone(&state.keys))
    }

    /// Derive and store keys for a new contact.
    ///
    /// # Errors
    ///
    /// - `ReadOnlyTransaction` if `txn` is read-only
    /// - `DuplicateContact` if the contact already has keys
    pub fn add_contact<T, E: From<KeyEvent>>(
        &mut self,
        txn: &mut Transaction<T, E>,
        contact: ContactId,
        root_secret: &SecretKey,
        period: RotationPeriod,
        role: Role,
    ) -> Result<(), KeyManagerError> {
        if txn.is_read_only() {
            return Err(KeyManagerError::ReadOnlyTransaction);
        }
        if self.contacts.contains_key(&contact) {
            return Err(KeyManagerError::DuplicateContact {
                contact,
                transport_id: self.transport_id.clone(),
            });
        }

        let keys = derive_transport_keys(&self.transport_id, root_secret, period, role);
        self.contacts.insert(contact, ContactKeys::new(keys));

        tracing::debug!(transport = %self.transport_id, %contact, %period, "contact keys added");
        txn.attach(KeyEvent::ContactKeysAdded {
            transport_id: self.transport_id.clone(),
            contact,
            period,
        });
        Ok(())
    }

    /// Discard a contact's keys.
    ///
    /// # Errors
    ///
    /// - `ReadOnlyTransaction` if `txn` is read-only
    /// - `UnknownContact` if the contact has no keys
    pub fn remove_contact<T, E: From<KeyEvent>>(
        &mut self,
        txn: &mut Transaction<T, E>,
        contact: ContactId,
    ) -> Result<(), KeyManagerError> {
        if txn.is_read_only() {
            return Err(KeyManagerError::ReadOnlyTransaction);
        }
        if self.contacts.remove(&contact).is_none() {
            return Err(KeyManagerError::UnknownContact { contact });
        }

        txn.attach(KeyEvent::ContactKeysRemoved { transport_id: self.transport_id.clone(), contact });
        Ok(())
    }

    /// Rotate every contact's keys to `period`.
    ///
    /// Returns whether any bundle changed. Bundles already at or past
    /// `period` are left alone.
    ///
    /// # Errors
    ///
    /// - `ReadOnlyTransaction` if `txn` is read-only
    pub fn rotate_to<T, E: From<KeyEvent>>(
        &mut self,
        txn: &mut Transaction<T, E>,
        period: RotationPeriod,
    ) -> Result<bool, KeyManagerError> {
        if txn.is_read_only() {
            return Err(KeyManagerError::ReadOnlyTransaction);
        }

        let mut rotated_any = false;
        for state in self.contacts.values_mut() {
            if state.keys.period() >= period {
                continue;
            }
            let rotated = rotate(TransportKeys::clone(&state.keys), period);
            state.replace(rotated);
            rotated_any = true;
        }

        if rotated_any {
            tracing::debug!(transport = %self.transport_id, %period, "transport keys rotated");
            txn.attach(KeyEvent::KeysRotated { transport_id: self.transport_id.clone(), period });
        }
        Ok(rotated_any)
    }

    /// Allocate the next outgoing stream to `contact`.
    ///
    /// `None` if the contact is unknown or its stream numbers are exhausted
    /// for the current period.
    pub fn next_outgoing_stream(&mut self, contact: ContactId) -> Option<StreamContext> {
        let state = self.contacts.get_mut(&contact)?;
        let stream_number = state.next_stream;
        state.next_stream = stream_number.checked_add(1)?;

        Some(StreamContext { contact, stream_number, keys: Arc::clone(&state.keys) })
    }

    /// Recognise an incoming stream tag.
    ///
    /// Tries each contact's three incoming windows over their reordering
    /// windows. A recognised stream number is marked seen, so presenting
    /// the same tag again returns `None`.
    pub fn recognise(&mut self, tag: &Tag) -> Option<IncomingStream> {
        for (&contact, state) in &mut self.contacts {
            let candidates: Vec<TagCandidate<'_>> = state
                .keys
                .incoming_windows()
                .into_iter()
                .zip(&state.windows)
                .map(|(keys, window)| TagCandidate::with_window(keys.tag_key(), window.base()))
                .collect();

            let Some(found) = try_decode(tag, &candidates) else {
                continue;
            };

            if !state.windows[found.candidate].mark_seen(found.stream_number) {
                tracing::debug!(
                    transport = %self.transport_id,
                    %contact,
                    stream = found.stream_number,
                    "replayed stream tag refused"
                );
                return None;
            }

            tracing::trace!(
                transport = %self.transport_id,
                %contact,
                stream = found.stream_number,
                "incoming stream recognised"
            );
            return Some(IncomingStream {
                contact,
                stream_number: found.stream_number,
                window: found.candidate,
                keys: Arc::clone(&state.keys),
            });
        }
        None
    }
}
