//! Contact registration with retries.
//!
//! Registering a contact must eventually happen even over a flaky Tor
//! circuit, but only transport failures are worth repeating. A rejected
//! token needs re-provisioning and a contact that already exists is done.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thicket_core::Environment;

use crate::{
    api::{AddContactOutcome, MailboxApi, MailboxContact, MailboxProperties},
    error::Result,
};

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Calls made in total, the first included. Zero behaves as one.
    pub max_attempts: u32,
    /// Wait before the first retry
    pub initial_backoff: Duration,
    /// Upper bound on any single wait
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `retry` (zero-based): doubles each time,
    /// capped at `max_backoff`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Registers contacts on a mailbox, retrying transport failures.
pub struct ContactRegistrar<A, E> {
    api: A,
    env: E,
    policy: RetryPolicy,
}

impl<A: MailboxApi, E: Environment> ContactRegistrar<A, E> {
    /// Registrar calling `api`, sleeping through `env`.
    pub fn new(api: A, env: E, policy: RetryPolicy) -> Self {
        Self { api, env, policy }
    }

    /// The underlying client.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Register `contact`, retrying `Io` failures per the policy.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` / `Api` / `NotOwner` immediately, without retrying
    /// - `Io` once every attempt has failed
    pub async fn register(
        &self,
        properties: &MailboxProperties,
        contact: &MailboxContact,
    ) -> Result<AddContactOutcome> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.api.add_contact(properties, contact).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.backoff(attempt - 1);
                    tracing::debug!(
                        contact = %contact.contact_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "mailbox unreachable, retrying"
                    );
                    self.env.sleep(delay).await;
                    attempt += 1;
                },
                Err(err) => {
                    tracing::warn!(
                        contact = %contact.contact_id,
                        attempt,
                        error = %err,
                        "failed to register contact on mailbox"
                    );
                    return Err(err);
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Instant,
    };

    use thicket_core::ContactId;

    use super::*;
    use crate::{
        MailboxError,
        id::{MailboxAuthToken, MailboxFolderId},
        memory::MemoryRelay,
        relay::RelayMailboxApi,
    };

    /// Records sleeps instead of waiting.
    #[derive(Clone, Default)]
    struct RecordingEnv {
        slept: Arc<Mutex<Vec<Duration>>>,
    }

    impl Environment for RecordingEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            Instant::now()
        }

        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0x5a);
        }

        fn wall_clock_secs(&self) -> u64 {
            0
        }
    }

    const SETUP: MailboxAuthToken = MailboxAuthToken::from_bytes([0x11; 32]);

    type TestRegistrar = ContactRegistrar<RelayMailboxApi<MemoryRelay<RecordingEnv>>, RecordingEnv>;

    async fn registrar(policy: RetryPolicy) -> (TestRegistrar, MailboxProperties) {
        let env = RecordingEnv::default();
        let api = RelayMailboxApi::new(MemoryRelay::new(SETUP, env.clone()));
        let mut properties =
            MailboxProperties { base_url: "memory".to_owned(), auth_token: SETUP, owner: true };
        properties.auth_token = api.setup(&properties).await.unwrap();
        (ContactRegistrar::new(api, env, policy), properties)
    }

    fn contact(id: u32) -> MailboxContact {
        MailboxContact {
            contact_id: ContactId::new(id),
            token: MailboxAuthToken::from_bytes([id as u8; 32]),
            inbox_id: MailboxFolderId::from_bytes([0xaa; 32]),
            outbox_id: MailboxFolderId::from_bytes([0xbb; 32]),
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
        };
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(5));
        assert_eq!(policy.backoff(40), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn retries_through_outage() {
        let (registrar, properties) = registrar(RetryPolicy::default()).await;
        registrar.api().transport().fail_next(2);

        let outcome = registrar.register(&properties, &contact(1)).await.unwrap();
        assert_eq!(outcome, AddContactOutcome::Added);
        assert_eq!(*registrar.env.slept.lock().unwrap(), vec![
            Duration::from_secs(1),
            Duration::from_secs(2)
        ]);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let policy = RetryPolicy { max_attempts: 3, ..RetryPolicy::default() };
        let (registrar, properties) = registrar(policy).await;
        registrar.api().transport().fail_next(10);

        let err = registrar.register(&properties, &contact(1)).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(registrar.env.slept.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unauthorized_is_not_retried() {
        let (registrar, mut properties) = registrar(RetryPolicy::default()).await;
        properties.auth_token = MailboxAuthToken::from_bytes([0xee; 32]);

        let err = registrar.register(&properties, &contact(1)).await.unwrap_err();
        assert_eq!(err, MailboxError::Unauthorized);
        assert!(registrar.env.slept.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn existing_contact_is_done() {
        let (registrar, properties) = registrar(RetryPolicy::default()).await;
        registrar.register(&properties, &contact(4)).await.unwrap();

        let outcome = registrar.register(&properties, &contact(4)).await.unwrap();
        assert_eq!(outcome, AddContactOutcome::AlreadyExists);
        assert!(registrar.env.slept.lock().unwrap().is_empty());
        assert_eq!(registrar.api().transport().contacts(), vec![ContactId::new(4)]);
    }
}
