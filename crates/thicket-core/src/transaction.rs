//! Database transaction wrapper with deferred events.
//!
//! Wraps an opaque storage transaction. Components attach events while they
//! work; the events are broadcast only after the caller commits, so
//! observers never see the effects of a transaction that rolled back.
//!
//! Transactions are owned by one task and mutated through `&mut`.

use crate::error::TransactionError;

/// A storage transaction plus the events to publish once it commits.
#[derive(Debug)]
pub struct Transaction<T, E> {
    inner: T,
    read_only: bool,
    events: Vec<E>,
    complete: bool,
}

impl<T, E> Transaction<T, E> {
    /// Wrap a storage transaction.
    pub fn new(inner: T, read_only: bool) -> Self {
        Self { inner, read_only, events: Vec::new(), complete: false }
    }

    /// The wrapped storage transaction.
    pub fn unbox(&self) -> &T {
        &self.inner
    }

    /// Mutable access to the wrapped storage transaction.
    pub fn unbox_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Whether the transaction may only be used for reading.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Attach an event to broadcast after commit.
    pub fn attach(&mut self, event: impl Into<E>) {
        self.events.push(event.into());
    }

    /// Events attached so far, in attach order.
    pub fn events(&self) -> &[E] {
        &self.events
    }

    /// Whether the transaction is ready to be committed.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Mark the transaction ready to commit.
    ///
    /// # Errors
    ///
    /// - `AlreadyComplete` if called more than once
    pub fn set_complete(&mut self) -> Result<(), TransactionError> {
        if self.complete {
            return Err(TransactionError::AlreadyComplete);
        }
        self.complete = true;
        Ok(())
    }

    /// Consume a completed transaction, yielding the storage transaction to
    /// commit and the events to broadcast afterwards.
    ///
    /// # Errors
    ///
    /// - `NotComplete` if [`Self::set_complete`] was never called; the
    ///   transaction must be rolled back instead
    pub fn commit(self) -> Result<(T, Vec<E>), TransactionError> {
        if !self.complete {
            return Err(TransactionError::NotComplete);
        }
        Ok((self.inner, self.events))
    }

    /// Abandon the transaction. Attached events are dropped unpublished.
    pub fn abort(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_kept_in_order() {
        let mut txn: Transaction<(), &str> = Transaction::new((), false);
        assert!(txn.events().is_empty());

        txn.attach("a");
        txn.attach("b");
        assert_eq!(txn.events(), &["a", "b"]);
    }

    #[test]
    fn set_complete_only_once() {
        let mut txn: Transaction<(), ()> = Transaction::new((), false);
        assert!(!txn.is_complete());

        assert_eq!(txn.set_complete(), Ok(()));
        assert!(txn.is_complete());
        assert_eq!(txn.set_complete(), Err(TransactionError::AlreadyComplete));
    }

    #[test]
    fn commit_requires_completion() {
        let txn: Transaction<u8, u8> = Transaction::new(7, true);
        assert!(txn.is_read_only());
        assert_eq!(txn.commit().unwrap_err(), TransactionError::NotComplete);

        let mut txn: Transaction<u8, u8> = Transaction::new(7, false);
        txn.attach(1);
        txn.set_complete().unwrap();
        assert_eq!(txn.commit().unwrap(), (7, vec![1]));
    }

    #[test]
    fn abort_drops_events() {
        let mut txn: Transaction<String, u8> = Transaction::new("db".to_string(), false);
        txn.attach(1);
        txn.unbox_mut().push('!');
        assert_eq!(txn.abort(), "db!");
    }
}
