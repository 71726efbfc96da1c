//! Shared lifecycle state for plugin drivers.
//!
//! Every control operation takes one `std::sync::Mutex` for a few field
//! updates and releases it before any `.await`. Background tasks read the
//! current maps through an `Arc<PluginSnapshot>` that is replaced whole on
//! every setter, so an attempt in flight keeps the maps it started with.
//!
//! Each start begins a new [`RunId`]. Tasks capture the run they were
//! spawned in and hand results over only while that same run is live, so a
//! dial that outlives a stop never lands in the next start.

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::task::JoinHandle;

use crate::{
    error::PluginError,
    plugin::PluginState,
    properties::{ContactId, PluginConfig, RemoteProperties, TransportProperties},
};

/// Immutable view of a plugin's maps at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginSnapshot {
    /// This device's properties
    pub local: TransportProperties,
    /// Every contact's properties
    pub remote: RemoteProperties,
    /// Plugin settings
    pub config: PluginConfig,
}

/// One Stopped → Running → Stopped cycle of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(u64);

struct ControlState<C: ?Sized> {
    state: PluginState,
    run: u64,
    snapshot: Arc<PluginSnapshot>,
    callback: Option<Arc<C>>,
    background: Option<JoinHandle<()>>,
}

impl<C: ?Sized> ControlState<C> {
    fn is_live(&self) -> bool {
        matches!(self.state, PluginState::Starting | PluginState::Running)
    }

    fn is_current(&self, run: RunId) -> bool {
        self.is_live() && self.run == run.0
    }
}

/// Lifecycle state machine, current maps, and the background task.
pub struct PluginControl<C: ?Sized> {
    inner: Mutex<ControlState<C>>,
}

impl<C: ?Sized> Default for PluginControl<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> PluginControl<C> {
    /// Stopped, with empty maps.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ControlState {
                state: PluginState::Stopped,
                run: 0,
                snapshot: Arc::new(PluginSnapshot::default()),
                callback: None,
                background: None,
            }),
        }
    }

    // Every critical section only assigns fields, so a panicking holder
    // cannot leave the state half-updated.
    fn lock(&self) -> MutexGuard<'_, ControlState<C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    pub fn state(&self) -> PluginState {
        self.lock().state
    }

    /// The run in progress, if the plugin is Starting or Running.
    pub fn current_run(&self) -> Option<RunId> {
        let inner = self.lock();
        inner.is_live().then_some(RunId(inner.run))
    }

    /// The run in progress, for operations only allowed while Running.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless Running
    pub fn running(&self, operation: &'static str) -> Result<RunId, PluginError> {
        let inner = self.lock();
        if inner.state != PluginState::Running {
            return Err(PluginError::InvalidState { operation, state: inner.state });
        }
        Ok(RunId(inner.run))
    }

    /// Whether `run` is still the live run.
    pub fn is_current(&self, run: RunId) -> bool {
        self.lock().is_current(run)
    }

    /// Current maps.
    pub fn snapshot(&self) -> Arc<PluginSnapshot> {
        Arc::clone(&self.lock().snapshot)
    }

    /// Callback for results produced during `run`.
    ///
    /// Background tasks call this after each blocking step and drop their
    /// result when it returns `None`: the plugin stopped, or stopped and
    /// started again, since the task was spawned.
    pub fn live_callback(&self, run: RunId) -> Option<Arc<C>> {
        let inner = self.lock();
        if inner.is_current(run) { inner.callback.clone() } else { None }
    }

    /// Stopped → Starting, installing the maps and callback. Returns the
    /// new run for the background task to carry.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless Stopped
    pub fn begin_start(
        &self,
        snapshot: PluginSnapshot,
        callback: Arc<C>,
    ) -> Result<RunId, PluginError> {
        let mut inner = self.lock();
        if inner.state != PluginState::Stopped {
            return Err(PluginError::InvalidState { operation: "start", state: inner.state });
        }
        inner.state = PluginState::Starting;
        inner.run = inner.run.wrapping_add(1);
        inner.snapshot = Arc::new(snapshot);
        inner.callback = Some(callback);
        Ok(RunId(inner.run))
    }

    /// Starting → Running, keeping `background` so `stop` can abort it.
    pub fn finish_start(&self, background: Option<JoinHandle<()>>) {
        let mut inner = self.lock();
        inner.state = PluginState::Running;
        inner.background = background;
    }

    /// Running → Stopping. Returns the background task for the caller to
    /// abort and await outside the lock.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless Running
    pub fn begin_stop(&self) -> Result<Option<JoinHandle<()>>, PluginError> {
        let mut inner = self.lock();
        if inner.state != PluginState::Running {
            return Err(PluginError::InvalidState { operation: "stop", state: inner.state });
        }
        inner.state = PluginState::Stopping;
        inner.callback = None;
        Ok(inner.background.take())
    }

    /// Stopping → Stopped.
    pub fn finish_stop(&self) {
        self.lock().state = PluginState::Stopped;
    }

    /// Swap in new maps built from the current ones.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless Running
    pub fn update(
        &self,
        operation: &'static str,
        apply: impl FnOnce(&mut PluginSnapshot),
    ) -> Result<(), PluginError> {
        let mut inner = self.lock();
        if inner.state != PluginState::Running {
            return Err(PluginError::InvalidState { operation, state: inner.state });
        }
        let mut next = PluginSnapshot::clone(&inner.snapshot);
        apply(&mut next);
        inner.snapshot = Arc::new(next);
        Ok(())
    }

    /// Record properties learned by a background task (a bound port, say)
    /// if `run` is still live.
    pub fn record_local(&self, run: RunId, apply: impl FnOnce(&mut TransportProperties)) -> bool {
        let mut inner = self.lock();
        if !inner.is_current(run) {
            return false;
        }
        let mut next = PluginSnapshot::clone(&inner.snapshot);
        apply(&mut next.local);
        inner.snapshot = Arc::new(next);
        true
    }

    /// Contacts with known properties that are not in `connected`.
    pub fn unconnected_contacts(&self, connected: &BTreeSet<ContactId>) -> Vec<ContactId> {
        self.snapshot().remote.keys().filter(|c| !connected.contains(c)).copied().collect()
    }
}
