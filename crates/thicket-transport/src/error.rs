//! Plugin error types.

use thicket_crypto::TransportId;
use thiserror::Error;

use crate::{plugin::PluginState, properties::InvalidValue};

/// Errors returned by plugin lifecycle and configuration calls.
///
/// I/O failures while binding, connecting, or reading a drive are not
/// errors: they are logged and surface as the absence of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    /// Operation not allowed in the plugin's current state
    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        /// Attempted operation
        operation: &'static str,
        /// State the plugin was in
        state: PluginState,
    },

    /// Local or remote transport properties failed validation
    #[error("invalid transport properties: {0}")]
    InvalidProperties(InvalidValue),

    /// Plugin configuration failed validation
    #[error("invalid plugin config: {0}")]
    InvalidConfig(InvalidValue),

    /// `poll` called on a plugin without a polling interval
    #[error("transport {transport_id} does not support polling")]
    PollingUnsupported {
        /// Transport that was polled
        transport_id: TransportId,
    },
}

impl PluginError {
    /// Whether the caller broke the plugin contract (wrong state, or
    /// polling a plugin that cannot poll) rather than supplying bad input.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::InvalidState { .. } | Self::PollingUnsupported { .. })
    }
}
