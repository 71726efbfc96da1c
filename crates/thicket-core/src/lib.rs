//! Thicket Core
//!
//! Stateful pieces shared by every transport: the per-transport key manager,
//! the transaction wrapper its updates flow through, and the environment
//! abstraction over time and randomness.
//!
//! # Architecture
//!
//! ```text
//! Environment ──► rotation_period() ──► TransportKeyManager::rotate_to
//!                                               │
//!                          Transaction ◄── KeyEvent (published after commit)
//!                                               │
//!                     StreamContext / IncomingStream ──► thicket-proto
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod contact;
pub mod env;
pub mod error;
pub mod key_manager;
pub mod system_env;
pub mod transaction;
pub mod window;

pub use contact::ContactId;
pub use env::Environment;
pub use error::{KeyManagerError, TransactionError};
pub use key_manager::{IncomingStream, KeyEvent, StreamContext, TransportKeyManager};
pub use system_env::SystemEnv;
pub use transaction::Transaction;
pub use window::ReorderingWindow;
