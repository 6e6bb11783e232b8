//! # rollop-core
//!
//! Leader-mediated locks for rolling operations. Peers serialize an operation
//! (a restart, an upgrade) through a shared key-value store: each node writes
//! its own request field, the current leader writes one grant field per node,
//! and every node re-evaluates on change notifications. No node ever waits on
//! another.

pub mod callbacks;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod fleet;
pub mod infrastructure;
#[path = "infrastructure_in_memory.rs"]
pub mod infrastructure_in_memory;
pub mod lock;
pub mod lock_set;
pub mod types;

pub use callbacks::{CallbackRegistry, RunCallback, RunContext};
pub use coordinator::{Coordinator, CoordinatorPass};
pub use dispatcher::{Collaborators, DispatchReport, RollingOps, RunReport};
pub use error::{CallbackError, LockError, StoreError};
pub use fleet::Fleet;
pub use lock::{Arbiter, Lock, Requester};
pub use lock_set::LockSet;

#[cfg(test)]
mod fleet_test;
#[cfg(test)]
mod lock_test;
