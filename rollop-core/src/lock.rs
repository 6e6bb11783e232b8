//! Lock views over the shared peer store
//!
//! A [`Lock`] is rebuilt on every evaluation and holds no state of its own:
//! its status is always derived from the two raw fields currently in the
//! store. Writes go through one of two handles so that the single-writer
//! rule is enforced by the type system:
//!
//! - [`Requester`] writes the local node's own request field.
//! - [`Arbiter`] writes grant fields and can only be claimed by the leader.

use crate::error::LockError;
use crate::infrastructure::{LeadershipOracle, PeerStore};
use crate::types::{Grant, LockName, LockStatus, NodeId, Request};
use std::ops::Deref;

/// Read-only view of one node's lock in one protocol instance
#[derive(Clone)]
pub struct Lock<'a> {
    store: &'a dyn PeerStore,
    name: &'a LockName,
    node: NodeId,
}

impl<'a> Lock<'a> {
    /// Open a view of `node`'s lock.
    ///
    /// Fails with [`LockError::NotReady`] while the peer relation for `name`
    /// does not exist.
    pub fn open(
        store: &'a dyn PeerStore,
        name: &'a LockName,
        node: &NodeId,
    ) -> Result<Self, LockError> {
        if !store.has_relation(name)? {
            return Err(LockError::NotReady(name.clone()));
        }
        Ok(Self::view(store, name, node.clone()))
    }

    /// Build a view without checking the relation; callers have already done so.
    pub(crate) fn view(store: &'a dyn PeerStore, name: &'a LockName, node: NodeId) -> Self {
        Self { store, name, node }
    }

    pub fn name(&self) -> &'a LockName {
        self.name
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    /// Current derived status. Reads only, never writes.
    pub fn status(&self) -> Result<LockStatus, LockError> {
        let request = self.store.read_request(self.name, &self.node)?;
        let grant = self.store.read_grant(self.name, &self.node)?;
        Ok(LockStatus::derive(request, grant))
    }

    /// Granted, with no release in flight
    pub fn is_held(&self) -> Result<bool, LockError> {
        Ok(self.status()? == LockStatus::Granted)
    }

    pub fn release_requested(&self) -> Result<bool, LockError> {
        Ok(self.status()? == LockStatus::Release)
    }

    pub fn is_pending(&self) -> Result<bool, LockError> {
        Ok(self.status()? == LockStatus::Acquire)
    }
}

impl std::fmt::Debug for Lock<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lock")
            .field("name", self.name)
            .field("node", &self.node)
            .finish()
    }
}

/// Handle over the local node's own request field.
#[derive(Debug, Clone)]
pub struct Requester<'a> {
    lock: Lock<'a>,
}

impl<'a> Requester<'a> {
    pub fn open(
        store: &'a dyn PeerStore,
        name: &'a LockName,
        local: &NodeId,
    ) -> Result<Self, LockError> {
        Ok(Self {
            lock: Lock::open(store, name, local)?,
        })
    }

    /// Ask the leader for the lock. Repeating the call before a grant changes nothing.
    pub fn acquire(&self) -> Result<(), LockError> {
        self.acquire_with(None)
    }

    /// Ask for the lock, remembering which callback the run phase should use.
    /// The override is written first so that whoever sees the request also
    /// sees the override. `None` clears an earlier override.
    pub fn acquire_with(&self, callback_override: Option<&str>) -> Result<(), LockError> {
        let store = self.lock.store;
        store.write_override(self.lock.name, &self.lock.node, callback_override)?;
        store.write_request(self.lock.name, &self.lock.node, Request::Acquire)?;
        tracing::debug!(name = %self.lock.name, node = %self.lock.node, "lock requested");
        Ok(())
    }

    /// Signal that the protected operation is done.
    pub fn release(&self) -> Result<(), LockError> {
        self.lock
            .store
            .write_request(self.lock.name, &self.lock.node, Request::Release)?;
        tracing::debug!(name = %self.lock.name, node = %self.lock.node, "lock release requested");
        Ok(())
    }

    /// Callback override stored with the most recent acquire
    pub fn callback_override(&self) -> Result<Option<String>, LockError> {
        Ok(self.lock.store.read_override(self.lock.name, &self.lock.node)?)
    }
}

impl<'a> Deref for Requester<'a> {
    type Target = Lock<'a>;

    fn deref(&self) -> &Self::Target {
        &self.lock
    }
}

/// Handle over the leader-owned grant fields.
///
/// Only [`Arbiter::claim`] creates one, and it refuses unless the oracle says
/// the local node leads right now.
#[derive(Clone, Copy)]
pub struct Arbiter<'a> {
    store: &'a dyn PeerStore,
    name: &'a LockName,
    leader: &'a NodeId,
}

impl<'a> Arbiter<'a> {
    pub fn claim(
        store: &'a dyn PeerStore,
        leadership: &dyn LeadershipOracle,
        name: &'a LockName,
        local: &'a NodeId,
    ) -> Result<Self, LockError> {
        if !store.has_relation(name)? {
            return Err(LockError::NotReady(name.clone()));
        }
        if !leadership.is_local_leader() {
            return Err(LockError::NotLeader {
                name: name.clone(),
                node: local.clone(),
            });
        }
        Ok(Self {
            store,
            name,
            leader: local,
        })
    }

    pub fn name(&self) -> &'a LockName {
        self.name
    }

    pub fn leader(&self) -> &'a NodeId {
        self.leader
    }

    /// Authorize `lock`'s node to run.
    pub fn grant(&self, lock: &Lock<'_>) -> Result<(), LockError> {
        debug_assert_eq!(lock.name(), self.name);
        self.store.write_grant(self.name, lock.node(), Grant::Granted)?;
        tracing::debug!(name = %self.name, node = %lock.node(), "lock granted");
        Ok(())
    }

    /// Reclaim `lock` after its holder released it.
    pub fn clear(&self, lock: &Lock<'_>) -> Result<(), LockError> {
        debug_assert_eq!(lock.name(), self.name);
        self.store.write_grant(self.name, lock.node(), Grant::Idle)?;
        tracing::debug!(name = %self.name, node = %lock.node(), "lock cleared");
        Ok(())
    }
}

impl std::fmt::Debug for Arbiter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arbiter")
            .field("name", self.name)
            .field("leader", self.leader)
            .finish()
    }
}
