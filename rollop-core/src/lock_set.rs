//! Enumeration of every lock in one protocol instance

use crate::error::LockError;
use crate::infrastructure::{PeerDirectory, PeerStore};
use crate::lock::Lock;
use crate::types::{LockName, NodeId};

/// All participants of a protocol instance: discovered peers first, in
/// discovery order, then the local node.
///
/// Membership is re-read on every call to [`LockSet::iter`], so two
/// iterations may disagree when peers join or leave in between.
pub struct LockSet<'a> {
    store: &'a dyn PeerStore,
    directory: &'a dyn PeerDirectory,
    name: &'a LockName,
    local: &'a NodeId,
}

impl<'a> LockSet<'a> {
    pub fn new(
        store: &'a dyn PeerStore,
        directory: &'a dyn PeerDirectory,
        name: &'a LockName,
        local: &'a NodeId,
    ) -> Self {
        Self {
            store,
            directory,
            name,
            local,
        }
    }

    /// Start a fresh pass over the current membership.
    pub fn iter(&self) -> Result<LockSetIter<'a>, LockError> {
        if !self.store.has_relation(self.name)? {
            return Err(LockError::NotReady(self.name.clone()));
        }
        let mut nodes = self.directory.peers(self.name, self.local)?;
        nodes.retain(|node| node != self.local);
        nodes.push(self.local.clone());

        Ok(LockSetIter {
            store: self.store,
            name: self.name,
            nodes: nodes.into_iter(),
        })
    }
}

/// One pass over a [`LockSet`]. Views are built lazily, one per node.
pub struct LockSetIter<'a> {
    store: &'a dyn PeerStore,
    name: &'a LockName,
    nodes: std::vec::IntoIter<NodeId>,
}

impl<'a> Iterator for LockSetIter<'a> {
    type Item = Lock<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.nodes.next()?;
        Some(Lock::view(self.store, self.name, node))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.nodes.size_hint()
    }
}
