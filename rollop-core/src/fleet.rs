//! In-process peer group that plays the orchestration runtime.
//! The CLI server, the benches and the protocol tests all drive this.

use crate::callbacks::CallbackRegistry;
use crate::dispatcher::{Collaborators, DispatchReport, RollingOps, RunReport};
use crate::error::{LockError, StoreError};
use crate::infrastructure_in_memory::InMemoryPeerStore;
use crate::lock::Lock;
use crate::types::{AcquireRequest, LockName, LockStatus, NodeId};
use std::sync::Arc;

/// One protocol instance shared by a set of in-process nodes.
pub struct Fleet {
    name: LockName,
    store: InMemoryPeerStore,
    nodes: Vec<RollingOps>,
    /// Round-robin position for [`Fleet::step`]
    cursor: usize,
    deliveries: usize,
    runs: Vec<RunReport>,
}

impl Fleet {
    pub fn new(name: impl Into<LockName>) -> Self {
        Self::with_store(name, InMemoryPeerStore::new())
    }

    /// Build on an existing store, e.g. one shared with another instance.
    pub fn with_store(name: impl Into<LockName>, store: InMemoryPeerStore) -> Self {
        let name = name.into();
        store.create_relation(&name);
        Self {
            name,
            store,
            nodes: Vec::new(),
            cursor: 0,
            deliveries: 0,
            runs: Vec::new(),
        }
    }

    pub fn name(&self) -> &LockName {
        &self.name
    }

    pub fn store(&self) -> &InMemoryPeerStore {
        &self.store
    }

    /// Add a node that runs `callbacks` when it gets the lock.
    pub fn join(&mut self, node: NodeId, callbacks: CallbackRegistry) -> Result<(), LockError> {
        if self.node(&node).is_some() {
            return Ok(());
        }
        self.store.join(&self.name, &node)?;

        let store = Arc::new(self.store.clone());
        let collaborators = Collaborators::new(
            store.clone(),
            store,
            Arc::new(self.store.leadership(&node)),
        )
        .with_status(Arc::new(self.store.status_sink(&node)));

        tracing::debug!(name = %self.name, node = %node, "node joined");
        self.nodes
            .push(RollingOps::new(self.name.clone(), node, collaborators, callbacks));
        Ok(())
    }

    pub fn set_leader(&self, node: &NodeId) -> Result<(), LockError> {
        if self.node(node).is_none() {
            return Err(StoreError::UnknownNode {
                name: self.name.clone(),
                node: node.clone(),
            }
            .into());
        }
        self.store.set_leader(Some(node.clone()));
        Ok(())
    }

    pub fn leader(&self) -> Option<NodeId> {
        self.store.leader()
    }

    pub fn node(&self, node: &NodeId) -> Option<&RollingOps> {
        self.nodes.iter().find(|ops| ops.local() == node)
    }

    /// Node ids in join order
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|ops| ops.local().clone()).collect()
    }

    /// Deliver an acquire request to `node`.
    pub fn request(&self, node: &NodeId, request: &AcquireRequest) -> Result<bool, LockError> {
        let ops = self.node(node).ok_or_else(|| StoreError::UnknownNode {
            name: self.name.clone(),
            node: node.clone(),
        })?;
        ops.on_acquire(request)
    }

    /// Deliver `node`'s oldest pending notification for this instance, if any.
    /// Notifications about other instances are left for their own fleets.
    pub fn deliver(&mut self, node: &NodeId) -> Result<Option<DispatchReport>, LockError> {
        let Some(event) = self.store.next_notification_for(node, &self.name) else {
            return Ok(None);
        };
        let ops = self.node(node).ok_or_else(|| StoreError::UnknownNode {
            name: self.name.clone(),
            node: node.clone(),
        })?;
        let report = ops.on_store_changed(&event)?;
        self.deliveries += 1;
        self.runs.extend(report.runs.iter().cloned());
        Ok(Some(report))
    }

    /// Deliver one notification to the next node (round-robin) that has one.
    /// Returns `false` once nobody has anything pending.
    pub fn step(&mut self) -> Result<bool, LockError> {
        let count = self.nodes.len();
        for offset in 0..count {
            let index = (self.cursor + offset) % count;
            let node = self.nodes[index].local().clone();
            if self.deliver(&node)?.is_some() {
                self.cursor = (index + 1) % count;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Step until no notification is pending or `max_deliveries` is reached.
    /// Returns the number of deliveries made.
    pub fn run_until_quiescent(&mut self, max_deliveries: usize) -> Result<usize, LockError> {
        let mut delivered = 0;
        while delivered < max_deliveries && self.step()? {
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Notifications about this instance still waiting for `node`
    pub fn pending(&self, node: &NodeId) -> usize {
        self.store.pending_notifications_for(node, &self.name)
    }

    pub fn is_quiescent(&self) -> bool {
        self.nodes.iter().all(|ops| self.pending(ops.local()) == 0)
    }

    /// Derived lock status of every node, in join order
    pub fn statuses(&self) -> Result<Vec<(NodeId, LockStatus)>, LockError> {
        self.nodes
            .iter()
            .map(|ops| {
                let status = Lock::open(&self.store, &self.name, ops.local())?.status()?;
                Ok((ops.local().clone(), status))
            })
            .collect()
    }

    /// Nodes currently holding the lock. Never more than one.
    pub fn holders(&self) -> Result<Vec<NodeId>, LockError> {
        Ok(self
            .statuses()?
            .into_iter()
            .filter(|(_, status)| *status == LockStatus::Granted)
            .map(|(node, _)| node)
            .collect())
    }

    /// Every completed run, in the order they happened
    pub fn runs(&self) -> &[RunReport] {
        &self.runs
    }

    pub fn deliveries(&self) -> usize {
        self.deliveries
    }
}
