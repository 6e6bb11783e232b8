use crate::error::StoreError;
use crate::infrastructure::{LeadershipOracle, PeerDirectory, PeerStore, StatusSink};
use crate::types::{Grant, LockName, NodeId, Request, StoreChanged, WorkloadStatus};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// One peer relation: its members and both halves of the lock data
#[derive(Debug, Default)]
struct Relation {
    // Join order doubles as discovery order.
    members: Vec<NodeId>,
    requests: HashMap<NodeId, Request>,
    overrides: HashMap<NodeId, String>,
    grants: HashMap<NodeId, Grant>,
}

impl Relation {
    fn require_member(&self, name: &LockName, node: &NodeId) -> Result<(), StoreError> {
        if self.members.contains(node) {
            Ok(())
        } else {
            Err(StoreError::UnknownNode {
                name: name.clone(),
                node: node.clone(),
            })
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    relations: HashMap<LockName, Relation>,
    leader: Option<NodeId>,
    // Pending notifications per node. Identical pending events coalesce.
    inboxes: HashMap<NodeId, VecDeque<StoreChanged>>,
    unit_status: HashMap<NodeId, WorkloadStatus>,
    app_status: WorkloadStatus,
    writes: u64,
}

impl Inner {
    fn relation(&self, name: &LockName) -> Result<&Relation, StoreError> {
        self.relations
            .get(name)
            .ok_or_else(|| StoreError::MissingRelation(name.clone()))
    }

    fn relation_mut(&mut self, name: &LockName) -> Result<&mut Relation, StoreError> {
        self.relations
            .get_mut(name)
            .ok_or_else(|| StoreError::MissingRelation(name.clone()))
    }

    /// Record a write and tell every member of `name` about it.
    fn changed(&mut self, name: &LockName) {
        self.writes += 1;
        let members = match self.relations.get(name) {
            Some(relation) => relation.members.clone(),
            None => return,
        };
        let event = StoreChanged::new(name.clone());
        for node in members {
            let inbox = self.inboxes.entry(node).or_default();
            if !inbox.contains(&event) {
                inbox.push_back(event.clone());
            }
        }
    }
}

/// An in-process shared store for a whole peer group.
///
/// Cheap to clone; clones share the same data. Every effective write queues a
/// [`StoreChanged`] for each member of the relation (the writer included).
/// Writes that leave a field unchanged do not notify.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPeerStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryPeerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create the peer relation for `name`. Creating it twice is harmless.
    pub fn create_relation(&self, name: &LockName) {
        self.lock().relations.entry(name.clone()).or_default();
    }

    /// Add `node` to the relation, at the end of the discovery order.
    pub fn join(&self, name: &LockName, node: &NodeId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let relation = inner.relation_mut(name)?;
        if relation.members.contains(node) {
            return Ok(());
        }
        relation.members.push(node.clone());
        inner.changed(name);
        Ok(())
    }

    /// Remove `node` and its data from the relation.
    pub fn depart(&self, name: &LockName, node: &NodeId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let relation = inner.relation_mut(name)?;
        relation.require_member(name, node)?;
        relation.members.retain(|member| member != node);
        relation.requests.remove(node);
        relation.overrides.remove(node);
        relation.grants.remove(node);
        inner.inboxes.remove(node);
        inner.changed(name);
        Ok(())
    }

    /// Hand leadership to `node` (or to nobody).
    ///
    /// Every member of every relation is notified, the way a leader change
    /// re-triggers hooks across the group.
    pub fn set_leader(&self, node: Option<NodeId>) {
        let mut inner = self.lock();
        if inner.leader == node {
            return;
        }
        inner.leader = node;
        let names: Vec<LockName> = inner.relations.keys().cloned().collect();
        for name in names {
            inner.changed(&name);
        }
    }

    pub fn leader(&self) -> Option<NodeId> {
        self.lock().leader.clone()
    }

    pub fn members(&self, name: &LockName) -> Result<Vec<NodeId>, StoreError> {
        Ok(self.lock().relation(name)?.members.clone())
    }

    /// Leadership oracle answering for `node`
    pub fn leadership(&self, node: &NodeId) -> InMemoryLeadership {
        InMemoryLeadership {
            store: self.clone(),
            node: node.clone(),
        }
    }

    /// Status sink recording updates made by `node`
    pub fn status_sink(&self, node: &NodeId) -> InMemoryStatus {
        InMemoryStatus {
            store: self.clone(),
            node: node.clone(),
        }
    }

    /// Take the oldest pending notification for `node`.
    pub fn next_notification(&self, node: &NodeId) -> Option<StoreChanged> {
        self.lock().inboxes.get_mut(node)?.pop_front()
    }

    /// Take the oldest pending notification for `node` about `name`, leaving
    /// notifications about other instances in place.
    pub fn next_notification_for(&self, node: &NodeId, name: &LockName) -> Option<StoreChanged> {
        let mut inner = self.lock();
        let inbox = inner.inboxes.get_mut(node)?;
        let position = inbox.iter().position(|event| &event.name == name)?;
        inbox.remove(position)
    }

    pub fn pending_notifications(&self, node: &NodeId) -> usize {
        self.lock().inboxes.get(node).map_or(0, VecDeque::len)
    }

    pub fn pending_notifications_for(&self, node: &NodeId, name: &LockName) -> usize {
        self.lock()
            .inboxes
            .get(node)
            .map_or(0, |inbox| inbox.iter().filter(|event| &event.name == name).count())
    }

    /// Number of effective writes so far
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    pub fn unit_status(&self, node: &NodeId) -> WorkloadStatus {
        self.lock().unit_status.get(node).cloned().unwrap_or_default()
    }

    pub fn app_status(&self) -> WorkloadStatus {
        self.lock().app_status.clone()
    }
}

impl PeerStore for InMemoryPeerStore {
    fn has_relation(&self, name: &LockName) -> Result<bool, StoreError> {
        Ok(self.lock().relations.contains_key(name))
    }

    fn read_request(&self, name: &LockName, node: &NodeId) -> Result<Option<Request>, StoreError> {
        Ok(self.lock().relation(name)?.requests.get(node).copied())
    }

    fn write_request(
        &self,
        name: &LockName,
        node: &NodeId,
        request: Request,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let relation = inner.relation_mut(name)?;
        relation.require_member(name, node)?;
        if relation.requests.insert(node.clone(), request) != Some(request) {
            inner.changed(name);
        }
        Ok(())
    }

    fn read_override(&self, name: &LockName, node: &NodeId) -> Result<Option<String>, StoreError> {
        Ok(self.lock().relation(name)?.overrides.get(node).cloned())
    }

    fn write_override(
        &self,
        name: &LockName,
        node: &NodeId,
        key: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let relation = inner.relation_mut(name)?;
        relation.require_member(name, node)?;
        let previous = match key {
            Some(key) => relation.overrides.insert(node.clone(), key.to_string()),
            None => relation.overrides.remove(node),
        };
        if previous.as_deref() != key {
            inner.changed(name);
        }
        Ok(())
    }

    fn read_grant(&self, name: &LockName, node: &NodeId) -> Result<Grant, StoreError> {
        Ok(self
            .lock()
            .relation(name)?
            .grants
            .get(node)
            .copied()
            .unwrap_or_default())
    }

    fn write_grant(&self, name: &LockName, node: &NodeId, grant: Grant) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let relation = inner.relation_mut(name)?;
        relation.require_member(name, node)?;
        let previous = relation.grants.insert(node.clone(), grant).unwrap_or_default();
        if previous != grant {
            inner.changed(name);
        }
        Ok(())
    }
}

impl PeerDirectory for InMemoryPeerStore {
    fn peers(&self, name: &LockName, local: &NodeId) -> Result<Vec<NodeId>, StoreError> {
        Ok(self
            .lock()
            .relation(name)?
            .members
            .iter()
            .filter(|member| *member != local)
            .cloned()
            .collect())
    }
}

/// [`LeadershipOracle`] backed by an [`InMemoryPeerStore`]
#[derive(Debug, Clone)]
pub struct InMemoryLeadership {
    store: InMemoryPeerStore,
    node: NodeId,
}

impl LeadershipOracle for InMemoryLeadership {
    fn is_local_leader(&self) -> bool {
        self.store.lock().leader.as_ref() == Some(&self.node)
    }
}

/// [`StatusSink`] backed by an [`InMemoryPeerStore`]
#[derive(Debug, Clone)]
pub struct InMemoryStatus {
    store: InMemoryPeerStore,
    node: NodeId,
}

impl StatusSink for InMemoryStatus {
    fn set_unit_status(&self, status: WorkloadStatus) {
        self.store.lock().unit_status.insert(self.node.clone(), status);
    }

    fn set_app_status(&self, status: WorkloadStatus) {
        self.store.lock().app_status = status;
    }
}
