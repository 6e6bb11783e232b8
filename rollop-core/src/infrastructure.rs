use crate::error::StoreError;
use crate::types::{Grant, LockName, NodeId, Request, WorkloadStatus};

// The store itself is owned by the orchestration runtime. These traits are the
// narrow surface the protocol reads and writes through; nothing here is
// transactional, and the only safety rule is who writes which field.

/// Defines the contract for shared peer store backends.
///
/// Each node owns one section holding its request field and callback override.
/// The leader owns one section holding a grant field per node. Every write must
/// eventually produce a `StoreChanged` for every member of the relation.
pub trait PeerStore {
    /// Whether the peer relation for `name` exists yet
    fn has_relation(&self, name: &LockName) -> Result<bool, StoreError>;

    /// Read a node's request field (`None` when unset)
    fn read_request(&self, name: &LockName, node: &NodeId) -> Result<Option<Request>, StoreError>;

    /// Write the request field of `node`. Only `node` itself may call this.
    fn write_request(&self, name: &LockName, node: &NodeId, request: Request)
        -> Result<(), StoreError>;

    /// Read the callback override stored next to a node's request
    fn read_override(&self, name: &LockName, node: &NodeId) -> Result<Option<String>, StoreError>;

    /// Write (or clear, with `None`) the callback override of `node`
    fn write_override(
        &self,
        name: &LockName,
        node: &NodeId,
        key: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Read the grant field the leader keeps for `node` (`Idle` when unset)
    fn read_grant(&self, name: &LockName, node: &NodeId) -> Result<Grant, StoreError>;

    /// Write the grant field for `node`. Only the current leader may call this.
    fn write_grant(&self, name: &LockName, node: &NodeId, grant: Grant) -> Result<(), StoreError>;
}

/// Membership lookup for a peer relation.
pub trait PeerDirectory {
    /// Every other member of `name` as seen from `local`, in discovery order.
    /// `local` itself is never included.
    fn peers(&self, name: &LockName, local: &NodeId) -> Result<Vec<NodeId>, StoreError>;
}

/// Answers whether the local node currently holds leadership.
/// Queried fresh on every arbitration; the answer may change at any time.
pub trait LeadershipOracle {
    fn is_local_leader(&self) -> bool;
}

/// Receives progress updates for operators.
pub trait StatusSink {
    fn set_unit_status(&self, status: WorkloadStatus);
    fn set_app_status(&self, status: WorkloadStatus);
}

/// A sink that drops every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStatus;

impl StatusSink for NoopStatus {
    fn set_unit_status(&self, _status: WorkloadStatus) {}
    fn set_app_status(&self, _status: WorkloadStatus) {}
}
