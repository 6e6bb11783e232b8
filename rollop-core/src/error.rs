//! Error types for rolling operation locks

use crate::types::{LockName, NodeId};
use thiserror::Error;

/// Failures reported by a shared store backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no peer relation named `{0}`")]
    MissingRelation(LockName),
    #[error("node {node} is not a member of `{name}`")]
    UnknownNode { name: LockName, node: NodeId },
}

/// Errors surfaced by locks, the coordinator and the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The peer relation for this instance does not exist yet.
    /// Recoverable: defer the triggering event and retry later.
    #[error("peer relation `{0}` is not ready")]
    NotReady(LockName),
    #[error("node {node} is not the leader, refusing to arbitrate `{name}`")]
    NotLeader { name: LockName, node: NodeId },
    #[error("no callback registered under `{0}`")]
    CallbackNotFound(String),
    #[error("callback `{0}` is already registered")]
    DuplicateCallback(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl LockError {
    /// True when the caller should defer and retry rather than give up.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LockError::NotReady(_))
    }
}

/// Failure reported by a run callback. Never stops the lock from being
/// released; it is handed back to the caller in the run report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CallbackError(pub String);

impl CallbackError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
