use crate::error::LockError;
use crate::lock::{Arbiter, Lock};
use crate::lock_set::LockSet;
use crate::types::{LockName, LockStatus, NodeId};
use serde::Serialize;
use std::collections::VecDeque;

/// What one arbitration pass saw and wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorPass {
    /// Node whose outstanding grant stopped the pass early
    pub blocked_by: Option<NodeId>,
    /// Nodes whose released locks were cleared back to idle
    pub reclaimed: Vec<NodeId>,
    /// Pending requests, in pick order (the last one wins)
    pub pending: Vec<NodeId>,
    pub granted: Option<NodeId>,
}

impl CoordinatorPass {
    /// Number of grant-field writes this pass made
    pub fn writes(&self) -> usize {
        self.reclaimed.len() + usize::from(self.granted.is_some())
    }

    pub fn granted_to(&self, node: &NodeId) -> bool {
        self.granted.as_ref() == Some(node)
    }

    /// Nothing held and nothing left waiting: the rollout is over.
    pub fn is_quiescent(&self) -> bool {
        self.blocked_by.is_none() && self.granted.is_none()
    }
}

/// Leader-side arbitration over every lock of one protocol instance.
pub struct Coordinator;

impl Coordinator {
    /// Run one pass.
    ///
    /// 1. Walk the lock set once, in its order.
    /// 2. Any lock still held stops the pass with no further writes, so at
    ///    most one grant is ever outstanding.
    /// 3. Released locks are cleared on the way.
    /// 4. Pending requests are collected; the leader's own request goes to the
    ///    front, everybody else's to the back.
    /// 5. The last pending request is granted. The leader therefore only
    ///    grants itself once nobody else is waiting.
    ///
    /// Running the local node when it is the one granted is left to the caller.
    pub fn process(locks: &LockSet<'_>, arbiter: &Arbiter<'_>) -> Result<CoordinatorPass, LockError> {
        let leader = arbiter.leader();
        let mut pass = CoordinatorPass::default();
        let mut pending: VecDeque<Lock<'_>> = VecDeque::new();

        for lock in locks.iter()? {
            match lock.status()? {
                LockStatus::Granted => {
                    tracing::debug!(name = %arbiter.name(), holder = %lock.node(), "lock still held");
                    pass.blocked_by = Some(lock.node().clone());
                    return Ok(pass);
                }
                LockStatus::Release => {
                    // Cleared locks read back as idle, never as pending.
                    arbiter.clear(&lock)?;
                    pass.reclaimed.push(lock.node().clone());
                }
                LockStatus::Acquire if lock.node() == leader => pending.push_front(lock),
                LockStatus::Acquire => pending.push_back(lock),
                LockStatus::Idle => {}
            }
        }

        if let Some(next) = pending.back() {
            arbiter.grant(next)?;
            pass.granted = Some(next.node().clone());
        }
        pass.pending = pending.iter().map(|lock| lock.node().clone()).collect();

        log_pass(arbiter.name(), &pass);
        Ok(pass)
    }
}

fn log_pass(name: &LockName, pass: &CoordinatorPass) {
    match &pass.granted {
        Some(node) => tracing::info!(
            name = %name,
            granted = %node,
            waiting = pass.pending.len().saturating_sub(1),
            reclaimed = pass.reclaimed.len(),
            "lock granted"
        ),
        None => tracing::debug!(name = %name, reclaimed = pass.reclaimed.len(), "nothing to grant"),
    }
}
