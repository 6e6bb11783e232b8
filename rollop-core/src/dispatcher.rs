//! Node-local reaction to store changes
//!
//! One [`RollingOps`] exists per (node, protocol instance). The orchestration
//! runtime hands it every store-change notification and every acquire request;
//! it decides whether to run the protected operation, whether to arbitrate,
//! or (for another instance's events) to do nothing at all.

use crate::callbacks::{CallbackRegistry, RunContext};
use crate::coordinator::{Coordinator, CoordinatorPass};
use crate::error::{CallbackError, LockError};
use crate::infrastructure::{LeadershipOracle, NoopStatus, PeerDirectory, PeerStore, StatusSink};
use crate::lock::{Arbiter, Lock, Requester};
use crate::lock_set::LockSet;
use crate::types::{AcquireRequest, LockName, NodeId, StoreChanged, WorkloadStatus};
use std::sync::Arc;

/// External capabilities a dispatcher is built on
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn PeerStore + Send + Sync>,
    pub directory: Arc<dyn PeerDirectory + Send + Sync>,
    pub leadership: Arc<dyn LeadershipOracle + Send + Sync>,
    pub status: Arc<dyn StatusSink + Send + Sync>,
}

impl Collaborators {
    pub fn new(
        store: Arc<dyn PeerStore + Send + Sync>,
        directory: Arc<dyn PeerDirectory + Send + Sync>,
        leadership: Arc<dyn LeadershipOracle + Send + Sync>,
    ) -> Self {
        Self {
            store,
            directory,
            leadership,
            status: Arc::new(NoopStatus),
        }
    }

    pub fn with_status(mut self, status: Arc<dyn StatusSink + Send + Sync>) -> Self {
        self.status = status;
        self
    }
}

/// Outcome of one run phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub node: NodeId,
    pub callback_override: Option<String>,
    /// The callback's own result. The lock was released either way.
    pub outcome: Result<(), CallbackError>,
}

/// Everything one dispatcher entry point did, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub runs: Vec<RunReport>,
    pub passes: Vec<CoordinatorPass>,
}

impl DispatchReport {
    /// True when the event was ignored or nothing needed doing
    pub fn is_noop(&self) -> bool {
        self.runs.is_empty() && self.passes.iter().all(|pass| pass.writes() == 0)
    }
}

/// Rolling-operation manager for one node and one protocol instance.
pub struct RollingOps {
    name: LockName,
    local: NodeId,
    store: Arc<dyn PeerStore + Send + Sync>,
    directory: Arc<dyn PeerDirectory + Send + Sync>,
    leadership: Arc<dyn LeadershipOracle + Send + Sync>,
    status: Arc<dyn StatusSink + Send + Sync>,
    callbacks: CallbackRegistry,
}

impl RollingOps {
    pub fn new(
        name: impl Into<LockName>,
        local: NodeId,
        collaborators: Collaborators,
        callbacks: CallbackRegistry,
    ) -> Self {
        Self {
            name: name.into(),
            local,
            store: collaborators.store,
            directory: collaborators.directory,
            leadership: collaborators.leadership,
            status: collaborators.status,
            callbacks,
        }
    }

    pub fn name(&self) -> &LockName {
        &self.name
    }

    pub fn local(&self) -> &NodeId {
        &self.local
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    pub fn is_leader(&self) -> bool {
        self.leadership.is_local_leader()
    }

    /// View of the local node's lock
    pub fn lock(&self) -> Result<Lock<'_>, LockError> {
        Lock::open(self.store.as_ref(), &self.name, &self.local)
    }

    /// React to a change anywhere in the shared store.
    ///
    /// Runs the protected operation if the local node holds the lock, then
    /// arbitrates if the local node leads. Both can happen for one event.
    pub fn on_store_changed(&self, event: &StoreChanged) -> Result<DispatchReport, LockError> {
        let mut report = DispatchReport::default();
        if event.name != self.name {
            return Ok(report);
        }

        if self.lock()?.is_held()? {
            self.run_into(&mut report)?;
        }
        if self.is_leader() {
            self.process_into(&mut report)?;
        }
        Ok(report)
    }

    /// Ask for the lock on behalf of an operator.
    ///
    /// Returns `Ok(false)` when the request is for another instance. An
    /// unknown override key is rejected before anything is written.
    pub fn on_acquire(&self, request: &AcquireRequest) -> Result<bool, LockError> {
        if request.name != self.name {
            return Ok(false);
        }

        let key = request.callback_override.as_deref();
        self.callbacks.validate(key)?;
        Requester::open(self.store.as_ref(), &self.name, &self.local)?.acquire_with(key)?;
        self.status.set_unit_status(WorkloadStatus::awaiting(self.name.as_str()));

        tracing::info!(name = %self.name, node = %self.local, callback = ?key, "acquire requested");
        Ok(true)
    }

    /// Run the protected operation and release the lock. The caller must
    /// hold the lock.
    pub fn run_with_lock(&self) -> Result<DispatchReport, LockError> {
        let mut report = DispatchReport::default();
        self.run_into(&mut report)?;
        Ok(report)
    }

    /// Arbitrate once. A no-op unless the local node leads.
    pub fn process_locks(&self) -> Result<DispatchReport, LockError> {
        let mut report = DispatchReport::default();
        self.process_into(&mut report)?;
        Ok(report)
    }

    fn run_into(&self, report: &mut DispatchReport) -> Result<(), LockError> {
        let requester = Requester::open(self.store.as_ref(), &self.name, &self.local)?;
        let callback_override = requester.callback_override()?;
        let context = RunContext {
            name: self.name.clone(),
            node: self.local.clone(),
            callback_override: callback_override.clone(),
        };

        self.status.set_unit_status(WorkloadStatus::executing(self.name.as_str()));
        tracing::info!(name = %self.name, node = %self.local, callback = ?callback_override, "running with lock");

        // An override that disappeared since the acquire counts as a failed run.
        let outcome = match self.callbacks.resolve(callback_override.as_deref()) {
            Ok(callback) => callback(&context),
            Err(err) => Err(CallbackError::new(err.to_string())),
        };
        if let Err(err) = &outcome {
            tracing::warn!(name = %self.name, node = %self.local, error = %err, "operation failed, releasing lock anyway");
        }

        requester.release()?;
        self.status.set_unit_status(WorkloadStatus::Active);
        report.runs.push(RunReport {
            node: self.local.clone(),
            callback_override,
            outcome,
        });

        if self.is_leader() {
            self.process_into(report)?;
        }
        Ok(())
    }

    fn process_into(&self, report: &mut DispatchReport) -> Result<(), LockError> {
        let arbiter = match Arbiter::claim(
            self.store.as_ref(),
            self.leadership.as_ref(),
            &self.name,
            &self.local,
        ) {
            Ok(arbiter) => arbiter,
            Err(LockError::NotLeader { .. }) => return Ok(()),
            Err(err) => return Err(err),
        };

        let locks = LockSet::new(self.store.as_ref(), self.directory.as_ref(), &self.name, &self.local);
        let pass = Coordinator::process(&locks, &arbiter)?;

        if pass.granted.is_some() {
            self.status.set_app_status(WorkloadStatus::rolling(self.name.as_str()));
        } else if pass.is_quiescent() {
            self.status.set_app_status(WorkloadStatus::Active);
        }

        let run_local = pass.granted_to(&self.local);
        report.passes.push(pass);
        if run_local {
            self.run_into(report)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RollingOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollingOps")
            .field("name", &self.name)
            .field("local", &self.local)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}
