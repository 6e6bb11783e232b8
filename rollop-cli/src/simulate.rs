use serde::{Deserialize, Serialize};

use rollop_core::types::{AcquireRequest, NodeId};
use rollop_core::{Fleet, LockError};

use crate::handlers::{LockInfo, RunInfo};
use crate::setup::logging_callbacks;

fn default_name() -> String {
    "restart".to_string()
}

fn default_max_deliveries() -> usize {
    10_000
}

/// A scripted peer group, read as JSON from stdin.
#[derive(Debug, Deserialize)]
pub struct SimulationPlan {
    #[serde(default = "default_name")]
    pub name: String,
    /// Node ids in discovery order
    pub nodes: Vec<String>,
    #[serde(default)]
    pub leader: Option<String>,
    /// Override keys registered on every node
    #[serde(default)]
    pub overrides: Vec<String>,
    /// Nodes whose operation reports a failure
    #[serde(default)]
    pub failing: Vec<String>,
    /// Acquire requests, delivered in this order before any notification
    #[serde(default)]
    pub requests: Vec<PlannedRequest>,
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: usize,
}

#[derive(Debug, Deserialize)]
pub struct PlannedRequest {
    pub node: String,
    #[serde(default)]
    pub callback_override: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SimulationOutcome {
    pub name: String,
    pub deliveries: usize,
    pub quiescent: bool,
    /// Runs in the order they happened
    pub runs: Vec<RunInfo>,
    pub locks: Vec<LockInfo>,
}

pub fn run(plan: &SimulationPlan) -> Result<SimulationOutcome, LockError> {
    let mut fleet = Fleet::new(plan.name.as_str());
    for node in &plan.nodes {
        let fail = plan.failing.contains(node);
        fleet.join(NodeId::new(node.as_str()), logging_callbacks(&plan.overrides, fail)?)?;
    }
    if let Some(leader) = &plan.leader {
        fleet.set_leader(&NodeId::new(leader.as_str()))?;
    }

    for planned in &plan.requests {
        let mut request = AcquireRequest::new(fleet.name().clone());
        if let Some(key) = &planned.callback_override {
            request = request.with_override(key.as_str());
        }
        fleet.request(&NodeId::new(planned.node.as_str()), &request)?;
    }

    let deliveries = fleet.run_until_quiescent(plan.max_deliveries)?;
    let locks = fleet
        .statuses()?
        .into_iter()
        .map(|(node, status)| LockInfo {
            pending_notifications: fleet.pending(&node),
            node_id: node.to_string(),
            status: status.to_string(),
        })
        .collect();

    Ok(SimulationOutcome {
        name: plan.name.clone(),
        deliveries,
        quiescent: fleet.is_quiescent(),
        runs: fleet.runs().iter().map(RunInfo::from).collect(),
        locks,
    })
}
