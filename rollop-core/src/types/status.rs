use serde::{Deserialize, Serialize};

/// Human-readable progress of a node or of the whole peer group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum WorkloadStatus {
    #[default]
    Active,
    /// Queued behind other nodes
    Waiting(String),
    /// An operation is in progress
    Maintenance(String),
}

impl WorkloadStatus {
    pub fn awaiting(name: &str) -> Self {
        WorkloadStatus::Waiting(format!("Awaiting {} operation", name))
    }

    pub fn executing(name: &str) -> Self {
        WorkloadStatus::Maintenance(format!("Executing {} operation", name))
    }

    pub fn rolling(name: &str) -> Self {
        WorkloadStatus::Maintenance(format!("Beginning rolling {}", name))
    }
}

impl std::fmt::Display for WorkloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkloadStatus::Active => write!(f, "active"),
            WorkloadStatus::Waiting(msg) => write!(f, "waiting: {}", msg),
            WorkloadStatus::Maintenance(msg) => write!(f, "maintenance: {}", msg),
        }
    }
}
