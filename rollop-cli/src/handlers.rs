use serde::{Deserialize, Serialize};

use rollop_core::RunReport;

// ─── Validation Helpers ─────────────────────────────────────────────────────

pub fn validate_node_id(node_id: &str) -> Result<(), String> {
    if node_id.trim().is_empty() {
        return Err("node_id must not be blank".to_string());
    }
    if node_id.chars().any(char::is_whitespace) {
        return Err(format!("node_id '{}' must not contain whitespace", node_id));
    }
    Ok(())
}

// ─── Request Types ──────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub struct JoinNodeRequest {
    /// Generated when absent
    #[serde(default)]
    pub node_id: Option<String>,
}

impl JoinNodeRequest {
    pub fn validate(&self) -> Result<(), String> {
        match &self.node_id {
            Some(node_id) => validate_node_id(node_id),
            None => Ok(()),
        }
    }
}

#[derive(Deserialize)]
pub struct SetLeaderRequest {
    pub node_id: String,
}

impl SetLeaderRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_node_id(&self.node_id)
    }
}

#[derive(Deserialize, Default)]
pub struct AcquireRequestBody {
    #[serde(default)]
    pub callback_override: Option<String>,
}

impl AcquireRequestBody {
    pub fn validate(&self) -> Result<(), String> {
        match self.callback_override.as_deref() {
            Some(key) if key.trim().is_empty() => {
                Err("callback_override must not be blank".to_string())
            }
            _ => Ok(()),
        }
    }
}

#[derive(Deserialize, Default)]
pub struct DeliverRequest {
    #[serde(default)]
    pub max_deliveries: Option<usize>,
}

impl DeliverRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_deliveries == Some(0) {
            return Err("max_deliveries must be greater than 0".to_string());
        }
        Ok(())
    }
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub name: String,
    pub nodes: usize,
    pub leader: Option<String>,
    pub version: String,
}

#[derive(Serialize)]
pub struct NodeResponse {
    pub node_id: String,
}

#[derive(Serialize)]
pub struct AcquireResponse {
    pub node_id: String,
    pub callback_override: Option<String>,
}

/// One completed run, flattened for JSON
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RunInfo {
    pub node_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_override: Option<String>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&RunReport> for RunInfo {
    fn from(report: &RunReport) -> Self {
        Self {
            node_id: report.node.to_string(),
            callback_override: report.callback_override.clone(),
            ok: report.outcome.is_ok(),
            error: report.outcome.as_ref().err().map(|err| err.0.clone()),
        }
    }
}

#[derive(Serialize)]
pub struct DeliverResponse {
    pub deliveries: usize,
    pub quiescent: bool,
    pub runs: Vec<RunInfo>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct LockInfo {
    pub node_id: String,
    pub status: String,
    pub pending_notifications: usize,
}

#[derive(Serialize)]
pub struct LocksResponse {
    pub name: String,
    pub leader: Option<String>,
    pub holder: Option<String>,
    pub locks: Vec<LockInfo>,
}
