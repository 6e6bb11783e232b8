use serde::{Deserialize, Serialize};

/// Identity of one participant in a peer group (a "unit").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a fresh random id of the form `unit-<nanoid>`.
    pub fn generate() -> Self {
        Self(format!("unit-{}", nanoid::nanoid!(10)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Name of one protocol instance ("restart", "upgrade", ...).
/// Every lock, event and request is scoped to exactly one name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockName(String);

impl LockName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LockName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LockName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for LockName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Value of a node's own request field. An unset field is `None` at the
/// call sites (`Option<Request>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Request {
    /// Asking the leader for the lock
    Acquire,
    /// Done with the lock, asking the leader to reclaim it
    Release,
}

/// Value of the leader-written grant field for one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grant {
    #[default]
    Idle,
    Granted,
}

/// The four-way projection of (request, grant) every decision is made on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockStatus {
    Idle,
    Acquire,
    Granted,
    Release,
}

impl LockStatus {
    /// Derives the status from the raw fields.
    ///
    /// | grant   | request     | status  |
    /// |---------|-------------|---------|
    /// | granted | release     | RELEASE |
    /// | idle    | acquire     | ACQUIRE |
    /// | granted | not release | GRANTED |
    /// | idle    | not acquire | IDLE    |
    pub fn derive(request: Option<Request>, grant: Grant) -> Self {
        match (grant, request) {
            (Grant::Granted, Some(Request::Release)) => LockStatus::Release,
            (Grant::Idle, Some(Request::Acquire)) => LockStatus::Acquire,
            (Grant::Granted, _) => LockStatus::Granted,
            (Grant::Idle, _) => LockStatus::Idle,
        }
    }
}

impl std::fmt::Display for LockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockStatus::Idle => write!(f, "IDLE"),
            LockStatus::Acquire => write!(f, "ACQUIRE"),
            LockStatus::Granted => write!(f, "GRANTED"),
            LockStatus::Release => write!(f, "RELEASE"),
        }
    }
}

/// Notification that some section of the shared store changed for `name`.
/// Carries no data: receivers always re-read the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreChanged {
    pub name: LockName,
}

impl StoreChanged {
    pub fn new(name: impl Into<LockName>) -> Self {
        Self { name: name.into() }
    }
}

/// An operator (or other external trigger) asking the local node to take
/// part in the next rolling operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquireRequest {
    pub name: LockName,
    /// Registry key of a callback to run instead of the default one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_override: Option<String>,
}

impl AcquireRequest {
    pub fn new(name: impl Into<LockName>) -> Self {
        Self {
            name: name.into(),
            callback_override: None,
        }
    }

    pub fn with_override(mut self, key: impl Into<String>) -> Self {
        self.callback_override = Some(key.into());
        self
    }
}
