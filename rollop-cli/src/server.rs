use std::sync::Arc;
use tokio::sync::Mutex;

use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;

use rollop_core::types::{AcquireRequest, LockStatus, NodeId};
use rollop_core::{Fleet, LockError, StoreError};

use crate::handlers::*;
use crate::setup::logging_callbacks;

/// Deliveries per `POST /deliver` when the caller sets no limit
const DEFAULT_MAX_DELIVERIES: usize = 10_000;

/// Requests handled at once. The fleet sits behind one mutex anyway.
const MAX_CONCURRENT_REQUESTS: usize = 64;

pub struct ServerState {
    fleet: Mutex<Fleet>,
    /// Override keys every joining node registers
    overrides: Vec<String>,
}

pub type AppState = Arc<ServerState>;

pub async fn run(host: &str, port: u16, name: &str, overrides: Vec<String>) -> Result<(), String> {
    let state: AppState = Arc::new(ServerState {
        fleet: Mutex::new(Fleet::new(name)),
        overrides,
    });

    let app = Router::new()
        // Health is always open (no auth)
        .route("/health", get(health))
        // Protected routes
        .route("/nodes", post(join_node))
        .route("/nodes/{id}/acquire", post(acquire))
        .route("/leader", put(set_leader))
        .route("/deliver", post(deliver))
        .route("/locks", get(list_locks))
        .layer(middleware::from_fn(auth_middleware))
        .layer(CorsLayer::permissive())
        .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .with_state(state);

    let addr = format!("{}:{}", host, port);

    if std::env::var("ROLLOP_API_KEY").is_ok() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!("No ROLLOP_API_KEY set, server is open (dev mode)");
    }

    tracing::info!(name = %name, "Rolling ops server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("failed to bind {}: {}", addr, e))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("server error: {}", e))
}

// ─── Auth Middleware ────────────────────────────────────────────────────────

async fn auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // No key configured: dev mode
    let expected_key = match std::env::var("ROLLOP_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => return Ok(next.run(request).await),
    };

    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth_header.strip_prefix("Bearer ").unwrap_or("");

    if token == expected_key {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Unauthorized request to {}", request.uri().path());
        Err(StatusCode::UNAUTHORIZED)
    }
}

// ─── Error Mapping ──────────────────────────────────────────────────────────

fn error_status(err: &LockError) -> StatusCode {
    match err {
        LockError::NotReady(_) | LockError::Store(StoreError::MissingRelation(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        LockError::Store(StoreError::UnknownNode { .. }) => StatusCode::NOT_FOUND,
        LockError::CallbackNotFound(_) => StatusCode::BAD_REQUEST,
        LockError::NotLeader { .. } | LockError::DuplicateCallback(_) => StatusCode::CONFLICT,
    }
}

fn failure<T: serde::Serialize>(err: LockError) -> (StatusCode, Json<ApiResponse<T>>) {
    (error_status(&err), Json(ApiResponse::err(err.to_string())))
}

fn bad_request<T: serde::Serialize>(msg: String) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::err(msg)))
}

// ─── Handlers ───────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let fleet = state.fleet.lock().await;
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        name: fleet.name().to_string(),
        nodes: fleet.node_ids().len(),
        leader: fleet.leader().map(|node| node.to_string()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

async fn join_node(
    State(state): State<AppState>,
    Json(req): Json<JoinNodeRequest>,
) -> (StatusCode, Json<ApiResponse<NodeResponse>>) {
    if let Err(e) = req.validate() {
        return bad_request(e);
    }

    let node = req.node_id.map(NodeId::new).unwrap_or_else(NodeId::generate);
    let callbacks = match logging_callbacks(&state.overrides, false) {
        Ok(callbacks) => callbacks,
        Err(e) => return failure(e),
    };

    let mut fleet = state.fleet.lock().await;
    if let Err(e) = fleet.join(node.clone(), callbacks) {
        return failure(e);
    }
    tracing::info!(node = %node, name = %fleet.name(), "Node joined");
    (
        StatusCode::CREATED,
        Json(ApiResponse::ok(NodeResponse {
            node_id: node.to_string(),
        })),
    )
}

async fn set_leader(
    State(state): State<AppState>,
    Json(req): Json<SetLeaderRequest>,
) -> (StatusCode, Json<ApiResponse<NodeResponse>>) {
    if let Err(e) = req.validate() {
        return bad_request(e);
    }

    let node = NodeId::new(req.node_id);
    let fleet = state.fleet.lock().await;
    if let Err(e) = fleet.set_leader(&node) {
        return failure(e);
    }
    tracing::info!(node = %node, "Leader elected");
    (
        StatusCode::OK,
        Json(ApiResponse::ok(NodeResponse {
            node_id: node.to_string(),
        })),
    )
}

async fn acquire(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AcquireRequestBody>,
) -> (StatusCode, Json<ApiResponse<AcquireResponse>>) {
    if let Err(e) = validate_node_id(&id).and_then(|_| req.validate()) {
        return bad_request(e);
    }

    let node = NodeId::new(id);
    let fleet = state.fleet.lock().await;
    let mut request = AcquireRequest::new(fleet.name().clone());
    if let Some(key) = &req.callback_override {
        request = request.with_override(key.clone());
    }

    match fleet.request(&node, &request) {
        Ok(_) => {
            tracing::info!(
                node = %node,
                callback_override = ?req.callback_override,
                "Lock requested"
            );
            (
                StatusCode::ACCEPTED,
                Json(ApiResponse::ok(AcquireResponse {
                    node_id: node.to_string(),
                    callback_override: req.callback_override,
                })),
            )
        }
        Err(e) => failure(e),
    }
}

async fn deliver(
    State(state): State<AppState>,
    Json(req): Json<DeliverRequest>,
) -> (StatusCode, Json<ApiResponse<DeliverResponse>>) {
    if let Err(e) = req.validate() {
        return bad_request(e);
    }

    let mut fleet = state.fleet.lock().await;
    let already_run = fleet.runs().len();
    let max_deliveries = req.max_deliveries.unwrap_or(DEFAULT_MAX_DELIVERIES);

    let deliveries = match fleet.run_until_quiescent(max_deliveries) {
        Ok(deliveries) => deliveries,
        Err(e) => return failure(e),
    };
    let runs: Vec<RunInfo> = fleet.runs()[already_run..].iter().map(RunInfo::from).collect();
    tracing::info!(deliveries, runs = runs.len(), "Notifications delivered");

    (
        StatusCode::OK,
        Json(ApiResponse::ok(DeliverResponse {
            deliveries,
            quiescent: fleet.is_quiescent(),
            runs,
        })),
    )
}

async fn list_locks(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<LocksResponse>>) {
    let fleet = state.fleet.lock().await;
    let statuses = match fleet.statuses() {
        Ok(statuses) => statuses,
        Err(e) => return failure(e),
    };

    let holder = statuses
        .iter()
        .find(|(_, status)| *status == LockStatus::Granted)
        .map(|(node, _)| node.to_string());
    let locks = statuses
        .iter()
        .map(|(node, status)| LockInfo {
            node_id: node.to_string(),
            status: status.to_string(),
            pending_notifications: fleet.pending(node),
        })
        .collect();

    (
        StatusCode::OK,
        Json(ApiResponse::ok(LocksResponse {
            name: fleet.name().to_string(),
            leader: fleet.leader().map(|node| node.to_string()),
            holder,
            locks,
        })),
    )
}
