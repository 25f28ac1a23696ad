//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the vault over HTTP. All endpoints
//! share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                  | Description                              |
//! |--------|-----------------------|------------------------------------------|
//! | GET    | `/health`             | Liveness probe                           |
//! | GET    | `/status`             | Vault summary                            |
//! | GET    | `/owner`              | Vault owner                              |
//! | GET    | `/token`              | Custodied token address (token vaults)   |
//! | GET    | `/balance`            | Total custodied                          |
//! | GET    | `/balances/:address`  | One depositor's claim                    |
//! | GET    | `/events?since=n`     | Committed events after sequence `n`      |
//! | POST   | `/deposit`            | Deposit `{caller, amount}`               |
//! | POST   | `/withdraw`           | Withdraw `{caller, amount}`              |
//! | POST   | `/audit`              | Owner-only claim snapshot `{caller}`     |
//! | POST   | `/faucet`             | Devnet: fund a wallet `{account, amount}`|
//! | POST   | `/approve`            | Devnet: approve the vault `{holder, amount}` |
//! | GET    | `/wallets/:address`   | Devnet: balance on the asset ledger      |
//! | GET    | `/ws`                 | WebSocket stream of committed events     |
//!
//! Failures return `{ "error": <code>, "message": <text> }` where `code` is
//! the snake_case name of the error.
//!
//! This is a devnet surface: `caller` is taken from the request body and
//! trusted as-is. The owner gate on `/audit` and the owner and custodian
//! refusals on `/deposit` and `/withdraw` enforce the vault's rules, not
//! authentication.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use custody_contracts::{OperationReceipt, SharedVault, Vault};
use custody_ledger::asset::TransferAdapter;
use custody_ledger::config::MAX_EVENTS_PER_PAGE;
use custody_ledger::{Address, Amount, EventRecord, LedgerSnapshot, VaultError};

use crate::devnet::{DevnetAsset, DevnetError};
use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The hosted vault and its devnet asset ledger.
    pub vault: Arc<SharedVault<DevnetAsset>>,
    /// Committed events, fanned out to WebSocket subscribers.
    pub event_tx: broadcast::Sender<EventRecord>,
    /// Prometheus handles for in-handler recording.
    pub metrics: SharedMetrics,
}

/// Commit hook for the node's [`SharedVault`]: refreshes the vault gauges
/// and broadcasts the event. It runs under the vault lock, so gauges never
/// go stale and subscribers receive events in `seq` order.
pub fn publish_commits(
    event_tx: broadcast::Sender<EventRecord>,
    metrics: SharedMetrics,
) -> impl Fn(&OperationReceipt, &Vault) + Send + Sync + 'static {
    move |receipt, vault| {
        metrics.observe_vault(receipt.total_custodied, vault.depositor_count());
        // No subscribers is fine.
        let _ = event_tx.send(receipt.record.clone());
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/owner", get(owner_handler))
        .route("/token", get(token_handler))
        .route("/balance", get(balance_handler))
        .route("/balances/:address", get(balance_of_handler))
        .route("/events", get(events_handler))
        .route("/deposit", post(deposit_handler))
        .route("/withdraw", post(withdraw_handler))
        .route("/audit", post(audit_handler))
        .route("/faucet", post(faucet_handler))
        .route("/approve", post(approve_handler))
        .route("/wallets/:address", get(wallet_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /deposit` and `POST /withdraw`.
#[derive(Debug, Deserialize)]
pub struct OperationRequest {
    pub caller: String,
    pub amount: Amount,
}

/// Body of `POST /audit`.
#[derive(Debug, Deserialize)]
pub struct AuditRequest {
    pub caller: String,
}

/// Body of `POST /faucet`.
#[derive(Debug, Deserialize)]
pub struct FaucetRequest {
    pub account: String,
    pub amount: Amount,
}

/// Body of `POST /approve`.
#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub holder: String,
    pub amount: Amount,
}

/// Query of `GET /events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: u64,
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    /// `native` or `token:<address>`.
    pub asset: String,
    pub owner: String,
    pub total_custodied: Amount,
    pub depositors: usize,
    pub events: usize,
    /// Aggregate equals the sum of claims.
    pub consistent: bool,
    /// The custodian holds at least the aggregate.
    pub solvent: bool,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TotalResponse {
    pub total_custodied: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WalletResponse {
    pub account: String,
    pub wallet_balance: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AllowanceResponse {
    pub holder: String,
    pub spender: String,
    pub allowance: Amount,
}

/// Error body returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// An error on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        let status = match &err {
            VaultError::NotPermittedForOwner { .. }
            | VaultError::NotPermittedForCustodian { .. }
            | VaultError::OwnerOnly { .. } => StatusCode::FORBIDDEN,
            VaultError::ZeroValueNotAllowed => StatusCode::BAD_REQUEST,
            VaultError::InsufficientBalance { .. } | VaultError::Overflow { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            VaultError::TransferFailed(_) => StatusCode::FAILED_DEPENDENCY,
            VaultError::ReentrantCall { .. } => StatusCode::CONFLICT,
            VaultError::AssetMismatch { .. }
            | VaultError::Storage(_)
            | VaultError::StoreMismatch(_)
            | VaultError::Inconsistent(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<DevnetError> for ApiError {
    fn from(err: DevnetError) -> Self {
        match err {
            DevnetError::NoAllowances => {
                Self::new(StatusCode::BAD_REQUEST, "unsupported", err.to_string())
            }
            DevnetError::Transfer(e) => Self::from(VaultError::TransferFailed(e)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.code.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    raw.parse::<Address>().map_err(|e| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_address",
            format!("{:?}: {}", raw, e),
        )
    })
}

// ---------------------------------------------------------------------------
// Read Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — vault summary plus a live reconciliation.
async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let reconciliation = state.vault.reconcile()?;
    let resp = state.vault.read(|v| StatusResponse {
        version: state.version.clone(),
        asset: v.asset().to_string(),
        owner: v.owner().to_string(),
        total_custodied: v.get_contract_balance(),
        depositors: v.depositor_count(),
        events: v.events().len(),
        consistent: v.is_consistent(),
        solvent: reconciliation.is_solvent(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    });
    Ok(Json(resp))
}

/// `GET /owner`
async fn owner_handler(State(state): State<AppState>) -> impl IntoResponse {
    let owner = state.vault.read(|v| v.owner().to_string());
    Json(serde_json::json!({ "owner": owner }))
}

/// `GET /token` — 404 on a native vault.
async fn token_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    match state
        .vault
        .read(|v| v.token_address().map(|a| a.to_string()))
    {
        Some(token) => Ok(Json(serde_json::json!({ "token_address": token }))),
        None => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "not_found",
            "native vaults have no token address",
        )),
    }
}

/// `GET /balance` — total custodied across all depositors.
async fn balance_handler(State(state): State<AppState>) -> Json<TotalResponse> {
    let total_custodied = state.vault.read(|v| v.get_contract_balance());
    Json(TotalResponse { total_custodied })
}

/// `GET /balances/:address` — one claim. Unseen addresses read as zero.
async fn balance_of_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let depositor = parse_address(&address)?;
    let balance = state.vault.read(|v| v.my_balance(&depositor));
    Ok(Json(BalanceResponse { address, balance }))
}

/// `GET /events?since=n` — at most one page of events after `n`.
async fn events_handler(
    Query(query): Query<EventsQuery>,
    State(state): State<AppState>,
) -> Json<Vec<EventRecord>> {
    let page: Vec<EventRecord> = state.vault.read(|v| {
        v.events_since(query.since)
            .iter()
            .take(MAX_EVENTS_PER_PAGE)
            .cloned()
            .collect()
    });
    Json(page)
}

// ---------------------------------------------------------------------------
// Operation Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Operation {
    Deposit,
    Withdraw,
}

/// `POST /deposit`
async fn deposit_handler(
    State(state): State<AppState>,
    Json(req): Json<OperationRequest>,
) -> Result<Json<OperationReceipt>, ApiError> {
    let caller = parse_address(&req.caller)?;
    run_operation(&state, Operation::Deposit, caller, req.amount).await
}

/// `POST /withdraw`
async fn withdraw_handler(
    State(state): State<AppState>,
    Json(req): Json<OperationRequest>,
) -> Result<Json<OperationReceipt>, ApiError> {
    let caller = parse_address(&req.caller)?;
    run_operation(&state, Operation::Withdraw, caller, req.amount).await
}

/// Runs one vault operation off the async executor (it takes a lock and
/// flushes sled), then counts the outcome. Gauges and the event broadcast
/// are handled by [`publish_commits`] under the vault lock.
async fn run_operation(
    state: &AppState,
    op: Operation,
    caller: Address,
    amount: Amount,
) -> Result<Json<OperationReceipt>, ApiError> {
    let timer = state.metrics.operation_latency_seconds.start_timer();
    let vault = Arc::clone(&state.vault);
    let result = tokio::task::spawn_blocking(move || match op {
        Operation::Deposit => vault.deposit(&caller, amount),
        Operation::Withdraw => vault.withdraw(&caller, amount),
    })
    .await
    .map_err(|e| {
        tracing::error!("vault operation task failed: {}", e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", e.to_string())
    })?;
    timer.observe_duration();

    match result {
        Ok(receipt) => {
            match op {
                Operation::Deposit => state.metrics.deposits_total.inc(),
                Operation::Withdraw => state.metrics.withdrawals_total.inc(),
            }
            Ok(Json(receipt))
        }
        Err(e) => {
            state.metrics.reject(e.code());
            Err(e.into())
        }
    }
}

/// `POST /audit` — owner-only snapshot of every claim.
///
/// Devnet: the `caller` in the body is trusted, so this gates nothing
/// against a client willing to claim the owner's address.
async fn audit_handler(
    State(state): State<AppState>,
    Json(req): Json<AuditRequest>,
) -> Result<Json<LedgerSnapshot>, ApiError> {
    let caller = parse_address(&req.caller)?;
    Ok(Json(state.vault.audit(&caller)?))
}

// ---------------------------------------------------------------------------
// Devnet Handlers
// ---------------------------------------------------------------------------

/// `POST /faucet` — issues devnet funds to a wallet.
async fn faucet_handler(
    State(state): State<AppState>,
    Json(req): Json<FaucetRequest>,
) -> Result<Json<WalletResponse>, ApiError> {
    let account = parse_address(&req.account)?;
    let wallet_balance = state
        .vault
        .with_adapter(|asset| asset.faucet(&account, req.amount))?;
    tracing::info!(account = %account, amount = %req.amount, "faucet drip");
    Ok(Json(WalletResponse {
        account: req.account,
        wallet_balance,
    }))
}

/// `POST /approve` — sets the holder's allowance to the vault custodian.
async fn approve_handler(
    State(state): State<AppState>,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<AllowanceResponse>, ApiError> {
    let holder = parse_address(&req.holder)?;
    let (spender, allowance) = state.vault.with_adapter(|asset| {
        asset
            .approve(&holder, req.amount)
            .map(|allowance| (asset.custodian().to_string(), allowance))
    })?;
    Ok(Json(AllowanceResponse {
        holder: req.holder,
        spender,
        allowance,
    }))
}

/// `GET /wallets/:address` — balance on the asset ledger, not in the vault.
async fn wallet_handler(
    Path(account): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<WalletResponse>, ApiError> {
    let holder = parse_address(&account)?;
    let wallet_balance = state.vault.with_adapter(|asset| asset.wallet_balance(&holder));
    Ok(Json(WalletResponse {
        account,
        wallet_balance,
    }))
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// `GET /ws` — WebSocket upgrade for live event streaming.
///
/// Clients receive each committed [`EventRecord`] as JSON. Client messages
/// are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Forwards broadcast events until the client disconnects or the channel
/// is closed.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(record) => {
                        let payload = match serde_json::to_string(&record) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
