//! JSON-RPC front end
//!
//! Exposes the mining session over HTTP the way node RPC servers do: a
//! single `POST /` endpoint taking `{"id", "method", "params"}`. Session calls
//! take a lock and may assemble a block, so they run on the blocking pool.

use crate::config::parse_payout_address;
use crate::session::MiningSession;
use crate::{Error, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bitcoin::{Network, ScriptBuf};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// JSON-RPC code for an unknown method
pub const METHOD_NOT_FOUND: i32 = -32601;
/// JSON-RPC code for malformed parameters
pub const INVALID_PARAMS: i32 = -32602;
/// JSON-RPC code for internal failures
pub const INTERNAL_ERROR: i32 = -32603;

/// Shared state for the RPC server
#[derive(Clone)]
pub struct RpcState {
    session: Arc<MiningSession>,
    network: Network,
    default_payout: Option<ScriptBuf>,
}

impl RpcState {
    pub fn new(
        session: Arc<MiningSession>,
        network: Network,
        default_payout: Option<ScriptBuf>,
    ) -> Self {
        Self {
            session,
            network,
            default_payout,
        }
    }

    fn default_payout(&self) -> Result<ScriptBuf> {
        self.default_payout
            .clone()
            .ok_or_else(|| Error::invalid_address("no payout address configured"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<Error> for RpcError {
    fn from(err: Error) -> Self {
        Self::new(err.rpc_code(), err.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub result: Value,
    pub error: Option<RpcError>,
    pub id: Value,
}

/// A parsed mining call
#[derive(Debug)]
enum Call {
    CreateAuxBlock(ScriptBuf),
    SubmitAuxBlock { hash: String, auxpow: String },
    CreateWork(ScriptBuf),
    SubmitWork(String),
}

impl Call {
    fn parse(state: &RpcState, method: &str, params: &[Value]) -> std::result::Result<Self, RpcError> {
        match (method, params.len()) {
            ("createauxblock", 1) => {
                let address = string_param(params, 0, "address")?;
                Ok(Call::CreateAuxBlock(parse_payout_address(&address, state.network)?))
            }
            ("getauxblock", 0) => Ok(Call::CreateAuxBlock(state.default_payout()?)),
            ("submitauxblock", 2) | ("getauxblock", 2) => Ok(Call::SubmitAuxBlock {
                hash: string_param(params, 0, "hash")?,
                auxpow: string_param(params, 1, "auxpow")?,
            }),
            ("getwork", 0) => Ok(Call::CreateWork(state.default_payout()?)),
            ("getwork", 1) => Ok(Call::SubmitWork(string_param(params, 0, "data")?)),
            ("createauxblock" | "submitauxblock" | "getauxblock" | "getwork", n) => Err(
                RpcError::new(INVALID_PARAMS, format!("{} does not take {} parameters", method, n)),
            ),
            _ => Err(RpcError::new(METHOD_NOT_FOUND, format!("Method not found: {}", method))),
        }
    }

    fn execute(self, session: &MiningSession) -> Result<Value> {
        let value = match self {
            Call::CreateAuxBlock(payout) => serde_json::to_value(session.create_aux_block(&payout)?)?,
            Call::SubmitAuxBlock { hash, auxpow } => {
                Value::Bool(session.submit_aux_block(&hash, &auxpow)?)
            }
            Call::CreateWork(payout) => serde_json::to_value(session.create_work(&payout)?)?,
            Call::SubmitWork(data) => Value::Bool(session.submit_work(&data)?),
        };
        Ok(value)
    }
}

fn string_param(params: &[Value], index: usize, name: &str) -> std::result::Result<String, RpcError> {
    params
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| RpcError::new(INVALID_PARAMS, format!("{} must be a string", name)))
}

/// Run one request against the session
pub async fn dispatch(state: &RpcState, request: RpcRequest) -> RpcResponse {
    let method = request.method.clone();
    let outcome = match Call::parse(state, &request.method, &request.params) {
        Ok(call) => {
            let session = Arc::clone(&state.session);
            match tokio::task::spawn_blocking(move || call.execute(&session)).await {
                Ok(result) => result.map_err(RpcError::from),
                Err(e) => Err(RpcError::new(INTERNAL_ERROR, format!("request task failed: {}", e))),
            }
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(result) => RpcResponse {
            result,
            error: None,
            id: request.id,
        },
        Err(error) => {
            warn!(%method, code = error.code, message = %error.message, "RPC call failed");
            RpcResponse {
                result: Value::Null,
                error: Some(error),
                id: request.id,
            }
        }
    }
}

async fn rpc_handler(State(state): State<RpcState>, Json(request): Json<RpcRequest>) -> Json<RpcResponse> {
    Json(dispatch(&state, request).await)
}

async fn health_handler(State(state): State<RpcState>) -> (StatusCode, Json<Value>) {
    let session = Arc::clone(&state.session);
    match tokio::task::spawn_blocking(move || session.outstanding_candidates()).await {
        Ok(outstanding) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "outstanding_candidates": outstanding,
            })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "error",
                "message": e.to_string(),
            })),
        ),
    }
}

/// Build the HTTP router
pub fn router(state: RpcState) -> Router {
    Router::new()
        .route("/", post(rpc_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve RPC requests until `cancellation` fires
pub async fn serve(state: RpcState, addr: SocketAddr, cancellation: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "RPC server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancellation.cancelled().await })
        .await?;

    info!("RPC server stopped");
    Ok(())
}
