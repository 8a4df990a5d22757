//! API Boundary Adapter (C7): translates external HTTP requests into `TASK`
//! envelopes addressed to the orchestrator and unwraps the reply.
//!
//! Grounded on the teacher's `rest_api.rs` (State-extractor handlers,
//! `ErrorResponse`, `create_app`/`start_server` naming) with routes and payload
//! shapes taken from SPEC_FULL §6's external-interfaces table. No business logic
//! lives here per §4.7 step 5 — every handler does nothing but decode, dispatch
//! through the [`Router`], and re-encode the reply.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router as AxumRouter,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::coordination::conversation_manager::ConversationManager;
use crate::coordination::domain_types::{AgentId, ConversationId, Envelope, MessageType, Ttl};
use crate::coordination::orchestrator::Orchestrator;
use crate::coordination::router::Router;
use crate::coordination::trace_store::TraceStore;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    pub router: Arc<Router>,
    pub trace_store: Arc<dyn TraceStore>,
    pub conversation_manager: Arc<ConversationManager>,
}

/// Error body returned for any request the adapter could not fulfill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn api_agent_id() -> AgentId {
    AgentId::try_from("api".to_string()).expect("literal satisfies AgentId bounds")
}

fn default_max_results() -> usize {
    10
}

fn default_strategy() -> String {
    "hybrid".to_string()
}

fn default_analysis_type() -> String {
    "contradiction".to_string()
}

fn default_max_depth() -> usize {
    3
}

/// `POST /assistant` request body, per SPEC_FULL §6's "Assistant" task dispatch
/// input shape.
#[derive(Debug, Deserialize)]
pub struct AssistantRequest {
    pub message: String,
    pub conversation_id: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

/// `POST /analysis` request body, per SPEC_FULL §6's "Analysis" task dispatch
/// input shape.
#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub query: String,
    pub conversation_id: Option<String>,
    #[serde(default = "default_analysis_type")]
    pub analysis_type: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

/// Builds the Axum router exposing the four routes named in SPEC_FULL §4.7.
#[must_use]
pub fn create_app(state: ApiState) -> AxumRouter {
    AxumRouter::new()
        .route("/health", get(health))
        .route("/conversation/{id}", get(conversation_trace))
        .route("/assistant", post(assistant))
        .route("/analysis", post(analysis))
        .with_state(state)
}

/// Binds and serves `create_app`'s router on `addr`.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails while
/// serving requests.
pub async fn start_server(
    addr: SocketAddr,
    state: ApiState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_app(state);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "healthy"}))
}

fn resolve_conversation_id(raw: Option<&str>, manager: &ConversationManager) -> Option<ConversationId> {
    match raw {
        None => Some(manager.new_conversation_id()),
        Some(raw) => raw.parse::<uuid::Uuid>().ok().map(ConversationId::new),
    }
}

async fn dispatch(state: &ApiState, conversation_id: ConversationId, payload: serde_json::Value) -> impl IntoResponse {
    let ttl = Ttl::default_a2a_timeout();
    state.conversation_manager.touch(conversation_id, ttl);

    let envelope = Envelope::new(
        conversation_id,
        MessageType::Task,
        api_agent_id(),
        Some(Orchestrator::agent_id()),
        ttl,
        payload,
    );

    match state.router.route(envelope).await {
        None => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(ErrorResponse {
                error: "no reply from orchestrator".to_string(),
            }),
        )
            .into_response(),
        Some(reply) => {
            let success = reply
                .payload
                .get("success")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);

            if success {
                (StatusCode::OK, Json(reply.payload)).into_response()
            } else {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(reply.payload)).into_response()
            }
        }
    }
}

async fn assistant(State(state): State<ApiState>, Json(request): Json<AssistantRequest>) -> impl IntoResponse {
    let Some(conversation_id) = resolve_conversation_id(request.conversation_id.as_deref(), &state.conversation_manager)
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "invalid conversation_id".to_string(),
            }),
        )
            .into_response();
    };

    dispatch(
        &state,
        conversation_id,
        serde_json::json!({
            "task_type": "assistant_workflow",
            "query": request.message,
            "strategy": request.strategy,
            "max_results": request.max_results,
        }),
    )
    .await
    .into_response()
}

async fn analysis(State(state): State<ApiState>, Json(request): Json<AnalysisRequest>) -> impl IntoResponse {
    let Some(conversation_id) = resolve_conversation_id(request.conversation_id.as_deref(), &state.conversation_manager)
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "invalid conversation_id".to_string(),
            }),
        )
            .into_response();
    };

    dispatch(
        &state,
        conversation_id,
        serde_json::json!({
            "task_type": "analysis_workflow",
            "query": request.query,
            "analysis_type": request.analysis_type,
            "max_depth": request.max_depth,
        }),
    )
    .await
    .into_response()
}

/// `GET /conversation/{id}`, per SPEC_FULL §6's trace retrieval endpoint shape.
async fn conversation_trace(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    let Ok(uuid) = id.parse::<uuid::Uuid>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "invalid conversation id".to_string(),
            }),
        )
            .into_response();
    };
    let conversation_id = ConversationId::new(uuid);

    match state.trace_store.by_conversation(conversation_id).await {
        Ok(messages) => {
            let total_messages = messages.len();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "conversation_id": conversation_id,
                    "messages": messages,
                    "metadata": {"total_messages": total_messages},
                })),
            )
                .into_response()
        }
        Err(source) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: source.to_string(),
            }),
        )
            .into_response(),
    }
}
