//! Handlers for the ticket endpoints.
//!
//! Error bodies are always `{"error": "<message>"}`.

use super::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::agents::{AgentError, HandleRequest};
use crate::tickets::{self, Ticket, TicketError, ACCOUNT_AGENT, TECHNICAL_AGENT};

// ── Errors ──────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    /// Malformed body or failed ticket validation (422)
    Invalid(String),
    /// Unknown department or agent (404)
    NotFound(String),
    /// Body over the gateway size cap (413)
    TooLarge(String),
    /// Request exceeded the gateway timeout (408)
    Timeout(String),
    /// Queue or router failure (500)
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Invalid(m)
            | Self::NotFound(m)
            | Self::TooLarge(m)
            | Self::Timeout(m)
            | Self::Internal(m) => m,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::TooLarge(rejection.body_text())
        } else {
            Self::Invalid(rejection.body_text())
        }
    }
}

impl From<TicketError> for ApiError {
    fn from(error: TicketError) -> Self {
        Self::Invalid(error.to_string())
    }
}

impl From<AgentError> for ApiError {
    fn from(error: AgentError) -> Self {
        match &error {
            AgentError::UnknownDepartment(_) => Self::NotFound(error.to_string()),
            AgentError::Queue(_) => Self::Internal(error.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        Self::Internal(format!("{error:#}"))
    }
}

/// Give the plain 413 and 408 answers of the body-limit and timeout layers
/// the same `{"error": ...}` shape as every other failure.
pub async fn json_error_bodies(response: Response) -> Response {
    let already_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if already_json {
        return response;
    }

    match response.status() {
        StatusCode::PAYLOAD_TOO_LARGE => {
            ApiError::TooLarge("request body exceeds the size limit".to_string()).into_response()
        }
        StatusCode::REQUEST_TIMEOUT => {
            ApiError::Timeout("request timed out".to_string()).into_response()
        }
        _ => response,
    }
}

// ── Handlers ────────────────────────────────────────────────────

/// POST /route_ticket: classify, assign and enqueue a ticket
pub async fn handle_route_ticket(
    State(state): State<AppState>,
    body: Result<Json<Ticket>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(mut ticket) = body?;
    tickets::validate(&ticket)?;

    let routed = state.router.route(&mut ticket).await.map_err(|e| {
        tracing::error!(ticket_id = %ticket.ticket_id, "Routing failed: {e:#}");
        ApiError::from(e)
    })?;
    Ok(Json(routed))
}

/// POST /technical/handle_ticket (or /handle_ticket on a technical node)
pub async fn handle_technical_ticket(
    State(state): State<AppState>,
    body: Result<Json<HandleRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    dispatch(&state, TECHNICAL_AGENT, body).await
}

/// POST /account/handle_ticket (or /handle_ticket on an account node)
pub async fn handle_account_ticket(
    State(state): State<AppState>,
    body: Result<Json<HandleRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    dispatch(&state, ACCOUNT_AGENT, body).await
}

async fn dispatch(
    state: &AppState,
    agent_name: &str,
    body: Result<Json<HandleRequest>, JsonRejection>,
) -> Result<Json<crate::agents::HandleResponse>, ApiError> {
    let Json(request) = body?;
    tickets::validate(&request.ticket)?;

    let agent = state
        .agents
        .get(agent_name)
        .ok_or_else(|| ApiError::NotFound(format!("agent not registered: {agent_name}")))?;

    let handled = agent.handle(&request.ticket).await.map_err(|e| {
        tracing::warn!(
            ticket_id = %request.ticket.ticket_id,
            agent = agent_name,
            "Handling failed: {e}"
        );
        ApiError::from(e)
    })?;
    Ok(Json(handled))
}

/// POST /process: route and handle in one call; failures land in the envelope
pub async fn handle_process(
    State(state): State<AppState>,
    body: Result<Json<Ticket>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(ticket) = body?;
    tickets::validate(&ticket)?;
    Ok(Json(state.orchestrator.process(ticket).await))
}

/// GET /health
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "role": state.role.as_str() }))
}

/// GET /metrics: Prometheus text exposition
pub async fn handle_metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state.metrics.render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    ))
}

/// GET /queues/{channel}: entries waiting on a channel
pub async fn handle_queue_depth(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let depth = state.queue.depth(&channel).await?;
    Ok(Json(json!({ "channel": channel, "depth": depth })))
}
