//! Specialist agent traits for pluggable ticket handling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tickets::{AgentMessage, Ticket};

/// `/handle_ticket` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandleRequest {
    pub ticket: Ticket,
}

/// `/handle_ticket` response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandleResponse {
    pub status: String,
    pub response: AgentMessage,
    #[serde(default)]
    pub escalated: bool,
}

impl HandleResponse {
    pub fn handled(response: AgentMessage, escalated: bool) -> Self {
        Self {
            status: "handled".to_string(),
            response,
            escalated,
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    /// Department missing from the capacity table outside the capacity check.
    #[error("department not found: {0}")]
    UnknownDepartment(String),
    #[error("failed to record escalation: {0:#}")]
    Queue(#[from] anyhow::Error),
}

/// A stateless specialist that answers one ticket at a time.
#[async_trait]
pub trait SupportAgent: Send + Sync {
    /// Produce the agent's reply, enqueueing an escalation record when needed.
    async fn handle(&self, ticket: &Ticket) -> Result<HandleResponse, AgentError>;

    /// Registered agent name, e.g. `technical_agent`.
    fn name(&self) -> &str;
}
