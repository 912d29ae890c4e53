//! Orchestrator transport trait and the envelope it produces.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agents::HandleResponse;
use crate::routing::RouteResponse;
use crate::tickets::Ticket;

/// How the orchestrator reaches the router and the agents.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Ask the router to classify and assign the ticket.
    async fn route(&self, ticket: &Ticket) -> Result<RouteResponse>;

    /// Ask the named agent to handle the ticket.
    async fn handle(&self, agent: &str, ticket: &Ticket) -> Result<HandleResponse>;

    /// The name of this transport.
    fn name(&self) -> &str;
}

/// One step of the pipeline as seen by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationEntry {
    pub agent: String,
    pub action: String,
    pub result: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ConversationEntry {
    pub fn record<T: Serialize>(agent: &str, action: &str, result: &T) -> Self {
        Self {
            agent: agent.to_string(),
            action: action.to_string(),
            result: serde_json::to_value(result).unwrap_or(serde_json::Value::Null),
            timestamp: Utc::now(),
        }
    }
}

/// Final envelope returned by [`super::Orchestrator::process`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessOutcome {
    Completed {
        ticket_id: String,
        conversation: Vec<ConversationEntry>,
        final_response: String,
        escalated: bool,
    },
    /// Whatever steps finished before the failure stay in `conversation`.
    Error {
        error: String,
        ticket_id: String,
        conversation: Vec<ConversationEntry>,
    },
}

impl ProcessOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn conversation(&self) -> &[ConversationEntry] {
        match self {
            Self::Completed { conversation, .. } | Self::Error { conversation, .. } => conversation,
        }
    }
}
