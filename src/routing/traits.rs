//! Routing traits and types for deciding which agent handles a ticket.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::tickets::{AgentMessage, Category, Priority, Ticket};

/// Outcome of routing one ticket. Also the `/route_ticket` response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteResponse {
    pub status: String,
    pub category: Category,
    pub priority: Priority,
    pub assigned_agent: String,
    pub routing_message: AgentMessage,
}

impl RouteResponse {
    /// Copy the routing decision onto the ticket.
    pub fn apply_to(&self, ticket: &mut Ticket) {
        ticket.category = Some(self.category);
        ticket.priority = Some(self.priority);
        ticket.assigned_agent = Some(self.assigned_agent.clone());
    }
}

/// Classifies tickets and assigns them to an agent.
#[async_trait]
pub trait Router: Send + Sync {
    /// Classify the ticket, record the decision on it and enqueue it for the
    /// assigned agent.
    async fn route(&self, ticket: &mut Ticket) -> Result<RouteResponse>;

    /// The name of this router implementation.
    fn name(&self) -> &str;
}
