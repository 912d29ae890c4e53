//! In-process transport: calls the router and agents directly.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use super::traits::AgentTransport;
use crate::agents::{AgentRegistry, HandleResponse};
use crate::routing::{RouteResponse, Router};
use crate::tickets::Ticket;

pub struct LocalTransport {
    router: Arc<dyn Router>,
    agents: AgentRegistry,
}

impl LocalTransport {
    pub fn new(router: Arc<dyn Router>, agents: AgentRegistry) -> Self {
        Self { router, agents }
    }
}

#[async_trait]
impl AgentTransport for LocalTransport {
    async fn route(&self, ticket: &Ticket) -> Result<RouteResponse> {
        let mut routed = ticket.clone();
        self.router.route(&mut routed).await
    }

    async fn handle(&self, agent: &str, ticket: &Ticket) -> Result<HandleResponse> {
        let handler = self
            .agents
            .get(agent)
            .with_context(|| format!("no agent registered as '{agent}'"))?;
        Ok(handler.handle(ticket).await?)
    }

    fn name(&self) -> &str {
        "local"
    }
}
