//! Sequential route → handle pipeline over a pluggable transport.

pub mod http;
pub mod local;
pub mod traits;

pub use http::{endpoint_key, HttpTransport};
pub use local::LocalTransport;
pub use traits::{AgentTransport, ConversationEntry, ProcessOutcome};

use std::sync::Arc;

use crate::tickets::{Ticket, ROUTER_AGENT};

const CLASSIFICATION_ACTION: &str = "classification";
const RESPONSE_ACTION: &str = "response";

pub struct Orchestrator {
    transport: Arc<dyn AgentTransport>,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn AgentTransport>) -> Self {
        Self { transport }
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    /// Route the ticket, hand it to the assigned agent and assemble the
    /// envelope. Failures come back as [`ProcessOutcome::Error`] carrying the
    /// steps that completed; nothing is retried or rolled back.
    pub async fn process(&self, mut ticket: Ticket) -> ProcessOutcome {
        let ticket_id = ticket.ticket_id.clone();
        let mut conversation = Vec::new();

        match self.run(&mut ticket, &mut conversation).await {
            Ok((final_response, escalated)) => {
                tracing::info!(
                    ticket_id = %ticket_id,
                    escalated,
                    transport = self.transport.name(),
                    "Ticket processed"
                );
                ProcessOutcome::Completed {
                    ticket_id,
                    conversation,
                    final_response,
                    escalated,
                }
            }
            Err(error) => {
                tracing::warn!(
                    ticket_id = %ticket_id,
                    steps = conversation.len(),
                    "Ticket processing failed: {error:#}"
                );
                ProcessOutcome::Error {
                    error: format!("{error:#}"),
                    ticket_id,
                    conversation,
                }
            }
        }
    }

    async fn run(
        &self,
        ticket: &mut Ticket,
        conversation: &mut Vec<ConversationEntry>,
    ) -> anyhow::Result<(String, bool)> {
        let routed = self.transport.route(ticket).await?;
        conversation.push(ConversationEntry::record(
            ROUTER_AGENT,
            CLASSIFICATION_ACTION,
            &routed,
        ));
        routed.apply_to(ticket);

        let agent = routed.assigned_agent.as_str();
        tracing::debug!(ticket_id = %ticket.ticket_id, agent, "Dispatching to agent");
        let handled = self.transport.handle(agent, ticket).await?;
        conversation.push(ConversationEntry::record(agent, RESPONSE_ACTION, &handled));

        Ok((handled.response.content, handled.escalated))
    }
}
