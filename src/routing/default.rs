//! Keyword router: classifies, assigns an agent from the route table and
//! records the hand-off on the agent's queue.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use super::classifier::Classifier;
use super::traits::{RouteResponse, Router};
use crate::config::ClassifierConfig;
use crate::queue::{MessageQueue, Payload};
use crate::tickets::{agent_queue, AgentMessage, MessageKind, Ticket, ROUTER_AGENT};

pub struct KeywordRouter {
    classifier: Classifier,
    queue: Arc<dyn MessageQueue>,
}

impl KeywordRouter {
    pub fn new(rules: ClassifierConfig, queue: Arc<dyn MessageQueue>) -> Self {
        Self {
            classifier: Classifier::new(rules),
            queue,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    fn routing_record(ticket: &Ticket) -> Payload {
        let mut record = Payload::new();
        record.insert("ticket".to_string(), ticket.to_json());
        record.insert("action".to_string(), json!("handle_ticket"));
        record.insert("routed_by".to_string(), json!(ROUTER_AGENT));
        record.insert(
            "timestamp".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        record
    }
}

#[async_trait]
impl Router for KeywordRouter {
    async fn route(&self, ticket: &mut Ticket) -> Result<RouteResponse> {
        let (category, priority) = self.classifier.classify(ticket);
        let agent = self.classifier.rules().routes.agent_for(category).to_string();

        ticket.category = Some(category);
        ticket.priority = Some(priority);
        ticket.assigned_agent = Some(agent.clone());

        let channel = agent_queue(&agent);
        let message_id = self
            .queue
            .push(&channel, Self::routing_record(ticket))
            .await?;

        tracing::info!(
            ticket_id = %ticket.ticket_id,
            %category,
            %priority,
            agent = %agent,
            %message_id,
            "Ticket routed"
        );

        let routing_message = AgentMessage::new(
            ROUTER_AGENT,
            MessageKind::Classification,
            format!("Classified as {category} with {priority} priority. Routed to {agent}."),
            self.classifier.rules().confidence,
        );

        Ok(RouteResponse {
            status: "routed".to_string(),
            category,
            priority,
            assigned_agent: agent,
            routing_message,
        })
    }

    fn name(&self) -> &str {
        "keyword"
    }
}
