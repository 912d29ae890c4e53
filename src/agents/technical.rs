//! Technical support agent backed by a symptom-matching knowledge base.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use super::traits::{AgentError, HandleResponse, SupportAgent};
use crate::config::{IssueArchetype, KnowledgeBaseConfig};
use crate::queue::{MessageQueue, Payload};
use crate::tickets::{AgentMessage, MessageKind, Ticket, ESCALATION_QUEUE, TECHNICAL_AGENT};

const RESOLVED_CONFIDENCE: f64 = 0.9;
const ESCALATED_CONFIDENCE: f64 = 0.6;

/// Number of the archetype's symptoms present in `text`.
fn symptom_matches(archetype: &IssueArchetype, text: &str) -> usize {
    archetype
        .symptoms
        .iter()
        .filter(|symptom| text.contains(symptom.as_str()))
        .count()
}

/// Pick the archetype with the most matching symptoms. Ties keep the
/// earlier archetype; zero matches means no solution.
pub fn find_solution<'a>(archetypes: &'a [IssueArchetype], text: &str) -> Option<&'a IssueArchetype> {
    let text = text.to_lowercase();
    let mut best: Option<&IssueArchetype> = None;
    let mut max_matches = 0;

    for archetype in archetypes {
        let matches = symptom_matches(archetype, &text);
        if matches > max_matches {
            max_matches = matches;
            best = Some(archetype);
        }
    }

    best
}

pub struct TechnicalAgent {
    knowledge: KnowledgeBaseConfig,
    queue: Arc<dyn MessageQueue>,
}

impl TechnicalAgent {
    pub fn new(knowledge: KnowledgeBaseConfig, queue: Arc<dyn MessageQueue>) -> Self {
        Self { knowledge, queue }
    }

    async fn escalate(&self, ticket: &Ticket, reason: &str) -> anyhow::Result<String> {
        let mut record = Payload::new();
        record.insert("ticket".to_string(), ticket.to_json());
        record.insert("action".to_string(), json!("escalate"));
        record.insert("escalated_by".to_string(), json!(TECHNICAL_AGENT));
        record.insert("reason".to_string(), json!(reason));
        record.insert(
            "timestamp".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        self.queue.push(ESCALATION_QUEUE, record).await
    }
}

#[async_trait]
impl SupportAgent for TechnicalAgent {
    async fn handle(&self, ticket: &Ticket) -> Result<HandleResponse, AgentError> {
        let solution = find_solution(&self.knowledge.archetypes, &ticket.text());

        let (content, escalated) = match solution {
            Some(archetype) => {
                let mut content = format!("**Technical Solution Found:**\n\n{}", archetype.solution);
                if archetype.escalate {
                    content.push_str("\n\n");
                    content.push_str(&self.knowledge.escalation_note);
                    self.escalate(ticket, &self.knowledge.escalation_reason)
                        .await?;
                }
                (content, archetype.escalate)
            }
            None => {
                self.escalate(ticket, &self.knowledge.unmatched_reason)
                    .await?;
                (self.knowledge.unmatched_response.clone(), true)
            }
        };

        tracing::info!(
            ticket_id = %ticket.ticket_id,
            archetype = solution.map_or("none", |a| a.name.as_str()),
            escalated,
            "Technical ticket handled"
        );

        let confidence = if escalated {
            ESCALATED_CONFIDENCE
        } else {
            RESOLVED_CONFIDENCE
        };
        let response = AgentMessage::new(TECHNICAL_AGENT, MessageKind::Response, content, confidence);
        Ok(HandleResponse::handled(response, escalated))
    }

    fn name(&self) -> &str {
        TECHNICAL_AGENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryQueue;

    fn agent() -> (TechnicalAgent, Arc<InMemoryQueue>) {
        let queue = Arc::new(InMemoryQueue::new());
        (
            TechnicalAgent::new(KnowledgeBaseConfig::default(), queue.clone()),
            queue,
        )
    }

    fn ticket(subject: &str, description: &str) -> Ticket {
        Ticket::new("T-7", "ana@bank.example", "Risk Management", subject, description)
    }

    #[test]
    fn find_solution_picks_unique_archetype() {
        let kb = KnowledgeBaseConfig::default();
        let found = find_solution(&kb.archetypes, "The chart shows a Visualization ERROR").unwrap();
        assert_eq!(found.name, "visualization_error");
    }

    #[test]
    fn find_solution_prefers_highest_count() {
        let kb = KnowledgeBaseConfig::default();
        let found = find_solution(&kb.archetypes, "Oracle database timeout connection refused").unwrap();
        assert_eq!(found.name, "database_connection");
    }

    #[test]
    fn find_solution_keeps_first_on_tie() {
        let kb = KnowledgeBaseConfig::default();
        // "timeout" is a symptom of both dashboard_loading and database_connection.
        let found = find_solution(&kb.archetypes, "request timeout").unwrap();
        assert_eq!(found.name, "dashboard_loading");
    }

    #[test]
    fn find_solution_without_symptoms_is_none() {
        let kb = KnowledgeBaseConfig::default();
        assert!(find_solution(&kb.archetypes, "printer jammed").is_none());
        assert!(find_solution(&[], "dashboard slow").is_none());
    }

    #[tokio::test]
    async fn resolved_archetype_is_not_escalated() {
        let (agent, queue) = agent();
        let outcome = agent
            .handle(&ticket("Dashboard slow", "keeps loading"))
            .await
            .unwrap();

        assert_eq!(outcome.status, "handled");
        assert!(!outcome.escalated);
        assert!(outcome
            .response
            .content
            .starts_with("**Technical Solution Found:**\n\n1. Check Tableau Server status"));
        assert_eq!(outcome.response.confidence_score, Some(0.9));
        assert_eq!(queue.depth(ESCALATION_QUEUE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn escalating_archetype_appends_note_and_enqueues() {
        let (agent, queue) = agent();
        let outcome = agent
            .handle(&ticket("Oracle database timeout", "connection refused"))
            .await
            .unwrap();

        assert!(outcome.escalated);
        assert!(outcome.response.content.contains("Verify VPN connection"));
        assert!(outcome.response.content.contains("**Escalation Required:**"));
        assert_eq!(outcome.response.confidence_score, Some(0.6));

        let record = queue.pop(ESCALATION_QUEUE).await.unwrap().unwrap();
        assert_eq!(record["escalated_by"], json!("technical_agent"));
        assert_eq!(record["action"], json!("escalate"));
        assert_eq!(
            record["reason"],
            json!("Database connectivity issue requiring DBA team")
        );
    }

    #[tokio::test]
    async fn unmatched_ticket_always_escalates() {
        let (agent, queue) = agent();
        let outcome = agent
            .handle(&ticket("Printer", "jammed again"))
            .await
            .unwrap();

        assert!(outcome.escalated);
        assert!(outcome.response.content.starts_with("I need to research this issue further."));
        assert_eq!(outcome.response.confidence_score, Some(0.6));

        let record = queue.pop(ESCALATION_QUEUE).await.unwrap().unwrap();
        assert_eq!(
            record["reason"],
            json!("Complex technical issue requiring specialist review")
        );
    }
}
