//! Prometheus counters for routed tickets, handled tickets and queue pushes,
//! plus decorators that record them around the router, agents and queue.

use anyhow::{Context, Result};
use async_trait::async_trait;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::agents::{AgentError, AgentRegistry, HandleResponse, SupportAgent};
use crate::queue::{MessageQueue, Payload};
use crate::routing::{RouteResponse, Router};
use crate::tickets::Ticket;

fn counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help), labels)
        .with_context(|| format!("invalid metric definition: {name}"))?;
    registry
        .register(Box::new(counter.clone()))
        .with_context(|| format!("failed to register metric: {name}"))?;
    Ok(counter)
}

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    tickets_routed: IntCounterVec,
    tickets_handled: IntCounterVec,
    queue_pushes: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let tickets_routed = counter_vec(
            &registry,
            "ticketdesk_tickets_routed_total",
            "Tickets classified and assigned by the router",
            &["category", "priority"],
        )?;
        let tickets_handled = counter_vec(
            &registry,
            "ticketdesk_tickets_handled_total",
            "Tickets answered by a specialist agent",
            &["agent", "escalated"],
        )?;
        let queue_pushes = counter_vec(
            &registry,
            "ticketdesk_queue_pushes_total",
            "Records appended to audit queue channels",
            &["channel"],
        )?;

        Ok(Self {
            registry,
            tickets_routed,
            tickets_handled,
            queue_pushes,
        })
    }

    pub fn record_route(&self, routed: &RouteResponse) {
        self.tickets_routed
            .with_label_values(&[routed.category.as_str(), routed.priority.as_str()])
            .inc();
    }

    pub fn record_handle(&self, agent: &str, escalated: bool) {
        let escalated = if escalated { "true" } else { "false" };
        self.tickets_handled
            .with_label_values(&[agent, escalated])
            .inc();
    }

    pub fn record_push(&self, channel: &str) {
        self.queue_pushes.with_label_values(&[channel]).inc();
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .context("failed to encode metrics")?;
        String::from_utf8(buffer).context("metrics output is not UTF-8")
    }
}

// ── Decorators ──────────────────────────────────────────────────

pub struct MeteredQueue {
    inner: Arc<dyn MessageQueue>,
    metrics: Arc<Metrics>,
}

impl MeteredQueue {
    pub fn new(inner: Arc<dyn MessageQueue>, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl MessageQueue for MeteredQueue {
    async fn push(&self, channel: &str, payload: Payload) -> Result<String> {
        let id = self.inner.push(channel, payload).await?;
        self.metrics.record_push(channel);
        Ok(id)
    }

    async fn pop(&self, channel: &str) -> Result<Option<Payload>> {
        self.inner.pop(channel).await
    }

    async fn depth(&self, channel: &str) -> Result<usize> {
        self.inner.depth(channel).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

pub struct MeteredRouter {
    inner: Arc<dyn Router>,
    metrics: Arc<Metrics>,
}

impl MeteredRouter {
    pub fn new(inner: Arc<dyn Router>, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl Router for MeteredRouter {
    async fn route(&self, ticket: &mut Ticket) -> Result<RouteResponse> {
        let routed = self.inner.route(ticket).await?;
        self.metrics.record_route(&routed);
        Ok(routed)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

pub struct MeteredAgent {
    inner: Arc<dyn SupportAgent>,
    metrics: Arc<Metrics>,
}

impl MeteredAgent {
    pub fn new(inner: Arc<dyn SupportAgent>, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl SupportAgent for MeteredAgent {
    async fn handle(&self, ticket: &Ticket) -> Result<HandleResponse, AgentError> {
        let handled = self.inner.handle(ticket).await?;
        self.metrics.record_handle(self.inner.name(), handled.escalated);
        Ok(handled)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Wrap every registered agent so handled tickets are counted.
pub fn instrument_registry(registry: &AgentRegistry, metrics: &Arc<Metrics>) -> AgentRegistry {
    let mut metered = AgentRegistry::new();
    for agent in registry.agents() {
        metered.register(Arc::new(MeteredAgent::new(
            Arc::clone(agent),
            Arc::clone(metrics),
        )));
    }
    metered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::create_registry;
    use crate::config::Config;
    use crate::queue::InMemoryQueue;
    use crate::routing::create_router;
    use crate::tickets::TECHNICAL_AGENT;

    #[test]
    fn fresh_registry_renders_without_samples() {
        let metrics = Metrics::new().unwrap();
        let text = metrics.render().unwrap();
        assert!(!text.contains("ticketdesk_tickets_routed_total{"));
    }

    #[test]
    fn counters_carry_labels() {
        let metrics = Metrics::new().unwrap();
        metrics.record_handle(TECHNICAL_AGENT, true);
        metrics.record_handle(TECHNICAL_AGENT, true);
        metrics.record_push("escalation_queue");

        let text = metrics.render().unwrap();
        assert!(text.contains(
            r#"ticketdesk_tickets_handled_total{agent="technical_agent",escalated="true"} 2"#
        ));
        assert!(text.contains(r#"ticketdesk_queue_pushes_total{channel="escalation_queue"} 1"#));
    }

    #[tokio::test]
    async fn decorators_count_route_handle_and_push() {
        let config = Config::default();
        let metrics = Arc::new(Metrics::new().unwrap());
        let queue: Arc<dyn MessageQueue> = Arc::new(MeteredQueue::new(
            Arc::new(InMemoryQueue::new()),
            Arc::clone(&metrics),
        ));
        let router = MeteredRouter::new(
            create_router(config.classifier.clone(), Arc::clone(&queue)),
            Arc::clone(&metrics),
        );
        let registry = instrument_registry(&create_registry(&config, Arc::clone(&queue)), &metrics);

        let mut ticket = Ticket::new(
            "T-9",
            "dba@example.com",
            "Risk Management",
            "Oracle database timeout",
            "connection refused",
        );
        let routed = router.route(&mut ticket).await.unwrap();
        let agent = registry.get(&routed.assigned_agent).unwrap();
        agent.handle(&ticket).await.unwrap();

        let text = metrics.render().unwrap();
        assert!(text.contains(
            r#"ticketdesk_tickets_routed_total{category="technical",priority="high"} 1"#
        ));
        assert!(text.contains(
            r#"ticketdesk_tickets_handled_total{agent="technical_agent",escalated="true"} 1"#
        ));
        assert!(text.contains(r#"ticketdesk_queue_pushes_total{channel="technical_agent_queue"} 1"#));
        assert!(text.contains(r#"ticketdesk_queue_pushes_total{channel="escalation_queue"} 1"#));
        assert_eq!(queue.name(), "in_memory");
        assert_eq!(router.name(), "keyword");
    }
}
