//! Specialist agents and the registry that maps agent names to handlers.

pub mod account;
pub mod technical;
pub mod traits;

pub use account::{check_user_capacity, requested_user_count, AccountAgent, AccountRequest, CapacityCheck};
pub use technical::{find_solution, TechnicalAgent};
pub use traits::{AgentError, HandleRequest, HandleResponse, SupportAgent};

use crate::config::Config;
use crate::queue::MessageQueue;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Agents addressable by name. Adding a category means registering one more
/// agent here and pointing a route at it.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, Arc<dyn SupportAgent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the agent's own name, replacing any previous entry.
    pub fn register(&mut self, agent: Arc<dyn SupportAgent>) {
        self.agents.insert(agent.name().to_string(), agent);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SupportAgent>> {
        self.agents.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    pub fn agents(&self) -> impl Iterator<Item = &Arc<dyn SupportAgent>> {
        self.agents.values()
    }
}

/// Build the technical and account agents from config over a shared queue.
pub fn create_registry(config: &Config, queue: Arc<dyn MessageQueue>) -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    registry.register(Arc::new(TechnicalAgent::new(
        config.knowledge.clone(),
        Arc::clone(&queue),
    )));
    registry.register(Arc::new(AccountAgent::new(config.accounts.clone(), queue)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryQueue;
    use crate::tickets::{ACCOUNT_AGENT, TECHNICAL_AGENT};

    #[test]
    fn registry_holds_both_agents() {
        let registry = create_registry(&Config::default(), Arc::new(InMemoryQueue::new()));
        assert_eq!(registry.names(), vec![ACCOUNT_AGENT, TECHNICAL_AGENT]);
        assert_eq!(registry.get(TECHNICAL_AGENT).unwrap().name(), TECHNICAL_AGENT);
        assert!(registry.get("billing_agent").is_none());
    }

    #[test]
    fn every_default_route_resolves_to_a_registered_agent() {
        let config = Config::default();
        let registry = create_registry(&config, Arc::new(InMemoryQueue::new()));
        for category in crate::tickets::Category::ALL {
            let agent = config.classifier.routes.agent_for(category);
            assert!(registry.get(agent).is_some(), "{category} → {agent}");
        }
    }
}
