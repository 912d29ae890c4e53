pub mod schema;

#[allow(unused_imports)]
pub use schema::{
    AccountsConfig, ClassifierConfig, Config, DepartmentCapacity, EndpointsConfig,
    GatewayConfig, IssueArchetype, KnowledgeBaseConfig, QueueConfig, RoutesConfig,
    TransportConfig, CONFIG_DIR_ENV,
};
