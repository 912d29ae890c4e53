//! Ticket routing: classifies a ticket and picks the agent that handles it.

pub mod classifier;
pub mod default;
pub mod traits;

pub use classifier::{category_from_scores, count_keywords, Classifier};
pub use default::KeywordRouter;
pub use traits::{RouteResponse, Router};

use crate::config::ClassifierConfig;
use crate::queue::MessageQueue;
use std::sync::Arc;

/// Create the keyword router over the given rule tables and audit queue.
pub fn create_router(rules: ClassifierConfig, queue: Arc<dyn MessageQueue>) -> Arc<dyn Router> {
    Arc::new(KeywordRouter::new(rules, queue))
}
