pub mod metrics;

pub use metrics::{instrument_registry, MeteredAgent, MeteredQueue, MeteredRouter, Metrics};
