//! Queue traits and types for named-channel audit buffers.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Opaque queue payload: a JSON object with no enforced schema.
pub type Payload = Map<String, Value>;

/// Key under which `push` stores the generated entry id.
pub const MESSAGE_ID_KEY: &str = "message_id";

/// Stamp a fresh UUID onto the payload and return it.
pub(crate) fn assign_message_id(payload: &mut Payload) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    payload.insert(MESSAGE_ID_KEY.to_string(), Value::String(id.clone()));
    id
}

/// Named-channel FIFO store. Every channel is independent; entries leave in
/// the order they arrived.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Assign an id to the payload, append it to `channel` and return the id.
    async fn push(&self, channel: &str, payload: Payload) -> Result<String>;

    /// Remove and return the oldest entry on `channel`, if any.
    async fn pop(&self, channel: &str) -> Result<Option<Payload>>;

    /// Number of entries waiting on `channel`.
    async fn depth(&self, channel: &str) -> Result<usize>;

    /// The name of this queue backend.
    fn name(&self) -> &str;
}
