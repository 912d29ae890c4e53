//! In-memory queue backend.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use super::traits::{assign_message_id, MessageQueue, Payload};

/// Channel map guarded by a single mutex. `pop` never waits: an empty
/// channel returns `None` immediately.
pub struct InMemoryQueue {
    channels: Mutex<HashMap<String, VecDeque<Payload>>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn push(&self, channel: &str, mut payload: Payload) -> Result<String> {
        let id = assign_message_id(&mut payload);
        self.channels
            .lock()
            .entry(channel.to_string())
            .or_default()
            .push_back(payload);
        Ok(id)
    }

    async fn pop(&self, channel: &str) -> Result<Option<Payload>> {
        let mut channels = self.channels.lock();
        Ok(channels.get_mut(channel).and_then(VecDeque::pop_front))
    }

    async fn depth(&self, channel: &str) -> Result<usize> {
        let channels = self.channels.lock();
        Ok(channels.get(channel).map_or(0, VecDeque::len))
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}
