//! Audit queues: named FIFO channels for routing and escalation records.

pub mod in_memory;
pub mod sqlite;
pub mod traits;

pub use in_memory::InMemoryQueue;
pub use sqlite::SqliteQueue;
pub use traits::{MessageQueue, Payload, MESSAGE_ID_KEY};

use crate::config::QueueConfig;
use std::path::Path;
use std::sync::Arc;

/// Factory: create the queue backend named in config.
///
/// A durable store that cannot be opened degrades to the in-memory backend
/// so the desk keeps serving tickets; the failure is logged.
pub fn create_queue(config: &QueueConfig, config_dir: &Path) -> anyhow::Result<Arc<dyn MessageQueue>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryQueue::new())),
        "sqlite" => {
            let path = config.resolved_path(config_dir);
            match SqliteQueue::open(&path, config.pop_timeout()) {
                Ok(queue) => {
                    tracing::debug!(path = %path.display(), "Opened durable queue");
                    Ok(Arc::new(queue))
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        "Durable queue unavailable, falling back to in-memory: {e:#}"
                    );
                    Ok(Arc::new(InMemoryQueue::new()))
                }
            }
        }
        other if other.trim().is_empty() => {
            anyhow::bail!("queue.backend cannot be empty. Supported values: memory, sqlite")
        }
        other => anyhow::bail!("Unknown queue backend '{other}'. Supported values: memory, sqlite"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn queue_config(backend: &str, path: &str) -> QueueConfig {
        QueueConfig {
            backend: backend.to_string(),
            path: path.to_string(),
            ..QueueConfig::default()
        }
    }

    #[test]
    fn factory_memory() {
        let tmp = TempDir::new().unwrap();
        let queue = create_queue(&queue_config("memory", "unused.db"), tmp.path()).unwrap();
        assert_eq!(queue.name(), "in_memory");
    }

    #[test]
    fn factory_sqlite_creates_file_under_config_dir() {
        let tmp = TempDir::new().unwrap();
        let queue = create_queue(&queue_config("sqlite", "queue.db"), tmp.path()).unwrap();
        assert_eq!(queue.name(), "sqlite");
        assert!(tmp.path().join("queue.db").exists());
    }

    #[test]
    fn factory_sqlite_falls_back_when_path_is_unusable() {
        let tmp = TempDir::new().unwrap();
        // A regular file where the parent directory should be.
        std::fs::write(tmp.path().join("blocker"), "not a directory").unwrap();
        let queue =
            create_queue(&queue_config("sqlite", "blocker/queue.db"), tmp.path()).unwrap();
        assert_eq!(queue.name(), "in_memory");
    }

    #[test]
    fn factory_unknown_errors() {
        let tmp = TempDir::new().unwrap();
        match create_queue(&queue_config("redis", "q.db"), tmp.path()) {
            Err(err) => assert!(err.to_string().contains("Unknown queue backend")),
            Ok(_) => panic!("unknown backend should error"),
        }
    }

    #[test]
    fn factory_empty_errors() {
        let tmp = TempDir::new().unwrap();
        match create_queue(&queue_config("", "q.db"), tmp.path()) {
            Err(err) => assert!(err.to_string().contains("cannot be empty")),
            Ok(_) => panic!("empty backend should error"),
        }
    }

    #[tokio::test]
    async fn both_backends_preserve_fifo_order() {
        let tmp = TempDir::new().unwrap();
        for backend in ["memory", "sqlite"] {
            let queue = create_queue(&queue_config(backend, "fifo.db"), tmp.path()).unwrap();
            for n in 0..10 {
                let mut payload = Payload::new();
                payload.insert("n".to_string(), serde_json::json!(n));
                queue.push("fifo", payload).await.unwrap();
            }
            for n in 0..10 {
                let entry = queue.pop("fifo").await.unwrap().unwrap();
                assert_eq!(entry["n"], serde_json::json!(n), "backend {backend}");
            }
        }
    }
}
