//! SQLite-backed durable queue.
//!
//! Entries survive restarts. `pop` on an empty channel polls until an entry
//! shows up or the configured timeout elapses.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::traits::{assign_message_id, MessageQueue, Payload};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Statements run on the blocking pool so a slow disk never stalls the
/// async workers.
pub struct SqliteQueue {
    conn: Arc<Mutex<Connection>>,
    pop_timeout: Duration,
}

impl SqliteQueue {
    /// Open or create the queue database at `path`.
    pub fn open(path: &Path, pop_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create queue directory: {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open queue database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn, pop_timeout)
    }

    /// Queue over a private in-memory database. Used by tests.
    pub fn open_in_memory(pop_timeout: Duration) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, pop_timeout)
    }

    fn with_connection(conn: Connection, pop_timeout: Duration) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS queue_entries (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                channel TEXT NOT NULL,
                message_id TEXT NOT NULL UNIQUE,
                payload TEXT NOT NULL,
                enqueued_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_queue_channel_seq ON queue_entries(channel, seq);
            "#,
        )
        .context("Failed to initialize queue schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            pop_timeout,
        })
    }

    async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&mut conn.lock()))
            .await
            .context("queue database task failed")?
    }
}

/// Remove the oldest entry in one transaction. Never waits.
fn try_pop(conn: &mut Connection, channel: &str) -> Result<Option<Payload>> {
    let tx = conn.transaction()?;
    let row: Option<(i64, String)> = tx
        .query_row(
            "SELECT seq, payload FROM queue_entries WHERE channel = ?1 ORDER BY seq LIMIT 1",
            params![channel],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let Some((seq, raw)) = row else {
        return Ok(None);
    };
    tx.execute("DELETE FROM queue_entries WHERE seq = ?1", params![seq])?;
    tx.commit()?;

    let payload: Payload = serde_json::from_str(&raw)
        .with_context(|| format!("Corrupt payload in queue '{channel}' at seq {seq}"))?;
    Ok(Some(payload))
}

#[async_trait]
impl MessageQueue for SqliteQueue {
    async fn push(&self, channel: &str, mut payload: Payload) -> Result<String> {
        let id = assign_message_id(&mut payload);
        let raw = serde_json::to_string(&payload)?;
        let channel = channel.to_string();
        let row_id = id.clone();
        self.run_blocking(move |conn| {
            conn.execute(
                "INSERT INTO queue_entries (channel, message_id, payload, enqueued_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![channel, row_id, raw, chrono::Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await?;
        Ok(id)
    }

    async fn pop(&self, channel: &str) -> Result<Option<Payload>> {
        let deadline = Instant::now() + self.pop_timeout;
        loop {
            let owned = channel.to_string();
            if let Some(payload) = self.run_blocking(move |conn| try_pop(conn, &owned)).await? {
                return Ok(Some(payload));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn depth(&self, channel: &str) -> Result<usize> {
        let channel = channel.to_string();
        let count: i64 = self
            .run_blocking(move |conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM queue_entries WHERE channel = ?1",
                    params![channel],
                    |row| row.get(0),
                )?)
            })
            .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
