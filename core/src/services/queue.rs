use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use inv_shared::{Error, Result};

use crate::models::ScheduledJobEnvelope;

const QUEUE_KEY: &str = "delayed_jobs";
const CLAIM_BATCH: isize = 10;
const CANCEL_BUFFER_SECS: i64 = 3600;

fn job_key(job_id: Uuid) -> String {
    format!("scheduled_job:{job_id}")
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_secs() as i64
}

/// A handler registered for one command name. Handlers own their own
/// idempotency: a crash between claim and completion leaves the work
/// undone with no automatic redo.
#[async_trait::async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, envelope: ScheduledJobEnvelope) -> Result<()>;
}

/// Process-local map of command name to handler. Frozen after `freeze()`;
/// registering twice for the same command is a startup bug, not a runtime
/// condition, so it panics rather than returning an error.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: impl Into<String>, handler: Arc<dyn JobHandler>) {
        let command = command.into();
        if self.handlers.insert(command.clone(), handler).is_some() {
            panic!("duplicate job handler registration for command {command}");
        }
    }

    fn get(&self, command: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(command).cloned()
    }
}

/// Schedule/Cancel operations against the sorted-set + string-key layout
/// described for the delayed job store.
#[derive(Clone)]
pub struct DelayedJobQueue {
    redis: ConnectionManager,
}

impl DelayedJobQueue {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    /// Serializes `envelope` (jobId already set by the caller) and commits
    /// both the cancellation key and the sorted-set entry atomically.
    pub async fn schedule(&self, envelope: &ScheduledJobEnvelope, delay_seconds: i64) -> Result<Uuid> {
        let data = serde_json::to_string(envelope)?;
        let due_at = now_unix() + delay_seconds;
        let ttl = (delay_seconds + CANCEL_BUFFER_SECS).max(1) as u64;

        let mut conn = self.redis.clone();
        let (): () = redis::pipe()
            .atomic()
            .set_ex(job_key(envelope.job_id), &data, ttl)
            .zadd(QUEUE_KEY, &data, due_at)
            .query_async(&mut conn)
            .await
            .map_err(Error::Redis)?;

        Ok(envelope.job_id)
    }

    /// Best-effort cancellation. A job already claimed or never scheduled
    /// is treated as a successful no-op.
    pub async fn cancel(&self, job_id: Uuid) -> Result<()> {
        let mut conn = self.redis.clone();
        let data: Option<String> = conn.get(job_key(job_id)).await.map_err(Error::Redis)?;
        let Some(data) = data else {
            return Ok(());
        };

        let (): () = redis::pipe()
            .atomic()
            .zrem(QUEUE_KEY, &data)
            .del(job_key(job_id))
            .query_async(&mut conn)
            .await
            .map_err(Error::Redis)?;

        Ok(())
    }

    /// Polls for due jobs and attempts to claim each via `ZREM`. Returns
    /// only the jobs this call actually claimed.
    async fn claim_due(&self) -> Result<Vec<ScheduledJobEnvelope>> {
        let mut conn = self.redis.clone();
        let due: Vec<String> = conn
            .zrangebyscore_limit(QUEUE_KEY, 0, now_unix(), 0, CLAIM_BATCH)
            .await
            .map_err(Error::Redis)?;

        let mut claimed = Vec::with_capacity(due.len());
        for member in due {
            let removed: i64 = conn.zrem(QUEUE_KEY, &member).await.map_err(Error::Redis)?;
            if removed != 1 {
                // Another replica claimed it, or it was cancelled.
                continue;
            }
            match serde_json::from_str::<ScheduledJobEnvelope>(&member) {
                Ok(envelope) => claimed.push(envelope),
                Err(err) => error!(error = %err, "dropping unparsable delayed job payload"),
            }
        }
        Ok(claimed)
    }

    pub async fn delete_job_key(&self, job_id: Uuid) {
        let mut conn = self.redis.clone();
        let _: std::result::Result<i64, _> = conn.del(job_key(job_id)).await;
    }
}

/// Single poll loop plus a fixed worker pool fed by a bounded channel.
/// Matches the single-dispatcher-per-process model: within a replica,
/// workers share no mutable state beyond the channel and the registry,
/// which is read-only once the pool has started.
pub struct Dispatcher {
    queue: DelayedJobQueue,
    registry: Arc<CommandRegistry>,
    pool_size: usize,
    poll_interval: tokio::time::Duration,
}

impl Dispatcher {
    pub fn new(queue: DelayedJobQueue, registry: CommandRegistry, pool_size: usize, poll_interval_ms: u64) -> Self {
        Self {
            queue,
            registry: Arc::new(registry),
            pool_size: pool_size.max(1),
            poll_interval: tokio::time::Duration::from_millis(poll_interval_ms),
        }
    }

    /// Runs forever. Intended to be spawned as its own task by the binary.
    pub async fn run(self) {
        info!(pool_size = self.pool_size, poll_interval_ms = self.poll_interval.as_millis() as u64, "dispatcher starting");
        let channel_capacity = 2 * self.pool_size;
        let (tx, rx) = mpsc::channel::<ScheduledJobEnvelope>(channel_capacity);
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..self.pool_size {
            let rx = rx.clone();
            let registry = self.registry.clone();
            let queue = self.queue.clone();
            tokio::spawn(async move {
                loop {
                    let envelope = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(envelope) = envelope else {
                        break;
                    };
                    let job_id = envelope.job_id;
                    let command = envelope.command.clone();
                    if let Some(handler) = registry.get(&command) {
                        if let Err(err) = handler.handle(envelope).await {
                            error!(worker_id, %job_id, %command, error = %err, "job handler failed");
                        }
                    } else {
                        warn!(worker_id, %job_id, %command, "no handler registered for command");
                    }
                    // Deleted unconditionally: Cancel on a completed job
                    // must be a harmless no-op.
                    queue.delete_job_key(job_id).await;
                }
            });
        }

        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            match self.queue.claim_due().await {
                Ok(jobs) if jobs.is_empty() => continue,
                Ok(jobs) => {
                    for job in jobs {
                        if tx.send(job).await.is_err() {
                            error!("job channel closed; dispatcher stopping");
                            return;
                        }
                    }
                }
                Err(err) => error!(error = %err, "failed to poll delayed job queue"),
            }
        }
    }
}

pub fn new_job_id() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler;

    #[async_trait::async_trait]
    impl JobHandler for NoopHandler {
        async fn handle(&self, _envelope: ScheduledJobEnvelope) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn registry_rejects_duplicate_commands() {
        let mut registry = CommandRegistry::new();
        registry.register("cmd.a", Arc::new(NoopHandler));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            registry.register("cmd.a", Arc::new(NoopHandler));
        }));
        assert!(result.is_err());
    }

    #[test]
    fn job_key_format() {
        let id = Uuid::nil();
        assert_eq!(job_key(id), "scheduled_job:00000000-0000-0000-0000-000000000000");
    }
}
