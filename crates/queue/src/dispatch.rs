//! Redis-backed job dispatch server.
//!
//! [`JobDispatchServer`] owns the broker session and one apalis storage per
//! [`Task`]. Producers clone it freely; clones share the same multiplexed
//! connection, so concurrent enqueues need no coordination.

use apalis::prelude::Storage;
use apalis_redis::RedisStorage;
use redis::aio::ConnectionManager;
use relay_common::{RelayConfig, RelayError, RelayResult, broker};
use serde_json::Value;
use tracing::{debug, info};

use crate::jobs::{RegisterJob, RelayJob, Task};

/// Handle for enqueueing relay work.
#[derive(Clone)]
pub struct JobDispatchServer {
    connection: ConnectionManager,
    relay: RedisStorage<RelayJob>,
    register: RedisStorage<RegisterJob>,
    job_concurrency: usize,
}

impl JobDispatchServer {
    /// Connect to the broker named by `config` and register the relay tasks.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::BrokerConnection`] if the broker is unreachable.
    pub async fn new(config: &RelayConfig) -> RelayResult<Self> {
        Self::connect(config.redis_url(), config.job_concurrency()).await
    }

    /// Connect to the broker at `redis_url` directly.
    ///
    /// [`JobDispatchServer::new`] is the normal entry point; this skips the
    /// configuration layer.
    pub async fn connect(redis_url: &str, job_concurrency: usize) -> RelayResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| RelayError::BrokerConnection(format!("invalid broker URL: {e}")))?;

        let mut connection = tokio::time::timeout(
            broker::PROBE_TIMEOUT,
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| {
            RelayError::BrokerConnection(format!(
                "no answer within {}s",
                broker::PROBE_TIMEOUT.as_secs()
            ))
        })?
        .map_err(|e| RelayError::BrokerConnection(format!("cannot connect: {e}")))?;

        broker::ping(&mut connection).await?;
        debug!("Connected to broker");

        let relay = RedisStorage::<RelayJob>::new(connection.clone());
        let register = RedisStorage::<RegisterJob>::new(connection.clone());

        info!(
            tasks = ?Task::ALL.map(Task::name),
            job_concurrency,
            "Job dispatch server ready"
        );

        Ok(Self {
            connection,
            relay,
            register,
            job_concurrency,
        })
    }

    /// Tasks this server accepts jobs for.
    #[must_use]
    pub const fn registered_tasks(&self) -> &'static [Task] {
        &Task::ALL
    }

    /// Worker concurrency from the configuration.
    #[must_use]
    pub const fn job_concurrency(&self) -> usize {
        self.job_concurrency
    }

    /// Storage backing [`Task::Relay`], for workers attaching to the queue.
    #[must_use]
    pub fn relay_storage(&self) -> RedisStorage<RelayJob> {
        self.relay.clone()
    }

    /// Storage backing [`Task::Register`], for workers attaching to the queue.
    #[must_use]
    pub fn register_storage(&self) -> RedisStorage<RegisterJob> {
        self.register.clone()
    }

    /// Check the broker still answers.
    pub async fn ping(&self) -> RelayResult<()> {
        broker::ping(&mut self.connection.clone()).await
    }

    /// Queue a [`RelayJob`].
    pub async fn enqueue_relay(&self, job: RelayJob) -> RelayResult<()> {
        let inbox = job.inbox.clone();

        self.relay
            .clone()
            .push(job)
            .await
            .map_err(|e| queue_error(Task::Relay, &inbox, &e))?;

        debug!(task = %Task::Relay, inbox = %inbox, "Queued job");
        Ok(())
    }

    /// Queue a [`RegisterJob`].
    pub async fn enqueue_register(&self, job: RegisterJob) -> RelayResult<()> {
        let inbox = job.inbox.clone();
        let response = job.response_type().unwrap_or("unknown").to_string();

        self.register
            .clone()
            .push(job)
            .await
            .map_err(|e| queue_error(Task::Register, &inbox, &e))?;

        debug!(task = %Task::Register, inbox = %inbox, response = %response, "Queued job");
        Ok(())
    }

    /// Queue one relay job per inbox, returning how many were queued.
    ///
    /// Stops at the first failure; jobs queued before it stay queued.
    pub async fn fan_out<I>(&self, activity: &Value, inboxes: I) -> RelayResult<usize>
    where
        I: IntoIterator<Item = String>,
    {
        let mut queued = 0;

        for inbox in inboxes {
            self.enqueue_relay(RelayJob::new(inbox, activity.clone()))
                .await?;
            queued += 1;
        }

        info!(inbox_count = queued, "Queued relay fan-out");
        Ok(queued)
    }
}

fn queue_error(task: Task, inbox: &str, err: &impl std::fmt::Display) -> RelayError {
    RelayError::Queue(format!("Failed to queue {task} job for {inbox}: {err}"))
}
