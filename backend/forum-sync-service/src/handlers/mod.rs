//! Incremental path: one long-lived worker per stream, applying events as they arrive.

pub mod force_sync;
pub mod resource_events;

pub use force_sync::{ForceSyncHandler, FORCE_SYNC_GROUP};
pub use resource_events::{ResourceEventHandler, RESOURCE_SYNC_GROUP};

use crate::error::SyncResult;
use crate::metrics;
use async_trait::async_trait;
use event_stream::{EventConsumer, Stream, StreamResult};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Applies one decoded event. `Ok` means the side effect is done and the
/// entry may be acknowledged.
#[async_trait]
pub trait EventHandler<T>: Send + Sync {
    /// Short label for logs and metrics.
    fn event_type(&self, event: &T) -> &'static str;

    async fn handle(&self, event: &T) -> SyncResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing new on the stream (or only poison, which is dropped).
    Idle,
    Handled,
    /// The handler failed; the entry stays unacknowledged.
    Failed,
}

/// Poll loop binding one stream and consumer group to a handler.
pub struct StreamWorker<T> {
    stream: Stream<T>,
    group: String,
    consumer: EventConsumer,
    handler: Arc<dyn EventHandler<T>>,
    poll_interval: Duration,
}

impl<T> StreamWorker<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Build a worker and make sure its consumer group exists.
    pub async fn start(
        stream: Stream<T>,
        group: impl Into<String>,
        consumer: EventConsumer,
        handler: Arc<dyn EventHandler<T>>,
        poll_interval: Duration,
    ) -> StreamResult<Self> {
        let group = group.into();
        consumer.ensure_group(&stream, &group).await?;
        Ok(Self {
            stream,
            group,
            consumer,
            handler,
            poll_interval,
        })
    }

    /// Read at most one entry, handle it, and acknowledge it if handling succeeded.
    pub async fn poll_once(&self) -> StreamResult<PollOutcome> {
        let poison_before = self.consumer.poison_dropped();
        let delivery = self.consumer.read_one(&self.stream, &self.group).await?;
        metrics::observe_poison(
            self.stream.name(),
            self.consumer.poison_dropped() - poison_before,
        );

        let delivery = match delivery {
            Some(delivery) => delivery,
            None => return Ok(PollOutcome::Idle),
        };

        let event_type = self.handler.event_type(&delivery.data);
        match self.handler.handle(&delivery.data).await {
            Ok(()) => {
                self.consumer.acknowledge(&self.stream, &delivery).await?;
                metrics::observe_event(self.stream.name(), event_type, true);
                Ok(PollOutcome::Handled)
            }
            Err(e) => {
                if e.is_fatal_configuration() {
                    error!(
                        stream = %self.stream,
                        group = %self.group,
                        message_id = %delivery.message_id,
                        event_type,
                        error = %e,
                        "Event handler hit a configuration error"
                    );
                } else {
                    warn!(
                        stream = %self.stream,
                        group = %self.group,
                        message_id = %delivery.message_id,
                        event_type,
                        error = %e,
                        "Event handler failed, leaving entry unacknowledged"
                    );
                }
                metrics::observe_event(self.stream.name(), event_type, false);
                Ok(PollOutcome::Failed)
            }
        }
    }

    /// Poll until `shutdown` turns true. Sleeps `poll_interval` whenever the
    /// stream is idle or unreachable; a shutdown is noticed between polls.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            stream = %self.stream,
            group = %self.group,
            consumer = %self.consumer.consumer_name(),
            "Starting stream worker"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let idle = match self.poll_once().await {
                Ok(PollOutcome::Idle) => true,
                Ok(_) => false,
                Err(e) if e.is_transient() => {
                    warn!(
                        stream = %self.stream,
                        group = %self.group,
                        error = %e,
                        "Event log unreachable, retrying after poll interval"
                    );
                    true
                }
                Err(e) => {
                    error!(
                        stream = %self.stream,
                        group = %self.group,
                        error = %e,
                        "Failed to read from stream"
                    );
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!(stream = %self.stream, group = %self.group, "Stream worker stopped");
    }
}
