use crate::error::StreamResult;
use crate::log::{EventLog, GroupCreation, MessageId};
use event_schema::{decode_payload, Stream};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A decoded entry claimed by a consumer group.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery<T> {
    pub message_id: MessageId,
    pub consumer_group: String,
    pub data: T,
}

/// Reads typed entries under consumer groups with a stable consumer identity.
pub struct EventConsumer {
    log: Arc<dyn EventLog>,
    consumer_name: String,
    poison_dropped: AtomicU64,
}

impl EventConsumer {
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self::with_name(log, format!("consumer-{}", Uuid::new_v4()))
    }

    pub fn with_name(log: Arc<dyn EventLog>, consumer_name: impl Into<String>) -> Self {
        Self {
            log,
            consumer_name: consumer_name.into(),
            poison_dropped: AtomicU64::new(0),
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Entries dropped because they carried no decodable payload.
    pub fn poison_dropped(&self) -> u64 {
        self.poison_dropped.load(Ordering::Relaxed)
    }

    /// Create the group at the stream tail if absent. Safe to call repeatedly.
    pub async fn ensure_group<T>(&self, stream: &Stream<T>, group: &str) -> StreamResult<()> {
        match self.log.create_group(stream.name(), group).await? {
            GroupCreation::Created => {
                info!(stream = %stream, group, "Created consumer group")
            }
            GroupCreation::AlreadyExists => {
                info!(stream = %stream, group, "Consumer group already exists")
            }
        }
        Ok(())
    }

    /// Fetch at most one new entry for `group`.
    ///
    /// Returns `Ok(None)` when nothing is waiting, and also when the claimed entry
    /// was poison: that entry is logged, acknowledged and never retried.
    pub async fn read_one<T: DeserializeOwned>(
        &self,
        stream: &Stream<T>,
        group: &str,
    ) -> StreamResult<Option<Delivery<T>>> {
        let entry = match self
            .log
            .read_new(stream.name(), group, &self.consumer_name)
            .await?
        {
            Some(entry) => entry,
            None => {
                debug!(stream = %stream, group, "No new events");
                return Ok(None);
            }
        };

        let raw = match entry.data.as_deref() {
            Some(raw) => raw,
            None => {
                warn!(
                    stream = %stream,
                    group,
                    message_id = %entry.id,
                    "Stream entry has no data field, dropping"
                );
                self.drop_poison(stream, group, &entry.id).await;
                return Ok(None);
            }
        };

        match decode_payload::<T>(raw) {
            Ok(data) => Ok(Some(Delivery {
                message_id: entry.id,
                consumer_group: group.to_string(),
                data,
            })),
            Err(e) => {
                error!(
                    stream = %stream,
                    group,
                    message_id = %entry.id,
                    payload = %raw,
                    error = %e,
                    "Failed to deserialize event, dropping"
                );
                self.drop_poison(stream, group, &entry.id).await;
                Ok(None)
            }
        }
    }

    /// Acknowledge a delivery. Call only after its side effect is applied.
    pub async fn acknowledge<T>(
        &self,
        stream: &Stream<T>,
        delivery: &Delivery<T>,
    ) -> StreamResult<()> {
        let acked = self
            .log
            .acknowledge(stream.name(), &delivery.consumer_group, &delivery.message_id)
            .await?;
        if !acked {
            warn!(
                stream = %stream,
                group = %delivery.consumer_group,
                message_id = %delivery.message_id,
                "Acknowledged entry was not pending"
            );
        }
        Ok(())
    }

    async fn drop_poison<T>(&self, stream: &Stream<T>, group: &str, id: &MessageId) {
        self.poison_dropped.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = self.log.acknowledge(stream.name(), group, id).await {
            warn!(
                stream = %stream,
                group,
                message_id = %id,
                error = %e,
                "Failed to acknowledge poison entry"
            );
        }
    }
}
