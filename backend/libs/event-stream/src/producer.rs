use crate::error::StreamResult;
use crate::log::{EventLog, MessageId};
use event_schema::{encode_payload, Stream};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Appends typed payloads to named streams.
#[derive(Clone)]
pub struct EventProducer {
    log: Arc<dyn EventLog>,
}

impl EventProducer {
    pub fn new(log: Arc<dyn EventLog>) -> Self {
        Self { log }
    }

    /// Append `payload` to `stream` without waiting for any consumer.
    pub async fn publish<T: Serialize>(
        &self,
        stream: &Stream<T>,
        payload: &T,
    ) -> StreamResult<MessageId> {
        let json = encode_payload(payload)?;
        let id = self.log.append(stream.name(), json).await?;
        debug!(stream = %stream, message_id = %id, "Published event");
        Ok(id)
    }
}
