use crate::error::StreamResult;
use async_trait::async_trait;
use std::fmt;

/// Log-assigned entry id, monotonic and unique within a stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An undecoded stream entry. `data` is `None` when the entry lacks the payload field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub id: MessageId,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupCreation {
    Created,
    AlreadyExists,
}

/// Storage backend of the event log.
///
/// Streams are addressed by name; payload schemas are enforced one level up by
/// [`crate::EventProducer`] and [`crate::EventConsumer`].
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append a payload under the data field. Creates the stream if needed.
    async fn append(&self, stream: &str, payload: String) -> StreamResult<MessageId>;

    /// Create `group` positioned at the current tail. Never moves an existing group.
    async fn create_group(&self, stream: &str, group: &str) -> StreamResult<GroupCreation>;

    /// Claim at most one entry the group has not delivered yet. Does not block.
    async fn read_new(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
    ) -> StreamResult<Option<RawEntry>>;

    /// Remove an entry from the group's pending set. Returns false if it was not pending.
    async fn acknowledge(&self, stream: &str, group: &str, id: &MessageId) -> StreamResult<bool>;

    /// Number of delivered but unacknowledged entries in the group.
    async fn pending_count(&self, stream: &str, group: &str) -> StreamResult<usize>;
}
