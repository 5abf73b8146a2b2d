//! In-process event log with Redis Streams group semantics.

use crate::error::{StreamError, StreamResult};
use crate::log::{EventLog, GroupCreation, MessageId, RawEntry};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
struct GroupState {
    last_delivered: u64,
    // seq -> consumer holding the claim
    pending: BTreeMap<u64, String>,
}

#[derive(Default)]
struct StreamState {
    entries: Vec<(u64, Option<String>)>,
    next_seq: u64,
    groups: HashMap<String, GroupState>,
}

impl StreamState {
    fn push(&mut self, data: Option<String>) -> u64 {
        self.next_seq += 1;
        self.entries.push((self.next_seq, data));
        self.next_seq
    }
}

fn format_id(seq: u64) -> MessageId {
    MessageId::new(format!("{}-0", seq))
}

fn parse_id(id: &MessageId) -> Option<u64> {
    id.as_str().split('-').next()?.parse().ok()
}

/// Event log held in memory. Shares nothing across processes.
#[derive(Default)]
pub struct MemoryEventLog {
    streams: Mutex<HashMap<String, StreamState>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry that has no payload field, as a foreign producer might.
    pub fn append_without_data(&self, stream: &str) -> MessageId {
        let mut streams = self.streams.lock();
        let seq = streams.entry(stream.to_string()).or_default().push(None);
        format_id(seq)
    }

    /// Total entries ever appended to `stream`.
    pub fn len(&self, stream: &str) -> usize {
        self.streams
            .lock()
            .get(stream)
            .map(|s| s.entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, stream: &str) -> bool {
        self.len(stream) == 0
    }

    /// Decoded payloads of every entry in `stream`, oldest first.
    pub fn payloads(&self, stream: &str) -> Vec<String> {
        self.streams
            .lock()
            .get(stream)
            .map(|s| s.entries.iter().filter_map(|(_, d)| d.clone()).collect())
            .unwrap_or_default()
    }
}

fn no_group(stream: &str, group: &str) -> StreamError {
    StreamError::NoGroup {
        stream: stream.to_string(),
        group: group.to_string(),
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn append(&self, stream: &str, payload: String) -> StreamResult<MessageId> {
        let mut streams = self.streams.lock();
        let seq = streams
            .entry(stream.to_string())
            .or_default()
            .push(Some(payload));
        Ok(format_id(seq))
    }

    async fn create_group(&self, stream: &str, group: &str) -> StreamResult<GroupCreation> {
        let mut streams = self.streams.lock();
        let state = streams.entry(stream.to_string()).or_default();
        if state.groups.contains_key(group) {
            return Ok(GroupCreation::AlreadyExists);
        }
        let tail = state.next_seq;
        state.groups.insert(
            group.to_string(),
            GroupState {
                last_delivered: tail,
                pending: BTreeMap::new(),
            },
        );
        Ok(GroupCreation::Created)
    }

    async fn read_new(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
    ) -> StreamResult<Option<RawEntry>> {
        let mut streams = self.streams.lock();
        let state = streams
            .get_mut(stream)
            .ok_or_else(|| no_group(stream, group))?;
        let StreamState {
            entries, groups, ..
        } = state;
        let group_state = groups.get_mut(group).ok_or_else(|| no_group(stream, group))?;

        let next = entries
            .iter()
            .find(|(seq, _)| *seq > group_state.last_delivered)
            .cloned();

        Ok(next.map(|(seq, data)| {
            group_state.last_delivered = seq;
            group_state.pending.insert(seq, consumer.to_string());
            RawEntry {
                id: format_id(seq),
                data,
            }
        }))
    }

    async fn acknowledge(&self, stream: &str, group: &str, id: &MessageId) -> StreamResult<bool> {
        let mut streams = self.streams.lock();
        let group_state = streams
            .get_mut(stream)
            .and_then(|s| s.groups.get_mut(group))
            .ok_or_else(|| no_group(stream, group))?;
        Ok(parse_id(id)
            .map(|seq| group_state.pending.remove(&seq).is_some())
            .unwrap_or(false))
    }

    async fn pending_count(&self, stream: &str, group: &str) -> StreamResult<usize> {
        let streams = self.streams.lock();
        streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .map(|g| g.pending.len())
            .ok_or_else(|| no_group(stream, group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn group_starts_at_tail() {
        let log = MemoryEventLog::new();
        log.append("s", "before".into()).await.unwrap();
        log.create_group("s", "g").await.unwrap();
        assert!(log.read_new("s", "g", "c").await.unwrap().is_none());

        log.append("s", "after".into()).await.unwrap();
        let entry = log.read_new("s", "g", "c").await.unwrap().unwrap();
        assert_eq!(entry.data.as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn acknowledge_unknown_id_is_false() {
        let log = MemoryEventLog::new();
        log.create_group("s", "g").await.unwrap();
        let acked = log
            .acknowledge("s", "g", &MessageId::new("99-0"))
            .await
            .unwrap();
        assert!(!acked);
    }

    #[tokio::test]
    async fn read_without_group_fails() {
        let log = MemoryEventLog::new();
        log.append("s", "x".into()).await.unwrap();
        let err = log.read_new("s", "missing", "c").await.unwrap_err();
        assert!(matches!(err, StreamError::NoGroup { .. }));
    }
}
