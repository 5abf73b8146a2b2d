//! Event schemas for the catalog event log
//!
//! Every stream carries exactly one payload type. A [`Stream`] descriptor binds a
//! stream name to that type so producers and consumers cannot disagree on the
//! schema of a stream they share.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

pub mod events;
pub mod streams;

pub use events::{
    DomainEvent, EntityKind, ForceSyncEvent, ResourceEvent, ResourceEventType, ResourceTagEvent,
    ResourceTagEventType, ThreadEvent, ThreadEventType,
};

/// Name of the single field holding the serialized payload in every stream entry.
pub const DATA_FIELD: &str = "data";

/// A named stream with a declared payload schema.
///
/// Descriptors are `const`-constructible so the full set of streams lives in
/// [`streams`] as plain constants.
pub struct Stream<T> {
    name: &'static str,
    _schema: PhantomData<fn() -> T>,
}

impl<T> Stream<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _schema: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Stream<T> {}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").field("name", &self.name).finish()
    }
}

impl<T> fmt::Display for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Encode a payload into the string stored under [`DATA_FIELD`].
pub fn encode_payload<T: Serialize>(payload: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(payload)
}

/// Decode a payload read from [`DATA_FIELD`].
pub fn decode_payload<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_descriptor_is_copy_and_displays_name() {
        let stream = streams::RESOURCES;
        let copied = stream;
        assert_eq!(stream.name(), "resources");
        assert_eq!(copied.to_string(), "resources");
    }

    #[test]
    fn decode_rejects_payload_of_wrong_schema() {
        let raw = r#"{"thread_id":"42","event_type":"create"}"#;
        let decoded: Result<ResourceEvent, _> = decode_payload(raw);
        assert!(decoded.is_err());
    }
}
