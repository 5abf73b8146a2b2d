//! # Event Stream Library
//!
//! Durable, append-only, per-category event log with consumer-group delivery.
//!
//! ## Delivery model
//!
//! - **Producers** append an opaque serialized payload and return immediately.
//!   Delivery guarantees belong to consumers.
//! - **Consumer groups** are created at the tail of a stream. A group created after
//!   an entry was appended never sees that entry.
//! - **Consumers** read at most one *new* entry per call and acknowledge it once its
//!   side effect is applied. Entries are never reclaimed from the pending set, so a
//!   failed entry is not delivered again.
//! - **Poison entries** (missing or undecodable payload) are logged, acknowledged
//!   and dropped.
//!
//! ```text
//! EventProducer ──XADD──▶ stream ──XREADGROUP >──▶ EventConsumer ──XACK──▶
//!                                    (group cursor)      │
//!                                                        ▼
//!                                                     handler
//! ```
//!
//! Two backends implement [`EventLog`]: [`RedisEventLog`] on Redis Streams and
//! [`MemoryEventLog`] for tests and local runs.

mod consumer;
mod error;
mod log;
mod memory;
mod producer;
mod redis_log;

pub use consumer::{Delivery, EventConsumer};
pub use error::{StreamError, StreamResult};
pub use log::{EventLog, GroupCreation, MessageId, RawEntry};
pub use memory::MemoryEventLog;
pub use producer::EventProducer;
pub use redis_log::RedisEventLog;

pub use event_schema::{Stream, DATA_FIELD};
