//! Per-stream event payloads.

use serde::{Deserialize, Serialize};

/// Events on the resources stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub resource_id: String,
    pub event_type: ResourceEventType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceEventType {
    Create,
    Update,
    Delete,
    /// Published in addition to `Update` when a resource flips to compromised.
    Compromised,
}

impl ResourceEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceEventType::Create => "create",
            ResourceEventType::Update => "update",
            ResourceEventType::Delete => "delete",
            ResourceEventType::Compromised => "compromised",
        }
    }
}

impl ResourceEvent {
    pub fn new(resource_id: impl Into<String>, event_type: ResourceEventType) -> Self {
        Self {
            resource_id: resource_id.into(),
            event_type,
        }
    }
}

/// Events on the resource tags stream. Reserved: nothing in the sync engine consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTagEvent {
    pub resource_tag_id: String,
    pub event_type: ResourceTagEventType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceTagEventType {
    Create,
    Update,
    Delete,
}

/// Events on the threads stream. Reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadEvent {
    pub thread_id: String,
    pub event_type: ThreadEventType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadEventType {
    Create,
    Update,
    Delete,
}

/// Explicit request to reconcile one resource now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceSyncEvent {
    pub resource_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Resource,
    ResourceTag,
    Thread,
    ForceSync,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Resource => "resource",
            EntityKind::ResourceTag => "resource_tag",
            EntityKind::Thread => "thread",
            EntityKind::ForceSync => "force_sync",
        }
    }
}

/// Any event carried by the catalog event log, tagged by entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    Resource(ResourceEvent),
    ResourceTag(ResourceTagEvent),
    Thread(ThreadEvent),
    ForceSync(ForceSyncEvent),
}

impl DomainEvent {
    pub fn kind(&self) -> EntityKind {
        match self {
            DomainEvent::Resource(_) => EntityKind::Resource,
            DomainEvent::ResourceTag(_) => EntityKind::ResourceTag,
            DomainEvent::Thread(_) => EntityKind::Thread,
            DomainEvent::ForceSync(_) => EntityKind::ForceSync,
        }
    }

    pub fn entity_id(&self) -> &str {
        match self {
            DomainEvent::Resource(e) => &e.resource_id,
            DomainEvent::ResourceTag(e) => &e.resource_tag_id,
            DomainEvent::Thread(e) => &e.thread_id,
            DomainEvent::ForceSync(e) => &e.resource_id,
        }
    }
}

impl From<ResourceEvent> for DomainEvent {
    fn from(event: ResourceEvent) -> Self {
        DomainEvent::Resource(event)
    }
}

impl From<ResourceTagEvent> for DomainEvent {
    fn from(event: ResourceTagEvent) -> Self {
        DomainEvent::ResourceTag(event)
    }
}

impl From<ThreadEvent> for DomainEvent {
    fn from(event: ThreadEvent) -> Self {
        DomainEvent::Thread(event)
    }
}

impl From<ForceSyncEvent> for DomainEvent {
    fn from(event: ForceSyncEvent) -> Self {
        DomainEvent::ForceSync(event)
    }
}
