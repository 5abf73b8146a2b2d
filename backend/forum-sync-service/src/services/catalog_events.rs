use crate::models::Resource;
use event_schema::{
    streams, DomainEvent, ForceSyncEvent, ResourceEvent, ResourceEventType, ResourceTagEvent,
    ResourceTagEventType, Stream,
};
use event_stream::{EventProducer, MessageId, StreamResult};
use serde::Serialize;
use tracing::{debug, info};

/// Catalog-side publisher: turns catalog mutations into stream events.
#[derive(Clone)]
pub struct CatalogEventPublisher {
    producer: EventProducer,
}

impl CatalogEventPublisher {
    pub fn new(producer: EventProducer) -> Self {
        Self { producer }
    }

    pub async fn resource_created(&self, resource_id: &str) -> StreamResult<MessageId> {
        self.publish_resource(resource_id, ResourceEventType::Create)
            .await
    }

    /// Publish an update, followed by a compromised event only when
    /// `is_compromised` went from false to true in this change.
    pub async fn resource_updated(
        &self,
        previous: &Resource,
        current: &Resource,
    ) -> StreamResult<Vec<MessageId>> {
        let mut ids = vec![
            self.publish_resource(&current.id, ResourceEventType::Update)
                .await?,
        ];
        if !previous.is_compromised && current.is_compromised {
            info!(resource_id = %current.id, "Resource became compromised");
            ids.push(
                self.publish_resource(&current.id, ResourceEventType::Compromised)
                    .await?,
            );
        }
        Ok(ids)
    }

    pub async fn resource_deleted(&self, resource_id: &str) -> StreamResult<MessageId> {
        self.publish_resource(resource_id, ResourceEventType::Delete)
            .await
    }

    pub async fn tag_created(&self, tag_id: &str) -> StreamResult<MessageId> {
        self.publish_tag(tag_id, ResourceTagEventType::Create).await
    }

    pub async fn tag_updated(&self, tag_id: &str) -> StreamResult<MessageId> {
        self.publish_tag(tag_id, ResourceTagEventType::Update).await
    }

    pub async fn tag_deleted(&self, tag_id: &str) -> StreamResult<MessageId> {
        self.publish_tag(tag_id, ResourceTagEventType::Delete).await
    }

    /// Ask the sync engine to reconcile one resource now.
    pub async fn request_sync(&self, resource_id: &str) -> StreamResult<MessageId> {
        self.publish(
            &streams::FORCE_SYNC,
            ForceSyncEvent {
                resource_id: resource_id.to_string(),
            },
        )
        .await
    }

    async fn publish_resource(
        &self,
        resource_id: &str,
        event_type: ResourceEventType,
    ) -> StreamResult<MessageId> {
        self.publish(
            &streams::RESOURCES,
            ResourceEvent::new(resource_id, event_type),
        )
        .await
    }

    async fn publish_tag(
        &self,
        tag_id: &str,
        event_type: ResourceTagEventType,
    ) -> StreamResult<MessageId> {
        self.publish(
            &streams::RESOURCE_TAGS,
            ResourceTagEvent {
                resource_tag_id: tag_id.to_string(),
                event_type,
            },
        )
        .await
    }

    async fn publish<E>(&self, stream: &Stream<E>, event: E) -> StreamResult<MessageId>
    where
        E: Serialize + Into<DomainEvent>,
    {
        let message_id = self.producer.publish(stream, &event).await?;
        let event: DomainEvent = event.into();
        debug!(
            stream = %stream,
            kind = event.kind().as_str(),
            entity_id = event.entity_id(),
            message_id = %message_id,
            "Published catalog event"
        );
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use event_schema::decode_payload;
    use event_stream::MemoryEventLog;
    use std::sync::Arc;

    fn resource(is_compromised: bool) -> Resource {
        let now = Utc::now();
        Resource {
            id: "m1".into(),
            name: "Foo".into(),
            author: "Ana".into(),
            description: None,
            discord_url: None,
            website_url: None,
            icon_url: None,
            rating: 0.0,
            is_compromised,
            tag_ids: vec!["t1".into()],
            created_by_user_id: None,
            updated_by_user_ids: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn publisher() -> (Arc<MemoryEventLog>, CatalogEventPublisher) {
        let log = Arc::new(MemoryEventLog::new());
        let publisher = CatalogEventPublisher::new(EventProducer::new(log.clone()));
        (log, publisher)
    }

    fn resource_events(log: &MemoryEventLog) -> Vec<ResourceEventType> {
        log.payloads(streams::RESOURCES.name())
            .iter()
            .map(|p| decode_payload::<ResourceEvent>(p).unwrap().event_type)
            .collect()
    }

    #[tokio::test]
    async fn compromise_transition_emits_one_extra_event() {
        let (log, publisher) = publisher();
        publisher
            .resource_updated(&resource(false), &resource(true))
            .await
            .unwrap();
        assert_eq!(
            resource_events(&log),
            vec![ResourceEventType::Update, ResourceEventType::Compromised]
        );
    }

    #[tokio::test]
    async fn unchanged_flag_emits_update_only() {
        let (log, publisher) = publisher();
        publisher
            .resource_updated(&resource(false), &resource(false))
            .await
            .unwrap();
        // already compromised stays compromised: no second notice
        publisher
            .resource_updated(&resource(true), &resource(true))
            .await
            .unwrap();
        assert_eq!(
            resource_events(&log),
            vec![ResourceEventType::Update, ResourceEventType::Update]
        );
    }

    #[tokio::test]
    async fn force_sync_goes_to_its_own_stream() {
        let (log, publisher) = publisher();
        publisher.request_sync("m1").await.unwrap();
        assert!(log.is_empty(streams::RESOURCES.name()));
        assert_eq!(log.len(streams::FORCE_SYNC.name()), 1);
    }
}
