use super::EventHandler;
use crate::error::SyncResult;
use crate::models::Snowflake;
use crate::services::ForumSync;
use async_trait::async_trait;
use event_schema::{ResourceEvent, ResourceEventType};
use tracing::info;

pub const RESOURCE_SYNC_GROUP: &str = "resource-sync-group";

/// Applies resource lifecycle events to the forum.
pub struct ResourceEventHandler {
    sync: ForumSync,
    update_channel_id: Option<Snowflake>,
}

impl ResourceEventHandler {
    pub fn new(sync: ForumSync, update_channel_id: Option<Snowflake>) -> Self {
        Self {
            sync,
            update_channel_id,
        }
    }
}

#[async_trait]
impl EventHandler<ResourceEvent> for ResourceEventHandler {
    fn event_type(&self, event: &ResourceEvent) -> &'static str {
        event.event_type.as_str()
    }

    async fn handle(&self, event: &ResourceEvent) -> SyncResult<()> {
        info!(
            resource_id = %event.resource_id,
            event_type = event.event_type.as_str(),
            "Handling resource event"
        );
        match event.event_type {
            ResourceEventType::Create | ResourceEventType::Update => {
                self.sync.create_or_update(&event.resource_id).await?;
            }
            ResourceEventType::Delete => {
                self.sync.delete_resource_thread(&event.resource_id).await?;
            }
            ResourceEventType::Compromised => {
                self.sync
                    .announce_compromised(&event.resource_id, self.update_channel_id)
                    .await?;
            }
        }
        Ok(())
    }
}
