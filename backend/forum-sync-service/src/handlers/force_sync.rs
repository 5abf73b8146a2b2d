use super::EventHandler;
use crate::error::SyncResult;
use crate::services::ForumSync;
use async_trait::async_trait;
use event_schema::ForceSyncEvent;
use tracing::info;

pub const FORCE_SYNC_GROUP: &str = "force-sync-group";

/// Reconciles one resource on explicit request.
pub struct ForceSyncHandler {
    sync: ForumSync,
}

impl ForceSyncHandler {
    pub fn new(sync: ForumSync) -> Self {
        Self { sync }
    }
}

#[async_trait]
impl EventHandler<ForceSyncEvent> for ForceSyncHandler {
    fn event_type(&self, _event: &ForceSyncEvent) -> &'static str {
        "force_sync"
    }

    async fn handle(&self, event: &ForceSyncEvent) -> SyncResult<()> {
        let outcome = self.sync.create_or_update(&event.resource_id).await?;
        info!(resource_id = %event.resource_id, ?outcome, "Force sync applied");
        Ok(())
    }
}
