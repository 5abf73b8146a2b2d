//! Persistence seams: the read-only catalog and the local sync state.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PgStore, MIGRATOR};

use crate::error::StoreResult;
use crate::models::{Resource, ResourceTag, Snowflake, SyncedThread, TagMapping};
use async_trait::async_trait;

/// Read access to catalog resources and tags. The catalog is owned elsewhere.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_resource(&self, id: &str) -> StoreResult<Option<Resource>>;

    /// Resources carrying at least one of `tag_ids`.
    async fn get_resources_by_any_tag(&self, tag_ids: &[String]) -> StoreResult<Vec<Resource>>;

    async fn get_all_resources(&self) -> StoreResult<Vec<Resource>>;

    async fn get_all_tags(&self) -> StoreResult<Vec<ResourceTag>>;
}

/// Local records of synced threads and tag mappings.
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    async fn get_thread_by_resource(&self, resource_id: &str) -> StoreResult<Option<SyncedThread>>;

    async fn list_threads(&self) -> StoreResult<Vec<SyncedThread>>;

    /// Insert a record. Fails with `StoreError::Conflict` when the resource
    /// already has one.
    async fn create_thread(&self, thread: &SyncedThread) -> StoreResult<()>;

    async fn update_thread(&self, thread: &SyncedThread) -> StoreResult<()>;

    /// Returns whether a record was removed.
    async fn delete_thread(&self, id: Snowflake) -> StoreResult<bool>;

    async fn list_tag_mappings(&self) -> StoreResult<Vec<TagMapping>>;

    async fn upsert_tag_mapping(&self, mapping: &TagMapping) -> StoreResult<()>;

    async fn delete_tag_mapping(&self, id: Snowflake) -> StoreResult<bool>;
}
