use super::{CatalogStore, SyncStateStore};
use crate::error::{StoreError, StoreResult};
use crate::models::{Resource, ResourceTag, Snowflake, SyncedThread, TagMapping};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Default)]
struct State {
    resources: BTreeMap<String, Resource>,
    tags: BTreeMap<String, ResourceTag>,
    threads: BTreeMap<Snowflake, SyncedThread>,
    mappings: BTreeMap<Snowflake, TagMapping>,
    racing_insert: Option<SyncedThread>,
}

/// In-process catalog and sync-state store for tests and local runs.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_resource(&self, resource: Resource) {
        self.state.lock().resources.insert(resource.id.clone(), resource);
    }

    pub fn remove_resource(&self, id: &str) -> Option<Resource> {
        self.state.lock().resources.remove(id)
    }

    pub fn put_tag(&self, tag: ResourceTag) {
        self.state.lock().tags.insert(tag.id.clone(), tag);
    }

    pub fn remove_tag(&self, id: &str) -> Option<ResourceTag> {
        self.state.lock().tags.remove(id)
    }

    /// Store `competing` just before the next thread insert, as a concurrent
    /// writer would, so that insert hits the uniqueness rule.
    pub fn race_next_thread_insert(&self, competing: SyncedThread) {
        self.state.lock().racing_insert = Some(competing);
    }

    pub fn threads(&self) -> Vec<SyncedThread> {
        self.state.lock().threads.values().cloned().collect()
    }

    pub fn mappings(&self) -> Vec<TagMapping> {
        self.state.lock().mappings.values().cloned().collect()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_resource(&self, id: &str) -> StoreResult<Option<Resource>> {
        Ok(self.state.lock().resources.get(id).cloned())
    }

    async fn get_resources_by_any_tag(&self, tag_ids: &[String]) -> StoreResult<Vec<Resource>> {
        Ok(self
            .state
            .lock()
            .resources
            .values()
            .filter(|r| r.carries_any_tag(tag_ids))
            .cloned()
            .collect())
    }

    async fn get_all_resources(&self) -> StoreResult<Vec<Resource>> {
        Ok(self.state.lock().resources.values().cloned().collect())
    }

    async fn get_all_tags(&self) -> StoreResult<Vec<ResourceTag>> {
        Ok(self.state.lock().tags.values().cloned().collect())
    }
}

#[async_trait]
impl SyncStateStore for MemoryStore {
    async fn get_thread_by_resource(&self, resource_id: &str) -> StoreResult<Option<SyncedThread>> {
        Ok(self
            .state
            .lock()
            .threads
            .values()
            .find(|t| t.resource_id == resource_id)
            .cloned())
    }

    async fn list_threads(&self) -> StoreResult<Vec<SyncedThread>> {
        Ok(self.threads())
    }

    async fn create_thread(&self, thread: &SyncedThread) -> StoreResult<()> {
        let mut state = self.state.lock();
        if let Some(competing) = state.racing_insert.take() {
            state.threads.insert(competing.id, competing);
        }
        let duplicate = state
            .threads
            .values()
            .any(|t| t.resource_id == thread.resource_id || t.id == thread.id);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "resource {} already has a synced thread",
                thread.resource_id
            )));
        }
        state.threads.insert(thread.id, thread.clone());
        Ok(())
    }

    async fn update_thread(&self, thread: &SyncedThread) -> StoreResult<()> {
        if let Some(existing) = self.state.lock().threads.get_mut(&thread.id) {
            existing.updated_at = thread.updated_at;
        }
        Ok(())
    }

    async fn delete_thread(&self, id: Snowflake) -> StoreResult<bool> {
        Ok(self.state.lock().threads.remove(&id).is_some())
    }

    async fn list_tag_mappings(&self) -> StoreResult<Vec<TagMapping>> {
        Ok(self.mappings())
    }

    async fn upsert_tag_mapping(&self, mapping: &TagMapping) -> StoreResult<()> {
        let mut state = self.state.lock();
        match state.mappings.get_mut(&mapping.id) {
            Some(existing) => {
                existing.resource_tag_id = mapping.resource_tag_id.clone();
                existing.updated_at = mapping.updated_at;
            }
            None => {
                state.mappings.insert(mapping.id, mapping.clone());
            }
        }
        Ok(())
    }

    async fn delete_tag_mapping(&self, id: Snowflake) -> StoreResult<bool> {
        Ok(self.state.lock().mappings.remove(&id).is_some())
    }
}
