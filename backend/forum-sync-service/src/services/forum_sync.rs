use super::presentation;
use crate::error::{ForumError, SyncError, SyncResult};
use crate::forum::{ForumAdapter, ForumChannel, ThreadContent};
use crate::models::{Resource, Snowflake, SyncedThread};
use crate::store::{CatalogStore, SyncStateStore};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The guild and forum channel that mirror the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForumTarget {
    pub guild_id: Snowflake,
    pub forum_channel_id: Snowflake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created { thread_id: Snowflake },
    Updated { thread_id: Snowflake },
    /// The recorded thread was gone from the forum and a new one was made.
    Recreated { thread_id: Snowflake },
    Deleted { thread_id: Snowflake },
    /// Nothing to delete.
    AlreadyAbsent,
}

impl SyncOutcome {
    pub fn thread_id(&self) -> Option<Snowflake> {
        match self {
            SyncOutcome::Created { thread_id }
            | SyncOutcome::Updated { thread_id }
            | SyncOutcome::Recreated { thread_id }
            | SyncOutcome::Deleted { thread_id } => Some(*thread_id),
            SyncOutcome::AlreadyAbsent => None,
        }
    }
}

/// Single authority over forum threads. Computes the desired thread for a
/// resource and applies it; every operation is safe to repeat.
#[derive(Clone)]
pub struct ForumSync {
    forum: Arc<dyn ForumAdapter>,
    catalog: Arc<dyn CatalogStore>,
    state: Arc<dyn SyncStateStore>,
    target: ForumTarget,
}

impl ForumSync {
    pub fn new(
        forum: Arc<dyn ForumAdapter>,
        catalog: Arc<dyn CatalogStore>,
        state: Arc<dyn SyncStateStore>,
        target: ForumTarget,
    ) -> Self {
        Self {
            forum,
            catalog,
            state,
            target,
        }
    }

    pub fn forum(&self) -> &Arc<dyn ForumAdapter> {
        &self.forum
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogStore> {
        &self.catalog
    }

    pub fn state(&self) -> &Arc<dyn SyncStateStore> {
        &self.state
    }

    pub fn target(&self) -> ForumTarget {
        self.target
    }

    /// Bring the thread for `resource_id` in line with the catalog, creating it if needed.
    pub async fn create_or_update(&self, resource_id: &str) -> SyncResult<SyncOutcome> {
        let resource = self
            .catalog
            .get_resource(resource_id)
            .await?
            .ok_or_else(|| SyncError::ResourceNotFound(resource_id.to_string()))?;

        match self.state.get_thread_by_resource(resource_id).await? {
            None => self.create(&resource).await,
            Some(_) => self.update(&resource).await,
        }
    }

    /// Resolve the configured guild and forum channel.
    ///
    /// Either one missing means the deployment points at the wrong place;
    /// nothing is created until that is fixed.
    pub async fn resolve_channel(&self) -> SyncResult<ForumChannel> {
        if !self.forum.guild_exists(self.target.guild_id).await? {
            error!(guild_id = self.target.guild_id, "Configured guild not found");
            return Err(SyncError::GuildNotFound(self.target.guild_id));
        }
        match self
            .forum
            .get_forum_channel(self.target.guild_id, self.target.forum_channel_id)
            .await?
        {
            Some(channel) => Ok(channel),
            None => {
                error!(
                    guild_id = self.target.guild_id,
                    channel_id = self.target.forum_channel_id,
                    "Configured forum channel not found"
                );
                Err(SyncError::ForumChannelNotFound(self.target.forum_channel_id))
            }
        }
    }

    async fn desired_content(
        &self,
        resource: &Resource,
        channel: &ForumChannel,
    ) -> SyncResult<ThreadContent> {
        let mappings = self.state.list_tag_mappings().await?;
        let tags = presentation::resolve_tags(resource, &mappings, channel);
        Ok(presentation::render(resource, tags))
    }

    /// Create a thread for `resource` and record it.
    ///
    /// When the record cannot be stored (typically because a concurrent sync
    /// recorded a thread for the same resource first) the new thread is
    /// deleted again and the failure returned.
    pub async fn create(&self, resource: &Resource) -> SyncResult<SyncOutcome> {
        let channel = self.resolve_channel().await?;
        let content = self.desired_content(resource, &channel).await?;
        let thread = self.forum.create_thread(channel.id, &content).await?;

        let record = SyncedThread::synced_now(thread.id, resource);
        if let Err(err) = self.state.create_thread(&record).await {
            warn!(
                resource_id = %resource.id,
                thread_id = thread.id,
                error = %err,
                "Could not record new thread, removing it"
            );
            if let Err(cleanup) = self.forum.delete_thread(thread.id).await {
                if !cleanup.is_not_found() {
                    error!(
                        thread_id = thread.id,
                        error = %cleanup,
                        "Failed to remove unrecorded thread"
                    );
                }
            }
            return Err(err.into());
        }

        info!(resource_id = %resource.id, thread_id = thread.id, "Created forum thread");
        Ok(SyncOutcome::Created {
            thread_id: thread.id,
        })
    }

    /// Overwrite the recorded thread with the current presentation of `resource`.
    ///
    /// A recorded thread that no longer exists on the forum is forgotten and
    /// replaced by a new one.
    pub async fn update(&self, resource: &Resource) -> SyncResult<SyncOutcome> {
        let record = self
            .state
            .get_thread_by_resource(&resource.id)
            .await?
            .ok_or_else(|| SyncError::ThreadRecordNotFound(resource.id.clone()))?;

        let live = match self.forum.get_thread(record.id).await? {
            Some(thread) => thread,
            None => {
                warn!(
                    resource_id = %resource.id,
                    thread_id = record.id,
                    "Recorded thread missing from forum, recreating"
                );
                self.state.delete_thread(record.id).await?;
                let created = self.create(resource).await?;
                return Ok(match created {
                    SyncOutcome::Created { thread_id } => SyncOutcome::Recreated { thread_id },
                    other => other,
                });
            }
        };

        let channel = self.resolve_channel().await?;
        let content = self.desired_content(resource, &channel).await?;

        let mut live_tags = live.applied_tags.clone();
        let mut wanted_tags = content.tags.clone();
        live_tags.sort_unstable();
        wanted_tags.sort_unstable();
        // An archived thread must be unarchived before its message can change.
        if live.archived || live.name != content.title || live_tags != wanted_tags {
            self.forum
                .modify_thread(record.id, &content.title, &content.tags)
                .await?;
        }
        self.forum.modify_thread_message(record.id, &content).await?;

        self.state.update_thread(&record.touched(resource)).await?;
        info!(resource_id = %resource.id, thread_id = record.id, "Updated forum thread");
        Ok(SyncOutcome::Updated {
            thread_id: record.id,
        })
    }

    /// Remove the thread mirroring `resource_id`, if one is recorded.
    pub async fn delete_resource_thread(&self, resource_id: &str) -> SyncResult<SyncOutcome> {
        match self.state.get_thread_by_resource(resource_id).await? {
            Some(record) => self.delete_thread(record.id).await,
            None => {
                info!(resource_id = %resource_id, "No thread recorded for deleted resource");
                Ok(SyncOutcome::AlreadyAbsent)
            }
        }
    }

    /// Remove a thread from the forum and forget its record.
    ///
    /// A thread already gone from the forum counts as deleted. Any other
    /// forum failure leaves the record in place so a later pass can retry.
    pub async fn delete_thread(&self, thread_id: Snowflake) -> SyncResult<SyncOutcome> {
        match self.forum.delete_thread(thread_id).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                info!(thread_id, "Thread already absent from forum");
            }
            Err(err) => return Err(err.into()),
        }
        let removed = self.state.delete_thread(thread_id).await?;
        info!(thread_id, removed_record = removed, "Deleted forum thread");
        Ok(SyncOutcome::Deleted { thread_id })
    }

    /// Announce that a resource has been compromised, pinging everyone in `channel_id`.
    pub async fn announce_compromised(
        &self,
        resource_id: &str,
        channel_id: Option<Snowflake>,
    ) -> SyncResult<()> {
        let channel_id = channel_id.ok_or_else(|| {
            SyncError::Configuration("no update channel configured for compromised notices".into())
        })?;
        let resource = self
            .catalog
            .get_resource(resource_id)
            .await?
            .ok_or_else(|| SyncError::ResourceNotFound(resource_id.to_string()))?;

        let notice = presentation::compromised_notice(&resource);
        self.send(channel_id, &notice, true).await?;
        warn!(resource_id = %resource_id, channel_id, "Compromised resource announced");
        Ok(())
    }

    /// Post a message, mapping a missing channel to `ChannelNotFound`.
    pub async fn send(
        &self,
        channel_id: Snowflake,
        content: &str,
        broadcast: bool,
    ) -> SyncResult<()> {
        match self.forum.send_message(channel_id, content, broadcast).await {
            Ok(()) => Ok(()),
            Err(ForumError::NotFound { .. }) => Err(SyncError::ChannelNotFound(channel_id)),
            Err(err) => Err(err.into()),
        }
    }
}

