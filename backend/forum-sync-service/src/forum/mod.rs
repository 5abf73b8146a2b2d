//! The external forum platform, seen through the operations the sync engine needs.

mod discord;
mod memory;

pub use discord::DiscordForumClient;
pub use memory::{MemoryForum, SentMessage};

use crate::error::ForumResult;
use crate::models::Snowflake;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Maximum number of tags the platform accepts on one thread.
pub const MAX_APPLIED_TAGS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumTag {
    pub id: Snowflake,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumChannel {
    pub id: Snowflake,
    pub guild_id: Snowflake,
    pub name: String,
    pub available_tags: Vec<ForumTag>,
}

impl ForumChannel {
    pub fn has_tag(&self, id: Snowflake) -> bool {
        self.available_tags.iter().any(|t| t.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForumThread {
    pub id: Snowflake,
    pub parent_id: Snowflake,
    pub name: String,
    pub applied_tags: Vec<Snowflake>,
    /// Archived threads reject edits until they are unarchived.
    #[serde(default)]
    pub archived: bool,
}

/// Interactive affordance attached to a thread's starter message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadAction {
    Link {
        label: String,
        url: String,
        disabled: bool,
    },
    Button {
        label: String,
        custom_id: String,
        disabled: bool,
    },
}

/// Full desired presentation of one thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadContent {
    pub title: String,
    pub body: String,
    pub tags: Vec<Snowflake>,
    pub actions: Vec<ThreadAction>,
    pub icon_url: Option<String>,
}

/// Operations consumed from the forum platform.
///
/// Lookups return `Ok(None)` for absent entities; mutations on absent
/// entities fail with `ForumError::NotFound`.
#[async_trait]
pub trait ForumAdapter: Send + Sync {
    async fn guild_exists(&self, guild_id: Snowflake) -> ForumResult<bool>;

    /// Resolve a forum channel inside a guild, with its available tags.
    /// `None` when it is missing or belongs to another guild.
    async fn get_forum_channel(
        &self,
        guild_id: Snowflake,
        channel_id: Snowflake,
    ) -> ForumResult<Option<ForumChannel>>;

    /// Every thread of a forum channel, archived ones included.
    async fn list_threads(
        &self,
        guild_id: Snowflake,
        channel_id: Snowflake,
    ) -> ForumResult<Vec<ForumThread>>;

    async fn get_thread(&self, thread_id: Snowflake) -> ForumResult<Option<ForumThread>>;

    async fn create_thread(
        &self,
        channel_id: Snowflake,
        content: &ThreadContent,
    ) -> ForumResult<ForumThread>;

    /// Rename and retag. Also unarchives the thread.
    async fn modify_thread(
        &self,
        thread_id: Snowflake,
        title: &str,
        tags: &[Snowflake],
    ) -> ForumResult<()>;

    /// Overwrite the starter message body and actions. Fails on an archived thread.
    async fn modify_thread_message(
        &self,
        thread_id: Snowflake,
        content: &ThreadContent,
    ) -> ForumResult<()>;

    async fn delete_thread(&self, thread_id: Snowflake) -> ForumResult<()>;

    /// Post into a text channel. `broadcast` allows an everyone-mention to ping.
    async fn send_message(
        &self,
        channel_id: Snowflake,
        content: &str,
        broadcast: bool,
    ) -> ForumResult<()>;
}
