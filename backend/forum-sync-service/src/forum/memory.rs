use super::{ForumAdapter, ForumChannel, ForumTag, ForumThread, ThreadContent};
use crate::error::{ForumError, ForumResult};
use crate::models::Snowflake;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel_id: Snowflake,
    pub content: String,
    pub broadcast: bool,
}

#[derive(Default)]
struct State {
    guilds: HashSet<Snowflake>,
    forums: BTreeMap<Snowflake, ForumChannel>,
    text_channels: HashSet<Snowflake>,
    threads: BTreeMap<Snowflake, (ForumThread, ThreadContent)>,
    next_id: Snowflake,
    unavailable: bool,
    threads_created: usize,
    thread_modifications: usize,
    message_modifications: usize,
    sent: Vec<SentMessage>,
}

/// In-process forum platform for tests. Counts every mutation it receives.
pub struct MemoryForum {
    state: Mutex<State>,
}

impl Default for MemoryForum {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1_000,
                ..State::default()
            }),
        }
    }
}

impl MemoryForum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_guild(&self, guild_id: Snowflake) {
        self.state.lock().guilds.insert(guild_id);
    }

    pub fn add_forum_channel(&self, guild_id: Snowflake, channel_id: Snowflake) {
        self.state.lock().forums.insert(
            channel_id,
            ForumChannel {
                id: channel_id,
                guild_id,
                name: format!("forum-{}", channel_id),
                available_tags: Vec::new(),
            },
        );
    }

    pub fn add_text_channel(&self, channel_id: Snowflake) {
        self.state.lock().text_channels.insert(channel_id);
    }

    pub fn add_tag(&self, channel_id: Snowflake, tag_id: Snowflake, name: &str) {
        if let Some(forum) = self.state.lock().forums.get_mut(&channel_id) {
            forum.available_tags.push(ForumTag {
                id: tag_id,
                name: name.to_string(),
            });
        }
    }

    pub fn remove_tag(&self, channel_id: Snowflake, tag_id: Snowflake) {
        if let Some(forum) = self.state.lock().forums.get_mut(&channel_id) {
            forum.available_tags.retain(|t| t.id != tag_id);
        }
    }

    /// Delete a thread behind the sync engine's back.
    pub fn remove_thread(&self, thread_id: Snowflake) -> bool {
        self.state.lock().threads.remove(&thread_id).is_some()
    }

    /// Archive a thread the way the platform does after inactivity.
    pub fn archive_thread(&self, thread_id: Snowflake) -> bool {
        match self.state.lock().threads.get_mut(&thread_id) {
            Some((thread, _)) => {
                thread.archived = true;
                true
            }
            None => false,
        }
    }

    /// Make every call fail as if the platform could not be reached.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    pub fn threads(&self) -> Vec<ForumThread> {
        self.state
            .lock()
            .threads
            .values()
            .map(|(t, _)| t.clone())
            .collect()
    }

    pub fn content(&self, thread_id: Snowflake) -> Option<ThreadContent> {
        self.state
            .lock()
            .threads
            .get(&thread_id)
            .map(|(_, c)| c.clone())
    }

    pub fn threads_created(&self) -> usize {
        self.state.lock().threads_created
    }

    pub fn thread_modifications(&self) -> usize {
        self.state.lock().thread_modifications
    }

    pub fn message_modifications(&self) -> usize {
        self.state.lock().message_modifications
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.state.lock().sent.clone()
    }

    fn check_available(state: &State) -> ForumResult<()> {
        if state.unavailable {
            Err(ForumError::Unavailable("forum offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ForumAdapter for MemoryForum {
    async fn guild_exists(&self, guild_id: Snowflake) -> ForumResult<bool> {
        let state = self.state.lock();
        Self::check_available(&state)?;
        Ok(state.guilds.contains(&guild_id))
    }

    async fn get_forum_channel(
        &self,
        guild_id: Snowflake,
        channel_id: Snowflake,
    ) -> ForumResult<Option<ForumChannel>> {
        let state = self.state.lock();
        Self::check_available(&state)?;
        Ok(state
            .forums
            .get(&channel_id)
            .filter(|f| f.guild_id == guild_id)
            .cloned())
    }

    async fn list_threads(
        &self,
        _guild_id: Snowflake,
        channel_id: Snowflake,
    ) -> ForumResult<Vec<ForumThread>> {
        let state = self.state.lock();
        Self::check_available(&state)?;
        Ok(state
            .threads
            .values()
            .filter(|(t, _)| t.parent_id == channel_id)
            .map(|(t, _)| t.clone())
            .collect())
    }

    async fn get_thread(&self, thread_id: Snowflake) -> ForumResult<Option<ForumThread>> {
        let state = self.state.lock();
        Self::check_available(&state)?;
        Ok(state.threads.get(&thread_id).map(|(t, _)| t.clone()))
    }

    async fn create_thread(
        &self,
        channel_id: Snowflake,
        content: &ThreadContent,
    ) -> ForumResult<ForumThread> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        if !state.forums.contains_key(&channel_id) {
            return Err(ForumError::NotFound {
                kind: "channel",
                id: channel_id,
            });
        }
        state.next_id += 1;
        let thread = ForumThread {
            id: state.next_id,
            parent_id: channel_id,
            name: content.title.clone(),
            applied_tags: content.tags.clone(),
            archived: false,
        };
        state
            .threads
            .insert(thread.id, (thread.clone(), content.clone()));
        state.threads_created += 1;
        Ok(thread)
    }

    async fn modify_thread(
        &self,
        thread_id: Snowflake,
        title: &str,
        tags: &[Snowflake],
    ) -> ForumResult<()> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        let (thread, _) = state.threads.get_mut(&thread_id).ok_or(ForumError::NotFound {
            kind: "thread",
            id: thread_id,
        })?;
        thread.name = title.to_string();
        thread.applied_tags = tags.to_vec();
        thread.archived = false;
        state.thread_modifications += 1;
        Ok(())
    }

    async fn modify_thread_message(
        &self,
        thread_id: Snowflake,
        content: &ThreadContent,
    ) -> ForumResult<()> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        let (thread, stored) = state.threads.get_mut(&thread_id).ok_or(ForumError::NotFound {
            kind: "thread",
            id: thread_id,
        })?;
        if thread.archived {
            return Err(ForumError::Api {
                status: 400,
                body: "Thread is archived".to_string(),
            });
        }
        stored.body = content.body.clone();
        stored.actions = content.actions.clone();
        stored.icon_url = content.icon_url.clone();
        state.message_modifications += 1;
        Ok(())
    }

    async fn delete_thread(&self, thread_id: Snowflake) -> ForumResult<()> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        state
            .threads
            .remove(&thread_id)
            .map(|_| ())
            .ok_or(ForumError::NotFound {
                kind: "thread",
                id: thread_id,
            })
    }

    async fn send_message(
        &self,
        channel_id: Snowflake,
        content: &str,
        broadcast: bool,
    ) -> ForumResult<()> {
        let mut state = self.state.lock();
        Self::check_available(&state)?;
        if !state.text_channels.contains(&channel_id) {
            return Err(ForumError::NotFound {
                kind: "channel",
                id: channel_id,
            });
        }
        state.sent.push(SentMessage {
            channel_id,
            content: content.to_string(),
            broadcast,
        });
        Ok(())
    }
}
