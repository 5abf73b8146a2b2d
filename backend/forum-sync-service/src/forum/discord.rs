use super::{ForumAdapter, ForumChannel, ForumTag, ForumThread, ThreadAction, ThreadContent};
use crate::error::{ForumError, ForumResult};
use crate::models::Snowflake;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Seven days; the longest auto-archive window the platform offers.
const AUTO_ARCHIVE_MINUTES: u32 = 10080;
const ARCHIVED_PAGE_LIMIT: u32 = 100;
const GUILD_FORUM_CHANNEL: u8 = 15;

const COMPONENT_ACTION_ROW: u8 = 1;
const COMPONENT_BUTTON: u8 = 2;
const BUTTON_STYLE_DANGER: u8 = 4;
const BUTTON_STYLE_LINK: u8 = 5;

#[derive(Deserialize)]
struct WireTag {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct WireChannel {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    guild_id: Option<String>,
    parent_id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    available_tags: Vec<WireTag>,
    #[serde(default)]
    applied_tags: Vec<String>,
    thread_metadata: Option<WireThreadMetadata>,
}

#[derive(Deserialize)]
struct WireThreadMetadata {
    #[serde(default)]
    archived: bool,
    archive_timestamp: Option<String>,
}

#[derive(Deserialize)]
struct WireThreadList {
    threads: Vec<WireChannel>,
    #[serde(default)]
    has_more: bool,
}

fn parse_id(raw: &str) -> ForumResult<Snowflake> {
    raw.parse()
        .map_err(|_| ForumError::Decode(format!("invalid snowflake '{}'", raw)))
}

impl WireChannel {
    fn into_thread(self) -> ForumResult<ForumThread> {
        let parent = self
            .parent_id
            .as_deref()
            .ok_or_else(|| ForumError::Decode(format!("thread {} has no parent", self.id)))?;
        Ok(ForumThread {
            id: parse_id(&self.id)?,
            parent_id: parse_id(parent)?,
            name: self.name.unwrap_or_default(),
            applied_tags: self
                .applied_tags
                .iter()
                .map(|t| parse_id(t))
                .collect::<ForumResult<_>>()?,
            archived: self.thread_metadata.as_ref().is_some_and(|m| m.archived),
        })
    }

    fn into_forum_channel(self) -> ForumResult<ForumChannel> {
        let guild = self.guild_id.as_deref().unwrap_or("0");
        Ok(ForumChannel {
            id: parse_id(&self.id)?,
            guild_id: parse_id(guild)?,
            name: self.name.unwrap_or_default(),
            available_tags: self
                .available_tags
                .into_iter()
                .map(|t| {
                    Ok(ForumTag {
                        id: parse_id(&t.id)?,
                        name: t.name,
                    })
                })
                .collect::<ForumResult<_>>()?,
        })
    }
}

fn components(actions: &[ThreadAction]) -> Value {
    if actions.is_empty() {
        return json!([]);
    }
    let buttons: Vec<Value> = actions
        .iter()
        .map(|action| match action {
            ThreadAction::Link {
                label,
                url,
                disabled,
            } => json!({
                "type": COMPONENT_BUTTON,
                "style": BUTTON_STYLE_LINK,
                "label": label,
                "url": url,
                "disabled": disabled,
            }),
            ThreadAction::Button {
                label,
                custom_id,
                disabled,
            } => json!({
                "type": COMPONENT_BUTTON,
                "style": BUTTON_STYLE_DANGER,
                "label": label,
                "custom_id": custom_id,
                "disabled": disabled,
            }),
        })
        .collect();
    json!([{ "type": COMPONENT_ACTION_ROW, "components": buttons }])
}

fn embeds(content: &ThreadContent) -> Value {
    match &content.icon_url {
        Some(url) => json!([{ "thumbnail": { "url": url } }]),
        None => json!([]),
    }
}

/// Starter message payload shared by thread creation and message edits.
fn message_body(content: &ThreadContent) -> Value {
    json!({
        "content": content.body,
        "embeds": embeds(content),
        "components": components(&content.actions),
        "allowed_mentions": { "parse": ["users"] },
    })
}

/// Rename and retag, unarchiving the thread so its starter message can be edited.
fn thread_patch_body(title: &str, tags: &[Snowflake]) -> Value {
    json!({
        "name": title,
        "applied_tags": tags.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
        "archived": false,
    })
}

fn archived_page_query(before: Option<&str>) -> Vec<(&'static str, String)> {
    let mut query = vec![("limit", ARCHIVED_PAGE_LIMIT.to_string())];
    if let Some(ts) = before {
        query.push(("before", ts.to_string()));
    }
    query
}

/// Forum adapter over the Discord REST API.
#[derive(Clone)]
pub struct DiscordForumClient {
    http_client: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl DiscordForumClient {
    pub fn new(api_base: impl Into<String>, bot_token: impl Into<String>) -> ForumResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
        })
    }

    /// Query values are percent-encoded by reqwest; never splice them into `path`.
    fn build_request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.api_base, path);
        debug!(%method, %url, "Discord request");

        let mut request = self
            .http_client
            .request(method, &url)
            .header("Authorization", format!("Bot {}", self.bot_token));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        request
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        kind: &'static str,
        id: Snowflake,
    ) -> ForumResult<Option<String>> {
        self.send(self.build_request(method, path, &[], body), kind, id)
            .await
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        kind: &'static str,
        id: Snowflake,
    ) -> ForumResult<Option<String>> {
        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(ForumError::NotFound { kind, id }),
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => Ok(Some(response.text().await?)),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ForumError::Api {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        kind: &'static str,
        id: Snowflake,
    ) -> ForumResult<T> {
        let text = self
            .send(self.build_request(Method::GET, path, query, None), kind, id)
            .await?
            .unwrap_or_default();
        serde_json::from_str(&text).map_err(|e| ForumError::Decode(e.to_string()))
    }

    /// `Ok(None)` when the platform answers 404.
    async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        kind: &'static str,
        id: Snowflake,
    ) -> ForumResult<Option<T>> {
        match self.get_json(path, &[], kind, id).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn archived_threads(&self, channel_id: Snowflake) -> ForumResult<Vec<WireChannel>> {
        let mut collected = Vec::new();
        let mut before: Option<String> = None;
        loop {
            let page: WireThreadList = self
                .get_json(
                    &format!("/channels/{}/threads/archived/public", channel_id),
                    &archived_page_query(before.as_deref()),
                    "channel",
                    channel_id,
                )
                .await?;
            let has_more = page.has_more;
            before = page
                .threads
                .last()
                .and_then(|t| t.thread_metadata.as_ref())
                .and_then(|m| m.archive_timestamp.clone());
            collected.extend(page.threads);
            if !has_more || before.is_none() {
                break;
            }
        }
        Ok(collected)
    }
}

#[async_trait]
impl ForumAdapter for DiscordForumClient {
    async fn guild_exists(&self, guild_id: Snowflake) -> ForumResult<bool> {
        let guild: Option<Value> = self
            .get_optional(&format!("/guilds/{}", guild_id), "guild", guild_id)
            .await?;
        Ok(guild.is_some())
    }

    async fn get_forum_channel(
        &self,
        guild_id: Snowflake,
        channel_id: Snowflake,
    ) -> ForumResult<Option<ForumChannel>> {
        let channel: Option<WireChannel> = self
            .get_optional(&format!("/channels/{}", channel_id), "channel", channel_id)
            .await?;
        match channel {
            Some(c) if c.kind == GUILD_FORUM_CHANNEL => {
                let forum = c.into_forum_channel()?;
                Ok((forum.guild_id == guild_id).then_some(forum))
            }
            _ => Ok(None),
        }
    }

    async fn list_threads(
        &self,
        guild_id: Snowflake,
        channel_id: Snowflake,
    ) -> ForumResult<Vec<ForumThread>> {
        let active: WireThreadList = self
            .get_json(
                &format!("/guilds/{}/threads/active", guild_id),
                &[],
                "guild",
                guild_id,
            )
            .await?;
        let archived = self.archived_threads(channel_id).await?;
        let channel = channel_id.to_string();

        let mut threads = Vec::new();
        for wire in active.threads.into_iter().chain(archived) {
            if wire.parent_id.as_deref() != Some(channel.as_str()) {
                continue;
            }
            let thread = wire.into_thread()?;
            if !threads.iter().any(|t: &ForumThread| t.id == thread.id) {
                threads.push(thread);
            }
        }
        Ok(threads)
    }

    async fn get_thread(&self, thread_id: Snowflake) -> ForumResult<Option<ForumThread>> {
        let channel: Option<WireChannel> = self
            .get_optional(&format!("/channels/{}", thread_id), "thread", thread_id)
            .await?;
        channel.map(WireChannel::into_thread).transpose()
    }

    async fn create_thread(
        &self,
        channel_id: Snowflake,
        content: &ThreadContent,
    ) -> ForumResult<ForumThread> {
        let body = json!({
            "name": content.title,
            "auto_archive_duration": AUTO_ARCHIVE_MINUTES,
            "applied_tags": content.tags.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
            "message": message_body(content),
        });
        let text = self
            .request(
                Method::POST,
                &format!("/channels/{}/threads", channel_id),
                Some(body),
                "channel",
                channel_id,
            )
            .await?
            .unwrap_or_default();
        let wire: WireChannel =
            serde_json::from_str(&text).map_err(|e| ForumError::Decode(e.to_string()))?;
        wire.into_thread()
    }

    async fn modify_thread(
        &self,
        thread_id: Snowflake,
        title: &str,
        tags: &[Snowflake],
    ) -> ForumResult<()> {
        self.request(
            Method::PATCH,
            &format!("/channels/{}", thread_id),
            Some(thread_patch_body(title, tags)),
            "thread",
            thread_id,
        )
        .await?;
        Ok(())
    }

    async fn modify_thread_message(
        &self,
        thread_id: Snowflake,
        content: &ThreadContent,
    ) -> ForumResult<()> {
        // The starter message of a forum thread shares the thread's id.
        self.request(
            Method::PATCH,
            &format!("/channels/{}/messages/{}", thread_id, thread_id),
            Some(message_body(content)),
            "thread",
            thread_id,
        )
        .await?;
        Ok(())
    }

    async fn delete_thread(&self, thread_id: Snowflake) -> ForumResult<()> {
        self.request(
            Method::DELETE,
            &format!("/channels/{}", thread_id),
            None,
            "thread",
            thread_id,
        )
        .await?;
        Ok(())
    }

    async fn send_message(
        &self,
        channel_id: Snowflake,
        content: &str,
        broadcast: bool,
    ) -> ForumResult<()> {
        let parse: Vec<&str> = if broadcast { vec!["everyone"] } else { vec![] };
        let body = json!({
            "content": content,
            "allowed_mentions": { "parse": parse },
        });
        self.request(
            Method::POST,
            &format!("/channels/{}/messages", channel_id),
            Some(body),
            "channel",
            channel_id,
        )
        .await?;
        Ok(())
    }
}
