use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// External platform id (Discord snowflake).
pub type Snowflake = u64;

/// A catalog resource mirrored as a forum thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub author: String,
    pub description: Option<String>,
    pub discord_url: Option<String>,
    pub website_url: Option<String>,
    pub icon_url: Option<String>,
    pub rating: f32,
    pub is_compromised: bool,
    /// Ordered, duplicate-free catalog tag ids.
    pub tag_ids: Vec<String>,
    pub created_by_user_id: Option<String>,
    pub updated_by_user_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    pub fn carries_any_tag(&self, tag_ids: &[String]) -> bool {
        self.tag_ids.iter().any(|t| tag_ids.contains(t))
    }
}

/// A catalog classification tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTag {
    pub id: String,
    pub name: String,
    pub description: String,
    pub color_hex: String,
}

impl ResourceTag {
    /// Key used to match catalog tags with forum tags: trimmed and case-folded.
    pub fn match_key(&self) -> String {
        normalize_tag_name(&self.name)
    }
}

pub fn normalize_tag_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Local record of the forum thread believed to mirror a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedThread {
    /// External thread id.
    pub id: Snowflake,
    pub resource_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncedThread {
    /// Record for a thread that was just synced from `resource`.
    ///
    /// `updated_at` never trails the resource, even when clocks disagree.
    pub fn synced_now(id: Snowflake, resource: &Resource) -> Self {
        let now = Utc::now();
        Self {
            id,
            resource_id: resource.id.clone(),
            created_at: now,
            updated_at: now.max(resource.updated_at),
        }
    }

    pub fn touched(&self, resource: &Resource) -> Self {
        Self {
            updated_at: Utc::now().max(resource.updated_at),
            ..self.clone()
        }
    }

    /// Up to date means the thread was synced at or after the last resource change.
    pub fn is_stale_for(&self, resource: &Resource) -> bool {
        resource.updated_at > self.updated_at
    }
}

/// Local association between a forum tag and a catalog tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMapping {
    /// External tag id, unique across mappings.
    pub id: Snowflake,
    pub resource_tag_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TagMapping {
    pub fn new(id: Snowflake, resource_tag_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            resource_tag_id: resource_tag_id.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
