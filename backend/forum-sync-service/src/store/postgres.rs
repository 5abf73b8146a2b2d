use super::{CatalogStore, SyncStateStore};
use crate::error::{StoreError, StoreResult};
use crate::models::{Resource, ResourceTag, Snowflake, SyncedThread, TagMapping};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::PgPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

// Snowflakes are unsigned 64-bit; BIGINT columns hold their bit pattern.
fn to_db(id: Snowflake) -> i64 {
    id as i64
}

fn from_db(id: i64) -> Snowflake {
    id as Snowflake
}

#[derive(sqlx::FromRow)]
struct ResourceRow {
    id: String,
    name: String,
    author: String,
    description: Option<String>,
    discord_url: Option<String>,
    website_url: Option<String>,
    icon_url: Option<String>,
    rating: f32,
    is_compromised: bool,
    tag_ids: Vec<String>,
    created_by_user_id: Option<String>,
    updated_by_user_ids: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ResourceRow> for Resource {
    fn from(row: ResourceRow) -> Self {
        Resource {
            id: row.id,
            name: row.name,
            author: row.author,
            description: row.description,
            discord_url: row.discord_url,
            website_url: row.website_url,
            icon_url: row.icon_url,
            rating: row.rating,
            is_compromised: row.is_compromised,
            tag_ids: row.tag_ids,
            created_by_user_id: row.created_by_user_id,
            updated_by_user_ids: row.updated_by_user_ids,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TagRow {
    id: String,
    name: String,
    description: String,
    color_hex: String,
}

#[derive(sqlx::FromRow)]
struct ThreadRow {
    id: i64,
    resource_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ThreadRow> for SyncedThread {
    fn from(row: ThreadRow) -> Self {
        SyncedThread {
            id: from_db(row.id),
            resource_id: row.resource_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MappingRow {
    id: i64,
    resource_tag_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const RESOURCE_COLUMNS: &str = "id, name, author, description, discord_url, website_url, \
     icon_url, rating, is_compromised, tag_ids, created_by_user_id, updated_by_user_ids, \
     created_at, updated_at";

/// PostgreSQL-backed catalog reader and sync-state store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn get_resource(&self, id: &str) -> StoreResult<Option<Resource>> {
        let sql = format!("SELECT {} FROM resources WHERE id = $1", RESOURCE_COLUMNS);
        let row = sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Resource::from))
    }

    async fn get_resources_by_any_tag(&self, tag_ids: &[String]) -> StoreResult<Vec<Resource>> {
        if tag_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM resources WHERE tag_ids && $1 ORDER BY created_at",
            RESOURCE_COLUMNS
        );
        let rows = sqlx::query_as::<_, ResourceRow>(&sql)
            .bind(tag_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Resource::from).collect())
    }

    async fn get_all_resources(&self) -> StoreResult<Vec<Resource>> {
        let sql = format!("SELECT {} FROM resources ORDER BY created_at", RESOURCE_COLUMNS);
        let rows = sqlx::query_as::<_, ResourceRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Resource::from).collect())
    }

    async fn get_all_tags(&self) -> StoreResult<Vec<ResourceTag>> {
        let rows = sqlx::query_as::<_, TagRow>(
            "SELECT id, name, description, color_hex FROM resource_tags ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| ResourceTag {
                id: row.id,
                name: row.name,
                description: row.description,
                color_hex: row.color_hex,
            })
            .collect())
    }
}

#[async_trait]
impl SyncStateStore for PgStore {
    async fn get_thread_by_resource(&self, resource_id: &str) -> StoreResult<Option<SyncedThread>> {
        let row = sqlx::query_as::<_, ThreadRow>(
            "SELECT id, resource_id, created_at, updated_at FROM synced_threads WHERE resource_id = $1",
        )
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SyncedThread::from))
    }

    async fn list_threads(&self) -> StoreResult<Vec<SyncedThread>> {
        let rows = sqlx::query_as::<_, ThreadRow>(
            "SELECT id, resource_id, created_at, updated_at FROM synced_threads ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SyncedThread::from).collect())
    }

    async fn create_thread(&self, thread: &SyncedThread) -> StoreResult<()> {
        let result = sqlx::query(
            "INSERT INTO synced_threads (id, resource_id, created_at, updated_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(to_db(thread.id))
        .bind(&thread.resource_id)
        .bind(thread.created_at)
        .bind(thread.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(StoreError::Conflict(
                format!("resource {} already has a synced thread", thread.resource_id),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_thread(&self, thread: &SyncedThread) -> StoreResult<()> {
        sqlx::query("UPDATE synced_threads SET updated_at = $2 WHERE id = $1")
            .bind(to_db(thread.id))
            .bind(thread.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_thread(&self, id: Snowflake) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM synced_threads WHERE id = $1")
            .bind(to_db(id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_tag_mappings(&self) -> StoreResult<Vec<TagMapping>> {
        let rows = sqlx::query_as::<_, MappingRow>(
            "SELECT id, resource_tag_id, created_at, updated_at FROM tag_mappings",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| TagMapping {
                id: from_db(row.id),
                resource_tag_id: row.resource_tag_id,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
            .collect())
    }

    async fn upsert_tag_mapping(&self, mapping: &TagMapping) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tag_mappings (id, resource_tag_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET resource_tag_id = EXCLUDED.resource_tag_id,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(to_db(mapping.id))
        .bind(&mapping.resource_tag_id)
        .bind(mapping.created_at)
        .bind(mapping.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_tag_mapping(&self, id: Snowflake) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tag_mappings WHERE id = $1")
            .bind(to_db(id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snowflake_survives_bigint_column() {
        let large: Snowflake = u64::MAX - 7;
        assert_eq!(from_db(to_db(large)), large);
        assert_eq!(from_db(to_db(1_234_567_890_123)), 1_234_567_890_123);
    }
}
