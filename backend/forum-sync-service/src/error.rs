use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;
pub type ForumResult<T> = std::result::Result<T, ForumError>;
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Failures of the catalog and sync-state stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness rule was violated, e.g. a second thread record for one resource.
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Failures reported by the external forum platform.
#[derive(Debug, Error)]
pub enum ForumError {
    #[error("{kind} {id} not found on forum")]
    NotFound { kind: &'static str, id: u64 },

    /// Transport failure; the platform could not be reached.
    #[error("Forum unavailable: {0}")]
    Unavailable(String),

    #[error("Forum API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode forum response: {0}")]
    Decode(String),
}

impl ForumError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ForumError::NotFound { .. })
    }
}

impl From<reqwest::Error> for ForumError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ForumError::Decode(err.to_string())
        } else {
            ForumError::Unavailable(err.to_string())
        }
    }
}

/// Typed failure of a sync operation. Nothing raw escapes the sync facade.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Resource {0} not found")]
    ResourceNotFound(String),

    #[error("No synced thread recorded for resource {0}")]
    ThreadRecordNotFound(String),

    #[error("Guild {0} not found")]
    GuildNotFound(u64),

    #[error("Forum channel {0} not found")]
    ForumChannelNotFound(u64),

    #[error("Channel {0} not found")]
    ChannelNotFound(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Forum(#[from] ForumError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    pub fn is_not_found(&self) -> bool {
        match self {
            SyncError::ResourceNotFound(_)
            | SyncError::ThreadRecordNotFound(_)
            | SyncError::GuildNotFound(_)
            | SyncError::ForumChannelNotFound(_)
            | SyncError::ChannelNotFound(_) => true,
            SyncError::Forum(err) => err.is_not_found(),
            _ => false,
        }
    }

    /// The external target itself is missing; retrying cannot help until config changes.
    pub fn is_fatal_configuration(&self) -> bool {
        matches!(
            self,
            SyncError::GuildNotFound(_)
                | SyncError::ForumChannelNotFound(_)
                | SyncError::Configuration(_)
        )
    }
}

/// Start-up configuration failures. Raised before any worker starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_classification() {
        assert!(SyncError::ResourceNotFound("m1".into()).is_not_found());
        assert!(SyncError::Forum(ForumError::NotFound {
            kind: "thread",
            id: 1
        })
        .is_not_found());
        assert!(!SyncError::Forum(ForumError::Unavailable("timeout".into())).is_not_found());
    }

    #[test]
    fn missing_container_is_fatal_configuration() {
        assert!(SyncError::ForumChannelNotFound(10).is_fatal_configuration());
        assert!(!SyncError::ResourceNotFound("m1".into()).is_fatal_configuration());
    }
}
