pub mod catalog_events;
pub mod forum_sync;
pub mod presentation;

pub use catalog_events::CatalogEventPublisher;
pub use forum_sync::{ForumSync, ForumTarget, SyncOutcome};
