//! End-to-end behaviour of the sync engine over in-memory backends.

use chrono::{Duration as ChronoDuration, Utc};
use event_schema::{streams, ForceSyncEvent, ResourceEvent};
use event_stream::{EventConsumer, EventLog, EventProducer, MemoryEventLog};
use forum_sync_service::error::{StoreError, SyncError};
use forum_sync_service::forum::MemoryForum;
use forum_sync_service::handlers::{
    ForceSyncHandler, PollOutcome, ResourceEventHandler, StreamWorker, FORCE_SYNC_GROUP,
    RESOURCE_SYNC_GROUP,
};
use forum_sync_service::jobs::ReconcileJob;
use forum_sync_service::models::{Resource, ResourceTag, SyncedThread};
use forum_sync_service::store::{MemoryStore, SyncStateStore};
use forum_sync_service::{CatalogEventPublisher, ForumSync, ForumTarget, SyncOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const GUILD: u64 = 100;
const FORUM: u64 = 200;
const NOTIFY: u64 = 300;
const UPDATES: u64 = 400;

struct Harness {
    log: Arc<MemoryEventLog>,
    store: Arc<MemoryStore>,
    forum: Arc<MemoryForum>,
    sync: ForumSync,
    publisher: CatalogEventPublisher,
}

fn harness() -> Harness {
    let log = Arc::new(MemoryEventLog::new());
    let store = Arc::new(MemoryStore::new());
    let forum = Arc::new(MemoryForum::new());
    forum.add_guild(GUILD);
    forum.add_forum_channel(GUILD, FORUM);
    forum.add_text_channel(NOTIFY);
    forum.add_text_channel(UPDATES);

    let sync = ForumSync::new(
        forum.clone(),
        store.clone(),
        store.clone(),
        ForumTarget {
            guild_id: GUILD,
            forum_channel_id: FORUM,
        },
    );
    let publisher = CatalogEventPublisher::new(EventProducer::new(log.clone()));
    Harness {
        log,
        store,
        forum,
        sync,
        publisher,
    }
}

fn resource(id: &str, name: &str, tag_ids: &[&str]) -> Resource {
    let changed = Utc::now() - ChronoDuration::minutes(10);
    Resource {
        id: id.to_string(),
        name: name.to_string(),
        author: "Ana".to_string(),
        description: Some("A resource".to_string()),
        discord_url: Some("https://discord.gg/example".to_string()),
        website_url: None,
        icon_url: None,
        rating: 4.0,
        is_compromised: false,
        tag_ids: tag_ids.iter().map(|t| t.to_string()).collect(),
        created_by_user_id: Some("11".to_string()),
        updated_by_user_ids: vec![],
        created_at: changed,
        updated_at: changed,
    }
}

async fn resource_worker(h: &Harness, update_channel: Option<u64>) -> StreamWorker<ResourceEvent> {
    StreamWorker::start(
        streams::RESOURCES,
        RESOURCE_SYNC_GROUP,
        EventConsumer::new(h.log.clone()),
        Arc::new(ResourceEventHandler::new(h.sync.clone(), update_channel)),
        Duration::from_millis(10),
    )
    .await
    .unwrap()
}

async fn force_sync_worker(h: &Harness) -> StreamWorker<ForceSyncEvent> {
    StreamWorker::start(
        streams::FORCE_SYNC,
        FORCE_SYNC_GROUP,
        EventConsumer::new(h.log.clone()),
        Arc::new(ForceSyncHandler::new(h.sync.clone())),
        Duration::from_millis(10),
    )
    .await
    .unwrap()
}

fn reconcile(h: &Harness) -> ReconcileJob {
    ReconcileJob::new(h.sync.clone(), NOTIFY)
}

#[tokio::test]
async fn created_resource_gets_thread_and_out_of_band_delete_is_repaired() {
    let h = harness();
    h.store.put_resource(resource("m1", "Foo", &["t1"]));
    let worker = resource_worker(&h, None).await;

    h.publisher.resource_created("m1").await.unwrap();
    assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Handled);

    let records = h.store.threads();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].resource_id, "m1");
    let original = records[0].id;
    assert_eq!(h.forum.threads()[0].name, "Foo");

    assert!(h.forum.remove_thread(original));
    let report = reconcile(&h).sweep().await;
    assert!(report.is_clean(), "{}", report.error_text());
    assert_eq!(report.pruned.repaired, 1);
    assert_eq!(report.created.repaired, 1);

    let records = h.store.threads();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].resource_id, "m1");
    assert_ne!(records[0].id, original);
    let live = h.forum.threads();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, records[0].id);
    assert_eq!(live[0].name, "Foo");
}

#[tokio::test]
async fn repeated_sync_of_unchanged_resource_creates_one_thread() {
    let h = harness();
    h.store.put_resource(resource("m1", "Foo", &[]));

    let first = h.sync.create_or_update("m1").await.unwrap();
    let second = h.sync.create_or_update("m1").await.unwrap();

    assert!(matches!(first, SyncOutcome::Created { .. }));
    assert_eq!(second, SyncOutcome::Updated { thread_id: first.thread_id().unwrap() });
    assert_eq!(h.forum.threads_created(), 1);
    assert_eq!(h.store.threads().len(), 1);
    // title and tags unchanged, only the message body is re-applied
    assert_eq!(h.forum.thread_modifications(), 0);
    assert_eq!(h.forum.message_modifications(), 1);
}

#[tokio::test]
async fn failed_event_stays_pending_and_is_not_redelivered() {
    let h = harness();
    h.store.put_resource(resource("m1", "Foo", &[]));
    let worker = resource_worker(&h, None).await;

    h.forum.set_unavailable(true);
    h.publisher.resource_created("m1").await.unwrap();
    assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Failed);
    assert_eq!(
        h.log
            .pending_count(streams::RESOURCES.name(), RESOURCE_SYNC_GROUP)
            .await
            .unwrap(),
        1
    );

    h.forum.set_unavailable(false);
    assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Idle);
    assert!(h.store.threads().is_empty());

    // the sweep is what repairs the missed event
    reconcile(&h).sweep().await;
    assert_eq!(h.store.threads().len(), 1);

    h.publisher.resource_created("m1").await.unwrap();
    assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Handled);
    assert_eq!(
        h.log
            .pending_count(streams::RESOURCES.name(), RESOURCE_SYNC_GROUP)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn sweep_updates_stale_thread() {
    let h = harness();
    h.store.put_resource(resource("m1", "Foo", &[]));
    h.sync.create_or_update("m1").await.unwrap();

    let mut changed = resource("m1", "Bar", &[]);
    changed.updated_at = Utc::now() + ChronoDuration::hours(1);
    h.store.put_resource(changed.clone());

    let report = reconcile(&h).sweep().await;
    assert_eq!(report.updated.repaired, 1);

    let record = h.store.threads().remove(0);
    assert!(record.updated_at >= changed.updated_at);
    assert_eq!(h.forum.threads()[0].name, "Bar");

    // now up to date: a second sweep leaves it alone
    let modifications = h.forum.message_modifications();
    let report = reconcile(&h).sweep().await;
    assert_eq!(report.repaired(), 0);
    assert_eq!(h.forum.message_modifications(), modifications);
}

#[tokio::test]
async fn new_forum_tag_is_mapped_and_removal_only_drops_mapping() {
    let h = harness();
    h.forum.add_tag(FORUM, 501, "Utility");
    h.store.put_tag(ResourceTag {
        id: "t1".into(),
        name: " utility ".into(),
        description: String::new(),
        color_hex: "#00ff00".into(),
    });
    h.store.put_resource(resource("m1", "Foo", &["t1"]));

    reconcile(&h).sweep().await;
    let mappings = h.store.mappings();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].id, 501);
    assert_eq!(mappings[0].resource_tag_id, "t1");
    assert_eq!(h.forum.threads()[0].applied_tags, vec![501]);

    h.forum.remove_tag(FORUM, 501);
    let modifications = h.forum.thread_modifications();
    let report = reconcile(&h).sweep().await;
    assert_eq!(report.tags.repaired, 1);
    assert!(h.store.mappings().is_empty());
    assert_eq!(h.forum.thread_modifications(), modifications);
    assert_eq!(h.forum.threads()[0].applied_tags, vec![501]);
}

fn forum_tags_of(h: &Harness, resource_id: &str) -> Vec<u64> {
    let record = h
        .store
        .threads()
        .into_iter()
        .find(|t| t.resource_id == resource_id)
        .unwrap();
    h.forum
        .threads()
        .into_iter()
        .find(|t| t.id == record.id)
        .unwrap()
        .applied_tags
}

#[tokio::test]
async fn mapping_of_deleted_catalog_tag_is_replaced_by_same_named_tag() {
    let h = harness();
    h.forum.add_tag(FORUM, 501, "Utility");
    h.store.put_tag(ResourceTag {
        id: "t1".into(),
        name: "Utility".into(),
        description: String::new(),
        color_hex: "#00ff00".into(),
    });
    h.store.put_resource(resource("m1", "Foo", &["t1"]));
    reconcile(&h).sweep().await;
    assert_eq!(forum_tags_of(&h, "m1"), vec![501]);

    h.store.remove_tag("t1");
    h.store.put_tag(ResourceTag {
        id: "t9".into(),
        name: "utility".into(),
        description: String::new(),
        color_hex: "#0000ff".into(),
    });
    h.store.put_resource(resource("m1", "Foo", &["t9"]));
    h.store.put_resource(resource("m2", "Bar", &["t9"]));

    let report = reconcile(&h).sweep().await;
    assert!(report.is_clean(), "{}", report.error_text());

    let mappings: Vec<(u64, String)> = h
        .store
        .mappings()
        .into_iter()
        .map(|m| (m.id, m.resource_tag_id))
        .collect();
    assert_eq!(mappings, vec![(501, "t9".to_string())]);
    assert_eq!(forum_tags_of(&h, "m1"), vec![501]);
    assert_eq!(forum_tags_of(&h, "m2"), vec![501]);

    // stable once both sides agree
    let report = reconcile(&h).sweep().await;
    assert_eq!(report.tags.repaired, 0);
}

#[tokio::test]
async fn mapping_of_deleted_catalog_tag_without_replacement_is_removed() {
    let h = harness();
    h.forum.add_tag(FORUM, 501, "Utility");
    h.store.put_tag(ResourceTag {
        id: "t1".into(),
        name: "Utility".into(),
        description: String::new(),
        color_hex: "#00ff00".into(),
    });
    reconcile(&h).sweep().await;
    assert_eq!(h.store.mappings().len(), 1);

    h.store.remove_tag("t1");
    let report = reconcile(&h).sweep().await;
    assert!(report.is_clean(), "{}", report.error_text());
    assert_eq!(report.tags.repaired, 1);
    assert!(h.store.mappings().is_empty());
}

#[tokio::test]
async fn update_of_archived_thread_unarchives_it_first() {
    let h = harness();
    h.store.put_resource(resource("m1", "Foo", &[]));
    let thread_id = h
        .sync
        .create_or_update("m1")
        .await
        .unwrap()
        .thread_id()
        .unwrap();
    assert!(h.forum.archive_thread(thread_id));

    let mut changed = resource("m1", "Foo", &[]);
    changed.description = Some("Now with more features".to_string());
    changed.updated_at = Utc::now() + ChronoDuration::hours(1);
    h.store.put_resource(changed);

    let report = reconcile(&h).sweep().await;
    assert!(report.is_clean(), "{}", report.error_text());
    assert_eq!(report.updated.repaired, 1);
    assert_eq!(report.created.repaired, 0);

    let live = h.forum.threads();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, thread_id);
    assert!(!live[0].archived);
    assert!(h
        .forum
        .content(thread_id)
        .unwrap()
        .body
        .contains("Now with more features"));
}

#[tokio::test]
async fn delete_event_removes_thread_and_repeats_cleanly() {
    let h = harness();
    h.store.put_resource(resource("m1", "Foo", &[]));
    h.sync.create_or_update("m1").await.unwrap();
    let worker = resource_worker(&h, None).await;

    h.store.remove_resource("m1");
    h.publisher.resource_deleted("m1").await.unwrap();
    h.publisher.resource_deleted("m1").await.unwrap();
    assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Handled);
    assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Handled);

    assert!(h.store.threads().is_empty());
    assert!(h.forum.threads().is_empty());
}

#[tokio::test]
async fn deleting_thread_already_gone_from_forum_succeeds() {
    let h = harness();
    h.store.put_resource(resource("m1", "Foo", &[]));
    let created = h.sync.create_or_update("m1").await.unwrap();
    let thread_id = created.thread_id().unwrap();
    h.forum.remove_thread(thread_id);

    let outcome = h.sync.delete_resource_thread("m1").await.unwrap();
    assert_eq!(outcome, SyncOutcome::Deleted { thread_id });
    assert!(h.store.threads().is_empty());
}

#[tokio::test]
async fn update_of_vanished_thread_recreates_it() {
    let h = harness();
    h.store.put_resource(resource("m1", "Foo", &[]));
    let created = h.sync.create_or_update("m1").await.unwrap();
    h.forum.remove_thread(created.thread_id().unwrap());

    let outcome = h.sync.create_or_update("m1").await.unwrap();
    assert!(matches!(outcome, SyncOutcome::Recreated { .. }));
    assert_eq!(h.store.threads().len(), 1);
    assert_eq!(h.forum.threads().len(), 1);
}

#[tokio::test]
async fn compromised_event_broadcasts_notice() {
    let h = harness();
    h.store.put_resource(resource("m1", "Foo", &[]));
    let worker = resource_worker(&h, Some(UPDATES)).await;

    let mut compromised = resource("m1", "Foo", &[]);
    compromised.is_compromised = true;
    h.publisher
        .resource_updated(&resource("m1", "Foo", &[]), &compromised)
        .await
        .unwrap();
    h.store.put_resource(compromised);

    assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Handled);
    assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Handled);

    let sent = h.forum.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].channel_id, UPDATES);
    assert!(sent[0].broadcast);
    assert!(sent[0].content.contains("*Foo* has been marked as compromised"));
}

#[tokio::test]
async fn compromised_event_without_update_channel_fails() {
    let h = harness();
    h.store.put_resource(resource("m1", "Foo", &[]));
    let worker = resource_worker(&h, None).await;

    h.log
        .append(
            streams::RESOURCES.name(),
            r#"{"resource_id":"m1","event_type":"compromised"}"#.to_string(),
        )
        .await
        .unwrap();
    assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Failed);
    assert!(h.forum.sent_messages().is_empty());
}

#[tokio::test]
async fn conflicting_record_removes_new_thread() {
    let h = harness();
    let r = resource("m1", "Foo", &[]);
    h.store.put_resource(r.clone());
    h.store.race_next_thread_insert(SyncedThread::synced_now(9, &r));

    let err = h.sync.create(&r).await.unwrap_err();
    assert!(matches!(err, SyncError::Store(StoreError::Conflict(_))));
    assert!(h.forum.threads().is_empty());
    assert_eq!(h.store.threads()[0].id, 9);
}

#[tokio::test]
async fn missing_forum_channel_is_fatal_for_create() {
    let h = harness();
    h.store.put_resource(resource("m1", "Foo", &[]));
    let sync = ForumSync::new(
        h.forum.clone(),
        h.store.clone(),
        h.store.clone(),
        ForumTarget {
            guild_id: GUILD,
            forum_channel_id: 999,
        },
    );

    let err = sync.create_or_update("m1").await.unwrap_err();
    assert!(err.is_fatal_configuration());
    assert_eq!(h.forum.threads_created(), 0);
}

#[tokio::test]
async fn missing_resource_is_not_found() {
    let h = harness();
    let err = h.sync.create_or_update("nope").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn sweep_failure_is_reported_to_notification_channel() {
    let h = harness();
    h.store.put_resource(resource("m1", "Foo", &[]));
    let job = ReconcileJob::new(
        ForumSync::new(
            h.forum.clone(),
            h.store.clone(),
            h.store.clone(),
            ForumTarget {
                guild_id: GUILD,
                forum_channel_id: 999,
            },
        ),
        NOTIFY,
    );

    let report = job.run_once().await;
    assert!(!report.is_clean());

    let sent = h.forum.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].channel_id, NOTIFY);
    assert!(!sent[0].broadcast);
    assert!(sent[0].content.contains("Forum channel 999 not found"));
}

#[tokio::test]
async fn sweep_deletes_thread_of_removed_resource() {
    let h = harness();
    h.store.put_resource(resource("m1", "Foo", &[]));
    h.sync.create_or_update("m1").await.unwrap();
    h.store.remove_resource("m1");

    let report = reconcile(&h).sweep().await;
    assert_eq!(report.updated.repaired, 1);
    assert!(h.store.threads().is_empty());
    assert!(h.forum.threads().is_empty());
}

#[tokio::test]
async fn force_sync_creates_missing_thread() {
    let h = harness();
    h.store.put_resource(resource("m1", "Foo", &[]));
    let worker = force_sync_worker(&h).await;

    h.publisher.request_sync("m1").await.unwrap();
    assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Handled);
    assert_eq!(h.store.threads().len(), 1);
    assert_eq!(
        h.log
            .pending_count(streams::FORCE_SYNC.name(), FORCE_SYNC_GROUP)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn events_before_group_creation_are_not_seen() {
    let h = harness();
    h.store.put_resource(resource("m1", "Foo", &[]));
    h.publisher.resource_created("m1").await.unwrap();

    let worker = resource_worker(&h, None).await;
    assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Idle);
    assert!(h.store.threads().is_empty());
}

#[tokio::test]
async fn poison_entry_is_dropped_and_acknowledged() {
    let h = harness();
    let worker = resource_worker(&h, None).await;

    h.log.append_without_data(streams::RESOURCES.name());
    h.log
        .append(streams::RESOURCES.name(), "not json".to_string())
        .await
        .unwrap();

    assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Idle);
    assert_eq!(worker.poll_once().await.unwrap(), PollOutcome::Idle);
    assert_eq!(
        h.log
            .pending_count(streams::RESOURCES.name(), RESOURCE_SYNC_GROUP)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn worker_stops_on_shutdown() {
    let h = harness();
    h.store.put_resource(resource("m1", "Foo", &[]));
    let worker = resource_worker(&h, None).await;
    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(worker.run(rx));

    h.publisher.resource_created("m1").await.unwrap();
    for _ in 0..50 {
        if !h.store.threads().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(h.store.threads().len(), 1);

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("worker did not stop")
        .unwrap();
}

#[tokio::test]
async fn sweep_job_stops_on_shutdown() {
    let h = harness();
    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(reconcile(&h).run(Duration::from_secs(3600), rx));

    tokio::time::sleep(Duration::from_millis(20)).await;
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("job did not stop")
        .unwrap();
}

#[tokio::test]
async fn store_reports_missing_record_on_delete() {
    let h = harness();
    assert!(!h.store.delete_thread(12345).await.unwrap());
}
