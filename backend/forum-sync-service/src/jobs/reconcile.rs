//! Periodic full reconciliation between the catalog and the forum.

use crate::error::SyncResult;
use crate::metrics;
use crate::models::{normalize_tag_name, Snowflake, TagMapping};
use crate::services::{ForumSync, SyncOutcome};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

/// Result of one sweep step.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// Threads or mappings changed by the step.
    pub repaired: u64,
    /// Per-unit failures; the step moved on after each.
    pub failures: Vec<String>,
}

impl StepReport {
    fn fail(&mut self, unit: impl std::fmt::Display, err: impl std::fmt::Display) {
        self.failures.push(format!("{}: {}", unit, err));
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub tags: StepReport,
    pub pruned: StepReport,
    pub created: StepReport,
    pub updated: StepReport,
    /// Steps that could not run at all.
    pub aborted: Vec<String>,
}

impl SweepReport {
    pub fn repaired(&self) -> u64 {
        self.tags.repaired + self.pruned.repaired + self.created.repaired + self.updated.repaired
    }

    pub fn is_clean(&self) -> bool {
        self.aborted.is_empty()
            && self.tags.failures.is_empty()
            && self.pruned.failures.is_empty()
            && self.created.failures.is_empty()
            && self.updated.failures.is_empty()
    }

    /// Human-readable summary of everything that went wrong.
    pub fn error_text(&self) -> String {
        let mut lines: Vec<String> = self.aborted.clone();
        for (step, report) in [
            ("sync tags", &self.tags),
            ("prune missing threads", &self.pruned),
            ("create missing threads", &self.created),
            ("update existing threads", &self.updated),
        ] {
            for failure in &report.failures {
                lines.push(format!("{}: {}", step, failure));
            }
        }
        lines.join("\n")
    }
}

/// Sweeps on a fixed interval. Each step runs even if an earlier one failed;
/// failures are reported to the notification channel.
pub struct ReconcileJob {
    sync: ForumSync,
    notification_channel_id: Snowflake,
}

impl ReconcileJob {
    pub fn new(sync: ForumSync, notification_channel_id: Snowflake) -> Self {
        Self {
            sync,
            notification_channel_id,
        }
    }

    pub async fn run(self, every: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut timer = interval(every);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = every.as_secs(), "Starting reconcile job");

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    self.run_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Reconcile job stopped");
    }

    /// One sweep plus failure notification. Always completes.
    pub async fn run_once(&self) -> SweepReport {
        let start = Instant::now();
        let report = self.sweep().await;
        metrics::observe_sweep(report.is_clean(), report.repaired());

        if report.is_clean() {
            info!(
                repaired = report.repaired(),
                elapsed_ms = start.elapsed().as_millis(),
                "Sweep completed"
            );
        } else {
            let text = report.error_text();
            error!(
                repaired = report.repaired(),
                elapsed_ms = start.elapsed().as_millis(),
                errors = %text,
                "Sweep completed with errors"
            );
            let message = format!("Forum sync sweep failed:\n```\n{}\n```", text);
            if let Err(e) = self
                .sync
                .send(self.notification_channel_id, &message, false)
                .await
            {
                error!(
                    channel_id = self.notification_channel_id,
                    error = %e,
                    "Failed to send sweep failure notification"
                );
            }
        }
        report
    }

    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        match self.sync_tags().await {
            Ok(step) => report.tags = step,
            Err(e) => report.aborted.push(format!("sync tags: {}", e)),
        }
        match self.prune_missing_threads().await {
            Ok(step) => report.pruned = step,
            Err(e) => report.aborted.push(format!("prune missing threads: {}", e)),
        }
        match self.create_missing_threads().await {
            Ok(step) => report.created = step,
            Err(e) => report.aborted.push(format!("create missing threads: {}", e)),
        }
        match self.update_existing_threads().await {
            Ok(step) => report.updated = step,
            Err(e) => report.aborted.push(format!("update existing threads: {}", e)),
        }
        report
    }

    /// Drop mappings whose forum tag or catalog tag is gone, then map
    /// unmapped forum tags to catalog tags by name. Resources carrying a
    /// newly mapped tag are re-synced so the tag shows up; removals are not
    /// pushed to threads.
    pub async fn sync_tags(&self) -> SyncResult<StepReport> {
        let mut step = StepReport::default();
        let channel = self.sync.resolve_channel().await?;
        let live_ids: HashSet<Snowflake> = channel.available_tags.iter().map(|t| t.id).collect();

        let catalog_tags = self.sync.catalog().get_all_tags().await?;
        let catalog_ids: HashSet<&str> = catalog_tags.iter().map(|t| t.id.as_str()).collect();
        let by_name: HashMap<String, &str> = catalog_tags
            .iter()
            .map(|t| (t.match_key(), t.id.as_str()))
            .collect();

        let state = self.sync.state();
        let mut mapped: HashSet<Snowflake> = HashSet::new();
        for mapping in state.list_tag_mappings().await? {
            let forum_tag_live = live_ids.contains(&mapping.id);
            let catalog_tag_live = catalog_ids.contains(mapping.resource_tag_id.as_str());
            if forum_tag_live && catalog_tag_live {
                mapped.insert(mapping.id);
                continue;
            }
            match state.delete_tag_mapping(mapping.id).await {
                Ok(_) => {
                    info!(
                        tag_id = mapping.id,
                        resource_tag_id = %mapping.resource_tag_id,
                        forum_tag_live,
                        catalog_tag_live,
                        "Removed mapping for deleted tag"
                    );
                    step.repaired += 1;
                }
                Err(e) => {
                    // still mapped; do not remap it in this pass
                    mapped.insert(mapping.id);
                    step.fail(format!("mapping {}", mapping.id), e);
                }
            }
        }

        let mut newly_mapped: Vec<String> = Vec::new();
        for tag in channel
            .available_tags
            .iter()
            .filter(|t| !mapped.contains(&t.id))
        {
            let Some(&resource_tag_id) = by_name.get(&normalize_tag_name(&tag.name)) else {
                continue;
            };
            match state
                .upsert_tag_mapping(&TagMapping::new(tag.id, resource_tag_id))
                .await
            {
                Ok(()) => {
                    info!(tag_id = tag.id, resource_tag_id = %resource_tag_id, "Mapped forum tag");
                    newly_mapped.push(resource_tag_id.to_string());
                    step.repaired += 1;
                }
                Err(e) => step.fail(format!("forum tag {}", tag.id), e),
            }
        }

        if !newly_mapped.is_empty() {
            let resources = self
                .sync
                .catalog()
                .get_resources_by_any_tag(&newly_mapped)
                .await?;
            for resource in resources {
                if let Err(e) = self.sync.create_or_update(&resource.id).await {
                    step.fail(format!("resource {}", resource.id), e);
                }
            }
        }
        Ok(step)
    }

    /// Forget records whose thread no longer exists on the forum.
    pub async fn prune_missing_threads(&self) -> SyncResult<StepReport> {
        let mut step = StepReport::default();
        let target = self.sync.target();
        let live: HashSet<Snowflake> = self
            .sync
            .forum()
            .list_threads(target.guild_id, target.forum_channel_id)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();

        let state = self.sync.state();
        for record in state.list_threads().await? {
            if live.contains(&record.id) {
                continue;
            }
            match state.delete_thread(record.id).await {
                Ok(_) => {
                    warn!(
                        thread_id = record.id,
                        resource_id = %record.resource_id,
                        "Removed record of missing thread"
                    );
                    step.repaired += 1;
                }
                Err(e) => step.fail(format!("thread {}", record.id), e),
            }
        }
        Ok(step)
    }

    pub async fn create_missing_threads(&self) -> SyncResult<StepReport> {
        let mut step = StepReport::default();
        let recorded: HashSet<String> = self
            .sync
            .state()
            .list_threads()
            .await?
            .into_iter()
            .map(|t| t.resource_id)
            .collect();

        for resource in self.sync.catalog().get_all_resources().await? {
            if recorded.contains(&resource.id) {
                continue;
            }
            match self.sync.create(&resource).await {
                Ok(_) => step.repaired += 1,
                Err(e) => {
                    step.fail(format!("resource {}", resource.id), &e);
                    if e.is_fatal_configuration() {
                        break;
                    }
                }
            }
        }
        Ok(step)
    }

    /// Delete threads of removed resources and refresh stale ones.
    pub async fn update_existing_threads(&self) -> SyncResult<StepReport> {
        let mut step = StepReport::default();
        let resources: HashMap<String, _> = self
            .sync
            .catalog()
            .get_all_resources()
            .await?
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        for record in self.sync.state().list_threads().await? {
            let result = match resources.get(&record.resource_id) {
                None => self.sync.delete_thread(record.id).await,
                Some(resource) if record.is_stale_for(resource) => self.sync.update(resource).await,
                Some(_) => continue,
            };
            match result {
                Ok(SyncOutcome::AlreadyAbsent) => {}
                Ok(_) => step.repaired += 1,
                Err(e) => step.fail(format!("thread {}", record.id), e),
            }
        }
        Ok(step)
    }
}
