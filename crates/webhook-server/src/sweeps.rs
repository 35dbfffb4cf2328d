//! Scheduled retention sweeps.
//!
//! One pass deletes old ledger rows for every provider, expired receipt
//! images and expired conversation states. A failing step is logged and the
//! pass moves on.

use std::time::Duration;

use chrono::Utc;
use database::{conversation_state, webhook_event, Database};
use pipeline::{MediaArchive, DEFAULT_SWEEP_LIMIT};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::ledger::PROVIDERS;

/// Counts from one sweep pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    pub webhook_events_deleted: u64,
    pub media_deleted: usize,
    pub media_failed: usize,
    pub conversations_purged: u64,
}

/// Run one sweep pass.
pub async fn run_once(db: &Database, media: &MediaArchive, webhook_retention_days: i64) -> SweepSummary {
    let mut summary = SweepSummary::default();

    for provider in PROVIDERS {
        match webhook_event::cleanup_old(db.pool(), provider, webhook_retention_days).await {
            Ok(deleted) => summary.webhook_events_deleted += deleted,
            Err(e) => warn!(provider, error = %e, "sweep.webhook_cleanup_failed"),
        }
    }

    match media.sweep(Utc::now(), DEFAULT_SWEEP_LIMIT).await {
        Ok(report) => {
            summary.media_deleted = report.deleted;
            summary.media_failed = report.failed;
        }
        Err(e) => warn!(error = %e, "sweep.media_failed"),
    }

    match conversation_state::purge_expired(db.pool()).await {
        Ok(purged) => summary.conversations_purged = purged,
        Err(e) => warn!(error = %e, "sweep.conversation_purge_failed"),
    }

    info!(
        webhook_events_deleted = summary.webhook_events_deleted,
        media_deleted = summary.media_deleted,
        media_failed = summary.media_failed,
        conversations_purged = summary.conversations_purged,
        "sweep.completed"
    );
    summary
}

/// Run [`run_once`] every `every`, starting immediately.
pub fn spawn(db: Database, media: MediaArchive, every: Duration, webhook_retention_days: i64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            run_once(&db, &media, webhook_retention_days).await;
        }
    })
}
