//! Scheduled retention sweeps.
//!
//! Three independent background jobs: purging withdrawn applications past the
//! retention window, cascading away postings whose deadline expired past the
//! window, and reclaiming snapshot blobs no live row references. Each job is
//! idempotent, catches failures per item, and never propagates an error to a
//! caller (sweeps have none). The jobs run daily at distinct UTC hours so
//! they stay offset from each other on shared tables.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::ApplicationStatus;
use crate::storage::blobs::BlobStore;
use crate::storage::Database;

use super::deletion::cascade_posting;
use super::LifecycleError;

/// How long terminal or expired records are retained before a sweep removes
/// them.
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub window_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { window_days: 15 }
    }
}

/// Daily UTC anchor hours for the three jobs, offset from each other to
/// avoid lock contention on shared tables.
#[derive(Debug, Clone, Copy)]
pub struct SweepSchedule {
    pub withdrawn_hour: u32,
    pub expired_hour: u32,
    pub orphan_hour: u32,
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self {
            withdrawn_hour: 2,
            expired_hour: 4,
            orphan_hour: 3,
        }
    }
}

/// What one sweep run looked at and removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub examined: usize,
    pub removed: usize,
}

/// Background pruning of expired and terminal records plus orphaned blobs.
pub struct RetentionSweeper<B> {
    db: Arc<Database>,
    blobs: Arc<B>,
    policy: RetentionPolicy,
}

impl<B: BlobStore> RetentionSweeper<B> {
    pub fn new(db: Arc<Database>, blobs: Arc<B>, policy: RetentionPolicy) -> Self {
        Self { db, blobs, policy }
    }

    /// Bulk-delete `Withdrawn` applications whose `updated_at` is older than
    /// the retention window, removing their disclosure answers in the same
    /// pass. Applications are leaves apart from those answers, so no wider
    /// cascade is needed.
    pub fn purge_withdrawn(&self, now: DateTime<Utc>) -> Result<SweepOutcome, LifecycleError> {
        let cutoff = now - Duration::days(self.policy.window_days);
        self.db.transaction(|tables| {
            let expired: std::collections::BTreeSet<_> = tables
                .applications
                .values()
                .filter(|app| {
                    app.status == ApplicationStatus::Withdrawn && app.updated_at < cutoff
                })
                .map(|app| app.id.clone())
                .collect();
            let examined = tables
                .applications
                .values()
                .filter(|app| app.status == ApplicationStatus::Withdrawn)
                .count();

            tables
                .answers
                .retain(|_, answer| !expired.contains(&answer.application));
            tables.applications.retain(|_, app| !expired.contains(&app.id));

            Ok(SweepOutcome {
                examined,
                removed: expired.len(),
            })
        })
    }

    /// Run the full posting cascade for postings whose application deadline
    /// lies more than the retention window in the past. One transaction per
    /// posting so one bad row never aborts the whole sweep.
    pub fn purge_expired_postings(&self, now: DateTime<Utc>) -> SweepOutcome {
        let cutoff = now.date_naive() - Duration::days(self.policy.window_days);
        let expired = self.db.read(|tables| {
            tables
                .postings
                .values()
                .filter(|posting| matches!(posting.deadline, Some(deadline) if deadline < cutoff))
                .map(|posting| posting.id.clone())
                .collect::<Vec<_>>()
        });

        let mut removed = 0;
        for posting in &expired {
            let result: Result<(), LifecycleError> = self.db.transaction(|tables| {
                cascade_posting(tables, posting);
                Ok(())
            });
            match result {
                Ok(()) => removed += 1,
                Err(err) => {
                    warn!(posting = %posting, error = %err, "expired-posting purge skipped item");
                }
            }
        }

        SweepOutcome {
            examined: expired.len(),
            removed,
        }
    }

    /// Delete snapshot blobs that no live row references any more. This is
    /// the designated recovery path for blobs stranded by cascaded deletions
    /// or by transactions that failed after an upload.
    pub fn reclaim_orphan_blobs(&self) -> Result<SweepOutcome, LifecycleError> {
        let snapshots = self.blobs.snapshots()?;
        let examined = snapshots.len();

        let mut removed = 0;
        for handle in snapshots {
            if self.db.read(|tables| tables.blob_in_use(&handle)) {
                continue;
            }
            match self.blobs.delete(&handle) {
                Ok(()) => removed += 1,
                Err(err) => {
                    warn!(blob = %handle, error = %err, "orphan reclamation skipped item");
                }
            }
        }

        Ok(SweepOutcome { examined, removed })
    }
}

impl<B: BlobStore + 'static> RetentionSweeper<B> {
    /// Spawn the three daily jobs. Each task is independently anchored to
    /// its configured UTC hour and isolates its own failures.
    pub fn spawn_daily(self: Arc<Self>, schedule: SweepSchedule) -> Vec<JoinHandle<()>> {
        let withdrawn = {
            let sweeper = Arc::clone(&self);
            spawn_daily_job("withdrawn-application purge", schedule.withdrawn_hour, move || {
                match sweeper.purge_withdrawn(Utc::now()) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(error = %err, "withdrawn-application purge failed");
                        SweepOutcome::default()
                    }
                }
            })
        };
        let expired = {
            let sweeper = Arc::clone(&self);
            spawn_daily_job("expired-posting purge", schedule.expired_hour, move || {
                sweeper.purge_expired_postings(Utc::now())
            })
        };
        let orphans = {
            let sweeper = self;
            spawn_daily_job("orphan-blob reclamation", schedule.orphan_hour, move || {
                match sweeper.reclaim_orphan_blobs() {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(error = %err, "orphan-blob reclamation failed");
                        SweepOutcome::default()
                    }
                }
            })
        };

        vec![withdrawn, expired, orphans]
    }
}

fn spawn_daily_job(
    name: &'static str,
    hour: u32,
    run: impl Fn() -> SweepOutcome + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay_until_utc_hour(Utc::now(), hour)).await;
        let mut ticker = tokio::time::interval(StdDuration::from_secs(24 * 60 * 60));
        loop {
            ticker.tick().await;
            let outcome = run();
            info!(
                job = name,
                examined = outcome.examined,
                removed = outcome.removed,
                "retention sweep finished"
            );
        }
    })
}

/// Time until the next occurrence of `hour:00` UTC, strictly in the future.
pub fn delay_until_utc_hour(now: DateTime<Utc>, hour: u32) -> StdDuration {
    let anchor_time = NaiveTime::from_hms_opt(hour % 24, 0, 0).unwrap_or(NaiveTime::MIN);
    let today_anchor = now.date_naive().and_time(anchor_time).and_utc();
    let anchor = if today_anchor > now {
        today_anchor
    } else {
        today_anchor + Duration::days(1)
    };
    (anchor - now).to_std().unwrap_or(StdDuration::ZERO)
}
