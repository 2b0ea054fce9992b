//! Background re-evaluation of users whose badge checks failed

use std::sync::Arc;
use std::time::Duration;

use common::{Error, Result};
use db::KarmaStore;
use serde::Serialize;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::badges::BadgeEvaluator;

/// Configuration for the reconciler
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Interval between sweeps
    pub interval: Duration,
    /// Users taken from the queue per sweep
    pub batch: i64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            batch: 100,
        }
    }
}

/// Result of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileStats {
    pub checked: usize,
    pub cleared: usize,
    pub awarded: usize,
    pub still_pending: usize,
}

/// Drains the pending-evaluation queue so no earned badge stays missing
pub struct Reconciler {
    store: Arc<dyn KarmaStore>,
    evaluator: BadgeEvaluator,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn KarmaStore>,
        evaluator: BadgeEvaluator,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            store,
            evaluator,
            config,
        }
    }

    /// Start the background loop
    pub async fn run(self) {
        info!(
            "Starting reconciler (interval: {:?}, batch: {})",
            self.config.interval, self.config.batch
        );

        let mut ticker = interval(self.config.interval);

        // First tick fires immediately; leave it to startup
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match self.sweep().await {
                Ok(stats) if stats.checked > 0 => info!(
                    "Reconciled {} users: {} cleared, {} badges awarded, {} still pending",
                    stats.checked, stats.cleared, stats.awarded, stats.still_pending
                ),
                Ok(_) => {}
                Err(e) => error!("Reconcile sweep failed: {}", e),
            }
        }
    }

    /// Re-evaluate one batch of queued users
    pub async fn sweep(&self) -> Result<ReconcileStats> {
        let users = self.store.pending_users(self.config.batch).await?;
        let mut stats = ReconcileStats::default();

        for user_id in users {
            stats.checked += 1;
            match self.evaluator.evaluate_and_clear(user_id).await {
                Ok(evaluation) => {
                    stats.awarded += evaluation.awarded.len();
                    if evaluation.is_complete() {
                        stats.cleared += 1;
                    } else {
                        warn!(
                            "User {} still has failing awards: {}",
                            user_id,
                            evaluation.failed.join(", ")
                        );
                        stats.still_pending += 1;
                    }
                }
                Err(Error::NotFound(_)) => {
                    self.store.clear_pending(user_id).await?;
                    stats.cleared += 1;
                }
                Err(e) => {
                    warn!("Re-evaluation of {} failed: {}", user_id, e);
                    stats.still_pending += 1;
                }
            }
        }

        Ok(stats)
    }
}
