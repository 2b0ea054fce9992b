//! Application state

use std::sync::Arc;
use std::time::Duration;

use common::{Config, LevelTable};
use db::KarmaStore;
use processor::catalog::BadgeCatalog;
use processor::{
    BadgeEvaluator, EventBus, KarmaLedger, LeaderboardAggregator, ReconcileConfig, Reconciler,
    UserLocks,
};

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn KarmaStore>,
    pub levels: Arc<LevelTable>,
    pub bus: EventBus,
    pub ledger: KarmaLedger,
    pub evaluator: BadgeEvaluator,
    pub catalog: BadgeCatalog,
    pub leaderboard: LeaderboardAggregator,
    pub reconciler: Reconciler,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn KarmaStore>) -> Self {
        let levels = Arc::new(LevelTable::default());
        let bus = EventBus::new(config.event_buffer);
        let locks = UserLocks::new();

        let evaluator = BadgeEvaluator::new(
            store.clone(),
            bus.clone(),
            locks.clone(),
            levels.clone(),
            config.append_max_retries,
        );
        let ledger = KarmaLedger::new(
            store.clone(),
            evaluator.clone(),
            bus.clone(),
            locks,
            levels.clone(),
            config.limits,
            config.append_max_retries,
        );
        let leaderboard = LeaderboardAggregator::new(store.clone(), levels.clone(), config.limits);
        let catalog = BadgeCatalog::new(store.clone());
        let reconciler = Reconciler::new(
            store.clone(),
            evaluator.clone(),
            reconcile_config(&config),
        );

        Self {
            config,
            store,
            levels,
            bus,
            ledger,
            evaluator,
            catalog,
            leaderboard,
            reconciler,
        }
    }

    /// A reconciler for the background loop, sharing this state's locks
    pub fn background_reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.store.clone(),
            self.evaluator.clone(),
            reconcile_config(&self.config),
        )
    }
}

fn reconcile_config(config: &Config) -> ReconcileConfig {
    ReconcileConfig {
        interval: Duration::from_secs(config.reconcile_interval_secs.max(1)),
        ..ReconcileConfig::default()
    }
}
