//! Karma ledger, badge evaluation and leaderboard ranking

pub mod badges;
pub mod catalog;
pub mod engagement;
pub mod events;
pub mod leaderboard;
pub mod ledger;
pub mod locks;
pub mod reconcile;

#[cfg(test)]
mod tests;

pub use badges::{BadgeEvaluation, BadgeEvaluator};
pub use catalog::BadgeCatalog;
pub use engagement::{Engagement, RewardTable};
pub use events::EventBus;
pub use leaderboard::LeaderboardAggregator;
pub use ledger::{AppendOutcome, KarmaLedger};
pub use locks::{UserGuard, UserLocks};
pub use reconcile::{ReconcileConfig, ReconcileStats, Reconciler};
