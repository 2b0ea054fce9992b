//! Outbound real-time events
//!
//! Wire shape consumed by the notification layer. The `type` tag carries
//! the event name clients subscribe to.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::levels::Level;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum KarmaEvent {
    #[serde(rename = "karma:earned", rename_all = "camelCase")]
    KarmaEarned {
        user_id: Uuid,
        amount: i64,
        reason: String,
    },
    #[serde(rename = "karma:deducted", rename_all = "camelCase")]
    KarmaDeducted {
        user_id: Uuid,
        /// Positive magnitude of the deduction
        amount: i64,
        reason: String,
    },
    #[serde(rename = "level:up", rename_all = "camelCase")]
    LevelUp {
        user_id: Uuid,
        new_level: Level,
        reason: String,
    },
    #[serde(rename = "badge:earned", rename_all = "camelCase")]
    BadgeEarned {
        user_id: Uuid,
        badge_id: String,
        reason: String,
    },
}

impl KarmaEvent {
    pub fn name(&self) -> &'static str {
        match self {
            KarmaEvent::KarmaEarned { .. } => "karma:earned",
            KarmaEvent::KarmaDeducted { .. } => "karma:deducted",
            KarmaEvent::LevelUp { .. } => "level:up",
            KarmaEvent::BadgeEarned { .. } => "badge:earned",
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            KarmaEvent::KarmaEarned { user_id, .. }
            | KarmaEvent::KarmaDeducted { user_id, .. }
            | KarmaEvent::LevelUp { user_id, .. }
            | KarmaEvent::BadgeEarned { user_id, .. } => *user_id,
        }
    }

    /// Earned or deducted, depending on sign
    pub fn for_amount(user_id: Uuid, amount: i64, reason: impl Into<String>) -> Self {
        if amount >= 0 {
            KarmaEvent::KarmaEarned {
                user_id,
                amount,
                reason: reason.into(),
            }
        } else {
            KarmaEvent::KarmaDeducted {
                user_id,
                amount: amount.saturating_neg(),
                reason: reason.into(),
            }
        }
    }
}
