//! Preconditions for engagements and karma amounts
//!
//! These run before any karma reaches the ledger.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const POLL_MIN_OPTIONS: usize = 2;
pub const POLL_MAX_OPTIONS: usize = 10;
pub const POLL_QUESTION_MAX_CHARS: usize = 300;
pub const POLL_OPTION_MAX_CHARS: usize = 100;
pub const STAKE_MIN: i64 = 1;
pub const STAKE_MAX: i64 = 10_000;
/// Largest magnitude a single ledger entry may carry
pub const MAX_ENTRY_AMOUNT: i64 = 1_000_000;
/// Largest magnitude a user's running total may reach
pub const MAX_KARMA_TOTAL: i64 = 1_000_000_000_000;

/// Reject amounts whose magnitude is above `max`
pub fn check_entry_amount(field: &str, amount: i64, max: i64) -> Result<()> {
    if amount.checked_abs().map_or(true, |magnitude| magnitude > max) {
        return Err(Error::validation(format!(
            "{} amount must be between -{} and {}",
            field, max, max
        )));
    }
    Ok(())
}

/// Total after adding `amount`, if it stays within [`MAX_KARMA_TOTAL`]
pub fn next_total(total: i64, amount: i64) -> Result<i64> {
    total
        .checked_add(amount)
        .filter(|t| t.checked_abs().map_or(false, |m| m <= MAX_KARMA_TOTAL))
        .ok_or_else(|| Error::validation("karma total would leave the supported range"))
}

/// A poll being created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PollDraft {
    pub question: String,
    pub options: Vec<String>,
}

impl PollDraft {
    pub fn validate(&self) -> Result<()> {
        let question = self.question.trim();
        if question.is_empty() {
            return Err(Error::validation("poll question is required"));
        }
        if question.chars().count() > POLL_QUESTION_MAX_CHARS {
            return Err(Error::validation(format!(
                "poll question must be at most {} characters",
                POLL_QUESTION_MAX_CHARS
            )));
        }
        if !(POLL_MIN_OPTIONS..=POLL_MAX_OPTIONS).contains(&self.options.len()) {
            return Err(Error::validation(format!(
                "poll requires between {} and {} options",
                POLL_MIN_OPTIONS, POLL_MAX_OPTIONS
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for option in &self.options {
            let option = option.trim();
            if option.is_empty() {
                return Err(Error::validation("poll options must not be empty"));
            }
            if option.chars().count() > POLL_OPTION_MAX_CHARS {
                return Err(Error::validation(format!(
                    "poll options must be at most {} characters",
                    POLL_OPTION_MAX_CHARS
                )));
            }
            if !seen.insert(option.to_lowercase()) {
                return Err(Error::validation(format!(
                    "duplicate poll option '{}'",
                    option
                )));
            }
        }
        Ok(())
    }
}

/// A stake placed on a prediction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PredictionStake {
    pub stake: i64,
    pub min_stake: i64,
    pub max_stake: i64,
}

impl PredictionStake {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("stake", self.stake),
            ("minStake", self.min_stake),
            ("maxStake", self.max_stake),
        ] {
            if !(STAKE_MIN..=STAKE_MAX).contains(&value) {
                return Err(Error::validation(format!(
                    "{} must be between {} and {}",
                    name, STAKE_MIN, STAKE_MAX
                )));
            }
        }
        if self.min_stake > self.max_stake {
            return Err(Error::validation("minStake must not exceed maxStake"));
        }
        if self.stake < self.min_stake || self.stake > self.max_stake {
            return Err(Error::validation(format!(
                "stake must be between {} and {}",
                self.min_stake, self.max_stake
            )));
        }
        Ok(())
    }
}
