//! Engagement actions and the karma they are worth

use common::models::KarmaSource;
use common::validation::{check_entry_amount, PollDraft, PredictionStake, MAX_ENTRY_AMOUNT};
use common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Karma granted for each kind of engagement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardTable {
    pub post_created: i64,
    pub comment_created: i64,
    pub reaction_given: i64,
    pub poll_created: i64,
    pub poll_voted: i64,
    pub prediction_staked: i64,
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            post_created: 10,
            comment_created: 5,
            reaction_given: 1,
            poll_created: 8,
            poll_voted: 2,
            prediction_staked: 3,
        }
    }
}

/// Something a user did that affects karma
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Engagement {
    PostCreated { post_id: String },
    CommentCreated { comment_id: String },
    ReactionGiven { target_id: String },
    PollCreated { poll: PollDraft },
    PollVoted { poll_id: String },
    PredictionStaked {
        prediction_id: String,
        stake: i64,
        min_stake: i64,
        max_stake: i64,
    },
    /// Operator action; may be positive or negative
    Moderation { amount: i64, reason: String },
    Bonus { amount: i64, reason: String },
    /// `amount` is the magnitude; it is recorded as a deduction
    Penalty { amount: i64, reason: String },
}

/// Ledger entry an engagement turns into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KarmaDraft {
    pub source: KarmaSource,
    pub amount: i64,
    pub description: String,
}

impl Engagement {
    /// Check preconditions and price the engagement
    pub fn to_draft(&self, rewards: &RewardTable) -> Result<KarmaDraft> {
        let draft = |source, amount, description: String| KarmaDraft {
            source,
            amount,
            description,
        };

        match self {
            Engagement::PostCreated { post_id } => Ok(draft(
                KarmaSource::Post,
                rewards.post_created,
                format!("Created post {}", required("postId", post_id)?),
            )),
            Engagement::CommentCreated { comment_id } => Ok(draft(
                KarmaSource::Comment,
                rewards.comment_created,
                format!("Created comment {}", required("commentId", comment_id)?),
            )),
            Engagement::ReactionGiven { target_id } => Ok(draft(
                KarmaSource::Reaction,
                rewards.reaction_given,
                format!("Reacted to {}", required("targetId", target_id)?),
            )),
            Engagement::PollCreated { poll } => {
                poll.validate()?;
                Ok(draft(
                    KarmaSource::Poll,
                    rewards.poll_created,
                    format!("Created poll: {}", poll.question.trim()),
                ))
            }
            Engagement::PollVoted { poll_id } => Ok(draft(
                KarmaSource::Poll,
                rewards.poll_voted,
                format!("Voted in poll {}", required("pollId", poll_id)?),
            )),
            Engagement::PredictionStaked {
                prediction_id,
                stake,
                min_stake,
                max_stake,
            } => {
                let prediction_id = required("predictionId", prediction_id)?;
                PredictionStake {
                    stake: *stake,
                    min_stake: *min_stake,
                    max_stake: *max_stake,
                }
                .validate()?;
                Ok(draft(
                    KarmaSource::Prediction,
                    rewards.prediction_staked,
                    format!("Staked {} on prediction {}", stake, prediction_id),
                ))
            }
            Engagement::Moderation { amount, reason } => {
                if *amount == 0 {
                    return Err(Error::validation("moderation amount must not be zero"));
                }
                check_entry_amount("moderation", *amount, MAX_ENTRY_AMOUNT)?;
                Ok(draft(
                    KarmaSource::Moderation,
                    *amount,
                    required("reason", reason)?.to_string(),
                ))
            }
            Engagement::Bonus { amount, reason } => Ok(draft(
                KarmaSource::Bonus,
                positive("bonus", *amount)?,
                required("reason", reason)?.to_string(),
            )),
            Engagement::Penalty { amount, reason } => Ok(draft(
                KarmaSource::Penalty,
                -positive("penalty", *amount)?,
                required("reason", reason)?.to_string(),
            )),
        }
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(format!("{} is required", field)));
    }
    Ok(value)
}

fn positive(field: &str, amount: i64) -> Result<i64> {
    if amount <= 0 {
        return Err(Error::validation(format!("{} amount must be positive", field)));
    }
    check_entry_amount(field, amount, MAX_ENTRY_AMOUNT)?;
    Ok(amount)
}
