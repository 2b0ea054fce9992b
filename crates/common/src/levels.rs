//! Level table and resolution
//!
//! Levels are a pure function of total karma. The default table is the
//! single authoritative copy; clients fetch it over HTTP instead of
//! keeping their own.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Named karma tier, declared low to high
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Newbie,
    Explorer,
    Contributor,
    Influencer,
    Expert,
    Legend,
    Titan,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Newbie => "NEWBIE",
            Level::Explorer => "EXPLORER",
            Level::Contributor => "CONTRIBUTOR",
            Level::Influencer => "INFLUENCER",
            Level::Expert => "EXPERT",
            Level::Legend => "LEGEND",
            Level::Titan => "TITAN",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum karma needed to hold a level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LevelThreshold {
    pub level: Level,
    pub min_karma: i64,
}

/// Progress from the current level toward the next
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    /// 0..=100
    pub percentage: f64,
    pub current_level_min: i64,
    pub next_level: Option<Level>,
    pub next_level_min: Option<i64>,
}

/// Result of resolving a karma total
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLevel {
    pub level: Level,
    pub progress: LevelProgress,
}

/// Ordered level thresholds, strictly increasing in both level and karma
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LevelTable {
    thresholds: Vec<LevelThreshold>,
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            thresholds: vec![
                LevelThreshold {
                    level: Level::Newbie,
                    min_karma: 0,
                },
                LevelThreshold {
                    level: Level::Explorer,
                    min_karma: 50,
                },
                LevelThreshold {
                    level: Level::Contributor,
                    min_karma: 200,
                },
                LevelThreshold {
                    level: Level::Influencer,
                    min_karma: 500,
                },
                LevelThreshold {
                    level: Level::Expert,
                    min_karma: 1_000,
                },
                LevelThreshold {
                    level: Level::Legend,
                    min_karma: 2_500,
                },
                LevelThreshold {
                    level: Level::Titan,
                    min_karma: 5_000,
                },
            ],
        }
    }
}

impl LevelTable {
    /// Build a table, rejecting anything that is not a strict total order
    pub fn new(thresholds: Vec<LevelThreshold>) -> Result<Self> {
        let Some(first) = thresholds.first() else {
            return Err(Error::Config("level table must not be empty".to_string()));
        };
        if first.min_karma != 0 {
            return Err(Error::Config(
                "lowest level must start at 0 karma".to_string(),
            ));
        }
        for pair in thresholds.windows(2) {
            if pair[1].min_karma <= pair[0].min_karma || pair[1].level <= pair[0].level {
                return Err(Error::Config(format!(
                    "level table not strictly increasing at {}",
                    pair[1].level
                )));
            }
        }
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &[LevelThreshold] {
        &self.thresholds
    }

    /// Map a karma total to its level and progress toward the next one.
    ///
    /// Totals below zero (possible after penalties) resolve to the lowest
    /// level with zero progress.
    pub fn resolve(&self, total_karma: i64) -> ResolvedLevel {
        let idx = self
            .thresholds
            .iter()
            .rposition(|t| total_karma >= t.min_karma)
            .unwrap_or(0);
        let current = self.thresholds[idx];

        match self.thresholds.get(idx + 1) {
            Some(next) => {
                let span = (next.min_karma - current.min_karma) as f64;
                let into = (total_karma - current.min_karma) as f64;
                let percentage = (into / span * 100.0).clamp(0.0, 100.0);
                ResolvedLevel {
                    level: current.level,
                    progress: LevelProgress {
                        percentage,
                        current_level_min: current.min_karma,
                        next_level: Some(next.level),
                        next_level_min: Some(next.min_karma),
                    },
                }
            }
            None => ResolvedLevel {
                level: current.level,
                progress: LevelProgress {
                    percentage: 100.0,
                    current_level_min: current.min_karma,
                    next_level: None,
                    next_level_min: None,
                },
            },
        }
    }

    pub fn level_for(&self, total_karma: i64) -> Level {
        self.resolve(total_karma).level
    }
}
