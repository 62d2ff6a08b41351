use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

/// Largest number of points a single expression can move, in either direction.
pub const MAX_AMOUNT: i64 = 4;

/// Operator runs longer than this trip Buzzkill Mode.
pub const BUZZKILL_RUN_LENGTH: usize = 5;

/// Number of targets shown by a bare `top` / `bottom` command.
pub const DEFAULT_RANK_SIZE: usize = 5;

/// A single row of the append-only karma ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub target: String,
    pub delta: i64,
    pub actor: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl LedgerEntry {
    /// Build an entry stamped with the current UTC time, truncated to whole seconds.
    pub fn now(target: &str, delta: i64, actor: &str) -> Self {
        Self::at(target, delta, actor, OffsetDateTime::now_utc())
    }

    /// Build an entry at an explicit instant, normalised to UTC. Sub-second precision is
    /// dropped so the stored form orders lexically.
    pub fn at(target: &str, delta: i64, actor: &str, timestamp: OffsetDateTime) -> Self {
        let timestamp = timestamp.to_offset(UtcOffset::UTC);
        let timestamp = timestamp.replace_nanosecond(0).unwrap_or(timestamp);
        Self {
            target: target.to_string(),
            delta,
            actor: actor.to_string(),
            timestamp,
        }
    }
}

/// A target and its recomputed total (sum of all ledger deltas for `name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KarmaTarget {
    pub name: String,
    pub total: i64,
}

impl KarmaTarget {
    pub fn new(name: impl Into<String>, total: i64) -> Self {
        Self {
            name: name.into(),
            total,
        }
    }
}

/// What a chat message asks to do to a target's karma.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KarmaIntent {
    pub target: String,
    /// Clamped to `[-MAX_AMOUNT, MAX_AMOUNT]`.
    pub amount: i64,
    pub is_buzzkill: bool,
    pub is_targeting_self: bool,
}

/// A command addressed to the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BotCommand {
    Top,
    TopN(usize),
    Bottom,
    BottomN(usize),
    Help,
    Unknown,
}

impl BotCommand {
    /// The ranking this command asks for, if it is a ranking command.
    pub fn ranking(&self) -> Option<(RankDirection, usize)> {
        match *self {
            BotCommand::Top => Some((RankDirection::Top, DEFAULT_RANK_SIZE)),
            BotCommand::TopN(n) => Some((RankDirection::Top, n)),
            BotCommand::Bottom => Some((RankDirection::Bottom, DEFAULT_RANK_SIZE)),
            BotCommand::BottomN(n) => Some((RankDirection::Bottom, n)),
            BotCommand::Help | BotCommand::Unknown => None,
        }
    }
}

/// Which end of the leaderboard to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RankDirection {
    #[default]
    Top,
    Bottom,
}

impl RankDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankDirection::Top => "top",
            RankDirection::Bottom => "bottom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "top" => Some(RankDirection::Top),
            "bottom" => Some(RankDirection::Bottom),
            _ => None,
        }
    }
}
