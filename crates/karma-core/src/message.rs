//! User-facing replies for karma changes and bot commands.

use crate::types::KarmaTarget;

/// Chance that a self-targeting attempt is answered with a one point correction.
pub const SELF_TARGETING_CORRECTION_ODDS: f64 = 0.15;

const ENCOURAGEMENT: &[&str] = &[
    "Hey, don't be so hard on yourself!",
    "I'm sure you don't deserve that!",
    "Chin up! Don't punish yourself too hard!",
];

const CHASTISEMENT: &[&str] = &[
    "Who do you think you are, trying to give yourself points!?",
    "Do you think this is some kind of game?",
    "No way, that's cheating! Shame on you!",
    "UNACCEPTABLE!!!",
    "You can't just give _yourself_ points!",
    "You think you _deserve_ those points?",
];

fn points(value: i64) -> &'static str {
    if value == 1 {
        "point"
    } else {
        "points"
    }
}

/// Reply to an accepted karma change.
pub fn karma_message(is_buzzkill: bool, amount: i64, total: i64, target: &str) -> String {
    let value = amount.abs();
    if is_buzzkill {
        let verb = if amount > 0 { "adding" } else { "subtracting" };
        format!(
            "Buzzkill Mode™️ activated! Only {verb} {value} {}.\n{target} has {total} {}",
            points(value),
            points(total)
        )
    } else {
        let verb = if amount > 0 { "got" } else { "lost" };
        format!(
            "{target} {verb} {value} {}, and now has {total}",
            points(value)
        )
    }
}

/// Reply to someone trying to change their own karma.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTargetingReply {
    pub message: String,
    /// A correction to record against the target, if the dice said so.
    pub karma_change: Option<i64>,
}

/// Compose the reply to a self-targeting attempt.
///
/// `roll` yields uniform values in `[0, 1)`: the first picks the line, the second decides
/// whether a one point correction (award for self-deprecation, penalty for hubris) applies.
pub fn self_targeting_message(
    amount: i64,
    target: &str,
    mut roll: impl FnMut() -> f64,
) -> SelfTargetingReply {
    let (lines, suffix, change) = if amount < 0 {
        (ENCOURAGEMENT, "gets 1 point, for encouragement!", 1)
    } else {
        (CHASTISEMENT, "loses 1 point, for hubris!", -1)
    };

    let idx = (roll() * lines.len() as f64).floor() as usize;
    let line = lines.get(idx).copied().unwrap_or_default();

    if roll() < SELF_TARGETING_CORRECTION_ODDS {
        SelfTargetingReply {
            message: format!("{line} {target} {suffix}"),
            karma_change: Some(change),
        }
    } else {
        SelfTargetingReply {
            message: line.to_string(),
            karma_change: None,
        }
    }
}

/// One `name: total point(s)` line per ranked target.
pub fn ranking_message(targets: &[KarmaTarget]) -> String {
    if targets.is_empty() {
        return "Nobody has any karma yet. Give some out with `something++`!".to_string();
    }
    targets
        .iter()
        .map(|t| format!("{}: {} {}", t.name, t.total, points(t.total)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn unknown_command_message() -> String {
    concat!(
        "I'm sorry, that command is unrecognized. ",
        "Try the `help` command to learn which commands are supported"
    )
    .to_string()
}

pub fn help_message(bot_name: &str) -> String {
    format!(
        "{bot_name} helps you keep score of things.\n\
         Give karma with `thing++` (up to `thing+++++`), take it away with `thing--`.\n\
         Multi-word targets go in double quotes: `\"chocolate cake\"++`.\n\
         Commands (mention me first):\n\
         • `top` / `top <n>`: the highest scores\n\
         • `bottom` / `bottom <n>`: the lowest scores\n\
         • `help`: this message"
    )
}
