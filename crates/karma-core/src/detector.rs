//! Finds karma expressions (`Ken++`, `"chocolate cake"--`, `<@U123> +++`) in free text.
//!
//! The message is split into candidate tokens, then each token is offered to three
//! grammars in order. The first token any grammar accepts decides the intent; later
//! expressions in the same message are ignored.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{KarmaIntent, BUZZKILL_RUN_LENGTH, MAX_AMOUNT};

/// Candidate tokens: a user mention (with trailing whitespace), a bare word, or a
/// double-quoted phrase, each optionally followed by operator characters.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:<@[0-9A-Za-z_]+>\s*|[^\s"]+|"(?:\\"|[^"])+")(?:\+*-*)"#).unwrap()
});

/// Grammars tried against every token, highest precedence first: mention, bare word
/// (operators allowed between word characters), quoted phrase. Each captures the target
/// text and a homogeneous operator run of at least two characters.
static GRAMMARS: LazyLock<[Grammar; 3]> = LazyLock::new(|| {
    [
        Grammar::new(r"(<@[0-9A-Za-z_]+>\s*)(\+{2,}|-{2,})"),
        Grammar::new(r#"([^\s"+-]+(?:[+-][^\s"+-]+)*)(\+{2,}|-{2,})"#),
        Grammar::new(r#""([^"]+)"(\+{2,}|-{2,})"#),
    ]
});

struct Grammar(Regex);

/// A grammar hit inside one token.
#[derive(Debug, PartialEq, Eq)]
struct RawMatch<'a> {
    target: &'a str,
    ops: &'a str,
}

impl Grammar {
    fn new(pattern: &str) -> Self {
        Self(Regex::new(pattern).unwrap())
    }

    fn apply<'a>(&self, token: &'a str) -> Option<RawMatch<'a>> {
        let caps = self.0.captures(token)?;
        Some(RawMatch {
            target: caps.get(1)?.as_str(),
            ops: caps.get(2)?.as_str(),
        })
    }
}

fn first_match(text: &str) -> Option<RawMatch<'_>> {
    TOKEN
        .find_iter(text)
        .find_map(|token| GRAMMARS.iter().find_map(|g| g.apply(token.as_str())))
}

/// Detect the first karma expression in `text`.
///
/// `asking_user` is the platform id of the message author; a target equal to that
/// user's mention marker (`<@ID>`) is flagged as self-targeting. Returns `None` when the
/// message holds no expression, which is the common case.
pub fn detect_karma_intent(text: &str, asking_user: Option<&str>) -> Option<KarmaIntent> {
    let RawMatch { target, ops } = first_match(text)?;
    let target = target.trim();

    let run_length = ops.len();
    let mut raw_amount = run_length as i64 - 1;
    if ops.starts_with('-') {
        raw_amount = -raw_amount;
    }

    let is_targeting_self = asking_user
        .map(|user| target == format!("<@{user}>"))
        .unwrap_or(false);

    Some(KarmaIntent {
        target: target.to_string(),
        amount: raw_amount.clamp(-MAX_AMOUNT, MAX_AMOUNT),
        is_buzzkill: run_length > BUZZKILL_RUN_LENGTH,
        is_targeting_self,
    })
}
