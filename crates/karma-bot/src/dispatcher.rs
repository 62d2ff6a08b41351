use std::sync::{Mutex, MutexGuard, PoisonError};

use karma_core::message::{
    help_message, karma_message, ranking_message, self_targeting_message, unknown_command_message,
};
use karma_core::{
    detect_karma_intent, is_addressed_to_bot, parse_bot_command, BotCommand, KarmaIntent,
    LedgerEntry,
};
use karma_ledger::KarmaLedger;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::chat::ChatClient;
use crate::event::MessageEvent;

/// Who the bot is on the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    /// Display name; also recorded as the actor of self-targeting corrections.
    pub name: String,
    /// Platform user id, used to recognise `<@ID> command` messages.
    pub user_id: String,
}

/// Uniform values in `[0, 1)`.
pub type RollSource = Box<dyn FnMut() -> f64 + Send>;

/// A message ready to be posted back to the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub channel: String,
    pub text: String,
}

struct Core<L> {
    ledger: L,
    roll: RollSource,
}

/// Handles incoming chat messages: commands, karma changes and replies.
///
/// Ledger work is serialized behind an internal lock. Replies are posted after it is released.
pub struct Dispatcher<L, C> {
    core: Mutex<Core<L>>,
    chat: C,
    identity: BotIdentity,
}

impl<L: KarmaLedger, C: ChatClient> Dispatcher<L, C> {
    pub fn new(ledger: L, chat: C, identity: BotIdentity) -> Self {
        let mut rng = StdRng::from_entropy();
        Self {
            core: Mutex::new(Core {
                ledger,
                roll: Box::new(move || rng.gen::<f64>()),
            }),
            chat,
            identity,
        }
    }

    /// Replace the random source (deterministic replies in tests).
    pub fn with_rolls(mut self, roll: impl FnMut() -> f64 + Send + 'static) -> Self {
        self.core.get_mut().unwrap_or_else(PoisonError::into_inner).roll = Box::new(roll);
        self
    }

    fn core(&self) -> MutexGuard<'_, Core<L>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a read against the ledger.
    pub fn with_ledger<T>(&self, f: impl FnOnce(&L) -> T) -> T {
        f(&self.core().ledger)
    }

    pub fn identity(&self) -> &BotIdentity {
        &self.identity
    }

    /// Process one message event. Returns whether the bot replied.
    ///
    /// Store and chat failures propagate; nothing is retried here.
    pub fn handle_message(&self, event: &MessageEvent) -> anyhow::Result<bool> {
        let Some(reply) = self.reply_to(event)? else {
            return Ok(false);
        };
        self.chat.post_message(&reply.channel, &reply.text)?;
        Ok(true)
    }

    /// Apply the ledger side of one message event and compose the reply, without posting it.
    pub fn reply_to(&self, event: &MessageEvent) -> anyhow::Result<Option<Reply>> {
        if event.kind != "message"
            || event.bot_id.is_some()
            || event.username.as_deref() == Some(self.identity.name.as_str())
        {
            return Ok(None);
        }
        let (Some(user), Some(channel), Some(text)) = (
            event.user.as_deref(),
            event.channel.as_deref(),
            event.text.as_deref(),
        ) else {
            return Ok(None);
        };

        let text = if is_addressed_to_bot(text, &self.identity.user_id) {
            let command = parse_bot_command(text);
            debug!(?command, channel, "bot command");
            self.core().command_reply(command, &self.identity.name)?
        } else {
            let Some(intent) = detect_karma_intent(text, Some(user)) else {
                return Ok(None);
            };
            self.core().apply_intent(&intent, user, &self.identity.name)?
        };
        Ok(Some(Reply {
            channel: channel.to_string(),
            text,
        }))
    }
}

impl<L: KarmaLedger> Core<L> {
    fn command_reply(&self, command: BotCommand, bot_name: &str) -> anyhow::Result<String> {
        if let Some((direction, n)) = command.ranking() {
            let ranked = karma_rank::rank_targets(&self.ledger, n, direction)?;
            return Ok(ranking_message(&ranked));
        }
        Ok(match command {
            BotCommand::Help => help_message(bot_name),
            _ => unknown_command_message(),
        })
    }

    fn apply_intent(
        &mut self,
        intent: &KarmaIntent,
        user: &str,
        bot_name: &str,
    ) -> anyhow::Result<String> {
        if intent.is_targeting_self {
            let reply = self_targeting_message(intent.amount, &intent.target, &mut self.roll);
            if let Some(change) = reply.karma_change {
                self.ledger
                    .append(&LedgerEntry::now(&intent.target, change, bot_name))?;
                info!(karma_target = %intent.target, delta = change, "self-targeting correction");
            }
            return Ok(reply.message);
        }

        self.ledger
            .append(&LedgerEntry::now(&intent.target, intent.amount, user))?;
        let total = self.ledger.sum_by_target(&intent.target)?;
        info!(
            karma_target = %intent.target,
            delta = intent.amount,
            actor = user,
            total,
            "karma recorded"
        );
        Ok(karma_message(
            intent.is_buzzkill,
            intent.amount,
            total,
            &intent.target,
        ))
    }
}
