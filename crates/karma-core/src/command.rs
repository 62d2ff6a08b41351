use crate::types::BotCommand;

/// True when `text` starts with the bot's mention marker (`<@BOT_ID>`).
pub fn is_addressed_to_bot(text: &str, bot_user_id: &str) -> bool {
    text.starts_with(&format!("<@{bot_user_id}>"))
}

/// Parse a message already known to be addressed to the bot.
///
/// The first whitespace-separated token is the bot mention and is skipped. Anything
/// that is not a recognised command, including a malformed count, is `Unknown`.
pub fn parse_bot_command(text: &str) -> BotCommand {
    let mut segments = text.split_whitespace().skip(1);

    match segments.next() {
        Some(word @ ("top" | "bottom")) => {
            let is_top = word == "top";
            match segments.next() {
                None if is_top => BotCommand::Top,
                None => BotCommand::Bottom,
                Some(arg) => match parse_count(arg) {
                    Some(n) if is_top => BotCommand::TopN(n),
                    Some(n) => BotCommand::BottomN(n),
                    None => BotCommand::Unknown,
                },
            }
        }
        Some("help") => BotCommand::Help,
        _ => BotCommand::Unknown,
    }
}

/// A strictly positive count; zero, negatives and non-numbers are rejected.
fn parse_count(arg: &str) -> Option<usize> {
    arg.parse::<usize>().ok().filter(|n| *n > 0)
}
