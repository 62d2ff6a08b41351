pub mod command;
pub mod detector;
pub mod message;
pub mod period;
pub mod types;

pub use command::{is_addressed_to_bot, parse_bot_command};
pub use detector::detect_karma_intent;
pub use period::Granularity;
pub use types::*;
