//! The chat-facing half of karma: turns Slack message events into ledger writes and replies,
//! and exposes the HTTP endpoint Slack delivers those events to.

pub mod chat;
pub mod dispatcher;
pub mod event;
pub mod server;
pub mod signature;

pub use chat::{ChatClient, SlackClient};
pub use dispatcher::{BotIdentity, Dispatcher, Reply};
pub use event::{Envelope, MessageEvent};
pub use server::{router, serve, ServeConfig};
