use std::path::Path;

use anyhow::Context;
use karma_bot::{BotIdentity, Dispatcher, ServeConfig, SlackClient};
use tracing::info;

pub struct ServeParams<'a> {
    pub db: &'a Path,
    pub listen: &'a str,
    pub slack_token: &'a str,
    pub signing_secret: Option<&'a str>,
    pub bot_name: &'a str,
    pub bot_user_id: Option<&'a str>,
}

pub fn execute(params: &ServeParams<'_>) -> anyhow::Result<()> {
    let ledger = crate::open_ledger(params.db)?;
    let chat = SlackClient::new(params.slack_token);
    let user_id = match params.bot_user_id {
        Some(id) => id.to_string(),
        None => chat
            .bot_user_id()
            .context("resolving bot user id (set KARMA_BOT_USER_ID to skip)")?,
    };
    info!(name = params.bot_name, user_id = %user_id, db = %params.db.display(), "bot ready");

    let identity = BotIdentity {
        name: params.bot_name.to_string(),
        user_id,
    };
    let config = ServeConfig {
        listen: params.listen.to_string(),
        signing_secret: params.signing_secret.map(str::to_string),
    };
    let dispatcher = Dispatcher::new(ledger, chat, identity);
    tokio::runtime::Runtime::new()?.block_on(karma_bot::serve(dispatcher, config))
}
