use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::debug;

/// Where the dispatcher sends its replies.
pub trait ChatClient {
    fn post_message(&self, channel: &str, text: &str) -> anyhow::Result<()>;
}

impl<C: ChatClient + ?Sized> ChatClient for &C {
    fn post_message(&self, channel: &str, text: &str) -> anyhow::Result<()> {
        (**self).post_message(channel, text)
    }
}

// ── Slack Web API ──

const TIMEOUT: Duration = Duration::from_secs(5);
const SLACK_API: &str = "https://slack.com/api";
const ICON_EMOJI: &str = ":scale:";

/// Blocking Slack Web API client authenticated with a bot token.
pub struct SlackClient {
    token: String,
    base_url: String,
    agent: ureq::Agent,
}

#[derive(Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

impl SlackClient {
    pub fn new(token: impl Into<String>) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(TIMEOUT))
            .build()
            .new_agent();
        Self {
            token: token.into(),
            base_url: SLACK_API.to_string(),
            agent,
        }
    }

    /// Point the client at another API root (a proxy or a local fake).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The bot's own user id, via `auth.test`.
    pub fn bot_user_id(&self) -> anyhow::Result<String> {
        let reply = self.call("auth.test", serde_json::json!({}))?;
        reply.user_id.context("auth.test reply has no user_id")
    }

    fn call(&self, method: &str, body: serde_json::Value) -> anyhow::Result<ApiReply> {
        let url = format!("{}/{method}", self.base_url);
        let mut resp = self
            .agent
            .post(&url)
            .header("Authorization", &format!("Bearer {}", self.token))
            .header("Content-Type", "application/json; charset=utf-8")
            .send(body.to_string())
            .with_context(|| format!("calling {method}"))?;
        let text = resp.body_mut().read_to_string()?;
        let reply: ApiReply =
            serde_json::from_str(&text).with_context(|| format!("decoding {method} reply"))?;
        if !reply.ok {
            bail!(
                "{method} failed: {}",
                reply.error.as_deref().unwrap_or("unknown error")
            );
        }
        debug!(method, "slack call ok");
        Ok(reply)
    }
}

impl ChatClient for SlackClient {
    fn post_message(&self, channel: &str, text: &str) -> anyhow::Result<()> {
        self.call(
            "chat.postMessage",
            serde_json::json!({
                "channel": channel,
                "text": text,
                "icon_emoji": ICON_EMOJI,
            }),
        )?;
        Ok(())
    }
}
