use serde::Deserialize;

/// Outer wrapper of every Events API delivery.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    UrlVerification { challenge: String },
    EventCallback { event: MessageEvent },
    #[serde(other)]
    Other,
}

/// The subset of a Slack event the dispatcher looks at.
///
/// Every field but `type` is optional: Slack omits `user` on system messages, sets `bot_id`
/// on bot posts, and leaves `text` out of some subtypes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl MessageEvent {
    /// A plain user message, mostly for tests and the CLI.
    pub fn message(user: &str, channel: &str, text: &str) -> Self {
        Self {
            kind: "message".to_string(),
            user: Some(user.to_string()),
            channel: Some(channel.to_string()),
            text: Some(text.to_string()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_url_verification() {
        let env: Envelope = serde_json::from_str(
            r#"{"token":"x","challenge":"3eZbrw1aBm2rZgRNFdxV2595E9CY3gmdALWMmHkvFXO7tYXAYM8P",
                "type":"url_verification"}"#,
        )
        .unwrap();
        assert!(matches!(
            env,
            Envelope::UrlVerification { challenge } if challenge.starts_with("3eZb")
        ));
    }

    #[test]
    fn parses_message_callback() {
        let env: Envelope = serde_json::from_value(serde_json::json!({
            "type": "event_callback",
            "team_id": "T1",
            "event": {
                "type": "message",
                "channel": "C1",
                "user": "U1",
                "text": "rust++",
                "ts": "1355517523.000005"
            }
        }))
        .unwrap();
        let Envelope::EventCallback { event } = env else {
            panic!("expected event callback");
        };
        assert_eq!(event, MessageEvent::message("U1", "C1", "rust++"));
    }

    #[test]
    fn bot_posts_carry_bot_id() {
        let event: MessageEvent = serde_json::from_value(serde_json::json!({
            "type": "message",
            "subtype": "bot_message",
            "bot_id": "B1",
            "username": "karmabot",
            "text": "rust got 1 point, and now has 1"
        }))
        .unwrap();
        assert_eq!(event.bot_id.as_deref(), Some("B1"));
        assert!(event.user.is_none());
    }

    #[test]
    fn unknown_envelope_is_other() {
        let env: Envelope = serde_json::from_str(r#"{"type":"app_rate_limited"}"#).unwrap();
        assert!(matches!(env, Envelope::Other));
    }
}
