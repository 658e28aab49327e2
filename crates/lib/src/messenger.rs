//! Messenger Send API client: outbound messages, user profile lookup, and
//! page profile setup (greeting, Get Started button, persistent menu).

use serde::Deserialize;
use serde_json::{json, Value};

use crate::comics::FetchError;
use crate::dispatch::{PAYLOAD_ABOUT, PAYLOAD_GET_STARTED, PAYLOAD_LATEST, PAYLOAD_RANDOM};

const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v2.6";

/// A suggested reply chip: tapping it reports `payload` back via the webhook.
#[derive(Debug, Clone)]
pub struct QuickReply {
    pub title: String,
    pub payload: String,
}

impl QuickReply {
    pub fn new(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            payload: payload.into(),
        }
    }
}

/// Non-message signals the Send API accepts in place of a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderAction {
    MarkSeen,
    TypingOn,
    TypingOff,
}

impl SenderAction {
    fn wire_name(self) -> &'static str {
        match self {
            SenderAction::MarkSeen => "mark_seen",
            SenderAction::TypingOn => "typing_on",
            SenderAction::TypingOff => "typing_off",
        }
    }
}

/// Body of one outbound message.
#[derive(Debug, Clone)]
pub enum OutboundKind {
    Text(String),
    ImageAttachment { url: String },
    QuickReplyPrompt { text: String, replies: Vec<QuickReply> },
    SenderAction(SenderAction),
}

/// One outbound message, consumed exactly once by [`SendApiClient::send`].
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub recipient_id: String,
    pub kind: OutboundKind,
}

impl OutboundMessage {
    pub fn text(recipient_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            kind: OutboundKind::Text(text.into()),
        }
    }

    pub fn image(recipient_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            kind: OutboundKind::ImageAttachment { url: url.into() },
        }
    }

    pub fn quick_replies(
        recipient_id: impl Into<String>,
        text: impl Into<String>,
        replies: Vec<QuickReply>,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            kind: OutboundKind::QuickReplyPrompt {
                text: text.into(),
                replies,
            },
        }
    }

    pub fn sender_action(recipient_id: impl Into<String>, action: SenderAction) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            kind: OutboundKind::SenderAction(action),
        }
    }

    /// Wire body for the `/me/messages` endpoint.
    pub fn to_body(&self) -> Value {
        let recipient = json!({ "id": self.recipient_id });
        match &self.kind {
            OutboundKind::Text(text) => json!({
                "recipient": recipient,
                "message": { "text": text },
            }),
            OutboundKind::ImageAttachment { url } => json!({
                "recipient": recipient,
                "message": {
                    "attachment": { "type": "image", "payload": { "url": url } },
                },
            }),
            OutboundKind::QuickReplyPrompt { text, replies } => {
                let replies: Vec<Value> = replies
                    .iter()
                    .map(|r| {
                        json!({
                            "content_type": "text",
                            "title": r.title,
                            "payload": r.payload,
                        })
                    })
                    .collect();
                json!({
                    "recipient": recipient,
                    "message": { "text": text, "quick_replies": replies },
                })
            }
            OutboundKind::SenderAction(action) => json!({
                "recipient": recipient,
                "sender_action": action.wire_name(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("send api request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("send api error: {0}")]
    Api(String),
}

/// Successful send acknowledgment. The platform omits the message id for
/// sender actions.
#[derive(Debug, Default, Deserialize)]
pub struct SendReceipt {
    pub recipient_id: Option<String>,
    pub message_id: Option<String>,
}

/// Platform error envelope: `{ "error": { "message": ... } }`.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    first_name: Option<String>,
}

/// Client for the Graph API message endpoints. No retries — a failed send
/// stays failed; retry policy belongs to callers and this bot has none.
#[derive(Clone)]
pub struct SendApiClient {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl SendApiClient {
    pub fn new(base_url: Option<String>, access_token: String) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            access_token,
            client: reqwest::Client::new(),
        }
    }

    /// POST /me/messages — deliver one message. Single attempt.
    pub async fn send(&self, message: &OutboundMessage) -> Result<SendReceipt, SendError> {
        let url = format!("{}/me/messages", self.base_url);
        let res = self
            .client
            .post(&url)
            .query(&[("access_token", self.access_token.as_str())])
            .json(&message.to_body())
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or(body);
            return Err(SendError::Api(format!("{} {}", status, detail)));
        }
        let receipt: SendReceipt = res.json().await.unwrap_or_default();
        if let Some(ref mid) = receipt.message_id {
            log::debug!(
                "sent message {} to {}",
                mid,
                receipt.recipient_id.as_deref().unwrap_or("?")
            );
        }
        Ok(receipt)
    }

    /// GET /{user_id} — look up the sender's first name.
    pub async fn first_name(&self, user_id: &str) -> Result<Option<String>, FetchError> {
        let url = format!("{}/{}", self.base_url, user_id);
        let res = self
            .client
            .get(&url)
            .query(&[("access_token", self.access_token.as_str())])
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(FetchError::Api(format!("{} {}", status, body)));
        }
        let profile: UserProfile = res.json().await?;
        Ok(profile.first_name.filter(|n| !n.is_empty()))
    }

    /// Apply the page profile: greeting text, Get Started button, and
    /// persistent menu. Best-effort — each failure is logged and the rest
    /// still run.
    pub async fn apply_page_profile(&self) {
        for (name, body) in page_profile_settings() {
            match self.thread_setting(&body).await {
                Ok(()) => log::info!("page profile: {} set", name),
                Err(e) => log::warn!("page profile: setting {} failed: {}", name, e),
            }
        }
    }

    /// POST /me/thread_settings with one setting body.
    async fn thread_setting(&self, body: &Value) -> Result<(), SendError> {
        let url = format!("{}/me/thread_settings", self.base_url);
        let res = self
            .client
            .post(&url)
            .query(&[("access_token", self.access_token.as_str())])
            .json(body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SendError::Api(format!("{} {}", status, body)));
        }
        Ok(())
    }
}

/// The three thread settings the bot installs: greeting, Get Started
/// button, and the persistent menu.
fn page_profile_settings() -> [(&'static str, Value); 3] {
    [
        (
            "greeting text",
            json!({
                "setting_type": "greeting",
                "greeting": { "text": "Hi {{user_first_name}}. Ready to read xkcd comics?" },
            }),
        ),
        (
            "get started button",
            json!({
                "setting_type": "call_to_actions",
                "thread_state": "new_thread",
                "call_to_actions": [ { "payload": PAYLOAD_GET_STARTED } ],
            }),
        ),
        (
            "persistent menu",
            json!({
                "setting_type": "call_to_actions",
                "thread_state": "existing_thread",
                "call_to_actions": [
                    { "type": "postback", "title": "About", "payload": PAYLOAD_ABOUT },
                    { "type": "postback", "title": "Latest comic", "payload": PAYLOAD_LATEST },
                    { "type": "postback", "title": "Random comic", "payload": PAYLOAD_RANDOM },
                    { "type": "web_url", "title": "Visit xkcd", "url": "https://xkcd.com/" },
                ],
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_body_shape() {
        let body = OutboundMessage::text("user-1", "hello").to_body();
        assert_eq!(body["recipient"]["id"], "user-1");
        assert_eq!(body["message"]["text"], "hello");
        assert!(body.get("sender_action").is_none());
    }

    #[test]
    fn image_body_shape() {
        let body = OutboundMessage::image("user-1", "http://x/a_2x.png").to_body();
        assert_eq!(body["message"]["attachment"]["type"], "image");
        assert_eq!(body["message"]["attachment"]["payload"]["url"], "http://x/a_2x.png");
    }

    #[test]
    fn quick_reply_body_shape() {
        let body = OutboundMessage::quick_replies(
            "user-1",
            "What do you want to read?",
            vec![
                QuickReply::new("latest xkcd", "LATEST"),
                QuickReply::new("random xkcd", "RANDOM"),
            ],
        )
        .to_body();
        let replies = body["message"]["quick_replies"].as_array().expect("array");
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["content_type"], "text");
        assert_eq!(replies[1]["payload"], "RANDOM");
    }

    #[test]
    fn page_profile_setting_bodies() {
        let [greeting, get_started, menu] = page_profile_settings();
        assert_eq!(greeting.1["setting_type"], "greeting");
        assert!(greeting.1["greeting"]["text"]
            .as_str()
            .unwrap()
            .contains("{{user_first_name}}"));
        assert_eq!(get_started.1["thread_state"], "new_thread");
        assert_eq!(get_started.1["call_to_actions"][0]["payload"], "GET_STARTED");
        assert_eq!(menu.1["thread_state"], "existing_thread");
        let items = menu.1["call_to_actions"].as_array().expect("menu items");
        assert_eq!(items.len(), 4);
        assert_eq!(items[2]["payload"], "RANDOM");
        assert_eq!(items[3]["type"], "web_url");
    }

    #[test]
    fn sender_action_body_shape() {
        let body = OutboundMessage::sender_action("user-1", SenderAction::MarkSeen).to_body();
        assert_eq!(body["sender_action"], "mark_seen");
        assert!(body.get("message").is_none());
        assert_eq!(
            OutboundMessage::sender_action("u", SenderAction::TypingOn).to_body()["sender_action"],
            "typing_on"
        );
    }
}
