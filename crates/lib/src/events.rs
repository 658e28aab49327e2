//! Inbound webhook payload decode and event classification.
//!
//! A page delivery batches multiple entries, each with multiple messaging
//! events. Every raw event carries at most one marker field (`optin`,
//! `message`, `delivery`, `postback`, `read`, `account_linking`); the
//! classifier turns that shape into one [`EventKind`] up front so handlers
//! never probe raw JSON.

use serde::Deserialize;

/// Webhook POST body: `{ "object": "page", "entry": [...] }`.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<PageEntry>,
}

/// One page entry of a batched delivery.
#[derive(Debug, Deserialize)]
pub struct PageEntry {
    pub id: Option<String>,
    pub time: Option<i64>,
    #[serde(default)]
    pub messaging: Vec<RawEvent>,
}

/// A messaging event as delivered, markers still undecoded.
#[derive(Debug, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub sender: Option<Party>,
    #[serde(default)]
    pub recipient: Option<Party>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub optin: Option<Optin>,
    #[serde(default)]
    pub message: Option<MessageEvent>,
    #[serde(default)]
    pub delivery: Option<DeliveryReceipt>,
    #[serde(default)]
    pub postback: Option<Postback>,
    #[serde(default)]
    pub read: Option<ReadReceipt>,
    #[serde(default)]
    pub account_linking: Option<AccountLinking>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Party {
    pub id: String,
}

/// `optin` marker: "Send to Messenger" plugin authentication.
#[derive(Debug, Deserialize)]
pub struct Optin {
    #[serde(rename = "ref")]
    pub pass_through: Option<String>,
}

/// `message` marker. Exactly one of text/attachments is present when the
/// message is not an echo; a quick-reply payload takes dispatch priority
/// over both.
#[derive(Debug, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub is_echo: bool,
    pub mid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default)]
    pub quick_reply: Option<QuickReplyPayload>,
}

#[derive(Debug, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Option<AttachmentPayload>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AttachmentPayload {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub sticker_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct QuickReplyPayload {
    pub payload: String,
}

/// `delivery` marker: messages up to `watermark` were delivered.
#[derive(Debug, Deserialize)]
pub struct DeliveryReceipt {
    #[serde(default)]
    pub mids: Option<Vec<String>>,
    pub watermark: Option<i64>,
    pub seq: Option<i64>,
}

/// `postback` marker: a structured button tap with a fixed payload string.
#[derive(Debug, Deserialize)]
pub struct Postback {
    pub payload: String,
}

/// `read` marker: messages up to `watermark` were read.
#[derive(Debug, Deserialize)]
pub struct ReadReceipt {
    pub watermark: Option<i64>,
    pub seq: Option<i64>,
}

/// `account_linking` marker: Link/Unlink Account action.
#[derive(Debug, Deserialize)]
pub struct AccountLinking {
    pub status: Option<String>,
    pub authorization_code: Option<String>,
}

/// Semantic kind of one inbound event, carrying its marker payload.
#[derive(Debug)]
pub enum EventKind {
    Authentication(Optin),
    Message(MessageEvent),
    DeliveryReceipt(DeliveryReceipt),
    Postback(Postback),
    ReadReceipt(ReadReceipt),
    AccountLink(AccountLinking),
    /// Matched none of the known markers. Logged by the caller, not dispatched.
    Unknown,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Authentication(_) => "authentication",
            EventKind::Message(_) => "message",
            EventKind::DeliveryReceipt(_) => "delivery",
            EventKind::Postback(_) => "postback",
            EventKind::ReadReceipt(_) => "read",
            EventKind::AccountLink(_) => "account_linking",
            EventKind::Unknown => "unknown",
        }
    }
}

/// One classified event, scoped to a single webhook invocation.
#[derive(Debug)]
pub struct InboundEvent {
    pub sender_id: String,
    pub recipient_id: String,
    pub timestamp_ms: i64,
    pub kind: EventKind,
}

/// Classify one raw event. Marker precedence is fixed: optin, message,
/// delivery, postback, read, account_linking. Total — never fails.
pub fn classify(raw: RawEvent) -> InboundEvent {
    let sender_id = raw.sender.map(|p| p.id).unwrap_or_default();
    let recipient_id = raw.recipient.map(|p| p.id).unwrap_or_default();
    let timestamp_ms = raw.timestamp.unwrap_or(0);
    let kind = if let Some(optin) = raw.optin {
        EventKind::Authentication(optin)
    } else if let Some(message) = raw.message {
        EventKind::Message(message)
    } else if let Some(delivery) = raw.delivery {
        EventKind::DeliveryReceipt(delivery)
    } else if let Some(postback) = raw.postback {
        EventKind::Postback(postback)
    } else if let Some(read) = raw.read {
        EventKind::ReadReceipt(read)
    } else if let Some(link) = raw.account_linking {
        EventKind::AccountLink(link)
    } else {
        EventKind::Unknown
    };
    InboundEvent {
        sender_id,
        recipient_id,
        timestamp_ms,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawEvent {
        serde_json::from_str(json).expect("valid event json")
    }

    #[test]
    fn classifies_each_marker() {
        let cases = [
            (r#"{"optin":{"ref":"x"}}"#, "authentication"),
            (r#"{"message":{"mid":"m1","text":"hi"}}"#, "message"),
            (r#"{"delivery":{"watermark":5}}"#, "delivery"),
            (r#"{"postback":{"payload":"LATEST"}}"#, "postback"),
            (r#"{"read":{"watermark":5}}"#, "read"),
            (r#"{"account_linking":{"status":"linked"}}"#, "account_linking"),
            (r#"{"timestamp":1}"#, "unknown"),
        ];
        for (json, expected) in cases {
            assert_eq!(classify(raw(json)).kind.name(), expected, "for {json}");
        }
    }

    #[test]
    fn optin_takes_precedence_over_message() {
        let event = raw(r#"{"optin":{"ref":"x"},"message":{"mid":"m1","text":"hi"}}"#);
        assert!(matches!(classify(event).kind, EventKind::Authentication(_)));
    }

    #[test]
    fn decodes_sender_and_timestamp() {
        let event = raw(
            r#"{"sender":{"id":"user-1"},"recipient":{"id":"page-1"},"timestamp":1485,"postback":{"payload":"RANDOM"}}"#,
        );
        let inbound = classify(event);
        assert_eq!(inbound.sender_id, "user-1");
        assert_eq!(inbound.recipient_id, "page-1");
        assert_eq!(inbound.timestamp_ms, 1485);
    }

    #[test]
    fn decodes_quick_reply_and_sticker() {
        let event = raw(
            r#"{"message":{"mid":"m2","attachments":[{"type":"image","payload":{"sticker_id":369239263222822}}],"quick_reply":{"payload":"RANDOM"}}}"#,
        );
        let EventKind::Message(msg) = classify(event).kind else {
            panic!("expected message kind");
        };
        assert_eq!(msg.quick_reply.map(|q| q.payload).as_deref(), Some("RANDOM"));
        let attachments = msg.attachments.expect("attachments");
        assert_eq!(
            attachments[0].payload.as_ref().and_then(|p| p.sticker_id),
            Some(369239263222822)
        );
    }

    #[test]
    fn decodes_batched_payload() {
        let payload: WebhookPayload = serde_json::from_str(
            r#"{"object":"page","entry":[{"id":"p1","time":1,"messaging":[{"message":{"mid":"a"}},{"postback":{"payload":"ABOUT"}}]}]}"#,
        )
        .expect("valid payload");
        assert_eq!(payload.object, "page");
        assert_eq!(payload.entry[0].messaging.len(), 2);
    }
}
