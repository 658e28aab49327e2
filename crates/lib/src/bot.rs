//! Conversation orchestrator: one stateless dialogue turn per inbound event.
//!
//! Each turn runs an ordered sequence of sends (and at most two content
//! fetches), built as data and executed step by step: a send is issued only
//! after the previous one succeeded, and the first failure aborts the rest
//! of the sequence. Failures are logged with the action, recipient, and
//! failing step; they are never surfaced to the webhook handler.

use crate::comics::{Comic, ComicClient};
use crate::dispatch::{dispatch, DialogueAction, PAYLOAD_LATEST, PAYLOAD_RANDOM};
use crate::events::{EventKind, InboundEvent, MessageEvent};
use crate::messenger::{OutboundMessage, QuickReply, SendApiClient};

/// Well-known sticker id the platform sends for the thumbs-up button.
const THUMBS_UP_STICKER_ID: i64 = 369239263222822;

const INTRO_TEXT: &str = "Welcome to xkcd comics bot!";
const FETCH_APOLOGY_TEXT: &str = "Sorry, I am having trouble getting content from xkcd.";

/// Drives dialogue turns. Holds only immutable clients; every turn is
/// independent and nothing persists across turns.
#[derive(Clone)]
pub struct Bot {
    send_api: SendApiClient,
    comics: ComicClient,
}

impl Bot {
    pub fn new(send_api: SendApiClient, comics: ComicClient) -> Self {
        Self { send_api, comics }
    }

    /// Entry point for one classified event. Never returns an error: every
    /// failure terminates the turn after logging.
    pub async fn handle_event(&self, event: InboundEvent) {
        let sender = event.sender_id.clone();
        match event.kind {
            EventKind::Authentication(optin) => {
                log::info!(
                    "authentication from {} (ref {:?}) at {}",
                    sender,
                    optin.pass_through,
                    event.timestamp_ms
                );
                self.send_all("authentication", &[OutboundMessage::text(
                    sender.as_str(),
                    "Authentication successful",
                )])
                .await;
            }
            EventKind::Message(message) => self.handle_message(&sender, message).await,
            EventKind::DeliveryReceipt(delivery) => {
                log::debug!(
                    "delivery receipt from {}: watermark {:?}",
                    sender,
                    delivery.watermark
                );
            }
            EventKind::Postback(postback) => {
                log::info!("postback from {} with payload {:?}", sender, postback.payload);
                self.run_action(&sender, dispatch(&postback.payload)).await;
            }
            EventKind::ReadReceipt(read) => {
                log::debug!("read receipt from {}: watermark {:?}", sender, read.watermark);
            }
            EventKind::AccountLink(link) => {
                log::info!(
                    "account link event from {}: status {:?}",
                    sender,
                    link.status
                );
            }
            EventKind::Unknown => {
                log::warn!("unclassified event from {:?}, dropping", sender);
            }
        }
    }

    async fn handle_message(&self, sender: &str, message: MessageEvent) {
        if message.is_echo {
            log::debug!("echo of message {:?}, ignoring", message.mid);
            return;
        }
        if let Some(quick_reply) = message.quick_reply {
            log::info!(
                "quick reply from {} with payload {:?}",
                sender,
                quick_reply.payload
            );
            self.run_action(sender, dispatch(&quick_reply.payload)).await;
            return;
        }
        if message.text.is_some() {
            self.send_all("options", &[options_prompt(sender)]).await;
        } else if let Some(attachments) = message.attachments {
            let sticker_id = attachments
                .first()
                .and_then(|a| a.payload.as_ref())
                .and_then(|p| p.sticker_id);
            if sticker_id == Some(THUMBS_UP_STICKER_ID) {
                self.send_all(
                    "thumbs-up",
                    &[OutboundMessage::text(sender, "=)"), read_more_prompt(sender)],
                )
                .await;
            } else {
                self.send_all(
                    "attachment",
                    &[OutboundMessage::text(sender, "Message with attachment received")],
                )
                .await;
            }
        } else {
            log::debug!("message from {} with neither text nor attachments", sender);
        }
    }

    async fn run_action(&self, sender: &str, action: DialogueAction) {
        match action {
            DialogueAction::GetStarted => self.send_intro(sender).await,
            DialogueAction::ShowAbout => self.send_about(sender).await,
            DialogueAction::ShowLatest => self.send_latest(sender).await,
            // The "read another one?" prompt asks for one more comic.
            DialogueAction::ShowRandom | DialogueAction::ReadMore => {
                self.send_random(sender).await
            }
            DialogueAction::Unrecognized => {
                self.send_all(
                    "unrecognized",
                    &[OutboundMessage::text(sender, "Payload received.")],
                )
                .await;
            }
        }
    }

    /// Greeting for the Get Started button. A failed or empty profile lookup
    /// degrades to a single generic greeting; it is not an error.
    async fn send_intro(&self, sender: &str) {
        let first_name = match self.send_api.first_name(sender).await {
            Ok(name) => name,
            Err(e) => {
                log::warn!("intro: profile lookup for {} failed: {}", sender, e);
                None
            }
        };
        let steps = match first_name {
            Some(name) => vec![
                OutboundMessage::text(sender, format!("Hi {}. {}", name, INTRO_TEXT)),
                OutboundMessage::text(
                    sender,
                    "Here, you will have access to all your favorite xkcd comics.",
                ),
                OutboundMessage::text(sender, "Let's get started. Hope you enjoy it!!"),
                options_prompt(sender),
            ],
            None => vec![OutboundMessage::text(sender, INTRO_TEXT)],
        };
        self.send_all("intro", &steps).await;
    }

    async fn send_about(&self, sender: &str) {
        let steps = [
            OutboundMessage::text(sender, "xkcd comics bot is an open-source project."),
            OutboundMessage::text(
                sender,
                "To contribute or give feedback, please visit the project repository.",
            ),
            OutboundMessage::text(
                sender,
                "This bot is not affiliated with xkcd.com. Thanks for visiting us.",
            ),
        ];
        self.send_all("about", &steps).await;
    }

    async fn send_latest(&self, sender: &str) {
        match self.comics.fetch_latest().await {
            Ok(comic) => {
                let lead = format!("Here is the latest comic (#{}) from xkcd.", comic.num);
                let steps = comic_sequence(sender, &lead, &comic);
                self.send_all("latest", &steps).await;
            }
            Err(e) => {
                log::warn!("latest: fetch failed for {}: {}", sender, e);
                self.send_all("latest", &[OutboundMessage::text(sender, FETCH_APOLOGY_TEXT)])
                    .await;
            }
        }
    }

    /// Random comic: the latest id bounds the draw, then the recency bias
    /// shifts low picks upward. Fetch failure at either stage sends the same
    /// apology as the latest-comic path.
    async fn send_random(&self, sender: &str) {
        let picked = match self.comics.fetch_latest().await {
            Ok(latest) => pick_random_num(latest.num),
            Err(e) => {
                log::warn!("random: fetching latest id for {} failed: {}", sender, e);
                self.send_all("random", &[OutboundMessage::text(sender, FETCH_APOLOGY_TEXT)])
                    .await;
                return;
            }
        };
        log::debug!("random comic pick: #{}", picked);
        match self.comics.fetch_by_num(picked).await {
            Ok(comic) => {
                let lead = format!("Sure! Here is a random comic (#{}) from xkcd.", comic.num);
                let steps = comic_sequence(sender, &lead, &comic);
                self.send_all("random", &steps).await;
            }
            Err(e) => {
                log::warn!("random: fetching #{} for {} failed: {}", picked, sender, e);
                self.send_all("random", &[OutboundMessage::text(sender, FETCH_APOLOGY_TEXT)])
                    .await;
            }
        }
    }

    /// Execute an ordered sequence: each send waits for the previous
    /// outcome, and the first failure suppresses the remaining steps.
    async fn send_all(&self, action: &str, steps: &[OutboundMessage]) {
        for (i, step) in steps.iter().enumerate() {
            if let Err(e) = self.send_api.send(step).await {
                log::warn!(
                    "{}: send {}/{} to {} failed, aborting remaining sends: {}",
                    action,
                    i + 1,
                    steps.len(),
                    step.recipient_id,
                    e
                );
                return;
            }
        }
    }
}

/// The four-step comic reply: announcement, quoted title, image, prompt.
fn comic_sequence(recipient: &str, lead: &str, comic: &Comic) -> Vec<OutboundMessage> {
    vec![
        OutboundMessage::text(recipient, lead),
        OutboundMessage::text(recipient, format!("\"{}\"", comic.safe_title)),
        OutboundMessage::image(recipient, comic.image_url()),
        read_more_prompt(recipient),
    ]
}

fn options_prompt(recipient: &str) -> OutboundMessage {
    OutboundMessage::quick_replies(
        recipient,
        "What do you want to read?",
        vec![
            QuickReply::new("latest xkcd", PAYLOAD_LATEST),
            QuickReply::new("random xkcd", PAYLOAD_RANDOM),
        ],
    )
}

fn read_more_prompt(recipient: &str) -> OutboundMessage {
    OutboundMessage::quick_replies(
        recipient,
        "Do you want to read another one?",
        vec![QuickReply::new("Show me more!", PAYLOAD_RANDOM)],
    )
}

/// Ids below 1700 get shifted up by 100: a deliberate, documented skew
/// toward newer comics, not a uniformity bug.
fn bias_recent(raw: u32) -> u32 {
    if raw < 1700 {
        raw + 100
    } else {
        raw
    }
}

/// Pick a comic number: uniform in [1, latest], then recency-biased.
fn pick_random_num(latest: u32) -> u32 {
    bias_recent(fastrand::u32(1..=latest.max(1)))
}
