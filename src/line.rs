//! LINE Messaging API surface: webhook payload types, `x-line-signature`
//! verification, and the reply-endpoint client.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use crate::error::{RelayError, Result};

type HmacSha256 = Hmac<Sha256>;

const REPLY_ENDPOINT: &str = "https://api.line.me/v2/bot/message/reply";

// ── Webhook wire types ─────────────────────────────────────────────────────────

/// Webhook request body. LINE may batch several events into one delivery.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// One chat event. `message` and `replyToken` are absent on event kinds we
/// don't handle (follow, unfollow, postback, ...).
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub message: Option<EventMessage>,
    #[serde(rename = "replyToken", default)]
    pub reply_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl WebhookEvent {
    /// The (reply token, text) pair when this is a user text message,
    /// `None` for everything else.
    pub fn text_message(&self) -> Option<(&str, &str)> {
        if self.event_type != "message" {
            return None;
        }
        let message = self.message.as_ref()?;
        if message.message_type != "text" {
            return None;
        }
        let text = message.text.as_deref()?;
        let token = self.reply_token.as_deref()?;
        Some((token, text))
    }
}

// ── Reply wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ReplyMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
struct ReplyRequest<'a> {
    #[serde(rename = "replyToken")]
    reply_token: &'a str,
    messages: Vec<ReplyMessage>,
}

// ── Signature ──────────────────────────────────────────────────────────────────

/// Base64-encoded HMAC-SHA256 of the raw request body, keyed by the channel
/// secret. This is the value LINE sends in `x-line-signature`.
pub fn sign(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

/// Verify an `x-line-signature` header value against the raw body bytes.
/// Comparison happens on the decoded MAC in constant time.
pub fn verify_signature(channel_secret: &str, signature: &str, body: &[u8]) -> bool {
    let Ok(expected) = BASE64.decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

// ── Reply client ───────────────────────────────────────────────────────────────

/// Client for the Messaging API reply endpoint.
pub struct LineClient {
    client: reqwest::Client,
    access_token: String,
    endpoint: String,
}

impl LineClient {
    pub fn new(access_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token,
            endpoint: REPLY_ENDPOINT.to_string(),
        }
    }

    /// Send exactly one text reply for the event that issued `reply_token`.
    /// The token is single-use; the platform rejects a second attempt.
    pub async fn reply(&self, reply_token: &str, text: &str) -> Result<serde_json::Value> {
        let request = ReplyRequest {
            reply_token,
            messages: vec![ReplyMessage {
                message_type: "text".to_string(),
                text: text.to_string(),
            }],
        };

        debug!("Sending reply to LINE");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RelayError::Provider { status, message });
        }

        Ok(response.json().await.unwrap_or(serde_json::Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify_round_trip() {
        let secret = "test_channel_secret";
        let body = br#"{"events":[]}"#;
        let sig = sign(secret, body);
        assert!(verify_signature(secret, &sig, body));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let body = br#"{"events":[]}"#;
        let sig = sign("secret_a", body);
        assert!(!verify_signature("secret_b", &sig, body));
    }

    #[test]
    fn test_verify_rejects_tampered_body() {
        let secret = "test_channel_secret";
        let sig = sign(secret, br#"{"events":[]}"#);
        assert!(!verify_signature(secret, &sig, br#"{"events":[{}]}"#));
    }

    #[test]
    fn test_verify_rejects_garbage_header() {
        assert!(!verify_signature("secret", "not base64 !!!", b"body"));
        assert!(!verify_signature("secret", "", b"body"));
    }

    #[test]
    fn test_payload_deserializes_text_event() {
        let body = r#"{
            "events": [
                {
                    "type": "message",
                    "replyToken": "token-1",
                    "message": { "type": "text", "text": "hello" }
                }
            ]
        }"#;
        let payload: WebhookPayload = serde_json::from_str(body).unwrap();
        assert_eq!(payload.events.len(), 1);
        assert_eq!(
            payload.events[0].text_message(),
            Some(("token-1", "hello"))
        );
    }

    #[test]
    fn test_non_text_events_are_not_text_messages() {
        let body = r#"{
            "events": [
                { "type": "follow", "replyToken": "t" },
                {
                    "type": "message",
                    "replyToken": "t",
                    "message": { "type": "sticker" }
                }
            ]
        }"#;
        let payload: WebhookPayload = serde_json::from_str(body).unwrap();
        assert!(payload.events.iter().all(|e| e.text_message().is_none()));
    }

    #[test]
    fn test_missing_events_field_is_empty_batch() {
        let payload: WebhookPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.events.is_empty());
    }

    #[test]
    fn test_reply_request_wire_names() {
        let request = ReplyRequest {
            reply_token: "token-1",
            messages: vec![ReplyMessage {
                message_type: "text".to_string(),
                text: "hi".to_string(),
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["replyToken"], "token-1");
        assert_eq!(json["messages"][0]["type"], "text");
        assert_eq!(json["messages"][0]["text"], "hi");
    }
}
