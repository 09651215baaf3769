//! The webhook relay itself: liveness short-circuit, signature gate,
//! per-event fan-out to Gemini, and one reply per text event.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::error::{RelayError, Result};
use crate::gemini::GeminiClient;
use crate::line::{self, LineClient, WebhookEvent, WebhookPayload};

const SIGNATURE_HEADER: &str = "x-line-signature";

const LIVENESS_BODY: &str = "LINE Chatbot is running!";

/// Reply when Gemini answers but produces no usable text.
const FALLBACK_UNAVAILABLE: &str = "ขออภัยค่ะ ไม่สามารถประมวลผลคำขอได้ในขณะนี้";

/// Reply when the Gemini call itself fails.
const FALLBACK_AI_ERROR: &str = "ขออภัยค่ะ เกิดข้อผิดพลาดในการเชื่อมต่อกับ AI";

/// Single-turn text generation. Implemented by [`GeminiClient`]; tests
/// substitute recording fakes.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        GeminiClient::generate(self, prompt).await
    }
}

/// The platform's reply operation. Implemented by [`LineClient`].
#[async_trait]
pub trait ReplyApi: Send + Sync {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<Value>;
}

#[async_trait]
impl ReplyApi for LineClient {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<Value> {
        LineClient::reply(self, reply_token, text).await
    }
}

/// Shared request-handler state: the read-once channel secret plus the two
/// injected clients. Nothing here mutates after construction.
pub struct AppState {
    channel_secret: String,
    generator: Arc<dyn TextGenerator>,
    replies: Arc<dyn ReplyApi>,
}

impl AppState {
    pub fn new(
        channel_secret: String,
        generator: Arc<dyn TextGenerator>,
        replies: Arc<dyn ReplyApi>,
    ) -> Self {
        Self {
            channel_secret,
            generator,
            replies,
        }
    }
}

/// Build the router. A single route takes every method so non-POST traffic
/// can double as a liveness probe.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new().route("/", any(webhook)).with_state(state)
}

async fn webhook(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_request(&state, method, &headers, &body).await
}

/// The whole per-request flow:
/// `receive → (liveness short-circuit) → verify signature → per-event:
/// classify → (skip | generate → reply) → aggregate`.
///
/// Signature verification runs over the body bytes exactly as received;
/// parsing happens only after the request is authenticated.
pub async fn handle_request(
    state: &AppState,
    method: Method,
    headers: &HeaderMap,
    body: &Bytes,
) -> Response {
    if method != Method::POST {
        return (StatusCode::OK, LIVENESS_BODY).into_response();
    }

    match process_events(state, headers, body).await {
        Ok(results) => (
            StatusCode::OK,
            Json(json!({ "success": true, "results": results })),
        )
            .into_response(),
        Err(RelayError::SignatureInvalid) => {
            warn!("Invalid LINE signature; rejecting webhook");
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
        Err(e) => {
            error!("Error processing LINE webhook: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Internal Server Error",
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// Authenticate, then parse and handle every event concurrently. Waits for
/// the full batch before returning; one result entry per event, in input
/// order. Anything here that is not absorbed per event maps to 500, except
/// the signature gate, which maps to 403.
async fn process_events(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Vec<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !line::verify_signature(&state.channel_secret, signature, body) {
        return Err(RelayError::SignatureInvalid);
    }

    let payload: WebhookPayload = serde_json::from_slice(body)?;

    let outcomes = join_all(
        payload
            .events
            .iter()
            .map(|event| handle_event(state, event)),
    )
    .await;

    outcomes
        .into_iter()
        .map(|outcome| outcome.map(|sent| sent.unwrap_or(Value::Null)))
        .collect()
}

/// Handle one event. Non-text events are a no-op, not an error. Provider
/// failures never escape: the event still gets exactly one reply, carrying
/// the fallback text. A reply-send failure does escape, into the 500 net.
async fn handle_event(state: &AppState, event: &WebhookEvent) -> Result<Option<Value>> {
    let Some((reply_token, text)) = event.text_message() else {
        return Ok(None);
    };

    info!("Received message from user: {text}");

    let reply_text = match state.generator.generate(text).await {
        Ok(generated) if !generated.is_empty() => generated,
        Ok(_) => FALLBACK_UNAVAILABLE.to_string(),
        Err(e) => {
            error!("Error calling Gemini API: {e}");
            FALLBACK_AI_ERROR.to_string()
        }
    };

    let sent = state.replies.reply(reply_token, &reply_text).await?;
    Ok(Some(sent))
}
