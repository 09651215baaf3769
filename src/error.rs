use thiserror::Error;

/// Error kinds surfaced by the webhook relay.
///
/// `SignatureInvalid` short-circuits to 403 before any event is touched.
/// `Provider` and `Transport` are absorbed per event and replaced with the
/// fallback reply text; anything else escaping the per-request flow becomes
/// the 500 outer response.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("webhook signature missing or invalid")]
    SignatureInvalid,

    #[error("provider error ({status}): {message}")]
    Provider {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
