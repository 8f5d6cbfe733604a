//! Webhook endpoint handler.
//!
//! Accepts GitHub webhook deliveries, validates signatures, and turns
//! `pull_request` closed events into cleanup triggers. The cleanup itself runs
//! asynchronously on the dispatcher.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::webhooks::{GitHubEvent, ParseError, SignatureError, parse_webhook};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Missing required header.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// Invalid signature.
    #[error("invalid signature")]
    InvalidSignature,

    /// Payload could not be parsed.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] ParseError),

    /// The trigger queue is gone (the process is shutting down).
    #[error("trigger queue closed")]
    QueueClosed,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            WebhookError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Required headers:
///   - `X-GitHub-Event`: Event type (e.g., "pull_request")
///   - `X-Hub-Signature-256`: HMAC-SHA256 signature of the payload
/// - Optional: `X-GitHub-Delivery` (logged)
/// - Body: JSON webhook payload
///
/// # Response
///
/// - 202 Accepted: cleanup queued, or event ignored
/// - 400 Bad Request: missing header or unparseable payload
/// - 401 Unauthorized: invalid signature
/// - 503 Service Unavailable: shutting down
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let delivery = header(&headers, HEADER_DELIVERY).unwrap_or("-").to_string();

    // Verify before parsing anything.
    match app_state
        .webhook_secret()
        .verify(&body, header(&headers, HEADER_SIGNATURE))
    {
        Ok(()) => {}
        Err(SignatureError::Missing) => return Err(WebhookError::MissingHeader(HEADER_SIGNATURE)),
        Err(e) => {
            warn!(delivery = %delivery, error = %e, "Invalid webhook signature");
            return Err(WebhookError::InvalidSignature);
        }
    }

    let event_type = header(&headers, HEADER_EVENT).ok_or(WebhookError::MissingHeader(HEADER_EVENT))?;

    debug!(delivery = %delivery, event_type, "Received webhook");

    let event = match parse_webhook(event_type, &body) {
        Ok(Some(event)) => event,
        Ok(None) => {
            debug!(delivery = %delivery, event_type, "Ignoring webhook");
            return Ok((StatusCode::ACCEPTED, "Ignored"));
        }
        Err(e) => {
            warn!(delivery = %delivery, error = %e, "Unparseable webhook");
            return Err(e.into());
        }
    };

    let GitHubEvent::PullRequestClosed(closed) = &event;
    info!(
        delivery = %delivery,
        owner = %event.repo_id().owner,
        repo = %event.repo_id().repo,
        pr = %closed.pr_number,
        head_branch = %closed.head_branch,
        merged = closed.merged,
        "Pull request closed, queueing cleanup"
    );

    let trigger = event.into_trigger();

    app_state
        .triggers()
        .send(trigger)
        .await
        .map_err(|_| WebhookError::QueueClosed)?;

    Ok((StatusCode::ACCEPTED, "Accepted"))
}

/// Returns a header value if present and valid UTF-8.
fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
