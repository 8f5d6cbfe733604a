//! GitHub webhook payload parser.
//!
//! # Parsing Strategy
//!
//! 1. The event type is determined from the `X-GitHub-Event` header
//! 2. `pull_request` payloads are parsed; any action but `closed` is ignored
//! 3. Other event types (including `ping`) return `Ok(None)`
//! 4. Malformed payloads, and deliveries without an installation, return `Err`

use serde::Deserialize;
use thiserror::Error;

use crate::types::{InstallationId, PrNumber, RepoId};

use super::events::{GitHubEvent, PullRequestClosedEvent};

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The delivery was not sent on behalf of an App installation.
    #[error("payload has no installation")]
    MissingInstallation,
}

/// Parses a webhook payload into a typed event.
///
/// * `Ok(Some(event))` - a delivery the bot acts on
/// * `Ok(None)` - an event type or action the bot ignores
/// * `Err(e)` - malformed payload
///
/// ```
/// use docker_lock_bot::webhooks::parse_webhook;
///
/// let payload = br#"{
///     "action": "closed",
///     "number": 5,
///     "pull_request": { "number": 5, "merged": false, "head": { "ref": "add-docker-lock" } },
///     "repository": { "owner": { "login": "acme" }, "name": "widgets" },
///     "installation": { "id": 99 }
/// }"#;
///
/// assert!(parse_webhook("pull_request", payload).unwrap().is_some());
/// assert!(parse_webhook("ping", b"{}").unwrap().is_none());
/// ```
pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<Option<GitHubEvent>, ParseError> {
    match event_type {
        "pull_request" => parse_pull_request(payload),
        _ => Ok(None),
    }
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    owner: RawOwner,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawInstallation {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RawBranchRef {
    #[serde(rename = "ref")]
    ref_name: String,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    merged: Option<bool>,
    head: RawBranchRef,
}

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    pull_request: RawPullRequest,
    repository: RawRepository,
    installation: Option<RawInstallation>,
}

/// Just enough of the payload to read the action.
#[derive(Debug, Deserialize)]
struct RawAction {
    action: String,
}

fn parse_pull_request(payload: &[u8]) -> Result<Option<GitHubEvent>, ParseError> {
    let RawAction { action } = serde_json::from_slice(payload)?;
    if action != "closed" {
        return Ok(None);
    }

    let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;
    let installation = raw.installation.ok_or(ParseError::MissingInstallation)?;

    Ok(Some(GitHubEvent::PullRequestClosed(PullRequestClosedEvent {
        repo: RepoId::new(raw.repository.owner.login, raw.repository.name),
        installation: InstallationId(installation.id),
        pr_number: PrNumber(raw.pull_request.number),
        head_branch: raw.pull_request.head.ref_name,
        merged: raw.pull_request.merged.unwrap_or(false),
    })))
}
