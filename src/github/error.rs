//! GitHub API error types.
//!
//! This module categorizes GitHub API failures. The categories drive how the
//! interpreter answers mutating effects:
//!
//! - **AlreadyExists** (HTTP 422 "Reference already exists", "A pull request
//!   already exists") becomes a `MutationOutcome::AlreadyExists` answer
//! - **NotFound** (HTTP 404, or 422 "Reference does not exist" on delete)
//!   becomes a `DeleteOutcome::Missing` answer or an empty directory listing
//! - **Conflict** (HTTP 409) means a stale revision marker on a file update
//! - **Transient** errors are worth another attempt on the next scheduled pass
//! - **Permanent** errors are everything else
//!
//! Nothing is retried within a pass; the kind is recorded for logging and for
//! the outcome mapping above.

use std::fmt;
use thiserror::Error;

/// The kind of GitHub API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubErrorKind {
    /// Server-side or network trouble (5xx, 429, rate-limit 403, timeouts).
    Transient,

    /// The object being created already exists.
    AlreadyExists,

    /// The object being read or deleted does not exist.
    NotFound,

    /// The request conflicts with current state (HTTP 409), e.g. a file
    /// update whose prior SHA is stale.
    Conflict,

    /// Any other rejection.
    Permanent,
}

impl GitHubErrorKind {
    /// Returns true if a later pass may succeed without anything changing.
    pub fn is_transient(&self) -> bool {
        matches!(self, GitHubErrorKind::Transient)
    }
}

/// A GitHub API error with categorization.
#[derive(Debug, Error)]
pub struct GitHubApiError {
    /// The kind of error.
    pub kind: GitHubErrorKind,

    /// The HTTP status code, if available.
    pub status_code: Option<u16>,

    /// A human-readable description of the error.
    pub message: String,

    /// The underlying octocrab error, if available.
    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "GitHub API error (HTTP {}): {}", code, self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl GitHubApiError {
    /// Creates a permanent error without an octocrab source.
    pub fn permanent_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: GitHubErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Categorizes an octocrab error.
    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let status_code = Self::extract_status_code(&err);
        let message = Self::extract_message(&err);
        let kind = classify(status_code, &message);

        Self {
            kind,
            status_code,
            message,
            source: Some(err),
        }
    }

    /// Returns true if the error says the target object is missing.
    pub fn is_not_found(&self) -> bool {
        self.kind == GitHubErrorKind::NotFound
    }

    /// Returns true if the error says the object being created already exists.
    pub fn is_already_exists(&self) -> bool {
        self.kind == GitHubErrorKind::AlreadyExists
    }

    /// Extracts the HTTP status code from an octocrab error, if present.
    ///
    /// API errors carry the status directly. For other variants the rendered
    /// message is scanned; see [`status_from_message`].
    fn extract_status_code(err: &octocrab::Error) -> Option<u16> {
        if let octocrab::Error::GitHub { source, .. } = err {
            return Some(source.status_code.as_u16());
        }

        status_from_message(&err.to_string())
    }

    /// Extracts GitHub's own error message when available.
    fn extract_message(err: &octocrab::Error) -> String {
        match err {
            octocrab::Error::GitHub { source, .. } => {
                let mut message = source.message.clone();
                // Validation details ("Reference already exists") live in `errors`.
                if let Some(errors) = &source.errors {
                    for detail in errors {
                        if let Some(text) = detail.get("message").and_then(|m| m.as_str()) {
                            message.push_str(": ");
                            message.push_str(text);
                        }
                    }
                }
                message
            }
            other => other.to_string(),
        }
    }
}

/// Recovers a status code from a rendered error that did not come with one.
///
/// A bare number is not enough: a serde error at "column 404" is not a 404.
/// Only an explicit `status: N` or a code next to its reason phrase counts.
fn status_from_message(message: &str) -> Option<u16> {
    if let Some(idx) = message.find("status: ") {
        let digits: String = message[idx + 8..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(code) = digits.parse() {
            return Some(code);
        }
    }

    let lower = message.to_lowercase();
    [
        (404u16, "404 not found"),
        (409, "409 conflict"),
        (422, "422 unprocessable"),
        (429, "429 too many requests"),
        (502, "502 bad gateway"),
        (503, "503 service unavailable"),
    ]
    .into_iter()
    .find(|(_, phrase)| lower.contains(phrase))
    .map(|(code, _)| code)
}

/// Categorizes a failure from its status code and message.
///
/// This is a pure function extracted for testability.
pub fn classify(status_code: Option<u16>, message: &str) -> GitHubErrorKind {
    let lower = message.to_lowercase();

    if is_already_exists_message(&lower) {
        return GitHubErrorKind::AlreadyExists;
    }
    if lower.contains("reference does not exist") {
        return GitHubErrorKind::NotFound;
    }

    match status_code {
        Some(404) => GitHubErrorKind::NotFound,
        Some(409) => GitHubErrorKind::Conflict,
        Some(429) => GitHubErrorKind::Transient,
        Some(403) if is_rate_limit_error(&lower) => GitHubErrorKind::Transient,
        Some(code) if (500..600).contains(&code) => GitHubErrorKind::Transient,
        Some(_) => GitHubErrorKind::Permanent,
        None if is_network_error(&lower) => GitHubErrorKind::Transient,
        None => GitHubErrorKind::Permanent,
    }
}

/// Checks if an error message says the object being created already exists.
fn is_already_exists_message(message_lower: &str) -> bool {
    message_lower.contains("reference already exists")
        || message_lower.contains("a pull request already exists")
}

/// Checks if an error message indicates a rate limit.
fn is_rate_limit_error(message_lower: &str) -> bool {
    message_lower.contains("rate limit")
        || message_lower.contains("api rate")
        || message_lower.contains("secondary rate")
        || message_lower.contains("abuse detection")
}

/// Checks if an error message indicates a network-level error.
fn is_network_error(message_lower: &str) -> bool {
    message_lower.contains("timeout")
        || message_lower.contains("connection")
        || message_lower.contains("network")
        || message_lower.contains("dns")
        || message_lower.contains("timed out")
}
