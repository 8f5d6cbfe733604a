//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - Parsing of the `pull_request` closed deliveries that trigger cleanup

pub mod events;
pub mod parser;
pub mod signature;

pub use events::{GitHubEvent, PullRequestClosedEvent};
pub use parser::{ParseError, parse_webhook};
pub use signature::{SignatureError, WebhookSecret, parse_signature_header};
