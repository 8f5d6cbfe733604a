//! GitHub API client and effect interpreter.
//!
//! This module executes `GitHubEffect`s via the octocrab library and provides
//! GitHub App authentication.
//!
//! Key features:
//! - Classifies failures (already-exists, not-found, transient, permanent)
//! - Maps races on branch and PR creation to tagged outcomes instead of errors
//! - No retries: a failed call fails the step, and the next trigger starts over

mod client;
mod error;
mod installations;
mod interpreter;

pub use client::OctocrabClient;
pub use error::{GitHubApiError, GitHubErrorKind, classify};
pub use installations::{AppInstallations, EnumerationError};
pub use interpreter::{encode_path, interpret_github_effect};
