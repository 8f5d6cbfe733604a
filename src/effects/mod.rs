//! Repository operations as plain data.
//!
//! The reconciler builds [`GitHubEffect`] values and reads back tagged
//! [`GitHubResponse`]s; it never calls the GitHub API directly.

pub mod github;
pub mod interpreter;

pub use github::{
    ContentEntry, DeleteOutcome, EntryKind, GitHubEffect, GitHubResponse, MutationOutcome, PrData,
};
pub use interpreter::GitHubInterpreter;
