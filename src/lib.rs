//! docker-lock-bot - A GitHub App that keeps a `docker-lock` lockfile current.
//!
//! On a schedule, each installed repository gets a pass: the lockfile is
//! regenerated and, if it changed, committed to a dedicated branch with a PR
//! against the default branch. When a PR is closed the branch is deleted.

pub mod config;
pub mod credentials;
pub mod effects;
pub mod generator;
pub mod github;
pub mod reconcile;
pub mod scheduler;
pub mod server;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;
