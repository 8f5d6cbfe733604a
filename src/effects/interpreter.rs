use std::future::Future;

use super::github::{GitHubEffect, GitHubResponse};

/// Executes [`GitHubEffect`]s against a single repository.
///
/// The repository is fixed when the interpreter is built, so nothing in an
/// effect names it. Production code uses [`crate::github::OctocrabClient`];
/// reconciler tests use an in-memory repository.
///
/// `Err` is reserved for transport and API failures. A branch or PR that
/// already exists, or a branch that is already gone, comes back as an
/// outcome inside the response.
pub trait GitHubInterpreter {
    type Error;

    fn interpret(
        &self,
        effect: GitHubEffect,
    ) -> impl Future<Output = Result<GitHubResponse, Self::Error>> + Send;
}
