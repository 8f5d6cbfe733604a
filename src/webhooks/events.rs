//! GitHub webhook event types.
//!
//! Only one delivery matters to the bot: a `pull_request` event with action
//! `closed`. Everything else is acknowledged and dropped by the parser.

use serde::{Deserialize, Serialize};

use crate::types::{InstallationId, PrNumber, RepoId, Trigger};

/// A parsed webhook event the bot acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GitHubEvent {
    /// A pull request was closed, merged or not.
    PullRequestClosed(PullRequestClosedEvent),
}

impl GitHubEvent {
    /// Returns the repository this event belongs to.
    pub fn repo_id(&self) -> &RepoId {
        match self {
            GitHubEvent::PullRequestClosed(e) => &e.repo,
        }
    }

    /// Converts the event into the trigger the dispatcher runs.
    pub fn into_trigger(self) -> Trigger {
        match self {
            GitHubEvent::PullRequestClosed(e) => Trigger::pull_request_closed(e.repo, e.installation),
        }
    }
}

/// A `pull_request` / `closed` delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestClosedEvent {
    pub repo: RepoId,

    /// The App installation the delivery was sent for.
    pub installation: InstallationId,

    pub pr_number: PrNumber,

    /// The PR's source branch.
    pub head_branch: String,

    pub merged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TriggerKind;

    #[test]
    fn closed_event_becomes_cleanup_trigger() {
        let event = GitHubEvent::PullRequestClosed(PullRequestClosedEvent {
            repo: RepoId::new("acme", "widgets"),
            installation: InstallationId(7),
            pr_number: PrNumber(12),
            head_branch: "add-docker-lock".to_string(),
            merged: true,
        });

        assert_eq!(event.repo_id(), &RepoId::new("acme", "widgets"));

        let trigger = event.into_trigger();
        assert_eq!(trigger.kind, TriggerKind::PullRequestClosed);
        assert_eq!(trigger.repo, RepoId::new("acme", "widgets"));
        assert_eq!(trigger.installation, InstallationId(7));
    }
}
