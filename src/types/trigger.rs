//! Trigger events that start a pass.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{InstallationId, RepoId};

/// Which channel a trigger arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Periodic scheduler tick: run a reconciliation pass.
    Scheduled,
    /// A pull request in the repository was closed: delete the working branch.
    PullRequestClosed,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Scheduled => write!(f, "scheduled"),
            TriggerKind::PullRequestClosed => write!(f, "pull_request_closed"),
        }
    }
}

/// A repository-scoped event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trigger {
    pub kind: TriggerKind,
    pub repo: RepoId,
    pub installation: InstallationId,
}

impl Trigger {
    pub fn scheduled(repo: RepoId, installation: InstallationId) -> Self {
        Trigger {
            kind: TriggerKind::Scheduled,
            repo,
            installation,
        }
    }

    pub fn pull_request_closed(repo: RepoId, installation: InstallationId) -> Self {
        Trigger {
            kind: TriggerKind::PullRequestClosed,
            repo,
            installation,
        }
    }
}
