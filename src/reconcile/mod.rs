//! The reconciler: one pass per trigger.
//!
//! A scheduled pass regenerates the lockfile and, if it changed, pushes it to
//! the working branch and makes sure a PR from that branch is open. A
//! close-triggered pass deletes the working branch.
//!
//! # Pass Steps
//!
//! ```text
//! credential ─► default branch ─► generate ─┬─► Unchanged (stop)
//!                                           └─► Changed
//!                                                 │
//!   branch tip ◄──────────────────────────────────┘
//!      │
//!      ▼
//!   create branch (AlreadyExists is fine)
//!      │
//!      ▼
//!   validate artifact ─► look up blob SHA ─► put file
//!      │
//!      ▼
//!   open PR? ─┬─► yes: stop
//!             └─► no: create PR (AlreadyExists / Failed are logged)
//! ```
//!
//! # Concurrency
//!
//! Passes may overlap, including for the same repository. Nothing is locked.
//! Convergence comes from treating "branch already exists" and "PR already
//! open" as forward progress, so any interleaving ends with one branch and at
//! most one open PR.
//!
//! # Failures
//!
//! A pass never returns an error to its caller. The first failing step ends
//! the pass, is logged inside the pass span, and is reported as
//! [`PassOutcome::Aborted`]. There are no retries within a pass; the next
//! trigger starts over from step 1.

mod context;
mod pass;


use std::fmt;

use thiserror::Error;
use tracing::{Instrument, error, info, info_span, warn};

use crate::credentials::{CredentialError, CredentialProvider, Installation};
use crate::effects::{DeleteOutcome, GitHubEffect, GitHubInterpreter, GitHubResponse};
use crate::generator::{ArtifactError, ArtifactGenerator, GeneratorError};
use crate::scheduler::TriggerHandler;
use crate::types::{PrNumber, TraceId, Trigger, TriggerKind};

pub use context::ReconciliationContext;

/// Default name of the branch this bot owns.
pub const DEFAULT_WORKING_BRANCH: &str = "add-docker-lock";

/// Default lockfile name.
pub const DEFAULT_ARTIFACT_FILENAME: &str = "docker-lock.json";

pub const PR_TITLE: &str = "🐳🔐🤖";
pub const PR_BODY: &str = "Updated Lockfile.";
pub const COMMIT_MESSAGE: &str = "Updated Lockfile.";

/// Static reconciler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Branch the lockfile is pushed to and PRs are opened from.
    pub working_branch: String,

    /// Path of the lockfile, relative to the repository root.
    pub artifact_filename: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        ReconcilerConfig {
            working_branch: DEFAULT_WORKING_BRANCH.to_string(),
            artifact_filename: DEFAULT_ARTIFACT_FILENAME.to_string(),
        }
    }
}

/// The step a pass was on when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Credential,
    DefaultBranch,
    Scratch,
    Generate,
    BranchTip,
    CreateBranch,
    ReadArtifact,
    LookupFile,
    WriteFile,
    ListPrs,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Credential => "credential",
            Step::DefaultBranch => "default_branch",
            Step::Scratch => "scratch",
            Step::Generate => "generate",
            Step::BranchTip => "branch_tip",
            Step::CreateBranch => "create_branch",
            Step::ReadArtifact => "read_artifact",
            Step::LookupFile => "lookup_file",
            Step::WriteFile => "write_file",
            Step::ListPrs => "list_prs",
        };
        f.write_str(name)
    }
}

/// Why a pass stopped early.
#[derive(Debug, Error)]
pub enum PassError {
    #[error("credential acquisition failed: {0}")]
    Credential(#[source] CredentialError),

    #[error("failed to create scratch directory: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("generator failed: {0}")]
    Generator(#[source] GeneratorError),

    #[error("artifact rejected: {0}")]
    Artifact(#[source] ArtifactError),

    #[error("branch creation rejected: {reason}")]
    CreateBranch { reason: String },

    #[error("{step} failed: {reason}")]
    Client { step: Step, reason: String },

    #[error("{step} got unexpected response {got}")]
    UnexpectedResponse { step: Step, got: &'static str },
}

impl PassError {
    pub fn step(&self) -> Step {
        match self {
            PassError::Credential(_) => Step::Credential,
            PassError::Scratch(_) => Step::Scratch,
            PassError::Generator(_) => Step::Generate,
            PassError::Artifact(_) => Step::ReadArtifact,
            PassError::CreateBranch { .. } => Step::CreateBranch,
            PassError::Client { step, .. } | PassError::UnexpectedResponse { step, .. } => *step,
        }
    }
}

/// How a scheduled pass ended. Informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The generator reported no change. Nothing was written.
    Unchanged,
    /// The lockfile was pushed and a new PR opened.
    PrOpened(PrNumber),
    /// The lockfile was pushed; a PR was already open.
    PrAlreadyOpen(PrNumber),
    /// The lockfile was pushed but the PR could not be opened.
    PrNotOpened { reason: String },
    /// A step failed.
    Aborted { step: Step, reason: String },
}

/// How a close-triggered cleanup ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Deleted,
    AlreadyGone,
    Failed { reason: String },
}

/// Runs passes. Holds only immutable configuration and collaborators, so one
/// instance is shared by every concurrent pass.
pub struct Reconciler<P, G> {
    credentials: P,
    generator: G,
    config: ReconcilerConfig,
}

impl<P, G> Reconciler<P, G>
where
    P: CredentialProvider + Sync,
    P::Client: Sync,
    <P::Client as GitHubInterpreter>::Error: fmt::Display + Send,
    G: ArtifactGenerator + Sync,
{
    pub fn new(credentials: P, generator: G, config: ReconcilerConfig) -> Self {
        Reconciler {
            credentials,
            generator,
            config,
        }
    }

    /// Runs a scheduled pass for the trigger's repository.
    pub async fn reconcile(&self, trigger: &Trigger) -> PassOutcome {
        let trace_id = TraceId::new();
        let span = info_span!(
            "pass",
            %trace_id,
            owner = %trigger.repo.owner,
            repo = %trigger.repo.repo,
        );

        async move {
            match self.run_pass(trigger).await {
                Ok(outcome) => {
                    info!(outcome = ?outcome, "Pass finished");
                    outcome
                }
                Err(e) => {
                    let step = e.step();
                    error!(step = %step, error = %e, "Pass aborted");
                    PassOutcome::Aborted {
                        step,
                        reason: e.to_string(),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Deletes the working branch after a PR in the repository was closed.
    ///
    /// Never fails: a missing branch is [`CleanupOutcome::AlreadyGone`] and
    /// every other problem is logged and returned as
    /// [`CleanupOutcome::Failed`].
    pub async fn on_pull_request_closed(&self, trigger: &Trigger) -> CleanupOutcome {
        let trace_id = TraceId::new();
        let span = info_span!(
            "cleanup",
            %trace_id,
            owner = %trigger.repo.owner,
            repo = %trigger.repo.repo,
        );

        async move {
            let branch = self.config.working_branch.clone();

            let Installation { client, .. } = match self
                .credentials
                .acquire(&trigger.repo, trigger.installation)
                .await
            {
                Ok(installation) => installation,
                Err(e) => {
                    error!(error = %e, "Cleanup aborted: no credential");
                    return CleanupOutcome::Failed {
                        reason: e.to_string(),
                    };
                }
            };

            let response = client
                .interpret(GitHubEffect::DeleteBranch {
                    branch: branch.clone(),
                })
                .await;

            match response {
                Ok(GitHubResponse::BranchDeleted(DeleteOutcome::Deleted)) => {
                    info!(branch = %branch, "Deleted working branch");
                    CleanupOutcome::Deleted
                }
                Ok(GitHubResponse::BranchDeleted(DeleteOutcome::Missing)) => {
                    info!(branch = %branch, "Working branch already gone");
                    CleanupOutcome::AlreadyGone
                }
                Ok(GitHubResponse::BranchDeleted(DeleteOutcome::Failed { reason })) => {
                    warn!(branch = %branch, reason = %reason, "Failed to delete working branch");
                    CleanupOutcome::Failed { reason }
                }
                Ok(other) => {
                    let reason = format!("unexpected response {}", other.kind());
                    warn!(branch = %branch, reason = %reason, "Failed to delete working branch");
                    CleanupOutcome::Failed { reason }
                }
                Err(e) => {
                    warn!(branch = %branch, error = %e, "Failed to delete working branch");
                    CleanupOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}

impl<P, G> TriggerHandler for Reconciler<P, G>
where
    P: CredentialProvider + Send + Sync,
    P::Client: Send + Sync,
    <P::Client as GitHubInterpreter>::Error: fmt::Display + Send,
    G: ArtifactGenerator + Send + Sync,
{
    async fn handle(&self, trigger: Trigger) {
        match trigger.kind {
            TriggerKind::Scheduled => {
                self.reconcile(&trigger).await;
            }
            TriggerKind::PullRequestClosed => {
                self.on_pull_request_closed(&trigger).await;
            }
        }
    }
}
