//! Scheduled pass steps.

use std::fmt;

use tracing::{debug, error, info, warn};

use crate::credentials::{CredentialProvider, Installation};
use crate::effects::{EntryKind, GitHubEffect, GitHubInterpreter, GitHubResponse, MutationOutcome};
use crate::generator::{ArtifactContent, ArtifactGenerator, GenerateRequest, GeneratorOutcome};
use crate::types::{PrNumber, Sha, Trigger};

use super::{
    COMMIT_MESSAGE, PR_BODY, PR_TITLE, PassError, PassOutcome, Reconciler, ReconciliationContext,
    Step,
};

impl<P, G> Reconciler<P, G>
where
    P: CredentialProvider + Sync,
    P::Client: Sync,
    <P::Client as GitHubInterpreter>::Error: fmt::Display + Send,
    G: ArtifactGenerator + Sync,
{
    pub(super) async fn run_pass(
        &self,
        trigger: &Trigger,
    ) -> Result<PassOutcome, PassError> {
        // 1. Credential
        let Installation { credential, client } = self
            .credentials
            .acquire(&trigger.repo, trigger.installation)
            .await
            .map_err(PassError::Credential)?;
        debug!(expires_at = %credential.expires_at(), "Acquired installation credential");

        // 2. Default branch
        let default_branch = default_branch(&client).await?;

        let ctx = ReconciliationContext {
            repo: trigger.repo.clone(),
            default_branch,
            working_branch: self.config.working_branch.clone(),
            credential,
        };

        // 3. Generate. The scratch directory lives until the pass ends.
        let scratch = tempfile::Builder::new()
            .prefix("docker-lock-")
            .tempdir()
            .map_err(PassError::Scratch)?;

        info!(default_branch = %ctx.default_branch, "Beginning docker lock");
        let run = self
            .generator
            .generate(GenerateRequest {
                token: ctx.credential.expose(),
                repo: &ctx.repo,
                default_branch: &ctx.default_branch,
                working_branch: &ctx.working_branch,
                scratch_dir: scratch.path(),
                artifact_filename: &self.config.artifact_filename,
            })
            .await
            .map_err(|e| {
                error!(error = %e, "docker-lock failed");
                PassError::Generator(e)
            })?;
        debug!(stdout = %run.stdout, stderr = %run.stderr, "Generator output");
        info!("Finished docker lock");

        // 4. Nothing to do
        let artifact = match run.outcome {
            GeneratorOutcome::Unchanged => {
                info!("Lockfile unchanged");
                return Ok(PassOutcome::Unchanged);
            }
            GeneratorOutcome::Changed(artifact) => artifact,
        };

        // 5. Default branch tip
        let tip = branch_tip(&client, &ctx.default_branch).await?;

        // 6. Working branch
        ensure_branch(&client, &ctx, &tip).await?;

        // 7. Lockfile
        let content = artifact.read().await.map_err(PassError::Artifact)?;
        write_artifact(&client, &ctx, &self.config.artifact_filename, &content).await?;

        // 8. Existing PR
        if let Some(pr) = find_open_pr(&client, &ctx).await? {
            info!(pr = %pr, "PR already open");
            return Ok(PassOutcome::PrAlreadyOpen(pr));
        }

        // 9. New PR
        Ok(open_pr(&client, &ctx).await)
    }
}

async fn call<C>(client: &C, step: Step, effect: GitHubEffect) -> Result<GitHubResponse, PassError>
where
    C: GitHubInterpreter,
    C::Error: fmt::Display,
{
    client
        .interpret(effect)
        .await
        .map_err(|e| PassError::Client {
            step,
            reason: e.to_string(),
        })
}

fn unexpected(step: Step, response: &GitHubResponse) -> PassError {
    PassError::UnexpectedResponse {
        step,
        got: response.kind(),
    }
}

async fn default_branch<C>(client: &C) -> Result<String, PassError>
where
    C: GitHubInterpreter,
    C::Error: fmt::Display,
{
    match call(client, Step::DefaultBranch, GitHubEffect::GetDefaultBranch).await? {
        GitHubResponse::DefaultBranch(branch) => Ok(branch),
        other => Err(unexpected(Step::DefaultBranch, &other)),
    }
}

async fn branch_tip<C>(client: &C, branch: &str) -> Result<Sha, PassError>
where
    C: GitHubInterpreter,
    C::Error: fmt::Display,
{
    let effect = GitHubEffect::GetBranchTip {
        branch: branch.to_string(),
    };
    match call(client, Step::BranchTip, effect).await? {
        GitHubResponse::BranchTip(sha) => Ok(sha),
        other => Err(unexpected(Step::BranchTip, &other)),
    }
}

async fn ensure_branch<C>(client: &C, ctx: &ReconciliationContext, tip: &Sha) -> Result<(), PassError>
where
    C: GitHubInterpreter,
    C::Error: fmt::Display,
{
    let effect = GitHubEffect::CreateBranch {
        branch: ctx.working_branch.clone(),
        sha: tip.clone(),
    };
    match call(client, Step::CreateBranch, effect).await? {
        GitHubResponse::BranchCreated(MutationOutcome::Created(sha)) => {
            info!(branch = %ctx.working_branch, sha = %sha.short(), "Created working branch");
            Ok(())
        }
        GitHubResponse::BranchCreated(MutationOutcome::AlreadyExists) => {
            info!(branch = %ctx.working_branch, "Working branch already exists");
            Ok(())
        }
        GitHubResponse::BranchCreated(MutationOutcome::Failed { reason }) => {
            Err(PassError::CreateBranch { reason })
        }
        other => Err(unexpected(Step::CreateBranch, &other)),
    }
}

/// Splits `dir/name` into the directory to list and the entry name.
fn split_path(path: &str) -> (&str, &str) {
    path.rsplit_once('/').unwrap_or(("", path))
}

async fn existing_file_sha<C>(
    client: &C,
    ctx: &ReconciliationContext,
    path: &str,
) -> Result<Option<Sha>, PassError>
where
    C: GitHubInterpreter,
    C::Error: fmt::Display,
{
    let (dir, name) = split_path(path);
    let effect = GitHubEffect::ListDirectory {
        path: dir.to_string(),
        branch: ctx.working_branch.clone(),
    };
    match call(client, Step::LookupFile, effect).await? {
        GitHubResponse::Directory(entries) => Ok(entries
            .into_iter()
            .find(|entry| entry.name == name && entry.kind == EntryKind::File)
            .map(|entry| entry.sha)),
        other => Err(unexpected(Step::LookupFile, &other)),
    }
}

async fn write_artifact<C>(
    client: &C,
    ctx: &ReconciliationContext,
    path: &str,
    content: &ArtifactContent,
) -> Result<(), PassError>
where
    C: GitHubInterpreter,
    C::Error: fmt::Display,
{
    let prior_sha = existing_file_sha(client, ctx, path).await?;
    debug!(path, prior_sha = ?prior_sha.as_ref().map(Sha::short), "Writing lockfile");

    let effect = GitHubEffect::PutFile {
        path: path.to_string(),
        branch: ctx.working_branch.clone(),
        message: COMMIT_MESSAGE.to_string(),
        content: content.to_base64(),
        prior_sha,
    };
    match call(client, Step::WriteFile, effect).await? {
        GitHubResponse::FileWritten { commit_sha, .. } => {
            info!(path, sha = %commit_sha.short(), "Lockfile committed");
            Ok(())
        }
        other => Err(unexpected(Step::WriteFile, &other)),
    }
}

async fn find_open_pr<C>(client: &C, ctx: &ReconciliationContext) -> Result<Option<PrNumber>, PassError>
where
    C: GitHubInterpreter,
    C::Error: fmt::Display,
{
    let effect = GitHubEffect::ListOpenPrs {
        head: ctx.working_branch.clone(),
        base: ctx.default_branch.clone(),
    };
    match call(client, Step::ListPrs, effect).await? {
        GitHubResponse::PrList(prs) => Ok(prs.first().map(|pr| pr.number)),
        other => Err(unexpected(Step::ListPrs, &other)),
    }
}

/// Opens the PR. Every result is a non-fatal end of the pass.
async fn open_pr<C>(client: &C, ctx: &ReconciliationContext) -> PassOutcome
where
    C: GitHubInterpreter,
    C::Error: fmt::Display,
{
    let effect = GitHubEffect::CreatePr {
        title: PR_TITLE.to_string(),
        body: PR_BODY.to_string(),
        head: ctx.working_branch.clone(),
        base: ctx.default_branch.clone(),
    };
    match client.interpret(effect).await {
        Ok(GitHubResponse::PrCreated(MutationOutcome::Created(pr))) => {
            info!(pr = %pr, "Opened PR");
            PassOutcome::PrOpened(pr)
        }
        Ok(GitHubResponse::PrCreated(MutationOutcome::AlreadyExists)) => {
            info!("PR opened concurrently by another pass");
            PassOutcome::PrNotOpened {
                reason: "a pull request already exists".to_string(),
            }
        }
        Ok(GitHubResponse::PrCreated(MutationOutcome::Failed { reason })) => {
            warn!(reason = %reason, "Failed to open PR");
            PassOutcome::PrNotOpened { reason }
        }
        Ok(other) => {
            let reason = format!("unexpected response {}", other.kind());
            warn!(reason = %reason, "Failed to open PR");
            PassOutcome::PrNotOpened { reason }
        }
        Err(e) => {
            warn!(error = %e, "Failed to open PR");
            PassOutcome::PrNotOpened {
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::split_path;

    #[test]
    fn split_path_handles_nesting() {
        assert_eq!(split_path("docker-lock.json"), ("", "docker-lock.json"));
        assert_eq!(split_path("locks/docker-lock.json"), ("locks", "docker-lock.json"));
        assert_eq!(split_path("a/b/c.json"), ("a/b", "c.json"));
    }
}
