//! GitHub effect interpreter using octocrab.
//!
//! This module implements the `GitHubInterpreter` trait, executing GitHub
//! effects against the real GitHub API via octocrab.
//!
//! Key implementation details:
//! - Ref and contents endpoints are called through octocrab's raw REST helpers
//!   so the exact request and response shapes stay visible here
//! - Create-style mutations answer with `MutationOutcome`, turning GitHub's
//!   "already exists" validation failures into a normal outcome
//! - A directory listing of a missing path or branch is an empty listing
//! - No retries: a failed call fails the pass and the next tick tries again

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::effects::{
    ContentEntry, DeleteOutcome, EntryKind, GitHubEffect, GitHubInterpreter, GitHubResponse,
    MutationOutcome, PrData,
};
use crate::types::{PrNumber, Sha};

use super::client::OctocrabClient;
use super::error::GitHubApiError;

impl GitHubInterpreter for OctocrabClient {
    type Error = GitHubApiError;

    async fn interpret(&self, effect: GitHubEffect) -> Result<GitHubResponse, Self::Error> {
        let name = effect.name();
        let result = interpret_github_effect(self, effect).await;
        if let Err(e) = &result {
            warn!(
                repo = %self.repo(),
                effect = name,
                transient = e.kind.is_transient(),
                error = %e,
                "GitHub call failed"
            );
        }
        result
    }
}

/// Interprets a GitHub effect, executing it against the GitHub API.
pub async fn interpret_github_effect(
    client: &OctocrabClient,
    effect: GitHubEffect,
) -> Result<GitHubResponse, GitHubApiError> {
    debug!(repo = %client.repo(), effect = ?effect, "Executing GitHub effect");

    match effect {
        GitHubEffect::GetDefaultBranch => get_default_branch(client).await,
        GitHubEffect::GetBranchTip { branch } => get_branch_tip(client, &branch).await,
        GitHubEffect::ListDirectory { path, branch } => {
            list_directory(client, &path, &branch).await
        }
        GitHubEffect::ListOpenPrs { head, base } => list_open_prs(client, &head, &base).await,
        GitHubEffect::CreateBranch { branch, sha } => create_branch(client, &branch, &sha).await,
        GitHubEffect::PutFile {
            path,
            branch,
            message,
            content,
            prior_sha,
        } => put_file(client, &path, branch, message, content, prior_sha).await,
        GitHubEffect::DeleteBranch { branch } => delete_branch(client, branch).await,
        GitHubEffect::CreatePr {
            title,
            body,
            head,
            base,
        } => create_pr(client, title, body, head, base).await,
    }
}

/// Percent-encodes each segment of a slash-separated path.
///
/// Branch names and file paths may contain `/`, which must stay a separator
/// while every other reserved character is escaped.
///
/// This is a pure function extracted for testability.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn parse_sha(raw: &str, what: &str) -> Result<Sha, GitHubApiError> {
    Sha::parse(raw).map_err(|e| GitHubApiError::permanent_without_source(format!("{what}: {e}")))
}

// ─── Repository & Refs ────────────────────────────────────────────────────────

async fn get_default_branch(client: &OctocrabClient) -> Result<GitHubResponse, GitHubApiError> {
    let repo = client
        .inner()
        .repos(client.owner(), client.repo_name())
        .get()
        .await
        .map_err(GitHubApiError::from_octocrab)?;

    let default_branch = repo.default_branch.ok_or_else(|| {
        GitHubApiError::permanent_without_source(format!(
            "repository {} has no default branch",
            client.repo()
        ))
    })?;

    Ok(GitHubResponse::DefaultBranch(default_branch))
}

#[derive(Debug, Deserialize)]
struct RawRef {
    object: RawRefObject,
}

#[derive(Debug, Deserialize)]
struct RawRefObject {
    sha: String,
}

async fn get_branch_tip(
    client: &OctocrabClient,
    branch: &str,
) -> Result<GitHubResponse, GitHubApiError> {
    let route = client.repo_route(&format!("/git/ref/heads/{}", encode_path(branch)));

    let raw: RawRef = client
        .inner()
        .get(&route, None::<&()>)
        .await
        .map_err(GitHubApiError::from_octocrab)?;

    Ok(GitHubResponse::BranchTip(parse_sha(
        &raw.object.sha,
        "invalid branch tip SHA",
    )?))
}

async fn create_branch(
    client: &OctocrabClient,
    branch: &str,
    sha: &Sha,
) -> Result<GitHubResponse, GitHubApiError> {
    #[derive(Serialize)]
    struct CreateRefRequest<'a> {
        #[serde(rename = "ref")]
        ref_name: String,
        sha: &'a str,
    }

    let route = client.repo_route("/git/refs");
    let request = CreateRefRequest {
        ref_name: format!("refs/heads/{branch}"),
        sha: sha.as_str(),
    };

    let result: Result<RawRef, _> = client.inner().post(&route, Some(&request)).await;

    let outcome = match result {
        Ok(raw) => MutationOutcome::Created(parse_sha(&raw.object.sha, "invalid new ref SHA")?),
        Err(e) => {
            let err = GitHubApiError::from_octocrab(e);
            if err.is_already_exists() {
                MutationOutcome::AlreadyExists
            } else {
                warn!(branch, error = %err, kind = ?err.kind, "Branch creation rejected");
                MutationOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    };

    Ok(GitHubResponse::BranchCreated(outcome))
}

async fn delete_branch(
    client: &OctocrabClient,
    branch: String,
) -> Result<GitHubResponse, GitHubApiError> {
    let result = client
        .inner()
        .repos(client.owner(), client.repo_name())
        .delete_ref(&octocrab::params::repos::Reference::Branch(branch.clone()))
        .await;

    let outcome = match result {
        Ok(()) => DeleteOutcome::Deleted,
        Err(e) => {
            let err = GitHubApiError::from_octocrab(e);
            if err.is_not_found() {
                DeleteOutcome::Missing
            } else {
                warn!(branch = %branch, error = %err, kind = ?err.kind, "Branch deletion rejected");
                DeleteOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    };

    Ok(GitHubResponse::BranchDeleted(outcome))
}

// ─── Contents ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawContentEntry {
    name: String,
    path: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
}

/// The contents endpoint returns an array for directories and an object for
/// files.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawContents {
    Dir(Vec<RawContentEntry>),
    File(RawContentEntry),
}

fn parse_entry_kind(kind: &str) -> Option<EntryKind> {
    match kind {
        "file" => Some(EntryKind::File),
        "dir" => Some(EntryKind::Dir),
        "symlink" => Some(EntryKind::Symlink),
        "submodule" => Some(EntryKind::Submodule),
        _ => None,
    }
}

async fn list_directory(
    client: &OctocrabClient,
    path: &str,
    branch: &str,
) -> Result<GitHubResponse, GitHubApiError> {
    let route = client.repo_route(&format!(
        "/contents/{}?ref={}",
        encode_path(path),
        urlencoding::encode(branch)
    ));

    let result: Result<RawContents, _> = client.inner().get(&route, None::<&()>).await;

    let raw_entries = match result {
        Ok(RawContents::Dir(entries)) => entries,
        Ok(RawContents::File(entry)) => vec![entry],
        Err(e) => {
            let err = GitHubApiError::from_octocrab(e);
            if err.is_not_found() {
                debug!(path, branch, "Directory not found, treating as empty");
                return Ok(GitHubResponse::Directory(Vec::new()));
            }
            return Err(err);
        }
    };

    let mut entries = Vec::with_capacity(raw_entries.len());
    for raw in raw_entries {
        let Some(kind) = parse_entry_kind(&raw.kind) else {
            warn!(path = %raw.path, kind = %raw.kind, "Skipping entry of unknown type");
            continue;
        };
        let sha = match Sha::parse(&raw.sha) {
            Ok(sha) => sha,
            Err(e) => {
                warn!(path = %raw.path, error = %e, "Skipping entry with invalid SHA");
                continue;
            }
        };
        entries.push(ContentEntry {
            name: raw.name,
            path: raw.path,
            sha,
            kind,
        });
    }

    Ok(GitHubResponse::Directory(entries))
}

#[derive(Debug, Serialize)]
struct PutFileRequest {
    message: String,
    content: String,
    branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PutFileResponse {
    content: RawObjectSha,
    commit: RawObjectSha,
}

#[derive(Debug, Deserialize)]
struct RawObjectSha {
    sha: String,
}

async fn put_file(
    client: &OctocrabClient,
    path: &str,
    branch: String,
    message: String,
    content: String,
    prior_sha: Option<Sha>,
) -> Result<GitHubResponse, GitHubApiError> {
    let route = client.repo_route(&format!("/contents/{}", encode_path(path)));
    let request = PutFileRequest {
        message,
        content,
        branch,
        sha: prior_sha.map(|sha| sha.as_str().to_string()),
    };

    let response: PutFileResponse = client
        .inner()
        .put(&route, Some(&request))
        .await
        .map_err(GitHubApiError::from_octocrab)?;

    Ok(GitHubResponse::FileWritten {
        content_sha: parse_sha(&response.content.sha, "invalid content SHA in response")?,
        commit_sha: parse_sha(&response.commit.sha, "invalid commit SHA in response")?,
    })
}

// ─── Pull Requests ────────────────────────────────────────────────────────────

async fn list_open_prs(
    client: &OctocrabClient,
    head: &str,
    base: &str,
) -> Result<GitHubResponse, GitHubApiError> {
    let mut page = 1u32;
    let mut all_prs = Vec::new();

    loop {
        let page_result = client
            .inner()
            .pulls(client.owner(), client.repo_name())
            .list()
            .state(octocrab::params::State::Open)
            .head(format!("{}:{}", client.owner(), head))
            .base(base)
            .per_page(100)
            .page(page)
            .send()
            .await
            .map_err(GitHubApiError::from_octocrab)?;

        let items = page_result.items;
        let is_last_page = items.len() < 100;

        all_prs.extend(items.into_iter().map(|pull| PrData {
            number: PrNumber(pull.number),
            head_ref: pull.head.ref_field,
            base_ref: pull.base.ref_field,
        }));

        if is_last_page {
            break;
        }
        page += 1;
    }

    Ok(GitHubResponse::PrList(all_prs))
}

async fn create_pr(
    client: &OctocrabClient,
    title: String,
    body: String,
    head: String,
    base: String,
) -> Result<GitHubResponse, GitHubApiError> {
    let result = client
        .inner()
        .pulls(client.owner(), client.repo_name())
        .create(title, head, base)
        .body(body)
        .maintainer_can_modify(true)
        .send()
        .await;

    let outcome = match result {
        Ok(pull) => MutationOutcome::Created(PrNumber(pull.number)),
        Err(e) => {
            let err = GitHubApiError::from_octocrab(e);
            if err.is_already_exists() {
                MutationOutcome::AlreadyExists
            } else {
                MutationOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    };

    Ok(GitHubResponse::PrCreated(outcome))
}
