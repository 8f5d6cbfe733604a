//! GitHub API effect types.
//!
//! These types describe the repository operations the reconciler needs as
//! data, without executing them. The interpreter in `crate::github` executes
//! them against the real GitHub API; tests execute them against an in-memory
//! repository.

use serde::{Deserialize, Serialize};

use crate::types::{PrNumber, Sha};

/// A GitHub API effect.
///
/// Each variant describes a GitHub API operation. Effects are repo-scoped:
/// the interpreter is constructed with a `RepoId`, so effects don't include it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GitHubEffect {
    // ─── Queries ──────────────────────────────────────────────────────────────
    /// Look up the repository's default branch name.
    GetDefaultBranch,

    /// Resolve a branch name to the SHA of its tip commit.
    GetBranchTip { branch: String },

    /// List the entries of a directory at the tip of a branch.
    ///
    /// `path` is relative to the repository root; the empty string lists the
    /// root itself.
    ListDirectory { path: String, branch: String },

    /// List open PRs matching a head branch and base branch.
    ///
    /// `head` is a bare branch name in this repository; the interpreter adds
    /// the `owner:` prefix GitHub expects.
    ListOpenPrs { head: String, base: String },

    // ─── Mutations ────────────────────────────────────────────────────────────
    /// Create a branch pointing at the given commit.
    CreateBranch { branch: String, sha: Sha },

    /// Create or update a file on a branch.
    ///
    /// `content` is the base64-encoded file body. `prior_sha` is the blob SHA
    /// of the file currently on the branch, if any; GitHub rejects an update
    /// to an existing file without it, and rejects a stale one.
    PutFile {
        path: String,
        branch: String,
        message: String,
        content: String,
        prior_sha: Option<Sha>,
    },

    /// Delete a branch.
    DeleteBranch { branch: String },

    /// Open a pull request.
    CreatePr {
        title: String,
        body: String,
        head: String,
        base: String,
    },
}

impl GitHubEffect {
    /// Short name of the variant, for logs and call records.
    pub fn name(&self) -> &'static str {
        match self {
            GitHubEffect::GetDefaultBranch => "get_default_branch",
            GitHubEffect::GetBranchTip { .. } => "get_branch_tip",
            GitHubEffect::ListDirectory { .. } => "list_directory",
            GitHubEffect::ListOpenPrs { .. } => "list_open_prs",
            GitHubEffect::CreateBranch { .. } => "create_branch",
            GitHubEffect::PutFile { .. } => "put_file",
            GitHubEffect::DeleteBranch { .. } => "delete_branch",
            GitHubEffect::CreatePr { .. } => "create_pr",
        }
    }

    /// Returns true if executing this effect can change repository state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            GitHubEffect::CreateBranch { .. }
                | GitHubEffect::PutFile { .. }
                | GitHubEffect::DeleteBranch { .. }
                | GitHubEffect::CreatePr { .. }
        )
    }
}

// ─── Response Types ───────────────────────────────────────────────────────────

/// Outcome of a create-style mutation.
///
/// "Already exists" is an expected answer when passes overlap, so it is part
/// of the result type instead of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum MutationOutcome<T> {
    /// The object was created.
    Created(T),
    /// An equivalent object already existed; nothing was changed.
    AlreadyExists,
    /// The request was rejected for another reason.
    Failed { reason: String },
}

/// Outcome of deleting a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The branch existed and was deleted.
    Deleted,
    /// The branch did not exist.
    Missing,
    /// The delete was rejected for another reason.
    Failed { reason: String },
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
}

/// A single entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    /// The file name (last path component).
    pub name: String,
    /// The full path relative to the repository root.
    pub path: String,
    /// Blob SHA of the entry; this is the file's revision marker.
    pub sha: Sha,
    pub kind: EntryKind,
}

/// PR data returned from the GitHub API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrData {
    /// The PR number.
    pub number: PrNumber,
    /// The head branch name.
    pub head_ref: String,
    /// The base branch name.
    pub base_ref: String,
}

/// Response from a GitHub effect.
///
/// Each variant corresponds to the response from a particular effect type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GitHubResponse {
    /// Response to `GetDefaultBranch`.
    DefaultBranch(String),

    /// Response to `GetBranchTip`.
    BranchTip(Sha),

    /// Response to `ListDirectory`. Empty when the directory or branch does
    /// not exist.
    Directory(Vec<ContentEntry>),

    /// Response to `ListOpenPrs`.
    PrList(Vec<PrData>),

    /// Response to `CreateBranch`.
    BranchCreated(MutationOutcome<Sha>),

    /// Response to `PutFile`.
    FileWritten {
        /// Blob SHA of the new file content.
        content_sha: Sha,
        /// SHA of the commit that wrote it.
        commit_sha: Sha,
    },

    /// Response to `DeleteBranch`.
    BranchDeleted(DeleteOutcome),

    /// Response to `CreatePr`.
    PrCreated(MutationOutcome<PrNumber>),
}

impl GitHubResponse {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            GitHubResponse::DefaultBranch(_) => "default_branch",
            GitHubResponse::BranchTip(_) => "branch_tip",
            GitHubResponse::Directory(_) => "directory",
            GitHubResponse::PrList(_) => "pr_list",
            GitHubResponse::BranchCreated(_) => "branch_created",
            GitHubResponse::FileWritten { .. } => "file_written",
            GitHubResponse::BranchDeleted(_) => "branch_deleted",
            GitHubResponse::PrCreated(_) => "pr_created",
        }
    }
}
