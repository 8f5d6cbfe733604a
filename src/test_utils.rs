//! Shared test doubles and arbitrary generators for property-based testing.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Duration, Utc};
use proptest::prelude::*;
use sha2::{Digest, Sha256};

use crate::credentials::{Credential, CredentialError, CredentialProvider, Installation};
use crate::effects::{
    ContentEntry, DeleteOutcome, EntryKind, GitHubEffect, GitHubInterpreter, GitHubResponse,
    MutationOutcome, PrData,
};
use crate::generator::{
    Artifact, ArtifactGenerator, ArtifactRun, GenerateRequest, GeneratorError, GeneratorOutcome,
};
use crate::types::{InstallationId, PrNumber, RepoId, Sha};

pub fn arb_pr_number() -> impl Strategy<Value = PrNumber> {
    any::<u64>().prop_map(PrNumber)
}

pub fn arb_sha() -> impl Strategy<Value = Sha> {
    "[0-9a-f]{40}".prop_map(|s| Sha::parse(s).unwrap())
}

pub fn arb_branch_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9/-]{0,50}".prop_map(String::from)
}

/// Derives a deterministic fake object id from arbitrary bytes.
pub fn fake_sha(seed: &[u8]) -> Sha {
    let digest = Sha256::digest(seed);
    Sha::parse(&hex::encode(digest)[..40]).unwrap()
}

// ─── FakeRepository ───────────────────────────────────────────────────────────

/// Error returned by [`FakeRepository`] for calls it refuses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fake GitHub error: {0}")]
pub struct FakeError(pub String);

/// A file on a branch of the fake repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeFile {
    /// Decoded file body.
    pub content: Vec<u8>,
    pub sha: Sha,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakePr {
    pub number: PrNumber,
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: String,
    pub open: bool,
}

#[derive(Debug, Default)]
struct FakeState {
    default_branch: String,
    /// branch name → tip commit
    branches: HashMap<String, Sha>,
    /// branch name → path → file
    files: HashMap<String, BTreeMap<String, FakeFile>>,
    prs: Vec<FakePr>,
    next_pr: u64,
    commits: u64,
    calls: Vec<GitHubEffect>,
    /// Effect names (see [`GitHubEffect::name`]) that return `Err`.
    failing: HashSet<&'static str>,
    /// Effect names that return a `Failed` outcome.
    rejecting: HashSet<&'static str>,
    /// Open a competing PR just before the next `CreatePr` lands.
    race_next_pr: bool,
}

/// An in-memory repository that interprets `GitHubEffect`s.
///
/// Simulates refs, files and PRs closely enough that reconciler passes can be
/// run against it, concurrently if needed. Every call is recorded.
#[derive(Debug, Clone)]
pub struct FakeRepository {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRepository {
    /// A repository with a single commit on `default_branch`.
    pub fn new(default_branch: &str) -> Self {
        let mut state = FakeState {
            default_branch: default_branch.to_string(),
            next_pr: 1,
            ..FakeState::default()
        };
        state
            .branches
            .insert(default_branch.to_string(), fake_sha(b"initial commit"));
        state.files.insert(default_branch.to_string(), BTreeMap::new());
        FakeRepository {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Creates `branch` at the tip of the default branch.
    pub fn seed_branch(&self, branch: &str) {
        self.with_state(|s| {
            let tip = s.branches[&s.default_branch].clone();
            let files = s.files[&s.default_branch].clone();
            s.branches.insert(branch.to_string(), tip);
            s.files.insert(branch.to_string(), files);
        });
    }

    /// Commits a file directly to `branch`.
    pub fn seed_file(&self, branch: &str, path: &str, content: &[u8]) {
        self.with_state(|s| {
            commit_file(s, branch, path, content.to_vec());
        });
    }

    /// Opens a PR directly.
    pub fn seed_pr(&self, head: &str, base: &str) -> PrNumber {
        self.with_state(|s| open_pr(s, head, base, "seeded", "seeded"))
    }

    /// Makes every call of the named effect return an error.
    pub fn fail(&self, effect: &'static str) {
        self.with_state(|s| {
            s.failing.insert(effect);
        });
    }

    /// Makes every call of the named mutation return a `Failed` outcome.
    pub fn reject(&self, effect: &'static str) {
        self.with_state(|s| {
            s.rejecting.insert(effect);
        });
    }

    /// Opens a competing PR right before the next `CreatePr` is handled.
    pub fn race_next_pr(&self) {
        self.with_state(|s| s.race_next_pr = true);
    }

    pub fn calls(&self) -> Vec<GitHubEffect> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.with_state(|s| s.calls.iter().map(GitHubEffect::name).collect())
    }

    pub fn mutation_count(&self) -> usize {
        self.with_state(|s| s.calls.iter().filter(|c| c.is_mutation()).count())
    }

    pub fn branch_tip(&self, branch: &str) -> Option<Sha> {
        self.with_state(|s| s.branches.get(branch).cloned())
    }

    pub fn default_tip(&self) -> Sha {
        self.with_state(|s| s.branches[&s.default_branch].clone())
    }

    pub fn file(&self, branch: &str, path: &str) -> Option<FakeFile> {
        self.with_state(|s| s.files.get(branch).and_then(|f| f.get(path)).cloned())
    }

    pub fn open_prs(&self) -> Vec<FakePr> {
        self.with_state(|s| s.prs.iter().filter(|pr| pr.open).cloned().collect())
    }

    pub fn close_pr(&self, number: PrNumber) {
        self.with_state(|s| {
            if let Some(pr) = s.prs.iter_mut().find(|pr| pr.number == number) {
                pr.open = false;
            }
        });
    }

    fn apply(&self, effect: GitHubEffect) -> Result<GitHubResponse, FakeError> {
        self.with_state(|s| {
            s.calls.push(effect.clone());
            let name = effect.name();
            if s.failing.contains(name) {
                return Err(FakeError(format!("{name} is failing")));
            }
            let rejected = s.rejecting.contains(name);
            apply_effect(s, effect, rejected)
        })
    }
}

fn commit_file(s: &mut FakeState, branch: &str, path: &str, content: Vec<u8>) -> (Sha, Sha) {
    s.commits += 1;
    let blob = fake_sha(&content);
    let parent = s.branches.get(branch).cloned().unwrap_or_else(|| fake_sha(b"root"));
    let commit = fake_sha(format!("{parent}{blob}{}", s.commits).as_bytes());
    s.branches.insert(branch.to_string(), commit.clone());
    s.files.entry(branch.to_string()).or_default().insert(
        path.to_string(),
        FakeFile {
            content,
            sha: blob.clone(),
        },
    );
    (blob, commit)
}

fn open_pr(s: &mut FakeState, head: &str, base: &str, title: &str, body: &str) -> PrNumber {
    let number = PrNumber(s.next_pr);
    s.next_pr += 1;
    s.prs.push(FakePr {
        number,
        head: head.to_string(),
        base: base.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        open: true,
    });
    number
}

fn has_open_pr(s: &FakeState, head: &str, base: &str) -> bool {
    s.prs
        .iter()
        .any(|pr| pr.open && pr.head == head && pr.base == base)
}

fn apply_effect(
    s: &mut FakeState,
    effect: GitHubEffect,
    rejected: bool,
) -> Result<GitHubResponse, FakeError> {
    let rejection = || "rejected by test".to_string();

    match effect {
        GitHubEffect::GetDefaultBranch => Ok(GitHubResponse::DefaultBranch(s.default_branch.clone())),

        GitHubEffect::GetBranchTip { branch } => s
            .branches
            .get(&branch)
            .cloned()
            .map(GitHubResponse::BranchTip)
            .ok_or_else(|| FakeError(format!("branch {branch} not found"))),

        GitHubEffect::ListDirectory { path, branch } => {
            let prefix = if path.is_empty() {
                String::new()
            } else {
                format!("{}/", path.trim_end_matches('/'))
            };
            let entries = s
                .files
                .get(&branch)
                .map(|files| {
                    files
                        .iter()
                        .filter_map(|(file_path, file)| {
                            let name = file_path.strip_prefix(&prefix)?;
                            (!name.contains('/')).then(|| ContentEntry {
                                name: name.to_string(),
                                path: file_path.clone(),
                                sha: file.sha.clone(),
                                kind: EntryKind::File,
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(GitHubResponse::Directory(entries))
        }

        GitHubEffect::ListOpenPrs { head, base } => Ok(GitHubResponse::PrList(
            s.prs
                .iter()
                .filter(|pr| pr.open && pr.head == head && pr.base == base)
                .map(|pr| PrData {
                    number: pr.number,
                    head_ref: pr.head.clone(),
                    base_ref: pr.base.clone(),
                })
                .collect(),
        )),

        GitHubEffect::CreateBranch { branch, sha } => {
            let outcome = if rejected {
                MutationOutcome::Failed {
                    reason: rejection(),
                }
            } else if s.branches.contains_key(&branch) {
                MutationOutcome::AlreadyExists
            } else {
                let files = s
                    .branches
                    .iter()
                    .find(|(_, tip)| **tip == sha)
                    .and_then(|(source, _)| s.files.get(source).cloned())
                    .unwrap_or_default();
                s.branches.insert(branch.clone(), sha.clone());
                s.files.insert(branch, files);
                MutationOutcome::Created(sha)
            };
            Ok(GitHubResponse::BranchCreated(outcome))
        }

        GitHubEffect::PutFile {
            path,
            branch,
            content,
            prior_sha,
            ..
        } => {
            if !s.branches.contains_key(&branch) {
                return Err(FakeError(format!("branch {branch} not found")));
            }
            let current = s.files.get(&branch).and_then(|f| f.get(&path)).map(|f| f.sha.clone());
            match (&current, &prior_sha) {
                (Some(_), None) => {
                    return Err(FakeError(format!("{path} exists; sha wasn't supplied")));
                }
                (Some(current), Some(prior)) if current != prior => {
                    return Err(FakeError(format!("{path} does not match {prior}")));
                }
                (None, Some(prior)) => {
                    return Err(FakeError(format!("{path} does not exist at {prior}")));
                }
                _ => {}
            }
            let decoded = STANDARD
                .decode(content)
                .map_err(|e| FakeError(format!("content is not valid Base64: {e}")))?;
            let (content_sha, commit_sha) = commit_file(s, &branch, &path, decoded);
            Ok(GitHubResponse::FileWritten {
                content_sha,
                commit_sha,
            })
        }

        GitHubEffect::DeleteBranch { branch } => {
            let outcome = if rejected {
                DeleteOutcome::Failed {
                    reason: rejection(),
                }
            } else if s.branches.remove(&branch).is_some() {
                s.files.remove(&branch);
                DeleteOutcome::Deleted
            } else {
                DeleteOutcome::Missing
            };
            Ok(GitHubResponse::BranchDeleted(outcome))
        }

        GitHubEffect::CreatePr {
            title,
            body,
            head,
            base,
        } => {
            if std::mem::take(&mut s.race_next_pr) {
                open_pr(s, &head, &base, "raced", "raced");
            }
            let outcome = if rejected {
                MutationOutcome::Failed {
                    reason: rejection(),
                }
            } else if !s.branches.contains_key(&head) {
                MutationOutcome::Failed {
                    reason: format!("head branch {head} does not exist"),
                }
            } else if has_open_pr(s, &head, &base) {
                MutationOutcome::AlreadyExists
            } else {
                MutationOutcome::Created(open_pr(s, &head, &base, &title, &body))
            };
            Ok(GitHubResponse::PrCreated(outcome))
        }
    }
}

impl GitHubInterpreter for FakeRepository {
    type Error = FakeError;

    async fn interpret(&self, effect: GitHubEffect) -> Result<GitHubResponse, FakeError> {
        // Yield so concurrent passes interleave at every call.
        tokio::task::yield_now().await;
        self.apply(effect)
    }
}

// ─── FakeCredentials ──────────────────────────────────────────────────────────

/// Hands out a fixed token and a clone of the given repository.
#[derive(Debug, Clone)]
pub struct FakeCredentials {
    pub repo: FakeRepository,
    pub fail: bool,
}

pub const FAKE_TOKEN: &str = "ghs_fake_installation_token";

impl FakeCredentials {
    pub fn new(repo: FakeRepository) -> Self {
        FakeCredentials { repo, fail: false }
    }

    pub fn failing(repo: FakeRepository) -> Self {
        FakeCredentials { repo, fail: true }
    }
}

impl CredentialProvider for FakeCredentials {
    type Client = FakeRepository;

    async fn acquire(
        &self,
        _repo: &RepoId,
        installation: InstallationId,
    ) -> Result<Installation<FakeRepository>, CredentialError> {
        if self.fail {
            return Err(CredentialError::Other(format!(
                "installation {installation} suspended"
            )));
        }
        Ok(Installation {
            credential: Credential::new(FAKE_TOKEN, Utc::now() + Duration::hours(1)),
            client: self.repo.clone(),
        })
    }
}

// ─── FakeGenerator ────────────────────────────────────────────────────────────

/// One scripted generator result.
#[derive(Debug, Clone)]
pub enum FakeRun {
    Unchanged,
    /// Writes these bytes as the artifact and reports a change.
    Changed(Vec<u8>),
    Fail(String),
}

/// Records what each invocation received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub token: String,
    pub repo: RepoId,
    pub default_branch: String,
    pub working_branch: String,
    pub artifact_filename: String,
}

/// A generator that replays scripted results in order, then repeats the last.
#[derive(Debug, Clone)]
pub struct FakeGenerator {
    script: Arc<Mutex<VecDeque<FakeRun>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeGenerator {
    pub fn new(runs: impl IntoIterator<Item = FakeRun>) -> Self {
        FakeGenerator {
            script: Arc::new(Mutex::new(runs.into_iter().collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn always(run: FakeRun) -> Self {
        Self::new([run])
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_run(&self) -> FakeRun {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or(FakeRun::Unchanged)
        }
    }
}

impl ArtifactGenerator for FakeGenerator {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<ArtifactRun, GeneratorError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            token: request.token.to_string(),
            repo: request.repo.clone(),
            default_branch: request.default_branch.to_string(),
            working_branch: request.working_branch.to_string(),
            artifact_filename: request.artifact_filename.to_string(),
        });

        let outcome = match self.next_run() {
            FakeRun::Unchanged => GeneratorOutcome::Unchanged,
            FakeRun::Changed(bytes) => {
                let path = request.artifact_path();
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).unwrap();
                }
                std::fs::write(&path, bytes).unwrap();
                GeneratorOutcome::Changed(Artifact::new(path))
            }
            FakeRun::Fail(message) => return Err(GeneratorError::Other(message)),
        };

        Ok(ArtifactRun {
            outcome,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}
