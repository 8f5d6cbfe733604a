//! Installation-authenticated client bound to one repository.
//!
//! Effects carry no repository; the [`OctocrabClient`] an effect is
//! interpreted through decides which repository it touches.

use octocrab::Octocrab;

use crate::types::RepoId;

#[derive(Clone)]
pub struct OctocrabClient {
    client: Octocrab,
    repo: RepoId,
}

impl OctocrabClient {
    /// `client` should carry an installation token for `repo`; see
    /// [`AppInstallations`](super::AppInstallations).
    pub fn new(client: Octocrab, repo: RepoId) -> Self {
        OctocrabClient { client, repo }
    }

    pub fn inner(&self) -> &Octocrab {
        &self.client
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    pub fn owner(&self) -> &str {
        &self.repo.owner
    }

    pub fn repo_name(&self) -> &str {
        &self.repo.repo
    }

    /// `/repos/{owner}/{repo}` followed by `suffix`, which must start with `/`
    /// and be percent-encoded already.
    pub(super) fn repo_route(&self, suffix: &str) -> String {
        format!(
            "/repos/{}/{}{}",
            urlencoding::encode(self.owner()),
            urlencoding::encode(self.repo_name()),
            suffix
        )
    }
}

// Octocrab holds the installation token, so only the repository is shown.
impl std::fmt::Debug for OctocrabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabClient")
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}
