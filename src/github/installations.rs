//! GitHub App authentication.
//!
//! `AppInstallations` holds the App-level (JWT) client. It mints installation
//! tokens for passes and enumerates installed repositories for the scheduler.

use chrono::{Duration, Utc};
use octocrab::Octocrab;
use octocrab::models::{AppId, InstallationId as OctoInstallationId};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::credentials::{Credential, CredentialError, CredentialProvider, Installation};
use crate::scheduler::{InstalledRepo, RepositorySource};
use crate::types::{InstallationId, RepoId};

use super::client::OctocrabClient;
use super::error::GitHubApiError;

/// Installation tokens are valid for one hour from issuance.
const TOKEN_LIFETIME_MINS: i64 = 60;

const PAGE_SIZE: u32 = 100;

/// App-authenticated GitHub access.
#[derive(Clone)]
pub struct AppInstallations {
    app: Octocrab,
}

impl AppInstallations {
    /// Builds an App client from its numeric id and PEM-encoded private key.
    pub fn new(app_id: u64, private_key_pem: &[u8]) -> Result<Self, CredentialError> {
        let key = jsonwebtoken::EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(CredentialError::InvalidKey)?;
        let app = Octocrab::builder()
            .app(AppId(app_id), key)
            .build()
            .map_err(CredentialError::Client)?;
        Ok(AppInstallations { app })
    }

    async fn installation_client(
        &self,
        installation: InstallationId,
    ) -> Result<(Octocrab, secrecy::SecretString), CredentialError> {
        self.app
            .installation_and_token(OctoInstallationId(installation.0))
            .await
            .map_err(|source| CredentialError::TokenRequest {
                installation,
                source,
            })
    }

    async fn list_installations(&self) -> Result<Vec<RawInstallation>, GitHubApiError> {
        let mut all = Vec::new();
        let mut page = 1u32;
        loop {
            let route = format!("/app/installations?per_page={PAGE_SIZE}&page={page}");
            let batch: Vec<RawInstallation> = self
                .app
                .get(&route, None::<&()>)
                .await
                .map_err(GitHubApiError::from_octocrab)?;
            let done = batch.len() < PAGE_SIZE as usize;
            all.extend(batch);
            if done {
                return Ok(all);
            }
            page += 1;
        }
    }
}

impl std::fmt::Debug for AppInstallations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppInstallations").finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct RawInstallation {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RawRepositoryPage {
    repositories: Vec<RawRepository>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    name: String,
    owner: RawOwner,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: String,
}

async fn list_installation_repositories(
    client: &Octocrab,
    installation: InstallationId,
) -> Result<Vec<InstalledRepo>, GitHubApiError> {
    let mut all = Vec::new();
    let mut page = 1u32;
    loop {
        let route = format!("/installation/repositories?per_page={PAGE_SIZE}&page={page}");
        let batch: RawRepositoryPage = client
            .get(&route, None::<&()>)
            .await
            .map_err(GitHubApiError::from_octocrab)?;
        let done = batch.repositories.len() < PAGE_SIZE as usize;
        all.extend(batch.repositories.into_iter().map(|r| InstalledRepo {
            repo: RepoId::new(r.owner.login, r.name),
            installation,
        }));
        if done {
            return Ok(all);
        }
        page += 1;
    }
}

impl CredentialProvider for AppInstallations {
    type Client = OctocrabClient;

    async fn acquire(
        &self,
        repo: &RepoId,
        installation: InstallationId,
    ) -> Result<Installation<OctocrabClient>, CredentialError> {
        let issued_at = Utc::now();
        let (client, token) = self.installation_client(installation).await?;
        debug!(repo = %repo, installation = %installation, "Issued installation token");

        Ok(Installation {
            credential: Credential::new(
                token.expose_secret(),
                issued_at + Duration::minutes(TOKEN_LIFETIME_MINS),
            ),
            client: OctocrabClient::new(client, repo.clone()),
        })
    }
}

/// Enumeration errors from the App API.
#[derive(Debug, thiserror::Error)]
pub enum EnumerationError {
    #[error("failed to list installations: {0}")]
    Installations(#[source] GitHubApiError),
}

impl RepositorySource for AppInstallations {
    type Error = EnumerationError;

    /// Lists every repository across every installation.
    ///
    /// An installation whose token or repository list cannot be fetched is
    /// skipped so one broken installation does not starve the rest.
    async fn installed_repositories(&self) -> Result<Vec<InstalledRepo>, EnumerationError> {
        let installations = self
            .list_installations()
            .await
            .map_err(EnumerationError::Installations)?;

        let mut repos = Vec::new();
        for raw in installations {
            let installation = InstallationId(raw.id);
            let client = match self.installation_client(installation).await {
                Ok((client, _token)) => client,
                Err(e) => {
                    warn!(installation = %installation, error = %e, "Skipping installation");
                    continue;
                }
            };
            match list_installation_repositories(&client, installation).await {
                Ok(found) => repos.extend(found),
                Err(e) => {
                    warn!(installation = %installation, error = %e, "Skipping installation");
                }
            }
        }

        debug!(repos = repos.len(), "Enumerated installed repositories");
        Ok(repos)
    }
}
