//! Installation credentials.
//!
//! Every pass starts by minting a fresh installation token. The token is
//! opaque to the reconciler: it is handed to the artifact generator as-is and
//! is otherwise only used through the repository client that comes with it.

use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::effects::GitHubInterpreter;
use crate::types::{InstallationId, RepoId};

/// Errors from credential acquisition.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The App private key could not be parsed.
    #[error("invalid app private key: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),

    /// The App client could not be built.
    #[error("failed to build app client: {0}")]
    Client(#[source] octocrab::Error),

    /// GitHub refused to issue an installation token.
    #[error("failed to issue token for installation {installation}: {source}")]
    TokenRequest {
        installation: InstallationId,
        #[source]
        source: octocrab::Error,
    },

    /// Any other failure (used by test doubles and non-GitHub providers).
    #[error("{0}")]
    Other(String),
}

/// An opaque bearer token with the instant it stops being valid.
pub struct Credential {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Credential {
            token: SecretString::from(token.into()),
            expires_at,
        }
    }

    /// Returns the raw token.
    pub fn expose(&self) -> &str {
        self.token.expose_secret()
    }

    /// Returns when the token expires.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A credential together with a repository client authenticated by it.
#[derive(Debug)]
pub struct Installation<C> {
    pub credential: Credential,
    pub client: C,
}

/// Issues installation-scoped credentials.
pub trait CredentialProvider {
    /// The repository client type that comes with a credential.
    type Client: GitHubInterpreter;

    /// Mint a fresh credential for `repo` through `installation`.
    fn acquire(
        &self,
        repo: &RepoId,
        installation: InstallationId,
    ) -> impl Future<Output = Result<Installation<Self::Client>, CredentialError>> + Send;
}
