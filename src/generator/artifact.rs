//! Generated artifacts.
//!
//! The generator writes the lockfile into the pass's scratch directory. The
//! content is untrusted until it has been read back and validated here.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Why an artifact was rejected.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {path} is empty")]
    Empty { path: PathBuf },

    #[error("artifact {path} is not valid JSON: {source}")]
    MalformedJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A generated file on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    path: PathBuf,
}

/// Validated artifact content, ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactContent {
    bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Artifact { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the artifact and checks it is fit to commit.
    ///
    /// The content must not be blank, and a `.json` artifact must parse.
    pub async fn read(&self) -> Result<ArtifactContent, ArtifactError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| ArtifactError::Read {
                path: self.path.clone(),
                source,
            })?;
        validate(&self.path, bytes)
    }
}

fn validate(path: &Path, bytes: Vec<u8>) -> Result<ArtifactContent, ArtifactError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ArtifactError::Empty {
            path: path.to_path_buf(),
        });
    }

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json && let Err(source) = serde_json::from_slice::<serde_json::Value>(&bytes) {
        return Err(ArtifactError::MalformedJson {
            path: path.to_path_buf(),
            source,
        });
    }

    Ok(ArtifactContent { bytes })
}

impl ArtifactContent {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Base64 encoding as required by the contents API.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}
