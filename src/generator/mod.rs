//! Lockfile generation.
//!
//! The generator is an external step: it receives the installation token, the
//! repository coordinates and a scratch directory, and reports whether the
//! lockfile changed. When it did, the new lockfile sits in the scratch
//! directory under the configured filename.
//!
//! The result is resolved into a [`GeneratorOutcome`] before the reconciler
//! sees it, so "unchanged" versus "changed, here is the artifact" is a type
//! distinction rather than a boolean plus an optional path.

mod artifact;
mod script;

use std::future::Future;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::RepoId;

pub use artifact::{Artifact, ArtifactContent, ArtifactError};
pub use script::{OutputMode, ScriptGenerator};

/// Inputs to one generator invocation.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub token: &'a str,
    pub repo: &'a RepoId,
    pub default_branch: &'a str,
    pub working_branch: &'a str,
    pub scratch_dir: &'a Path,
    pub artifact_filename: &'a str,
}

impl GenerateRequest<'_> {
    /// Where the generator leaves the artifact.
    pub fn artifact_path(&self) -> PathBuf {
        self.scratch_dir.join(self.artifact_filename)
    }
}

/// Whether the lockfile needs updating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorOutcome {
    Unchanged,
    Changed(Artifact),
}

/// The result of one generator invocation.
///
/// Consumed once by the reconciler. `stdout` and `stderr` are kept for
/// diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRun {
    pub outcome: GeneratorOutcome,
    pub stdout: String,
    pub stderr: String,
}

/// Generator failures. All of them abort the pass.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("failed to start generator: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("generator exited with {status}: {stderr}")]
    Exited { status: String, stderr: String },

    #[error("generator output not understood: {stdout:?}")]
    UnrecognizedOutput { stdout: String },

    #[error("failed to write artifact {path}: {source}")]
    WriteArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Produces the lockfile for a repository.
pub trait ArtifactGenerator {
    fn generate(
        &self,
        request: GenerateRequest<'_>,
    ) -> impl Future<Output = Result<ArtifactRun, GeneratorError>> + Send;
}
