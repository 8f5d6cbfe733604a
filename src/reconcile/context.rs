//! Per-pass context.

use crate::credentials::Credential;
use crate::types::RepoId;

/// Everything one pass knows about its target. Built once the default branch
/// is resolved and dropped when the pass ends. Never persisted.
#[derive(Debug)]
pub struct ReconciliationContext {
    pub repo: RepoId,
    pub default_branch: String,
    pub working_branch: String,
    pub credential: Credential,
}
