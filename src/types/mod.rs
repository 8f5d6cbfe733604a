//! Core domain types for the lockfile bot.

pub mod ids;
pub mod trigger;

pub use ids::{InstallationId, InvalidSha, PrNumber, RepoId, Sha, TraceId};
pub use trigger::{Trigger, TriggerKind};
