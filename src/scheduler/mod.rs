//! Periodic scheduling and trigger dispatch.
//!
//! ```text
//!  ┌───────────┐  tick   ┌────────────────────┐
//!  │ Scheduler │ ──────► │ RepositorySource   │  (installed repositories)
//!  └───────────┘         └────────────────────┘
//!        │ Trigger::scheduled (optionally after a random delay)
//!        ▼
//!  ┌───────────┐         ┌────────────┐
//!  │  mpsc     │ ◄────── │  webhook   │  Trigger::pull_request_closed
//!  └───────────┘         └────────────┘
//!        │
//!        ▼
//!  ┌────────────┐  one task per trigger
//!  │ Dispatcher │ ──────────────────────► TriggerHandler::handle
//!  └────────────┘
//! ```
//!
//! Passes are independent: the dispatcher never serializes triggers, not even
//! two triggers for the same repository. Safety under overlap comes from how
//! each pass interprets "already exists" and "missing" responses.

mod config;
mod dispatch;

use std::future::Future;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::types::{InstallationId, RepoId, Trigger};

pub use config::{DEFAULT_INTERVAL_MS, ScheduleConfig};
pub use dispatch::{Dispatcher, TriggerHandler};

/// A repository the App is installed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledRepo {
    pub repo: RepoId,
    pub installation: InstallationId,
}

/// Lists the repositories a scheduled tick should cover.
pub trait RepositorySource {
    type Error: std::fmt::Display + Send;

    fn installed_repositories(
        &self,
    ) -> impl Future<Output = Result<Vec<InstalledRepo>, Self::Error>> + Send;
}

/// Emits one `Scheduled` trigger per installed repository on every tick.
pub struct Scheduler<S> {
    source: S,
    config: ScheduleConfig,
    triggers: mpsc::Sender<Trigger>,
    shutdown: CancellationToken,
}

impl<S: RepositorySource> Scheduler<S> {
    pub fn new(
        source: S,
        config: ScheduleConfig,
        triggers: mpsc::Sender<Trigger>,
        shutdown: CancellationToken,
    ) -> Self {
        Scheduler {
            source,
            config,
            triggers,
            shutdown,
        }
    }

    /// Runs until the shutdown token is cancelled.
    ///
    /// The first tick fires immediately.
    pub async fn run(self) {
        // tokio::time::interval panics on a zero period.
        let period = self.config.interval.max(std::time::Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            interval_ms = period.as_millis() as u64,
            jitter = self.config.jitter,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Scheduler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// Performs one tick. Returns how many triggers were scheduled.
    ///
    /// A failure to list repositories skips the tick; the next tick retries.
    pub async fn tick(&self) -> usize {
        let repos = match self.source.installed_repositories().await {
            Ok(repos) => repos,
            Err(e) => {
                warn!(error = %e, "Failed to list installed repositories, skipping tick");
                return 0;
            }
        };

        let planned: Vec<_> = {
            let mut rng = rand::thread_rng();
            repos
                .into_iter()
                .map(|installed| (installed, self.config.pass_delay(&mut rng)))
                .collect()
        };

        let count = planned.len();
        debug!(repos = count, "Scheduling passes");

        for (installed, delay) in planned {
            let trigger = Trigger::scheduled(installed.repo, installed.installation);

            if delay.is_zero() {
                enqueue(&self.triggers, &self.shutdown, trigger).await;
                continue;
            }

            let triggers = self.triggers.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = tokio::time::sleep(delay) => enqueue(&triggers, &shutdown, trigger).await,
                }
            });
        }

        count
    }
}

async fn enqueue(triggers: &mpsc::Sender<Trigger>, shutdown: &CancellationToken, trigger: Trigger) {
    let repo = trigger.repo.clone();
    tokio::select! {
        _ = shutdown.cancelled() => {}
        sent = triggers.send(trigger) => {
            if sent.is_err() {
                warn!(repo = %repo, "Trigger queue closed, dropping scheduled pass");
            }
        }
    }
}
