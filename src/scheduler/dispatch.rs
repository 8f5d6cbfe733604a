//! Trigger dispatch.
//!
//! Every trigger pulled off the queue runs as its own tokio task. On shutdown
//! the dispatcher stops accepting triggers and waits for in-flight passes to
//! finish.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::types::Trigger;

/// Something that acts on a trigger.
pub trait TriggerHandler {
    fn handle(&self, trigger: Trigger) -> impl Future<Output = ()> + Send;
}

/// Pulls triggers off the queue and runs each one independently.
pub struct Dispatcher<H> {
    handler: Arc<H>,
    triggers: mpsc::Receiver<Trigger>,
    shutdown: CancellationToken,
}

impl<H> Dispatcher<H>
where
    H: TriggerHandler + Send + Sync + 'static,
{
    pub fn new(
        handler: Arc<H>,
        triggers: mpsc::Receiver<Trigger>,
        shutdown: CancellationToken,
    ) -> Self {
        Dispatcher {
            handler,
            triggers,
            shutdown,
        }
    }

    /// Runs until shutdown is requested or every sender has been dropped.
    ///
    /// Returns the number of triggers dispatched.
    pub async fn run(mut self) -> usize {
        let mut in_flight = JoinSet::new();
        let mut dispatched = 0usize;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Dispatcher shutting down");
                    break;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Pass task panicked");
                    }
                }
                next = self.triggers.recv() => {
                    let Some(trigger) = next else {
                        debug!("Trigger queue closed");
                        break;
                    };
                    debug!(repo = %trigger.repo, kind = %trigger.kind, "Dispatching trigger");
                    dispatched += 1;
                    let handler = Arc::clone(&self.handler);
                    in_flight.spawn(async move { handler.handle(trigger).await });
                }
            }
        }

        if !in_flight.is_empty() {
            info!(passes = in_flight.len(), "Waiting for in-flight passes");
        }
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Pass task panicked");
            }
        }

        dispatched
    }
}
