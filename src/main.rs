use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docker_lock_bot::config::Config;
use docker_lock_bot::generator::ScriptGenerator;
use docker_lock_bot::github::AppInstallations;
use docker_lock_bot::reconcile::Reconciler;
use docker_lock_bot::scheduler::{Dispatcher, Scheduler};
use docker_lock_bot::server::{AppState, build_router};

/// Capacity of the trigger queue shared by the scheduler and the webhook endpoint.
const TRIGGER_QUEUE_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docker_lock_bot=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("loading configuration")?;

    let pem = tokio::fs::read(&config.private_key_path)
        .await
        .with_context(|| format!("reading {}", config.private_key_path.display()))?;
    let apps = AppInstallations::new(config.app_id, &pem).context("building GitHub App client")?;

    let generator = ScriptGenerator::new(
        config.generator_program.clone(),
        config.generator_script.clone(),
        config.generator_output,
    );
    let reconciler = Arc::new(Reconciler::new(
        apps.clone(),
        generator,
        config.reconciler.clone(),
    ));

    let (triggers, queue) = mpsc::channel(TRIGGER_QUEUE_CAPACITY);
    let shutdown = CancellationToken::new();

    let scheduler = tokio::spawn(
        Scheduler::new(apps, config.schedule.clone(), triggers.clone(), shutdown.clone()).run(),
    );
    let dispatcher = tokio::spawn(Dispatcher::new(reconciler, queue, shutdown.clone()).run());

    let app = build_router(AppState::new(config.webhook_secret.clone(), triggers));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!(
        addr = %config.listen_addr,
        interval_ms = config.schedule.interval.as_millis() as u64,
        jitter = config.schedule.jitter,
        branch = %config.reconciler.working_branch,
        "Listening"
    );

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            info!("Shutdown requested");
            server_shutdown.cancel();
        })
        .await
        .context("serving HTTP")?;

    // The server can also stop on its own; make sure the background tasks follow.
    shutdown.cancel();

    scheduler.await.context("scheduler task")?;
    let dispatched = dispatcher.await.context("dispatcher task")?;
    info!(dispatched, "Stopped");

    Ok(())
}
