use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use appointment_cell::{AppointmentService, Collaborators};
use notification_cell::{InMemoryChatLog, RealtimeNotificationService};
use scheduler_cell::{CleanupDaemon, DaemonContext, DaemonSupervisor, ReminderDaemon, SessionTimerDaemon};
use shared_config::AppConfig;
use shared_database::DocumentStore;
use shared_utils::clock::{Clock, SystemClock};
use wallet_cell::InMemoryLedger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting consultation worker");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    // Shared collaborators, constructed once and injected everywhere
    let store = DocumentStore::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let notifier = Arc::new(RealtimeNotificationService::new());
    let chat = Arc::new(InMemoryChatLog::new());
    let ledger = Arc::new(InMemoryLedger::new());

    let appointments = Arc::new(
        AppointmentService::new(
            store.clone(),
            Arc::clone(&config),
            Collaborators {
                ledger,
                notifier: notifier.clone(),
                chat: chat.clone(),
                clock: Arc::clone(&clock),
            },
        )
        .await,
    );

    let ctx = DaemonContext {
        store,
        timezone: appointments.timezone(),
        appointments,
        notifier,
        chat,
        clock,
    };
    let daemons = &config.daemons;
    let supervisor = DaemonSupervisor::new()
        .register(Arc::new(SessionTimerDaemon::new(
            ctx.clone(),
            Duration::from_secs(daemons.session_timer_interval_seconds),
        )))
        .register(Arc::new(ReminderDaemon::new(
            ctx.clone(),
            Duration::from_secs(daemons.reminder_interval_seconds),
        )))
        .register(Arc::new(CleanupDaemon::new(
            ctx,
            Duration::from_secs(daemons.cleanup_interval_seconds),
            chrono::Duration::minutes(daemons.pending_grace_minutes),
        )))
        .start();
    info!("Daemons running: {:?}", supervisor.names());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    supervisor.shutdown().await.context("daemon shutdown")?;
    info!("Consultation worker stopped");
    Ok(())
}

