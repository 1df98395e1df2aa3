use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::SchedulerError;
use crate::services::daemon::DaemonTask;

/// Floor applied to a daemon period; a zero period cannot drive an interval.
pub const MIN_DAEMON_PERIOD: Duration = Duration::from_millis(1);

/// Owns the set of registered daemons until they are started.
#[derive(Default)]
pub struct DaemonSupervisor {
    daemons: Vec<Arc<dyn DaemonTask>>,
}

impl DaemonSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, daemon: Arc<dyn DaemonTask>) -> Self {
        self.daemons.push(daemon);
        self
    }

    /// Spawn every registered daemon as its own task.
    pub fn start(self) -> SupervisorHandle {
        let handles = self.daemons.into_iter().map(DaemonHandle::spawn).collect::<Vec<_>>();
        info!("Started {} daemons", handles.len());
        SupervisorHandle { handles }
    }
}

/// A running daemon with its own shutdown channel.
pub struct DaemonHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DaemonHandle {
    pub fn spawn(daemon: Arc<dyn DaemonTask>) -> Self {
        let (shutdown, receiver) = watch::channel(false);
        let name = daemon.name();
        let task = tokio::spawn(run_daemon(daemon, receiver));
        Self { name, shutdown, task }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signal the loop and wait for the current tick to finish.
    pub async fn stop(self) -> Result<(), SchedulerError> {
        debug!("Stopping daemon {}", self.name);
        // A closed channel means the loop already exited.
        let _ = self.shutdown.send(true);

        self.task.await.map_err(|e| SchedulerError::DaemonFailed {
            name: self.name.to_string(),
            reason: e.to_string(),
        })?;
        info!("Daemon {} stopped", self.name);
        Ok(())
    }
}

pub struct SupervisorHandle {
    handles: Vec<DaemonHandle>,
}

impl SupervisorHandle {
    pub fn names(&self) -> Vec<&'static str> {
        self.handles.iter().map(|handle| handle.name).collect()
    }

    /// Detach one daemon so it can be stopped on its own.
    pub fn take(&mut self, name: &str) -> Result<DaemonHandle, SchedulerError> {
        let position = self
            .handles
            .iter()
            .position(|handle| handle.name == name)
            .ok_or_else(|| SchedulerError::UnknownDaemon(name.to_string()))?;
        Ok(self.handles.remove(position))
    }

    /// Stop every remaining daemon, reporting the first abnormal exit.
    pub async fn shutdown(self) -> Result<(), SchedulerError> {
        info!("Shutting down {} daemons", self.handles.len());
        let results = futures::future::join_all(self.handles.into_iter().map(DaemonHandle::stop)).await;

        let mut first_failure = None;
        for result in results {
            if let Err(e) = result {
                error!("{}", e);
                first_failure.get_or_insert(e);
            }
        }
        first_failure.map_or(Ok(()), Err)
    }
}

async fn run_daemon(daemon: Arc<dyn DaemonTask>, mut shutdown: watch::Receiver<bool>) {
    let mut period = daemon.period();
    if period < MIN_DAEMON_PERIOD {
        warn!("Daemon {} has period {:?}, raising it to {:?}", daemon.name(), period, MIN_DAEMON_PERIOD);
        period = MIN_DAEMON_PERIOD;
    }
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!("Daemon {} running every {:?}", daemon.name(), period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match daemon.tick().await {
                    Ok(report) if report.is_idle() => {
                        debug!("{} tick: {} scanned", daemon.name(), report.scanned);
                    }
                    Ok(report) => {
                        info!(
                            "{} tick: {} scanned, {} updated, {} failed",
                            daemon.name(), report.scanned, report.updated, report.failed
                        );
                    }
                    Err(e) => warn!("{} tick aborted: {}", daemon.name(), e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    debug!("Daemon {} loop ended", daemon.name());
}
