use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use tokio_test::assert_ok;

use scheduler_cell::{DaemonSupervisor, DaemonTask, SchedulerError, TickReport};
use shared_models::error::AppError;

struct CountingDaemon {
    name: &'static str,
    ticks: Arc<AtomicUsize>,
    fail: bool,
    period: Duration,
}

#[async_trait]
impl DaemonTask for CountingDaemon {
    fn name(&self) -> &'static str {
        self.name
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn tick(&self) -> Result<TickReport, AppError> {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Database("store unavailable".to_string()));
        }
        Ok(TickReport::default())
    }
}

fn counting(name: &'static str, fail: bool) -> (Arc<dyn DaemonTask>, Arc<AtomicUsize>) {
    counting_every(name, fail, Duration::from_millis(5))
}

fn counting_every(name: &'static str, fail: bool, period: Duration) -> (Arc<dyn DaemonTask>, Arc<AtomicUsize>) {
    let ticks = Arc::new(AtomicUsize::new(0));
    let daemon = Arc::new(CountingDaemon {
        name,
        ticks: Arc::clone(&ticks),
        fail,
        period,
    });
    (daemon, ticks)
}

#[tokio::test]
async fn test_daemons_stop_independently() {
    let (steady, steady_ticks) = counting("steady", false);
    let (flaky, flaky_ticks) = counting("flaky", true);
    let mut handle = DaemonSupervisor::new().register(steady).register(flaky).start();
    assert_eq!(handle.names(), vec!["steady", "flaky"]);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(steady_ticks.load(Ordering::SeqCst) >= 2);
    // Failed ticks do not end the loop.
    assert!(flaky_ticks.load(Ordering::SeqCst) >= 2);

    handle.take("steady").unwrap().stop().await.unwrap();
    let frozen = steady_ticks.load(Ordering::SeqCst);
    let flaky_before = flaky_ticks.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(steady_ticks.load(Ordering::SeqCst), frozen);
    assert!(flaky_ticks.load(Ordering::SeqCst) > flaky_before);

    assert_ok!(handle.shutdown().await);
}

#[tokio::test]
async fn test_unknown_daemon_cannot_be_taken() {
    let (steady, _) = counting("steady", false);
    let mut handle = DaemonSupervisor::new().register(steady).start();

    let err = handle.take("reminders").err();
    assert_matches!(err, Some(SchedulerError::UnknownDaemon(name)) if name == "reminders");

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_zero_period_daemon_still_runs_and_stops() {
    let (eager, ticks) = counting_every("eager", false, Duration::ZERO);
    let mut handle = DaemonSupervisor::new().register(eager).start();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(ticks.load(Ordering::SeqCst) >= 2);

    assert_ok!(handle.take("eager").unwrap().stop().await);
    assert_ok!(handle.shutdown().await);
}
