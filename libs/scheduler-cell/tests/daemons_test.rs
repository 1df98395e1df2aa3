mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Weekday};

use appointment_cell::SessionStatus;
use notification_cell::StoredNotification;
use scheduler_cell::{CleanupDaemon, DaemonTask, ReminderDaemon, SessionTimerDaemon, TickReport};
use shared_models::auth::Actor;
use shared_models::error::AppError;
use shared_utils::Clock;

use common::{harness, period, tuesday};

fn titled(alerts: &[StoredNotification], title: &str) -> usize {
    alerts.iter().filter(|a| a.notification.title == title).count()
}

#[tokio::test]
async fn test_overdue_active_session_moves_to_waiting() {
    let h = harness().await;
    let appointment = h.confirmed(tuesday()).await;
    h.service()
        .update_session_status(&Actor::doctor(h.doctor.id), appointment.id, SessionStatus::Active)
        .await
        .unwrap();
    let daemon = SessionTimerDaemon::new(h.ctx.clone(), period());

    h.clock.set(h.at(tuesday(), 9, 29));
    let early = daemon.tick().await.unwrap();
    assert_eq!(early, TickReport { scanned: 1, updated: 0, failed: 0 });

    h.clock.set(h.at(tuesday(), 9, 31));
    let report = daemon.tick().await.unwrap();
    assert_eq!(report.updated, 1);

    let view = h
        .service()
        .get_appointment(&Actor::patient(h.patient.id), appointment.id)
        .await
        .unwrap();
    assert_eq!(view.session.status, Some(SessionStatus::WaitingForDoctor));
    assert_eq!(h.chat.notices_for(appointment.id).await.len(), 2);

    let after = daemon.tick().await.unwrap();
    assert_eq!(after.scanned, 0);
}

#[tokio::test]
async fn test_extended_session_is_never_expired() {
    let h = harness().await;
    let appointment = h.confirmed(tuesday()).await;
    let doctor = Actor::doctor(h.doctor.id);
    for status in [
        SessionStatus::Active,
        SessionStatus::WaitingForDoctor,
        SessionStatus::ContinuedByDoctor,
    ] {
        h.service().update_session_status(&doctor, appointment.id, status).await.unwrap();
    }
    let daemon = SessionTimerDaemon::new(h.ctx.clone(), period());

    h.clock.set(h.at(tuesday(), 11, 0));
    let report = daemon.tick().await.unwrap();

    assert_eq!(report, TickReport { scanned: 1, updated: 0, failed: 0 });
    let view = h.service().get_appointment(&doctor, appointment.id).await.unwrap();
    assert_eq!(view.session.status, Some(SessionStatus::ContinuedByDoctor));
}

#[tokio::test]
async fn test_reminders_fire_once_per_window() {
    let h = harness().await;
    h.confirmed(tuesday()).await;
    let daemon = ReminderDaemon::new(h.ctx.clone(), period());
    let soon = |alerts: Vec<StoredNotification>| titled(&alerts, "Consultation starting soon");
    let ready = |alerts: Vec<StoredNotification>| titled(&alerts, "Consultation ready");

    h.clock.set(h.at(tuesday(), 8, 55));
    assert_eq!(daemon.tick().await.unwrap().updated, 1);
    assert_eq!(soon(h.notifier.alerts_for(h.patient.id).await), 1);
    assert_eq!(soon(h.notifier.alerts_for(h.doctor.id).await), 1);

    h.clock.advance(Duration::seconds(30));
    let repeat = daemon.tick().await.unwrap();
    assert_eq!(repeat, TickReport { scanned: 1, updated: 0, failed: 0 });
    assert_eq!(soon(h.notifier.alerts_for(h.patient.id).await), 1);

    h.clock.set(h.at(tuesday(), 9, 1));
    assert_eq!(daemon.tick().await.unwrap().updated, 1);
    assert_eq!(ready(h.notifier.alerts_for(h.patient.id).await), 1);

    assert_eq!(daemon.tick().await.unwrap().scanned, 0);
}

#[tokio::test]
async fn test_reminders_only_consider_today() {
    let h = harness().await;
    h.confirmed(tuesday()).await;
    let daemon = ReminderDaemon::new(h.ctx.clone(), period());

    h.clock.set(h.at(tuesday() - Duration::days(1), 8, 55));
    assert_eq!(daemon.tick().await.unwrap().scanned, 0);
}

#[tokio::test]
async fn test_cleanup_removes_abandoned_booking_and_frees_slot() {
    let h = harness().await;
    let booked = h.book(tuesday()).await;
    let daemon = CleanupDaemon::new(h.ctx.clone(), period(), Duration::minutes(5));

    h.clock.advance(Duration::minutes(4));
    assert_eq!(daemon.tick().await.unwrap().scanned, 0);
    assert!(h.slot_is_booked(Weekday::Tue).await);

    h.clock.advance(Duration::minutes(2));
    let report = daemon.tick().await.unwrap();

    assert_eq!(report, TickReport { scanned: 1, updated: 1, failed: 0 });
    assert!(!h.slot_is_booked(Weekday::Tue).await);
    let err = h
        .service()
        .get_appointment(&Actor::admin(uuid::Uuid::new_v4()), booked.id)
        .await
        .unwrap_err();
    assert_matches!(err, AppError::NotFound(_));
}

#[tokio::test]
async fn test_cleanup_keeps_paid_bookings() {
    let h = harness().await;
    let booked = h.book(tuesday()).await;
    h.ledger.seed(h.patient.id, 500.0).await;
    h.service()
        .record_payment(&Actor::patient(h.patient.id), booked.id, appointment_cell::PaymentMethod::Wallet, None)
        .await
        .unwrap();
    let daemon = CleanupDaemon::new(h.ctx.clone(), period(), Duration::minutes(5));

    h.clock.set(h.ctx.clock.now() + Duration::hours(1));
    assert_eq!(daemon.tick().await.unwrap().scanned, 0);
    assert!(h.slot_is_booked(Weekday::Tue).await);
}
