mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{Utc, Weekday};
use mockall::mock;
use uuid::Uuid;

use appointment_cell::{AppointmentService, AppointmentStatus, Collaborators, PaymentMethod, PaymentStatus};
use notification_cell::{Notification, NotificationError, NotificationSink};
use shared_models::auth::Actor;
use shared_models::error::AppError;
use shared_utils::test_utils::TestConfig;
use wallet_cell::{
    InMemoryLedger, LedgerCategory, LedgerDirection, LedgerEntry, LedgerError, LedgerService, LedgerTransaction,
};

use common::{build, tuesday, MORNING};

mock! {
    pub Ledger {}

    #[async_trait]
    impl LedgerService for Ledger {
        async fn credit(&self, entry: LedgerEntry) -> Result<LedgerTransaction, LedgerError>;
        async fn debit(&self, entry: LedgerEntry) -> Result<LedgerTransaction, LedgerError>;
        async fn balance(&self, user_id: Uuid) -> Result<f64, LedgerError>;
    }
}

mock! {
    pub Sink {}

    #[async_trait]
    impl NotificationSink for Sink {
        async fn notify(&self, user_id: Uuid, notification: Notification) -> Result<(), NotificationError>;
        async fn broadcast_to_room(
            &self,
            room: &str,
            event: &str,
            payload: serde_json::Value,
        ) -> Result<(), NotificationError>;
    }
}

/// Delegates to an in-memory ledger but refuses one category of credit.
struct FlakyLedger {
    inner: Arc<InMemoryLedger>,
    refuse: LedgerCategory,
}

#[async_trait]
impl LedgerService for FlakyLedger {
    async fn credit(&self, entry: LedgerEntry) -> Result<LedgerTransaction, LedgerError> {
        if entry.category == self.refuse {
            return Err(LedgerError::Unavailable("ledger timed out".to_string()));
        }
        self.inner.credit(entry).await
    }

    async fn debit(&self, entry: LedgerEntry) -> Result<LedgerTransaction, LedgerError> {
        self.inner.debit(entry).await
    }

    async fn balance(&self, user_id: Uuid) -> Result<f64, LedgerError> {
        self.inner.balance(user_id).await
    }
}

fn accepted(direction: LedgerDirection, entry: LedgerEntry) -> Result<LedgerTransaction, LedgerError> {
    Ok(LedgerTransaction {
        id: Uuid::new_v4(),
        direction,
        balance_after: entry.amount,
        entry,
        created_at: Utc::now(),
    })
}

#[tokio::test]
async fn test_failed_ledger_call_compensates_earlier_calls() {
    let ledger = Arc::new(InMemoryLedger::new());
    let flaky = Arc::new(FlakyLedger {
        inner: ledger.clone(),
        refuse: LedgerCategory::PlatformCommission,
    });
    let f = build(TestConfig::default(), ledger.clone(), flaky).await;
    let booked = f.book(tuesday(), MORNING).await;
    ledger.seed(f.patient.id, 500.0).await;

    let err = f
        .service
        .record_payment(&f.patient_actor(), booked.id, PaymentMethod::Wallet, None)
        .await
        .unwrap_err();

    assert_matches!(err, AppError::ExternalService(_));
    assert_eq!(f.balance(f.patient.id).await, 500.0);
    assert_eq!(f.balance(f.doctor.id).await, 0.0);

    let compensations: Vec<_> = ledger
        .history()
        .await
        .into_iter()
        .filter(|tx| tx.entry.category == LedgerCategory::Compensation)
        .collect();
    assert_eq!(compensations.len(), 2);
    assert_eq!(compensations[0].entry.user_id, f.doctor.id);
    assert_eq!(compensations[0].direction, LedgerDirection::Debit);
    assert_eq!(compensations[1].entry.user_id, f.patient.id);
    assert_eq!(compensations[1].direction, LedgerDirection::Credit);

    let view = f.service.get_appointment(&f.patient_actor(), booked.id).await.unwrap();
    assert_eq!(view.payment_status, PaymentStatus::Pending);
    assert!(f.notifier.alerts_for(f.patient.id).await.is_empty());
}

#[tokio::test]
async fn test_balance_precheck_stops_refund_before_any_ledger_write() {
    let mut mock = MockLedger::new();
    mock.expect_credit()
        .times(2)
        .returning(|entry| accepted(LedgerDirection::Credit, entry));
    mock.expect_debit().never();
    mock.expect_balance().times(1).returning(|_| Ok(0.0));

    let f = build(TestConfig::default(), Arc::new(InMemoryLedger::new()), Arc::new(mock)).await;
    let booked = f.book(tuesday(), MORNING).await;
    f.service
        .record_payment(&Actor::system(), booked.id, PaymentMethod::Gateway, Some("pay_123".to_string()))
        .await
        .unwrap();
    f.service.approve_appointment(&f.doctor_actor(), booked.id).await.unwrap();

    let err = f
        .service
        .cancel_appointment(&f.doctor_actor(), booked.id, None)
        .await
        .unwrap_err();

    assert_matches!(err, AppError::BadRequest(_));
    let view = f.service.get_appointment(&f.doctor_actor(), booked.id).await.unwrap();
    assert_eq!(view.status, AppointmentStatus::Confirmed);
    assert_eq!(view.payment_status, PaymentStatus::Paid);
    assert!(f.slot_is_booked(Weekday::Tue, MORNING).await);
}

#[tokio::test]
async fn test_undeliverable_notifications_do_not_fail_committed_operations() {
    let mut sink = MockSink::new();
    sink.expect_notify()
        .times(1)
        .returning(|_, _| Err(NotificationError::Delivery("socket closed".to_string())));
    sink.expect_broadcast_to_room().never();

    let f = common::fixture().await;
    let service = AppointmentService::new(
        f.store.clone(),
        f.config.to_arc(),
        Collaborators {
            ledger: f.ledger.clone(),
            notifier: Arc::new(sink),
            chat: f.chat.clone(),
            clock: f.clock.clone(),
        },
    )
    .await;

    let booked = service
        .create_appointment(&f.patient_actor(), f.patient.id, f.video_request(tuesday(), MORNING))
        .await
        .unwrap();

    assert_eq!(booked.status, AppointmentStatus::Pending);
    assert!(f.slot_is_booked(Weekday::Tue, MORNING).await);
}
