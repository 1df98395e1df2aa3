mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Weekday};
use futures::future::join_all;
use tokio_test::assert_ok;

use appointment_cell::{AppointmentStatus, PaymentMethod, PaymentStatus};
use patient_cell::{CreatePatientRequest, PatientService};
use shared_models::auth::Actor;
use shared_models::error::AppError;

use common::{fixture, tuesday, MORNING};

#[tokio::test]
async fn test_booking_splits_fee_and_holds_slot() {
    let f = fixture().await;

    let view = f.book(tuesday(), MORNING).await;

    assert_eq!(view.status, AppointmentStatus::Pending);
    assert_eq!(view.payment_status, PaymentStatus::Pending);
    assert_eq!(view.consultation_fee, 500.0);
    assert_eq!(view.admin_commission, 100.0);
    assert_eq!(view.doctor_earnings, 400.0);
    assert!(view.appointment_code.starts_with("APP"));
    assert_eq!(view.patient.resolved().map(|p| p.full_name.as_str()), Some("Meera Iyer"));
    assert_eq!(view.doctor.id(), f.doctor.id);
    assert!(f.slot_is_booked(Weekday::Tue, MORNING).await);

    let alerts = f.notifier.alerts_for(f.doctor.id).await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].notification.appointment_id, Some(view.id));
}

#[tokio::test]
async fn test_rebooking_own_unpaid_slot_reuses_appointment() {
    let f = fixture().await;
    let first = f.book(tuesday(), MORNING).await;

    f.clock.advance(Duration::seconds(181));
    let second = f.book(tuesday(), MORNING).await;

    assert_eq!(second.id, first.id);
    assert_eq!(second.appointment_code, first.appointment_code);
    let listed = f
        .service
        .list_patient_appointments(&f.patient_actor(), f.patient.id, None)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_rebooking_during_live_checkout_conflicts() {
    let f = fixture().await;
    f.book(tuesday(), MORNING).await;

    f.clock.advance(Duration::seconds(60));
    let err = f
        .service
        .create_appointment(&f.patient_actor(), f.patient.id, f.video_request(tuesday(), MORNING))
        .await
        .unwrap_err();

    assert_matches!(err, AppError::Conflict(_));
}

#[tokio::test]
async fn test_other_patient_cannot_take_booked_slot() {
    let f = fixture().await;
    f.book(tuesday(), MORNING).await;

    let other = PatientService::new(f.store.clone())
        .await
        .create_patient(CreatePatientRequest {
            first_name: "Arjun".to_string(),
            last_name: "Das".to_string(),
            email: "arjun@example.com".to_string(),
            phone_number: None,
        })
        .await
        .unwrap();

    let err = f
        .service
        .create_appointment(&Actor::patient(other.id), other.id, f.video_request(tuesday(), MORNING))
        .await
        .unwrap_err();

    assert_matches!(err, AppError::BadRequest(msg) if msg.contains("not available"));
}

#[tokio::test]
async fn test_patient_cannot_book_for_someone_else() {
    let f = fixture().await;
    let stranger = Actor::patient(uuid::Uuid::new_v4());

    let err = f
        .service
        .create_appointment(&stranger, f.patient.id, f.video_request(tuesday(), MORNING))
        .await
        .unwrap_err();

    assert_matches!(err, AppError::Forbidden(_));
}

#[tokio::test]
async fn test_past_date_is_rejected() {
    let f = fixture().await;
    let yesterday = f.clock_today() - Duration::days(1);

    let err = f
        .service
        .create_appointment(&f.patient_actor(), f.patient.id, f.video_request(yesterday, MORNING))
        .await
        .unwrap_err();

    assert_matches!(err, AppError::ValidationError(_));
    assert!(!f.slot_is_booked(Weekday::Sun, MORNING).await);
}

#[tokio::test]
async fn test_mismatched_slot_range_is_rejected() {
    let f = fixture().await;
    let mut request = f.video_request(tuesday(), MORNING);
    request.time_range = shared_utils::test_utils::range("09:00-09:45");

    let err = f
        .service
        .create_appointment(&f.patient_actor(), f.patient.id, request)
        .await
        .unwrap_err();

    assert_matches!(err, AppError::ValidationError(_));
    assert!(!f.slot_is_booked(Weekday::Tue, MORNING).await);
}

#[tokio::test]
async fn test_wallet_payment_moves_money() {
    let f = fixture().await;
    let booked = f.book(tuesday(), MORNING).await;
    f.ledger.seed(f.patient.id, 600.0).await;

    let paid = assert_ok!(
        f.service
            .record_payment(&f.patient_actor(), booked.id, PaymentMethod::Wallet, Some("wallet".to_string()))
            .await
    );

    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.status, AppointmentStatus::Pending);
    assert_eq!(f.balance(f.patient.id).await, 100.0);
    assert_eq!(f.balance(f.doctor.id).await, 400.0);
    assert_eq!(f.balance(f.config.platform_account_id).await, 100.0);

    let err = f
        .service
        .record_payment(&f.patient_actor(), booked.id, PaymentMethod::Wallet, None)
        .await
        .unwrap_err();
    assert_matches!(err, AppError::ValidationError(_));
}

#[tokio::test]
async fn test_wallet_payment_without_funds_leaves_booking_unpaid() {
    let f = fixture().await;
    let booked = f.book(tuesday(), MORNING).await;

    let err = f
        .service
        .record_payment(&f.patient_actor(), booked.id, PaymentMethod::Wallet, None)
        .await
        .unwrap_err();

    assert_matches!(err, AppError::BadRequest(_));
    let view = f.service.get_appointment(&f.patient_actor(), booked.id).await.unwrap();
    assert_eq!(view.payment_status, PaymentStatus::Pending);
    assert_eq!(f.balance(f.doctor.id).await, 0.0);
}

#[tokio::test]
async fn test_payment_failure_cancels_and_frees_slot() {
    let f = fixture().await;
    let booked = f.book(tuesday(), MORNING).await;

    let failed = f
        .service
        .record_payment_failure(&Actor::system(), booked.id, None)
        .await
        .unwrap();

    assert_eq!(failed.status, AppointmentStatus::Cancelled);
    assert_eq!(failed.payment_status, PaymentStatus::Failed);
    assert!(!f.slot_is_booked(Weekday::Tue, MORNING).await);
}

#[tokio::test]
async fn test_concurrent_bookings_of_one_slot_have_single_winner() {
    let f = fixture().await;
    let patients = PatientService::new(f.store.clone()).await;

    let mut bookers = Vec::new();
    for i in 0..8 {
        let patient = patients
            .create_patient(CreatePatientRequest {
                first_name: format!("Patient{}", i),
                last_name: "Load".to_string(),
                email: format!("load{}@example.com", i),
                phone_number: None,
            })
            .await
            .unwrap();
        bookers.push(patient.id);
    }

    let request = f.video_request(tuesday(), MORNING);
    let service = Arc::new(f.service);
    let handles = bookers.into_iter().map(|patient_id| {
        let service = Arc::clone(&service);
        let request = request.clone();
        tokio::spawn(async move {
            service
                .create_appointment(&Actor::patient(patient_id), patient_id, request)
                .await
        })
    });

    let outcomes: Vec<_> = join_all(handles).await.into_iter().map(|joined| joined.unwrap()).collect();

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    for outcome in outcomes.iter().filter(|outcome| outcome.is_err()) {
        assert_matches!(outcome, Err(AppError::BadRequest(_)));
    }
}

#[tokio::test]
async fn test_views_are_visible_to_parties_only() {
    let f = fixture().await;
    let booked = f.book(tuesday(), MORNING).await;

    let as_doctor = f.service.get_appointment(&f.doctor_actor(), booked.id).await.unwrap();
    assert_eq!(as_doctor.id, booked.id);

    let stranger = Actor::doctor(uuid::Uuid::new_v4());
    let err = f.service.get_appointment(&stranger, booked.id).await.unwrap_err();
    assert_matches!(err, AppError::Forbidden(_));

    let err = f
        .service
        .list_doctor_appointments(&stranger, f.doctor.id, None)
        .await
        .unwrap_err();
    assert_matches!(err, AppError::Forbidden(_));

    let pending = f
        .service
        .list_doctor_appointments(&f.doctor_actor(), f.doctor.id, Some(AppointmentStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);

    let missing = f
        .service
        .get_appointment(&Actor::admin(uuid::Uuid::new_v4()), uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(missing, AppError::NotFound(_));
}
