#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, Weekday};

use appointment_cell::{AppointmentService, AppointmentView, BookAppointmentRequest, Collaborators, PaymentMethod};
use doctor_cell::services::validation::full_week;
use doctor_cell::{
    ConsultationType, CreateDoctorRequest, CreateScheduleRequest, DayInput, Doctor, DoctorService,
    DoctorSchedule, ScheduleService, SlotInput,
};
use notification_cell::{InMemoryChatLog, RealtimeNotificationService};
use patient_cell::{CreatePatientRequest, Patient, PatientService};
use shared_database::DocumentStore;
use shared_models::auth::Actor;
use shared_utils::test_utils::{fixed_now, manual_clock, next_weekday, range, TestConfig};
use shared_utils::{Clock, ManualClock};
use wallet_cell::{InMemoryLedger, LedgerService};

pub const MORNING: &str = "09:00-09:30";
pub const LATE_MORNING: &str = "10:00-10:30";

pub struct Fixture {
    pub store: DocumentStore,
    pub clock: Arc<ManualClock>,
    pub ledger: Arc<InMemoryLedger>,
    pub notifier: Arc<RealtimeNotificationService>,
    pub chat: Arc<InMemoryChatLog>,
    pub config: TestConfig,
    pub service: AppointmentService,
    pub schedules: ScheduleService,
    pub doctor: Doctor,
    pub patient: Patient,
    pub schedule: DoctorSchedule,
}

impl Fixture {
    pub fn doctor_actor(&self) -> Actor {
        Actor::doctor(self.doctor.id)
    }

    pub fn patient_actor(&self) -> Actor {
        Actor::patient(self.patient.id)
    }

    pub fn clock_today(&self) -> NaiveDate {
        self.config.timezone().today(self.clock.now())
    }

    pub fn slot_id(&self, weekday: Weekday, raw_range: &str) -> String {
        let wanted = range(raw_range);
        self.schedule
            .day(weekday)
            .and_then(|day| day.slots.iter().find(|slot| slot.time_range == wanted))
            .map(|slot| slot.slot_id.clone())
            .expect("slot exists in fixture schedule")
    }

    pub fn video_request(&self, date: NaiveDate, raw_range: &str) -> BookAppointmentRequest {
        BookAppointmentRequest {
            doctor_id: self.doctor.id,
            consultation_type: ConsultationType::Video,
            date,
            time_range: range(raw_range),
            slot_id: Some(self.slot_id(weekday_of(date), raw_range)),
            reason: Some("Persistent cough".to_string()),
        }
    }

    pub async fn book(&self, date: NaiveDate, raw_range: &str) -> AppointmentView {
        self.service
            .create_appointment(&self.patient_actor(), self.patient.id, self.video_request(date, raw_range))
            .await
            .expect("booking succeeds")
    }

    /// Booked, paid from the patient's wallet and approved by the doctor.
    pub async fn confirmed(&self, date: NaiveDate, raw_range: &str) -> AppointmentView {
        let booked = self.book(date, raw_range).await;
        self.ledger.seed(self.patient.id, booked.consultation_fee).await;
        self.service
            .record_payment(&self.patient_actor(), booked.id, PaymentMethod::Wallet, None)
            .await
            .expect("payment succeeds");
        self.service
            .approve_appointment(&self.doctor_actor(), booked.id)
            .await
            .expect("approval succeeds")
    }

    pub async fn balance(&self, user: uuid::Uuid) -> f64 {
        self.ledger.balance(user).await.expect("in-memory ledger balance")
    }

    pub async fn slot_is_booked(&self, weekday: Weekday, raw_range: &str) -> bool {
        let schedule = self.schedules.get_schedule(self.doctor.id).await.expect("schedule exists");
        let wanted = range(raw_range);
        schedule
            .day(weekday)
            .and_then(|day| day.slots.iter().find(|slot| slot.time_range == wanted))
            .map(|slot| slot.is_booked)
            .unwrap_or(false)
    }
}

pub fn weekday_of(date: NaiveDate) -> Weekday {
    use chrono::Datelike;
    date.weekday()
}

/// Next Tuesday after the fixture clock's Monday.
pub fn tuesday() -> NaiveDate {
    next_weekday(fixed_now().date_naive(), Weekday::Tue)
}

pub fn wednesday() -> NaiveDate {
    next_weekday(fixed_now().date_naive(), Weekday::Wed)
}

fn slot(raw: &str) -> SlotInput {
    let r = range(raw);
    SlotInput {
        slot_id: None,
        start_time: r.start(),
        end_time: r.end(),
        is_enabled: None,
    }
}

pub async fn fixture() -> Fixture {
    fixture_with(TestConfig::default(), Arc::new(InMemoryLedger::new())).await
}

pub async fn fixture_with(config: TestConfig, ledger: Arc<InMemoryLedger>) -> Fixture {
    let ledger_service: Arc<dyn LedgerService> = ledger.clone();
    build(config, ledger, ledger_service).await
}

/// Wire the orchestrator against an arbitrary ledger implementation while
/// keeping an in-memory ledger around for seeding and assertions.
pub async fn build(config: TestConfig, ledger: Arc<InMemoryLedger>, ledger_service: Arc<dyn LedgerService>) -> Fixture {
    let store = DocumentStore::new();
    let clock = manual_clock();
    let notifier = Arc::new(RealtimeNotificationService::new());
    let chat = Arc::new(InMemoryChatLog::new());

    let doctors = DoctorService::new(store.clone(), clock.clone()).await;
    let doctor = doctors
        .create_doctor(CreateDoctorRequest {
            first_name: "Anita".to_string(),
            last_name: "Rao".to_string(),
            email: "anita.rao@example.com".to_string(),
            specialty: "General Medicine".to_string(),
            video_fee: Some(500.0),
            chat_fee: Some(250.0),
        })
        .await
        .expect("doctor created");

    let patients = PatientService::new(store.clone()).await;
    let patient = patients
        .create_patient(CreatePatientRequest {
            first_name: "Meera".to_string(),
            last_name: "Iyer".to_string(),
            email: "meera@example.com".to_string(),
            phone_number: None,
        })
        .await
        .expect("patient created");

    let schedules = ScheduleService::new(store.clone(), clock.clone(), config.timezone());
    let schedule = schedules
        .create_schedule(
            &Actor::doctor(doctor.id),
            doctor.id,
            CreateScheduleRequest {
                weekly: full_week()
                    .into_iter()
                    .map(|day| DayInput {
                        day,
                        is_enabled: true,
                        slots: vec![slot(MORNING), slot(LATE_MORNING)],
                    })
                    .collect(),
                slot_duration_minutes: Some(30),
                buffer_minutes: None,
                max_patients_per_slot: None,
            },
        )
        .await
        .expect("schedule created");

    let service = AppointmentService::new(
        store.clone(),
        config.to_arc(),
        Collaborators {
            ledger: ledger_service,
            notifier: notifier.clone(),
            chat: chat.clone(),
            clock: clock.clone(),
        },
    )
    .await;

    Fixture {
        store,
        clock,
        ledger,
        notifier,
        chat,
        config,
        service,
        schedules,
        doctor,
        patient,
        schedule,
    }
}
