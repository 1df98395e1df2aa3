#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc, Weekday};

use appointment_cell::{AppointmentService, AppointmentView, BookAppointmentRequest, Collaborators, PaymentMethod};
use doctor_cell::services::validation::full_week;
use doctor_cell::{
    ConsultationType, CreateDoctorRequest, CreateScheduleRequest, DayInput, Doctor, DoctorService,
    ScheduleService, SlotInput,
};
use notification_cell::{InMemoryChatLog, RealtimeNotificationService};
use patient_cell::{CreatePatientRequest, Patient, PatientService};
use scheduler_cell::DaemonContext;
use shared_database::DocumentStore;
use shared_models::auth::Actor;
use shared_utils::test_utils::{fixed_now, manual_clock, next_weekday, range, TestConfig};
use shared_utils::time::OperatingTimezone;
use shared_utils::ManualClock;
use wallet_cell::InMemoryLedger;

pub const MORNING: &str = "09:00-09:30";

pub struct Harness {
    pub ctx: DaemonContext,
    pub clock: Arc<ManualClock>,
    pub ledger: Arc<InMemoryLedger>,
    pub notifier: Arc<RealtimeNotificationService>,
    pub chat: Arc<InMemoryChatLog>,
    pub schedules: ScheduleService,
    pub doctor: Doctor,
    pub patient: Patient,
}

impl Harness {
    pub fn service(&self) -> &AppointmentService {
        &self.ctx.appointments
    }

    pub fn timezone(&self) -> OperatingTimezone {
        self.ctx.timezone
    }

    /// The UTC instant of `hh:mm` local time on `date`.
    pub fn at(&self, date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
        self.ctx.timezone.instant(date, shared_utils::test_utils::clock(hour, minute))
    }

    pub async fn book(&self, date: NaiveDate) -> AppointmentView {
        let schedule = self.schedules.get_schedule(self.doctor.id).await.unwrap();
        let slot_id = schedule
            .day_for_date(date)
            .and_then(|day| day.slots.iter().find(|slot| slot.time_range == range(MORNING)))
            .map(|slot| slot.slot_id.clone())
            .expect("fixture slot on every weekday");
        self.service()
            .create_appointment(
                &Actor::patient(self.patient.id),
                self.patient.id,
                BookAppointmentRequest {
                    doctor_id: self.doctor.id,
                    consultation_type: ConsultationType::Video,
                    date,
                    time_range: range(MORNING),
                    slot_id: Some(slot_id),
                    reason: None,
                },
            )
            .await
            .unwrap()
    }

    pub async fn confirmed(&self, date: NaiveDate) -> AppointmentView {
        let booked = self.book(date).await;
        self.ledger.seed(self.patient.id, 500.0).await;
        self.service()
            .record_payment(&Actor::patient(self.patient.id), booked.id, PaymentMethod::Wallet, None)
            .await
            .unwrap();
        self.service()
            .approve_appointment(&Actor::doctor(self.doctor.id), booked.id)
            .await
            .unwrap()
    }

    pub async fn slot_is_booked(&self, weekday: Weekday) -> bool {
        let schedule = self.schedules.get_schedule(self.doctor.id).await.unwrap();
        schedule
            .day(weekday)
            .and_then(|day| day.slots.iter().find(|slot| slot.time_range == range(MORNING)))
            .map(|slot| slot.is_booked)
            .unwrap_or(false)
    }
}

pub fn tuesday() -> NaiveDate {
    next_weekday(fixed_now().date_naive(), Weekday::Tue)
}

pub fn period() -> Duration {
    Duration::from_millis(10)
}

pub async fn harness() -> Harness {
    let config = TestConfig::default();
    let store = DocumentStore::new();
    let clock = manual_clock();
    let ledger = Arc::new(InMemoryLedger::new());
    let notifier = Arc::new(RealtimeNotificationService::new());
    let chat = Arc::new(InMemoryChatLog::new());

    let doctor = DoctorService::new(store.clone(), clock.clone())
        .await
        .create_doctor(CreateDoctorRequest {
            first_name: "Kiran".to_string(),
            last_name: "Shah".to_string(),
            email: "kiran.shah@example.com".to_string(),
            specialty: "Dermatology".to_string(),
            video_fee: Some(500.0),
            chat_fee: None,
        })
        .await
        .unwrap();
    let patient = PatientService::new(store.clone())
        .await
        .create_patient(CreatePatientRequest {
            first_name: "Lena".to_string(),
            last_name: "Pillai".to_string(),
            email: "lena@example.com".to_string(),
            phone_number: None,
        })
        .await
        .unwrap();

    let schedules = ScheduleService::new(store.clone(), clock.clone(), config.timezone());
    let slot = range(MORNING);
    schedules
        .create_schedule(
            &Actor::doctor(doctor.id),
            doctor.id,
            CreateScheduleRequest {
                weekly: full_week()
                    .into_iter()
                    .map(|day| DayInput {
                        day,
                        is_enabled: true,
                        slots: vec![SlotInput {
                            slot_id: None,
                            start_time: slot.start(),
                            end_time: slot.end(),
                            is_enabled: None,
                        }],
                    })
                    .collect(),
                slot_duration_minutes: None,
                buffer_minutes: None,
                max_patients_per_slot: None,
            },
        )
        .await
        .unwrap();

    let appointments = Arc::new(
        AppointmentService::new(
            store.clone(),
            config.to_arc(),
            Collaborators {
                ledger: ledger.clone(),
                notifier: notifier.clone(),
                chat: chat.clone(),
                clock: clock.clone(),
            },
        )
        .await,
    );

    Harness {
        ctx: DaemonContext {
            store,
            appointments,
            notifier: notifier.clone(),
            chat: chat.clone(),
            clock: clock.clone(),
            timezone: config.timezone(),
        },
        clock,
        ledger,
        notifier,
        chat,
        schedules,
        doctor,
        patient,
    }
}
