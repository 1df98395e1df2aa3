use chrono::Duration;
use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use notification_cell::{appointment_room, Notification, NotificationSeverity};
use shared_models::auth::{Actor, UserRole};
use shared_models::error::AppError;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, AppointmentView, ClinicalNote, SessionStatus};
use crate::services::lifecycle::session_transition_allowed;
use crate::services::orchestrator::{ensure_party, is_treating_doctor, AppointmentService};
use crate::services::unit_of_work::{Outbox, UnitOfWork};
use crate::services::validation::normalize_note;

pub const SESSION_STATUS_EVENT: &str = "session_status_updated";
pub const CHAT_WINDOW_EVENT: &str = "post_consultation_chat_updated";

/// System chat text announcing a session transition.
pub fn session_notice(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Active => "The consultation has started.",
        SessionStatus::WaitingForDoctor => {
            "Consultation time is over. Waiting for the doctor to continue or end the session."
        }
        SessionStatus::ContinuedByDoctor => "The doctor has extended this consultation.",
        SessionStatus::Ended => "The consultation has ended.",
    }
}

/// Queue the chat notice and fan the change out to both parties, by user
/// id and on the appointment room.
pub fn queue_session_fanout(outbox: &mut Outbox, appointment: &Appointment, status: SessionStatus) {
    let text = session_notice(status);
    outbox.system_notice(appointment.id, text);

    for user_id in [appointment.patient_id, appointment.doctor_id] {
        outbox.notify(
            user_id,
            Notification::new("Session update", text, NotificationSeverity::Info, Some(appointment.id)),
        );
    }
    outbox.broadcast(
        appointment_room(appointment.id),
        SESSION_STATUS_EVENT,
        json!({
            "appointment_id": appointment.id,
            "session_status": status,
            "appointment_status": appointment.status,
            "extension_count": appointment.session.extension_count,
        }),
    );
}

impl AppointmentService {
    /// Drive the live-session state machine. Patients may only signal
    /// `WAITING_FOR_DOCTOR`; every other transition belongs to the doctor.
    #[instrument(skip(self, actor))]
    pub async fn update_session_status(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        target: SessionStatus,
    ) -> Result<AppointmentView, AppError> {
        let mut uow = self.begin().await;
        let result = self.update_session_inner(&mut uow, actor, appointment_id, target);
        self.finish(uow, result).await
    }

    fn update_session_inner(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        appointment_id: Uuid,
        target: SessionStatus,
    ) -> Result<AppointmentView, AppError> {
        let mut appointment = self.load(uow.tx(), appointment_id)?;
        ensure_party(actor, &appointment)?;

        let current = appointment.session.status;
        if current == Some(SessionStatus::Ended) {
            return Err(AppointmentError::SessionEnded.into());
        }
        if !matches!(
            appointment.status,
            AppointmentStatus::Confirmed | AppointmentStatus::Upcoming
        ) {
            return Err(AppointmentError::InvalidStatusTransition {
                status: appointment.status,
                action: "run the session of",
            }
            .into());
        }

        let drives_session = is_treating_doctor(actor, &appointment) || actor.role == UserRole::System;
        if target != SessionStatus::WaitingForDoctor && !drives_session {
            return Err(AppointmentError::Unauthorized(format!(
                "only the doctor can set the session to {}",
                target
            ))
            .into());
        }

        if !session_transition_allowed(current, target) {
            return Err(AppointmentError::InvalidSessionTransition {
                from: current.map(|s| s.to_string()).unwrap_or_else(|| "NONE".to_string()),
                to: target,
            }
            .into());
        }

        if current == Some(SessionStatus::Active) && target == SessionStatus::Active {
            debug!("Session of {} already active", appointment.appointment_code);
            return self.view(uow.tx(), &appointment);
        }

        let now = self.now();
        match target {
            SessionStatus::Active => {
                appointment.session.started_at.get_or_insert(now);
            }
            SessionStatus::WaitingForDoctor => {}
            SessionStatus::ContinuedByDoctor => {
                appointment.session.extension_count += 1;
            }
            SessionStatus::Ended => {
                self.finalize_completion(uow, &mut appointment)?;
            }
        }
        appointment.session.status = Some(target);
        self.save(uow, &mut appointment)?;

        queue_session_fanout(uow.outbox(), &appointment, target);

        info!(
            "Session of {} moved from {:?} to {}",
            appointment.appointment_code, current, target
        );
        self.view(uow.tx(), &appointment)
    }

    /// Open or close the post-consultation chat window. Opening requires a
    /// completed appointment and flags that tests are needed.
    #[instrument(skip(self, actor))]
    pub async fn set_post_consultation_chat(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        enabled: bool,
    ) -> Result<AppointmentView, AppError> {
        let mut uow = self.begin().await;
        let result = self.set_chat_window_inner(&mut uow, actor, appointment_id, enabled);
        self.finish(uow, result).await
    }

    fn set_chat_window_inner(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        appointment_id: Uuid,
        enabled: bool,
    ) -> Result<AppointmentView, AppError> {
        let mut appointment = self.load(uow.tx(), appointment_id)?;
        if !is_treating_doctor(actor, &appointment) {
            return Err(AppointmentError::Unauthorized(
                "only the treating doctor can manage the follow-up chat".to_string(),
            )
            .into());
        }

        let now = self.now();
        let text = if enabled {
            if appointment.status != AppointmentStatus::Completed {
                return Err(AppointmentError::InvalidStatusTransition {
                    status: appointment.status,
                    action: "open follow-up chat for",
                }
                .into());
            }
            let hours = self.config.booking.post_consultation_chat_hours;
            appointment.post_consultation_chat.is_active = true;
            appointment.post_consultation_chat.expires_at = Some(now + Duration::hours(hours));
            appointment.tests_needed = true;
            format!(
                "The doctor has opened a follow-up chat for the next {} hours to review your test results.",
                hours
            )
        } else {
            appointment.post_consultation_chat.is_active = false;
            appointment.post_consultation_chat.expires_at = Some(now);
            appointment.tests_needed = false;
            "The follow-up chat has been closed by the doctor.".to_string()
        };
        self.save(uow, &mut appointment)?;

        let outbox = uow.outbox();
        outbox.system_notice(appointment.id, text.clone());
        for user_id in [appointment.patient_id, appointment.doctor_id] {
            outbox.notify(
                user_id,
                Notification::new("Follow-up chat", text.clone(), NotificationSeverity::Info, Some(appointment.id)),
            );
        }
        outbox.broadcast(
            appointment_room(appointment.id),
            CHAT_WINDOW_EVENT,
            json!({
                "appointment_id": appointment.id,
                "is_active": appointment.post_consultation_chat.is_active,
                "expires_at": appointment.post_consultation_chat.expires_at,
                "tests_needed": appointment.tests_needed,
            }),
        );

        info!(
            "Follow-up chat for {} {}",
            appointment.appointment_code,
            if enabled { "opened" } else { "closed" }
        );
        self.view(uow.tx(), &appointment)
    }

    /// Append a clinical note. Notes stay writable after the session ends.
    pub async fn add_note(&self, actor: &Actor, appointment_id: Uuid, text: &str) -> Result<AppointmentView, AppError> {
        let mut uow = self.begin().await;
        let result = self.add_note_inner(&mut uow, actor, appointment_id, text);
        self.finish(uow, result).await
    }

    fn add_note_inner(
        &self,
        uow: &mut UnitOfWork,
        actor: &Actor,
        appointment_id: Uuid,
        text: &str,
    ) -> Result<AppointmentView, AppError> {
        let mut appointment = self.load(uow.tx(), appointment_id)?;
        if !is_treating_doctor(actor, &appointment) {
            return Err(AppointmentError::Unauthorized("only the treating doctor can add notes".to_string()).into());
        }
        let text = normalize_note(text)?;

        appointment.notes.push(ClinicalNote {
            id: Uuid::new_v4(),
            author_id: actor.id,
            text,
            created_at: self.now(),
        });
        self.save(uow, &mut appointment)?;

        debug!("Note added to {}", appointment.appointment_code);
        self.view(uow.tx(), &appointment)
    }
}
