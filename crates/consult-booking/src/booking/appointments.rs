use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use super::domain::{Appointment, AppointmentId, AppointmentStatus, Request, Slot, UserId};
use super::error::{BookingError, InvalidState, ValidationError};
use super::ids::IdSequence;
use super::repository::AppointmentStore;

/// Appointment-local rules. Appointments are the audit trail of every resolved request.
pub struct AppointmentLifecycle<A> {
    store: Arc<A>,
    ids: IdSequence,
}

impl<A: AppointmentStore> AppointmentLifecycle<A> {
    pub fn new(store: Arc<A>, ids: IdSequence) -> Self {
        Self { store, ids }
    }

    pub fn find(&self, appointment_id: &AppointmentId) -> Result<Option<Appointment>, BookingError> {
        Ok(self.store.find_by_id(appointment_id)?)
    }

    pub fn get(&self, appointment_id: &AppointmentId) -> Result<Appointment, BookingError> {
        self.find(appointment_id)?
            .ok_or_else(|| BookingError::appointment_not_found(appointment_id))
    }

    pub fn all(&self) -> Result<Vec<Appointment>, BookingError> {
        Ok(self.store.all()?)
    }

    pub fn list_for_student(&self, student_id: &UserId) -> Result<Vec<Appointment>, BookingError> {
        let mut appointments = self.all()?;
        appointments.retain(|appointment| &appointment.student_id == student_id);
        Ok(appointments)
    }

    pub fn list_for_lecturer(
        &self,
        lecturer_id: &UserId,
    ) -> Result<Vec<Appointment>, BookingError> {
        let mut appointments = self.all()?;
        appointments.retain(|appointment| &appointment.lecturer_id == lecturer_id);
        Ok(appointments)
    }

    /// Appointment created by an approval, timed from the slot being consumed.
    pub(crate) fn scheduled(
        &self,
        request: &Request,
        slot: &Slot,
    ) -> Result<Appointment, BookingError> {
        Ok(Appointment {
            appointment_id: AppointmentId(self.ids.next_id()?),
            request_id: request.request_id.clone(),
            student_id: request.student_id.clone(),
            lecturer_id: request.lecturer_id.clone(),
            slot_id: request.slot_id.clone(),
            date: slot.date,
            start_time: slot.start_time,
            status: AppointmentStatus::Scheduled,
            cancel_reason: String::new(),
        })
    }

    /// Audit record for a rejected or withdrawn request.
    pub(crate) fn cancelled(&self, request: &Request) -> Result<Appointment, BookingError> {
        Ok(Appointment {
            appointment_id: AppointmentId(self.ids.next_id()?),
            request_id: request.request_id.clone(),
            student_id: request.student_id.clone(),
            lecturer_id: request.lecturer_id.clone(),
            slot_id: request.slot_id.clone(),
            date: request.date,
            start_time: request.start_time,
            status: AppointmentStatus::Cancelled,
            cancel_reason: request.cancel_reason.clone(),
        })
    }

    pub(crate) fn completion(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Appointment, BookingError> {
        let mut appointment = self.scheduled_appointment(appointment_id)?;
        appointment.status = AppointmentStatus::Completed;
        Ok(appointment)
    }

    pub(crate) fn staff_cancellation(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Appointment, BookingError> {
        let mut appointment = self.scheduled_appointment(appointment_id)?;
        appointment.status = AppointmentStatus::Cancelled;
        Ok(appointment)
    }

    /// Moves an appointment onto the date and time of the slot backing it. Times that no
    /// slot backs are refused.
    pub(crate) fn rescheduling(
        &self,
        appointment_id: &AppointmentId,
        backing_slot: Option<&Slot>,
        new_date: NaiveDate,
        new_start: NaiveTime,
    ) -> Result<Appointment, BookingError> {
        let mut appointment = self.scheduled_appointment(appointment_id)?;

        let matches_slot = backing_slot
            .map(|slot| slot.date == new_date && slot.start_time == new_start)
            .unwrap_or(false);
        if !matches_slot {
            return Err(ValidationError::SlotMismatch {
                appointment_id: appointment_id.clone(),
                date: new_date,
                start: new_start,
            }
            .into());
        }

        appointment.date = new_date;
        appointment.start_time = new_start;
        Ok(appointment)
    }

    pub(crate) fn scheduled_appointment(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get(appointment_id)?;
        if appointment.status != AppointmentStatus::Scheduled {
            return Err(InvalidState::NotScheduled {
                appointment_id: appointment_id.clone(),
                status: appointment.status,
            }
            .into());
        }
        Ok(appointment)
    }
}
