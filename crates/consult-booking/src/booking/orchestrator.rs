use std::sync::{Arc, Mutex, PoisonError};

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, error, info};

use super::appointments::AppointmentLifecycle;
use super::audit::{self, ConsistencyReport};
use super::clock::Clock;
use super::domain::{
    Appointment, AppointmentId, Request, RequestId, Slot, SlotId, SlotStatus, UserId,
};
use super::error::{BookingError, IntegrityError};
use super::ids::IdSequence;
use super::policy::{BookingPolicy, SlotRetention};
use super::repository::{AppointmentStore, RequestStore, SlotStore};
use super::requests::RequestLifecycle;
use super::slots::SlotLifecycle;
use super::unit_of_work::UnitOfWork;

/// Entry point for every booking mutation.
///
/// Each operation runs under one process-wide writer lock and inside a [`UnitOfWork`], so
/// transitions never interleave and a failed step leaves no partial writes behind. Reads
/// through [`slots`](Self::slots), [`requests`](Self::requests) and
/// [`appointments`](Self::appointments) skip the lock and may observe a transition that is
/// still in flight.
pub struct BookingOrchestrator<S, R, A> {
    slot_store: Arc<S>,
    request_store: Arc<R>,
    appointment_store: Arc<A>,
    slots: SlotLifecycle<S>,
    requests: RequestLifecycle<R>,
    appointments: AppointmentLifecycle<A>,
    policy: BookingPolicy,
    writer: Mutex<()>,
}

type Work<'a, S, R, A> = UnitOfWork<'a, S, R, A>;

impl<S, R, A> BookingOrchestrator<S, R, A>
where
    S: SlotStore + 'static,
    R: RequestStore + 'static,
    A: AppointmentStore + 'static,
{
    /// Builds the orchestrator and seeds the id sequences from everything already stored.
    /// Appointments keep the slot and request ids they resolved, which covers records that
    /// have since been deleted.
    pub fn new(
        slot_store: Arc<S>,
        request_store: Arc<R>,
        appointment_store: Arc<A>,
        policy: BookingPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BookingError> {
        let existing_slots = slot_store.all()?;
        let existing_requests = request_store.all()?;
        let existing_appointments = appointment_store.all()?;

        let slot_ids = IdSequence::seeded(
            "S",
            existing_slots
                .iter()
                .map(|slot| slot.slot_id.as_str())
                .chain(existing_appointments.iter().map(|a| a.slot_id.as_str())),
        )?;
        let request_ids = IdSequence::seeded(
            "R",
            existing_requests
                .iter()
                .map(|request| request.request_id.as_str())
                .chain(existing_appointments.iter().map(|a| a.request_id.as_str())),
        )?;
        let appointment_ids = IdSequence::seeded(
            "A",
            existing_appointments
                .iter()
                .map(|appointment| appointment.appointment_id.as_str()),
        )?;

        Ok(Self {
            slots: SlotLifecycle::new(Arc::clone(&slot_store), slot_ids, clock),
            requests: RequestLifecycle::new(
                Arc::clone(&request_store),
                request_ids,
                policy.min_cancel_reason_chars,
            ),
            appointments: AppointmentLifecycle::new(Arc::clone(&appointment_store), appointment_ids),
            slot_store,
            request_store,
            appointment_store,
            policy,
            writer: Mutex::new(()),
        })
    }

    pub fn policy(&self) -> BookingPolicy {
        self.policy
    }

    pub fn slots(&self) -> &SlotLifecycle<S> {
        &self.slots
    }

    pub fn requests(&self) -> &RequestLifecycle<R> {
        &self.requests
    }

    pub fn appointments(&self) -> &AppointmentLifecycle<A> {
        &self.appointments
    }

    pub fn list_available(&self) -> Result<Vec<Slot>, BookingError> {
        self.slots.list_available()
    }

    pub fn create_slot(
        &self,
        lecturer_id: &UserId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Slot, BookingError> {
        let slot = self.transact("create_slot", |work| {
            let slot = self.slots.draft(lecturer_id, date, start, end)?;
            work.save_slot(slot.clone())?;
            Ok(slot)
        })?;

        info!(slot_id = %slot.slot_id, lecturer_id = %lecturer_id, %date, "slot published");
        Ok(slot)
    }

    pub fn update_slot(
        &self,
        slot_id: &SlotId,
        requester: &UserId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Slot, BookingError> {
        let slot = self.transact("update_slot", |work| {
            let slot = self.slots.revision(slot_id, requester, date, start, end)?;
            work.save_slot(slot.clone())?;
            Ok(slot)
        })?;

        info!(slot_id = %slot_id, %date, "slot rescheduled by lecturer");
        Ok(slot)
    }

    pub fn cancel_slot(&self, slot_id: &SlotId, requester: &UserId) -> Result<Slot, BookingError> {
        let slot = self.transact("cancel_slot", |work| {
            let slot = self.slots.cancellation(slot_id, requester)?;
            work.save_slot(slot.clone())?;
            Ok(slot)
        })?;

        info!(slot_id = %slot_id, "slot cancelled by lecturer");
        Ok(slot)
    }

    /// Files a pending request and puts the slot on hold.
    pub fn create_request(
        &self,
        student_id: &UserId,
        lecturer_id: &UserId,
        slot_id: &SlotId,
        reason: &str,
    ) -> Result<Request, BookingError> {
        let request = self.transact("create_request", |work| {
            let slot = self.slots.find(slot_id)?;
            let request =
                self.requests
                    .draft(student_id, lecturer_id, slot_id, slot.as_ref(), reason)?;
            work.save_request(request.clone())?;
            self.set_slot_status(work, slot_id, SlotStatus::OnHold)?;
            Ok(request)
        })?;

        info!(
            request_id = %request.request_id,
            student_id = %student_id,
            slot_id = %slot_id,
            "consultation requested"
        );
        Ok(request)
    }

    /// Turns a pending request into a scheduled appointment, consuming its slot.
    pub fn approve_request(&self, request_id: &RequestId) -> Result<Appointment, BookingError> {
        let appointment = self.transact("approve_request", |work| {
            let request = self.requests.approval(request_id)?;
            let slot = self.referenced_slot(&request.slot_id, request_id.as_str())?;
            if matches!(slot.status, SlotStatus::Booked | SlotStatus::Cancelled) {
                return Err(IntegrityError::SlotStatusDrift {
                    slot_id: slot.slot_id,
                    referenced_by: request_id.to_string(),
                    status: slot.status,
                }
                .into());
            }

            let appointment = self.appointments.scheduled(&request, &slot)?;
            work.save_appointment(appointment.clone())?;
            match self.policy.slot_retention {
                SlotRetention::ConsumeOnApproval => {
                    work.delete_slot(&slot.slot_id)?;
                }
                SlotRetention::KeepBookedUntilCompletion => {
                    self.set_slot_status(work, &slot.slot_id, SlotStatus::Booked)?;
                }
            }
            work.delete_request(request_id)?;
            Ok(appointment)
        })?;

        info!(
            request_id = %request_id,
            appointment_id = %appointment.appointment_id,
            slot_id = %appointment.slot_id,
            "request approved"
        );
        Ok(appointment)
    }

    /// Staff decision declining a pending request.
    pub fn reject_request(
        &self,
        request_id: &RequestId,
        cancel_reason: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.transact("reject_request", |work| {
            let request = self.requests.rejection(request_id, cancel_reason)?;
            self.release_and_archive(work, request)
        })?;

        info!(
            request_id = %request_id,
            appointment_id = %appointment.appointment_id,
            "request rejected"
        );
        Ok(appointment)
    }

    /// Student withdrawal of their own pending request.
    pub fn cancel_request(
        &self,
        request_id: &RequestId,
        student_id: &UserId,
        cancel_reason: &str,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.transact("cancel_request", |work| {
            let request = self
                .requests
                .student_cancellation(request_id, student_id, cancel_reason)?;
            self.release_and_archive(work, request)
        })?;

        info!(
            request_id = %request_id,
            student_id = %student_id,
            appointment_id = %appointment.appointment_id,
            "request withdrawn by student"
        );
        Ok(appointment)
    }

    /// Marks a scheduled appointment completed and deletes its backing slot.
    pub fn complete_appointment(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.transact("complete_appointment", |work| {
            let appointment = self.appointments.completion(appointment_id)?;
            let slot = self.backing_slot(&appointment)?;

            work.save_appointment(appointment.clone())?;
            if let Some(slot) = slot {
                work.delete_slot(&slot.slot_id)?;
            }
            Ok(appointment)
        })?;

        info!(appointment_id = %appointment_id, "appointment completed");
        Ok(appointment)
    }

    /// Staff cancellation of a scheduled appointment; a still-stored slot is reopened.
    pub fn cancel_appointment(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.transact("cancel_appointment", |work| {
            let appointment = self.appointments.staff_cancellation(appointment_id)?;
            let slot = self.backing_slot(&appointment)?;

            work.save_appointment(appointment.clone())?;
            if let Some(slot) = slot {
                self.set_slot_status(work, &slot.slot_id, SlotStatus::Open)?;
            }
            Ok(appointment)
        })?;

        info!(appointment_id = %appointment_id, "appointment cancelled by staff");
        Ok(appointment)
    }

    pub fn reschedule_appointment(
        &self,
        appointment_id: &AppointmentId,
        new_date: NaiveDate,
        new_start: NaiveTime,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.transact("reschedule_appointment", |work| {
            let current = self.appointments.scheduled_appointment(appointment_id)?;
            let slot = self.backing_slot(&current)?;
            let appointment = self.appointments.rescheduling(
                appointment_id,
                slot.as_ref(),
                new_date,
                new_start,
            )?;
            work.save_appointment(appointment.clone())?;
            Ok(appointment)
        })?;

        info!(appointment_id = %appointment_id, %new_date, "appointment rescheduled");
        Ok(appointment)
    }

    /// Scans all three stores under the writer lock and reports invariant violations.
    pub fn audit(&self) -> Result<ConsistencyReport, BookingError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let slots = self.slot_store.all()?;
        let requests = self.request_store.all()?;
        let appointments = self.appointment_store.all()?;
        Ok(audit::check(&slots, &requests, &appointments))
    }

    fn transact<T>(
        &self,
        operation: &'static str,
        work: impl FnOnce(&mut Work<'_, S, R, A>) -> Result<T, BookingError>,
    ) -> Result<T, BookingError> {
        // The lock guards no data of its own, so a poisoned lock is still usable.
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut unit = UnitOfWork::begin(
            operation,
            &*self.slot_store,
            &*self.request_store,
            &*self.appointment_store,
        );

        match work(&mut unit) {
            Ok(value) => {
                unit.commit();
                Ok(value)
            }
            Err(err) => {
                debug!(operation, error = %err, "booking operation failed");
                if let Err(integrity) = unit.rollback() {
                    error!(operation, error = %err, rollback = %integrity, "stores left inconsistent");
                    return Err(integrity.into());
                }
                Err(err)
            }
        }
    }

    fn set_slot_status(
        &self,
        work: &mut Work<'_, S, R, A>,
        slot_id: &SlotId,
        status: SlotStatus,
    ) -> Result<Slot, BookingError> {
        let slot = self.slots.with_status(slot_id, status)?;
        work.save_slot(slot.clone())?;
        Ok(slot)
    }

    fn release_and_archive(
        &self,
        work: &mut Work<'_, S, R, A>,
        request: Request,
    ) -> Result<Appointment, BookingError> {
        let slot = self.referenced_slot(&request.slot_id, request.request_id.as_str())?;
        self.set_slot_status(work, &slot.slot_id, SlotStatus::Open)?;

        let appointment = self.appointments.cancelled(&request)?;
        work.save_appointment(appointment.clone())?;
        work.delete_request(&request.request_id)?;
        Ok(appointment)
    }

    fn referenced_slot(&self, slot_id: &SlotId, referenced_by: &str) -> Result<Slot, BookingError> {
        self.slots.find(slot_id)?.ok_or_else(|| {
            IntegrityError::SlotMissing {
                slot_id: slot_id.clone(),
                referenced_by: referenced_by.to_string(),
            }
            .into()
        })
    }

    /// The slot behind an appointment. Consumed slots are expected to be gone; a retained
    /// slot that has disappeared means the stores drifted.
    fn backing_slot(&self, appointment: &Appointment) -> Result<Option<Slot>, BookingError> {
        match self.policy.slot_retention {
            SlotRetention::ConsumeOnApproval => self.slots.find(&appointment.slot_id),
            SlotRetention::KeepBookedUntilCompletion => self
                .referenced_slot(&appointment.slot_id, appointment.appointment_id.as_str())
                .map(Some),
        }
    }
}
