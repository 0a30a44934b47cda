use std::sync::Arc;

use super::domain::{Request, RequestId, RequestStatus, Slot, SlotId, SlotStatus, UserId};
use super::error::{BookingError, EntityKind, IntegrityError, InvalidState, ValidationError};
use super::ids::IdSequence;
use super::repository::RequestStore;

/// Request-local rules: booking eligibility, student ownership and cancellation reasons.
pub struct RequestLifecycle<R> {
    store: Arc<R>,
    ids: IdSequence,
    min_cancel_reason_chars: usize,
}

impl<R: RequestStore> RequestLifecycle<R> {
    pub fn new(store: Arc<R>, ids: IdSequence, min_cancel_reason_chars: usize) -> Self {
        Self {
            store,
            ids,
            min_cancel_reason_chars,
        }
    }

    pub fn find(&self, request_id: &RequestId) -> Result<Option<Request>, BookingError> {
        Ok(self.store.find_by_id(request_id)?)
    }

    pub fn get(&self, request_id: &RequestId) -> Result<Request, BookingError> {
        self.find(request_id)?
            .ok_or_else(|| BookingError::request_not_found(request_id))
    }

    pub fn all(&self) -> Result<Vec<Request>, BookingError> {
        Ok(self.store.all()?)
    }

    /// Requests awaiting a staff decision.
    pub fn list_pending(&self) -> Result<Vec<Request>, BookingError> {
        let mut requests = self.all()?;
        requests.retain(|request| request.status == RequestStatus::Pending);
        Ok(requests)
    }

    pub fn list_for_student(&self, student_id: &UserId) -> Result<Vec<Request>, BookingError> {
        let mut requests = self.all()?;
        requests.retain(|request| &request.student_id == student_id);
        Ok(requests)
    }

    /// Builds a pending request for `slot`, which must exist, be open and be free of any
    /// other live request.
    pub(crate) fn draft(
        &self,
        student_id: &UserId,
        lecturer_id: &UserId,
        slot_id: &SlotId,
        slot: Option<&Slot>,
        reason: &str,
    ) -> Result<Request, BookingError> {
        let slot = match slot {
            Some(slot) if slot.status == SlotStatus::Open => slot,
            other => {
                return Err(InvalidState::SlotUnavailable {
                    slot_id: slot_id.clone(),
                    status: other.map(|slot| slot.status),
                }
                .into())
            }
        };

        if &slot.lecturer_id != lecturer_id {
            return Err(ValidationError::LecturerMismatch {
                slot_id: slot_id.clone(),
                owner: slot.lecturer_id.clone(),
                lecturer_id: lecturer_id.clone(),
            }
            .into());
        }
        require_text("reason", reason)?;

        if let Some(existing) = self
            .all()?
            .into_iter()
            .find(|request| &request.slot_id == slot_id && request.status == RequestStatus::Pending)
        {
            return Err(IntegrityError::SlotDoubleBooked {
                slot_id: slot_id.clone(),
                request_id: existing.request_id,
            }
            .into());
        }

        Ok(Request {
            request_id: RequestId(self.ids.next_id()?),
            student_id: student_id.clone(),
            lecturer_id: lecturer_id.clone(),
            slot_id: slot_id.clone(),
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            reason: reason.to_string(),
            status: RequestStatus::Pending,
            cancel_reason: String::new(),
        })
    }

    /// Loads a request that a staff decision can act on.
    pub(crate) fn pending(&self, request_id: &RequestId) -> Result<Request, BookingError> {
        let request = self.get(request_id)?;
        if request.status != RequestStatus::Pending {
            return Err(InvalidState::NotPending {
                request_id: request_id.clone(),
                status: request.status,
            }
            .into());
        }
        Ok(request)
    }

    pub(crate) fn approval(&self, request_id: &RequestId) -> Result<Request, BookingError> {
        let mut request = self.pending(request_id)?;
        request.status = RequestStatus::Approved;
        Ok(request)
    }

    /// Staff rejection only needs a non-empty reason.
    pub(crate) fn rejection(
        &self,
        request_id: &RequestId,
        cancel_reason: &str,
    ) -> Result<Request, BookingError> {
        let mut request = self.pending(request_id)?;
        require_text("cancel reason", cancel_reason)?;

        request.status = RequestStatus::Cancelled;
        request.cancel_reason = cancel_reason.to_string();
        Ok(request)
    }

    /// Student cancellation additionally enforces ownership and the minimum reason length.
    pub(crate) fn student_cancellation(
        &self,
        request_id: &RequestId,
        student_id: &UserId,
        cancel_reason: &str,
    ) -> Result<Request, BookingError> {
        let mut request = self.get(request_id)?;
        if &request.student_id != student_id {
            return Err(BookingError::NotOwner {
                entity: EntityKind::Request,
                id: request_id.to_string(),
                requester: student_id.clone(),
            });
        }
        if request.status != RequestStatus::Pending {
            return Err(InvalidState::NotCancelable {
                entity: EntityKind::Request,
                id: request_id.to_string(),
                status: request.status.label(),
            }
            .into());
        }

        require_text("cancel reason", cancel_reason)?;
        let actual = cancel_reason.trim().chars().count();
        if actual < self.min_cancel_reason_chars {
            return Err(ValidationError::ReasonTooShort {
                field: "cancel reason",
                minimum: self.min_cancel_reason_chars,
                actual,
            }
            .into());
        }

        request.status = RequestStatus::Cancelled;
        request.cancel_reason = cancel_reason.to_string();
        Ok(request)
    }
}

fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyReason { field })
    } else {
        Ok(())
    }
}
