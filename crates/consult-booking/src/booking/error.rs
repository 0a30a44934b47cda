use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use super::domain::{
    AppointmentId, AppointmentStatus, RequestId, RequestStatus, SlotId, SlotStatus, UserId,
};
use super::permissions::{Capability, Role};
use super::repository::RepositoryError;

/// The entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Slot,
    Request,
    Appointment,
}

impl EntityKind {
    pub const fn label(self) -> &'static str {
        match self {
            EntityKind::Slot => "slot",
            EntityKind::Request => "request",
            EntityKind::Appointment => "appointment",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Caller-facing classification of every booking failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    NotOwner,
    InvalidState,
    ValidationFailed,
    IntegrityError,
    Storage,
}

/// Error returned by every lifecycle and orchestrator operation.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: String },
    #[error("{requester} does not own {entity} {id}")]
    NotOwner {
        entity: EntityKind,
        id: String,
        requester: UserId,
    },
    #[error("{role} {requester} may not {capability}")]
    Forbidden {
        requester: UserId,
        role: Role,
        capability: Capability,
    },
    #[error(transparent)]
    InvalidState(#[from] InvalidState),
    #[error(transparent)]
    ValidationFailed(#[from] ValidationError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::NotFound { .. } => ErrorKind::NotFound,
            BookingError::NotOwner { .. } | BookingError::Forbidden { .. } => ErrorKind::NotOwner,
            BookingError::InvalidState(_) => ErrorKind::InvalidState,
            BookingError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            BookingError::Integrity(_) => ErrorKind::IntegrityError,
            BookingError::Repository(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn slot_not_found(id: &SlotId) -> Self {
        BookingError::NotFound {
            entity: EntityKind::Slot,
            id: id.to_string(),
        }
    }

    pub(crate) fn request_not_found(id: &RequestId) -> Self {
        BookingError::NotFound {
            entity: EntityKind::Request,
            id: id.to_string(),
        }
    }

    pub(crate) fn appointment_not_found(id: &AppointmentId) -> Self {
        BookingError::NotFound {
            entity: EntityKind::Appointment,
            id: id.to_string(),
        }
    }
}

/// The entity exists but is not in the state the operation requires.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidState {
    #[error("request {request_id} is {status}, expected PENDING")]
    NotPending {
        request_id: RequestId,
        status: RequestStatus,
    },
    #[error("appointment {appointment_id} is {status}, expected SCHEDULED")]
    NotScheduled {
        appointment_id: AppointmentId,
        status: AppointmentStatus,
    },
    #[error("{entity} {id} cannot be cancelled while {status}")]
    NotCancelable {
        entity: EntityKind,
        id: String,
        status: &'static str,
    },
    #[error("slot {slot_id} cannot be edited while {status}")]
    NotEditable { slot_id: SlotId, status: SlotStatus },
    #[error("slot {slot_id} is not available for booking")]
    SlotUnavailable {
        slot_id: SlotId,
        status: Option<SlotStatus>,
    },
}

/// Malformed caller input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("slot date {date} is before today ({today})")]
    InvalidDate { date: NaiveDate, today: NaiveDate },
    #[error("end time {end} must be after start time {start}")]
    InvalidRange { start: NaiveTime, end: NaiveTime },
    #[error("{field} {time} must fall on a whole minute")]
    SubMinuteTime {
        field: &'static str,
        time: NaiveTime,
    },
    #[error("{field} must not be empty")]
    EmptyReason { field: &'static str },
    #[error("{field} must be at least {minimum} characters (got {actual})")]
    ReasonTooShort {
        field: &'static str,
        minimum: usize,
        actual: usize,
    },
    #[error("slot {slot_id} belongs to {owner}, not lecturer {lecturer_id}")]
    LecturerMismatch {
        slot_id: SlotId,
        owner: UserId,
        lecturer_id: UserId,
    },
    #[error("{date} {start} does not match the slot backing appointment {appointment_id}")]
    SlotMismatch {
        appointment_id: AppointmentId,
        date: NaiveDate,
        start: NaiveTime,
    },
}

/// The three stores have drifted out of sync. Reported, never repaired.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("slot {slot_id} referenced by {referenced_by} is missing")]
    SlotMissing { slot_id: SlotId, referenced_by: String },
    #[error("slot {slot_id} referenced by {referenced_by} is {status}")]
    SlotStatusDrift {
        slot_id: SlotId,
        referenced_by: String,
        status: SlotStatus,
    },
    #[error("slot {slot_id} is already referenced by pending request {request_id}")]
    SlotDoubleBooked {
        slot_id: SlotId,
        request_id: RequestId,
    },
    #[error("no {prefix} ids left after {prefix}{highest}")]
    IdSpaceExhausted { prefix: &'static str, highest: u64 },
    #[error("{operation} failed and could not be rolled back: {detail}")]
    RollbackFailed { operation: String, detail: String },
}
