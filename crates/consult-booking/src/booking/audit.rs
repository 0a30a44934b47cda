//! Cross-store consistency checks.
//!
//! Drift between the three stores is reported, never repaired: fixing it needs a human to
//! decide which store is right.

use std::collections::HashMap;

use serde::Serialize;

use super::domain::{
    Appointment, AppointmentId, Request, RequestId, RequestStatus, Slot, SlotId, SlotStatus,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    #[error("unreserved slot {slot_id} is still referenced by {referenced_by:?}")]
    UnreservedSlotReferenced {
        slot_id: SlotId,
        referenced_by: Vec<String>,
    },
    #[error("{status} slot {slot_id} has {references} live references, expected exactly one")]
    ReservedSlotReferences {
        slot_id: SlotId,
        status: SlotStatus,
        references: usize,
    },
    #[error("pending request {request_id} points at slot {slot_id} which is {}", .slot_status.map(SlotStatus::label).unwrap_or("missing"))]
    PendingRequestOnUnavailableSlot {
        request_id: RequestId,
        slot_id: SlotId,
        slot_status: Option<SlotStatus>,
    },
    #[error("request {request_id} is {status} but still stored as active")]
    TerminalRequestStillActive {
        request_id: RequestId,
        status: RequestStatus,
    },
    #[error("request {request_id} is active but already resolved by appointment {appointment_id}")]
    ActiveRequestAlreadyResolved {
        request_id: RequestId,
        appointment_id: AppointmentId,
    },
    #[error("request {request_id} is resolved by {} appointments", .appointments.len())]
    DuplicateResolution {
        request_id: RequestId,
        appointments: Vec<AppointmentId>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub slots_checked: usize,
    pub requests_checked: usize,
    pub appointments_checked: usize,
    pub violations: Vec<Violation>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

pub fn check(
    slots: &[Slot],
    requests: &[Request],
    appointments: &[Appointment],
) -> ConsistencyReport {
    let mut violations = Vec::new();

    let mut live_references: HashMap<&SlotId, Vec<String>> = HashMap::new();
    for request in requests
        .iter()
        .filter(|request| request.status == RequestStatus::Pending)
    {
        live_references
            .entry(&request.slot_id)
            .or_default()
            .push(request.request_id.to_string());
    }
    for appointment in appointments.iter().filter(|appointment| appointment.is_live()) {
        live_references
            .entry(&appointment.slot_id)
            .or_default()
            .push(appointment.appointment_id.to_string());
    }

    for slot in slots {
        let references = live_references
            .get(&slot.slot_id)
            .cloned()
            .unwrap_or_default();
        match slot.status {
            SlotStatus::Open | SlotStatus::Cancelled if !references.is_empty() => {
                violations.push(Violation::UnreservedSlotReferenced {
                    slot_id: slot.slot_id.clone(),
                    referenced_by: references,
                });
            }
            status if status.is_reserved() && references.len() != 1 => {
                violations.push(Violation::ReservedSlotReferences {
                    slot_id: slot.slot_id.clone(),
                    status,
                    references: references.len(),
                });
            }
            _ => {}
        }
    }

    let slot_status: HashMap<&SlotId, SlotStatus> = slots
        .iter()
        .map(|slot| (&slot.slot_id, slot.status))
        .collect();

    let mut resolutions: HashMap<&RequestId, Vec<AppointmentId>> = HashMap::new();
    for appointment in appointments {
        resolutions
            .entry(&appointment.request_id)
            .or_default()
            .push(appointment.appointment_id.clone());
    }

    for request in requests {
        if request.status != RequestStatus::Pending {
            violations.push(Violation::TerminalRequestStillActive {
                request_id: request.request_id.clone(),
                status: request.status,
            });
            continue;
        }

        let status = slot_status.get(&request.slot_id).copied();
        if !matches!(status, Some(SlotStatus::OnHold | SlotStatus::Open)) {
            violations.push(Violation::PendingRequestOnUnavailableSlot {
                request_id: request.request_id.clone(),
                slot_id: request.slot_id.clone(),
                slot_status: status,
            });
        }

        if let Some(appointment_id) = resolutions
            .get(&request.request_id)
            .and_then(|ids| ids.first())
        {
            violations.push(Violation::ActiveRequestAlreadyResolved {
                request_id: request.request_id.clone(),
                appointment_id: appointment_id.clone(),
            });
        }
    }

    let mut duplicates: Vec<_> = resolutions
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .collect();
    duplicates.sort_by(|left, right| left.0.cmp(right.0));
    for (request_id, appointments) in duplicates {
        violations.push(Violation::DuplicateResolution {
            request_id: request_id.clone(),
            appointments,
        });
    }

    ConsistencyReport {
        slots_checked: slots.len(),
        requests_checked: requests.len(),
        appointments_checked: appointments.len(),
        violations,
    }
}
