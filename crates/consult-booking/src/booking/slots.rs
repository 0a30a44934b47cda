use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Timelike};

use super::clock::Clock;
use super::domain::{Slot, SlotId, SlotStatus, UserId};
use super::error::{BookingError, EntityKind, InvalidState, ValidationError};
use super::ids::IdSequence;
use super::repository::SlotStore;

/// Slot-local rules: validation of published windows, ownership and status transitions.
///
/// Transition methods return the next version of the slot without persisting it; the
/// orchestrator writes it inside its unit of work.
pub struct SlotLifecycle<S> {
    store: Arc<S>,
    ids: IdSequence,
    clock: Arc<dyn Clock>,
}

impl<S: SlotStore> SlotLifecycle<S> {
    pub fn new(store: Arc<S>, ids: IdSequence, clock: Arc<dyn Clock>) -> Self {
        Self { store, ids, clock }
    }

    pub fn find(&self, slot_id: &SlotId) -> Result<Option<Slot>, BookingError> {
        Ok(self.store.find_by_id(slot_id)?)
    }

    pub fn get(&self, slot_id: &SlotId) -> Result<Slot, BookingError> {
        self.find(slot_id)?
            .ok_or_else(|| BookingError::slot_not_found(slot_id))
    }

    pub fn all(&self) -> Result<Vec<Slot>, BookingError> {
        Ok(self.store.all()?)
    }

    /// Slots students can currently request.
    pub fn list_available(&self) -> Result<Vec<Slot>, BookingError> {
        let mut slots = self.all()?;
        slots.retain(|slot| slot.status == SlotStatus::Open);
        Ok(slots)
    }

    pub fn list_for_lecturer(&self, lecturer_id: &UserId) -> Result<Vec<Slot>, BookingError> {
        let mut slots = self.all()?;
        slots.retain(|slot| &slot.lecturer_id == lecturer_id);
        Ok(slots)
    }

    pub(crate) fn draft(
        &self,
        lecturer_id: &UserId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Slot, BookingError> {
        validate_window(date, start, end, self.clock.today())?;

        Ok(Slot {
            slot_id: SlotId(self.ids.next_id()?),
            lecturer_id: lecturer_id.clone(),
            date,
            start_time: start,
            end_time: end,
            status: SlotStatus::Open,
        })
    }

    pub(crate) fn cancellation(
        &self,
        slot_id: &SlotId,
        requester: &UserId,
    ) -> Result<Slot, BookingError> {
        let mut slot = self.owned(slot_id, requester)?;
        if slot.status != SlotStatus::Open {
            return Err(InvalidState::NotCancelable {
                entity: EntityKind::Slot,
                id: slot_id.to_string(),
                status: slot.status.label(),
            }
            .into());
        }

        slot.status = SlotStatus::Cancelled;
        Ok(slot)
    }

    pub(crate) fn revision(
        &self,
        slot_id: &SlotId,
        requester: &UserId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Slot, BookingError> {
        let mut slot = self.owned(slot_id, requester)?;
        if slot.status != SlotStatus::Open {
            return Err(InvalidState::NotEditable {
                slot_id: slot_id.clone(),
                status: slot.status,
            }
            .into());
        }
        validate_window(date, start, end, self.clock.today())?;

        slot.date = date;
        slot.start_time = start;
        slot.end_time = end;
        Ok(slot)
    }

    /// Orchestrator-only transition; checks existence and nothing else.
    pub(crate) fn with_status(
        &self,
        slot_id: &SlotId,
        status: SlotStatus,
    ) -> Result<Slot, BookingError> {
        let mut slot = self.get(slot_id)?;
        slot.status = status;
        Ok(slot)
    }

    fn owned(&self, slot_id: &SlotId, requester: &UserId) -> Result<Slot, BookingError> {
        let slot = self.get(slot_id)?;
        if &slot.lecturer_id != requester {
            return Err(BookingError::NotOwner {
                entity: EntityKind::Slot,
                id: slot_id.to_string(),
                requester: requester.clone(),
            });
        }
        Ok(slot)
    }
}

pub(crate) fn validate_window(
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    if date < today {
        return Err(ValidationError::InvalidDate { date, today });
    }
    for (field, time) in [("start time", start), ("end time", end)] {
        if time.second() != 0 || time.nanosecond() != 0 {
            return Err(ValidationError::SubMinuteTime { field, time });
        }
    }
    if end <= start {
        return Err(ValidationError::InvalidRange { start, end });
    }
    Ok(())
}
