//! Journaled sequence of single-record store writes.
//!
//! The stores are not transactional, so every write made through a [`UnitOfWork`] records
//! how to revert it. If a later step fails the journal is replayed newest-first, restoring
//! the previous version of each touched record. A revert that itself fails leaves the stores
//! drifted and is reported as [`IntegrityError::RollbackFailed`].

use tracing::{error, warn};

use super::domain::{Appointment, Request, RequestId, Slot, SlotId};
use super::error::{BookingError, IntegrityError};
use super::repository::{
    AppointmentStore, Record, Repository, RepositoryError, RequestStore, SlotStore,
};

enum Revert<T: Record> {
    Restore(T),
    Remove(T::Id),
}

impl<T: Record> Revert<T> {
    fn apply<St>(self, store: &St) -> Result<(), RepositoryError>
    where
        St: Repository<T> + ?Sized,
    {
        match self {
            Revert::Restore(record) => store.save(record),
            Revert::Remove(id) => store.delete(&id).map(|_| ()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Revert::Restore(record) => format!("restore {} {}", T::ENTITY, record.id()),
            Revert::Remove(id) => format!("remove {} {}", T::ENTITY, id),
        }
    }
}

enum JournalEntry {
    Slot(Revert<Slot>),
    Request(Revert<Request>),
    Appointment(Revert<Appointment>),
}

fn tracked_save<T, St>(store: &St, record: T) -> Result<Revert<T>, RepositoryError>
where
    T: Record,
    St: Repository<T> + ?Sized,
{
    let revert = match store.find_by_id(record.id())? {
        Some(previous) => Revert::Restore(previous),
        None => Revert::Remove(record.id().clone()),
    };
    store.save(record)?;
    Ok(revert)
}

fn tracked_delete<T, St>(store: &St, id: &T::Id) -> Result<Option<Revert<T>>, RepositoryError>
where
    T: Record,
    St: Repository<T> + ?Sized,
{
    let Some(previous) = store.find_by_id(id)? else {
        return Ok(None);
    };
    if store.delete(id)? {
        Ok(Some(Revert::Restore(previous)))
    } else {
        Ok(None)
    }
}

pub(crate) struct UnitOfWork<'a, S: ?Sized, R: ?Sized, A: ?Sized> {
    operation: &'static str,
    slots: &'a S,
    requests: &'a R,
    appointments: &'a A,
    journal: Vec<JournalEntry>,
}

impl<'a, S, R, A> UnitOfWork<'a, S, R, A>
where
    S: SlotStore + ?Sized,
    R: RequestStore + ?Sized,
    A: AppointmentStore + ?Sized,
{
    pub(crate) fn begin(
        operation: &'static str,
        slots: &'a S,
        requests: &'a R,
        appointments: &'a A,
    ) -> Self {
        Self {
            operation,
            slots,
            requests,
            appointments,
            journal: Vec::new(),
        }
    }

    pub(crate) fn save_slot(&mut self, slot: Slot) -> Result<(), BookingError> {
        let revert = tracked_save::<Slot, _>(self.slots, slot)?;
        self.journal.push(JournalEntry::Slot(revert));
        Ok(())
    }

    pub(crate) fn delete_slot(&mut self, slot_id: &SlotId) -> Result<bool, BookingError> {
        let revert = tracked_delete::<Slot, _>(self.slots, slot_id)?;
        Ok(self.record(revert.map(JournalEntry::Slot)))
    }

    pub(crate) fn save_request(&mut self, request: Request) -> Result<(), BookingError> {
        let revert = tracked_save::<Request, _>(self.requests, request)?;
        self.journal.push(JournalEntry::Request(revert));
        Ok(())
    }

    pub(crate) fn delete_request(&mut self, request_id: &RequestId) -> Result<bool, BookingError> {
        let revert = tracked_delete::<Request, _>(self.requests, request_id)?;
        Ok(self.record(revert.map(JournalEntry::Request)))
    }

    pub(crate) fn save_appointment(&mut self, appointment: Appointment) -> Result<(), BookingError> {
        let revert = tracked_save::<Appointment, _>(self.appointments, appointment)?;
        self.journal.push(JournalEntry::Appointment(revert));
        Ok(())
    }

    fn record(&mut self, entry: Option<JournalEntry>) -> bool {
        match entry {
            Some(entry) => {
                self.journal.push(entry);
                true
            }
            None => false,
        }
    }

    pub(crate) fn commit(self) {
        // Every write is already durable; dropping the journal makes them final.
        drop(self.journal);
    }

    /// Reverts every journaled write, newest first.
    pub(crate) fn rollback(self) -> Result<(), IntegrityError> {
        let mut failures = Vec::new();

        for entry in self.journal.into_iter().rev() {
            let (description, outcome) = match entry {
                JournalEntry::Slot(revert) => (revert.describe(), revert.apply(self.slots)),
                JournalEntry::Request(revert) => (revert.describe(), revert.apply(self.requests)),
                JournalEntry::Appointment(revert) => {
                    (revert.describe(), revert.apply(self.appointments))
                }
            };

            match outcome {
                Ok(()) => warn!(operation = self.operation, step = %description, "rolled back"),
                Err(err) => {
                    error!(operation = self.operation, step = %description, error = %err, "rollback step failed");
                    failures.push(format!("{description}: {err}"));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(IntegrityError::RollbackFailed {
                operation: self.operation.to_string(),
                detail: failures.join("; "),
            })
        }
    }
}
