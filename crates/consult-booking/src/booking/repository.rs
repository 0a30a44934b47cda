use std::fmt::Display;
use std::hash::Hash;

use super::domain::{Appointment, AppointmentId, Request, RequestId, Slot, SlotId};
use super::error::EntityKind;
use super::store::codec::CodecError;

/// Anything the booking stores persist, keyed by its own identifier.
pub trait Record: Clone + Send + Sync + 'static {
    type Id: Clone + Eq + Hash + Display + Send + Sync;

    const ENTITY: EntityKind;

    fn id(&self) -> &Self::Id;
}

impl Record for Slot {
    type Id = SlotId;
    const ENTITY: EntityKind = EntityKind::Slot;

    fn id(&self) -> &SlotId {
        &self.slot_id
    }
}

impl Record for Request {
    type Id = RequestId;
    const ENTITY: EntityKind = EntityKind::Request;

    fn id(&self) -> &RequestId {
        &self.request_id
    }
}

impl Record for Appointment {
    type Id = AppointmentId;
    const ENTITY: EntityKind = EntityKind::Appointment;

    fn id(&self) -> &AppointmentId {
        &self.appointment_id
    }
}

/// Storage abstraction so lifecycles and the orchestrator can run against any backend.
///
/// Every call is all-or-nothing for the single record it touches. Sequencing several calls
/// into one logical transition is the orchestrator's job.
pub trait Repository<T: Record>: Send + Sync {
    fn find_by_id(&self, id: &T::Id) -> Result<Option<T>, RepositoryError>;
    /// Inserts the record, or replaces the record with the same id in place.
    fn save(&self, record: T) -> Result<(), RepositoryError>;
    fn delete(&self, id: &T::Id) -> Result<bool, RepositoryError>;
    fn all(&self) -> Result<Vec<T>, RepositoryError>;
}

pub trait SlotStore: Repository<Slot> {}
impl<T: Repository<Slot> + ?Sized> SlotStore for T {}

pub trait RequestStore: Repository<Request> {}
impl<T: Repository<Request> + ?Sized> RequestStore for T {}

/// Append-oriented: the orchestrator only deletes appointments to undo its own writes.
pub trait AppointmentStore: Repository<Appointment> {}
impl<T: Repository<Appointment> + ?Sized> AppointmentStore for T {}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("storage io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
}
