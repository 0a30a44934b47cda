//! Consultation booking: slots published by lecturers, requests filed by students, and the
//! appointments that record how staff resolved each request.

use std::path::Path;
use std::sync::Arc;

pub mod appointments;
pub mod audit;
pub mod clock;
pub mod domain;
pub mod error;
pub mod ids;
pub mod orchestrator;
pub mod permissions;
pub mod policy;
pub mod repository;
pub mod requests;
pub mod router;
pub mod slots;
pub mod store;
mod unit_of_work;

#[cfg(test)]
mod tests;

pub use appointments::AppointmentLifecycle;
pub use audit::{ConsistencyReport, Violation};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    Appointment, AppointmentId, AppointmentStatus, Request, RequestId, RequestStatus, Slot,
    SlotId, SlotStatus, UserId,
};
pub use error::{
    BookingError, EntityKind, ErrorKind, IntegrityError, InvalidState, ValidationError,
};
pub use orchestrator::BookingOrchestrator;
pub use permissions::{Actor, Capability, Role};
pub use policy::{BookingPolicy, SlotRetention};
pub use repository::{
    AppointmentStore, Record, Repository, RepositoryError, RequestStore, SlotStore,
};
pub use requests::RequestLifecycle;
pub use router::booking_router;
pub use slots::SlotLifecycle;
pub use store::{FlatFileStore, MemoryStore};

/// Orchestrator wired to in-memory stores.
pub type MemoryOrchestrator =
    BookingOrchestrator<MemoryStore<Slot>, MemoryStore<Request>, MemoryStore<Appointment>>;

/// Orchestrator wired to the flat files in a data directory.
pub type FileOrchestrator =
    BookingOrchestrator<FlatFileStore<Slot>, FlatFileStore<Request>, FlatFileStore<Appointment>>;

pub const SLOTS_FILE: &str = "slots.txt";
pub const REQUESTS_FILE: &str = "requests.txt";
pub const APPOINTMENTS_FILE: &str = "appointments.txt";

/// Opens the three flat files under `data_dir`; missing files start out empty.
pub fn open_flat_files(
    data_dir: &Path,
    policy: BookingPolicy,
    clock: Arc<dyn Clock>,
) -> Result<FileOrchestrator, BookingError> {
    BookingOrchestrator::new(
        Arc::new(FlatFileStore::new(data_dir.join(SLOTS_FILE))),
        Arc::new(FlatFileStore::new(data_dir.join(REQUESTS_FILE))),
        Arc::new(FlatFileStore::new(data_dir.join(APPOINTMENTS_FILE))),
        policy,
        clock,
    )
}

pub fn in_memory(
    policy: BookingPolicy,
    clock: Arc<dyn Clock>,
) -> Result<MemoryOrchestrator, BookingError> {
    BookingOrchestrator::new(
        Arc::new(MemoryStore::default()),
        Arc::new(MemoryStore::default()),
        Arc::new(MemoryStore::default()),
        policy,
        clock,
    )
}
