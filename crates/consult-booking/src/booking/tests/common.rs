use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{NaiveDate, NaiveTime};
use serde_json::Value;

use crate::booking::clock::{Clock, FixedClock};
use crate::booking::domain::{Appointment, Request, Slot, SlotId, UserId};
use crate::booking::orchestrator::BookingOrchestrator;
use crate::booking::policy::{BookingPolicy, SlotRetention};
use crate::booking::repository::{Record, Repository, RepositoryError};
use crate::booking::store::MemoryStore;
use crate::booking::MemoryOrchestrator;

pub(super) const LECTURER: &str = "L1";
pub(super) const OTHER_LECTURER: &str = "L2";
pub(super) const STUDENT: &str = "T1";
pub(super) const OTHER_STUDENT: &str = "T2";

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date")
}

pub(super) fn tomorrow() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 17).expect("valid date")
}

pub(super) fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
}

pub(super) fn user(id: &str) -> UserId {
    UserId::new(id)
}

pub(super) fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(today()))
}

pub(super) fn keep_booked() -> BookingPolicy {
    BookingPolicy {
        slot_retention: SlotRetention::KeepBookedUntilCompletion,
        ..BookingPolicy::default()
    }
}

/// Handles on the stores behind an orchestrator, for asserting on persisted state.
#[derive(Default, Clone)]
pub(super) struct Stores {
    pub(super) slots: MemoryStore<Slot>,
    pub(super) requests: MemoryStore<Request>,
    pub(super) appointments: MemoryStore<Appointment>,
}

impl Stores {
    pub(super) fn slot(&self, id: &str) -> Option<Slot> {
        self.slots.find_by_id(&SlotId::new(id)).expect("slot lookup")
    }

    pub(super) fn slots(&self) -> Vec<Slot> {
        self.slots.all().expect("slots")
    }

    pub(super) fn requests(&self) -> Vec<Request> {
        self.requests.all().expect("requests")
    }

    pub(super) fn appointments(&self) -> Vec<Appointment> {
        self.appointments.all().expect("appointments")
    }
}

pub(super) fn build_orchestrator(policy: BookingPolicy) -> (MemoryOrchestrator, Stores) {
    orchestrator_over(Stores::default(), policy)
}

pub(super) fn orchestrator_over(
    stores: Stores,
    policy: BookingPolicy,
) -> (MemoryOrchestrator, Stores) {
    let orchestrator = BookingOrchestrator::new(
        Arc::new(stores.slots.clone()),
        Arc::new(stores.requests.clone()),
        Arc::new(stores.appointments.clone()),
        policy,
        clock(),
    )
    .expect("orchestrator builds");
    (orchestrator, stores)
}

pub(super) fn publish_slot<S, R, A>(
    orchestrator: &BookingOrchestrator<S, R, A>,
    start_hour: u32,
) -> Slot
where
    S: crate::booking::SlotStore + 'static,
    R: crate::booking::RequestStore + 'static,
    A: crate::booking::AppointmentStore + 'static,
{
    orchestrator
        .create_slot(
            &user(LECTURER),
            tomorrow(),
            at(start_hour, 0),
            at(start_hour + 1, 0),
        )
        .expect("slot published")
}

pub(super) fn file_request<S, R, A>(
    orchestrator: &BookingOrchestrator<S, R, A>,
    slot: &Slot,
) -> Request
where
    S: crate::booking::SlotStore + 'static,
    R: crate::booking::RequestStore + 'static,
    A: crate::booking::AppointmentStore + 'static,
{
    orchestrator
        .create_request(
            &user(STUDENT),
            &slot.lecturer_id,
            &slot.slot_id,
            "Need help with thesis",
        )
        .expect("request filed")
}

/// Memory-backed store whose writes can be switched to fail.
pub(super) struct FlakyStore<T> {
    inner: MemoryStore<T>,
    fail_saves: AtomicBool,
    fail_deletes: AtomicBool,
}

impl<T> Default for FlakyStore<T> {
    fn default() -> Self {
        Self {
            inner: MemoryStore::default(),
            fail_saves: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }
}

impl<T: Record> FlakyStore<T> {
    pub(super) fn fail_saves(&self, enabled: bool) {
        self.fail_saves.store(enabled, Ordering::SeqCst);
    }

    pub(super) fn fail_deletes(&self, enabled: bool) {
        self.fail_deletes.store(enabled, Ordering::SeqCst);
    }

    pub(super) fn records(&self) -> Vec<T> {
        self.inner.all().expect("records")
    }
}

impl<T: Record> Repository<T> for FlakyStore<T> {
    fn find_by_id(&self, id: &T::Id) -> Result<Option<T>, RepositoryError> {
        self.inner.find_by_id(id)
    }

    fn save(&self, record: T) -> Result<(), RepositoryError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("disk full".to_string()));
        }
        self.inner.save(record)
    }

    fn delete(&self, id: &T::Id) -> Result<bool, RepositoryError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("disk full".to_string()));
        }
        self.inner.delete(id)
    }

    fn all(&self) -> Result<Vec<T>, RepositoryError> {
        self.inner.all()
    }
}

pub(super) type FlakyOrchestrator =
    BookingOrchestrator<FlakyStore<Slot>, FlakyStore<Request>, FlakyStore<Appointment>>;

pub(super) struct FlakyStores {
    pub(super) slots: Arc<FlakyStore<Slot>>,
    pub(super) requests: Arc<FlakyStore<Request>>,
    pub(super) appointments: Arc<FlakyStore<Appointment>>,
}

pub(super) fn build_flaky_orchestrator(policy: BookingPolicy) -> (FlakyOrchestrator, FlakyStores) {
    let stores = FlakyStores {
        slots: Arc::new(FlakyStore::default()),
        requests: Arc::new(FlakyStore::default()),
        appointments: Arc::new(FlakyStore::default()),
    };
    let orchestrator = BookingOrchestrator::new(
        Arc::clone(&stores.slots),
        Arc::clone(&stores.requests),
        Arc::clone(&stores.appointments),
        policy,
        clock(),
    )
    .expect("orchestrator builds");
    (orchestrator, stores)
}

/// Store that refuses every call.
pub(super) struct UnavailableStore;

impl<T: Record> Repository<T> for UnavailableStore {
    fn find_by_id(&self, _id: &T::Id) -> Result<Option<T>, RepositoryError> {
        Err(RepositoryError::Unavailable("store offline".to_string()))
    }

    fn save(&self, _record: T) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("store offline".to_string()))
    }

    fn delete(&self, _id: &T::Id) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("store offline".to_string()))
    }

    fn all(&self) -> Result<Vec<T>, RepositoryError> {
        Err(RepositoryError::Unavailable("store offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
