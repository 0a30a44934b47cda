use std::sync::Arc;

use super::common::*;
use crate::booking::domain::{
    Appointment, AppointmentId, AppointmentStatus, Request, RequestId, RequestStatus, SlotId,
    SlotStatus,
};
use crate::booking::error::{BookingError, ErrorKind, IntegrityError, InvalidState};
use crate::booking::policy::BookingPolicy;
use crate::booking::repository::Repository;
use crate::booking::store::MemoryStore;
use crate::booking::BookingOrchestrator;

fn assert_consistent<S, R, A>(orchestrator: &BookingOrchestrator<S, R, A>)
where
    S: crate::booking::SlotStore + 'static,
    R: crate::booking::RequestStore + 'static,
    A: crate::booking::AppointmentStore + 'static,
{
    let report = orchestrator.audit().expect("audit runs");
    assert!(report.is_consistent(), "violations: {:?}", report.violations);
}

#[test]
fn published_slot_is_listed_as_available() {
    let (orchestrator, _) = build_orchestrator(BookingPolicy::default());

    let slot = publish_slot(&orchestrator, 10);

    assert_eq!(slot.slot_id, SlotId::new("S1"));
    assert_eq!(slot.status, SlotStatus::Open);
    let available = orchestrator.list_available().expect("available");
    assert_eq!(available, vec![slot]);
    assert_consistent(&orchestrator);
}

#[test]
fn requesting_a_slot_puts_it_on_hold() {
    let (orchestrator, stores) = build_orchestrator(BookingPolicy::default());
    let slot = publish_slot(&orchestrator, 10);

    let request = file_request(&orchestrator, &slot);

    assert_eq!(request.request_id, RequestId::new("R1"));
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(request.date, slot.date);
    assert_eq!(request.end_time, slot.end_time);
    assert_eq!(stores.slot("S1").map(|s| s.status), Some(SlotStatus::OnHold));
    assert!(orchestrator.list_available().expect("available").is_empty());
    assert_consistent(&orchestrator);
}

#[test]
fn approval_schedules_an_appointment_and_consumes_slot_and_request() {
    let (orchestrator, stores) = build_orchestrator(BookingPolicy::default());
    let slot = publish_slot(&orchestrator, 10);
    let request = file_request(&orchestrator, &slot);

    let appointment = orchestrator
        .approve_request(&request.request_id)
        .expect("approval succeeds");

    assert_eq!(appointment.appointment_id, AppointmentId::new("A1"));
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    assert_eq!(appointment.request_id, request.request_id);
    assert_eq!(appointment.date, slot.date);
    assert_eq!(appointment.start_time, slot.start_time);
    assert!(stores.requests().is_empty());
    assert!(stores.slot("S1").is_none());
    assert_eq!(stores.appointments(), vec![appointment]);
    assert_consistent(&orchestrator);
}

#[test]
fn rejection_reopens_slot_and_archives_the_reason() {
    let (orchestrator, stores) = build_orchestrator(BookingPolicy::default());
    let first = publish_slot(&orchestrator, 10);
    let second = publish_slot(&orchestrator, 14);
    let approved = file_request(&orchestrator, &first);
    let rejected = orchestrator
        .create_request(&user(OTHER_STUDENT), &user(LECTURER), &second.slot_id, "Exam prep")
        .expect("second request");
    orchestrator
        .approve_request(&approved.request_id)
        .expect("approval");

    let appointment = orchestrator
        .reject_request(&rejected.request_id, "Lecturer unavailable")
        .expect("rejection succeeds");

    assert_eq!(rejected.request_id, RequestId::new("R2"));
    assert_eq!(appointment.appointment_id, AppointmentId::new("A2"));
    assert_eq!(appointment.status, AppointmentStatus::Cancelled);
    assert_eq!(appointment.cancel_reason, "Lecturer unavailable");
    assert_eq!(appointment.slot_id, second.slot_id);
    assert_eq!(stores.slot("S2").map(|s| s.status), Some(SlotStatus::Open));
    assert!(stores.requests().is_empty());
    assert_consistent(&orchestrator);
}

#[test]
fn completing_twice_fails_with_not_scheduled() {
    let (orchestrator, _) = build_orchestrator(BookingPolicy::default());
    let slot = publish_slot(&orchestrator, 10);
    let request = file_request(&orchestrator, &slot);
    let appointment = orchestrator
        .approve_request(&request.request_id)
        .expect("approval");

    let completed = orchestrator
        .complete_appointment(&appointment.appointment_id)
        .expect("first completion");
    assert_eq!(completed.status, AppointmentStatus::Completed);

    match orchestrator.complete_appointment(&appointment.appointment_id) {
        Err(BookingError::InvalidState(InvalidState::NotScheduled { status, .. })) => {
            assert_eq!(status, AppointmentStatus::Completed);
        }
        other => panic!("expected NotScheduled, got {other:?}"),
    }
    assert_consistent(&orchestrator);
}

#[test]
fn student_withdrawal_reopens_slot() {
    let (orchestrator, stores) = build_orchestrator(BookingPolicy::default());
    let slot = publish_slot(&orchestrator, 10);
    let request = file_request(&orchestrator, &slot);

    let appointment = orchestrator
        .cancel_request(&request.request_id, &user(STUDENT), "Found the answer myself")
        .expect("withdrawal succeeds");

    assert_eq!(appointment.status, AppointmentStatus::Cancelled);
    assert_eq!(appointment.cancel_reason, "Found the answer myself");
    assert_eq!(stores.slot("S1").map(|s| s.status), Some(SlotStatus::Open));
    assert!(stores.requests().is_empty());
    assert_consistent(&orchestrator);
}

#[test]
fn withdrawal_by_another_student_is_refused_without_side_effects() {
    let (orchestrator, stores) = build_orchestrator(BookingPolicy::default());
    let slot = publish_slot(&orchestrator, 10);
    let request = file_request(&orchestrator, &slot);

    let err = orchestrator
        .cancel_request(&request.request_id, &user(OTHER_STUDENT), "Not my request anyway")
        .expect_err("foreign withdrawal refused");

    assert_eq!(err.kind(), ErrorKind::NotOwner);
    assert_eq!(stores.requests(), vec![request]);
    assert_eq!(stores.slot("S1").map(|s| s.status), Some(SlotStatus::OnHold));
    assert!(stores.appointments().is_empty());
}

#[test]
fn short_student_reason_is_refused_but_staff_may_be_brief() {
    let (orchestrator, stores) = build_orchestrator(BookingPolicy::default());
    let slot = publish_slot(&orchestrator, 10);
    let request = file_request(&orchestrator, &slot);

    let err = orchestrator
        .cancel_request(&request.request_id, &user(STUDENT), "too short")
        .expect_err("short reason refused");
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(stores.requests().len(), 1);

    let appointment = orchestrator
        .reject_request(&request.request_id, "Ill")
        .expect("staff reason accepted");
    assert_eq!(appointment.cancel_reason, "Ill");
}

#[test]
fn approving_a_non_pending_request_leaves_stores_untouched() {
    let stores = Stores::default();
    let (orchestrator, stores) = orchestrator_over(stores, BookingPolicy::default());
    let slot = publish_slot(&orchestrator, 10);
    let mut request = file_request(&orchestrator, &slot);
    request.status = RequestStatus::Approved;
    stores.requests.save(request.clone()).expect("seed approved request");

    let slots_before = stores.slots();
    match orchestrator.approve_request(&request.request_id) {
        Err(BookingError::InvalidState(InvalidState::NotPending { status, .. })) => {
            assert_eq!(status, RequestStatus::Approved);
        }
        other => panic!("expected NotPending, got {other:?}"),
    }

    assert_eq!(stores.slots(), slots_before);
    assert_eq!(stores.requests(), vec![request]);
    assert!(stores.appointments().is_empty());
}

#[test]
fn held_slot_cannot_be_requested_again() {
    let (orchestrator, stores) = build_orchestrator(BookingPolicy::default());
    let slot = publish_slot(&orchestrator, 10);
    file_request(&orchestrator, &slot);

    match orchestrator.create_request(
        &user(OTHER_STUDENT),
        &user(LECTURER),
        &slot.slot_id,
        "Also need help",
    ) {
        Err(BookingError::InvalidState(InvalidState::SlotUnavailable { status, .. })) => {
            assert_eq!(status, Some(SlotStatus::OnHold));
        }
        other => panic!("expected SlotUnavailable, got {other:?}"),
    }
    assert_eq!(stores.requests().len(), 1);
}

#[test]
fn request_against_open_slot_with_stale_pending_request_is_an_integrity_error() {
    let (orchestrator, stores) = build_orchestrator(BookingPolicy::default());
    let slot = publish_slot(&orchestrator, 10);
    stores
        .requests
        .save(Request {
            request_id: RequestId::new("R9"),
            student_id: user(OTHER_STUDENT),
            lecturer_id: user(LECTURER),
            slot_id: slot.slot_id.clone(),
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            reason: "Stale".to_string(),
            status: RequestStatus::Pending,
            cancel_reason: String::new(),
        })
        .expect("seed stale request");

    let err = orchestrator
        .create_request(&user(STUDENT), &user(LECTURER), &slot.slot_id, "Need help")
        .expect_err("double booking refused");

    assert!(matches!(
        err,
        BookingError::Integrity(IntegrityError::SlotDoubleBooked { .. })
    ));
    assert_eq!(stores.slot("S1").map(|s| s.status), Some(SlotStatus::Open));
}

#[test]
fn staff_cancellation_of_appointment_reopens_a_retained_slot() {
    let (orchestrator, stores) = build_orchestrator(keep_booked());
    let slot = publish_slot(&orchestrator, 10);
    let request = file_request(&orchestrator, &slot);
    let appointment = orchestrator
        .approve_request(&request.request_id)
        .expect("approval");
    assert_eq!(stores.slot("S1").map(|s| s.status), Some(SlotStatus::Booked));
    assert_consistent(&orchestrator);

    let cancelled = orchestrator
        .cancel_appointment(&appointment.appointment_id)
        .expect("cancellation");

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(stores.slot("S1").map(|s| s.status), Some(SlotStatus::Open));
    assert_consistent(&orchestrator);
}

#[test]
fn completion_deletes_a_retained_slot() {
    let (orchestrator, stores) = build_orchestrator(keep_booked());
    let slot = publish_slot(&orchestrator, 10);
    let request = file_request(&orchestrator, &slot);
    let appointment = orchestrator
        .approve_request(&request.request_id)
        .expect("approval");

    orchestrator
        .complete_appointment(&appointment.appointment_id)
        .expect("completion");

    assert!(stores.slot("S1").is_none());
    assert_consistent(&orchestrator);
}

#[test]
fn missing_retained_slot_is_reported_as_integrity_error() {
    let (orchestrator, stores) = build_orchestrator(keep_booked());
    let slot = publish_slot(&orchestrator, 10);
    let request = file_request(&orchestrator, &slot);
    let appointment = orchestrator
        .approve_request(&request.request_id)
        .expect("approval");
    stores.slots.delete(&slot.slot_id).expect("simulate drift");

    let err = orchestrator
        .complete_appointment(&appointment.appointment_id)
        .expect_err("drift detected");

    assert_eq!(err.kind(), ErrorKind::IntegrityError);
    assert_eq!(
        stores.appointments()[0].status,
        AppointmentStatus::Scheduled
    );
}

#[test]
fn reschedule_follows_a_retained_slot_and_refuses_other_times() {
    let (orchestrator, stores) = build_orchestrator(keep_booked());
    let slot = publish_slot(&orchestrator, 10);
    let request = file_request(&orchestrator, &slot);
    let appointment = orchestrator
        .approve_request(&request.request_id)
        .expect("approval");

    let err = orchestrator
        .reschedule_appointment(&appointment.appointment_id, tomorrow(), at(15, 0))
        .expect_err("unbacked time refused");
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    let moved = orchestrator
        .reschedule_appointment(&appointment.appointment_id, slot.date, slot.start_time)
        .expect("matching time accepted");
    assert_eq!(moved.start_time, slot.start_time);
    assert_eq!(stores.appointments(), vec![moved]);
}

#[test]
fn reschedule_of_consumed_slot_is_refused() {
    let (orchestrator, _) = build_orchestrator(BookingPolicy::default());
    let slot = publish_slot(&orchestrator, 10);
    let request = file_request(&orchestrator, &slot);
    let appointment = orchestrator
        .approve_request(&request.request_id)
        .expect("approval");

    let err = orchestrator
        .reschedule_appointment(&appointment.appointment_id, slot.date, slot.start_time)
        .expect_err("no backing slot");
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
}

#[test]
fn failed_request_delete_rolls_back_approval() {
    let (orchestrator, stores) = build_flaky_orchestrator(BookingPolicy::default());
    let slot = publish_slot(&orchestrator, 10);
    let request = file_request(&orchestrator, &slot);
    let slots_before = stores.slots.records();
    stores.requests.fail_deletes(true);

    let err = orchestrator
        .approve_request(&request.request_id)
        .expect_err("approval fails");

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(stores.slots.records(), slots_before);
    assert_eq!(stores.requests.records(), vec![request.clone()]);
    assert!(stores.appointments.records().is_empty());

    stores.requests.fail_deletes(false);
    let appointment = orchestrator
        .approve_request(&request.request_id)
        .expect("retry succeeds");
    assert_ne!(appointment.appointment_id, AppointmentId::new("A1"));
    assert_consistent(&orchestrator);
}

#[test]
fn failed_request_delete_rolls_back_rejection() {
    let (orchestrator, stores) = build_flaky_orchestrator(BookingPolicy::default());
    let slot = publish_slot(&orchestrator, 10);
    let request = file_request(&orchestrator, &slot);
    let slots_before = stores.slots.records();
    stores.requests.fail_deletes(true);

    let err = orchestrator
        .reject_request(&request.request_id, "Lecturer unavailable")
        .expect_err("rejection fails");

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(stores.slots.records(), slots_before);
    assert_eq!(slots_before[0].status, SlotStatus::OnHold);
    assert_eq!(stores.requests.records(), vec![request.clone()]);
    assert!(stores.appointments.records().is_empty());
    assert_consistent(&orchestrator);
}

#[test]
fn failed_archive_save_rolls_back_withdrawal() {
    let (orchestrator, stores) = build_flaky_orchestrator(BookingPolicy::default());
    let slot = publish_slot(&orchestrator, 10);
    let request = file_request(&orchestrator, &slot);
    stores.appointments.fail_saves(true);

    let err = orchestrator
        .cancel_request(&request.request_id, &user(STUDENT), "Clashes with my exam")
        .expect_err("withdrawal fails");

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(
        stores.slots.records().first().map(|slot| slot.status),
        Some(SlotStatus::OnHold)
    );
    assert_eq!(stores.requests.records(), vec![request.clone()]);
    assert!(stores.appointments.records().is_empty());

    stores.appointments.fail_saves(false);
    let archived = orchestrator
        .cancel_request(&request.request_id, &user(STUDENT), "Clashes with my exam")
        .expect("retry succeeds");
    assert_eq!(archived.status, AppointmentStatus::Cancelled);
    assert_consistent(&orchestrator);
}

#[test]
fn failed_rollback_surfaces_as_integrity_error() {
    let (orchestrator, stores) = build_flaky_orchestrator(BookingPolicy::default());
    let slot = publish_slot(&orchestrator, 10);
    stores.slots.fail_saves(true);
    stores.requests.fail_deletes(true);

    let err = orchestrator
        .create_request(&user(STUDENT), &user(LECTURER), &slot.slot_id, "Need help")
        .expect_err("request fails");

    assert!(matches!(
        err,
        BookingError::Integrity(IntegrityError::RollbackFailed { .. })
    ));
    assert_eq!(stores.requests.records().len(), 1);

    stores.slots.fail_saves(false);
    let report = orchestrator.audit().expect("audit");
    assert!(!report.is_consistent());
}

#[test]
fn ids_continue_after_restart_even_when_records_were_deleted() {
    let (orchestrator, stores) = build_orchestrator(BookingPolicy::default());
    let slot = publish_slot(&orchestrator, 10);
    let request = file_request(&orchestrator, &slot);
    orchestrator
        .approve_request(&request.request_id)
        .expect("approval");
    assert!(stores.slots().is_empty());
    assert!(stores.requests().is_empty());
    drop(orchestrator);

    let (restarted, _) = orchestrator_over(stores, BookingPolicy::default());
    let slot = publish_slot(&restarted, 12);
    let request = file_request(&restarted, &slot);
    let appointment = restarted
        .approve_request(&request.request_id)
        .expect("approval");

    assert_eq!(slot.slot_id, SlotId::new("S2"));
    assert_eq!(request.request_id, RequestId::new("R2"));
    assert_eq!(appointment.appointment_id, AppointmentId::new("A2"));
}

#[test]
fn unreadable_store_fails_construction() {
    let result = BookingOrchestrator::new(
        Arc::new(UnavailableStore),
        Arc::new(UnavailableStore),
        Arc::new(MemoryStore::<Appointment>::default()),
        BookingPolicy::default(),
        clock(),
    );

    match result {
        Err(err) => assert_eq!(err.kind(), ErrorKind::Storage),
        Ok(_) => panic!("expected storage error"),
    }
}
