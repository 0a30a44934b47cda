use crate::commands::{describe_appointment, describe_request, describe_slot};
use chrono::{Local, NaiveDate, NaiveTime};
use clap::Args;
use consult_booking::booking::{
    self, AppointmentId, BookingError, BookingPolicy, FixedClock, MemoryOrchestrator,
    SlotRetention, UserId,
};
use consult_booking::error::AppError;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Date treated as today (YYYY-MM-DD). Slots are published for the following day.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Keep approved slots as BOOKED until the appointment completes.
    #[arg(long)]
    pub(crate) keep_booked: bool,
}

/// Walks through publishing, requesting, approving, rejecting and completing against
/// in-memory stores. Nothing is written to disk.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let tomorrow = today.succ_opt().unwrap_or(today);
    let policy = BookingPolicy {
        slot_retention: if args.keep_booked {
            SlotRetention::KeepBookedUntilCompletion
        } else {
            SlotRetention::ConsumeOnApproval
        },
        ..BookingPolicy::default()
    };

    let orchestrator = booking::in_memory(policy, Arc::new(FixedClock(today)))?;
    println!("Consultation booking demo ({} slots)", policy.slot_retention);

    let lecturer = UserId::new("L1");
    let student = UserId::new("T1");
    let classmate = UserId::new("T2");

    println!("\nA. Lecturer {lecturer} publishes availability for {tomorrow}");
    let s1 = orchestrator.create_slot(&lecturer, tomorrow, clock(10), clock(11))?;
    let s2 = orchestrator.create_slot(&lecturer, tomorrow, clock(14), clock(15))?;
    println!("- {}", describe_slot(&s1));
    println!("- {}", describe_slot(&s2));
    println!("  Available: {}", orchestrator.list_available()?.len());

    println!("\nB. Students request the slots");
    let r1 =
        orchestrator.create_request(&student, &lecturer, &s1.slot_id, "Need help with thesis")?;
    let r2 =
        orchestrator.create_request(&classmate, &lecturer, &s2.slot_id, "Exam preparation")?;
    println!("- {}", describe_request(&r1));
    println!("- {}", describe_request(&r2));
    print_slot_state(&orchestrator, "  Slots now");

    println!("\nC. Staff approve {}", r1.request_id);
    let a1 = orchestrator.approve_request(&r1.request_id)?;
    println!("- {}", describe_appointment(&a1));
    print_slot_state(&orchestrator, "  Slots now");

    println!("\nD. Staff reject {}", r2.request_id);
    let a2 = orchestrator.reject_request(&r2.request_id, "Lecturer unavailable")?;
    println!("- {}", describe_appointment(&a2));
    print_slot_state(&orchestrator, "  Slots now");

    println!("\nE. Staff complete {} twice", a1.appointment_id);
    let completed = orchestrator.complete_appointment(&a1.appointment_id)?;
    println!("- {}", describe_appointment(&completed));
    report_second_completion(&orchestrator, &a1.appointment_id);

    let report = orchestrator.audit()?;
    println!(
        "\nAudit: {} violations across {} slots, {} requests, {} appointments",
        report.violations.len(),
        report.slots_checked,
        report.requests_checked,
        report.appointments_checked
    );
    Ok(())
}

fn clock(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn print_slot_state(booking: &MemoryOrchestrator, heading: &str) {
    match booking.slots().all() {
        Ok(slots) if slots.is_empty() => println!("{heading}: none stored"),
        Ok(slots) => {
            let states: Vec<String> = slots
                .iter()
                .map(|slot| format!("{}={}", slot.slot_id, slot.status))
                .collect();
            println!("{heading}: {}", states.join(", "));
        }
        Err(err) => println!("{heading}: unavailable ({err})"),
    }
}

fn report_second_completion(booking: &MemoryOrchestrator, appointment_id: &AppointmentId) {
    match booking.complete_appointment(appointment_id) {
        Ok(appointment) => println!(
            "- unexpectedly completed again: {}",
            describe_appointment(&appointment)
        ),
        Err(err @ BookingError::InvalidState(_)) => {
            println!("- second attempt refused ({:?}): {err}", err.kind())
        }
        Err(err) => println!("- second attempt failed: {err}"),
    }
}
