use crate::infra::{open_booking, parse_date, parse_time, StorageArgs};
use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Subcommand};
use consult_booking::booking::{
    domain::format_time, Appointment, AppointmentId, Request, RequestId, Slot, SlotId, UserId,
};
use consult_booking::error::AppError;
use serde::Serialize;

#[derive(Subcommand, Debug)]
pub(crate) enum SlotCommand {
    /// Publish a new consultation slot
    Create {
        #[arg(long)]
        lecturer: String,
        /// Slot date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,
        /// Start time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        start: NaiveTime,
        /// End time (HH:MM)
        #[arg(long, value_parser = parse_time)]
        end: NaiveTime,
        #[command(flatten)]
        storage: StorageArgs,
    },
    /// Move an open slot to a new date or time
    Update {
        slot_id: String,
        #[arg(long)]
        lecturer: String,
        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,
        #[arg(long, value_parser = parse_time)]
        start: NaiveTime,
        #[arg(long, value_parser = parse_time)]
        end: NaiveTime,
        #[command(flatten)]
        storage: StorageArgs,
    },
    /// Withdraw an open slot
    Cancel {
        slot_id: String,
        #[arg(long)]
        lecturer: String,
        #[command(flatten)]
        storage: StorageArgs,
    },
    /// List open slots, or every slot of one lecturer
    List {
        #[arg(long)]
        lecturer: Option<String>,
        #[command(flatten)]
        storage: StorageArgs,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum RequestCommand {
    /// Ask for an open slot
    Create {
        #[arg(long)]
        student: String,
        #[arg(long)]
        lecturer: String,
        #[arg(long)]
        slot: String,
        #[arg(long)]
        reason: String,
        #[command(flatten)]
        storage: StorageArgs,
    },
    /// Withdraw one of your own pending requests
    Cancel {
        request_id: String,
        #[arg(long)]
        student: String,
        #[arg(long)]
        reason: String,
        #[command(flatten)]
        storage: StorageArgs,
    },
    /// Approve a pending request (staff)
    Approve {
        request_id: String,
        #[command(flatten)]
        storage: StorageArgs,
    },
    /// Reject a pending request (staff)
    Reject {
        request_id: String,
        #[arg(long)]
        reason: String,
        #[command(flatten)]
        storage: StorageArgs,
    },
    /// List pending requests, or every request of one student
    List {
        #[arg(long)]
        student: Option<String>,
        #[command(flatten)]
        storage: StorageArgs,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum AppointmentCommand {
    /// Mark a scheduled appointment as held
    Complete {
        appointment_id: String,
        #[command(flatten)]
        storage: StorageArgs,
    },
    /// Cancel a scheduled appointment
    Cancel {
        appointment_id: String,
        #[command(flatten)]
        storage: StorageArgs,
    },
    /// Move a scheduled appointment onto the time of its backing slot
    Reschedule {
        appointment_id: String,
        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,
        #[arg(long, value_parser = parse_time)]
        start: NaiveTime,
        #[command(flatten)]
        storage: StorageArgs,
    },
    /// List appointments, optionally for one student or lecturer
    List {
        #[arg(long, conflicts_with = "lecturer")]
        student: Option<String>,
        #[arg(long)]
        lecturer: Option<String>,
        #[command(flatten)]
        storage: StorageArgs,
    },
}

#[derive(Args, Debug, Default)]
pub(crate) struct AuditArgs {
    /// Print the full report as JSON
    #[arg(long)]
    pub(crate) json: bool,
    #[command(flatten)]
    pub(crate) storage: StorageArgs,
}

pub(crate) fn run_slot(command: SlotCommand) -> Result<(), AppError> {
    match command {
        SlotCommand::Create {
            lecturer,
            date,
            start,
            end,
            storage,
        } => {
            let (_, booking) = open_booking(storage)?;
            let slot = booking.create_slot(&UserId(lecturer), date, start, end)?;
            println!("Published {}", describe_slot(&slot));
        }
        SlotCommand::Update {
            slot_id,
            lecturer,
            date,
            start,
            end,
            storage,
        } => {
            let (_, booking) = open_booking(storage)?;
            let slot =
                booking.update_slot(&SlotId(slot_id), &UserId(lecturer), date, start, end)?;
            println!("Updated {}", describe_slot(&slot));
        }
        SlotCommand::Cancel {
            slot_id,
            lecturer,
            storage,
        } => {
            let (_, booking) = open_booking(storage)?;
            let slot = booking.cancel_slot(&SlotId(slot_id), &UserId(lecturer))?;
            println!("Cancelled {}", describe_slot(&slot));
        }
        SlotCommand::List { lecturer, storage } => {
            let (_, booking) = open_booking(storage)?;
            let slots = match lecturer {
                Some(lecturer) => booking.slots().list_for_lecturer(&UserId(lecturer))?,
                None => booking.list_available()?,
            };
            print_listing("slots", &slots, describe_slot);
        }
    }
    Ok(())
}

pub(crate) fn run_request(command: RequestCommand) -> Result<(), AppError> {
    match command {
        RequestCommand::Create {
            student,
            lecturer,
            slot,
            reason,
            storage,
        } => {
            let (_, booking) = open_booking(storage)?;
            let request = booking.create_request(
                &UserId(student),
                &UserId(lecturer),
                &SlotId(slot),
                &reason,
            )?;
            println!("Filed {}", describe_request(&request));
        }
        RequestCommand::Cancel {
            request_id,
            student,
            reason,
            storage,
        } => {
            let (_, booking) = open_booking(storage)?;
            let appointment =
                booking.cancel_request(&RequestId(request_id), &UserId(student), &reason)?;
            println!("Withdrawn, archived as {}", describe_appointment(&appointment));
        }
        RequestCommand::Approve {
            request_id,
            storage,
        } => {
            let (_, booking) = open_booking(storage)?;
            let appointment = booking.approve_request(&RequestId(request_id))?;
            println!("Approved, scheduled {}", describe_appointment(&appointment));
        }
        RequestCommand::Reject {
            request_id,
            reason,
            storage,
        } => {
            let (_, booking) = open_booking(storage)?;
            let appointment = booking.reject_request(&RequestId(request_id), &reason)?;
            println!("Rejected, archived as {}", describe_appointment(&appointment));
        }
        RequestCommand::List { student, storage } => {
            let (_, booking) = open_booking(storage)?;
            let requests = match student {
                Some(student) => booking.requests().list_for_student(&UserId(student))?,
                None => booking.requests().list_pending()?,
            };
            print_listing("requests", &requests, describe_request);
        }
    }
    Ok(())
}

pub(crate) fn run_appointment(command: AppointmentCommand) -> Result<(), AppError> {
    match command {
        AppointmentCommand::Complete {
            appointment_id,
            storage,
        } => {
            let (_, booking) = open_booking(storage)?;
            let appointment = booking.complete_appointment(&AppointmentId(appointment_id))?;
            println!("Completed {}", describe_appointment(&appointment));
        }
        AppointmentCommand::Cancel {
            appointment_id,
            storage,
        } => {
            let (_, booking) = open_booking(storage)?;
            let appointment = booking.cancel_appointment(&AppointmentId(appointment_id))?;
            println!("Cancelled {}", describe_appointment(&appointment));
        }
        AppointmentCommand::Reschedule {
            appointment_id,
            date,
            start,
            storage,
        } => {
            let (_, booking) = open_booking(storage)?;
            let appointment =
                booking.reschedule_appointment(&AppointmentId(appointment_id), date, start)?;
            println!("Rescheduled {}", describe_appointment(&appointment));
        }
        AppointmentCommand::List {
            student,
            lecturer,
            storage,
        } => {
            let (_, booking) = open_booking(storage)?;
            let appointments = booking.appointments();
            let listed = match (student, lecturer) {
                (Some(student), _) => appointments.list_for_student(&UserId(student))?,
                (None, Some(lecturer)) => appointments.list_for_lecturer(&UserId(lecturer))?,
                (None, None) => appointments.all()?,
            };
            print_listing("appointments", &listed, describe_appointment);
        }
    }
    Ok(())
}

pub(crate) fn run_audit(args: AuditArgs) -> Result<(), AppError> {
    let (config, booking) = open_booking(args.storage)?;
    let report = booking.audit()?;

    if args.json {
        print_json(&report);
        return Ok(());
    }

    println!(
        "Audited {} slots, {} requests, {} appointments in {}",
        report.slots_checked,
        report.requests_checked,
        report.appointments_checked,
        config.storage.data_dir.display()
    );
    if report.is_consistent() {
        println!("No drift detected");
    } else {
        println!("{} violations:", report.violations.len());
        for violation in &report.violations {
            println!("  - {violation}");
        }
    }
    Ok(())
}

pub(crate) fn describe_slot(slot: &Slot) -> String {
    format!(
        "{} {} {}-{} ({}) [{}]",
        slot.slot_id,
        slot.date,
        format_time(slot.start_time),
        format_time(slot.end_time),
        slot.lecturer_id,
        slot.status
    )
}

pub(crate) fn describe_request(request: &Request) -> String {
    format!(
        "{} {} -> {} on {} {} ({}) [{}]",
        request.request_id,
        request.student_id,
        request.slot_id,
        request.date,
        format_time(request.start_time),
        request.reason,
        request.status
    )
}

pub(crate) fn describe_appointment(appointment: &Appointment) -> String {
    let mut line = format!(
        "{} for {} with {} on {} {} [{}]",
        appointment.appointment_id,
        appointment.student_id,
        appointment.lecturer_id,
        appointment.date,
        format_time(appointment.start_time),
        appointment.status
    );
    if !appointment.cancel_reason.is_empty() {
        line.push_str(&format!(" reason: {}", appointment.cancel_reason));
    }
    line
}

fn print_listing<T>(label: &str, records: &[T], describe: fn(&T) -> String) {
    if records.is_empty() {
        println!("No {label}");
        return;
    }
    for record in records {
        println!("- {}", describe(record));
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("Report unavailable: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consult_booking::booking::{AppointmentStatus, SlotStatus};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).expect("valid date")
    }

    fn time(hour: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, 0, 0).expect("valid time")
    }

    #[test]
    fn slot_lines_show_window_and_status() {
        let slot = Slot {
            slot_id: SlotId::new("S1"),
            lecturer_id: UserId::new("L1"),
            date: date(),
            start_time: time(10),
            end_time: time(11),
            status: SlotStatus::OnHold,
        };
        assert_eq!(describe_slot(&slot), "S1 2026-10-17 10:00-11:00 (L1) [ON_HOLD]");
    }

    #[test]
    fn appointment_lines_include_cancel_reason_only_when_present() {
        let mut appointment = Appointment {
            appointment_id: AppointmentId::new("A2"),
            request_id: RequestId::new("R2"),
            student_id: UserId::new("T2"),
            lecturer_id: UserId::new("L1"),
            slot_id: SlotId::new("S2"),
            date: date(),
            start_time: time(14),
            status: AppointmentStatus::Scheduled,
            cancel_reason: String::new(),
        };
        assert!(!describe_appointment(&appointment).contains("reason"));

        appointment.status = AppointmentStatus::Cancelled;
        appointment.cancel_reason = "Lecturer unavailable".to_string();
        assert!(describe_appointment(&appointment).ends_with("reason: Lecturer unavailable"));
    }
}
