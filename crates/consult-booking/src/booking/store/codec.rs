//! Pipe-delimited record format shared by the flat-file stores.
//!
//! Field order is fixed per entity and there is no header line:
//!
//! ```text
//! slotId|lecturerId|date|startTime|endTime|status
//! requestId|studentId|lecturerId|slotId|date|startTime|endTime|reason|status
//! appointmentId|requestId|studentId|lecturerId|slotId|date|startTime|status|cancelReason
//! ```
//!
//! Free-text fields that contain `|`, `"` or a line break are written in double quotes with
//! embedded quotes doubled. Everything else is written verbatim.

use std::io::Read;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::booking::domain::{
    format_time, parse_date, parse_time, Appointment, AppointmentId, Request, RequestId, Slot,
    SlotId, UserId, DATE_FORMAT,
};

pub const DELIMITER: u8 = b'|';

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed record on line {line}: {source}")]
    Malformed {
        line: u64,
        #[source]
        source: csv::Error,
    },
    #[error("invalid {field} on line {line}: {message}")]
    InvalidField {
        line: u64,
        field: &'static str,
        message: String,
    },
    #[error("failed to encode record: {0}")]
    Encode(#[source] csv::Error),
}

/// Conversion between a domain record and its fixed-order flat row.
pub trait FlatRecord: Sized {
    type Row: Serialize + DeserializeOwned;

    fn to_row(&self) -> Self::Row;
    fn from_row(row: Self::Row, line: u64) -> Result<Self, CodecError>;
}

pub fn encode<T: FlatRecord>(records: &[T]) -> Result<Vec<u8>, CodecError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .from_writer(Vec::new());

    for record in records {
        writer.serialize(record.to_row()).map_err(CodecError::Encode)?;
    }

    writer
        .into_inner()
        .map_err(|err| CodecError::Encode(csv::Error::from(err.into_error())))
}

pub fn decode<T: FlatRecord, R: Read>(reader: R) -> Result<Vec<T>, CodecError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut records = Vec::new();

    for result in csv_reader.records() {
        let raw = result.map_err(|source| CodecError::Malformed {
            line: source.position().map(|pos| pos.line()).unwrap_or(0),
            source,
        })?;
        let line = raw.position().map(|pos| pos.line()).unwrap_or(0);
        let row: T::Row = raw
            .deserialize(None)
            .map_err(|source| CodecError::Malformed { line, source })?;
        records.push(T::from_row(row, line)?);
    }

    Ok(records)
}

/// Renders a single record as one line, without the trailing newline.
pub fn encode_line<T: FlatRecord>(record: &T) -> Result<String, CodecError> {
    let bytes = encode(std::slice::from_ref(record))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_end_matches(['\r', '\n']).to_string())
}

fn field<V>(
    line: u64,
    field: &'static str,
    parsed: Result<V, impl ToString>,
) -> Result<V, CodecError> {
    parsed.map_err(|err| CodecError::InvalidField {
        line,
        field,
        message: err.to_string(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SlotRow {
    slot_id: String,
    lecturer_id: String,
    date: String,
    start_time: String,
    end_time: String,
    status: String,
}

impl FlatRecord for Slot {
    type Row = SlotRow;

    fn to_row(&self) -> SlotRow {
        SlotRow {
            slot_id: self.slot_id.to_string(),
            lecturer_id: self.lecturer_id.to_string(),
            date: self.date.format(DATE_FORMAT).to_string(),
            start_time: format_time(self.start_time),
            end_time: format_time(self.end_time),
            status: self.status.label().to_string(),
        }
    }

    fn from_row(row: SlotRow, line: u64) -> Result<Self, CodecError> {
        Ok(Slot {
            slot_id: SlotId(row.slot_id),
            lecturer_id: UserId(row.lecturer_id),
            date: field(line, "date", parse_date(&row.date))?,
            start_time: field(line, "start time", parse_time(&row.start_time))?,
            end_time: field(line, "end time", parse_time(&row.end_time))?,
            status: field(line, "status", row.status.parse())?,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestRow {
    request_id: String,
    student_id: String,
    lecturer_id: String,
    slot_id: String,
    date: String,
    start_time: String,
    end_time: String,
    reason: String,
    status: String,
}

impl FlatRecord for Request {
    type Row = RequestRow;

    fn to_row(&self) -> RequestRow {
        RequestRow {
            request_id: self.request_id.to_string(),
            student_id: self.student_id.to_string(),
            lecturer_id: self.lecturer_id.to_string(),
            slot_id: self.slot_id.to_string(),
            date: self.date.format(DATE_FORMAT).to_string(),
            start_time: format_time(self.start_time),
            end_time: format_time(self.end_time),
            reason: self.reason.clone(),
            status: self.status.label().to_string(),
        }
    }

    // Active requests are always pending; the cancel reason only lives on the appointment.
    fn from_row(row: RequestRow, line: u64) -> Result<Self, CodecError> {
        Ok(Request {
            request_id: RequestId(row.request_id),
            student_id: UserId(row.student_id),
            lecturer_id: UserId(row.lecturer_id),
            slot_id: SlotId(row.slot_id),
            date: field(line, "date", parse_date(&row.date))?,
            start_time: field(line, "start time", parse_time(&row.start_time))?,
            end_time: field(line, "end time", parse_time(&row.end_time))?,
            reason: row.reason,
            status: field(line, "status", row.status.parse())?,
            cancel_reason: String::new(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppointmentRow {
    appointment_id: String,
    request_id: String,
    student_id: String,
    lecturer_id: String,
    slot_id: String,
    date: String,
    start_time: String,
    status: String,
    cancel_reason: String,
}

impl FlatRecord for Appointment {
    type Row = AppointmentRow;

    fn to_row(&self) -> AppointmentRow {
        AppointmentRow {
            appointment_id: self.appointment_id.to_string(),
            request_id: self.request_id.to_string(),
            student_id: self.student_id.to_string(),
            lecturer_id: self.lecturer_id.to_string(),
            slot_id: self.slot_id.to_string(),
            date: self.date.format(DATE_FORMAT).to_string(),
            start_time: format_time(self.start_time),
            status: self.status.label().to_string(),
            cancel_reason: self.cancel_reason.clone(),
        }
    }

    fn from_row(row: AppointmentRow, line: u64) -> Result<Self, CodecError> {
        Ok(Appointment {
            appointment_id: AppointmentId(row.appointment_id),
            request_id: RequestId(row.request_id),
            student_id: UserId(row.student_id),
            lecturer_id: UserId(row.lecturer_id),
            slot_id: SlotId(row.slot_id),
            date: field(line, "date", parse_date(&row.date))?,
            start_time: field(line, "start time", parse_time(&row.start_time))?,
            status: field(line, "status", row.status.parse())?,
            cancel_reason: row.cancel_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::domain::{AppointmentStatus, RequestStatus, SlotStatus};
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).expect("valid date")
    }

    fn slot() -> Slot {
        Slot {
            slot_id: SlotId::new("S1"),
            lecturer_id: UserId::new("L1"),
            date: date(),
            start_time: parse_time("10:00").expect("valid"),
            end_time: parse_time("11:00").expect("valid"),
            status: SlotStatus::OnHold,
        }
    }

    fn request(reason: &str) -> Request {
        Request {
            request_id: RequestId::new("R1"),
            student_id: UserId::new("T1"),
            lecturer_id: UserId::new("L1"),
            slot_id: SlotId::new("S1"),
            date: date(),
            start_time: parse_time("10:00").expect("valid"),
            end_time: parse_time("11:00").expect("valid"),
            reason: reason.to_string(),
            status: RequestStatus::Pending,
            cancel_reason: String::new(),
        }
    }

    fn appointment(cancel_reason: &str) -> Appointment {
        Appointment {
            appointment_id: AppointmentId::new("A1"),
            request_id: RequestId::new("R1"),
            student_id: UserId::new("T1"),
            lecturer_id: UserId::new("L1"),
            slot_id: SlotId::new("S1"),
            date: date(),
            start_time: parse_time("10:00").expect("valid"),
            status: AppointmentStatus::Cancelled,
            cancel_reason: cancel_reason.to_string(),
        }
    }

    #[test]
    fn plain_records_use_the_legacy_line_layout() {
        assert_eq!(
            encode_line(&slot()).expect("encodes"),
            "S1|L1|2026-10-17|10:00|11:00|ON_HOLD"
        );
        assert_eq!(
            encode_line(&request("Need help with thesis")).expect("encodes"),
            "R1|T1|L1|S1|2026-10-17|10:00|11:00|Need help with thesis|PENDING"
        );
        assert_eq!(
            encode_line(&appointment("Lecturer unavailable")).expect("encodes"),
            "A1|R1|T1|L1|S1|2026-10-17|10:00|CANCELLED|Lecturer unavailable"
        );
    }

    #[test]
    fn records_survive_a_file_round_trip() {
        let slots = vec![slot()];
        let decoded: Vec<Slot> = decode(encode(&slots).expect("encodes").as_slice()).expect("decodes");
        assert_eq!(decoded, slots);

        let requests = vec![request("Need help with thesis")];
        let decoded: Vec<Request> =
            decode(encode(&requests).expect("encodes").as_slice()).expect("decodes");
        assert_eq!(decoded, requests);

        let appointments = vec![appointment("Lecturer unavailable"), appointment("")];
        let decoded: Vec<Appointment> =
            decode(encode(&appointments).expect("encodes").as_slice()).expect("decodes");
        assert_eq!(decoded, appointments);
    }

    #[test]
    fn delimiter_inside_free_text_is_quoted_and_restored() {
        let original = appointment("Room 4|B closed, \"urgent\"\nsee notes");
        let line = encode_line(&original).expect("encodes");
        assert!(line.contains("\"Room 4|B closed, \"\"urgent\"\""));

        let decoded: Vec<Appointment> =
            decode(encode(&[original.clone()]).expect("encodes").as_slice()).expect("decodes");
        assert_eq!(decoded, vec![original]);
    }

    #[test]
    fn decode_reads_hand_written_files_and_skips_blank_lines() {
        let file = "S1|L1|2026-10-17|10:00|11:00|OPEN\n\nS2|L1|2026-10-18|09:00:00|09:30|cancelled\n";
        let slots: Vec<Slot> = decode(file.as_bytes()).expect("decodes");
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].status, SlotStatus::Cancelled);
        assert_eq!(format_time(slots[1].start_time), "09:00");
    }

    #[test]
    fn decode_names_the_offending_line_and_field() {
        let file = "S1|L1|2026-10-17|10:00|11:00|OPEN\nS2|L1|17/10/2026|10:00|11:00|OPEN\n";
        match decode::<Slot, _>(file.as_bytes()) {
            Err(CodecError::InvalidField { line, field, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(field, "date");
            }
            other => panic!("expected invalid date, got {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_short_rows() {
        let file = "S1|L1|2026-10-17\n";
        assert!(matches!(
            decode::<Slot, _>(file.as_bytes()),
            Err(CodecError::Malformed { .. })
        ));
    }
}
