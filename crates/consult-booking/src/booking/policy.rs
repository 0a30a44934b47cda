use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What happens to a slot once its request is approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotRetention {
    /// The slot record is deleted on approval; the appointment carries its date and time.
    #[default]
    ConsumeOnApproval,
    /// The slot stays as `BOOKED` and is only deleted when the appointment completes.
    KeepBookedUntilCompletion,
}

impl SlotRetention {
    pub const fn label(self) -> &'static str {
        match self {
            SlotRetention::ConsumeOnApproval => "consume_on_approval",
            SlotRetention::KeepBookedUntilCompletion => "keep_booked",
        }
    }
}

impl fmt::Display for SlotRetention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SlotRetention {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "consume_on_approval" | "consume" | "delete" => Ok(SlotRetention::ConsumeOnApproval),
            "keep_booked" | "keep_booked_until_completion" | "booked" => {
                Ok(SlotRetention::KeepBookedUntilCompletion)
            }
            other => Err(format!("unknown slot retention policy '{other}'")),
        }
    }
}

/// Tunables for the booking rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingPolicy {
    pub slot_retention: SlotRetention,
    /// Minimum length of a student's cancellation reason. Staff rejections only need a
    /// non-empty reason.
    pub min_cancel_reason_chars: usize,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            slot_retention: SlotRetention::ConsumeOnApproval,
            min_cancel_reason_chars: 10,
        }
    }
}
