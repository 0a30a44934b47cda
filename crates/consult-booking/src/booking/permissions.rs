//! Capability checks for booking operations.
//!
//! Callers identify themselves with an [`Actor`]; how that identity was obtained (HTTP
//! headers, CLI flags, a desktop session) is irrelevant here. Role grants decide which
//! operations an actor may attempt, and the lifecycles then check ownership of the concrete
//! slot or request against the same identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::domain::UserId;
use super::error::BookingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Lecturer,
    Staff,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Lecturer => "lecturer",
            Role::Staff => "staff",
        }
    }

    pub const fn grants(self, capability: Capability) -> bool {
        matches!(
            (self, capability),
            (Role::Lecturer, Capability::PublishSlots)
                | (Role::Student, Capability::RequestSlots)
                | (Role::Staff, Capability::ReviewRequests)
                | (Role::Staff, Capability::ManageAppointments)
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "lecturer" => Ok(Role::Lecturer),
            "staff" => Ok(Role::Staff),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Operations grouped by who is allowed to attempt them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Create, edit and cancel own slots.
    PublishSlots,
    /// Request slots and cancel own pending requests.
    RequestSlots,
    /// Approve or reject pending requests.
    ReviewRequests,
    /// Complete, cancel and reschedule appointments.
    ManageAppointments,
}

impl Capability {
    pub const fn label(self) -> &'static str {
        match self {
            Capability::PublishSlots => "publish slots",
            Capability::RequestSlots => "request slots",
            Capability::ReviewRequests => "review requests",
            Capability::ManageAppointments => "manage appointments",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of whoever is asking for a booking operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: UserId::new(user_id),
            role,
        }
    }

    pub fn authorize(&self, capability: Capability) -> Result<&UserId, BookingError> {
        if self.role.grants(capability) {
            Ok(&self.user_id)
        } else {
            Err(BookingError::Forbidden {
                requester: self.user_id.clone(),
                role: self.role,
                capability,
            })
        }
    }
}
