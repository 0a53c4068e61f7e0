use crate::event::EventSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

mod store;

pub use store::RsvpStore;
pub(crate) use store::delete_for_event;

/// A user's answer to an event invitation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsvpStatus {
    /// Column default. The API always sets a status explicitly.
    #[default]
    Yes,
    No,
    Maybe,
}

impl RsvpStatus {
    pub const ALL: [RsvpStatus; 3] = [RsvpStatus::Yes, RsvpStatus::No, RsvpStatus::Maybe];

    pub fn as_str(&self) -> &'static str {
        match self {
            RsvpStatus::Yes => "yes",
            RsvpStatus::No => "no",
            RsvpStatus::Maybe => "maybe",
        }
    }

    /// Only "yes" claims an attendee slot.
    pub fn is_attending(&self) -> bool {
        matches!(self, RsvpStatus::Yes)
    }
}

impl fmt::Display for RsvpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RsvpStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(RsvpStatus::Yes),
            "no" => Ok(RsvpStatus::No),
            "maybe" => Ok(RsvpStatus::Maybe),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Status string outside {yes, no, maybe}
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown RSVP status '{}' (expected yes, no or maybe)", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

/// One record per (event, user).
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rsvp {
    pub id: Uuid,
    pub event: Uuid,
    pub user: Uuid,
    pub status: RsvpStatus,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An RSVP with its event and organizer joined in, for "my RSVPs".
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RsvpWithEvent {
    pub id: Uuid,
    pub user: Uuid,
    pub status: RsvpStatus,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub event: EventSummary,
}
