use crate::user::UserSummary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

mod store;
#[cfg(test)]
mod tests;

pub use store::EventStore;

/// An event owned by its organizer.
///
/// `attendees` holds the users with an accepted "yes" RSVP in the order they
/// were admitted. When `capacity > 0` it never grows past `capacity`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Maximum attendee count, 0 = unlimited
    pub capacity: u32,
    pub organizer: Uuid,
    pub attendees: Vec<Uuid>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn has_attendee(&self, user_id: Uuid) -> bool {
        self.attendees.contains(&user_id)
    }

    pub fn is_organized_by(&self, user_id: Uuid) -> bool {
        self.organizer == user_id
    }
}

/// Fields for a new event (already validated).
#[derive(Clone, Debug, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: u32,
    pub is_public: bool,
}

/// Partial update. `None` leaves the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub capacity: Option<u32>,
    pub is_public: Option<bool>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self == &EventPatch::default()
    }
}

/// Listing filter
#[derive(Clone, Debug, Default)]
pub struct EventFilter {
    /// Case-insensitive substring of the title
    pub search: Option<String>,
    /// Only this organizer's events (any visibility). Public events otherwise.
    pub organizer: Option<Uuid>,
}

impl EventFilter {
    pub fn public() -> Self {
        Self::default()
    }

    pub fn organized_by(user_id: Uuid) -> Self {
        Self {
            organizer: Some(user_id),
            ..Self::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Title match, ignoring case. Blank searches match everything.
    pub fn matches_title(&self, title: &str) -> bool {
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => title.to_lowercase().contains(&needle.to_lowercase()),
        }
    }
}

/// Outcome of a capacity-guarded attendee insert
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// User added to the attendee list
    Admitted,
    /// User was already on the list, nothing changed
    AlreadyAttending,
    /// Capacity reached, nothing changed
    Full,
    /// No such event
    EventMissing,
}

/// Outcome of `EventStore::update_fields`
#[derive(Clone, Debug, PartialEq)]
pub enum FieldUpdate {
    /// Patch applied, event reloaded
    Updated(Event),
    /// New capacity is below the attendee count at write time, nothing changed
    CapacityBelowAttendees { attending: usize },
    /// No such event
    EventMissing,
}

/// Event fields shown next to an RSVP in "my RSVPs".
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: Uuid,
    pub title: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: u32,
    pub is_public: bool,
    pub organizer: UserSummary,
}
