use crate::db;
use crate::event::{Admission, EventStore};
use crate::rsvp::{Rsvp, RsvpStatus, RsvpStore};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;


/// Failure modes of an RSVP change
#[derive(Debug)]
pub enum AttendanceError {
    /// Event does not exist
    NotFound,
    /// A "yes" could not claim a slot. The RSVP itself was already saved.
    CapacityExceeded { capacity: u32 },
    /// Persistence failure
    Store(anyhow::Error),
}

impl fmt::Display for AttendanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttendanceError::NotFound => write!(f, "Event not found"),
            AttendanceError::CapacityExceeded { .. } => write!(f, "Event is at full capacity"),
            AttendanceError::Store(e) => write!(f, "Attendance store error: {}", e),
        }
    }
}

impl std::error::Error for AttendanceError {}

impl From<anyhow::Error> for AttendanceError {
    fn from(e: anyhow::Error) -> Self {
        AttendanceError::Store(e)
    }
}

/// Keeps an event's attendee list in step with its RSVPs.
///
/// Only "yes" claims a slot. Moving away from "yes" frees it again.
pub struct AttendanceCoordinator {
    events: Arc<EventStore>,
    rsvps: Arc<RsvpStore>,
}

impl AttendanceCoordinator {
    pub fn new(events: Arc<EventStore>, rsvps: Arc<RsvpStore>) -> Self {
        Self { events, rsvps }
    }

    /// Records `status` for (event, user) and reconciles attendee membership.
    ///
    /// The RSVP is written before membership changes. If a "yes" hits a full
    /// event the saved RSVP stays "yes" while the user remains off the list,
    /// and `CapacityExceeded` is returned.
    pub fn apply_rsvp(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        status: RsvpStatus,
        note: Option<&str>,
    ) -> Result<Rsvp, AttendanceError> {
        let event = self
            .events
            .find_by_id(event_id)?
            .ok_or(AttendanceError::NotFound)?;

        let rsvp = self
            .rsvps
            .upsert(event_id, user_id, status, note)
            .map_err(upsert_error)?;
        let is_member = event.has_attendee(user_id);

        match (status.is_attending(), is_member) {
            (true, false) => match self.events.add_attendee_within_capacity(event_id, user_id)? {
                Admission::Admitted => {
                    info!(event_id = %event_id, user_id = %user_id, "Attendee admitted");
                }
                // Lost a race with a concurrent request for the same user
                Admission::AlreadyAttending => {}
                Admission::Full => {
                    warn!(
                        event_id = %event_id,
                        user_id = %user_id,
                        capacity = event.capacity,
                        "RSVP rejected, event at capacity"
                    );
                    return Err(AttendanceError::CapacityExceeded {
                        capacity: event.capacity,
                    });
                }
                // Deleted between the load and the insert
                Admission::EventMissing => return Err(AttendanceError::NotFound),
            },
            (false, true) => {
                if self.events.remove_attendee(event_id, user_id)? {
                    info!(
                        event_id = %event_id,
                        user_id = %user_id,
                        status = %status,
                        "Attendee removed"
                    );
                }
            }
            _ => {}
        }

        Ok(rsvp)
    }
}

/// The RSVP foreign key only fails when the event was deleted after it was loaded.
fn upsert_error(e: anyhow::Error) -> AttendanceError {
    if db::caused_by_constraint_violation(&e) {
        AttendanceError::NotFound
    } else {
        AttendanceError::Store(e)
    }
}
