//! Event persistence.
//!
//! Attendee membership lives in `event_attendees`, ordered by insertion
//! (`seq`). Admission is a single conditional INSERT evaluated under the
//! connection lock, so the capacity check and the write cannot interleave
//! with another admission.

use super::{Admission, Event, EventFilter, EventPatch, FieldUpdate, NewEvent};
use crate::db::{self, Database};
use crate::rsvp;
use crate::user::{self, UserSummary};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const EVENT_COLUMNS: &str = "e.id, e.title, e.description, e.location, e.start_time, e.end_time, \
     e.capacity, e.organizer_id, e.is_public, e.created_at, e.updated_at";

/// CRUD over events plus attendee-list maintenance.
///
/// Organizer authorization is the caller's job.
pub struct EventStore {
    database: Arc<Database>,
}

impl EventStore {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Inserts a new event with an empty attendee list.
    ///
    /// # Arguments
    /// * `new_event` - Validated event fields
    /// * `organizer` - Id of the creating user
    ///
    /// # Returns
    /// The stored event with its generated id and timestamps.
    ///
    /// # Errors
    /// Fails if the insert fails, e.g. when `organizer` is not a known user.
    pub fn create(&self, new_event: NewEvent, organizer: Uuid) -> Result<Event> {
        let id = Uuid::now_v7();
        let now = db::to_millis(Utc::now());

        let conn = self.database.conn()?;
        conn.execute(
            "INSERT INTO events (id, title, description, location, start_time, end_time,
                                 capacity, organizer_id, is_public, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                id.to_string(),
                new_event.title,
                new_event.description,
                new_event.location,
                db::to_millis(new_event.start_time),
                db::to_millis(new_event.end_time),
                new_event.capacity,
                organizer.to_string(),
                new_event.is_public,
                now,
            ],
        )
        .context("Failed to insert event")?;

        let event = load_event(&conn, id)?.context("Event missing right after insert")?;
        info!(
            event_id = %event.id,
            organizer = %organizer,
            capacity = event.capacity,
            "Event created"
        );
        Ok(event)
    }

    /// Loads one event with its attendee ids. `Ok(None)` if absent.
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Event>> {
        let conn = self.database.conn()?;
        load_event(&conn, id)
    }

    /// Lists events with their organizer, ascending by start time.
    ///
    /// # Arguments
    /// * `filter` - Public events, or one organizer's events of any
    ///   visibility, optionally narrowed by a title search
    ///
    /// # Errors
    /// Fails on any query or row decoding error.
    pub fn find(&self, filter: &EventFilter) -> Result<Vec<(Event, UserSummary)>> {
        let conn = self.database.conn()?;
        let sql = format!(
            "SELECT {}, u.id, u.name, u.email
             FROM events e
             JOIN users u ON u.id = e.organizer_id
             WHERE CASE WHEN ?1 IS NULL THEN e.is_public = 1 ELSE e.organizer_id = ?1 END
             ORDER BY e.start_time ASC, e.id ASC",
            EVENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).context("Failed to prepare event listing")?;
        let rows = stmt
            .query_map(params![filter.organizer.map(|u| u.to_string())], |row| {
                Ok((event_from_row(row)?, user::summary_from_row(row, 11)?))
            })
            .context("Failed to query events")?;

        let mut events = Vec::new();
        for row in rows {
            let (mut event, organizer) = row.context("Failed to read event row")?;
            if !filter.matches_title(&event.title) {
                continue;
            }
            event.attendees = load_attendee_ids(&conn, event.id)?;
            events.push((event, organizer));
        }
        Ok(events)
    }

    /// Applies the set fields of `patch`.
    ///
    /// A limited capacity is checked against the attendee count inside the
    /// UPDATE itself, so an admission that lands after the caller validated
    /// the patch cannot leave more attendees than seats.
    ///
    /// # Arguments
    /// * `id` - Event to update
    /// * `patch` - Fields to overwrite; `None` keeps the stored value
    ///
    /// # Returns
    /// * `FieldUpdate::Updated` - The reloaded event
    /// * `FieldUpdate::CapacityBelowAttendees` - Nothing written
    /// * `FieldUpdate::EventMissing` - No such event
    ///
    /// # Errors
    /// Fails if a statement fails.
    pub fn update_fields(&self, id: Uuid, patch: &EventPatch) -> Result<FieldUpdate> {
        let conn = self.database.conn()?;
        let changed = conn
            .execute(
                "UPDATE events SET
                     title       = COALESCE(?2, title),
                     description = COALESCE(?3, description),
                     location    = COALESCE(?4, location),
                     start_time  = COALESCE(?5, start_time),
                     end_time    = COALESCE(?6, end_time),
                     capacity    = COALESCE(?7, capacity),
                     is_public   = COALESCE(?8, is_public),
                     updated_at  = ?9
                 WHERE id = ?1
                   AND (?7 IS NULL OR ?7 = 0
                        OR ?7 >= (SELECT COUNT(*) FROM event_attendees WHERE event_id = ?1))",
                params![
                    id.to_string(),
                    patch.title,
                    patch.description,
                    patch.location,
                    patch.start_time.map(db::to_millis),
                    patch.end_time.map(db::to_millis),
                    patch.capacity,
                    patch.is_public,
                    db::to_millis(Utc::now()),
                ],
            )
            .context("Failed to update event")?;

        if changed > 0 {
            debug!(event_id = %id, "Event updated");
            return Ok(match load_event(&conn, id)? {
                Some(event) => FieldUpdate::Updated(event),
                None => FieldUpdate::EventMissing,
            });
        }

        if !event_exists(&conn, id)? {
            return Ok(FieldUpdate::EventMissing);
        }
        let attending = attendee_count(&conn, id)?;
        warn!(
            event_id = %id,
            capacity = ?patch.capacity,
            attending,
            "Capacity update rejected, below attendee count"
        );
        Ok(FieldUpdate::CapacityBelowAttendees { attending })
    }

    /// Deletes the event together with its RSVPs and attendee rows.
    ///
    /// # Arguments
    /// * `id` - Event to delete
    ///
    /// # Returns
    /// `true` if the event existed. The three deletes run in one transaction.
    ///
    /// # Errors
    /// Fails if any delete or the commit fails; nothing is removed then.
    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let mut conn = self.database.conn()?;
        let tx = conn.transaction().context("Failed to begin delete transaction")?;

        let rsvps_removed = rsvp::delete_for_event(&tx, id)?;
        tx.execute(
            "DELETE FROM event_attendees WHERE event_id = ?1",
            params![id.to_string()],
        )
        .context("Failed to delete attendees")?;
        let deleted = tx
            .execute("DELETE FROM events WHERE id = ?1", params![id.to_string()])
            .context("Failed to delete event")?;

        tx.commit().context("Failed to commit event deletion")?;

        if deleted > 0 {
            info!(event_id = %id, rsvps_removed, "Event deleted");
        }
        Ok(deleted > 0)
    }

    /// Adds `user_id` to the attendee list unless the event is full.
    ///
    /// The capacity check and the insert are one statement.
    ///
    /// # Returns
    /// * `Admission::Admitted` - Added at the back of the list
    /// * `Admission::AlreadyAttending` - Already listed, nothing changed
    /// * `Admission::Full` - Capacity reached, nothing changed
    /// * `Admission::EventMissing` - No such event
    ///
    /// # Errors
    /// Fails if a statement fails.
    pub fn add_attendee_within_capacity(&self, event_id: Uuid, user_id: Uuid) -> Result<Admission> {
        let conn = self.database.conn()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO event_attendees (event_id, user_id)
                 SELECT e.id, ?2 FROM events e
                 WHERE e.id = ?1
                   AND (e.capacity = 0
                        OR (SELECT COUNT(*) FROM event_attendees a WHERE a.event_id = e.id)
                           < e.capacity)",
                params![event_id.to_string(), user_id.to_string()],
            )
            .context("Failed to insert attendee")?;

        if inserted > 0 {
            touch(&conn, event_id)?;
            return Ok(Admission::Admitted);
        }

        if is_attendee(&conn, event_id, user_id)? {
            return Ok(Admission::AlreadyAttending);
        }
        Ok(if event_exists(&conn, event_id)? {
            Admission::Full
        } else {
            Admission::EventMissing
        })
    }

    /// Removes `user_id` from the attendee list.
    ///
    /// # Returns
    /// `true` if the user was listed. Remaining attendees keep their order.
    ///
    /// # Errors
    /// Fails if a statement fails.
    pub fn remove_attendee(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        let conn = self.database.conn()?;
        let removed = conn
            .execute(
                "DELETE FROM event_attendees WHERE event_id = ?1 AND user_id = ?2",
                params![event_id.to_string(), user_id.to_string()],
            )
            .context("Failed to remove attendee")?;

        if removed > 0 {
            touch(&conn, event_id)?;
        }
        Ok(removed > 0)
    }

    /// Attendee profiles in admission order. Empty for unknown events.
    ///
    /// # Errors
    /// Fails on any query or row decoding error.
    pub fn attendees(&self, event_id: Uuid) -> Result<Vec<UserSummary>> {
        let conn = self.database.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT u.id, u.name, u.email
                 FROM event_attendees a
                 JOIN users u ON u.id = a.user_id
                 WHERE a.event_id = ?1
                 ORDER BY a.seq ASC",
            )
            .context("Failed to prepare attendee query")?;
        let rows = stmt
            .query_map(params![event_id.to_string()], |row| {
                user::summary_from_row(row, 0)
            })
            .context("Failed to query attendees")?;

        let attendees = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read attendee row")?;
        Ok(attendees)
    }
}

fn load_event(conn: &Connection, id: Uuid) -> Result<Option<Event>> {
    let sql = format!("SELECT {} FROM events e WHERE e.id = ?1", EVENT_COLUMNS);
    let event = conn
        .query_row(&sql, params![id.to_string()], event_from_row)
        .optional()
        .context("Failed to load event")?;

    match event {
        Some(mut event) => {
            event.attendees = load_attendee_ids(conn, id)?;
            Ok(Some(event))
        }
        None => Ok(None),
    }
}

fn load_attendee_ids(conn: &Connection, event_id: Uuid) -> Result<Vec<Uuid>> {
    let mut stmt = conn
        .prepare_cached("SELECT user_id FROM event_attendees WHERE event_id = ?1 ORDER BY seq ASC")
        .context("Failed to prepare attendee id query")?;
    let rows = stmt
        .query_map(params![event_id.to_string()], |row| db::uuid_column(row, 0))
        .context("Failed to query attendee ids")?;

    let ids = rows
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read attendee id")?;
    Ok(ids)
}

fn event_exists(conn: &Connection, event_id: Uuid) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM events WHERE id = ?1)",
        params![event_id.to_string()],
        |row| row.get(0),
    )
    .context("Failed to check event existence")
}

fn attendee_count(conn: &Connection, event_id: Uuid) -> Result<usize> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM event_attendees WHERE event_id = ?1",
            params![event_id.to_string()],
            |row| row.get(0),
        )
        .context("Failed to count attendees")?;
    Ok(count as usize)
}

fn is_attendee(conn: &Connection, event_id: Uuid, user_id: Uuid) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM event_attendees WHERE event_id = ?1 AND user_id = ?2)",
        params![event_id.to_string(), user_id.to_string()],
        |row| row.get(0),
    )
    .context("Failed to check attendee membership")
}

fn touch(conn: &Connection, event_id: Uuid) -> Result<()> {
    conn.execute(
        "UPDATE events SET updated_at = ?2 WHERE id = ?1",
        params![event_id.to_string(), db::to_millis(Utc::now())],
    )
    .context("Failed to touch event")?;
    Ok(())
}

/// Maps the first 11 columns (`EVENT_COLUMNS`). Attendees are loaded separately.
fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: db::uuid_column(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        location: row.get(3)?,
        start_time: db::timestamp_column(row, 4)?,
        end_time: db::timestamp_column(row, 5)?,
        capacity: row.get(6)?,
        organizer: db::uuid_column(row, 7)?,
        attendees: Vec::new(),
        is_public: row.get(8)?,
        created_at: db::timestamp_column(row, 9)?,
        updated_at: db::timestamp_column(row, 10)?,
    })
}
