//! RSVP persistence, keyed by the unique (event_id, user_id) index.

use super::{Rsvp, RsvpStatus, RsvpWithEvent};
use crate::db::{self, Database};
use crate::event::EventSummary;
use crate::user;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const RSVP_COLUMNS: &str = "r.id, r.event_id, r.user_id, r.status, r.note, r.created_at, r.updated_at";

/// RSVP rows. The SQLite foreign keys tie each row to an existing event and user.
pub struct RsvpStore {
    database: Arc<Database>,
}

impl RsvpStore {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Creates or updates the RSVP for (event, user) and returns the stored row.
    ///
    /// A `None` note keeps whatever note is stored (empty for new rows).
    /// `updated_at` only moves when status or note actually change.
    ///
    /// # Arguments
    /// * `event_id` - Event answered
    /// * `user_id` - Answering user
    /// * `status` - New status
    /// * `note` - Replacement note, or `None` to keep the stored one
    ///
    /// # Returns
    /// The RSVP as stored after the write.
    ///
    /// # Errors
    /// Fails if the write fails. A missing event or user surfaces as a
    /// SQLite constraint violation in the error chain.
    pub fn upsert(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        status: RsvpStatus,
        note: Option<&str>,
    ) -> Result<Rsvp> {
        let conn = self.database.conn()?;
        conn.execute(
            "INSERT INTO rsvps (id, event_id, user_id, status, note, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, COALESCE(?5, ''), ?6, ?6)
             ON CONFLICT(event_id, user_id) DO UPDATE SET
                 status = excluded.status,
                 note = COALESCE(?5, rsvps.note),
                 updated_at = CASE
                     WHEN rsvps.status = excluded.status
                          AND rsvps.note = COALESCE(?5, rsvps.note)
                     THEN rsvps.updated_at
                     ELSE excluded.updated_at
                 END",
            params![
                Uuid::now_v7().to_string(),
                event_id.to_string(),
                user_id.to_string(),
                status.as_str(),
                note,
                db::to_millis(Utc::now()),
            ],
        )
        .context("Failed to upsert RSVP")?;

        let rsvp = load_rsvp(&conn, event_id, user_id)?.context("RSVP missing right after upsert")?;
        debug!(
            rsvp_id = %rsvp.id,
            event_id = %event_id,
            user_id = %user_id,
            status = %rsvp.status,
            "RSVP saved"
        );
        Ok(rsvp)
    }

    /// Loads the RSVP for (event, user). `Ok(None)` if the user never answered.
    pub fn find(&self, event_id: Uuid, user_id: Uuid) -> Result<Option<Rsvp>> {
        let conn = self.database.conn()?;
        load_rsvp(&conn, event_id, user_id)
    }

    /// All of a user's RSVPs with event and organizer, most recently changed first.
    ///
    /// # Arguments
    /// * `user_id` - Answering user
    ///
    /// # Returns
    /// One entry per event answered. Unknown users get an empty list.
    ///
    /// # Errors
    /// Fails on any query or row decoding error.
    pub fn find_by_user(&self, user_id: Uuid) -> Result<Vec<RsvpWithEvent>> {
        let conn = self.database.conn()?;
        let sql = format!(
            "SELECT {},
                    e.title, e.location, e.start_time, e.end_time, e.capacity, e.is_public,
                    u.id, u.name, u.email
             FROM rsvps r
             JOIN events e ON e.id = r.event_id
             JOIN users u ON u.id = e.organizer_id
             WHERE r.user_id = ?1
             ORDER BY r.updated_at DESC, r.id DESC",
            RSVP_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).context("Failed to prepare RSVP listing")?;
        let rows = stmt
            .query_map(params![user_id.to_string()], |row| {
                let rsvp = rsvp_from_row(row)?;
                Ok(RsvpWithEvent {
                    id: rsvp.id,
                    user: rsvp.user,
                    status: rsvp.status,
                    note: rsvp.note,
                    created_at: rsvp.created_at,
                    updated_at: rsvp.updated_at,
                    event: EventSummary {
                        id: rsvp.event,
                        title: row.get(7)?,
                        location: row.get(8)?,
                        start_time: db::timestamp_column(row, 9)?,
                        end_time: db::timestamp_column(row, 10)?,
                        capacity: row.get(11)?,
                        is_public: row.get(12)?,
                        organizer: user::summary_from_row(row, 13)?,
                    },
                })
            })
            .context("Failed to query RSVPs")?;

        let items = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read RSVP row")?;
        Ok(items)
    }

    /// Deletes every RSVP for an event.
    ///
    /// `EventStore::delete` runs the same statement inside its own transaction.
    ///
    /// # Returns
    /// The number of RSVPs removed.
    ///
    /// # Errors
    /// Fails if the delete fails.
    pub fn delete_all_for_event(&self, event_id: Uuid) -> Result<usize> {
        let conn = self.database.conn()?;
        delete_for_event(&conn, event_id)
    }
}

/// Shared with the event store's cascading delete, which runs it inside
/// its own transaction.
pub(crate) fn delete_for_event(conn: &Connection, event_id: Uuid) -> Result<usize> {
    conn.execute(
        "DELETE FROM rsvps WHERE event_id = ?1",
        params![event_id.to_string()],
    )
    .context("Failed to delete RSVPs for event")
}

fn load_rsvp(conn: &Connection, event_id: Uuid, user_id: Uuid) -> Result<Option<Rsvp>> {
    let sql = format!(
        "SELECT {} FROM rsvps r WHERE r.event_id = ?1 AND r.user_id = ?2",
        RSVP_COLUMNS
    );
    conn.query_row(
        &sql,
        params![event_id.to_string(), user_id.to_string()],
        rsvp_from_row,
    )
    .optional()
    .context("Failed to load RSVP")
}

fn rsvp_from_row(row: &Row<'_>) -> rusqlite::Result<Rsvp> {
    let status: String = row.get(3)?;
    let status = status
        .parse::<RsvpStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

    Ok(Rsvp {
        id: db::uuid_column(row, 0)?,
        event: db::uuid_column(row, 1)?,
        user: db::uuid_column(row, 2)?,
        status,
        note: row.get(4)?,
        created_at: db::timestamp_column(row, 5)?,
        updated_at: db::timestamp_column(row, 6)?,
    })
}
