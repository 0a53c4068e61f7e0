use crate::db::{self, Database};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

mod password;

pub use password::{Argon2PasswordHasher, PasswordHasher};

/// A registered account.
///
/// The password hash is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Stored trimmed and lowercased
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Public projection of a user, embedded in event and RSVP views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Canonical form used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User directory errors
#[derive(Debug)]
pub enum DirectoryError {
    /// Another account already uses this email
    DuplicateEmail,
    Store(anyhow::Error),
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::DuplicateEmail => write!(f, "Email already registered"),
            DirectoryError::Store(e) => write!(f, "User store failure: {:#}", e),
        }
    }
}

impl std::error::Error for DirectoryError {}

impl From<anyhow::Error> for DirectoryError {
    fn from(e: anyhow::Error) -> Self {
        DirectoryError::Store(e)
    }
}

/// Identity records backed by the `users` table.
pub struct UserDirectory {
    database: Arc<Database>,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserDirectory {
    pub fn new(database: Arc<Database>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { database, hasher }
    }

    /// Registers a new user. Email uniqueness is case-insensitive.
    ///
    /// # Arguments
    /// * `name` - Display name, stored trimmed
    /// * `email` - Stored trimmed and lowercased
    /// * `password` - Plaintext, hashed before storage
    ///
    /// # Returns
    /// The stored user, including its password hash.
    ///
    /// # Errors
    /// * `DirectoryError::DuplicateEmail` - Email already registered
    /// * `DirectoryError::Store` - Hashing or the insert failed
    pub fn create(&self, name: &str, email: &str, password: &str) -> Result<User, DirectoryError> {
        let email = normalize_email(email);
        if self.find_by_email(&email)?.is_some() {
            return Err(DirectoryError::DuplicateEmail);
        }

        // Hash outside the connection lock.
        let password_hash = self.hasher.hash(password)?;
        let id = Uuid::now_v7();
        let now = db::to_millis(Utc::now());

        let conn = self.database.conn()?;
        let inserted = conn.execute(
            "INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id.to_string(), name.trim(), email, password_hash, now],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if db::is_constraint_violation(&e) => {
                return Err(DirectoryError::DuplicateEmail)
            }
            Err(e) => return Err(anyhow::Error::new(e).context("Failed to insert user").into()),
        }

        let user = load_user(&conn, "id", &id.to_string())?
            .context("User missing right after insert")?;
        info!(user_id = %user.id, email = %user.email, "User registered");
        Ok(user)
    }

    /// Looks a user up by email, ignoring case and surrounding whitespace.
    ///
    /// # Errors
    /// Fails if the query fails.
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.database.conn()?;
        load_user(&conn, "email", &normalize_email(email))
    }

    /// Looks a user up by id. `Ok(None)` if absent.
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.database.conn()?;
        load_user(&conn, "id", &id.to_string())
    }

    /// Public profile for embedding in event and RSVP views.
    pub fn summary(&self, id: Uuid) -> Result<Option<UserSummary>> {
        Ok(self.find_by_id(id)?.map(|u| u.summary()))
    }

    /// Checks a plaintext password against the user's stored hash.
    ///
    /// # Returns
    /// `false` for a wrong password or an unreadable stored hash.
    pub fn verify_credential(&self, user: &User, plaintext: &str) -> bool {
        self.hasher.verify(plaintext, &user.password_hash)
    }
}

fn load_user(conn: &Connection, column: &str, value: &str) -> Result<Option<User>> {
    // `column` is always one of our own literals, never user input.
    let sql = format!(
        "SELECT id, name, email, password_hash, created_at, updated_at FROM users WHERE {} = ?1",
        column
    );
    conn.query_row(&sql, params![value], user_from_row)
        .optional()
        .with_context(|| format!("Failed to load user by {}", column))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: db::uuid_column(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: db::timestamp_column(row, 4)?,
        updated_at: db::timestamp_column(row, 5)?,
    })
}

/// Reads a `UserSummary` from three consecutive columns (id, name, email).
pub(crate) fn summary_from_row(row: &Row<'_>, start: usize) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: db::uuid_column(row, start)?,
        name: row.get(start + 1)?,
        email: row.get(start + 2)?,
    })
}
