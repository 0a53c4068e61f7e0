//! Request payload checks.
//!
//! Handlers validate before calling into the stores or the attendance
//! coordinator. Every rule that fails is reported, not just the first one.

use crate::event::{Event, EventPatch, NewEvent};
use crate::rsvp::RsvpStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;


pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_NOTE_LEN: usize = 1000;

/// One failed rule
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// All failed rules for one payload
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.0
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// `Ok(value)` if nothing was recorded
    fn finish<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Parses a path id. Anything but a UUID is "Invalid ID".
pub fn parse_id(raw: &str) -> Result<Uuid, ValidationErrors> {
    Uuid::parse_str(raw.trim()).map_err(|_| ValidationErrors::single("id", "Invalid ID"))
}

/// Loose address check: one `@`, non-empty local part, dotted domain, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => {
            !host.is_empty() && tld.len() >= 2 && !domain.starts_with('.') && !domain.contains("..")
        }
        None => false,
    }
}

/// RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn check_email(errors: &mut ValidationErrors, email: Option<&str>) {
    if !email.map(str::trim).is_some_and(is_valid_email) {
        errors.add("email", "Valid email required");
    }
}

fn check_password(errors: &mut ValidationErrors, password: Option<&str>) {
    if password.map_or(0, |p| p.chars().count()) < MIN_PASSWORD_LEN {
        errors.add("password", "Password min 6 chars");
    }
}

fn capacity_below_attendees_message(attending: usize) -> String {
    format!("Capacity cannot be below the current attendee count ({})", attending)
}

/// Rejection for a capacity change that lost a race with new admissions.
pub fn capacity_below_attendees(attending: usize) -> ValidationErrors {
    ValidationErrors::single("capacity", capacity_below_attendees_message(attending))
}

fn check_capacity(errors: &mut ValidationErrors, capacity: Option<i64>) -> Option<u32> {
    let capacity = capacity?;
    match u32::try_from(capacity) {
        Ok(c) => Some(c),
        Err(_) => {
            errors.add("capacity", "Capacity must be an integer >= 0");
            None
        }
    }
}

fn check_time(errors: &mut ValidationErrors, field: &str, raw: Option<&str>) -> Option<DateTime<Utc>> {
    let parsed = raw.and_then(parse_timestamp);
    if raw.is_some() && parsed.is_none() {
        errors.add(field, "Must be an ISO 8601 date");
    }
    parsed
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RegisterPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Accepted registration input
#[derive(Clone, Debug, PartialEq)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterPayload {
    pub fn validate(self) -> Result<Registration, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = self.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            errors.add("name", "Name is required");
        }
        check_email(&mut errors, self.email.as_deref());
        check_password(&mut errors, self.password.as_deref());

        errors.finish(|| Registration {
            name: name.to_string(),
            email: self.email.unwrap_or_default().trim().to_string(),
            password: self.password.unwrap_or_default(),
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LoginPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl LoginPayload {
    pub fn validate(self) -> Result<Credentials, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_email(&mut errors, self.email.as_deref());
        check_password(&mut errors, self.password.as_deref());

        errors.finish(|| Credentials {
            email: self.email.unwrap_or_default().trim().to_string(),
            password: self.password.unwrap_or_default(),
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub capacity: Option<i64>,
    pub is_public: Option<bool>,
}

impl CreateEventPayload {
    /// Missing description/location become "", capacity 0 (unlimited), public.
    pub fn validate(self) -> Result<NewEvent, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = self.title.as_deref().map(str::trim).unwrap_or_default().to_string();
        if title.is_empty() {
            errors.add("title", "Title is required");
        }

        let start_time = check_time(&mut errors, "startTime", self.start_time.as_deref());
        if self.start_time.is_none() {
            errors.add("startTime", "Start time is required");
        }
        let end_time = check_time(&mut errors, "endTime", self.end_time.as_deref());
        if self.end_time.is_none() {
            errors.add("endTime", "End time is required");
        }
        if let (Some(start), Some(end)) = (start_time, end_time) {
            if end < start {
                errors.add("endTime", "End time must not be before start time");
            }
        }

        let capacity = check_capacity(&mut errors, self.capacity).unwrap_or(0);

        match (start_time, end_time) {
            (Some(start_time), Some(end_time)) if errors.is_empty() => Ok(NewEvent {
                title,
                description: self.description.unwrap_or_default(),
                location: self.location.unwrap_or_default(),
                start_time,
                end_time,
                capacity,
                is_public: self.is_public.unwrap_or(true),
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub capacity: Option<i64>,
    pub is_public: Option<bool>,
}

impl UpdateEventPayload {
    /// Checks the update against the event as currently stored.
    ///
    /// The merged start/end must stay ordered and a limited capacity may not
    /// drop below the number of current attendees.
    pub fn validate(self, current: &Event) -> Result<EventPatch, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = self.title.map(|t| t.trim().to_string());
        if title.as_deref() == Some("") {
            errors.add("title", "Title must not be empty");
        }

        let start_time = check_time(&mut errors, "startTime", self.start_time.as_deref());
        let end_time = check_time(&mut errors, "endTime", self.end_time.as_deref());
        let merged_start = start_time.unwrap_or(current.start_time);
        let merged_end = end_time.unwrap_or(current.end_time);
        if merged_end < merged_start && !(errors.has_field("startTime") || errors.has_field("endTime")) {
            errors.add("endTime", "End time must not be before start time");
        }

        let capacity = check_capacity(&mut errors, self.capacity);
        if let Some(c) = capacity {
            let attending = current.attendees.len();
            if c > 0 && (c as usize) < attending {
                errors.add("capacity", capacity_below_attendees_message(attending));
            }
        }

        errors.finish(|| EventPatch {
            title,
            description: self.description,
            location: self.location,
            start_time,
            end_time,
            capacity,
            is_public: self.is_public,
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RsvpPayload {
    pub status: Option<String>,
    pub note: Option<String>,
}

/// Accepted RSVP input
#[derive(Clone, Debug, PartialEq)]
pub struct RsvpChange {
    pub status: RsvpStatus,
    pub note: Option<String>,
}

impl RsvpPayload {
    pub fn validate(self) -> Result<RsvpChange, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let status = match self.status.as_deref().map(str::parse::<RsvpStatus>) {
            Some(Ok(status)) => Some(status),
            _ => {
                errors.add("status", "Status must be one of yes, no, maybe");
                None
            }
        };
        if self.note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_LEN) {
            errors.add("note", format!("Note must be at most {} characters", MAX_NOTE_LEN));
        }

        match status {
            Some(status) if errors.is_empty() => Ok(RsvpChange {
                status,
                note: self.note,
            }),
            _ => Err(errors),
        }
    }
}
