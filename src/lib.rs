// SQLite connection and schema shared by the stores
pub mod db;

// Runtime configuration (TOML file + env overrides)
pub mod config;

// Bearer tokens and login sessions
pub mod auth;

// User directory and password hashing
pub mod user;

// Event records and attendee lists
pub mod event;

// Per-user RSVP records
pub mod rsvp;

// RSVP status vs. attendee list reconciliation
pub mod attendance;

// Request payload validation
pub mod validation;

// HTTP API
pub mod api;
