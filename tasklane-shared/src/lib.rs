//! # Tasklane Shared Library
//!
//! Types, persistence and business rules shared by the Tasklane API server and
//! the reminder worker.
//!
//! ## Module Organization
//!
//! - `db`: Connection pool and migration runner
//! - `models`: Database models (users, lists, tasks, queue, reminders, notifications)
//! - `auth`: Password hashing, JWT issuance, the authorization gate and login lockout
//! - `events`: Real-time rooms and the event payloads emitted into them
//! - `notifications`: Persist-then-broadcast notification service
//! - `invite`: Invite code generation
//! - `logging`: Log sanitizing for user-influenced strings

pub mod auth;
pub mod db;
pub mod events;
pub mod invite;
pub mod logging;
pub mod models;
pub mod notifications;

/// Current version of the Tasklane shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
