/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Register, login, refresh and logout
/// - `users`: Profile and password of the caller
/// - `task_lists`: Lists, invite codes and members
/// - `tasks`: Task CRUD
/// - `labels`: Projects and requesters
/// - `reminders`: Per-user reminders on tasks
/// - `queue`: Personal ordered queues
/// - `notifications`: Notification inbox
/// - `realtime`: WebSocket channel

pub mod auth;
pub mod health;
pub mod labels;
pub mod notifications;
pub mod queue;
pub mod realtime;
pub mod reminders;
pub mod task_lists;
pub mod tasks;
pub mod users;
