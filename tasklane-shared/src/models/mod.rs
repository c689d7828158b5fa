/// Database models for Tasklane
///
/// Each model owns the SQL for its table(s). Functions take a `&PgPool`, or a
/// `&mut PgConnection` when they must run inside a caller's transaction.
///
/// # Models
///
/// - `user`: User accounts and refresh-token state
/// - `task_list`: Shared lists with invite codes
/// - `membership`: User-list relationships with roles
/// - `label`: Projects and requesters
/// - `task`: Tasks and whitelisted partial updates
/// - `queue`: Per-user, per-list dense work queues
/// - `notification`: Persisted in-app notifications
/// - `reminder`: Due-date reminders and their offset arithmetic

pub mod label;
pub mod membership;
pub mod notification;
pub mod queue;
pub mod reminder;
pub mod task;
pub mod task_list;
pub mod user;
