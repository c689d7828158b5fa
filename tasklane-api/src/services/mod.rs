/// Post-commit side effects shared by several handlers
///
/// - `tasks`: notifications, reminder upkeep and broadcasts after task writes
/// - `reminders`: scheduler bookkeeping for reminder rows

pub mod reminders;
pub mod tasks;
