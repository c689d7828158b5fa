/// Authorization gate
///
/// Every list-scoped request passes through one of these checks before it
/// reads or writes a row:
///
/// 1. **Membership**: the caller is in `list_members` for the list
/// 2. **Ownership**: for destructive list operations, the caller owns the list
/// 3. **Self**: for routes carrying a `{userId}` path segment, it is the caller
///
/// Task-addressed routes resolve the task's list first
/// ([`require_task_membership`]), so an unknown task is a 404 while a known
/// task in someone else's list is a 403.
///
/// # Example
///
/// ```no_run
/// use tasklane_shared::auth::authorization::{require_membership, require_self};
/// use tasklane_shared::auth::middleware::AuthContext;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, auth: AuthContext, list_id: Uuid, path_user: Uuid)
/// #     -> Result<(), Box<dyn std::error::Error>> {
/// require_self(&auth, path_user)?;
/// require_membership(&pool, list_id, auth.user_id).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::{membership::Membership, task::Task};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Not a member of list {0}")]
    NotMember(Uuid),

    #[error("Only the list owner can do this")]
    NotOwner(Uuid),

    /// A `{userId}` path parameter named someone other than the caller
    #[error("Access denied to another user's resources")]
    UserMismatch { caller: Uuid, requested: Uuid },

    #[error("Task list not found")]
    ListNotFound,

    #[error("Task not found")]
    TaskNotFound,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Checks that `user_id` is a member of `list_id`
///
/// # Errors
///
/// `AuthzError::NotMember` if not (including when the list doesn't exist)
pub async fn require_membership(pool: &PgPool, list_id: Uuid, user_id: Uuid) -> Result<(), AuthzError> {
    if Membership::is_member(pool, list_id, user_id).await? {
        Ok(())
    } else {
        Err(AuthzError::NotMember(list_id))
    }
}

/// Checks that `user_id` owns `list_id`
///
/// # Errors
///
/// - `AuthzError::ListNotFound` if the list doesn't exist
/// - `AuthzError::NotOwner` if someone else owns it
pub async fn require_owner(pool: &PgPool, list_id: Uuid, user_id: Uuid) -> Result<(), AuthzError> {
    let owner_id: Option<Uuid> = sqlx::query_scalar("SELECT owner_id FROM task_lists WHERE id = $1")
        .bind(list_id)
        .fetch_optional(pool)
        .await?;

    match owner_id {
        None => Err(AuthzError::ListNotFound),
        Some(owner) if owner == user_id => Ok(()),
        Some(_) => Err(AuthzError::NotOwner(list_id)),
    }
}

/// Checks that a `{userId}` path parameter is the caller
pub fn require_self(auth: &AuthContext, requested: Uuid) -> Result<(), AuthzError> {
    if auth.user_id == requested {
        Ok(())
    } else {
        Err(AuthzError::UserMismatch {
            caller: auth.user_id,
            requested,
        })
    }
}

/// Resolves a task's list and checks membership in it
///
/// # Returns
///
/// The task's `list_id`
///
/// # Errors
///
/// - `AuthzError::TaskNotFound` if the task doesn't exist
/// - `AuthzError::NotMember` if the caller is not in the task's list
pub async fn require_task_membership(pool: &PgPool, task_id: Uuid, user_id: Uuid) -> Result<Uuid, AuthzError> {
    let list_id = Task::list_id_of(pool, task_id)
        .await?
        .ok_or(AuthzError::TaskNotFound)?;

    require_membership(pool, list_id, user_id).await?;
    Ok(list_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_self() {
        let me = Uuid::new_v4();
        let auth = AuthContext::new(me);

        assert!(require_self(&auth, me).is_ok());

        let other = Uuid::new_v4();
        match require_self(&auth, other) {
            Err(AuthzError::UserMismatch { caller, requested }) => {
                assert_eq!(caller, me);
                assert_eq!(requested, other);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_authz_error_display() {
        let list = Uuid::nil();
        assert_eq!(
            AuthzError::NotMember(list).to_string(),
            format!("Not a member of list {}", list)
        );
        assert_eq!(AuthzError::TaskNotFound.to_string(), "Task not found");
    }
}
