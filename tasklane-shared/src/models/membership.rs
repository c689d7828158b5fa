/// List membership model and database operations
///
/// A membership ties a user to a task list with a role. Every list has exactly
/// one `owner` membership, inserted in the same transaction that creates the
/// list; everyone who joins by invite code becomes a `member`.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE list_role AS ENUM ('owner', 'member');
///
/// CREATE TABLE list_members (
///     list_id UUID NOT NULL REFERENCES task_lists(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role list_role NOT NULL DEFAULT 'member',
///     joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (list_id, user_id)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use tasklane_shared::models::membership::{Membership, ListRole};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, list_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
/// let mut conn = pool.acquire().await?;
/// Membership::create(&mut conn, list_id, user_id, ListRole::Member).await?;
///
/// assert!(Membership::is_member(&pool, list_id, user_id).await?);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Roles a user can hold in a task list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "list_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ListRole {
    /// Created the list; the only role allowed to delete it
    Owner,

    /// Joined by invite code
    Member,
}

impl ListRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            ListRole::Owner => "owner",
            ListRole::Member => "member",
        }
    }

    /// Can delete the list and everything in it
    pub fn can_delete_list(&self) -> bool {
        matches!(self, ListRole::Owner)
    }
}

/// Membership row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    /// Task list ID
    pub list_id: Uuid,

    /// User ID
    pub user_id: Uuid,

    /// Role within the list
    pub role: ListRole,

    /// When the user joined
    pub joined_at: DateTime<Utc>,
}

/// Member entry as shown by `GET /task-lists/{id}/members`
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberDetail {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: ListRole,
    pub joined_at: DateTime<Utc>,
}

impl Membership {
    /// Inserts a membership row
    ///
    /// Takes a connection so list creation can insert the owner row inside its
    /// own transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The user is already a member (primary key violation `23505`)
    /// - The list or user doesn't exist (foreign key violation `23503`)
    pub async fn create(
        conn: &mut PgConnection,
        list_id: Uuid,
        user_id: Uuid,
        role: ListRole,
    ) -> Result<Self, sqlx::Error> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO list_members (list_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING list_id, user_id, role, joined_at
            "#,
        )
        .bind(list_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(conn)
        .await?;

        Ok(membership)
    }

    /// Membership predicate used by the authorization gate
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use tasklane_shared::models::membership::Membership;
    /// # use sqlx::PgPool;
    /// # use uuid::Uuid;
    /// # async fn example(pool: PgPool, list_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
    /// if Membership::is_member(&pool, list_id, user_id).await? {
    ///     println!("User can see this list");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn is_member(pool: &PgPool, list_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM list_members
                WHERE list_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(list_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Gets a user's role in a list
    ///
    /// # Returns
    ///
    /// The role if the user is a member, None otherwise
    pub async fn get_role(
        pool: &PgPool,
        list_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ListRole>, sqlx::Error> {
        let role = sqlx::query_scalar::<_, ListRole>(
            "SELECT role FROM list_members WHERE list_id = $1 AND user_id = $2",
        )
        .bind(list_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(role)
    }

    /// Lists the members of a list with their names and emails, owner first
    pub async fn list_members(pool: &PgPool, list_id: Uuid) -> Result<Vec<MemberDetail>, sqlx::Error> {
        let members = sqlx::query_as::<_, MemberDetail>(
            r#"
            SELECT lm.user_id, u.name, u.email, lm.role, lm.joined_at
            FROM list_members lm
            JOIN users u ON u.id = lm.user_id
            WHERE lm.list_id = $1
            ORDER BY lm.role ASC, lm.joined_at ASC
            "#,
        )
        .bind(list_id)
        .fetch_all(pool)
        .await?;

        Ok(members)
    }

    /// Removes a user from a list
    pub async fn delete(pool: &PgPool, list_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM list_members WHERE list_id = $1 AND user_id = $2")
            .bind(list_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
