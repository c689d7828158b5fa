/// Projects and requesters
///
/// Both are named labels owned by a task list, with identical shape and rules:
/// names are unique per list, any member may create or delete them, and tasks
/// referencing a deleted label fall back to `NULL`. One model serves both
/// tables, selected by [`LabelKind`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Which label table to address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    Project,
    Requester,
}

impl LabelKind {
    pub fn table(&self) -> &'static str {
        match self {
            LabelKind::Project => "projects",
            LabelKind::Requester => "requesters",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LabelKind::Project => "project",
            LabelKind::Requester => "requester",
        }
    }
}

/// A project or requester row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Label {
    pub id: Uuid,
    pub list_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Label {
    /// Creates a label in a list
    ///
    /// # Errors
    ///
    /// Unique violation `23505` when the list already has a label of that
    /// kind with the same name.
    pub async fn create(
        pool: &PgPool,
        kind: LabelKind,
        list_id: Uuid,
        name: &str,
    ) -> Result<Self, sqlx::Error> {
        let label = sqlx::query_as::<_, Label>(&format!(
            r#"
            INSERT INTO {} (list_id, name)
            VALUES ($1, $2)
            RETURNING id, list_id, name, created_at
            "#,
            kind.table()
        ))
        .bind(list_id)
        .bind(name.trim())
        .fetch_one(pool)
        .await?;

        Ok(label)
    }

    pub async fn find_by_id(pool: &PgPool, kind: LabelKind, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let label = sqlx::query_as::<_, Label>(&format!(
            "SELECT id, list_id, name, created_at FROM {} WHERE id = $1",
            kind.table()
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(label)
    }

    /// Lists a list's labels of one kind, alphabetically
    pub async fn list_by_list(pool: &PgPool, kind: LabelKind, list_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let labels = sqlx::query_as::<_, Label>(&format!(
            "SELECT id, list_id, name, created_at FROM {} WHERE list_id = $1 ORDER BY name ASC",
            kind.table()
        ))
        .bind(list_id)
        .fetch_all(pool)
        .await?;

        Ok(labels)
    }

    /// Whether `id` names a label of this kind inside `list_id`
    pub async fn belongs_to_list(
        pool: &PgPool,
        kind: LabelKind,
        id: Uuid,
        list_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1 AND list_id = $2)",
            kind.table()
        ))
        .bind(id)
        .bind(list_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    pub async fn delete(pool: &PgPool, kind: LabelKind, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", kind.table()))
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
