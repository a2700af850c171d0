use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::project_repo::{CreateProjectParams, ProjectRepository, UpdateProjectParams},
    ids::{ProjectId, UserId, WorkspaceId},
    project::ProjectRecord,
};

pub struct SqliteProjectRepository {
    pool: Pool<Sqlite>,
}

impl SqliteProjectRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_project_row(row: SqliteRow) -> ProjectRecord {
        ProjectRecord {
            id: ProjectId::from(row.get::<String, _>("id")),
            workspace_id: WorkspaceId::from(row.get::<String, _>("workspace_id")),
            name: row.get("name"),
            description: row.get("description"),
            emoji: row.get("emoji"),
            created_by: UserId::from(row.get::<String, _>("created_by")),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn create_project(&self, params: CreateProjectParams) -> Result<ProjectRecord> {
        let CreateProjectParams {
            id,
            workspace_id,
            name,
            description,
            emoji,
            created_by,
            created_at,
        } = params;

        sqlx::query(
            "INSERT INTO projects (
                 id,
                 workspace_id,
                 name,
                 description,
                 emoji,
                 created_by,
                 created_at,
                 updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&workspace_id)
        .bind(&name)
        .bind(description.as_ref())
        .bind(&emoji)
        .bind(&created_by)
        .bind(created_at)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(ProjectRecord {
            id: ProjectId::from(id),
            workspace_id: WorkspaceId::from(workspace_id),
            name,
            description,
            emoji,
            created_by: UserId::from(created_by),
            created_at,
            updated_at: created_at,
        })
    }

    async fn fetch_project(&self, id: &str) -> Result<Option<ProjectRecord>> {
        let row = sqlx::query(
            "SELECT id, workspace_id, name, description, emoji, created_by, created_at, updated_at
             FROM projects
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::map_project_row))
    }

    async fn list_projects(
        &self,
        workspace_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ProjectRecord>> {
        let rows = sqlx::query(
            "SELECT id, workspace_id, name, description, emoji, created_by, created_at, updated_at
             FROM projects
             WHERE workspace_id = ?
             ORDER BY created_at ASC, id ASC
             LIMIT ? OFFSET ?",
        )
        .bind(workspace_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::map_project_row).collect())
    }

    async fn count_projects(&self, workspace_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE workspace_id = ?")
            .bind(workspace_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn update_project(&self, params: UpdateProjectParams) -> Result<bool> {
        let UpdateProjectParams {
            id,
            name,
            description,
            emoji,
            updated_at,
        } = params;

        let mut builder = QueryBuilder::new("UPDATE projects SET ");
        let mut has_updates = false;

        if let Some(name) = name {
            builder.push("name = ");
            builder.push_bind(name);
            has_updates = true;
        }
        if let Some(description) = description {
            if has_updates {
                builder.push(", ");
            }
            builder.push("description = ");
            builder.push_bind(description);
            has_updates = true;
        }
        if let Some(emoji) = emoji {
            if has_updates {
                builder.push(", ");
            }
            builder.push("emoji = ");
            builder.push_bind(emoji);
            has_updates = true;
        }

        if !has_updates {
            return Ok(false);
        }

        builder.push(", updated_at = ");
        builder.push_bind(updated_at);
        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_project(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
