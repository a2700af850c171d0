use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::task_repo::{CreateTaskParams, TaskListFilter, TaskRepository, UpdateTaskParams},
    ids::{ProjectId, TaskId, UserId, WorkspaceId},
    task::{TaskRecord, TaskStats},
};

const TASK_COLUMNS: &str = "id, task_code, workspace_id, project_id, title, description, status, \
                            priority, assigned_to, created_by, due_date, created_at, updated_at";

pub struct SqliteTaskRepository {
    pool: Pool<Sqlite>,
}

impl SqliteTaskRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_task_row(row: SqliteRow) -> TaskRecord {
        TaskRecord {
            id: TaskId::from(row.get::<String, _>("id")),
            task_code: row.get("task_code"),
            workspace_id: WorkspaceId::from(row.get::<String, _>("workspace_id")),
            project_id: ProjectId::from(row.get::<String, _>("project_id")),
            title: row.get("title"),
            description: row.get("description"),
            status: row.get("status"),
            priority: row.get("priority"),
            assigned_to: row
                .get::<Option<String>, _>("assigned_to")
                .map(UserId::from),
            created_by: UserId::from(row.get::<String, _>("created_by")),
            due_date: row.get("due_date"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, workspace_id: &str, filter: &TaskListFilter) {
        builder.push(" WHERE workspace_id = ");
        builder.push_bind(workspace_id.to_owned());

        if let Some(project_id) = &filter.project_id {
            builder.push(" AND project_id = ");
            builder.push_bind(project_id.clone());
        }

        if !filter.statuses.is_empty() {
            builder.push(" AND status IN (");
            {
                let mut separated = builder.separated(", ");
                for status in &filter.statuses {
                    separated.push_bind(status.clone());
                }
            }
            builder.push(")");
        }

        if !filter.priorities.is_empty() {
            builder.push(" AND priority IN (");
            {
                let mut separated = builder.separated(", ");
                for priority in &filter.priorities {
                    separated.push_bind(priority.clone());
                }
            }
            builder.push(")");
        }

        if !filter.assignees.is_empty() {
            builder.push(" AND assigned_to IN (");
            {
                let mut separated = builder.separated(", ");
                for assignee in &filter.assignees {
                    separated.push_bind(assignee.clone());
                }
            }
            builder.push(")");
        }

        if let Some(keyword) = &filter.keyword {
            let pattern = format!("%{}%", keyword.to_lowercase());
            builder.push(" AND (LOWER(title) LIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR LOWER(COALESCE(description, '')) LIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create_task(&self, params: CreateTaskParams) -> Result<TaskRecord> {
        let CreateTaskParams {
            id,
            task_code,
            workspace_id,
            project_id,
            title,
            description,
            status,
            priority,
            assigned_to,
            created_by,
            due_date,
            created_at,
        } = params;

        sqlx::query(
            "INSERT INTO tasks (
                 id,
                 task_code,
                 workspace_id,
                 project_id,
                 title,
                 description,
                 status,
                 priority,
                 assigned_to,
                 created_by,
                 due_date,
                 created_at,
                 updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&task_code)
        .bind(&workspace_id)
        .bind(&project_id)
        .bind(&title)
        .bind(description.as_ref())
        .bind(&status)
        .bind(&priority)
        .bind(assigned_to.as_ref())
        .bind(&created_by)
        .bind(due_date)
        .bind(created_at)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(TaskRecord {
            id: TaskId::from(id),
            task_code,
            workspace_id: WorkspaceId::from(workspace_id),
            project_id: ProjectId::from(project_id),
            title,
            description,
            status,
            priority,
            assigned_to: assigned_to.map(UserId::from),
            created_by: UserId::from(created_by),
            due_date,
            created_at,
            updated_at: created_at,
        })
    }

    async fn fetch_task(&self, id: &str) -> Result<Option<TaskRecord>> {
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Self::map_task_row))
    }

    async fn list_tasks(
        &self,
        workspace_id: &str,
        filter: &TaskListFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<TaskRecord>> {
        let mut builder = QueryBuilder::new(format!("SELECT {TASK_COLUMNS} FROM tasks"));
        Self::push_filter(&mut builder, workspace_id, filter);
        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Self::map_task_row).collect())
    }

    async fn count_tasks(&self, workspace_id: &str, filter: &TaskListFilter) -> Result<i64> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) AS count FROM tasks");
        Self::push_filter(&mut builder, workspace_id, filter);

        let row = builder.build().fetch_one(&self.pool).await?;
        Ok(row.get("count"))
    }

    async fn update_task(&self, params: UpdateTaskParams) -> Result<bool> {
        let UpdateTaskParams {
            id,
            title,
            description,
            status,
            priority,
            assigned_to,
            project_id,
            due_date,
            updated_at,
        } = params;

        let mut builder = QueryBuilder::new("UPDATE tasks SET ");
        let mut has_updates = false;

        if let Some(title) = title {
            builder.push("title = ");
            builder.push_bind(title);
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
        if let Some(status) = status {
            if has_updates {
                builder.push(", ");
            }
            builder.push("status = ");
            builder.push_bind(status);
            has_updates = true;
        }
        if let Some(priority) = priority {
            if has_updates {
                builder.push(", ");
            }
            builder.push("priority = ");
            builder.push_bind(priority);
            has_updates = true;
        }
        if let Some(assigned_to) = assigned_to {
            if has_updates {
                builder.push(", ");
            }
            builder.push("assigned_to = ");
            builder.push_bind(assigned_to);
            has_updates = true;
        }
        if let Some(project_id) = project_id {
            if has_updates {
                builder.push(", ");
            }
            builder.push("project_id = ");
            builder.push_bind(project_id);
            has_updates = true;
        }
        if let Some(due_date) = due_date {
            if has_updates {
                builder.push(", ");
            }
            builder.push("due_date = ");
            builder.push_bind(due_date);
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

    async fn delete_task(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn workspace_task_stats(&self, workspace_id: &str, now: i64) -> Result<TaskStats> {
        let row = sqlx::query(
            "SELECT
                 COUNT(*) AS total,
                 SUM(CASE WHEN due_date IS NOT NULL AND due_date < ? AND status <> 'DONE'
                     THEN 1 ELSE 0 END) AS overdue,
                 SUM(CASE WHEN status = 'DONE' THEN 1 ELSE 0 END) AS completed
             FROM tasks
             WHERE workspace_id = ?",
        )
        .bind(now)
        .bind(workspace_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(TaskStats {
            total: row.get("total"),
            overdue: row.get::<Option<i64>, _>("overdue").unwrap_or(0),
            completed: row.get::<Option<i64>, _>("completed").unwrap_or(0),
        })
    }

    async fn project_task_stats(&self, project_id: &str, now: i64) -> Result<TaskStats> {
        let row = sqlx::query(
            "SELECT
                 COUNT(*) AS total,
                 SUM(CASE WHEN due_date IS NOT NULL AND due_date < ? AND status <> 'DONE'
                     THEN 1 ELSE 0 END) AS overdue,
                 SUM(CASE WHEN status = 'DONE' THEN 1 ELSE 0 END) AS completed
             FROM tasks
             WHERE project_id = ?",
        )
        .bind(now)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(TaskStats {
            total: row.get("total"),
            overdue: row.get::<Option<i64>, _>("overdue").unwrap_or(0),
            completed: row.get::<Option<i64>, _>("completed").unwrap_or(0),
        })
    }
}
