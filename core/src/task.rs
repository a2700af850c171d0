use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::{
        Database,
        task_repo::{CreateTaskParams, TaskListFilter, TaskRepositoryRef, UpdateTaskParams},
    },
    ids::{ProjectId, TaskId, UserId, WorkspaceId},
};

pub const TASK_STATUSES: &[&str] = &["BACKLOG", "TODO", "IN_PROGRESS", "IN_REVIEW", "DONE"];

pub const TASK_PRIORITIES: &[&str] = &["LOW", "MEDIUM", "HIGH"];

pub const DEFAULT_TASK_STATUS: &str = "TODO";

pub const DEFAULT_TASK_PRIORITY: &str = "MEDIUM";

pub const TASK_CODE_SUFFIX_LENGTH: usize = 6;

/// Human-facing task reference, unique per workspace.
pub fn generate_task_code() -> String {
    let suffix: String = (0..TASK_CODE_SUFFIX_LENGTH)
        .map(|_| fastrand::alphanumeric())
        .collect();
    format!("task-{suffix}")
}

fn fold_token(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, ' ' | '-' | '_'))
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

/// Maps client spellings like "in progress" or "In-Review" onto the stored
/// status token. Returns `None` for anything outside the known set.
pub fn canonical_task_status(value: &str) -> Option<&'static str> {
    if value.trim().is_empty() {
        return None;
    }

    let folded = fold_token(value);
    TASK_STATUSES
        .iter()
        .find(|candidate| fold_token(candidate) == folded)
        .copied()
}

pub fn canonical_task_priority(value: &str) -> Option<&'static str> {
    if value.trim().is_empty() {
        return None;
    }

    let folded = fold_token(value);
    TASK_PRIORITIES
        .iter()
        .find(|candidate| fold_token(candidate) == folded)
        .copied()
}

#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: TaskId,
    pub task_code: String,
    pub workspace_id: WorkspaceId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub assigned_to: Option<UserId>,
    pub created_by: UserId,
    pub due_date: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub total: i64,
    pub overdue: i64,
    pub completed: i64,
}

#[derive(Clone)]
pub struct TaskStore {
    task_repo: TaskRepositoryRef,
}

impl TaskStore {
    pub fn new(database: &Database) -> Self {
        Self {
            task_repo: database.repositories().task_repo(),
        }
    }

    /// Status and priority default to [`DEFAULT_TASK_STATUS`] and
    /// [`DEFAULT_TASK_PRIORITY`]; callers pass canonical tokens only.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        workspace_id: &str,
        project_id: &str,
        created_by: &str,
        title: &str,
        description: Option<&str>,
        status: Option<&str>,
        priority: Option<&str>,
        assigned_to: Option<&str>,
        due_date: Option<i64>,
    ) -> Result<TaskRecord> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().timestamp();
        let description = description
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);

        self.task_repo
            .create_task(CreateTaskParams {
                id,
                task_code: generate_task_code(),
                workspace_id: workspace_id.to_owned(),
                project_id: project_id.to_owned(),
                title: title.trim().to_owned(),
                description,
                status: status.unwrap_or(DEFAULT_TASK_STATUS).to_owned(),
                priority: priority.unwrap_or(DEFAULT_TASK_PRIORITY).to_owned(),
                assigned_to: assigned_to.map(ToOwned::to_owned),
                created_by: created_by.to_owned(),
                due_date,
                created_at,
            })
            .await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<TaskRecord>> {
        self.task_repo.fetch_task(id).await
    }

    pub async fn list(
        &self,
        workspace_id: &str,
        filter: TaskListFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<TaskRecord>> {
        self.task_repo
            .list_tasks(workspace_id, &filter, offset, limit)
            .await
    }

    pub async fn count(&self, workspace_id: &str, filter: TaskListFilter) -> Result<i64> {
        self.task_repo.count_tasks(workspace_id, &filter).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        &self,
        id: &str,
        title: Option<&str>,
        description: Option<Option<&str>>,
        status: Option<&str>,
        priority: Option<&str>,
        assigned_to: Option<Option<&str>>,
        project_id: Option<&str>,
        due_date: Option<Option<i64>>,
    ) -> Result<Option<TaskRecord>> {
        let normalized_title = title
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| value.to_owned());
        let normalized_description = description.map(|value| {
            value
                .map(str::trim)
                .filter(|inner| !inner.is_empty())
                .map(ToOwned::to_owned)
        });

        let has_updates = normalized_title.is_some()
            || normalized_description.is_some()
            || status.is_some()
            || priority.is_some()
            || assigned_to.is_some()
            || project_id.is_some()
            || due_date.is_some();

        if !has_updates {
            return self.find_by_id(id).await;
        }

        let updated = self
            .task_repo
            .update_task(UpdateTaskParams {
                id: id.to_owned(),
                title: normalized_title,
                description: normalized_description,
                status: status.map(ToOwned::to_owned),
                priority: priority.map(ToOwned::to_owned),
                assigned_to: assigned_to.map(|value| value.map(ToOwned::to_owned)),
                project_id: project_id.map(ToOwned::to_owned),
                due_date,
                updated_at: Utc::now().timestamp(),
            })
            .await?;

        if !updated {
            return Ok(None);
        }

        self.find_by_id(id).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.task_repo.delete_task(id).await
    }

    /// Overdue means a due date in the past on a task that is not DONE.
    pub async fn workspace_stats(&self, workspace_id: &str) -> Result<TaskStats> {
        self.task_repo
            .workspace_task_stats(workspace_id, Utc::now().timestamp())
            .await
    }

    pub async fn project_stats(&self, project_id: &str) -> Result<TaskStats> {
        self.task_repo
            .project_task_stats(project_id, Utc::now().timestamp())
            .await
    }
}
