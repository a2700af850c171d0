use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::task::{TaskRecord, TaskStats};

#[derive(Debug, Clone)]
pub struct CreateTaskParams {
    pub id: String,
    pub task_code: String,
    pub workspace_id: String,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub assigned_to: Option<String>,
    pub created_by: String,
    pub due_date: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct UpdateTaskParams {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<Option<String>>,
    pub project_id: Option<String>,
    pub due_date: Option<Option<i64>>,
    pub updated_at: i64,
}

/// Listing filter. Empty vectors mean "no constraint on that column".
#[derive(Debug, Clone, Default)]
pub struct TaskListFilter {
    pub project_id: Option<String>,
    pub statuses: Vec<String>,
    pub priorities: Vec<String>,
    pub assignees: Vec<String>,
    pub keyword: Option<String>,
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create_task(&self, params: CreateTaskParams) -> Result<TaskRecord>;

    async fn fetch_task(&self, id: &str) -> Result<Option<TaskRecord>>;

    async fn list_tasks(
        &self,
        workspace_id: &str,
        filter: &TaskListFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<TaskRecord>>;

    async fn count_tasks(&self, workspace_id: &str, filter: &TaskListFilter) -> Result<i64>;

    async fn update_task(&self, params: UpdateTaskParams) -> Result<bool>;

    async fn delete_task(&self, id: &str) -> Result<bool>;

    async fn workspace_task_stats(&self, workspace_id: &str, now: i64) -> Result<TaskStats>;

    async fn project_task_stats(&self, project_id: &str, now: i64) -> Result<TaskStats>;
}

pub type TaskRepositoryRef = Arc<dyn TaskRepository>;
