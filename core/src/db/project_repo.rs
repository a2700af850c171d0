use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::project::ProjectRecord;

#[derive(Debug, Clone)]
pub struct CreateProjectParams {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub description: Option<String>,
    pub emoji: String,
    pub created_by: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct UpdateProjectParams {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub emoji: Option<String>,
    pub updated_at: i64,
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create_project(&self, params: CreateProjectParams) -> Result<ProjectRecord>;

    async fn fetch_project(&self, id: &str) -> Result<Option<ProjectRecord>>;

    async fn list_projects(
        &self,
        workspace_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ProjectRecord>>;

    async fn count_projects(&self, workspace_id: &str) -> Result<i64>;

    async fn update_project(&self, params: UpdateProjectParams) -> Result<bool>;

    /// Deletes the project; its tasks go with it.
    async fn delete_project(&self, id: &str) -> Result<bool>;
}

pub type ProjectRepositoryRef = Arc<dyn ProjectRepository>;
