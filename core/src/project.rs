use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::{
        Database,
        project_repo::{CreateProjectParams, ProjectRepositoryRef, UpdateProjectParams},
    },
    ids::{ProjectId, UserId, WorkspaceId},
};

pub const DEFAULT_PROJECT_EMOJI: &str = "📊";

#[derive(Debug, Clone)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub workspace_id: WorkspaceId,
    pub name: String,
    pub description: Option<String>,
    pub emoji: String,
    pub created_by: UserId,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Clone)]
pub struct ProjectStore {
    project_repo: ProjectRepositoryRef,
}

impl ProjectStore {
    pub fn new(database: &Database) -> Self {
        Self {
            project_repo: database.repositories().project_repo(),
        }
    }

    /// Missing or blank emoji falls back to [`DEFAULT_PROJECT_EMOJI`] so the
    /// stored column is always populated.
    pub async fn create(
        &self,
        workspace_id: &str,
        created_by: &str,
        name: &str,
        description: Option<&str>,
        emoji: Option<&str>,
    ) -> Result<ProjectRecord> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().timestamp();
        let resolved_emoji = emoji
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_PROJECT_EMOJI)
            .to_owned();
        let description = description
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);

        self.project_repo
            .create_project(CreateProjectParams {
                id,
                workspace_id: workspace_id.to_owned(),
                name: name.trim().to_owned(),
                description,
                emoji: resolved_emoji,
                created_by: created_by.to_owned(),
                created_at,
            })
            .await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<ProjectRecord>> {
        self.project_repo.fetch_project(id).await
    }

    pub async fn list(
        &self,
        workspace_id: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ProjectRecord>> {
        self.project_repo
            .list_projects(workspace_id, offset, limit)
            .await
    }

    pub async fn count(&self, workspace_id: &str) -> Result<i64> {
        self.project_repo.count_projects(workspace_id).await
    }

    pub async fn update(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<Option<&str>>,
        emoji: Option<&str>,
    ) -> Result<Option<ProjectRecord>> {
        let normalized_name = name
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| value.to_owned());
        let normalized_description = description.map(|value| {
            value
                .map(str::trim)
                .filter(|inner| !inner.is_empty())
                .map(ToOwned::to_owned)
        });
        let normalized_emoji = emoji
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| value.to_owned());

        let has_updates = normalized_name.is_some()
            || normalized_description.is_some()
            || normalized_emoji.is_some();

        if !has_updates {
            return self.find_by_id(id).await;
        }

        let updated = self
            .project_repo
            .update_project(UpdateProjectParams {
                id: id.to_owned(),
                name: normalized_name,
                description: normalized_description,
                emoji: normalized_emoji,
                updated_at: Utc::now().timestamp(),
            })
            .await?;

        if !updated {
            return Ok(None);
        }

        self.find_by_id(id).await
    }

    /// Deletes the project; its tasks go with it.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.project_repo.delete_project(id).await
    }
}
