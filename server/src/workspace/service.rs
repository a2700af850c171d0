use crewspace_core::{
    rbac::Role,
    user::UserStore,
    workspace::{WorkspaceRecord, WorkspaceStore},
};

use crate::AppError;

pub struct WorkspaceService {
    workspace_store: WorkspaceStore,
    user_store: UserStore,
}

impl WorkspaceService {
    pub fn new(workspace_store: WorkspaceStore, user_store: UserStore) -> Self {
        Self {
            workspace_store,
            user_store,
        }
    }

    pub async fn fetch_workspace(&self, workspace_id: &str) -> Result<WorkspaceRecord, AppError> {
        self.workspace_store
            .find_by_id(workspace_id)
            .await
            .map_err(AppError::from_anyhow)?
            .ok_or_else(|| AppError::workspace_not_found(workspace_id))
    }

    /// Creates a workspace with the caller as owner and makes it their
    /// current one.
    pub async fn create_workspace_with_defaults(
        &self,
        owner_id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<WorkspaceRecord, AppError> {
        let owner_exists = self
            .user_store
            .find_by_id(owner_id)
            .await
            .map_err(AppError::from_anyhow)?
            .is_some();

        if !owner_exists {
            return Err(AppError::bad_request("owner not found"));
        }

        let workspace = self
            .workspace_store
            .create(owner_id, name, description)
            .await
            .map_err(AppError::from_anyhow)?;

        self.user_store
            .set_current_workspace(owner_id, Some(workspace.id.as_str()))
            .await
            .map_err(AppError::from_anyhow)?;

        Ok(workspace)
    }

    /// Redeems an invite code. Joining a workspace the caller already
    /// belongs to reports the existing membership as a conflict.
    pub async fn join_by_invite_code(
        &self,
        user_id: &str,
        invite_code: &str,
    ) -> Result<WorkspaceRecord, AppError> {
        let Some(workspace) = self
            .workspace_store
            .find_by_invite_code(invite_code)
            .await
            .map_err(AppError::from_anyhow)?
        else {
            return Err(AppError::not_found("invalid invite code"));
        };

        let existing = self
            .workspace_store
            .find_member(workspace.id.as_str(), user_id)
            .await
            .map_err(AppError::from_anyhow)?;

        if existing.is_some() {
            return Err(AppError::conflict("already a member of this workspace"));
        }

        self.workspace_store
            .add_member(workspace.id.as_str(), user_id, Role::Member)
            .await
            .map_err(AppError::from_anyhow)?;

        self.user_store
            .set_current_workspace(user_id, Some(workspace.id.as_str()))
            .await
            .map_err(AppError::from_anyhow)?;

        Ok(workspace)
    }
}
