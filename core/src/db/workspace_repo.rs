use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    workspace::{UserWorkspaceMembership, WorkspaceMemberWithUser, WorkspaceRecord},
    workspace_member::WorkspaceMemberRecord,
};

#[derive(Debug, Clone)]
pub struct CreateWorkspaceParams {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub invite_code: String,
    pub created_at: i64,
}

#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    /// Inserts the workspace together with its owner membership row.
    async fn create_workspace(&self, params: CreateWorkspaceParams) -> Result<WorkspaceRecord>;

    async fn fetch_workspace(&self, id: &str) -> Result<Option<WorkspaceRecord>>;

    async fn fetch_workspace_by_invite_code(
        &self,
        invite_code: &str,
    ) -> Result<Option<WorkspaceRecord>>;

    async fn update_workspace(&self, params: UpdateWorkspaceParams) -> Result<bool>;

    async fn set_invite_code(
        &self,
        workspace_id: &str,
        invite_code: &str,
        updated_at: i64,
    ) -> Result<bool>;

    /// Deletes the workspace and everything hanging off it. Members'
    /// `current_workspace_id` pointers at this workspace are cleared in the
    /// same transaction.
    async fn delete_workspace(&self, id: &str) -> Result<bool>;

    async fn list_memberships_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserWorkspaceMembership>>;

    async fn list_members_with_users(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<WorkspaceMemberWithUser>>;

    async fn get_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkspaceMemberRecord>>;

    async fn insert_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: &str,
        joined_at: i64,
    ) -> Result<()>;

    async fn set_member_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: &str,
    ) -> Result<bool>;

    async fn delete_member(&self, workspace_id: &str, user_id: &str) -> Result<bool>;

    /// Rewrites stored role tokens to their canonical uppercase form and
    /// returns the number of rows touched.
    async fn normalize_member_roles(&self) -> Result<u64>;
}

pub type WorkspaceRepositoryRef = Arc<dyn WorkspaceRepository>;

#[derive(Debug, Clone)]
pub struct UpdateWorkspaceParams {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub updated_at: i64,
}
