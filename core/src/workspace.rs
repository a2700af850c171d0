use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::{
        Database,
        workspace_repo::{CreateWorkspaceParams, UpdateWorkspaceParams, WorkspaceRepositoryRef},
    },
    ids::{UserId, WorkspaceId},
    rbac::Role,
    workspace_member::WorkspaceMemberRecord,
};

pub const DEFAULT_WORKSPACE_NAME: &str = "My Workspace";

pub const INVITE_CODE_LENGTH: usize = 8;

/// Short shareable code members use to join a workspace.
pub fn generate_invite_code() -> String {
    (0..INVITE_CODE_LENGTH)
        .map(|_| fastrand::alphanumeric())
        .collect()
}

#[derive(Debug, Clone)]
pub struct WorkspaceRecord {
    pub id: WorkspaceId,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub invite_code: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct WorkspaceMemberWithUser {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub role: String,
    pub joined_at: i64,
    pub email: String,
    pub name: Option<String>,
    pub disabled: bool,
}

#[derive(Debug, Clone)]
pub struct UserWorkspaceMembership {
    pub workspace_id: WorkspaceId,
    pub workspace_name: String,
    pub workspace_description: Option<String>,
    pub workspace_owner_id: UserId,
    pub workspace_created_at: i64,
    pub workspace_updated_at: i64,
    pub role: String,
    pub joined_at: i64,
}

#[derive(Clone)]
pub struct WorkspaceStore {
    workspace_repo: WorkspaceRepositoryRef,
}

impl WorkspaceStore {
    pub fn new(database: &Database) -> Self {
        Self {
            workspace_repo: database.repositories().workspace_repo(),
        }
    }

    /// Creates the workspace together with its OWNER membership row.
    pub async fn create(
        &self,
        owner_id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<WorkspaceRecord> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().timestamp();
        let invite_code = generate_invite_code();
        let resolved_name = name
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| DEFAULT_WORKSPACE_NAME.to_string());
        let description = description
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);

        self.workspace_repo
            .create_workspace(CreateWorkspaceParams {
                id,
                owner_id: owner_id.to_owned(),
                name: resolved_name,
                description,
                invite_code,
                created_at,
            })
            .await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<WorkspaceRecord>> {
        self.workspace_repo.fetch_workspace(id).await
    }

    pub async fn find_by_invite_code(&self, invite_code: &str) -> Result<Option<WorkspaceRecord>> {
        self.workspace_repo
            .fetch_workspace_by_invite_code(invite_code)
            .await
    }

    pub async fn update(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<Option<&str>>,
    ) -> Result<Option<WorkspaceRecord>> {
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

        let has_updates = normalized_name.is_some() || normalized_description.is_some();

        if !has_updates {
            return self.find_by_id(id).await;
        }

        let updated = self
            .workspace_repo
            .update_workspace(UpdateWorkspaceParams {
                id: id.to_owned(),
                name: normalized_name,
                description: normalized_description,
                updated_at: Utc::now().timestamp(),
            })
            .await?;

        if !updated {
            return Ok(None);
        }

        self.find_by_id(id).await
    }

    /// Removes the workspace and everything under it; membership rows,
    /// projects, and tasks go with it.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.workspace_repo.delete_workspace(id).await
    }

    /// Replaces the invite code, retiring any previously shared one.
    pub async fn reset_invite_code(&self, id: &str) -> Result<Option<String>> {
        let invite_code = generate_invite_code();
        let updated = self
            .workspace_repo
            .set_invite_code(id, &invite_code, Utc::now().timestamp())
            .await?;

        if updated {
            Ok(Some(invite_code))
        } else {
            Ok(None)
        }
    }

    pub async fn list_memberships_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserWorkspaceMembership>> {
        self.workspace_repo.list_memberships_for_user(user_id).await
    }

    pub async fn list_members_with_users(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<WorkspaceMemberWithUser>> {
        self.workspace_repo
            .list_members_with_users(workspace_id)
            .await
    }

    pub async fn find_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkspaceMemberRecord>> {
        self.workspace_repo.get_member(workspace_id, user_id).await
    }

    pub async fn add_member(&self, workspace_id: &str, user_id: &str, role: Role) -> Result<()> {
        self.workspace_repo
            .insert_member(workspace_id, user_id, role.as_str(), Utc::now().timestamp())
            .await
    }

    pub async fn set_member_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<bool> {
        self.workspace_repo
            .set_member_role(workspace_id, user_id, role.as_str())
            .await
    }

    pub async fn remove_member(&self, workspace_id: &str, user_id: &str) -> Result<bool> {
        self.workspace_repo
            .delete_member(workspace_id, user_id)
            .await
    }

    /// Rewrites stored role tokens to their canonical uppercase form.
    /// Runs once at startup so lookups can compare exactly.
    pub async fn normalize_member_roles(&self) -> Result<u64> {
        self.workspace_repo.normalize_member_roles().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::path::PathBuf;
    use uuid::Uuid;

    async fn setup_database() -> anyhow::Result<(Database, PathBuf)> {
        let mut config = AppConfig::default();
        let db_path =
            std::env::temp_dir().join(format!("crewspace-workspace-tests-{}.db", Uuid::new_v4()));
        config.database_path = db_path.to_string_lossy().to_string();

        let database = Database::connect(&config).await?;
        Ok((database, db_path))
    }

    async fn seed_user(database: &Database, email: &str) -> anyhow::Result<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(email)
            .bind("hash")
            .bind(1_000_i64)
            .execute(database.pool())
            .await?;
        Ok(id)
    }

    fn cleanup(db_path: &PathBuf) -> anyhow::Result<()> {
        if let Err(err) = std::fs::remove_file(db_path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                return Err(err.into());
            }
        }

        for suffix in ["db-wal", "db-shm"] {
            let sidecar = db_path.with_extension(suffix);
            let _ = std::fs::remove_file(sidecar);
        }

        Ok(())
    }

    #[tokio::test]
    async fn create_records_the_owner_membership() -> anyhow::Result<()> {
        let (database, db_path) = setup_database().await?;
        let store = WorkspaceStore::new(&database);
        let owner_id = seed_user(&database, "owner@example.com").await?;

        let workspace = store
            .create(&owner_id, Some("  Design Crew  "), None)
            .await?;
        assert_eq!(workspace.name, "Design Crew");
        assert_eq!(workspace.invite_code.len(), INVITE_CODE_LENGTH);

        let member = store
            .find_member(workspace.id.as_str(), &owner_id)
            .await?
            .expect("owner membership row");
        assert_eq!(member.role, Role::Owner.as_str());

        let fallback = store.create(&owner_id, Some("   "), None).await?;
        assert_eq!(fallback.name, DEFAULT_WORKSPACE_NAME);

        drop(store);
        drop(database);
        cleanup(&db_path)
    }

    #[tokio::test]
    async fn delete_cascades_to_membership_rows() -> anyhow::Result<()> {
        let (database, db_path) = setup_database().await?;
        let store = WorkspaceStore::new(&database);
        let owner_id = seed_user(&database, "owner@example.com").await?;
        let member_id = seed_user(&database, "member@example.com").await?;

        let workspace = store.create(&owner_id, Some("Shared"), None).await?;
        store
            .add_member(workspace.id.as_str(), &member_id, Role::Member)
            .await?;

        assert!(store.delete(workspace.id.as_str()).await?);
        assert!(store.find_by_id(workspace.id.as_str()).await?.is_none());
        assert!(store
            .find_member(workspace.id.as_str(), &member_id)
            .await?
            .is_none());
        assert!(store
            .find_member(workspace.id.as_str(), &owner_id)
            .await?
            .is_none());

        drop(store);
        drop(database);
        cleanup(&db_path)
    }

    #[tokio::test]
    async fn reset_invite_code_rotates_the_code() -> anyhow::Result<()> {
        let (database, db_path) = setup_database().await?;
        let store = WorkspaceStore::new(&database);
        let owner_id = seed_user(&database, "owner@example.com").await?;

        let workspace = store.create(&owner_id, Some("Rotating"), None).await?;
        let fresh = store
            .reset_invite_code(workspace.id.as_str())
            .await?
            .expect("workspace exists");
        assert_ne!(fresh, workspace.invite_code);

        let by_old = store.find_by_invite_code(&workspace.invite_code).await?;
        assert!(by_old.is_none());

        let by_new = store.find_by_invite_code(&fresh).await?.unwrap();
        assert_eq!(by_new.id, workspace.id);

        assert!(store.reset_invite_code("missing").await?.is_none());

        drop(store);
        drop(database);
        cleanup(&db_path)
    }

    #[tokio::test]
    async fn normalize_member_roles_uppercases_legacy_tokens() -> anyhow::Result<()> {
        let (database, db_path) = setup_database().await?;
        let store = WorkspaceStore::new(&database);
        let owner_id = seed_user(&database, "owner@example.com").await?;
        let member_id = seed_user(&database, "member@example.com").await?;

        let workspace = store.create(&owner_id, Some("Legacy"), None).await?;
        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, user_id, role, joined_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(workspace.id.as_str())
        .bind(&member_id)
        .bind(" admin ")
        .bind(2_000_i64)
        .execute(database.pool())
        .await?;

        let rewritten = store.normalize_member_roles().await?;
        assert_eq!(rewritten, 1);

        let member = store
            .find_member(workspace.id.as_str(), &member_id)
            .await?
            .unwrap();
        assert_eq!(member.role, "ADMIN");

        let untouched = store.normalize_member_roles().await?;
        assert_eq!(untouched, 0);

        drop(store);
        drop(database);
        cleanup(&db_path)
    }
}
