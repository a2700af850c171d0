use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, sqlite::SqliteRow};

use crate::{
    db::workspace_repo::{CreateWorkspaceParams, UpdateWorkspaceParams, WorkspaceRepository},
    ids::{UserId, WorkspaceId},
    rbac::Role,
    workspace::{UserWorkspaceMembership, WorkspaceMemberWithUser, WorkspaceRecord},
    workspace_member::WorkspaceMemberRecord,
};

pub struct SqliteWorkspaceRepository {
    pool: Pool<Sqlite>,
}

impl SqliteWorkspaceRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_workspace_row(row: SqliteRow) -> WorkspaceRecord {
        WorkspaceRecord {
            id: WorkspaceId::from(row.get::<String, _>("id")),
            name: row.get("name"),
            description: row.get("description"),
            owner_id: UserId::from(row.get::<String, _>("owner_id")),
            invite_code: row.get("invite_code"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn map_member_row(row: SqliteRow) -> WorkspaceMemberWithUser {
        WorkspaceMemberWithUser {
            workspace_id: WorkspaceId::from(row.get::<String, _>("workspace_id")),
            user_id: UserId::from(row.get::<String, _>("user_id")),
            role: row.get("role"),
            joined_at: row.get("joined_at"),
            email: row.get("email"),
            name: row.get("name"),
            disabled: row.get::<i64, _>("disabled") != 0,
        }
    }
}

#[async_trait]
impl WorkspaceRepository for SqliteWorkspaceRepository {
    async fn create_workspace(&self, params: CreateWorkspaceParams) -> Result<WorkspaceRecord> {
        let CreateWorkspaceParams {
            id,
            owner_id,
            name,
            description,
            invite_code,
            created_at,
        } = params;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO workspaces (
                 id,
                 name,
                 description,
                 owner_id,
                 invite_code,
                 created_at,
                 updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&name)
        .bind(description.as_ref())
        .bind(&owner_id)
        .bind(&invite_code)
        .bind(created_at)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, user_id, role, joined_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&owner_id)
        .bind(Role::Owner.as_str())
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(WorkspaceRecord {
            id: WorkspaceId::from(id),
            name,
            description,
            owner_id: UserId::from(owner_id),
            invite_code,
            created_at,
            updated_at: created_at,
        })
    }

    async fn fetch_workspace(&self, id: &str) -> Result<Option<WorkspaceRecord>> {
        let row = sqlx::query(
            "SELECT id, name, description, owner_id, invite_code, created_at, updated_at
             FROM workspaces
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::map_workspace_row))
    }

    async fn fetch_workspace_by_invite_code(
        &self,
        invite_code: &str,
    ) -> Result<Option<WorkspaceRecord>> {
        let row = sqlx::query(
            "SELECT id, name, description, owner_id, invite_code, created_at, updated_at
             FROM workspaces
             WHERE invite_code = ?",
        )
        .bind(invite_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::map_workspace_row))
    }

    async fn update_workspace(&self, params: UpdateWorkspaceParams) -> Result<bool> {
        let UpdateWorkspaceParams {
            id,
            name,
            description,
            updated_at,
        } = params;

        let mut builder = QueryBuilder::new("UPDATE workspaces SET ");
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

    async fn set_invite_code(
        &self,
        workspace_id: &str,
        invite_code: &str,
        updated_at: i64,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE workspaces SET invite_code = ?, updated_at = ? WHERE id = ?")
                .bind(invite_code)
                .bind(updated_at)
                .bind(workspace_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_workspace(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE users SET current_workspace_id = NULL WHERE current_workspace_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM workspaces WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_memberships_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<UserWorkspaceMembership>> {
        let rows = sqlx::query(
            "SELECT
                 w.id AS workspace_id,
                 w.name AS workspace_name,
                 w.description AS workspace_description,
                 w.owner_id AS workspace_owner_id,
                 w.created_at AS workspace_created_at,
                 w.updated_at AS workspace_updated_at,
                 wm.role,
                 wm.joined_at
             FROM workspace_members wm
             JOIN workspaces w ON w.id = wm.workspace_id
             WHERE wm.user_id = ?
             ORDER BY w.created_at ASC, w.id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| UserWorkspaceMembership {
                workspace_id: WorkspaceId::from(row.get::<String, _>("workspace_id")),
                workspace_name: row.get("workspace_name"),
                workspace_description: row.get("workspace_description"),
                workspace_owner_id: UserId::from(row.get::<String, _>("workspace_owner_id")),
                workspace_created_at: row.get("workspace_created_at"),
                workspace_updated_at: row.get("workspace_updated_at"),
                role: row.get("role"),
                joined_at: row.get("joined_at"),
            })
            .collect())
    }

    async fn list_members_with_users(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<WorkspaceMemberWithUser>> {
        let rows = sqlx::query(
            "SELECT
                 wm.workspace_id,
                 wm.user_id,
                 wm.role,
                 wm.joined_at,
                 u.email,
                 u.name,
                 u.disabled
             FROM workspace_members wm
             JOIN users u ON u.id = wm.user_id
             WHERE wm.workspace_id = ?
             ORDER BY wm.joined_at ASC, u.email ASC",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Self::map_member_row).collect())
    }

    async fn get_member(
        &self,
        workspace_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkspaceMemberRecord>> {
        let row = sqlx::query(
            "SELECT workspace_id, user_id, role, joined_at
             FROM workspace_members
             WHERE workspace_id = ? AND user_id = ?",
        )
        .bind(workspace_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| WorkspaceMemberRecord {
            workspace_id: WorkspaceId::from(row.get::<String, _>("workspace_id")),
            user_id: UserId::from(row.get::<String, _>("user_id")),
            role: row.get("role"),
            joined_at: row.get("joined_at"),
        }))
    }

    async fn insert_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: &str,
        joined_at: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO workspace_members (workspace_id, user_id, role, joined_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(workspace_id)
        .bind(user_id)
        .bind(role)
        .bind(joined_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_member_role(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE workspace_members SET role = ? WHERE workspace_id = ? AND user_id = ?",
        )
        .bind(role)
        .bind(workspace_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_member(&self, workspace_id: &str, user_id: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM workspace_members WHERE workspace_id = ? AND user_id = ?")
                .bind(workspace_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn normalize_member_roles(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE workspace_members SET role = UPPER(TRIM(role))
             WHERE role <> UPPER(TRIM(role))",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
