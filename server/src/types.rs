// Request and response types for REST API handlers

use crewspace_core::{
    project::ProjectRecord,
    task::{TaskRecord, TaskStats},
    user,
    workspace::{UserWorkspaceMembership, WorkspaceMemberWithUser, WorkspaceRecord},
};
use serde::{Deserialize, Serialize};

use crate::utils::users::display_name_from_parts;

// ========== Authentication Types ==========

pub(crate) struct AuthenticatedRestSession {
    pub(crate) user: user::UserRecord,
    pub(crate) set_cookies: Vec<String>,
}

pub(crate) struct SessionLookup {
    pub(crate) user: Option<SessionUser>,
    pub(crate) cookies: Vec<String>,
}

// ========== Request Types ==========

#[derive(Deserialize)]
pub(crate) struct CreateAdminUserRequest {
    pub(crate) email: String,
    pub(crate) password: String,
}

#[derive(Deserialize)]
pub(crate) struct SignUpRequest {
    pub(crate) email: String,
    pub(crate) password: String,
    #[serde(default)]
    pub(crate) name: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct SignInRequest {
    pub(crate) email: String,
    pub(crate) password: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteSessionRequest {
    #[serde(default)]
    pub(crate) session_id: Option<String>,
    #[serde(default)]
    pub(crate) user_id: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshSessionRequest {
    #[serde(default)]
    pub(crate) session_id: Option<String>,
    #[serde(default)]
    pub(crate) user_id: Option<String>,
}

#[derive(Deserialize, Default)]
pub(crate) struct ListUsersQuery {
    #[serde(default)]
    pub(crate) skip: Option<i64>,
    #[serde(default)]
    pub(crate) first: Option<i64>,
    #[serde(default)]
    pub(crate) query: Option<String>,
}

#[derive(Default, Deserialize)]
pub(crate) struct CreateWorkspaceRequest {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
}

#[derive(Deserialize, Default)]
pub(crate) struct UpdateWorkspaceRequest {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub(crate) description: Option<Option<String>>,
}

#[derive(Deserialize)]
pub(crate) struct ChangeMemberRoleRequest {
    pub(crate) role: String,
}

#[derive(Deserialize)]
pub(crate) struct CreateProjectRequest {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) emoji: Option<String>,
}

#[derive(Deserialize, Default)]
pub(crate) struct UpdateProjectRequest {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub(crate) description: Option<Option<String>>,
    #[serde(default)]
    pub(crate) emoji: Option<String>,
}

#[derive(Deserialize, Default)]
pub(crate) struct ListProjectsQuery {
    #[serde(default)]
    pub(crate) skip: Option<i64>,
    #[serde(default)]
    pub(crate) first: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateTaskRequest {
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    pub(crate) priority: Option<String>,
    #[serde(default)]
    pub(crate) assigned_to: Option<String>,
    #[serde(default)]
    pub(crate) due_date: Option<i64>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateTaskRequest {
    #[serde(default)]
    pub(crate) title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub(crate) description: Option<Option<String>>,
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    pub(crate) priority: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub(crate) assigned_to: Option<Option<String>>,
    #[serde(default)]
    pub(crate) project_id: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub(crate) due_date: Option<Option<i64>>,
}

#[derive(Deserialize, Default)]
pub(crate) struct ListTasksQuery {
    #[serde(default)]
    pub(crate) project_id: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    pub(crate) priority: Option<String>,
    #[serde(default)]
    pub(crate) assigned_to: Option<String>,
    #[serde(default)]
    pub(crate) keyword: Option<String>,
    #[serde(default)]
    pub(crate) skip: Option<i64>,
    #[serde(default)]
    pub(crate) first: Option<i64>,
}

// ========== Response Types ==========

#[derive(Serialize)]
pub(crate) struct CreateUserResponse {
    pub(crate) id: String,
    pub(crate) email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionUser {
    pub(crate) id: String,
    pub(crate) email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    pub(crate) current_workspace_id: Option<String>,
    pub(crate) disabled: bool,
    pub(crate) has_password: bool,
}

impl From<&user::UserRecord> for SessionUser {
    fn from(record: &user::UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            email: record.email.clone(),
            name: record.name.clone(),
            current_workspace_id: record.current_workspace_id.clone(),
            disabled: record.disabled,
            has_password: !record.password_hash.trim().is_empty(),
        }
    }
}

#[derive(Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionUserPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) user: Option<SessionUser>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionInfo {
    pub(crate) id: String,
    pub(crate) created_at: i64,
    pub(crate) expires_at: i64,
}

impl From<user::SessionRecord> for SessionInfo {
    fn from(record: user::SessionRecord) -> Self {
        Self {
            id: record.id,
            created_at: record.created_at,
            expires_at: record.expires_at,
        }
    }
}

#[derive(Default, Serialize)]
pub(crate) struct SessionsPayload {
    pub(crate) sessions: Vec<SessionInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshSessionResponse {
    pub(crate) session_id: String,
    pub(crate) user_id: String,
    pub(crate) expires_at: i64,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) disabled: bool,
}

impl From<user::UserRecord> for UserResponse {
    fn from(record: user::UserRecord) -> Self {
        let name = display_name_from_parts(record.name.as_deref(), &record.email);
        Self {
            id: record.id,
            email: record.email,
            name,
            disabled: record.disabled,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub(crate) struct ListUsersResponse {
    pub(crate) users: Vec<UserResponse>,
    pub(crate) total: i64,
    pub(crate) skip: i64,
    pub(crate) first: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MeResponse {
    pub(crate) user: SessionUser,
    pub(crate) workspaces: Vec<WorkspaceWithRole>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkspaceResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) owner_id: String,
    pub(crate) invite_code: String,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl From<WorkspaceRecord> for WorkspaceResponse {
    fn from(record: WorkspaceRecord) -> Self {
        Self {
            id: record.id.to_string(),
            name: record.name,
            description: record.description,
            owner_id: record.owner_id.to_string(),
            invite_code: record.invite_code,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Workspace detail plus the role the calling member holds in it.
#[derive(Serialize)]
pub(crate) struct WorkspaceDetailResponse {
    #[serde(flatten)]
    pub(crate) workspace: WorkspaceResponse,
    pub(crate) role: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkspaceWithRole {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) owner_id: String,
    pub(crate) role: String,
    pub(crate) joined_at: i64,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl From<UserWorkspaceMembership> for WorkspaceWithRole {
    fn from(membership: UserWorkspaceMembership) -> Self {
        Self {
            id: membership.workspace_id.to_string(),
            name: membership.workspace_name,
            description: membership.workspace_description,
            owner_id: membership.workspace_owner_id.to_string(),
            role: membership.role,
            joined_at: membership.joined_at,
            created_at: membership.workspace_created_at,
            updated_at: membership.workspace_updated_at,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct ListWorkspacesResponse {
    pub(crate) workspaces: Vec<WorkspaceWithRole>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnalyticsResponse {
    pub(crate) total_tasks: i64,
    pub(crate) overdue_tasks: i64,
    pub(crate) completed_tasks: i64,
}

impl From<TaskStats> for AnalyticsResponse {
    fn from(stats: TaskStats) -> Self {
        Self {
            total_tasks: stats.total,
            overdue_tasks: stats.overdue,
            completed_tasks: stats.completed,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MemberResponse {
    pub(crate) user_id: String,
    pub(crate) email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    pub(crate) role: String,
    pub(crate) joined_at: i64,
    pub(crate) disabled: bool,
}

impl From<WorkspaceMemberWithUser> for MemberResponse {
    fn from(member: WorkspaceMemberWithUser) -> Self {
        Self {
            user_id: member.user_id.to_string(),
            email: member.email,
            name: member.name,
            role: member.role,
            joined_at: member.joined_at,
            disabled: member.disabled,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MembersResponse {
    pub(crate) members: Vec<MemberResponse>,
    pub(crate) assignable_roles: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InviteResetResponse {
    pub(crate) invite_code: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProjectResponse {
    pub(crate) id: String,
    pub(crate) workspace_id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) emoji: String,
    pub(crate) created_by: String,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl From<ProjectRecord> for ProjectResponse {
    fn from(record: ProjectRecord) -> Self {
        Self {
            id: record.id.to_string(),
            workspace_id: record.workspace_id.to_string(),
            name: record.name,
            description: record.description,
            emoji: record.emoji,
            created_by: record.created_by.to_string(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct ListProjectsResponse {
    pub(crate) projects: Vec<ProjectResponse>,
    pub(crate) total: i64,
    pub(crate) skip: i64,
    pub(crate) first: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TaskResponse {
    pub(crate) id: String,
    pub(crate) task_code: String,
    pub(crate) workspace_id: String,
    pub(crate) project_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) status: String,
    pub(crate) priority: String,
    pub(crate) assigned_to: Option<String>,
    pub(crate) created_by: String,
    pub(crate) due_date: Option<i64>,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl From<TaskRecord> for TaskResponse {
    fn from(record: TaskRecord) -> Self {
        Self {
            id: record.id.to_string(),
            task_code: record.task_code,
            workspace_id: record.workspace_id.to_string(),
            project_id: record.project_id.to_string(),
            title: record.title,
            description: record.description,
            status: record.status,
            priority: record.priority,
            assigned_to: record.assigned_to.map(|id| id.to_string()),
            created_by: record.created_by.to_string(),
            due_date: record.due_date,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct ListTasksResponse {
    pub(crate) tasks: Vec<TaskResponse>,
    pub(crate) total: i64,
    pub(crate) skip: i64,
    pub(crate) first: i64,
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
}

/// Distinguishes an absent field from an explicit null in update bodies;
/// absent stays `None`, null becomes `Some(None)`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}
