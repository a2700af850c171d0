use axum::http::HeaderMap;

use crewspace_core::{
    rbac::{self, AccessDecision, Permission, Role},
    user::UserRecord,
    workspace::WorkspaceRecord,
};

use crate::{AppError, AppState};

/// Everything a workspace-scoped handler needs once the caller has been
/// admitted: the workspace row, the caller's parsed role, the caller
/// itself, and the refreshed session cookies to append to the response.
pub(crate) struct MemberContext {
    pub(crate) workspace: WorkspaceRecord,
    pub(crate) role: Role,
    pub(crate) user: UserRecord,
    pub(crate) set_cookies: Vec<String>,
}

impl MemberContext {
    pub(crate) fn require(&self, permission: Permission) -> Result<(), AppError> {
        match rbac::authorize(self.role, permission) {
            AccessDecision::Allowed => Ok(()),
            AccessDecision::Denied => Err(AppError::permission_denied(permission)),
        }
    }
}

/// Admission check shared by every workspace-scoped route: a live session,
/// an existing workspace, and a membership row carrying a recognizable
/// role. Non-members are told they lack access, not whether anything else
/// exists inside.
pub(crate) async fn require_member(
    state: &AppState,
    headers: &HeaderMap,
    workspace_id: &str,
) -> Result<MemberContext, AppError> {
    let auth = state.user_service.authenticate_rest_request(headers).await?;
    let workspace = state.workspace_service.fetch_workspace(workspace_id).await?;

    let Some(member) = state
        .workspace_store
        .find_member(workspace_id, &auth.user.id)
        .await
        .map_err(AppError::from_anyhow)?
    else {
        return Err(AppError::workspace_access_denied(workspace_id));
    };

    let Some(role) = Role::parse(&member.role) else {
        return Err(AppError::unknown_member_role(&member.role));
    };

    Ok(MemberContext {
        workspace,
        role,
        user: auth.user,
        set_cookies: auth.set_cookies,
    })
}

#[cfg(test)]
mod tests {
    use crewspace_core::ids::{UserId, WorkspaceId};

    use super::*;

    fn context_with_role(role: Role) -> MemberContext {
        MemberContext {
            workspace: WorkspaceRecord {
                id: WorkspaceId::from("ws-1"),
                name: "Demo".to_string(),
                description: None,
                owner_id: UserId::from("owner-1"),
                invite_code: "AbCd1234".to_string(),
                created_at: 0,
                updated_at: 0,
            },
            role,
            user: UserRecord {
                id: "member-1".to_string(),
                email: "member@example.com".to_string(),
                password_hash: "hash".to_string(),
                name: None,
                current_workspace_id: None,
                disabled: false,
                created_at: 0,
            },
            set_cookies: Vec::new(),
        }
    }

    #[test]
    fn owner_context_passes_every_check() {
        let context = context_with_role(Role::Owner);
        for permission in Permission::ALL {
            assert!(context.require(permission).is_ok());
        }
    }

    #[test]
    fn member_context_is_denied_destructive_permissions() {
        let context = context_with_role(Role::Member);
        assert!(context.require(Permission::EditTask).is_ok());

        let err = context.require(Permission::DeleteProject).unwrap_err();
        let (status, payload) = err.into_payload();
        assert_eq!(status, axum::http::StatusCode::FORBIDDEN);
        assert_eq!(payload.name, "PERMISSION_DENIED");
        assert_eq!(payload.error_type, "NO_PERMISSION");
    }
}
