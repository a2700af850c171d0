// Membership and invite handlers

use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use crewspace_core::rbac::{Permission, Role};
use serde_json::json;

use crate::{
    auth::authenticate_rest_request,
    error::AppError,
    http::append_set_cookie_headers,
    state::AppState,
    types::{
        ChangeMemberRoleRequest, InviteResetResponse, MemberResponse, MembersResponse,
        WorkspaceResponse,
    },
    workspace::{access::require_member, members},
};

pub(crate) async fn list_members_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::ViewOnly)?;

    let members = state
        .workspace_store
        .list_members_with_users(&workspace_id)
        .await
        .map_err(AppError::from_anyhow)?;

    let response = MembersResponse {
        members: members.into_iter().map(MemberResponse::from).collect(),
        assignable_roles: Role::ASSIGNABLE
            .iter()
            .map(|role| role.as_str().to_string())
            .collect(),
    };

    let mut http_response = Json(response).into_response();
    append_set_cookie_headers(&mut http_response, &ctx.set_cookies)?;
    Ok(http_response)
}

pub(crate) async fn change_member_role_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, user_id)): Path<(String, String)>,
    Json(payload): Json<ChangeMemberRoleRequest>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::ChangeMemberRole)?;

    let role = members::change_member_role(&state, &ctx.workspace, &user_id, &payload.role).await?;

    let mut response = Json(json!({
        "userId": user_id,
        "role": role.as_str(),
    }))
    .into_response();
    append_set_cookie_headers(&mut response, &ctx.set_cookies)?;
    Ok(response)
}

pub(crate) async fn remove_member_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, user_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::RemoveMember)?;

    members::remove_member(&state, &ctx.workspace, &user_id).await?;

    let mut response = Json(json!({})).into_response();
    append_set_cookie_headers(&mut response, &ctx.set_cookies)?;
    Ok(response)
}

pub(crate) async fn leave_workspace_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;

    members::leave_workspace(&state, &ctx.workspace, &ctx.user.id).await?;

    let mut response = Json(json!({})).into_response();
    append_set_cookie_headers(&mut response, &ctx.set_cookies)?;
    Ok(response)
}

pub(crate) async fn reset_invite_code_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::ManageWorkspaceSettings)?;

    let Some(invite_code) = state
        .workspace_store
        .reset_invite_code(&workspace_id)
        .await
        .map_err(AppError::from_anyhow)?
    else {
        return Err(AppError::workspace_not_found(&workspace_id));
    };

    let mut response = Json(InviteResetResponse { invite_code }).into_response();
    append_set_cookie_headers(&mut response, &ctx.set_cookies)?;
    Ok(response)
}

pub(crate) async fn join_workspace_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(invite_code): Path<String>,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;

    let workspace = state
        .workspace_service
        .join_by_invite_code(&auth.user.id, &invite_code)
        .await?;

    let mut response = Json(WorkspaceResponse::from(workspace)).into_response();
    append_set_cookie_headers(&mut response, &auth.set_cookies)?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::to_bytes,
        http::{HeaderValue, StatusCode, header::COOKIE},
    };
    use serde_json::Value as JsonValue;

    use crate::{
        cookies::{SESSION_COOKIE_NAME, USER_COOKIE_NAME},
        test_support::{create_user, seed_workspace, setup_state},
    };

    async fn session_headers(state: &crate::AppState, user_id: &str) -> HeaderMap {
        let session = state
            .user_store
            .create_session(user_id)
            .await
            .expect("create session");
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!(
                "{}={}; {}={}",
                SESSION_COOKIE_NAME, session.id, USER_COOKIE_NAME, user_id
            ))
            .expect("session cookie"),
        );
        headers
    }

    #[tokio::test]
    async fn list_members_handler_includes_assignable_roles() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let member = create_user(&state, "member@example.com").await;
        state
            .workspace_store
            .add_member(workspace.id.as_str(), &member.id, Role::Member)
            .await
            .expect("add member");

        let headers = session_headers(&state, &owner.id).await;
        let response = list_members_handler(State(state), headers, Path(workspace.id.to_string()))
            .await
            .expect("list members");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: JsonValue = serde_json::from_slice(&body).unwrap();
        let members = json["members"].as_array().expect("members array");
        assert_eq!(members.len(), 2);
        let roles: Vec<&str> = members
            .iter()
            .filter_map(|member| member["role"].as_str())
            .collect();
        assert!(roles.contains(&"OWNER"));
        assert!(roles.contains(&"MEMBER"));
        assert_eq!(
            json["assignableRoles"],
            serde_json::json!(["ADMIN", "MEMBER"])
        );
    }

    #[tokio::test]
    async fn change_member_role_handler_promotes_member() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let member = create_user(&state, "member@example.com").await;
        state
            .workspace_store
            .add_member(workspace.id.as_str(), &member.id, Role::Member)
            .await
            .expect("add member");

        let headers = session_headers(&state, &owner.id).await;
        let response = change_member_role_handler(
            State(state.clone()),
            headers,
            Path((workspace.id.to_string(), member.id.clone())),
            Json(ChangeMemberRoleRequest {
                role: "admin".to_string(),
            }),
        )
        .await
        .expect("change role");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: JsonValue = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["role"], "ADMIN");

        let stored = state
            .workspace_store
            .find_member(workspace.id.as_str(), &member.id)
            .await
            .expect("find member")
            .expect("membership exists");
        assert_eq!(stored.role, "ADMIN");
    }

    #[tokio::test]
    async fn change_member_role_handler_rejects_owner_target() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;

        let headers = session_headers(&state, &owner.id).await;
        let err = change_member_role_handler(
            State(state),
            headers,
            Path((workspace.id.to_string(), owner.id.clone())),
            Json(ChangeMemberRoleRequest {
                role: "MEMBER".to_string(),
            }),
        )
        .await
        .expect_err("owner role must be immutable");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload.message, "the owner role cannot be changed");
    }

    #[tokio::test]
    async fn change_member_role_handler_rejects_owner_assignment() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let member = create_user(&state, "member@example.com").await;
        state
            .workspace_store
            .add_member(workspace.id.as_str(), &member.id, Role::Member)
            .await
            .expect("add member");

        let headers = session_headers(&state, &owner.id).await;
        let err = change_member_role_handler(
            State(state),
            headers,
            Path((workspace.id.to_string(), member.id.clone())),
            Json(ChangeMemberRoleRequest {
                role: "OWNER".to_string(),
            }),
        )
        .await
        .expect_err("OWNER must not be assignable");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload.message, "OWNER is not an assignable role");
    }

    #[tokio::test]
    async fn change_member_role_handler_requires_permission() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, _owner) = seed_workspace(&state).await;
        let member = create_user(&state, "member@example.com").await;
        let other = create_user(&state, "other@example.com").await;
        state
            .workspace_store
            .add_member(workspace.id.as_str(), &member.id, Role::Member)
            .await
            .expect("add member");
        state
            .workspace_store
            .add_member(workspace.id.as_str(), &other.id, Role::Member)
            .await
            .expect("add member");

        let headers = session_headers(&state, &member.id).await;
        let err = change_member_role_handler(
            State(state),
            headers,
            Path((workspace.id.to_string(), other.id.clone())),
            Json(ChangeMemberRoleRequest {
                role: "ADMIN".to_string(),
            }),
        )
        .await
        .expect_err("plain member must not change roles");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(payload.name, "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn remove_member_handler_clears_current_workspace() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let member = create_user(&state, "member@example.com").await;
        state
            .workspace_store
            .add_member(workspace.id.as_str(), &member.id, Role::Member)
            .await
            .expect("add member");
        state
            .user_store
            .set_current_workspace(&member.id, Some(workspace.id.as_str()))
            .await
            .expect("set current workspace");

        let headers = session_headers(&state, &owner.id).await;
        remove_member_handler(
            State(state.clone()),
            headers,
            Path((workspace.id.to_string(), member.id.clone())),
        )
        .await
        .expect("remove member");

        let membership = state
            .workspace_store
            .find_member(workspace.id.as_str(), &member.id)
            .await
            .expect("find member");
        assert!(membership.is_none());

        let refreshed = state
            .user_store
            .find_by_id(&member.id)
            .await
            .expect("find user")
            .expect("user exists");
        assert!(refreshed.current_workspace_id.is_none());
    }

    #[tokio::test]
    async fn leave_workspace_handler_rejects_owner() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;

        let headers = session_headers(&state, &owner.id).await;
        let err = leave_workspace_handler(State(state), headers, Path(workspace.id.to_string()))
            .await
            .expect_err("owner must not leave their own workspace");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload.message, "workspace owner cannot leave");
    }

    #[tokio::test]
    async fn leave_workspace_handler_removes_membership() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, _owner) = seed_workspace(&state).await;
        let member = create_user(&state, "member@example.com").await;
        state
            .workspace_store
            .add_member(workspace.id.as_str(), &member.id, Role::Member)
            .await
            .expect("add member");

        let headers = session_headers(&state, &member.id).await;
        leave_workspace_handler(State(state.clone()), headers, Path(workspace.id.to_string()))
            .await
            .expect("leave workspace");

        let membership = state
            .workspace_store
            .find_member(workspace.id.as_str(), &member.id)
            .await
            .expect("find member");
        assert!(membership.is_none());
    }

    #[tokio::test]
    async fn reset_invite_code_handler_rotates_code() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;

        let headers = session_headers(&state, &owner.id).await;
        let response =
            reset_invite_code_handler(State(state.clone()), headers, Path(workspace.id.to_string()))
                .await
                .expect("reset invite code");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: JsonValue = serde_json::from_slice(&body).unwrap();
        let fresh_code = json["inviteCode"].as_str().expect("invite code");
        assert_ne!(fresh_code, workspace.invite_code.as_str());

        let stored = state
            .workspace_store
            .find_by_id(workspace.id.as_str())
            .await
            .expect("find workspace")
            .expect("workspace exists");
        assert_eq!(stored.invite_code, fresh_code);
    }

    #[tokio::test]
    async fn reset_invite_code_handler_requires_settings_permission() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, _owner) = seed_workspace(&state).await;
        let member = create_user(&state, "member@example.com").await;
        state
            .workspace_store
            .add_member(workspace.id.as_str(), &member.id, Role::Member)
            .await
            .expect("add member");

        let headers = session_headers(&state, &member.id).await;
        let err = reset_invite_code_handler(State(state), headers, Path(workspace.id.to_string()))
            .await
            .expect_err("plain member must not rotate the invite code");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(payload.name, "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn join_workspace_handler_joins_once() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, _owner) = seed_workspace(&state).await;
        let joiner = create_user(&state, "joiner@example.com").await;

        let headers = session_headers(&state, &joiner.id).await;
        let response = join_workspace_handler(
            State(state.clone()),
            headers.clone(),
            Path(workspace.invite_code.clone()),
        )
        .await
        .expect("join workspace");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: JsonValue = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["id"], workspace.id.as_str());

        let membership = state
            .workspace_store
            .find_member(workspace.id.as_str(), &joiner.id)
            .await
            .expect("find member")
            .expect("membership exists");
        assert_eq!(membership.role, "MEMBER");

        let refreshed = state
            .user_store
            .find_by_id(&joiner.id)
            .await
            .expect("find user")
            .expect("user exists");
        assert_eq!(
            refreshed.current_workspace_id.as_deref(),
            Some(workspace.id.as_str())
        );

        let err = join_workspace_handler(
            State(state),
            headers,
            Path(workspace.invite_code.clone()),
        )
        .await
        .expect_err("joining twice must conflict");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(payload.message, "already a member of this workspace");
    }

    #[tokio::test]
    async fn join_workspace_handler_rejects_unknown_code() {
        let (_temp_dir, _database, state) = setup_state().await;
        let joiner = create_user(&state, "joiner@example.com").await;

        let headers = session_headers(&state, &joiner.id).await;
        let err = join_workspace_handler(State(state), headers, Path("BOGUS123".to_string()))
            .await
            .expect_err("unknown invite code must 404");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(payload.message, "invalid invite code");
    }
}
