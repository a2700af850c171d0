// Workspace management handlers

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use crewspace_core::rbac::Permission;
use serde_json::json;

use crate::{
    auth::authenticate_rest_request,
    error::AppError,
    http::append_set_cookie_headers,
    state::AppState,
    types::{
        AnalyticsResponse, CreateWorkspaceRequest, ListWorkspacesResponse, UpdateWorkspaceRequest,
        WorkspaceDetailResponse, WorkspaceResponse, WorkspaceWithRole,
    },
    workspace::access::require_member,
};

pub(crate) async fn create_workspace_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<CreateWorkspaceRequest>>,
) -> Result<Response, AppError> {
    let payload = body.map(|wrapper| wrapper.0).unwrap_or_default();
    let auth = authenticate_rest_request(&state, &headers).await?;

    let workspace = state
        .workspace_service
        .create_workspace_with_defaults(
            &auth.user.id,
            payload.name.as_deref(),
            payload.description.as_deref(),
        )
        .await?;

    let mut response = Json(WorkspaceResponse::from(workspace)).into_response();
    *response.status_mut() = StatusCode::CREATED;
    append_set_cookie_headers(&mut response, &auth.set_cookies)?;
    Ok(response)
}

pub(crate) async fn list_workspaces_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;

    let memberships = state
        .workspace_store
        .list_memberships_for_user(&auth.user.id)
        .await
        .map_err(AppError::from_anyhow)?;

    let response = ListWorkspacesResponse {
        workspaces: memberships
            .into_iter()
            .map(WorkspaceWithRole::from)
            .collect(),
    };

    let mut http_response = Json(response).into_response();
    append_set_cookie_headers(&mut http_response, &auth.set_cookies)?;
    Ok(http_response)
}

pub(crate) async fn get_workspace_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::ViewOnly)?;

    let response = WorkspaceDetailResponse {
        role: ctx.role.as_str().to_string(),
        workspace: WorkspaceResponse::from(ctx.workspace),
    };

    let mut http_response = Json(response).into_response();
    append_set_cookie_headers(&mut http_response, &ctx.set_cookies)?;
    Ok(http_response)
}

pub(crate) async fn update_workspace_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
    Json(payload): Json<UpdateWorkspaceRequest>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::EditWorkspace)?;

    if let Some(name) = payload.name.as_deref() {
        if name.trim().is_empty() {
            return Err(AppError::bad_request("workspace name must not be empty"));
        }
    }

    // `description: null` clears the field; an absent key leaves it alone.
    let description = payload.description.as_ref().map(|inner| inner.as_deref());

    let Some(workspace) = state
        .workspace_store
        .update(&workspace_id, payload.name.as_deref(), description)
        .await
        .map_err(AppError::from_anyhow)?
    else {
        return Err(AppError::workspace_not_found(&workspace_id));
    };

    let mut response = Json(WorkspaceResponse::from(workspace)).into_response();
    append_set_cookie_headers(&mut response, &ctx.set_cookies)?;
    Ok(response)
}

pub(crate) async fn delete_workspace_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::DeleteWorkspace)?;

    let deleted = state
        .workspace_store
        .delete(&workspace_id)
        .await
        .map_err(AppError::from_anyhow)?;
    if !deleted {
        return Err(AppError::workspace_not_found(&workspace_id));
    }

    let mut response = Json(json!({})).into_response();
    append_set_cookie_headers(&mut response, &ctx.set_cookies)?;
    Ok(response)
}

pub(crate) async fn workspace_analytics_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::ViewOnly)?;

    let stats = state
        .task_store
        .workspace_stats(&workspace_id)
        .await
        .map_err(AppError::from_anyhow)?;

    let mut response = Json(AnalyticsResponse::from(stats)).into_response();
    append_set_cookie_headers(&mut response, &ctx.set_cookies)?;
    Ok(response)
}
