// Project handlers, all scoped under a workspace.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use crewspace_core::{project::ProjectRecord, rbac::Permission};
use serde_json::json;

use crate::{
    error::AppError,
    http::append_set_cookie_headers,
    state::AppState,
    types::{
        AnalyticsResponse, CreateProjectRequest, ListProjectsQuery, ListProjectsResponse,
        ProjectResponse, UpdateProjectRequest,
    },
    utils::users::normalize_list_params,
    workspace::access::require_member,
};

/// Resolves a project and confirms it belongs to the workspace named in the
/// URL. A project that exists under a different workspace is reported as
/// missing rather than forbidden, so ids do not leak across workspaces.
pub(crate) async fn fetch_project_in_workspace(
    state: &AppState,
    workspace_id: &str,
    project_id: &str,
) -> Result<ProjectRecord, AppError> {
    let project = state
        .project_store
        .find_by_id(project_id)
        .await
        .map_err(AppError::from_anyhow)?;

    match project {
        Some(project) if project.workspace_id.as_str() == workspace_id => Ok(project),
        _ => Err(AppError::project_not_found(workspace_id, project_id)),
    }
}

pub(crate) async fn create_project_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::CreateProject)?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("project name must not be empty"));
    }

    let project = state
        .project_store
        .create(
            &workspace_id,
            &ctx.user.id,
            name,
            payload.description.as_deref(),
            payload.emoji.as_deref(),
        )
        .await
        .map_err(AppError::from_anyhow)?;

    let mut response = Json(ProjectResponse::from(project)).into_response();
    *response.status_mut() = StatusCode::CREATED;
    append_set_cookie_headers(&mut response, &ctx.set_cookies)?;
    Ok(response)
}

pub(crate) async fn list_projects_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
    Query(params): Query<ListProjectsQuery>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::ViewOnly)?;

    let (first, skip, _) = normalize_list_params(params.skip, params.first, None)?;

    let projects = state
        .project_store
        .list(&workspace_id, skip, first)
        .await
        .map_err(AppError::from_anyhow)?;
    let total = state
        .project_store
        .count(&workspace_id)
        .await
        .map_err(AppError::from_anyhow)?;

    let response = ListProjectsResponse {
        projects: projects.into_iter().map(ProjectResponse::from).collect(),
        total,
        skip,
        first,
    };

    let mut http_response = Json(response).into_response();
    append_set_cookie_headers(&mut http_response, &ctx.set_cookies)?;
    Ok(http_response)
}

pub(crate) async fn get_project_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, project_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::ViewOnly)?;

    let project = fetch_project_in_workspace(&state, &workspace_id, &project_id).await?;

    let mut response = Json(ProjectResponse::from(project)).into_response();
    append_set_cookie_headers(&mut response, &ctx.set_cookies)?;
    Ok(response)
}

pub(crate) async fn update_project_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, project_id)): Path<(String, String)>,
    payload: Option<Json<UpdateProjectRequest>>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::EditProject)?;

    fetch_project_in_workspace(&state, &workspace_id, &project_id).await?;

    let payload = payload.map(|wrapper| wrapper.0).unwrap_or_default();
    if let Some(name) = payload.name.as_deref() {
        if name.trim().is_empty() {
            return Err(AppError::bad_request("project name must not be empty"));
        }
    }

    // `description: null` clears the field; an absent key leaves it alone.
    let description = payload.description.as_ref().map(|inner| inner.as_deref());

    let Some(project) = state
        .project_store
        .update(
            &project_id,
            payload.name.as_deref(),
            description,
            payload.emoji.as_deref(),
        )
        .await
        .map_err(AppError::from_anyhow)?
    else {
        return Err(AppError::project_not_found(&workspace_id, &project_id));
    };

    let mut response = Json(ProjectResponse::from(project)).into_response();
    append_set_cookie_headers(&mut response, &ctx.set_cookies)?;
    Ok(response)
}

pub(crate) async fn delete_project_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, project_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::DeleteProject)?;

    fetch_project_in_workspace(&state, &workspace_id, &project_id).await?;

    let deleted = state
        .project_store
        .delete(&project_id)
        .await
        .map_err(AppError::from_anyhow)?;
    if !deleted {
        return Err(AppError::project_not_found(&workspace_id, &project_id));
    }

    let mut response = Json(json!({})).into_response();
    append_set_cookie_headers(&mut response, &ctx.set_cookies)?;
    Ok(response)
}

pub(crate) async fn project_analytics_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, project_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::ViewOnly)?;

    fetch_project_in_workspace(&state, &workspace_id, &project_id).await?;

    let stats = state
        .task_store
        .project_stats(&project_id)
        .await
        .map_err(AppError::from_anyhow)?;

    let mut response = Json(AnalyticsResponse::from(stats)).into_response();
    append_set_cookie_headers(&mut response, &ctx.set_cookies)?;
    Ok(response)
}
