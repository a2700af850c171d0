// Task handlers. Creation nests under a project; reads, updates and deletes
// address tasks directly under the workspace.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use crewspace_core::{
    db::task_repo::TaskListFilter,
    rbac::Permission,
    task::{TaskRecord, canonical_task_priority, canonical_task_status},
};
use serde_json::json;

use crate::{
    error::AppError,
    http::append_set_cookie_headers,
    state::AppState,
    types::{CreateTaskRequest, ListTasksQuery, ListTasksResponse, TaskResponse, UpdateTaskRequest},
    utils::users::normalize_list_params,
    workspace::access::require_member,
};

use super::project_handlers::fetch_project_in_workspace;

/// Resolves a task and confirms it belongs to the workspace named in the URL.
async fn fetch_task_in_workspace(
    state: &AppState,
    workspace_id: &str,
    task_id: &str,
) -> Result<TaskRecord, AppError> {
    let task = state
        .task_store
        .find_by_id(task_id)
        .await
        .map_err(AppError::from_anyhow)?;

    match task {
        Some(task) if task.workspace_id.as_str() == workspace_id => Ok(task),
        _ => Err(AppError::task_not_found(workspace_id, task_id)),
    }
}

async fn ensure_assignee_is_member(
    state: &AppState,
    workspace_id: &str,
    user_id: &str,
) -> Result<(), AppError> {
    let membership = state
        .workspace_store
        .find_member(workspace_id, user_id)
        .await
        .map_err(AppError::from_anyhow)?;
    if membership.is_none() {
        return Err(AppError::bad_request(
            "assignee is not a member of this workspace",
        ));
    }
    Ok(())
}

fn canonicalize_status(value: &str) -> Result<&'static str, AppError> {
    canonical_task_status(value).ok_or_else(|| AppError::bad_request("unknown task status"))
}

fn canonicalize_priority(value: &str) -> Result<&'static str, AppError> {
    canonical_task_priority(value).ok_or_else(|| AppError::bad_request("unknown task priority"))
}

/// Splits a comma list of status tokens and canonicalizes each one.
fn parse_status_list(raw: Option<&str>) -> Result<Vec<String>, AppError> {
    let mut statuses = Vec::new();
    for token in raw.unwrap_or_default().split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        statuses.push(canonicalize_status(token)?.to_string());
    }
    Ok(statuses)
}

fn parse_priority_list(raw: Option<&str>) -> Result<Vec<String>, AppError> {
    let mut priorities = Vec::new();
    for token in raw.unwrap_or_default().split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        priorities.push(canonicalize_priority(token)?.to_string());
    }
    Ok(priorities)
}

fn parse_id_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

pub(crate) async fn create_task_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, project_id)): Path<(String, String)>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::CreateTask)?;

    fetch_project_in_workspace(&state, &workspace_id, &project_id).await?;

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("task title must not be empty"));
    }

    let status = payload
        .status
        .as_deref()
        .map(canonicalize_status)
        .transpose()?;
    let priority = payload
        .priority
        .as_deref()
        .map(canonicalize_priority)
        .transpose()?;

    if let Some(assignee) = payload.assigned_to.as_deref() {
        ensure_assignee_is_member(&state, &workspace_id, assignee).await?;
    }

    let task = state
        .task_store
        .create(
            &workspace_id,
            &project_id,
            &ctx.user.id,
            title,
            payload.description.as_deref(),
            status,
            priority,
            payload.assigned_to.as_deref(),
            payload.due_date,
        )
        .await
        .map_err(AppError::from_anyhow)?;

    let mut response = Json(TaskResponse::from(task)).into_response();
    *response.status_mut() = StatusCode::CREATED;
    append_set_cookie_headers(&mut response, &ctx.set_cookies)?;
    Ok(response)
}

pub(crate) async fn list_tasks_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
    Query(params): Query<ListTasksQuery>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::ViewOnly)?;

    let (first, skip, keyword) =
        normalize_list_params(params.skip, params.first, params.keyword.as_deref())?;

    let filter = TaskListFilter {
        project_id: params
            .project_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned),
        statuses: parse_status_list(params.status.as_deref())?,
        priorities: parse_priority_list(params.priority.as_deref())?,
        assignees: parse_id_list(params.assigned_to.as_deref()),
        keyword,
    };

    let tasks = state
        .task_store
        .list(&workspace_id, filter.clone(), skip, first)
        .await
        .map_err(AppError::from_anyhow)?;
    let total = state
        .task_store
        .count(&workspace_id, filter)
        .await
        .map_err(AppError::from_anyhow)?;

    let response = ListTasksResponse {
        tasks: tasks.into_iter().map(TaskResponse::from).collect(),
        total,
        skip,
        first,
    };

    let mut http_response = Json(response).into_response();
    append_set_cookie_headers(&mut http_response, &ctx.set_cookies)?;
    Ok(http_response)
}

pub(crate) async fn get_task_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, task_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::ViewOnly)?;

    let task = fetch_task_in_workspace(&state, &workspace_id, &task_id).await?;

    let mut response = Json(TaskResponse::from(task)).into_response();
    append_set_cookie_headers(&mut response, &ctx.set_cookies)?;
    Ok(response)
}

pub(crate) async fn update_task_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, task_id)): Path<(String, String)>,
    payload: Option<Json<UpdateTaskRequest>>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::EditTask)?;

    fetch_task_in_workspace(&state, &workspace_id, &task_id).await?;

    let payload = payload.map(|wrapper| wrapper.0).unwrap_or_default();
    if let Some(title) = payload.title.as_deref() {
        if title.trim().is_empty() {
            return Err(AppError::bad_request("task title must not be empty"));
        }
    }

    let status = payload
        .status
        .as_deref()
        .map(canonicalize_status)
        .transpose()?;
    let priority = payload
        .priority
        .as_deref()
        .map(canonicalize_priority)
        .transpose()?;

    // A task may only move between projects of its own workspace.
    if let Some(target_project) = payload.project_id.as_deref() {
        fetch_project_in_workspace(&state, &workspace_id, target_project).await?;
    }

    if let Some(Some(assignee)) = payload.assigned_to.as_ref().map(|inner| inner.as_deref()) {
        ensure_assignee_is_member(&state, &workspace_id, assignee).await?;
    }

    // Explicit nulls clear `description`, `assignedTo` and `dueDate`; absent
    // keys leave them alone.
    let description = payload.description.as_ref().map(|inner| inner.as_deref());
    let assigned_to = payload.assigned_to.as_ref().map(|inner| inner.as_deref());

    let Some(task) = state
        .task_store
        .update(
            &task_id,
            payload.title.as_deref(),
            description,
            status,
            priority,
            assigned_to,
            payload.project_id.as_deref(),
            payload.due_date,
        )
        .await
        .map_err(AppError::from_anyhow)?
    else {
        return Err(AppError::task_not_found(&workspace_id, &task_id));
    };

    let mut response = Json(TaskResponse::from(task)).into_response();
    append_set_cookie_headers(&mut response, &ctx.set_cookies)?;
    Ok(response)
}

pub(crate) async fn delete_task_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((workspace_id, task_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let ctx = require_member(&state, &headers, &workspace_id).await?;
    ctx.require(Permission::DeleteTask)?;

    fetch_task_in_workspace(&state, &workspace_id, &task_id).await?;

    let deleted = state
        .task_store
        .delete(&task_id)
        .await
        .map_err(AppError::from_anyhow)?;
    if !deleted {
        return Err(AppError::task_not_found(&workspace_id, &task_id));
    }

    let mut response = Json(json!({})).into_response();
    append_set_cookie_headers(&mut response, &ctx.set_cookies)?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::to_bytes,
        http::{HeaderValue, header::COOKIE},
    };
    use crewspace_core::{
        project::ProjectRecord,
        rbac::Role,
        task::{DEFAULT_TASK_PRIORITY, DEFAULT_TASK_STATUS},
        user::UserRecord,
        workspace::WorkspaceRecord,
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

    async fn seed_project(
        state: &crate::AppState,
        workspace: &WorkspaceRecord,
        owner: &UserRecord,
        name: &str,
    ) -> ProjectRecord {
        state
            .project_store
            .create(workspace.id.as_str(), &owner.id, name, None, None)
            .await
            .expect("create project")
    }

    #[tokio::test]
    async fn create_task_handler_applies_defaults() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let project = seed_project(&state, &workspace, &owner, "Roadmap").await;
        let member = create_user(&state, "member@example.com").await;
        state
            .workspace_store
            .add_member(workspace.id.as_str(), &member.id, Role::Member)
            .await
            .expect("add member");

        let headers = session_headers(&state, &member.id).await;
        let response = create_task_handler(
            State(state),
            headers,
            Path((workspace.id.to_string(), project.id.to_string())),
            Json(CreateTaskRequest {
                title: "  Draft announcement  ".to_string(),
                description: None,
                status: None,
                priority: None,
                assigned_to: None,
                due_date: None,
            }),
        )
        .await
        .expect("plain member may create tasks");

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: JsonValue = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["title"], "Draft announcement");
        assert_eq!(json["status"], DEFAULT_TASK_STATUS);
        assert_eq!(json["priority"], DEFAULT_TASK_PRIORITY);
        assert_eq!(json["projectId"], project.id.as_str());
        let code = json["taskCode"].as_str().expect("task code");
        assert!(code.starts_with("task-"));
    }

    #[tokio::test]
    async fn create_task_handler_canonicalizes_status_tokens() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let project = seed_project(&state, &workspace, &owner, "Roadmap").await;

        let headers = session_headers(&state, &owner.id).await;
        let response = create_task_handler(
            State(state),
            headers,
            Path((workspace.id.to_string(), project.id.to_string())),
            Json(CreateTaskRequest {
                title: "Review copy".to_string(),
                description: None,
                status: Some("in progress".to_string()),
                priority: Some("High".to_string()),
                assigned_to: None,
                due_date: None,
            }),
        )
        .await
        .expect("create task");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: JsonValue = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "IN_PROGRESS");
        assert_eq!(json["priority"], "HIGH");
    }

    #[tokio::test]
    async fn create_task_handler_rejects_unknown_status() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let project = seed_project(&state, &workspace, &owner, "Roadmap").await;

        let headers = session_headers(&state, &owner.id).await;
        let err = create_task_handler(
            State(state),
            headers,
            Path((workspace.id.to_string(), project.id.to_string())),
            Json(CreateTaskRequest {
                title: "Review copy".to_string(),
                description: None,
                status: Some("archived".to_string()),
                priority: None,
                assigned_to: None,
                due_date: None,
            }),
        )
        .await
        .expect_err("unknown status must be rejected");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload.message, "unknown task status");
    }

    #[tokio::test]
    async fn create_task_handler_rejects_non_member_assignee() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let project = seed_project(&state, &workspace, &owner, "Roadmap").await;
        let outsider = create_user(&state, "outsider@example.com").await;

        let headers = session_headers(&state, &owner.id).await;
        let err = create_task_handler(
            State(state),
            headers,
            Path((workspace.id.to_string(), project.id.to_string())),
            Json(CreateTaskRequest {
                title: "Review copy".to_string(),
                description: None,
                status: None,
                priority: None,
                assigned_to: Some(outsider.id.clone()),
                due_date: None,
            }),
        )
        .await
        .expect_err("assignee outside the workspace must be rejected");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload.message, "assignee is not a member of this workspace");
    }

    #[tokio::test]
    async fn create_task_handler_rejects_foreign_project() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let other = state
            .workspace_service
            .create_workspace_with_defaults(&owner.id, Some("Second"), None)
            .await
            .expect("create second workspace");
        let foreign_project = state
            .project_store
            .create(other.id.as_str(), &owner.id, "Elsewhere", None, None)
            .await
            .expect("create foreign project");

        let headers = session_headers(&state, &owner.id).await;
        let err = create_task_handler(
            State(state),
            headers,
            Path((workspace.id.to_string(), foreign_project.id.to_string())),
            Json(CreateTaskRequest {
                title: "Misfiled".to_string(),
                description: None,
                status: None,
                priority: None,
                assigned_to: None,
                due_date: None,
            }),
        )
        .await
        .expect_err("project of another workspace must not accept tasks");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(payload.name, "PROJECT_NOT_FOUND");
    }

    #[tokio::test]
    async fn list_tasks_handler_applies_filters() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let roadmap = seed_project(&state, &workspace, &owner, "Roadmap").await;
        let backlog = seed_project(&state, &workspace, &owner, "Backlog").await;

        state
            .task_store
            .create(
                workspace.id.as_str(),
                roadmap.id.as_str(),
                &owner.id,
                "Ship the beta",
                None,
                Some("IN_PROGRESS"),
                None,
                None,
                None,
            )
            .await
            .expect("create task");
        state
            .task_store
            .create(
                workspace.id.as_str(),
                roadmap.id.as_str(),
                &owner.id,
                "Close the books",
                None,
                Some("DONE"),
                None,
                None,
                None,
            )
            .await
            .expect("create task");
        state
            .task_store
            .create(
                workspace.id.as_str(),
                backlog.id.as_str(),
                &owner.id,
                "Ship swag",
                None,
                Some("TODO"),
                None,
                None,
                None,
            )
            .await
            .expect("create task");

        let headers = session_headers(&state, &owner.id).await;
        let response = list_tasks_handler(
            State(state.clone()),
            headers.clone(),
            Path(workspace.id.to_string()),
            Query(ListTasksQuery {
                project_id: Some(roadmap.id.to_string()),
                status: Some("in progress,done".to_string()),
                ..Default::default()
            }),
        )
        .await
        .expect("list tasks");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: JsonValue = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["total"], 2);
        assert_eq!(json["tasks"].as_array().map(Vec::len), Some(2));

        let response = list_tasks_handler(
            State(state),
            headers,
            Path(workspace.id.to_string()),
            Query(ListTasksQuery {
                keyword: Some("ship".to_string()),
                ..Default::default()
            }),
        )
        .await
        .expect("list tasks by keyword");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: JsonValue = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["total"], 2);
        let titles: Vec<&str> = json["tasks"]
            .as_array()
            .expect("tasks array")
            .iter()
            .filter_map(|task| task["title"].as_str())
            .collect();
        assert!(titles.contains(&"Ship the beta"));
        assert!(titles.contains(&"Ship swag"));
    }

    #[tokio::test]
    async fn list_tasks_handler_rejects_unknown_filter_status() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;

        let headers = session_headers(&state, &owner.id).await;
        let err = list_tasks_handler(
            State(state),
            headers,
            Path(workspace.id.to_string()),
            Query(ListTasksQuery {
                status: Some("todo,parked".to_string()),
                ..Default::default()
            }),
        )
        .await
        .expect_err("unknown filter token must be rejected");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload.message, "unknown task status");
    }

    #[tokio::test]
    async fn get_task_handler_hides_foreign_workspace_tasks() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let project = seed_project(&state, &workspace, &owner, "Roadmap").await;
        let other = state
            .workspace_service
            .create_workspace_with_defaults(&owner.id, Some("Second"), None)
            .await
            .expect("create second workspace");
        let task = state
            .task_store
            .create(
                workspace.id.as_str(),
                project.id.as_str(),
                &owner.id,
                "Private work",
                None,
                None,
                None,
                None,
                None,
            )
            .await
            .expect("create task");

        let headers = session_headers(&state, &owner.id).await;
        let err = get_task_handler(
            State(state),
            headers,
            Path((other.id.to_string(), task.id.to_string())),
        )
        .await
        .expect_err("task must not resolve under another workspace");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(payload.name, "TASK_NOT_FOUND");
    }

    #[tokio::test]
    async fn update_task_handler_moves_task_between_projects() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let roadmap = seed_project(&state, &workspace, &owner, "Roadmap").await;
        let backlog = seed_project(&state, &workspace, &owner, "Backlog").await;
        let task = state
            .task_store
            .create(
                workspace.id.as_str(),
                roadmap.id.as_str(),
                &owner.id,
                "Ship the beta",
                None,
                None,
                None,
                None,
                None,
            )
            .await
            .expect("create task");

        let headers = session_headers(&state, &owner.id).await;
        let response = update_task_handler(
            State(state),
            headers,
            Path((workspace.id.to_string(), task.id.to_string())),
            Some(Json(UpdateTaskRequest {
                project_id: Some(backlog.id.to_string()),
                status: Some("in review".to_string()),
                ..Default::default()
            })),
        )
        .await
        .expect("move task");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: JsonValue = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["projectId"], backlog.id.as_str());
        assert_eq!(json["status"], "IN_REVIEW");
    }

    #[tokio::test]
    async fn update_task_handler_rejects_move_to_foreign_project() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let project = seed_project(&state, &workspace, &owner, "Roadmap").await;
        let other = state
            .workspace_service
            .create_workspace_with_defaults(&owner.id, Some("Second"), None)
            .await
            .expect("create second workspace");
        let foreign_project = state
            .project_store
            .create(other.id.as_str(), &owner.id, "Elsewhere", None, None)
            .await
            .expect("create foreign project");
        let task = state
            .task_store
            .create(
                workspace.id.as_str(),
                project.id.as_str(),
                &owner.id,
                "Ship the beta",
                None,
                None,
                None,
                None,
                None,
            )
            .await
            .expect("create task");

        let headers = session_headers(&state, &owner.id).await;
        let err = update_task_handler(
            State(state),
            headers,
            Path((workspace.id.to_string(), task.id.to_string())),
            Some(Json(UpdateTaskRequest {
                project_id: Some(foreign_project.id.to_string()),
                ..Default::default()
            })),
        )
        .await
        .expect_err("moving into another workspace's project must fail");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(payload.name, "PROJECT_NOT_FOUND");
    }

    #[tokio::test]
    async fn update_task_handler_clears_assignee_with_null() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let project = seed_project(&state, &workspace, &owner, "Roadmap").await;
        let task = state
            .task_store
            .create(
                workspace.id.as_str(),
                project.id.as_str(),
                &owner.id,
                "Ship the beta",
                None,
                None,
                None,
                Some(&owner.id),
                Some(1_900_000_000),
            )
            .await
            .expect("create task");
        assert!(task.assigned_to.is_some());

        let headers = session_headers(&state, &owner.id).await;
        let response = update_task_handler(
            State(state),
            headers,
            Path((workspace.id.to_string(), task.id.to_string())),
            Some(Json(UpdateTaskRequest {
                assigned_to: Some(None),
                due_date: Some(None),
                ..Default::default()
            })),
        )
        .await
        .expect("clear assignee");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: JsonValue = serde_json::from_slice(&body).unwrap();
        assert!(json["assignedTo"].is_null());
        assert!(json["dueDate"].is_null());
    }

    #[tokio::test]
    async fn update_task_handler_allows_plain_members() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let project = seed_project(&state, &workspace, &owner, "Roadmap").await;
        let member = create_user(&state, "member@example.com").await;
        state
            .workspace_store
            .add_member(workspace.id.as_str(), &member.id, Role::Member)
            .await
            .expect("add member");
        let task = state
            .task_store
            .create(
                workspace.id.as_str(),
                project.id.as_str(),
                &owner.id,
                "Ship the beta",
                None,
                None,
                None,
                None,
                None,
            )
            .await
            .expect("create task");

        let headers = session_headers(&state, &member.id).await;
        let response = update_task_handler(
            State(state),
            headers,
            Path((workspace.id.to_string(), task.id.to_string())),
            Some(Json(UpdateTaskRequest {
                status: Some("done".to_string()),
                ..Default::default()
            })),
        )
        .await
        .expect("plain member may edit tasks");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: JsonValue = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "DONE");
    }

    #[tokio::test]
    async fn delete_task_handler_requires_permission() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let project = seed_project(&state, &workspace, &owner, "Roadmap").await;
        let member = create_user(&state, "member@example.com").await;
        state
            .workspace_store
            .add_member(workspace.id.as_str(), &member.id, Role::Member)
            .await
            .expect("add member");
        let task = state
            .task_store
            .create(
                workspace.id.as_str(),
                project.id.as_str(),
                &owner.id,
                "Ship the beta",
                None,
                None,
                None,
                None,
                None,
            )
            .await
            .expect("create task");

        let headers = session_headers(&state, &member.id).await;
        let err = delete_task_handler(
            State(state),
            headers,
            Path((workspace.id.to_string(), task.id.to_string())),
        )
        .await
        .expect_err("plain member must not delete tasks");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(payload.name, "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn delete_task_handler_removes_task() {
        let (_temp_dir, _database, state) = setup_state().await;
        let (workspace, owner) = seed_workspace(&state).await;
        let project = seed_project(&state, &workspace, &owner, "Roadmap").await;
        let task = state
            .task_store
            .create(
                workspace.id.as_str(),
                project.id.as_str(),
                &owner.id,
                "Ship the beta",
                None,
                None,
                None,
                None,
                None,
            )
            .await
            .expect("create task");

        let headers = session_headers(&state, &owner.id).await;
        delete_task_handler(
            State(state.clone()),
            headers,
            Path((workspace.id.to_string(), task.id.to_string())),
        )
        .await
        .expect("delete task");

        let remaining = state
            .task_store
            .find_by_id(task.id.as_str())
            .await
            .expect("find task");
        assert!(remaining.is_none());
    }
}
