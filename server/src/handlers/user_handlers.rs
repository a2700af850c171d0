// User management handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};

use crate::{
    auth::authenticate_rest_request,
    error::AppError,
    http::append_set_cookie_headers,
    state::AppState,
    types::{
        ListUsersQuery, ListUsersResponse, MeResponse, SessionUser, UserResponse, WorkspaceWithRole,
    },
    utils::users::normalize_list_params,
};

pub(crate) async fn get_users_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListUsersQuery>,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    state
        .user_service
        .ensure_admin_user(&auth.user.id, "administrator privileges required")
        .await?;

    let (first, skip, keyword) =
        normalize_list_params(params.skip, params.first, params.query.as_deref())?;

    let users = state
        .user_store
        .list_paginated(skip, first, keyword.as_deref())
        .await
        .map_err(AppError::from_anyhow)?;

    let total = state
        .user_store
        .count(keyword.as_deref())
        .await
        .map_err(AppError::from_anyhow)?;

    let response = ListUsersResponse {
        users: users.into_iter().map(UserResponse::from).collect(),
        total,
        skip,
        first,
    };

    let mut http_response = Json(response).into_response();
    append_set_cookie_headers(&mut http_response, &auth.set_cookies)?;
    Ok(http_response)
}

/// Profile of the calling user plus every workspace they belong to.
pub(crate) async fn get_me_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;

    let memberships = state
        .workspace_store
        .list_memberships_for_user(&auth.user.id)
        .await
        .map_err(AppError::from_anyhow)?;

    let response = MeResponse {
        user: SessionUser::from(&auth.user),
        workspaces: memberships
            .into_iter()
            .map(WorkspaceWithRole::from)
            .collect(),
    };

    let mut http_response = Json(response).into_response();
    append_set_cookie_headers(&mut http_response, &auth.set_cookies)?;
    Ok(http_response)
}

pub(crate) async fn get_user_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;
    let user = state.user_service.fetch_user(&user_id).await?;

    state
        .user_service
        .ensure_self_or_admin(&auth.user.id, &user_id, "administrator privileges required")
        .await?;

    let mut response = Json(UserResponse::from(user)).into_response();
    append_set_cookie_headers(&mut response, &auth.set_cookies)?;
    Ok(response)
}
