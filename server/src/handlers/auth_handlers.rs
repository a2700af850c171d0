// Authentication and session management handlers

use std::sync::OnceLock;

use argon2::password_hash::Error as PasswordHashError;
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tokio::sync::Mutex;

use crate::{
    auth::{
        authenticate_rest_request, authenticate_with_password, generate_password_hash,
        pad_session_response,
    },
    cookies::{USER_COOKIE_NAME, extract_cookie, extract_session_token},
    error::AppError,
    handlers::session_cookies::SessionCookies,
    http::append_set_cookie_headers,
    observability::record_authenticated_identity,
    state::AppState,
    types::{
        CreateAdminUserRequest, CreateUserResponse, DeleteSessionRequest, RefreshSessionRequest,
        RefreshSessionResponse, SessionInfo, SessionUser, SessionUserPayload, SessionsPayload,
        SignInRequest, SignUpRequest,
    },
    utils::{db::is_unique_violation, users::is_valid_email},
};

// Serializes concurrent create-admin calls so the "first user" check
// cannot race against the insert.
static CREATE_ADMIN_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

pub(crate) async fn create_admin_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateAdminUserRequest>,
) -> Result<Response, AppError> {
    let _guard = CREATE_ADMIN_MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .await;
    create_admin_locked(state, payload).await
}

async fn create_admin_locked(
    state: AppState,
    payload: CreateAdminUserRequest,
) -> Result<Response, AppError> {
    let existing = state
        .user_store
        .count(None)
        .await
        .map_err(AppError::from_anyhow)?;
    if existing > 0 {
        return Err(AppError::forbidden("First user already created"));
    }

    let email = payload.email.trim();
    if !is_valid_email(email) {
        return Err(AppError::bad_request("invalid email address"));
    }
    if payload.password.is_empty() {
        return Err(AppError::bad_request("password is required"));
    }

    let password_hash = generate_password_hash(&payload.password)
        .map_err(|err: PasswordHashError| AppError::internal(err.into()))?;

    let user = state
        .user_store
        .create(email, &password_hash, None)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::conflict("user already exists")
            } else {
                AppError::from_anyhow(err)
            }
        })?;

    state
        .user_store
        .add_admin(&user.id)
        .await
        .map_err(AppError::from_anyhow)?;

    let session = state
        .user_store
        .create_session(&user.id)
        .await
        .map_err(AppError::from_anyhow)?;

    let mut response = Json(CreateUserResponse {
        id: user.id.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
    })
    .into_response();
    SessionCookies::new()
        .set_pair(&session.id, &session.user_id, session.expires_at)
        .apply(&mut response)?;
    Ok(response)
}

pub(crate) async fn sign_up_handler(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<Response, AppError> {
    let email = payload.email.trim();
    if !is_valid_email(email) {
        return Err(AppError::bad_request("invalid email address"));
    }
    if payload.password.is_empty() {
        return Err(AppError::bad_request("password is required"));
    }

    let password_hash = generate_password_hash(&payload.password)
        .map_err(|err: PasswordHashError| AppError::internal(err.into()))?;

    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let mut user = state
        .user_store
        .create(email, &password_hash, name)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::conflict("user already exists")
            } else {
                AppError::from_anyhow(err)
            }
        })?;

    // Every fresh account starts with a personal workspace.
    let workspace = state
        .workspace_service
        .create_workspace_with_defaults(&user.id, None, None)
        .await?;
    user.current_workspace_id = Some(workspace.id.to_string());

    let session = state
        .user_store
        .create_session(&user.id)
        .await
        .map_err(AppError::from_anyhow)?;

    record_authenticated_identity(Some(&user.id), Some(&session.id));

    let mut response = Json(SessionUser::from(&user)).into_response();
    *response.status_mut() = StatusCode::CREATED;
    SessionCookies::new()
        .set_pair(&session.id, &session.user_id, session.expires_at)
        .apply(&mut response)?;
    Ok(response)
}

pub(crate) async fn sign_in_handler(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> Result<Response, AppError> {
    let email = payload.email.trim();
    if email.is_empty() {
        return Err(AppError::bad_request("email is required"));
    }
    if payload.password.is_empty() {
        return Err(AppError::bad_request("password is required"));
    }

    let (user, session) = authenticate_with_password(&state, email, &payload.password).await?;

    record_authenticated_identity(Some(&user.id), Some(&session.id));

    let mut response = Json(SessionUser::from(&user)).into_response();
    SessionCookies::new()
        .set_pair(&session.id, &session.user_id, session.expires_at)
        .apply(&mut response)?;
    Ok(response)
}

pub(crate) async fn sign_out_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if let Some(session_id) = extract_session_token(&headers) {
        state.user_service.delete_session(&session_id).await?;
    }

    let mut response = Json(json!({})).into_response();
    SessionCookies::new().clear_pair().apply(&mut response)?;
    Ok(response)
}

pub(crate) async fn get_session_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let lookup = pad_session_response(&state, &headers).await?;

    let mut response = Json(SessionUserPayload { user: lookup.user }).into_response();
    append_set_cookie_headers(&mut response, &lookup.cookies)?;
    Ok(response)
}

pub(crate) async fn delete_session_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<DeleteSessionRequest>>,
) -> Result<Response, AppError> {
    let payload = body.map(|wrapper| wrapper.0).unwrap_or_default();
    let cookie_session = extract_session_token(&headers);

    let Some(session_id) = payload.session_id.clone().or_else(|| cookie_session.clone()) else {
        let mut response = Json(json!({})).into_response();
        SessionCookies::new().clear_pair().apply(&mut response)?;
        return Ok(response);
    };

    if let Some(session) = state
        .user_store
        .find_session(&session_id)
        .await
        .map_err(AppError::from_anyhow)?
    {
        let requester = payload
            .user_id
            .clone()
            .or_else(|| extract_cookie(&headers, USER_COOKIE_NAME));
        if let Some(requester_id) = requester {
            if requester_id != session.user_id {
                return Err(AppError::unauthorized(
                    "session does not belong to requesting user",
                ));
            }
        }
        state.user_service.delete_session(&session.id).await?;
    }

    let mut response = Json(json!({})).into_response();
    // Only drop the browser cookies when the deleted session is the one
    // this request authenticated with.
    if cookie_session.as_deref() == Some(session_id.as_str()) {
        SessionCookies::new().clear_pair().apply(&mut response)?;
    }
    Ok(response)
}

pub(crate) async fn list_sessions_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let auth = authenticate_rest_request(&state, &headers).await?;

    let sessions = state
        .user_store
        .list_sessions_by_user(&auth.user.id)
        .await
        .map_err(AppError::from_anyhow)?;

    let payload = SessionsPayload {
        sessions: sessions.into_iter().map(SessionInfo::from).collect(),
    };

    let mut response = Json(payload).into_response();
    append_set_cookie_headers(&mut response, &auth.set_cookies)?;
    Ok(response)
}

pub(crate) async fn refresh_session_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<RefreshSessionRequest>>,
) -> Result<Response, AppError> {
    let payload = body.map(|wrapper| wrapper.0).unwrap_or_default();

    let Some(session_id) = payload
        .session_id
        .clone()
        .or_else(|| extract_session_token(&headers))
    else {
        return Err(AppError::unauthorized("session id is required"));
    };

    let Some(session) = state
        .user_store
        .refresh_session(&session_id)
        .await
        .map_err(AppError::from_anyhow)?
    else {
        let mut response = Json(json!({})).into_response();
        *response.status_mut() = StatusCode::UNAUTHORIZED;
        SessionCookies::new().clear_pair().apply(&mut response)?;
        return Ok(response);
    };

    let requester = payload
        .user_id
        .clone()
        .or_else(|| extract_cookie(&headers, USER_COOKIE_NAME));
    if let Some(requester_id) = requester {
        if requester_id != session.user_id {
            return Err(AppError::unauthorized(
                "session does not belong to requesting user",
            ));
        }
    }

    record_authenticated_identity(Some(&session.user_id), Some(&session.id));

    let mut response = Json(RefreshSessionResponse {
        session_id: session.id.clone(),
        user_id: session.user_id.clone(),
        expires_at: session.expires_at,
    })
    .into_response();
    SessionCookies::new()
        .set_pair(&session.id, &session.user_id, session.expires_at)
        .apply(&mut response)?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::to_bytes,
        http::{
            HeaderValue,
            header::{COOKIE, SET_COOKIE},
            response::Parts,
        },
    };
    use chrono::Utc;
    use serde_json::Value as JsonValue;

    use super::*;
    use crate::{
        cookies::SESSION_COOKIE_NAME,
        test_support::{create_user, setup_state},
    };

    fn cookie_headers(session_id: &str, user_id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!(
                "{SESSION_COOKIE_NAME}={session_id}; {USER_COOKIE_NAME}={user_id}"
            ))
            .expect("cookie header"),
        );
        headers
    }

    fn set_cookie_values(parts: &Parts) -> Vec<String> {
        parts
            .headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|value| value.to_str().expect("cookie value").to_owned())
            .collect()
    }

    #[tokio::test]
    async fn create_admin_creates_first_user_with_session() {
        let (_temp_dir, _database, state) = setup_state().await;

        let response = create_admin_handler(
            State(state.clone()),
            Json(CreateAdminUserRequest {
                email: "admin@example.com".to_string(),
                password: "secret".to_string(),
            }),
        )
        .await
        .expect("create admin");

        let (parts, body) = response.into_parts();
        assert_eq!(parts.status, StatusCode::OK);

        let cookies = set_cookie_values(&parts);
        assert!(
            cookies
                .iter()
                .any(|cookie| cookie.starts_with(&format!("{SESSION_COOKIE_NAME}=")))
        );
        assert!(
            cookies
                .iter()
                .any(|cookie| cookie.starts_with(&format!("{USER_COOKIE_NAME}=")))
        );

        let bytes = to_bytes(body, usize::MAX).await.expect("read body");
        let json: JsonValue = serde_json::from_slice(&bytes).expect("parse body");
        assert_eq!(json["email"], "admin@example.com");

        let user_id = json["id"].as_str().expect("user id").to_owned();
        assert!(
            state
                .user_store
                .is_admin(&user_id)
                .await
                .expect("admin check")
        );
    }

    #[tokio::test]
    async fn create_admin_rejects_second_account() {
        let (_temp_dir, _database, state) = setup_state().await;
        create_user(&state, "first@example.com").await;

        let err = create_admin_handler(
            State(state),
            Json(CreateAdminUserRequest {
                email: "admin@example.com".to_string(),
                password: "secret".to_string(),
            }),
        )
        .await
        .expect_err("second admin must be rejected");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(payload.message, "First user already created");
    }

    #[tokio::test]
    async fn sign_up_provisions_default_workspace() {
        let (_temp_dir, _database, state) = setup_state().await;

        let response = sign_up_handler(
            State(state.clone()),
            Json(SignUpRequest {
                email: "new@example.com".to_string(),
                password: "secret".to_string(),
                name: Some("New User".to_string()),
            }),
        )
        .await
        .expect("sign up");

        let (parts, body) = response.into_parts();
        assert_eq!(parts.status, StatusCode::CREATED);

        let cookies = set_cookie_values(&parts);
        assert!(
            cookies
                .iter()
                .any(|cookie| cookie.starts_with(&format!("{SESSION_COOKIE_NAME}=")))
        );

        let bytes = to_bytes(body, usize::MAX).await.expect("read body");
        let json: JsonValue = serde_json::from_slice(&bytes).expect("parse body");
        assert_eq!(json["email"], "new@example.com");
        let workspace_id = json["currentWorkspaceId"]
            .as_str()
            .expect("workspace id")
            .to_owned();
        let user_id = json["id"].as_str().expect("user id").to_owned();

        let memberships = state
            .workspace_store
            .list_memberships_for_user(&user_id)
            .await
            .expect("list memberships");
        assert_eq!(memberships.len(), 1);
        assert_eq!(memberships[0].workspace_id.as_str(), workspace_id);
        assert_eq!(memberships[0].workspace_name, "My Workspace");
        assert_eq!(memberships[0].role, "OWNER");
    }

    #[tokio::test]
    async fn sign_up_rejects_duplicate_email() {
        let (_temp_dir, _database, state) = setup_state().await;
        create_user(&state, "taken@example.com").await;

        let err = sign_up_handler(
            State(state),
            Json(SignUpRequest {
                email: "taken@example.com".to_string(),
                password: "secret".to_string(),
                name: None,
            }),
        )
        .await
        .expect_err("duplicate email must be rejected");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(payload.message, "user already exists");
    }

    #[tokio::test]
    async fn sign_up_rejects_malformed_email() {
        let (_temp_dir, _database, state) = setup_state().await;

        let err = sign_up_handler(
            State(state),
            Json(SignUpRequest {
                email: "not-an-email".to_string(),
                password: "secret".to_string(),
                name: None,
            }),
        )
        .await
        .expect_err("malformed email must be rejected");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(payload.message, "invalid email address");
    }

    #[tokio::test]
    async fn sign_in_returns_session_user_with_cookies() {
        let (_temp_dir, _database, state) = setup_state().await;
        let user = create_user(&state, "login@example.com").await;

        let response = sign_in_handler(
            State(state),
            Json(SignInRequest {
                email: "login@example.com".to_string(),
                password: "password".to_string(),
            }),
        )
        .await
        .expect("sign in");

        let (parts, body) = response.into_parts();
        assert_eq!(parts.status, StatusCode::OK);
        let cookies = set_cookie_values(&parts);
        assert!(
            cookies
                .iter()
                .any(|cookie| cookie.starts_with(&format!("{USER_COOKIE_NAME}={}", user.id)))
        );

        let bytes = to_bytes(body, usize::MAX).await.expect("read body");
        let json: JsonValue = serde_json::from_slice(&bytes).expect("parse body");
        assert_eq!(json["id"], user.id.as_str());
        assert_eq!(json["hasPassword"], true);
    }

    #[tokio::test]
    async fn sign_in_rejects_wrong_password() {
        let (_temp_dir, _database, state) = setup_state().await;
        create_user(&state, "login@example.com").await;

        let err = sign_in_handler(
            State(state),
            Json(SignInRequest {
                email: "login@example.com".to_string(),
                password: "wrong".to_string(),
            }),
        )
        .await
        .expect_err("wrong password must be rejected");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(payload.message, "invalid credentials");
    }

    #[tokio::test]
    async fn sign_in_rejects_disabled_account() {
        let (_temp_dir, database, state) = setup_state().await;
        create_user(&state, "off@example.com").await;
        sqlx::query("UPDATE users SET disabled = 1 WHERE email = ?")
            .bind("off@example.com")
            .execute(database.pool())
            .await
            .expect("disable user");

        let err = sign_in_handler(
            State(state),
            Json(SignInRequest {
                email: "off@example.com".to_string(),
                password: "password".to_string(),
            }),
        )
        .await
        .expect_err("disabled account must not sign in");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(payload.message, "invalid credentials");
    }

    #[tokio::test]
    async fn get_session_returns_current_user() {
        let (_temp_dir, _database, state) = setup_state().await;
        let user = create_user(&state, "session@example.com").await;
        let session = state
            .user_store
            .create_session(&user.id)
            .await
            .expect("create session");

        let headers = cookie_headers(&session.id, &user.id);
        let response = get_session_handler(State(state), headers)
            .await
            .expect("get session");

        let (parts, body) = response.into_parts();
        assert_eq!(parts.status, StatusCode::OK);
        let bytes = to_bytes(body, usize::MAX).await.expect("read body");
        let json: JsonValue = serde_json::from_slice(&bytes).expect("parse body");
        assert_eq!(json["user"]["id"], user.id.as_str());
        assert_eq!(json["user"]["hasPassword"], true);
    }

    #[tokio::test]
    async fn get_session_clears_stale_cookies() {
        let (_temp_dir, _database, state) = setup_state().await;

        let headers = cookie_headers("no-such-session", "no-such-user");
        let response = get_session_handler(State(state), headers)
            .await
            .expect("get session");

        let (parts, body) = response.into_parts();
        assert_eq!(parts.status, StatusCode::OK);
        let cookies = set_cookie_values(&parts);
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|cookie| cookie.contains("Max-Age=0")));

        let bytes = to_bytes(body, usize::MAX).await.expect("read body");
        let json: JsonValue = serde_json::from_slice(&bytes).expect("parse body");
        assert!(json.get("user").map(JsonValue::is_null).unwrap_or(true));
    }

    #[tokio::test]
    async fn sign_out_deletes_session_and_clears_cookies() {
        let (_temp_dir, _database, state) = setup_state().await;
        let user = create_user(&state, "bye@example.com").await;
        let session = state
            .user_store
            .create_session(&user.id)
            .await
            .expect("create session");

        let headers = cookie_headers(&session.id, &user.id);
        let response = sign_out_handler(State(state.clone()), headers)
            .await
            .expect("sign out");

        let (parts, _body) = response.into_parts();
        assert_eq!(parts.status, StatusCode::OK);
        let cookies = set_cookie_values(&parts);
        assert!(cookies.iter().any(|cookie| {
            cookie.starts_with(&format!("{SESSION_COOKIE_NAME}=")) && cookie.contains("Max-Age=0")
        }));

        let stored = state
            .user_store
            .find_session(&session.id)
            .await
            .expect("find session");
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn delete_session_rejects_foreign_requester() {
        let (_temp_dir, _database, state) = setup_state().await;
        let user = create_user(&state, "owner@example.com").await;
        let session = state
            .user_store
            .create_session(&user.id)
            .await
            .expect("create session");

        let err = delete_session_handler(
            State(state),
            HeaderMap::new(),
            Some(Json(DeleteSessionRequest {
                session_id: Some(session.id.clone()),
                user_id: Some("someone-else".to_string()),
            })),
        )
        .await
        .expect_err("foreign requester must be rejected");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(payload.message, "session does not belong to requesting user");
    }

    #[tokio::test]
    async fn list_sessions_returns_all_active_sessions() {
        let (_temp_dir, _database, state) = setup_state().await;
        let user = create_user(&state, "multi@example.com").await;
        let first = state
            .user_store
            .create_session(&user.id)
            .await
            .expect("create session");
        let second = state
            .user_store
            .create_session(&user.id)
            .await
            .expect("create session");

        let headers = cookie_headers(&first.id, &user.id);
        let response = list_sessions_handler(State(state), headers)
            .await
            .expect("list sessions");

        let (parts, body) = response.into_parts();
        assert_eq!(parts.status, StatusCode::OK);
        let bytes = to_bytes(body, usize::MAX).await.expect("read body");
        let json: JsonValue = serde_json::from_slice(&bytes).expect("parse body");
        let sessions = json["sessions"].as_array().expect("sessions array");
        assert_eq!(sessions.len(), 2);
        let ids: Vec<&str> = sessions
            .iter()
            .filter_map(|session| session["id"].as_str())
            .collect();
        assert!(ids.contains(&first.id.as_str()));
        assert!(ids.contains(&second.id.as_str()));
    }

    #[tokio::test]
    async fn refresh_session_extends_expiry() {
        let (_temp_dir, database, state) = setup_state().await;
        let user = create_user(&state, "fresh@example.com").await;
        let session = state
            .user_store
            .create_session(&user.id)
            .await
            .expect("create session");

        let soon = Utc::now().timestamp() + 60;
        sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
            .bind(soon)
            .bind(&session.id)
            .execute(database.pool())
            .await
            .expect("shrink expiry");

        let response = refresh_session_handler(
            State(state),
            HeaderMap::new(),
            Some(Json(RefreshSessionRequest {
                session_id: Some(session.id.clone()),
                user_id: Some(user.id.clone()),
            })),
        )
        .await
        .expect("refresh session");

        let (parts, body) = response.into_parts();
        assert_eq!(parts.status, StatusCode::OK);
        let bytes = to_bytes(body, usize::MAX).await.expect("read body");
        let json: JsonValue = serde_json::from_slice(&bytes).expect("parse body");
        assert_eq!(json["sessionId"], session.id.as_str());
        assert_eq!(json["userId"], user.id.as_str());
        assert!(json["expiresAt"].as_i64().expect("expiry") > soon);
    }

    #[tokio::test]
    async fn refresh_session_rejects_unknown_session() {
        let (_temp_dir, _database, state) = setup_state().await;

        let response = refresh_session_handler(
            State(state),
            HeaderMap::new(),
            Some(Json(RefreshSessionRequest {
                session_id: Some("no-such-session".to_string()),
                user_id: None,
            })),
        )
        .await
        .expect("refresh returns a response");

        let (parts, _body) = response.into_parts();
        assert_eq!(parts.status, StatusCode::UNAUTHORIZED);
        let cookies = set_cookie_values(&parts);
        assert!(cookies.iter().all(|cookie| cookie.contains("Max-Age=0")));
    }

    #[tokio::test]
    async fn refresh_session_requires_an_id() {
        let (_temp_dir, _database, state) = setup_state().await;

        let err = refresh_session_handler(State(state), HeaderMap::new(), None)
            .await
            .expect_err("missing session id must be rejected");

        let (status, payload) = err.into_payload();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(payload.message, "session id is required");
    }
}
