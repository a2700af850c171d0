// Router configuration

use axum::{
    Router,
    http::Method,
    routing::{delete, get, post, put},
};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use axum_tracing_opentelemetry::middleware::{OtelAxumLayer, OtelInResponseLayer};
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{
        auth_handlers::*, health_handlers::*, member_handlers::*, project_handlers::*,
        task_handlers::*, user_handlers::*, workspace_handlers::*,
    },
    observability,
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    let base = build_base_router(state.clone());
    match state.server_path.as_deref() {
        Some(prefix) => Router::new().nest(prefix, base),
        None => base,
    }
}

fn build_base_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let router = Router::new()
        // Health & Info
        .route("/", get(index_handler))
        .route("/info", get(info_handler))
        .route("/health", get(health_handler))
        // Setup
        .route("/api/setup/create-admin", post(create_admin_handler))
        // Auth
        .route("/api/auth/sign-up", post(sign_up_handler))
        .route("/api/auth/sign-in", post(sign_in_handler))
        .route("/api/auth/sign-out", post(sign_out_handler))
        .route(
            "/api/auth/session",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route("/api/auth/sessions", get(list_sessions_handler))
        .route("/api/auth/session/refresh", post(refresh_session_handler))
        // Users
        .route("/api/users", get(get_users_handler))
        .route("/api/users/me", get(get_me_handler))
        .route("/api/users/{user_id}", get(get_user_handler))
        // Workspaces
        .route(
            "/api/workspaces",
            post(create_workspace_handler).get(list_workspaces_handler),
        )
        .route(
            "/api/workspaces/{workspace_id}",
            get(get_workspace_handler)
                .put(update_workspace_handler)
                .delete(delete_workspace_handler),
        )
        .route(
            "/api/workspaces/{workspace_id}/analytics",
            get(workspace_analytics_handler),
        )
        // Members
        .route(
            "/api/workspaces/{workspace_id}/members",
            get(list_members_handler),
        )
        .route(
            "/api/workspaces/{workspace_id}/members/{user_id}/role",
            put(change_member_role_handler),
        )
        .route(
            "/api/workspaces/{workspace_id}/members/{user_id}",
            delete(remove_member_handler),
        )
        .route(
            "/api/workspaces/{workspace_id}/members/leave",
            post(leave_workspace_handler),
        )
        .route(
            "/api/workspaces/{workspace_id}/invite/reset",
            post(reset_invite_code_handler),
        )
        .route(
            "/api/workspaces/join/{invite_code}",
            post(join_workspace_handler),
        )
        // Projects
        .route(
            "/api/workspaces/{workspace_id}/projects",
            post(create_project_handler).get(list_projects_handler),
        )
        .route(
            "/api/workspaces/{workspace_id}/projects/{project_id}",
            get(get_project_handler)
                .put(update_project_handler)
                .delete(delete_project_handler),
        )
        .route(
            "/api/workspaces/{workspace_id}/projects/{project_id}/analytics",
            get(project_analytics_handler),
        )
        // Tasks
        .route(
            "/api/workspaces/{workspace_id}/projects/{project_id}/tasks",
            post(create_task_handler),
        )
        .route(
            "/api/workspaces/{workspace_id}/tasks",
            get(list_tasks_handler),
        )
        .route(
            "/api/workspaces/{workspace_id}/tasks/{task_id}",
            get(get_task_handler)
                .put(update_task_handler)
                .delete(delete_task_handler),
        );

    let router = router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(observability::http_make_span())
                .on_response(observability::response_logger()),
        )
        .layer(cors)
        .layer(HttpMetricsLayerBuilder::new().build());

    let router = if observability::otel_layers_enabled() {
        router
            .layer(OtelInResponseLayer::default())
            .layer(OtelAxumLayer::default().filter(observability::should_sample_path))
    } else {
        router
    };

    router
        .layer(observability::request_context_layer())
        .with_state(state)
}
