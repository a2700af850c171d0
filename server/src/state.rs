use std::env;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::{
    spawn,
    time::{sleep, Duration},
};
use tracing::{info, warn};

use crewspace_core::{
    db::Database, project::ProjectStore, task::TaskStore, user::UserStore,
    workspace::WorkspaceStore,
};

use crate::user::service::UserService;
use crate::workspace::service::WorkspaceService;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone)]
pub struct AppState {
    pub user_store: UserStore,
    pub workspace_store: WorkspaceStore,
    pub project_store: ProjectStore,
    pub task_store: TaskStore,
    pub user_service: Arc<UserService>,
    pub workspace_service: Arc<WorkspaceService>,
    pub metadata: ServerMetadata,
    pub server_path: Option<String>,
}

#[derive(Clone, Serialize)]
pub struct ServerMetadata {
    pub compatibility: String,
    pub message: String,
    #[serde(rename = "type")]
    pub deployment_type: String,
    pub flavor: String,
}

impl ServerMetadata {
    pub fn load() -> Self {
        let compatibility = env::var("CREWSPACE_VERSION")
            .or_else(|_| env::var("CREWSPACE_COMPATIBILITY"))
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());
        let deployment_type = env::var("DEPLOYMENT_TYPE")
            .or_else(|_| env::var("CREWSPACE_DEPLOYMENT_TYPE"))
            .unwrap_or_else(|_| "selfhosted".to_string());
        let flavor = env::var("SERVER_FLAVOR")
            .or_else(|_| env::var("CREWSPACE_FLAVOR"))
            .unwrap_or_else(|_| "allinone".to_string());
        let message = env::var("CREWSPACE_SERVER_MESSAGE")
            .unwrap_or_else(|_| format!("Crewspace {compatibility} Server"));

        Self {
            compatibility,
            message,
            deployment_type,
            flavor,
        }
    }
}

/// Optional URL prefix the router is mounted under, from `CREWSPACE_SERVER_PATH`
/// or `CREWSPACE_SERVER_SUB_PATH`. Returns `None` when unset or `/`.
pub fn detect_server_path() -> Option<String> {
    for key in ["CREWSPACE_SERVER_PATH", "CREWSPACE_SERVER_SUB_PATH"] {
        let Ok(raw) = env::var(key) else {
            continue;
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut path = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        };
        while path.len() > 1 && path.ends_with('/') {
            path.pop();
        }
        if path == "/" {
            return None;
        }
        return Some(path);
    }
    None
}

pub fn build_state(database: &Database) -> AppState {
    let user_store = UserStore::new(database);
    let workspace_store = WorkspaceStore::new(database);
    let project_store = ProjectStore::new(database);
    let task_store = TaskStore::new(database);

    let user_service = Arc::new(UserService::new(user_store.clone()));
    let workspace_service = Arc::new(WorkspaceService::new(
        workspace_store.clone(),
        user_store.clone(),
    ));

    let state = AppState {
        user_store,
        workspace_store,
        project_store,
        task_store,
        user_service,
        workspace_service,
        metadata: ServerMetadata::load(),
        server_path: detect_server_path(),
    };

    spawn_background_tasks(&state);
    state
}

fn spawn_background_tasks(state: &AppState) {
    start_session_sweeper(state.user_store.clone());
}

fn start_session_sweeper(user_store: UserStore) {
    spawn(async move {
        loop {
            match user_store.delete_expired_sessions(Utc::now().timestamp()).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "removed expired sessions"),
                Err(err) => warn!(error = %err, "session sweep failed"),
            }
            sleep(SESSION_SWEEP_INTERVAL).await;
        }
    });
}
