#![allow(dead_code)]

use crewspace_core::{
    config::AppConfig, db::Database, user::UserRecord, workspace::WorkspaceRecord,
};
use tempfile::TempDir;

use crate::{
    auth::generate_password_hash,
    state::{AppState, build_state},
    utils::db::run_migrations,
};

pub(crate) async fn setup_state() -> (TempDir, Database, AppState) {
    let temp_dir = tempfile::tempdir().expect("create temp dir");
    let mut config = AppConfig::default();
    let db_path = temp_dir.path().join("test.db");
    config.database_path = db_path.to_string_lossy().into_owned();

    let database = Database::connect(&config).await.expect("connect database");
    run_migrations(database.pool())
        .await
        .expect("apply migrations");

    let state = build_state(&database);
    state
        .workspace_store
        .normalize_member_roles()
        .await
        .expect("normalize member roles");

    (temp_dir, database, state)
}

pub(crate) async fn create_user(state: &AppState, email: &str) -> UserRecord {
    let password_hash = generate_password_hash("password").expect("hash password");
    state
        .user_store
        .create(email, &password_hash, None)
        .await
        .expect("create user")
}

/// Seeds an owner account plus a workspace whose membership row already exists.
pub(crate) async fn seed_workspace(state: &AppState) -> (WorkspaceRecord, UserRecord) {
    let owner = create_user(state, "owner@example.com").await;
    let workspace = state
        .workspace_store
        .create(&owner.id, Some("Test Workspace"), None)
        .await
        .expect("create workspace");
    state
        .user_store
        .set_current_workspace(&owner.id, Some(workspace.id.as_str()))
        .await
        .expect("set current workspace");
    (workspace, owner)
}
