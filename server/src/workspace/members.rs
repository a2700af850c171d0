use crewspace_core::{rbac::Role, workspace::WorkspaceRecord};

use crate::{AppError, AppState};

/// Assigns a new role to a member. The owner's own membership is immutable
/// and OWNER itself is never assignable through this path.
pub async fn change_member_role(
    state: &AppState,
    workspace: &WorkspaceRecord,
    target_user_id: &str,
    requested_role: &str,
) -> Result<Role, AppError> {
    ensure_not_owner(workspace, target_user_id, "the owner role cannot be changed")?;

    let Some(role) = Role::parse(requested_role) else {
        return Err(AppError::bad_request("unknown role"));
    };

    if role == Role::Owner {
        return Err(AppError::bad_request("OWNER is not an assignable role"));
    }

    let changed = state
        .workspace_store
        .set_member_role(workspace.id.as_str(), target_user_id, role)
        .await
        .map_err(AppError::from_anyhow)?;

    if !changed {
        return Err(AppError::not_found("member not found in workspace"));
    }

    Ok(role)
}

pub async fn remove_member(
    state: &AppState,
    workspace: &WorkspaceRecord,
    target_user_id: &str,
) -> Result<(), AppError> {
    ensure_not_owner(workspace, target_user_id, "the workspace owner cannot be removed")?;

    let removed = state
        .workspace_store
        .remove_member(workspace.id.as_str(), target_user_id)
        .await
        .map_err(AppError::from_anyhow)?;

    if !removed {
        return Err(AppError::not_found("member not found in workspace"));
    }

    clear_current_workspace_pointer(state, target_user_id, workspace.id.as_str()).await
}

pub async fn leave_workspace(
    state: &AppState,
    workspace: &WorkspaceRecord,
    user_id: &str,
) -> Result<(), AppError> {
    ensure_not_owner(workspace, user_id, "workspace owner cannot leave")?;

    let removed = state
        .workspace_store
        .remove_member(workspace.id.as_str(), user_id)
        .await
        .map_err(AppError::from_anyhow)?;

    if !removed {
        return Err(AppError::not_found("member not found in workspace"));
    }

    clear_current_workspace_pointer(state, user_id, workspace.id.as_str()).await
}

fn ensure_not_owner(
    workspace: &WorkspaceRecord,
    user_id: &str,
    error_message: &'static str,
) -> Result<(), AppError> {
    if workspace.owner_id.as_str() == user_id {
        Err(AppError::bad_request(error_message))
    } else {
        Ok(())
    }
}

/// A user who just lost a membership keeps no dangling pointer to it.
async fn clear_current_workspace_pointer(
    state: &AppState,
    user_id: &str,
    workspace_id: &str,
) -> Result<(), AppError> {
    let Some(user) = state
        .user_store
        .find_by_id(user_id)
        .await
        .map_err(AppError::from_anyhow)?
    else {
        return Ok(());
    };

    if user.current_workspace_id.as_deref() == Some(workspace_id) {
        state
            .user_store
            .set_current_workspace(user_id, None)
            .await
            .map_err(AppError::from_anyhow)?;
    }

    Ok(())
}
