use crate::ids::{UserId, WorkspaceId};

#[derive(Debug, Clone)]
pub struct WorkspaceMemberRecord {
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    pub role: String,
    pub joined_at: i64,
}
