//! Role-based access control registry.
//!
//! Workspace membership carries one of three roles. Each role resolves to a
//! fixed set of capability tokens through [`permissions_for`]; the mapping is
//! built once per process and never mutated afterwards. Authorization is a
//! plain bitset membership test, so callers can run it on every request
//! without locking or allocation.

use std::fmt;

use once_cell::sync::Lazy;

/// Workspace role, stored in the members table as its uppercase token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    Owner = 0,
    Admin = 1,
    Member = 2,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Owner, Role::Admin, Role::Member];

    /// Roles that can be granted through the member role endpoint. Ownership
    /// is fixed at workspace creation and never reassigned.
    pub const ASSIGNABLE: [Role; 2] = [Role::Admin, Role::Member];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
        }
    }

    /// Parses a stored role token. Matching is case-insensitive; anything
    /// outside the closed set is a data error the caller must surface as an
    /// internal fault, not as user input validation.
    pub fn parse(value: &str) -> Option<Role> {
        let token = value.trim();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability token checked before an operation runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    CreateWorkspace = 0,
    EditWorkspace = 1,
    DeleteWorkspace = 2,
    ManageWorkspaceSettings = 3,
    AddMember = 4,
    ChangeMemberRole = 5,
    RemoveMember = 6,
    CreateProject = 7,
    EditProject = 8,
    DeleteProject = 9,
    CreateTask = 10,
    EditTask = 11,
    DeleteTask = 12,
    ViewOnly = 13,
}

impl Permission {
    pub const ALL: [Permission; 14] = [
        Permission::CreateWorkspace,
        Permission::EditWorkspace,
        Permission::DeleteWorkspace,
        Permission::ManageWorkspaceSettings,
        Permission::AddMember,
        Permission::ChangeMemberRole,
        Permission::RemoveMember,
        Permission::CreateProject,
        Permission::EditProject,
        Permission::DeleteProject,
        Permission::CreateTask,
        Permission::EditTask,
        Permission::DeleteTask,
        Permission::ViewOnly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Permission::CreateWorkspace => "CREATE_WORKSPACE",
            Permission::EditWorkspace => "EDIT_WORKSPACE",
            Permission::DeleteWorkspace => "DELETE_WORKSPACE",
            Permission::ManageWorkspaceSettings => "MANAGE_WORKSPACE_SETTINGS",
            Permission::AddMember => "ADD_MEMBER",
            Permission::ChangeMemberRole => "CHANGE_MEMBER_ROLE",
            Permission::RemoveMember => "REMOVE_MEMBER",
            Permission::CreateProject => "CREATE_PROJECT",
            Permission::EditProject => "EDIT_PROJECT",
            Permission::DeleteProject => "DELETE_PROJECT",
            Permission::CreateTask => "CREATE_TASK",
            Permission::EditTask => "EDIT_TASK",
            Permission::DeleteTask => "DELETE_TASK",
            Permission::ViewOnly => "VIEW_ONLY",
        }
    }

    const fn bit(self) -> u32 {
        1 << self as u32
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed bitset over the closed [`Permission`] enumeration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PermissionSet(u32);

impl PermissionSet {
    pub const EMPTY: PermissionSet = PermissionSet(0);

    pub const fn with(self, permission: Permission) -> PermissionSet {
        PermissionSet(self.0 | permission.bit())
    }

    pub const fn contains(self, permission: Permission) -> bool {
        self.0 & permission.bit() != 0
    }

    /// True when every permission in `other` is also present in `self`.
    pub const fn contains_all(self, other: PermissionSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Permission> {
        Permission::ALL
            .into_iter()
            .filter(move |permission| self.contains(*permission))
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for permission in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(permission.as_str())?;
            first = false;
        }
        Ok(())
    }
}

/// Outcome of a permission check. Denial is a normal result, not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied,
}

impl AccessDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }
}

static ROLE_GRANTS: Lazy<[PermissionSet; Role::ALL.len()]> = Lazy::new(|| {
    let mut table = [PermissionSet::EMPTY; Role::ALL.len()];
    for role in Role::ALL {
        table[role as usize] = grants_for(role);
    }
    table
});

/// Resolves the permission set of a role. Total over [`Role`]; repeated calls
/// read the same process-wide table.
pub fn permissions_for(role: Role) -> PermissionSet {
    ROLE_GRANTS[role as usize]
}

/// Checks `required` against the grants of `role`.
pub fn authorize(role: Role, required: Permission) -> AccessDecision {
    if permissions_for(role).contains(required) {
        AccessDecision::Allowed
    } else {
        AccessDecision::Denied
    }
}

fn grants_for(role: Role) -> PermissionSet {
    // Anyone with a membership row can read workspace content.
    let mut grants = PermissionSet::EMPTY.with(Permission::ViewOnly);

    if matches!(role, Role::Member | Role::Admin | Role::Owner) {
        grants = grants
            .with(Permission::CreateTask)
            .with(Permission::EditTask);
    }

    if matches!(role, Role::Admin | Role::Owner) {
        grants = grants
            .with(Permission::AddMember)
            .with(Permission::CreateProject)
            .with(Permission::EditProject)
            .with(Permission::DeleteProject)
            .with(Permission::DeleteTask)
            .with(Permission::ManageWorkspaceSettings);
    }

    if matches!(role, Role::Owner) {
        grants = grants
            .with(Permission::CreateWorkspace)
            .with(Permission::EditWorkspace)
            .with(Permission::DeleteWorkspace)
            .with(Permission::ChangeMemberRole)
            .with(Permission::RemoveMember);
    }

    grants
}
