//! Identity model - principals resolved from the identity directory.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Roles in ascending order of privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Employee,
    Manager,
    HrManager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employee => "EMPLOYEE",
            Role::Manager => "MANAGER",
            Role::HrManager => "HR_MANAGER",
            Role::Admin => "ADMIN",
        }
    }

    /// Whether this role meets `required` in the role hierarchy.
    pub fn satisfies(&self, required: Role) -> bool {
        *self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    ViewDashboard,
    MarkAttendance,
    ViewHistory,
    ViewReports,
    ManageInvoices,
    ManageUsers,
    ViewSecurityLogs,
    ManageRoles,
}

impl Permission {
    pub const ALL: [Permission; 8] = [
        Permission::ViewDashboard,
        Permission::MarkAttendance,
        Permission::ViewHistory,
        Permission::ViewReports,
        Permission::ManageInvoices,
        Permission::ManageUsers,
        Permission::ViewSecurityLogs,
        Permission::ManageRoles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewDashboard => "VIEW_DASHBOARD",
            Permission::MarkAttendance => "MARK_ATTENDANCE",
            Permission::ViewHistory => "VIEW_HISTORY",
            Permission::ViewReports => "VIEW_REPORTS",
            Permission::ManageInvoices => "MANAGE_INVOICES",
            Permission::ManageUsers => "MANAGE_USERS",
            Permission::ViewSecurityLogs => "VIEW_SECURITY_LOGS",
            Permission::ManageRoles => "MANAGE_ROLES",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity record as returned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub permissions: HashSet<Permission>,
    pub active: bool,
}

impl Identity {
    /// Create an active identity.
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: email.into(),
            role,
            permissions: permissions.into_iter().collect(),
            active: true,
        }
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}
