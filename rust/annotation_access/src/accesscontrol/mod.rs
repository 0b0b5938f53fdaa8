//! Access control for annotation reads.
//!
//! Turns a principal's raw `(action, scope)` grants plus the folder hierarchy
//! into the concrete set of dashboards whose annotations are visible.
//!
//! Pipeline: [`grants::GrantSource`] → [`classifier::classify`] (per resource
//! category) → [`filter::PermissionFilter`] (folder closure + predicate) →
//! [`resolver::AccessResolver`] (dashboard search, org/dashboard flags).

pub mod classifier;
pub mod closure;
pub mod filter;
pub mod grants;
pub mod resolver;
pub mod scope;

pub const ACTION_ANNOTATIONS_READ: &str = "annotations:read";
pub const ACTION_DASHBOARDS_READ: &str = "dashboards:read";
pub const ACTION_DASHBOARDS_WRITE: &str = "dashboards:write";
pub const ACTION_DASHBOARDS_CREATE: &str = "dashboards:create";
pub const ACTION_FOLDERS_READ: &str = "folders:read";

// Action sets: a single grant standing in for a group of actions.
pub const ACTION_SET_DASHBOARDS_VIEW: &str = "dashboards:view";
pub const ACTION_SET_DASHBOARDS_EDIT: &str = "dashboards:edit";
pub const ACTION_SET_DASHBOARDS_ADMIN: &str = "dashboards:admin";
pub const ACTION_SET_FOLDERS_VIEW: &str = "folders:view";
pub const ACTION_SET_FOLDERS_EDIT: &str = "folders:edit";
pub const ACTION_SET_FOLDERS_ADMIN: &str = "folders:admin";

pub const SCOPE_DASHBOARDS_PREFIX: &str = "dashboards:uid:";
pub const SCOPE_FOLDERS_PREFIX: &str = "folders:uid:";
pub const SCOPE_ANNOTATIONS_TYPE_PREFIX: &str = "annotations:type:";
pub const SCOPE_ANNOTATIONS_TYPE_DASHBOARD: &str = "annotations:type:dashboard";
pub const SCOPE_ANNOTATIONS_TYPE_ORGANIZATION: &str = "annotations:type:organization";

/// Dashboard permission level being checked. Each level has its own action
/// lists; no level is derived from another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionLevel {
    View,
    Edit,
}

impl PermissionLevel {
    /// Actions whose `dashboards:uid:*` scopes grant this level on a dashboard.
    pub fn dashboard_actions(self) -> &'static [&'static str] {
        match self {
            PermissionLevel::View => &[
                ACTION_DASHBOARDS_READ,
                ACTION_SET_DASHBOARDS_VIEW,
                ACTION_SET_DASHBOARDS_EDIT,
                ACTION_SET_DASHBOARDS_ADMIN,
            ],
            PermissionLevel::Edit => &[
                ACTION_DASHBOARDS_WRITE,
                ACTION_SET_DASHBOARDS_EDIT,
                ACTION_SET_DASHBOARDS_ADMIN,
            ],
        }
    }

    /// Actions whose `folders:uid:*` scopes grant this level on every
    /// dashboard inside the folder.
    pub fn folder_actions(self) -> &'static [&'static str] {
        match self {
            PermissionLevel::View => &[
                ACTION_DASHBOARDS_READ,
                ACTION_SET_FOLDERS_VIEW,
                ACTION_SET_FOLDERS_EDIT,
                ACTION_SET_FOLDERS_ADMIN,
            ],
            PermissionLevel::Edit => &[
                ACTION_DASHBOARDS_WRITE,
                ACTION_SET_FOLDERS_EDIT,
                ACTION_SET_FOLDERS_ADMIN,
            ],
        }
    }
}

/// Actions consulted when dashboard and folder scopes are attached directly to
/// `annotations:read` (the `annotation_permission_update` mode).
pub const ANNOTATION_SCOPED_ACTIONS: &[&str] = &[ACTION_ANNOTATIONS_READ];
