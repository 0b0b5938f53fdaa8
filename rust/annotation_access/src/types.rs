//! Domain types shared across annotation_access modules.

use std::cmp::Ordering;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::accesscontrol::grants::GrantIndex;

/// Tenant identifier.
pub type OrgId = i64;

/// UID of the implicit root folder that folderless dashboards belong to.
pub const ROOT_FOLDER_UID: &str = "general";

/// Dashboard row as seen by the access resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    pub id: i64,
    pub uid: String,
    pub org_id: OrgId,
    /// `None` means the dashboard lives in the root folder.
    pub folder_uid: Option<String>,
    pub title: String,
}

/// Folder row. Folders form a forest per org.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub uid: String,
    pub org_id: OrgId,
    pub parent_uid: Option<String>,
    pub title: String,
}

/// Reference to the dashboard an annotation is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardRef {
    pub id: i64,
    pub uid: Option<String>,
}

/// Annotation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationItem {
    pub id: i64,
    pub org_id: OrgId,
    /// 0 for org-level annotations.
    pub dashboard_id: i64,
    pub dashboard_uid: Option<String>,
    pub panel_id: i64,
    /// 0 for user-created annotations.
    pub alert_id: i64,
    pub user_id: i64,
    pub text: String,
    pub tags: Vec<String>,
    /// Epoch milliseconds.
    pub time: i64,
    pub time_end: i64,
    pub created: i64,
    pub updated: i64,
}

impl AnnotationItem {
    pub fn is_org_level(&self) -> bool {
        self.dashboard_id == 0 && self.dashboard_uid.is_none()
    }
}

/// Ordering used for every merged or paginated result: newest end time first,
/// then newest start time.
pub fn compare_items(a: &AnnotationItem, b: &AnnotationItem) -> Ordering {
    b.time_end
        .cmp(&a.time_end)
        .then_with(|| b.time.cmp(&a.time))
}

/// Sort items by `(time_end desc, time desc)`.
pub fn sort_items(items: &mut [AnnotationItem]) {
    items.sort_by(compare_items);
}

/// Which annotations a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    /// Annotations produced by alerting (`alert_id > 0`).
    Alert,
    /// User annotations (`alert_id == 0`).
    Annotation,
}

/// The requesting identity.
///
/// `permissions` is filled when the credential already carries its grants
/// (self-contained tokens); otherwise a role-backed `GrantSource` supplies them.
#[derive(Debug, Clone, Default)]
pub struct Principal {
    pub user_id: i64,
    pub org_id: OrgId,
    pub login: String,
    pub basic_role: String,
    pub teams: Vec<i64>,
    pub permissions: Option<GrantIndex>,
}

impl Principal {
    pub fn new(user_id: i64, org_id: OrgId) -> Self {
        Self {
            user_id,
            org_id,
            ..Default::default()
        }
    }

    pub fn with_permissions(mut self, permissions: GrantIndex) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn with_basic_role(mut self, role: &str) -> Self {
        self.basic_role = role.to_string();
        self
    }

    pub fn with_teams(mut self, teams: Vec<i64>) -> Self {
        self.teams = teams;
        self
    }
}

/// Annotation search.
#[derive(Debug, Clone, Default)]
pub struct AnnotationQuery {
    pub org_id: OrgId,
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub user_id: Option<i64>,
    pub annotation_id: Option<i64>,
    pub dashboard_id: Option<i64>,
    pub dashboard_uid: Option<String>,
    pub panel_id: Option<i64>,
    pub kind: Option<AnnotationKind>,
    pub tags: Vec<String>,
    pub match_any: bool,
    /// 1-based page used while walking the visible dashboards.
    pub page: usize,
    pub limit: usize,
    pub principal: Principal,
}

impl AnnotationQuery {
    pub fn new(principal: Principal) -> Self {
        Self {
            org_id: principal.org_id,
            page: 1,
            principal,
            ..Default::default()
        }
    }

    /// True when the query targets one exact dashboard.
    pub fn pins_dashboard(&self) -> bool {
        self.dashboard_id.is_some_and(|id| id != 0)
            || self.dashboard_uid.as_deref().is_some_and(|uid| !uid.is_empty())
    }
}

/// Tag listing request.
#[derive(Debug, Clone, Default)]
pub struct TagsQuery {
    pub org_id: OrgId,
    /// Prefix the tag must start with; empty matches every tag.
    pub tag: String,
    pub limit: usize,
}

/// A tag and the number of annotations carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// The resolver's output for one query: visible dashboard UIDs mapped to their
/// row ids, plus which annotation categories are visible at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessResources {
    pub dashboards: AHashMap<String, i64>,
    pub can_access_dash_annotations: bool,
    pub can_access_org_annotations: bool,
    /// Bypass filtering entirely. Only the repository's unfiltered probe sets this.
    pub skip_filter: bool,
}

impl AccessResources {
    pub fn unfiltered() -> Self {
        Self {
            skip_filter: true,
            ..Default::default()
        }
    }

    /// Whether this set contains everything in `other`.
    pub fn is_superset_of(&self, other: &AccessResources) -> bool {
        (self.can_access_org_annotations || !other.can_access_org_annotations)
            && (self.can_access_dash_annotations || !other.can_access_dash_annotations)
            && other
                .dashboards
                .keys()
                .all(|uid| self.dashboards.contains_key(uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(time: i64, time_end: i64) -> AnnotationItem {
        AnnotationItem {
            id: 0,
            org_id: 1,
            dashboard_id: 0,
            dashboard_uid: None,
            panel_id: 0,
            alert_id: 0,
            user_id: 0,
            text: String::new(),
            tags: vec![],
            time,
            time_end,
            created: 0,
            updated: 0,
        }
    }

    #[test]
    fn sort_by_end_then_start_descending() {
        let mut items = vec![item(2, 1), item(1, 2), item(1, 1), item(3, 1)];
        sort_items(&mut items);
        let keys: Vec<(i64, i64)> = items.iter().map(|i| (i.time_end, i.time)).collect();
        assert_eq!(keys, vec![(2, 1), (1, 3), (1, 2), (1, 1)]);
    }

    #[test]
    fn pinned_dashboard_detection() {
        let mut q = AnnotationQuery::new(Principal::new(1, 1));
        assert!(!q.pins_dashboard());
        q.dashboard_uid = Some(String::new());
        assert!(!q.pins_dashboard());
        q.dashboard_id = Some(7);
        assert!(q.pins_dashboard());
    }

    #[test]
    fn superset_checks_flags_and_dashboards() {
        let mut small = AccessResources::default();
        small.dashboards.insert("a".into(), 1);
        small.can_access_dash_annotations = true;

        let mut big = small.clone();
        big.dashboards.insert("b".into(), 2);
        big.can_access_org_annotations = true;

        assert!(big.is_superset_of(&small));
        assert!(!small.is_superset_of(&big));
    }
}
