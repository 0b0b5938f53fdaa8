//! Access resolution.
//!
//! [`AccessResolver`] answers "which annotations may this principal read" as
//! an [`AccessResources`] set. Work is split so paging callers can pay for
//! grants, classification and the folder closure once:
//!
//! - [`AccessResolver::prepare`]: page-independent. Grants, annotation types,
//!   scope classification, folder expansion, dashboard predicate.
//! - [`AccessResolver::dashboards_page`]: one page of the dashboard search.
//! - [`AccessResolver::resolve`]: both, for a single page.

use std::sync::Arc;

use ahash::AHashMap;

use super::classifier::{annotation_scope_types, classify, Category, ScopeClass};
use super::filter::{select_filter, PermissionFilter};
use super::grants::GrantSource;
use super::{
    PermissionLevel, ACTION_ANNOTATIONS_READ, ANNOTATION_SCOPED_ACTIONS, SCOPE_DASHBOARDS_PREFIX,
    SCOPE_FOLDERS_PREFIX,
};
use crate::config::AccessConfig;
use crate::error::{AccessError, Result};
use crate::predicate::Expr;
use crate::store::{DashboardSearch, DashboardStore};
use crate::types::{AccessResources, AnnotationQuery, OrgId};

/// Page-independent part of a resolution.
#[derive(Debug, Clone)]
pub struct PreparedAccess {
    pub org_id: OrgId,
    pub can_access_org_annotations: bool,
    pub can_access_dash_annotations: bool,
    pub dashboards: ScopeClass,
    pub folders: ScopeClass,
    /// Dashboard rows whose annotations are visible. `Expr::False` when no
    /// dashboard can be visible.
    pub predicate: Expr,
}

impl PreparedAccess {
    pub fn has_visible_dashboards(&self) -> bool {
        self.can_access_dash_annotations && self.predicate != Expr::False
    }
}

pub struct AccessResolver {
    config: AccessConfig,
    level: PermissionLevel,
    grants: Arc<dyn GrantSource>,
    dashboards: Arc<dyn DashboardStore>,
    filter: Arc<dyn PermissionFilter>,
    dashboard_category: Category,
    folder_category: Category,
}

impl AccessResolver {
    pub fn new(
        config: AccessConfig,
        grants: Arc<dyn GrantSource>,
        dashboards: Arc<dyn DashboardStore>,
    ) -> Self {
        let filter = select_filter(&config, dashboards.clone());
        Self {
            config,
            level: PermissionLevel::View,
            grants,
            dashboards,
            filter,
            dashboard_category: Category::new(SCOPE_DASHBOARDS_PREFIX),
            folder_category: Category::new(SCOPE_FOLDERS_PREFIX),
        }
    }

    /// Resolve against a different dashboard permission level.
    pub fn with_level(mut self, level: PermissionLevel) -> Self {
        self.level = level;
        self
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    pub fn filter_name(&self) -> &'static str {
        self.filter.name()
    }

    pub async fn prepare(&self, query: &AnnotationQuery) -> Result<PreparedAccess> {
        let principal = &query.principal;
        let grants = self.grants.grants(principal).await?;

        if !grants.has_action(ACTION_ANNOTATIONS_READ) {
            return Err(AccessError::Forbidden(format!(
                "user {} lacks {}",
                principal.user_id, ACTION_ANNOTATIONS_READ
            )));
        }
        let types = annotation_scope_types(grants.scopes(ACTION_ANNOTATIONS_READ));
        let scoped = self.config.annotation_permission_update;
        if !types.organization && !types.dashboard && !scoped {
            return Err(AccessError::Forbidden(format!(
                "user {} has no readable annotation type",
                principal.user_id
            )));
        }

        let (dashboard_actions, folder_actions) = if scoped {
            (ANNOTATION_SCOPED_ACTIONS, ANNOTATION_SCOPED_ACTIONS)
        } else {
            (self.level.dashboard_actions(), self.level.folder_actions())
        };
        let dashboards = classify(dashboard_actions, &grants, &self.dashboard_category);
        let folders = classify(folder_actions, &grants, &self.folder_category);

        let has_dashboard_grants = !(dashboards.is_none() && folders.is_none());
        let can_access_dash_annotations = (types.dashboard || scoped) && has_dashboard_grants;
        let can_access_org_annotations = types.organization;

        if !can_access_org_annotations && !can_access_dash_annotations {
            return Err(AccessError::Forbidden(format!(
                "user {} can read no dashboard and no organization annotations",
                principal.user_id
            )));
        }

        let predicate = if can_access_dash_annotations {
            let dashboard_filter = self
                .filter
                .dashboard_predicate(query.org_id, &dashboards, &folders)
                .await?;
            Expr::all(vec![
                Expr::eq("is_folder", false),
                dashboard_filter,
                pin_filter(query),
            ])
        } else {
            Expr::False
        };

        tracing::debug!(
            user_id = principal.user_id,
            org_id = query.org_id,
            org_annotations = can_access_org_annotations,
            dash_annotations = can_access_dash_annotations,
            filter = self.filter.name(),
            "prepared annotation access"
        );

        Ok(PreparedAccess {
            org_id: query.org_id,
            can_access_org_annotations,
            can_access_dash_annotations,
            dashboards,
            folders,
            predicate,
        })
    }

    /// Visible dashboards on one page, UID → row id. Skips the search when no
    /// dashboard can match.
    pub async fn dashboards_page(
        &self,
        prepared: &PreparedAccess,
        page: usize,
        limit: usize,
    ) -> Result<AHashMap<String, i64>> {
        if !prepared.has_visible_dashboards() {
            return Ok(AHashMap::new());
        }
        let search = DashboardSearch {
            org_id: prepared.org_id,
            filter: prepared.predicate.clone(),
            page: page.max(1),
            limit,
        };
        let found = self.dashboards.search_dashboards(&search).await?;
        Ok(found.into_iter().map(|d| (d.uid, d.id)).collect())
    }

    pub async fn resolve(&self, query: &AnnotationQuery) -> Result<AccessResources> {
        let prepared = self.prepare(query).await?;
        let limit = if query.limit == 0 {
            self.config.default_limit
        } else {
            query.limit
        };
        let dashboards = self.dashboards_page(&prepared, query.page, limit).await?;
        Ok(AccessResources {
            dashboards,
            can_access_dash_annotations: prepared.can_access_dash_annotations,
            can_access_org_annotations: prepared.can_access_org_annotations,
            skip_filter: false,
        })
    }
}

/// Restrict the search to the dashboard a query targets, if any.
fn pin_filter(query: &AnnotationQuery) -> Expr {
    let mut parts = Vec::with_capacity(2);
    if let Some(id) = query.dashboard_id.filter(|id| *id != 0) {
        parts.push(Expr::eq("id", id));
    }
    if let Some(uid) = query.dashboard_uid.as_deref().filter(|uid| !uid.is_empty()) {
        parts.push(Expr::eq("uid", uid));
    }
    Expr::all(parts)
}
