//! Store seams.
//!
//! The access layer never talks to a database directly. It needs an
//! [`AnnotationStore`] for records and a [`DashboardStore`] for the dashboard
//! and folder hierarchy; [`memory::MemoryStore`] implements both.

pub mod memory;

use async_trait::async_trait;

use crate::accesscontrol::closure::FolderClosureResult;
use crate::error::StoreResult;
use crate::predicate::Expr;
use crate::types::{
    AccessResources, AnnotationItem, AnnotationKind, AnnotationQuery, Dashboard, DashboardRef,
    OrgId, TagCount, TagsQuery,
};

/// Annotation records.
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Name used in logs and joined errors.
    fn name(&self) -> &str;

    /// Records matching `query` with no access filtering, counted up to
    /// `query.limit`.
    async fn count_unfiltered(&self, query: &AnnotationQuery) -> StoreResult<usize>;

    /// At most `limit` records matching `query` and visible under `access`,
    /// newest first.
    async fn fetch(
        &self,
        query: &AnnotationQuery,
        access: &AccessResources,
        limit: usize,
    ) -> StoreResult<Vec<AnnotationItem>>;

    async fn tags(&self, query: &TagsQuery) -> StoreResult<Vec<TagCount>>;

    /// Dashboard an annotation is attached to; `None` when the annotation does
    /// not exist.
    async fn annotation_dashboard(
        &self,
        org_id: OrgId,
        annotation_id: i64,
    ) -> StoreResult<Option<DashboardRef>>;
}

/// One page of a dashboard search.
#[derive(Debug, Clone)]
pub struct DashboardSearch {
    pub org_id: OrgId,
    pub filter: Expr,
    /// 1-based.
    pub page: usize,
    pub limit: usize,
}

impl DashboardSearch {
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) * self.limit
    }
}

/// Dashboards and folders.
#[async_trait]
pub trait DashboardStore: Send + Sync {
    /// Dashboards matching `search.filter`, ordered by id, one page at a time.
    async fn search_dashboards(&self, search: &DashboardSearch) -> StoreResult<Vec<Dashboard>>;

    /// `seeds` plus all their descendants in `org_id`.
    async fn resolve_folder_closure(
        &self,
        seeds: &[String],
        org_id: OrgId,
    ) -> StoreResult<FolderClosureResult>;

    /// Whether [`Self::resolve_folder_closure`] can ever return a resolved set.
    fn supports_recursive_queries(&self) -> bool;
}

/// Record-level filter for the non-access parts of a query.
pub fn query_filter(query: &AnnotationQuery) -> Expr {
    let mut parts = vec![Expr::eq("org_id", query.org_id)];
    if let Some(id) = query.annotation_id.filter(|id| *id != 0) {
        parts.push(Expr::eq("id", id));
    }
    if let Some(user_id) = query.user_id.filter(|id| *id != 0) {
        parts.push(Expr::eq("user_id", user_id));
    }
    if let Some(dashboard_id) = query.dashboard_id.filter(|id| *id != 0) {
        parts.push(Expr::eq("dashboard_id", dashboard_id));
    }
    if let Some(uid) = query.dashboard_uid.as_deref().filter(|uid| !uid.is_empty()) {
        parts.push(Expr::eq("dashboard_uid", uid));
    }
    if let Some(panel_id) = query.panel_id.filter(|id| *id != 0) {
        parts.push(Expr::eq("panel_id", panel_id));
    }
    // Overlap with the window: starts before `to`, ends after `from`.
    if let Some(to) = query.to {
        parts.push(Expr::lte("epoch", to));
    }
    if let Some(from) = query.from {
        parts.push(Expr::gte("epoch_end", from));
    }
    match query.kind {
        Some(AnnotationKind::Alert) => parts.push(Expr::gte("alert_id", 1)),
        Some(AnnotationKind::Annotation) => parts.push(Expr::eq("alert_id", 0)),
        None => {}
    }
    Expr::all(parts)
}

/// Record-level filter for an access set: org annotations are those with
/// `dashboard_id = 0`, dashboard annotations must belong to a visible UID.
pub fn access_filter(access: &AccessResources) -> Expr {
    if access.skip_filter {
        return Expr::True;
    }
    let mut parts = Vec::with_capacity(2);
    if access.can_access_org_annotations {
        parts.push(Expr::eq("dashboard_id", 0));
    }
    if access.can_access_dash_annotations {
        parts.push(Expr::in_list(
            "dashboard_uid",
            access.dashboards.keys().cloned(),
        ));
    }
    Expr::any(parts)
}

/// Tag predicate: every requested tag must be present, or any one of them
/// with `match_any`. No requested tags matches everything.
pub fn tags_match(query: &AnnotationQuery, item_tags: &[String]) -> bool {
    if query.tags.is_empty() {
        return true;
    }
    let has = |t: &String| item_tags.iter().any(|it| it == t);
    if query.match_any {
        query.tags.iter().any(has)
    } else {
        query.tags.iter().all(has)
    }
}
