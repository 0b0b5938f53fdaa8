//! Dashboard permission filters.
//!
//! A [`PermissionFilter`] turns the classified dashboard and folder grants into
//! one dashboard predicate. The two implementations differ only in how granted
//! folders are expanded:
//!
//! - [`FlatFolderFilter`]: directly granted folders only. Used when nested
//!   folders are disabled or the store cannot recurse. Never grants more than
//!   the recursive filter.
//! - [`RecursiveFolderFilter`]: granted folders plus all descendants, computed
//!   by the dashboard store.
//!
//! The implementation is picked once, at construction, by [`select_filter`].

use std::sync::Arc;

use ahash::AHashSet;
use async_trait::async_trait;

use super::classifier::ScopeClass;
use super::closure::FolderClosureResult;
use crate::config::AccessConfig;
use crate::error::StoreResult;
use crate::predicate::Expr;
use crate::store::DashboardStore;
use crate::types::{OrgId, ROOT_FOLDER_UID};

#[async_trait]
pub trait PermissionFilter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Predicate over dashboard rows selecting every dashboard readable under
    /// the given classifications.
    async fn dashboard_predicate(
        &self,
        org_id: OrgId,
        dashboards: &ScopeClass,
        folders: &ScopeClass,
    ) -> StoreResult<Expr>;
}

pub struct FlatFolderFilter;

#[async_trait]
impl PermissionFilter for FlatFolderFilter {
    fn name(&self) -> &'static str {
        "flat"
    }

    async fn dashboard_predicate(
        &self,
        _org_id: OrgId,
        dashboards: &ScopeClass,
        folders: &ScopeClass,
    ) -> StoreResult<Expr> {
        Ok(combine(dashboards, folders, |seeds| seeds.clone()))
    }
}

pub struct RecursiveFolderFilter {
    store: Arc<dyn DashboardStore>,
}

impl RecursiveFolderFilter {
    pub fn new(store: Arc<dyn DashboardStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PermissionFilter for RecursiveFolderFilter {
    fn name(&self) -> &'static str {
        "recursive"
    }

    async fn dashboard_predicate(
        &self,
        org_id: OrgId,
        dashboards: &ScopeClass,
        folders: &ScopeClass,
    ) -> StoreResult<Expr> {
        let seeds = match folders {
            ScopeClass::Explicit(seeds) if !dashboards.is_unconditional() => seeds,
            _ => return Ok(combine(dashboards, folders, |seeds| seeds.clone())),
        };

        let mut ordered: Vec<String> = seeds.iter().cloned().collect();
        ordered.sort();
        let closure = match self.store.resolve_folder_closure(&ordered, org_id).await? {
            FolderClosureResult::Resolved(closure) => closure,
            FolderClosureResult::Unsupported => {
                tracing::warn!(
                    org_id,
                    seeds = ordered.len(),
                    "recursive folder queries unsupported; using directly granted folders"
                );
                seeds.clone()
            }
        };
        Ok(combine(dashboards, folders, |_| closure))
    }
}

/// Union of the dashboard grants and the expanded folder grants.
fn combine<F>(dashboards: &ScopeClass, folders: &ScopeClass, expand: F) -> Expr
where
    F: FnOnce(&AHashSet<String>) -> AHashSet<String>,
{
    if dashboards.is_unconditional() || folders.is_unconditional() {
        return Expr::True;
    }

    let mut parts = Vec::with_capacity(3);
    if let ScopeClass::Explicit(uids) = dashboards {
        parts.push(Expr::in_list("uid", sorted(uids)));
    }
    if let ScopeClass::Explicit(seeds) = folders {
        if seeds.contains(ROOT_FOLDER_UID) {
            parts.push(Expr::is_null("folder_uid"));
        }
        let mut expanded = expand(seeds);
        expanded.remove(ROOT_FOLDER_UID);
        parts.push(Expr::in_list("folder_uid", sorted(&expanded)));
    }
    Expr::any(parts)
}

fn sorted(set: &AHashSet<String>) -> Vec<String> {
    let mut v: Vec<String> = set.iter().cloned().collect();
    v.sort();
    v
}

/// Pick the folder strategy for a store.
pub fn select_filter(
    config: &AccessConfig,
    store: Arc<dyn DashboardStore>,
) -> Arc<dyn PermissionFilter> {
    let filter: Arc<dyn PermissionFilter> =
        if config.nested_folders && store.supports_recursive_queries() {
            Arc::new(RecursiveFolderFilter::new(store))
        } else {
            Arc::new(FlatFolderFilter)
        };
    tracing::debug!(
        filter = filter.name(),
        nested_folders = config.nested_folders,
        "selected dashboard permission filter"
    );
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn explicit(v: &[&str]) -> ScopeClass {
        ScopeClass::Explicit(v.iter().map(|s| s.to_string()).collect())
    }

    fn nested_store() -> Arc<MemoryStore> {
        let store = MemoryStore::new("m");
        store.add_folder(1, "parent", None);
        store.add_folder(1, "child", Some("parent"));
        Arc::new(store)
    }

    #[tokio::test]
    async fn unconditional_skips_closure() {
        let store = nested_store();
        let filter = RecursiveFolderFilter::new(store.clone());
        let e = filter
            .dashboard_predicate(1, &ScopeClass::Unconditional, &explicit(&["parent"]))
            .await
            .unwrap();
        assert_eq!(e, Expr::True);
        assert_eq!(store.stats().closure_calls, 0);

        let e = filter
            .dashboard_predicate(1, &ScopeClass::None, &ScopeClass::Unconditional)
            .await
            .unwrap();
        assert_eq!(e, Expr::True);
        assert_eq!(store.stats().closure_calls, 0);
    }

    #[tokio::test]
    async fn flat_uses_seeds_only() {
        let e = FlatFolderFilter
            .dashboard_predicate(1, &explicit(&["d1"]), &explicit(&["parent"]))
            .await
            .unwrap();
        assert_eq!(
            e,
            Expr::in_list("uid", vec!["d1"]).or(Expr::in_list("folder_uid", vec!["parent"]))
        );
    }

    #[tokio::test]
    async fn recursive_expands_descendants() {
        let filter = RecursiveFolderFilter::new(nested_store());
        let e = filter
            .dashboard_predicate(1, &ScopeClass::None, &explicit(&["parent"]))
            .await
            .unwrap();
        assert_eq!(e, Expr::in_list("folder_uid", vec!["child", "parent"]));
    }

    #[tokio::test]
    async fn root_folder_grant_selects_folderless_dashboards() {
        let e = FlatFolderFilter
            .dashboard_predicate(1, &ScopeClass::None, &explicit(&["general"]))
            .await
            .unwrap();
        assert_eq!(e, Expr::is_null("folder_uid"));
    }

    #[tokio::test]
    async fn nothing_granted_matches_nothing() {
        let e = FlatFolderFilter
            .dashboard_predicate(1, &ScopeClass::None, &ScopeClass::None)
            .await
            .unwrap();
        assert_eq!(e, Expr::False);
    }

    #[test]
    fn selection_follows_config_and_capability() {
        let config = AccessConfig::default();
        let recursive: Arc<dyn DashboardStore> = Arc::new(MemoryStore::new("m"));
        assert_eq!(select_filter(&config, recursive.clone()).name(), "recursive");

        let flat_store: Arc<dyn DashboardStore> =
            Arc::new(MemoryStore::new("m").with_recursive_queries(false));
        assert_eq!(select_filter(&config, flat_store).name(), "flat");

        let disabled = AccessConfig {
            nested_folders: false,
            ..AccessConfig::default()
        };
        assert_eq!(select_filter(&disabled, recursive).name(), "flat");
    }
}
