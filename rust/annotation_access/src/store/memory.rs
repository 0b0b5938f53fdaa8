//! In-memory store.
//!
//! Implements both store traits over plain vectors behind a `parking_lot`
//! lock. Evaluates the same [`Expr`] predicates a relational backend would
//! render to SQL, so access semantics are identical. Call counters make
//! round trips observable.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::RwLock;

use super::{access_filter, query_filter, tags_match, AnnotationStore, DashboardSearch, DashboardStore};
use crate::accesscontrol::closure::{fixed_point, FolderClosureResult};
use crate::error::{StoreError, StoreResult};
use crate::predicate::Expr;
use crate::types::{
    sort_items, AccessResources, AnnotationItem, AnnotationQuery, Dashboard, DashboardRef, Folder,
    OrgId, TagCount, TagsQuery,
};

#[derive(Debug, Default)]
struct MemoryState {
    folders: Vec<Folder>,
    dashboards: Vec<Dashboard>,
    annotations: Vec<AnnotationItem>,
}

/// Round-trip counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub count_calls: usize,
    /// Record reads: `fetch`, `tags` and annotation lookups.
    pub fetch_calls: usize,
    pub search_calls: usize,
    pub closure_calls: usize,
}

#[derive(Debug, Default)]
struct Counters {
    count: AtomicUsize,
    fetch: AtomicUsize,
    search: AtomicUsize,
    closure: AtomicUsize,
}

#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    recursive: bool,
    latency: Option<Duration>,
    failure: RwLock<Option<StoreError>>,
    state: RwLock<MemoryState>,
    counters: Counters,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryStore {
    /// Empty store that supports recursive folder queries.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            recursive: true,
            latency: None,
            failure: RwLock::new(None),
            state: RwLock::new(MemoryState::default()),
            counters: Counters::default(),
        }
    }

    /// Toggle recursive closure support. Without it,
    /// `resolve_folder_closure` reports `Unsupported`.
    pub fn with_recursive_queries(mut self, enabled: bool) -> Self {
        self.recursive = enabled;
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every subsequent call fail with `err` (or succeed again with `None`).
    pub fn set_failure(&self, err: Option<StoreError>) {
        *self.failure.write() = err;
    }

    pub fn add_folder(&self, org_id: OrgId, uid: &str, parent_uid: Option<&str>) {
        self.state.write().folders.push(Folder {
            uid: uid.to_string(),
            org_id,
            parent_uid: parent_uid.map(str::to_string),
            title: uid.to_string(),
        });
    }

    pub fn add_dashboard(&self, org_id: OrgId, id: i64, uid: &str, folder_uid: Option<&str>) {
        self.state.write().dashboards.push(Dashboard {
            id,
            uid: uid.to_string(),
            org_id,
            folder_uid: folder_uid.map(str::to_string),
            title: uid.to_string(),
        });
    }

    pub fn add_annotation(&self, item: AnnotationItem) {
        self.state.write().annotations.push(item);
    }

    pub fn stats(&self) -> MemoryStoreStats {
        MemoryStoreStats {
            count_calls: self.counters.count.load(Ordering::Relaxed),
            fetch_calls: self.counters.fetch.load(Ordering::Relaxed),
            search_calls: self.counters.search.load(Ordering::Relaxed),
            closure_calls: self.counters.closure.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.counters.count.store(0, Ordering::Relaxed);
        self.counters.fetch.store(0, Ordering::Relaxed);
        self.counters.search.store(0, Ordering::Relaxed);
        self.counters.closure.store(0, Ordering::Relaxed);
    }

    async fn enter(&self, counter: &AtomicUsize) -> StoreResult<()> {
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let failure = self.failure.read().clone();
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn matching(&self, filter: &Expr, query: &AnnotationQuery) -> Vec<AnnotationItem> {
        self.state
            .read()
            .annotations
            .iter()
            .filter(|a| filter.eval(*a) && tags_match(query, &a.tags))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AnnotationStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn count_unfiltered(&self, query: &AnnotationQuery) -> StoreResult<usize> {
        self.enter(&self.counters.count).await?;
        let count = self.matching(&query_filter(query), query).len();
        Ok(if query.limit > 0 {
            count.min(query.limit)
        } else {
            count
        })
    }

    async fn fetch(
        &self,
        query: &AnnotationQuery,
        access: &AccessResources,
        limit: usize,
    ) -> StoreResult<Vec<AnnotationItem>> {
        self.enter(&self.counters.fetch).await?;
        let filter = query_filter(query).and(access_filter(access));
        let mut items = self.matching(&filter, query);
        sort_items(&mut items);
        items.truncate(limit);
        Ok(items)
    }

    async fn tags(&self, query: &TagsQuery) -> StoreResult<Vec<TagCount>> {
        self.enter(&self.counters.fetch).await?;
        let mut counts: AHashMap<String, u64> = AHashMap::new();
        {
            let state = self.state.read();
            for item in state.annotations.iter().filter(|a| a.org_id == query.org_id) {
                for tag in item.tags.iter().filter(|t| t.starts_with(&query.tag)) {
                    *counts.entry(tag.clone()).or_default() += 1;
                }
            }
        }
        let mut tags: Vec<TagCount> = counts
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect();
        tags.sort_by(|a, b| a.tag.cmp(&b.tag));
        if query.limit > 0 {
            tags.truncate(query.limit);
        }
        Ok(tags)
    }

    async fn annotation_dashboard(
        &self,
        org_id: OrgId,
        annotation_id: i64,
    ) -> StoreResult<Option<DashboardRef>> {
        self.enter(&self.counters.fetch).await?;
        Ok(self
            .state
            .read()
            .annotations
            .iter()
            .find(|a| a.org_id == org_id && a.id == annotation_id)
            .map(|a| DashboardRef {
                id: a.dashboard_id,
                uid: a.dashboard_uid.clone(),
            }))
    }
}

#[async_trait]
impl DashboardStore for MemoryStore {
    async fn search_dashboards(&self, search: &DashboardSearch) -> StoreResult<Vec<Dashboard>> {
        self.enter(&self.counters.search).await?;
        let filter = Expr::eq("org_id", search.org_id).and(search.filter.clone());
        let mut matches: Vec<Dashboard> = self
            .state
            .read()
            .dashboards
            .iter()
            .filter(|d| filter.eval(*d))
            .cloned()
            .collect();
        matches.sort_by_key(|d| d.id);
        Ok(matches
            .into_iter()
            .skip(search.offset())
            .take(search.limit)
            .collect())
    }

    async fn resolve_folder_closure(
        &self,
        seeds: &[String],
        org_id: OrgId,
    ) -> StoreResult<FolderClosureResult> {
        self.enter(&self.counters.closure).await?;
        if !self.recursive {
            return Ok(FolderClosureResult::Unsupported);
        }

        let mut children: AHashMap<String, Vec<String>> = AHashMap::new();
        let mut folder_count = 0;
        {
            let state = self.state.read();
            for folder in state.folders.iter().filter(|f| f.org_id == org_id) {
                folder_count += 1;
                if let Some(parent) = &folder.parent_uid {
                    children
                        .entry(parent.clone())
                        .or_default()
                        .push(folder.uid.clone());
                }
            }
        }
        let closure = fixed_point(seeds, folder_count.max(1), |uid| {
            children.get(uid).cloned().unwrap_or_default()
        });
        Ok(FolderClosureResult::Resolved(closure))
    }

    fn supports_recursive_queries(&self) -> bool {
        self.recursive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Principal;

    fn annotation(id: i64, dashboard: Option<(i64, &str)>, time: i64) -> AnnotationItem {
        AnnotationItem {
            id,
            org_id: 1,
            dashboard_id: dashboard.map(|d| d.0).unwrap_or(0),
            dashboard_uid: dashboard.map(|d| d.1.to_string()),
            panel_id: 0,
            alert_id: 0,
            user_id: 1,
            text: format!("annotation {id}"),
            tags: vec![],
            time,
            time_end: time,
            created: time,
            updated: time,
        }
    }

    #[tokio::test]
    async fn search_pages_by_id() {
        let store = MemoryStore::new("m");
        for id in (1..=7).rev() {
            store.add_dashboard(1, id, &format!("d{id}"), None);
        }
        store.add_dashboard(2, 100, "other-org", None);

        let search = |page| DashboardSearch {
            org_id: 1,
            filter: Expr::True,
            page,
            limit: 3,
        };
        let page = |dashes: Vec<Dashboard>| dashes.into_iter().map(|d| d.id).collect::<Vec<_>>();

        assert_eq!(page(store.search_dashboards(&search(1)).await.unwrap()), vec![1, 2, 3]);
        assert_eq!(page(store.search_dashboards(&search(3)).await.unwrap()), vec![7]);
        assert!(store.search_dashboards(&search(4)).await.unwrap().is_empty());
        assert_eq!(store.stats().search_calls, 3);
    }

    #[tokio::test]
    async fn closure_follows_parents_within_org() {
        let store = MemoryStore::new("m");
        store.add_folder(1, "a", None);
        store.add_folder(1, "b", Some("a"));
        store.add_folder(1, "c", Some("b"));
        store.add_folder(2, "x", Some("a"));

        let result = store.resolve_folder_closure(&["a".to_string()], 1).await.unwrap();
        match result {
            FolderClosureResult::Resolved(uids) => {
                let mut uids: Vec<_> = uids.into_iter().collect();
                uids.sort();
                assert_eq!(uids, vec!["a", "b", "c"]);
            }
            other => panic!("expected Resolved, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn closure_unsupported_without_recursion() {
        let store = MemoryStore::new("m").with_recursive_queries(false);
        assert!(!store.supports_recursive_queries());
        let result = store.resolve_folder_closure(&["a".to_string()], 1).await.unwrap();
        assert_eq!(result, FolderClosureResult::Unsupported);
    }

    #[tokio::test]
    async fn fetch_applies_access_and_order() {
        let store = MemoryStore::new("m");
        store.add_annotation(annotation(1, None, 10));
        store.add_annotation(annotation(2, Some((5, "d5")), 30));
        store.add_annotation(annotation(3, Some((6, "d6")), 20));

        let query = AnnotationQuery::new(Principal::new(1, 1));
        let mut access = AccessResources::default();
        access.can_access_org_annotations = true;
        access.can_access_dash_annotations = true;
        access.dashboards.insert("d5".into(), 5);

        let items = store.fetch(&query, &access, 10).await.unwrap();
        let ids: Vec<i64> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 1]);

        let unfiltered = store
            .fetch(&query, &AccessResources::unfiltered(), 2)
            .await
            .unwrap();
        assert_eq!(unfiltered.len(), 2);
    }

    #[tokio::test]
    async fn injected_failure_is_returned() {
        let store = MemoryStore::new("m");
        store.set_failure(Some(StoreError::backend("down")));
        let query = AnnotationQuery::new(Principal::new(1, 1));
        let err = store.count_unfiltered(&query).await.unwrap_err();
        assert_eq!(err, StoreError::backend("down"));
        store.set_failure(None);
        assert_eq!(store.count_unfiltered(&query).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn tags_are_counted_by_prefix() {
        let store = MemoryStore::new("m");
        let mut a = annotation(1, None, 1);
        a.tags = vec!["deploy".into(), "db".into()];
        let mut b = annotation(2, None, 2);
        b.tags = vec!["deploy".into()];
        store.add_annotation(a);
        store.add_annotation(b);

        let tags = store
            .tags(&TagsQuery {
                org_id: 1,
                tag: "de".into(),
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(
            tags,
            vec![TagCount {
                tag: "deploy".into(),
                count: 2
            }]
        );
    }
}
