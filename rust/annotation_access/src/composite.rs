//! Fan-out over several annotation stores.
//!
//! Every store is queried on its own tokio task, and the tasks are aborted
//! when the caller stops waiting. A result is only returned when every store
//! succeeded; otherwise all failures are joined into one
//! [`StoreError::Incomplete`] and the partial data is dropped.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinSet;

use crate::config::AccessConfig;
use crate::error::{JoinedStoreError, SourceFailure, StoreError, StoreResult};
use crate::store::AnnotationStore;
use crate::types::{
    sort_items, AccessResources, AnnotationItem, AnnotationQuery, DashboardRef, OrgId, TagCount,
    TagsQuery,
};

/// Query every store concurrently and merge, newest first.
pub async fn merge(
    query: &AnnotationQuery,
    access: &AccessResources,
    limit: usize,
    stores: &[Arc<dyn AnnotationStore>],
    timeout: Option<Duration>,
) -> StoreResult<Vec<AnnotationItem>> {
    let query = Arc::new(query.clone());
    let access = Arc::new(access.clone());
    let batches = fan_out(stores, timeout, move |store| {
        let query = query.clone();
        let access = access.clone();
        async move { store.fetch(&query, &access, limit).await }
    })
    .await?;

    let mut items: Vec<AnnotationItem> = batches.into_iter().flatten().collect();
    sort_items(&mut items);
    Ok(items)
}

/// Run `call` once per store, each on its own task, and wait for all of them.
///
/// The tasks live in a [`JoinSet`], so dropping the returned future aborts
/// every store call still in flight.
async fn fan_out<T, F, Fut>(
    stores: &[Arc<dyn AnnotationStore>],
    timeout: Option<Duration>,
    call: F,
) -> StoreResult<Vec<T>>
where
    T: Send + 'static,
    F: Fn(Arc<dyn AnnotationStore>) -> Fut,
    Fut: Future<Output = StoreResult<T>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for (index, store) in stores.iter().enumerate() {
        let name = store.name().to_string();
        let task = AssertUnwindSafe(call(store.clone())).catch_unwind();
        tasks.spawn(async move {
            let outcome = match timeout {
                Some(after) => match tokio::time::timeout(after, task).await {
                    Ok(outcome) => outcome,
                    Err(_) => Ok(Err(StoreError::Timeout {
                        store: name,
                        after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
                    })),
                },
                None => task.await,
            };
            let outcome = outcome
                .unwrap_or_else(|payload| Err(StoreError::Panicked(panic_message(payload))));
            (index, outcome)
        });
    }

    // Slots keep registration order regardless of completion order.
    let mut outcomes: Vec<Option<StoreResult<T>>> = stores.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => {
                if let Some(slot) = outcomes.get_mut(index) {
                    *slot = Some(outcome);
                }
            }
            Err(join_err) => tracing::warn!(error = %join_err, "store task did not finish"),
        }
    }

    let mut results = Vec::with_capacity(stores.len());
    let mut failures = Vec::new();
    for (store, outcome) in stores.iter().zip(outcomes) {
        let error = match outcome {
            Some(Ok(value)) => {
                results.push(value);
                continue;
            }
            Some(Err(err)) => err,
            None => StoreError::backend("store task cancelled"),
        };
        failures.push(SourceFailure {
            store: store.name().to_string(),
            error,
        });
    }

    if failures.is_empty() {
        return Ok(results);
    }
    tracing::warn!(
        failed = failures.len(),
        stores = stores.len(),
        "composite annotation query incomplete"
    );
    Err(StoreError::Incomplete(JoinedStoreError::new(failures)))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Several stores behind one [`AnnotationStore`].
pub struct CompositeStore {
    stores: Vec<Arc<dyn AnnotationStore>>,
    timeout: Option<Duration>,
}

impl CompositeStore {
    pub fn new(stores: Vec<Arc<dyn AnnotationStore>>) -> Self {
        Self {
            stores,
            timeout: None,
        }
    }

    /// Composite using the configured per-store deadline.
    pub fn from_config(config: &AccessConfig, stores: Vec<Arc<dyn AnnotationStore>>) -> Self {
        Self::new(stores).with_timeout(config.store_timeout())
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn stores(&self) -> &[Arc<dyn AnnotationStore>] {
        &self.stores
    }
}

#[async_trait]
impl AnnotationStore for CompositeStore {
    fn name(&self) -> &str {
        "composite"
    }

    async fn count_unfiltered(&self, query: &AnnotationQuery) -> StoreResult<usize> {
        let shared = Arc::new(query.clone());
        let counts = fan_out(&self.stores, self.timeout, move |store| {
            let query = shared.clone();
            async move { store.count_unfiltered(&query).await }
        })
        .await?;
        let total: usize = counts.into_iter().sum();
        Ok(if query.limit > 0 {
            total.min(query.limit)
        } else {
            total
        })
    }

    async fn fetch(
        &self,
        query: &AnnotationQuery,
        access: &AccessResources,
        limit: usize,
    ) -> StoreResult<Vec<AnnotationItem>> {
        let mut items = merge(query, access, limit, &self.stores, self.timeout).await?;
        items.truncate(limit);
        Ok(items)
    }

    async fn tags(&self, query: &TagsQuery) -> StoreResult<Vec<TagCount>> {
        let shared = Arc::new(query.clone());
        let per_store = fan_out(&self.stores, self.timeout, move |store| {
            let query = shared.clone();
            async move { store.tags(&query).await }
        })
        .await?;

        let mut counts: AHashMap<String, u64> = AHashMap::new();
        for tag in per_store.into_iter().flatten() {
            *counts.entry(tag.tag).or_default() += tag.count;
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

    /// First store, in registration order, that knows the annotation.
    async fn annotation_dashboard(
        &self,
        org_id: OrgId,
        annotation_id: i64,
    ) -> StoreResult<Option<DashboardRef>> {
        let found = fan_out(&self.stores, self.timeout, move |store| async move {
            store.annotation_dashboard(org_id, annotation_id).await
        })
        .await?;
        Ok(found.into_iter().flatten().next())
    }
}
