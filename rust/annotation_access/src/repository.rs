//! Authorized annotation listing.
//!
//! [`AnnotationRepository::find`] walks visible dashboards page by page and
//! fetches annotations for each page until the limit is met, so a principal
//! with access to thousands of dashboards never materializes all of them.

use std::sync::Arc;

use crate::accesscontrol::resolver::AccessResolver;
use crate::config::AccessConfig;
use crate::error::Result;
use crate::store::AnnotationStore;
use crate::types::{sort_items, AccessResources, AnnotationItem, AnnotationQuery, TagCount, TagsQuery};

pub struct AnnotationRepository {
    config: AccessConfig,
    resolver: AccessResolver,
    store: Arc<dyn AnnotationStore>,
}

impl AnnotationRepository {
    pub fn new(config: AccessConfig, resolver: AccessResolver, store: Arc<dyn AnnotationStore>) -> Self {
        Self {
            config,
            resolver,
            store,
        }
    }

    pub fn resolver(&self) -> &AccessResolver {
        &self.resolver
    }

    /// At most `query.limit` visible annotations, newest first.
    ///
    /// Any store or resolver error aborts the walk; partial results are
    /// dropped.
    pub async fn find(&self, query: &AnnotationQuery) -> Result<Vec<AnnotationItem>> {
        let mut query = query.clone();
        if query.limit == 0 {
            query.limit = self.config.default_limit;
        }
        // The walk always starts at the first dashboard page.
        query.page = 1;

        if let Some(id) = query.annotation_id.filter(|id| *id != 0) {
            if !query.pins_dashboard() {
                match self.store.annotation_dashboard(query.org_id, id).await? {
                    None => return Ok(Vec::new()),
                    Some(dash) if dash.id != 0 => {
                        query.dashboard_id = Some(dash.id);
                        query.dashboard_uid = dash.uid;
                    }
                    Some(_) => {}
                }
            }
        }

        // Cheap unfiltered count first: nothing to walk when no record
        // matches, and the limit never needs to exceed the match count.
        if !query.pins_dashboard() {
            let count = self.store.count_unfiltered(&query).await?;
            if count == 0 {
                return Ok(Vec::new());
            }
            if count < query.limit {
                query.limit = count;
            }
        }
        let limit = query.limit;

        let prepared = self.resolver.prepare(&query).await?;
        let mut items: Vec<AnnotationItem> = Vec::with_capacity(limit);
        let mut page = 1;
        loop {
            let dashboards = self.resolver.dashboards_page(&prepared, page, limit).await?;
            let visible_dashboards = dashboards.len();
            let access = AccessResources {
                dashboards,
                can_access_dash_annotations: prepared.can_access_dash_annotations,
                // Org annotations do not depend on the dashboard page.
                can_access_org_annotations: prepared.can_access_org_annotations && page == 1,
                skip_filter: false,
            };

            if access.can_access_org_annotations || visible_dashboards > 0 {
                let batch = self.store.fetch(&query, &access, limit).await?;
                tracing::debug!(page, dashboards = visible_dashboards, fetched = batch.len(), "annotation page");
                items.extend(batch);
            }

            if items.len() >= limit || visible_dashboards < limit {
                break;
            }
            page += 1;
        }

        sort_items(&mut items);
        items.truncate(limit);
        Ok(items)
    }

    /// Tags with their annotation counts.
    pub async fn find_tags(&self, query: &TagsQuery) -> Result<Vec<TagCount>> {
        let mut query = query.clone();
        if query.limit == 0 {
            query.limit = self.config.default_limit;
        }
        Ok(self.store.tags(&query).await?)
    }
}
