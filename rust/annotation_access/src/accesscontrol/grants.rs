//! Grant index and grant sources.
//!
//! A [`GrantIndex`] is the read-only "action → scopes" view of one principal
//! for one request. Where it comes from is a [`GrantSource`] concern:
//!
//! - [`EmbeddedGrants`]: the credential already carries its permissions.
//! - [`RoleGrantSource`]: permissions are joined from user, team and basic
//!   role assignments.
//!
//! The resolver runs the same algorithm whichever source is injected.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{OrgId, Principal};

/// Action → scopes for one principal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantIndex {
    scopes: AHashMap<String, Vec<String>>,
}

impl GrantIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. Duplicate `(action, scope)` pairs are ignored.
    pub fn grant(mut self, action: &str, scope: &str) -> Self {
        self.insert(action, scope);
        self
    }

    pub fn insert(&mut self, action: &str, scope: &str) {
        let scopes = self.scopes.entry(action.to_string()).or_default();
        if !scopes.iter().any(|s| s == scope) {
            scopes.push(scope.to_string());
        }
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut index = Self::new();
        for (action, scope) in pairs {
            index.insert(action, scope);
        }
        index
    }

    /// Parse the `{"action": ["scope", ...]}` shape carried in credentials.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: AHashMap<String, Vec<String>> = serde_json::from_str(json)?;
        let mut index = Self::new();
        for (action, scopes) in raw {
            for scope in scopes {
                index.insert(&action, &scope);
            }
        }
        Ok(index)
    }

    /// Scopes granted for `action`; empty when the action is not held.
    pub fn scopes(&self, action: &str) -> &[String] {
        self.scopes
            .get(action)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_action(&self, action: &str) -> bool {
        self.scopes.contains_key(action)
    }

    pub fn contains(&self, action: &str, scope: &str) -> bool {
        self.scopes(action).iter().any(|s| s == scope)
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Number of distinct `(action, scope)` pairs.
    pub fn len(&self) -> usize {
        self.scopes.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.scopes
            .iter()
            .flat_map(|(a, scopes)| scopes.iter().map(move |s| (a.as_str(), s.as_str())))
    }

    pub fn merge(&mut self, other: &GrantIndex) {
        for (action, scope) in other.iter() {
            self.insert(action, scope);
        }
    }

    pub fn is_subset_of(&self, other: &GrantIndex) -> bool {
        self.iter().all(|(a, s)| other.contains(a, s))
    }
}

/// Where a request's grants come from.
#[async_trait]
pub trait GrantSource: Send + Sync {
    async fn grants(&self, principal: &Principal) -> StoreResult<GrantIndex>;
}

/// Grants embedded in the caller's credential. A principal without embedded
/// permissions holds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedGrants;

#[async_trait]
impl GrantSource for EmbeddedGrants {
    async fn grants(&self, principal: &Principal) -> StoreResult<GrantIndex> {
        Ok(principal.permissions.clone().unwrap_or_default())
    }
}

/// Role definitions and their assignments.
#[derive(Debug, Clone, Default)]
pub struct RoleCatalog {
    roles: AHashMap<String, GrantIndex>,
    user_roles: AHashMap<(OrgId, i64), Vec<String>>,
    team_roles: AHashMap<(OrgId, i64), Vec<String>>,
    basic_roles: AHashMap<(OrgId, String), Vec<String>>,
}

impl RoleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_role(mut self, name: &str, grants: GrantIndex) -> Self {
        self.roles.insert(name.to_string(), grants);
        self
    }

    pub fn assign_user(mut self, org_id: OrgId, user_id: i64, role: &str) -> Self {
        self.user_roles
            .entry((org_id, user_id))
            .or_default()
            .push(role.to_string());
        self
    }

    pub fn assign_team(mut self, org_id: OrgId, team_id: i64, role: &str) -> Self {
        self.team_roles
            .entry((org_id, team_id))
            .or_default()
            .push(role.to_string());
        self
    }

    pub fn assign_basic_role(mut self, org_id: OrgId, basic_role: &str, role: &str) -> Self {
        self.basic_roles
            .entry((org_id, basic_role.to_string()))
            .or_default()
            .push(role.to_string());
        self
    }

    /// Role names reachable for `principal` in its org. Unknown names are kept;
    /// they simply contribute no grants.
    pub fn roles_for(&self, principal: &Principal) -> AHashSet<String> {
        let org = principal.org_id;
        let mut names = AHashSet::new();
        if let Some(roles) = self.user_roles.get(&(org, principal.user_id)) {
            names.extend(roles.iter().cloned());
        }
        for team in &principal.teams {
            if let Some(roles) = self.team_roles.get(&(org, *team)) {
                names.extend(roles.iter().cloned());
            }
        }
        if !principal.basic_role.is_empty() {
            if let Some(roles) = self.basic_roles.get(&(org, principal.basic_role.clone())) {
                names.extend(roles.iter().cloned());
            }
        }
        names
    }
}

/// Joins user, team and basic-role assignments into one grant index.
#[derive(Debug, Clone)]
pub struct RoleGrantSource {
    catalog: Arc<RoleCatalog>,
}

impl RoleGrantSource {
    pub fn new(catalog: RoleCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }
}

#[async_trait]
impl GrantSource for RoleGrantSource {
    async fn grants(&self, principal: &Principal) -> StoreResult<GrantIndex> {
        let mut index = GrantIndex::new();
        for role in self.catalog.roles_for(principal) {
            match self.catalog.roles.get(&role) {
                Some(grants) => index.merge(grants),
                None => tracing::debug!(role = %role, "assigned role has no definition"),
            }
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_deduplicates_pairs() {
        let g = GrantIndex::new()
            .grant("dashboards:read", "dashboards:uid:a")
            .grant("dashboards:read", "dashboards:uid:a")
            .grant("dashboards:read", "folders:uid:f");
        assert_eq!(g.len(), 2);
        assert_eq!(g.scopes("dashboards:read").len(), 2);
        assert!(g.scopes("folders:read").is_empty());
        assert!(!g.has_action("folders:read"));
    }

    #[test]
    fn parse_embedded_permissions() {
        let json = r#"{"annotations:read":["annotations:type:*"],"dashboards:read":["dashboards:uid:a","folders:uid:f"]}"#;
        let g = GrantIndex::from_json(json).unwrap();
        assert!(g.contains("annotations:read", "annotations:type:*"));
        assert!(g.contains("dashboards:read", "folders:uid:f"));
        assert_eq!(g.len(), 3);

        assert!(GrantIndex::from_json(r#"{"dashboards:read":"dashboards:*"}"#).is_err());
    }

    #[test]
    fn subset_and_merge() {
        let small = GrantIndex::new().grant("a", "x");
        let mut big = GrantIndex::new().grant("b", "y");
        assert!(!small.is_subset_of(&big));
        big.merge(&small);
        assert!(small.is_subset_of(&big));
        assert!(!big.is_subset_of(&small));
    }

    #[tokio::test]
    async fn embedded_source_reads_principal() {
        let principal = Principal::new(1, 1)
            .with_permissions(GrantIndex::new().grant("annotations:read", "*"));
        let grants = EmbeddedGrants.grants(&principal).await.unwrap();
        assert!(grants.contains("annotations:read", "*"));

        let bare = Principal::new(2, 1);
        assert!(EmbeddedGrants.grants(&bare).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn role_source_unions_user_team_and_basic_roles() {
        let catalog = RoleCatalog::new()
            .define_role("annotations_reader", GrantIndex::new().grant("annotations:read", "*"))
            .define_role("ops_folder", GrantIndex::new().grant("dashboards:read", "folders:uid:ops"))
            .define_role("one_dash", GrantIndex::new().grant("dashboards:read", "dashboards:uid:d1"))
            .assign_basic_role(1, "Viewer", "annotations_reader")
            .assign_team(1, 10, "ops_folder")
            .assign_user(1, 5, "one_dash")
            .assign_user(2, 5, "ops_folder")
            .assign_user(1, 5, "missing_role");
        let source = RoleGrantSource::new(catalog);

        let principal = Principal::new(5, 1)
            .with_basic_role("Viewer")
            .with_teams(vec![10]);
        let grants = source.grants(&principal).await.unwrap();
        assert!(grants.contains("annotations:read", "*"));
        assert!(grants.contains("dashboards:read", "folders:uid:ops"));
        assert!(grants.contains("dashboards:read", "dashboards:uid:d1"));
        assert_eq!(grants.len(), 3);

        // Assignments are per org.
        let other_org = Principal::new(5, 2);
        let grants = source.grants(&other_org).await.unwrap();
        assert!(grants.contains("dashboards:read", "folders:uid:ops"));
        assert!(!grants.has_action("annotations:read"));
    }
}
