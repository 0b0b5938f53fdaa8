//! Scope classification.
//!
//! For one resource category, decides whether the principal's grants give
//! unconditional access, no access, or access to an explicit id set. Pure and
//! infallible: malformed scopes never match.

use ahash::AHashSet;

use super::grants::GrantIndex;
use super::scope::{identifier, Wildcards};
use super::{
    SCOPE_ANNOTATIONS_TYPE_DASHBOARD, SCOPE_ANNOTATIONS_TYPE_ORGANIZATION,
    SCOPE_ANNOTATIONS_TYPE_PREFIX,
};

/// Classification outcome for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeClass {
    /// A wildcard covering the whole category was granted.
    Unconditional,
    /// Nothing in the category was granted.
    None,
    /// Exactly these identifiers were granted. Never empty.
    Explicit(AHashSet<String>),
}

impl ScopeClass {
    pub fn is_none(&self) -> bool {
        matches!(self, ScopeClass::None)
    }

    pub fn is_unconditional(&self) -> bool {
        matches!(self, ScopeClass::Unconditional)
    }

    /// Whether `id` is covered.
    pub fn covers(&self, id: &str) -> bool {
        match self {
            ScopeClass::Unconditional => true,
            ScopeClass::None => false,
            ScopeClass::Explicit(ids) => ids.contains(id),
        }
    }
}

/// Resource category: the exact-scope prefix plus its wildcards.
#[derive(Debug, Clone)]
pub struct Category {
    prefix: &'static str,
    wildcards: Wildcards,
}

impl Category {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            wildcards: Wildcards::from_prefix(prefix),
        }
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }
}

/// Classify `actions` for one category.
///
/// Actions are scanned in order and the first wildcard wins. Otherwise every
/// exact identifier under the category prefix, across all listed actions, is
/// collected.
pub fn classify(actions: &[&str], grants: &GrantIndex, category: &Category) -> ScopeClass {
    let mut ids = AHashSet::new();
    for action in actions {
        for scope in grants.scopes(action) {
            if category.wildcards.contains(scope) {
                return ScopeClass::Unconditional;
            }
            if let Some(id) = identifier(scope, category.prefix) {
                ids.insert(id.to_string());
            }
        }
    }
    if ids.is_empty() {
        ScopeClass::None
    } else {
        ScopeClass::Explicit(ids)
    }
}

/// Which annotation types a set of `annotations:read` scopes opens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationScopeTypes {
    pub organization: bool,
    pub dashboard: bool,
}

/// Any wildcard over `annotations:type:` opens both types.
pub fn annotation_scope_types(scopes: &[String]) -> AnnotationScopeTypes {
    let wildcards = Wildcards::from_prefix(SCOPE_ANNOTATIONS_TYPE_PREFIX);
    let mut types = AnnotationScopeTypes::default();
    for scope in scopes {
        if wildcards.contains(scope) {
            return AnnotationScopeTypes {
                organization: true,
                dashboard: true,
            };
        }
        match scope.as_str() {
            SCOPE_ANNOTATIONS_TYPE_ORGANIZATION => types.organization = true,
            SCOPE_ANNOTATIONS_TYPE_DASHBOARD => types.dashboard = true,
            _ => {}
        }
    }
    types
}
