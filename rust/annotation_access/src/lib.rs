//! `annotation_access`: who may read which annotations.
//!
//! Resolves a principal's raw `(action, scope)` grants and the nested folder
//! hierarchy into the set of dashboards whose annotations are visible, then
//! pages through annotation stores under that set.
//!
//! Modules:
//! - `types`: domain types (Dashboard, Folder, AnnotationItem, queries)
//! - `accesscontrol`: grant sources, scope classification, folder closure,
//!   permission filters and the access resolver
//! - `predicate`: filter expression tree and its SQL rendering
//! - `store`: store traits plus an in-memory implementation
//! - `repository`: authorized, paginated annotation listing
//! - `composite`: concurrent fan-out and merge over several stores
//! - `config`: access configuration
//! - `error`: error types

pub mod accesscontrol;
pub mod composite;
pub mod config;
pub mod error;
pub mod predicate;
pub mod repository;
pub mod store;
pub mod types;

pub use accesscontrol::grants::{EmbeddedGrants, GrantIndex, GrantSource, RoleCatalog, RoleGrantSource};
pub use accesscontrol::resolver::AccessResolver;
pub use composite::CompositeStore;
pub use config::AccessConfig;
pub use error::{AccessError, StoreError};
pub use repository::AnnotationRepository;
