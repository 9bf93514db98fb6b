//! Resource decoration
//!
//! A decorator expands one resource into the resources that logically
//! contain it (its ancestors). Policies granted on any ancestor apply to
//! the resource itself, so the authorizer queries policies over
//! `{resource} ∪ decorate(resource)`.
//!
//! # Examples
//!
//! ```
//! use rbac_authz::decorator::{HybridResourceDecorator, ResourceDecorator};
//! use rbac_authz::types::Resource;
//!
//! let decorator = HybridResourceDecorator::new();
//! let ancestors = decorator
//!     .decorate(&Resource::hdfs("hdfs://h:1/a/b/c.csv"))
//!     .unwrap();
//!
//! let values: Vec<_> = ancestors.iter().map(|r| r.value.as_str()).collect();
//! assert_eq!(values, ["hdfs://h:1", "hdfs://h:1/a", "hdfs://h:1/a/b"]);
//! ```

mod column;
mod hdfs;
mod hybrid;

pub use column::ColumnResourceDecorator;
pub use hdfs::HdfsResourceDecorator;
pub use hybrid::HybridResourceDecorator;

use crate::error::Result;
use crate::types::Resource;

/// Strategy producing the ancestors of a resource
///
/// Implementations are pure: decorating the same resource twice yields the
/// same sequence. The output never contains the input resource itself nor
/// duplicates.
pub trait ResourceDecorator: Send + Sync {
    /// Ancestors of `resource`, least specific first. May be empty.
    fn decorate(&self, resource: &Resource) -> Result<Vec<Resource>>;
}
