//! HDFS path decoration

use super::ResourceDecorator;
use crate::error::Result;
use crate::types::{Resource, ResourceType};
use tracing::debug;

const SCHEME_SEPARATOR: &str = "://";

/// Decorates `[scheme://]segment/segment/.../leaf` paths with every
/// directory above the leaf.
///
/// `hdfs://host:8020/home/work/file.parquet` decorates to
/// `hdfs://host:8020`, `hdfs://host:8020/home` and
/// `hdfs://host:8020/home/work`.
///
/// The scheme and any leading `/` form the root and are kept on every
/// ancestor. Empty segments are skipped, trailing `/` are ignored.
#[derive(Debug, Clone, Default)]
pub struct HdfsResourceDecorator;

impl HdfsResourceDecorator {
    pub fn new() -> Self {
        Self
    }

    /// Split a path into its root (scheme plus leading slashes) and the rest
    fn split_root(path: &str) -> (&str, &str) {
        let after_scheme = path
            .find(SCHEME_SEPARATOR)
            .map(|idx| idx + SCHEME_SEPARATOR.len())
            .unwrap_or(0);
        let rest = path[after_scheme..].trim_start_matches('/');
        path.split_at(path.len() - rest.len())
    }
}

impl ResourceDecorator for HdfsResourceDecorator {
    fn decorate(&self, resource: &Resource) -> Result<Vec<Resource>> {
        if resource.resource_type != ResourceType::Hdfs {
            return Ok(Vec::new());
        }
        resource.validate()?;

        debug!("decorating hdfs resource {}...", resource.value);
        let (root, rest) = Self::split_root(&resource.value);

        let mut segments: Vec<&str> = rest.split('/').collect();
        while segments.last() == Some(&"") {
            segments.pop();
        }
        if segments.len() <= 1 {
            return Ok(Vec::new());
        }

        let mut decorated = Vec::with_capacity(segments.len() - 1);
        let mut current = String::from(root);
        for segment in &segments[..segments.len() - 1] {
            if segment.is_empty() {
                continue;
            }
            if current.len() > root.len() {
                current.push('/');
            }
            current.push_str(segment);
            decorated.push(Resource::hdfs(current.clone()));
        }

        debug!("decorated {} with {} ancestors", resource.value, decorated.len());
        Ok(decorated)
    }
}
