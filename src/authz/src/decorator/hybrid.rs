//! Per-type decorator dispatch

use super::{ColumnResourceDecorator, HdfsResourceDecorator, ResourceDecorator};
use crate::error::Result;
use crate::types::{Resource, ResourceType};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Routes each resource to the decorator registered for its type.
///
/// Types without a registered decorator (TAG and OPERATION by default)
/// decorate to nothing.
#[derive(Clone)]
pub struct HybridResourceDecorator {
    decorators: HashMap<ResourceType, Arc<dyn ResourceDecorator>>,
}

impl HybridResourceDecorator {
    /// Dispatcher with the HDFS and COLUMN strategies registered
    pub fn new() -> Self {
        Self::empty()
            .with_decorator(ResourceType::Hdfs, Arc::new(HdfsResourceDecorator::new()))
            .with_decorator(ResourceType::Column, Arc::new(ColumnResourceDecorator::new()))
    }

    /// Dispatcher with no strategies at all
    pub fn empty() -> Self {
        Self {
            decorators: HashMap::new(),
        }
    }

    /// Register (or replace) the strategy for a resource type
    pub fn with_decorator(
        mut self,
        resource_type: ResourceType,
        decorator: Arc<dyn ResourceDecorator>,
    ) -> Self {
        self.decorators.insert(resource_type, decorator);
        self
    }
}

impl Default for HybridResourceDecorator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceDecorator for HybridResourceDecorator {
    fn decorate(&self, resource: &Resource) -> Result<Vec<Resource>> {
        match self.decorators.get(&resource.resource_type) {
            Some(decorator) => decorator.decorate(resource),
            None => {
                debug!("no decorator for {:?} resources", resource.resource_type);
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<Resource>);

    impl ResourceDecorator for Fixed {
        fn decorate(&self, _resource: &Resource) -> Result<Vec<Resource>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_dispatch_by_type() {
        let decorator = HybridResourceDecorator::new();

        let hdfs = decorator.decorate(&Resource::hdfs("hdfs://h/a/b")).unwrap();
        assert_eq!(hdfs, vec![Resource::hdfs("hdfs://h"), Resource::hdfs("hdfs://h/a")]);

        let column = Resource::new(ResourceType::Column, "db.table.col");
        assert!(decorator.decorate(&column).unwrap().is_empty());

        let tag = Resource::new(ResourceType::Tag, "finance/pii");
        assert!(decorator.decorate(&tag).unwrap().is_empty());

        let op = Resource::new(ResourceType::Operation, "cluster/restart");
        assert!(decorator.decorate(&op).unwrap().is_empty());
    }

    #[test]
    fn test_unregistered_type_is_empty() {
        let decorator = HybridResourceDecorator::empty();
        assert!(decorator.decorate(&Resource::hdfs("hdfs://h/a/b")).unwrap().is_empty());
    }

    #[test]
    fn test_custom_strategy() {
        let parent = Resource::new(ResourceType::Tag, "finance");
        let decorator = HybridResourceDecorator::new()
            .with_decorator(ResourceType::Tag, Arc::new(Fixed(vec![parent.clone()])));

        let tag = Resource::new(ResourceType::Tag, "finance/pii");
        assert_eq!(decorator.decorate(&tag).unwrap(), vec![parent]);
    }
}
