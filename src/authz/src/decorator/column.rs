//! Column resource decoration

use super::ResourceDecorator;
use crate::error::Result;
use crate::types::Resource;
use tracing::debug;

/// Column decorator
///
/// Column ancestry lives in an external tag catalog. Until that catalog is
/// wired in, columns decorate to nothing and are only matched by policies
/// granted on the column itself.
#[derive(Debug, Clone, Default)]
pub struct ColumnResourceDecorator;

impl ColumnResourceDecorator {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceDecorator for ColumnResourceDecorator {
    fn decorate(&self, resource: &Resource) -> Result<Vec<Resource>> {
        // TODO: resolve column tags from the tag catalog once its client exists
        debug!("no tag catalog configured, column {} decorates to nothing", resource.value);
        Ok(Vec::new())
    }
}
