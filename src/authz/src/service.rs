//! Batch authorization: decoration plus one decision per access

use crate::authorizer::Authorizer;
use crate::context::RbacContext;
use crate::decorator::{HybridResourceDecorator, ResourceDecorator};
use crate::error::{AuthzError, Result};
use crate::store::RbacStore;
use crate::types::{AuthRequest, AuthResponse};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

/// Authorization service
///
/// # Architecture
///
/// ```text
/// AuthRequest → validate → decorate (per access) → Authorizer (per access) → AuthResponse
///                                                       ↓
///                                                   RbacStore
/// ```
///
/// Every access is decided independently: a deny on one access never
/// short-circuits the others, and results come back in input order.
pub struct AuthorizationService {
    authorizer: Authorizer,
    decorator: Arc<dyn ResourceDecorator>,
}

impl AuthorizationService {
    /// Service with the default per-type decorators
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        Self::with_decorator(store, Arc::new(HybridResourceDecorator::new()))
    }

    /// Service with a custom decorator
    pub fn with_decorator(store: Arc<dyn RbacStore>, decorator: Arc<dyn ResourceDecorator>) -> Self {
        Self {
            authorizer: Authorizer::new(store),
            decorator,
        }
    }

    /// Authorize every access of the request for the context's user
    pub async fn authorize(&self, ctx: &RbacContext, request: AuthRequest) -> Result<AuthResponse> {
        let mut accesses = request.resource_accesses;
        if accesses.is_empty() {
            return Err(AuthzError::InvalidInput("resource accesses cannot be empty".to_string()));
        }
        for access in &accesses {
            access.validate()?;
        }
        ctx.user()?;

        for access in &mut accesses {
            let decorated = self.decorator.decorate(&access.resource)?;
            debug!("decorated {} with {} resources", access.resource, decorated.len());
            access.decorated_resources.extend(decorated);
        }

        debug!(request_id = %ctx.request_id(), "authorizing {} resource accesses...", accesses.len());
        let results = try_join_all(
            accesses
                .into_iter()
                .map(|access| self.authorizer.authorize(ctx, access)),
        )
        .await?;

        debug!(
            "authorized {} of {} resource accesses",
            results.iter().filter(|r| r.allow).count(),
            results.len()
        );
        Ok(AuthResponse { results })
    }
}
