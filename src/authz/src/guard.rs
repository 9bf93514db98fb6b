//! Call-site enforcement
//!
//! An [`RbacGuard`] wraps a protected operation with a fixed set of
//! resource requirements plus requirements derived from the call's
//! arguments. All requirements go to the authorizer as one request and the
//! per-access decisions are combined under a [`DecisionMode`]. The wrapped
//! operation only runs when the combined decision allows.
//!
//! # Example
//!
//! ```
//! use rbac_authz::guard::{DecisionMode, RbacGuard};
//! use rbac_authz::{Action, AuthorizationService, InMemoryRbacStore, Resource, ResourceType};
//! use std::sync::Arc;
//!
//! let service = Arc::new(AuthorizationService::new(Arc::new(InMemoryRbacStore::new())));
//!
//! // export(table, path): needs Operate on the export operation and Write on the target path
//! let guard: RbacGuard<(String, String)> = RbacGuard::new(service)
//!     .mode(DecisionMode::All)
//!     .require(Action::Operate, Resource::new(ResourceType::Operation, "export"))
//!     .require_runtime(ResourceType::Hdfs, Action::Write, |(_, path): &(String, String)| path.clone());
//! ```

use crate::context::RbacContext;
use crate::error::{AuthzError, Result};
use crate::service::AuthorizationService;
use crate::types::{Action, AuthRequest, AuthResponse, Resource, ResourceAccess, ResourceAccessAuth, ResourceType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Message reported for every blocked operation; never names the resource
pub const NOT_AUTHORIZED: &str = "not authorized to access resources";

/// Client-side view of the authorization service
#[async_trait]
pub trait RbacAuthorizer: Send + Sync {
    /// Decide every access of the request, one result per access in order
    async fn authorize(&self, ctx: &RbacContext, request: AuthRequest) -> Result<AuthResponse>;
}

#[async_trait]
impl RbacAuthorizer for AuthorizationService {
    async fn authorize(&self, ctx: &RbacContext, request: AuthRequest) -> Result<AuthResponse> {
        AuthorizationService::authorize(self, ctx, request).await
    }
}

/// How per-access decisions combine into one gate outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionMode {
    /// Every decision must allow
    #[default]
    All,
    /// At least one decision must allow
    Any,
}

impl DecisionMode {
    /// Combine decisions; an empty set never allows
    pub fn aggregate(self, decisions: &[ResourceAccessAuth]) -> bool {
        if decisions.is_empty() {
            return false;
        }
        match self {
            DecisionMode::All => decisions.iter().all(|d| d.allow),
            DecisionMode::Any => decisions.iter().any(|d| d.allow),
        }
    }
}

type ValueExtractor<Args> = Box<dyn Fn(&Args) -> String + Send + Sync>;

struct RuntimeRequirement<Args> {
    resource_type: ResourceType,
    action: Action,
    value: ValueExtractor<Args>,
}

/// Guard for an operation taking `Args`
pub struct RbacGuard<Args = ()> {
    authorizer: Arc<dyn RbacAuthorizer>,
    mode: DecisionMode,
    requirements: Vec<ResourceAccess>,
    runtime: Vec<RuntimeRequirement<Args>>,
}

impl<Args> RbacGuard<Args> {
    /// Guard with no requirements in `All` mode
    pub fn new(authorizer: Arc<dyn RbacAuthorizer>) -> Self {
        Self {
            authorizer,
            mode: DecisionMode::default(),
            requirements: Vec::new(),
            runtime: Vec::new(),
        }
    }

    /// Set the decision mode
    pub fn mode(mut self, mode: DecisionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Add a static requirement
    pub fn require(mut self, action: Action, resource: Resource) -> Self {
        self.requirements.push(ResourceAccess::new(action, resource));
        self
    }

    /// Add a requirement whose resource value is derived from the call's arguments
    pub fn require_runtime<F, V>(mut self, resource_type: ResourceType, action: Action, value: F) -> Self
    where
        F: Fn(&Args) -> V + Send + Sync + 'static,
        V: ToString,
    {
        self.runtime.push(RuntimeRequirement {
            resource_type,
            action,
            value: Box::new(move |args| value(args).to_string()),
        });
        self
    }

    /// Static requirements followed by the runtime requirements for `args`
    pub fn resource_accesses(&self, args: &Args) -> Vec<ResourceAccess> {
        let mut accesses = self.requirements.clone();
        accesses.extend(self.runtime.iter().map(|req| {
            ResourceAccess::new(req.action, Resource::new(req.resource_type, (req.value)(args)))
        }));
        accesses
    }

    /// Authorize a call with `args`; `Forbidden` unless the combined decision allows
    pub async fn check(&self, ctx: &RbacContext, args: &Args) -> Result<()> {
        let accesses = self.resource_accesses(args);
        let expected = accesses.len();
        debug!(
            request_id = %ctx.request_id(),
            "authorizing {} resource accesses with decision mode {:?}...",
            expected,
            self.mode
        );

        let response = self.authorizer.authorize(ctx, AuthRequest::new(accesses)).await?;
        let allow = response.results.len() == expected && self.mode.aggregate(&response.results);
        if !allow {
            warn!(
                request_id = %ctx.request_id(),
                "blocked guarded operation: {} of {} accesses allowed under {:?}",
                response.results.iter().filter(|r| r.allow).count(),
                expected,
                self.mode
            );
            return Err(AuthzError::Forbidden(NOT_AUTHORIZED.to_string()));
        }
        Ok(())
    }

    /// Run `op(args)` only if the call is authorized
    pub async fn invoke<T, F, Fut>(&self, ctx: &RbacContext, args: Args, op: F) -> Result<T>
    where
        F: FnOnce(Args) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.check(ctx, &args).await?;
        op(args).await
    }
}
