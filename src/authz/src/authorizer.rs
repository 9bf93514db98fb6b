//! Single-access authorization
//!
//! Resolves, for one decorated [`ResourceAccess`], whether the caller holds
//! (directly or through one role) a policy that covers the requested action
//! on the resource or any of its ancestors.

use crate::context::RbacContext;
use crate::error::{AuthzError, Result};
use crate::predicate::PolicyPredicate;
use crate::store::RbacStore;
use crate::types::{EntityType, Id, Policy, ResourceAccess, ResourceAccessAuth, Subject};
use std::sync::Arc;
use tracing::{debug, error};

/// Decides one resource access against the backing store
pub struct Authorizer {
    store: Arc<dyn RbacStore>,
    predicate: PolicyPredicate,
}

impl Authorizer {
    /// Create an authorizer over a store
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        Self {
            store,
            predicate: PolicyPredicate::new(),
        }
    }

    /// Authorize a single access for the context's user
    ///
    /// # Pipeline
    ///
    /// 1. Validate the access and its decorated resources
    /// 2. Load policies for `{resource} ∪ decorated_resources`
    /// 3. Keep policies whose action covers the requested action
    /// 4. Find an assignment of one of them to the user or one of its roles
    /// 5. Resolve the evidence (holder and policy) for an allow
    ///
    /// Store failures are returned as errors, never folded into a deny.
    pub async fn authorize(&self, ctx: &RbacContext, access: ResourceAccess) -> Result<ResourceAccessAuth> {
        access.validate()?;
        let user = ctx.user()?;

        let resources = access.resource_set();
        debug!(
            request_id = %ctx.request_id(),
            "authorizing {} access on {} resources...",
            access.action,
            resources.len()
        );

        let policies: Vec<Policy> = self
            .store
            .policies_for_resources(&resources)
            .await
            .map_err(|e| log_store_error("policies_for_resources", e))?
            .into_iter()
            .filter(|policy| self.predicate.pass(policy, &access))
            .collect();

        if policies.is_empty() {
            debug!("no policy covers {} on {}", access.action, access.resource);
            return Ok(ResourceAccessAuth::deny(access));
        }

        let policy_ids: Vec<Id> = policies.iter().map(|p| p.id).collect();
        let assignment = self
            .store
            .user_assignment(user.id, &policy_ids)
            .await
            .map_err(|e| log_store_error("user_assignment", e))?;

        let Some(assignment) = assignment else {
            debug!("user {} holds none of policies {:?}", user.user_id, policy_ids);
            return Ok(ResourceAccessAuth::deny(access));
        };

        let entity = match assignment.entity_type {
            EntityType::User => Subject::User(user.clone()),
            EntityType::Role => {
                let role = self
                    .store
                    .get_role(assignment.entity_id)
                    .await
                    .map_err(|e| log_store_error("get_role", e))?
                    .ok_or_else(|| {
                        AuthzError::Internal(format!(
                            "assignment references missing role {}",
                            assignment.entity_id
                        ))
                    })?;
                Subject::Role(role)
            }
        };

        let policy = policies
            .into_iter()
            .find(|p| p.id == assignment.policy_id)
            .ok_or_else(|| {
                AuthzError::Internal(format!(
                    "store returned assignment for policy {} outside the candidate set",
                    assignment.policy_id
                ))
            })?;

        debug!(
            "allowed {} on {} as {} by policy {}",
            access.action,
            access.resource,
            entity.entity(),
            policy.id
        );
        Ok(ResourceAccessAuth::allow(access, entity, policy))
    }
}

fn log_store_error(operation: &str, err: AuthzError) -> AuthzError {
    error!("store operation {} failed: {}", operation, err);
    err
}
