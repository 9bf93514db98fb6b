//! Administration of users, roles, policies and their assignments
//!
//! Every operation requires an authenticated admin caller. Assignments are
//! idempotent: assigning an existing edge or removing a missing one is a
//! no-op.

use crate::context::RbacContext;
use crate::error::{AuthzError, Result};
use crate::store::{validate_id, RbacStore};
use crate::types::{Entity, Id, NewPolicy, NewRole, NewUser, Policy, Role, User};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Admin operations over an [`RbacStore`]
pub struct AdminService {
    store: Arc<dyn RbacStore>,
}

impl AdminService {
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        Self { store }
    }

    /// Register a user
    pub async fn create_user(&self, ctx: &RbacContext, user: NewUser) -> Result<User> {
        ensure_admin(ctx)?;
        user.validate()?;

        let created = self.store.insert_user(user).await?;
        info!(request_id = %ctx.request_id(), "created user {} with id {}", created.user_id, created.id);
        Ok(created)
    }

    pub async fn create_role(&self, ctx: &RbacContext, role: NewRole) -> Result<Role> {
        ensure_admin(ctx)?;
        role.validate()?;
        if let Some(description) = &role.description {
            validate_not_blank(description, "role description")?;
        }

        let created = self.store.insert_role(role).await?;
        info!(request_id = %ctx.request_id(), "created role {} with id {}", created.name, created.id);
        Ok(created)
    }

    pub async fn update_role_description(&self, ctx: &RbacContext, role_id: Id, description: &str) -> Result<Role> {
        ensure_admin(ctx)?;
        validate_id(role_id, "role id")?;
        validate_not_blank(description, "role description")?;

        let mut role = self.require_role(role_id).await?;
        role.description = Some(description.to_string());
        role.updated_at = Utc::now();
        if !self.store.update_role(&role).await? {
            return Err(AuthzError::Internal(format!("failed to update role {} description", role_id)));
        }
        info!(request_id = %ctx.request_id(), "updated description for role {}", role_id);
        Ok(role)
    }

    /// Delete a role that no user holds and that holds no policy
    pub async fn delete_role(&self, ctx: &RbacContext, role_id: Id) -> Result<()> {
        ensure_admin(ctx)?;
        validate_id(role_id, "role id")?;

        let users = self.store.count_role_users(role_id).await?;
        debug!("role {} assigned to {} users", role_id, users);
        if users > 0 {
            return Err(AuthzError::Conflict("role still assigned to users".to_string()));
        }
        let policies = self.store.count_entity_policies(Entity::role(role_id)).await?;
        debug!("role {} assigned with {} policies", role_id, policies);
        if policies > 0 {
            return Err(AuthzError::Conflict("role still assigned with policies".to_string()));
        }

        if !self.store.delete_role(role_id).await? {
            return Err(not_found("role", role_id));
        }
        info!(request_id = %ctx.request_id(), "deleted role {}", role_id);
        Ok(())
    }

    pub async fn create_policy(&self, ctx: &RbacContext, policy: NewPolicy) -> Result<Policy> {
        ensure_admin(ctx)?;
        policy.validate()?;
        if let Some(description) = &policy.description {
            validate_not_blank(description, "policy description")?;
        }

        let created = self.store.insert_policy(policy).await?;
        info!(
            request_id = %ctx.request_id(),
            "created policy {} ({} on {}) with id {}",
            created.name,
            created.action,
            created.resource,
            created.id
        );
        Ok(created)
    }

    pub async fn update_policy_description(
        &self,
        ctx: &RbacContext,
        policy_id: Id,
        description: &str,
    ) -> Result<Policy> {
        ensure_admin(ctx)?;
        validate_id(policy_id, "policy id")?;
        validate_not_blank(description, "policy description")?;

        let mut policy = self.require_policy(policy_id).await?;
        policy.description = Some(description.to_string());
        policy.updated_at = Utc::now();
        if !self.store.update_policy(&policy).await? {
            return Err(AuthzError::Internal(format!("failed to update policy {} description", policy_id)));
        }
        info!(request_id = %ctx.request_id(), "updated description for policy {}", policy_id);
        Ok(policy)
    }

    /// Delete a policy that is not granted to any user or role
    pub async fn delete_policy(&self, ctx: &RbacContext, policy_id: Id) -> Result<()> {
        ensure_admin(ctx)?;
        validate_id(policy_id, "policy id")?;

        let entities = self.store.count_policy_entities(policy_id).await?;
        debug!("policy {} assigned to {} entities", policy_id, entities);
        if entities > 0 {
            return Err(AuthzError::Conflict("policy still assigned to entities".to_string()));
        }

        if !self.store.delete_policy(policy_id).await? {
            return Err(not_found("policy", policy_id));
        }
        info!(request_id = %ctx.request_id(), "deleted policy {}", policy_id);
        Ok(())
    }

    pub async fn assign_role_to_user(&self, ctx: &RbacContext, user_id: &str, role_id: Id) -> Result<()> {
        ensure_admin(ctx)?;
        validate_not_blank(user_id, "user id")?;
        validate_id(role_id, "role id")?;

        let user = self.require_user(user_id).await?;
        let role = self.require_role(role_id).await?;
        if self.store.get_user_role(user.id, role.id).await?.is_some() {
            debug!("role {} already assigned to user {}", role.name, user_id);
            return Ok(());
        }
        self.store.insert_user_role(user.id, role.id).await?;
        info!(request_id = %ctx.request_id(), "assigned role {} to user {}", role.name, user_id);
        Ok(())
    }

    pub async fn unassign_role_from_user(&self, ctx: &RbacContext, user_id: &str, role_id: Id) -> Result<()> {
        ensure_admin(ctx)?;
        validate_not_blank(user_id, "user id")?;
        validate_id(role_id, "role id")?;

        let user = self.require_user(user_id).await?;
        let role = self.require_role(role_id).await?;
        if !self.store.delete_user_role(user.id, role.id).await? {
            debug!("role {} not assigned to user {}", role.name, user_id);
            return Ok(());
        }
        info!(request_id = %ctx.request_id(), "unassigned role {} from user {}", role.name, user_id);
        Ok(())
    }

    pub async fn assign_policy_to_user(&self, ctx: &RbacContext, user_id: &str, policy_id: Id) -> Result<()> {
        ensure_admin(ctx)?;
        validate_not_blank(user_id, "user id")?;
        validate_id(policy_id, "policy id")?;

        let user = self.require_user(user_id).await?;
        let policy = self.require_policy(policy_id).await?;
        self.grant(ctx, user.entity(), &policy, user_id).await
    }

    pub async fn unassign_policy_from_user(&self, ctx: &RbacContext, user_id: &str, policy_id: Id) -> Result<()> {
        ensure_admin(ctx)?;
        validate_not_blank(user_id, "user id")?;
        validate_id(policy_id, "policy id")?;

        let user = self.require_user(user_id).await?;
        let policy = self.require_policy(policy_id).await?;
        self.revoke(ctx, user.entity(), &policy, user_id).await
    }

    pub async fn assign_policy_to_role(&self, ctx: &RbacContext, role_id: Id, policy_id: Id) -> Result<()> {
        ensure_admin(ctx)?;
        validate_id(role_id, "role id")?;
        validate_id(policy_id, "policy id")?;

        let role = self.require_role(role_id).await?;
        let policy = self.require_policy(policy_id).await?;
        self.grant(ctx, role.entity(), &policy, &role.name).await
    }

    pub async fn unassign_policy_from_role(&self, ctx: &RbacContext, role_id: Id, policy_id: Id) -> Result<()> {
        ensure_admin(ctx)?;
        validate_id(role_id, "role id")?;
        validate_id(policy_id, "policy id")?;

        let role = self.require_role(role_id).await?;
        let policy = self.require_policy(policy_id).await?;
        self.revoke(ctx, role.entity(), &policy, &role.name).await
    }

    async fn grant(&self, ctx: &RbacContext, entity: Entity, policy: &Policy, holder: &str) -> Result<()> {
        if self.store.get_entity_policy(entity, policy.id).await?.is_some() {
            debug!("policy {} already assigned to {}", policy.name, holder);
            return Ok(());
        }
        self.store.insert_entity_policy(entity, policy.id).await?;
        info!(request_id = %ctx.request_id(), "assigned policy {} to {}", policy.name, holder);
        Ok(())
    }

    async fn revoke(&self, ctx: &RbacContext, entity: Entity, policy: &Policy, holder: &str) -> Result<()> {
        if !self.store.delete_entity_policy(entity, policy.id).await? {
            debug!("policy {} not assigned to {}", policy.name, holder);
            return Ok(());
        }
        info!(request_id = %ctx.request_id(), "unassigned policy {} from {}", policy.name, holder);
        Ok(())
    }

    async fn require_user(&self, user_id: &str) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AuthzError::NotFound(format!("no user found for {}", user_id)))
    }

    async fn require_role(&self, role_id: Id) -> Result<Role> {
        self.store.get_role(role_id).await?.ok_or_else(|| not_found("role", role_id))
    }

    async fn require_policy(&self, policy_id: Id) -> Result<Policy> {
        self.store.get_policy(policy_id).await?.ok_or_else(|| not_found("policy", policy_id))
    }
}

fn ensure_admin(ctx: &RbacContext) -> Result<()> {
    if !ctx.user()?.admin {
        return Err(AuthzError::Forbidden("not authorized to perform this operation".to_string()));
    }
    Ok(())
}

fn validate_not_blank(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AuthzError::InvalidInput(format!("{} cannot be blank", what)));
    }
    Ok(())
}

fn not_found(what: &str, id: Id) -> AuthzError {
    AuthzError::NotFound(format!("no {} found for id {}", what, id))
}
