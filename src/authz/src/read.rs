//! Read access to users, roles, policies and their assignments
//!
//! Any authenticated caller may read. Listings return one [`Page`] of records
//! together with the total number of matches. Users are addressed by their
//! external id, roles and policies by their numeric id.

use crate::context::RbacContext;
use crate::error::{AuthzError, Result};
use crate::store::{validate_id, RbacStore};
use crate::types::{Entity, EntityType, Id, ListPayload, Page, Policy, Role, Subject, User};
use futures::try_join;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Read operations over an [`RbacStore`]
pub struct EntityReadService {
    store: Arc<dyn RbacStore>,
}

impl EntityReadService {
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        Self { store }
    }

    /// Get a user by external id
    pub async fn get_user(&self, ctx: &RbacContext, user_id: &str) -> Result<User> {
        ctx.user()?;
        self.require_user(user_id).await
    }

    /// Users whose username contains `search`
    pub async fn list_users(&self, ctx: &RbacContext, search: Option<&str>, page: Page) -> Result<ListPayload<User>> {
        ctx.user()?;
        page.validate()?;
        let search = non_blank(search);

        let (list, total) = try_join!(self.store.list_users(search, page), self.store.count_users(search))?;
        debug!("listed {} of {} users", list.len(), total);
        Ok(ListPayload::new(page, total, list))
    }

    /// Users holding the role
    pub async fn list_role_users(&self, ctx: &RbacContext, role_id: Id, page: Page) -> Result<ListPayload<User>> {
        ctx.user()?;
        page.validate()?;
        self.require_role(role_id).await?;

        let (list, total) = try_join!(
            self.store.list_role_users(role_id, page),
            self.store.count_role_users(role_id)
        )?;
        Ok(ListPayload::new(page, total, list))
    }

    pub async fn get_role(&self, ctx: &RbacContext, role_id: Id) -> Result<Role> {
        ctx.user()?;
        self.require_role(role_id).await
    }

    /// Roles whose name contains `search`
    pub async fn list_roles(&self, ctx: &RbacContext, search: Option<&str>, page: Page) -> Result<ListPayload<Role>> {
        ctx.user()?;
        page.validate()?;
        let search = non_blank(search);

        let (list, total) = try_join!(self.store.list_roles(search, page), self.store.count_roles(search))?;
        debug!("listed {} of {} roles", list.len(), total);
        Ok(ListPayload::new(page, total, list))
    }

    /// Roles held by the user, in assignment order
    pub async fn list_user_roles(&self, ctx: &RbacContext, user_id: &str, page: Page) -> Result<ListPayload<Role>> {
        ctx.user()?;
        page.validate()?;
        let user = self.require_user(user_id).await?;

        let (list, total) = try_join!(
            self.store.list_user_roles(user.id, page),
            self.store.count_user_roles(user.id)
        )?;
        Ok(ListPayload::new(page, total, list))
    }

    pub async fn get_policy(&self, ctx: &RbacContext, policy_id: Id) -> Result<Policy> {
        ctx.user()?;
        self.require_policy(policy_id).await
    }

    /// Policies whose name contains `search`
    pub async fn list_policies(
        &self,
        ctx: &RbacContext,
        search: Option<&str>,
        page: Page,
    ) -> Result<ListPayload<Policy>> {
        ctx.user()?;
        page.validate()?;
        let search = non_blank(search);

        let (list, total) = try_join!(self.store.list_policies(search, page), self.store.count_policies(search))?;
        debug!("listed {} of {} policies", list.len(), total);
        Ok(ListPayload::new(page, total, list))
    }

    /// Policies granted to the user directly; role grants are not included
    pub async fn list_user_policies(&self, ctx: &RbacContext, user_id: &str, page: Page) -> Result<ListPayload<Policy>> {
        ctx.user()?;
        page.validate()?;
        let user = self.require_user(user_id).await?;
        self.entity_policies(user.entity(), page).await
    }

    /// Policies granted to the role
    pub async fn list_role_policies(&self, ctx: &RbacContext, role_id: Id, page: Page) -> Result<ListPayload<Policy>> {
        ctx.user()?;
        page.validate()?;
        self.require_role(role_id).await?;
        self.entity_policies(Entity::role(role_id), page).await
    }

    /// Users and roles the policy is granted to, resolved to their records
    pub async fn list_policy_entities(
        &self,
        ctx: &RbacContext,
        policy_id: Id,
        page: Page,
    ) -> Result<ListPayload<Subject>> {
        ctx.user()?;
        page.validate()?;
        self.require_policy(policy_id).await?;

        let (entities, total) = try_join!(
            self.store.list_policy_entities(policy_id, page),
            self.store.count_policy_entities(policy_id)
        )?;
        let list = self.resolve(&entities).await?;
        Ok(ListPayload::new(page, total, list))
    }

    async fn entity_policies(&self, entity: Entity, page: Page) -> Result<ListPayload<Policy>> {
        let (list, total) = try_join!(
            self.store.list_entity_policies(entity, page),
            self.store.count_entity_policies(entity)
        )?;
        debug!("listed {} of {} policies for {}", list.len(), total, entity);
        Ok(ListPayload::new(page, total, list))
    }

    /// Load the user or role behind each entity, keeping the entity order
    async fn resolve(&self, entities: &[Entity]) -> Result<Vec<Subject>> {
        let ids_of = |entity_type: EntityType| -> Vec<Id> {
            entities
                .iter()
                .filter(|e| e.entity_type == entity_type)
                .map(|e| e.id)
                .collect()
        };
        let (user_ids, role_ids) = (ids_of(EntityType::User), ids_of(EntityType::Role));

        let (users, roles) = try_join!(self.store.users_by_ids(&user_ids), self.store.roles_by_ids(&role_ids))?;
        let users: HashMap<Id, User> = users.into_iter().map(|u| (u.id, u)).collect();
        let roles: HashMap<Id, Role> = roles.into_iter().map(|r| (r.id, r)).collect();

        entities
            .iter()
            .map(|entity| {
                let subject = match entity.entity_type {
                    EntityType::User => users.get(&entity.id).cloned().map(Subject::User),
                    EntityType::Role => roles.get(&entity.id).cloned().map(Subject::Role),
                };
                subject.ok_or_else(|| AuthzError::Internal(format!("policy assigned to missing {}", entity)))
            })
            .collect()
    }

    async fn require_user(&self, user_id: &str) -> Result<User> {
        if user_id.trim().is_empty() {
            return Err(AuthzError::InvalidInput("user id cannot be blank".to_string()));
        }
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AuthzError::NotFound(format!("no user found for {}", user_id)))
    }

    async fn require_role(&self, role_id: Id) -> Result<Role> {
        validate_id(role_id, "role id")?;
        self.store
            .get_role(role_id)
            .await?
            .ok_or_else(|| AuthzError::NotFound(format!("no role found for id {}", role_id)))
    }

    async fn require_policy(&self, policy_id: Id) -> Result<Policy> {
        validate_id(policy_id, "policy id")?;
        self.store
            .get_policy(policy_id)
            .await?
            .ok_or_else(|| AuthzError::NotFound(format!("no policy found for id {}", policy_id)))
    }
}

fn non_blank(search: Option<&str>) -> Option<&str> {
    search.map(str::trim).filter(|s| !s.is_empty())
}
