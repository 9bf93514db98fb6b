//! RBAC storage: users, roles, policies and their assignments

use crate::error::{AuthzError, Result};
use crate::types::{
    Entity, EntityPolicy, Id, NewPolicy, NewRole, NewUser, Page, Policy, Resource, Role,
    User, UserRole,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PostgresRbacStore;

/// RBAC store trait
///
/// The decision path only uses [`policies_for_resources`](RbacStore::policies_for_resources),
/// [`user_assignment`](RbacStore::user_assignment) and [`get_role`](RbacStore::get_role);
/// the remaining operations back the admin and read services. Referential
/// integrity between edges and entities is checked by callers, not by the store.
///
/// Listings of users, roles and policies are ordered by id. Listings over
/// assignment edges are ordered by when the edge was created. `search` is a
/// case-sensitive substring of the username (users) or name (roles, policies).
#[async_trait]
pub trait RbacStore: Send + Sync {
    /// Policies whose resource is any of `resources`, in store order
    async fn policies_for_resources(&self, resources: &[Resource]) -> Result<Vec<Policy>>;

    /// One assignment linking the user, directly or through one of its
    /// roles, to any of `policy_ids`
    async fn user_assignment(&self, user_id: Id, policy_ids: &[Id]) -> Result<Option<EntityPolicy>>;

    /// Get a role by id
    async fn get_role(&self, role_id: Id) -> Result<Option<Role>>;

    /// Register a user
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    /// Get a user by external id
    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    /// Create a role
    async fn insert_role(&self, role: NewRole) -> Result<Role>;

    /// Overwrite a role's mutable fields; false if the role does not exist
    async fn update_role(&self, role: &Role) -> Result<bool>;

    /// Delete a role; false if the role does not exist
    async fn delete_role(&self, role_id: Id) -> Result<bool>;

    /// Number of users holding the role
    async fn count_role_users(&self, role_id: Id) -> Result<u64>;

    /// Create a policy
    async fn insert_policy(&self, policy: NewPolicy) -> Result<Policy>;

    /// Get a policy by id
    async fn get_policy(&self, policy_id: Id) -> Result<Option<Policy>>;

    /// Overwrite a policy's mutable fields; false if the policy does not exist
    async fn update_policy(&self, policy: &Policy) -> Result<bool>;

    /// Delete a policy; false if the policy does not exist
    async fn delete_policy(&self, policy_id: Id) -> Result<bool>;

    /// Number of users and roles the policy is assigned to
    async fn count_policy_entities(&self, policy_id: Id) -> Result<u64>;

    /// Get a user-role edge
    async fn get_user_role(&self, user_id: Id, role_id: Id) -> Result<Option<UserRole>>;

    /// Create a user-role edge
    async fn insert_user_role(&self, user_id: Id, role_id: Id) -> Result<UserRole>;

    /// Delete a user-role edge; false if absent
    async fn delete_user_role(&self, user_id: Id, role_id: Id) -> Result<bool>;

    /// Get an entity-policy edge
    async fn get_entity_policy(&self, entity: Entity, policy_id: Id) -> Result<Option<EntityPolicy>>;

    /// Create an entity-policy edge
    async fn insert_entity_policy(&self, entity: Entity, policy_id: Id) -> Result<EntityPolicy>;

    /// Delete an entity-policy edge; false if absent
    async fn delete_entity_policy(&self, entity: Entity, policy_id: Id) -> Result<bool>;

    /// Number of policies assigned to the entity
    async fn count_entity_policies(&self, entity: Entity) -> Result<u64>;

    /// Page of users, optionally filtered by username
    async fn list_users(&self, search: Option<&str>, page: Page) -> Result<Vec<User>>;

    async fn count_users(&self, search: Option<&str>) -> Result<u64>;

    /// Users with the given internal ids, in id order; missing ids are skipped
    async fn users_by_ids(&self, ids: &[Id]) -> Result<Vec<User>>;

    /// Page of roles, optionally filtered by name
    async fn list_roles(&self, search: Option<&str>, page: Page) -> Result<Vec<Role>>;

    async fn count_roles(&self, search: Option<&str>) -> Result<u64>;

    /// Roles with the given ids, in id order; missing ids are skipped
    async fn roles_by_ids(&self, ids: &[Id]) -> Result<Vec<Role>>;

    /// Page of policies, optionally filtered by name
    async fn list_policies(&self, search: Option<&str>, page: Page) -> Result<Vec<Policy>>;

    async fn count_policies(&self, search: Option<&str>) -> Result<u64>;

    /// Page of users holding the role
    async fn list_role_users(&self, role_id: Id, page: Page) -> Result<Vec<User>>;

    /// Page of roles held by the user (internal id)
    async fn list_user_roles(&self, user_id: Id, page: Page) -> Result<Vec<Role>>;

    /// Number of roles held by the user (internal id)
    async fn count_user_roles(&self, user_id: Id) -> Result<u64>;

    /// Page of policies assigned to the entity
    async fn list_entity_policies(&self, entity: Entity, page: Page) -> Result<Vec<Policy>>;

    /// Page of users and roles the policy is assigned to
    async fn list_policy_entities(&self, policy_id: Id, page: Page) -> Result<Vec<Entity>>;
}

pub(crate) fn validate_resources(resources: &[Resource]) -> Result<()> {
    if resources.is_empty() {
        return Err(AuthzError::InvalidInput("resource collection cannot be empty".to_string()));
    }
    resources.iter().try_for_each(Resource::validate)
}

pub(crate) fn validate_id(id: Id, what: &str) -> Result<()> {
    if id <= 0 {
        return Err(AuthzError::InvalidInput(format!("{} must be positive, got {}", what, id)));
    }
    Ok(())
}

pub(crate) fn validate_policy_ids(policy_ids: &[Id]) -> Result<()> {
    if policy_ids.is_empty() {
        return Err(AuthzError::InvalidInput("policy ids cannot be empty".to_string()));
    }
    policy_ids.iter().try_for_each(|id| validate_id(*id, "policy id"))
}

fn search_matches(value: &str, search: Option<&str>) -> bool {
    search.map_or(true, |needle| value.contains(needle))
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<Id, User>,
    roles: BTreeMap<Id, Role>,
    policies: BTreeMap<Id, Policy>,
    user_roles: Vec<UserRole>,
    entity_policies: Vec<EntityPolicy>,
    user_seq: Id,
    role_seq: Id,
    policy_seq: Id,
}

fn next_id(seq: &mut Id) -> Id {
    *seq += 1;
    *seq
}

/// In-memory RBAC store
///
/// Assignment lookup prefers a policy granted to the user directly, then
/// policies granted to the user's roles in the order the roles were assigned.
#[derive(Clone, Default)]
pub struct InMemoryRbacStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryRbacStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RbacStore for InMemoryRbacStore {
    async fn policies_for_resources(&self, resources: &[Resource]) -> Result<Vec<Policy>> {
        validate_resources(resources)?;
        let tables = self.tables.read().await;
        let policies: Vec<Policy> = tables
            .policies
            .values()
            .filter(|p| resources.contains(&p.resource))
            .cloned()
            .collect();
        debug!("found {} policies for {} resources", policies.len(), resources.len());
        Ok(policies)
    }

    async fn user_assignment(&self, user_id: Id, policy_ids: &[Id]) -> Result<Option<EntityPolicy>> {
        validate_id(user_id, "user id")?;
        validate_policy_ids(policy_ids)?;
        let tables = self.tables.read().await;

        let granted_to = |entity: Entity| {
            tables
                .entity_policies
                .iter()
                .find(|ep| ep.entity() == entity && policy_ids.contains(&ep.policy_id))
                .cloned()
        };

        if let Some(direct) = granted_to(Entity::user(user_id)) {
            return Ok(Some(direct));
        }

        Ok(tables
            .user_roles
            .iter()
            .filter(|ur| ur.user_id == user_id)
            .find_map(|ur| granted_to(Entity::role(ur.role_id))))
    }

    async fn get_role(&self, role_id: Id) -> Result<Option<Role>> {
        Ok(self.tables.read().await.roles.get(&role_id).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.user_id == user.user_id) {
            return Err(AuthzError::Conflict(format!("user {} already exists", user.user_id)));
        }
        let user = User {
            id: next_id(&mut tables.user_seq),
            user_id: user.user_id,
            username: user.username,
            admin: user.admin,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.user_id == user_id).cloned())
    }

    async fn insert_role(&self, role: NewRole) -> Result<Role> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let role = Role {
            id: next_id(&mut tables.role_seq),
            name: role.name,
            description: role.description,
            created_at: now,
            updated_at: now,
        };
        tables.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update_role(&self, role: &Role) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.roles.get_mut(&role.id) {
            Some(existing) => {
                *existing = role.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_role(&self, role_id: Id) -> Result<bool> {
        Ok(self.tables.write().await.roles.remove(&role_id).is_some())
    }

    async fn count_role_users(&self, role_id: Id) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables.user_roles.iter().filter(|ur| ur.role_id == role_id).count() as u64)
    }

    async fn insert_policy(&self, policy: NewPolicy) -> Result<Policy> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let policy = Policy {
            id: next_id(&mut tables.policy_seq),
            name: policy.name,
            description: policy.description,
            resource: policy.resource,
            action: policy.action,
            created_at: now,
            updated_at: now,
        };
        tables.policies.insert(policy.id, policy.clone());
        Ok(policy)
    }

    async fn get_policy(&self, policy_id: Id) -> Result<Option<Policy>> {
        Ok(self.tables.read().await.policies.get(&policy_id).cloned())
    }

    async fn update_policy(&self, policy: &Policy) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.policies.get_mut(&policy.id) {
            Some(existing) => {
                *existing = policy.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_policy(&self, policy_id: Id) -> Result<bool> {
        Ok(self.tables.write().await.policies.remove(&policy_id).is_some())
    }

    async fn count_policy_entities(&self, policy_id: Id) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables.entity_policies.iter().filter(|ep| ep.policy_id == policy_id).count() as u64)
    }

    async fn get_user_role(&self, user_id: Id, role_id: Id) -> Result<Option<UserRole>> {
        let tables = self.tables.read().await;
        Ok(tables
            .user_roles
            .iter()
            .find(|ur| ur.user_id == user_id && ur.role_id == role_id)
            .cloned())
    }

    async fn insert_user_role(&self, user_id: Id, role_id: Id) -> Result<UserRole> {
        let mut tables = self.tables.write().await;
        if tables.user_roles.iter().any(|ur| ur.user_id == user_id && ur.role_id == role_id) {
            return Err(AuthzError::Conflict(format!("role {} already assigned to user {}", role_id, user_id)));
        }
        let edge = UserRole {
            user_id,
            role_id,
            created_at: Utc::now(),
        };
        tables.user_roles.push(edge.clone());
        Ok(edge)
    }

    async fn delete_user_role(&self, user_id: Id, role_id: Id) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.user_roles.len();
        tables.user_roles.retain(|ur| !(ur.user_id == user_id && ur.role_id == role_id));
        Ok(tables.user_roles.len() < before)
    }

    async fn get_entity_policy(&self, entity: Entity, policy_id: Id) -> Result<Option<EntityPolicy>> {
        let tables = self.tables.read().await;
        Ok(tables
            .entity_policies
            .iter()
            .find(|ep| ep.entity() == entity && ep.policy_id == policy_id)
            .cloned())
    }

    async fn insert_entity_policy(&self, entity: Entity, policy_id: Id) -> Result<EntityPolicy> {
        let mut tables = self.tables.write().await;
        if tables.entity_policies.iter().any(|ep| ep.entity() == entity && ep.policy_id == policy_id) {
            return Err(AuthzError::Conflict(format!("policy {} already assigned to {}", policy_id, entity)));
        }
        let edge = EntityPolicy {
            entity_type: entity.entity_type,
            entity_id: entity.id,
            policy_id,
            created_at: Utc::now(),
        };
        tables.entity_policies.push(edge.clone());
        Ok(edge)
    }

    async fn delete_entity_policy(&self, entity: Entity, policy_id: Id) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.entity_policies.len();
        tables
            .entity_policies
            .retain(|ep| !(ep.entity() == entity && ep.policy_id == policy_id));
        Ok(tables.entity_policies.len() < before)
    }

    async fn count_entity_policies(&self, entity: Entity) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables.entity_policies.iter().filter(|ep| ep.entity() == entity).count() as u64)
    }

    async fn list_users(&self, search: Option<&str>, page: Page) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(page.slice(tables.users.values().filter(|u| search_matches(&u.username, search)).cloned()))
    }

    async fn count_users(&self, search: Option<&str>) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().filter(|u| search_matches(&u.username, search)).count() as u64)
    }

    async fn users_by_ids(&self, ids: &[Id]) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        let ids: BTreeSet<&Id> = ids.iter().collect();
        Ok(ids.into_iter().filter_map(|id| tables.users.get(id).cloned()).collect())
    }

    async fn list_roles(&self, search: Option<&str>, page: Page) -> Result<Vec<Role>> {
        let tables = self.tables.read().await;
        Ok(page.slice(tables.roles.values().filter(|r| search_matches(&r.name, search)).cloned()))
    }

    async fn count_roles(&self, search: Option<&str>) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables.roles.values().filter(|r| search_matches(&r.name, search)).count() as u64)
    }

    async fn roles_by_ids(&self, ids: &[Id]) -> Result<Vec<Role>> {
        let tables = self.tables.read().await;
        let ids: BTreeSet<&Id> = ids.iter().collect();
        Ok(ids.into_iter().filter_map(|id| tables.roles.get(id).cloned()).collect())
    }

    async fn list_policies(&self, search: Option<&str>, page: Page) -> Result<Vec<Policy>> {
        let tables = self.tables.read().await;
        Ok(page.slice(tables.policies.values().filter(|p| search_matches(&p.name, search)).cloned()))
    }

    async fn count_policies(&self, search: Option<&str>) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables.policies.values().filter(|p| search_matches(&p.name, search)).count() as u64)
    }

    async fn list_role_users(&self, role_id: Id, page: Page) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        let users = tables
            .user_roles
            .iter()
            .filter(|ur| ur.role_id == role_id)
            .filter_map(|ur| tables.users.get(&ur.user_id).cloned());
        Ok(page.slice(users))
    }

    async fn list_user_roles(&self, user_id: Id, page: Page) -> Result<Vec<Role>> {
        let tables = self.tables.read().await;
        let roles = tables
            .user_roles
            .iter()
            .filter(|ur| ur.user_id == user_id)
            .filter_map(|ur| tables.roles.get(&ur.role_id).cloned());
        Ok(page.slice(roles))
    }

    async fn count_user_roles(&self, user_id: Id) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables.user_roles.iter().filter(|ur| ur.user_id == user_id).count() as u64)
    }

    async fn list_entity_policies(&self, entity: Entity, page: Page) -> Result<Vec<Policy>> {
        let tables = self.tables.read().await;
        let policies = tables
            .entity_policies
            .iter()
            .filter(|ep| ep.entity() == entity)
            .filter_map(|ep| tables.policies.get(&ep.policy_id).cloned());
        Ok(page.slice(policies))
    }

    async fn list_policy_entities(&self, policy_id: Id, page: Page) -> Result<Vec<Entity>> {
        let tables = self.tables.read().await;
        let entities = tables
            .entity_policies
            .iter()
            .filter(|ep| ep.policy_id == policy_id)
            .map(EntityPolicy::entity);
        Ok(page.slice(entities))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, ResourceType};

    fn new_policy(name: &str, resource: Resource, action: Action) -> NewPolicy {
        NewPolicy {
            name: name.to_string(),
            description: None,
            resource,
            action,
        }
    }

    async fn user(store: &InMemoryRbacStore, user_id: &str) -> User {
        store
            .insert_user(NewUser {
                user_id: user_id.to_string(),
                username: user_id.to_string(),
                admin: false,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_policies_for_resources() {
        let store = InMemoryRbacStore::new();
        let root = store
            .insert_policy(new_policy("root", Resource::hdfs("hdfs://h"), Action::Read))
            .await
            .unwrap();
        store
            .insert_policy(new_policy("other", Resource::hdfs("hdfs://x"), Action::Read))
            .await
            .unwrap();
        let tag = store
            .insert_policy(new_policy("tag", Resource::new(ResourceType::Tag, "pii"), Action::Write))
            .await
            .unwrap();

        let found = store
            .policies_for_resources(&[Resource::new(ResourceType::Tag, "pii"), Resource::hdfs("hdfs://h")])
            .await
            .unwrap();
        let ids: Vec<Id> = found.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![root.id, tag.id]);
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected() {
        let store = InMemoryRbacStore::new();
        assert!(matches!(
            store.policies_for_resources(&[]).await,
            Err(AuthzError::InvalidInput(_))
        ));
        assert!(matches!(
            store.user_assignment(1, &[]).await,
            Err(AuthzError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_user_assignment_prefers_direct_grant() {
        let store = InMemoryRbacStore::new();
        let alice = user(&store, "alice").await;
        let role = store
            .insert_role(NewRole { name: "analysts".to_string(), description: None })
            .await
            .unwrap();
        let p1 = store
            .insert_policy(new_policy("p1", Resource::hdfs("hdfs://h/a"), Action::Read))
            .await
            .unwrap();
        let p2 = store
            .insert_policy(new_policy("p2", Resource::hdfs("hdfs://h"), Action::Read))
            .await
            .unwrap();

        store.insert_user_role(alice.id, role.id).await.unwrap();
        store.insert_entity_policy(role.entity(), p1.id).await.unwrap();

        let via_role = store.user_assignment(alice.id, &[p1.id, p2.id]).await.unwrap().unwrap();
        assert_eq!(via_role.entity(), role.entity());

        store.insert_entity_policy(alice.entity(), p2.id).await.unwrap();
        let direct = store.user_assignment(alice.id, &[p1.id, p2.id]).await.unwrap().unwrap();
        assert_eq!(direct.entity(), alice.entity());
        assert_eq!(direct.policy_id, p2.id);

        assert!(store.user_assignment(alice.id, &[999]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_edges_and_counts() {
        let store = InMemoryRbacStore::new();
        let bob = user(&store, "bob").await;
        let role = store
            .insert_role(NewRole { name: "ops".to_string(), description: None })
            .await
            .unwrap();

        store.insert_user_role(bob.id, role.id).await.unwrap();
        assert!(matches!(
            store.insert_user_role(bob.id, role.id).await,
            Err(AuthzError::Conflict(_))
        ));
        assert_eq!(store.count_role_users(role.id).await.unwrap(), 1);

        assert!(store.delete_user_role(bob.id, role.id).await.unwrap());
        assert!(!store.delete_user_role(bob.id, role.id).await.unwrap());
        assert_eq!(store.count_role_users(role.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_user_rejected() {
        let store = InMemoryRbacStore::new();
        user(&store, "carol").await;
        let dup = store
            .insert_user(NewUser {
                user_id: "carol".to_string(),
                username: "Carol".to_string(),
                admin: true,
            })
            .await;
        assert!(matches!(dup, Err(AuthzError::Conflict(_))));
        assert!(store.get_user("carol").await.unwrap().is_some());
        assert!(store.get_user("dave").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listings_page_and_search() {
        let store = InMemoryRbacStore::new();
        for name in ["ann", "bob", "annika", "carl"] {
            user(&store, name).await;
        }

        let all = store.list_users(None, Page::new(1, 2)).await.unwrap();
        let names: Vec<&str> = all.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "annika"]);
        assert_eq!(store.count_users(None).await.unwrap(), 4);

        let found = store.list_users(Some("ann"), Page::default()).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(store.count_users(Some("ann")).await.unwrap(), 2);
        assert_eq!(store.count_users(Some("ANN")).await.unwrap(), 0);

        let ids: Vec<Id> = store.users_by_ids(&[3, 99, 1]).await.unwrap().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_edge_listings_follow_assignment_order() {
        let store = InMemoryRbacStore::new();
        let alice = user(&store, "alice").await;
        let second = store
            .insert_role(NewRole { name: "second".to_string(), description: None })
            .await
            .unwrap();
        let first = store
            .insert_role(NewRole { name: "first".to_string(), description: None })
            .await
            .unwrap();
        let policy = store
            .insert_policy(new_policy("p", Resource::hdfs("hdfs://h"), Action::Read))
            .await
            .unwrap();

        store.insert_user_role(alice.id, first.id).await.unwrap();
        store.insert_user_role(alice.id, second.id).await.unwrap();
        store.insert_entity_policy(first.entity(), policy.id).await.unwrap();
        store.insert_entity_policy(alice.entity(), policy.id).await.unwrap();

        let roles = store.list_user_roles(alice.id, Page::default()).await.unwrap();
        assert_eq!(roles.iter().map(|r| r.id).collect::<Vec<_>>(), vec![first.id, second.id]);
        assert_eq!(store.count_user_roles(alice.id).await.unwrap(), 2);

        let holders = store.list_role_users(first.id, Page::default()).await.unwrap();
        assert_eq!(holders, vec![alice.clone()]);

        let entities = store.list_policy_entities(policy.id, Page::default()).await.unwrap();
        assert_eq!(entities, vec![first.entity(), alice.entity()]);
        let granted = store.list_entity_policies(alice.entity(), Page::default()).await.unwrap();
        assert_eq!(granted, vec![policy]);
    }
}
