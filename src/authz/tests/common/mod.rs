//! Helpers shared by the integration tests

use async_trait::async_trait;
use rbac_authz::{
    AuthzError, Entity, EntityPolicy, Id, NewPolicy, NewRole, NewUser, Page, Policy, RbacStore,
    Resource, Role, User, UserRole,
};

/// Store whose every operation fails
pub struct UnavailableStore;

fn unavailable<T>() -> rbac_authz::Result<T> {
    Err(AuthzError::DatabaseError("connection refused".to_string()))
}

#[async_trait]
impl RbacStore for UnavailableStore {
    async fn policies_for_resources(&self, _: &[Resource]) -> rbac_authz::Result<Vec<Policy>> {
        unavailable()
    }
    async fn user_assignment(&self, _: Id, _: &[Id]) -> rbac_authz::Result<Option<EntityPolicy>> {
        unavailable()
    }
    async fn get_role(&self, _: Id) -> rbac_authz::Result<Option<Role>> {
        unavailable()
    }
    async fn insert_user(&self, _: NewUser) -> rbac_authz::Result<User> {
        unavailable()
    }
    async fn get_user(&self, _: &str) -> rbac_authz::Result<Option<User>> {
        unavailable()
    }
    async fn insert_role(&self, _: NewRole) -> rbac_authz::Result<Role> {
        unavailable()
    }
    async fn update_role(&self, _: &Role) -> rbac_authz::Result<bool> {
        unavailable()
    }
    async fn delete_role(&self, _: Id) -> rbac_authz::Result<bool> {
        unavailable()
    }
    async fn count_role_users(&self, _: Id) -> rbac_authz::Result<u64> {
        unavailable()
    }
    async fn insert_policy(&self, _: NewPolicy) -> rbac_authz::Result<Policy> {
        unavailable()
    }
    async fn get_policy(&self, _: Id) -> rbac_authz::Result<Option<Policy>> {
        unavailable()
    }
    async fn update_policy(&self, _: &Policy) -> rbac_authz::Result<bool> {
        unavailable()
    }
    async fn delete_policy(&self, _: Id) -> rbac_authz::Result<bool> {
        unavailable()
    }
    async fn count_policy_entities(&self, _: Id) -> rbac_authz::Result<u64> {
        unavailable()
    }
    async fn get_user_role(&self, _: Id, _: Id) -> rbac_authz::Result<Option<UserRole>> {
        unavailable()
    }
    async fn insert_user_role(&self, _: Id, _: Id) -> rbac_authz::Result<UserRole> {
        unavailable()
    }
    async fn delete_user_role(&self, _: Id, _: Id) -> rbac_authz::Result<bool> {
        unavailable()
    }
    async fn get_entity_policy(&self, _: Entity, _: Id) -> rbac_authz::Result<Option<EntityPolicy>> {
        unavailable()
    }
    async fn insert_entity_policy(&self, _: Entity, _: Id) -> rbac_authz::Result<EntityPolicy> {
        unavailable()
    }
    async fn delete_entity_policy(&self, _: Entity, _: Id) -> rbac_authz::Result<bool> {
        unavailable()
    }
    async fn count_entity_policies(&self, _: Entity) -> rbac_authz::Result<u64> {
        unavailable()
    }
    async fn list_users(&self, _: Option<&str>, _: Page) -> rbac_authz::Result<Vec<User>> {
        unavailable()
    }
    async fn count_users(&self, _: Option<&str>) -> rbac_authz::Result<u64> {
        unavailable()
    }
    async fn users_by_ids(&self, _: &[Id]) -> rbac_authz::Result<Vec<User>> {
        unavailable()
    }
    async fn list_roles(&self, _: Option<&str>, _: Page) -> rbac_authz::Result<Vec<Role>> {
        unavailable()
    }
    async fn count_roles(&self, _: Option<&str>) -> rbac_authz::Result<u64> {
        unavailable()
    }
    async fn roles_by_ids(&self, _: &[Id]) -> rbac_authz::Result<Vec<Role>> {
        unavailable()
    }
    async fn list_policies(&self, _: Option<&str>, _: Page) -> rbac_authz::Result<Vec<Policy>> {
        unavailable()
    }
    async fn count_policies(&self, _: Option<&str>) -> rbac_authz::Result<u64> {
        unavailable()
    }
    async fn list_role_users(&self, _: Id, _: Page) -> rbac_authz::Result<Vec<User>> {
        unavailable()
    }
    async fn list_user_roles(&self, _: Id, _: Page) -> rbac_authz::Result<Vec<Role>> {
        unavailable()
    }
    async fn count_user_roles(&self, _: Id) -> rbac_authz::Result<u64> {
        unavailable()
    }
    async fn list_entity_policies(&self, _: Entity, _: Page) -> rbac_authz::Result<Vec<Policy>> {
        unavailable()
    }
    async fn list_policy_entities(&self, _: Id, _: Page) -> rbac_authz::Result<Vec<Entity>> {
        unavailable()
    }
}
