//! Core RBAC types: resources, actions, entities, policies and decisions

use crate::error::{AuthzError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric identifier of users, roles and policies
pub type Id = i64;

/// Action requested on a resource
///
/// Variants are ordered by increasing exclusivity. Coverage between
/// actions is not implied by this order, see [`Action::covers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    Read,
    Write,
    Operate,
}

impl Action {
    /// All actions, in declaration order
    pub const ALL: [Action; 3] = [Action::Read, Action::Write, Action::Operate];

    /// Whether a grant of `self` covers a request for `requested`.
    ///
    /// Write implies Read. Operate is a tier of its own: it implies
    /// nothing else and nothing implies it.
    pub fn covers(self, requested: Action) -> bool {
        match (self, requested) {
            (granted, requested) if granted == requested => true,
            (Action::Write, Action::Read) => true,
            _ => false,
        }
    }

    /// Storage code
    pub fn code(self) -> i16 {
        match self {
            Action::Read => 1,
            Action::Write => 2,
            Action::Operate => 3,
        }
    }

    /// Parse a storage code
    pub fn from_code(code: i16) -> Result<Self> {
        match code {
            1 => Ok(Action::Read),
            2 => Ok(Action::Write),
            3 => Ok(Action::Operate),
            other => Err(AuthzError::Internal(format!("unknown action code {}", other))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Read => "Read",
            Action::Write => "Write",
            Action::Operate => "Operate",
        };
        f.write_str(name)
    }
}

/// Kind of protected resource; selects the decoration strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResourceType {
    /// Hierarchical file system path (`[scheme://]a/b/c`)
    Hdfs,
    /// Table column; hierarchy comes from an external tag service
    Column,
    /// Flat tag
    Tag,
    /// Flat named operation
    Operation,
}

impl ResourceType {
    /// Storage code
    pub fn code(self) -> i16 {
        match self {
            ResourceType::Hdfs => 1,
            ResourceType::Column => 2,
            ResourceType::Tag => 3,
            ResourceType::Operation => 4,
        }
    }

    /// Parse a storage code
    pub fn from_code(code: i16) -> Result<Self> {
        match code {
            1 => Ok(ResourceType::Hdfs),
            2 => Ok(ResourceType::Column),
            3 => Ok(ResourceType::Tag),
            4 => Ok(ResourceType::Operation),
            other => Err(AuthzError::Internal(format!("unknown resource type code {}", other))),
        }
    }
}

/// Addressable protected object, identified by `(type, value)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type
    #[serde(rename = "type")]
    pub resource_type: ResourceType,

    /// Resource value (path, column name, tag, operation name)
    pub value: String,
}

impl Resource {
    /// Create a new resource
    pub fn new(resource_type: ResourceType, value: impl Into<String>) -> Self {
        Self {
            resource_type,
            value: value.into(),
        }
    }

    /// Shorthand for an HDFS path resource
    pub fn hdfs(path: impl Into<String>) -> Self {
        Self::new(ResourceType::Hdfs, path)
    }

    /// Validate the resource: the value must not be blank
    pub fn validate(&self) -> Result<()> {
        if self.value.trim().is_empty() {
            return Err(AuthzError::InvalidInput(format!(
                "{:?} resource value cannot be blank",
                self.resource_type
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.resource_type, self.value)
    }
}

/// Discriminant of an [`Entity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    User,
    Role,
}

impl EntityType {
    /// Storage code
    pub fn code(self) -> i16 {
        match self {
            EntityType::User => 1,
            EntityType::Role => 2,
        }
    }

    /// Parse a storage code
    pub fn from_code(code: i16) -> Result<Self> {
        match code {
            1 => Ok(EntityType::User),
            2 => Ok(EntityType::Role),
            other => Err(AuthzError::Internal(format!("unknown entity type code {}", other))),
        }
    }
}

/// Identity of a policy holder. Users and roles never collide because the
/// entity type is part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub id: Id,
}

impl Entity {
    pub fn user(id: Id) -> Self {
        Self { entity_type: EntityType::User, id }
    }

    pub fn role(id: Id) -> Self {
        Self { entity_type: EntityType::Role, id }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.entity_type, self.id)
    }
}

/// Authenticated subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id,

    /// External identity (what the transport layer carries)
    pub user_id: String,

    pub username: String,

    #[serde(default)]
    pub admin: bool,

    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn entity(&self) -> Entity {
        Entity::user(self.id)
    }
}

/// Named group of users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn entity(&self) -> Entity {
        Entity::role(self.id)
    }
}

/// Grant of one action on one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub resource: Resource,
    pub action: Action,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when registering a user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub admin: bool,
}

impl NewUser {
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(AuthzError::InvalidInput("user id cannot be blank".to_string()));
        }
        if self.username.trim().is_empty() {
            return Err(AuthzError::InvalidInput("username cannot be blank".to_string()));
        }
        Ok(())
    }
}

/// Fields supplied when creating a role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewRole {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AuthzError::InvalidInput("role name cannot be blank".to_string()));
        }
        Ok(())
    }
}

/// Fields supplied when creating a policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPolicy {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub resource: Resource,
    pub action: Action,
}

impl NewPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AuthzError::InvalidInput("policy name cannot be blank".to_string()));
        }
        self.resource.validate()
    }
}

/// Edge granting a policy to a user or role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPolicy {
    pub entity_type: EntityType,
    pub entity_id: Id,
    pub policy_id: Id,
    pub created_at: DateTime<Utc>,
}

impl EntityPolicy {
    pub fn entity(&self) -> Entity {
        Entity {
            entity_type: self.entity_type,
            id: self.entity_id,
        }
    }
}

/// Edge granting a role to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRole {
    pub user_id: Id,
    pub role_id: Id,
    pub created_at: DateTime<Utc>,
}

/// One unit of an authorization request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAccess {
    pub action: Action,

    pub resource: Resource,

    /// Ancestors of `resource`, filled in by decoration before authorizing
    #[serde(default)]
    pub decorated_resources: Vec<Resource>,
}

impl ResourceAccess {
    pub fn new(action: Action, resource: Resource) -> Self {
        Self {
            action,
            resource,
            decorated_resources: Vec::new(),
        }
    }

    /// Validate the resource and every decorated resource
    pub fn validate(&self) -> Result<()> {
        self.resource.validate()?;
        for decorated in &self.decorated_resources {
            decorated.validate()?;
        }
        Ok(())
    }

    /// `{resource} ∪ decorated_resources`, resource first, duplicates dropped
    pub fn resource_set(&self) -> Vec<Resource> {
        let mut resources = Vec::with_capacity(1 + self.decorated_resources.len());
        resources.push(self.resource.clone());
        for decorated in &self.decorated_resources {
            if !resources.contains(decorated) {
                resources.push(decorated.clone());
            }
        }
        resources
    }
}

/// Holder through which an access was allowed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Subject {
    User(User),
    Role(Role),
}

impl Subject {
    pub fn entity(&self) -> Entity {
        match self {
            Subject::User(user) => user.entity(),
            Subject::Role(role) => role.entity(),
        }
    }
}

/// Decision for one [`ResourceAccess`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAccessAuth {
    pub allow: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_as_entity: Option<Subject>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_by_policy: Option<Policy>,

    pub resource_access: ResourceAccess,
}

impl ResourceAccessAuth {
    /// Allow decision with evidence
    pub fn allow(resource_access: ResourceAccess, entity: Subject, policy: Policy) -> Self {
        Self {
            allow: true,
            allowed_as_entity: Some(entity),
            allowed_by_policy: Some(policy),
            resource_access,
        }
    }

    /// Deny decision; carries no evidence
    pub fn deny(resource_access: ResourceAccess) -> Self {
        Self {
            allow: false,
            allowed_as_entity: None,
            allowed_by_policy: None,
            resource_access,
        }
    }
}

/// Batch authorization request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub resource_accesses: Vec<ResourceAccess>,
}

impl AuthRequest {
    pub fn new(resource_accesses: Vec<ResourceAccess>) -> Self {
        Self { resource_accesses }
    }
}

/// Batch authorization response, one result per access in input order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthResponse {
    pub results: Vec<ResourceAccessAuth>,
}

/// Largest page a listing may request
pub const MAX_PAGE_LIMIT: u64 = 1000;

/// Window over a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "Page::default_limit")]
    pub limit: u64,
}

impl Page {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    fn default_limit() -> u64 {
        20
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 || self.limit > MAX_PAGE_LIMIT {
            return Err(AuthzError::InvalidInput(format!(
                "listing limit must be between 1 and {}, got {}",
                MAX_PAGE_LIMIT, self.limit
            )));
        }
        Ok(())
    }

    /// Apply the window to an iterator
    pub fn slice<T>(&self, items: impl Iterator<Item = T>) -> Vec<T> {
        items
            .skip(self.offset.min(usize::MAX as u64) as usize)
            .take(self.limit as usize)
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, Self::default_limit())
    }
}

/// One page of a listing with the total number of matching records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPayload<T> {
    pub offset: u64,
    pub total: u64,
    pub list: Vec<T>,
}

impl<T> ListPayload<T> {
    pub fn new(page: Page, total: u64, list: Vec<T>) -> Self {
        Self {
            offset: page.offset,
            total,
            list,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_coverage_table() {
        use Action::*;

        assert!(Read.covers(Read));
        assert!(!Read.covers(Write));
        assert!(!Read.covers(Operate));

        assert!(Write.covers(Read));
        assert!(Write.covers(Write));
        assert!(!Write.covers(Operate));

        assert!(!Operate.covers(Read));
        assert!(!Operate.covers(Write));
        assert!(Operate.covers(Operate));
    }

    #[test]
    fn test_action_ordering() {
        assert!(Action::Read < Action::Write);
        assert!(Action::Write < Action::Operate);
    }

    #[test]
    fn test_codes_round_trip() {
        for action in Action::ALL {
            assert_eq!(Action::from_code(action.code()).unwrap(), action);
        }
        assert!(ResourceType::from_code(9).is_err());
        assert!(EntityType::from_code(0).is_err());
    }

    #[test]
    fn test_blank_resource_rejected() {
        let resource = Resource::new(ResourceType::Tag, "   ");
        assert!(matches!(resource.validate(), Err(AuthzError::InvalidInput(_))));
        assert!(Resource::new(ResourceType::Tag, "pii").validate().is_ok());
    }

    #[test]
    fn test_resource_access_validates_decorations() {
        let mut access = ResourceAccess::new(Action::Read, Resource::hdfs("hdfs://h/a/b"));
        assert!(access.validate().is_ok());

        access.decorated_resources.push(Resource::hdfs(""));
        assert!(access.validate().is_err());
    }

    #[test]
    fn test_resource_set_keeps_order_and_drops_duplicates() {
        let mut access = ResourceAccess::new(Action::Read, Resource::hdfs("hdfs://h/a/b"));
        access.decorated_resources = vec![
            Resource::hdfs("hdfs://h"),
            Resource::hdfs("hdfs://h/a"),
            Resource::hdfs("hdfs://h"),
        ];

        let set = access.resource_set();
        assert_eq!(
            set,
            vec![
                Resource::hdfs("hdfs://h/a/b"),
                Resource::hdfs("hdfs://h"),
                Resource::hdfs("hdfs://h/a"),
            ]
        );
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::json!({
            "action": "Write",
            "resource": { "type": "HDFS", "value": "hdfs://h:1/a" }
        });
        let access: ResourceAccess = serde_json::from_value(json).unwrap();
        assert_eq!(access.action, Action::Write);
        assert_eq!(access.resource.resource_type, ResourceType::Hdfs);
        assert!(access.decorated_resources.is_empty());

        let denied = serde_json::to_value(ResourceAccessAuth::deny(access)).unwrap();
        assert_eq!(denied["allow"], false);
        assert!(denied.get("allowedByPolicy").is_none());
        assert!(denied["resourceAccess"].get("decoratedResources").is_some());
    }

    #[test]
    fn test_page_defaults_and_limits() {
        let page: Page = serde_json::from_value(serde_json::json!({ "offset": 5 })).unwrap();
        assert_eq!(page, Page::new(5, 20));
        assert!(page.validate().is_ok());

        assert!(Page::new(0, 0).validate().is_err());
        assert!(Page::new(0, MAX_PAGE_LIMIT + 1).validate().is_err());
        assert_eq!(Page::new(1, 2).slice(1..=5), vec![2, 3]);
        assert!(Page::new(9, 2).slice(1..=5).is_empty());
    }
}
