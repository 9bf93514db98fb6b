//! # RBAC Authorization Engine
//!
//! Role-based authorization decisions over users, roles and policies.
//!
//! ## Features
//!
//! - **Batch decisions** with one allow/deny result per resource access, in order
//! - **Hierarchical resources**: HDFS paths are authorized against their ancestors
//! - **Evidence** for every allow (the user or role holding the policy, and the policy)
//! - **Async-first design** using Tokio runtime
//! - **Pluggable stores**: in-memory, or PostgreSQL with the `postgres` feature
//! - **Call-site guards** combining decisions with ALL / ANY semantics, in process
//!   or against a remote server through [`RbacClient`]
//!
//! ## Example
//!
//! ```rust
//! use rbac_authz::{
//!     Action, AuthRequest, AuthorizationService, InMemoryRbacStore, NewPolicy, NewUser,
//!     RbacContext, RbacStore, Resource, ResourceAccess,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryRbacStore::new());
//!     let alice = store
//!         .insert_user(NewUser { user_id: "alice".into(), username: "Alice".into(), admin: false })
//!         .await?;
//!     let policy = store
//!         .insert_policy(NewPolicy {
//!             name: "write reports".into(),
//!             description: None,
//!             resource: Resource::hdfs("hdfs://nn/reports"),
//!             action: Action::Write,
//!         })
//!         .await?;
//!     store.insert_entity_policy(alice.entity(), policy.id).await?;
//!
//!     let service = AuthorizationService::new(store);
//!     let request = AuthRequest::new(vec![ResourceAccess::new(
//!         Action::Read,
//!         Resource::hdfs("hdfs://nn/reports/2024/q1.csv"),
//!     )]);
//!
//!     let response = service.authorize(&RbacContext::for_user(alice), request).await?;
//!     assert!(response.results[0].allow);
//!
//!     Ok(())
//! }
//! ```

pub mod types;
pub mod error;
pub mod context;
pub mod decorator;
pub mod predicate;
pub mod store;
pub mod authorizer;
pub mod service;
pub mod guard;
pub mod admin;
pub mod read;
pub mod client;
pub mod config;
pub mod web;

// Re-export commonly used types
pub use types::{
    Action, AuthRequest, AuthResponse, Entity, EntityPolicy, EntityType, Id, ListPayload,
    NewPolicy, NewRole, NewUser, Page, Policy, Resource, ResourceAccess, ResourceAccessAuth,
    ResourceType, Role, Subject, User, UserRole,
};
pub use error::{AuthzError, Result};
pub use context::RbacContext;
pub use decorator::{HybridResourceDecorator, ResourceDecorator};
pub use store::{InMemoryRbacStore, RbacStore};
#[cfg(feature = "postgres")]
pub use store::PostgresRbacStore;
pub use authorizer::Authorizer;
pub use service::AuthorizationService;
pub use guard::{DecisionMode, RbacAuthorizer, RbacGuard};
pub use admin::AdminService;
pub use read::EntityReadService;
pub use client::RbacClient;
pub use config::ServerConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
