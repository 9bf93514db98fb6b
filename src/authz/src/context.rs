//! Per-request authorization context
//!
//! Built once per inbound request and handed explicitly to every component
//! that needs the caller's identity.

use crate::error::{AuthzError, Result};
use crate::types::User;
use uuid::Uuid;

/// Request-scoped context carrying the authenticated subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RbacContext {
    request_id: String,
    user_id: Option<String>,
    user: Option<User>,
}

impl RbacContext {
    /// Create a context for a request; a blank request id is replaced by a fresh UUID
    pub fn new(request_id: impl Into<String>, user_id: Option<String>) -> Self {
        let request_id = request_id.into();
        let request_id = if request_id.trim().is_empty() {
            Uuid::new_v4().to_string()
        } else {
            request_id
        };

        Self {
            request_id,
            user_id,
            user: None,
        }
    }

    /// Context for an already resolved user
    pub fn for_user(user: User) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            user_id: Some(user.user_id.clone()),
            user: Some(user),
        }
    }

    /// Context without any subject
    pub fn anonymous() -> Self {
        Self::new(Uuid::new_v4().to_string(), None)
    }

    /// Attach the resolved user
    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// External user id as presented by the caller, resolved or not
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// The authenticated user, or `NotAuthenticated`
    pub fn user(&self) -> Result<&User> {
        self.user.as_ref().ok_or_else(|| {
            AuthzError::NotAuthenticated(match &self.user_id {
                Some(user_id) => format!("unknown user {}", user_id),
                None => "no user in context".to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn alice() -> User {
        User {
            id: 7,
            user_id: "alice".to_string(),
            username: "Alice".to_string(),
            admin: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_blank_request_id_is_generated() {
        let ctx = RbacContext::new("  ", None);
        assert!(Uuid::parse_str(ctx.request_id()).is_ok());

        let ctx = RbacContext::new("req-1", None);
        assert_eq!(ctx.request_id(), "req-1");
    }

    #[test]
    fn test_user_required() {
        let ctx = RbacContext::anonymous();
        assert!(matches!(ctx.user(), Err(AuthzError::NotAuthenticated(_))));

        let ctx = RbacContext::new("req-2", Some("bob".to_string()));
        let err = ctx.user().unwrap_err();
        assert!(err.to_string().contains("bob"));

        let ctx = RbacContext::for_user(alice());
        assert_eq!(ctx.user().unwrap().id, 7);
        assert_eq!(ctx.user_id(), Some("alice"));
    }
}
