//! Policy-to-request action matching

use crate::types::{Policy, ResourceAccess};
use tracing::debug;

/// Decides whether a stored policy's action covers a requested action.
///
/// | policy \ requested | Read | Write | Operate |
/// |--------------------|------|-------|---------|
/// | Read               | pass | fail  | fail    |
/// | Write              | pass | pass  | fail    |
/// | Operate            | fail | fail  | pass    |
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyPredicate;

impl PolicyPredicate {
    pub fn new() -> Self {
        Self
    }

    /// Whether `policy` grants the access's action
    pub fn pass(&self, policy: &Policy, access: &ResourceAccess) -> bool {
        let pass = policy.action.covers(access.action);
        debug!(
            "policy {} ({}) for action {}: {}",
            policy.id,
            policy.action,
            access.action,
            if pass { "pass" } else { "fail" }
        );
        pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, Resource};
    use chrono::Utc;

    fn policy(action: Action) -> Policy {
        Policy {
            id: 1,
            name: "p".to_string(),
            description: None,
            resource: Resource::hdfs("hdfs://h/a"),
            action,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_predicate_table() {
        use Action::*;

        let expected = [
            (Read, Read, true),
            (Read, Write, false),
            (Read, Operate, false),
            (Write, Read, true),
            (Write, Write, true),
            (Write, Operate, false),
            (Operate, Read, false),
            (Operate, Write, false),
            (Operate, Operate, true),
        ];

        let predicate = PolicyPredicate::new();
        for (granted, requested, pass) in expected {
            let access = ResourceAccess::new(requested, Resource::hdfs("hdfs://h/a/b"));
            assert_eq!(
                predicate.pass(&policy(granted), &access),
                pass,
                "policy {} vs request {}",
                granted,
                requested
            );
        }
    }
}
