//! Property tests for decoration, the predicate table and batch ordering

use chrono::Utc;
use proptest::prelude::*;
use rbac_authz::decorator::{HdfsResourceDecorator, ResourceDecorator};
use rbac_authz::predicate::PolicyPredicate;
use rbac_authz::{
    Action, AuthRequest, AuthorizationService, InMemoryRbacStore, NewPolicy, NewUser, Policy,
    RbacContext, RbacStore, Resource, ResourceAccess,
};
use std::sync::Arc;

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9_.-]{1,8}"
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![Just(Action::Read), Just(Action::Write), Just(Action::Operate)]
}

fn hdfs_path() -> impl Strategy<Value = (String, usize)> {
    (
        prop_oneof![Just("hdfs://"), Just("viewfs://"), Just("/")],
        prop::collection::vec(segment(), 1..8),
        any::<bool>(),
    )
        .prop_map(|(root, segments, trailing_slash)| {
            let mut path = format!("{}{}", root, segments.join("/"));
            if trailing_slash {
                path.push('/');
            }
            (path, segments.len())
        })
}

fn decorate(path: &str) -> Vec<String> {
    HdfsResourceDecorator::new()
        .decorate(&Resource::hdfs(path))
        .unwrap()
        .into_iter()
        .map(|r| r.value)
        .collect()
}

proptest! {
    #[test]
    fn prop_hdfs_yields_n_minus_one_strict_prefixes((path, n) in hdfs_path()) {
        let ancestors = decorate(&path);
        prop_assert_eq!(ancestors.len(), n - 1);

        let mut previous: Option<&String> = None;
        for ancestor in &ancestors {
            prop_assert!(path.starts_with(ancestor.as_str()));
            prop_assert!(ancestor.len() < path.trim_end_matches('/').len());
            if let Some(previous) = previous {
                prop_assert!(ancestor.starts_with(previous.as_str()));
                prop_assert!(ancestor.len() > previous.len());
            }
            previous = Some(ancestor);
        }
    }

    #[test]
    fn prop_hdfs_decoration_is_idempotent((path, _) in hdfs_path()) {
        prop_assert_eq!(decorate(&path), decorate(&path));
    }

    #[test]
    fn prop_predicate_matches_coverage_table(granted in action(), requested in action()) {
        let expected = match (granted, requested) {
            (Action::Read, Action::Read) => true,
            (Action::Write, Action::Read | Action::Write) => true,
            (Action::Operate, Action::Operate) => true,
            _ => false,
        };
        let now = Utc::now();
        let policy = Policy {
            id: 1,
            name: "p".to_string(),
            description: None,
            resource: Resource::hdfs("hdfs://h/a"),
            action: granted,
            created_at: now,
            updated_at: now,
        };
        let access = ResourceAccess::new(requested, Resource::hdfs("hdfs://h/a"));

        prop_assert_eq!(PolicyPredicate::new().pass(&policy, &access), expected);
        if granted == requested {
            prop_assert!(PolicyPredicate::new().pass(&policy, &access));
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_service_returns_one_decision_per_access_in_order(
        accesses in prop::collection::vec((segment(), any::<bool>()), 1..12)
    ) {
        let decisions = tokio_test::block_on(async {
            let store = Arc::new(InMemoryRbacStore::new());
            let user = store
                .insert_user(NewUser { user_id: "u".to_string(), username: "u".to_string(), admin: false })
                .await
                .unwrap();
            let policy = store
                .insert_policy(NewPolicy {
                    name: "granted".to_string(),
                    description: None,
                    resource: Resource::hdfs("hdfs://h/granted"),
                    action: Action::Read,
                })
                .await
                .unwrap();
            store.insert_entity_policy(user.entity(), policy.id).await.unwrap();

            let request = AuthRequest::new(
                accesses
                    .iter()
                    .map(|(leaf, granted)| {
                        let dir = if *granted { "granted" } else { "other" };
                        ResourceAccess::new(Action::Read, Resource::hdfs(format!("hdfs://h/{}/{}", dir, leaf)))
                    })
                    .collect(),
            );
            AuthorizationService::new(store)
                .authorize(&RbacContext::for_user(user), request)
                .await
                .unwrap()
                .results
        });

        prop_assert_eq!(decisions.len(), accesses.len());
        for (decision, (leaf, granted)) in decisions.iter().zip(&accesses) {
            prop_assert!(decision.resource_access.resource.value.ends_with(leaf.as_str()));
            prop_assert_eq!(decision.allow, *granted);
        }
    }
}
