//! Authorization decision path benchmarks
//!
//! Measures decoration alone and full batch decisions against the in-memory
//! store with a growing number of stored policies.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rbac_authz::decorator::{HybridResourceDecorator, ResourceDecorator};
use rbac_authz::{
    Action, AuthRequest, AuthorizationService, InMemoryRbacStore, NewPolicy, NewRole, NewUser,
    RbacContext, RbacStore, Resource, ResourceAccess,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

async fn setup(policy_count: usize) -> (AuthorizationService, RbacContext) {
    let store = Arc::new(InMemoryRbacStore::new());
    let user = store
        .insert_user(NewUser {
            user_id: "bench".to_string(),
            username: "Bench".to_string(),
            admin: false,
        })
        .await
        .unwrap();
    let role = store
        .insert_role(NewRole {
            name: "readers".to_string(),
            description: None,
        })
        .await
        .unwrap();
    store.insert_user_role(user.id, role.id).await.unwrap();

    for i in 0..policy_count {
        let policy = store
            .insert_policy(NewPolicy {
                name: format!("policy-{}", i),
                description: None,
                resource: Resource::hdfs(format!("hdfs://nn/data/d{}", i)),
                action: if i % 2 == 0 { Action::Read } else { Action::Write },
            })
            .await
            .unwrap();
        if i % 3 == 0 {
            store.insert_entity_policy(role.entity(), policy.id).await.unwrap();
        }
    }

    (AuthorizationService::new(store), RbacContext::for_user(user))
}

fn bench_decoration(c: &mut Criterion) {
    let decorator = HybridResourceDecorator::new();
    let resource = Resource::hdfs("hdfs://nn:8020/warehouse/sales/year=2024/month=01/part-0000.parquet");

    c.bench_function("decorate_hdfs", |b| {
        b.iter(|| decorator.decorate(black_box(&resource)).unwrap())
    });
}

fn bench_authorize(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("authorize");

    for policy_count in [10, 100, 1000].iter() {
        let (service, ctx) = rt.block_on(setup(*policy_count));

        group.bench_with_input(BenchmarkId::new("policies", policy_count), policy_count, |b, &count| {
            let request = AuthRequest::new(
                (0..8)
                    .map(|i| {
                        let dir = (i * 7) % count;
                        ResourceAccess::new(
                            Action::Read,
                            Resource::hdfs(format!("hdfs://nn/data/d{}/file-{}.csv", dir, i)),
                        )
                    })
                    .collect(),
            );
            let (service, ctx, request) = (&service, &ctx, &request);
            b.to_async(&rt)
                .iter(|| async move { service.authorize(ctx, black_box(request.clone())).await.unwrap() });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decoration, bench_authorize);
criterion_main!(benches);
