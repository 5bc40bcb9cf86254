//! Rate limiter benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use turnstile_gateway::config::RateLimitConfig;
use turnstile_gateway::rate_limit::{RateLimiter, RateSubject};
use turnstile_gateway::routing::RouteClass;

fn benchmark_single_client(c: &mut Criterion) {
    let limiter = RateLimiter::from_config(&RateLimitConfig::default());
    let tiers = vec!["protected".to_string()];
    let subject = RateSubject {
        client: "203.0.113.7",
        route: "profile",
        class: RouteClass::Protected,
    };

    c.bench_function("admit_single_client", |b| {
        b.iter(|| black_box(limiter.admit_request(&tiers, &subject, 1.0)))
    });
}

fn benchmark_many_clients(c: &mut Criterion) {
    let mut group = c.benchmark_group("admit_many_clients");

    for clients in [100usize, 10_000] {
        let limiter = RateLimiter::from_config(&RateLimitConfig::default());
        let tiers = vec!["auth".to_string(), "protected".to_string()];
        let addresses: Vec<String> = (0..clients).map(|i| format!("10.0.{}.{}", i / 256, i % 256)).collect();

        group.bench_with_input(BenchmarkId::from_parameter(clients), &addresses, |b, addresses| {
            let mut next = 0;
            b.iter(|| {
                let subject = RateSubject {
                    client: &addresses[next % addresses.len()],
                    route: "login",
                    class: RouteClass::Public,
                };
                next += 1;
                black_box(limiter.admit_request(&tiers, &subject, 1.0))
            })
        });
    }

    group.finish();
}

fn benchmark_contended(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let limiter = Arc::new(RateLimiter::from_config(&RateLimitConfig::default()));

    c.bench_function("admit_contended_8_tasks", |b| {
        b.to_async(&rt).iter(|| {
            let limiter = limiter.clone();
            async move {
                let handles: Vec<_> = (0..8)
                    .map(|i| {
                        let limiter = limiter.clone();
                        tokio::spawn(async move {
                            let client = format!("192.0.2.{}", i);
                            let subject = RateSubject {
                                client: &client,
                                route: "me",
                                class: RouteClass::Protected,
                            };
                            limiter
                                .admit_request(&["protected".to_string()], &subject, 1.0)
                                .is_ok()
                        })
                    })
                    .collect();
                for handle in handles {
                    black_box(handle.await.unwrap());
                }
            }
        })
    });
}

criterion_group!(benches, benchmark_single_client, benchmark_many_clients, benchmark_contended);
criterion_main!(benches);
