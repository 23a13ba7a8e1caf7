use std::sync::Arc;

use bytes::Bytes;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use pockity_blob::MemoryObjectStore;
use pockity_core::{TenantRef, UserId};
use pockity_gateway::{AdmissionMode, Gateway, GatewayBuilder};
use pockity_state_memory::{MemoryDistributedLock, MemoryStateStore};

fn build_gateway(admission: AdmissionMode) -> Gateway {
    GatewayBuilder::new()
        .state(Arc::new(MemoryStateStore::new()))
        .lock(Arc::new(MemoryDistributedLock::new()))
        .object_store(Arc::new(MemoryObjectStore::default()))
        .admission(admission)
        .build()
        .expect("gateway should build")
}

fn bench_upload_delete(c: &mut Criterion, name: &str, admission: AdmissionMode) {
    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    let gateway = build_gateway(admission);
    let tenant = TenantRef::User(UserId::from("bench"));
    let body = Bytes::from(vec![7u8; 4096]);

    c.bench_function(name, |b| {
        b.iter(|| {
            rt.block_on(async {
                let receipt = gateway
                    .storage()
                    .upload(&tenant, "bench.bin", black_box(body.clone()), None)
                    .await;
                let deleted = gateway.storage().delete(&tenant, "bench.bin").await;
                black_box((receipt, deleted))
            })
        });
    });
}

fn bench_best_effort(c: &mut Criterion) {
    bench_upload_delete(c, "upload_delete_best_effort", AdmissionMode::BestEffort);
}

fn bench_strict(c: &mut Criterion) {
    bench_upload_delete(c, "upload_delete_strict", AdmissionMode::Strict);
}

fn bench_usage_report(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    let gateway = build_gateway(AdmissionMode::BestEffort);
    let tenant = TenantRef::User(UserId::from("bench"));

    c.bench_function("usage_with_quota", |b| {
        b.iter(|| rt.block_on(async { black_box(gateway.storage().usage(&tenant).await) }));
    });
}

criterion_group!(benches, bench_best_effort, bench_strict, bench_usage_report);
criterion_main!(benches);
