use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use calcvault::codec::CipherCodec;
use calcvault::keys::{FileKeyStore, KeyCustodian};

fn benchmark_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    let rt = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let store = Box::new(FileKeyStore::new(dir.path().join("keys")));
    let codec = CipherCodec::new(Arc::new(KeyCustodian::new(store, "bench")));

    let sizes = [("1KB", 1024), ("64KB", 64 * 1024), ("1MB", 1024 * 1024)];

    for (name, size) in sizes {
        let payload = vec![0x5au8; size];
        let container = dir.path().join(format!("enc-{}", name));

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            criterion::BenchmarkId::new("encrypt", name),
            &size,
            |b, &_size| {
                b.iter(|| {
                    rt.block_on(codec.encrypt_bytes(black_box(&payload), black_box(&container)))
                        .unwrap();
                });
            },
        );

        rt.block_on(codec.encrypt_bytes(&payload, &container)).unwrap();
        group.bench_with_input(
            criterion::BenchmarkId::new("decrypt", name),
            &size,
            |b, &_size| {
                b.iter(|| {
                    let scratch = rt
                        .block_on(codec.decrypt_to_scratch(
                            black_box(&container),
                            dir.path(),
                            "bench",
                        ))
                        .unwrap();
                    drop(scratch);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, benchmark_codec);
criterion_main!(benches);
