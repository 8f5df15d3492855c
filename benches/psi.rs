use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use lepsi::psi::{self, ServerConfig, WorkerConfig};

fn bench_server_init(c: &mut Criterion) {
    let mut group = c.benchmark_group("server_init");
    group.sample_size(10);

    for size in [8usize, 32] {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let server: Vec<u64> = (0..size).map(|_| rng.gen()).collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let dir = tempfile::tempdir().unwrap();
                let ctx = psi::server_init_with_config(
                    &server,
                    dir.path().join("tree.db"),
                    ServerConfig {
                        seed: Some(7),
                        workers: WorkerConfig::detected(),
                    },
                )
                .unwrap();
                psi::teardown(ctx).unwrap();
            })
        });
    }
    group.finish();
}

fn bench_encrypt_and_detect(c: &mut Criterion) {
    let mut rng = ChaCha20Rng::seed_from_u64(2);
    let server: Vec<u64> = (0..16).map(|_| rng.gen()).collect();
    let client: Vec<u64> = server[..4].to_vec();

    let dir = tempfile::tempdir().unwrap();
    let ctx = psi::server_init_with_config(
        &server,
        dir.path().join("tree.db"),
        ServerConfig {
            seed: Some(7),
            workers: WorkerConfig::detected(),
        },
    )
    .unwrap();
    let view = ctx.public_view();

    let mut group = c.benchmark_group("protocol");
    group.sample_size(10);

    group.bench_function("client_encrypt_4", |b| {
        b.iter(|| psi::client_encrypt_seeded(&client, &view, 3))
    });

    let ciphertexts = psi::client_encrypt_seeded(&client, &view, 3);
    group.bench_function("detect_4x16", |b| {
        b.iter(|| psi::detect(&ctx, &ciphertexts).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_server_init, bench_encrypt_and_detect);
criterion_main!(benches);
