//! Server state construction and intersection detection.
//!
//! `server_init` runs the whole commitment pipeline: parameter setup, leaf
//! key generation, serial tree insertion, sealing the in-RAM image, and
//! witness generation. The resulting context is immutable; detection only
//! reads it. Either a fully valid context comes back or none does.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{PsiError, Result};
use crate::le::{self, dec, Ciphertext, LeKeyPair};
use crate::math::{GaussianSampler, Poly};
use crate::matrix::Vector;
use crate::params::{collision_probability, LeParams};
use crate::tree::{TreeNode, TreeStore};

use super::client::PublicView;
use super::monitor::PerformanceMonitor;
use super::workers::{workers, WorkerConfig};
use super::{correctness_check, reduce_to_tree_index, CancelToken};

/// Salt separating the message polynomial's seed lane from key generation.
const MESSAGE_SEED_SALT: u64 = 0x6d73_675f_7365_6564;

/// Server-side configuration.
#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    /// Master seed for key generation and the message polynomial. `None`
    /// draws from OS entropy; fixing it makes `server_init` fully
    /// deterministic for a given input set.
    pub seed: Option<u64>,
    /// Resource model for worker sizing.
    pub workers: WorkerConfig,
}

/// Immutable server state: one keypair, tree index and witness-chain pair
/// per committed fingerprint, plus the sealed tree and its digest.
#[derive(Debug)]
pub struct ServerContext {
    params: LeParams,
    digest: Vector,
    message: Poly,
    secret_keys: Vec<Vector>,
    witnesses1: Vec<Vec<Vector>>,
    witnesses2: Vec<Vec<Vector>>,
    tree_indices: Vec<u64>,
    fingerprints: Vec<u64>,
    store: Option<TreeStore>,
    worker_config: WorkerConfig,
}

/// Approximate resident-memory breakdown of a context.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryUsage {
    pub witness_mb: f64,
    pub key_mb: f64,
    pub tree_nodes: usize,
}

impl ServerContext {
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    pub fn params(&self) -> &LeParams {
        &self.params
    }

    pub fn fingerprints(&self) -> &[u64] {
        &self.fingerprints
    }

    pub fn tree_indices(&self) -> &[u64] {
        &self.tree_indices
    }

    pub fn store_path(&self) -> Option<&Path> {
        self.store.as_ref().map(|s| s.path())
    }

    /// Cheap copy of everything the client needs.
    pub fn public_view(&self) -> PublicView {
        PublicView {
            params: self.params.clone(),
            digest: self.digest.clone(),
            message: self.message.clone(),
        }
    }

    pub fn digest(&self) -> &Vector {
        &self.digest
    }

    pub fn message(&self) -> &Poly {
        &self.message
    }

    /// Estimated memory footprint; the witness chains dominate.
    pub fn memory_usage(&self) -> MemoryUsage {
        let poly_bytes = self.params.d * 8;
        let witness_bytes =
            self.len() * self.params.layers * 2 * self.params.m * poly_bytes;
        let key_bytes = self.len() * (self.params.m2 + 2 * self.params.n) * poly_bytes;
        MemoryUsage {
            witness_mb: witness_bytes as f64 / (1024.0 * 1024.0),
            key_mb: key_bytes as f64 / (1024.0 * 1024.0),
            tree_nodes: self.store.as_ref().map_or(0, |s| s.node_count()),
        }
    }
}

impl Drop for ServerContext {
    fn drop(&mut self) {
        if let Some(store) = self.store.as_mut() {
            let _ = store.flush();
        }
    }
}

/// Builds the server context with default configuration.
pub fn server_init(fingerprints: &[u64], store_path: impl AsRef<Path>) -> Result<ServerContext> {
    server_init_with_config(fingerprints, store_path, ServerConfig::default())
}

/// Builds the server context: setup, parallel key generation, serial tree
/// insertion, seal, parallel witness generation.
pub fn server_init_with_config(
    fingerprints: &[u64],
    store_path: impl AsRef<Path>,
    config: ServerConfig,
) -> Result<ServerContext> {
    if fingerprints.is_empty() {
        return Err(PsiError::EmptyInput("server fingerprint set"));
    }

    let size = fingerprints.len();
    let params = LeParams::setup(size)?;
    info!(
        size,
        layers = params.layers,
        slots = params.num_slots(),
        load_factor = size as f64 / params.num_slots() as f64,
        collision_probability = collision_probability(size, params.num_slots()),
        "server initialization"
    );

    let store_path: PathBuf = store_path.as_ref().to_path_buf();
    let mut store = TreeStore::create(&store_path, &params)?;

    let master = config.seed.unwrap_or_else(rand::random);
    let mut monitor = PerformanceMonitor::new(workers(size, &config.workers));

    // One independently seeded sampler pair per element; scheduling order
    // cannot change the keys.
    let keygen_start = Instant::now();
    let keyed: Vec<(u64, LeKeyPair)> = fingerprints
        .par_iter()
        .enumerate()
        .map(|(i, &fp)| {
            let lane = master.wrapping_add((i as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15));
            let mut rng = ChaCha20Rng::seed_from_u64(lane);
            let mut sampler = GaussianSampler::with_seed(params.sigma, params.bound, lane ^ 1);
            let index = reduce_to_tree_index(fp, params.layers);
            (index, le::keygen(&params, &mut rng, &mut sampler))
        })
        .collect();
    monitor.track_key_generation(keygen_start);

    // Tree insertion is single-writer: each Upd rewrites the path to the
    // root, so interleaving would recompute stale ancestors.
    let hashing_start = Instant::now();
    for (index, kp) in &keyed {
        le::upd(&mut store, *index, &kp.public, &params)?;
    }
    store.flush()?;
    monitor.track_hashing(hashing_start);

    // Seal: everything after this barrier reads the RAM image.
    let image = store.load_memory_tree();
    let durable_root = match store.root() {
        Some(TreeNode::Single(v)) => v.clone(),
        _ => {
            return Err(PsiError::store_corrupt(
                &store_path,
                "missing root after insertion",
            ))
        }
    };
    match image.root() {
        Some(TreeNode::Single(v)) if *v == durable_root => {}
        _ => {
            return Err(PsiError::store_corrupt(
                &store_path,
                "digest mismatch between durable store and RAM image",
            ))
        }
    }
    let digest = durable_root.to_ntt_new(&params.ctx);

    let mut msg_rng = ChaCha20Rng::seed_from_u64(master ^ MESSAGE_SEED_SALT);
    let message = Poly::random_binary(params.d, params.q, &mut msg_rng);

    let witness_start = Instant::now();
    let witness_pairs: Vec<(Vec<Vector>, Vec<Vector>)> = keyed
        .par_iter()
        .map(|(index, _)| le::witgen(&image, &params, *index))
        .collect();
    monitor.track_witness_generation(witness_start);

    let mut tree_indices = Vec::with_capacity(size);
    let mut secret_keys = Vec::with_capacity(size);
    for (index, kp) in keyed {
        tree_indices.push(index);
        secret_keys.push(kp.secret);
    }
    let (witnesses1, witnesses2): (Vec<_>, Vec<_>) = witness_pairs.into_iter().unzip();

    monitor.report("server-init");

    Ok(ServerContext {
        params,
        digest,
        message,
        secret_keys,
        witnesses1,
        witnesses2,
        tree_indices,
        fingerprints: fingerprints.to_vec(),
        store: Some(store),
        worker_config: config.workers,
    })
}

/// Serializable public parameters for the wire.
pub fn public_parameters(ctx: &ServerContext) -> super::wire::PublicParameters {
    super::wire::PublicParameters::from_view(&ctx.public_view())
}

/// Runs intersection detection to completion.
pub fn detect(ctx: &ServerContext, ciphertexts: &[Ciphertext]) -> Result<Vec<u64>> {
    detect_with_cancel(ctx, ciphertexts, &CancelToken::new())
}

/// Decrypts every (ciphertext, element) pair across a fixed worker pool and
/// returns the matched server fingerprints.
///
/// The match set is deterministic given the inputs; emission order is not.
/// Cancellation stops dispatch between items and returns the partial set.
/// A panicking worker is logged and its remaining items are abandoned; the
/// partial result is still returned so callers can retry.
pub fn detect_with_cancel(
    ctx: &ServerContext,
    ciphertexts: &[Ciphertext],
    cancel: &CancelToken,
) -> Result<Vec<u64>> {
    if ciphertexts.is_empty() {
        return Ok(Vec::new());
    }

    let x_size = ctx.len();
    let total = ciphertexts.len() * x_size;
    let num_workers = workers(x_size, &ctx.worker_config).min(x_size);

    let mut monitor = PerformanceMonitor::new(num_workers);
    let start = Instant::now();

    let matches: Mutex<(Vec<u64>, HashSet<usize>)> = Mutex::new((Vec::new(), HashSet::new()));
    let progress = AtomicUsize::new(0);
    let live_workers = AtomicUsize::new(num_workers);

    std::thread::scope(|scope| {
        for worker_id in 0..num_workers {
            let matches = &matches;
            let progress = &progress;
            let live_workers = &live_workers;
            let cancel = cancel.clone();
            scope.spawn(move || {
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    // Work items are the (j, k) pairs in row-major order,
                    // dealt round-robin across the pool.
                    let mut item = worker_id;
                    while item < total {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let j = item / x_size;
                        let k = item % x_size;

                        let decrypted = dec(
                            &ctx.params,
                            &ctx.secret_keys[k],
                            &ctx.witnesses1[k],
                            &ctx.witnesses2[k],
                            &ciphertexts[j],
                        );
                        if correctness_check(&decrypted, &ctx.message, ctx.params.q) {
                            // A poisoned lock only means another worker
                            // panicked; the set itself is still valid.
                            let mut guard =
                                matches.lock().unwrap_or_else(|e| e.into_inner());
                            if guard.1.insert(k) {
                                guard.0.push(ctx.fingerprints[k]);
                            }
                        }
                        progress.fetch_add(1, Ordering::Relaxed);
                        item += num_workers;
                    }
                }));
                live_workers.fetch_sub(1, Ordering::Release);
                if outcome.is_err() {
                    warn!(worker_id, "detection worker panicked; returning partial results");
                }
            });
        }

        // The spawning thread doubles as the progress reporter.
        let mut last_report = Instant::now();
        while live_workers.load(Ordering::Acquire) > 0 {
            std::thread::sleep(Duration::from_millis(100));
            if last_report.elapsed() >= Duration::from_secs(5) {
                info!(
                    processed = progress.load(Ordering::Relaxed),
                    total, "intersection progress"
                );
                last_report = Instant::now();
            }
        }
    });

    monitor.track_intersection(start);
    monitor.add_operations(total);
    monitor.report("detect");

    let (found, _) = matches.into_inner().unwrap_or_else(|e| e.into_inner());
    Ok(found)
}

/// Closes the witness store. The database file is retained on disk.
pub fn teardown(mut ctx: ServerContext) -> Result<()> {
    if let Some(mut store) = ctx.store.take() {
        store.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = server_init(&[], dir.path().join("tree.db"));
        assert!(matches!(err, Err(PsiError::EmptyInput(_))));
    }

    #[test]
    fn test_unwritable_store_is_rejected() {
        let err = server_init(&[1, 2, 3], "/nonexistent-dir/tree.db");
        assert!(matches!(err, Err(PsiError::Store { .. })));
    }

    #[test]
    fn test_context_shape() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = server_init_with_config(
            &[100, 200, 300],
            dir.path().join("tree.db"),
            ServerConfig {
                seed: Some(5),
                workers: WorkerConfig::default(),
            },
        )
        .unwrap();

        assert_eq!(ctx.len(), 3);
        assert_eq!(ctx.tree_indices().len(), 3);
        for (i, &fp) in ctx.fingerprints().iter().enumerate() {
            assert_eq!(
                ctx.tree_indices()[i],
                reduce_to_tree_index(fp, ctx.params().layers)
            );
        }
        assert!(ctx.digest().is_ntt());
        assert!(ctx.message().raw().iter().all(|&c| c <= 1));

        let usage = ctx.memory_usage();
        assert!(usage.witness_mb > 0.0);
        assert!(usage.tree_nodes > 0);

        teardown(ctx).unwrap();
    }

    #[test]
    fn test_init_is_deterministic_under_seed() {
        let build = || {
            let dir = tempfile::tempdir().unwrap();
            let ctx = server_init_with_config(
                &[7, 8, 9],
                dir.path().join("tree.db"),
                ServerConfig {
                    seed: Some(99),
                    workers: WorkerConfig::default(),
                },
            )
            .unwrap();
            (ctx.digest.clone(), ctx.message.clone())
        };
        let (d1, m1) = build();
        let (d2, m2) = build();
        assert_eq!(d1, d2);
        assert_eq!(m1, m2);
    }

    #[test]
    fn test_detect_empty_client_set() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = server_init(&[42], dir.path().join("tree.db")).unwrap();
        let result = detect(&ctx, &[]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_store_file_retained_after_teardown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.db");
        let ctx = server_init(&[1], &path).unwrap();
        teardown(ctx).unwrap();
        assert!(path.exists());
    }
}
