//! psi-demo: run both PSI roles locally end to end.
//!
//! Builds a random server set, overlaps a client set with it, and checks
//! that detection recovers exactly the overlap. The two parties talk
//! through the serialized parameter wire, the same path a networked
//! deployment would use.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use eyre::{ensure, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use lepsi::psi::{self, PublicParameters, ServerConfig, WorkerConfig};

#[derive(Parser)]
#[command(name = "psi-demo")]
#[command(about = "Laconic-encryption PSI, both roles in one process")]
#[command(version)]
struct Args {
    /// Number of server elements
    #[arg(long, default_value_t = 64)]
    server_size: usize,

    /// Number of client elements
    #[arg(long, default_value_t = 16)]
    client_size: usize,

    /// How many client elements overlap the server set
    #[arg(long, default_value_t = 8)]
    overlap: usize,

    /// Witness store path
    #[arg(long, default_value = "psi-tree.db")]
    store: PathBuf,

    /// Seed for data generation and server randomness
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Print the performance snapshot as JSON
    #[arg(long)]
    metrics: bool,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    ensure!(
        args.overlap <= args.client_size && args.overlap <= args.server_size,
        "overlap cannot exceed either set size"
    );

    let mut rng = ChaCha20Rng::seed_from_u64(args.seed);
    let server_set: Vec<u64> = (0..args.server_size).map(|_| rng.gen()).collect();
    let mut client_set: Vec<u64> = server_set[..args.overlap].to_vec();
    client_set.extend((args.overlap..args.client_size).map(|_| rng.gen::<u64>()));

    info!(
        server = args.server_size,
        client = args.client_size,
        overlap = args.overlap,
        "generating sets"
    );

    let start = Instant::now();
    let ctx = psi::server_init_with_config(
        &server_set,
        &args.store,
        ServerConfig {
            seed: Some(args.seed),
            workers: WorkerConfig::detected(),
        },
    )?;
    info!(elapsed = ?start.elapsed(), "server initialized");

    // Ship the parameters through the wire form, as a remote client would
    // receive them.
    let wire_bytes = psi::public_parameters(&ctx).to_bytes()?;
    info!(bytes = wire_bytes.len(), "public parameters serialized");
    let view = PublicParameters::from_bytes(&wire_bytes)?.instantiate()?;

    let start = Instant::now();
    let ciphertexts = psi::client_encrypt(&client_set, &view);
    info!(
        count = ciphertexts.len(),
        elapsed = ?start.elapsed(),
        "client encryption done"
    );

    let start = Instant::now();
    let mut matches = psi::detect(&ctx, &ciphertexts)?;
    info!(elapsed = ?start.elapsed(), "detection done");

    matches.sort_unstable();
    let mut expected: Vec<u64> = server_set[..args.overlap].to_vec();
    expected.sort_unstable();

    println!("matched {} of {} expected elements", matches.len(), expected.len());
    ensure!(matches == expected, "intersection mismatch");

    if args.metrics {
        let usage = ctx.memory_usage();
        println!("{}", serde_json::to_string_pretty(&usage)?);
    }

    psi::teardown(ctx)?;
    Ok(())
}
