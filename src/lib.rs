//! lepsi: Private Set Intersection from lattice-based Laconic Encryption.
//!
//! A server commits its fingerprint set into a binary witness tree hashed
//! with a Ring-LWE gadget hash; the single root vector (the digest) is the
//! whole public commitment. A client encrypts each of its fingerprints to
//! the fingerprint's leaf index knowing only the digest, and the server
//! learns exactly which of its own elements the client also holds — nothing
//! else crosses the boundary in the clear.
//!
//! Key components:
//! - Negacyclic NTT ring arithmetic over a 58-bit prime ([`math`])
//! - Base-2 gadget decomposition driving the tree hash ([`gadget`])
//! - The Laconic Encryption primitive: KeyGen / Upd / WitGen / Enc / Dec ([`le`])
//! - Durable witness store with a sealed in-RAM image ([`tree`])
//! - Parallel intersection detection with adaptive worker sizing ([`psi`])
//!
//! # Example
//!
//! ```no_run
//! use lepsi::psi;
//!
//! let server_set = vec![100u64, 200, 300, 400, 500];
//! let client_set = vec![200u64, 400, 700];
//!
//! let ctx = psi::server_init(&server_set, "/tmp/tree.db")?;
//! let ciphertexts = psi::client_encrypt(&client_set, &ctx.public_view());
//! let matches = psi::detect(&ctx, &ciphertexts)?;
//! assert_eq!(matches.len(), 2);
//! # lepsi::error::Result::Ok(())
//! ```

pub mod error;
pub mod gadget;
pub mod le;
pub mod math;
pub mod matrix;
pub mod params;
pub mod psi;
pub mod tree;

pub use error::{PsiError, Result};
pub use le::{Ciphertext, LeKeyPair};
pub use params::LeParams;
pub use psi::{
    client_encrypt, client_encrypt_seeded, detect, detect_with_cancel, public_parameters,
    server_init, server_init_with_config, teardown, CancelToken, PublicParameters, PublicView,
    ServerConfig, ServerContext, WorkerConfig,
};
