//! Witness tree persistence.
//!
//! Two backends behind one node representation: a durable append-log store
//! used while leaves are inserted, and an in-RAM image the whole tree is
//! bulk-loaded into once insertion is sealed. Witness generation reads only
//! the RAM image; reaching into the durable store per witness was measured
//! an order of magnitude slower in the original system.

pub mod memory;
pub mod store;

pub use memory::MemoryTree;
pub use store::TreeStore;

use serde::{Deserialize, Serialize};

use crate::matrix::Vector;

/// One tree node, keyed externally by (layer, row).
///
/// Interior nodes and untouched leaves hold a single hash value; an
/// occupied leaf holds the inserted public-key pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Hash value of an interior node (or an empty leaf).
    Single(Vector),
    /// Public-key pair stored at an occupied leaf.
    Pair(Vector, Vector),
}

impl TreeNode {
    /// Number of vectors in the node.
    pub fn width(&self) -> usize {
        match self {
            TreeNode::Single(_) => 1,
            TreeNode::Pair(_, _) => 2,
        }
    }
}
