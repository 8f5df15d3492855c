//! Durable witness store: append-only log with a write-through cache.
//!
//! Records are upserts keyed by (layer, row); the latest record for a key
//! wins. The write-through cache doubles as the point-read path during
//! insertion, and reopening a store replays the log to rebuild it. The
//! format is implementation-private: a fixed header followed by
//! little-endian records, each carrying one or two coefficient-form
//! vectors.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{PsiError, Result};
use crate::math::Poly;
use crate::matrix::Vector;
use crate::params::LeParams;

use super::memory::MemoryTree;
use super::TreeNode;

const MAGIC: &[u8; 8] = b"LEPSITRE";
const VERSION: u32 = 1;

/// File-backed witness store. Single writer; readers go through the cache
/// or, after the build barrier, through [`MemoryTree`].
#[derive(Debug)]
pub struct TreeStore {
    path: PathBuf,
    writer: BufWriter<File>,
    cache: HashMap<(u16, u64), TreeNode>,
    d: usize,
    n: usize,
    layers: usize,
}

impl TreeStore {
    /// Creates (or truncates) a store for the given parameter set.
    pub fn create(path: impl AsRef<Path>, params: &LeParams) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| PsiError::store(&path, "create store file", e))?;
        let mut writer = BufWriter::new(file);

        let mut header = Vec::with_capacity(24);
        header.extend_from_slice(MAGIC);
        header.extend_from_slice(&VERSION.to_le_bytes());
        header.extend_from_slice(&(params.d as u32).to_le_bytes());
        header.extend_from_slice(&(params.n as u32).to_le_bytes());
        header.extend_from_slice(&(params.layers as u32).to_le_bytes());
        writer
            .write_all(&header)
            .map_err(|e| PsiError::store(&path, "write store header", e))?;

        Ok(Self {
            path,
            writer,
            cache: HashMap::new(),
            d: params.d,
            n: params.n,
            layers: params.layers,
        })
    }

    /// Reopens an existing store, replaying the log into the cache.
    pub fn open(path: impl AsRef<Path>, params: &LeParams) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file =
            File::open(&path).map_err(|e| PsiError::store(&path, "open store file", e))?;
        let mut reader = BufReader::new(file);

        let mut header = [0u8; 24];
        reader
            .read_exact(&mut header)
            .map_err(|e| PsiError::store(&path, "read store header", e))?;
        if &header[0..8] != MAGIC {
            return Err(PsiError::store_corrupt(&path, "bad magic"));
        }
        let version = u32::from_le_bytes(header[8..12].try_into().unwrap());
        if version != VERSION {
            return Err(PsiError::store_corrupt(
                &path,
                format!("unsupported version {version}"),
            ));
        }
        let d = u32::from_le_bytes(header[12..16].try_into().unwrap()) as usize;
        let n = u32::from_le_bytes(header[16..20].try_into().unwrap()) as usize;
        let layers = u32::from_le_bytes(header[20..24].try_into().unwrap()) as usize;
        if d != params.d || n != params.n || layers != params.layers {
            return Err(PsiError::store_corrupt(
                &path,
                format!(
                    "store built for (d={d}, n={n}, layers={layers}), parameters say \
                     (d={}, n={}, layers={})",
                    params.d, params.n, params.layers
                ),
            ));
        }

        let mut cache = HashMap::new();
        loop {
            let mut key = [0u8; 11];
            match reader.read_exact(&mut key) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(PsiError::store(&path, "read record key", e)),
            }
            let layer = u16::from_le_bytes(key[0..2].try_into().unwrap());
            let row = u64::from_le_bytes(key[2..10].try_into().unwrap());
            let kind = key[10];
            let node = match kind {
                0 => TreeNode::Single(Self::read_vector(&mut reader, &path, n, d, params.q)?),
                1 => TreeNode::Pair(
                    Self::read_vector(&mut reader, &path, n, d, params.q)?,
                    Self::read_vector(&mut reader, &path, n, d, params.q)?,
                ),
                k => {
                    return Err(PsiError::store_corrupt(
                        &path,
                        format!("unknown node kind {k}"),
                    ))
                }
            };
            cache.insert((layer, row), node);
        }

        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| PsiError::store(&path, "reopen store for append", e))?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            cache,
            d,
            n,
            layers,
        })
    }

    /// Upserts a node. Appends to the log and updates the cache; a second
    /// write to the same key silently overwrites the first.
    pub fn put(&mut self, layer: u16, row: u64, node: TreeNode) -> Result<()> {
        debug_assert!((layer as usize) <= self.layers, "layer out of range");
        let mut record = Vec::with_capacity(11 + node.width() * self.n * self.d * 8);
        record.extend_from_slice(&layer.to_le_bytes());
        record.extend_from_slice(&row.to_le_bytes());
        match &node {
            TreeNode::Single(v) => {
                record.push(0);
                Self::encode_vector(&mut record, v);
            }
            TreeNode::Pair(v1, v2) => {
                record.push(1);
                Self::encode_vector(&mut record, v1);
                Self::encode_vector(&mut record, v2);
            }
        }
        self.writer
            .write_all(&record)
            .map_err(|e| PsiError::store(&self.path, "append node record", e))?;
        self.cache.insert((layer, row), node);
        Ok(())
    }

    /// Point read through the write-through cache. Absent keys are
    /// all-zero subtrees.
    pub fn get(&self, layer: u16, row: u64) -> Option<&TreeNode> {
        self.cache.get(&(layer, row))
    }

    /// The root node (layer 0, row 0), if any leaf was ever inserted.
    pub fn root(&self) -> Option<&TreeNode> {
        self.get(0, 0)
    }

    /// Flushes buffered records to the file.
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| PsiError::store(&self.path, "flush store", e))
    }

    /// Bulk-loads the sealed tree into a RAM image for witness generation.
    pub fn load_memory_tree(&self) -> MemoryTree {
        MemoryTree::from_nodes(self.cache.clone(), self.layers)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn node_count(&self) -> usize {
        self.cache.len()
    }

    fn encode_vector(buf: &mut Vec<u8>, v: &Vector) {
        for p in v.elements() {
            debug_assert!(!p.is_ntt(), "store holds coefficient-form nodes");
            for &c in p.raw() {
                buf.extend_from_slice(&c.to_le_bytes());
            }
        }
    }

    fn read_vector(
        reader: &mut impl Read,
        path: &Path,
        n: usize,
        d: usize,
        q: u64,
    ) -> Result<Vector> {
        let mut polys = Vec::with_capacity(n);
        let mut buf = vec![0u8; d * 8];
        for _ in 0..n {
            reader
                .read_exact(&mut buf)
                .map_err(|e| PsiError::store(path, "read node vector", e))?;
            let coeffs: Vec<u64> = buf
                .chunks_exact(8)
                .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
                .collect();
            if coeffs.iter().any(|&c| c >= q) {
                return Err(PsiError::store_corrupt(path, "coefficient out of range"));
            }
            polys.push(Poly::from_coeffs(coeffs, q));
        }
        Ok(Vector::from_polys(polys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::LeParams;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn params() -> LeParams {
        LeParams::setup(2).unwrap()
    }

    fn random_vector(params: &LeParams, seed: u64) -> Vector {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        Vector::random(params.n, params.d, params.q, &mut rng)
    }

    #[test]
    fn test_put_get_roundtrip() {
        let p = params();
        let dir = tempfile::tempdir().unwrap();
        let mut store = TreeStore::create(dir.path().join("tree.db"), &p).unwrap();

        let v = random_vector(&p, 1);
        store.put(3, 17, TreeNode::Single(v.clone())).unwrap();
        assert_eq!(store.get(3, 17), Some(&TreeNode::Single(v)));
        assert_eq!(store.get(3, 18), None);
    }

    #[test]
    fn test_upsert_overwrites() {
        let p = params();
        let dir = tempfile::tempdir().unwrap();
        let mut store = TreeStore::create(dir.path().join("tree.db"), &p).unwrap();

        let a = random_vector(&p, 2);
        let b = random_vector(&p, 3);
        store.put(1, 0, TreeNode::Single(a)).unwrap();
        store.put(1, 0, TreeNode::Single(b.clone())).unwrap();
        assert_eq!(store.get(1, 0), Some(&TreeNode::Single(b)));
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn test_reopen_replays_log() {
        let p = params();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.db");

        let a = random_vector(&p, 4);
        let b = random_vector(&p, 5);
        let c = random_vector(&p, 6);
        {
            let mut store = TreeStore::create(&path, &p).unwrap();
            store.put(0, 0, TreeNode::Single(a.clone())).unwrap();
            store
                .put(p.layers as u16, 9, TreeNode::Pair(b.clone(), c.clone()))
                .unwrap();
            // Overwrite the root; the replay must keep the latest value.
            store.put(0, 0, TreeNode::Single(b.clone())).unwrap();
            store.flush().unwrap();
        }

        let reopened = TreeStore::open(&path, &p).unwrap();
        assert_eq!(reopened.get(0, 0), Some(&TreeNode::Single(b.clone())));
        assert_eq!(
            reopened.get(p.layers as u16, 9),
            Some(&TreeNode::Pair(b, c))
        );
        assert_eq!(reopened.node_count(), 2);
    }

    #[test]
    fn test_open_rejects_mismatched_parameters() {
        let p = params();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.db");
        {
            let mut store = TreeStore::create(&path, &p).unwrap();
            store.flush().unwrap();
        }
        // A store built for 2 elements has a different depth than one for 2000.
        let other = LeParams::setup(2000).unwrap();
        assert!(matches!(
            TreeStore::open(&path, &other),
            Err(PsiError::Store { .. })
        ));
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let p = params();
        let err = TreeStore::create("/nonexistent-dir/tree.db", &p);
        assert!(matches!(err, Err(PsiError::Store { .. })));
    }

    #[test]
    fn test_memory_image_matches_store() {
        let p = params();
        let dir = tempfile::tempdir().unwrap();
        let mut store = TreeStore::create(dir.path().join("tree.db"), &p).unwrap();

        let a = random_vector(&p, 7);
        let b = random_vector(&p, 8);
        store.put(2, 3, TreeNode::Single(a.clone())).unwrap();
        store
            .put(p.layers as u16, 1, TreeNode::Pair(a.clone(), b.clone()))
            .unwrap();

        let image = store.load_memory_tree();
        assert_eq!(image.get(2, 3), store.get(2, 3));
        assert_eq!(image.get(p.layers as u16, 1), store.get(p.layers as u16, 1));
        assert_eq!(image.len(), store.node_count());
    }
}
