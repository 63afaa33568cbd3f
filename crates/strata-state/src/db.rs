//! RocksDB-backed node store

use crate::error::StateResult;
use parking_lot::RwLock;
use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options};
use std::path::Path;
use std::sync::Arc;
use strata_primitives::H256;
use strata_trie::{NodeStore, TrieError, TrieResult};

/// Column family names
pub mod cf {
    /// Trie nodes and code blobs, keyed by hash
    pub const NODES: &str = "nodes";
    /// Metadata
    pub const META: &str = "meta";
}

/// All column family names
pub const ALL_CFS: &[&str] = &[cf::NODES, cf::META];

const HEAD_KEY: &[u8] = b"state_head";

type RocksDB = DBWithThreadMode<MultiThreaded>;

/// Database configuration
#[derive(Clone, Debug)]
pub struct DbConfig {
    /// Create database if missing
    pub create_if_missing: bool,
    /// Maximum number of open files
    pub max_open_files: i32,
    /// Write buffer size
    pub write_buffer_size: usize,
    /// Maximum write buffers
    pub max_write_buffer_number: i32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            max_open_files: 512,
            write_buffer_size: 64 * 1024 * 1024, // 64MB
            max_write_buffer_number: 3,
        }
    }
}

/// Content-addressed trie node store on RocksDB
#[derive(Clone)]
pub struct RocksNodeStore {
    db: Arc<RwLock<RocksDB>>,
    path: String,
}

fn backend(e: impl ToString) -> TrieError {
    TrieError::Backend(e.to_string())
}

impl RocksNodeStore {
    /// Open with default config
    pub fn open(path: impl AsRef<Path>) -> StateResult<Self> {
        Self::open_with_config(path, DbConfig::default())
    }

    /// Open with custom config
    pub fn open_with_config(path: impl AsRef<Path>, config: DbConfig) -> StateResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(config.create_if_missing);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(config.max_open_files);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let path = path.as_ref().to_string_lossy().to_string();
        let db = RocksDB::open_cf_descriptors(&opts, &path, cf_descriptors)?;
        Ok(Self {
            db: Arc::new(RwLock::new(db)),
            path,
        })
    }

    /// Database path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Record the latest persisted state root
    pub fn set_head(&self, root: H256) -> TrieResult<()> {
        let db = self.db.read();
        let cf = get_cf(&db, cf::META)?;
        db.put_cf(&cf, HEAD_KEY, root.as_bytes()).map_err(backend)
    }

    /// Latest persisted state root, if any
    pub fn head(&self) -> TrieResult<Option<H256>> {
        let db = self.db.read();
        let cf = get_cf(&db, cf::META)?;
        match db.get_cf(&cf, HEAD_KEY).map_err(backend)? {
            Some(bytes) => H256::from_slice(&bytes).map(Some).map_err(backend),
            None => Ok(None),
        }
    }
}

fn get_cf<'a>(db: &'a RocksDB, name: &str) -> TrieResult<Arc<BoundColumnFamily<'a>>> {
    db.cf_handle(name)
        .ok_or_else(|| TrieError::Backend(format!("missing column family {}", name)))
}

impl NodeStore for RocksNodeStore {
    fn get(&self, hash: &H256) -> TrieResult<Option<Vec<u8>>> {
        let db = self.db.read();
        let cf = get_cf(&db, cf::NODES)?;
        db.get_cf(&cf, hash.as_bytes()).map_err(backend)
    }

    fn put(&self, hash: H256, node: Vec<u8>) -> TrieResult<()> {
        let db = self.db.read();
        let cf = get_cf(&db, cf::NODES)?;
        db.put_cf(&cf, hash.as_bytes(), node).map_err(backend)
    }
}
