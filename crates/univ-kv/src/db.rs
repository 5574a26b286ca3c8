use std::path::{Path, PathBuf};

use redb::{Builder, Database};
use tracing::{debug, info};

use crate::error::KvResult;
use crate::tx::{ReadTx, WriteTx};

/// Keys fetched per engine round-trip when listing a bucket.
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Tuning knobs for [`KvDb::open`].
#[derive(Clone, Debug)]
pub struct KvOptions {
    /// Page cache size handed to the engine; `None` keeps its default.
    pub cache_size_bytes: Option<usize>,
    /// Keys fetched per page by [`crate::Keys`].
    pub page_size: usize,
}

impl Default for KvOptions {
    fn default() -> Self {
        Self {
            cache_size_bytes: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// A generic transactional key-value database with named buckets.
///
/// Keys and bucket names are strings, values are byte arrays. The engine
/// allows one write transaction at a time; `begin_write` blocks until the
/// previous writer finishes. Readers see a consistent snapshot taken when
/// their transaction began.
pub struct KvDb {
    db: Database,
    path: PathBuf,
    page_size: usize,
}

impl KvDb {
    /// Open a database, creating the file (and its parent directory) if it
    /// doesn't exist.
    pub fn open(path: impl AsRef<Path>, options: KvOptions) -> KvResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut builder = Builder::new();
        if let Some(bytes) = options.cache_size_bytes {
            builder.set_cache_size(bytes);
        }
        let db = builder.create(&path)?;

        info!(path = %path.display(), "kv database opened");
        Ok(Self {
            db,
            path,
            page_size: options.page_size.max(1),
        })
    }

    /// Start a read-only transaction.
    pub fn begin_read(&self) -> KvResult<ReadTx> {
        let txn = self.db.begin_read()?;
        Ok(ReadTx::new(txn, self.page_size))
    }

    /// Start a read-write transaction.
    pub fn begin_write(&self) -> KvResult<WriteTx> {
        let txn = self.db.begin_write()?;
        Ok(WriteTx::new(txn, self.page_size))
    }

    /// Close the database, releasing the file.
    pub fn close(self) {
        debug!(path = %self.path.display(), "kv database closed");
        drop(self.db);
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for KvDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvDb")
            .field("path", &self.path)
            .field("page_size", &self.page_size)
            .finish()
    }
}
