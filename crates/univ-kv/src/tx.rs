use std::ops::Bound;

use redb::{
    ReadTransaction, ReadableTable, TableDefinition, TableError, TableHandle, WriteTransaction,
};

use crate::error::KvResult;
use crate::keys::Keys;

type Bucket<'a> = TableDefinition<'a, &'static str, &'static [u8]>;

fn bucket(name: &str) -> Bucket<'_> {
    TableDefinition::new(name)
}

/// Read operations shared by read-only and read-write transactions.
pub trait KvRead {
    /// Retrieve a record. A missing key and a missing bucket both return
    /// `Ok(None)`; an empty value is `Ok(Some(vec![]))`.
    fn get(&self, bucket: &str, key: &str) -> KvResult<Option<Vec<u8>>>;

    /// Whether the bucket has been created.
    fn bucket_exists(&self, bucket: &str) -> KvResult<bool>;

    /// Names of all buckets, in engine order.
    fn buckets(&self) -> KvResult<Vec<String>>;

    /// Up to `limit` keys of `bucket` in ascending order, strictly after
    /// `after` when given. A missing bucket yields an empty page.
    fn key_page(&self, bucket: &str, after: Option<&str>, limit: usize) -> KvResult<Vec<String>>;

    /// Page size used by [`KvRead::keys`].
    fn page_size(&self) -> usize;

    /// Whether a record exists.
    fn contains(&self, bucket: &str, key: &str) -> KvResult<bool> {
        Ok(self.get(bucket, key)?.is_some())
    }

    /// Lazily list every key in `bucket`.
    ///
    /// Each call starts a fresh listing. The iterator borrows the
    /// transaction and fetches one page at a time; dropping it early is
    /// always safe.
    fn keys(&self, bucket: &str) -> Keys<'_, Self> {
        Keys::new(self, bucket, self.page_size())
    }
}

fn read_value<T>(table: &T, key: &str) -> KvResult<Option<Vec<u8>>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    Ok(table.get(key)?.map(|value| value.value().to_vec()))
}

fn read_page<T>(table: &T, after: Option<&str>, limit: usize) -> KvResult<Vec<String>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let start = match after {
        Some(key) => Bound::Excluded(key),
        None => Bound::Unbounded,
    };
    let mut keys = Vec::with_capacity(limit.min(1024));
    for entry in table.range::<&str>((start, Bound::Unbounded))?.take(limit) {
        let (key, _) = entry?;
        keys.push(key.value().to_string());
    }
    Ok(keys)
}

// ---------------------------------------------------------------------------
// ReadTx
// ---------------------------------------------------------------------------

/// A read-only transaction over a consistent snapshot.
pub struct ReadTx {
    txn: ReadTransaction,
    page_size: usize,
}

impl ReadTx {
    pub(crate) fn new(txn: ReadTransaction, page_size: usize) -> Self {
        Self { txn, page_size }
    }
}

impl KvRead for ReadTx {
    fn get(&self, name: &str, key: &str) -> KvResult<Option<Vec<u8>>> {
        match self.txn.open_table(bucket(name)) {
            Ok(table) => read_value(&table, key),
            Err(TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn bucket_exists(&self, name: &str) -> KvResult<bool> {
        Ok(self.txn.list_tables()?.any(|handle| handle.name() == name))
    }

    fn buckets(&self) -> KvResult<Vec<String>> {
        Ok(self
            .txn
            .list_tables()?
            .map(|handle| handle.name().to_string())
            .collect())
    }

    fn key_page(&self, name: &str, after: Option<&str>, limit: usize) -> KvResult<Vec<String>> {
        match self.txn.open_table(bucket(name)) {
            Ok(table) => read_page(&table, after, limit),
            Err(TableError::TableDoesNotExist(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}

// ---------------------------------------------------------------------------
// WriteTx
// ---------------------------------------------------------------------------

/// A read-write transaction.
///
/// Reads observe the transaction's own uncommitted writes. Nothing becomes
/// visible to other transactions until [`WriteTx::commit`] succeeds; dropping
/// the transaction without committing rolls it back.
pub struct WriteTx {
    txn: WriteTransaction,
    page_size: usize,
}

impl WriteTx {
    pub(crate) fn new(txn: WriteTransaction, page_size: usize) -> Self {
        Self { txn, page_size }
    }

    /// Add or replace a record, creating the bucket if it does not exist.
    pub fn put(&self, name: &str, key: &str, value: &[u8]) -> KvResult<()> {
        let mut table = self.txn.open_table(bucket(name))?;
        table.insert(key, value)?;
        Ok(())
    }

    /// Remove a record. Returns `true` if it existed; a missing bucket is
    /// left uncreated and reported as `false`.
    pub fn delete(&self, name: &str, key: &str) -> KvResult<bool> {
        if !self.bucket_exists(name)? {
            return Ok(false);
        }
        let mut table = self.txn.open_table(bucket(name))?;
        let removed = table.remove(key)?.is_some();
        Ok(removed)
    }

    /// Create a bucket if it does not already exist.
    pub fn make_bucket(&self, name: &str) -> KvResult<()> {
        self.txn.open_table(bucket(name))?;
        Ok(())
    }

    /// Atomically publish every write made in this transaction.
    pub fn commit(self) -> KvResult<()> {
        self.txn.commit()?;
        Ok(())
    }

    /// Discard every write made in this transaction.
    pub fn rollback(self) -> KvResult<()> {
        self.txn.abort()?;
        Ok(())
    }
}

impl KvRead for WriteTx {
    fn get(&self, name: &str, key: &str) -> KvResult<Option<Vec<u8>>> {
        // Opening a table in a write transaction creates it, so check first.
        if !self.bucket_exists(name)? {
            return Ok(None);
        }
        let table = self.txn.open_table(bucket(name))?;
        read_value(&table, key)
    }

    fn bucket_exists(&self, name: &str) -> KvResult<bool> {
        Ok(self.txn.list_tables()?.any(|handle| handle.name() == name))
    }

    fn buckets(&self) -> KvResult<Vec<String>> {
        Ok(self
            .txn
            .list_tables()?
            .map(|handle| handle.name().to_string())
            .collect())
    }

    fn key_page(&self, name: &str, after: Option<&str>, limit: usize) -> KvResult<Vec<String>> {
        if !self.bucket_exists(name)? {
            return Ok(Vec::new());
        }
        let table = self.txn.open_table(bucket(name))?;
        read_page(&table, after, limit)
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}
