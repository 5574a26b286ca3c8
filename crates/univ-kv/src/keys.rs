use std::collections::VecDeque;
use std::iter::FusedIterator;

use crate::error::KvResult;
use crate::tx::KvRead;

/// Lazy, paged listing of a bucket's keys.
///
/// Keys are fetched `page_size` at a time, resuming strictly after the last
/// key seen, so a bucket of any size is listed in bounded memory. The
/// iterator borrows its transaction and cannot outlive it. After the first
/// error it yields nothing further.
pub struct Keys<'tx, T: KvRead + ?Sized> {
    tx: &'tx T,
    bucket: String,
    page_size: usize,
    buffer: VecDeque<String>,
    cursor: Option<String>,
    done: bool,
}

impl<'tx, T: KvRead + ?Sized> Keys<'tx, T> {
    pub(crate) fn new(tx: &'tx T, bucket: &str, page_size: usize) -> Self {
        Self {
            tx,
            bucket: bucket.to_string(),
            page_size: page_size.max(1),
            buffer: VecDeque::new(),
            cursor: None,
            done: false,
        }
    }

    fn fill(&mut self) -> KvResult<()> {
        let page = self
            .tx
            .key_page(&self.bucket, self.cursor.as_deref(), self.page_size)?;
        if page.len() < self.page_size {
            self.done = true;
        }
        self.cursor = page.last().cloned();
        self.buffer.extend(page);
        Ok(())
    }
}

impl<T: KvRead + ?Sized> Iterator for Keys<'_, T> {
    type Item = KvResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.done {
            if let Err(e) = self.fill() {
                self.done = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

impl<T: KvRead + ?Sized> FusedIterator for Keys<'_, T> {}

impl<T: KvRead + ?Sized> std::fmt::Debug for Keys<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keys")
            .field("bucket", &self.bucket)
            .field("cursor", &self.cursor)
            .field("buffered", &self.buffer.len())
            .field("done", &self.done)
            .finish()
    }
}
