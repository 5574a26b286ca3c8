//! Chunk-level diff between two merkle roots.
//!
//! Both trees are walked one level at a time. At each level a hash present
//! on both sides names an identical subtree and is pruned without reading
//! it; hashes on one side only are expanded if they are tree nodes, or
//! recorded as leaves if they are chunks.

use std::collections::HashSet;

use tracing::debug;
use univ_kv::KvRead;
use univ_store::{ChunkStore, DocumentIndex};
use univ_types::ContentHash;

use crate::error::{DiffError, DiffResult};

/// The chunks a new version of a document gained and lost.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkDiff {
    /// Root before the change, `None` for a first ingestion.
    pub old_root: Option<ContentHash>,
    pub new_root: ContentHash,
    /// Chunks in the new version that the old one lacked, deduplicated, in
    /// document order.
    pub added: Vec<ContentHash>,
    /// Chunks in the old version that the new one lacks, deduplicated, in
    /// document order.
    pub removed: Vec<ContentHash>,
    /// Hashes pruned because both sides shared them.
    pub shared_subtrees: usize,
}

impl ChunkDiff {
    /// The diff of a root against itself.
    pub fn identical(root: ContentHash) -> Self {
        Self {
            old_root: Some(root),
            new_root: root,
            added: Vec::new(),
            removed: Vec::new(),
            shared_subtrees: 1,
        }
    }

    /// Diff two fully materialized leaf sequences.
    pub fn from_leaves(
        old_root: Option<ContentHash>,
        new_root: ContentHash,
        old_leaves: &[ContentHash],
        new_leaves: &[ContentHash],
    ) -> Self {
        if old_root == Some(new_root) {
            return Self::identical(new_root);
        }
        let old_set: HashSet<ContentHash> = old_leaves.iter().copied().collect();
        let new_set: HashSet<ContentHash> = new_leaves.iter().copied().collect();
        Self {
            old_root,
            new_root,
            added: ordered_difference(new_leaves, &old_set),
            removed: ordered_difference(old_leaves, &new_set),
            shared_subtrees: 0,
        }
    }

    /// Whether both versions have the same root.
    pub fn roots_match(&self) -> bool {
        self.old_root == Some(self.new_root)
    }

    /// No chunk was added or removed. Reordering alone leaves this `true`
    /// even though the roots differ.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compare the documents rooted at `old` and `new`.
///
/// Every node of both trees must be stored in `index`, and every leaf in
/// `chunks`; anything else is [`DiffError::DanglingReference`]. Leaves are
/// reported in document order for trees whose leaves all sit at one depth,
/// which is every tree built by [`DocumentIndex::build_tree`].
///
/// Pruning only skips the level walk. When anything changed, shared
/// subtrees are still read to check whether a candidate chunk also sits in
/// one of them, stopping once every candidate is accounted for. An edit
/// whose chunks appear nowhere else therefore reads the whole of both trees.
pub fn diff_roots(
    index: &DocumentIndex,
    chunks: &ChunkStore,
    tx: &impl KvRead,
    old: Option<&ContentHash>,
    new: &ContentHash,
) -> DiffResult<ChunkDiff> {
    if old == Some(new) {
        debug!(root = %new.short_hex(), "roots identical");
        return Ok(ChunkDiff::identical(*new));
    }

    let walk = Walk { index, chunks, tx };
    let mut old_frontier: Vec<ContentHash> = old.into_iter().copied().collect();
    let mut new_frontier = vec![*new];
    let mut old_leaves = Vec::new();
    let mut new_leaves = Vec::new();
    let mut shared = Vec::new();

    while !(old_frontier.is_empty() && new_frontier.is_empty()) {
        let old_set: HashSet<ContentHash> = old_frontier.iter().copied().collect();
        let new_set: HashSet<ContentHash> = new_frontier.iter().copied().collect();

        let mut next_old = Vec::new();
        for hash in &old_frontier {
            if new_set.contains(hash) {
                shared.push(*hash);
            } else {
                walk.expand(hash, &mut next_old, &mut old_leaves)?;
            }
        }

        let mut next_new = Vec::new();
        for hash in &new_frontier {
            if !old_set.contains(hash) {
                walk.expand(hash, &mut next_new, &mut new_leaves)?;
            }
        }

        old_frontier = next_old;
        new_frontier = next_new;
    }

    let old_set: HashSet<ContentHash> = old_leaves.iter().copied().collect();
    let new_set: HashSet<ContentHash> = new_leaves.iter().copied().collect();
    let mut added = ordered_difference(&new_leaves, &old_set);
    let mut removed = ordered_difference(&old_leaves, &new_set);

    // A leaf under a pruned subtree is present on both sides.
    if !shared.is_empty() && !(added.is_empty() && removed.is_empty()) {
        let candidates: HashSet<ContentHash> = added.iter().chain(&removed).copied().collect();
        let in_shared = walk.find_shared(&shared, candidates)?;
        added.retain(|hash| !in_shared.contains(hash));
        removed.retain(|hash| !in_shared.contains(hash));
    }

    debug!(
        new_root = %new.short_hex(),
        added = added.len(),
        removed = removed.len(),
        shared = shared.len(),
        "roots diffed"
    );

    Ok(ChunkDiff {
        old_root: old.copied(),
        new_root: *new,
        added,
        removed,
        shared_subtrees: shared.len(),
    })
}

/// The chunk hashes of the document rooted at `root`, in order.
///
/// A root that is a stored chunk rather than a node is a one-chunk
/// document. A root that is neither is [`DiffError::DanglingReference`];
/// below the root, any hash that is not a node is taken to be a chunk.
pub fn collect_leaves(
    index: &DocumentIndex,
    chunks: &ChunkStore,
    tx: &impl KvRead,
    root: &ContentHash,
) -> DiffResult<Vec<ContentHash>> {
    let Some(top) = index.get_node(tx, root)? else {
        if chunks.contains(tx, root)? {
            return Ok(vec![*root]);
        }
        return Err(DiffError::DanglingReference(*root));
    };

    let mut leaves = Vec::new();
    let mut stack: Vec<ContentHash> = top.into_iter().rev().collect();
    while let Some(hash) = stack.pop() {
        match index.get_node(tx, &hash)? {
            Some(children) => stack.extend(children.into_iter().rev()),
            None => leaves.push(hash),
        }
    }
    Ok(leaves)
}

struct Walk<'a, T> {
    index: &'a DocumentIndex,
    chunks: &'a ChunkStore,
    tx: &'a T,
}

impl<T: KvRead> Walk<'_, T> {
    fn expand(
        &self,
        hash: &ContentHash,
        frontier: &mut Vec<ContentHash>,
        leaves: &mut Vec<ContentHash>,
    ) -> DiffResult<()> {
        if let Some(children) = self.index.get_node(self.tx, hash)? {
            frontier.extend(children);
        } else if self.chunks.contains(self.tx, hash)? {
            leaves.push(*hash);
        } else {
            return Err(DiffError::DanglingReference(*hash));
        }
        Ok(())
    }

    /// Which of `candidates` appear as leaves under the `shared` hashes.
    /// Stops reading as soon as all of them have been found.
    fn find_shared(
        &self,
        shared: &[ContentHash],
        mut candidates: HashSet<ContentHash>,
    ) -> DiffResult<HashSet<ContentHash>> {
        let mut found = HashSet::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<ContentHash> = shared.iter().rev().copied().collect();
        while let Some(hash) = stack.pop() {
            if candidates.is_empty() {
                break;
            }
            if !visited.insert(hash) {
                continue;
            }
            match self.index.get_node(self.tx, &hash)? {
                Some(children) => stack.extend(children.into_iter().rev()),
                None => {
                    if candidates.remove(&hash) {
                        found.insert(hash);
                    }
                }
            }
        }
        Ok(found)
    }
}

fn ordered_difference(
    leaves: &[ContentHash],
    exclude: &HashSet<ContentHash>,
) -> Vec<ContentHash> {
    let mut seen = HashSet::new();
    leaves
        .iter()
        .filter(|hash| !exclude.contains(*hash) && seen.insert(**hash))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use univ_crypto::TreeLayout;
    use univ_kv::{KvDb, KvOptions, KvResult, WriteTx};
    use univ_store::ObjectCodec;

    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        db: KvDb,
        chunks: ChunkStore,
        index: DocumentIndex,
        layout: TreeLayout,
    }

    fn fixture(fanout: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db = KvDb::open(dir.path().join("diff.redb"), KvOptions::default()).unwrap();
        let codec = ObjectCodec::default();
        Fixture {
            _dir: dir,
            db,
            chunks: ChunkStore::new("chunk", codec),
            index: DocumentIndex::new("root", "tree", codec),
            layout: TreeLayout::new(fanout).unwrap(),
        }
    }

    impl Fixture {
        fn doc(&self, tx: &WriteTx, parts: &[&str]) -> (ContentHash, Vec<ContentHash>) {
            let leaves: Vec<ContentHash> = parts
                .iter()
                .map(|p| self.chunks.put(tx, p.as_bytes()).unwrap())
                .collect();
            let root = self.index.build_tree(tx, &leaves, &self.layout).unwrap();
            (root, leaves)
        }

        fn hash(&self, part: &str) -> ContentHash {
            self.chunks
                .codec()
                .hash(univ_store::ObjectKind::Chunk, part.as_bytes())
        }
    }

    fn paragraphs(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("paragraph {i}")).collect()
    }

    #[test]
    fn identical_roots_short_circuit() {
        let f = fixture(4);
        let tx = f.db.begin_write().unwrap();
        let (root, _) = f.doc(&tx, &["a", "b", "c"]);

        let diff = diff_roots(&f.index, &f.chunks, &tx, Some(&root), &root).unwrap();
        assert!(diff.roots_match());
        assert!(diff.is_empty());
        assert_eq!(diff, ChunkDiff::identical(root));
    }

    #[test]
    fn first_ingestion_adds_every_chunk_in_order() {
        let f = fixture(2);
        let tx = f.db.begin_write().unwrap();
        let (root, leaves) = f.doc(&tx, &["one", "two", "three", "two", "four"]);

        let diff = diff_roots(&f.index, &f.chunks, &tx, None, &root).unwrap();
        assert_eq!(diff.old_root, None);
        assert_eq!(diff.added, vec![leaves[0], leaves[1], leaves[2], leaves[4]]);
        assert!(diff.removed.is_empty());
        assert_eq!(diff.shared_subtrees, 0);
    }

    #[test]
    fn single_edit_prunes_untouched_subtrees() {
        let f = fixture(4);
        let tx = f.db.begin_write().unwrap();
        let before = paragraphs(40);
        let mut after = before.clone();
        after[17] = "paragraph 17, revised".to_string();

        let old: Vec<&str> = before.iter().map(String::as_str).collect();
        let new: Vec<&str> = after.iter().map(String::as_str).collect();
        let (old_root, _) = f.doc(&tx, &old);
        let (new_root, _) = f.doc(&tx, &new);

        let diff = diff_roots(&f.index, &f.chunks, &tx, Some(&old_root), &new_root).unwrap();
        assert_eq!(diff.added, vec![f.hash("paragraph 17, revised")]);
        assert_eq!(diff.removed, vec![f.hash("paragraph 17")]);
        assert!(diff.shared_subtrees > 0);
    }

    #[test]
    fn appended_chunk_is_the_only_addition() {
        let f = fixture(4);
        let tx = f.db.begin_write().unwrap();
        let (old_root, _) = f.doc(&tx, &["a", "b", "c", "d", "e"]);
        let (new_root, _) = f.doc(&tx, &["a", "b", "c", "d", "e", "f"]);

        let diff = diff_roots(&f.index, &f.chunks, &tx, Some(&old_root), &new_root).unwrap();
        assert_eq!(diff.added, vec![f.hash("f")]);
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn leaf_inside_a_shared_subtree_is_not_added() {
        let f = fixture(4);
        let tx = f.db.begin_write().unwrap();
        let (old_root, _) = f.doc(&tx, &["a", "b", "c", "d", "e", "f", "g", "h"]);
        let (new_root, _) = f.doc(&tx, &["a", "b", "c", "d", "x", "f", "g", "a"]);

        let diff = diff_roots(&f.index, &f.chunks, &tx, Some(&old_root), &new_root).unwrap();
        assert_eq!(diff.added, vec![f.hash("x")]);
        assert_eq!(diff.removed, vec![f.hash("e"), f.hash("h")]);
        assert_eq!(diff.shared_subtrees, 3);
    }

    #[test]
    fn reordering_changes_root_but_not_chunks() {
        let f = fixture(4);
        let tx = f.db.begin_write().unwrap();
        let (old_root, _) = f.doc(&tx, &["a", "b"]);
        let (new_root, _) = f.doc(&tx, &["b", "a"]);

        let diff = diff_roots(&f.index, &f.chunks, &tx, Some(&old_root), &new_root).unwrap();
        assert!(!diff.roots_match());
        assert!(diff.is_empty());
    }

    #[test]
    fn emptied_document_removes_everything() {
        let f = fixture(4);
        let tx = f.db.begin_write().unwrap();
        let (old_root, old_leaves) = f.doc(&tx, &["a", "b"]);
        let (new_root, _) = f.doc(&tx, &[]);

        let diff = diff_roots(&f.index, &f.chunks, &tx, Some(&old_root), &new_root).unwrap();
        assert!(diff.added.is_empty());
        assert_eq!(diff.removed, old_leaves);
    }

    #[test]
    fn dangling_reference_is_reported() {
        let f = fixture(4);
        let tx = f.db.begin_write().unwrap();
        let ghost = ContentHash::from_digest([0xee; 32]);
        let root = f.index.put_node(&tx, &[ghost]).unwrap();

        let err = diff_roots(&f.index, &f.chunks, &tx, None, &root).unwrap_err();
        assert!(matches!(err, DiffError::DanglingReference(h) if h == ghost));
    }

    #[test]
    fn collect_leaves_walks_in_document_order() {
        let f = fixture(2);
        let tx = f.db.begin_write().unwrap();
        let parts = paragraphs(9);
        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        let (root, leaves) = f.doc(&tx, &refs);

        assert_eq!(collect_leaves(&f.index, &f.chunks, &tx, &root).unwrap(), leaves);

        let (empty, _) = f.doc(&tx, &[]);
        assert!(collect_leaves(&f.index, &f.chunks, &tx, &empty).unwrap().is_empty());

        let unknown = ContentHash::from_digest([1; 32]);
        assert!(matches!(
            collect_leaves(&f.index, &f.chunks, &tx, &unknown),
            Err(DiffError::DanglingReference(_))
        ));
    }

    #[test]
    fn chunk_root_is_a_one_chunk_document() {
        let f = fixture(4);
        let tx = f.db.begin_write().unwrap();
        let solo = f.chunks.put(&tx, b"solo").unwrap();

        assert_eq!(collect_leaves(&f.index, &f.chunks, &tx, &solo).unwrap(), vec![solo]);

        let (root, _) = f.doc(&tx, &["solo"]);
        let walked = diff_roots(&f.index, &f.chunks, &tx, Some(&solo), &root).unwrap();
        assert!(walked.is_empty());
    }

    struct Recording<'a> {
        tx: &'a WriteTx,
        reads: RefCell<Vec<String>>,
    }

    impl KvRead for Recording<'_> {
        fn get(&self, bucket: &str, key: &str) -> KvResult<Option<Vec<u8>>> {
            self.reads.borrow_mut().push(key.to_string());
            self.tx.get(bucket, key)
        }

        fn bucket_exists(&self, bucket: &str) -> KvResult<bool> {
            self.tx.bucket_exists(bucket)
        }

        fn buckets(&self) -> KvResult<Vec<String>> {
            self.tx.buckets()
        }

        fn key_page(&self, bucket: &str, after: Option<&str>, limit: usize) -> KvResult<Vec<String>> {
            self.tx.key_page(bucket, after, limit)
        }

        fn page_size(&self) -> usize {
            self.tx.page_size()
        }
    }

    #[test]
    fn shared_search_stops_once_candidates_are_found() {
        let f = fixture(2);
        let tx = f.db.begin_write().unwrap();
        let (old_root, _) = f.doc(&tx, &["a", "b", "c", "d", "e", "f", "g"]);
        let (new_root, _) = f.doc(&tx, &["a", "b", "c", "d", "e", "f", "g", "a"]);

        let recording = Recording {
            tx: &tx,
            reads: RefCell::new(Vec::new()),
        };
        let diff = diff_roots(&f.index, &f.chunks, &recording, Some(&old_root), &new_root).unwrap();
        assert!(diff.is_empty());
        assert_eq!(diff.shared_subtrees, 3);

        // "a" is found under the first shared subtree, so the (c, d) node is never read.
        let cd = f.index.node_hash(&[f.hash("c"), f.hash("d")]);
        assert!(!recording.reads.borrow().contains(&cd.to_hex()));
    }

    #[test]
    fn from_leaves_matches_the_walk() {
        let f = fixture(3);
        let tx = f.db.begin_write().unwrap();
        let (old_root, old_leaves) = f.doc(&tx, &["a", "b", "c", "d"]);
        let (new_root, new_leaves) = f.doc(&tx, &["a", "z", "c", "d", "d"]);

        let walked = diff_roots(&f.index, &f.chunks, &tx, Some(&old_root), &new_root).unwrap();
        let flat = ChunkDiff::from_leaves(Some(old_root), new_root, &old_leaves, &new_leaves);
        assert_eq!(walked.added, flat.added);
        assert_eq!(walked.removed, flat.removed);
        assert_eq!(flat.added, vec![f.hash("z")]);
        assert_eq!(flat.removed, vec![f.hash("b")]);
    }
}
