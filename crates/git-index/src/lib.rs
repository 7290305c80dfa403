//! The git index (staging area) binary file format.
//!
//! This crate owns only the on-disk encoding of `.git/index`: the `DIRC`
//! header, the sorted entry table, and the trailing SHA-1 checksum. It
//! reads and writes the entry table faithfully (including round-tripping
//! unrecognized extensions as opaque blobs) but does not implement the
//! working-tree comparison, staging, or merge-conflict-resolution logic
//! that sits on top of it elsewhere in a full git implementation — that
//! remains an external collaborator's concern.

mod entry;
mod read;
mod write;

pub use entry::{EntryFlags, IndexEntry, Stage, StatData};

use std::path::Path;

use bstr::{BString, ByteSlice};

pub use error::IndexError;

mod error {
    #[derive(Debug, thiserror::Error)]
    pub enum IndexError {
        #[error("invalid index header: {0}")]
        InvalidHeader(String),

        #[error("unsupported index version: {0}")]
        UnsupportedVersion(u32),

        #[error("index checksum mismatch")]
        ChecksumMismatch,

        #[error("invalid index entry at offset {offset}: {reason}")]
        InvalidEntry { offset: usize, reason: String },

        #[error(transparent)]
        Hash(#[from] git_hash::HashError),

        #[error(transparent)]
        Object(#[from] git_object::ObjectError),

        #[error(transparent)]
        Io(#[from] std::io::Error),
    }
}

/// An opaque, unrecognized index extension, preserved byte-for-byte so a
/// round-trip (read then write) never silently drops extension data this
/// crate doesn't interpret (e.g. `TREE`, `REUC`, `UNTR`).
#[derive(Debug, Clone)]
pub struct RawExtension {
    pub signature: [u8; 4],
    pub data: Vec<u8>,
}

/// The in-memory index: a sorted entry table plus any extensions carried
/// through unmodified.
#[derive(Debug, Clone)]
pub struct Index {
    version: u32,
    entries: Vec<IndexEntry>,
    extensions: Vec<RawExtension>,
}

impl Index {
    /// An empty index at the default (version 2) format.
    pub fn new() -> Self {
        Self {
            version: 2,
            entries: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Read an index file from disk.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let bytes = std::fs::read(path)?;
        read::parse(&bytes)
    }

    /// Write the index to disk via the lockfile discipline (temp file in
    /// the same directory, then rename into place) so a reader never
    /// observes a partially written index.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        let path = path.as_ref();
        let bytes = write::serialize(self)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let tmp = dir.join(format!(
            "index.lock.{}.tmp",
            std::process::id()
        ));
        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Format version (2, 3, or 4 on read; this crate always writes 2).
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Entries in sorted (path, stage) order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Extensions carried through from the file this index was read from.
    pub fn extensions(&self) -> &[RawExtension] {
        &self.extensions
    }

    /// Number of staged entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a single entry at stage 0 by path.
    pub fn get(&self, path: &[u8]) -> Option<&IndexEntry> {
        self.entries
            .iter()
            .find(|e| e.path.as_bytes() == path && e.stage == Stage::Normal)
    }

    /// Insert or replace an entry, keeping the table sorted by `(path, stage)`
    /// as the on-disk format requires.
    pub fn upsert(&mut self, entry: IndexEntry) {
        match self.entries.binary_search_by(|e| {
            (e.path.as_bytes(), e.stage).cmp(&(entry.path.as_bytes(), entry.stage))
        }) {
            Ok(idx) => self.entries[idx] = entry,
            Err(idx) => self.entries.insert(idx, entry),
        }
    }

    /// Remove all stages of an entry at `path`. Returns whether anything was removed.
    pub fn remove(&mut self, path: &[u8]) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.path.as_bytes() != path);
        before != self.entries.len()
    }

    /// Paths with a conflict (more than one non-zero stage present).
    pub fn conflicted_paths(&self) -> Vec<BString> {
        let mut paths: Vec<BString> = self
            .entries
            .iter()
            .filter(|e| e.stage != Stage::Normal)
            .map(|e| e.path.clone())
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entry::StatData;
    use git_hash::ObjectId;
    use git_object::FileMode;

    fn entry(path: &str, oid_byte: u8) -> IndexEntry {
        IndexEntry {
            path: BString::from(path),
            oid: ObjectId::from_bytes(&[oid_byte; 20], git_hash::HashAlgorithm::Sha1).unwrap(),
            mode: FileMode::Regular,
            stage: Stage::Normal,
            stat: StatData::default(),
            flags: EntryFlags::default(),
        }
    }

    #[test]
    fn new_index_is_empty() {
        let idx = Index::new();
        assert!(idx.is_empty());
        assert_eq!(idx.version(), 2);
    }

    #[test]
    fn upsert_keeps_sorted_order() {
        let mut idx = Index::new();
        idx.upsert(entry("b.txt", 2));
        idx.upsert(entry("a.txt", 1));
        idx.upsert(entry("c.txt", 3));

        let paths: Vec<BString> = idx.entries().iter().map(|e| e.path.clone()).collect();
        assert_eq!(
            paths,
            vec![BString::from("a.txt"), BString::from("b.txt"), BString::from("c.txt")]
        );
    }

    #[test]
    fn upsert_replaces_existing_entry() {
        let mut idx = Index::new();
        idx.upsert(entry("a.txt", 1));
        idx.upsert(entry("a.txt", 9));
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.entries()[0].oid.as_bytes()[0], 9);
    }

    #[test]
    fn remove_drops_all_stages() {
        let mut idx = Index::new();
        let mut conflicted = entry("a.txt", 1);
        conflicted.stage = Stage::Ours;
        idx.upsert(entry("a.txt", 1));
        idx.upsert(conflicted);
        assert_eq!(idx.len(), 2);
        assert!(idx.remove(b"a.txt"));
        assert!(idx.is_empty());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index");

        let mut idx = Index::new();
        idx.upsert(entry("a.txt", 1));
        idx.upsert(entry("dir/b.txt", 2));
        idx.write_to(&path).unwrap();

        let read_back = Index::read_from(&path).unwrap();
        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back.entries()[0].path, BString::from("a.txt"));
        assert_eq!(read_back.entries()[1].path, BString::from("dir/b.txt"));
        assert_eq!(read_back.entries()[0].oid, idx.entries()[0].oid);
    }

    #[test]
    fn conflicted_paths_reports_only_non_normal_stages() {
        let mut idx = Index::new();
        idx.upsert(entry("clean.txt", 1));
        let mut ours = entry("conflict.txt", 2);
        ours.stage = Stage::Ours;
        idx.upsert(ours);
        assert_eq!(idx.conflicted_paths(), vec![BString::from("conflict.txt")]);
    }
}
