//! Index entry types: `IndexEntry`, `StatData`, `EntryFlags`, `Stage`.

use bstr::BString;
use git_hash::ObjectId;
use git_object::FileMode;

/// Merge stage of an index entry. Stage 0 is the normal, unconflicted
/// entry; stages 1-3 hold the three sides of an unresolved merge conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Normal = 0,
    Base = 1,
    Ours = 2,
    Theirs = 3,
}

impl Stage {
    pub fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0 => Self::Normal,
            1 => Self::Base,
            2 => Self::Ours,
            _ => Self::Theirs,
        }
    }

    pub fn to_bits(self) -> u16 {
        self as u16
    }
}

/// Flags packed into an entry's 16-bit flags field: assume-valid, the
/// extended bit, the stage, and the (possibly truncated) path name length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryFlags {
    pub assume_valid: bool,
    pub skip_worktree: bool,
    pub intent_to_add: bool,
}

/// File system stat data cached in the index, used to cheaply detect
/// whether a working-tree file has changed without rehashing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatData {
    pub ctime_secs: u32,
    pub ctime_nsecs: u32,
    pub mtime_secs: u32,
    pub mtime_nsecs: u32,
    pub dev: u32,
    pub ino: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
}

/// A single staged entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Path relative to the repository root, using `/` separators.
    pub path: BString,
    /// Object ID of the blob (or gitlink commit, for submodules).
    pub oid: ObjectId,
    /// File mode as recorded in the tree this entry will produce.
    pub mode: FileMode,
    /// Merge stage.
    pub stage: Stage,
    /// Cached stat data from the file system at staging time.
    pub stat: StatData,
    /// Packed entry flags.
    pub flags: EntryFlags,
}
