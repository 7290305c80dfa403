//! Durable markers for an in-progress merge, rebase, cherry-pick, or revert.
//!
//! This crate owns only the bookkeeping files C git uses to remember that one
//! of these operations is underway — `MERGE_HEAD`, `MERGE_MSG`, `MERGE_MODE`,
//! `REBASE_HEAD`, `CHERRY_PICK_HEAD`, `REVERT_HEAD`, `ORIG_HEAD`, and a
//! `sequencer` directory for rebase's multi-commit todo list. It does not
//! execute any merge, diff, or rebase content logic; that belongs to a layer
//! above this one. All file access goes through `FilesApi`, so the same
//! tracker works against a real `.git` directory or an in-memory store.

use std::path::Path;
use std::sync::Arc;

use git_hash::{HashError, ObjectId};
use git_utils::{FilesApi, UtilError};

/// Errors produced by transformation-state bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("a {existing} is already in progress")]
    AlreadyInProgress { existing: TransformationKind },

    #[error("no {kind} is in progress")]
    NotInProgress { kind: TransformationKind },

    #[error("corrupt state file {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Io(#[from] UtilError),
}

/// Which kind of multi-step operation is in progress.
///
/// `get_state` reports at most one of these at a time, checked in this
/// priority order when more than one marker is somehow present (left behind
/// by a prior aborted operation that this crate did not clean up): rebase,
/// then merge, then cherry-pick, then revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformationKind {
    Merge,
    Rebase,
    CherryPick,
    Revert,
}

/// Priority order used by `get_state` to pick a single winner when multiple
/// marker files are present.
const PRIORITY: [TransformationKind; 4] = [
    TransformationKind::Rebase,
    TransformationKind::Merge,
    TransformationKind::CherryPick,
    TransformationKind::Revert,
];

impl std::fmt::Display for TransformationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransformationKind::Merge => "merge",
            TransformationKind::Rebase => "rebase",
            TransformationKind::CherryPick => "cherry-pick",
            TransformationKind::Revert => "revert",
        };
        f.write_str(name)
    }
}

fn head_marker(kind: TransformationKind) -> &'static str {
    match kind {
        TransformationKind::Merge => "MERGE_HEAD",
        TransformationKind::Rebase => "REBASE_HEAD",
        TransformationKind::CherryPick => "CHERRY_PICK_HEAD",
        TransformationKind::Revert => "REVERT_HEAD",
    }
}

/// Path of the message file for a kind. Merge, cherry-pick, and revert all
/// share `MERGE_MSG`, matching C git; rebase keeps its own copy inside the
/// sequencer directory since an interactive rebase edits many messages, one
/// per step, not a single one for the whole operation.
fn message_path(kind: TransformationKind) -> &'static Path {
    match kind {
        TransformationKind::Rebase => Path::new("sequencer/message"),
        _ => Path::new("MERGE_MSG"),
    }
}

const SEQUENCER_DIR: &str = "sequencer";
const ORIG_HEAD: &str = "ORIG_HEAD";
const MERGE_MODE: &str = "MERGE_MODE";

/// A snapshot of the currently in-progress operation, as reported by
/// `StateTracker::get_state`.
#[derive(Debug, Clone)]
pub struct TransformationState {
    pub kind: TransformationKind,
    /// The commit(s) the marker file names. A plain merge, cherry-pick, or
    /// revert names exactly one; an octopus merge's `MERGE_HEAD` can name
    /// several.
    pub heads: Vec<ObjectId>,
    pub message: Option<String>,
}

/// Tracks the marker files for at most one in-progress operation at a time.
pub struct StateTracker {
    files: Arc<dyn FilesApi>,
}

impl StateTracker {
    pub fn new(files: Arc<dyn FilesApi>) -> Self {
        Self { files }
    }

    /// Record that `kind` has started: `original_head` is snapshotted to
    /// `ORIG_HEAD` (C git's safety net for undoing the whole operation),
    /// `heads` is written to the kind's own marker file, and `message` (if
    /// given) seeds the message file.
    ///
    /// Fails with `AlreadyInProgress` if another kind's markers are already
    /// present; only one transformation may be in flight at a time.
    #[tracing::instrument(level = "debug", skip(self, message))]
    pub fn begin(
        &self,
        kind: TransformationKind,
        original_head: ObjectId,
        heads: &[ObjectId],
        message: Option<&str>,
    ) -> Result<(), StateError> {
        if let Some(existing) = self.get_state()? {
            return Err(StateError::AlreadyInProgress {
                existing: existing.kind,
            });
        }

        self.files
            .write_atomic(Path::new(ORIG_HEAD), format!("{original_head}\n").as_bytes())?;
        self.write_heads(kind, heads)?;

        if kind == TransformationKind::Merge {
            self.files.write_atomic(Path::new(MERGE_MODE), b"")?;
        }
        if kind == TransformationKind::Rebase {
            self.files
                .create_dir_all(Path::new(SEQUENCER_DIR))?;
            self.files.write_atomic(
                Path::new("sequencer/head"),
                format!("{original_head}\n").as_bytes(),
            )?;
        }
        if let Some(msg) = message {
            self.update_message(kind, msg)?;
        }

        tracing::info!(%kind, heads = heads.len(), "transformation state: begin");
        Ok(())
    }

    /// Overwrite the message file for an in-progress `kind`.
    pub fn update_message(&self, kind: TransformationKind, message: &str) -> Result<(), StateError> {
        self.require_in_progress(kind)?;
        self.files.write_atomic(message_path(kind), message.as_bytes())?;
        Ok(())
    }

    /// Mark `kind` as finished successfully: removes its markers (and the
    /// sequencer directory, for rebase) but leaves `ORIG_HEAD` in place,
    /// matching C git, where `ORIG_HEAD` survives as a pointer to undo the
    /// operation that just completed.
    pub fn complete(&self, kind: TransformationKind) -> Result<(), StateError> {
        self.require_in_progress(kind)?;
        self.clear_markers(kind)?;
        tracing::info!(%kind, "transformation state: complete");
        Ok(())
    }

    /// Abort `kind`: removes the same markers `complete` would. The caller
    /// is responsible for restoring HEAD (typically from `ORIG_HEAD`) and
    /// the index — this crate only owns the marker files, not the working
    /// tree or ref state.
    pub fn abort(&self, kind: TransformationKind) -> Result<(), StateError> {
        self.require_in_progress(kind)?;
        self.clear_markers(kind)?;
        tracing::info!(%kind, "transformation state: abort");
        Ok(())
    }

    /// The single active transformation, if any, per the priority order
    /// documented on `TransformationKind`.
    pub fn get_state(&self) -> Result<Option<TransformationState>, StateError> {
        for &kind in &PRIORITY {
            if let Some(state) = self.read_kind(kind)? {
                return Ok(Some(state));
            }
        }
        Ok(None)
    }

    fn require_in_progress(&self, kind: TransformationKind) -> Result<(), StateError> {
        if !self.files.exists(Path::new(head_marker(kind))) {
            return Err(StateError::NotInProgress { kind });
        }
        Ok(())
    }

    fn read_kind(&self, kind: TransformationKind) -> Result<Option<TransformationState>, StateError> {
        let marker = Path::new(head_marker(kind));
        if !self.files.exists(marker) {
            return Ok(None);
        }

        let raw = self.files.read(marker)?;
        let text = String::from_utf8(raw).map_err(|_| StateError::Corrupt {
            path: head_marker(kind).to_string(),
            reason: "not valid UTF-8".into(),
        })?;

        let mut heads = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            heads.push(ObjectId::from_hex(line)?);
        }
        if heads.is_empty() {
            return Err(StateError::Corrupt {
                path: head_marker(kind).to_string(),
                reason: "no object id found".into(),
            });
        }

        let message = if self.files.exists(message_path(kind)) {
            let raw = self.files.read(message_path(kind))?;
            Some(String::from_utf8(raw).map_err(|_| StateError::Corrupt {
                path: message_path(kind).display().to_string(),
                reason: "not valid UTF-8".into(),
            })?)
        } else {
            None
        };

        Ok(Some(TransformationState {
            kind,
            heads,
            message,
        }))
    }

    fn write_heads(&self, kind: TransformationKind, heads: &[ObjectId]) -> Result<(), StateError> {
        let body = heads
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
            + "\n";
        self.files.write_atomic(Path::new(head_marker(kind)), body.as_bytes())?;
        Ok(())
    }

    fn clear_markers(&self, kind: TransformationKind) -> Result<(), StateError> {
        self.files.remove_file(Path::new(head_marker(kind)))?;
        match kind {
            TransformationKind::Merge => {
                self.files.remove_file(Path::new("MERGE_MSG"))?;
                self.files.remove_file(Path::new(MERGE_MODE))?;
            }
            TransformationKind::CherryPick | TransformationKind::Revert => {
                self.files.remove_file(Path::new("MERGE_MSG"))?;
            }
            TransformationKind::Rebase => {
                self.files.remove_dir_all(Path::new(SEQUENCER_DIR))?;
            }
        }
        Ok(())
    }
}
