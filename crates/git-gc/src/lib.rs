//! Garbage collection and repack controller.
//!
//! Owns the object-store housekeeping operations that sit above the raw
//! pack/loose primitives in `git-pack` and `git-loose`: sweeping loose
//! objects into a quick pack, a full repack that rewrites the whole pack
//! set with fresh deltification, reachability-driven pruning of loose
//! objects, and the chain-depth invariant a repack must uphold before its
//! output is allowed to replace the previous pack set.

mod prune;
mod quick_pack;
mod repack;

pub use prune::{prune, PruneReport};
pub use quick_pack::{quick_pack, QuickPackReport};
pub use repack::{full_repack, RepackReport};

use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use git_hash::ObjectId;

/// Errors produced by GC operations.
#[derive(Debug, thiserror::Error)]
pub enum GcError {
    #[error("chain depth {actual} exceeds configured maximum {max} for object {oid}")]
    ChainDepthExceeded {
        oid: ObjectId,
        actual: u32,
        max: u32,
    },

    #[error("another GC operation is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Odb(#[from] git_odb::OdbError),

    #[error(transparent)]
    Loose(#[from] git_loose::LooseError),

    #[error(transparent)]
    Pack(#[from] git_pack::PackError),

    #[error(transparent)]
    Ref(#[from] git_ref::RefError),

    #[error(transparent)]
    RevWalk(#[from] git_revwalk::RevWalkError),

    #[error(transparent)]
    Repo(#[from] git_repository::RepoError),

    #[error(transparent)]
    Hash(#[from] git_hash::HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Knobs governing GC behavior. Defaults match the stated defaults of the
/// system this crate implements.
#[derive(Debug, Clone, Copy)]
pub struct GcConfig {
    /// Delta chain length invariant enforced after every repack.
    pub max_chain_depth: u32,
    /// A produced delta must be smaller than `target_size * delta_ratio_threshold`.
    pub delta_ratio_threshold: f64,
    /// Full repack triggers once loose-object count reaches this.
    pub loose_threshold: usize,
    /// Minimum time between full repacks.
    pub min_interval: Duration,
    /// Grace period: an object younger than this is never pruned or swept,
    /// to avoid racing a concurrent writer that hasn't yet linked it from a ref.
    pub grace_period: Duration,
    /// Remove loose copies of objects that a repack/quick-pack just packed.
    pub prune_loose: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: 50,
            delta_ratio_threshold: 0.5,
            loose_threshold: 100,
            min_interval: Duration::from_secs(60),
            grace_period: Duration::from_secs(2 * 60 * 60),
            prune_loose: true,
        }
    }
}

/// Coordinates GC operations against a single repository: enforces the
/// GC-exclusion lock (at most one full repack or prune at a time) and the
/// `min_interval` cooldown between full repacks.
pub struct GcController {
    config: GcConfig,
    exclusion: Mutex<()>,
    last_full_repack: Mutex<Option<SystemTime>>,
}

impl GcController {
    pub fn new(config: GcConfig) -> Self {
        Self {
            config,
            exclusion: Mutex::new(()),
            last_full_repack: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Quick pack: sweep loose objects into a single new pack without
    /// touching the existing pack set. Does not require the exclusion lock
    /// since it never rewrites or removes an existing pack.
    pub fn quick_pack(
        &self,
        repo: &git_repository::Repository,
    ) -> Result<QuickPackReport, GcError> {
        quick_pack::quick_pack(repo, &self.config)
    }

    /// Full repack, gated by the exclusion lock and the min-interval cooldown.
    /// Returns `AlreadyRunning` if a repack or prune is already in progress.
    pub fn full_repack(
        &self,
        repo: &git_repository::Repository,
    ) -> Result<RepackReport, GcError> {
        let _guard = self.exclusion.try_lock().map_err(|_| GcError::AlreadyRunning)?;

        {
            let mut last = self.last_full_repack.lock().unwrap();
            if let Some(last_run) = *last {
                if last_run.elapsed().unwrap_or_default() < self.config.min_interval {
                    return Ok(RepackReport {
                        ran: false,
                        ..RepackReport::default()
                    });
                }
            }
            let report = repack::full_repack(repo, &self.config)?;
            *last = Some(SystemTime::now());
            return Ok(report);
        }
    }

    /// Reachability prune, gated by the exclusion lock.
    pub fn prune(
        &self,
        repo: &git_repository::Repository,
        roots: &[ObjectId],
    ) -> Result<PruneReport, GcError> {
        let _guard = self.exclusion.try_lock().map_err(|_| GcError::AlreadyRunning)?;
        prune::prune(repo, roots, &self.config)
    }

    /// Whether a full repack should run now, per the loose-object-count and
    /// chain-depth triggers.
    pub fn should_repack(&self, loose_object_count: usize, any_chain_exceeds_max: bool) -> bool {
        loose_object_count >= self.config.loose_threshold || any_chain_exceeds_max
    }
}
