//! Reachability prune: delete loose objects that are not reachable from a
//! set of ref roots and old enough to not be racing a concurrent writer.
//!
//! Packed objects are never deleted individually here — an unreachable
//! object trapped inside a pack is dropped the next time a full repack
//! rewrites that pack, since repack enumerates only the reachable set.
//! This mirrors `git prune`, which only ever touches loose objects; the
//! combination of prune + repack is what fully reclaims packed garbage.

use std::collections::HashSet;
use std::time::SystemTime;

use git_hash::ObjectId;
use git_repository::Repository;
use git_revwalk::list_objects;

use crate::{GcConfig, GcError};

/// Outcome of a reachability prune run.
#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    pub reachable: usize,
    pub deleted: usize,
    /// Unreachable objects left alone because they live in a pack, not
    /// loose, or are younger than the grace period.
    pub retained: usize,
}

#[tracing::instrument(level = "debug", skip_all)]
pub fn prune(
    repo: &Repository,
    roots: &[ObjectId],
    cfg: &GcConfig,
) -> Result<PruneReport, GcError> {
    let reachable: HashSet<ObjectId> = list_objects(repo, roots, &[], None)?
        .into_iter()
        .collect();
    tracing::debug!(reachable = reachable.len(), roots = roots.len(), "prune: reachability computed");

    let all: Vec<ObjectId> = repo
        .odb()
        .iter_all_oids()?
        .collect::<Result<Vec<_>, _>>()?;

    let loose = repo.odb().loose();
    let now = SystemTime::now();
    let mut deleted = 0usize;
    let mut retained = 0usize;

    for oid in all {
        if reachable.contains(&oid) {
            continue;
        }
        if !loose.contains(&oid) {
            // Lives only in a pack; repack is responsible for dropping it.
            retained += 1;
            continue;
        }
        let old_enough = match loose.mtime(&oid)? {
            Some(mtime) => now.duration_since(mtime).unwrap_or_default() >= cfg.grace_period,
            None => true,
        };
        if !old_enough {
            retained += 1;
            continue;
        }
        if loose.delete(&oid)? {
            deleted += 1;
        }
    }

    repo.odb().refresh()?;

    tracing::info!(deleted, retained, "prune: finished");
    Ok(PruneReport {
        reachable: reachable.len(),
        deleted,
        retained,
    })
}
