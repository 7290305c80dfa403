//! Full repack: rewrite the whole pack set into a single fresh pack, with
//! delta selection, then retire the packs and loose objects it replaces.

use std::collections::HashMap;
use std::path::PathBuf;

use git_hash::ObjectId;
use git_object::ObjectType;
use git_pack::delta::select::{find_best_delta, DeltaCandidate, DeltaSelectConfig};
use git_pack::pack::PackFile;
use git_pack::write::{build_pack_index, PackWriter};
use git_ref::{RefStore, Reference};
use git_repository::Repository;

use crate::{GcConfig, GcError};

/// Outcome of a full repack run.
#[derive(Debug, Clone, Default)]
pub struct RepackReport {
    /// False if the repack was skipped (nothing to do, or the min-interval
    /// cooldown hadn't elapsed — see `GcController::full_repack`).
    pub ran: bool,
    pub objects_packed: usize,
    pub objects_deltified: usize,
    pub pack_path: Option<PathBuf>,
    pub old_packs_removed: usize,
}

/// How many previously-written objects of the same type are kept as delta
/// base candidates for the next object. Bounds repack cost; mirrors git's
/// `pack.window`.
const DELTA_WINDOW: usize = 32;

fn type_rank(t: ObjectType) -> u8 {
    match t {
        ObjectType::Commit => 0,
        ObjectType::Tree => 1,
        ObjectType::Blob => 2,
        ObjectType::Tag => 3,
    }
}

#[tracing::instrument(level = "debug", skip_all)]
pub fn full_repack(repo: &Repository, cfg: &GcConfig) -> Result<RepackReport, GcError> {
    let objects_dir = repo.odb().objects_dir().to_path_buf();
    let pack_dir = objects_dir.join("pack");
    std::fs::create_dir_all(&pack_dir)?;

    let old_pack_files = existing_pack_files(&pack_dir)?;

    let tips = ref_tips(repo)?;
    let mut oids: Vec<ObjectId> = git_revwalk::list_objects(repo, &tips, &[], None)?
        .into_iter()
        .collect();
    oids.sort();
    oids.dedup();

    if oids.is_empty() {
        tracing::debug!("full_repack: nothing to repack");
        return Ok(RepackReport::default());
    }
    tracing::info!(
        object_count = oids.len(),
        existing_packs = old_pack_files.len(),
        "full_repack: starting"
    );

    // Load every object's full content up front. This is a full repack: it
    // always re-derives fresh deltas, so any object that used to live at a
    // chain depth beyond `max_chain_depth` is implicitly undeltified simply
    // by being read back to its full bytes here.
    let mut objs: Vec<(ObjectId, ObjectType, Vec<u8>)> = Vec::with_capacity(oids.len());
    for oid in &oids {
        let obj = repo
            .odb()
            .read(oid)?
            .ok_or(git_odb::OdbError::NotFound(*oid))?;
        let data = obj.serialize_content();
        objs.push((*oid, obj.object_type(), data));
    }

    // Group by type, then largest-first within a type: similar objects end
    // up near each other, which is what makes windowed delta search useful.
    objs.sort_by(|a, b| type_rank(a.1).cmp(&type_rank(b.1)).then(b.2.len().cmp(&a.2.len())));

    let tmp_pack = pack_dir.join(format!("tmp_repack_{}.pack", std::process::id()));
    let _guard = TmpPackGuard::new(&tmp_pack);

    let select_cfg = DeltaSelectConfig {
        ratio_threshold: cfg.delta_ratio_threshold,
        max_chain_depth: cfg.max_chain_depth,
        ..DeltaSelectConfig::default()
    };

    let mut writer = PackWriter::new(&tmp_pack)?;
    let mut offsets: HashMap<ObjectId, u64> = HashMap::with_capacity(objs.len());
    let mut data_by_oid: HashMap<ObjectId, &[u8]> = HashMap::with_capacity(objs.len());
    let mut windows: HashMap<ObjectType, Vec<DeltaCandidate>> = HashMap::new();
    let mut deltified = 0usize;

    for (index, (oid, obj_type, data)) in objs.iter().enumerate() {
        data_by_oid.insert(*oid, data.as_slice());

        let window = windows.entry(*obj_type).or_default();
        let selected = if window.is_empty() {
            None
        } else {
            find_best_delta(*obj_type, data, window.as_slice(), &select_cfg, |base_oid| {
                data_by_oid.get(base_oid).map(|d| d.to_vec())
            })
        };

        let offset = writer.current_position();
        let chain_depth = match &selected {
            Some(sel) => {
                let base_offset = *offsets.get(&sel.base_oid).expect("candidate was already written");
                writer.add_ofs_delta(base_offset, *oid, &sel.delta_bytes)?;
                deltified += 1;
                sel.chain_depth
            }
            None => {
                writer.add_object(*obj_type, data)?;
                0
            }
        };

        offsets.insert(*oid, offset);

        window.push(DeltaCandidate {
            oid: *oid,
            obj_type: *obj_type,
            data_len: data.len(),
            chain_depth,
            recency: index as u64,
        });
        if window.len() > DELTA_WINDOW {
            window.remove(0);
        }
    }

    let mut entries: Vec<(ObjectId, u64, u32)> = writer
        .entries()
        .map(|(oid, off, crc)| (*oid, off, crc))
        .collect();
    let (tmp_pack_path, checksum) = writer.finish()?;

    // Chain-depth enforcement: a violation here is a bug in the selection
    // above, not a recoverable condition. Abort before anything is installed.
    let verify_pack = PackFile::open(&tmp_pack_path)?;
    for oid in &oids {
        let depth = verify_pack.chain_depth(oid)?;
        if depth > cfg.max_chain_depth {
            return Err(GcError::ChainDepthExceeded {
                oid: *oid,
                actual: depth,
                max: cfg.max_chain_depth,
            });
        }
    }
    drop(verify_pack);

    let final_pack = pack_dir.join(format!("pack-{}.pack", checksum.to_hex()));
    let final_idx = pack_dir.join(format!("pack-{}.idx", checksum.to_hex()));
    build_pack_index(&final_idx, &mut entries, &checksum)?;
    std::fs::rename(&tmp_pack_path, &final_pack)?;

    repo.odb().refresh()?;

    let mut old_packs_removed = 0;
    for path in &old_pack_files {
        if *path == final_pack {
            continue;
        }
        if std::fs::remove_file(path).is_ok() {
            old_packs_removed += 1;
        }
        let _ = std::fs::remove_file(path.with_extension("idx"));
    }

    if cfg.prune_loose {
        let loose = repo.odb().loose();
        for oid in &oids {
            loose.delete(oid)?;
        }
    }

    tracing::info!(
        pack = %final_pack.display(),
        deltified,
        old_packs_removed,
        "full_repack: finished"
    );
    Ok(RepackReport {
        ran: true,
        objects_packed: oids.len(),
        objects_deltified: deltified,
        pack_path: Some(final_pack),
        old_packs_removed,
    })
}

/// Every OID directly pointed at by a ref, plus HEAD for the detached case.
/// Symbolic refs are skipped: whatever they resolve to is already walked
/// under its own name (or, for a dangling symbolic ref, contributes nothing).
fn ref_tips(repo: &Repository) -> Result<Vec<ObjectId>, GcError> {
    let mut tips = Vec::new();
    for reference in repo.refs().iter(Some("refs/"))? {
        if let Reference::Direct { target, .. } = reference? {
            tips.push(target);
        }
    }
    if let Some(head) = repo.head_oid()? {
        tips.push(head);
    }
    tips.sort();
    tips.dedup();
    Ok(tips)
}

/// All `.pack` files currently in the pack directory (not `.idx`/`.bitmap`
/// siblings, which are removed alongside their `.pack`).
fn existing_pack_files(pack_dir: &std::path::Path) -> std::io::Result<Vec<PathBuf>> {
    let mut packs = Vec::new();
    if pack_dir.is_dir() {
        for entry in std::fs::read_dir(pack_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "pack") {
                packs.push(path);
            }
        }
    }
    Ok(packs)
}

struct TmpPackGuard<'a> {
    path: &'a std::path::Path,
}

impl<'a> TmpPackGuard<'a> {
    fn new(path: &'a std::path::Path) -> Self {
        Self { path }
    }
}

impl Drop for TmpPackGuard<'_> {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(self.path);
    }
}
