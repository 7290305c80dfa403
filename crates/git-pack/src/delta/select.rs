//! Delta candidate selection: decide which base (if any) best deltifies a
//! target object.
//!
//! This is the decision surface used by pack writing and repack: given a
//! target object and a pool of candidate bases (already placed in the
//! pack being built, or already resolvable by the caller), pick the base
//! that yields the largest byte savings without the chain growing past
//! the configured depth limit.

use git_hash::ObjectId;
use git_object::ObjectType;

use super::compute::compute_delta;

/// A candidate base object considered for deltifying some target.
#[derive(Debug, Clone)]
pub struct DeltaCandidate {
    pub oid: ObjectId,
    pub obj_type: ObjectType,
    pub data_len: usize,
    /// Number of delta hops from this candidate to its own full-object base.
    /// Zero for a full (non-delta) object.
    pub chain_depth: u32,
    /// Higher is more recently added; used as a tiebreaker so chains stay
    /// anchored to newer objects (shallower future chains).
    pub recency: u64,
}

/// Knobs controlling candidate selection and acceptance.
#[derive(Debug, Clone, Copy)]
pub struct DeltaSelectConfig {
    /// A delta is only accepted if `delta_len < target_len * ratio_threshold`.
    pub ratio_threshold: f64,
    /// Candidates whose size differs from the target by more than this
    /// fraction of the larger size are skipped outright.
    pub size_tolerance: f64,
    /// Maximum delta chain depth a produced delta may extend to
    /// (`candidate.chain_depth + 1`).
    pub max_chain_depth: u32,
    /// Largest candidate pool examined per target (bounds search cost).
    pub max_candidates: usize,
}

impl Default for DeltaSelectConfig {
    fn default() -> Self {
        Self {
            ratio_threshold: 0.5,
            size_tolerance: 0.5,
            max_chain_depth: 50,
            max_candidates: 64,
        }
    }
}

/// The chosen delta for a target, along with accounting used by the caller
/// to decide whether to actually store a delta or fall back to a full object.
#[derive(Debug, Clone)]
pub struct SelectedDelta {
    pub base_oid: ObjectId,
    pub delta_bytes: Vec<u8>,
    pub savings: usize,
    pub chain_depth: u32,
}

/// Score a candidate purely by size similarity: `1 - |Δsize| / max(sizes)`.
/// Callers combine this with type-restriction (same `ObjectType`) and a
/// recency tiebreak before calling [`find_best_delta`].
fn similarity_score(target_len: usize, candidate_len: usize) -> f64 {
    let max = target_len.max(candidate_len).max(1) as f64;
    let diff = (target_len as i64 - candidate_len as i64).unsigned_abs() as f64;
    1.0 - diff / max
}

/// Given a target object and a pool of same-typed candidates, find the
/// candidate that yields the best delta, or `None` if no candidate improves
/// on storing the object in full.
///
/// `fetch_data` resolves a candidate's full content on demand; candidates
/// are only materialized (and thus only pay decompression cost) when they
/// survive the cheap size/type/recency pre-filter.
pub fn find_best_delta(
    target_type: ObjectType,
    target_data: &[u8],
    candidates: &[DeltaCandidate],
    cfg: &DeltaSelectConfig,
    mut fetch_data: impl FnMut(&ObjectId) -> Option<Vec<u8>>,
) -> Option<SelectedDelta> {
    let target_len = target_data.len();

    // Type-restricted, size-similarity-ranked, recency-tiebroken, chain-depth
    // aware candidate ordering. Computed lazily: only the highest-scoring
    // `max_candidates` are ever asked to materialize their content.
    let mut ranked: Vec<&DeltaCandidate> = candidates
        .iter()
        .filter(|c| c.obj_type == target_type)
        .filter(|c| c.chain_depth + 1 <= cfg.max_chain_depth)
        .filter(|c| {
            let max = target_len.max(c.data_len).max(1) as f64;
            let diff = (target_len as i64 - c.data_len as i64).unsigned_abs() as f64;
            diff / max <= cfg.size_tolerance
        })
        .collect();

    ranked.sort_by(|a, b| {
        let score_a = similarity_score(target_len, a.data_len);
        let score_b = similarity_score(target_len, b.data_len);
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.recency.cmp(&a.recency))
    });
    ranked.truncate(cfg.max_candidates);

    let mut best: Option<SelectedDelta> = None;

    for candidate in ranked {
        let Some(base_data) = fetch_data(&candidate.oid) else {
            continue;
        };

        let delta = compute_delta(&base_data, target_data);
        if (delta.len() as f64) >= target_len as f64 * cfg.ratio_threshold {
            continue;
        }

        let savings = target_len.saturating_sub(delta.len());
        let chain_depth = candidate.chain_depth + 1;

        let better = match &best {
            None => true,
            Some(current) => {
                savings > current.savings
                    || (savings == current.savings && chain_depth < current.chain_depth)
            }
        };

        if better {
            best = Some(SelectedDelta {
                base_oid: candidate.oid,
                delta_bytes: delta,
                savings,
                chain_depth,
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(oid_byte: u8, obj_type: ObjectType, len: usize, depth: u32, recency: u64) -> DeltaCandidate {
        DeltaCandidate {
            oid: ObjectId::from_bytes(&[oid_byte; 20], git_hash::HashAlgorithm::Sha1).unwrap(),
            obj_type,
            data_len: len,
            chain_depth: depth,
            recency,
        }
    }

    #[test]
    fn picks_the_closest_sized_same_type_candidate() {
        let target: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();
        let mut near = target.clone();
        near[500] = 0xAA;
        near[501] = 0xBB;

        let far = vec![0u8; 1024];

        let candidates = vec![
            candidate(1, ObjectType::Blob, far.len(), 0, 1),
            candidate(2, ObjectType::Blob, near.len(), 0, 2),
            candidate(3, ObjectType::Tree, near.len(), 0, 3),
        ];

        let data_by_oid = |oid: &ObjectId| {
            if oid.as_bytes()[0] == 1 {
                Some(far.clone())
            } else if oid.as_bytes()[0] == 2 {
                Some(near.clone())
            } else {
                Some(vec![1u8; near.len()])
            }
        };

        let selected = find_best_delta(
            ObjectType::Blob,
            &target,
            &candidates,
            &DeltaSelectConfig::default(),
            data_by_oid,
        )
        .expect("a delta should be found");

        assert_eq!(selected.base_oid.as_bytes()[0], 2);
        assert!(selected.delta_bytes.len() < target.len());
    }

    #[test]
    fn rejects_candidates_that_exceed_the_chain_depth_budget() {
        let target = vec![7u8; 200];
        let candidates = vec![candidate(9, ObjectType::Blob, 200, 50, 1)];
        let cfg = DeltaSelectConfig {
            max_chain_depth: 50,
            ..Default::default()
        };

        let selected = find_best_delta(ObjectType::Blob, &target, &candidates, &cfg, |_| {
            Some(vec![7u8; 200])
        });

        assert!(selected.is_none());
    }

    #[test]
    fn rejects_a_delta_with_no_real_improvement() {
        // Completely dissimilar candidate of the same size: delta should be
        // at least as large as just inserting the whole target, so it's
        // rejected by the ratio threshold.
        let target: Vec<u8> = (0..256u32).map(|i| (i % 256) as u8).collect();
        let base: Vec<u8> = (0..256u32).map(|i| ((i * 37 + 11) % 256) as u8).collect();
        let candidates = vec![candidate(5, ObjectType::Blob, base.len(), 0, 1)];

        let selected = find_best_delta(
            ObjectType::Blob,
            &target,
            &candidates,
            &DeltaSelectConfig::default(),
            |_| Some(base.clone()),
        );

        assert!(selected.is_none());
    }
}
