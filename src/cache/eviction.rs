//! Eviction Planning Module
//!
//! Ranks entries for removal by a usage-aware score and plans the two
//! eviction paths: proactive size-based eviction and blunt quota recovery.

use std::cmp::Ordering;

use crate::cache::EntryMap;

// == Candidate ==
/// One entry's ranking inputs, detached from the map so planning never
/// borrows it mutably.
struct Candidate {
    key: String,
    score: f64,
    created_at: u64,
    size_bytes: u64,
}

// == Total Size ==
/// Sum of the stored payload sizes across the namespace.
pub(crate) fn total_size(map: &EntryMap) -> u64 {
    map.values().map(|entry| entry.size_bytes).sum()
}

// == Ranking ==
/// Entries sorted evict-first: descending score, then older `created_at`
/// on ties, then key for determinism.
fn ranked(map: &EntryMap, now: u64) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = map
        .iter()
        .map(|(key, entry)| Candidate {
            key: key.clone(),
            score: entry.eviction_score(now),
            created_at: entry.created_at,
            size_bytes: entry.size_bytes,
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.key.cmp(&b.key))
    });
    candidates
}

// == Size Eviction ==
/// Keys to remove, in eviction order, until the total payload size drops
/// to `target_bytes` or below.
///
/// The target sits below the hard maximum (the headroom) so the next few
/// writes don't immediately re-trigger eviction.
pub(crate) fn plan_size_eviction(map: &EntryMap, now: u64, target_bytes: u64) -> Vec<String> {
    let mut remaining = total_size(map);
    let mut victims = Vec::new();

    for candidate in ranked(map, now) {
        if remaining <= target_bytes {
            break;
        }
        remaining -= candidate.size_bytes;
        victims.push(candidate.key);
    }
    victims
}

// == Recovery Eviction ==
/// The top `drop_fraction` of entries by count, ranked by the same score.
///
/// This is the blunt path taken when the storage layer itself rejected a
/// write: no size target, just shed enough entries to plausibly fit.
pub(crate) fn plan_recovery_eviction(map: &EntryMap, now: u64, drop_fraction: f64) -> Vec<String> {
    let drop_count = (map.len() as f64 * drop_fraction).ceil() as usize;
    ranked(map, now)
        .into_iter()
        .take(drop_count)
        .map(|candidate| candidate.key)
        .collect()
}
