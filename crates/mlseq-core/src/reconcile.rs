//! Carrying converted chunks across re-segmentation.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::chunk::Chunk;

/// Merges a fresh segmentation with the chunks it replaces.
///
/// Each new chunk whose content hash matches an old chunk is replaced by that
/// old chunk, moved to the new chunk's start tick, so its cached audio and
/// fetch state survive. Old chunks sharing a hash are matched in order. Old
/// chunks left unmatched are destroyed.
pub fn replace_chunks(old_chunks: Vec<Chunk>, new_chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut by_hash: HashMap<String, VecDeque<Chunk>> = HashMap::new();
    for chunk in old_chunks {
        by_hash
            .entry(chunk.hash().to_string())
            .or_default()
            .push_back(chunk);
    }

    let mut reused = 0usize;
    let merged: Vec<Chunk> = new_chunks
        .into_iter()
        .map(|fresh| {
            match by_hash.get_mut(fresh.hash()).and_then(VecDeque::pop_front) {
                Some(existing) => {
                    existing.set_start_tick(fresh.start_tick());
                    reused += 1;
                    existing
                }
                None => fresh,
            }
        })
        .collect();

    let mut destroyed = 0usize;
    for chunk in by_hash.into_values().flatten() {
        chunk.destroy();
        destroyed += 1;
    }

    debug!(
        chunks = merged.len(),
        reused,
        destroyed,
        "reconciled chunks"
    );
    merged
}
