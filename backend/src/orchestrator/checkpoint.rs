//! Checkpoint - Save/Resume Simulation Tallies
//!
//! A cancelled simulation hands back a [`TallyCheckpoint`]: the raw tallies
//! of every photon that finished, plus the global photon ranges they cover.
//! Passing the checkpoint back to the scheduler runs only the missing
//! ranges. Because each photon's random stream depends only on the
//! simulation seed and its global index, and tallies combine by integer
//! addition, the resumed result is bit-identical to an uninterrupted run.
//!
//! # Critical Invariants
//!
//! - **Config Matching**: a checkpoint only resumes the descriptor it was
//!   taken from (SHA-256 over canonical JSON), under the same roulette
//! - **Range Integrity**: completed ranges are sorted, disjoint and inside
//!   `[0, photons_total)`
//! - **Shape Matching**: the stored tally has the descriptor's histogram shapes

use crate::accumulator::RawTally;
use crate::models::SimulationDescriptor;
use crate::orchestrator::error::EngineError;
use crate::transport::RouletteConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ops::Range;

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Half-open range of global photon indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhotonRange {
    pub start: u64,
    pub end: u64,
}

impl PhotonRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split off the first `n` photons; the remainder is `None` when empty
    pub fn split_at(self, n: u64) -> (PhotonRange, Option<PhotonRange>) {
        let mid = self.start.saturating_add(n).min(self.end);
        let head = PhotonRange::new(self.start, mid);
        let tail = PhotonRange::new(mid, self.end);
        (head, (!tail.is_empty()).then_some(tail))
    }
}

impl From<PhotonRange> for Range<u64> {
    fn from(range: PhotonRange) -> Self {
        range.start..range.end
    }
}

/// Sort and merge overlapping or adjacent ranges, dropping empty ones
pub fn normalize_ranges(mut ranges: Vec<PhotonRange>) -> Vec<PhotonRange> {
    ranges.retain(|r| !r.is_empty());
    ranges.sort();

    let mut merged: Vec<PhotonRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

/// Raw state of a partially completed simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallyCheckpoint {
    /// SHA256 hash of the descriptor (for validation)
    pub descriptor_hash: String,

    /// Seed of the simulation's stream family (CRITICAL for determinism)
    pub simulation_seed: u64,

    /// Photons the simulation asks for in total
    pub photons_total: u64,

    /// Roulette the finished photons ran under
    pub roulette: RouletteConfig,

    /// Normalized ranges of finished photons
    pub completed: Vec<PhotonRange>,

    /// Tallies of exactly the photons in `completed`
    pub tally: RawTally,
}

impl TallyCheckpoint {
    pub fn photons_completed(&self) -> u64 {
        self.completed.iter().map(PhotonRange::len).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.photons_completed() >= self.photons_total
    }

    /// Ranges still to run, in order
    pub fn remaining(&self) -> Vec<PhotonRange> {
        let mut gaps = Vec::new();
        let mut cursor = 0;
        for range in normalize_ranges(self.completed.clone()) {
            if range.start > cursor {
                gaps.push(PhotonRange::new(cursor, range.start.min(self.photons_total)));
            }
            cursor = cursor.max(range.end);
        }
        if cursor < self.photons_total {
            gaps.push(PhotonRange::new(cursor, self.photons_total));
        }
        gaps.retain(|r| !r.is_empty());
        gaps
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string(self)
            .map_err(|e| EngineError::Serialization(format!("Checkpoint serialization failed: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json)
            .map_err(|e| EngineError::Serialization(format!("Checkpoint deserialization failed: {}", e)))
    }
}

// ============================================================================
// Descriptor Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of a descriptor
///
/// This hash is stored in results and checkpoints and used to verify that a
/// checkpoint matches the descriptor it is resumed with.
///
/// Uses canonical JSON serialization with sorted keys so that the hash does
/// not depend on field order.
pub fn compute_descriptor_hash<T: Serialize>(descriptor: &T) -> Result<String, EngineError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(descriptor)
        .map_err(|e| EngineError::Serialization(format!("Descriptor serialization failed: {}", e)))?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> = map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value))
        .map_err(|e| EngineError::Serialization(format!("Descriptor serialization failed: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Check that `checkpoint` can resume `descriptor`
///
/// `descriptor_hash` is the hash of `descriptor` as computed by
/// [`compute_descriptor_hash`]; `roulette` is the configuration the
/// remaining photons will run under.
pub fn validate_checkpoint(
    checkpoint: &TallyCheckpoint,
    descriptor: &SimulationDescriptor,
    descriptor_hash: &str,
    roulette: &RouletteConfig,
) -> Result<(), EngineError> {
    // 1. Config matching
    if checkpoint.descriptor_hash != descriptor_hash {
        return Err(EngineError::CheckpointMismatch(format!(
            "descriptor hash {} does not match {}",
            checkpoint.descriptor_hash, descriptor_hash
        )));
    }
    if checkpoint.roulette != *roulette {
        return Err(EngineError::CheckpointMismatch(format!(
            "checkpoint ran under roulette {:?}, resume asks for {:?}",
            checkpoint.roulette, roulette
        )));
    }
    if checkpoint.photons_total != descriptor.photons {
        return Err(EngineError::CheckpointMismatch(format!(
            "checkpoint covers {} photons, descriptor asks for {}",
            checkpoint.photons_total, descriptor.photons
        )));
    }

    // 2. Range integrity
    let mut previous_end = 0;
    for (i, range) in checkpoint.completed.iter().enumerate() {
        if range.is_empty() || range.end > checkpoint.photons_total || (i > 0 && range.start < previous_end) {
            return Err(EngineError::CheckpointMismatch(format!(
                "invalid completed range {}..{}",
                range.start, range.end
            )));
        }
        previous_end = range.end;
    }

    // 3. Shape matching
    let tally = &checkpoint.tally;
    let grid = &descriptor.grid;
    let absorption_ok = match &tally.absorption {
        Some(cells) => descriptor.record_absorption && cells.len() == grid.rz_len(),
        None => !descriptor.record_absorption,
    };
    if tally.nr != grid.nr
        || tally.nz != grid.nz
        || tally.na != grid.na
        || tally.layers.len() != descriptor.layers.len()
        || tally.reflectance.len() != grid.ra_len()
        || tally.transmittance.len() != grid.ra_len()
        || !absorption_ok
    {
        return Err(EngineError::CheckpointMismatch(
            "tally shape does not match the descriptor grid".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_descriptor_hash_deterministic() {
        #[derive(Serialize)]
        struct TestConfig {
            value: i32,
            name: String,
        }

        let hash1 = compute_descriptor_hash(&TestConfig {
            value: 42,
            name: "slab".to_string(),
        })
        .unwrap();
        let hash2 = compute_descriptor_hash(&TestConfig {
            value: 42,
            name: "slab".to_string(),
        })
        .unwrap();

        assert_eq!(hash1, hash2, "Same descriptor should produce same hash");
    }

    #[test]
    fn test_compute_descriptor_hash_different_for_different_descriptors() {
        #[derive(Serialize)]
        struct TestConfig {
            value: f64,
        }

        let hash1 = compute_descriptor_hash(&TestConfig { value: 0.1 }).unwrap();
        let hash2 = compute_descriptor_hash(&TestConfig { value: 0.2 }).unwrap();

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_normalize_merges_adjacent_ranges() {
        let merged = normalize_ranges(vec![
            PhotonRange::new(10, 20),
            PhotonRange::new(0, 10),
            PhotonRange::new(30, 30),
            PhotonRange::new(25, 40),
        ]);
        assert_eq!(merged, vec![PhotonRange::new(0, 20), PhotonRange::new(25, 40)]);
    }

    #[test]
    fn test_split_at() {
        let (head, tail) = PhotonRange::new(0, 10).split_at(4);
        assert_eq!(head, PhotonRange::new(0, 4));
        assert_eq!(tail, Some(PhotonRange::new(4, 10)));

        let (head, tail) = PhotonRange::new(5, 8).split_at(100);
        assert_eq!(head, PhotonRange::new(5, 8));
        assert_eq!(tail, None);
    }
}
