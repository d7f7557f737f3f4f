//! Checkpoint Tests - Cancel and Resume
//!
//! Critical invariants tested:
//! - Cancellation stops between waves and keeps finished waves
//! - Resuming a checkpoint reproduces an uninterrupted run bit-for-bit
//! - Config matching: a checkpoint only resumes its own descriptor

use photon_transport_core_rs::accumulator::DetectionAccumulator;
use photon_transport_core_rs::orchestrator::{
    compute_descriptor_hash, validate_checkpoint, BatchScheduler, CancellationToken, ComputeDevice, CpuDevice,
    DeviceError, DeviceId, DevicePool, EngineConfig, EngineError, PartialSimulation, PhotonRange, SimulationJob,
    SimulationOutcome, TallyCheckpoint, WaveLaunch, WaveReport,
};
use photon_transport_core_rs::{build_stack, DetectionGrid, RouletteConfig, SimulationDescriptor, SlabSpec};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

const WAVE: usize = 100;

/// CPU device that cancels the batch after running `waves` waves
struct CancellingDevice {
    inner: CpuDevice,
    waves: usize,
    launched: AtomicUsize,
    token: CancellationToken,
}

impl ComputeDevice for CancellingDevice {
    fn id(&self) -> DeviceId {
        self.inner.id()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn max_concurrent_units(&self) -> usize {
        WAVE
    }

    fn launch_wave(&self, wave: &WaveLaunch<'_>, tally: &DetectionAccumulator) -> Result<WaveReport, DeviceError> {
        let report = self.inner.launch_wave(wave, tally)?;
        if self.launched.fetch_add(1, Ordering::SeqCst) + 1 == self.waves {
            self.token.cancel();
        }
        Ok(report)
    }
}

fn tissue(photons: u64) -> SimulationDescriptor {
    let slab = SlabSpec {
        n: 1.37,
        mua: 3.0,
        mus: 70.0,
        g: 0.9,
        thickness: 0.08,
    };
    SimulationDescriptor::new(
        build_stack(1.0, &[slab], 1.0),
        DetectionGrid {
            dr: 0.01,
            dz: 0.01,
            nr: 10,
            nz: 8,
            na: 5,
        },
        photons,
    )
}

fn cpu_pool() -> DevicePool {
    DevicePool::from_devices(vec![Arc::new(CpuDevice::new(DeviceId(0), Some(2), WAVE).unwrap())])
}

/// Run `descriptor` until `waves` waves are done, then cancel
fn cancelled_after(descriptor: &SimulationDescriptor, waves: usize, seed: u64) -> PartialSimulation {
    let token = CancellationToken::new();
    let device = CancellingDevice {
        inner: CpuDevice::new(DeviceId(0), Some(2), WAVE).unwrap(),
        waves,
        launched: AtomicUsize::new(0),
        token: token.clone(),
    };
    let pool = DevicePool::from_devices(vec![Arc::new(device)]);
    let scheduler = BatchScheduler::new(&pool, EngineConfig::default())
        .unwrap()
        .with_cancellation(token);

    match scheduler.run(vec![descriptor.clone().into()], seed).outcomes.remove(0) {
        SimulationOutcome::Cancelled(partial) => partial,
        other => panic!("expected cancellation, got {:?}", other.status()),
    }
}

// ============================================================================
// Cancel
// ============================================================================

#[test]
fn test_cancel_keeps_finished_waves() {
    let d = tissue(1_000);
    let partial = cancelled_after(&d, 3, 21);

    assert_eq!(partial.photons_completed, 300);
    assert_eq!(partial.checkpoint.completed, vec![PhotonRange::new(0, 300)]);
    assert_eq!(partial.checkpoint.remaining(), vec![PhotonRange::new(300, 1_000)]);

    let result = partial.result.expect("partial result for finished photons");
    assert_eq!(result.photons, 300);
    assert!((result.summary.energy_balance() - 1.0).abs() < 0.03);
}

// ============================================================================
// Resume
// ============================================================================

#[test]
fn test_resume_matches_uninterrupted_run() {
    let d = tissue(1_000);
    let seed = 77;

    let pool = cpu_pool();
    let scheduler = BatchScheduler::new(&pool, EngineConfig::default()).unwrap();
    let uninterrupted = scheduler.run(vec![d.clone().into()], seed).outcomes.remove(0);

    let partial = cancelled_after(&d, 4, seed);
    let json = partial.checkpoint.to_json().unwrap();
    let checkpoint = TallyCheckpoint::from_json(&json).unwrap();

    // the resumed simulation sits at another batch position and seed
    let resumed = scheduler
        .run(vec![tissue(10).into(), SimulationJob::resume(d, checkpoint)], 0)
        .outcomes
        .remove(1);

    assert_eq!(
        uninterrupted.result().unwrap().raw,
        resumed.result().unwrap().raw
    );
    assert_eq!(uninterrupted.result().unwrap().summary, resumed.result().unwrap().summary);
}

#[test]
fn test_resume_rejects_other_descriptor() {
    let d = tissue(1_000);
    let partial = cancelled_after(&d, 2, 5);

    let mut other = d.clone();
    other.layers[1].mua = 4.0;

    let pool = cpu_pool();
    let scheduler = BatchScheduler::new(&pool, EngineConfig::default()).unwrap();
    let outcome = scheduler
        .run(vec![SimulationJob::resume(other, partial.checkpoint)], 5)
        .outcomes
        .remove(0);

    assert!(matches!(
        outcome,
        SimulationOutcome::Failed(ref f) if matches!(f.error, EngineError::CheckpointMismatch(_))
    ));
}

#[test]
fn test_resume_rejects_other_roulette() {
    let d = tissue(1_000);
    let partial = cancelled_after(&d, 2, 5);

    let config = EngineConfig {
        roulette: RouletteConfig {
            threshold: 1e-3,
            survival_chance: 0.5,
        },
        ..Default::default()
    };
    let pool = cpu_pool();
    let scheduler = BatchScheduler::new(&pool, config).unwrap();
    let outcome = scheduler
        .run(vec![SimulationJob::resume(d, partial.checkpoint)], 5)
        .outcomes
        .remove(0);

    assert!(matches!(
        outcome,
        SimulationOutcome::Failed(ref f) if matches!(f.error, EngineError::CheckpointMismatch(_))
    ));
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_validate_checkpoint_rules() {
    let d = tissue(1_000);
    let hash = compute_descriptor_hash(&d).unwrap();
    let roulette = RouletteConfig::default();
    let partial = cancelled_after(&d, 1, 9);
    assert_eq!(partial.checkpoint.roulette, roulette);
    assert_eq!(partial.checkpoint.descriptor_hash, hash);
    assert!(validate_checkpoint(&partial.checkpoint, &d, &hash, &roulette).is_ok());

    let mut overlapping = partial.checkpoint.clone();
    overlapping.completed = vec![PhotonRange::new(0, 100), PhotonRange::new(50, 150)];
    assert!(matches!(
        validate_checkpoint(&overlapping, &d, &hash, &roulette),
        Err(EngineError::CheckpointMismatch(_))
    ));

    let mut beyond = partial.checkpoint.clone();
    beyond.completed = vec![PhotonRange::new(900, 1_100)];
    assert!(validate_checkpoint(&beyond, &d, &hash, &roulette).is_err());

    let mut reshaped = partial.checkpoint;
    reshaped.tally.absorption = None;
    assert!(validate_checkpoint(&reshaped, &d, &hash, &roulette).is_err());
}

#[test]
fn test_descriptor_hash_tracks_content() {
    let a = compute_descriptor_hash(&tissue(100)).unwrap();
    let b = compute_descriptor_hash(&tissue(100)).unwrap();
    let c = compute_descriptor_hash(&tissue(101)).unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_corrupt_json_rejected() {
    assert!(matches!(
        TallyCheckpoint::from_json("{not json"),
        Err(EngineError::Serialization(_))
    ));
}
