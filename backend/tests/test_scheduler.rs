//! Scheduler Tests - Device Failure, Reassignment and Ordering
//!
//! Critical invariants tested:
//! - A failed device's wave is rerun elsewhere and leaves no partial deposits
//! - Losing every device fails unfinished simulations, keeps finished ones
//! - One outcome per submitted simulation, in submission order

use photon_transport_core_rs::accumulator::DetectionAccumulator;
use photon_transport_core_rs::orchestrator::{
    BatchScheduler, ComputeDevice, CpuDevice, DeviceError, DeviceId, DevicePool, EngineConfig, EngineError,
    SimulationJob, SimulationOutcome, WaveLaunch, WaveReport,
};
use photon_transport_core_rs::{build_stack, DetectionGrid, RawTally, SimulationDescriptor, SlabSpec};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

const WAVE: usize = 100;

/// CPU device that runs `healthy_waves` waves, then deposits one more and fails
struct FlakyDevice {
    inner: CpuDevice,
    healthy_waves: usize,
    launched: AtomicUsize,
}

impl FlakyDevice {
    fn new(id: usize, healthy_waves: usize) -> Self {
        Self {
            inner: CpuDevice::new(DeviceId(id), Some(2), WAVE).unwrap(),
            healthy_waves,
            launched: AtomicUsize::new(0),
        }
    }
}

impl ComputeDevice for FlakyDevice {
    fn id(&self) -> DeviceId {
        self.inner.id()
    }

    fn name(&self) -> &str {
        "flaky"
    }

    fn max_concurrent_units(&self) -> usize {
        self.inner.max_concurrent_units()
    }

    fn launch_wave(&self, wave: &WaveLaunch<'_>, tally: &DetectionAccumulator) -> Result<WaveReport, DeviceError> {
        let report = self.inner.launch_wave(wave, tally)?;
        if self.launched.fetch_add(1, Ordering::SeqCst) < self.healthy_waves {
            Ok(report)
        } else {
            Err(DeviceError::LaunchFailed {
                device: self.id(),
                reason: "simulated fault".to_string(),
            })
        }
    }
}

fn healthy(id: usize) -> Arc<dyn ComputeDevice> {
    Arc::new(CpuDevice::new(DeviceId(id), Some(2), WAVE).unwrap())
}

fn flaky(id: usize, healthy_waves: usize) -> Arc<dyn ComputeDevice> {
    Arc::new(FlakyDevice::new(id, healthy_waves))
}

fn slab(photons: u64) -> SimulationDescriptor {
    let slab = SlabSpec {
        n: 1.4,
        mua: 1.5,
        mus: 40.0,
        g: 0.85,
        thickness: 0.05,
    };
    SimulationDescriptor::new(
        build_stack(1.0, &[slab], 1.0),
        DetectionGrid {
            dr: 0.01,
            dz: 0.01,
            nr: 10,
            nz: 5,
            na: 4,
        },
        photons,
    )
}

fn run(devices: Vec<Arc<dyn ComputeDevice>>, jobs: Vec<SimulationJob>, seed: u64) -> Vec<SimulationOutcome> {
    let pool = DevicePool::from_devices(devices);
    let scheduler = BatchScheduler::new(&pool, EngineConfig::default()).unwrap();
    scheduler.run(jobs, seed).outcomes
}

fn raw(outcome: &SimulationOutcome) -> RawTally {
    outcome.result().expect("simulation should complete").raw.clone()
}

// ============================================================================
// Failure and reassignment
// ============================================================================

#[test]
fn test_failed_wave_reassigned_without_double_counting() {
    let reference = run(vec![healthy(0)], vec![slab(1_000).into()], 3);
    let recovered = run(vec![flaky(0, 2), healthy(1)], vec![slab(1_000).into()], 3);

    assert_eq!(raw(&reference[0]), raw(&recovered[0]));
}

#[test]
fn test_lost_device_reported() {
    let pool = DevicePool::from_devices(vec![flaky(0, 0), healthy(1)]);
    let scheduler = BatchScheduler::new(&pool, EngineConfig::default()).unwrap();
    let report = scheduler.run(vec![slab(20_000).into()], 1);

    assert_eq!(report.lost_devices(), vec![DeviceId(0)]);
    assert!(report.outcomes[0].is_completed());
    assert_eq!(report.outcomes[0].result().unwrap().photons, 20_000);
}

#[test]
fn test_all_devices_lost() {
    // waves: first 0..100, first 100..150, second 0..100 ← fails
    let outcomes = run(vec![flaky(0, 2)], vec![slab(150).into(), slab(500).into()], 8);

    assert!(outcomes[0].is_completed(), "finished simulation must be kept");
    match &outcomes[1] {
        SimulationOutcome::Failed(failure) => {
            assert!(matches!(failure.error, EngineError::DeviceUnavailable(_)));
        }
        other => panic!("expected failure, got {:?}", other.status()),
    }
}

#[test]
fn test_empty_pool_fails_everything() {
    let outcomes = run(Vec::new(), vec![slab(10).into(), slab(20).into()], 0);
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| !o.is_completed()));
}

// ============================================================================
// Ordering and bookkeeping
// ============================================================================

#[test]
fn test_outcomes_in_submission_order() {
    let mut invalid = slab(10);
    invalid.grid.dz = -1.0;

    let jobs: Vec<SimulationJob> = vec![
        slab(120).with_output_label("a").into(),
        invalid.with_output_label("b").into(),
        slab(80).with_output_label("c").into(),
    ];
    let outcomes = run(vec![healthy(0), healthy(1), healthy(2)], jobs, 12);

    let labels: Vec<&str> = outcomes.iter().map(|o| o.label()).collect();
    assert_eq!(labels, vec!["a", "b", "c"]);
    assert!(outcomes[0].is_completed());
    assert!(!outcomes[1].is_completed());
    assert!(outcomes[2].is_completed());
}

#[test]
fn test_empty_batch() {
    assert!(run(vec![healthy(0)], Vec::new(), 1).is_empty());
}

#[test]
fn test_device_stats_cover_all_photons() {
    let pool = DevicePool::from_devices(vec![healthy(0), healthy(1)]);
    let scheduler = BatchScheduler::new(&pool, EngineConfig::default()).unwrap();
    let report = scheduler.run(vec![slab(450).into(), slab(250).into()], 6);

    assert_eq!(report.photons_run(), 700);
    let waves: usize = report.devices.iter().map(|d| d.waves).sum();
    // 450 → 5 waves, 250 → 3 waves at 100 photons per wave
    assert_eq!(waves, 8);
}
