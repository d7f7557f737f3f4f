//! Batch scheduler - distributes photon waves over devices
//!
//! # Work model
//!
//! Every simulation contributes its photon ranges to one shared FIFO queue.
//! Each device runs on its own thread and repeatedly takes the front range,
//! cut to the device's wave capacity, runs it into a private scratch tally and
//! commits that tally to the simulation on success. Devices of different
//! capacity therefore share work naturally, and a device may run several
//! simulations one after another.
//!
//! ```text
//! queue: [sim0 0..N0] [sim1 0..N1] ...
//!            │
//!   device k: take ≤ cap photons → launch_wave → drain scratch into sim tally
//!             failure → push range back to the front, retire device
//! ```
//!
//! # Determinism
//!
//! Photon `i` of simulation `s` always draws from
//! `provider.derive(s).stream(i)` and deposits are integer additions, so
//! raw tallies do not depend on the device count, wave sizes or timing.
//!
//! # Failure and cancellation
//!
//! A wave that fails leaves nothing behind (its scratch is discarded) and its
//! range is requeued for the remaining devices. Cancellation is observed
//! between waves; in-flight waves finish and are committed.

use crate::accumulator::DetectionAccumulator;
use crate::models::SimulationDescriptor;
use crate::orchestrator::checkpoint::{
    compute_descriptor_hash, normalize_ranges, validate_checkpoint, PhotonRange, TallyCheckpoint,
};
use crate::orchestrator::config::EngineConfig;
use crate::orchestrator::device::{ComputeDevice, DeviceId, DevicePool, WaveLaunch, WaveReport};
use crate::orchestrator::error::{DeviceError, EngineError};
use crate::orchestrator::outcome::{PartialSimulation, SimulationFailure, SimulationOutcome};
use crate::results::ResultAggregator;
use crate::rng::RandomStreamProvider;
use crate::transport::TransportKernel;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ============================================================================
// Public API
// ============================================================================

/// One simulation submitted to a batch
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationJob {
    pub descriptor: SimulationDescriptor,

    /// Continue from a previous cancelled run instead of starting fresh
    pub resume_from: Option<TallyCheckpoint>,
}

impl SimulationJob {
    pub fn new(descriptor: SimulationDescriptor) -> Self {
        Self {
            descriptor,
            resume_from: None,
        }
    }

    pub fn resume(descriptor: SimulationDescriptor, checkpoint: TallyCheckpoint) -> Self {
        Self {
            descriptor,
            resume_from: Some(checkpoint),
        }
    }
}

impl From<SimulationDescriptor> for SimulationJob {
    fn from(descriptor: SimulationDescriptor) -> Self {
        Self::new(descriptor)
    }
}

/// Cooperative cancellation flag shared with a running batch
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Work done by one device during a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStats {
    pub id: DeviceId,
    pub name: String,
    pub waves: usize,
    pub photons: u64,
    pub steps: u64,

    /// The device failed and was retired
    pub lost: bool,
}

/// Everything a batch produced
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// One outcome per submitted job, in submission order
    pub outcomes: Vec<SimulationOutcome>,

    pub devices: Vec<DeviceStats>,

    pub elapsed: Duration,
}

impl BatchReport {
    pub fn lost_devices(&self) -> Vec<DeviceId> {
        self.devices.iter().filter(|d| d.lost).map(|d| d.id).collect()
    }

    /// Photons run during this batch (resumed photons excluded)
    pub fn photons_run(&self) -> u64 {
        self.devices.iter().map(|d| d.photons).sum()
    }
}

/// Runs batches of simulations on a device pool
pub struct BatchScheduler<'p> {
    pool: &'p DevicePool,
    config: EngineConfig,
    cancel: CancellationToken,
}

// ============================================================================
// Internal state
// ============================================================================

/// A simulation accepted into the batch
struct SimulationSlot {
    index: usize,
    descriptor: SimulationDescriptor,
    hash: String,
    streams: RandomStreamProvider,
    kernel: TransportKernel,
    tally: DetectionAccumulator,
    completed: Mutex<Vec<PhotonRange>>,
}

#[derive(Debug, Clone, Copy)]
struct WaveItem {
    slot: usize,
    range: PhotonRange,
}

struct QueueState {
    items: VecDeque<WaveItem>,
    in_flight: usize,
}

struct WorkQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl WorkQueue {
    /// Next wave of at most `capacity` photons
    ///
    /// Blocks while the queue is empty but waves are still running (they may
    /// be requeued). `None` once everything is done or cancelled.
    fn take(&self, capacity: u64, cancel: &CancellationToken) -> Option<WaveItem> {
        let mut state = self.state.lock();
        loop {
            if cancel.is_cancelled() {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                let (head, tail) = item.range.split_at(capacity.max(1));
                if let Some(tail) = tail {
                    state.items.push_front(WaveItem {
                        slot: item.slot,
                        range: tail,
                    });
                }
                state.in_flight += 1;
                return Some(WaveItem {
                    slot: item.slot,
                    range: head,
                });
            }
            if state.in_flight == 0 {
                return None;
            }
            self.ready.wait(&mut state);
        }
    }

    fn finish(&self) {
        let mut state = self.state.lock();
        state.in_flight -= 1;
        self.ready.notify_all();
    }

    fn requeue(&self, item: WaveItem) {
        let mut state = self.state.lock();
        state.items.push_front(item);
        state.in_flight -= 1;
        self.ready.notify_all();
    }

    fn pending(&self) -> usize {
        self.state.lock().items.len()
    }
}

/// Outcome known before any photon runs (invalid input)
enum Admission {
    Accepted(SimulationSlot, Vec<PhotonRange>),
    Rejected(SimulationOutcome),
}

// ============================================================================
// Scheduler
// ============================================================================

impl<'p> BatchScheduler<'p> {
    /// Scheduler over `pool`
    ///
    /// # Errors
    ///
    /// `InvalidEngineConfig` if `config` does not validate.
    pub fn new(pool: &'p DevicePool, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            pool,
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Observe `token` instead of the scheduler's own
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels batches run by this scheduler
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `jobs` to completion, cancellation or device exhaustion
    ///
    /// Simulation `i` uses the stream family `RandomStreamProvider::new(seed)
    /// .derive(i)`, unless it resumes a checkpoint, which carries its own.
    pub fn run(&self, jobs: Vec<SimulationJob>, seed: u64) -> BatchReport {
        let started = Instant::now();
        let root = RandomStreamProvider::new(seed);
        let total_jobs = jobs.len();

        let mut outcomes: Vec<Option<SimulationOutcome>> = Vec::with_capacity(total_jobs);
        let mut slots = Vec::new();
        let mut items = VecDeque::new();

        for (index, job) in jobs.into_iter().enumerate() {
            match self.admit(index, job, &root) {
                Admission::Accepted(slot, ranges) => {
                    let slot_index = slots.len();
                    items.extend(ranges.into_iter().map(|range| WaveItem {
                        slot: slot_index,
                        range,
                    }));
                    slots.push(slot);
                    outcomes.push(None);
                }
                Admission::Rejected(outcome) => outcomes.push(Some(outcome)),
            }
        }

        log::info!(
            "Starting batch: {} simulation(s), {} runnable, {} device(s)",
            total_jobs,
            slots.len(),
            self.pool.len()
        );

        let queue = WorkQueue {
            state: Mutex::new(QueueState { items, in_flight: 0 }),
            ready: Condvar::new(),
        };

        let devices: Vec<DeviceStats> = std::thread::scope(|s| {
            let handles: Vec<_> = self
                .pool
                .devices()
                .iter()
                .map(|device| {
                    let (queue, slots) = (&queue, &slots);
                    s.spawn(move || self.device_loop(device.as_ref(), queue, slots))
                })
                .collect();

            handles
                .into_iter()
                .zip(self.pool.devices())
                .map(|(handle, device)| {
                    handle.join().unwrap_or_else(|_| DeviceStats {
                        id: device.id(),
                        name: device.name().to_string(),
                        waves: 0,
                        photons: 0,
                        steps: 0,
                        lost: true,
                    })
                })
                .collect()
        });

        let cancelled = self.cancel.is_cancelled();
        let unfinished = queue.pending();
        if unfinished > 0 && !cancelled {
            log::error!(
                "No compute device left; {} wave range(s) could not be run",
                unfinished
            );
        }

        let mut finished = slots.into_iter().map(|slot| self.finish(slot, cancelled));
        let outcomes: Vec<SimulationOutcome> = outcomes
            .into_iter()
            .map(|o| match o {
                Some(outcome) => outcome,
                None => match finished.next() {
                    Some(outcome) => outcome,
                    None => SimulationOutcome::Failed(SimulationFailure {
                        label: String::new(),
                        error: EngineError::DeviceUnavailable("simulation lost".to_string()),
                    }),
                },
            })
            .collect();

        let report = BatchReport {
            outcomes,
            devices,
            elapsed: started.elapsed(),
        };

        log::info!(
            "Batch finished in {:.2?}: {} completed, {} photons run, {} device(s) lost",
            report.elapsed,
            report.outcomes.iter().filter(|o| o.is_completed()).count(),
            report.photons_run(),
            report.lost_devices().len()
        );
        report
    }

    fn admit(&self, index: usize, job: SimulationJob, root: &RandomStreamProvider) -> Admission {
        let SimulationJob {
            descriptor,
            resume_from,
        } = job;
        let label = descriptor.labels.output.clone();
        let reject = |error: EngineError| {
            log::warn!("Simulation {} ({}) rejected: {}", index, label, error);
            Admission::Rejected(SimulationOutcome::Failed(SimulationFailure {
                label: label.clone(),
                error,
            }))
        };

        if let Err(err) = descriptor.validate() {
            return reject(err.into());
        }
        let hash = match compute_descriptor_hash(&descriptor) {
            Ok(hash) => hash,
            Err(err) => return reject(err),
        };

        let tally = DetectionAccumulator::for_descriptor(&descriptor, 1);
        let (streams, completed, remaining) = match resume_from {
            Some(checkpoint) => {
                if let Err(err) = validate_checkpoint(&checkpoint, &descriptor, &hash, &self.config.roulette) {
                    return reject(err);
                }
                tally.merge(&checkpoint.tally);
                log::info!(
                    "Simulation {} resumes with {} of {} photons done",
                    index,
                    checkpoint.photons_completed(),
                    checkpoint.photons_total
                );
                let remaining = checkpoint.remaining();
                (
                    RandomStreamProvider::new(checkpoint.simulation_seed),
                    checkpoint.completed,
                    remaining,
                )
            }
            None => (
                root.derive(index as u64),
                Vec::new(),
                vec![PhotonRange::new(0, descriptor.photons)],
            ),
        };

        let kernel = TransportKernel::new(&descriptor, self.config.roulette);
        Admission::Accepted(
            SimulationSlot {
                index,
                descriptor,
                hash,
                streams,
                kernel,
                tally,
                completed: Mutex::new(completed),
            },
            remaining,
        )
    }

    /// Work loop of one device thread
    fn device_loop(&self, device: &dyn ComputeDevice, queue: &WorkQueue, slots: &[SimulationSlot]) -> DeviceStats {
        let mut stats = DeviceStats {
            id: device.id(),
            name: device.name().to_string(),
            waves: 0,
            photons: 0,
            steps: 0,
            lost: false,
        };
        let capacity = device.max_concurrent_units() as u64;

        // scratch tally, reused while consecutive waves belong to one simulation
        let mut scratch: Option<(usize, DetectionAccumulator)> = None;

        while let Some(item) = queue.take(capacity, &self.cancel) {
            let slot = &slots[item.slot];

            if scratch.as_ref().map(|(owner, _)| *owner) != Some(item.slot) {
                scratch = None;
            }
            let (_, wave_tally) = scratch.get_or_insert_with(|| {
                (
                    item.slot,
                    DetectionAccumulator::for_descriptor(&slot.descriptor, self.config.absorption_copies),
                )
            });
            let wave_tally = &*wave_tally;

            let wave = WaveLaunch {
                simulation: slot.index,
                kernel: &slot.kernel,
                streams: slot.streams,
                photons: item.range.into(),
            };

            let launched = panic::catch_unwind(AssertUnwindSafe(|| device.launch_wave(&wave, wave_tally)))
                .unwrap_or_else(|_| {
                    Err(DeviceError::LaunchFailed {
                        device: device.id(),
                        reason: "worker panicked".to_string(),
                    })
                });

            match launched {
                Ok(report) => {
                    wave_tally.drain_into(&slot.tally);
                    slot.completed.lock().push(item.range);
                    queue.finish();
                    self.record(&mut stats, &wave, &report);
                }
                Err(err) => {
                    log::warn!(
                        "{} lost while running photons {}..{} of simulation {}: {}; requeueing",
                        device.name(),
                        item.range.start,
                        item.range.end,
                        slot.index,
                        err
                    );
                    queue.requeue(item);
                    stats.lost = true;
                    break;
                }
            }
        }

        stats
    }

    fn record(&self, stats: &mut DeviceStats, wave: &WaveLaunch<'_>, report: &WaveReport) {
        stats.waves += 1;
        stats.photons += report.photons;
        stats.steps += report.steps;
        log::debug!(
            "{}: simulation {} photons {}..{} done (R {} / T {} / killed {})",
            stats.name,
            wave.simulation,
            wave.photons.start,
            wave.photons.end,
            report.reflected,
            report.transmitted,
            report.terminated
        );
    }

    /// Turn a slot into its final outcome
    fn finish(&self, slot: SimulationSlot, cancelled: bool) -> SimulationOutcome {
        let SimulationSlot {
            index,
            descriptor,
            hash,
            streams,
            tally,
            completed,
            ..
        } = slot;

        let completed = normalize_ranges(completed.into_inner());
        let photons_completed: u64 = completed.iter().map(PhotonRange::len).sum();
        let label = descriptor.labels.output.clone();
        let raw = tally.into_snapshot();

        if photons_completed >= descriptor.photons {
            let photons = descriptor.photons;
            return SimulationOutcome::Completed(ResultAggregator::aggregate(&descriptor, raw, photons, hash));
        }

        if cancelled {
            log::info!(
                "Simulation {} cancelled after {} of {} photons",
                index,
                photons_completed,
                descriptor.photons
            );
            let result = (photons_completed > 0)
                .then(|| ResultAggregator::aggregate(&descriptor, raw.clone(), photons_completed, hash.clone()));
            return SimulationOutcome::Cancelled(PartialSimulation {
                label,
                photons_completed,
                result,
                checkpoint: TallyCheckpoint {
                    descriptor_hash: hash,
                    simulation_seed: streams.seed(),
                    photons_total: descriptor.photons,
                    roulette: self.config.roulette,
                    completed,
                    tally: raw,
                },
            });
        }

        SimulationOutcome::Failed(SimulationFailure {
            label,
            error: EngineError::DeviceUnavailable(format!(
                "all devices lost with {} of {} photons completed",
                photons_completed, descriptor.photons
            )),
        })
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Run `descriptors` on `device_count` CPU devices with default settings
///
/// Returns one outcome per descriptor, in input order.
///
/// # Example
/// ```
/// use photon_transport_core_rs::models::layer::{build_stack, SlabSpec};
/// use photon_transport_core_rs::models::{DetectionGrid, SimulationDescriptor};
/// use photon_transport_core_rs::orchestrator::run_simulations;
///
/// let slab = SlabSpec { n: 1.0, mua: 1.0, mus: 10.0, g: 0.9, thickness: 0.1 };
/// let grid = DetectionGrid { dr: 0.01, dz: 0.01, nr: 10, nz: 10, na: 5 };
/// let descriptor = SimulationDescriptor::new(build_stack(1.0, &[slab], 1.0), grid, 100);
///
/// let outcomes = run_simulations(&[descriptor], 1, 7);
/// let result = outcomes[0].result().unwrap();
/// assert!((result.summary.energy_balance() - 1.0).abs() < 1e-3);
/// ```
pub fn run_simulations(descriptors: &[SimulationDescriptor], device_count: usize, seed: u64) -> Vec<SimulationOutcome> {
    run_simulations_with_config(descriptors, device_count, seed, &EngineConfig::default())
}

/// [`run_simulations`] with explicit engine settings
pub fn run_simulations_with_config(
    descriptors: &[SimulationDescriptor],
    device_count: usize,
    seed: u64,
    config: &EngineConfig,
) -> Vec<SimulationOutcome> {
    let fail_all = |error: EngineError| {
        log::error!("Batch not started: {}", error);
        descriptors
            .iter()
            .map(|d| {
                SimulationOutcome::Failed(SimulationFailure {
                    label: d.labels.output.clone(),
                    error: error.clone(),
                })
            })
            .collect()
    };

    if let Err(err) = config.validate() {
        return fail_all(err);
    }

    let pool = match DevicePool::acquire_cpu(device_count, config) {
        Ok(pool) => pool,
        Err(err) => return fail_all(err.into()),
    };

    match BatchScheduler::new(&pool, config.clone()) {
        Ok(scheduler) => {
            let jobs = descriptors.iter().cloned().map(SimulationJob::new).collect();
            scheduler.run(jobs, seed).outcomes
        }
        Err(err) => fail_all(err),
    }
}
