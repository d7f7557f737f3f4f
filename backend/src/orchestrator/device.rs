//! Compute devices
//!
//! A device runs waves of photons: it takes a contiguous range of global
//! photon indices, transports every photon in it and deposits into the tally
//! it is handed. Devices are explicit resources owned by a [`DevicePool`] and
//! lent to the scheduler; there is no global device registry.
//!
//! The built-in device is [`CpuDevice`], a dedicated rayon thread pool.
//! Other back ends plug in by implementing [`ComputeDevice`].

use crate::accumulator::DetectionAccumulator;
use crate::orchestrator::config::EngineConfig;
use crate::orchestrator::error::DeviceError;
use crate::rng::RandomStreamProvider;
use crate::transport::{PhotonFate, TransportKernel};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Stable identifier of a device within a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device-{}", self.0)
    }
}

/// One wave of work handed to a device
#[derive(Debug, Clone)]
pub struct WaveLaunch<'a> {
    /// Position of the simulation in the batch (for logging)
    pub simulation: usize,

    pub kernel: &'a TransportKernel,

    /// Stream family of the simulation; photon `i` draws from `streams.stream(i)`
    pub streams: RandomStreamProvider,

    /// Global photon indices of this wave
    pub photons: Range<u64>,
}

impl WaveLaunch<'_> {
    pub fn len(&self) -> u64 {
        self.photons.end.saturating_sub(self.photons.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counters of a finished wave
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaveReport {
    pub photons: u64,
    pub reflected: u64,
    pub transmitted: u64,
    pub terminated: u64,

    /// Kernel interactions over all photons
    pub steps: u64,
}

impl WaveReport {
    fn single(fate: PhotonFate, steps: u64) -> Self {
        let mut report = WaveReport {
            photons: 1,
            steps,
            ..Default::default()
        };
        match fate {
            PhotonFate::Reflected => report.reflected = 1,
            PhotonFate::Transmitted => report.transmitted = 1,
            PhotonFate::Terminated => report.terminated = 1,
        }
        report
    }

    pub fn merge(self, other: WaveReport) -> WaveReport {
        WaveReport {
            photons: self.photons + other.photons,
            reflected: self.reflected + other.reflected,
            transmitted: self.transmitted + other.transmitted,
            terminated: self.terminated + other.terminated,
            steps: self.steps + other.steps,
        }
    }
}

/// A processor able to run photon waves
pub trait ComputeDevice: Send + Sync {
    fn id(&self) -> DeviceId;

    fn name(&self) -> &str;

    /// Largest number of photons the device runs in one wave
    fn max_concurrent_units(&self) -> usize;

    /// Run every photon of `wave`, depositing into `tally`
    ///
    /// On error the contents of `tally` are unspecified and the caller
    /// discards them.
    fn launch_wave(&self, wave: &WaveLaunch<'_>, tally: &DetectionAccumulator) -> Result<WaveReport, DeviceError>;
}

// ============================================================================
// CPU device
// ============================================================================

/// A dedicated rayon thread pool acting as one device
pub struct CpuDevice {
    id: DeviceId,
    name: String,
    pool: rayon::ThreadPool,
    units_per_wave: usize,
}

impl CpuDevice {
    /// Build a device with `threads` workers (`None`: rayon's default)
    pub fn new(id: DeviceId, threads: Option<usize>, units_per_wave: usize) -> Result<Self, DeviceError> {
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(move |i| format!("photon-{}-{}", id.0, i));
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build().map_err(|e| DeviceError::PoolBuild(e.to_string()))?;

        Ok(Self {
            id,
            name: format!("cpu-{}", id.0),
            pool,
            units_per_wave: units_per_wave.max(1),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl fmt::Debug for CpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuDevice")
            .field("id", &self.id)
            .field("threads", &self.threads())
            .field("units_per_wave", &self.units_per_wave)
            .finish()
    }
}

impl ComputeDevice for CpuDevice {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn max_concurrent_units(&self) -> usize {
        self.units_per_wave
    }

    fn launch_wave(&self, wave: &WaveLaunch<'_>, tally: &DetectionAccumulator) -> Result<WaveReport, DeviceError> {
        let report = self.pool.install(|| {
            wave.photons
                .clone()
                .into_par_iter()
                .map_init(
                    || wave.kernel.scratch(rayon::current_thread_index().unwrap_or(0)),
                    |scratch, photon| {
                        let before = scratch.steps;
                        let fate = wave.kernel.run_photon(wave.streams.stream(photon), tally, scratch);
                        WaveReport::single(fate, scratch.steps - before)
                    },
                )
                .reduce(WaveReport::default, WaveReport::merge)
        });
        Ok(report)
    }
}

// ============================================================================
// Device pool
// ============================================================================

/// Scoped set of devices lent to a scheduler
///
/// Devices are released when the pool is dropped.
pub struct DevicePool {
    devices: Vec<Arc<dyn ComputeDevice>>,
}

impl DevicePool {
    /// Acquire `count` CPU devices splitting the machine's threads
    ///
    /// # Example
    /// ```
    /// use photon_transport_core_rs::orchestrator::{DevicePool, EngineConfig};
    ///
    /// let pool = DevicePool::acquire_cpu(2, &EngineConfig::default()).unwrap();
    /// assert_eq!(pool.len(), 2);
    /// ```
    pub fn acquire_cpu(count: usize, config: &EngineConfig) -> Result<Self, DeviceError> {
        if count == 0 {
            return Err(DeviceError::NoDevices);
        }

        let threads = config
            .threads_per_device
            .unwrap_or_else(|| (rayon::current_num_threads() / count).max(1));

        let pool = Self::from_builds((0..count).map(|i| {
            CpuDevice::new(DeviceId(i), Some(threads), config.units_per_wave)
                .map(|d| Arc::new(d) as Arc<dyn ComputeDevice>)
        }))?;

        log::info!(
            "Acquired {} of {} CPU device(s) with {} thread(s) each",
            pool.len(),
            count,
            threads
        );
        Ok(pool)
    }

    /// Pool over the devices that came up
    ///
    /// Failed builds are logged and skipped; `NoDevices` only when none
    /// succeeded.
    pub fn from_builds<I>(builds: I) -> Result<Self, DeviceError>
    where
        I: IntoIterator<Item = Result<Arc<dyn ComputeDevice>, DeviceError>>,
    {
        let devices: Vec<Arc<dyn ComputeDevice>> = builds
            .into_iter()
            .filter_map(|build| match build {
                Ok(device) => Some(device),
                Err(err) => {
                    log::warn!("Device unavailable, continuing without it: {}", err);
                    None
                }
            })
            .collect();

        if devices.is_empty() {
            return Err(DeviceError::NoDevices);
        }
        Ok(Self { devices })
    }

    /// Pool over caller-provided devices
    pub fn from_devices(devices: Vec<Arc<dyn ComputeDevice>>) -> Self {
        Self { devices }
    }

    pub fn devices(&self) -> &[Arc<dyn ComputeDevice>] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl Drop for DevicePool {
    fn drop(&mut self) {
        log::debug!("Releasing {} compute device(s)", self.devices.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::layer::{build_stack, SlabSpec};
    use crate::models::{DetectionGrid, SimulationDescriptor};
    use crate::transport::RouletteConfig;

    fn descriptor() -> SimulationDescriptor {
        let slab = SlabSpec {
            n: 1.3,
            mua: 2.0,
            mus: 20.0,
            g: 0.7,
            thickness: 0.1,
        };
        SimulationDescriptor::new(
            build_stack(1.0, &[slab], 1.0),
            DetectionGrid {
                dr: 0.01,
                dz: 0.01,
                nr: 10,
                nz: 10,
                na: 5,
            },
            300,
        )
    }

    #[test]
    fn test_wave_report_counts_every_photon() {
        let d = descriptor();
        let kernel = TransportKernel::new(&d, RouletteConfig::default());
        let device = CpuDevice::new(DeviceId(0), Some(2), 64).unwrap();
        let tally = DetectionAccumulator::for_descriptor(&d, 2);
        let wave = WaveLaunch {
            simulation: 0,
            kernel: &kernel,
            streams: RandomStreamProvider::new(4),
            photons: 0..300,
        };

        let report = device.launch_wave(&wave, &tally).unwrap();
        assert_eq!(report.photons, 300);
        assert_eq!(report.reflected + report.transmitted + report.terminated, 300);
        assert!(report.steps >= 300);
    }

    #[test]
    fn test_wave_result_independent_of_thread_count() {
        let d = descriptor();
        let kernel = TransportKernel::new(&d, RouletteConfig::default());
        let streams = RandomStreamProvider::new(11);

        let run = |threads: usize| {
            let device = CpuDevice::new(DeviceId(0), Some(threads), 64).unwrap();
            let tally = DetectionAccumulator::for_descriptor(&d, 4);
            let wave = WaveLaunch {
                simulation: 0,
                kernel: &kernel,
                streams,
                photons: 0..200,
            };
            device.launch_wave(&wave, &tally).unwrap();
            tally.into_snapshot()
        };

        assert_eq!(run(1), run(3));
    }

    #[test]
    fn test_failed_builds_are_skipped() {
        let builds: Vec<Result<Arc<dyn ComputeDevice>, DeviceError>> = vec![
            Err(DeviceError::PoolBuild("no threads".to_string())),
            CpuDevice::new(DeviceId(1), Some(1), 16).map(|d| Arc::new(d) as Arc<dyn ComputeDevice>),
            Err(DeviceError::PoolBuild("no threads".to_string())),
        ];
        let pool = DevicePool::from_builds(builds).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.devices()[0].id(), DeviceId(1));
    }

    #[test]
    fn test_all_builds_failed() {
        let builds: Vec<Result<Arc<dyn ComputeDevice>, DeviceError>> =
            vec![Err(DeviceError::PoolBuild("no threads".to_string()))];
        assert!(matches!(DevicePool::from_builds(builds), Err(DeviceError::NoDevices)));
    }

    #[test]
    fn test_zero_devices_rejected() {
        assert!(matches!(
            DevicePool::acquire_cpu(0, &EngineConfig::default()),
            Err(DeviceError::NoDevices)
        ));
    }
}
