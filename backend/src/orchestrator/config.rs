//! Engine configuration

use crate::core::constants::{DEFAULT_ABSORPTION_COPIES, DEFAULT_UNITS_PER_WAVE};
use crate::orchestrator::error::EngineError;
use crate::transport::RouletteConfig;
use serde::{Deserialize, Serialize};

/// Tunables shared by every simulation of a batch
///
/// None of these change the physics except `roulette`; wave size, replica
/// count and thread count only affect throughput. Results are identical for
/// any value of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub roulette: RouletteConfig,

    /// Upper bound on photons per wave for CPU devices
    pub units_per_wave: usize,

    /// Absorption grid replicas per device scratch tally
    pub absorption_copies: usize,

    /// Worker threads per CPU device (`None`: split the machine evenly)
    pub threads_per_device: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            roulette: RouletteConfig::default(),
            units_per_wave: DEFAULT_UNITS_PER_WAVE,
            absorption_copies: DEFAULT_ABSORPTION_COPIES,
            threads_per_device: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.roulette.validate().map_err(EngineError::InvalidEngineConfig)?;

        if self.units_per_wave == 0 {
            return Err(EngineError::InvalidEngineConfig(
                "units_per_wave must be at least 1".to_string(),
            ));
        }
        if self.absorption_copies == 0 {
            return Err(EngineError::InvalidEngineConfig(
                "absorption_copies must be at least 1".to_string(),
            ));
        }
        if self.threads_per_device == Some(0) {
            return Err(EngineError::InvalidEngineConfig(
                "threads_per_device must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"units_per_wave": 128}"#).unwrap();
        assert_eq!(config.units_per_wave, 128);
        assert_eq!(config.roulette, RouletteConfig::default());
        assert_eq!(config.absorption_copies, DEFAULT_ABSORPTION_COPIES);
    }

    #[test]
    fn test_zero_wave_rejected() {
        let config = EngineConfig {
            units_per_wave: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(EngineError::InvalidEngineConfig(_))));
    }
}
