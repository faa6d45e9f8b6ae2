//! Engine configuration
//!
//! Block size, hop and channel count are fixed per engine instance; changing
//! any of them goes through `SpectralProcessor::reconfigure`, which rebuilds
//! buffers and clears phase history.

use serde::Deserialize;
use thiserror::Error;

use crate::mask::DEFAULT_COLUMNS;
use crate::phase::DEFAULT_PEAK_THRESHOLD;

/// Maximum number of audio channels
pub const MAX_CHANNELS: usize = 2;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("FFT size must be an even number of at least 4 samples (got {0})")]
    FftSize(usize),

    #[error("Hop size {hop} must be between 1 and {max} and divide the FFT size {fft_size}")]
    HopSize { hop: usize, fft_size: usize, max: usize },

    #[error("Channel count must be between 1 and {max} (got {got})", max = MAX_CHANNELS)]
    Channels { got: usize },

    #[error("Mask needs at least one column")]
    MaskColumns,

    #[error("Phase-lock threshold must be in [0, 1) (got {0})")]
    PeakThreshold(f64),

    #[error("Gate release must be in [0, 1) (got {0})")]
    GateRelease(f64),

    #[error("Headroom gain must be positive and finite (got {0})")]
    Headroom(f64),

    #[error("DC blocker pole must be in [0, 1) (got {0})")]
    DcPole(f64),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Reference level for the spectral gate
///
/// The gate threshold is `intensity × peak`; this picks which peak.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GatePolicy {
    /// The current frame's own maximum magnitude (transient-sensitive)
    #[default]
    InstantPeak,

    /// Per-channel peak follower: peak = max(frame_peak, previous × release)
    SmoothedPeak { release: f64 },
}

/// Per-sample output conditioning after overlap-add
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConditioningConfig {
    /// Apply headroom, saturation and DC blocking
    pub enabled: bool,

    /// Linear gain applied before the saturator
    pub headroom: f64,

    /// DC blocker pole R in y[n] = x[n] - x[n-1] + R·y[n-1]
    pub dc_pole: f64,
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            headroom: 0.8,
            dc_pole: 0.995,
        }
    }
}

/// Spectral engine configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// FFT size N (samples per analysis frame)
    pub fft_size: usize,

    /// Hop H between frames
    pub hop_size: usize,

    /// Number of channels (1 or 2)
    pub channels: usize,

    /// Mask history length in columns
    pub mask_columns: usize,

    /// PvLock peak threshold relative to the frame maximum
    pub phase_lock_threshold: f64,

    pub gate_policy: GatePolicy,

    pub conditioning: ConditioningConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            hop_size: 512,
            channels: 2,
            mask_columns: DEFAULT_COLUMNS,
            phase_lock_threshold: DEFAULT_PEAK_THRESHOLD,
            gate_policy: GatePolicy::default(),
            conditioning: ConditioningConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document; missing fields take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Number of frequency bins K = N/2 + 1
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Reject configurations that would produce out-of-range buffers
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fft_size < 4 || self.fft_size % 2 != 0 {
            return Err(ConfigError::FftSize(self.fft_size));
        }

        let max_hop = self.fft_size / 2;
        if self.hop_size == 0 || self.hop_size > max_hop || self.fft_size % self.hop_size != 0 {
            return Err(ConfigError::HopSize {
                hop: self.hop_size,
                fft_size: self.fft_size,
                max: max_hop,
            });
        }

        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(ConfigError::Channels { got: self.channels });
        }

        if self.mask_columns == 0 {
            return Err(ConfigError::MaskColumns);
        }

        if !(0.0..1.0).contains(&self.phase_lock_threshold) {
            return Err(ConfigError::PeakThreshold(self.phase_lock_threshold));
        }

        if let GatePolicy::SmoothedPeak { release } = self.gate_policy {
            if !(0.0..1.0).contains(&release) {
                return Err(ConfigError::GateRelease(release));
            }
        }

        let headroom = self.conditioning.headroom;
        if !headroom.is_finite() || headroom <= 0.0 {
            return Err(ConfigError::Headroom(headroom));
        }

        if !(0.0..1.0).contains(&self.conditioning.dc_pole) {
            return Err(ConfigError::DcPole(self.conditioning.dc_pole));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_bins(), 513);
        assert_eq!(config.hop_size, config.fft_size / 2);
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        let bad_fft = EngineConfig { fft_size: 1023, ..Default::default() };
        assert!(matches!(bad_fft.validate(), Err(ConfigError::FftSize(1023))));

        let zero_hop = EngineConfig { hop_size: 0, ..Default::default() };
        assert!(matches!(zero_hop.validate(), Err(ConfigError::HopSize { .. })));

        let big_hop = EngineConfig { hop_size: 1024, ..Default::default() };
        assert!(matches!(big_hop.validate(), Err(ConfigError::HopSize { .. })));

        let odd_hop = EngineConfig { hop_size: 300, ..Default::default() };
        assert!(matches!(odd_hop.validate(), Err(ConfigError::HopSize { .. })));

        let no_channels = EngineConfig { channels: 0, ..Default::default() };
        assert!(matches!(no_channels.validate(), Err(ConfigError::Channels { got: 0 })));

        let too_many = EngineConfig { channels: 3, ..Default::default() };
        assert!(matches!(too_many.validate(), Err(ConfigError::Channels { got: 3 })));

        let no_columns = EngineConfig { mask_columns: 0, ..Default::default() };
        assert!(matches!(no_columns.validate(), Err(ConfigError::MaskColumns)));
    }

    #[test]
    fn test_rejects_bad_scalars() {
        let threshold = EngineConfig { phase_lock_threshold: 1.5, ..Default::default() };
        assert!(matches!(threshold.validate(), Err(ConfigError::PeakThreshold(_))));

        let release = EngineConfig {
            gate_policy: GatePolicy::SmoothedPeak { release: 1.0 },
            ..Default::default()
        };
        assert!(matches!(release.validate(), Err(ConfigError::GateRelease(_))));

        let mut headroom = EngineConfig::default();
        headroom.conditioning.headroom = 0.0;
        assert!(matches!(headroom.validate(), Err(ConfigError::Headroom(_))));

        let mut pole = EngineConfig::default();
        pole.conditioning.dc_pole = 1.0;
        assert!(matches!(pole.validate(), Err(ConfigError::DcPole(_))));
    }

    #[test]
    fn test_toml_partial_document() {
        let config = EngineConfig::from_toml_str(
            r#"
            fft_size = 2048
            hop_size = 512
            channels = 1

            [gate_policy]
            kind = "smoothed_peak"
            release = 0.9

            [conditioning]
            enabled = false
            "#,
        )
        .expect("valid config");

        assert_eq!(config.fft_size, 2048);
        assert_eq!(config.hop_size, 512);
        assert_eq!(config.channels, 1);
        assert_eq!(config.mask_columns, DEFAULT_COLUMNS);
        assert_eq!(config.gate_policy, GatePolicy::SmoothedPeak { release: 0.9 });
        assert!(!config.conditioning.enabled);
        assert_eq!(config.conditioning.dc_pole, 0.995);
    }

    #[test]
    fn test_toml_empty_document_is_default() {
        let config = EngineConfig::from_toml_str("").expect("empty config");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_toml_errors() {
        assert!(matches!(
            EngineConfig::from_toml_str("fft_size = \"big\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("fft_size = 6\nhop_size = 4"),
            Err(ConfigError::HopSize { .. })
        ));
    }
}
