use crate::error::{Error, Result};
use crate::utils::consts::{
    DEFAULT_BIT_LEVEL, DEFAULT_CHUNK_SIZE, DEFAULT_INPUT_PATH, DEFAULT_NOISE_STD_DEV,
    MAX_BIT_LEVEL, RESTORE_PREFIX, SYMBOL_FILE_SUFFIX,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Constellation size M = 2^L, with L even so the bits split evenly
/// between the x and y coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModulationOrder {
    bit_level: u32,
}

impl ModulationOrder {
    pub fn from_bit_level(bit_level: u32) -> Result<Self> {
        if bit_level == 0 {
            return Err(Error::InvalidModulationOrder(
                "bits per symbol is zero".to_string(),
            ));
        }
        if bit_level % 2 != 0 {
            return Err(Error::InvalidModulationOrder(format!(
                "bits per symbol ({}) must be even to split between x and y",
                bit_level
            )));
        }
        if bit_level > MAX_BIT_LEVEL {
            return Err(Error::InvalidModulationOrder(format!(
                "bits per symbol ({}) exceeds the supported maximum of {}",
                bit_level, MAX_BIT_LEVEL
            )));
        }
        Ok(Self { bit_level })
    }

    /// Build from the number of constellation points M.
    pub fn from_points(points: u128) -> Result<Self> {
        if !points.is_power_of_two() {
            return Err(Error::InvalidModulationOrder(format!(
                "M = {} is not a power of two",
                points
            )));
        }
        Self::from_bit_level(points.trailing_zeros())
    }

    pub fn points(&self) -> u128 {
        1u128 << self.bit_level
    }

    pub fn bits_per_symbol(&self) -> usize {
        self.bit_level as usize
    }

    pub fn bits_per_coordinate(&self) -> usize {
        self.bit_level as usize / 2
    }

    /// Largest value a coordinate can carry without noise.
    pub fn max_coordinate(&self) -> i64 {
        (1i64 << self.bits_per_coordinate()) - 1
    }
}

/// What the receiver does with a noisy coordinate that left
/// `[0, max_coordinate]`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Saturate into the representable range.
    #[default]
    Clamp,
    /// Keep only the low bits (two's-complement extraction).
    Wrap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Exponent L of M = 2^L
    pub modulation_bit_level: u32,
    /// Gaussian sigma added to each coordinate
    pub noise_std_dev: f64,
    pub chunk_size_bytes: usize,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Base path for persisted symbols; `None` keeps them in memory
    pub symbol_path: Option<PathBuf>,
    pub keep_symbol_files: bool,
    pub overflow: OverflowPolicy,
    /// Base seed for the channel noise; drawn from entropy when absent
    pub seed: Option<u64>,
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let input_path = PathBuf::from(DEFAULT_INPUT_PATH);
        Self {
            modulation_bit_level: DEFAULT_BIT_LEVEL,
            noise_std_dev: DEFAULT_NOISE_STD_DEV,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            output_path: default_output_path(&input_path),
            symbol_path: Some(default_symbol_path(&input_path)),
            input_path,
            keep_symbol_files: false,
            overflow: OverflowPolicy::Clamp,
            seed: None,
            workers: 1,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON configuration file. Missing fields take their defaults;
    /// a missing `output_path` or `symbol_path` is derived from the file's
    /// `input_path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text).map_err(|e| {
            Error::Config(format!("invalid config {}: {}", path.display(), e))
        })
    }

    fn from_json(text: &str) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let has_output = value.get("output_path").is_some();
        let has_symbols = value.get("symbol_path").is_some();

        let mut config: Self = serde_json::from_value(value)?;
        if !has_output {
            config.output_path = default_output_path(&config.input_path);
        }
        if !has_symbols {
            config.symbol_path = Some(default_symbol_path(&config.input_path));
        }
        Ok(config)
    }

    /// Check every option before any I/O happens.
    pub fn validate(&self) -> Result<ModulationOrder> {
        let order = ModulationOrder::from_bit_level(self.modulation_bit_level)?;

        if !self.noise_std_dev.is_finite() || self.noise_std_dev < 0.0 {
            return Err(Error::Config(format!(
                "noise standard deviation must be finite and non-negative, got {}",
                self.noise_std_dev
            )));
        }
        if self.chunk_size_bytes == 0 {
            return Err(Error::Config("chunk size must be at least 1 byte".to_string()));
        }
        if self.workers == 0 {
            return Err(Error::Config("at least one worker is required".to_string()));
        }
        if self.input_path.as_os_str().is_empty() {
            return Err(Error::Config("no input path given".to_string()));
        }

        Ok(order)
    }
}

/// `restore_<name>` next to the input file.
pub fn default_output_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}{}", RESTORE_PREFIX, name))
}

/// `<input>-modulation.csv`
pub fn default_symbol_path(input: &Path) -> PathBuf {
    let mut path = input.as_os_str().to_owned();
    path.push(SYMBOL_FILE_SUFFIX);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_order() {
        let order = ModulationOrder::from_bit_level(64).unwrap();
        assert_eq!(order.bits_per_symbol(), 64);
        assert_eq!(order.bits_per_coordinate(), 32);
        assert_eq!(order.max_coordinate(), u32::MAX as i64);
        assert_eq!(order.points(), 1u128 << 64);
    }

    #[test]
    fn test_sixteen_points() {
        let order = ModulationOrder::from_points(16).unwrap();
        assert_eq!(order.bits_per_symbol(), 4);
        assert_eq!(order.bits_per_coordinate(), 2);
        assert_eq!(order.max_coordinate(), 3);
    }

    #[test]
    fn test_invalid_orders() {
        for points in [0u128, 1, 2, 8, 12, 32, 100] {
            assert!(
                matches!(
                    ModulationOrder::from_points(points),
                    Err(Error::InvalidModulationOrder(_))
                ),
                "M = {} should be rejected",
                points
            );
        }
        assert!(ModulationOrder::from_bit_level(0).is_err());
        assert!(ModulationOrder::from_bit_level(7).is_err());
        assert!(ModulationOrder::from_bit_level(66).is_err());
        assert!(ModulationOrder::from_points(4).is_ok());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert_eq!(config.modulation_bit_level, 64);
        assert_eq!(config.chunk_size_bytes, 8192);
        assert!((config.noise_std_dev - 0.20).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_options() {
        let mut config = PipelineConfig::default();
        config.noise_std_dev = -1.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = PipelineConfig::default();
        config.noise_std_dev = f64::NAN;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = PipelineConfig::default();
        config.chunk_size_bytes = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = PipelineConfig::default();
        config.modulation_bit_level = 5;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidModulationOrder(_))
        ));
    }

    #[test]
    fn test_derived_paths() {
        let input = Path::new("media/input_video.mp4");
        assert_eq!(
            default_output_path(input),
            PathBuf::from("media/restore_input_video.mp4")
        );
        assert_eq!(
            default_symbol_path(input),
            PathBuf::from("media/input_video.mp4-modulation.csv")
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "noise_std_dev": 1.5, "overflow": "wrap" }"#).unwrap();
        assert_eq!(config.overflow, OverflowPolicy::Wrap);
        assert!((config.noise_std_dev - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.modulation_bit_level, 64);
    }

    #[test]
    fn test_paths_follow_configured_input() {
        let config = PipelineConfig::from_json(r#"{ "input_path": "media/clip.mp4" }"#).unwrap();
        assert_eq!(config.output_path, PathBuf::from("media/restore_clip.mp4"));
        assert_eq!(
            config.symbol_path,
            Some(PathBuf::from("media/clip.mp4-modulation.csv"))
        );
    }

    #[test]
    fn test_explicit_paths_are_kept() {
        let config = PipelineConfig::from_json(
            r#"{ "input_path": "clip.mp4", "output_path": "out.bin", "symbol_path": null }"#,
        )
        .unwrap();
        assert_eq!(config.output_path, PathBuf::from("out.bin"));
        assert_eq!(config.symbol_path, None);
    }
}
