/// 日志级别（可被 RUST_LOG 覆盖）
pub const LOG_LEVEL: &str = "info";

// ============================================================================
// Modulation Parameters
// ============================================================================

/// Default exponent L of M = 2^L
pub const DEFAULT_BIT_LEVEL: u32 = 64;

/// Largest supported L; each coordinate then carries 32 bits
pub const MAX_BIT_LEVEL: u32 = 64;

/// Default Gaussian sigma per coordinate
pub const DEFAULT_NOISE_STD_DEV: f64 = 0.20;

/// Bytes read per iteration
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

// ============================================================================
// Paths
// ============================================================================

pub const DEFAULT_INPUT_PATH: &str = "input_video.mp4";

/// Prefix of the reconstructed output file name
pub const RESTORE_PREFIX: &str = "restore_";

/// Appended to the input path to name the symbol records
pub const SYMBOL_FILE_SUFFIX: &str = "-modulation.csv";
