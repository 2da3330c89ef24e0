// Execution limits shared by the engine and its callers

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_COMPILE_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_MAX_SOURCE_BYTES: usize = 1024 * 1024; // 1MB
pub const DEFAULT_MAX_INPUT_BYTES: usize = 10 * 1024 * 1024; // 10MB
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024; // 4MB

#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Wall-clock budget for each test case
    pub timeout_ms: u64,
    pub compile_timeout_ms: u64,
    pub max_source_bytes: usize,
    pub max_input_bytes: usize,
    /// Per stream; anything beyond is discarded
    pub max_output_bytes: usize,
    /// Parent directory for per-invocation scratch directories
    pub scratch_root: PathBuf,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            compile_timeout_ms: DEFAULT_COMPILE_TIMEOUT_MS,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            scratch_root: std::env::temp_dir().join("crucible"),
        }
    }
}

impl ExecutionConfig {
    /// Build from CRUCIBLE_* environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout_ms: env_or("CRUCIBLE_TIMEOUT_MS", defaults.timeout_ms),
            compile_timeout_ms: env_or("CRUCIBLE_COMPILE_TIMEOUT_MS", defaults.compile_timeout_ms),
            max_source_bytes: env_or("CRUCIBLE_MAX_SOURCE_BYTES", defaults.max_source_bytes),
            max_input_bytes: env_or("CRUCIBLE_MAX_INPUT_BYTES", defaults.max_input_bytes),
            max_output_bytes: env_or("CRUCIBLE_MAX_OUTPUT_BYTES", defaults.max_output_bytes),
            scratch_root: std::env::var("CRUCIBLE_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_root),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_scratch_root(mut self, scratch_root: impl Into<PathBuf>) -> Self {
        self.scratch_root = scratch_root.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }
}

fn env_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key = key, value = %raw, "Ignoring unparsable configuration value");
                default
            }
        },
        Err(_) => default,
    }
}
