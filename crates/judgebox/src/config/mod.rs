use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::language::{FileExtension, LanguageConfig, LanguageId, expand_command};

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Also the source of the default language profiles.
pub const EXAMPLE_CONFIG: &str = include_str!("../../judgebox.example.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid characters in file extension")]
    InvalidFileExtChars,

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("language '{0}' not found in configuration")]
    LanguageNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which executor a run may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationMode {
    /// Probe the container runtime per request, fall back to native processes
    #[default]
    Auto,
    /// Container runtime only; fail when it is unavailable
    Sandboxed,
    /// Native processes only
    Native,
}

/// Container settings for the sandboxed executor
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Container runtime CLI (docker, podman)
    pub runtime: PathBuf,
    pub memory_mb: u64,
    pub cpus: f64,
    pub pids_limit: u32,
    /// uid:gid the submission runs as
    pub user: String,
    /// Size of the /tmp tmpfs
    pub tmpfs_size_mb: u64,
    pub probe_timeout_ms: u64,
}

impl ContainerConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            runtime: PathBuf::from("docker"),
            memory_mb: 128,
            cpus: 0.5,
            pids_limit: 64,
            user: "65534:65534".to_string(),
            tmpfs_size_mb: 64,
            probe_timeout_ms: 5000,
        }
    }
}

/// Per-key submission throttling
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    pub max_attempts: usize,
    pub window_secs: u64,
}

/// Config for judgebox
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory under which per-execution workspaces are created
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    #[serde(default)]
    pub isolation: IsolationMode,

    /// Longest accepted submission, in characters
    #[serde(default = "default_max_source_chars")]
    pub max_source_chars: usize,

    /// Captured bytes per stream; anything beyond is discarded
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Wall-clock limit for native compile steps
    #[serde(default = "default_compile_timeout_ms")]
    pub compile_timeout_ms: u64,

    #[serde(default)]
    pub container: ContainerConfig,

    #[serde(default)]
    pub throttle: Option<ThrottleConfig>,

    /// Language configurations keyed by language ID
    #[serde(default)]
    pub languages: HashMap<String, LanguageConfig>,
}

impl Config {
    /// Create a new config with embedded default languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no languages
    pub fn empty() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            isolation: IsolationMode::Auto,
            max_source_chars: default_max_source_chars(),
            max_output_bytes: default_max_output_bytes(),
            compile_timeout_ms: default_compile_timeout_ms(),
            container: ContainerConfig::default(),
            throttle: None,
            languages: HashMap::new(),
        }
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("judgebox")
}

fn default_max_source_chars() -> usize {
    10_000
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

fn default_compile_timeout_ms() -> u64 {
    30_000
}
