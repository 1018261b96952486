use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::convert::ConverterSettings;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub converter: ConverterConfig,

    #[serde(default)]
    pub staging: StagingConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub callback: CallbackConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConverterConfig {
    /// Converter executable; resolved against PATH when not absolute.
    #[serde(default = "default_program")]
    pub program: PathBuf,

    /// Argument template; `{input}` and `{outdir}` are substituted per job.
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// File extension the converter is expected to produce.
    #[serde(default = "default_output_extension")]
    pub output_extension: String,

    /// Default wall-clock budget per conversion, in seconds.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// Upper bound on caller-supplied deadlines, in seconds.
    #[serde(default = "default_max_deadline_secs")]
    pub max_deadline_secs: u64,

    /// Grace period between the graceful and the forceful kill, in seconds.
    #[serde(default = "default_kill_grace_secs")]
    pub kill_grace_secs: u64,
}

fn default_program() -> PathBuf {
    PathBuf::from("soffice")
}

fn default_args() -> Vec<String> {
    vec![
        "--headless".to_string(),
        "--convert-to".to_string(),
        "pdf".to_string(),
        "--outdir".to_string(),
        "{outdir}".to_string(),
        "{input}".to_string(),
    ]
}

fn default_output_extension() -> String {
    "pdf".to_string()
}

fn default_deadline_secs() -> u64 {
    60
}
fn default_max_deadline_secs() -> u64 {
    300
}
fn default_kill_grace_secs() -> u64 {
    5
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            output_extension: default_output_extension(),
            deadline_secs: default_deadline_secs(),
            max_deadline_secs: default_max_deadline_secs(),
            kill_grace_secs: default_kill_grace_secs(),
        }
    }
}

impl ConverterConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn max_deadline(&self) -> Duration {
        Duration::from_secs(self.max_deadline_secs)
    }

    /// Supervisor settings derived from this config section.
    pub fn settings(&self) -> ConverterSettings {
        ConverterSettings {
            program: self.program.clone(),
            args: self.args.clone(),
            output_extension: self.output_extension.clone(),
            kill_grace: Duration::from_secs(self.kill_grace_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StagingConfig {
    /// Root directory staged inputs and output directories live under.
    #[serde(default = "default_staging_dir")]
    pub dir: PathBuf,
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join("docpress")
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: default_staging_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Delay inserted between sequential job dispatches, in milliseconds.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Maximum number of pending jobs before enqueue applies backpressure.
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

fn default_cooldown_ms() -> u64 {
    1000
}
fn default_queue_capacity() -> usize {
    100
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            capacity: default_queue_capacity(),
        }
    }
}

impl QueueConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackConfig {
    /// Shared secret sent in the callback secret header. Optional; its
    /// absence never prevents delivery.
    #[serde(default)]
    pub secret: Option<String>,

    /// Per-delivery HTTP timeout, in seconds.
    #[serde(default = "default_callback_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_callback_timeout_secs() -> u64 {
    10
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            secret: None,
            timeout_secs: default_callback_timeout_secs(),
        }
    }
}

impl CallbackConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
