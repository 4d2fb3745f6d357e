use anyhow::{anyhow, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_QUEUE_URI: &str = "nats://127.0.0.1:4222";
const DEFAULT_QUEUE_NAME: &str = "requestQueue";
const DEFAULT_CONSUMER_NAME: &str = "threadline";
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_DELIVERIES: u32 = 5;

#[derive(Debug, Clone)]
pub struct ThreadlineConfig {
    pub paths: ThreadlinePaths,
    pub queue: QueueConfig,
    pub store: StoreConfig,
    pub mutations: MutationConfig,
}

impl ThreadlineConfig {
    pub fn from_env() -> Result<Self> {
        let paths = ThreadlinePaths::discover()?;
        Ok(Self::from_env_with_paths(paths))
    }

    pub fn from_env_with_paths(paths: ThreadlinePaths) -> Self {
        let queue = QueueConfig::from_env();
        let store = StoreConfig::from_env(&paths);
        let mutations = MutationConfig::from_env();
        Self {
            paths,
            queue,
            store,
            mutations,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub uri: String,
    pub queue_name: String,
    pub consumer_name: String,
    /// Delivery attempts a message may keep failing before the consumer stops.
    pub max_deliveries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_QUEUE_URI.to_string(),
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            consumer_name: DEFAULT_CONSUMER_NAME.to_string(),
            max_deliveries: DEFAULT_MAX_DELIVERIES,
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            uri: non_empty_var("THREADLINE_QUEUE_URI").unwrap_or(defaults.uri),
            queue_name: non_empty_var("THREADLINE_QUEUE").unwrap_or(defaults.queue_name),
            consumer_name: non_empty_var("THREADLINE_CONSUMER").unwrap_or(defaults.consumer_name),
            max_deliveries: non_empty_var("THREADLINE_MAX_DELIVERIES")
                .and_then(|raw| raw.trim().parse::<u32>().ok())
                .filter(|max| *max > 0)
                .unwrap_or(defaults.max_deliveries),
        }
    }
}

/// Where documents live. `memory` keeps everything in-process and is lost on exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Sqlite(PathBuf),
    Memory,
}

impl StoreLocation {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("memory") {
            return StoreLocation::Memory;
        }
        let path = trimmed.strip_prefix("sqlite://").unwrap_or(trimmed);
        StoreLocation::Sqlite(PathBuf::from(path))
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub location: StoreLocation,
    pub operation_timeout: Duration,
}

impl StoreConfig {
    pub fn from_env(paths: &ThreadlinePaths) -> Self {
        let location = non_empty_var("THREADLINE_STORE")
            .map(|raw| StoreLocation::parse(&raw))
            .unwrap_or_else(|| StoreLocation::Sqlite(paths.db_path.clone()));
        let timeout_ms = env::var("THREADLINE_STORE_TIMEOUT_MS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(DEFAULT_STORE_TIMEOUT_MS);
        Self {
            location,
            operation_timeout: Duration::from_millis(timeout_ms),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MutationConfig {
    /// Push every new thread id into the unread list of each of the author's friends.
    pub fan_out_unread: bool,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            fan_out_unread: true,
        }
    }
}

impl MutationConfig {
    pub fn from_env() -> Self {
        // Enabled unless explicitly switched off
        let fan_out_unread = env::var("THREADLINE_FANOUT_UNREAD")
            .ok()
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(true);
        Self { fan_out_unread }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ThreadlinePaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl ThreadlinePaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Ok(Self::from_base_dir(base))
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Self {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("threadline.db");
        let logs_dir = base.join("logs");
        Self {
            base,
            data_dir,
            db_path,
            logs_dir,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|raw| {
        if raw.trim().is_empty() {
            None
        } else {
            Some(raw)
        }
    })
}
