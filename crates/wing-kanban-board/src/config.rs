/*
[INPUT]:  Optional YAML configuration file + WING_KANBAN__* environment variables
[OUTPUT]: Validated board configuration
[POS]:    Configuration layer - backend, realtime, storage and logging setup
[UPDATE]: When adding new configuration options
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use wing_kanban_adapter::{ClientConfig, RealtimeConfig};

use crate::change_feed::ChangeFeedOptions;

pub const ENV_PREFIX: &str = "WING_KANBAN";
const APP_DIR: &str = "wing-kanban";

/// Which TaskRemote the store talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Remote,
    Local,
}

/// Top-level configuration for the board
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BoardConfig {
    pub backend: Backend,
    pub remote: RemoteConfig,
    pub realtime: RealtimeSettings,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Hosted task table connection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Project root, e.g. `https://xyz.supabase.co`
    pub url: Option<String>,
    /// Public (anon) API key
    pub api_key: Option<String>,
    pub table: String,
    pub schema: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            url: None,
            api_key: None,
            table: client.table,
            schema: client.schema,
            timeout_secs: client.timeout.as_secs(),
            connect_timeout_secs: client.connect_timeout.as_secs(),
        }
    }
}

impl RemoteConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            table: self.table.clone(),
            schema: self.schema.clone(),
        }
    }
}

/// Change-feed subscription
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RealtimeSettings {
    pub enabled: bool,
    pub heartbeat_secs: u64,
    pub join_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            heartbeat_secs: 30,
            join_timeout_secs: 10,
            max_retries: ChangeFeedOptions::default().max_retries,
        }
    }
}

impl RealtimeSettings {
    pub fn socket_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            heartbeat_interval: Duration::from_secs(self.heartbeat_secs),
            ..RealtimeConfig::default()
        }
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }

    pub fn feed_options(&self) -> ChangeFeedOptions {
        ChangeFeedOptions {
            max_retries: self.max_retries,
            ..ChangeFeedOptions::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot directory; platform data dir when unset
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from(".").join(format!(".{APP_DIR}")))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `wing_kanban_board=debug`
    pub level: String,
    /// Also append logs to this file when set
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl BoardConfig {
    /// Load from an optional YAML file, then apply `WING_KANBAN__*` overrides
    /// (e.g. `WING_KANBAN__REMOTE__API_KEY`).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .context("read configuration sources")?
            .try_deserialize()
            .context("parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend == Backend::Remote {
            let url = self.remote.url.as_deref().unwrap_or_default();
            if url.trim().is_empty() {
                bail!("remote backend requires remote.url");
            }
            let api_key = self.remote.api_key.as_deref().unwrap_or_default();
            if api_key.trim().is_empty() {
                bail!("remote backend requires remote.api_key");
            }
        }
        if self.realtime.enabled && self.realtime.heartbeat_secs == 0 {
            bail!("realtime.heartbeat_secs must be positive");
        }
        Ok(())
    }

    /// Starter file for `init-config`
    pub fn template() -> Self {
        Self {
            remote: RemoteConfig {
                url: Some("https://your-project.supabase.co".to_string()),
                api_key: Some("your-anon-key".to_string()),
                ..RemoteConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        serde_yaml::to_string(self).context("failed to serialize config to YAML")
    }
}
