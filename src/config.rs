// Configuration management

use crate::error::{Result, TunnelError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the journal is read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JournalBackend {
    /// Spawn `journalctl -o json`
    #[default]
    Journalctl,
    /// Link against libsystemd
    SdJournal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recent_log_lines: usize,
    pub backfill_entries: usize,
    pub write_deadline_secs: u64,
    pub follow_poll_millis: u64,
    pub journal_backend: JournalBackend,
    pub journalctl_path: PathBuf,
    pub tunnel_config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recent_log_lines: 100,
            backfill_entries: 100,
            write_deadline_secs: 10,
            follow_poll_millis: 1000,
            journal_backend: JournalBackend::Journalctl,
            journalctl_path: PathBuf::from("journalctl"),
            tunnel_config_path: PathBuf::from("/etc/cloudflared/config.yml"),
        }
    }
}

impl Config {
    /// Get default config path: ~/.config/tunnelkeeper/config.yaml
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            TunnelError::Config("Could not determine config directory".to_string())
        })?;
        Ok(config_dir.join("tunnelkeeper").join("config.yaml"))
    }

    /// Load config from path, falling back to defaults if not found
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };

        if !config_path.exists() {
            tracing::debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(|e| {
            TunnelError::Config(format!("{}: {}", config_path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make streaming spin or never write
    pub fn validate(&self) -> Result<()> {
        if self.write_deadline_secs == 0 {
            return Err(TunnelError::Config(
                "write_deadline_secs must be greater than zero".to_string(),
            ));
        }
        if self.follow_poll_millis == 0 {
            return Err(TunnelError::Config(
                "follow_poll_millis must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
