// The tunnel daemon's config.yml

use crate::error::{Result, TunnelError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const DEFAULT_TUNNEL_CONFIG_PATH: &str = "/etc/cloudflared/config.yml";

/// Mode the daemon config is written with
const FILE_MODE: u32 = 0o644;

/// Daemon settings this tool understands; anything else is carried through untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TunnelConfig {
    #[serde(rename = "tunnel", default, skip_serializing_if = "Option::is_none")]
    pub tunnel_id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<IngressRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<String>,

    #[serde(rename = "loglevel", default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    #[serde(flatten)]
    pub additional: BTreeMap<String, serde_yaml::Value>,
}

/// Maps a hostname (and optional path) to a local service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default)]
    pub service: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl TunnelConfig {
    /// An ingress list must exist and end in a rule that routes somewhere
    pub fn validate(&self) -> std::result::Result<(), String> {
        let Some(last) = self.ingress.last() else {
            return Err("ingress rules are required".to_string());
        };
        if last.service.is_empty() {
            return Err("last ingress rule must have a service".to_string());
        }
        Ok(())
    }
}

fn resolve(path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() {
        PathBuf::from(DEFAULT_TUNNEL_CONFIG_PATH)
    } else {
        path.to_path_buf()
    }
}

/// Read and parse the daemon config; an empty path means the default location
pub fn read(path: &Path) -> Result<TunnelConfig> {
    let path = resolve(path);
    let data = fs::read_to_string(&path)?;
    serde_yaml::from_str(&data).map_err(|e| TunnelError::TunnelConfig {
        path,
        message: format!("failed to parse config: {}", e),
    })
}

/// Serialize `config` to `path` with mode 0644
pub fn write(path: &Path, config: &TunnelConfig) -> Result<()> {
    let path = resolve(path);
    let data = serde_yaml::to_string(config).map_err(|e| TunnelError::TunnelConfig {
        path: path.clone(),
        message: format!("failed to marshal config: {}", e),
    })?;

    fs::write(&path, data)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(FILE_MODE))?;
    tracing::info!("Wrote tunnel config to {}", path.display());
    Ok(())
}

/// Validate `config`, naming `path` in the error
pub fn validate(path: &Path, config: &TunnelConfig) -> Result<()> {
    config.validate().map_err(|message| TunnelError::TunnelConfig {
        path: resolve(path),
        message,
    })
}
