use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MediaError, Result};
use crate::models::{DeviceIdentity, ProtocolKind, ServerContext};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Configuration {
    pub device: Option<DeviceConfig>,
    /// Name of the server the adapter talks to.
    pub active: Option<String>,
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    pub playback: Option<PlaybackConfig>,
    #[serde(rename = "logLevel")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeviceConfig {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub name: String,
    pub protocol: ProtocolKind,
    pub address: String,
    #[serde(rename = "accessToken", default)]
    pub access_token: String,
    /// Required for playback on both protocols. On Plex this is the account or
    /// managed-user id; browsing works without it.
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("name", &self.name)
            .field("protocol", &self.protocol)
            .field("address", &self.address)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlaybackConfig {
    #[serde(rename = "maxBitrate")]
    pub max_bitrate: Option<u64>,
    #[serde(rename = "progressIntervalSeconds")]
    pub progress_interval_seconds: Option<u64>,
}

impl Configuration {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Configuration = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// The foreground server: the one named by `active`, else the first.
    /// `Ok(None)` when no server is registered at all.
    pub fn active_server(&self) -> Result<Option<ServerContext>> {
        let server = match self.active.as_deref() {
            Some(name) => Some(
                self.servers
                    .iter()
                    .find(|s| s.name == name)
                    .ok_or_else(|| {
                        MediaError::InvalidConfig(format!("active server '{}' is not defined", name))
                    })?,
            ),
            None => self.servers.first(),
        };

        Ok(server.map(|s| {
            ServerContext::new(
                s.protocol,
                s.address.as_str(),
                s.access_token.as_str(),
                s.user_id.clone(),
            )
        }))
    }

    /// Device identity; a fresh id is generated when none is configured.
    pub fn device_identity(&self) -> DeviceIdentity {
        let mut identity = DeviceIdentity::default();
        if let Some(device) = &self.device {
            if let Some(id) = device.id.as_deref().filter(|id| !id.is_empty()) {
                identity.id = id.to_string();
            }
            if let Some(name) = device.name.as_deref().filter(|n| !n.is_empty()) {
                identity.name = name.to_string();
            }
        }
        identity
    }

    pub fn max_bitrate(&self) -> Option<u64> {
        self.playback.as_ref().and_then(|p| p.max_bitrate)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(
            self.playback
                .as_ref()
                .and_then(|p| p.progress_interval_seconds)
                .filter(|s| *s > 0)
                .unwrap_or(10),
        )
    }

    pub fn protocol_of(&self, name: &str) -> Option<ProtocolKind> {
        self.servers.iter().find(|s| s.name == name).map(|s| s.protocol)
    }
}
