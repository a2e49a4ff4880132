mod image;
mod item;
mod playback;
mod query;

use serde::{Deserialize, Serialize};

pub use image::{ImagePreferences, ImageType, ResolvedImage};
pub use item::{
    CommentaryKey, ItemKind, MediaItem, MediaPerson, MediaSource, MediaStream, MediaUserData,
    RawPayload, StreamKind,
};
pub use playback::{
    DeviceCapabilities, NegotiateRequest, PlayMethod, PlaybackReport, StreamInfo,
};
pub use query::{FilterValues, Filters, Page, PageRequest, SortKey, SortOrder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    /// Jellyfin and Emby share one wire shape.
    #[serde(alias = "emby")]
    Jellyfin,
    Plex,
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jellyfin => write!(f, "jellyfin"),
            Self::Plex => write!(f, "plex"),
        }
    }
}

/// Connection context for one configured server, as handed over by the
/// server registry.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerContext {
    pub address: String,
    pub access_token: String,
    pub user_id: Option<String>,
    pub protocol: ProtocolKind,
}

impl ServerContext {
    pub fn new(
        protocol: ProtocolKind,
        address: impl Into<String>,
        access_token: impl Into<String>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            address: address.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            user_id: user_id.filter(|id| !id.is_empty()),
            protocol,
        }
    }

    pub fn base_url(&self) -> &str {
        self.address.trim_end_matches('/')
    }
}

impl std::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("address", &self.address)
            .field("access_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("protocol", &self.protocol)
            .finish()
    }
}

/// How this client identifies itself to servers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub id: String,
    pub name: String,
    pub client: String,
    pub version: String,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: "mediaplex".to_string(),
            client: "mediaplex".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub protocol: ProtocolKind,
}
