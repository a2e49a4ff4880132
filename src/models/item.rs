use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jellyfin::types::JellyfinItem;
use crate::plex::types::PlexMetadata;

use super::ProtocolKind;

/// Kind tag of a library entity.
///
/// Unknown native kinds land in `Other` with the native tag preserved, so
/// they can still be passed back to the server verbatim in filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Movie,
    Series,
    Season,
    Episode,
    MusicVideo,
    BoxSet,
    Folder,
    CollectionFolder,
    Playlist,
    MusicAlbum,
    Audio,
    Photo,
    Video,
    TvChannel,
    Program,
    Person,
    Other(String),
}

impl ItemKind {
    pub fn is_playable(&self) -> bool {
        matches!(
            self,
            Self::Movie
                | Self::Episode
                | Self::MusicVideo
                | Self::Video
                | Self::Audio
                | Self::TvChannel
                | Self::Program
        )
    }

    /// Live programs are negotiated against their channel.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Program | Self::TvChannel)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaUserData {
    pub played: bool,
    /// 0 to 100
    pub played_percentage: Option<f64>,
    pub is_favorite: bool,
    pub playback_position_ticks: i64,
    pub play_count: Option<u32>,
    pub last_played: Option<DateTime<Utc>>,
    pub unplayed_item_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaPerson {
    pub id: Option<String>,
    pub name: String,
    pub role: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
}

/// One elementary stream. `index` is the server's own track handle and is
/// what track selection must be called with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaStream {
    pub kind: StreamKind,
    pub index: i32,
    pub codec: Option<String>,
    pub language: Option<String>,
    pub title: Option<String>,
    pub display_title: Option<String>,
    pub is_default: bool,
    pub is_forced: bool,
    pub is_external: bool,
    pub bitrate: Option<u64>,
    // video
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    pub profile: Option<String>,
    pub bit_depth: Option<u32>,
    // audio
    pub channels: Option<u32>,
    pub channel_layout: Option<String>,
    pub sample_rate: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSource {
    pub id: Option<String>,
    pub name: Option<String>,
    pub container: Option<String>,
    pub protocol: Option<String>,
    pub size: Option<u64>,
    pub bitrate: Option<u64>,
    pub run_time_ticks: Option<i64>,
    pub supports_direct_play: bool,
    pub supports_transcoding: bool,
    pub streams: Vec<MediaStream>,
}

impl MediaSource {
    pub fn video_stream(&self) -> Option<&MediaStream> {
        self.streams.iter().find(|s| s.kind == StreamKind::Video)
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &MediaStream> {
        self.streams.iter().filter(|s| s.kind == StreamKind::Audio)
    }

    pub fn subtitle_streams(&self) -> impl Iterator<Item = &MediaStream> {
        self.streams.iter().filter(|s| s.kind == StreamKind::Subtitle)
    }

    /// Native index of the default audio track, else the first one.
    pub fn default_audio_index(&self) -> Option<i32> {
        self.audio_streams()
            .find(|s| s.is_default)
            .or_else(|| self.audio_streams().next())
            .map(|s| s.index)
    }

    /// Native index of the default or forced subtitle track. No fallback:
    /// subtitles stay off unless the server marks one.
    pub fn default_subtitle_index(&self) -> Option<i32> {
        self.subtitle_streams()
            .find(|s| s.is_default || s.is_forced)
            .map(|s| s.index)
    }

    pub fn stream_by_index(&self, kind: StreamKind, index: i32) -> Option<&MediaStream> {
        self.streams
            .iter()
            .find(|s| s.kind == kind && s.index == index)
    }
}

/// Opaque handle on the server payload an item was normalized from.
#[derive(Debug, Clone, Default)]
pub struct RawPayload(pub(crate) RawInner);

#[derive(Debug, Clone, Default)]
pub(crate) enum RawInner {
    #[default]
    Empty,
    Jellyfin(Box<JellyfinItem>),
    Plex(Box<PlexMetadata>),
}

impl RawPayload {
    pub(crate) fn jellyfin(item: JellyfinItem) -> Self {
        Self(RawInner::Jellyfin(Box::new(item)))
    }

    pub(crate) fn plex(item: PlexMetadata) -> Self {
        Self(RawInner::Plex(Box::new(item)))
    }

    pub(crate) fn as_jellyfin(&self) -> Option<&JellyfinItem> {
        match &self.0 {
            RawInner::Jellyfin(item) => Some(item),
            _ => None,
        }
    }

    pub(crate) fn as_plex(&self) -> Option<&PlexMetadata> {
        match &self.0 {
            RawInner::Plex(item) => Some(item),
            _ => None,
        }
    }

    pub fn protocol(&self) -> Option<ProtocolKind> {
        match &self.0 {
            RawInner::Empty => None,
            RawInner::Jellyfin(_) => Some(ProtocolKind::Jellyfin),
            RawInner::Plex(_) => Some(ProtocolKind::Plex),
        }
    }

    /// The payload as the server sent it, for debugging and display.
    pub fn to_json(&self) -> serde_json::Value {
        let value = match &self.0 {
            RawInner::Empty => Ok(serde_json::Value::Null),
            RawInner::Jellyfin(item) => serde_json::to_value(item),
            RawInner::Plex(item) => serde_json::to_value(item),
        };
        value.unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: Option<String>,
    pub name: Option<String>,
    pub kind: ItemKind,
    pub original_title: Option<String>,
    pub parent_id: Option<String>,
    pub series_id: Option<String>,
    pub series_name: Option<String>,
    pub season_id: Option<String>,
    pub season_name: Option<String>,
    pub channel_id: Option<String>,
    /// Episode number, or track number.
    pub index_number: Option<i32>,
    /// Season number of an episode.
    pub parent_index_number: Option<i32>,
    pub production_year: Option<i32>,
    pub premiere_date: Option<DateTime<Utc>>,
    pub overview: Option<String>,
    pub community_rating: Option<f64>,
    pub official_rating: Option<String>,
    pub genres: Vec<String>,
    pub studios: Vec<String>,
    pub tags: Vec<String>,
    pub people: Vec<MediaPerson>,
    pub user_data: Option<MediaUserData>,
    pub run_time_ticks: Option<i64>,
    pub child_count: Option<u32>,
    pub media_sources: Vec<MediaSource>,
    #[serde(skip)]
    pub raw: RawPayload,
}

impl Default for ItemKind {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

/// What the comment overlay needs to look up its own data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentaryKey {
    pub item_id: String,
    pub title: Option<String>,
    pub series_name: Option<String>,
    pub original_title: Option<String>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
}

impl MediaItem {
    /// The id, if it can be used to navigate to or act on this item.
    pub fn navigation_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn is_actionable(&self) -> bool {
        self.navigation_id().is_some()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn is_favorite(&self) -> bool {
        self.user_data.as_ref().is_some_and(|u| u.is_favorite)
    }

    pub fn resume_position_ticks(&self) -> Option<i64> {
        self.user_data
            .as_ref()
            .map(|u| u.playback_position_ticks)
            .filter(|ticks| *ticks > 0)
    }

    pub fn commentary_key(&self) -> Option<CommentaryKey> {
        let item_id = self.navigation_id()?.to_string();
        let is_episode = self.kind == ItemKind::Episode;
        Some(CommentaryKey {
            item_id,
            title: self.name.clone(),
            series_name: self.series_name.clone(),
            original_title: self.original_title.clone(),
            season_number: if is_episode { self.parent_index_number } else { None },
            episode_number: if is_episode { self.index_number } else { None },
        })
    }
}
