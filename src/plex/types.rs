//! Plex wire types (JSON flavour, requested with `Accept: application/json`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlexResponse {
    #[serde(rename = "MediaContainer", default)]
    pub media_container: MediaContainer,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaContainer {
    pub size: Option<u32>,
    pub total_size: Option<u32>,
    pub offset: Option<u32>,
    pub machine_identifier: Option<String>,
    pub friendly_name: Option<String>,
    pub version: Option<String>,
    pub general_decision_code: Option<i32>,
    pub general_decision_text: Option<String>,
    pub direct_play_decision_code: Option<i32>,
    #[serde(rename = "Metadata", default)]
    pub metadata: Vec<PlexMetadata>,
    /// Library sections, and the value lists of filter endpoints.
    #[serde(rename = "Directory", default)]
    pub directory: Vec<PlexMetadata>,
    #[serde(rename = "Hub", default)]
    pub hub: Vec<PlexHub>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlexHub {
    pub hub_identifier: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "Metadata", default)]
    pub metadata: Vec<PlexMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlexMetadata {
    pub rating_key: Option<String>,
    pub key: Option<String>,
    pub guid: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub summary: Option<String>,
    pub year: Option<i32>,
    pub index: Option<i32>,
    pub parent_index: Option<i32>,
    pub parent_rating_key: Option<String>,
    pub parent_title: Option<String>,
    pub grandparent_rating_key: Option<String>,
    pub grandparent_title: Option<String>,
    pub thumb: Option<String>,
    pub art: Option<String>,
    pub banner: Option<String>,
    pub parent_thumb: Option<String>,
    pub parent_art: Option<String>,
    pub grandparent_thumb: Option<String>,
    pub grandparent_art: Option<String>,
    /// Milliseconds.
    pub duration: Option<i64>,
    /// Milliseconds.
    pub view_offset: Option<i64>,
    pub view_count: Option<u32>,
    /// Unix seconds.
    pub last_viewed_at: Option<i64>,
    pub user_rating: Option<f64>,
    pub rating: Option<f64>,
    pub audience_rating: Option<f64>,
    pub content_rating: Option<String>,
    pub studio: Option<String>,
    pub originally_available_at: Option<String>,
    pub leaf_count: Option<u32>,
    pub viewed_leaf_count: Option<u32>,
    pub child_count: Option<u32>,
    #[serde(rename = "Genre", default, skip_serializing_if = "Vec::is_empty")]
    pub genre: Vec<PlexTag>,
    #[serde(rename = "Label", default, skip_serializing_if = "Vec::is_empty")]
    pub label: Vec<PlexTag>,
    #[serde(rename = "Role", default, skip_serializing_if = "Vec::is_empty")]
    pub role: Vec<PlexTag>,
    #[serde(rename = "Director", default, skip_serializing_if = "Vec::is_empty")]
    pub director: Vec<PlexTag>,
    #[serde(rename = "Media", default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<PlexMedia>,
    #[serde(rename = "Image", default, skip_serializing_if = "Vec::is_empty")]
    pub image: Vec<PlexImage>,
}

impl PlexMetadata {
    pub fn image_of_type(&self, image_type: &str) -> Option<&str> {
        self.image
            .iter()
            .find(|i| i.image_type.as_deref() == Some(image_type))
            .and_then(|i| i.url.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlexTag {
    pub id: Option<i64>,
    pub tag: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlexImage {
    pub alt: Option<String>,
    #[serde(rename = "type")]
    pub image_type: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlexMedia {
    pub id: Option<i64>,
    pub duration: Option<i64>,
    /// Kilobits per second.
    pub bitrate: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub container: Option<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub audio_channels: Option<u32>,
    pub video_resolution: Option<String>,
    pub protocol: Option<String>,
    pub selected: Option<bool>,
    #[serde(rename = "Part", default, skip_serializing_if = "Vec::is_empty")]
    pub part: Vec<PlexPart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlexPart {
    pub id: Option<i64>,
    pub key: Option<String>,
    pub duration: Option<i64>,
    pub file: Option<String>,
    pub size: Option<u64>,
    pub container: Option<String>,
    /// `directplay`, `copy` or `transcode` on decision responses.
    pub decision: Option<String>,
    #[serde(rename = "Stream", default, skip_serializing_if = "Vec::is_empty")]
    pub stream: Vec<PlexStream>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlexStream {
    pub id: Option<i64>,
    /// 1 video, 2 audio, 3 subtitle.
    pub stream_type: Option<i32>,
    pub index: Option<i32>,
    pub codec: Option<String>,
    pub language: Option<String>,
    pub language_code: Option<String>,
    pub title: Option<String>,
    pub display_title: Option<String>,
    pub default: Option<bool>,
    pub forced: Option<bool>,
    pub selected: Option<bool>,
    /// Set on sidecar subtitle files.
    pub key: Option<String>,
    pub bitrate: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    pub profile: Option<String>,
    pub bit_depth: Option<u32>,
    pub channels: Option<u32>,
    pub audio_channel_layout: Option<String>,
    pub sampling_rate: Option<u32>,
}
