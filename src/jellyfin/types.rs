//! Jellyfin/Emby wire types. Every field is optional: servers of different
//! versions omit whatever they like.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JellyfinItem {
    pub id: Option<String>,
    pub name: Option<String>,
    pub original_title: Option<String>,
    #[serde(rename = "Type")]
    pub item_type: Option<String>,
    pub media_type: Option<String>,
    pub collection_type: Option<String>,
    pub is_folder: Option<bool>,
    pub parent_id: Option<String>,
    pub series_id: Option<String>,
    pub series_name: Option<String>,
    pub season_id: Option<String>,
    pub season_name: Option<String>,
    pub channel_id: Option<String>,
    pub album_id: Option<String>,
    pub index_number: Option<i32>,
    pub parent_index_number: Option<i32>,
    pub production_year: Option<i32>,
    pub premiere_date: Option<String>,
    pub overview: Option<String>,
    pub community_rating: Option<f64>,
    pub official_rating: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub studios: Vec<NameIdPair>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub people: Vec<BaseItemPerson>,
    pub user_data: Option<UserItemData>,
    pub run_time_ticks: Option<i64>,
    pub child_count: Option<u32>,
    pub media_sources: Option<Vec<MediaSourceInfo>>,

    // Image fields consumed by the resolver.
    pub image_tags: Option<HashMap<String, String>>,
    pub backdrop_image_tags: Option<Vec<String>>,
    pub image_blur_hashes: Option<HashMap<String, HashMap<String, String>>>,
    pub parent_logo_item_id: Option<String>,
    pub parent_logo_image_tag: Option<String>,
    pub parent_backdrop_item_id: Option<String>,
    pub parent_backdrop_image_tags: Option<Vec<String>>,
    pub parent_thumb_item_id: Option<String>,
    pub parent_thumb_image_tag: Option<String>,
    pub parent_primary_image_item_id: Option<String>,
    pub parent_primary_image_tag: Option<String>,
    pub series_primary_image_tag: Option<String>,
    pub series_thumb_image_tag: Option<String>,
    pub album_primary_image_tag: Option<String>,
    pub primary_image_item_id: Option<String>,
    pub primary_image_tag: Option<String>,
}

impl JellyfinItem {
    pub fn image_tag(&self, image_type: &str) -> Option<&str> {
        self.image_tags
            .as_ref()
            .and_then(|tags| tags.get(image_type))
            .map(String::as_str)
            .filter(|tag| !tag.is_empty())
    }

    pub fn first_backdrop(&self) -> Option<&str> {
        self.backdrop_image_tags
            .as_ref()
            .and_then(|tags| tags.first())
            .map(String::as_str)
    }

    pub fn first_parent_backdrop(&self) -> Option<&str> {
        self.parent_backdrop_image_tags
            .as_ref()
            .and_then(|tags| tags.first())
            .map(String::as_str)
    }

    pub fn blur_hash(&self, image_type: &str, tag: &str) -> Option<&str> {
        self.image_blur_hashes
            .as_ref()
            .and_then(|hashes| hashes.get(image_type))
            .and_then(|by_tag| by_tag.get(tag))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NameIdPair {
    pub name: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BaseItemPerson {
    pub id: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    #[serde(rename = "Type")]
    pub person_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserItemData {
    pub played: Option<bool>,
    pub played_percentage: Option<f64>,
    pub is_favorite: Option<bool>,
    pub playback_position_ticks: Option<i64>,
    pub play_count: Option<u32>,
    pub last_played_date: Option<String>,
    pub unplayed_item_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaSourceInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub path: Option<String>,
    pub protocol: Option<String>,
    pub container: Option<String>,
    pub size: Option<u64>,
    pub bitrate: Option<u64>,
    pub run_time_ticks: Option<i64>,
    pub supports_direct_play: Option<bool>,
    pub supports_direct_stream: Option<bool>,
    pub supports_transcoding: Option<bool>,
    pub transcoding_url: Option<String>,
    pub transcoding_sub_protocol: Option<String>,
    pub live_stream_id: Option<String>,
    #[serde(default)]
    pub media_streams: Vec<MediaStreamInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaStreamInfo {
    #[serde(rename = "Type")]
    pub stream_type: Option<String>,
    pub index: Option<i32>,
    pub codec: Option<String>,
    pub language: Option<String>,
    pub title: Option<String>,
    pub display_title: Option<String>,
    pub is_default: Option<bool>,
    pub is_forced: Option<bool>,
    pub is_external: Option<bool>,
    pub bit_rate: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub real_frame_rate: Option<f64>,
    pub average_frame_rate: Option<f64>,
    pub profile: Option<String>,
    pub bit_depth: Option<u32>,
    pub channels: Option<u32>,
    pub channel_layout: Option<String>,
    pub sample_rate: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemsResponse {
    #[serde(default)]
    pub items: Vec<JellyfinItem>,
    pub total_record_count: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackInfoResponse {
    #[serde(default)]
    pub media_sources: Vec<MediaSourceInfo>,
    pub play_session_id: Option<String>,
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryFiltersLegacy {
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub years: Vec<i32>,
    #[serde(default)]
    pub official_ratings: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PublicSystemInfo {
    pub id: Option<String>,
    pub server_name: Option<String>,
    pub version: Option<String>,
    pub product_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackInfoRequest {
    pub user_id: String,
    pub start_time_ticks: i64,
    pub is_playback: bool,
    pub auto_open_live_stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_stream_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_stream_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_streaming_bitrate: Option<u64>,
    pub enable_direct_play: bool,
    pub enable_direct_stream: bool,
    pub enable_transcoding: bool,
    pub device_profile: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackStateBody<'a> {
    pub item_id: &'a str,
    pub play_session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_source_id: Option<&'a str>,
    pub position_ticks: i64,
    pub is_paused: bool,
    pub can_seek: bool,
    pub play_method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_stream_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_stream_index: Option<i32>,
}
