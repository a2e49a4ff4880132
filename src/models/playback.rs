use serde::{Deserialize, Serialize};

use super::{MediaItem, MediaSource};

/// What the local player can decode. Turned into a protocol-specific
/// device profile at negotiation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCapabilities {
    pub max_streaming_bitrate: u64,
    pub max_static_bitrate: u64,
    pub music_streaming_transcoding_bitrate: u64,
    pub containers: Vec<String>,
    pub video_codecs: Vec<String>,
    pub audio_codecs: Vec<String>,
    pub subtitle_formats: Vec<String>,
    pub max_audio_channels: u32,
    pub transcoding_container: String,
    pub transcoding_video_codec: String,
    pub transcoding_audio_codec: String,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            max_streaming_bitrate: 120_000_000,
            max_static_bitrate: 100_000_000,
            music_streaming_transcoding_bitrate: 384_000,
            containers: list(&["mkv", "mp4", "m4v", "mov", "webm", "ts", "avi"]),
            video_codecs: list(&["h264", "hevc", "vp9", "av1", "mpeg4"]),
            audio_codecs: list(&["aac", "mp3", "ac3", "eac3", "flac", "opus", "vorbis", "dts", "truehd"]),
            subtitle_formats: list(&["srt", "ass", "ssa", "vtt", "subrip", "pgssub"]),
            max_audio_channels: 8,
            transcoding_container: "ts".to_string(),
            transcoding_video_codec: "h264".to_string(),
            transcoding_audio_codec: "aac".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NegotiateRequest {
    pub item: MediaItem,
    pub user_id: Option<String>,
    pub start_ticks: i64,
    pub capabilities: DeviceCapabilities,
    pub media_source_id: Option<String>,
    pub audio_stream_index: Option<i32>,
    /// `Some(-1)` asks for no subtitles at all.
    pub subtitle_stream_index: Option<i32>,
    pub max_bitrate: Option<u64>,
}

impl NegotiateRequest {
    pub fn new(item: MediaItem, user_id: Option<String>) -> Self {
        Self {
            item,
            user_id,
            ..Default::default()
        }
    }

    pub(crate) fn subtitles_disabled(&self) -> bool {
        self.subtitle_stream_index == Some(-1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayMethod {
    DirectPlay,
    Transcode,
}

impl PlayMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectPlay => "DirectPlay",
            Self::Transcode => "Transcode",
        }
    }
}

/// Outcome of a negotiation. Lives for one playback attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub url: String,
    pub play_session_id: Option<String>,
    pub media_source: Option<MediaSource>,
    pub play_method: PlayMethod,
    /// The id reports are filed under (the channel for live programs).
    pub item_id: String,
    pub start_position_ticks: i64,
    pub audio_stream_index: Option<i32>,
    pub subtitle_stream_index: Option<i32>,
}

/// A single start, progress or stop report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackReport {
    pub item_id: String,
    pub play_session_id: String,
    pub media_source_id: Option<String>,
    pub position_ticks: i64,
    pub duration_ticks: Option<i64>,
    pub is_paused: bool,
    pub play_method: PlayMethod,
    pub audio_stream_index: Option<i32>,
    pub subtitle_stream_index: Option<i32>,
}

impl PlaybackReport {
    pub fn for_stream(stream: &StreamInfo, play_session_id: &str, duration_ticks: Option<i64>) -> Self {
        Self {
            item_id: stream.item_id.clone(),
            play_session_id: play_session_id.to_string(),
            media_source_id: stream.media_source.as_ref().and_then(|s| s.id.clone()),
            position_ticks: stream.start_position_ticks,
            duration_ticks,
            is_paused: false,
            play_method: stream.play_method,
            audio_stream_index: stream.audio_stream_index,
            subtitle_stream_index: stream.subtitle_stream_index,
        }
    }

    pub fn at(mut self, position_ticks: i64, is_paused: bool) -> Self {
        self.position_ticks = position_ticks;
        self.is_paused = is_paused;
        self
    }
}
