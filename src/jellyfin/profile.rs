use serde_json::{json, Value};

use crate::models::DeviceCapabilities;

/// Device profile sent with every PlaybackInfo request.
pub fn device_profile(caps: &DeviceCapabilities) -> Value {
    let containers = caps.containers.join(",");
    let video_codecs = caps.video_codecs.join(",");
    let audio_codecs = caps.audio_codecs.join(",");

    let subtitle_profiles: Vec<Value> = caps
        .subtitle_formats
        .iter()
        .flat_map(|format| {
            [
                json!({ "Format": format, "Method": "External" }),
                json!({ "Format": format, "Method": "Embed" }),
            ]
        })
        .chain(std::iter::once(json!({ "Format": "vtt", "Method": "Hls" })))
        .collect();

    json!({
        "Name": "mediaplex",
        "MaxStreamingBitrate": caps.max_streaming_bitrate,
        "MaxStaticBitrate": caps.max_static_bitrate,
        "MusicStreamingTranscodingBitrate": caps.music_streaming_transcoding_bitrate,
        "DirectPlayProfiles": [
            {
                "Type": "Video",
                "Container": containers,
                "VideoCodec": video_codecs,
                "AudioCodec": audio_codecs,
            },
            { "Type": "Audio", "AudioCodec": audio_codecs },
        ],
        "TranscodingProfiles": [
            {
                "Type": "Video",
                "Container": caps.transcoding_container,
                "VideoCodec": caps.transcoding_video_codec,
                "AudioCodec": caps.transcoding_audio_codec,
                "Protocol": "hls",
                "Context": "Streaming",
                "MaxAudioChannels": caps.max_audio_channels.to_string(),
                "BreakOnNonKeyFrames": true,
            },
            {
                "Type": "Audio",
                "Container": "mp3",
                "AudioCodec": "mp3",
                "Protocol": "http",
                "Context": "Streaming",
            },
        ],
        "CodecProfiles": [
            {
                "Type": "VideoAudio",
                "Conditions": [{
                    "Condition": "LessThanEqual",
                    "Property": "AudioChannels",
                    "Value": caps.max_audio_channels.to_string(),
                    "IsRequired": false,
                }],
            },
        ],
        "SubtitleProfiles": subtitle_profiles,
        "ContainerProfiles": [],
        "ResponseProfiles": [],
    })
}
