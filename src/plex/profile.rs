use crate::models::DeviceCapabilities;

fn plex_container(container: &str) -> &str {
    match container {
        "ts" => "mpegts",
        other => other,
    }
}

/// Value of the `X-Plex-Client-Profile-Extra` parameter.
pub fn client_profile_extra(caps: &DeviceCapabilities) -> String {
    let transcode = format!(
        "add-transcode-target(type=videoProfile&context=streaming&protocol=hls&container={}&videoCodec={}&audioCodec={})",
        plex_container(&caps.transcoding_container),
        caps.transcoding_video_codec,
        caps.transcoding_audio_codec,
    );
    let direct = format!(
        "add-direct-play-profile(type=videoProfile&container={}&videoCodec={}&audioCodec={})",
        caps.containers.join(","),
        caps.video_codecs.join(","),
        caps.audio_codecs.join(","),
    );
    let channels = format!(
        "add-limitation(scope=videoAudioCodec&scopeName=*&type=upperBound&name=audio.channels&value={})",
        caps.max_audio_channels
    );
    [transcode, direct, channels].join("+")
}
