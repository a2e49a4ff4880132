use chrono::{DateTime, Utc};

use super::types::{JellyfinItem, MediaSourceInfo, MediaStreamInfo, UserItemData};
use crate::models::{
    ItemKind, MediaItem, MediaPerson, MediaSource, MediaStream, MediaUserData, RawPayload,
    SortKey, StreamKind,
};

pub fn normalize(raw: JellyfinItem) -> MediaItem {
    let kind = raw
        .item_type
        .as_deref()
        .map(kind_from_native)
        .unwrap_or_else(|| ItemKind::Other(String::new()));

    MediaItem {
        id: raw.id.clone(),
        name: raw.name.clone(),
        kind,
        original_title: raw.original_title.clone(),
        parent_id: raw.parent_id.clone(),
        series_id: raw.series_id.clone(),
        series_name: raw.series_name.clone(),
        season_id: raw.season_id.clone(),
        season_name: raw.season_name.clone(),
        channel_id: raw.channel_id.clone(),
        index_number: raw.index_number,
        parent_index_number: raw.parent_index_number,
        production_year: raw.production_year,
        premiere_date: raw.premiere_date.as_deref().and_then(parse_date),
        overview: raw.overview.clone(),
        community_rating: raw.community_rating,
        official_rating: raw.official_rating.clone(),
        genres: raw.genres.clone(),
        studios: raw.studios.iter().filter_map(|s| s.name.clone()).collect(),
        tags: raw.tags.clone(),
        people: raw
            .people
            .iter()
            .filter_map(|p| {
                Some(MediaPerson {
                    id: p.id.clone(),
                    name: p.name.clone()?,
                    role: p.role.clone(),
                    kind: p.person_type.clone(),
                })
            })
            .collect(),
        user_data: raw.user_data.as_ref().map(normalize_user_data),
        run_time_ticks: raw.run_time_ticks,
        child_count: raw.child_count,
        media_sources: raw
            .media_sources
            .iter()
            .flatten()
            .map(normalize_source)
            .collect(),
        raw: RawPayload::jellyfin(raw),
    }
}

pub fn normalize_user_data(raw: &UserItemData) -> MediaUserData {
    MediaUserData {
        played: raw.played.unwrap_or(false),
        played_percentage: raw.played_percentage.map(|p| p.clamp(0.0, 100.0)),
        is_favorite: raw.is_favorite.unwrap_or(false),
        playback_position_ticks: raw.playback_position_ticks.unwrap_or(0),
        play_count: raw.play_count,
        last_played: raw.last_played_date.as_deref().and_then(parse_date),
        unplayed_item_count: raw.unplayed_item_count,
    }
}

pub fn normalize_source(raw: &MediaSourceInfo) -> MediaSource {
    MediaSource {
        id: raw.id.clone(),
        name: raw.name.clone(),
        container: raw.container.clone(),
        protocol: raw.protocol.clone(),
        size: raw.size,
        bitrate: raw.bitrate,
        run_time_ticks: raw.run_time_ticks,
        supports_direct_play: raw.supports_direct_play.unwrap_or(false),
        supports_transcoding: raw.supports_transcoding.unwrap_or(false),
        streams: raw.media_streams.iter().filter_map(normalize_stream).collect(),
    }
}

/// Streams without a kind we play or without a native index are dropped:
/// they cannot be selected.
fn normalize_stream(raw: &MediaStreamInfo) -> Option<MediaStream> {
    let kind = match raw.stream_type.as_deref()? {
        "Video" => StreamKind::Video,
        "Audio" => StreamKind::Audio,
        "Subtitle" => StreamKind::Subtitle,
        _ => return None,
    };

    Some(MediaStream {
        kind,
        index: raw.index?,
        codec: raw.codec.clone(),
        language: raw.language.clone(),
        title: raw.title.clone(),
        display_title: raw.display_title.clone(),
        is_default: raw.is_default.unwrap_or(false),
        is_forced: raw.is_forced.unwrap_or(false),
        is_external: raw.is_external.unwrap_or(false),
        bitrate: raw.bit_rate,
        width: raw.width,
        height: raw.height,
        frame_rate: raw.real_frame_rate.or(raw.average_frame_rate),
        profile: raw.profile.clone(),
        bit_depth: raw.bit_depth,
        channels: raw.channels,
        channel_layout: raw.channel_layout.clone(),
        sample_rate: raw.sample_rate,
    })
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

pub fn kind_from_native(native: &str) -> ItemKind {
    match native {
        "Movie" => ItemKind::Movie,
        "Series" => ItemKind::Series,
        "Season" => ItemKind::Season,
        "Episode" => ItemKind::Episode,
        "MusicVideo" => ItemKind::MusicVideo,
        "BoxSet" => ItemKind::BoxSet,
        "Folder" => ItemKind::Folder,
        "CollectionFolder" | "UserView" => ItemKind::CollectionFolder,
        "Playlist" => ItemKind::Playlist,
        "MusicAlbum" => ItemKind::MusicAlbum,
        "Audio" => ItemKind::Audio,
        "Photo" => ItemKind::Photo,
        "Video" => ItemKind::Video,
        "TvChannel" => ItemKind::TvChannel,
        "Program" => ItemKind::Program,
        "Person" => ItemKind::Person,
        other => ItemKind::Other(other.to_string()),
    }
}

pub fn kind_to_native(kind: &ItemKind) -> &str {
    match kind {
        ItemKind::Movie => "Movie",
        ItemKind::Series => "Series",
        ItemKind::Season => "Season",
        ItemKind::Episode => "Episode",
        ItemKind::MusicVideo => "MusicVideo",
        ItemKind::BoxSet => "BoxSet",
        ItemKind::Folder => "Folder",
        ItemKind::CollectionFolder => "CollectionFolder",
        ItemKind::Playlist => "Playlist",
        ItemKind::MusicAlbum => "MusicAlbum",
        ItemKind::Audio => "Audio",
        ItemKind::Photo => "Photo",
        ItemKind::Video => "Video",
        ItemKind::TvChannel => "TvChannel",
        ItemKind::Program => "Program",
        ItemKind::Person => "Person",
        ItemKind::Other(native) => native,
    }
}

pub fn sort_to_native(key: &SortKey) -> &str {
    match key {
        SortKey::Name => "SortName",
        SortKey::DateCreated => "DateCreated",
        SortKey::DatePlayed => "DatePlayed",
        SortKey::PremiereDate => "PremiereDate",
        SortKey::ProductionYear => "ProductionYear",
        SortKey::CommunityRating => "CommunityRating",
        SortKey::Runtime => "Runtime",
        SortKey::PlayCount => "PlayCount",
        SortKey::Random => "Random",
        SortKey::Other(native) => native,
    }
}
