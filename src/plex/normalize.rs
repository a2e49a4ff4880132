use chrono::{DateTime, NaiveDate, Utc};

use super::types::{PlexMedia, PlexMetadata, PlexStream};
use crate::models::{
    ItemKind, MediaItem, MediaPerson, MediaSource, MediaStream, MediaUserData, RawPayload,
    SortKey, StreamKind,
};
use crate::ticks;

/// Library sections share the integer key space with rating keys, so they
/// are namespaced in the canonical model.
pub const SECTION_PREFIX: &str = "section/";

/// A rating of 10 is what this client writes for "favorite".
pub const FAVORITE_RATING: f64 = 10.0;

pub fn section_key(id: &str) -> Option<&str> {
    id.strip_prefix(SECTION_PREFIX)
}

pub fn normalize(raw: PlexMetadata) -> MediaItem {
    let kind = raw
        .item_type
        .as_deref()
        .map(kind_from_native)
        .unwrap_or_else(|| ItemKind::Other(String::new()));

    // Plex names the hierarchy relative to the item: an episode's parent is
    // its season and its grandparent the show; a season's parent is the show.
    let (series_id, series_name, season_id, season_name) = match kind {
        ItemKind::Episode => (
            raw.grandparent_rating_key.clone(),
            raw.grandparent_title.clone(),
            raw.parent_rating_key.clone(),
            raw.parent_title.clone(),
        ),
        ItemKind::Season => (
            raw.parent_rating_key.clone(),
            raw.parent_title.clone(),
            None,
            None,
        ),
        _ => (None, None, None, None),
    };

    let mut people: Vec<MediaPerson> = raw
        .role
        .iter()
        .filter_map(|r| {
            Some(MediaPerson {
                id: r.id.map(|id| id.to_string()),
                name: r.tag.clone()?,
                role: r.role.clone(),
                kind: Some("Actor".to_string()),
            })
        })
        .collect();
    people.extend(raw.director.iter().filter_map(|d| {
        Some(MediaPerson {
            id: d.id.map(|id| id.to_string()),
            name: d.tag.clone()?,
            role: None,
            kind: Some("Director".to_string()),
        })
    }));

    MediaItem {
        id: raw.rating_key.clone(),
        name: raw.title.clone(),
        kind,
        original_title: raw.original_title.clone(),
        parent_id: raw.parent_rating_key.clone(),
        series_id,
        series_name,
        season_id,
        season_name,
        channel_id: None,
        index_number: raw.index,
        parent_index_number: raw.parent_index,
        production_year: raw.year,
        premiere_date: raw.originally_available_at.as_deref().and_then(parse_date),
        overview: raw.summary.clone(),
        community_rating: raw.audience_rating.or(raw.rating),
        official_rating: raw.content_rating.clone(),
        genres: raw.genre.iter().filter_map(|g| g.tag.clone()).collect(),
        studios: raw.studio.iter().cloned().collect(),
        tags: raw.label.iter().filter_map(|l| l.tag.clone()).collect(),
        people,
        user_data: user_data(&raw),
        run_time_ticks: raw.duration.map(ticks::from_millis),
        child_count: raw.child_count.or(raw.leaf_count),
        media_sources: raw.media.iter().map(normalize_media).collect(),
        raw: RawPayload::plex(raw),
    }
}

/// Library sections arrive as directories keyed by section number.
pub fn normalize_section(raw: PlexMetadata) -> MediaItem {
    let mut item = normalize(raw);
    let section = item
        .raw
        .as_plex()
        .and_then(|r| r.key.as_deref())
        .map(|key| format!("{}{}", SECTION_PREFIX, key));
    item.id = section;
    item.kind = ItemKind::CollectionFolder;
    item
}

/// User state is only reported when the server sent some.
fn user_data(raw: &PlexMetadata) -> Option<MediaUserData> {
    if raw.view_count.is_none()
        && raw.view_offset.is_none()
        && raw.user_rating.is_none()
        && raw.last_viewed_at.is_none()
        && raw.viewed_leaf_count.is_none()
    {
        return None;
    }

    let all_leaves_viewed = matches!(
        (raw.leaf_count, raw.viewed_leaf_count),
        (Some(total), Some(viewed)) if total > 0 && viewed >= total
    );
    let played_percentage = match (raw.view_offset, raw.duration) {
        (Some(offset), Some(duration)) if duration > 0 => {
            Some((offset as f64 / duration as f64 * 100.0).clamp(0.0, 100.0))
        }
        _ => None,
    };

    Some(MediaUserData {
        played: raw.view_count.unwrap_or(0) > 0 || all_leaves_viewed,
        played_percentage,
        is_favorite: raw.user_rating.is_some_and(|r| r >= FAVORITE_RATING),
        playback_position_ticks: raw.view_offset.map(ticks::from_millis).unwrap_or(0),
        play_count: raw.view_count,
        last_played: raw
            .last_viewed_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        unplayed_item_count: match (raw.leaf_count, raw.viewed_leaf_count) {
            (Some(total), Some(viewed)) => Some(total.saturating_sub(viewed)),
            _ => None,
        },
    })
}

pub fn normalize_media(raw: &PlexMedia) -> MediaSource {
    let first_part = raw.part.first();
    MediaSource {
        id: raw.id.map(|id| id.to_string()),
        name: raw.video_resolution.clone(),
        container: raw
            .container
            .clone()
            .or_else(|| first_part.and_then(|p| p.container.clone())),
        protocol: raw.protocol.clone(),
        size: first_part.and_then(|p| p.size),
        bitrate: raw.bitrate.map(|kbps| kbps * 1000),
        run_time_ticks: raw.duration.map(ticks::from_millis),
        supports_direct_play: first_part
            .and_then(|p| p.decision.as_deref())
            .map_or(true, |d| d == "directplay"),
        supports_transcoding: true,
        streams: raw
            .part
            .iter()
            .flat_map(|p| p.stream.iter())
            .filter_map(normalize_stream)
            .collect(),
    }
}

/// Plex selects tracks by stream id, so that is the native index kept here.
fn normalize_stream(raw: &PlexStream) -> Option<MediaStream> {
    let kind = match raw.stream_type? {
        1 => StreamKind::Video,
        2 => StreamKind::Audio,
        3 => StreamKind::Subtitle,
        _ => return None,
    };

    Some(MediaStream {
        kind,
        index: i32::try_from(raw.id?).ok()?,
        codec: raw.codec.clone(),
        language: raw.language_code.clone().or_else(|| raw.language.clone()),
        title: raw.title.clone(),
        display_title: raw.display_title.clone(),
        is_default: raw.default.unwrap_or(false),
        is_forced: raw.forced.unwrap_or(false),
        is_external: raw.key.is_some(),
        bitrate: raw.bitrate.map(|kbps| kbps * 1000),
        width: raw.width,
        height: raw.height,
        frame_rate: raw.frame_rate,
        profile: raw.profile.clone(),
        bit_depth: raw.bit_depth,
        channels: raw.channels,
        channel_layout: raw.audio_channel_layout.clone(),
        sample_rate: raw.sampling_rate,
    })
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

pub fn kind_from_native(native: &str) -> ItemKind {
    match native {
        "movie" => ItemKind::Movie,
        "show" => ItemKind::Series,
        "season" => ItemKind::Season,
        "episode" => ItemKind::Episode,
        "clip" => ItemKind::Video,
        "collection" => ItemKind::BoxSet,
        "playlist" => ItemKind::Playlist,
        "album" => ItemKind::MusicAlbum,
        "track" => ItemKind::Audio,
        "photo" => ItemKind::Photo,
        other => ItemKind::Other(other.to_string()),
    }
}

/// Numeric type filter used by library listing endpoints.
pub fn kind_to_native(kind: &ItemKind) -> &str {
    match kind {
        ItemKind::Movie => "1",
        ItemKind::Series => "2",
        ItemKind::Season => "3",
        ItemKind::Episode => "4",
        ItemKind::MusicAlbum => "9",
        ItemKind::Audio => "10",
        ItemKind::Video => "12",
        ItemKind::Photo => "13",
        ItemKind::Playlist => "15",
        ItemKind::BoxSet => "18",
        ItemKind::MusicVideo => "MusicVideo",
        ItemKind::Folder => "Folder",
        ItemKind::CollectionFolder => "CollectionFolder",
        ItemKind::TvChannel => "TvChannel",
        ItemKind::Program => "Program",
        ItemKind::Person => "Person",
        ItemKind::Other(native) => native,
    }
}

pub fn sort_to_native(key: &SortKey) -> &str {
    match key {
        SortKey::Name => "titleSort",
        SortKey::DateCreated => "addedAt",
        SortKey::DatePlayed => "lastViewedAt",
        SortKey::PremiereDate => "originallyAvailableAt",
        SortKey::ProductionYear => "year",
        SortKey::CommunityRating => "audienceRating",
        SortKey::Runtime => "duration",
        SortKey::PlayCount => "viewCount",
        SortKey::Random => "random",
        SortKey::Other(native) => native,
    }
}
