//! Plex implementation of the media contract.
//!
//! Plex speaks milliseconds; every position and duration crosses through
//! [`crate::ticks`] on its way in or out of this module.

pub mod image;
pub mod normalize;
pub mod profile;
pub mod types;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Method;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::adapter::{ImageResolver, Library, Mutations, Playback};
use crate::error::{MediaError, Result};
use crate::http::HttpClient;
use crate::models::{
    DeviceIdentity, FilterValues, Filters, ImagePreferences, ItemKind, MediaItem,
    NegotiateRequest, Page, PageRequest, PlayMethod, PlaybackReport, ProtocolKind,
    ResolvedImage, ServerContext, ServerInfo, SortKey, SortOrder, StreamInfo,
};
use crate::ticks;
use normalize::{
    kind_to_native, normalize, normalize_media, normalize_section, section_key, sort_to_native,
    FAVORITE_RATING,
};
use types::{MediaContainer, PlexMetadata, PlexResponse};

const TOKEN_HEADER: &str = "X-Plex-Token";
const SESSION_HEADER: &str = "X-Plex-Session-Identifier";
const LIBRARY_IDENTIFIER: &str = "com.plexapp.plugins.library";
const DIRECT_PLAY_OK: i32 = 1000;

/// Listing endpoints need a type; movies and shows when the caller gave none.
const DEFAULT_TYPES: &str = "1,2";

type Params = Vec<(&'static str, String)>;

pub struct PlexClient {
    http: HttpClient,
    ctx: ServerContext,
    device: DeviceIdentity,
}

impl PlexClient {
    pub fn new(http: HttpClient, ctx: ServerContext, device: DeviceIdentity) -> Self {
        Self { http, ctx, device }
    }

    #[instrument(skip(http))]
    pub async fn probe(http: &HttpClient, address: &str) -> Result<ServerInfo> {
        let url = format!("{}/identity", address.trim_end_matches('/'));
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let response: PlexResponse = http.get_json(&url, headers).await?;
        let container = response.media_container;
        info!("Probed Plex server {:?}", container.machine_identifier);
        Ok(server_info(container))
    }

    fn user_id(&self) -> Option<&str> {
        self.ctx.user_id.as_deref().filter(|id| !id.is_empty())
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(TOKEN_HEADER, HeaderValue::from_str(&self.ctx.access_token)?);
        headers.insert("X-Plex-Client-Identifier", HeaderValue::from_str(&self.device.id)?);
        headers.insert("X-Plex-Product", HeaderValue::from_str(&self.device.client)?);
        headers.insert("X-Plex-Version", HeaderValue::from_str(&self.device.version)?);
        headers.insert("X-Plex-Device-Name", HeaderValue::from_str(&self.device.name)?);
        Ok(headers)
    }

    fn session_headers(&self, session: &str) -> Result<HeaderMap> {
        let mut headers = self.headers()?;
        headers.insert(SESSION_HEADER, HeaderValue::from_str(session)?);
        Ok(headers)
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<String> {
        let mut url = url::Url::parse(&format!("{}{}", self.ctx.base_url(), path))?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url.to_string())
    }

    async fn fetch_container(&self, path: &str, params: &[(&str, String)]) -> Result<MediaContainer> {
        let url = self.url(path, params)?;
        let response: PlexResponse = self.http.get_json(&url, self.headers()?).await?;
        Ok(response.media_container)
    }

    async fn fetch_page(&self, path: &str, params: &[(&str, String)]) -> Result<Page<MediaItem>> {
        let container = self.fetch_container(path, params).await?;
        debug!(
            "Received {} items (total {:?})",
            container.metadata.len(),
            container.total_size
        );
        Ok(Page::new(container.metadata, container.total_size).map(normalize))
    }

    async fn fetch_items(&self, path: &str, params: &[(&str, String)]) -> Result<Vec<MediaItem>> {
        Ok(self.fetch_page(path, params).await?.items)
    }

    async fn directory_titles(&self, path: &str) -> Result<Vec<String>> {
        let container = self.fetch_container(path, &[]).await?;
        Ok(container
            .directory
            .into_iter()
            .filter_map(|d| d.title)
            .collect())
    }

    fn metadata_key(item_id: &str) -> String {
        format!("/library/metadata/{}", item_id)
    }

    fn transcode_params(
        &self,
        item_id: &str,
        media_index: usize,
        request: &NegotiateRequest,
        session: &str,
        start_ticks: i64,
    ) -> Params {
        let max_bitrate = request
            .max_bitrate
            .unwrap_or(request.capabilities.max_streaming_bitrate);

        let mut params: Params = vec![
            ("hasMDE", "1".to_string()),
            ("path", Self::metadata_key(item_id)),
            ("mediaIndex", media_index.to_string()),
            ("partIndex", "0".to_string()),
            ("protocol", "hls".to_string()),
            ("fastSeek", "1".to_string()),
            ("directPlay", "1".to_string()),
            ("directStream", "1".to_string()),
            ("directStreamAudio", "1".to_string()),
            ("location", "lan".to_string()),
            ("session", session.to_string()),
            ("offset", ticks::to_seconds(start_ticks).to_string()),
            ("maxVideoBitrate", (max_bitrate / 1000).to_string()),
        ];
        if let Some(audio) = request.audio_stream_index {
            params.push(("audioStreamID", audio.to_string()));
        }
        match request.subtitle_stream_index {
            Some(-1) => params.push(("subtitles", "none".to_string())),
            Some(subtitle) => {
                params.push(("subtitleStreamID", subtitle.to_string()));
                params.push(("subtitles", "auto".to_string()));
            }
            None => params.push(("subtitles", "auto".to_string())),
        }
        params.push(("X-Plex-Client-Identifier", self.device.id.clone()));
        params.push((SESSION_HEADER, session.to_string()));
        params.push((
            "X-Plex-Client-Profile-Extra",
            profile::client_profile_extra(&request.capabilities),
        ));
        params
    }

    async fn timeline(&self, report: &PlaybackReport, state: &str) -> Result<()> {
        let mut params: Params = vec![
            ("ratingKey", report.item_id.clone()),
            ("key", Self::metadata_key(&report.item_id)),
            ("state", state.to_string()),
            ("time", ticks::to_millis(report.position_ticks).to_string()),
            ("hasMDE", "1".to_string()),
        ];
        if let Some(duration) = report.duration_ticks {
            params.push(("duration", ticks::to_millis(duration).to_string()));
        }
        let url = self.url("/:/timeline", &params)?;
        self.http
            .send(Method::GET, &url, self.session_headers(&report.play_session_id)?)
            .await
    }

    fn library_path(library_id: &str, suffix: &str) -> String {
        let key = section_key(library_id).unwrap_or(library_id);
        format!("/library/sections/{}/{}", key, suffix)
    }
}

fn server_info(container: MediaContainer) -> ServerInfo {
    ServerInfo {
        id: container.machine_identifier,
        name: container.friendly_name,
        version: container.version,
        protocol: ProtocolKind::Plex,
    }
}

fn paging(params: &mut Params, start_index: u32, limit: u32) {
    params.push(("X-Plex-Container-Start", start_index.to_string()));
    params.push(("X-Plex-Container-Size", limit.to_string()));
}

fn apply_filters(params: &mut Params, filters: &Filters, default_types: Option<&str>) {
    match filters.item_kinds() {
        Some(kinds) => {
            let kinds: Vec<&str> = kinds.iter().map(kind_to_native).collect();
            params.push(("type", kinds.join(",")));
        }
        None => {
            if let Some(types) = default_types {
                params.push(("type", types.to_string()));
            }
        }
    }
    if let Some(keys) = filters.sort_keys() {
        let suffix = match filters.sort_order {
            Some(SortOrder::Descending) => ":desc",
            _ => "",
        };
        let keys: Vec<String> = keys
            .iter()
            .map(|k| format!("{}{}", sort_to_native(k), suffix))
            .collect();
        params.push(("sort", keys.join(",")));
    }
    if filters.wants_unplayed() {
        params.push(("unwatched", "1".to_string()));
    }
    if let Some(year) = filters.year {
        params.push(("year", year.to_string()));
    }
    if let Some(tags) = filters.tag_list() {
        params.push(("label", tags.join(",")));
    }
    if let Some(genres) = filters.genre_list() {
        params.push(("genre", genres.join(",")));
    }
}

fn favorite_params(params: &mut Params) {
    params.push(("userRating>>", (FAVORITE_RATING - 1.0).to_string()));
}

#[async_trait]
impl Library for PlexClient {
    #[instrument(skip(self))]
    async fn server_info(&self) -> Result<ServerInfo> {
        let container = self.fetch_container("/", &[]).await?;
        Ok(server_info(container))
    }

    #[instrument(skip(self))]
    async fn libraries(&self) -> Result<Vec<MediaItem>> {
        let container = self.fetch_container("/library/sections", &[]).await?;
        Ok(container
            .directory
            .into_iter()
            .map(normalize_section)
            .collect())
    }

    #[instrument(skip(self))]
    async fn get_item(&self, item_id: &str) -> Result<Option<MediaItem>> {
        if item_id.is_empty() {
            return Ok(None);
        }
        let container = self
            .fetch_container(&Self::metadata_key(&urlencoding::encode(item_id)), &[])
            .await?;
        Ok(container.metadata.into_iter().next().map(normalize))
    }

    #[instrument(skip(self))]
    async fn latest_by_library(&self, library_id: &str, limit: u32) -> Result<Vec<MediaItem>> {
        let mut params = Params::new();
        paging(&mut params, 0, limit);
        self.fetch_items(&Self::library_path(library_id, "recentlyAdded"), &params)
            .await
    }

    #[instrument(skip(self))]
    async fn latest(&self, limit: u32) -> Result<Vec<MediaItem>> {
        let mut params = Params::new();
        paging(&mut params, 0, limit);
        self.fetch_items("/library/recentlyAdded", &params).await
    }

    #[instrument(skip(self))]
    async fn resume(&self, limit: u32) -> Result<Vec<MediaItem>> {
        let mut params = Params::new();
        paging(&mut params, 0, limit);
        self.fetch_items("/hubs/continueWatching/items", &params)
            .await
    }

    #[instrument(skip(self))]
    async fn next_up(&self, limit: u32) -> Result<Vec<MediaItem>> {
        let mut params = Params::new();
        paging(&mut params, 0, limit);
        self.fetch_items("/library/onDeck", &params).await
    }

    #[instrument(skip(self))]
    async fn next_up_by_library(&self, library_id: &str, limit: u32) -> Result<Vec<MediaItem>> {
        let mut params = Params::new();
        paging(&mut params, 0, limit);
        self.fetch_items(&Self::library_path(library_id, "onDeck"), &params)
            .await
    }

    #[instrument(skip(self))]
    async fn favorites(&self, filters: &Filters) -> Result<Vec<MediaItem>> {
        let mut params = Params::new();
        apply_filters(&mut params, filters, Some(DEFAULT_TYPES));
        favorite_params(&mut params);
        self.fetch_items("/library/all", &params).await
    }

    #[instrument(skip(self))]
    async fn favorites_paged(&self, request: &PageRequest) -> Result<Page<MediaItem>> {
        let mut params = Params::new();
        apply_filters(&mut params, &request.filters, Some(DEFAULT_TYPES));
        favorite_params(&mut params);
        paging(&mut params, request.start_index, request.limit);
        self.fetch_page("/library/all", &params).await
    }

    #[instrument(skip(self))]
    async fn folder_items(&self, parent_id: &str, request: &PageRequest) -> Result<Page<MediaItem>> {
        let path = match section_key(parent_id) {
            Some(_) => Self::library_path(parent_id, "all"),
            None => format!("{}/children", Self::metadata_key(&urlencoding::encode(parent_id))),
        };
        let mut params = Params::new();
        apply_filters(&mut params, &request.filters, None);
        paging(&mut params, request.start_index, request.limit);
        self.fetch_page(&path, &params).await
    }

    #[instrument(skip(self))]
    async fn seasons(&self, series_id: &str) -> Result<Vec<MediaItem>> {
        let items = self
            .fetch_items(
                &format!("{}/children", Self::metadata_key(&urlencoding::encode(series_id))),
                &[],
            )
            .await?;
        Ok(items
            .into_iter()
            .filter(|i| i.kind == ItemKind::Season)
            .collect())
    }

    #[instrument(skip(self))]
    async fn episodes(&self, _series_id: &str, season_id: &str) -> Result<Vec<MediaItem>> {
        self.fetch_items(
            &format!("{}/children", Self::metadata_key(&urlencoding::encode(season_id))),
            &[],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn similar_shows(&self, item_id: &str, limit: u32) -> Result<Vec<MediaItem>> {
        self.fetch_items(
            &format!("{}/similar", Self::metadata_key(&urlencoding::encode(item_id))),
            &[("count", limit.to_string())],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn similar_movies(&self, item_id: &str, limit: u32) -> Result<Vec<MediaItem>> {
        self.similar_shows(item_id, limit).await
    }

    /// Plex search is hub-based and unpaged; the window is cut locally.
    #[instrument(skip(self))]
    async fn search(&self, term: &str, request: &PageRequest) -> Result<Page<MediaItem>> {
        let params: Params = vec![
            ("query", term.to_string()),
            ("limit", "100".to_string()),
        ];
        let container = self.fetch_container("/hubs/search", &params).await?;

        let kinds = request.filters.item_kinds();
        let matches: Vec<MediaItem> = container
            .hub
            .into_iter()
            .flat_map(|hub| hub.metadata)
            .map(normalize)
            .filter(|item| kinds.map_or(true, |k| k.contains(&item.kind)))
            .filter(|item| !request.filters.wants_unplayed() || !item.user_data.as_ref().is_some_and(|u| u.played))
            .collect();

        let total = u32::try_from(matches.len()).unwrap_or(u32::MAX);
        let items = matches
            .into_iter()
            .skip(request.start_index as usize)
            .take(request.limit as usize)
            .collect();
        Ok(Page::new(items, Some(total)))
    }

    #[instrument(skip(self))]
    async fn recommended_keywords(&self, limit: u32) -> Result<Vec<String>> {
        let filters = Filters::default().sorted(SortKey::Random, SortOrder::Ascending);
        let items = self.random_items(&filters, limit).await?;

        let mut keywords: Vec<String> = Vec::new();
        for name in items.into_iter().filter_map(|i| i.name) {
            if !keywords.contains(&name) {
                keywords.push(name);
            }
        }
        Ok(keywords)
    }

    #[instrument(skip(self))]
    async fn random_items(&self, filters: &Filters, limit: u32) -> Result<Vec<MediaItem>> {
        let filters = Filters {
            sort_by: Some(vec![SortKey::Random]),
            sort_order: None,
            ..filters.clone()
        };
        let mut params = Params::new();
        apply_filters(&mut params, &filters, Some(DEFAULT_TYPES));
        paging(&mut params, 0, limit);
        self.fetch_items("/library/all", &params).await
    }

    #[instrument(skip(self))]
    async fn filter_values(&self, parent_id: Option<&str>) -> Result<FilterValues> {
        let Some(library) = parent_id.filter(|id| section_key(id).is_some()) else {
            debug!("Filter values are only available per library section");
            return Ok(FilterValues::default());
        };

        let genres = self.directory_titles(&Self::library_path(library, "genre")).await?;
        let tags = self.directory_titles(&Self::library_path(library, "label")).await?;
        let years = self
            .directory_titles(&Self::library_path(library, "year"))
            .await?
            .into_iter()
            .filter_map(|y| y.parse().ok())
            .collect();
        let official_ratings = self
            .directory_titles(&Self::library_path(library, "contentRating"))
            .await?;

        Ok(FilterValues {
            genres,
            tags,
            years,
            official_ratings,
        })
    }
}

impl ImageResolver for PlexClient {
    fn resolve_image(&self, item: &MediaItem, prefs: &ImagePreferences) -> ResolvedImage {
        image::resolve(self.ctx.base_url(), &self.ctx.access_token, item, prefs)
    }
}

#[async_trait]
impl Playback for PlexClient {
    #[instrument(skip(self, request), fields(item = ?request.item.id))]
    async fn negotiate(&self, request: &NegotiateRequest) -> Result<Option<StreamInfo>> {
        if request
            .user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or(self.user_id())
            .is_none()
        {
            debug!("No user id yet, skipping negotiation");
            return Ok(None);
        }

        let item = &request.item;
        let target = if item.kind == ItemKind::Program {
            item.channel_id.as_deref().filter(|id| !id.is_empty())
        } else {
            item.navigation_id()
        };
        let Some(target) = target else {
            debug!("Item has no playable id, skipping negotiation");
            return Ok(None);
        };
        let start_ticks = if item.kind.is_live() { 0 } else { request.start_ticks.max(0) };

        let session = Uuid::new_v4().to_string();
        let media_index = request
            .media_source_id
            .as_deref()
            .and_then(|id| {
                item.media_sources
                    .iter()
                    .position(|s| s.id.as_deref() == Some(id))
            })
            .unwrap_or(0);

        let params = self.transcode_params(target, media_index, request, &session, start_ticks);
        let url = self.url("/video/:/transcode/universal/decision", &params)?;
        let response: PlexResponse = self
            .http
            .get_json(&url, self.session_headers(&session)?)
            .await?;
        let container = response.media_container;

        let Some(media) = container
            .metadata
            .first()
            .and_then(|m: &PlexMetadata| m.media.first())
        else {
            warn!(
                "No playable media in decision: {:?}",
                container.general_decision_text
            );
            return Err(MediaError::Parse(
                "transcode decision returned no media".to_string(),
            ));
        };
        let part = media.part.first();

        let direct = match part.and_then(|p| p.decision.as_deref()) {
            Some(decision) => decision == "directplay",
            None => container.direct_play_decision_code == Some(DIRECT_PLAY_OK),
        };

        let (url, play_method) = match (direct, part.and_then(|p| p.key.as_deref())) {
            (true, Some(key)) => {
                // Part URLs ignore offset and stream selection; the player seeks to start_position_ticks.
                let params: Params = vec![
                    (TOKEN_HEADER, self.ctx.access_token.clone()),
                    ("X-Plex-Client-Identifier", self.device.id.clone()),
                    (SESSION_HEADER, session.clone()),
                ];
                (self.url(key, &params)?, PlayMethod::DirectPlay)
            }
            _ => {
                let mut params = params;
                params.push((TOKEN_HEADER, self.ctx.access_token.clone()));
                (
                    self.url("/video/:/transcode/universal/start.m3u8", &params)?,
                    PlayMethod::Transcode,
                )
            }
        };

        info!("Negotiated {:?} for {} (session {})", play_method, target, session);

        Ok(Some(StreamInfo {
            url,
            play_session_id: Some(session),
            media_source: Some(normalize_media(media)),
            play_method,
            item_id: target.to_string(),
            start_position_ticks: start_ticks,
            audio_stream_index: request.audio_stream_index,
            subtitle_stream_index: request.subtitle_stream_index,
        }))
    }

    #[instrument(skip(self, report), fields(session = %report.play_session_id))]
    async fn report_start(&self, report: &PlaybackReport) -> Result<()> {
        self.timeline(report, "playing").await
    }

    #[instrument(skip(self, report), fields(session = %report.play_session_id))]
    async fn report_progress(&self, report: &PlaybackReport) -> Result<()> {
        let state = if report.is_paused { "paused" } else { "playing" };
        self.timeline(report, state).await
    }

    #[instrument(skip(self, report), fields(session = %report.play_session_id))]
    async fn report_stop(&self, report: &PlaybackReport) -> Result<()> {
        let timeline = self.timeline(report, "stopped").await;
        // The transcoder keeps running until told otherwise, even if the timeline failed.
        if report.play_method == PlayMethod::Transcode {
            let url = self.url(
                "/video/:/transcode/universal/stop",
                &[("session", report.play_session_id.clone())],
            )?;
            self.http
                .send(Method::GET, &url, self.session_headers(&report.play_session_id)?)
                .await?;
        }
        timeline
    }
}

#[async_trait]
impl Mutations for PlexClient {
    #[instrument(skip(self))]
    async fn set_favorite(&self, item_id: &str, favorite: bool) -> Result<()> {
        let rating = if favorite { FAVORITE_RATING } else { -1.0 };
        let url = self.url(
            "/:/rate",
            &[
                ("key", item_id.to_string()),
                ("identifier", LIBRARY_IDENTIFIER.to_string()),
                ("rating", rating.to_string()),
            ],
        )?;
        self.http.send(Method::PUT, &url, self.headers()?).await
    }

    #[instrument(skip(self))]
    async fn set_played(&self, item_id: &str, played: bool) -> Result<()> {
        let path = if played { "/:/scrobble" } else { "/:/unscrobble" };
        let url = self.url(
            path,
            &[
                ("key", item_id.to_string()),
                ("identifier", LIBRARY_IDENTIFIER.to_string()),
            ],
        )?;
        self.http.send(Method::GET, &url, self.headers()?).await
    }
}
