//! Jellyfin/Emby implementation of the media contract.

pub mod image;
pub mod normalize;
pub mod profile;
pub mod types;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Method;
use tracing::{debug, info, instrument, warn};

use crate::adapter::{ImageResolver, Library, Mutations, Playback};
use crate::error::{MediaError, Result};
use crate::http::HttpClient;
use crate::models::{
    DeviceIdentity, FilterValues, Filters, ImagePreferences, ItemKind, MediaItem,
    NegotiateRequest, Page, PageRequest, PlayMethod, PlaybackReport, ProtocolKind,
    ResolvedImage, ServerContext, ServerInfo, SortKey, SortOrder, StreamInfo,
};
use normalize::{kind_to_native, normalize, normalize_source, sort_to_native};
use types::{
    ItemsResponse, JellyfinItem, PlaybackInfoRequest, PlaybackInfoResponse, PlaybackStateBody,
    PublicSystemInfo, QueryFiltersLegacy,
};

const AUTH_HEADER: &str = "X-Emby-Authorization";

const ITEM_FIELDS: &str = "PrimaryImageAspectRatio,Overview,Genres,Studios,People,Tags,\
ChildCount,OriginalTitle,MediaSources,MediaStreams,DateCreated,ParentId";

const IMAGE_TYPES: &str = "Primary,Backdrop,Thumb,Banner,Logo";

type Params = Vec<(&'static str, String)>;

pub struct JellyfinClient {
    http: HttpClient,
    ctx: ServerContext,
    device: DeviceIdentity,
}

impl JellyfinClient {
    pub fn new(http: HttpClient, ctx: ServerContext, device: DeviceIdentity) -> Self {
        Self { http, ctx, device }
    }

    #[instrument(skip(http))]
    pub async fn probe(http: &HttpClient, address: &str) -> Result<ServerInfo> {
        let url = format!("{}/System/Info/Public", address.trim_end_matches('/'));
        let info: PublicSystemInfo = http.get_json(&url, json_headers()).await?;
        info!(
            "Probed Jellyfin server {:?} version {:?}",
            info.server_name, info.version
        );
        Ok(server_info(info))
    }

    fn user_id(&self) -> Option<&str> {
        self.ctx.user_id.as_deref().filter(|id| !id.is_empty())
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = json_headers();
        let auth = format!(
            r#"MediaBrowser Client="{}", Device="{}", DeviceId="{}", Version="{}", Token="{}""#,
            self.device.client,
            self.device.name,
            self.device.id,
            self.device.version,
            self.ctx.access_token
        );
        headers.insert(AUTH_HEADER, HeaderValue::from_str(&auth)?);
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

    async fn fetch_page(&self, path: &str, params: &[(&str, String)]) -> Result<Page<MediaItem>> {
        let url = self.url(path, params)?;
        let response: ItemsResponse = self.http.get_json(&url, self.headers()?).await?;
        debug!(
            "Received {} items (total {:?})",
            response.items.len(),
            response.total_record_count
        );
        Ok(Page::new(response.items, response.total_record_count).map(normalize))
    }

    async fn fetch_items(&self, path: &str, params: &[(&str, String)]) -> Result<Vec<MediaItem>> {
        Ok(self.fetch_page(path, params).await?.items)
    }

    /// For endpoints that answer with a bare array instead of an envelope.
    async fn fetch_array(&self, path: &str, params: &[(&str, String)]) -> Result<Vec<MediaItem>> {
        let url = self.url(path, params)?;
        let items: Vec<JellyfinItem> = self.http.get_json(&url, self.headers()?).await?;
        Ok(items.into_iter().map(normalize).collect())
    }

    fn base_params(limit: Option<u32>) -> Params {
        let mut params = vec![
            ("Fields", ITEM_FIELDS.to_string()),
            ("EnableImageTypes", IMAGE_TYPES.to_string()),
            ("ImageTypeLimit", "1".to_string()),
        ];
        if let Some(limit) = limit {
            params.push(("Limit", limit.to_string()));
        }
        params
    }

    fn paged_params(request: &PageRequest) -> Params {
        let mut params = Self::base_params(Some(request.limit));
        params.push(("StartIndex", request.start_index.to_string()));
        params.push(("EnableTotalRecordCount", "true".to_string()));
        apply_filters(&mut params, &request.filters, &[]);
        params
    }

    async fn send_report(&self, path: &str, report: &PlaybackReport) -> Result<()> {
        let body = PlaybackStateBody {
            item_id: &report.item_id,
            play_session_id: &report.play_session_id,
            media_source_id: report.media_source_id.as_deref(),
            position_ticks: report.position_ticks,
            is_paused: report.is_paused,
            can_seek: true,
            play_method: report.play_method.as_str(),
            audio_stream_index: report.audio_stream_index,
            subtitle_stream_index: report.subtitle_stream_index,
        };
        let url = self.url(path, &[])?;
        self.http
            .send_json(Method::POST, &url, self.headers()?, &body)
            .await
    }

    fn require_user(&self) -> Result<&str> {
        self.user_id()
            .ok_or_else(|| MediaError::InvalidConfig("Missing user_id".to_string()))
    }

    fn direct_play_url(
        &self,
        item_id: &str,
        source: &types::MediaSourceInfo,
        request: &NegotiateRequest,
        play_session_id: Option<&str>,
        start_ticks: i64,
    ) -> Result<String> {
        let path = match source.container.as_deref().and_then(|c| c.split(',').next()) {
            Some(container) if !container.is_empty() => {
                format!("/Videos/{}/stream.{}", urlencoding::encode(item_id), container)
            }
            _ => format!("/Videos/{}/stream", urlencoding::encode(item_id)),
        };

        let mut params: Params = vec![("Static", "true".to_string())];
        if let Some(id) = &source.id {
            params.push(("MediaSourceId", id.clone()));
        }
        params.push(("DeviceId", self.device.id.clone()));
        params.push(("api_key", self.ctx.access_token.clone()));
        if let Some(session) = play_session_id {
            params.push(("PlaySessionId", session.to_string()));
        }
        if let Some(live) = &source.live_stream_id {
            params.push(("LiveStreamId", live.clone()));
        }
        if let Some(audio) = request.audio_stream_index {
            params.push(("AudioStreamIndex", audio.to_string()));
        }
        if let Some(subtitle) = request.subtitle_stream_index {
            params.push(("SubtitleStreamIndex", subtitle.to_string()));
        }
        if start_ticks > 0 {
            params.push(("StartTimeTicks", start_ticks.to_string()));
        }
        if let Some(bitrate) = request.max_bitrate {
            params.push(("MaxStreamingBitrate", bitrate.to_string()));
        }
        self.url(&path, &params)
    }
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

fn server_info(info: PublicSystemInfo) -> ServerInfo {
    ServerInfo {
        id: info.id,
        name: info.server_name,
        version: info.version,
        protocol: ProtocolKind::Jellyfin,
    }
}

fn apply_filters(params: &mut Params, filters: &Filters, extra_flags: &[&str]) {
    if let Some(kinds) = filters.item_kinds() {
        let kinds: Vec<&str> = kinds.iter().map(kind_to_native).collect();
        params.push(("IncludeItemTypes", kinds.join(",")));
    }
    if let Some(keys) = filters.sort_keys() {
        let keys: Vec<&str> = keys.iter().map(sort_to_native).collect();
        params.push(("SortBy", keys.join(",")));
    }
    if let Some(order) = filters.sort_order {
        let order = match order {
            SortOrder::Ascending => "Ascending",
            SortOrder::Descending => "Descending",
        };
        params.push(("SortOrder", order.to_string()));
    }

    let mut flags: Vec<&str> = extra_flags.to_vec();
    if filters.wants_unplayed() {
        flags.push("IsUnplayed");
    }
    if !flags.is_empty() {
        params.push(("Filters", flags.join(",")));
    }

    if let Some(year) = filters.year {
        params.push(("Years", year.to_string()));
    }
    if let Some(tags) = filters.tag_list() {
        params.push(("Tags", tags.join("|")));
    }
    if let Some(genres) = filters.genre_list() {
        params.push(("Genres", genres.join("|")));
    }
}

/// A transcode that would burn subtitles in when none were asked for is
/// switched to segment delivery instead.
pub(crate) fn suppress_burned_subtitles(transcoding_url: &str) -> String {
    transcoding_url.replace("SubtitleMethod=Encode", "SubtitleMethod=Hls")
}

#[async_trait]
impl Library for JellyfinClient {
    #[instrument(skip(self))]
    async fn server_info(&self) -> Result<ServerInfo> {
        let url = self.url("/System/Info", &[])?;
        let info: PublicSystemInfo = self.http.get_json(&url, self.headers()?).await?;
        Ok(server_info(info))
    }

    #[instrument(skip(self))]
    async fn libraries(&self) -> Result<Vec<MediaItem>> {
        let Some(user) = self.user_id() else {
            return Ok(Vec::new());
        };
        self.fetch_items(&format!("/Users/{}/Views", user), &[]).await
    }

    #[instrument(skip(self))]
    async fn get_item(&self, item_id: &str) -> Result<Option<MediaItem>> {
        let Some(user) = self.user_id() else {
            return Ok(None);
        };
        if item_id.is_empty() {
            return Ok(None);
        }
        let url = self.url(
            &format!("/Users/{}/Items/{}", user, urlencoding::encode(item_id)),
            &Self::base_params(None),
        )?;
        let raw: JellyfinItem = self.http.get_json(&url, self.headers()?).await?;
        Ok(raw.id.is_some().then(|| normalize(raw)))
    }

    #[instrument(skip(self))]
    async fn latest_by_library(&self, library_id: &str, limit: u32) -> Result<Vec<MediaItem>> {
        let Some(user) = self.user_id() else {
            return Ok(Vec::new());
        };
        let mut params = Self::base_params(Some(limit));
        params.push(("ParentId", library_id.to_string()));
        self.fetch_array(&format!("/Users/{}/Items/Latest", user), &params)
            .await
    }

    #[instrument(skip(self))]
    async fn latest(&self, limit: u32) -> Result<Vec<MediaItem>> {
        let Some(user) = self.user_id() else {
            return Ok(Vec::new());
        };
        let mut params = Self::base_params(Some(limit));
        params.push(("IncludeItemTypes", "Movie,Series,Episode,MusicVideo".to_string()));
        self.fetch_array(&format!("/Users/{}/Items/Latest", user), &params)
            .await
    }

    #[instrument(skip(self))]
    async fn resume(&self, limit: u32) -> Result<Vec<MediaItem>> {
        let Some(user) = self.user_id() else {
            return Ok(Vec::new());
        };
        let mut params = Self::base_params(Some(limit));
        params.push(("Recursive", "true".to_string()));
        params.push(("MediaTypes", "Video".to_string()));
        self.fetch_items(&format!("/Users/{}/Items/Resume", user), &params)
            .await
    }

    #[instrument(skip(self))]
    async fn next_up(&self, limit: u32) -> Result<Vec<MediaItem>> {
        let Some(user) = self.user_id() else {
            return Ok(Vec::new());
        };
        let mut params = Self::base_params(Some(limit));
        params.push(("UserId", user.to_string()));
        self.fetch_items("/Shows/NextUp", &params).await
    }

    #[instrument(skip(self))]
    async fn next_up_by_library(&self, library_id: &str, limit: u32) -> Result<Vec<MediaItem>> {
        let Some(user) = self.user_id() else {
            return Ok(Vec::new());
        };
        let mut params = Self::base_params(Some(limit));
        params.push(("UserId", user.to_string()));
        params.push(("ParentId", library_id.to_string()));
        self.fetch_items("/Shows/NextUp", &params).await
    }

    #[instrument(skip(self))]
    async fn favorites(&self, filters: &Filters) -> Result<Vec<MediaItem>> {
        let Some(user) = self.user_id() else {
            return Ok(Vec::new());
        };
        let mut params = Self::base_params(None);
        params.push(("Recursive", "true".to_string()));
        apply_filters(&mut params, filters, &["IsFavorite"]);
        self.fetch_items(&format!("/Users/{}/Items", user), &params)
            .await
    }

    #[instrument(skip(self))]
    async fn favorites_paged(&self, request: &PageRequest) -> Result<Page<MediaItem>> {
        let Some(user) = self.user_id() else {
            return Ok(Page::empty());
        };
        let mut params = Self::base_params(Some(request.limit));
        params.push(("StartIndex", request.start_index.to_string()));
        params.push(("EnableTotalRecordCount", "true".to_string()));
        params.push(("Recursive", "true".to_string()));
        apply_filters(&mut params, &request.filters, &["IsFavorite"]);
        self.fetch_page(&format!("/Users/{}/Items", user), &params)
            .await
    }

    #[instrument(skip(self))]
    async fn folder_items(&self, parent_id: &str, request: &PageRequest) -> Result<Page<MediaItem>> {
        let Some(user) = self.user_id() else {
            return Ok(Page::empty());
        };
        let mut params = Self::paged_params(request);
        params.push(("ParentId", parent_id.to_string()));
        self.fetch_page(&format!("/Users/{}/Items", user), &params)
            .await
    }

    #[instrument(skip(self))]
    async fn seasons(&self, series_id: &str) -> Result<Vec<MediaItem>> {
        let Some(user) = self.user_id() else {
            return Ok(Vec::new());
        };
        let mut params = Self::base_params(None);
        params.push(("UserId", user.to_string()));
        self.fetch_items(
            &format!("/Shows/{}/Seasons", urlencoding::encode(series_id)),
            &params,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn episodes(&self, series_id: &str, season_id: &str) -> Result<Vec<MediaItem>> {
        let Some(user) = self.user_id() else {
            return Ok(Vec::new());
        };
        let mut params = Self::base_params(None);
        params.push(("UserId", user.to_string()));
        params.push(("SeasonId", season_id.to_string()));
        self.fetch_items(
            &format!("/Shows/{}/Episodes", urlencoding::encode(series_id)),
            &params,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn similar_shows(&self, item_id: &str, limit: u32) -> Result<Vec<MediaItem>> {
        let Some(user) = self.user_id() else {
            return Ok(Vec::new());
        };
        let mut params = Self::base_params(Some(limit));
        params.push(("UserId", user.to_string()));
        self.fetch_items(
            &format!("/Shows/{}/Similar", urlencoding::encode(item_id)),
            &params,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn similar_movies(&self, item_id: &str, limit: u32) -> Result<Vec<MediaItem>> {
        let Some(user) = self.user_id() else {
            return Ok(Vec::new());
        };
        let mut params = Self::base_params(Some(limit));
        params.push(("UserId", user.to_string()));
        self.fetch_items(
            &format!("/Movies/{}/Similar", urlencoding::encode(item_id)),
            &params,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn search(&self, term: &str, request: &PageRequest) -> Result<Page<MediaItem>> {
        let Some(user) = self.user_id() else {
            return Ok(Page::empty());
        };
        let mut params = Self::paged_params(request);
        params.push(("SearchTerm", term.to_string()));
        params.push(("Recursive", "true".to_string()));
        self.fetch_page(&format!("/Users/{}/Items", user), &params)
            .await
    }

    #[instrument(skip(self))]
    async fn recommended_keywords(&self, limit: u32) -> Result<Vec<String>> {
        let Some(user) = self.user_id() else {
            return Ok(Vec::new());
        };
        let params: Params = vec![
            ("Recursive", "true".to_string()),
            ("IncludeItemTypes", "Movie,Series".to_string()),
            ("SortBy", "IsFavoriteOrLiked,Random".to_string()),
            ("Limit", limit.to_string()),
            ("EnableImages", "false".to_string()),
        ];
        let items = self
            .fetch_items(&format!("/Users/{}/Items", user), &params)
            .await?;

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
        let Some(user) = self.user_id() else {
            return Ok(Vec::new());
        };
        let filters = Filters {
            sort_by: Some(vec![SortKey::Random]),
            sort_order: None,
            ..filters.clone()
        };
        let mut params = Self::base_params(Some(limit));
        params.push(("Recursive", "true".to_string()));
        apply_filters(&mut params, &filters, &[]);
        self.fetch_items(&format!("/Users/{}/Items", user), &params)
            .await
    }

    #[instrument(skip(self))]
    async fn filter_values(&self, parent_id: Option<&str>) -> Result<FilterValues> {
        let Some(user) = self.user_id() else {
            return Ok(FilterValues::default());
        };
        let mut params: Params = vec![("UserId", user.to_string())];
        if let Some(parent) = parent_id {
            params.push(("ParentId", parent.to_string()));
        }
        let url = self.url("/Items/Filters", &params)?;
        let filters: QueryFiltersLegacy = self.http.get_json(&url, self.headers()?).await?;
        Ok(FilterValues {
            genres: filters.genres,
            tags: filters.tags,
            years: filters.years,
            official_ratings: filters.official_ratings,
        })
    }
}

impl ImageResolver for JellyfinClient {
    fn resolve_image(&self, item: &MediaItem, prefs: &ImagePreferences) -> ResolvedImage {
        image::resolve(self.ctx.base_url(), item, prefs)
    }
}

#[async_trait]
impl Playback for JellyfinClient {
    #[instrument(skip(self, request), fields(item = ?request.item.id))]
    async fn negotiate(&self, request: &NegotiateRequest) -> Result<Option<StreamInfo>> {
        let Some(user_id) = request
            .user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or(self.user_id())
        else {
            debug!("No user id yet, skipping negotiation");
            return Ok(None);
        };

        let item = &request.item;
        let is_program = item.kind == ItemKind::Program;
        let target = if is_program {
            item.channel_id.as_deref().filter(|id| !id.is_empty())
        } else {
            item.navigation_id()
        };
        let Some(target) = target else {
            debug!("Item has no playable id, skipping negotiation");
            return Ok(None);
        };
        let start_ticks = if item.kind.is_live() { 0 } else { request.start_ticks.max(0) };

        let body = PlaybackInfoRequest {
            user_id: user_id.to_string(),
            start_time_ticks: start_ticks,
            is_playback: true,
            auto_open_live_stream: item.kind.is_live(),
            media_source_id: request.media_source_id.clone(),
            audio_stream_index: request.audio_stream_index,
            subtitle_stream_index: request.subtitle_stream_index,
            max_streaming_bitrate: request
                .max_bitrate
                .or(Some(request.capabilities.max_streaming_bitrate)),
            enable_direct_play: true,
            enable_direct_stream: true,
            enable_transcoding: true,
            device_profile: profile::device_profile(&request.capabilities),
        };

        let url = self.url(
            &format!("/Items/{}/PlaybackInfo", urlencoding::encode(target)),
            &[("UserId", user_id.to_string())],
        )?;
        let response: PlaybackInfoResponse =
            self.http.post_json(&url, self.headers()?, &body).await?;

        if let Some(code) = &response.error_code {
            warn!("Server refused playback: {}", code);
            return Err(MediaError::Parse(format!("playback refused: {}", code)));
        }
        let Some(source) = response.media_sources.first() else {
            return Err(MediaError::Parse(
                "PlaybackInfo returned no media sources".to_string(),
            ));
        };

        let play_session_id = response.play_session_id.clone();
        let transcoding = source
            .transcoding_url
            .as_deref()
            .filter(|path| !path.is_empty());

        let (url, play_method) = match transcoding {
            Some(path) => {
                let path = if request.subtitles_disabled() {
                    suppress_burned_subtitles(path)
                } else {
                    path.to_string()
                };
                (format!("{}{}", self.ctx.base_url(), path), PlayMethod::Transcode)
            }
            None => (
                self.direct_play_url(
                    target,
                    source,
                    request,
                    play_session_id.as_deref(),
                    start_ticks,
                )?,
                PlayMethod::DirectPlay,
            ),
        };

        info!(
            "Negotiated {:?} for {} (session {:?})",
            play_method, target, play_session_id
        );

        Ok(Some(StreamInfo {
            url,
            play_session_id,
            media_source: Some(normalize_source(source)),
            play_method,
            item_id: target.to_string(),
            start_position_ticks: start_ticks,
            audio_stream_index: request.audio_stream_index,
            subtitle_stream_index: request.subtitle_stream_index,
        }))
    }

    #[instrument(skip(self, report), fields(session = %report.play_session_id))]
    async fn report_start(&self, report: &PlaybackReport) -> Result<()> {
        self.send_report("/Sessions/Playing", report).await
    }

    #[instrument(skip(self, report), fields(session = %report.play_session_id))]
    async fn report_progress(&self, report: &PlaybackReport) -> Result<()> {
        self.send_report("/Sessions/Playing/Progress", report).await
    }

    #[instrument(skip(self, report), fields(session = %report.play_session_id))]
    async fn report_stop(&self, report: &PlaybackReport) -> Result<()> {
        self.send_report("/Sessions/Playing/Stopped", report).await
    }
}

#[async_trait]
impl Mutations for JellyfinClient {
    #[instrument(skip(self))]
    async fn set_favorite(&self, item_id: &str, favorite: bool) -> Result<()> {
        let user = self.require_user()?;
        let url = self.url(
            &format!("/Users/{}/FavoriteItems/{}", user, urlencoding::encode(item_id)),
            &[],
        )?;
        let method = if favorite { Method::POST } else { Method::DELETE };
        self.http.send(method, &url, self.headers()?).await
    }

    #[instrument(skip(self))]
    async fn set_played(&self, item_id: &str, played: bool) -> Result<()> {
        let user = self.require_user()?;
        let url = self.url(
            &format!("/Users/{}/PlayedItems/{}", user, urlencoding::encode(item_id)),
            &[],
        )?;
        let method = if played { Method::POST } else { Method::DELETE };
        self.http.send(method, &url, self.headers()?).await
    }
}
