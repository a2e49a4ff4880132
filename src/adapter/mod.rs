//! The protocol-neutral operation set and the facade that picks an
//! implementation per configured server.

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::{MediaError, Result};
use crate::http::HttpClient;
use crate::jellyfin::JellyfinClient;
use crate::models::{
    DeviceIdentity, FilterValues, Filters, ImagePreferences, MediaItem,
    NegotiateRequest, Page, PageRequest, PlaybackReport, ProtocolKind, ResolvedImage,
    ServerContext, ServerInfo, StreamInfo,
};
use crate::plex::PlexClient;

/// Read operations. Results are canonical items; totals are preserved
/// where the server reports them.
#[async_trait]
pub trait Library: Send + Sync {
    async fn server_info(&self) -> Result<ServerInfo>;

    async fn libraries(&self) -> Result<Vec<MediaItem>>;

    async fn get_item(&self, item_id: &str) -> Result<Option<MediaItem>>;

    async fn latest_by_library(&self, library_id: &str, limit: u32) -> Result<Vec<MediaItem>>;

    async fn latest(&self, limit: u32) -> Result<Vec<MediaItem>>;

    async fn resume(&self, limit: u32) -> Result<Vec<MediaItem>>;

    async fn next_up(&self, limit: u32) -> Result<Vec<MediaItem>>;

    async fn next_up_by_library(&self, library_id: &str, limit: u32) -> Result<Vec<MediaItem>>;

    async fn favorites(&self, filters: &Filters) -> Result<Vec<MediaItem>>;

    async fn favorites_paged(&self, request: &PageRequest) -> Result<Page<MediaItem>>;

    async fn folder_items(&self, parent_id: &str, request: &PageRequest) -> Result<Page<MediaItem>>;

    async fn seasons(&self, series_id: &str) -> Result<Vec<MediaItem>>;

    async fn episodes(&self, series_id: &str, season_id: &str) -> Result<Vec<MediaItem>>;

    async fn similar_shows(&self, item_id: &str, limit: u32) -> Result<Vec<MediaItem>>;

    async fn similar_movies(&self, item_id: &str, limit: u32) -> Result<Vec<MediaItem>>;

    async fn search(&self, term: &str, request: &PageRequest) -> Result<Page<MediaItem>>;

    async fn recommended_keywords(&self, limit: u32) -> Result<Vec<String>>;

    async fn random_items(&self, filters: &Filters, limit: u32) -> Result<Vec<MediaItem>>;

    async fn filter_values(&self, parent_id: Option<&str>) -> Result<FilterValues>;
}

pub trait ImageResolver {
    fn resolve_image(&self, item: &MediaItem, prefs: &ImagePreferences) -> ResolvedImage;
}

/// Stream negotiation and session reports.
///
/// `negotiate` returns `Ok(None)` when it is not ready to run (no user,
/// no item id). Reports are best-effort on the caller side but still
/// return the transport outcome.
#[async_trait]
pub trait Playback: Send + Sync {
    async fn negotiate(&self, request: &NegotiateRequest) -> Result<Option<StreamInfo>>;

    async fn report_start(&self, report: &PlaybackReport) -> Result<()>;

    async fn report_progress(&self, report: &PlaybackReport) -> Result<()>;

    async fn report_stop(&self, report: &PlaybackReport) -> Result<()>;
}

/// User-state changes. Errors always propagate so optimistic callers can roll back.
#[async_trait]
pub trait Mutations: Send + Sync {
    async fn set_favorite(&self, item_id: &str, favorite: bool) -> Result<()>;

    async fn set_played(&self, item_id: &str, played: bool) -> Result<()>;
}

/// One adapter per configured server. `Unconfigured` answers reads with
/// empty results so disabled screens need no special casing.
pub enum MediaAdapter {
    Jellyfin(JellyfinClient),
    Plex(PlexClient),
    Unconfigured,
}

macro_rules! dispatch {
    ($self:ident, $client:ident => $call:expr, unconfigured => $fallback:expr) => {
        match $self {
            MediaAdapter::Jellyfin($client) => $call,
            MediaAdapter::Plex($client) => $call,
            MediaAdapter::Unconfigured => $fallback,
        }
    };
}

impl MediaAdapter {
    pub fn connect(context: Option<ServerContext>, device: DeviceIdentity, http: HttpClient) -> Self {
        match context {
            Some(ctx) => {
                debug!("Connecting {} adapter to {}", ctx.protocol, ctx.base_url());
                match ctx.protocol {
                    ProtocolKind::Jellyfin => Self::Jellyfin(JellyfinClient::new(http, ctx, device)),
                    ProtocolKind::Plex => Self::Plex(PlexClient::new(http, ctx, device)),
                }
            }
            None => Self::Unconfigured,
        }
    }

    pub fn protocol(&self) -> Option<ProtocolKind> {
        match self {
            Self::Jellyfin(_) => Some(ProtocolKind::Jellyfin),
            Self::Plex(_) => Some(ProtocolKind::Plex),
            Self::Unconfigured => None,
        }
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self, Self::Unconfigured)
    }

    /// One unauthenticated request identifying the server at `address`.
    #[instrument(skip(http))]
    pub async fn probe(http: &HttpClient, protocol: ProtocolKind, address: &str) -> Result<ServerInfo> {
        match protocol {
            ProtocolKind::Jellyfin => JellyfinClient::probe(http, address).await,
            ProtocolKind::Plex => PlexClient::probe(http, address).await,
        }
    }
}

#[async_trait]
impl Library for MediaAdapter {
    async fn server_info(&self) -> Result<ServerInfo> {
        dispatch!(self, c => c.server_info().await,
            unconfigured => Err(MediaError::InvalidConfig("no server configured".to_string())))
    }

    async fn libraries(&self) -> Result<Vec<MediaItem>> {
        dispatch!(self, c => c.libraries().await, unconfigured => Ok(Vec::new()))
    }

    async fn get_item(&self, item_id: &str) -> Result<Option<MediaItem>> {
        dispatch!(self, c => c.get_item(item_id).await, unconfigured => Ok(None))
    }

    async fn latest_by_library(&self, library_id: &str, limit: u32) -> Result<Vec<MediaItem>> {
        dispatch!(self, c => c.latest_by_library(library_id, limit).await, unconfigured => Ok(Vec::new()))
    }

    async fn latest(&self, limit: u32) -> Result<Vec<MediaItem>> {
        dispatch!(self, c => c.latest(limit).await, unconfigured => Ok(Vec::new()))
    }

    async fn resume(&self, limit: u32) -> Result<Vec<MediaItem>> {
        dispatch!(self, c => c.resume(limit).await, unconfigured => Ok(Vec::new()))
    }

    async fn next_up(&self, limit: u32) -> Result<Vec<MediaItem>> {
        dispatch!(self, c => c.next_up(limit).await, unconfigured => Ok(Vec::new()))
    }

    async fn next_up_by_library(&self, library_id: &str, limit: u32) -> Result<Vec<MediaItem>> {
        dispatch!(self, c => c.next_up_by_library(library_id, limit).await, unconfigured => Ok(Vec::new()))
    }

    async fn favorites(&self, filters: &Filters) -> Result<Vec<MediaItem>> {
        dispatch!(self, c => c.favorites(filters).await, unconfigured => Ok(Vec::new()))
    }

    async fn favorites_paged(&self, request: &PageRequest) -> Result<Page<MediaItem>> {
        dispatch!(self, c => c.favorites_paged(request).await, unconfigured => Ok(Page::empty()))
    }

    async fn folder_items(&self, parent_id: &str, request: &PageRequest) -> Result<Page<MediaItem>> {
        dispatch!(self, c => c.folder_items(parent_id, request).await, unconfigured => Ok(Page::empty()))
    }

    async fn seasons(&self, series_id: &str) -> Result<Vec<MediaItem>> {
        dispatch!(self, c => c.seasons(series_id).await, unconfigured => Ok(Vec::new()))
    }

    async fn episodes(&self, series_id: &str, season_id: &str) -> Result<Vec<MediaItem>> {
        dispatch!(self, c => c.episodes(series_id, season_id).await, unconfigured => Ok(Vec::new()))
    }

    async fn similar_shows(&self, item_id: &str, limit: u32) -> Result<Vec<MediaItem>> {
        dispatch!(self, c => c.similar_shows(item_id, limit).await, unconfigured => Ok(Vec::new()))
    }

    async fn similar_movies(&self, item_id: &str, limit: u32) -> Result<Vec<MediaItem>> {
        dispatch!(self, c => c.similar_movies(item_id, limit).await, unconfigured => Ok(Vec::new()))
    }

    async fn search(&self, term: &str, request: &PageRequest) -> Result<Page<MediaItem>> {
        dispatch!(self, c => c.search(term, request).await, unconfigured => Ok(Page::empty()))
    }

    async fn recommended_keywords(&self, limit: u32) -> Result<Vec<String>> {
        dispatch!(self, c => c.recommended_keywords(limit).await, unconfigured => Ok(Vec::new()))
    }

    async fn random_items(&self, filters: &Filters, limit: u32) -> Result<Vec<MediaItem>> {
        dispatch!(self, c => c.random_items(filters, limit).await, unconfigured => Ok(Vec::new()))
    }

    async fn filter_values(&self, parent_id: Option<&str>) -> Result<FilterValues> {
        dispatch!(self, c => c.filter_values(parent_id).await, unconfigured => Ok(FilterValues::default()))
    }
}

impl ImageResolver for MediaAdapter {
    fn resolve_image(&self, item: &MediaItem, prefs: &ImagePreferences) -> ResolvedImage {
        dispatch!(self, c => c.resolve_image(item, prefs), unconfigured => ResolvedImage::none())
    }
}

#[async_trait]
impl Playback for MediaAdapter {
    async fn negotiate(&self, request: &NegotiateRequest) -> Result<Option<StreamInfo>> {
        dispatch!(self, c => c.negotiate(request).await, unconfigured => Ok(None))
    }

    async fn report_start(&self, report: &PlaybackReport) -> Result<()> {
        dispatch!(self, c => c.report_start(report).await, unconfigured => Ok(()))
    }

    async fn report_progress(&self, report: &PlaybackReport) -> Result<()> {
        dispatch!(self, c => c.report_progress(report).await, unconfigured => Ok(()))
    }

    async fn report_stop(&self, report: &PlaybackReport) -> Result<()> {
        dispatch!(self, c => c.report_stop(report).await, unconfigured => Ok(()))
    }
}

#[async_trait]
impl Mutations for MediaAdapter {
    async fn set_favorite(&self, item_id: &str, favorite: bool) -> Result<()> {
        dispatch!(self, c => c.set_favorite(item_id, favorite).await,
            unconfigured => Err(MediaError::InvalidConfig("no server configured".to_string())))
    }

    async fn set_played(&self, item_id: &str, played: bool) -> Result<()> {
        dispatch!(self, c => c.set_played(item_id, played).await,
            unconfigured => Err(MediaError::InvalidConfig("no server configured".to_string())))
    }
}
