use mediaplex::models::{
    DeviceIdentity, Filters, ImagePreferences, ItemKind, MediaItem, NegotiateRequest, PageRequest,
    PlayMethod, ProtocolKind, ServerContext,
};
use mediaplex::pagination::Pager;
use mediaplex::{
    HttpClient, ImageResolver, Library, MediaAdapter, MediaError, Mutations, Playback,
    PlaybackSession, ReportOutcome,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter(server: &MockServer, user: Option<&str>) -> MediaAdapter {
    let ctx = ServerContext::new(
        ProtocolKind::Jellyfin,
        server.uri(),
        "secret-token",
        user.map(str::to_string),
    );
    let device = DeviceIdentity {
        id: "device-1".to_string(),
        ..DeviceIdentity::default()
    };
    MediaAdapter::connect(Some(ctx), device, HttpClient::new().unwrap())
}

fn movie(id: &str) -> MediaItem {
    MediaItem {
        id: Some(id.to_string()),
        name: Some("Movie".to_string()),
        kind: ItemKind::Movie,
        ..MediaItem::default()
    }
}

#[tokio::test]
async fn empty_favorites_page_ends_pagination() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Users/u1/Items"))
        .and(query_param("IncludeItemTypes", "Movie,Series,Episode,BoxSet,Season"))
        .and(query_param("StartIndex", "0"))
        .and(query_param("Limit", "40"))
        .and(query_param("Filters", "IsFavorite"))
        .and(query_param("Recursive", "true"))
        .and(header_exists("X-Emby-Authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [],
            "TotalRecordCount": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server, Some("u1"));
    let filters = Filters::kinds([
        ItemKind::Movie,
        ItemKind::Series,
        ItemKind::Episode,
        ItemKind::BoxSet,
        ItemKind::Season,
    ]);
    let mut pager = Pager::new(40, filters);
    let request = pager.next_request().unwrap();
    let page = adapter.favorites_paged(&request).await.unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.total_count, Some(0));
    pager.absorb(&page);
    assert!(!pager.has_more());
}

#[tokio::test]
async fn pages_keep_server_totals() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Users/u1/Items"))
        .and(query_param("ParentId", "lib1"))
        .and(query_param("StartIndex", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [
                {"Id": "a", "Name": "A", "Type": "Movie"},
                {"Id": "b", "Name": "B", "Type": "Series", "ChildCount": 3}
            ],
            "TotalRecordCount": 9
        })))
        .mount(&server)
        .await;

    let adapter = adapter(&server, Some("u1"));
    let page = adapter
        .folder_items("lib1", &PageRequest::new(2, 2))
        .await
        .unwrap();
    assert_eq!(page.total_count, Some(9));
    assert_eq!(page.items[1].kind, ItemKind::Series);
    assert_eq!(page.items[1].child_count, Some(3));
}

#[tokio::test]
async fn missing_user_makes_reads_and_negotiation_not_ready() {
    let server = MockServer::start().await;
    let adapter = adapter(&server, None);

    assert!(adapter.latest(10).await.unwrap().is_empty());
    let page = adapter.favorites_paged(&PageRequest::new(0, 40)).await.unwrap();
    assert!(page.items.is_empty());
    let stream = adapter
        .negotiate(&NegotiateRequest::new(movie("i1"), None))
        .await
        .unwrap();
    assert!(stream.is_none());

    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn empty_body_decodes_to_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Users/u1/Items/Latest"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let adapter = adapter(&server, Some("u1"));
    assert!(adapter.latest(16).await.unwrap().is_empty());
}

#[tokio::test]
async fn disabled_subtitles_are_never_burned_in() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/Items/i1/PlaybackInfo"))
        .and(body_partial_json(json!({"SubtitleStreamIndex": -1, "UserId": "u1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaSources": [{
                "Id": "i1",
                "SupportsDirectPlay": false,
                "TranscodingUrl": "/videos/i1/master.m3u8?MediaSourceId=i1&SubtitleMethod=Encode&api_key=t"
            }],
            "PlaySessionId": "ps1"
        })))
        .mount(&server)
        .await;

    let adapter = adapter(&server, Some("u1"));
    let request = NegotiateRequest {
        subtitle_stream_index: Some(-1),
        ..NegotiateRequest::new(movie("i1"), None)
    };
    let stream = adapter.negotiate(&request).await.unwrap().unwrap();

    assert_eq!(stream.play_method, PlayMethod::Transcode);
    assert!(stream.url.contains("SubtitleMethod=Hls"));
    assert!(!stream.url.contains("SubtitleMethod=Encode"));
    assert!(stream.url.starts_with(&server.uri()));
    assert_eq!(stream.play_session_id.as_deref(), Some("ps1"));
}

#[tokio::test]
async fn direct_play_url_carries_session_and_position() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/Items/i1/PlaybackInfo"))
        .and(body_partial_json(json!({"StartTimeTicks": 600_000_000i64, "MediaSourceId": "src1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaSources": [{
                "Id": "src1",
                "Container": "mkv,webm",
                "SupportsDirectPlay": true,
                "RunTimeTicks": 72_000_000_000i64,
                "MediaStreams": [
                    {"Type": "Video", "Index": 0, "Codec": "h264"},
                    {"Type": "Audio", "Index": 1, "Codec": "aac", "IsDefault": true}
                ]
            }],
            "PlaySessionId": "ps2"
        })))
        .mount(&server)
        .await;

    let adapter = adapter(&server, Some("u1"));
    let request = NegotiateRequest {
        start_ticks: 600_000_000,
        media_source_id: Some("src1".to_string()),
        audio_stream_index: Some(1),
        ..NegotiateRequest::new(movie("i1"), None)
    };
    let stream = adapter.negotiate(&request).await.unwrap().unwrap();
    assert_eq!(stream.play_method, PlayMethod::DirectPlay);

    let url = url::Url::parse(&stream.url).unwrap();
    assert_eq!(url.path(), "/Videos/i1/stream.mkv");
    let query: std::collections::HashMap<String, String> = url.query_pairs().into_owned().collect();
    assert_eq!(query.get("Static").map(String::as_str), Some("true"));
    assert_eq!(query.get("MediaSourceId").map(String::as_str), Some("src1"));
    assert_eq!(query.get("PlaySessionId").map(String::as_str), Some("ps2"));
    assert_eq!(query.get("DeviceId").map(String::as_str), Some("device-1"));
    assert_eq!(query.get("AudioStreamIndex").map(String::as_str), Some("1"));
    assert_eq!(query.get("StartTimeTicks").map(String::as_str), Some("600000000"));

    let source = stream.media_source.unwrap();
    assert_eq!(source.default_audio_index(), Some(1));
    assert_eq!(source.run_time_ticks, Some(72_000_000_000));
}

#[tokio::test]
async fn refused_playback_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/Items/i1/PlaybackInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaSources": [],
            "ErrorCode": "NotAllowed"
        })))
        .mount(&server)
        .await;

    let adapter = adapter(&server, Some("u1"));
    let result = adapter
        .negotiate(&NegotiateRequest::new(movie("i1"), None))
        .await;
    assert!(matches!(result, Err(MediaError::Parse(_))));
}

#[tokio::test]
async fn live_program_negotiates_against_its_channel() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/Items/ch7/PlaybackInfo"))
        .and(body_partial_json(json!({"StartTimeTicks": 0, "AutoOpenLiveStream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaSources": [{
                "Id": "live1",
                "Container": "ts",
                "LiveStreamId": "ls-9"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server, Some("u1"));
    let program = MediaItem {
        id: Some("prog1".to_string()),
        kind: ItemKind::Program,
        channel_id: Some("ch7".to_string()),
        ..MediaItem::default()
    };
    let request = NegotiateRequest {
        start_ticks: 123_456,
        ..NegotiateRequest::new(program, None)
    };
    let stream = adapter.negotiate(&request).await.unwrap().unwrap();

    assert_eq!(stream.item_id, "ch7");
    assert_eq!(stream.start_position_ticks, 0);
    assert!(stream.play_session_id.is_none());
    assert!(stream.url.contains("LiveStreamId=ls-9"));
}

#[tokio::test]
async fn session_reports_thread_the_session_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/Items/i1/PlaybackInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaSources": [{"Id": "src1", "Container": "mp4"}],
            "PlaySessionId": "ps3"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Sessions/Playing"))
        .and(body_partial_json(json!({
            "ItemId": "i1",
            "PlaySessionId": "ps3",
            "MediaSourceId": "src1",
            "PlayMethod": "DirectPlay"
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Sessions/Playing/Progress"))
        .and(body_partial_json(json!({"PlaySessionId": "ps3", "PositionTicks": 20_000_000, "IsPaused": true})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Sessions/Playing/Stopped"))
        .and(body_partial_json(json!({"PlaySessionId": "ps3", "PositionTicks": 50_000_000})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let session = PlaybackSession::new(Arc::new(adapter(&server, Some("u1"))));
    session
        .negotiate(&NegotiateRequest::new(movie("i1"), None))
        .await
        .unwrap();
    assert_eq!(session.current_session_id().await.as_deref(), Some("ps3"));

    assert_eq!(session.start().await, ReportOutcome::Sent);
    assert_eq!(session.start().await, ReportOutcome::Skipped);
    assert_eq!(session.progress(20_000_000, true).await, ReportOutcome::Sent);
    assert_eq!(session.stop(Some(50_000_000)).await, ReportOutcome::Sent);
    assert_eq!(session.stop(Some(60_000_000)).await, ReportOutcome::Skipped);
}

#[tokio::test]
async fn failed_reports_are_swallowed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/Items/i1/PlaybackInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaSources": [{"Id": "src1", "Container": "mp4"}],
            "PlaySessionId": "ps4"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/Sessions/Playing"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let session = PlaybackSession::new(Arc::new(adapter(&server, Some("u1"))));
    session
        .negotiate(&NegotiateRequest::new(movie("i1"), None))
        .await
        .unwrap();
    assert_eq!(session.start().await, ReportOutcome::Sent);
}

#[tokio::test]
async fn mutation_failures_propagate() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/Users/u1/FavoriteItems/i1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/Users/u1/PlayedItems/i1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server, Some("u1"));
    match adapter.set_favorite("i1", true).await {
        Err(MediaError::Http { status, .. }) => assert_eq!(status.as_u16(), 500),
        other => panic!("expected HTTP error, got {:?}", other),
    }
    adapter.set_played("i1", false).await.unwrap();
}

#[tokio::test]
async fn mutations_without_user_fail() {
    let server = MockServer::start().await;
    let adapter = adapter(&server, None);
    assert!(matches!(
        adapter.set_favorite("i1", true).await,
        Err(MediaError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn fetched_items_resolve_images_against_the_server() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Users/u1/Items/ep1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Id": "ep1",
            "Name": "Pilot",
            "Type": "Episode",
            "SeriesId": "show1",
            "SeriesPrimaryImageTag": "sp",
            "ImageTags": {}
        })))
        .mount(&server)
        .await;

    let adapter = adapter(&server, Some("u1"));
    let item = adapter.get_item("ep1").await.unwrap().unwrap();
    let image = adapter.resolve_image(&item, &ImagePreferences::default());
    assert_eq!(image.item_id.as_deref(), Some("show1"));
    assert!(image
        .url
        .unwrap()
        .starts_with(&format!("{}/Items/show1/Images/Primary?tag=sp", server.uri())));
}
