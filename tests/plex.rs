use mediaplex::models::{
    DeviceIdentity, Filters, ItemKind, NegotiateRequest, PageRequest, PlayMethod, PlaybackReport,
    ProtocolKind, ServerContext,
};
use mediaplex::{HttpClient, Library, MediaAdapter, Mutations, Playback, PlaybackSession, ReportOutcome};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter(server: &MockServer) -> MediaAdapter {
    let ctx = ServerContext::new(ProtocolKind::Plex, server.uri(), "plex-token", Some("1".to_string()));
    let device = DeviceIdentity {
        id: "device-1".to_string(),
        ..DeviceIdentity::default()
    };
    MediaAdapter::connect(Some(ctx), device, HttpClient::new().unwrap())
}

fn movie_metadata() -> serde_json::Value {
    json!({
        "ratingKey": "42",
        "type": "movie",
        "title": "Heat",
        "year": 1995,
        "duration": 5_400_000,
        "viewOffset": 1_234_567,
        "thumb": "/library/metadata/42/thumb/1",
        "Media": [{
            "id": 7,
            "container": "mkv",
            "bitrate": 9000,
            "Part": [{
                "id": 9,
                "key": "/library/parts/9/file.mkv",
                "Stream": [
                    {"id": 101, "streamType": 1, "codec": "hevc"},
                    {"id": 102, "streamType": 2, "codec": "eac3", "default": true},
                    {"id": 103, "streamType": 3, "codec": "srt"}
                ]
            }]
        }]
    })
}

async fn mount_item(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/library/metadata/42"))
        .and(header("X-Plex-Token", "plex-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaContainer": {"size": 1, "Metadata": [movie_metadata()]}
        })))
        .mount(server)
        .await;
}

fn decision(part_decision: &str) -> serde_json::Value {
    json!({
        "MediaContainer": {
            "generalDecisionCode": 1000,
            "directPlayDecisionCode": if part_decision == "directplay" { 1000 } else { 3000 },
            "Metadata": [{
                "ratingKey": "42",
                "type": "movie",
                "Media": [{
                    "id": 7,
                    "container": "mkv",
                    "Part": [{
                        "id": 9,
                        "key": "/library/parts/9/file.mkv",
                        "decision": part_decision,
                        "Stream": [{"id": 102, "streamType": 2, "codec": "eac3", "default": true}]
                    }]
                }]
            }]
        }
    })
}

#[tokio::test]
async fn milliseconds_become_ticks() {
    let server = MockServer::start().await;
    mount_item(&server).await;

    let item = adapter(&server).get_item("42").await.unwrap().unwrap();
    assert_eq!(item.kind, ItemKind::Movie);
    assert_eq!(item.run_time_ticks, Some(54_000_000_000));
    assert_eq!(item.resume_position_ticks(), Some(12_345_670_000));
    let source = &item.media_sources[0];
    assert_eq!(source.bitrate, Some(9_000_000));
    assert_eq!(source.default_audio_index(), Some(102));
}

#[tokio::test]
async fn empty_favorites_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/library/all"))
        .and(query_param("userRating>>", "9"))
        .and(query_param("type", "1,2,4,18,3"))
        .and(query_param("X-Plex-Container-Start", "0"))
        .and(query_param("X-Plex-Container-Size", "40"))
        .and(header_exists("X-Plex-Client-Identifier"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaContainer": {"size": 0, "totalSize": 0}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let filters = Filters::kinds([
        ItemKind::Movie,
        ItemKind::Series,
        ItemKind::Episode,
        ItemKind::BoxSet,
        ItemKind::Season,
    ]);
    let page = adapter(&server)
        .favorites_paged(&PageRequest::new(0, 40).with_filters(filters))
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_count, Some(0));
}

#[tokio::test]
async fn sections_list_through_namespaced_ids() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/library/sections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaContainer": {"Directory": [
                {"key": "1", "type": "movie", "title": "Movies"},
                {"key": "2", "type": "show", "title": "TV"}
            ]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/library/sections/1/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaContainer": {"totalSize": 12, "Metadata": [movie_metadata()]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let libraries = adapter.libraries().await.unwrap();
    assert_eq!(libraries[0].id.as_deref(), Some("section/1"));
    assert_eq!(libraries[1].display_name(), "TV");

    let page = adapter
        .folder_items("section/1", &PageRequest::new(0, 1))
        .await
        .unwrap();
    assert_eq!(page.total_count, Some(12));
    assert_eq!(page.items[0].id.as_deref(), Some("42"));
}

#[tokio::test]
async fn search_is_windowed_locally() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hubs/search"))
        .and(query_param("query", "heat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaContainer": {"Hub": [
                {"hubIdentifier": "movie", "Metadata": [
                    {"ratingKey": "1", "type": "movie", "title": "A"},
                    {"ratingKey": "2", "type": "movie", "title": "B"}
                ]},
                {"hubIdentifier": "show", "Metadata": [
                    {"ratingKey": "3", "type": "show", "title": "C"}
                ]}
            ]}
        })))
        .mount(&server)
        .await;

    let page = adapter(&server)
        .search("heat", &PageRequest::new(1, 1))
        .await
        .unwrap();
    assert_eq!(page.total_count, Some(3));
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id.as_deref(), Some("2"));
}

#[tokio::test]
async fn direct_play_decision_points_at_the_part() {
    let server = MockServer::start().await;
    mount_item(&server).await;

    Mock::given(method("GET"))
        .and(path("/video/:/transcode/universal/decision"))
        .and(query_param("path", "/library/metadata/42"))
        .and(query_param("offset", "123"))
        .and(query_param("subtitles", "none"))
        .and(header_exists("X-Plex-Session-Identifier"))
        .respond_with(ResponseTemplate::new(200).set_body_json(decision("directplay")))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let item = adapter.get_item("42").await.unwrap().unwrap();
    let request = NegotiateRequest {
        start_ticks: 1_230_000_000,
        subtitle_stream_index: Some(-1),
        ..NegotiateRequest::new(item, None)
    };
    let stream = adapter.negotiate(&request).await.unwrap().unwrap();

    assert_eq!(stream.play_method, PlayMethod::DirectPlay);
    let url = url::Url::parse(&stream.url).unwrap();
    assert_eq!(url.path(), "/library/parts/9/file.mkv");
    assert!(url.query_pairs().any(|(k, v)| k == "X-Plex-Token" && v == "plex-token"));
    assert!(!url.query_pairs().any(|(k, _)| k == "offset"));
    let session = stream.play_session_id.unwrap();
    assert!(uuid::Uuid::parse_str(&session).is_ok());
    assert_eq!(stream.item_id, "42");
    assert_eq!(stream.start_position_ticks, 1_230_000_000);
}

#[tokio::test]
async fn transcode_session_reports_in_milliseconds_and_stops_transcoder() {
    let server = MockServer::start().await;
    mount_item(&server).await;

    Mock::given(method("GET"))
        .and(path("/video/:/transcode/universal/decision"))
        .respond_with(ResponseTemplate::new(200).set_body_json(decision("transcode")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/:/timeline"))
        .and(query_param("state", "playing"))
        .and(query_param("ratingKey", "42"))
        .and(query_param("time", "0"))
        .and(query_param("duration", "5400000"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/:/timeline"))
        .and(query_param("state", "paused"))
        .and(query_param("time", "1234567"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/:/timeline"))
        .and(query_param("state", "stopped"))
        .and(query_param("time", "1234567"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/:/transcode/universal/stop"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let item = adapter.get_item("42").await.unwrap().unwrap();
    let session = PlaybackSession::new(Arc::new(adapter));

    let stream = session
        .negotiate(&NegotiateRequest::new(item, None))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stream.play_method, PlayMethod::Transcode);
    let url = url::Url::parse(&stream.url).unwrap();
    assert_eq!(url.path(), "/video/:/transcode/universal/start.m3u8");
    let session_id = stream.play_session_id.clone().unwrap();
    assert!(url.query_pairs().any(|(k, v)| k == "session" && v == session_id));

    assert_eq!(session.start().await, ReportOutcome::Sent);
    assert_eq!(session.progress(12_345_670_000, true).await, ReportOutcome::Sent);
    assert_eq!(session.stop(None).await, ReportOutcome::Sent);

    let requests = server.received_requests().await.unwrap();
    let stop = requests
        .iter()
        .find(|r| r.url.path() == "/video/:/transcode/universal/stop")
        .unwrap();
    assert!(stop.url.query_pairs().any(|(k, v)| k == "session" && v == session_id));
}

#[tokio::test]
async fn transcoder_is_stopped_when_stop_timeline_fails() {
    let server = MockServer::start().await;
    mount_item(&server).await;

    Mock::given(method("GET"))
        .and(path("/video/:/transcode/universal/decision"))
        .respond_with(ResponseTemplate::new(200).set_body_json(decision("transcode")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/:/timeline"))
        .and(query_param("state", "stopped"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/:/transcode/universal/stop"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let item = adapter.get_item("42").await.unwrap().unwrap();
    let stream = adapter
        .negotiate(&NegotiateRequest::new(item, None))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stream.play_method, PlayMethod::Transcode);
    let session_id = stream.play_session_id.clone().unwrap();

    let report = PlaybackReport::for_stream(&stream, &session_id, Some(54_000_000_000));
    assert!(adapter.report_stop(&report).await.is_err());

    let requests = server.received_requests().await.unwrap();
    let stop = requests
        .iter()
        .find(|r| r.url.path() == "/video/:/transcode/universal/stop")
        .unwrap();
    assert!(stop.url.query_pairs().any(|(k, v)| k == "session" && v == session_id));
}

#[tokio::test]
async fn direct_play_stop_sends_only_the_timeline() {
    let server = MockServer::start().await;
    mount_item(&server).await;

    Mock::given(method("GET"))
        .and(path("/video/:/transcode/universal/decision"))
        .respond_with(ResponseTemplate::new(200).set_body_json(decision("directplay")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/:/timeline"))
        .and(query_param("state", "stopped"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video/:/transcode/universal/stop"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    let item = adapter.get_item("42").await.unwrap().unwrap();
    let stream = adapter
        .negotiate(&NegotiateRequest::new(item, None))
        .await
        .unwrap()
        .unwrap();
    let report = PlaybackReport::for_stream(&stream, "s1", None);
    adapter.report_stop(&report).await.unwrap();
}

#[tokio::test]
async fn favorite_maps_to_rating() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/:/rate"))
        .and(query_param("key", "42"))
        .and(query_param("rating", "10"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/:/rate"))
        .and(query_param("key", "42"))
        .and(query_param("rating", "-1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/:/scrobble"))
        .and(query_param("key", "42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    adapter.set_favorite("42", true).await.unwrap();
    assert!(adapter.set_favorite("42", false).await.is_err());
    adapter.set_played("42", true).await.unwrap();
}

#[tokio::test]
async fn probe_identifies_without_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/identity"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaContainer": {"machineIdentifier": "abc123", "version": "1.40.0"}
        })))
        .mount(&server)
        .await;

    let info = MediaAdapter::probe(&HttpClient::new().unwrap(), ProtocolKind::Plex, &server.uri())
        .await
        .unwrap();
    assert_eq!(info.id.as_deref(), Some("abc123"));
    assert_eq!(info.version.as_deref(), Some("1.40.0"));
    assert_eq!(info.protocol, ProtocolKind::Plex);

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("X-Plex-Token").is_none());
}
