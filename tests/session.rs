use async_trait::async_trait;
use mediaplex::models::{ItemKind, MediaItem, NegotiateRequest, PlayMethod, PlaybackReport, StreamInfo};
use mediaplex::{MediaError, Playback, PlaybackSession, ReportOutcome, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Start(String),
    Progress(String, i64),
    Stop(String, i64),
}

/// Allocates a session per media source and records every report.
#[derive(Default)]
struct FakeServer {
    events: Mutex<Vec<Event>>,
    fail_reports: bool,
}

impl FakeServer {
    fn failing() -> Self {
        Self {
            fail_reports: true,
            ..Self::default()
        }
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Event) -> Result<()> {
        self.events.lock().unwrap().push(event);
        if self.fail_reports {
            return Err(MediaError::Network("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Playback for FakeServer {
    async fn negotiate(&self, request: &NegotiateRequest) -> Result<Option<StreamInfo>> {
        let Some(item_id) = request.item.navigation_id() else {
            return Ok(None);
        };
        let source = request.media_source_id.clone().unwrap_or_else(|| "default".to_string());
        Ok(Some(StreamInfo {
            url: format!("http://fake/{}/{}", item_id, source),
            play_session_id: Some(format!("session-{}", source)),
            media_source: None,
            play_method: PlayMethod::DirectPlay,
            item_id: item_id.to_string(),
            start_position_ticks: request.start_ticks,
            audio_stream_index: request.audio_stream_index,
            subtitle_stream_index: request.subtitle_stream_index,
        }))
    }

    async fn report_start(&self, report: &PlaybackReport) -> Result<()> {
        self.push(Event::Start(report.play_session_id.clone()))
    }

    async fn report_progress(&self, report: &PlaybackReport) -> Result<()> {
        self.push(Event::Progress(report.play_session_id.clone(), report.position_ticks))
    }

    async fn report_stop(&self, report: &PlaybackReport) -> Result<()> {
        self.push(Event::Stop(report.play_session_id.clone(), report.position_ticks))
    }
}

fn request(source: Option<&str>) -> NegotiateRequest {
    let item = MediaItem {
        id: Some("movie-1".to_string()),
        kind: ItemKind::Movie,
        run_time_ticks: Some(100_000_000),
        ..MediaItem::default()
    };
    NegotiateRequest {
        media_source_id: source.map(str::to_string),
        ..NegotiateRequest::new(item, Some("user".to_string()))
    }
}

fn count_per_session(events: &[Event]) -> HashMap<String, (usize, usize)> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for event in events {
        match event {
            Event::Start(id) => counts.entry(id.clone()).or_default().0 += 1,
            Event::Stop(id, _) => counts.entry(id.clone()).or_default().1 += 1,
            Event::Progress(..) => {}
        }
    }
    counts
}

#[tokio::test]
async fn switching_source_stops_the_old_session_first() {
    let server = Arc::new(FakeServer::default());
    let session = PlaybackSession::new(server.clone());

    session.negotiate(&request(Some("a"))).await.unwrap();
    session.start().await;
    session.progress(30_000_000, false).await;

    session.negotiate(&request(Some("b"))).await.unwrap();
    assert_eq!(session.current_session_id().await.as_deref(), Some("session-b"));
    session.start().await;
    session.stop(Some(40_000_000)).await;

    assert_eq!(
        server.events(),
        vec![
            Event::Start("session-a".to_string()),
            Event::Progress("session-a".to_string(), 30_000_000),
            Event::Stop("session-a".to_string(), 30_000_000),
            Event::Start("session-b".to_string()),
            Event::Stop("session-b".to_string(), 40_000_000),
        ]
    );
}

#[tokio::test]
async fn one_start_and_one_stop_per_session() {
    let server = Arc::new(FakeServer::default());
    let session = PlaybackSession::new(server.clone());

    for source in ["a", "a", "b", "b", "c"] {
        session.negotiate(&request(Some(source))).await.unwrap();
        session.start().await;
        session.start().await;
        session.progress(1, false).await;
    }
    session.stop(None).await;
    session.stop(None).await;

    let counts = count_per_session(&server.events());
    assert_eq!(counts.len(), 3);
    for (id, (starts, stops)) in counts {
        assert_eq!((starts, stops), (1, 1), "session {}", id);
    }
}

#[tokio::test]
async fn progress_for_superseded_session_is_dropped() {
    let server = Arc::new(FakeServer::default());
    let session = PlaybackSession::new(server.clone());

    session.negotiate(&request(Some("a"))).await.unwrap();
    session.start().await;
    session.negotiate(&request(Some("b"))).await.unwrap();
    session.start().await;

    assert_eq!(
        session.progress_for("session-a", 99, false).await,
        ReportOutcome::Stale
    );
    assert_eq!(
        session.progress_for("session-b", 55, false).await,
        ReportOutcome::Sent
    );

    let stale: Vec<Event> = server
        .events()
        .into_iter()
        .filter(|e| matches!(e, Event::Progress(id, _) if id == "session-a"))
        .collect();
    assert!(stale.is_empty());
    assert_eq!(session.last_position().await, Some(55));
}

#[tokio::test]
async fn unstarted_session_is_discarded_silently() {
    let server = Arc::new(FakeServer::default());
    let session = PlaybackSession::new(server.clone());

    session.negotiate(&request(Some("a"))).await.unwrap();
    assert_eq!(session.progress(10, false).await, ReportOutcome::Skipped);
    session.negotiate(&request(Some("b"))).await.unwrap();
    assert_eq!(session.stop(Some(10)).await, ReportOutcome::Skipped);

    assert!(server.events().is_empty());
}

#[tokio::test]
async fn report_failures_do_not_break_the_lifecycle() {
    let server = Arc::new(FakeServer::failing());
    let session = PlaybackSession::new(server.clone());

    session.negotiate(&request(None)).await.unwrap();
    assert_eq!(session.start().await, ReportOutcome::Sent);
    assert_eq!(session.progress(5, false).await, ReportOutcome::Sent);
    assert_eq!(session.stop(None).await, ReportOutcome::Sent);
    assert_eq!(session.stop(None).await, ReportOutcome::Skipped);

    assert_eq!(server.events().len(), 3);
}

#[tokio::test]
async fn not_ready_negotiation_keeps_current_session() {
    let server = Arc::new(FakeServer::default());
    let session = PlaybackSession::new(server.clone());

    session.negotiate(&request(Some("a"))).await.unwrap();
    let blank = NegotiateRequest::new(MediaItem::default(), None);
    assert!(session.negotiate(&blank).await.unwrap().is_none());
    assert_eq!(session.current_session_id().await.as_deref(), Some("session-a"));
    assert!(session.current_stream().await.is_some());
}

#[tokio::test]
async fn concurrent_progress_never_targets_a_stopped_session() {
    let server = Arc::new(FakeServer::default());
    let session = Arc::new(PlaybackSession::new(server.clone()));

    session.negotiate(&request(Some("a"))).await.unwrap();
    session.start().await;

    let ticker = {
        let session = session.clone();
        tokio::spawn(async move {
            for position in 0..50 {
                session.progress_for("session-a", position, false).await;
                tokio::task::yield_now().await;
            }
        })
    };
    session.negotiate(&request(Some("b"))).await.unwrap();
    ticker.await.unwrap();

    let events = server.events();
    let stop_at = events
        .iter()
        .position(|e| matches!(e, Event::Stop(id, _) if id == "session-a"))
        .unwrap();
    assert!(events[stop_at + 1..]
        .iter()
        .all(|e| !matches!(e, Event::Progress(id, _) if id == "session-a")));
}
