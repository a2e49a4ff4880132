//! Playback session lifecycle: one negotiated stream, one start report, any
//! number of progress reports, one stop report.
//!
//! Report failures are logged and swallowed. A missed tick has no visible
//! consequence and replaying stale positions is worse than skipping them.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::adapter::Playback;
use crate::error::Result;
use crate::models::{NegotiateRequest, PlaybackReport, StreamInfo};

/// What happened to a report request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Handed to the server (its answer may still have been an error).
    Sent,
    /// Nothing to do: no session, already started, or already stopped.
    Skipped,
    /// Issued for a session that is no longer the active one.
    Stale,
}

struct ActiveSession {
    stream: StreamInfo,
    session_id: Option<String>,
    duration_ticks: Option<i64>,
    started: bool,
    stopped: bool,
    last_position: i64,
}

impl ActiveSession {
    fn report(&self, session_id: &str, position_ticks: i64, is_paused: bool) -> PlaybackReport {
        PlaybackReport::for_stream(&self.stream, session_id, self.duration_ticks)
            .at(position_ticks, is_paused)
    }

    fn is_live(&self) -> bool {
        self.started && !self.stopped
    }
}

/// Owns the current session id for one player. Calls are serialized, so a
/// renegotiation is atomic with respect to reports.
pub struct PlaybackSession<P: Playback + ?Sized> {
    backend: Arc<P>,
    state: Mutex<Option<ActiveSession>>,
}

impl<P: Playback + ?Sized> PlaybackSession<P> {
    pub fn new(backend: Arc<P>) -> Self {
        Self {
            backend,
            state: Mutex::new(None),
        }
    }

    /// Negotiates a stream and makes it the active session.
    ///
    /// A started session that is being replaced by a different session id
    /// gets its stop report first. Renegotiating into the same id keeps the
    /// start flag, so a second `start` is still a no-op.
    #[instrument(skip(self, request), fields(item = ?request.item.id))]
    pub async fn negotiate(&self, request: &NegotiateRequest) -> Result<Option<StreamInfo>> {
        let mut state = self.state.lock().await;

        let Some(stream) = self.backend.negotiate(request).await? else {
            debug!("Negotiation not ready");
            return Ok(None);
        };

        let new_id = stream.play_session_id.clone().filter(|id| !id.is_empty());
        let duration_ticks = request
            .item
            .run_time_ticks
            .or_else(|| stream.media_source.as_ref().and_then(|s| s.run_time_ticks));

        let (started, stopped, last_position) = match state.take() {
            Some(previous) if previous.session_id.is_some() && previous.session_id == new_id => {
                debug!("Renegotiated into the same session");
                (previous.started, previous.stopped, previous.last_position)
            }
            Some(previous) => {
                self.finish(&previous, previous.last_position).await;
                (false, false, stream.start_position_ticks)
            }
            None => (false, false, stream.start_position_ticks),
        };

        info!(
            "Active session {:?} ({})",
            new_id,
            stream.play_method.as_str()
        );
        *state = Some(ActiveSession {
            stream: stream.clone(),
            session_id: new_id,
            duration_ticks,
            started,
            stopped,
            last_position,
        });
        Ok(Some(stream))
    }

    /// Fires the start report once per session id.
    #[instrument(skip(self))]
    pub async fn start(&self) -> ReportOutcome {
        let mut state = self.state.lock().await;
        let Some(active) = state.as_mut() else {
            return ReportOutcome::Skipped;
        };
        let Some(session_id) = active.session_id.clone() else {
            return ReportOutcome::Skipped;
        };
        if active.started || active.stopped {
            return ReportOutcome::Skipped;
        }

        // Marked before sending: the server may have seen it even if we get an error.
        active.started = true;
        let report = active.report(&session_id, active.last_position, false);
        if let Err(e) = self.backend.report_start(&report).await {
            warn!("Start report for session {} failed: {}", session_id, e);
        }
        ReportOutcome::Sent
    }

    /// Progress against whatever session is active now.
    pub async fn progress(&self, position_ticks: i64, is_paused: bool) -> ReportOutcome {
        let mut state = self.state.lock().await;
        self.send_progress(&mut state, None, position_ticks, is_paused)
            .await
    }

    /// Progress tagged with the session it was issued for. Dropped when the
    /// active session has moved on.
    pub async fn progress_for(
        &self,
        session_id: &str,
        position_ticks: i64,
        is_paused: bool,
    ) -> ReportOutcome {
        let mut state = self.state.lock().await;
        self.send_progress(&mut state, Some(session_id), position_ticks, is_paused)
            .await
    }

    async fn send_progress(
        &self,
        state: &mut Option<ActiveSession>,
        issued_for: Option<&str>,
        position_ticks: i64,
        is_paused: bool,
    ) -> ReportOutcome {
        let Some(active) = state.as_mut() else {
            return match issued_for {
                Some(_) => ReportOutcome::Stale,
                None => ReportOutcome::Skipped,
            };
        };
        let Some(session_id) = active.session_id.clone() else {
            return ReportOutcome::Skipped;
        };
        if issued_for.is_some_and(|id| id != session_id) {
            debug!("Dropping progress for superseded session {:?}", issued_for);
            return ReportOutcome::Stale;
        }
        if !active.is_live() {
            return ReportOutcome::Skipped;
        }

        active.last_position = position_ticks;
        let report = active.report(&session_id, position_ticks, is_paused);
        if let Err(e) = self.backend.report_progress(&report).await {
            warn!("Progress report for session {} failed: {}", session_id, e);
        }
        ReportOutcome::Sent
    }

    /// Tears the session down. The stop report goes out at most once, and
    /// only for a session that was started.
    #[instrument(skip(self))]
    pub async fn stop(&self, position_ticks: Option<i64>) -> ReportOutcome {
        let mut state = self.state.lock().await;
        let Some(active) = state.as_mut() else {
            return ReportOutcome::Skipped;
        };
        if !active.is_live() {
            active.stopped = true;
            return ReportOutcome::Skipped;
        }

        let position = position_ticks.unwrap_or(active.last_position);
        active.last_position = position;
        let outcome = self.finish(active, position).await;
        active.stopped = true;
        outcome
    }

    async fn finish(&self, active: &ActiveSession, position_ticks: i64) -> ReportOutcome {
        if !active.is_live() {
            return ReportOutcome::Skipped;
        }
        let Some(session_id) = active.session_id.as_deref() else {
            return ReportOutcome::Skipped;
        };

        let report = active.report(session_id, position_ticks, false);
        if let Err(e) = self.backend.report_stop(&report).await {
            warn!("Stop report for session {} failed: {}", session_id, e);
        }
        info!("Stopped session {} at {} ticks", session_id, position_ticks);
        ReportOutcome::Sent
    }

    pub async fn current_session_id(&self) -> Option<String> {
        self.state
            .lock()
            .await
            .as_ref()
            .and_then(|a| a.session_id.clone())
    }

    pub async fn current_stream(&self) -> Option<StreamInfo> {
        self.state.lock().await.as_ref().map(|a| a.stream.clone())
    }

    pub async fn last_position(&self) -> Option<i64> {
        self.state.lock().await.as_ref().map(|a| a.last_position)
    }
}
