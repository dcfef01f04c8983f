use super::config::RecorderConfig;
use super::segment::{Metering, RawSegment, SessionState};
use crate::audio::{AudioBackend, Capture, CaptureOptions, CaptureStatus, METERING_MIN_POWER};
use crate::events::{EventSink, RecorderEvent};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// A recording session that drives one capture at a time and collects segments
///
/// Lifecycle calls take `&mut self`, so two of them can never overlap on the
/// same session.
pub struct RecordingSession {
    /// Backend that opens captures
    backend: Arc<dyn AudioBackend>,

    /// Interval, cap and geometry settings
    config: RecorderConfig,

    /// Presentation-layer notifications
    events: EventSink,

    state: SessionState,

    /// The single active capture, if any
    capture: Option<Box<dyn Capture>>,

    /// Status stream of the active capture
    status_rx: Option<mpsc::Receiver<CaptureStatus>>,

    /// Added to every duration the active capture reports
    offset_ms: u64,

    /// Amplitude samples for the whole session so far
    meterings: Vec<Metering>,

    position_ms: u64,
    duration_ms: u64,

    /// Closed segments, in creation order
    segments: Vec<RawSegment>,
}

impl RecordingSession {
    pub fn new(backend: Arc<dyn AudioBackend>, config: RecorderConfig, events: EventSink) -> Self {
        Self {
            backend,
            config,
            events,
            state: SessionState::Idle,
            capture: None,
            status_rx: None,
            offset_ms: 0,
            meterings: Vec::new(),
            position_ms: 0,
            duration_ms: 0,
            segments: Vec::new(),
        }
    }

    /// Start a new recording
    ///
    /// Only a denied microphone permission is returned as an error. A capture
    /// that fails to open or start is logged and leaves the session idle.
    pub async fn start(&mut self) -> Result<()> {
        if self.state == SessionState::Recording {
            warn!("Recording already started");
            return Ok(());
        }

        let granted = self
            .backend
            .has_record_permission()
            .await
            .context("Failed to query microphone permission")?;
        if !granted {
            bail!("Microphone permission not granted");
        }

        if let Some(mut capture) = self.capture.take() {
            debug!("Discarding previous capture: {}", capture.uri());
            if let Err(e) = capture.stop().await {
                warn!("Failed to stop previous capture: {:#}", e);
            }
        }
        self.status_rx = None;

        if !self.segments.is_empty() {
            warn!(
                "Starting over with {} unfinished segment(s); discarding them",
                self.segments.len()
            );
            self.segments.clear();
        }

        self.meterings.clear();
        self.duration_ms = 0;
        self.update_position(0);

        info!("Starting recording (backend: {})", self.backend.name());

        match self.open_capture(0).await {
            Ok(uri) => {
                self.state = SessionState::Recording;
                info!("Recording started: {}", uri);
                self.events.emit(RecorderEvent::RecordStart { uri });
            }
            Err(e) => {
                error!("Failed to start recording: {:#}", e);
                self.state = SessionState::Idle;
            }
        }

        Ok(())
    }

    /// Close the active capture as a segment and wait for `resume_recording`
    pub async fn pause_recording(&mut self) {
        if self.state != SessionState::Recording {
            debug!("Pause ignored in state {:?}", self.state);
            return;
        }

        if let Some(uri) = self.close_capture().await {
            self.push_segment(uri);
        }

        self.state = SessionState::Paused;
        info!(
            "Recording paused at {}ms ({} segment(s))",
            self.duration_ms,
            self.segments.len()
        );
        self.events.emit(RecorderEvent::RecordPaused);
    }

    /// Open a new capture that continues the paused timeline
    pub async fn resume_recording(&mut self) {
        if self.state != SessionState::Paused {
            debug!("Resume ignored in state {:?}", self.state);
            return;
        }

        let offset_ms = self.segments.last().map(|s| s.duration).unwrap_or(0);

        match self.open_capture(offset_ms).await {
            Ok(uri) => {
                self.state = SessionState::Recording;
                info!("Recording resumed at {}ms: {}", offset_ms, uri);
                self.events.emit(RecorderEvent::RecordResumed);
            }
            Err(e) => {
                error!("Failed to resume recording: {:#}", e);
            }
        }
    }

    /// Finish the recording and hand back every segment
    ///
    /// The session is idle afterwards.
    pub async fn stop(&mut self) -> Vec<RawSegment> {
        if self.state == SessionState::Idle && self.capture.is_none() && self.segments.is_empty() {
            debug!("Stop ignored: nothing recorded");
            return Vec::new();
        }

        if let Some(uri) = self.close_capture().await {
            self.push_segment(uri);
        }

        let segments = std::mem::take(&mut self.segments);

        info!(
            "Recording stopped: {}ms in {} segment(s)",
            self.duration_ms,
            segments.len()
        );
        self.events.emit(RecorderEvent::RecordStop {
            segments: segments.clone(),
        });

        self.state = SessionState::Idle;
        self.offset_ms = 0;
        self.meterings.clear();
        self.duration_ms = 0;
        self.update_position(0);

        segments
    }

    /// Discard the active capture and everything recorded so far
    pub async fn reset(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.stop().await {
                warn!("Failed to stop capture during reset: {:#}", e);
            }
        }

        self.status_rx = None;
        self.state = SessionState::Idle;
        self.offset_ms = 0;
        self.segments.clear();
        self.meterings.clear();
        self.duration_ms = 0;
        self.update_position(0);

        info!("Recording reset");
        self.events.emit(RecorderEvent::RecordReset);
    }

    /// Apply one capture status update
    ///
    /// Returns true if the update appended a metering.
    pub fn handle_status(&mut self, status: CaptureStatus) -> bool {
        if self.state != SessionState::Recording {
            return false;
        }
        if !status.is_recording || status.duration_ms == 0 {
            return false;
        }

        let duration = status.duration_ms + self.offset_ms;
        self.duration_ms = self.duration_ms.max(duration);

        if duration > self.config.max_duration_ms {
            debug!(
                "Ignoring update at {}ms past the {}ms cap",
                duration, self.config.max_duration_ms
            );
            return false;
        }

        if let Some(last) = self.meterings.last() {
            if duration <= last.position {
                return false;
            }
        }

        let key = duration + self.meterings.len() as u64;
        self.meterings.push(Metering {
            position: duration,
            key,
            db: status.metering_db.unwrap_or(METERING_MIN_POWER),
        });
        self.update_position(duration);

        true
    }

    /// Apply every status update the active capture has queued
    ///
    /// Returns the number of meterings appended.
    pub fn drain_status(&mut self) -> usize {
        let mut pending = Vec::new();
        if let Some(rx) = self.status_rx.as_mut() {
            while let Ok(status) = rx.try_recv() {
                pending.push(status);
            }
        }

        pending
            .into_iter()
            .filter(|status| self.handle_status(*status))
            .count()
    }

    /// The caller must `stop()` once this becomes true
    pub fn reached_max_duration(&self) -> bool {
        self.state == SessionState::Recording && self.duration_ms >= self.config.max_duration_ms
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    pub fn is_paused(&self) -> bool {
        self.state == SessionState::Paused
    }

    pub fn meterings(&self) -> &[Metering] {
        &self.meterings
    }

    pub fn segments(&self) -> &[RawSegment] {
        &self.segments
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Handle of the active capture
    pub fn capture_uri(&self) -> Option<&str> {
        self.capture.as_ref().map(|c| c.uri())
    }

    async fn open_capture(&mut self, offset_ms: u64) -> Result<String> {
        let options = CaptureOptions {
            metering_interval: self.config.progress_interval(),
            allow_in_silent_mode: true,
        };

        let mut capture = self
            .backend
            .open_capture(&options)
            .await
            .context("Failed to open capture")?;
        capture.set_metering_interval(self.config.progress_interval());

        let status_rx = capture
            .start()
            .await
            .context("Failed to start capture")?;

        let uri = capture.uri().to_string();
        self.capture = Some(capture);
        self.status_rx = Some(status_rx);
        self.offset_ms = offset_ms;

        Ok(uri)
    }

    /// Stop the active capture and return its handle
    async fn close_capture(&mut self) -> Option<String> {
        // Updates queued before the stop still belong to this segment
        self.drain_status();

        let mut capture = self.capture.take()?;
        self.status_rx = None;

        match capture.stop().await {
            Ok(uri) => Some(uri),
            Err(e) => {
                error!("Failed to stop capture {}: {:#}", capture.uri(), e);
                Some(capture.uri().to_string())
            }
        }
    }

    fn push_segment(&mut self, uri: String) {
        debug!(
            "Segment {} closed: {} ({}ms, {} meterings)",
            self.segments.len(),
            uri,
            self.duration_ms,
            self.meterings.len()
        );
        self.segments.push(RawSegment {
            uri,
            meterings: self.meterings.clone(),
            duration: self.duration_ms,
        });
    }

    fn update_position(&mut self, position_ms: u64) {
        self.position_ms = position_ms;
        self.events.emit(RecorderEvent::PositionChange { position_ms });
    }
}
