// Recorder
//
// What the presentation layer drives: one recording session, a preview
// player for the take that was just recorded, and the waveform scroll.
// `reset` is the one place that tears down both capture and preview.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::audio::AudioBackend;
use crate::events::{EventSink, RecorderEvent};
use crate::playback::PlaybackController;
use crate::session::{Metering, RawSegment, RecorderConfig, RecordingSession};
use crate::store::Recording;
use crate::waveform::{WaveformController, WaveformTick};

/// Meterings drawn while recording; older ones have scrolled off screen
pub const VISIBLE_LINES_WHILE_RECORDING: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingAction {
    /// Play the preview from the start once the scroll reset settles
    PlayFromStart,
    /// Clear the timeline once the scroll reset settles
    ClearTimeline,
}

pub struct Recorder {
    session: RecordingSession,
    preview: PlaybackController,
    waveform: WaveformController,
    events: EventSink,
    position_ms: u64,
    pending: Option<PendingAction>,
    /// Segments of a take that `tick` stopped at the duration cap
    finished: Option<Vec<RawSegment>>,
}

impl Recorder {
    pub fn new(backend: Arc<dyn AudioBackend>, config: RecorderConfig, events: EventSink) -> Self {
        let waveform = WaveformController::new(&config);
        let preview = PlaybackController::new(
            Arc::clone(&backend),
            config.progress_interval(),
            events.clone(),
        );
        let session = RecordingSession::new(backend, config, events.clone());

        Self {
            session,
            preview,
            waveform,
            events,
            position_ms: 0,
            pending: None,
            finished: None,
        }
    }

    /// Start a new recording, dropping any previous preview
    pub async fn start_recording(&mut self, now_ms: u64) -> Result<()> {
        self.pending = None;
        self.preview.unload().await;

        self.session.start().await?;
        if self.session.is_recording() {
            self.waveform.begin_recording(now_ms);
            self.position_ms = 0;
        }

        Ok(())
    }

    pub async fn pause_recording(&mut self) {
        self.session.pause_recording().await;
        if self.session.is_paused() {
            self.waveform.end_recording(self.session.duration_ms());
        }
    }

    pub async fn resume_recording(&mut self) {
        self.session.resume_recording().await;
        if self.session.is_recording() {
            self.waveform.resume_recording();
        }
    }

    /// Finish the recording and load it for preview
    pub async fn stop_recording(&mut self) -> Vec<RawSegment> {
        let duration_ms = self.session.duration_ms();
        let segments = self.session.stop().await;

        self.waveform.end_recording(duration_ms);

        if let Some(recording) = Recording::from_segments(&segments) {
            self.preview.load(&recording).await;
            if self.preview.is_loaded() {
                self.set_position(duration_ms);
            }
        }

        segments
    }

    /// Tear down capture and preview and clear the timeline
    ///
    /// Capture and preview go at once. A scrolled timeline springs back to
    /// the start first and is cleared when the spring settles.
    pub async fn reset(&mut self, now_ms: u64) {
        self.pending = None;
        self.session.reset().await;
        self.preview.unload().await;
        self.waveform.end_playback();
        self.set_position(0);

        if self.waveform.offset() == 0.0 {
            self.waveform.reset();
        } else {
            self.pending = Some(PendingAction::ClearTimeline);
            self.waveform.reset_scroll(now_ms);
        }
    }

    /// Play the preview from the current position
    ///
    /// From the end of the take, scroll back first and play from the start.
    pub async fn start_playback(&mut self, now_ms: u64) {
        if self.session.is_recording() || self.preview.is_playing() || !self.preview.is_loaded() {
            debug!("Playback start ignored");
            return;
        }

        let duration_ms = self.preview.duration_ms();
        let play_from = if self.position_ms / 100 < duration_ms / 100 {
            self.position_ms
        } else {
            0
        };

        if play_from == 0 {
            self.pending = Some(PendingAction::PlayFromStart);
            self.waveform.reset_scroll(now_ms);
        } else {
            self.play_preview_at(play_from, now_ms).await;
        }
    }

    pub async fn stop_playback(&mut self) {
        if !self.preview.is_playing() {
            return;
        }
        self.preview.pause().await;
        self.waveform.end_playback();
    }

    /// Scrub the timeline while nothing is recording or playing
    pub fn drag_by(&mut self, dx: f32) {
        if self.session.is_recording() || self.preview.is_playing() {
            return;
        }
        self.waveform.drag_by(dx);
    }

    /// Advance everything to `now_ms`
    ///
    /// Call at least once per progress interval.
    pub async fn tick(&mut self, now_ms: u64) -> WaveformTick {
        if self.session.drain_status() > 0 {
            self.position_ms = self.session.position_ms();
            self.waveform
                .on_recording_duration(self.session.duration_ms(), now_ms);
        }

        if self.session.reached_max_duration() {
            info!("Reached the {}ms recording cap", self.session.config().max_duration_ms);
            let segments = self.stop_recording().await;
            self.finished = Some(segments);
        }

        if self.preview.is_loaded() {
            let was_playing = self.preview.is_playing();
            self.preview.drain_status().await;

            if self.preview.is_playing() {
                let position_ms = self.preview.position_ms();
                self.waveform.on_playback_position(position_ms, now_ms);
                if position_ms != self.position_ms {
                    self.set_position(position_ms);
                }
            } else if was_playing {
                // Finished: park the playhead at the end of the take
                let end_ms = self.preview.duration_ms();
                self.waveform.on_playback_position(end_ms, now_ms);
                self.waveform.end_playback();
                self.set_position(end_ms);
            }
        }

        let tick = self.waveform.tick(now_ms);
        if let Some(position_ms) = tick.position_change {
            self.set_position(position_ms);
        }

        if tick.reset_finished {
            match self.pending.take() {
                Some(PendingAction::PlayFromStart) => self.play_preview_at(0, now_ms).await,
                Some(PendingAction::ClearTimeline) => self.waveform.reset(),
                None => {}
            }
        }

        tick
    }

    /// Segments of a take the duration cap stopped, if not yet taken
    ///
    /// `stop_recording` hands its segments back directly; this covers the
    /// stop `tick` makes on its own.
    pub fn take_finished(&mut self) -> Option<Vec<RawSegment>> {
        self.finished.take()
    }

    /// Meterings to draw right now
    pub fn visible_meterings(&self) -> &[Metering] {
        let meterings = self.session.meterings();
        if self.session.is_recording() {
            let start = meterings.len().saturating_sub(VISIBLE_LINES_WHILE_RECORDING);
            &meterings[start..]
        } else {
            meterings
        }
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_recording()
    }

    pub fn is_paused(&self) -> bool {
        self.session.is_paused()
    }

    pub fn is_playing(&self) -> bool {
        self.preview.is_playing()
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn preview(&self) -> &PlaybackController {
        &self.preview
    }

    pub fn waveform(&self) -> &WaveformController {
        &self.waveform
    }

    async fn play_preview_at(&mut self, position_ms: u64, now_ms: u64) {
        self.preview.seek(position_ms).await;
        self.preview.play().await;
        if self.preview.is_playing() {
            self.waveform.on_playback_position(position_ms, now_ms);
            self.set_position(position_ms);
        }
    }

    fn set_position(&mut self, position_ms: u64) {
        self.position_ms = position_ms;
        self.events.emit(RecorderEvent::PositionChange { position_ms });
    }
}
