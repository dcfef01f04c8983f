// Playback of finalized recordings
//
// A recording made across pauses is a sequence of handles. The controller
// loads all of them up front and plays them back to back as one timeline.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioBackend, LoadedPlayable, PlayableStatus};
use crate::events::{EventSink, PlaybackStatus, RecorderEvent};
use crate::store::Recording;

/// Plays one recording, segment after segment
pub struct PlaybackController {
    backend: Arc<dyn AudioBackend>,
    events: EventSink,
    progress_interval: Duration,
    resources: Vec<LoadedPlayable>,
    /// Length of each loaded segment, for cumulative positions
    segment_lengths: Vec<u64>,
    duration_ms: u64,
    /// Segment currently playing or paused
    index: usize,
    /// Last known status of the current segment
    status: Option<PlayableStatus>,
    is_playing: bool,
}

impl PlaybackController {
    pub fn new(backend: Arc<dyn AudioBackend>, progress_interval: Duration, events: EventSink) -> Self {
        Self {
            backend,
            events,
            progress_interval,
            resources: Vec::new(),
            segment_lengths: Vec::new(),
            duration_ms: 0,
            index: 0,
            status: None,
            is_playing: false,
        }
    }

    /// Release whatever is loaded and load every handle of `recording`
    ///
    /// On failure the error is logged and nothing stays loaded.
    pub async fn load(&mut self, recording: &Recording) {
        self.unload().await;

        for uri in recording.uri.handles() {
            match self.backend.open_playable(uri, self.progress_interval).await {
                Ok(loaded) => self.resources.push(loaded),
                Err(e) => {
                    error!("Failed to load {} for playback: {:#}", uri, e);
                    self.unload().await;
                    return;
                }
            }
        }

        self.segment_lengths = match &recording.durations {
            Some(durations) if durations.len() == self.resources.len() => durations.clone(),
            _ if self.resources.len() == 1 => vec![recording.duration],
            _ => {
                let mut lengths = Vec::with_capacity(self.resources.len());
                for loaded in &self.resources {
                    let length = match loaded.resource.status().await {
                        Ok(status) => status.duration_ms,
                        Err(e) => {
                            warn!("Failed to read length of {}: {:#}", loaded.resource.uri(), e);
                            0
                        }
                    };
                    lengths.push(length);
                }
                lengths
            }
        };
        self.duration_ms = recording.duration;

        info!(
            "Loaded {} for playback ({}ms, {} segment(s))",
            recording.uri.key(),
            self.duration_ms,
            self.resources.len()
        );
    }

    /// Play or resume the current segment
    pub async fn play(&mut self) {
        if self.is_playing {
            return;
        }
        let Some(loaded) = self.resources.get_mut(self.index) else {
            debug!("Play ignored: nothing loaded");
            return;
        };

        match loaded.resource.play().await {
            Ok(status) => {
                self.status = Some(status);
                self.is_playing = true;
                self.events.emit(RecorderEvent::PlaybackStart {
                    status: Some(self.playback_status()),
                });
            }
            Err(e) => error!("Failed to start playback: {:#}", e),
        }
    }

    /// Pause the current segment only
    pub async fn pause(&mut self) {
        if !self.is_playing {
            return;
        }
        let Some(loaded) = self.resources.get_mut(self.index) else {
            return;
        };

        match loaded.resource.pause().await {
            Ok(status) => self.status = Some(status),
            Err(e) => error!("Failed to pause playback: {:#}", e),
        }
        self.is_playing = false;
        self.events.emit(RecorderEvent::PlaybackStop {
            status: Some(self.playback_status()),
        });
    }

    pub async fn toggle(&mut self) {
        if self.is_playing {
            self.pause().await;
        } else {
            self.play().await;
        }
    }

    /// Stop and rewind every segment
    pub async fn stop(&mut self) {
        let was_playing = self.is_playing;
        self.rewind_all().await;
        self.status = None;

        if was_playing {
            self.events.emit(RecorderEvent::PlaybackStop { status: None });
        }
    }

    /// Move to a position on the recording's timeline
    pub async fn seek(&mut self, position_ms: u64) {
        if self.resources.is_empty() {
            return;
        }

        let (index, local_ms) = self.locate(position_ms);
        let switching = index != self.index;

        if switching {
            if let Err(e) = self.resources[self.index].resource.stop().await {
                warn!("Failed to stop segment {}: {:#}", self.index, e);
            }
            self.index = index;
        }

        match self.resources[index].resource.seek(local_ms).await {
            Ok(status) => self.status = Some(status),
            Err(e) => error!("Failed to seek to {}ms: {:#}", position_ms, e),
        }

        if switching && self.is_playing {
            match self.resources[index].resource.play().await {
                Ok(status) => self.status = Some(status),
                Err(e) => error!("Failed to continue playback: {:#}", e),
            }
        }
    }

    /// Apply one status update from segment `index`
    pub async fn handle_status(&mut self, index: usize, status: PlayableStatus) {
        if index != self.index || index >= self.resources.len() {
            debug!("Ignoring stale status from segment {}", index);
            return;
        }

        self.status = Some(status);
        if !status.did_just_finish {
            return;
        }

        if index + 1 < self.resources.len() {
            self.index = index + 1;
            debug!("Segment {} finished, advancing to {}", index, self.index);

            match self.resources[self.index].resource.play().await {
                Ok(status) => self.status = Some(status),
                Err(e) => {
                    error!("Failed to play segment {}: {:#}", self.index, e);
                    self.finish().await;
                }
            }
        } else {
            self.finish().await;
        }
    }

    /// Apply every queued status update
    pub async fn drain_status(&mut self) {
        let mut pending = Vec::new();
        for (index, loaded) in self.resources.iter_mut().enumerate() {
            while let Ok(status) = loaded.status_rx.try_recv() {
                pending.push((index, status));
            }
        }

        for (index, status) in pending {
            self.handle_status(index, status).await;
        }
    }

    /// Release every loaded resource
    pub async fn unload(&mut self) {
        for LoadedPlayable {
            mut resource,
            status_rx,
        } in self.resources.drain(..)
        {
            // Close the stream first so a backend task blocked on it can exit
            drop(status_rx);
            if let Err(e) = resource.unload().await {
                warn!("Failed to unload {}: {:#}", resource.uri(), e);
            }
        }

        self.segment_lengths.clear();
        self.duration_ms = 0;
        self.index = 0;
        self.status = None;
        self.is_playing = false;
    }

    /// Position on the recording's timeline
    pub fn position_ms(&self) -> u64 {
        let offset: u64 = self.segment_lengths.iter().take(self.index).sum();
        let local = self.status.map(|s| s.position_ms).unwrap_or(0);
        offset + local
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Fraction of the recording played, 0.0 to 1.0
    pub fn progress(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        (self.position_ms() as f64 / self.duration_ms as f64).min(1.0)
    }

    pub fn playback_status(&self) -> PlaybackStatus {
        PlaybackStatus {
            position_ms: self.position_ms(),
            duration_ms: self.duration_ms,
        }
    }

    pub fn is_loaded(&self) -> bool {
        !self.resources.is_empty()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn segment_count(&self) -> usize {
        self.resources.len()
    }

    /// Last segment finished: rewind everything
    async fn finish(&mut self) {
        let end = PlaybackStatus {
            position_ms: self.duration_ms,
            duration_ms: self.duration_ms,
        };

        self.rewind_all().await;
        self.status = self.resources.first().map(|_| PlayableStatus {
            duration_ms: self.segment_lengths.first().copied().unwrap_or(0),
            ..PlayableStatus::default()
        });

        info!("Playback finished ({}ms)", self.duration_ms);
        self.events.emit(RecorderEvent::PlaybackStop { status: Some(end) });
    }

    async fn rewind_all(&mut self) {
        for loaded in &mut self.resources {
            if let Err(e) = loaded.resource.stop().await {
                warn!("Failed to stop {}: {:#}", loaded.resource.uri(), e);
            }
        }
        self.index = 0;
        self.is_playing = false;
    }

    /// Segment index and local position for a timeline position
    fn locate(&self, position_ms: u64) -> (usize, u64) {
        let last = self.resources.len().saturating_sub(1);
        let mut start = 0;

        for (index, &length) in self.segment_lengths.iter().enumerate() {
            if index == last || position_ms < start + length {
                return (index, position_ms.saturating_sub(start).min(length));
            }
            start += length;
        }

        (0, 0)
    }
}
