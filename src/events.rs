use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::session::RawSegment;

/// Position and length of a playback, in timeline milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaybackStatus {
    pub position_ms: u64,
    pub duration_ms: u64,
}

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecorderEvent {
    /// A capture began writing to `uri`
    RecordStart { uri: String },
    /// Recording finished; segments are in creation order
    RecordStop { segments: Vec<RawSegment> },
    RecordReset,
    RecordPaused,
    RecordResumed,
    PositionChange { position_ms: u64 },
    PlaybackStart { status: Option<PlaybackStatus> },
    PlaybackStop { status: Option<PlaybackStatus> },
}

/// Cloneable sender side for `RecorderEvent`s
///
/// A disconnected sink drops every event, which is what headless callers
/// that only poll state want.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<RecorderEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RecorderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: RecorderEvent) {
        if let Some(tx) = &self.tx {
            if let Err(e) = tx.send(event) {
                debug!("Event listener gone, dropping {:?}", e.0);
            }
        }
    }
}
