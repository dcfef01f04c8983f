// Recording collection
//
// Finalized recordings kept for the lifetime of the process, newest first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audio::METERING_MIN_POWER;
use crate::session::RawSegment;

/// Handle(s) of a finalized recording
///
/// Serialized untagged: a plain string for one segment, an array otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordingUri {
    Single(String),
    Sequence(Vec<String>),
}

impl RecordingUri {
    /// Handles in playback order
    pub fn handles(&self) -> Vec<&str> {
        match self {
            RecordingUri::Single(uri) => vec![uri.as_str()],
            RecordingUri::Sequence(uris) => uris.iter().map(String::as_str).collect(),
        }
    }

    /// Stable key for list rendering
    pub fn key(&self) -> String {
        self.handles().join("-")
    }
}

impl From<&str> for RecordingUri {
    fn from(uri: &str) -> Self {
        RecordingUri::Single(uri.to_string())
    }
}

impl From<Vec<String>> for RecordingUri {
    fn from(uris: Vec<String>) -> Self {
        RecordingUri::Sequence(uris)
    }
}

/// A finished recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub uri: RecordingUri,

    /// Amplitudes in dBFS used to draw the waveform
    pub metering: Vec<f32>,

    pub timestamp: DateTime<Utc>,

    /// Total length in milliseconds
    pub duration: u64,

    /// Individual segment lengths, only for multi-segment recordings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durations: Option<Vec<u64>>,
}

impl Recording {
    /// Merge a session's segments into one recording
    ///
    /// The waveform comes from the last segment only. The session keeps one
    /// metering buffer across pauses, so that snapshot spans every segment.
    pub fn from_segments(segments: &[RawSegment]) -> Option<Self> {
        let last = segments.last()?;
        let metering = last.meterings.iter().map(|m| m.db).collect();

        let recording = if segments.len() == 1 {
            Self {
                uri: RecordingUri::Single(last.uri.clone()),
                metering,
                timestamp: Utc::now(),
                duration: last.duration,
                durations: None,
            }
        } else {
            let mut previous_end = 0;
            let durations = segments
                .iter()
                .map(|segment| {
                    let length = segment.duration.saturating_sub(previous_end);
                    previous_end = segment.duration;
                    length
                })
                .collect();

            Self {
                uri: RecordingUri::Sequence(segments.iter().map(|s| s.uri.clone()).collect()),
                metering,
                timestamp: Utc::now(),
                duration: last.duration,
                durations: Some(durations),
            }
        };

        Some(recording)
    }

    pub fn segment_count(&self) -> usize {
        match &self.uri {
            RecordingUri::Single(_) => 1,
            RecordingUri::Sequence(uris) => uris.len(),
        }
    }

    /// Reduce the metering to `count` bars by averaging buckets
    ///
    /// Buckets that cover no samples fall back to the silence floor.
    pub fn waveform_lines(&self, count: usize) -> Vec<f32> {
        let len = self.metering.len();

        (0..count)
            .map(|i| {
                let start = i * len / count;
                let end = ((i + 1) * len).div_ceil(count).min(len);
                let values = &self.metering[start.min(end)..end];

                if values.is_empty() {
                    METERING_MIN_POWER
                } else {
                    values.iter().sum::<f32>() / values.len() as f32
                }
            })
            .collect()
    }
}

/// Height of a waveform bar for an amplitude, clamped to [5, 50]
pub fn bar_height(db: f32) -> f32 {
    const DB_RANGE: (f32, f32) = (-60.0, 0.0);
    const HEIGHT_RANGE: (f32, f32) = (5.0, 50.0);

    let t = ((db - DB_RANGE.0) / (DB_RANGE.1 - DB_RANGE.0)).clamp(0.0, 1.0);
    HEIGHT_RANGE.0 + t * (HEIGHT_RANGE.1 - HEIGHT_RANGE.0)
}

/// In-memory list of finalized recordings, newest first
#[derive(Debug, Default)]
pub struct RecordingStore {
    recordings: Vec<Recording>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finalize a session's segments and put the result at the front
    pub fn append(&mut self, segments: &[RawSegment]) -> Option<&Recording> {
        let Some(recording) = Recording::from_segments(segments) else {
            debug!("Nothing to append: no segments");
            return None;
        };

        info!(
            "Saved recording {} ({}ms, {} segment(s))",
            recording.uri.key(),
            recording.duration,
            recording.segment_count()
        );

        self.recordings.insert(0, recording);
        self.recordings.first()
    }

    /// Remove every recording whose uri is structurally equal to `uri`
    ///
    /// Returns the number removed.
    pub fn delete(&mut self, uri: &RecordingUri) -> usize {
        let before = self.recordings.len();
        self.recordings.retain(|recording| &recording.uri != uri);
        let removed = before - self.recordings.len();

        if removed > 0 {
            info!("Deleted recording {}", uri.key());
        } else {
            debug!("Delete matched nothing: {}", uri.key());
        }

        removed
    }

    pub fn recordings(&self) -> &[Recording] {
        &self.recordings
    }

    pub fn get(&self, index: usize) -> Option<&Recording> {
        self.recordings.get(index)
    }

    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }
}
