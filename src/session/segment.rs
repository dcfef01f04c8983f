use serde::{Deserialize, Serialize};

/// One amplitude sample taken while recording
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metering {
    /// Milliseconds since the recording (not the segment) started
    pub position: u64,

    /// Unique ordering id within the session
    pub key: u64,

    /// Amplitude in dBFS, or the silence floor
    pub db: f32,
}

/// One continuous capture inside a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    /// Handle of the captured audio
    pub uri: String,

    /// Session metering buffer at the moment the segment closed
    pub meterings: Vec<Metering>,

    /// Session timeline position when the segment closed, in milliseconds
    pub duration: u64,
}

/// Lifecycle of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    Paused,
}
