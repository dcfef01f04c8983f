use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the recorder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Period between metering/progress updates in milliseconds
    /// Default: 50
    pub progress_interval_ms: u64,

    /// Hard recording cap in milliseconds; the recorder stops itself here
    /// Default: 120000 (2 minutes)
    pub max_duration_ms: u64,

    /// Visual gap between waveform lines, in the same units as the line width
    pub timeline_gap: f32,
}

impl RecorderConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: 50,
            max_duration_ms: 120_000,
            timeline_gap: 16.0,
        }
    }
}
