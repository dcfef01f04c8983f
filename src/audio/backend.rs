use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;

/// Amplitude reported when the backend has no metering for an update
pub const METERING_MIN_POWER: f32 = -160.0;

/// Periodic status reported by an active capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureStatus {
    /// Whether the capture is currently recording
    pub is_recording: bool,
    /// Milliseconds captured since this capture started
    pub duration_ms: u64,
    /// Amplitude in dBFS, if the backend meters
    pub metering_db: Option<f32>,
}

/// Options applied when opening a capture
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Period between status updates
    pub metering_interval: Duration,
    /// Keep capturing when the device is in silent mode
    pub allow_in_silent_mode: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            metering_interval: Duration::from_millis(50),
            allow_in_silent_mode: true,
        }
    }
}

/// Status of a loaded playable resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayableStatus {
    /// Playhead position in milliseconds
    pub position_ms: u64,
    /// Length of the resource in milliseconds
    pub duration_ms: u64,
    /// Whether the resource is currently playing
    pub is_playing: bool,
    /// Set on the single update emitted when playback reaches the end
    pub did_just_finish: bool,
}

/// One continuous audio capture
///
/// A capture writes to a single handle (`uri`) that stays valid after `stop`.
#[async_trait::async_trait]
pub trait Capture: Send {
    /// Handle of the audio this capture writes
    fn uri(&self) -> &str;

    /// Change the status update period (must be called before `start`)
    fn set_metering_interval(&mut self, interval: Duration);

    /// Begin capturing
    ///
    /// Returns a channel receiver that will receive periodic status updates
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureStatus>>;

    /// Stop capturing and release the device, returning the finished handle
    async fn stop(&mut self) -> Result<String>;

    /// Check if the capture is currently recording
    fn is_capturing(&self) -> bool;
}

/// A loaded, seekable audio resource
#[async_trait::async_trait]
pub trait Playable: Send + Sync {
    /// Handle this resource was loaded from
    fn uri(&self) -> &str;

    /// Play or resume from the current position
    async fn play(&mut self) -> Result<PlayableStatus>;

    /// Pause at the current position
    async fn pause(&mut self) -> Result<PlayableStatus>;

    /// Stop playback and rewind to the start
    async fn stop(&mut self) -> Result<PlayableStatus>;

    /// Move the playhead
    async fn seek(&mut self, position_ms: u64) -> Result<PlayableStatus>;

    /// Current status without changing anything
    async fn status(&self) -> Result<PlayableStatus>;

    /// Release the resource; no further statuses are sent afterwards
    async fn unload(&mut self) -> Result<()>;
}

/// A playable resource together with its status stream
pub struct LoadedPlayable {
    pub resource: Box<dyn Playable>,
    pub status_rx: mpsc::Receiver<PlayableStatus>,
}

/// Audio backend trait
///
/// Implementations:
/// - File replay: captures by replaying a WAV file, plays any probeable file
/// - Native: platform recorder/player (provided by the embedding app)
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Whether the user granted microphone access
    async fn has_record_permission(&self) -> Result<bool>;

    /// Open a new capture (not yet started)
    async fn open_capture(&self, options: &CaptureOptions) -> Result<Box<dyn Capture>>;

    /// Load a handle as a playable resource
    ///
    /// `progress_interval` is the period between position updates while playing
    async fn open_playable(&self, uri: &str, progress_interval: Duration) -> Result<LoadedPlayable>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}
