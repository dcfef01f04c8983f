pub mod audio;
pub mod config;
pub mod events;
pub mod format;
pub mod playback;
pub mod recorder;
pub mod session;
pub mod store;
pub mod waveform;

pub use audio::{
    AudioBackend, AudioFile, Capture, CaptureOptions, CaptureStatus, LoadedPlayable, Playable,
    PlayableStatus, ReplayBackend, METERING_MIN_POWER,
};
pub use config::Config;
pub use events::{EventSink, PlaybackStatus, RecorderEvent};
pub use format::format_millis;
pub use playback::PlaybackController;
pub use recorder::Recorder;
pub use session::{Metering, RawSegment, RecorderConfig, RecordingSession, SessionState};
pub use store::{Recording, RecordingStore, RecordingUri};
pub use waveform::{WaveformController, WaveformMode, WaveformTick};
