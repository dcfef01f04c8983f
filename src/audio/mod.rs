pub mod backend;
pub mod file;
pub mod replay;

pub use backend::{
    AudioBackend, Capture, CaptureOptions, CaptureStatus, LoadedPlayable, Playable,
    PlayableStatus, METERING_MIN_POWER,
};
pub use file::{level_db, probe_duration_ms, AudioFile};
pub use replay::ReplayBackend;
