//! Recording session management
//!
//! This module provides the `RecordingSession` state machine that manages:
//! - Capture lifecycle (start, pause, resume, stop, reset)
//! - Metering accumulation from capture status updates
//! - Splitting one recording into segments across pause/resume
//! - The hard duration cap

mod config;
mod segment;
mod session;

pub use config::RecorderConfig;
pub use segment::{Metering, RawSegment, SessionState};
pub use session::RecordingSession;
