// Integration tests for the recording session state machine
//
// These tests drive a session against the scripted backend and check
// segmenting, metering and the no-op guards.

mod common;

use anyhow::Result;
use common::ScriptedBackend;
use std::sync::Arc;
use voice_memos::{
    EventSink, RecorderConfig, RecorderEvent, RecordingSession, RecordingStore, RecordingUri,
    SessionState,
};

fn session_with(backend: &ScriptedBackend, config: RecorderConfig) -> RecordingSession {
    RecordingSession::new(Arc::new(backend.clone()), config, EventSink::disconnected())
}

#[tokio::test]
async fn test_single_segment_recording() -> Result<()> {
    let backend = ScriptedBackend::new();
    let mut session = session_with(&backend, RecorderConfig::default());

    session.start().await?;
    assert_eq!(session.state(), SessionState::Recording);
    assert_eq!(session.capture_uri(), Some("capture-1.m4a"));

    backend.report(50, -20.0);
    backend.report(100, -10.0);
    assert_eq!(session.drain_status(), 2);
    assert_eq!(session.duration_ms(), 100);
    assert_eq!(session.position_ms(), 100);

    let segments = session.stop().await;
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].uri, "capture-1.m4a");
    assert_eq!(segments[0].duration, 100);
    assert_eq!(segments[0].meterings.len(), 2);

    // Session is back to idle values
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.meterings().is_empty());
    assert_eq!(session.duration_ms(), 0);
    assert_eq!(session.position_ms(), 0);

    let mut store = RecordingStore::new();
    let recording = store.append(&segments).unwrap();
    assert_eq!(recording.uri, RecordingUri::Single("capture-1.m4a".to_string()));
    assert_eq!(recording.metering, vec![-20.0, -10.0]);
    assert!(recording.durations.is_none());

    Ok(())
}

#[tokio::test]
async fn test_pause_resume_creates_two_segments() -> Result<()> {
    let backend = ScriptedBackend::new();
    let mut session = session_with(&backend, RecorderConfig::default());

    session.start().await?;
    backend.report(500, -30.0);
    backend.report(1000, -25.0);
    session.drain_status();

    session.pause_recording().await;
    assert_eq!(session.state(), SessionState::Paused);
    assert_eq!(session.segments().len(), 1);
    assert_eq!(session.segments()[0].duration, 1000);
    assert!(session.capture_uri().is_none());

    session.resume_recording().await;
    assert_eq!(session.state(), SessionState::Recording);
    assert_eq!(session.capture_uri(), Some("capture-2.m4a"));

    // The new capture reports from zero; the timeline continues at 1000
    backend.report(400, -15.0);
    backend.report(800, -5.0);
    assert_eq!(session.drain_status(), 2);
    assert_eq!(session.duration_ms(), 1800);

    let positions: Vec<u64> = session.meterings().iter().map(|m| m.position).collect();
    assert_eq!(positions, vec![500, 1000, 1400, 1800]);

    let segments = session.stop().await;
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[1].uri, "capture-2.m4a");
    assert_eq!(segments[1].duration, 1800);

    let mut store = RecordingStore::new();
    let recording = store.append(&segments).unwrap();
    assert_eq!(
        recording.uri,
        RecordingUri::Sequence(vec!["capture-1.m4a".to_string(), "capture-2.m4a".to_string()])
    );
    assert_eq!(recording.durations.as_ref().map(Vec::len), Some(2));
    assert_eq!(recording.durations, Some(vec![1000, 800]));
    assert_eq!(recording.duration, segments[1].duration);
    assert_eq!(recording.metering, vec![-30.0, -25.0, -15.0, -5.0]);

    Ok(())
}

#[tokio::test]
async fn test_meterings_stop_at_max_duration() -> Result<()> {
    let backend = ScriptedBackend::new();
    let config = RecorderConfig {
        max_duration_ms: 200,
        ..RecorderConfig::default()
    };
    let mut session = session_with(&backend, config);

    session.start().await?;
    backend.report(100, -10.0);
    backend.report(200, -10.0);
    backend.report(250, -10.0);
    backend.report(300, -10.0);

    assert_eq!(session.drain_status(), 2);
    assert_eq!(session.meterings().len(), 2);
    assert_eq!(session.position_ms(), 200);
    assert!(session.reached_max_duration());

    let segments = session.stop().await;
    assert_eq!(segments[0].meterings.len(), 2);
    assert!(!session.reached_max_duration());

    Ok(())
}

#[tokio::test]
async fn test_positions_strictly_increase() -> Result<()> {
    let backend = ScriptedBackend::new();
    let mut session = session_with(&backend, RecorderConfig::default());

    session.start().await?;
    backend.report(100, -10.0);
    backend.report(100, -12.0);
    backend.report(0, -12.0);
    backend.report(50, -12.0);
    backend.report(150, -14.0);

    assert_eq!(session.drain_status(), 2);
    let keys: Vec<u64> = session.meterings().iter().map(|m| m.key).collect();
    assert_eq!(keys, vec![100, 151]);

    Ok(())
}

#[tokio::test]
async fn test_start_while_recording_is_noop() -> Result<()> {
    let backend = ScriptedBackend::new();
    let mut session = session_with(&backend, RecorderConfig::default());

    session.start().await?;
    session.start().await?;

    assert_eq!(backend.captures_opened(), 1);
    assert_eq!(session.capture_uri(), Some("capture-1.m4a"));

    Ok(())
}

#[tokio::test]
async fn test_out_of_state_calls_are_noops() -> Result<()> {
    let backend = ScriptedBackend::new();
    let mut session = session_with(&backend, RecorderConfig::default());

    session.pause_recording().await;
    session.resume_recording().await;
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.stop().await.is_empty());

    session.start().await?;
    session.resume_recording().await;
    assert_eq!(backend.captures_opened(), 1, "resume while recording must not open a capture");

    Ok(())
}

#[tokio::test]
async fn test_status_ignored_unless_recording() -> Result<()> {
    let backend = ScriptedBackend::new();
    let mut session = session_with(&backend, RecorderConfig::default());

    session.start().await?;
    backend.report(100, -10.0);
    session.pause_recording().await;

    // Late update from the closed capture
    assert!(!session.handle_status(voice_memos::CaptureStatus {
        is_recording: true,
        duration_ms: 300,
        metering_db: Some(-1.0),
    }));
    assert_eq!(session.meterings().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_permission_denied_fails_before_capture() {
    let backend = ScriptedBackend::new();
    backend.deny_permission();
    let mut session = session_with(&backend, RecorderConfig::default());

    assert!(session.start().await.is_err());
    assert_eq!(backend.captures_opened(), 0);
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_capture_start_failure_leaves_session_idle() -> Result<()> {
    let backend = ScriptedBackend::new();
    backend.fail_next_capture();
    let mut session = session_with(&backend, RecorderConfig::default());

    session.start().await?;
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.capture_uri().is_none());
    assert!(session.stop().await.is_empty());

    // A retry works
    session.start().await?;
    assert_eq!(session.state(), SessionState::Recording);

    Ok(())
}

#[tokio::test]
async fn test_reset_discards_everything() -> Result<()> {
    let backend = ScriptedBackend::new();
    let (events, mut event_rx) = EventSink::channel();
    let mut session = RecordingSession::new(
        Arc::new(backend.clone()),
        RecorderConfig::default(),
        events,
    );

    session.start().await?;
    backend.report(100, -10.0);
    session.drain_status();
    session.pause_recording().await;
    session.resume_recording().await;

    session.reset().await;
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.segments().is_empty());
    assert!(session.meterings().is_empty());
    assert_eq!(session.duration_ms(), 0);
    assert!(backend.log().contains(&"stop capture-2.m4a".to_string()));

    let mut saw_reset = false;
    while let Ok(event) = event_rx.try_recv() {
        if event == RecorderEvent::RecordReset {
            saw_reset = true;
        }
    }
    assert!(saw_reset);

    Ok(())
}

#[tokio::test]
async fn test_lifecycle_events() -> Result<()> {
    let backend = ScriptedBackend::new();
    let (events, mut event_rx) = EventSink::channel();
    let mut session = RecordingSession::new(
        Arc::new(backend.clone()),
        RecorderConfig::default(),
        events,
    );

    session.start().await?;
    backend.report(100, -10.0);
    session.drain_status();
    session.pause_recording().await;
    session.resume_recording().await;
    let segments = session.stop().await;

    let mut lifecycle = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        if !matches!(event, RecorderEvent::PositionChange { .. }) {
            lifecycle.push(event);
        }
    }

    assert_eq!(
        lifecycle,
        vec![
            RecorderEvent::RecordStart {
                uri: "capture-1.m4a".to_string()
            },
            RecorderEvent::RecordPaused,
            RecorderEvent::RecordResumed,
            RecorderEvent::RecordStop { segments },
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_capture_opened_with_configured_interval() -> Result<()> {
    let backend = ScriptedBackend::new();
    let config = RecorderConfig {
        progress_interval_ms: 80,
        ..RecorderConfig::default()
    };
    let mut session = session_with(&backend, config);

    session.start().await?;

    let options = backend.capture_options();
    assert_eq!(options.len(), 1);
    assert_eq!(options[0].metering_interval.as_millis(), 80);
    assert!(options[0].allow_in_silent_mode);

    Ok(())
}
