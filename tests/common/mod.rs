// Scripted audio backend for integration tests
//
// Captures and playables never touch audio. Tests push capture statuses
// and playback progress by hand and inspect the call log.

#![allow(dead_code)]

use anyhow::{bail, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use voice_memos::audio::{
    AudioBackend, Capture, CaptureOptions, CaptureStatus, LoadedPlayable, Playable,
    PlayableStatus,
};

#[derive(Default)]
struct Script {
    permission_denied: bool,
    fail_next_capture: bool,
    captures_opened: usize,
    capture_tx: Option<mpsc::Sender<CaptureStatus>>,
    capture_options: Vec<CaptureOptions>,
    playable_lengths: HashMap<String, u64>,
    failing_playables: HashSet<String>,
    playables: HashMap<String, Arc<Mutex<PlayState>>>,
    playable_tx: HashMap<String, mpsc::Sender<PlayableStatus>>,
    log: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct PlayState {
    pub position_ms: u64,
    pub duration_ms: u64,
    pub is_playing: bool,
    pub unloaded: bool,
}

#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny_permission(&self) {
        self.script.lock().unwrap().permission_denied = true;
    }

    pub fn fail_next_capture(&self) {
        self.script.lock().unwrap().fail_next_capture = true;
    }

    pub fn set_length(&self, uri: &str, duration_ms: u64) {
        self.script
            .lock()
            .unwrap()
            .playable_lengths
            .insert(uri.to_string(), duration_ms);
    }

    pub fn fail_playable(&self, uri: &str) {
        self.script
            .lock()
            .unwrap()
            .failing_playables
            .insert(uri.to_string());
    }

    pub fn captures_opened(&self) -> usize {
        self.script.lock().unwrap().captures_opened
    }

    pub fn capture_options(&self) -> Vec<CaptureOptions> {
        self.script.lock().unwrap().capture_options.clone()
    }

    /// Report a status from the most recently started capture
    pub fn report(&self, duration_ms: u64, db: f32) {
        let script = self.script.lock().unwrap();
        if let Some(tx) = &script.capture_tx {
            let _ = tx.try_send(CaptureStatus {
                is_recording: true,
                duration_ms,
                metering_db: Some(db),
            });
        }
    }

    /// Move a playing resource forward and report it
    pub fn progress(&self, uri: &str, position_ms: u64) {
        let script = self.script.lock().unwrap();
        let state = script.playables[uri].clone();
        let mut state = state.lock().unwrap();
        state.position_ms = position_ms;

        let _ = script.playable_tx[uri].try_send(PlayableStatus {
            position_ms,
            duration_ms: state.duration_ms,
            is_playing: state.is_playing,
            did_just_finish: false,
        });
    }

    /// Run a resource to its end and report the finish
    pub fn finish(&self, uri: &str) {
        let script = self.script.lock().unwrap();
        let state = script.playables[uri].clone();
        let mut state = state.lock().unwrap();
        state.position_ms = state.duration_ms;
        state.is_playing = false;

        let _ = script.playable_tx[uri].try_send(PlayableStatus {
            position_ms: state.duration_ms,
            duration_ms: state.duration_ms,
            is_playing: false,
            did_just_finish: true,
        });
    }

    pub fn play_state(&self, uri: &str) -> PlayState {
        let script = self.script.lock().unwrap();
        let state = script.playables[uri].lock().unwrap().clone();
        state
    }

    pub fn log(&self) -> Vec<String> {
        self.script.lock().unwrap().log.clone()
    }

    fn record(&self, entry: String) {
        self.script.lock().unwrap().log.push(entry);
    }
}

#[async_trait::async_trait]
impl AudioBackend for ScriptedBackend {
    async fn has_record_permission(&self) -> Result<bool> {
        Ok(!self.script.lock().unwrap().permission_denied)
    }

    async fn open_capture(&self, options: &CaptureOptions) -> Result<Box<dyn Capture>> {
        let mut script = self.script.lock().unwrap();
        script.captures_opened += 1;
        script.capture_options.push(options.clone());

        let fail_start = std::mem::take(&mut script.fail_next_capture);
        let uri = format!("capture-{}.m4a", script.captures_opened);
        script.log.push(format!("open {}", uri));

        Ok(Box::new(ScriptedCapture {
            uri,
            backend: self.clone(),
            fail_start,
            capturing: false,
        }))
    }

    async fn open_playable(&self, uri: &str, _progress_interval: Duration) -> Result<LoadedPlayable> {
        let mut script = self.script.lock().unwrap();
        if script.failing_playables.contains(uri) {
            bail!("Cannot decode {}", uri);
        }

        let duration_ms = script.playable_lengths.get(uri).copied().unwrap_or(1000);
        let state = Arc::new(Mutex::new(PlayState {
            duration_ms,
            ..PlayState::default()
        }));
        let (tx, status_rx) = mpsc::channel(100);

        script.playables.insert(uri.to_string(), Arc::clone(&state));
        script.playable_tx.insert(uri.to_string(), tx);
        script.log.push(format!("load {}", uri));

        Ok(LoadedPlayable {
            resource: Box::new(ScriptedPlayable {
                uri: uri.to_string(),
                state,
                backend: self.clone(),
            }),
            status_rx,
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedCapture {
    uri: String,
    backend: ScriptedBackend,
    fail_start: bool,
    capturing: bool,
}

#[async_trait::async_trait]
impl Capture for ScriptedCapture {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn set_metering_interval(&mut self, _interval: Duration) {}

    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureStatus>> {
        if self.fail_start {
            bail!("Recorder not available");
        }

        let (tx, rx) = mpsc::channel(100);
        self.backend.script.lock().unwrap().capture_tx = Some(tx);
        self.capturing = true;
        self.backend.record(format!("start {}", self.uri));
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<String> {
        self.capturing = false;
        self.backend.record(format!("stop {}", self.uri));
        Ok(self.uri.clone())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }
}

struct ScriptedPlayable {
    uri: String,
    state: Arc<Mutex<PlayState>>,
    backend: ScriptedBackend,
}

impl ScriptedPlayable {
    fn snapshot(&self) -> PlayableStatus {
        let state = self.state.lock().unwrap();
        PlayableStatus {
            position_ms: state.position_ms,
            duration_ms: state.duration_ms,
            is_playing: state.is_playing,
            did_just_finish: false,
        }
    }
}

#[async_trait::async_trait]
impl Playable for ScriptedPlayable {
    fn uri(&self) -> &str {
        &self.uri
    }

    async fn play(&mut self) -> Result<PlayableStatus> {
        self.state.lock().unwrap().is_playing = true;
        self.backend.record(format!("play {}", self.uri));
        Ok(self.snapshot())
    }

    async fn pause(&mut self) -> Result<PlayableStatus> {
        self.state.lock().unwrap().is_playing = false;
        self.backend.record(format!("pause {}", self.uri));
        Ok(self.snapshot())
    }

    async fn stop(&mut self) -> Result<PlayableStatus> {
        {
            let mut state = self.state.lock().unwrap();
            state.is_playing = false;
            state.position_ms = 0;
        }
        self.backend.record(format!("stop {}", self.uri));
        Ok(self.snapshot())
    }

    async fn seek(&mut self, position_ms: u64) -> Result<PlayableStatus> {
        {
            let mut state = self.state.lock().unwrap();
            state.position_ms = position_ms.min(state.duration_ms);
        }
        self.backend.record(format!("seek {} {}", self.uri, position_ms));
        Ok(self.snapshot())
    }

    async fn status(&self) -> Result<PlayableStatus> {
        Ok(self.snapshot())
    }

    async fn unload(&mut self) -> Result<()> {
        self.state.lock().unwrap().unloaded = true;
        self.backend.record(format!("unload {}", self.uri));
        Ok(())
    }
}
