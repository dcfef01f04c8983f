// File replay backend
//
// Stands in for a microphone by replaying a source WAV file in real time.
// Every capture writes what it "heard" to its own WAV file in the output
// directory and meters each update window. Playback is a clock-driven
// playhead over any file symphonia can probe.

use anyhow::{bail, Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::backend::{
    AudioBackend, Capture, CaptureOptions, CaptureStatus, LoadedPlayable, Playable,
    PlayableStatus,
};
use super::file::{level_db, probe_duration_ms, AudioFile};

const STATUS_CHANNEL_CAPACITY: usize = 100;

/// Backend that records by replaying a WAV file
pub struct ReplayBackend {
    source: Arc<AudioFile>,
    output_dir: PathBuf,
    permission_granted: bool,
}

impl ReplayBackend {
    pub fn new(source: impl AsRef<Path>, output_dir: impl Into<PathBuf>) -> Result<Self> {
        let source = AudioFile::open(source).context("Failed to load replay source")?;
        let output_dir = output_dir.into();

        fs::create_dir_all(&output_dir)
            .context("Failed to create output directory")?;

        info!(
            "Replay backend initialized: {} -> {}",
            source.path,
            output_dir.display()
        );

        Ok(Self {
            source: Arc::new(source),
            output_dir,
            permission_granted: true,
        })
    }

    /// Simulate the user granting or denying microphone access
    pub fn with_permission(mut self, granted: bool) -> Self {
        self.permission_granted = granted;
        self
    }
}

#[async_trait::async_trait]
impl AudioBackend for ReplayBackend {
    async fn has_record_permission(&self) -> Result<bool> {
        Ok(self.permission_granted)
    }

    async fn open_capture(&self, options: &CaptureOptions) -> Result<Box<dyn Capture>> {
        let path = self
            .output_dir
            .join(format!("recording-{}.wav", uuid::Uuid::new_v4()));

        debug!(
            "Opening replay capture {} (silent mode: {})",
            path.display(),
            options.allow_in_silent_mode
        );

        Ok(Box::new(ReplayCapture {
            uri: path.display().to_string(),
            path,
            source: Arc::clone(&self.source),
            interval: options.metering_interval,
            is_capturing: Arc::new(AtomicBool::new(false)),
            task: None,
        }))
    }

    async fn open_playable(&self, uri: &str, progress_interval: Duration) -> Result<LoadedPlayable> {
        let duration_ms = probe_duration_ms(uri)?;
        let (resource, status_rx) = ReplayPlayable::load(uri, duration_ms, progress_interval);

        Ok(LoadedPlayable {
            resource: Box::new(resource),
            status_rx,
        })
    }

    fn name(&self) -> &str {
        "file-replay"
    }
}

/// Writes replayed source samples to a WAV file while metering them
struct ReplayCapture {
    uri: String,
    path: PathBuf,
    source: Arc<AudioFile>,
    interval: Duration,
    is_capturing: Arc<AtomicBool>,
    task: Option<JoinHandle<Result<usize>>>,
}

#[async_trait::async_trait]
impl Capture for ReplayCapture {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn set_metering_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureStatus>> {
        if self.task.is_some() {
            bail!("Capture already started: {}", self.uri);
        }

        let spec = hound::WavSpec {
            channels: self.source.channels,
            sample_rate: self.source.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(&self.path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", self.path))?;

        let (tx, rx) = mpsc::channel(STATUS_CHANNEL_CAPACITY);
        let source = Arc::clone(&self.source);
        let is_capturing = Arc::clone(&self.is_capturing);
        let interval = self.interval.max(Duration::from_millis(1));

        self.is_capturing.store(true, Ordering::SeqCst);

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(interval);
            let mut cursor = 0usize;
            let mut written = 0usize;

            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if !is_capturing.load(Ordering::SeqCst) {
                    break;
                }

                let elapsed_ms = started.elapsed().as_millis() as u64;
                let target = source.samples_for(elapsed_ms);
                let mut window = Vec::with_capacity(target.saturating_sub(written));

                while written < target {
                    let sample = if source.samples.is_empty() {
                        0
                    } else {
                        source.samples[cursor % source.samples.len()]
                    };
                    write_sample(&mut writer, sample)?;
                    window.push(sample);
                    cursor += 1;
                    written += 1;
                }

                let status = CaptureStatus {
                    is_recording: true,
                    duration_ms: elapsed_ms,
                    metering_db: Some(level_db(&window)),
                };

                // A slow consumer loses updates rather than stalling the capture
                if let Err(e) = tx.try_send(status) {
                    debug!("Dropped capture status: {}", e);
                }
            }

            writer.finalize().context("Failed to finalize WAV file")?;
            Ok::<usize, anyhow::Error>(written)
        });

        self.task = Some(task);
        info!("Replay capture started: {}", self.uri);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<String> {
        self.is_capturing.store(false, Ordering::SeqCst);

        if let Some(task) = self.task.take() {
            let written = task.await.context("Capture task panicked")??;
            info!("Replay capture stopped: {} ({} samples)", self.uri, written);
        } else {
            warn!("Stopping capture that never started: {}", self.uri);
        }

        Ok(self.uri.clone())
    }

    fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::SeqCst)
    }
}

impl Drop for ReplayCapture {
    fn drop(&mut self) {
        // The capture task finalizes its writer once it observes the flag
        self.is_capturing.store(false, Ordering::SeqCst);
    }
}

fn write_sample(writer: &mut hound::WavWriter<BufWriter<File>>, sample: i16) -> Result<()> {
    writer
        .write_sample(sample)
        .context("Failed to write sample to WAV")
}

#[derive(Debug)]
struct Playhead {
    position: Duration,
    duration: Duration,
    is_playing: bool,
    last_tick: Instant,
    loaded: bool,
}

impl Playhead {
    /// Fold wall-clock time since the last tick into the position
    fn settle(&mut self, now: Instant) {
        if self.is_playing {
            let elapsed = now.saturating_duration_since(self.last_tick);
            self.position = (self.position + elapsed).min(self.duration);
        }
        self.last_tick = now;
    }

    fn status(&self, did_just_finish: bool) -> PlayableStatus {
        PlayableStatus {
            position_ms: self.position.as_millis() as u64,
            duration_ms: self.duration.as_millis() as u64,
            is_playing: self.is_playing,
            did_just_finish,
        }
    }

    fn projected(&self, now: Instant) -> PlayableStatus {
        let mut status = self.status(false);
        if self.is_playing {
            let elapsed = now.saturating_duration_since(self.last_tick);
            status.position_ms = (self.position + elapsed).min(self.duration).as_millis() as u64;
        }
        status
    }
}

/// Clock-driven playback of a probed file
struct ReplayPlayable {
    uri: String,
    playhead: Arc<Mutex<Playhead>>,
    task: Option<JoinHandle<()>>,
}

impl ReplayPlayable {
    fn load(
        uri: &str,
        duration_ms: u64,
        progress_interval: Duration,
    ) -> (Self, mpsc::Receiver<PlayableStatus>) {
        let playhead = Arc::new(Mutex::new(Playhead {
            position: Duration::ZERO,
            duration: Duration::from_millis(duration_ms),
            is_playing: false,
            last_tick: Instant::now(),
            loaded: true,
        }));

        let (tx, rx) = mpsc::channel(STATUS_CHANNEL_CAPACITY);
        let ticking = Arc::clone(&playhead);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(progress_interval.max(Duration::from_millis(1)));

            // A finish that found the channel full, retried on later ticks
            let mut held: Option<PlayableStatus> = None;

            loop {
                ticker.tick().await;

                let fresh = {
                    let mut playhead = ticking.lock().await;
                    if !playhead.loaded {
                        break;
                    }
                    let now = Instant::now();
                    if !playhead.is_playing {
                        playhead.last_tick = now;
                        None
                    } else {
                        playhead.settle(now);
                        let finished = playhead.position >= playhead.duration;
                        if finished {
                            playhead.is_playing = false;
                        }
                        Some(playhead.status(finished))
                    }
                };

                let Some(status) = held.take().or(fresh) else {
                    continue;
                };

                // Never block: unload waits for this task to notice `loaded`
                match tx.try_send(status) {
                    Ok(()) => {}
                    Err(TrySendError::Full(status)) if status.did_just_finish => {
                        held = Some(status);
                    }
                    Err(TrySendError::Full(_)) => {
                        debug!("Dropped playback status: channel full");
                    }
                    Err(TrySendError::Closed(_)) => break,
                }
            }
        });

        info!("Loaded playable {} ({}ms)", uri, duration_ms);

        (
            Self {
                uri: uri.to_string(),
                playhead,
                task: Some(task),
            },
            rx,
        )
    }
}

#[async_trait::async_trait]
impl Playable for ReplayPlayable {
    fn uri(&self) -> &str {
        &self.uri
    }

    async fn play(&mut self) -> Result<PlayableStatus> {
        let mut playhead = self.playhead.lock().await;
        playhead.settle(Instant::now());
        playhead.is_playing = true;
        Ok(playhead.status(false))
    }

    async fn pause(&mut self) -> Result<PlayableStatus> {
        let mut playhead = self.playhead.lock().await;
        playhead.settle(Instant::now());
        playhead.is_playing = false;
        Ok(playhead.status(false))
    }

    async fn stop(&mut self) -> Result<PlayableStatus> {
        let mut playhead = self.playhead.lock().await;
        playhead.is_playing = false;
        playhead.position = Duration::ZERO;
        playhead.last_tick = Instant::now();
        Ok(playhead.status(false))
    }

    async fn seek(&mut self, position_ms: u64) -> Result<PlayableStatus> {
        let mut playhead = self.playhead.lock().await;
        playhead.settle(Instant::now());
        playhead.position = Duration::from_millis(position_ms).min(playhead.duration);
        Ok(playhead.status(false))
    }

    async fn status(&self) -> Result<PlayableStatus> {
        let playhead = self.playhead.lock().await;
        Ok(playhead.projected(Instant::now()))
    }

    async fn unload(&mut self) -> Result<()> {
        {
            let mut playhead = self.playhead.lock().await;
            playhead.loaded = false;
            playhead.is_playing = false;
        }

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Playback task panicked: {}", e);
            }
        }

        debug!("Unloaded playable {}", self.uri);
        Ok(())
    }
}

impl Drop for ReplayPlayable {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
