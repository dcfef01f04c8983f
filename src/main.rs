// Headless voice memo run
//
// Records from a WAV file through the replay backend (with one pause in
// the middle), saves the take, then plays it back while printing progress.
//
// Usage: cargo run -- --source fixtures/voice.wav --seconds 4

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::info;
use voice_memos::{
    format_millis, Config, EventSink, PlaybackController, Recorder, RecorderEvent,
    RecordingStore, ReplayBackend,
};

#[derive(Parser)]
#[command(name = "voice-memos")]
#[command(about = "Record, pause, resume and play back a voice memo")]
struct Args {
    /// Config file (without extension)
    #[arg(short, long, default_value = "config/voice-memos")]
    config: String,

    /// WAV file to record from (overrides storage.replay_source)
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Directory for captured segments (overrides storage.recordings_path)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Seconds of audio to record, split around one pause
    #[arg(long, default_value = "4")]
    seconds: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    let source = args
        .source
        .or_else(|| cfg.storage.replay_source.as_ref().map(PathBuf::from))
        .context("No replay source: pass --source or set storage.replay_source")?;
    let output_dir = args
        .output_dir
        .unwrap_or_else(|| PathBuf::from(&cfg.storage.recordings_path));

    info!("Voice Memos v0.1.0");
    info!("Recording from {} into {}", source.display(), output_dir.display());

    let backend = Arc::new(ReplayBackend::new(&source, &output_dir)?);
    let (events, mut event_rx) = EventSink::channel();
    let mut recorder = Recorder::new(backend.clone(), cfg.recorder.clone(), events.clone());
    let mut store = RecordingStore::new();

    let clock = Instant::now();
    let interval = cfg.recorder.progress_interval();
    let half = Duration::from_millis(args.seconds * 500);

    recorder.start_recording(elapsed_ms(clock)).await?;
    drive(&mut recorder, clock, interval, half, &mut event_rx, &mut store).await;

    recorder.pause_recording().await;
    drive(&mut recorder, clock, interval, Duration::from_millis(500), &mut event_rx, &mut store).await;

    recorder.resume_recording().await;
    drive(&mut recorder, clock, interval, half, &mut event_rx, &mut store).await;

    if recorder.is_recording() {
        recorder.stop_recording().await;
    }
    drain_events(&mut event_rx, &mut store);

    let Some(recording) = store.get(0).cloned() else {
        info!("Nothing was recorded");
        return Ok(());
    };

    let mut player = PlaybackController::new(backend, interval, EventSink::disconnected());
    player.load(&recording).await;
    player.play().await;

    let mut ticker = tokio::time::interval(interval * 10);
    while player.is_playing() {
        ticker.tick().await;
        player.drain_status().await;
        info!(
            "Playing segment {}/{}: {} / {}",
            player.current_index() + 1,
            player.segment_count(),
            format_millis(Some(player.position_ms())),
            format_millis(Some(player.duration_ms()))
        );
    }
    player.unload().await;

    println!("{}", serde_json::to_string_pretty(store.recordings())?);

    Ok(())
}

fn elapsed_ms(clock: Instant) -> u64 {
    clock.elapsed().as_millis() as u64
}

/// Tick the recorder for `span`, filing finished takes into the store
async fn drive(
    recorder: &mut Recorder,
    clock: Instant,
    interval: Duration,
    span: Duration,
    event_rx: &mut mpsc::UnboundedReceiver<RecorderEvent>,
    store: &mut RecordingStore,
) {
    let mut ticker = tokio::time::interval(interval);
    let until = Instant::now() + span;

    while Instant::now() < until {
        ticker.tick().await;
        recorder.tick(elapsed_ms(clock)).await;
        drain_events(event_rx, store);
    }
}

fn drain_events(event_rx: &mut mpsc::UnboundedReceiver<RecorderEvent>, store: &mut RecordingStore) {
    while let Ok(event) = event_rx.try_recv() {
        match event {
            RecorderEvent::RecordStop { segments } => {
                store.append(&segments);
            }
            RecorderEvent::PositionChange { .. } => {}
            other => info!("{:?}", other),
        }
    }
}
