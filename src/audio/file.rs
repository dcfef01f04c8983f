use anyhow::{Context, Result};
use hound::WavReader;
use std::fs::File;
use std::path::Path;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

use super::backend::METERING_MIN_POWER;

pub struct AudioFile {
    pub path: String,
    pub duration_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let frames = samples.len() as u64 / spec.channels.max(1) as u64;
        let duration_ms = frames * 1000 / spec.sample_rate.max(1) as u64;

        info!(
            "Audio file loaded: {}ms, {}Hz, {} channels, {} samples",
            duration_ms,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_ms,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Number of interleaved samples covering `ms` of audio
    pub fn samples_for(&self, ms: u64) -> usize {
        (self.sample_rate as u64 * self.channels as u64 * ms / 1000) as usize
    }
}

/// Level of a window of samples in dBFS, floored at the metering minimum
pub fn level_db(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return METERING_MIN_POWER;
    }

    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64 / i16::MAX as f64;
            v * v
        })
        .sum();
    let rms = (sum_sq / samples.len() as f64).sqrt();

    if rms <= 0.0 {
        return METERING_MIN_POWER;
    }

    ((20.0 * rms.log10()) as f32).max(METERING_MIN_POWER)
}

/// Probe the length of any supported audio file in milliseconds
pub fn probe_duration_ms(path: impl AsRef<Path>) -> Result<u64> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open audio file: {:?}", path))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Unsupported audio format: {:?}", path))?;

    let track = probed
        .format
        .default_track()
        .context("Audio file has no default track")?;
    let params = &track.codec_params;
    let frames = params.n_frames.context("Audio track has unknown length")?;
    let sample_rate = params.sample_rate.context("Audio track has unknown sample rate")?;

    let duration_ms = frames * 1000 / sample_rate.max(1) as u64;
    debug!("Probed {:?}: {}ms", path, duration_ms);

    Ok(duration_ms)
}
