// Waveform scroll position
//
// The recorder shows a horizontally scrolling timeline. Its offset `x` is 0
// at the start and grows negative as the timeline moves left. While
// recording or playing, the offset follows the audio; otherwise the offset
// is what the user scrolled to, and the position is derived from it.

use tracing::debug;

use crate::session::RecorderConfig;

/// Timeline milliseconds represented by one waveform line
pub const TIMELINE_MS_PER_LINE: u64 = 250;

/// Width of one waveform line
pub const WAVEFORM_LINE_WIDTH: f32 = 2.0;

/// Spring parameters, in the units of a damped harmonic oscillator
#[derive(Debug, Clone, Copy)]
pub struct SpringConfig {
    pub stiffness: f32,
    pub damping: f32,
    pub mass: f32,
    /// Finish as soon as the target is crossed
    pub overshoot_clamping: bool,
    pub rest_displacement_threshold: f32,
    pub rest_speed_threshold: f32,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            stiffness: 120.0,
            damping: 10.0,
            mass: 1.0,
            overshoot_clamping: true,
            rest_displacement_threshold: 0.01,
            rest_speed_threshold: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformMode {
    Idle,
    Recording,
    Playing,
}

/// Result of advancing the controller to a point in time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveformTick {
    pub offset: f32,
    /// New position derived from the offset while idle
    pub position_change: Option<u64>,
    /// The spring started by `reset_scroll` settled on this tick
    pub reset_finished: bool,
}

#[derive(Debug, Clone, Copy)]
enum Animation {
    Timing {
        from: f32,
        to: f32,
        start_ms: u64,
        duration_ms: u64,
    },
    Spring {
        to: f32,
        velocity: f32,
        last_ms: u64,
        /// Side of the target the spring started on
        side: f32,
        config: SpringConfig,
    },
}

impl Animation {
    /// Value at `now_ms`, and whether the animation is done
    fn sample(&mut self, current: f32, now_ms: u64) -> (f32, bool) {
        match self {
            Animation::Timing {
                from,
                to,
                start_ms,
                duration_ms,
            } => {
                if *duration_ms == 0 {
                    return (*to, true);
                }
                let t = (now_ms.saturating_sub(*start_ms) as f32 / *duration_ms as f32).min(1.0);
                (*from + (*to - *from) * t, t >= 1.0)
            }
            Animation::Spring {
                to,
                velocity,
                last_ms,
                side,
                config,
            } => {
                const MAX_STEP_SECS: f32 = 0.004;
                const MAX_FRAME_SECS: f32 = 1.0;

                let mut remaining =
                    (now_ms.saturating_sub(*last_ms) as f32 / 1000.0).min(MAX_FRAME_SECS);
                *last_ms = now_ms;

                let mut x = current;
                while remaining > 0.0 {
                    let dt = remaining.min(MAX_STEP_SECS);
                    remaining -= dt;

                    let displacement = x - *to;
                    let accel = (-config.stiffness * displacement - config.damping * *velocity)
                        / config.mass;
                    *velocity += accel * dt;
                    x += *velocity * dt;

                    let crossed = (x - *to) * *side <= 0.0;
                    let at_rest = (x - *to).abs() < config.rest_displacement_threshold
                        && velocity.abs() < config.rest_speed_threshold;

                    if (config.overshoot_clamping && crossed) || at_rest {
                        return (*to, true);
                    }
                }

                (x, false)
            }
        }
    }
}

/// Derives the waveform scroll offset and the displayed position
#[derive(Debug, Clone)]
pub struct WaveformController {
    line_span: f32,
    progress_interval_ms: u64,
    spring: SpringConfig,
    mode: WaveformMode,
    offset: f32,
    animation: Option<Animation>,
    is_scroll_animating: bool,
    duration_ms: u64,
    current_ms: u64,
}

impl WaveformController {
    pub fn new(config: &RecorderConfig) -> Self {
        Self {
            line_span: config.timeline_gap + WAVEFORM_LINE_WIDTH,
            progress_interval_ms: config.progress_interval_ms,
            spring: SpringConfig::default(),
            mode: WaveformMode::Idle,
            offset: 0.0,
            animation: None,
            is_scroll_animating: false,
            duration_ms: 0,
            current_ms: 0,
        }
    }

    pub fn with_spring(mut self, spring: SpringConfig) -> Self {
        self.spring = spring;
        self
    }

    /// Timeline width covering `ms` of audio
    pub fn width_for(&self, ms: u64) -> f32 {
        ms as f32 / TIMELINE_MS_PER_LINE as f32 * self.line_span
    }

    pub fn max_width(&self) -> f32 {
        self.width_for(self.duration_ms)
    }

    /// Milliseconds at a (non-positive) offset, rounded down to 100ms
    pub fn offset_to_ms(&self, offset: f32) -> u64 {
        let ms = offset.abs() / self.line_span * TIMELINE_MS_PER_LINE as f32;
        (ms / 100.0).floor() as u64 * 100
    }

    /// A new recording: spring back to the start and follow the duration
    pub fn begin_recording(&mut self, now_ms: u64) {
        self.mode = WaveformMode::Recording;
        self.duration_ms = 0;
        self.is_scroll_animating = false;
        self.spring_to(0.0, now_ms);
    }

    /// Follow a resumed recording without jumping back to the start
    pub fn resume_recording(&mut self) {
        self.mode = WaveformMode::Recording;
    }

    /// Re-target the timeline end while recording
    pub fn on_recording_duration(&mut self, duration_ms: u64, now_ms: u64) {
        self.duration_ms = duration_ms;
        if self.mode == WaveformMode::Recording {
            let target = -self.max_width();
            self.time_to(target, now_ms);
        }
    }

    pub fn end_recording(&mut self, duration_ms: u64) {
        self.mode = WaveformMode::Idle;
        self.duration_ms = duration_ms;
    }

    /// Follow the playhead, never scrolling past the end of the timeline
    pub fn on_playback_position(&mut self, position_ms: u64, now_ms: u64) {
        self.mode = WaveformMode::Playing;
        let target = -self.width_for(position_ms).min(self.max_width());
        self.time_to(target, now_ms);
    }

    pub fn end_playback(&mut self) {
        self.mode = WaveformMode::Idle;
    }

    /// Spring back to the start; the settling tick reports `reset_finished`
    pub fn reset_scroll(&mut self, now_ms: u64) {
        self.is_scroll_animating = true;
        self.spring_to(0.0, now_ms);
        if self.animation.is_none() {
            // Already at the start: settle on the next tick
            self.animation = Some(Animation::Timing {
                from: 0.0,
                to: 0.0,
                start_ms: now_ms,
                duration_ms: 0,
            });
        }
    }

    /// User scroll; ignored unless idle
    pub fn drag_by(&mut self, dx: f32) {
        if self.mode != WaveformMode::Idle || self.is_scroll_animating {
            return;
        }
        self.animation = None;
        self.offset += dx;
    }

    /// Jump to an offset, as after a fling settles; ignored unless idle
    pub fn set_offset(&mut self, offset: f32) {
        if self.mode != WaveformMode::Idle || self.is_scroll_animating {
            return;
        }
        self.animation = None;
        self.offset = offset;
    }

    pub fn set_duration(&mut self, duration_ms: u64) {
        self.duration_ms = duration_ms;
    }

    /// Back to an empty timeline
    pub fn reset(&mut self) {
        self.mode = WaveformMode::Idle;
        self.offset = 0.0;
        self.animation = None;
        self.is_scroll_animating = false;
        self.duration_ms = 0;
        self.current_ms = 0;
    }

    /// Advance any animation to `now_ms` and derive the idle position
    pub fn tick(&mut self, now_ms: u64) -> WaveformTick {
        let mut reset_finished = false;

        if let Some(animation) = self.animation.as_mut() {
            let (offset, done) = animation.sample(self.offset, now_ms);
            self.offset = offset;
            if done {
                self.animation = None;
                if self.is_scroll_animating {
                    self.is_scroll_animating = false;
                    reset_finished = true;
                }
            }
        }

        let position_change = if self.mode == WaveformMode::Idle && !self.is_scroll_animating {
            self.derive_position()
        } else {
            None
        };

        WaveformTick {
            offset: self.offset,
            position_change,
            reset_finished,
        }
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn mode(&self) -> WaveformMode {
        self.mode
    }

    pub fn is_scroll_animating(&self) -> bool {
        self.is_scroll_animating
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn derive_position(&mut self) -> Option<u64> {
        let ms = if self.offset <= 0.0 {
            let ms = self.offset_to_ms(self.offset);
            if ms > self.duration_ms {
                return None;
            }
            ms
        } else {
            0
        };

        if ms == self.current_ms {
            return None;
        }

        debug!("Waveform position {}ms", ms);
        self.current_ms = ms;
        Some(ms)
    }

    fn time_to(&mut self, to: f32, now_ms: u64) {
        self.animation = Some(Animation::Timing {
            from: self.offset,
            to,
            start_ms: now_ms,
            duration_ms: self.progress_interval_ms,
        });
    }

    fn spring_to(&mut self, to: f32, now_ms: u64) {
        if self.offset == to {
            self.animation = None;
            return;
        }
        self.animation = Some(Animation::Spring {
            to,
            velocity: 0.0,
            last_ms: now_ms,
            side: (self.offset - to).signum(),
            config: self.spring,
        });
    }
}
