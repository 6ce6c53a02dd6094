//! Waveform history for the PPG plot
//!
//! Samples arrive on the Bluetooth worker thread while the GUI thread reads
//! them for drawing, so every operation takes the same lock.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Samples kept for display (3 seconds at 100 Hz)
pub const CAPACITY: usize = 300;
/// Trailing window used for auto-scaling
pub const SCALE_WINDOW: usize = 100;
/// The range is only recomputed once more than this many samples are held
pub const MIN_SAMPLES_FOR_SCALE: usize = 50;
/// Ranges narrower than this are treated as a flat signal
pub const FLATNESS_THRESHOLD: f32 = 1000.0;
/// Range substituted for a flat signal
pub const FLAT_SIGNAL_RANGE: f32 = 5000.0;
/// Fraction of the half-height a normalized value of 1.0 reaches
pub const VERTICAL_FILL: f32 = 0.4;

pub const DEFAULT_AMPLIFICATION: f32 = 2.0;
pub const MIN_AMPLIFICATION: f32 = 0.5;
pub const MAX_AMPLIFICATION: f32 = 10.0;

/// One rendered frame of the waveform in surface coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformFrame {
    /// Polyline vertices, oldest sample first
    pub points: Vec<(f32, f32)>,
    /// `max - min` of the scale window, `None` before a range exists
    pub range: Option<f32>,
    /// Range actually used for normalisation
    pub effective_range: f32,
    pub amplification: f32,
}

#[derive(Debug)]
struct WaveformState {
    samples: VecDeque<f32>,
    min_value: f32,
    max_value: f32,
    amplification: f32,
}

impl WaveformState {
    fn new(amplification: f32) -> Self {
        Self {
            samples: VecDeque::with_capacity(CAPACITY + 1),
            min_value: f32::INFINITY,
            max_value: f32::NEG_INFINITY,
            amplification,
        }
    }

    fn has_range(&self) -> bool {
        self.min_value <= self.max_value
    }

    fn rescale(&mut self) {
        let window = self.samples.len().min(SCALE_WINDOW);
        let recent = self.samples.iter().skip(self.samples.len() - window);
        let (min, max) = recent.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
        self.min_value = min;
        self.max_value = max;
    }
}

/// Fixed-capacity, auto-scaling sample history
#[derive(Debug)]
pub struct WaveformBuffer {
    state: Mutex<WaveformState>,
}

impl WaveformBuffer {
    pub fn new() -> Self {
        Self::with_amplification(DEFAULT_AMPLIFICATION)
    }

    pub fn with_amplification(amplification: f32) -> Self {
        Self {
            state: Mutex::new(WaveformState::new(clamp_amplification(amplification))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WaveformState> {
        // A poisoned buffer holds at most CAPACITY + 1 samples; the next append trims it
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a sample, evicting the oldest one past capacity
    pub fn append(&self, value: f32) {
        let mut state = self.lock();
        state.samples.push_back(value);
        while state.samples.len() > CAPACITY {
            state.samples.pop_front();
        }

        if state.samples.len() > MIN_SAMPLES_FOR_SCALE {
            state.rescale();
        }
    }

    /// Drop all samples and forget the scale
    pub fn clear(&self) {
        let mut state = self.lock();
        state.samples.clear();
        state.min_value = f32::INFINITY;
        state.max_value = f32::NEG_INFINITY;
    }

    pub fn len(&self) -> usize {
        self.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().samples.is_empty()
    }

    /// Current `(min, max)` auto-scale range, if one has been computed
    pub fn scale(&self) -> Option<(f32, f32)> {
        let state = self.lock();
        state
            .has_range()
            .then_some((state.min_value, state.max_value))
    }

    pub fn snapshot(&self) -> Vec<f32> {
        self.lock().samples.iter().copied().collect()
    }

    pub fn amplification(&self) -> f32 {
        self.lock().amplification
    }

    /// Set the display gain, clamped into `[0.5, 10]`
    pub fn set_amplification(&self, factor: f32) {
        self.lock().amplification = clamp_amplification(factor);
    }

    /// Map the buffered samples onto a `width` x `height` surface.
    ///
    /// The horizontal step is always `width / CAPACITY`, so a partially filled
    /// buffer is drawn left-aligned. Fewer than two samples produce no points.
    pub fn render(&self, width: f32, height: f32) -> WaveformFrame {
        let state = self.lock();

        let range = state
            .has_range()
            .then(|| state.max_value - state.min_value);
        let effective_range = match range {
            Some(r) if r >= FLATNESS_THRESHOLD => r,
            _ => FLAT_SIGNAL_RANGE,
        };

        let mut frame = WaveformFrame {
            points: Vec::new(),
            range,
            effective_range,
            amplification: state.amplification,
        };

        if state.samples.len() < 2 {
            return frame;
        }

        let x_step = width / CAPACITY as f32;
        let center = (state.max_value + state.min_value) / 2.0;

        frame.points = state
            .samples
            .iter()
            .enumerate()
            .map(|(i, &sample)| {
                let y = if range.is_some() {
                    let normalized = (sample - center) / effective_range * state.amplification;
                    (height / 2.0 - normalized * height * VERTICAL_FILL).clamp(0.0, height)
                } else {
                    // No scale yet: pin to the bottom edge
                    height
                };
                (i as f32 * x_step, y)
            })
            .collect();

        frame
    }
}

impl Default for WaveformBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_amplification(factor: f32) -> f32 {
    if factor.is_nan() {
        return DEFAULT_AMPLIFICATION;
    }
    factor.clamp(MIN_AMPLIFICATION, MAX_AMPLIFICATION)
}
