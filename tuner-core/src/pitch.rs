//! # Pitch Estimation Module
//!
//! Wraps the external McLeod pitch detector behind a small, total
//! interface: every analysis window produces a frequency/confidence pair,
//! and silence, noise, or degenerate detector output collapses to the
//! silent estimate instead of an error.
//!
//! ## Features
//! - McLeod pitch method via the `pitch-detection` crate
//! - RMS amplitude gating to short-circuit silence
//! - Normalization of non-finite or non-positive detector output
//! - Confidence clamped to `[0, 1]`

use pitch_detection::detector::PitchDetector;
use pitch_detection::detector::mcleod::McLeodDetector;

/// Minimum RMS amplitude before the detector is consulted at all.
///
/// Below this the window is treated as silence; running the detector on
/// near-zero signals wastes time and yields meaningless candidates.
pub const AMPLITUDE_THRESHOLD: f32 = 0.01;

/// One pitch estimate for an analysis window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Estimated fundamental in Hz; 0.0 when nothing was detected.
    pub frequency: f32,
    /// Detector clarity in `[0, 1]`; ~0 for silence and noise.
    pub confidence: f32,
}

impl PitchEstimate {
    /// The estimate reported for silence or undetectable input.
    pub const SILENT: PitchEstimate = PitchEstimate {
        frequency: 0.0,
        confidence: 0.0,
    };
}

/// A reusable estimator sized for a fixed analysis window.
///
/// The wrapped detector keeps scratch buffers between calls, but the
/// result depends only on the window and sample rate passed in.
pub struct PitchEstimator {
    detector: McLeodDetector<f64>,
    scratch: Vec<f64>,
    window_len: usize,
}

impl PitchEstimator {
    /// Builds an estimator for windows of exactly `window_len` samples.
    pub fn new(window_len: usize) -> PitchEstimator {
        PitchEstimator {
            detector: McLeodDetector::new(window_len, window_len / 2),
            scratch: vec![0.0; window_len],
            window_len,
        }
    }

    /// Estimates the fundamental frequency of one analysis window.
    ///
    /// Returns [`PitchEstimate::SILENT`] for silent windows, windows of the
    /// wrong length, and anything the detector cannot resolve. Never
    /// panics on degenerate input.
    pub fn estimate(&mut self, window: &[f32], sample_rate: u32) -> PitchEstimate {
        if window.len() != self.window_len {
            log::warn!(
                "analysis window of {} samples does not match estimator size {}",
                window.len(),
                self.window_len
            );
            return PitchEstimate::SILENT;
        }

        // Noise gate: skip the detector entirely for silence.
        let rms = (window.iter().map(|&s| s * s).sum::<f32>() / window.len() as f32).sqrt();
        if rms < AMPLITUDE_THRESHOLD {
            return PitchEstimate::SILENT;
        }

        for (slot, &sample) in self.scratch.iter_mut().zip(window.iter()) {
            *slot = f64::from(sample);
        }

        match self
            .detector
            .get_pitch(&self.scratch, sample_rate as usize, 0.0, 0.0)
        {
            Some(pitch) => {
                let frequency = pitch.frequency as f32;
                let confidence = pitch.clarity as f32;
                if frequency.is_finite() && frequency > 0.0 && confidence.is_finite() {
                    PitchEstimate {
                        frequency,
                        confidence: confidence.clamp(0.0, 1.0),
                    }
                } else {
                    PitchEstimate::SILENT
                }
            }
            None => PitchEstimate::SILENT,
        }
    }
}

#[cfg(test)]
mod test_pitch_estimator {
    use super::*;

    const SAMPLE_RATE: u32 = 44_100;
    const WINDOW: usize = 2048;

    fn sine_window(frequency: f32, amplitude: f32) -> Vec<f32> {
        (0..WINDOW)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * frequency * i as f32 / SAMPLE_RATE as f32).sin()
            })
            .collect()
    }

    #[test]
    fn detects_a_clean_sine() {
        let mut estimator = PitchEstimator::new(WINDOW);
        let estimate = estimator.estimate(&sine_window(440.0, 0.5), SAMPLE_RATE);
        assert!(
            (estimate.frequency - 440.0).abs() < 1.0,
            "estimated {} Hz",
            estimate.frequency
        );
        assert!(estimate.confidence > 0.9, "confidence {}", estimate.confidence);
    }

    #[test]
    fn silence_reports_zero_without_panicking() {
        let mut estimator = PitchEstimator::new(WINDOW);
        let estimate = estimator.estimate(&vec![0.0; WINDOW], SAMPLE_RATE);
        assert_eq!(estimate, PitchEstimate::SILENT);
    }

    #[test]
    fn quiet_signal_is_gated_as_silence() {
        let mut estimator = PitchEstimator::new(WINDOW);
        let estimate = estimator.estimate(&sine_window(440.0, 0.001), SAMPLE_RATE);
        assert_eq!(estimate, PitchEstimate::SILENT);
    }

    #[test]
    fn wrong_window_length_is_silent() {
        let mut estimator = PitchEstimator::new(WINDOW);
        let estimate = estimator.estimate(&[0.5; 100], SAMPLE_RATE);
        assert_eq!(estimate, PitchEstimate::SILENT);
    }

    #[test]
    fn confidence_stays_within_unit_range() {
        let mut estimator = PitchEstimator::new(WINDOW);
        for frequency in [82.41, 196.0, 440.0, 659.25] {
            let estimate = estimator.estimate(&sine_window(frequency, 0.8), SAMPLE_RATE);
            assert!((0.0..=1.0).contains(&estimate.confidence));
        }
    }
}
