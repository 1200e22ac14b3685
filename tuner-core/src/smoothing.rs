//! # Frequency Smoothing Module
//!
//! Damps jitter in the pitch estimates by averaging a short rolling window
//! of accepted frequencies. Low-confidence estimates are filtered out
//! before they reach this module, so every value in the window is one the
//! pipeline trusted.

use std::collections::VecDeque;

/// Number of accepted frequencies averaged together.
pub const SMOOTHING_WINDOW: usize = 5;

/// Rolling mean over the most recent accepted frequency estimates.
///
/// Holds at most [`SMOOTHING_WINDOW`] entries; the oldest is evicted first
/// once the window is full. State belongs to a single acquisition session
/// and is discarded with it.
#[derive(Debug, Default)]
pub struct FrequencySmoother {
    history: VecDeque<f32>,
}

impl FrequencySmoother {
    pub fn new() -> FrequencySmoother {
        FrequencySmoother {
            history: VecDeque::with_capacity(SMOOTHING_WINDOW),
        }
    }

    /// Appends an accepted frequency and returns the mean of the window.
    pub fn accept(&mut self, frequency: f32) -> f32 {
        self.history.push_back(frequency);
        if self.history.len() > SMOOTHING_WINDOW {
            self.history.pop_front();
        }
        self.history.iter().sum::<f32>() / self.history.len() as f32
    }

    /// Clears the window. Used when a session restarts.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
mod test_frequency_smoother {
    use super::*;

    #[test]
    fn mean_of_partial_window() {
        let mut smoother = FrequencySmoother::new();
        assert_eq!(smoother.accept(80.0), 80.0);
        assert_eq!(smoother.accept(80.5), 80.25);
        assert_eq!(smoother.accept(81.0), 80.5);
        assert_eq!(smoother.len(), 3);
    }

    #[test]
    fn oldest_entry_is_evicted_first() {
        let mut smoother = FrequencySmoother::new();
        for freq in [1.0, 2.0, 3.0, 4.0, 5.0] {
            smoother.accept(freq);
        }
        // Window is now full; the next accept drops the 1.0.
        let mean = smoother.accept(6.0);
        assert_eq!(smoother.len(), SMOOTHING_WINDOW);
        assert!((mean - 4.0).abs() < 1e-6);
    }

    #[test]
    fn mean_tracks_last_five_in_arrival_order() {
        let mut smoother = FrequencySmoother::new();
        let samples: Vec<f32> = (1..=9).map(|v| v as f32 * 10.0).collect();
        let mut last_mean = 0.0;
        for &sample in &samples {
            last_mean = smoother.accept(sample);
        }
        let expected: f32 = samples[samples.len() - SMOOTHING_WINDOW..].iter().sum::<f32>() / SMOOTHING_WINDOW as f32;
        assert!((last_mean - expected).abs() < 1e-6);
    }

    #[test]
    fn reset_clears_history() {
        let mut smoother = FrequencySmoother::new();
        smoother.accept(440.0);
        smoother.reset();
        assert!(smoother.is_empty());
        // A fresh window starts over from the new value alone.
        assert_eq!(smoother.accept(100.0), 100.0);
    }
}
