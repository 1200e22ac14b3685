//! # Tone Synthesis Module
//!
//! Plays reference tones so a string can be tuned by ear. One shared CPAL
//! output stream is built lazily on first use; every `play` call adds an
//! independent voice (oscillator + gain envelope) to the mix, so rapid
//! repeated presses overlap instead of cutting each other off.
//!
//! ## Features
//! - Sine, square, triangle, and sawtooth oscillators
//! - Fixed 2-second tones with a linear fade-out so notes do not click off
//! - Lazily constructed, explicitly closeable output stream
//! - Automatic stream rebuild after an output fault

use crate::catalog::Timbre;
use crate::error::TunerError;
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Total tone length in seconds.
pub const TONE_DURATION_SECS: f32 = 2.0;
/// Time at which the fade to silence begins.
pub const TONE_FADE_START_SECS: f32 = 1.5;
/// Peak voice gain.
pub const TONE_GAIN: f32 = 0.2;

/// One playing tone: a phase-accumulator oscillator with a gain envelope.
///
/// Voices are single-use; each `play` call constructs a fresh one and the
/// output callback drops it once it has run its full duration.
#[derive(Debug)]
struct Voice {
    timbre: Timbre,
    phase: f32,
    phase_increment: f32,
    position: u32,
    fade_start: u32,
    duration: u32,
}

impl Voice {
    fn new(frequency: f32, timbre: Timbre, sample_rate: u32) -> Voice {
        Voice {
            timbre,
            phase: 0.0,
            phase_increment: frequency / sample_rate as f32,
            position: 0,
            fade_start: (TONE_FADE_START_SECS * sample_rate as f32) as u32,
            duration: (TONE_DURATION_SECS * sample_rate as f32) as u32,
        }
    }

    /// Produces the next output sample and advances the oscillator.
    fn next_sample(&mut self) -> f32 {
        if self.is_finished() {
            return 0.0;
        }
        let sample = waveform_sample(self.timbre, self.phase) * self.gain();
        self.phase += self.phase_increment;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }
        self.position += 1;
        sample
    }

    /// Envelope: full gain until the fade starts, then a linear ramp to
    /// zero at the stop time.
    fn gain(&self) -> f32 {
        if self.position < self.fade_start {
            TONE_GAIN
        } else {
            let fade_len = (self.duration - self.fade_start) as f32;
            let into_fade = (self.position - self.fade_start) as f32;
            TONE_GAIN * (1.0 - into_fade / fade_len).max(0.0)
        }
    }

    fn is_finished(&self) -> bool {
        self.position >= self.duration
    }
}

/// Evaluates one oscillator cycle at `phase` in `[0, 1)`.
fn waveform_sample(timbre: Timbre, phase: f32) -> f32 {
    match timbre {
        Timbre::Sine => (2.0 * std::f32::consts::PI * phase).sin(),
        Timbre::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        Timbre::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        Timbre::Sawtooth => 2.0 * phase - 1.0,
    }
}

/// Shared tone playback handle.
///
/// Owns the output stream and the list of currently playing voices. The
/// stream is created on the first `play` and released by [`close`] (or
/// drop); a stream that faulted is torn down and rebuilt on the next
/// `play` rather than leaving playback dead for the rest of the run.
///
/// [`close`]: ToneSynth::close
pub struct ToneSynth {
    voices: Arc<Mutex<Vec<Voice>>>,
    stream_failed: Arc<AtomicBool>,
    stream: Option<(cpal::Stream, u32)>,
}

impl ToneSynth {
    /// Creates the handle without touching any audio device yet.
    pub fn new() -> ToneSynth {
        ToneSynth {
            voices: Arc::new(Mutex::new(Vec::new())),
            stream_failed: Arc::new(AtomicBool::new(false)),
            stream: None,
        }
    }

    /// Starts a tone at `frequency` with the given oscillator shape.
    ///
    /// Tones from concurrent calls mix additively. Non-positive or
    /// non-finite frequencies are ignored with a warning.
    pub fn play(&mut self, frequency: f32, timbre: Timbre) -> Result<(), TunerError> {
        if !frequency.is_finite() || frequency <= 0.0 {
            log::warn!("ignoring tone request at {frequency} Hz");
            return Ok(());
        }

        if self.stream_failed.swap(false, Ordering::SeqCst) {
            log::warn!("output stream faulted earlier, rebuilding");
            self.stream = None;
        }
        if self.stream.is_none() {
            self.stream = Some(self.build_stream()?);
        }
        let sample_rate = self
            .stream
            .as_ref()
            .map(|(_, rate)| *rate)
            .unwrap_or(44_100);

        if let Ok(mut voices) = self.voices.lock() {
            voices.push(Voice::new(frequency, timbre, sample_rate));
        }
        Ok(())
    }

    /// Releases the output stream and silences all voices. Idempotent.
    pub fn close(&mut self) {
        self.stream = None;
        if let Ok(mut voices) = self.voices.lock() {
            voices.clear();
        }
    }

    fn build_stream(&self) -> Result<(cpal::Stream, u32), TunerError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            TunerError::OutputUnavailable("no output device available".to_string())
        })?;

        let device_name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
        log::info!("using audio output device: {device_name}");

        let configs = device
            .supported_output_configs()
            .map_err(|e| TunerError::OutputUnavailable(e.to_string()))?
            .collect::<Vec<_>>();
        let supported_config = find_output_config(configs, 44_100).ok_or_else(|| {
            TunerError::OutputUnavailable("no suitable f32 output format found".to_string())
        })?;

        let sample_rate = 44_100.clamp(
            supported_config.min_sample_rate().0,
            supported_config.max_sample_rate().0,
        );
        let config = supported_config.with_sample_rate(cpal::SampleRate(sample_rate));

        let sample_rate_val = config.sample_rate().0;
        let channels = config.channels() as usize;
        let config: cpal::StreamConfig = config.into();

        let failed = Arc::clone(&self.stream_failed);
        let err_fn = move |err: cpal::StreamError| {
            log::error!("audio output stream failed: {err}");
            failed.store(true, Ordering::SeqCst);
        };

        let voices = Arc::clone(&self.voices);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut voices) = voices.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    for frame in data.chunks_mut(channels) {
                        let mixed: f32 = voices.iter_mut().map(Voice::next_sample).sum();
                        for slot in frame {
                            *slot = mixed;
                        }
                    }
                    voices.retain(|voice| !voice.is_finished());
                },
                err_fn,
                None,
            )
            .map_err(|e| TunerError::OutputUnavailable(e.to_string()))?;

        stream
            .play()
            .map_err(|e| TunerError::OutputUnavailable(e.to_string()))?;

        Ok((stream, sample_rate_val))
    }
}

impl Default for ToneSynth {
    fn default() -> Self {
        Self::new()
    }
}

/// Finds an f32 output configuration with a rate range nearest the target.
fn find_output_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i32 - target_rate as i32).abs();
            let max_diff = (c.max_sample_rate().0 as i32 - target_rate as i32).abs();
            min_diff.min(max_diff)
        })
}

#[cfg(test)]
mod test_synth {
    use super::*;
    use rustfft::FftPlanner;
    use rustfft::num_complex::Complex;

    const SAMPLE_RATE: u32 = 48_000;

    fn render(voice: &mut Voice, samples: usize) -> Vec<f32> {
        (0..samples).map(|_| voice.next_sample()).collect()
    }

    #[test]
    fn gain_holds_until_fade_then_ramps_to_zero() {
        let voice = |position_secs: f32| {
            let mut v = Voice::new(440.0, Timbre::Sine, SAMPLE_RATE);
            v.position = (position_secs * SAMPLE_RATE as f32) as u32;
            v
        };

        assert_eq!(voice(0.0).gain(), TONE_GAIN);
        assert_eq!(voice(1.49).gain(), TONE_GAIN);
        // Midway through the fade the gain is half of peak.
        assert!((voice(1.75).gain() - TONE_GAIN / 2.0).abs() < 1e-3);
        assert!(voice(1.999).gain() < 0.002);
    }

    #[test]
    fn voice_stops_exactly_at_duration() {
        let mut voice = Voice::new(440.0, Timbre::Triangle, SAMPLE_RATE);
        let total = (TONE_DURATION_SECS * SAMPLE_RATE as f32) as usize;
        let rendered = render(&mut voice, total + 100);
        assert!(voice.is_finished());
        // Everything past the stop time is silence.
        assert!(rendered[total..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn waveforms_stay_within_unit_amplitude() {
        for timbre in [Timbre::Sine, Timbre::Square, Timbre::Triangle, Timbre::Sawtooth] {
            for step in 0..100 {
                let sample = waveform_sample(timbre, step as f32 / 100.0);
                assert!((-1.0..=1.0).contains(&sample), "{timbre:?} out of range");
            }
        }
    }

    #[test]
    fn triangle_wave_spans_full_range() {
        assert_eq!(waveform_sample(Timbre::Triangle, 0.0), -1.0);
        assert_eq!(waveform_sample(Timbre::Triangle, 0.5), 1.0);
        assert_eq!(waveform_sample(Timbre::Triangle, 0.25), 0.0);
    }

    #[test]
    fn rendered_sine_peaks_at_requested_frequency() {
        const FFT_SIZE: usize = 8192;
        let mut voice = Voice::new(440.0, Timbre::Sine, SAMPLE_RATE);
        let rendered = render(&mut voice, FFT_SIZE);

        let mut buffer: Vec<Complex<f32>> = rendered
            .into_iter()
            .map(|sample| Complex { re: sample, im: 0.0 })
            .collect();
        let mut planner = FftPlanner::new();
        planner.plan_fft_forward(FFT_SIZE).process(&mut buffer);

        let peak_bin = buffer[..FFT_SIZE / 2]
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.norm().partial_cmp(&b.1.norm()).unwrap())
            .map(|(bin, _)| bin)
            .unwrap();
        let peak_freq = peak_bin as f32 * SAMPLE_RATE as f32 / FFT_SIZE as f32;
        let bin_width = SAMPLE_RATE as f32 / FFT_SIZE as f32;
        assert!(
            (peak_freq - 440.0).abs() <= bin_width,
            "spectral peak at {peak_freq} Hz"
        );
    }

    #[test]
    fn overlapping_voices_mix_independently() {
        let mut first = Voice::new(440.0, Timbre::Sine, SAMPLE_RATE);
        let mut second = Voice::new(330.0, Timbre::Sine, SAMPLE_RATE);
        // Start the second voice later; both keep their own envelopes.
        let _ = render(&mut first, 1000);
        let mixed: Vec<f32> = (0..1000)
            .map(|_| first.next_sample() + second.next_sample())
            .collect();
        assert!(mixed.iter().any(|&s| s.abs() > 0.0));
        assert!(first.position > second.position);
    }
}
