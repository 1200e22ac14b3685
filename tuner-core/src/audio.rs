//! # Audio Capture Module
//!
//! Real-time microphone capture via CPAL. Selects a mono f32 input
//! configuration close to 44.1 kHz, builds the input stream, and slices the
//! callback data into fixed-size analysis windows for the acquisition
//! loop.
//!
//! ## Features
//! - Automatic input device and configuration selection
//! - Fixed-size analysis windows delivered over a channel
//! - Stream errors forwarded to the owning session instead of swallowed

use crate::error::TunerError;
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

/// Number of samples per analysis window.
///
/// Larger windows give the estimator more frequency resolution but add
/// latency; 2048 samples is ~46 ms at 44.1 kHz.
pub const WINDOW_SIZE: usize = 2048;

/// Starts audio capture from the default input device.
///
/// Accumulates callback data until a full [`WINDOW_SIZE`] window is
/// available, then sends it on `windows` (dropping windows when the
/// receiver lags rather than blocking the audio callback). Stream errors
/// after startup are classified and sent on `faults`.
///
/// # Returns
/// * `Ok((stream, sample_rate))` - the live stream handle and its rate
/// * `Err(e)` - permission or device failure; nothing was started
pub fn start_capture(
    windows: Sender<Vec<f32>>,
    faults: Sender<TunerError>,
) -> Result<(cpal::Stream, u32), TunerError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| TunerError::DeviceUnavailable("no input device available".to_string()))?;

    let device_name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
    log::info!("using audio input device: {device_name}");

    let configs = device
        .supported_input_configs()
        .map_err(|e| TunerError::from_input_backend("querying input configs", e.to_string()))?
        .collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, 44_100).ok_or_else(|| {
        TunerError::DeviceUnavailable("no suitable mono f32 input format found".to_string())
    })?;

    let sample_rate = 44_100.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(sample_rate));

    let sample_rate_val = config.sample_rate().0;
    let config: cpal::StreamConfig = config.into();

    log::info!("selected input sample rate: {sample_rate_val} Hz");

    let err_fn = move |err: cpal::StreamError| {
        let fault = TunerError::from_input_backend("input stream", err.to_string());
        log::error!("audio input stream failed: {fault}");
        let _ = faults.try_send(fault);
    };

    // Accumulates callback data until a full analysis window is available.
    let mut window_buffer = Vec::with_capacity(WINDOW_SIZE * 2);

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                window_buffer.extend_from_slice(data);

                while window_buffer.len() >= WINDOW_SIZE {
                    let window = window_buffer[..WINDOW_SIZE].to_vec();

                    // A full receiver means the analysis side is behind;
                    // dropping the window here keeps the callback real-time.
                    let _ = windows.try_send(window);

                    window_buffer.drain(..WINDOW_SIZE);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| TunerError::from_input_backend("building input stream", e.to_string()))?;

    stream
        .play()
        .map_err(|e| TunerError::from_input_backend("starting input stream", e.to_string()))?;

    Ok((stream, sample_rate_val))
}

/// Finds the best supported input configuration for the target rate:
/// mono, f32, with a sample-rate range closest to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i32 - target_rate as i32).abs();
            let max_diff = (c.max_sample_rate().0 as i32 - target_rate as i32).abs();
            min_diff.min(max_diff)
        })
}
