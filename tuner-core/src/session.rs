//! # Acquisition Loop Module
//!
//! Owns one microphone capture session and drives the analysis pipeline on
//! a fixed cadence: latest analysis window → pitch estimate → confidence
//! gate → smoothing → tuning decision → published reading.
//!
//! ## Architecture
//! - **Worker thread**: builds and owns the CPAL input stream (stream
//!   handles must stay on the thread that created them) and multiplexes
//!   capture windows, the cadence ticker, stream faults, and shutdown with
//!   `crossbeam_channel::select!`.
//! - **Startup handshake**: the worker reports the capture-start outcome
//!   through a bounded channel so permission and device failures surface
//!   synchronously from [`AcquisitionSession::start`].
//! - **Publishing**: accepted readings are cloned onto an unbounded channel;
//!   consumers only ever see snapshots.
//!
//! Analysis cycles are serialized by construction (one thread, one ticker)
//! and each cycle body is panic-isolated so a failing cycle skips its
//! publish instead of killing the loop.

use crate::TuningReading;
use crate::audio;
use crate::decision::{self, TuningTarget};
use crate::error::TunerError;
use crate::pitch::{PitchEstimate, PitchEstimator};
use crate::smoothing::FrequencySmoother;
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, Sender, bounded, select, tick, unbounded};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Milliseconds between analysis cycles.
///
/// A fixed timer cadence keeps sampling independent of any rendering or
/// event-loop pacing; 75 ms trades a little latency for stable readings.
pub const ANALYSIS_INTERVAL_MS: u64 = 75;

/// Minimum estimator confidence for a sample to enter the pipeline.
pub const CONFIDENCE_THRESHOLD: f32 = 0.9;

/// Lifecycle of an acquisition session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No microphone access yet.
    Idle,
    /// Stream request in flight.
    Requesting,
    /// Capturing and publishing readings.
    Active,
    /// Torn down; the stream and timer are released.
    Closed,
}

/// One open microphone capture driving the analysis pipeline.
///
/// At most one session should be active per tuner; starting a replacement
/// session requires closing (or dropping) the previous one first so its
/// input stream is released. Teardown is idempotent and also runs on drop.
pub struct AcquisitionSession {
    state: Arc<Mutex<SessionState>>,
    fault: Arc<Mutex<Option<TunerError>>>,
    shutdown_tx: Sender<()>,
    worker: Option<JoinHandle<()>>,
}

impl AcquisitionSession {
    /// Requests microphone access and starts the analysis loop.
    ///
    /// Blocks until the capture stream is up (or refused) and returns the
    /// session handle together with the reading subscription. Permission
    /// and device failures are returned as errors and are never retried
    /// internally; the caller decides when to try again.
    pub fn start(target: TuningTarget) -> Result<(AcquisitionSession, Receiver<TuningReading>), TunerError> {
        let (readings_tx, readings_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let (startup_tx, startup_rx) = bounded(1);

        let state = Arc::new(Mutex::new(SessionState::Requesting));
        let fault = Arc::new(Mutex::new(None));

        let worker_state = Arc::clone(&state);
        let worker_fault = Arc::clone(&fault);
        let worker = std::thread::spawn(move || {
            run_worker(target, startup_tx, shutdown_rx, readings_tx, worker_state, worker_fault);
        });

        let mut session = AcquisitionSession {
            state,
            fault,
            shutdown_tx,
            worker: Some(worker),
        };

        match startup_rx.recv() {
            Ok(Ok(sample_rate)) => {
                log::info!("acquisition session active at {sample_rate} Hz");
                Ok((session, readings_rx))
            }
            Ok(Err(e)) => {
                session.close();
                Err(e)
            }
            // The worker died before reporting; treat it like a device failure.
            Err(_) => {
                session.close();
                Err(TunerError::DeviceUnavailable(
                    "capture worker exited during startup".to_string(),
                ))
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
            .lock()
            .map(|guard| *guard)
            .unwrap_or(SessionState::Closed)
    }

    /// The fault that stopped the session mid-capture, if any.
    ///
    /// The last published reading is left standing on a fault; consumers
    /// observe the reading channel disconnecting and can ask here why.
    pub fn fault(&self) -> Option<TunerError> {
        self.fault
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or(None)
    }

    /// Tears the session down: stops the cadence timer and releases the
    /// input stream. Safe to call more than once; later calls are no-ops.
    pub fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            // The worker may already be gone (fault path); a dead channel
            // is fine, the join below still reaps it.
            let _ = self.shutdown_tx.try_send(());
            if worker.join().is_err() {
                log::error!("acquisition worker panicked during shutdown");
            }
            if let Ok(mut state) = self.state.lock() {
                *state = SessionState::Closed;
            }
        }
    }
}

impl Drop for AcquisitionSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker(
    target: TuningTarget,
    startup_tx: Sender<Result<u32, TunerError>>,
    shutdown_rx: Receiver<()>,
    readings_tx: Sender<TuningReading>,
    state: Arc<Mutex<SessionState>>,
    fault: Arc<Mutex<Option<TunerError>>>,
) {
    let (window_tx, window_rx) = unbounded::<Vec<f32>>();
    let (fault_tx, fault_rx) = unbounded::<TunerError>();

    let (stream, sample_rate) = match audio::start_capture(window_tx, fault_tx) {
        Ok(capture) => capture,
        Err(e) => {
            let _ = startup_tx.send(Err(e));
            return;
        }
    };
    if let Ok(mut state) = state.lock() {
        *state = SessionState::Active;
    }
    let _ = startup_tx.send(Ok(sample_rate));

    let mut pipeline = AnalysisPipeline::new(sample_rate, target);
    let ticker = tick(Duration::from_millis(ANALYSIS_INTERVAL_MS));
    let mut latest_window: Option<Vec<f32>> = None;

    loop {
        select! {
            recv(window_rx) -> window => {
                if let Ok(window) = window {
                    latest_window = Some(window);
                }
            }
            recv(ticker) -> _ => {
                let Some(window) = latest_window.take() else { continue };
                // A panicking cycle must not cross the tick boundary; it
                // costs one publish and the loop keeps running.
                match catch_unwind(AssertUnwindSafe(|| pipeline.process_window(&window))) {
                    Ok(Some(reading)) => {
                        if readings_tx.send(reading).is_err() {
                            log::info!("reading receiver dropped, stopping acquisition");
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(_) => log::error!("analysis cycle panicked, skipping this publish"),
                }
            }
            recv(fault_rx) -> stream_fault => {
                if let Ok(stream_fault) = stream_fault {
                    log::error!("capture stream fault: {stream_fault}");
                    if let Ok(mut slot) = fault.lock() {
                        *slot = Some(stream_fault);
                    }
                }
                break;
            }
            recv(shutdown_rx) -> _ => {
                log::info!("acquisition shutdown requested");
                break;
            }
        }
    }

    // The select loop is done, so no further ticks can run; only now is
    // the stream released.
    if let Err(e) = stream.pause() {
        log::warn!("error pausing capture stream: {e}");
    }
    drop(stream);
    if let Ok(mut state) = state.lock() {
        *state = SessionState::Closed;
    }
    log::info!("acquisition session closed");
}

/// The per-tick analysis chain: estimate → gate → smooth → decide.
///
/// Kept separate from the worker loop so the gating and publishing rules
/// can be exercised without a live input stream.
struct AnalysisPipeline {
    estimator: PitchEstimator,
    smoother: FrequencySmoother,
    target: TuningTarget,
    sample_rate: u32,
    last_reading: Option<TuningReading>,
}

impl AnalysisPipeline {
    fn new(sample_rate: u32, target: TuningTarget) -> AnalysisPipeline {
        AnalysisPipeline {
            estimator: PitchEstimator::new(audio::WINDOW_SIZE),
            smoother: FrequencySmoother::new(),
            target,
            sample_rate,
            last_reading: None,
        }
    }

    fn process_window(&mut self, window: &[f32]) -> Option<TuningReading> {
        let estimate = self.estimator.estimate(window, self.sample_rate);
        self.apply_estimate(estimate)
    }

    /// Applies the confidence gate and, for accepted estimates, produces
    /// the next reading. Rejected estimates change nothing: the smoothing
    /// window keeps its contents and the previous reading stands.
    fn apply_estimate(&mut self, estimate: PitchEstimate) -> Option<TuningReading> {
        if estimate.confidence <= CONFIDENCE_THRESHOLD || estimate.frequency <= 0.0 {
            log::debug!(
                "sample rejected: {} Hz at confidence {}",
                estimate.frequency,
                estimate.confidence
            );
            return None;
        }

        let smoothed = self.smoother.accept(estimate.frequency);
        let reading = decision::decide(smoothed, &self.target);
        self.last_reading = Some(reading.clone());
        Some(reading)
    }
}
