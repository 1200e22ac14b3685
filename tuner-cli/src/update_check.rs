//! # Update Check
//!
//! Polls a version-marker endpoint every 30 seconds and raises a single
//! "update available" notification when the build id changes from the
//! first one seen. Strictly best-effort: fetch and parse failures are
//! logged and the next poll tries again. The tuning pipeline has no
//! dependency on this module.

use crossbeam_channel::{Receiver, Sender, bounded, select, tick, unbounded};
use serde::Deserialize;
use std::thread::JoinHandle;
use std::time::Duration;

/// Seconds between version polls.
pub const CHECK_INTERVAL_SECS: u64 = 30;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The marker document served by the update endpoint.
#[derive(Debug, Deserialize)]
struct VersionMarker {
    #[serde(rename = "buildId")]
    build_id: String,
}

/// Raised once when the served build id departs from the baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAvailable {
    pub build_id: String,
}

#[derive(Debug, Default)]
struct CheckState {
    baseline: Option<String>,
    notified: bool,
}

/// Decides whether a fetched build id warrants a notification.
///
/// The first successful fetch only establishes the baseline. Later
/// fetches that differ raise the notification once; everything after the
/// latch is silent.
fn evaluate(state: &mut CheckState, fetched: String) -> Option<UpdateAvailable> {
    match &state.baseline {
        None => {
            state.baseline = Some(fetched);
            None
        }
        Some(baseline) if *baseline != fetched && !state.notified => {
            state.notified = true;
            Some(UpdateAvailable { build_id: fetched })
        }
        _ => None,
    }
}

/// Handle to the background poller. Stopping is idempotent and also runs
/// on drop.
pub struct UpdateChecker {
    shutdown_tx: Sender<()>,
    worker: Option<JoinHandle<()>>,
}

impl UpdateChecker {
    /// Spawns the poll thread against `url` and returns the notification
    /// subscription.
    pub fn spawn(url: String) -> (UpdateChecker, Receiver<UpdateAvailable>) {
        let (events_tx, events_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let worker = std::thread::spawn(move || {
            let client = match reqwest::blocking::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
            {
                Ok(client) => client,
                Err(e) => {
                    log::warn!("update checks disabled: {e}");
                    return;
                }
            };

            let mut state = CheckState::default();
            let ticker = tick(Duration::from_secs(CHECK_INTERVAL_SECS));

            poll(&client, &url, &mut state, &events_tx);
            loop {
                select! {
                    recv(ticker) -> _ => poll(&client, &url, &mut state, &events_tx),
                    recv(shutdown_rx) -> _ => break,
                }
            }
        });

        (
            UpdateChecker {
                shutdown_tx,
                worker: Some(worker),
            },
            events_rx,
        )
    }

    /// Stops the poll thread. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.shutdown_tx.try_send(());
            if worker.join().is_err() {
                log::error!("update-check worker panicked during shutdown");
            }
        }
    }
}

impl Drop for UpdateChecker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll(
    client: &reqwest::blocking::Client,
    url: &str,
    state: &mut CheckState,
    events: &Sender<UpdateAvailable>,
) {
    match fetch(client, url) {
        Ok(build_id) => {
            if let Some(update) = evaluate(state, build_id) {
                log::info!("update available: build {}", update.build_id);
                let _ = events.send(update);
            }
        }
        Err(e) => log::warn!("version check against {url} failed: {e}"),
    }
}

fn fetch(client: &reqwest::blocking::Client, url: &str) -> Result<String, reqwest::Error> {
    let marker: VersionMarker = client.get(url).send()?.error_for_status()?.json()?;
    Ok(marker.build_id)
}

#[cfg(test)]
mod test_update_check {
    use super::*;

    #[test]
    fn first_fetch_sets_the_baseline_silently() {
        let mut state = CheckState::default();
        assert_eq!(evaluate(&mut state, "build-1".to_string()), None);
        assert_eq!(state.baseline.as_deref(), Some("build-1"));
    }

    #[test]
    fn unchanged_marker_never_notifies() {
        let mut state = CheckState::default();
        evaluate(&mut state, "build-1".to_string());
        for _ in 0..5 {
            assert_eq!(evaluate(&mut state, "build-1".to_string()), None);
        }
    }

    #[test]
    fn changed_marker_notifies_exactly_once() {
        let mut state = CheckState::default();
        evaluate(&mut state, "build-1".to_string());
        let first = evaluate(&mut state, "build-2".to_string());
        assert_eq!(
            first,
            Some(UpdateAvailable {
                build_id: "build-2".to_string()
            })
        );
        // Later polls, even with further changes, stay quiet.
        assert_eq!(evaluate(&mut state, "build-2".to_string()), None);
        assert_eq!(evaluate(&mut state, "build-3".to_string()), None);
    }

    #[test]
    fn marker_json_uses_the_camel_case_key() {
        let marker: VersionMarker = serde_json::from_str(r#"{"buildId":"abc123"}"#).unwrap();
        assert_eq!(marker.build_id, "abc123");
    }

    #[test]
    fn stop_is_idempotent() {
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let worker = std::thread::spawn(move || {
            let _ = shutdown_rx.recv();
        });
        let mut checker = UpdateChecker {
            shutdown_tx,
            worker: Some(worker),
        };
        checker.stop();
        checker.stop();
    }
}
