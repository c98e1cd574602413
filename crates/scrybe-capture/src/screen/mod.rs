//! Screen Capturer (spec §4.5, component C5).
//!
//! Grabs the configured screen region(s) on an interval, drops frames that
//! are perceptually identical to the last one seen on that monitor, OCRs
//! what's left, and emits an `Observation` per changed frame.

mod capture;
mod hash;
mod ocr;

use std::collections::HashMap;
use std::time::Duration;

use scrybe_core::config::{CaptureConfig, ScreenMode};
use tokio_util::sync::CancellationToken;

use crate::active_window;
use crate::observation::{LossySender, Observation, ScreenPayload};

/// Consecutive grab/OCR errors tolerated before the loop backs off (spec
/// §4.5: "on five consecutive OCR or grab errors, double the sleep once,
/// then reset").
const ERROR_BACKOFF_THRESHOLD: u32 = 5;

/// Describes one detected monitor for `--list-monitors` (SPEC_FULL.md §12).
pub struct MonitorInfo {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub is_primary: bool,
}

/// Enumerate currently attached monitors, 1-indexed to match
/// `ScreenMode::Specific`'s `specific_monitors` indexing.
pub fn list_monitors() -> Vec<MonitorInfo> {
    capture::list_screens()
        .into_iter()
        .enumerate()
        .map(|(i, screen)| MonitorInfo {
            index: (i + 1) as u32,
            width: screen.display_info.width,
            height: screen.display_info.height,
            is_primary: screen.display_info.is_primary,
        })
        .collect()
}

pub struct ScreenDaemon {
    sender: LossySender,
    interval: Duration,
    mode: ScreenMode,
    specific_monitors: Vec<u32>,
    last_hashes: HashMap<u32, String>,
}

impl ScreenDaemon {
    pub fn new(sender: LossySender, config: &CaptureConfig) -> Self {
        Self {
            sender,
            interval: Duration::from_secs_f64(config.screen_interval.max(0.1)),
            mode: config.screen_mode,
            specific_monitors: config.specific_monitors.clone(),
            last_hashes: HashMap::new(),
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(interval = ?self.interval, mode = ?self.mode, "screen capturer starting");

        let mut consecutive_errors: u32 = 0;
        let mut sleep = self.interval;
        let mut backed_off = false;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("screen capturer stopping");
                    return;
                }
                _ = tokio::time::sleep(sleep) => {}
            }

            match self.capture_once() {
                Ok(_) => {
                    consecutive_errors = 0;
                    if backed_off {
                        sleep = self.interval;
                        backed_off = false;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "screen capture failed");
                    consecutive_errors += 1;
                    if consecutive_errors >= ERROR_BACKOFF_THRESHOLD && !backed_off {
                        sleep *= 2;
                        backed_off = true;
                        tracing::warn!(?sleep, "backing off after repeated capture errors");
                    }
                }
            }
        }
    }

    fn capture_once(&mut self) -> Result<(), CaptureError> {
        let frames = match self.mode {
            ScreenMode::Combined => capture::grab_combined().into_iter().collect(),
            ScreenMode::All => capture::grab_all(),
            ScreenMode::Specific => self
                .specific_monitors
                .iter()
                .filter_map(|&idx| capture::grab(idx))
                .collect(),
            ScreenMode::Primary => capture::grab_primary().into_iter().collect::<Vec<_>>(),
        };

        if frames.is_empty() {
            return Err(CaptureError::NoFrame);
        }

        for frame in frames {
            let digest = hash::perceptual_hash(&frame.image);
            let unchanged = self
                .last_hashes
                .get(&frame.monitor_index)
                .is_some_and(|prev| prev == &digest);
            if unchanged {
                continue;
            }
            self.last_hashes.insert(frame.monitor_index, digest.clone());

            let text = ocr::extract_text(&frame.image);
            let (window, app) = active_window::active_window();

            let payload = ScreenPayload {
                text,
                perceptual_hash: digest,
                window,
                app,
                width: frame.width,
                height: frame.height,
                monitor_index: frame.monitor_index,
            };

            self.sender
                .try_send_or_drop(Observation::screen(chrono::Utc::now(), payload));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
enum CaptureError {
    #[error("no screen frame available")]
    NoFrame,
}
