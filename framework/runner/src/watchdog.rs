use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dirstress_core::prelude::ShutdownHandle;
use dirstress_instruments::Reporter;

/// Samples required before an aborting threshold may stop the run.
pub(crate) const MIN_ABORT_SAMPLES: u64 = 20;

const CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Watches the aborting thresholds while the run is in progress and stops the run as soon as one
/// of them is crossed. The returned flag is set when that happened.
pub(crate) fn start_threshold_watchdog(
    reporter: Arc<Reporter>,
    shutdown_handle: ShutdownHandle,
) -> anyhow::Result<Arc<AtomicBool>> {
    let aborted = Arc::new(AtomicBool::new(false));

    if !reporter.thresholds().iter().any(|t| t.abort_on_fail()) {
        return Ok(aborted);
    }

    let shutdown_listener = shutdown_handle.new_listener();
    let flag = aborted.clone();
    std::thread::Builder::new()
        .name("threshold-watchdog".to_string())
        .spawn(move || {
            while !shutdown_listener.should_shutdown() {
                if let Some(outcome) = reporter.aborting_breach(MIN_ABORT_SAMPLES) {
                    log::warn!(
                        "Threshold {} crossed with observed value {:?}, stopping the run",
                        outcome.name,
                        outcome.observed
                    );
                    flag.store(true, Ordering::Release);
                    shutdown_handle.shutdown();
                    break;
                }

                std::thread::sleep(CHECK_INTERVAL);
            }
        })?;

    Ok(aborted)
}
