use std::cmp::min;
use std::fmt::Write;
use std::time::{Duration, Instant};

use dirstress_core::prelude::DelegatedShutdownListener;
use indicatif::{ProgressBar, ProgressState, ProgressStyle};

const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Displays a progress bar while the test is running to show the user how long is left.
pub(crate) fn start_progress(
    planned_runtime: Duration,
    shutdown_listener: DelegatedShutdownListener,
) -> anyhow::Result<()> {
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {planned_runtime}]",
    )?
    .with_key("planned_runtime", {
        let hours = planned_runtime.as_secs() / 3600;
        let minutes = (planned_runtime.as_secs() % 3600) / 60;
        let seconds = planned_runtime.as_secs() % 60;
        move |_state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds);
        }
    })
    .progress_chars("#>-");

    std::thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            let start_time = Instant::now();
            let pb = ProgressBar::new(planned_runtime.as_secs());
            pb.set_style(style);

            loop {
                if shutdown_listener.should_shutdown() {
                    log::trace!("Progress thread shutting down");
                    pb.finish_and_clear();
                    break;
                }

                let new = min(start_time.elapsed().as_secs(), planned_runtime.as_secs());
                pb.set_position(new);
                std::thread::sleep(Duration::from_secs(1));
            }
        })?;

    Ok(())
}

/// Logs a "Test in progress" line every few seconds, for when the progress bar is disabled.
pub(crate) fn start_progress_ticks(
    planned_runtime: Option<Duration>,
    shutdown_listener: DelegatedShutdownListener,
) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name("progress-ticks".to_string())
        .spawn(move || {
            let start_time = Instant::now();
            let mut last_tick = Instant::now();

            while !shutdown_listener.should_shutdown() {
                if last_tick.elapsed() >= TICK_INTERVAL {
                    last_tick = Instant::now();
                    let elapsed = start_time.elapsed().as_secs();
                    match planned_runtime {
                        Some(planned) => log::info!(
                            "Test in progress... ({}s / {}s)",
                            elapsed,
                            planned.as_secs()
                        ),
                        None => log::info!("Test in progress... ({}s)", elapsed),
                    }
                }

                std::thread::sleep(Duration::from_millis(250));
            }
        })?;

    Ok(())
}
