use std::time::Duration;

use dirstress_core::prelude::DelegatedShutdownListener;
use sysinfo::{
    CpuRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System,
    MINIMUM_CPU_UPDATE_INTERVAL,
};

/// Monitor the resource usage of the dirstress process and report high usage.
///
/// Note that this won't stop the test proceeding, it will just log a warning to let the user know
/// that the measured latencies might be affected by the load generator itself.
///
/// The CPU usage for the process is sampled every few seconds. If it is above 10% with respect to
/// the number of cores then a warning is logged.
pub(crate) fn start_monitor(shutdown_listener: DelegatedShutdownListener) -> anyhow::Result<()> {
    std::thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || {
            let this_process_pid = Pid::from_u32(std::process::id());
            let mut sys = System::new_with_specifics(
                RefreshKind::nothing().with_cpu(CpuRefreshKind::everything()),
            );
            let cpu_count = sys.cpus().len().max(1);
            let interval = MINIMUM_CPU_UPDATE_INTERVAL.max(Duration::from_secs(2));

            while !shutdown_listener.should_shutdown() {
                sys.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[this_process_pid]),
                    true,
                    ProcessRefreshKind::nothing().with_cpu(),
                );

                let Some(process) = sys.process(this_process_pid) else {
                    log::debug!("Process info unavailable, stopping the resource monitor");
                    break;
                };

                let usage = process.cpu_usage() / cpu_count as f32;
                if usage > 10.0 {
                    log::warn!(
                        "High CPU usage detected. dirstress is using {:.2}% of the CPU, with {} available cores",
                        usage,
                        cpu_count
                    );
                }

                std::thread::sleep(interval);
            }
        })?;

    Ok(())
}
