use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::report::{ReportCollector, ReportSnapshot};
use crate::{CheckRecord, OperationRecord};

/// One line of the JSON lines output.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReportLine {
    Check {
        timestamp_ms: u128,
        name: String,
        passed: bool,
        vu: usize,
        informational: bool,
    },
    Operation {
        timestamp_ms: u128,
        operation_id: String,
        vu: Option<String>,
        duration_ms: f64,
        is_error: bool,
    },
}

/// Write every check and timing sample to disk as JSON lines, for consumption by the reporting
/// subsystem. One file is created per run, named `<scenario>-<run id>-<unix seconds>.jsonl`.
pub struct JsonLinesReportCollector {
    writer: Option<UnboundedSender<ReportLine>>,
    join_handle: JoinHandle<()>,
    flush_complete: Arc<AtomicBool>,
}

impl JsonLinesReportCollector {
    pub fn new(
        runtime: &Runtime,
        dir: PathBuf,
        scenario_name: &str,
        run_id: &str,
    ) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

        let path = dir.join(format!(
            "{}-{}-{}.jsonl",
            scenario_name,
            run_id,
            unix_millis(SystemTime::now()) / 1000
        ));
        let file = std::fs::File::options()
            .create_new(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to create report file {}", path.display()))?;
        log::info!("Writing report records to {}", path.display());

        let flush_complete = Arc::new(AtomicBool::new(false));
        let (writer, receiver) = tokio::sync::mpsc::unbounded_channel();
        let join_handle = runtime.spawn(write_task(
            File::from_std(file),
            receiver,
            flush_complete.clone(),
        ));

        Ok(Self {
            writer: Some(writer),
            join_handle,
            flush_complete,
        })
    }

    fn try_send(&self, line: ReportLine) {
        let Some(writer) = &self.writer else {
            log::info!("Dropping report record received after the report was finalized");
            return;
        };

        if let Err(e) = writer.send(line) {
            log::warn!("Failed to record report line, the write task has stopped: {}", e);
        }
    }
}

impl ReportCollector for JsonLinesReportCollector {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.try_send(ReportLine::Operation {
            timestamp_ms: unix_millis(operation_record.timestamp),
            operation_id: operation_record.operation_id.clone(),
            vu: operation_record.vu_id.clone(),
            duration_ms: operation_record
                .duration()
                .map(|d| d.as_secs_f64() * 1000.0)
                .unwrap_or_default(),
            is_error: operation_record.is_error(),
        });
    }

    fn add_check(&mut self, check: &CheckRecord) {
        self.try_send(ReportLine::Check {
            timestamp_ms: unix_millis(check.timestamp),
            name: check.name.clone(),
            passed: check.passed,
            vu: check.vu_index,
            informational: check.informational,
        });
    }

    fn finalize(&mut self, _snapshot: &ReportSnapshot) {
        // Closing the channel lets the write task drain what is queued and exit.
        self.writer.take();

        let wait_started = Instant::now();
        let mut notify_timer = Instant::now();
        while !self.flush_complete.load(Ordering::Acquire) {
            if notify_timer.elapsed().as_secs() > 10 {
                log::warn!(
                    "Still waiting for report records to flush after {} seconds.",
                    wait_started.elapsed().as_secs()
                );
                notify_timer = Instant::now();
            }

            if self.join_handle.is_finished() {
                break;
            }

            std::thread::sleep(Duration::from_millis(50));
        }

        log::debug!(
            "Report records flushed after {} ms",
            wait_started.elapsed().as_millis()
        );
    }
}

async fn write_task(
    file: File,
    mut receiver: UnboundedReceiver<ReportLine>,
    flush_complete: Arc<AtomicBool>,
) {
    let mut file = BufWriter::new(file);
    let mut written = 0usize;

    while let Some(line) = receiver.recv().await {
        if let Err(e) = write_line(&mut file, &line).await {
            log::warn!("Failed to write report line: {:?}", e);
        }
        written += 1;
    }

    if let Err(e) = file.flush().await {
        log::warn!("Failed to flush report file: {}", e);
    }

    log::debug!("Wrote {} report lines", written);
    flush_complete.store(true, Ordering::Release);
}

async fn write_line(file: &mut BufWriter<File>, line: &ReportLine) -> anyhow::Result<()> {
    let mut encoded = serde_json::to_vec(line)?;
    encoded.push(b'\n');
    file.write_all(&encoded).await?;
    Ok(())
}

fn unix_millis(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_flushed_on_finalize() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let mut collector =
            JsonLinesReportCollector::new(&runtime, dir.path().to_path_buf(), "ad_load", "abc")
                .unwrap();
        collector.add_check(&CheckRecord::new("bind success", true, 3));
        collector.add_check(&CheckRecord::new("bind success", false, 4));
        collector.finalize(&ReportSnapshot::default());

        let file = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let content = std::fs::read_to_string(file).unwrap();
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(2, lines.len());

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!("check", first["type"]);
        assert_eq!(3, first["vu"]);
        assert_eq!(true, first["passed"]);
    }
}
