//! Background job polling
//!
//! Watches a remote job instance with a timer-driven poll loop: one
//! outstanding status fetch at a time, a fixed interval between ticks,
//! and a hard timeout measured from loop start. Any terminal status
//! ends the loop; a transport error ends it without retry.

use crate::models::JobStatus;
use crate::services::esploro_client::EsploroClient;
use efl_common::events::{EventBus, LoaderEvent};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Why the poll loop stopped
#[derive(Debug, Clone)]
pub enum MonitorOutcome {
    /// The job reached a terminal status
    Finished(crate::models::JobInstanceStatus),
    /// No terminal status before the timeout elapsed
    TimedOut { last_status: Option<JobStatus> },
    /// A status fetch failed; polling is not resumed
    Failed(String),
    /// The run was cancelled while waiting
    Cancelled,
}

pub struct JobMonitor {
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl Default for JobMonitor {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl JobMonitor {
    pub fn new(poll_interval: Duration, poll_timeout: Duration) -> Self {
        Self {
            poll_interval,
            poll_timeout,
        }
    }

    /// Polls the job instance until it finishes, fails, times out, or
    /// the run is cancelled.
    ///
    /// Each observed status is broadcast as a [`LoaderEvent::JobProgress`]
    /// so subscribers can surface live job progress.
    pub async fn watch(
        &self,
        client: &EsploroClient,
        run_id: Uuid,
        job_id: &str,
        instance_id: &str,
        event_bus: &EventBus,
        cancel: &CancellationToken,
    ) -> MonitorOutcome {
        let deadline = tokio::time::Instant::now() + self.poll_timeout;
        let mut last_status: Option<JobStatus> = None;

        loop {
            let tick = tokio::select! {
                biased;
                _ = cancel.cancelled() => return MonitorOutcome::Cancelled,
                result = client.fetch_job_instance(job_id, instance_id) => result,
            };

            match tick {
                Ok(instance) => {
                    event_bus.emit_lossy(LoaderEvent::JobProgress {
                        run_id,
                        job_id: job_id.to_string(),
                        instance_id: instance_id.to_string(),
                        progress: instance.progress.unwrap_or(0),
                        status: instance.status.to_string(),
                        timestamp: chrono::Utc::now(),
                    });

                    if instance.status.is_terminal() {
                        info!(
                            "Job {} instance {} finished with status {}",
                            job_id, instance_id, instance.status
                        );
                        return MonitorOutcome::Finished(instance);
                    }
                    last_status = Some(instance.status);
                }
                Err(e) => {
                    warn!(
                        "Status fetch for job {} instance {} failed: {}",
                        job_id, instance_id, e
                    );
                    return MonitorOutcome::Failed(e.to_string());
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return MonitorOutcome::Cancelled,
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(
                        "Job {} instance {} still not terminal after {:?}",
                        job_id, instance_id, self.poll_timeout
                    );
                    return MonitorOutcome::TimedOut { last_status };
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
