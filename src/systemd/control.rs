// Systemd service control operations

use crate::error::{Result, TunnelError};
use crate::systemd::{JobKind, UnitManager, JOB_DONE, UNIT_NAME};
use std::sync::Arc;

/// Issues start/stop/restart jobs for the tunnel unit and waits for each to finish
///
/// Exactly one job is submitted per call and nothing is retried. Overlapping calls
/// each submit their own job; the manager's "replace" mode decides which one wins,
/// so effects of concurrent calls are not FIFO-ordered.
///
/// There is no timeout here: wrap a call in `tokio::time::timeout` for bounded latency.
#[derive(Clone)]
pub struct ServiceController {
    manager: Arc<dyn UnitManager>,
}

impl ServiceController {
    pub fn new(manager: Arc<dyn UnitManager>) -> Self {
        Self { manager }
    }

    /// Start the service unit
    pub async fn start(&self) -> Result<()> {
        self.run_job(JobKind::Start).await
    }

    /// Stop the service unit
    pub async fn stop(&self) -> Result<()> {
        self.run_job(JobKind::Stop).await
    }

    /// Restart the service unit
    pub async fn restart(&self) -> Result<()> {
        self.run_job(JobKind::Restart).await
    }

    /// Submit a job of the given kind and block until the manager reports its status
    pub async fn run_job(&self, kind: JobKind) -> Result<()> {
        tracing::info!("Submitting {} job for {}", kind, UNIT_NAME);

        let job = self.manager.submit_job(UNIT_NAME, kind).await?;
        let job_path = job.path().to_string();
        let status = job.wait().await?;

        if status == JOB_DONE {
            tracing::info!("{} job {} for {} done", kind, job_path, UNIT_NAME);
            Ok(())
        } else {
            tracing::warn!(
                "{} job {} for {} finished with status {}",
                kind,
                job_path,
                UNIT_NAME,
                status
            );
            Err(TunnelError::JobFailed {
                unit: UNIT_NAME.to_string(),
                kind,
                status,
            })
        }
    }
}
