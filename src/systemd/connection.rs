// Long-lived systemd manager connection over the system D-Bus

use crate::error::{Result, TunnelError};
use crate::systemd::{JobKind, JOB_MODE};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use tokio::sync::oneshot;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};
use zbus::{proxy, Connection};

/// Untyped property dictionary returned by the manager for a unit
pub type PropertyMap = HashMap<String, OwnedValue>;

/// Systemd Manager D-Bus proxy
#[proxy(
    interface = "org.freedesktop.systemd1.Manager",
    default_service = "org.freedesktop.systemd1",
    default_path = "/org/freedesktop/systemd1"
)]
trait SystemdManager {
    /// Start a unit
    fn start_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;

    /// Stop a unit
    fn stop_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;

    /// Restart a unit
    fn restart_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;

    /// Load a unit (works for units that are not currently loaded)
    fn load_unit(&self, name: &str) -> zbus::Result<OwnedObjectPath>;

    /// Ask the manager to emit job and unit signals to this client
    fn subscribe(&self) -> zbus::Result<()>;

    fn unsubscribe(&self) -> zbus::Result<()>;

    /// Emitted once per job when it leaves the job queue
    #[zbus(signal)]
    fn job_removed(
        &self,
        id: u32,
        job: zbus::zvariant::ObjectPath<'_>,
        unit: &str,
        result: &str,
    ) -> zbus::Result<()>;
}

/// A submitted job awaiting its single completion signal
#[derive(Debug)]
pub struct PendingJob {
    path: String,
    completion: oneshot::Receiver<String>,
}

impl PendingJob {
    /// Create a job handle together with the sender that completes it
    pub fn channel(path: impl Into<String>) -> (oneshot::Sender<String>, Self) {
        let (tx, completion) = oneshot::channel();
        (
            tx,
            Self {
                path: path.into(),
                completion,
            },
        )
    }

    /// Object path of the job
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Block until the manager reports the job's terminal status
    pub async fn wait(self) -> Result<String> {
        self.completion.await.map_err(|_| {
            TunnelError::ManagerUnavailable(format!(
                "connection lost before job {} completed",
                self.path
            ))
        })
    }
}

/// Request/response primitives the controller and status query need from the manager
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UnitManager: Send + Sync {
    /// Submit a state-transition job in "replace" mode
    async fn submit_job(&self, unit: &str, kind: JobKind) -> Result<PendingJob>;

    /// Fetch every property the manager exposes for a unit
    async fn unit_properties(&self, unit: &str) -> Result<PropertyMap>;
}

/// Handle to the system service manager, shared by every controller and status call
///
/// zbus multiplexes concurrent method calls over one connection by serial number,
/// so no additional locking is needed here.
#[derive(Clone)]
pub struct ManagerConnection {
    connection: Connection,
}

impl ManagerConnection {
    /// Connect to the system bus and subscribe to manager signals
    pub async fn system() -> Result<Self> {
        let connection = Connection::system()
            .await
            .map_err(|e| TunnelError::ManagerUnavailable(e.to_string()))?;
        tracing::info!("Connected to system D-Bus");

        Self::from_connection(connection).await
    }

    /// Wrap an existing bus connection
    pub async fn from_connection(connection: Connection) -> Result<Self> {
        let manager = Self { connection };

        // Without a subscriber systemd may not broadcast JobRemoved
        manager
            .manager()
            .await?
            .subscribe()
            .await
            .map_err(|e| TunnelError::ManagerUnavailable(format!("Subscribe failed: {}", e)))?;

        Ok(manager)
    }

    /// Unsubscribe and drop the connection
    pub async fn close(self) {
        match self.manager().await {
            Ok(proxy) => {
                if let Err(e) = proxy.unsubscribe().await {
                    tracing::debug!("Unsubscribe failed during close: {}", e);
                }
            }
            Err(e) => tracing::debug!("Manager proxy unavailable during close: {}", e),
        }
        tracing::info!("Closed system D-Bus connection");
    }

    /// Get the manager proxy for making calls
    async fn manager(&self) -> Result<SystemdManagerProxy<'static>> {
        SystemdManagerProxy::new(&self.connection)
            .await
            .map_err(|e| TunnelError::ManagerUnavailable(e.to_string()))
    }
}

#[async_trait]
impl UnitManager for ManagerConnection {
    async fn submit_job(&self, unit: &str, kind: JobKind) -> Result<PendingJob> {
        let manager = self.manager().await?;

        // Subscribe before submitting so a fast job cannot finish unobserved
        let mut removed = manager
            .receive_job_removed()
            .await
            .map_err(|e| TunnelError::ManagerUnavailable(e.to_string()))?;

        let submitted = match kind {
            JobKind::Start => manager.start_unit(unit, JOB_MODE).await,
            JobKind::Stop => manager.stop_unit(unit, JOB_MODE).await,
            JobKind::Restart => manager.restart_unit(unit, JOB_MODE).await,
        };
        let job_path = submitted.map_err(|e| classify_submission_error(unit, kind, e))?;
        tracing::debug!("{} {} submitted as {}", kind.method(), unit, job_path.as_str());

        let (tx, pending) = PendingJob::channel(job_path.as_str());
        tokio::spawn(async move {
            while let Some(signal) = removed.next().await {
                let Ok(args) = signal.args() else {
                    continue;
                };
                if args.job().as_str() == job_path.as_str() {
                    let _ = tx.send(args.result().to_string());
                    return;
                }
            }
            tracing::warn!("JobRemoved stream ended before {} completed", job_path.as_str());
        });

        Ok(pending)
    }

    async fn unit_properties(&self, unit: &str) -> Result<PropertyMap> {
        let query_failed = |message: String| TunnelError::PropertyQueryFailed {
            unit: unit.to_string(),
            message,
        };

        let manager = self
            .manager()
            .await
            .map_err(|e| query_failed(e.to_string()))?;

        // LoadUnit loads the unit into memory if needed and returns the object path
        let unit_path = manager
            .load_unit(unit)
            .await
            .map_err(|e| query_failed(e.to_string()))?;

        let props_proxy = zbus::fdo::PropertiesProxy::builder(&self.connection)
            .destination("org.freedesktop.systemd1")
            .map_err(|e| query_failed(e.to_string()))?
            .path(unit_path.as_str())
            .map_err(|e| query_failed(e.to_string()))?
            .build()
            .await
            .map_err(|e| query_failed(e.to_string()))?;

        // Empty interface name: properties of every interface on the unit object
        use zbus::zvariant::Optional;
        props_proxy
            .get_all(Optional::default())
            .await
            .map_err(|e| query_failed(e.to_string()))
    }
}

/// Method errors mean the manager refused the job; anything else means the bus is gone
pub(crate) fn classify_submission_error(
    unit: &str,
    kind: JobKind,
    error: zbus::Error,
) -> TunnelError {
    match error {
        zbus::Error::MethodError(name, detail, _) => TunnelError::SubmissionFailed {
            unit: unit.to_string(),
            kind,
            message: match detail {
                Some(detail) => format!("{}: {}", name.as_str(), detail),
                None => name.as_str().to_string(),
            },
        },
        zbus::Error::FDO(fdo) => TunnelError::SubmissionFailed {
            unit: unit.to_string(),
            kind,
            message: fdo.to_string(),
        },
        other => TunnelError::ManagerUnavailable(other.to_string()),
    }
}
