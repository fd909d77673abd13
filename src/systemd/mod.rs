// Systemd integration module

pub mod connection;
pub mod control;
pub mod models;
pub mod status;


pub use connection::{ManagerConnection, PendingJob, PropertyMap, UnitManager};
pub use control::ServiceController;
pub use models::{JobKind, ServiceStatus, JOB_DONE, JOB_MODE, UNIT_NAME};
pub use status::StatusQuery;

#[cfg(test)]
pub use connection::MockUnitManager;
